//! Render targets and bundled assets
//!
//! Both are owned by the host. The bridge borrows a render target for the
//! lifetime of a session and releases it on dispose; asset names are mapped
//! to loadable locators before source resolution.

use crate::{types::SessionId, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::debug;

/// Drawable surface handle supplied by the host
pub trait RenderTarget: Send {
    /// Opaque id, also used as the session id
    fn id(&self) -> SessionId;

    /// Give the surface back to the host
    fn release(&mut self) -> Result<()>;
}

/// Source of fresh render targets
#[async_trait]
pub trait RenderTargetAllocator: Send + Sync {
    async fn allocate(&self) -> Result<Box<dyn RenderTarget>>;
}

/// Maps a bundled asset name to a locator
pub trait AssetResolver: Send + Sync {
    fn lookup(&self, asset: &str, package: Option<&str>) -> String;
}

/// Render target with no backing surface, for headless hosts
#[derive(Debug)]
pub struct HeadlessTarget {
    id: SessionId,
    released: bool,
}

impl HeadlessTarget {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            released: false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl RenderTarget for HeadlessTarget {
    fn id(&self) -> SessionId {
        self.id
    }

    fn release(&mut self) -> Result<()> {
        debug!(target_id = %self.id, "Releasing headless render target");
        self.released = true;
        Ok(())
    }
}

/// Allocator handing out headless targets with increasing ids
#[derive(Debug)]
pub struct SequentialAllocator {
    next: AtomicI64,
}

impl SequentialAllocator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }
}

impl Default for SequentialAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RenderTargetAllocator for SequentialAllocator {
    async fn allocate(&self) -> Result<Box<dyn RenderTarget>> {
        let id = SessionId(self.next.fetch_add(1, Ordering::SeqCst));
        Ok(Box::new(HeadlessTarget::new(id)))
    }
}

/// Assets bundled with the host application under a common root
#[derive(Debug, Clone)]
pub struct BundledAssets {
    root: String,
}

impl BundledAssets {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetResolver for BundledAssets {
    fn lookup(&self, asset: &str, package: Option<&str>) -> String {
        let root = self.root.trim_matches('/');
        let asset = asset.trim_start_matches('/');
        match package {
            Some(package) => format!("asset:///{root}/packages/{package}/{asset}"),
            None => format!("asset:///{root}/{asset}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_lookup() {
        let assets = BundledAssets::new("assets");
        assert_eq!(assets.lookup("videos/intro.mp4", None), "asset:///assets/videos/intro.mp4");
        assert_eq!(
            assets.lookup("intro.mp4", Some("demo_pkg")),
            "asset:///assets/packages/demo_pkg/intro.mp4"
        );
    }

    #[tokio::test]
    async fn test_sequential_ids() {
        let allocator = SequentialAllocator::new();
        let first = allocator.allocate().await.unwrap();
        let second = allocator.allocate().await.unwrap();
        assert_eq!(first.id(), SessionId(1));
        assert_eq!(second.id(), SessionId(2));
    }
}
