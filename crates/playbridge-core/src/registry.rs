//! Session registry
//!
//! Maps session ids to live sessions and owns the collaborators needed to
//! build new ones. A session appears here only once its engine has been
//! created and prepared.

use crate::{
    config::BridgeConfig,
    engine::EngineFactory,
    relay::EventSink,
    session::{PlayerSession, SessionOptions},
    source::{ContentType, SourceResolver},
    surface::{AssetResolver, BundledAssets, RenderTargetAllocator},
    types::SessionId,
    Error, Result,
};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

/// Where a new session gets its media from
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSource {
    /// Locator with an optional format override
    Uri {
        uri: String,
        hint: Option<ContentType>,
    },
    /// Asset bundled with the host application
    Asset {
        name: String,
        package: Option<String>,
    },
}

/// Parameters of a create request
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOptions {
    pub source: MediaSource,
    /// Falls back to the configured default when unset
    pub looping: Option<bool>,
    pub volume: Option<f64>,
}

impl CreateOptions {
    pub fn uri(uri: impl Into<String>) -> Self {
        Self {
            source: MediaSource::Uri {
                uri: uri.into(),
                hint: None,
            },
            looping: None,
            volume: None,
        }
    }

    pub fn asset(name: impl Into<String>, package: Option<String>) -> Self {
        Self {
            source: MediaSource::Asset {
                name: name.into(),
                package,
            },
            looping: None,
            volume: None,
        }
    }

    pub fn with_hint(mut self, hint: ContentType) -> Self {
        if let MediaSource::Uri { hint: h, .. } = &mut self.source {
            *h = Some(hint);
        }
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = Some(looping);
        self
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }
}

/// Registry of live player sessions
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Arc<PlayerSession>>>,
    targets: Arc<dyn RenderTargetAllocator>,
    engines: Arc<dyn EngineFactory>,
    assets: Arc<dyn AssetResolver>,
    sources: SourceResolver,
    config: BridgeConfig,
}

impl SessionRegistry {
    /// Create a registry. Assets resolve under `config.asset_root`.
    pub fn new(
        config: BridgeConfig,
        targets: Arc<dyn RenderTargetAllocator>,
        engines: Arc<dyn EngineFactory>,
    ) -> Self {
        let assets = Arc::new(BundledAssets::new(config.asset_root.clone()));
        Self::with_assets(config, targets, engines, assets)
    }

    pub fn with_assets(
        config: BridgeConfig,
        targets: Arc<dyn RenderTargetAllocator>,
        engines: Arc<dyn EngineFactory>,
        assets: Arc<dyn AssetResolver>,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            targets,
            engines,
            assets,
            sources: SourceResolver::new(config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Create a session and register it under its render target id.
    ///
    /// Source resolution happens before any engine is built, so an
    /// unsupported source leaves nothing behind but a released target.
    #[instrument(skip(self))]
    pub async fn create(&self, options: CreateOptions) -> Result<SessionId> {
        let (locator, hint) = match &options.source {
            MediaSource::Uri { uri, hint } => (uri.clone(), *hint),
            MediaSource::Asset { name, package } => {
                (self.assets.lookup(name, package.as_deref()), None)
            }
        };

        let mut target = self.targets.allocate().await?;
        let id = target.id();

        let source = match self.sources.resolve(&locator, hint) {
            Ok(source) => source,
            Err(e) => {
                if let Err(release_err) = target.release() {
                    warn!(session_id = %id, error = %release_err, "Render target release failed");
                }
                warn!(session_id = %id, locator = %locator, error = %e, "Source rejected");
                return Err(e);
            }
        };

        let defaults = SessionOptions::from_config(&self.config);
        let session_options = SessionOptions {
            looping: options.looping.unwrap_or(defaults.looping),
            volume: options.volume.unwrap_or(defaults.volume),
        };
        let session = PlayerSession::create(target, source, session_options, self.engines.as_ref())?;

        let mut sessions = self.sessions.lock().await;
        if let Some(stale) = sessions.insert(id, session) {
            warn!(session_id = %id, "Replacing session with reused id");
            stale.dispose();
        }
        info!(session_id = %id, active = sessions.len(), "Session registered");
        Ok(id)
    }

    /// Find a live session
    pub async fn lookup(&self, id: SessionId) -> Result<Arc<PlayerSession>> {
        self.sessions
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::SessionNotFound(id))
    }

    /// Unregister a session without disposing it
    pub async fn remove(&self, id: SessionId) -> Option<Arc<PlayerSession>> {
        self.sessions.lock().await.remove(&id)
    }

    /// Dispose a session and forget it
    #[instrument(skip(self))]
    pub async fn dispose(&self, id: SessionId) -> Result<()> {
        let session = self.remove(id).await.ok_or(Error::SessionNotFound(id))?;
        session.dispose();
        Ok(())
    }

    /// Dispose every session, continuing past any that fail. Returns how
    /// many sessions were removed.
    #[instrument(skip(self))]
    pub async fn teardown_all(&self) -> usize {
        let drained: Vec<_> = self.sessions.lock().await.drain().collect();
        let count = drained.len();

        for (id, session) in drained {
            if catch_unwind(AssertUnwindSafe(|| session.dispose())).is_err() {
                error!(session_id = %id, "Session dispose panicked; continuing teardown");
            }
        }

        if count > 0 {
            info!(count, "All sessions torn down");
        }
        count
    }

    /// Attach the host listener of a session
    pub async fn listen(&self, id: SessionId, sink: Arc<dyn EventSink>) -> Result<()> {
        self.lookup(id).await?.listen(sink)
    }

    /// Detach the host listener of a session
    pub async fn cancel(&self, id: SessionId) -> Result<()> {
        self.lookup(id).await?.cancel();
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Ids of live sessions, ascending
    pub async fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.sessions.lock().await.keys().copied().collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
