//! Source resolution
//!
//! Turns a content locator into the source adapter the engine prepares:
//! - local vs networked data access, chosen from the locator scheme
//! - content type (smooth streaming, DASH, HLS, progressive), inferred
//!   from the locator path or forced by a format hint
//!
//! Resolution runs before any engine is built, so an unsupported locator
//! never leaves a half-created session behind.

use crate::{config::BridgeConfig, Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Schemes served from the device rather than the network
const LOCAL_SCHEMES: &[&str] = &["file", "asset"];

/// Container extensions handled by the progressive extractor
const PROGRESSIVE_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "m4a", "mov", "3gp", "webm", "mkv", "mp3", "aac", "ts", "flv", "ogg", "oga",
    "opus", "wav", "flac",
];

/// Content type of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    SmoothStreaming,
    Dash,
    Hls,
    Progressive,
}

impl ContentType {
    /// Parse a host-supplied format hint (`ss`, `dash`, `hls`, `other`)
    pub fn from_hint(hint: &str) -> Result<Self> {
        match hint.to_ascii_lowercase().as_str() {
            "ss" => Ok(ContentType::SmoothStreaming),
            "dash" => Ok(ContentType::Dash),
            "hls" => Ok(ContentType::Hls),
            "other" => Ok(ContentType::Progressive),
            other => Err(Error::invalid_argument(
                "type",
                format!("unknown format hint `{other}`"),
            )),
        }
    }

    /// Infer the content type from the last path segment of a locator
    pub fn infer(segment: &str) -> Option<Self> {
        let segment = segment.to_ascii_lowercase();
        let (_, ext) = segment.rsplit_once('.')?;
        match ext {
            "mpd" => Some(ContentType::Dash),
            "m3u8" => Some(ContentType::Hls),
            "ism" | "isml" => Some(ContentType::SmoothStreaming),
            ext if PROGRESSIVE_EXTENSIONS.contains(&ext) => Some(ContentType::Progressive),
            _ => None,
        }
    }

    /// Classify a locator by its last path segment.
    ///
    /// Smooth streaming manifests end in `/Manifest` or `/Manifest(...)`;
    /// those are classified by the `.ism`/`.isml` segment in front.
    pub fn classify(locator: &Locator) -> Option<Self> {
        let mut segments = locator.segments().rev();
        let last = segments.next()?;
        if is_manifest_marker(last) {
            return segments
                .next()
                .and_then(Self::infer)
                .filter(|t| *t == ContentType::SmoothStreaming);
        }
        Self::infer(last)
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentType::SmoothStreaming => write!(f, "smooth-streaming"),
            ContentType::Dash => write!(f, "dash"),
            ContentType::Hls => write!(f, "hls"),
            ContentType::Progressive => write!(f, "progressive"),
        }
    }
}

/// `Manifest` or `Manifest(...)`
fn is_manifest_marker(segment: &str) -> bool {
    let segment = segment.to_ascii_lowercase();
    segment == "manifest"
        || (segment.starts_with("manifest(") && segment.ends_with(')'))
}

/// Parsed content locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    raw: String,
    scheme: Option<String>,
    path: String,
}

impl Locator {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::InvalidLocator("empty locator".to_string()));
        }

        match Url::parse(raw) {
            Ok(url) => Ok(Self {
                raw: raw.to_string(),
                scheme: Some(url.scheme().to_ascii_lowercase()),
                path: url.path().to_string(),
            }),
            // Bare paths such as `clip.m3u8` carry no scheme
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let path = raw.split(['?', '#']).next().unwrap_or_default();
                Ok(Self {
                    raw: raw.to_string(),
                    scheme: None,
                    path: path.to_string(),
                })
            }
            Err(e) => Err(Error::InvalidLocator(format!("{raw}: {e}"))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// Non-empty path segments, in order
    pub fn segments(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    /// Last non-empty path segment
    pub fn last_segment(&self) -> Option<&str> {
        self.segments().next_back()
    }

    /// File and bundled-asset locators are read locally
    pub fn is_local(&self) -> bool {
        self.scheme
            .as_deref()
            .is_some_and(|scheme| LOCAL_SCHEMES.contains(&scheme))
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Networked data access settings plus the shared HTTP client
#[derive(Debug, Clone)]
pub struct NetworkAccess {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub allow_cross_protocol_redirects: bool,
    pub max_redirects: usize,
    client: reqwest::Client,
}

impl NetworkAccess {
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        let allow_cross = config.allow_cross_protocol_redirects;
        let max_redirects = config.max_redirects;

        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            let from_scheme = attempt.previous().last().map(|prev| prev.scheme());
            match redirect_decision(
                attempt.previous().len(),
                from_scheme,
                attempt.url().scheme(),
                allow_cross,
                max_redirects,
            ) {
                RedirectDecision::Follow => attempt.follow(),
                RedirectDecision::Stop => attempt.stop(),
                RedirectDecision::TooMany => attempt.error("too many redirects"),
            }
        });

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .redirect(policy)
            .build()?;

        Ok(Self {
            user_agent: config.user_agent.clone(),
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            allow_cross_protocol_redirects: allow_cross,
            max_redirects,
            client,
        })
    }

    /// Client the engine uses to fetch manifests and media
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RedirectDecision {
    Follow,
    Stop,
    TooMany,
}

/// Decide one redirect hop. `hops` counts the locations already visited.
fn redirect_decision(
    hops: usize,
    from_scheme: Option<&str>,
    to_scheme: &str,
    allow_cross_protocol: bool,
    max_redirects: usize,
) -> RedirectDecision {
    let crosses = from_scheme.is_some_and(|from| !from.eq_ignore_ascii_case(to_scheme));
    if hops > max_redirects {
        RedirectDecision::TooMany
    } else if crosses && !allow_cross_protocol {
        RedirectDecision::Stop
    } else {
        RedirectDecision::Follow
    }
}

/// How the engine reads source bytes
#[derive(Debug, Clone)]
pub enum DataAccess {
    Local,
    Network(NetworkAccess),
}

impl DataAccess {
    pub fn is_local(&self) -> bool {
        matches!(self, DataAccess::Local)
    }
}

/// Extractor options for progressive sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractorOptions {
    pub allow_non_idr_keyframes: bool,
}

/// Source adapter handed to the engine's prepare call
#[derive(Debug, Clone)]
pub enum SourceAdapter {
    SmoothStreaming { locator: Locator, access: DataAccess },
    Dash { locator: Locator, access: DataAccess },
    Hls { locator: Locator, access: DataAccess },
    Progressive {
        locator: Locator,
        access: DataAccess,
        extractor: ExtractorOptions,
    },
}

impl SourceAdapter {
    pub fn content_type(&self) -> ContentType {
        match self {
            SourceAdapter::SmoothStreaming { .. } => ContentType::SmoothStreaming,
            SourceAdapter::Dash { .. } => ContentType::Dash,
            SourceAdapter::Hls { .. } => ContentType::Hls,
            SourceAdapter::Progressive { .. } => ContentType::Progressive,
        }
    }

    pub fn locator(&self) -> &Locator {
        match self {
            SourceAdapter::SmoothStreaming { locator, .. }
            | SourceAdapter::Dash { locator, .. }
            | SourceAdapter::Hls { locator, .. }
            | SourceAdapter::Progressive { locator, .. } => locator,
        }
    }

    pub fn data_access(&self) -> &DataAccess {
        match self {
            SourceAdapter::SmoothStreaming { access, .. }
            | SourceAdapter::Dash { access, .. }
            | SourceAdapter::Hls { access, .. }
            | SourceAdapter::Progressive { access, .. } => access,
        }
    }
}

/// Builds source adapters, sharing one network client across sessions
pub struct SourceResolver {
    config: BridgeConfig,
    network: Mutex<Option<NetworkAccess>>,
}

impl SourceResolver {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            network: Mutex::new(None),
        }
    }

    /// Classify `locator` and build its adapter.
    ///
    /// `hint` overrides extension-based classification.
    pub fn resolve(&self, locator: &str, hint: Option<ContentType>) -> Result<SourceAdapter> {
        let locator = Locator::parse(locator)?;

        let content_type = match hint {
            Some(content_type) => content_type,
            None => ContentType::classify(&locator)
                .ok_or_else(|| Error::UnsupportedSourceType(locator.to_string()))?,
        };

        let access = if locator.is_local() {
            DataAccess::Local
        } else {
            DataAccess::Network(self.network_access()?)
        };

        debug!(
            locator = %locator,
            content_type = %content_type,
            local = access.is_local(),
            "Resolved source"
        );

        Ok(match content_type {
            ContentType::SmoothStreaming => SourceAdapter::SmoothStreaming { locator, access },
            ContentType::Dash => SourceAdapter::Dash { locator, access },
            ContentType::Hls => SourceAdapter::Hls { locator, access },
            ContentType::Progressive => SourceAdapter::Progressive {
                locator,
                access,
                extractor: ExtractorOptions {
                    allow_non_idr_keyframes: self.config.allow_non_idr_keyframes,
                },
            },
        })
    }

    fn network_access(&self) -> Result<NetworkAccess> {
        let mut network = self.network.lock();
        if let Some(access) = network.as_ref() {
            return Ok(access.clone());
        }
        let access = NetworkAccess::from_config(&self.config)?;
        *network = Some(access.clone());
        Ok(access)
    }
}

impl Default for SourceResolver {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}
