//! Command surface
//!
//! Decodes host method calls, routes them to the registry or a session and
//! encodes the result. Every failure comes back synchronously as a
//! [`CommandError`]; engine failures never do, they travel on the event
//! stream.

use crate::{
    registry::{CreateOptions, MediaSource, SessionRegistry},
    source::ContentType,
    types::SessionId,
    CommandError, Error, Result,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// One host method call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateArgs {
    #[serde(alias = "source")]
    uri: Option<String>,
    asset: Option<String>,
    package_name: Option<String>,
    #[serde(rename = "type")]
    format_hint: Option<String>,
    looping: Option<bool>,
    volume: Option<f64>,
}

impl CreateArgs {
    fn into_options(self) -> Result<CreateOptions> {
        let source = match (self.asset, self.uri) {
            (Some(name), _) => MediaSource::Asset {
                name,
                package: self.package_name,
            },
            (None, Some(uri)) => MediaSource::Uri {
                uri,
                hint: self
                    .format_hint
                    .as_deref()
                    .map(ContentType::from_hint)
                    .transpose()?,
            },
            (None, None) => return Err(Error::MissingArgument("uri or asset".into())),
        };
        Ok(CreateOptions {
            source,
            looping: self.looping,
            volume: self.volume,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoopingArgs {
    looping: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeArgs {
    volume: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeekArgs {
    #[serde(alias = "locationMs")]
    location: u64,
}

/// Execute `call` against `registry`.
///
/// `create` returns `{textureId, eventChannel}`, `position` the position in
/// milliseconds and everything else `null`.
pub async fn dispatch(registry: &SessionRegistry, call: MethodCall) -> std::result::Result<Value, CommandError> {
    debug!(method = %call.method, "Dispatching command");
    let result = execute(registry, &call).await;
    if let Err(e) = &result {
        warn!(method = %call.method, code = e.error_code(), error = %e, "Command failed");
    }
    result.map_err(CommandError::from)
}

async fn execute(registry: &SessionRegistry, call: &MethodCall) -> Result<Value> {
    let args = &call.arguments;
    match call.method.as_str() {
        "init" => {
            let disposed = registry.teardown_all().await;
            info!(disposed, "Bridge initialized");
            Ok(Value::Null)
        }
        "create" => {
            let options = decode::<CreateArgs>(args)?.into_options()?;
            let id = registry.create(options).await?;
            Ok(json!({
                "textureId": id.0,
                "eventChannel": registry.config().event_channel_name(id),
            }))
        }
        "setLooping" => {
            let LoopingArgs { looping } = decode(args)?;
            registry.lookup(texture_id(args)?).await?.set_looping(looping)?;
            Ok(Value::Null)
        }
        "setVolume" => {
            let VolumeArgs { volume } = decode(args)?;
            registry.lookup(texture_id(args)?).await?.set_volume(volume)?;
            Ok(Value::Null)
        }
        "play" => {
            registry.lookup(texture_id(args)?).await?.play()?;
            Ok(Value::Null)
        }
        "pause" => {
            registry.lookup(texture_id(args)?).await?.pause()?;
            Ok(Value::Null)
        }
        "seekTo" => {
            let SeekArgs { location } = decode(args)?;
            registry.lookup(texture_id(args)?).await?.seek_to(location)?;
            Ok(Value::Null)
        }
        "position" => {
            let position = registry.lookup(texture_id(args)?).await?.position_ms()?;
            Ok(json!(position))
        }
        "dispose" => {
            registry.dispose(texture_id(args)?).await?;
            Ok(Value::Null)
        }
        other => Err(Error::NotImplemented(other.to_string())),
    }
}

/// Session addressed by a command
fn texture_id(args: &Value) -> Result<SessionId> {
    let raw = args
        .get("textureId")
        .filter(|v| !v.is_null())
        .ok_or_else(|| Error::MissingArgument("textureId".into()))?;
    raw.as_i64()
        .map(SessionId)
        .ok_or_else(|| Error::invalid_argument("textureId", "expected an integer"))
}

fn decode<T: DeserializeOwned>(args: &Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args.clone() };
    serde_json::from_value(args).map_err(|e| Error::invalid_argument("arguments", e.to_string()))
}
