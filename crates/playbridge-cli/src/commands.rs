//! CLI command implementations

use crate::output::{self, ClassifyRow};
use anyhow::Context;
use playbridge_core::{
    dispatch,
    engine::{SimulatedEngineFactory, SimulatedMedia},
    BridgeConfig, ChannelSink, ContentType, DataAccess, Event, EventSink, MethodCall,
    SequentialAllocator, SessionId, SessionRegistry, SourceResolver, StreamItem,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Load the bridge configuration, or defaults without a file
pub fn load_config(path: Option<&Path>) -> anyhow::Result<BridgeConfig> {
    match path {
        Some(path) => BridgeConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(BridgeConfig::default()),
    }
}

/// Classify locators
pub fn classify(
    config: &BridgeConfig,
    locators: &[String],
    hint: Option<&str>,
    format: &str,
) -> anyhow::Result<()> {
    let hint = hint.map(ContentType::from_hint).transpose()?;
    let resolver = SourceResolver::new(config.clone());

    let rows: Vec<ClassifyRow> = locators
        .iter()
        .map(|locator| match resolver.resolve(locator, hint) {
            Ok(source) => ClassifyRow {
                locator: locator.clone(),
                content_type: source.content_type().to_string(),
                access: match source.data_access() {
                    DataAccess::Local => "local".to_string(),
                    DataAccess::Network(net) => format!(
                        "network ({}ms/{}ms)",
                        net.connect_timeout.as_millis(),
                        net.read_timeout.as_millis()
                    ),
                },
            },
            Err(e) => ClassifyRow {
                locator: locator.clone(),
                content_type: e.error_code().to_string(),
                access: e.to_string(),
            },
        })
        .collect();

    output::print_classification(&rows, format);
    Ok(())
}

/// Parameters of the `play` command
pub struct PlayRequest {
    pub locator: String,
    pub asset: bool,
    pub package: Option<String>,
    pub hint: Option<String>,
    pub looping: bool,
    pub volume: Option<f64>,
    pub duration_ms: u64,
    pub fail_after_ms: Option<u64>,
    pub seconds: u64,
}

fn simulated_registry(config: BridgeConfig, media: SimulatedMedia) -> SessionRegistry {
    SessionRegistry::new(
        config,
        Arc::new(SequentialAllocator::new()),
        Arc::new(SimulatedEngineFactory::new(media)),
    )
}

fn create_arguments(request: &PlayRequest) -> Value {
    let mut args = if request.asset {
        json!({ "asset": request.locator, "packageName": request.package })
    } else {
        json!({ "uri": request.locator, "type": request.hint })
    };
    args["looping"] = json!(request.looping);
    if let Some(volume) = request.volume {
        args["volume"] = json!(volume);
    }
    args
}

fn texture_id(created: &Value) -> anyhow::Result<SessionId> {
    created["textureId"]
        .as_i64()
        .map(SessionId)
        .context("create returned no textureId")
}

/// Play one locator, printing its event stream until it ends
pub async fn play(config: BridgeConfig, request: PlayRequest, format: &str) -> anyhow::Result<()> {
    let media = SimulatedMedia {
        duration_ms: request.duration_ms,
        fail_after: request.fail_after_ms.map(Duration::from_millis),
        ..Default::default()
    };
    let registry = simulated_registry(config, media);

    let created = dispatch(&registry, MethodCall::new("create", create_arguments(&request))).await?;
    let id = texture_id(&created)?;
    info!(texture_id = %id, channel = %created["eventChannel"], "Session created");

    let (sink, mut events) = ChannelSink::new();
    registry.listen(id, Arc::new(sink)).await?;

    let deadline = tokio::time::sleep(Duration::from_secs(request.seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!(seconds = request.seconds, "Time limit reached");
                break;
            }
            item = events.recv() => {
                let Some(item) = item else { break };
                println!("{}", output::format_stream_item(id, &item, format));
                match item {
                    StreamItem::Event(Event::Initialized { .. }) => {
                        dispatch(&registry, MethodCall::new("play", json!({ "textureId": id.0 }))).await?;
                    }
                    StreamItem::Event(Event::Completed | Event::Error { .. }) => break,
                    _ => {}
                }
            }
        }
    }

    if let Ok(position) = dispatch(&registry, MethodCall::new("position", json!({ "textureId": id.0 }))).await {
        info!(position_ms = %position, "Final position");
    }
    dispatch(&registry, MethodCall::new("dispose", json!({ "textureId": id.0 }))).await?;

    while let Some(item) = events.recv().await {
        println!("{}", output::format_stream_item(id, &item, format));
    }
    Ok(())
}

/// One step of a command script
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptStep {
    method: String,
    #[serde(default)]
    arguments: Value,
    /// Wait before issuing the command
    #[serde(default)]
    delay_ms: u64,
}

/// Replay a command script; every created session streams to stdout
pub async fn run_script(config: BridgeConfig, script: &Path, format: &str) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(script)
        .with_context(|| format!("reading script {}", script.display()))?;
    let steps: Vec<ScriptStep> = serde_json::from_str(&contents).context("parsing script")?;
    let registry = simulated_registry(config, SimulatedMedia::default());

    let mut failures = 0usize;
    for (index, step) in steps.into_iter().enumerate() {
        if step.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(step.delay_ms)).await;
        }

        let call = MethodCall::new(step.method, step.arguments);
        let method = call.method.clone();
        match dispatch(&registry, call).await {
            Ok(result) => {
                println!("{}", output::format_output(&json!({ "step": index, "method": method, "result": result }), format));
                if method == "create" {
                    let id = texture_id(&result)?;
                    let item_format = format.to_string();
                    let sink: Arc<dyn EventSink> = Arc::new(move |item: StreamItem| {
                        println!("{}", output::format_stream_item(id, &item, &item_format));
                    });
                    registry.listen(id, sink).await?;
                }
            }
            Err(e) => {
                failures += 1;
                warn!(step = index, method = %method, code = %e.code, "Command failed");
                println!("{}", output::format_output(&json!({ "step": index, "method": method, "error": e }), format));
            }
        }
    }

    let remaining = registry.teardown_all().await;
    info!(remaining, failures, "Script finished");
    Ok(())
}
