//! geoflow - 1 件の inbound event を in-memory の adapter で流すデモ
//!
//! 使い方: `geoflow [--replace] [EVENT_FILE]`（EVENT_FILE 省略時は stdin、`--help` で一覧）

use anyhow::Context;
use clap::Parser;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use geoflow_core::app::{LaunchConfig, Launcher, PayloadSet};
use geoflow_core::domain::ProcessPayload;
use geoflow_core::impls::{
    InMemoryBlobStore, InMemoryExecutionEngine, InMemoryStateStore, InMemoryTopicClient,
};
use geoflow_core::ports::MAX_BATCH_ENTRIES;
use geoflow_core::publish::TopicPublisher;

const LOCAL_BUCKET: &str = "geoflow-local-payloads";
const FEATURE_TOPIC: &str = "arn:local:sns:geoflow-features";

#[derive(Parser)]
#[command(name = "geoflow")]
#[command(about = "Launch one inbound event against in-memory adapters", long_about = None)]
#[command(version)]
struct Cli {
    /// Relaunch payloads even when their input already completed
    #[arg(long)]
    replace: bool,

    /// Event JSON file; read from stdin when omitted
    event_file: Option<PathBuf>,
}

/// Ids of the successor payloads. A successor whose chain filter kept no
/// feature has no id and is reported as `null`.
fn successor_ids(payload: &ProcessPayload) -> anyhow::Result<Vec<Value>> {
    let mut ids = Vec::new();
    for next in payload.next_payloads() {
        let mut next = next?;
        if next.features().is_empty() {
            tracing::info!(
                workflow = next.workflow(),
                "chain filter kept no features, no successor id"
            );
            ids.push(Value::Null);
            continue;
        }
        ids.push(Value::String(next.derive_id()?.to_string()));
    }
    Ok(ids)
}

async fn read_event(path: Option<&Path>) -> anyhow::Result<Value> {
    let text = match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };
    serde_json::from_str(&text).context("event is not valid JSON")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // (A) 設定を読み込む（bucket が無ければローカル用の名前を使う）
    let mut config = LaunchConfig::from_env()?;
    if config.payload_bucket.is_none() {
        config = config.with_payload_bucket(LOCAL_BUCKET);
    }

    // (B) in-memory の adapter で Launcher を組み立てる
    let store = Arc::new(InMemoryStateStore::default());
    let engine = Arc::new(InMemoryExecutionEngine::new());
    let blobs = Arc::new(InMemoryBlobStore::new());
    let launcher = Launcher::builder()
        .state_store(store.clone())
        .engine(engine.clone())
        .blob_store(blobs.clone())
        .config(config)
        .build()?;

    // (C) event から payload を取り出して起動
    let event = read_event(cli.event_file.as_deref()).await?;
    let payload = ProcessPayload::from_event(&event, blobs.as_ref(), true).await?;
    tracing::info!(payload_id = ?payload.id(), workflow = payload.workflow(), "received payload");

    let mut set = PayloadSet::new(vec![payload.clone()])?;
    let results = set.process(&launcher, cli.replace).await?;

    // (D) 次の step の payload（id は新しく導出、feature が無ければ null）
    let next_ids = successor_ids(&payload)?;

    // (E) feature ごとのメッセージを topic へ
    let topic = Arc::new(InMemoryTopicClient::new());
    let mut publisher = TopicPublisher::new(topic.clone(), FEATURE_TOPIC, MAX_BATCH_ENTRIES)?;
    for (body, attributes) in payload.feature_messages() {
        publisher.add(body, Some(attributes))?;
    }
    publisher.finish()?;

    let report = json!({
        "results": results,
        "next_payloads": next_ids,
        "executions": engine.started().await.len(),
        "published_batches": topic.batch_sizes(FEATURE_TOPIC),
        "events": store.events().await,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successor_without_features_reports_null() {
        let payload = ProcessPayload::new(
            json!({
                "features": [{"id": "a", "collection": "c", "properties": {"eo:cloud_cover": 80}}],
                "process": [
                    {"upload_options": {}, "workflow": "cog", "tasks": {}},
                    [
                        {
                            "upload_options": {},
                            "workflow": "clear",
                            "tasks": {},
                            "chain_filter": "@.properties.'eo:cloud_cover' < 20",
                        },
                        {"upload_options": {}, "workflow": "mirror", "tasks": {}},
                    ],
                ],
            }),
            true,
        )
        .unwrap();

        let ids = successor_ids(&payload).unwrap();
        assert_eq!(ids, vec![Value::Null, json!("c/workflow-mirror/a")]);
    }

    #[test]
    fn cli_accepts_replace_and_event_file() {
        let cli = Cli::parse_from(["geoflow", "--replace", "event.json"]);
        assert!(cli.replace);
        assert_eq!(cli.event_file, Some(PathBuf::from("event.json")));

        let cli = Cli::parse_from(["geoflow"]);
        assert!(!cli.replace);
        assert!(cli.event_file.is_none());
    }
}
