//! Drive the store against a live backend and print every snapshot
//!
//! Usage:
//!   cargo run --example watch -- <asset_uid> <question_name> <submission_uuid>
//!
//! Reads gateway settings from the usual config locations (or QPROC_CONFIG),
//! navigates to the processing route for the given key and prints each
//! published snapshot until the data is fully loaded.

use anyhow::{bail, Context, Result};
use qproc_common::config::TomlConfig;
use qproc_common::types::QuestionPath;
use qproc_store::asset::AssetSource;
use qproc_store::gateway::http::HttpGateway;
use qproc_store::{ProcessingStateStore, StoreCommand};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Asset metadata for the demo: the one question named on the command line,
/// assumed already activated
struct StaticAssets {
    asset_uid: String,
    question: QuestionPath,
}

impl AssetSource for StaticAssets {
    fn is_processing_activated(&self, asset_uid: &str) -> bool {
        asset_uid == self.asset_uid
    }

    fn processing_questions(&self, asset_uid: &str) -> Vec<QuestionPath> {
        if asset_uid == self.asset_uid {
            vec![self.question.clone()]
        } else {
            Vec::new()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,qproc_store=debug".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [asset_uid, question_name, submission_uuid] = args.as_slice() else {
        bail!("usage: watch <asset_uid> <question_name> <submission_uuid>");
    };

    let config = TomlConfig::load(None)?;
    let gateway =
        Arc::new(HttpGateway::new(&config.gateway).context("failed to build HTTP gateway")?);
    let assets = Arc::new(StaticAssets {
        asset_uid: asset_uid.clone(),
        question: QuestionPath {
            name: question_name.clone(),
            flat_path: question_name.clone(),
        },
    });

    let store = ProcessingStateStore::new(gateway, assets);
    let mut snapshots = store.subscribe();

    let (route_tx, route_rx) = mpsc::unbounded_channel();
    let (_cmd_tx, cmd_rx) = mpsc::unbounded_channel::<StoreCommand>();
    let driver = tokio::spawn(store.run(route_rx, cmd_rx));

    let path = format!(
        "/forms/{}/data/processing/{}/{}",
        asset_uid, question_name, submission_uuid
    );
    info!(path = %path, "Navigating");
    route_tx.send(path)?;

    while let Ok(snapshot) = snapshots.recv().await {
        info!(
            is_ready = snapshot.is_ready,
            transcript = snapshot.transcript.as_ref().map(|t| t.value.as_str()),
            translations = snapshot.translations.len(),
            error = snapshot.last_error.as_deref(),
            "Snapshot"
        );
        if let Some(error) = &snapshot.last_error {
            bail!("load failed: {}", error);
        }
        if snapshot.is_ready {
            if let Some(index) = &snapshot.uuid_index {
                if let Some(sequence) = index.question(question_name) {
                    info!(
                        submissions = sequence.len(),
                        answered = sequence.iter().filter(|u| u.is_some()).count(),
                        "Uuid index"
                    );
                }
            }
            break;
        }
    }

    drop(route_tx);
    driver.await?;
    Ok(())
}
