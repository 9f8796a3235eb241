//! Refill workflow console
//!
//! Validates the refill workflow at start-up and drives one session from
//! stdin. Each line is `<trigger> [field=value ...]`; values are parsed as
//! JSON when possible. `:graph`, `:summary`, `:reset` and `:quit` are
//! commands.

use refill_workflow::config::GraphFormat;
use refill_workflow::{
    export_graph, refill_workflow, EngineConfig, Fields, SessionManager, WorkflowEngine,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refill_workflow=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = EngineConfig::from_env();

    // Table defects stop the process here rather than surfacing per request
    let (definition, warnings) = refill_workflow().validated()?;
    for warning in &warnings {
        tracing::warn!(issue = %warning, "Workflow validation warning");
    }
    let definition = Arc::new(definition);
    tracing::info!(
        states = definition.states().all().len(),
        transitions = definition.transitions().all().len(),
        "Workflow validated"
    );

    let sessions = Arc::new(
        SessionManager::new(Arc::clone(&definition)).with_ttl_override(config.session_ttl),
    );
    let shutdown = CancellationToken::new();
    let sweeper = sessions.spawn_sweeper(config.sweep_interval, shutdown.clone());
    let engine = WorkflowEngine::new(Arc::clone(&definition), Arc::clone(&sessions));

    let mut session_id = new_session(&engine)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            ":quit" => break,
            ":graph" => {
                let graph = export_graph(&definition);
                match config.graph_format {
                    GraphFormat::Json => println!("{}", serde_json::to_string_pretty(&graph)?),
                    GraphFormat::Dot => print!("{}", graph.to_dot()),
                }
            }
            ":summary" => match engine.summarize(&session_id) {
                Ok(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                Err(e) => eprintln!("{e}"),
            },
            ":reset" => {
                engine.sessions().remove(&session_id);
                session_id = new_session(&engine)?;
            }
            _ => {
                let (trigger, updates) = parse_command(line);
                match engine.transition(&session_id, trigger, updates) {
                    Ok(outcome) => println!("{}", serde_json::to_string_pretty(&outcome)?),
                    Err(e) => {
                        eprintln!("{e}");
                        if let Ok(valid) = engine.valid_triggers(&session_id) {
                            eprintln!("valid triggers: {}", valid.join(", "));
                        }
                    }
                }
            }
        }
    }

    shutdown.cancel();
    sweeper.await?;
    Ok(())
}

fn new_session(engine: &WorkflowEngine) -> Result<String, Box<dyn std::error::Error>> {
    let session_id = uuid::Uuid::new_v4().to_string();
    engine.sessions().create(&session_id, None, Fields::new())?;
    println!("session {session_id}");
    Ok(session_id)
}

/// Split `trigger a=1 b=text` into the trigger and its field updates
fn parse_command(line: &str) -> (&str, Fields) {
    let mut parts = line.split_whitespace();
    let trigger = parts.next().unwrap_or_default();
    let updates = parts
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, raw)| {
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            (name.to_string(), value)
        })
        .collect();
    (trigger, updates)
}
