use crate::report::render_report;
use crate::settings::open_store;
use crate::{BoardArgs, EvaluateArgs, WatchArgs};
use anyhow::{bail, Context, Result};
use boardlens_dom::{shared, Document, NodeSpec};
use boardlens_engine::{load_settings, BoardEngine, EngineConfig, SettingsStore};
use boardlens_watcher::{BoardWatcher, BoardWatcherConfig, PassUpdate};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Reads a serialized render tree; its root becomes the document root.
pub fn load_snapshot(path: &Path) -> Result<Document> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read board snapshot {}", path.display()))?;
    let spec: NodeSpec = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid board snapshot {}", path.display()))?;
    Ok(Document::from_spec(&spec))
}

fn engine_for(args: &BoardArgs) -> Result<BoardEngine> {
    let mut config = EngineConfig::default();
    if let Some(gap) = args.column_gap {
        config.column_gap_threshold = gap;
    }
    BoardEngine::new(config).context("Invalid engine configuration")
}

pub fn run_evaluate(args: EvaluateArgs, settings_path: &Path) -> Result<()> {
    let store = open_store(settings_path)?;
    let settings = load_settings(&store)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    let mut doc = load_snapshot(&args.board.board)?;
    let mut engine = engine_for(&args.board)?;

    let report = engine.run_pass(&mut doc, &settings);

    if let Some(output) = &args.output {
        let spec = doc
            .to_spec(doc.root())
            .context("Annotated snapshot has no root")?;
        fs::write(output, serde_json::to_string_pretty(&spec)?)
            .with_context(|| format!("Failed to write {}", output.display()))?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(())
}

fn update_line(update: &PassUpdate) -> serde_json::Value {
    json!({
        "reason": update.reason,
        "durationMs": update.duration_ms,
        "outcome": update.outcome(),
        "error": update.error,
        "report": update.report,
    })
}

pub async fn run_watch(args: WatchArgs, settings_path: &Path) -> Result<()> {
    let store: Arc<dyn SettingsStore> = Arc::new(open_store(settings_path)?);
    let document = shared(load_snapshot(&args.board.board)?);
    let engine = engine_for(&args.board)?;
    let config = BoardWatcherConfig {
        debounce: Duration::from_millis(args.debounce_ms),
        ..BoardWatcherConfig::default()
    };

    let watcher = BoardWatcher::start(document, engine, store, config)
        .context("Failed to start board watcher")?;
    let mut updates = watcher.subscribe_updates();
    let mut health = watcher.health_stream();
    let deadline = tokio::time::sleep(Duration::from_millis(args.duration_ms));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            () = &mut deadline => break,
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for ctrl-c")?;
                break;
            }
            _ = health.wait_for(|h| h.stopped) => break,
            update = updates.recv() => match update {
                Ok(update) => println!("{}", serde_json::to_string(&update_line(&update))?),
                Err(RecvError::Lagged(skipped)) => log::warn!("Skipped {skipped} pass updates"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    watcher.stop().await.context("Failed to stop board watcher")?;
    let health = watcher.health_snapshot();
    log::info!(
        "Board watch finished: {} passes, {} self-inflicted mutations discarded",
        health.passes,
        health.discarded_mutations
    );
    if health.passes == 0 {
        if let Some(err) = health.last_error {
            bail!("Board watcher stopped: {err}");
        }
    }
    Ok(())
}
