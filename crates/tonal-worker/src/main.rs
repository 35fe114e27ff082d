//! Grading engine host binary.
//!
//! Plays a directory of still frames (or the built-in demo reel) through the
//! scene analysis engine, reads JSON `ParameterUpdate`s from stdin one per
//! line, and keeps the compiled pipeline current.

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tonal_engine::{EngineState, SceneAnalysisEngine};
use tonal_models::ParameterUpdate;
use tonal_worker::{run_analysis, run_renderer, StillSource, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Schema of the stdin update protocol, for UI collaborators
    if std::env::args().nth(1).as_deref() == Some("--print-schema") {
        let schema = schemars::schema_for!(ParameterUpdate);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tonal=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting tonal-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(addr) = config.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(%addr, "Metrics exporter listening");
    }

    let analysis_config = config
        .analysis_config()
        .context("Failed to load analysis config")?;

    let state = match config.settings_json() {
        Some(json) => EngineState::from_persisted_json(&json),
        None => EngineState::default(),
    };
    let auto = state.settings().auto;

    let source = match &config.frames_dir {
        Some(dir) => StillSource::open_dir(dir, config.frame_duration, config.loop_frames)
            .with_context(|| format!("Failed to load frames from {}", dir.display()))?,
        None => StillSource::demo_reel(config.frame_duration)?,
    };
    info!(frames = source.len(), auto_enabled = auto.enabled, "Source ready");

    let engine = SceneAnalysisEngine::new(analysis_config, auto);
    let matrix_rx = engine.subscribe();
    let (auto_tx, auto_rx) = watch::channel(auto);
    let (update_tx, update_rx) = mpsc::channel::<ParameterUpdate>(config.update_buffer.max(1));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut analysis = tokio::spawn(run_analysis(
        engine,
        source,
        auto_rx,
        shutdown_rx.clone(),
        config.max_ticks,
    ));
    let renderer = tokio::spawn(run_renderer(
        state,
        matrix_rx,
        update_rx,
        auto_tx,
        config.filter_out.clone(),
        shutdown_rx,
    ));

    // Parameter updates, one JSON object per line
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match serde_json::from_str::<ParameterUpdate>(&line) {
                    Ok(update) => {
                        if update_tx.send(update).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Ignoring malformed update"),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
    });

    // Stop on ctrl-c or when the analysis task finishes on its own
    let summary = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            shutdown_tx.send_replace(true);
            (&mut analysis).await.context("Analysis task panicked")?
        }
        result = &mut analysis => {
            shutdown_tx.send_replace(true);
            result.context("Analysis task panicked")?
        }
    };
    info!(
        ticks = summary.ticks,
        cuts = summary.cuts,
        emissions = summary.emissions,
        blocked = summary.blocked,
        "Analysis summary"
    );

    match renderer.await.context("Renderer task panicked")? {
        Ok(rendered) => info!(
            updates = rendered.updates,
            recompiles = rendered.recompiles,
            shader_fallbacks = rendered.shader_fallbacks,
            "Renderer summary"
        ),
        Err(e) => {
            error!("Renderer error: {}", e);
            return Err(e.into());
        }
    }

    info!("Worker shutdown complete");
    Ok(())
}
