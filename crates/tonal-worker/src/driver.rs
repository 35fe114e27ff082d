//! Analysis and renderer tasks.
//!
//! The analysis task owns the [`SceneAnalysisEngine`] and its frame source
//! and never overlaps ticks: it ticks, then sleeps for the reported delay.
//! The renderer task owns the [`EngineState`]; it applies parameter updates
//! and recompiles when the engine publishes a new auto-matrix. The two only
//! share the auto-matrix watch channel and the auto settings channel.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tonal_engine::compiler::CpuShaderBackend;
use tonal_engine::{AnalysisPhase, AutoMatrix, EngineState, FrameSource, RenderPlan, SceneAnalysisEngine};
use tonal_models::{AutoConfig, ParameterUpdate};
use tracing::{debug, info, warn};

use crate::error::WorkerResult;

/// Totals reported when the analysis task stops.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisSummary {
    pub ticks: u64,
    pub cuts: u64,
    pub emissions: u64,
    pub blocked: u64,
}

/// Totals reported when the renderer task stops.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RendererSummary {
    pub updates: u64,
    pub recompiles: u64,
    pub shader_fallbacks: u64,
    /// ffmpeg filter of the final pipeline
    pub last_filter: String,
}

/// Run the analysis loop until shutdown or `max_ticks`.
pub async fn run_analysis<S>(
    mut engine: SceneAnalysisEngine,
    mut source: S,
    mut auto_rx: watch::Receiver<AutoConfig>,
    mut shutdown: watch::Receiver<bool>,
    max_ticks: Option<u64>,
) -> AnalysisSummary
where
    S: FrameSource + Send,
{
    let mut summary = AnalysisSummary::default();
    let mut delay = Duration::ZERO;
    let mut last_phase = engine.phase();

    loop {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                let report = engine.tick(&mut source, now());
                summary.ticks += 1;
                summary.cuts += u64::from(report.cut);
                summary.emissions += u64::from(report.emitted);
                if report.phase == AnalysisPhase::Blocked && last_phase != AnalysisPhase::Blocked {
                    summary.blocked += 1;
                }
                if report.phase != last_phase {
                    debug!(from = %last_phase, to = %report.phase, "Analysis phase changed");
                    last_phase = report.phase;
                }
                delay = report.delay;

                if max_ticks.is_some_and(|max| summary.ticks >= max) {
                    info!(ticks = summary.ticks, "Tick limit reached");
                    break;
                }
            }
            changed = auto_rx.changed() => {
                if changed.is_err() {
                    debug!("Auto settings channel closed");
                    break;
                }
                let auto = *auto_rx.borrow_and_update();
                engine.set_auto(auto, now());
                delay = Duration::ZERO;
            }
            _ = shutdown.changed() => {
                info!("Analysis task stopping");
                break;
            }
        }
    }

    let snapshot = engine.diagnostics(now());
    info!(
        ticks = summary.ticks,
        cuts = summary.cuts,
        emissions = summary.emissions,
        diagnostics = %snapshot.to_json(),
        "Analysis finished"
    );
    summary
}

/// Apply updates and recompile on auto-matrix changes until shutdown.
///
/// Auto settings carried by updates are forwarded to the analysis task.
pub async fn run_renderer(
    mut state: EngineState,
    mut matrix_rx: watch::Receiver<AutoMatrix>,
    mut updates: mpsc::Receiver<ParameterUpdate>,
    auto_tx: watch::Sender<AutoConfig>,
    filter_out: Option<PathBuf>,
    mut shutdown: watch::Receiver<bool>,
) -> WorkerResult<RendererSummary> {
    let mut summary = RendererSummary::default();
    let backend = CpuShaderBackend;
    let mut updates_open = true;

    publish_plan(&mut state, &backend, filter_out.as_ref(), &mut summary).await?;

    loop {
        tokio::select! {
            update = updates.recv(), if updates_open => {
                let Some(update) = update else {
                    debug!("Update channel closed");
                    updates_open = false;
                    continue;
                };
                summary.updates += 1;
                let before = state.settings().auto;
                if state.apply_update(&update) {
                    publish_plan(&mut state, &backend, filter_out.as_ref(), &mut summary).await?;
                }
                let after = state.settings().auto;
                if after != before {
                    auto_tx.send_replace(after);
                }
            }
            changed = matrix_rx.changed() => {
                if changed.is_err() {
                    debug!("Auto-matrix channel closed");
                    break;
                }
                let published = matrix_rx.borrow_and_update().clone();
                if state.set_auto_matrix(&published) {
                    publish_plan(&mut state, &backend, filter_out.as_ref(), &mut summary).await?;
                }
            }
            _ = shutdown.changed() => {
                info!("Renderer task stopping");
                break;
            }
        }
    }

    match state.persisted().to_json() {
        Ok(json) => debug!(settings = %json, "Final settings"),
        Err(e) => warn!(error = %e, "Failed to serialize settings"),
    }
    Ok(summary)
}

/// Engine clock; follows tokio's clock so paused-time tests stay consistent.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn publish_plan(
    state: &mut EngineState,
    backend: &CpuShaderBackend,
    filter_out: Option<&PathBuf>,
    summary: &mut RendererSummary,
) -> WorkerResult<()> {
    let outcome = state.plan(backend);
    summary.recompiles += 1;
    if let Some(err) = &outcome.fallback {
        warn!(error = %err, "Shader backend unavailable");
        summary.shader_fallbacks += 1;
    }

    let filter = state.pipeline().graph.to_ffmpeg();
    match &outcome.plan {
        RenderPlan::Shader(program) => debug!(
            generation = state.auto_generation(),
            bypass = program.uniforms.is_bypass(),
            "Shader plan ready"
        ),
        RenderPlan::FilterGraph(graph) => debug!(
            generation = state.auto_generation(),
            nodes = graph.nodes.len(),
            "Filter graph plan ready"
        ),
    }

    if let Some(path) = filter_out {
        tokio::fs::write(path, filter.as_bytes()).await?;
    }
    summary.last_filter = filter;
    Ok(())
}
