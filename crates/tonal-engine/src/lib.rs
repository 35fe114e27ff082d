#![deny(unreachable_patterns)]
//! Adaptive color-grading engine.
//!
//! This crate provides:
//! - 4×5 affine color-matrix algebra
//! - Frame statistics over down-sampled RGBA buffers
//! - Parameter normalization (clamp, quantize, snap)
//! - A color transform compiler producing an operation list, a filter graph
//!   (with ffmpeg rendering) and a shader-uniform bundle
//! - CPU reference evaluators for both backends
//! - An adaptive sampling scheduler with boost windows and failure backoff
//! - The scene analysis engine deriving a smoothed auto-correction matrix

pub mod analysis;
pub mod compiler;
pub mod error;
pub mod frame;
pub mod matrix;
pub mod metrics;
pub mod normalize;
pub mod render;
pub mod scheduler;
pub mod state;
pub mod stats;

pub use analysis::{
    AnalysisConfig, AnalysisPhase, AutoMatrix, AutoState, DiagnosticsSnapshot, FrameSource,
    ReadBlocked, SceneAnalysisEngine, SourceInfo, TickReport, ToneParams,
};
pub use compiler::{
    compile, BackendSelector, ColorOperation, CompileInput, CompiledPipeline, FilterGraph,
    PlanOutcome, RenderPlan, ShaderBackend, ShaderProgram, ShaderUniforms,
};
pub use error::{EngineError, EngineResult};
pub use frame::PixelBuffer;
pub use matrix::ColorMatrix;
pub use normalize::Normalizer;
pub use scheduler::{AdaptiveFpsState, AdaptiveScheduler, SchedulePhase, SchedulerConfig};
pub use state::{EngineSettings, EngineState};
pub use stats::FrameStats;
