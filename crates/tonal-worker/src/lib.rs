//! Host driver for the grading engine.
//!
//! This crate provides:
//! - Configuration from `TONAL_*` environment variables
//! - The self-rescheduling analysis task
//! - The renderer task that recompiles on settings and auto-matrix changes
//! - A still-image frame source for running the engine over files on disk

pub mod config;
pub mod driver;
pub mod error;
pub mod still_source;

pub use config::WorkerConfig;
pub use driver::{run_analysis, run_renderer, AnalysisSummary, RendererSummary};
pub use error::{WorkerError, WorkerResult};
pub use still_source::StillSource;
