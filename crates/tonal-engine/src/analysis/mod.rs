//! Scene analysis: sampling, cut and motion detection, target derivation,
//! smoothing, and auto-matrix publication.

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod publish;
pub mod source;
pub mod tone;

pub use config::AnalysisConfig;
pub use diagnostics::DiagnosticsSnapshot;
pub use engine::{AnalysisPhase, AutoState, SceneAnalysisEngine, TickReport};
pub use publish::{AutoMatrix, AutoMatrixPublisher};
pub use source::{FrameSource, ReadBlocked, SourceInfo};
pub use tone::{wrap_hue, ToneParams};
