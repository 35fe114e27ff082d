//! Shared data models for the Tonal color-grading engine.
//!
//! This crate provides Serde-serializable types for:
//! - Grading parameters and their valid ranges
//! - Tone profiles and color-vision filters
//! - Stylistic toggles and render backend selection
//! - Partial parameter updates pushed by UI/storage collaborators
//! - The versioned persisted-settings record

pub mod param;
pub mod profile;
pub mod settings;
pub mod toggles;
pub mod update;

// Re-export common types
pub use param::{ParamKey, ParamKeyParseError, ParamSpec, ParameterSet};
pub use profile::{ColorVisionFilter, Profile, ProfileParseError};
pub use settings::{ModelError, PersistedSettings, SETTINGS_SCHEMA};
pub use toggles::{RenderMode, StyleToggles};
pub use update::{AutoConfig, ParameterUpdate};
