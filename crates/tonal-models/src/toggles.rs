//! Stylistic toggles and render backend selection.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Independently composable stylistic grades.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(default)]
pub struct StyleToggles {
    /// Desaturated, crushed, slightly cool grade
    pub moody: bool,
    /// Teal shadows / orange highlights split-tone
    pub teal_orange: bool,
    /// Vibrance boost
    pub vibrant: bool,
}

impl StyleToggles {
    /// Whether any toggle is set.
    pub fn any(&self) -> bool {
        self.moody || self.teal_orange || self.vibrant
    }
}

/// Rendering backend for the compiled pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Composable matrix/kernel chain with intermediate buffers
    #[default]
    FilterGraph,
    /// Single per-pixel shading pass
    Shader,
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::FilterGraph => "filter_graph",
            RenderMode::Shader => "shader",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
