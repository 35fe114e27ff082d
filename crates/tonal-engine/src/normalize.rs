//! Parameter normalization: clamp, quantize, snap-to-neutral.
//!
//! The normalizer is the only writer of [`ParameterSet`] values. Malformed
//! input never fails; it is recovered locally and reported at `warn`.

use tonal_models::{ParamKey, ParameterSet, ParameterUpdate};
use tracing::warn;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Validate a raw value without recovering.
    ///
    /// Returns [`EngineError::InvalidParameter`] for non-finite or
    /// out-of-range input; used for diagnostics only.
    pub fn check(&self, key: ParamKey, raw: f64) -> EngineResult<f64> {
        if !raw.is_finite() || !key.spec().contains(raw) {
            return Err(EngineError::InvalidParameter { key, value: raw });
        }
        Ok(raw)
    }

    /// Canonical value for `raw`.
    pub fn normalize_value(&self, key: ParamKey, raw: f64) -> f64 {
        let spec = key.spec();
        if let Err(err) = self.check(key, raw) {
            warn!(param = %key, value = raw, error = %err, "Recovering invalid parameter");
            if !raw.is_finite() {
                return spec.default;
            }
        }

        let clamped = raw.clamp(spec.min, spec.max);
        let inv = 1.0 / spec.step;
        let quantized = ((clamped * inv).round() / inv).clamp(spec.min, spec.max);

        if (quantized - spec.default).abs() < spec.step * 0.5 {
            spec.default
        } else {
            quantized
        }
    }

    /// Normalize every field of `set`.
    pub fn normalize_set(&self, set: &ParameterSet) -> ParameterSet {
        let mut out = set.clone();
        for key in ParamKey::ALL {
            out.set(*key, self.normalize_value(*key, set.get(*key)));
        }
        out
    }

    /// Apply the parameter part of a partial update; unspecified fields are kept.
    pub fn apply(&self, current: &ParameterSet, update: &ParameterUpdate) -> ParameterSet {
        let mut next = current.clone();
        for (key, raw) in &update.params {
            next.set(*key, self.normalize_value(*key, *raw));
        }
        next
    }

    /// Auto strength clamped to [0, 1] at two decimals.
    pub fn normalize_strength(&self, raw: f64) -> f64 {
        if !raw.is_finite() {
            warn!(value = raw, "Recovering invalid auto strength");
            return tonal_models::update::DEFAULT_AUTO_STRENGTH;
        }
        (raw.clamp(0.0, 1.0) * 100.0).round() / 100.0
    }
}
