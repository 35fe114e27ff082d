//! Compiler, normalizer and backend-equivalence properties.

use tonal_engine::compiler::{compile, CompileInput};
use tonal_engine::render::{apply_graph, apply_shader, mean_abs_error};
use tonal_engine::{ColorMatrix, Normalizer, PixelBuffer};
use tonal_models::{
    ColorVisionFilter, ParamKey, ParameterSet, ParameterUpdate, Profile, StyleToggles,
};

const EQUIVALENCE_TOLERANCE: f64 = 0.02;

fn patches() -> Vec<PixelBuffer> {
    [
        [120, 90, 60, 255],
        [200, 180, 160, 255],
        [40, 60, 80, 255],
        [128, 128, 128, 255],
    ]
    .into_iter()
    .map(|rgba| PixelBuffer::filled(16, 16, rgba))
    .collect()
}

/// Frames where every blur changes pixels: a fine checker and a colored ramp.
fn textures() -> Vec<PixelBuffer> {
    vec![
        PixelBuffer::from_fn(48, 48, |x, y| {
            if (x / 2 + y / 2) % 2 == 0 {
                [70, 80, 95, 255]
            } else {
                [185, 170, 150, 255]
            }
        }),
        PixelBuffer::from_fn(48, 32, |x, y| {
            [(x * 5) as u8, (y * 7) as u8, ((x + y) * 3) as u8, 255]
        }),
    ]
}

fn params(f: impl FnOnce(&mut ParameterSet)) -> ParameterSet {
    let mut set = ParameterSet::default();
    f(&mut set);
    Normalizer::new().normalize_set(&set)
}

fn assert_backends_agree(label: &str, input: &CompileInput) {
    let pipeline = compile(input);
    assert!(pipeline.graph.validate(), "{label}: invalid graph");
    for patch in patches() {
        let graph = apply_graph(&pipeline.graph, &patch);
        let shader = apply_shader(&pipeline.uniforms, &patch);
        let err = mean_abs_error(&graph, &shader);
        assert!(
            err <= EQUIVALENCE_TOLERANCE,
            "{label}: backends diverge by {err:.4} on {:?}",
            patch.pixel(0, 0)
        );
    }
}

fn assert_backends_agree_on_textures(label: &str, input: &CompileInput) {
    let pipeline = compile(input);
    for (i, frame) in textures().iter().enumerate() {
        let graph = apply_graph(&pipeline.graph, frame);
        let shader = apply_shader(&pipeline.uniforms, frame);
        let err = mean_abs_error(&graph, &shader);
        assert!(
            err <= EQUIVALENCE_TOLERANCE,
            "{label}: backends diverge by {err:.4} on texture {i}"
        );
    }
}

/// Neutral parameters, no profile, no filter, no toggles, auto off: exact passthrough.
#[test]
fn test_neutral_settings_bypass_both_backends() {
    let input = CompileInput::default();
    let pipeline = compile(&input);
    assert!(pipeline.bypass);
    assert!(pipeline.operations.is_empty());
    assert_eq!(pipeline.graph.to_ffmpeg(), "[0:v]null[vout]");

    for patch in patches() {
        assert_eq!(apply_graph(&pipeline.graph, &patch), patch);
        assert_eq!(apply_shader(&pipeline.uniforms, &patch), patch);
    }
}

/// Normalizing twice is the same as normalizing once.
#[test]
fn test_normalization_is_idempotent() {
    let normalizer = Normalizer::new();
    let raw = [
        (ParamKey::Sharpen, 1.2345),
        (ParamKey::Radius, 9.0),
        (ParamKey::Black, -0.04),
        (ParamKey::Hdr, f64::NAN),
        (ParamKey::UserGamma, 101.0),
        (ParamKey::UserHue, -400.0),
    ];
    for (key, value) in raw {
        let once = normalizer.normalize_value(key, value);
        let twice = normalizer.normalize_value(key, once);
        assert_eq!(once, twice, "{key} not idempotent");
        assert!(key.spec().contains(once), "{key} out of range: {once}");
    }
}

/// Compiling the same settings twice gives byte-identical descriptions.
#[test]
fn test_compile_is_deterministic() {
    let input = CompileInput {
        params: params(|p| {
            p.sharpen = 1.0;
            p.white = 0.6;
            p.hdr = 1.3;
        }),
        profile: Profile::Cinematic,
        color_vision_filter: ColorVisionFilter::Deuteranopia,
        toggles: StyleToggles {
            moody: true,
            teal_orange: true,
            vibrant: true,
        },
        auto_enabled: true,
        auto_matrix: ColorMatrix::saturation(1.1),
    };
    let a = compile(&input);
    let b = compile(&input);
    assert_eq!(a, b);
    assert_eq!(a.description(), b.description());
    assert_eq!(a.graph.to_ffmpeg(), b.graph.to_ffmpeg());
}

/// Extreme settings still compile to finite coefficients.
#[test]
fn test_extreme_settings_stay_finite() {
    let normalizer = Normalizer::new();
    for use_max in [true, false] {
        let mut update = ParameterUpdate::new();
        for key in ParamKey::ALL {
            let spec = key.spec();
            update = update.with_param(*key, if use_max { spec.max * 10.0 } else { spec.min * 10.0 });
        }
        let set = normalizer.apply(&ParameterSet::default(), &update);
        for profile in [Profile::User, Profile::Cinematic, Profile::Gaming] {
            let pipeline = compile(&CompileInput {
                params: set.clone(),
                profile,
                toggles: StyleToggles {
                    moody: true,
                    teal_orange: true,
                    vibrant: true,
                },
                ..CompileInput::default()
            });
            assert!(pipeline.is_finite(), "{profile:?} max={use_max}");
            assert!(pipeline.graph.validate());
            let out = apply_graph(&pipeline.graph, &patches()[0]);
            assert_eq!(out.width(), 16);
        }
    }
}

#[test]
fn test_backends_agree_on_profiles() {
    for profile in [
        Profile::Cinematic,
        Profile::Gaming,
        Profile::Animation,
        Profile::EyeComfort,
    ] {
        assert_backends_agree(
            profile.as_str(),
            &CompileInput {
                profile,
                ..CompileInput::default()
            },
        );
    }
}

#[test]
fn test_backends_agree_on_tone_stages() {
    assert_backends_agree(
        "black+white",
        &CompileInput {
            params: params(|p| {
                p.black = 0.8;
                p.white = -0.9;
            }),
            ..CompileInput::default()
        },
    );
    assert_backends_agree(
        "hdr boost",
        &CompileInput {
            params: params(|p| p.hdr = 1.2),
            ..CompileInput::default()
        },
    );
    assert_backends_agree(
        "hdr soften",
        &CompileInput {
            params: params(|p| p.hdr = -0.8),
            ..CompileInput::default()
        },
    );
    assert_backends_agree(
        "sharpen+denoise",
        &CompileInput {
            params: params(|p| {
                p.sharpen = 1.5;
                p.denoise = 1.0;
            }),
            ..CompileInput::default()
        },
    );
}

#[test]
fn test_backends_agree_on_user_bank() {
    assert_backends_agree(
        "user",
        &CompileInput {
            params: params(|p| {
                p.user_contrast = 20.0;
                p.user_saturation = -15.0;
                p.user_hue = 25.0;
                p.user_gamma = 120.0;
                p.user_shadows = 10.0;
                p.user_highlights = -10.0;
                p.user_vibrance = 30.0;
                p.user_red = 110.0;
                p.user_blue = 90.0;
            }),
            profile: Profile::User,
            ..CompileInput::default()
        },
    );
}

#[test]
fn test_backends_agree_on_filters_styles_and_auto() {
    assert_backends_agree(
        "color vision",
        &CompileInput {
            color_vision_filter: ColorVisionFilter::Protanopia,
            ..CompileInput::default()
        },
    );
    assert_backends_agree(
        "styles",
        &CompileInput {
            toggles: StyleToggles {
                moody: true,
                teal_orange: true,
                vibrant: true,
            },
            ..CompileInput::default()
        },
    );
    assert_backends_agree(
        "auto",
        &CompileInput {
            auto_enabled: true,
            auto_matrix: ColorMatrix::hue_rotate(6.0)
                .multiply(&ColorMatrix::saturation(1.2))
                .multiply(&ColorMatrix::brightness_contrast(1.1, 1.05)),
            ..CompileInput::default()
        },
    );
}

/// Grain is deterministic, so both backends reproduce the same pattern.
#[test]
fn test_backends_agree_on_grain() {
    assert_backends_agree(
        "grain",
        &CompileInput {
            params: params(|p| p.denoise = -1.0),
            profile: Profile::Cinematic,
            ..CompileInput::default()
        },
    );
}

/// Stacked spatial stages see the output of the stages before them in both backends.
#[test]
fn test_backends_agree_on_textured_spatial_stages() {
    let cases: [(&str, fn(&mut ParameterSet)); 5] = [
        ("sharpen+denoise", |p| {
            p.sharpen = 2.0;
            p.denoise = 1.5;
        }),
        ("sharpen+hdr soften", |p| {
            p.sharpen = 2.0;
            p.hdr = -1.0;
        }),
        ("sharpen+hdr boost", |p| {
            p.sharpen = 1.5;
            p.hdr = 1.0;
        }),
        ("grain+hdr boost", |p| {
            p.denoise = -1.5;
            p.hdr = 1.5;
        }),
        ("blur+denoise+hdr soften", |p| {
            p.sharpen = -1.0;
            p.denoise = 0.8;
            p.hdr = -0.5;
        }),
    ];
    for (label, set) in cases {
        assert_backends_agree_on_textures(
            label,
            &CompileInput {
                params: params(set),
                ..CompileInput::default()
            },
        );
    }
}
