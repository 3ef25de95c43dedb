use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{VectorizeError, VectorizeResult};

/// Smallest accepted palette size.
pub const MIN_COLORS: u8 = 2;
/// Largest accepted palette size.
pub const MAX_COLORS: u8 = 64;
/// Largest accepted simplification tolerance, in pixels.
pub const MAX_TOLERANCE: f32 = 100.0;
/// Largest accepted number of decimals in emitted path data.
pub const MAX_PATH_PRECISION: u8 = 6;
/// Default ceiling on `width * height` before the decoder downsamples.
pub const DEFAULT_MAX_PIXELS: u64 = 2048 * 2048;

/// Rendering mode hint. Each mode selects a [`ModeProfile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VectorizeMode {
    #[default]
    #[serde(alias = "Logo")]
    Logo,
    #[serde(alias = "Poster")]
    Poster,
    #[serde(alias = "pixel", alias = "pixelart", alias = "pixelArt", alias = "PixelArt")]
    PixelArt,
}

/// Parameter bundle selected by a [`VectorizeMode`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeProfile {
    /// Multiplier applied to the user tolerance. Zero keeps every non-collinear point.
    pub tolerance_scale: f32,
    /// Multiplier applied to the user smoothness. Zero emits straight segments only.
    pub smoothness_scale: f32,
    /// Whether anti-alias boundary refinement runs.
    pub refine: bool,
    /// Speckle area (pixels) removed at `detail = 0`.
    pub speckle_area: u32,
}

const LOGO_PROFILE: ModeProfile = ModeProfile {
    tolerance_scale: 1.0,
    smoothness_scale: 1.0,
    refine: true,
    speckle_area: 16,
};

const POSTER_PROFILE: ModeProfile = ModeProfile {
    tolerance_scale: 1.25,
    smoothness_scale: 1.0,
    refine: true,
    speckle_area: 36,
};

const PIXEL_ART_PROFILE: ModeProfile = ModeProfile {
    tolerance_scale: 0.0,
    smoothness_scale: 0.0,
    refine: false,
    speckle_area: 0,
};

impl VectorizeMode {
    /// Look up the parameter bundle for this mode.
    pub fn profile(self) -> ModeProfile {
        match self {
            VectorizeMode::Logo => LOGO_PROFILE,
            VectorizeMode::Poster => POSTER_PROFILE,
            VectorizeMode::PixelArt => PIXEL_ART_PROFILE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VectorizeMode::Logo => "logo",
            VectorizeMode::Poster => "poster",
            VectorizeMode::PixelArt => "pixel-art",
        }
    }
}

impl FromStr for VectorizeMode {
    type Err = VectorizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "logo" => Ok(VectorizeMode::Logo),
            "poster" => Ok(VectorizeMode::Poster),
            "pixel" | "pixel-art" | "pixelart" => Ok(VectorizeMode::PixelArt),
            other => Err(VectorizeError::options(
                "mode",
                format!("expected one of logo, poster, pixel-art; got `{other}`"),
            )),
        }
    }
}

impl std::fmt::Display for VectorizeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options controlling a vectorization run.
///
/// Values are validated with [`VectorizeOptions::validate`] before the pipeline
/// starts; out-of-range values are rejected, never clamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct VectorizeOptions {
    /// Maximum palette size (2-64).
    #[serde(alias = "maxColors")]
    pub colors: u8,
    /// Mode hint selecting default curves and refinement.
    pub mode: VectorizeMode,
    /// Simplification tolerance in pixels (0 < t <= 100).
    #[serde(alias = "simplificationTolerance")]
    pub tolerance: f32,
    /// Curve smoothness (0.0 - 1.0). Zero emits straight chords.
    pub smoothness: f32,
    /// Detail level (0.0 - 1.0). Higher keeps smaller regions and tightens tolerance.
    pub detail: f32,
    /// Decimal places in emitted path coordinates (0-6).
    pub path_precision: u8,
    /// Pixel count above which the decoder downsamples by area averaging.
    pub max_pixels: u64,
}

impl Default for VectorizeOptions {
    fn default() -> Self {
        Self {
            colors: 8,
            mode: VectorizeMode::Logo,
            tolerance: 1.5,
            smoothness: 0.5,
            detail: 0.5,
            path_precision: 2,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

/// The documented default options, for callers merging user overrides.
pub fn default_options() -> VectorizeOptions {
    VectorizeOptions::default()
}

impl VectorizeOptions {
    /// Parse options from a flat JSON record. Missing fields take their defaults.
    pub fn from_json(json: &str) -> VectorizeResult<Self> {
        let options: Option<VectorizeOptions> = serde_json::from_str(json)
            .map_err(|e| VectorizeError::options("options", e.to_string()))?;
        let options = options
            .ok_or_else(|| VectorizeError::options("options", "expected an object, got null"))?;
        options.validate()?;
        Ok(options)
    }

    /// Serialize to the same flat JSON record accepted by [`Self::from_json`].
    pub fn to_json(&self) -> VectorizeResult<String> {
        serde_json::to_string(self).map_err(|e| VectorizeError::Internal(e.to_string()))
    }

    pub fn with_colors(mut self, colors: u8) -> Self {
        self.colors = colors;
        self
    }

    pub fn with_mode(mut self, mode: VectorizeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_smoothness(mut self, smoothness: f32) -> Self {
        self.smoothness = smoothness;
        self
    }

    pub fn with_detail(mut self, detail: f32) -> Self {
        self.detail = detail;
        self
    }

    pub fn with_path_precision(mut self, path_precision: u8) -> Self {
        self.path_precision = path_precision;
        self
    }

    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    /// Check every field against its documented bounds.
    pub fn validate(&self) -> VectorizeResult<()> {
        if !(MIN_COLORS..=MAX_COLORS).contains(&self.colors) {
            return Err(VectorizeError::options(
                "colors",
                format!(
                    "must be between {MIN_COLORS} and {MAX_COLORS}, got {}",
                    self.colors
                ),
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 || self.tolerance > MAX_TOLERANCE
        {
            return Err(VectorizeError::options(
                "tolerance",
                format!(
                    "must be greater than 0 and at most {MAX_TOLERANCE}, got {}",
                    self.tolerance
                ),
            ));
        }
        check_unit_interval("smoothness", self.smoothness)?;
        check_unit_interval("detail", self.detail)?;
        if self.path_precision > MAX_PATH_PRECISION {
            return Err(VectorizeError::options(
                "pathPrecision",
                format!(
                    "must be at most {MAX_PATH_PRECISION}, got {}",
                    self.path_precision
                ),
            ));
        }
        if self.max_pixels == 0 {
            return Err(VectorizeError::options("maxPixels", "must be at least 1"));
        }
        Ok(())
    }

    /// Resolve the mode profile and user values into the numbers the stages consume.
    pub fn derived(&self) -> DerivedParams {
        let profile = self.mode.profile();
        let detail = self.detail as f64;
        let speckle = profile.speckle_area as f64;
        DerivedParams {
            min_region_area: 1 + ((1.0 - detail) * speckle).round() as usize,
            tolerance: self.tolerance as f64 * profile.tolerance_scale as f64 * (1.5 - detail),
            smoothness: (self.smoothness * profile.smoothness_scale) as f64,
            refine: profile.refine,
        }
    }
}

fn check_unit_interval(field: &'static str, value: f32) -> VectorizeResult<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(VectorizeError::options(
            field,
            format!("must be between 0.0 and 1.0, got {value}"),
        ))
    }
}

/// Stage parameters derived from [`VectorizeOptions`] and the mode profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedParams {
    /// Regions with fewer pixels are dropped; holes with fewer pixels are not cut out.
    pub min_region_area: usize,
    /// RDP tolerance in pixels. Zero removes collinear points only.
    pub tolerance: f64,
    /// Blend between straight chords (0) and fitted curves (1).
    pub smoothness: f64,
    /// Whether boundary refinement runs.
    pub refine: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    mod unit {
        use super::*;

        #[test]
        fn defaults_match_documentation() {
            let opts = default_options();
            assert_eq!(opts.colors, 8);
            assert_eq!(opts.detail, 0.5);
            assert_eq!(opts.smoothness, 0.5);
            assert_eq!(opts.tolerance, 1.5);
            assert_eq!(opts.mode, VectorizeMode::Logo);
            assert!(opts.validate().is_ok());
        }

        #[test]
        fn colors_out_of_range_rejected() {
            for colors in [0, 1, 65, 100] {
                let err = default_options().with_colors(colors).validate().unwrap_err();
                match err {
                    VectorizeError::Options { field, .. } => assert_eq!(field, "colors"),
                    other => panic!("unexpected error: {other:?}"),
                }
            }
            assert!(default_options().with_colors(2).validate().is_ok());
            assert!(default_options().with_colors(64).validate().is_ok());
        }

        #[test]
        fn non_finite_values_rejected() {
            assert!(default_options().with_tolerance(f32::NAN).validate().is_err());
            assert!(default_options().with_tolerance(0.0).validate().is_err());
            assert!(default_options().with_smoothness(f32::INFINITY).validate().is_err());
            assert!(default_options().with_detail(-0.1).validate().is_err());
            assert!(default_options().with_detail(1.01).validate().is_err());
        }

        #[test]
        fn precision_and_pixels_bounds() {
            assert!(default_options().with_path_precision(7).validate().is_err());
            assert!(default_options().with_max_pixels(0).validate().is_err());
        }

        #[test]
        fn json_uses_defaults_for_missing_fields() {
            let opts = VectorizeOptions::from_json(r#"{"colors": 4, "mode": "poster"}"#).unwrap();
            assert_eq!(opts.colors, 4);
            assert_eq!(opts.mode, VectorizeMode::Poster);
            assert_eq!(opts.tolerance, 1.5);
        }

        #[test]
        fn json_accepts_long_field_names() {
            let opts = VectorizeOptions::from_json(
                r#"{"maxColors": 3, "simplificationTolerance": 0.75, "mode": "pixelArt"}"#,
            )
            .unwrap();
            assert_eq!(opts.colors, 3);
            assert_eq!(opts.tolerance, 0.75);
            assert_eq!(opts.mode, VectorizeMode::PixelArt);
        }

        #[test]
        fn json_null_and_garbage_are_options_errors() {
            for input in ["null", "{", "[1,2]", r#"{"colours": 3}"#] {
                let err = VectorizeOptions::from_json(input).unwrap_err();
                assert_eq!(err.kind(), ErrorKind::Options, "input {input}");
            }
        }

        #[test]
        fn json_out_of_range_rejected() {
            let err = VectorizeOptions::from_json(r#"{"colors": 100}"#).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Options);
        }

        #[test]
        fn json_round_trip_preserves_options() {
            let opts = default_options()
                .with_colors(12)
                .with_mode(VectorizeMode::PixelArt);
            let json = opts.to_json().unwrap();
            assert!(json.contains("\"pixel-art\""));
            assert_eq!(VectorizeOptions::from_json(&json).unwrap(), opts);
        }

        #[test]
        fn mode_from_str_aliases() {
            assert_eq!("LOGO".parse::<VectorizeMode>().unwrap(), VectorizeMode::Logo);
            assert_eq!("pixel".parse::<VectorizeMode>().unwrap(), VectorizeMode::PixelArt);
            assert!("photo".parse::<VectorizeMode>().is_err());
        }

        #[test]
        fn pixel_art_profile_disables_smoothing() {
            let derived = default_options()
                .with_mode(VectorizeMode::PixelArt)
                .derived();
            assert_eq!(derived.min_region_area, 1);
            assert_eq!(derived.tolerance, 0.0);
            assert_eq!(derived.smoothness, 0.0);
            assert!(!derived.refine);
        }

        #[test]
        fn detail_controls_speckle_area() {
            assert_eq!(default_options().with_detail(1.0).derived().min_region_area, 1);
            assert_eq!(default_options().with_detail(0.5).derived().min_region_area, 9);
            assert_eq!(default_options().with_detail(0.0).derived().min_region_area, 17);
        }
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// validate: every in-range combination is accepted
            #[test]
            fn in_range_values_validate(
                colors in MIN_COLORS..=MAX_COLORS,
                tolerance in 0.01f32..100.0,
                smoothness in 0.0f32..=1.0,
                detail in 0.0f32..=1.0,
            ) {
                let opts = default_options()
                    .with_colors(colors)
                    .with_tolerance(tolerance)
                    .with_smoothness(smoothness)
                    .with_detail(detail);
                prop_assert!(opts.validate().is_ok());
            }

            /// derived: higher detail never raises the minimum region area
            #[test]
            fn detail_monotonic(a in 0.0f32..=1.0, b in 0.0f32..=1.0) {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                let lo_area = default_options().with_detail(lo).derived().min_region_area;
                let hi_area = default_options().with_detail(hi).derived().min_region_area;
                prop_assert!(hi_area <= lo_area);
            }
        }
    }
}
