//! Per-frame parameter snapshot.

use crate::config::{DebugPass, SsrConfig, MAX_RAY_DISTANCE};

/// Boolean quality switches of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityFlags {
    pub raycast_downsample: bool,
    pub resolve_downsample: bool,
    pub use_mip_map: bool,
    pub normalization: bool,
    pub blurring: bool,
    pub high_quality_blur: bool,
    pub use_temporal: bool,
    pub multiple_bounces: bool,
    pub use_fresnel: bool,
}

/// Immutable snapshot of the effect settings used for one frame.
///
/// Every value is inside its documented range, whatever the configuration
/// held: ranges are clamped and an inverted temporal band has its maximum
/// raised to the minimum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParameters {
    pub intensity: f32,
    pub ray_distance: u32,
    pub thickness: f32,
    pub screen_fade_size: f32,
    pub brdf_bias: f32,
    pub temporal_response_min: f32,
    pub temporal_response_max: f32,
    pub smoothness_range: f32,
    pub flags: QualityFlags,
    pub debug_pass: DebugPass,
}

fn unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl FrameParameters {
    /// Builds the sanitized snapshot for a configuration.
    pub fn from_config(config: &SsrConfig) -> Self {
        let temporal_response_min = unit(config.temporal_response_min);
        let temporal_response_max = unit(config.temporal_response_max).max(temporal_response_min);
        let thickness = if config.thickness.is_finite() {
            config.thickness.max(0.0)
        } else {
            0.0
        };
        let screen_fade_size = if config.screen_fade_size.is_nan() {
            0.0
        } else {
            // Values at or above 1 fail the gate; keep them so it can see them.
            config.screen_fade_size.max(0.0)
        };

        Self {
            intensity: unit(config.intensity),
            ray_distance: config.ray_distance.min(MAX_RAY_DISTANCE),
            thickness,
            screen_fade_size,
            brdf_bias: unit(config.brdf_bias),
            temporal_response_min,
            temporal_response_max,
            smoothness_range: unit(config.smoothness_range),
            flags: QualityFlags {
                raycast_downsample: config.raycast_downsample,
                resolve_downsample: config.resolve_downsample,
                use_mip_map: config.use_mip_map,
                normalization: config.normalization,
                blurring: config.blurring,
                high_quality_blur: config.high_quality_blur,
                use_temporal: config.use_temporal,
                multiple_bounces: config.multiple_bounces,
                use_fresnel: config.use_fresnel,
            },
            debug_pass: config.debug_pass,
        }
    }

    /// Names of the fields whose values were changed by sanitizing.
    pub fn sanitized_fields(&self, config: &SsrConfig) -> Vec<&'static str> {
        let mut fields = Vec::new();
        let pairs = [
            ("intensity", self.intensity, config.intensity),
            ("thickness", self.thickness, config.thickness),
            ("screen_fade_size", self.screen_fade_size, config.screen_fade_size),
            ("brdf_bias", self.brdf_bias, config.brdf_bias),
            (
                "temporal_response_min",
                self.temporal_response_min,
                config.temporal_response_min,
            ),
            (
                "temporal_response_max",
                self.temporal_response_max,
                config.temporal_response_max,
            ),
            ("smoothness_range", self.smoothness_range, config.smoothness_range),
        ];
        for (name, sanitized, raw) in pairs {
            if sanitized.to_bits() != raw.to_bits() {
                fields.push(name);
            }
        }
        if self.ray_distance != config.ray_distance {
            fields.push("ray_distance");
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_pass_through() {
        let config = SsrConfig::default();
        let params = FrameParameters::from_config(&config);
        assert_eq!(params.ray_distance, 70);
        assert_eq!(params.temporal_response_min, 0.85);
        assert!(params.flags.use_temporal);
        assert!(params.sanitized_fields(&config).is_empty());
    }

    #[test]
    fn test_inverted_band_raises_max() {
        let config = SsrConfig::new().with_temporal_response(0.9, 0.4);
        let params = FrameParameters::from_config(&config);
        assert_eq!(params.temporal_response_min, 0.9);
        assert_eq!(params.temporal_response_max, 0.9);
        assert_eq!(params.sanitized_fields(&config), vec!["temporal_response_max"]);
    }

    #[test]
    fn test_ranges_are_clamped() {
        let config = SsrConfig::new()
            .with_intensity(3.0)
            .with_ray_distance(500)
            .with_thickness(-1.0)
            .with_brdf_bias(f32::NAN);
        let params = FrameParameters::from_config(&config);
        assert_eq!(params.intensity, 1.0);
        assert_eq!(params.ray_distance, MAX_RAY_DISTANCE);
        assert_eq!(params.thickness, 0.0);
        assert_eq!(params.brdf_bias, 0.0);
        let fields = params.sanitized_fields(&config);
        assert!(fields.contains(&"intensity"));
        assert!(fields.contains(&"ray_distance"));
        assert!(fields.contains(&"thickness"));
        assert!(fields.contains(&"brdf_bias"));
    }
}
