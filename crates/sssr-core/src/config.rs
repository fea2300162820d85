//! Stochastic reflection configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SsrError};

/// Which buffer the effect writes to the destination.
///
/// `Combine` is the normal composite. Every other variant shows an
/// intermediate buffer and leaves the cross-frame state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DebugPass {
    #[default]
    Combine,
    Reflection,
    Cubemap,
    ReflectionAndCubemap,
    SsrMask,
    CombineNoCubemap,
    RayCast,
    CostMap,
    Depth,
    Resolve,
}

impl DebugPass {
    /// All variants, in selector order.
    pub const ALL: [DebugPass; 10] = [
        DebugPass::Combine,
        DebugPass::Reflection,
        DebugPass::Cubemap,
        DebugPass::ReflectionAndCubemap,
        DebugPass::SsrMask,
        DebugPass::CombineNoCubemap,
        DebugPass::RayCast,
        DebugPass::CostMap,
        DebugPass::Depth,
        DebugPass::Resolve,
    ];

    /// Numeric selector passed to the composite kernel.
    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            DebugPass::Combine => "Combine",
            DebugPass::Reflection => "Reflection",
            DebugPass::Cubemap => "Cubemap",
            DebugPass::ReflectionAndCubemap => "ReflectionAndCubemap",
            DebugPass::SsrMask => "SSRMask",
            DebugPass::CombineNoCubemap => "CombineNoCubemap",
            DebugPass::RayCast => "RayCast",
            DebugPass::CostMap => "CostMap",
            DebugPass::Depth => "Depth",
            DebugPass::Resolve => "Resolve",
        }
    }
}

/// Settings for one stochastic reflection effect instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsrConfig {
    /// Whether the effect runs at all.
    pub enabled: bool,
    /// Blend strength of the reflections over the scene, in [0, 1].
    pub intensity: f32,
    /// Ray march step budget, 0..=100.
    pub ray_distance: u32,
    /// Depth tolerance for accepting a hit, in view-space units.
    pub thickness: f32,
    /// Width of the screen-edge fade, in [0, 1).
    pub screen_fade_size: f32,
    /// Apply Schlick Fresnel when compositing.
    pub use_fresnel: bool,
    /// Bias of the GGX sample toward the mirror direction, in [0, 1].
    pub brdf_bias: f32,
    /// Sample a pre-filtered color pyramid in the resolve.
    pub use_mip_map: bool,
    /// Divide resolved color by the accumulated weight instead of the sample count.
    pub normalization: bool,
    /// Denoise the reflection buffer before compositing.
    pub blurring: bool,
    /// Use the wide depth-aware blur instead of the median.
    pub high_quality_blur: bool,
    /// Accumulate reflections over time.
    pub use_temporal: bool,
    /// Feed the previous composite back in as the reflected color.
    pub multiple_bounces: bool,
    /// Temporal blend factor used at high velocity.
    pub temporal_response_min: f32,
    /// Temporal blend factor used for a static view.
    pub temporal_response_max: f32,
    /// Pixels with roughness above this value are not traced, in [0, 1].
    pub smoothness_range: f32,
    /// Buffer shown in the destination.
    pub debug_pass: DebugPass,
    /// Trace rays at half resolution.
    pub raycast_downsample: bool,
    /// Resolve at half resolution.
    pub resolve_downsample: bool,
}

impl Default for SsrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: 0.0,
            ray_distance: 70,
            thickness: 0.2,
            screen_fade_size: 0.25,
            use_fresnel: true,
            brdf_bias: 0.7,
            use_mip_map: true,
            normalization: true,
            blurring: true,
            high_quality_blur: true,
            use_temporal: true,
            multiple_bounces: true,
            temporal_response_min: 0.85,
            temporal_response_max: 1.0,
            smoothness_range: 1.0,
            debug_pass: DebugPass::Combine,
            raycast_downsample: false,
            resolve_downsample: false,
        }
    }
}

/// Largest accepted step budget.
pub const MAX_RAY_DISTANCE: u32 = 100;

fn check_unit(field: &'static str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SsrError::InvalidConfig {
            field,
            reason: format!("must be in [0, 1], got {value}"),
        })
    }
}

impl SsrConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    pub fn with_ray_distance(mut self, ray_distance: u32) -> Self {
        self.ray_distance = ray_distance;
        self
    }

    pub fn with_thickness(mut self, thickness: f32) -> Self {
        self.thickness = thickness;
        self
    }

    pub fn with_screen_fade_size(mut self, screen_fade_size: f32) -> Self {
        self.screen_fade_size = screen_fade_size;
        self
    }

    pub fn with_fresnel(mut self, use_fresnel: bool) -> Self {
        self.use_fresnel = use_fresnel;
        self
    }

    pub fn with_brdf_bias(mut self, brdf_bias: f32) -> Self {
        self.brdf_bias = brdf_bias;
        self
    }

    pub fn with_mip_map(mut self, use_mip_map: bool) -> Self {
        self.use_mip_map = use_mip_map;
        self
    }

    pub fn with_normalization(mut self, normalization: bool) -> Self {
        self.normalization = normalization;
        self
    }

    /// Sets whether and how the reflection buffer is blurred.
    pub fn with_blur(mut self, blurring: bool, high_quality: bool) -> Self {
        self.blurring = blurring;
        self.high_quality_blur = high_quality;
        self
    }

    pub fn with_temporal(mut self, use_temporal: bool) -> Self {
        self.use_temporal = use_temporal;
        self
    }

    /// Sets the temporal response band.
    pub fn with_temporal_response(mut self, min: f32, max: f32) -> Self {
        self.temporal_response_min = min;
        self.temporal_response_max = max;
        self
    }

    pub fn with_multiple_bounces(mut self, multiple_bounces: bool) -> Self {
        self.multiple_bounces = multiple_bounces;
        self
    }

    pub fn with_smoothness_range(mut self, smoothness_range: f32) -> Self {
        self.smoothness_range = smoothness_range;
        self
    }

    pub fn with_debug_pass(mut self, debug_pass: DebugPass) -> Self {
        self.debug_pass = debug_pass;
        self
    }

    /// Sets the raycast and resolve downsample flags.
    pub fn with_downsample(mut self, raycast: bool, resolve: bool) -> Self {
        self.raycast_downsample = raycast;
        self.resolve_downsample = resolve;
        self
    }

    /// Checks every value against its documented range.
    pub fn validate(&self) -> Result<()> {
        check_unit("intensity", self.intensity)?;
        check_unit("brdf_bias", self.brdf_bias)?;
        check_unit("temporal_response_min", self.temporal_response_min)?;
        check_unit("temporal_response_max", self.temporal_response_max)?;
        check_unit("smoothness_range", self.smoothness_range)?;

        if self.ray_distance > MAX_RAY_DISTANCE {
            return Err(SsrError::InvalidConfig {
                field: "ray_distance",
                reason: format!(
                    "must be at most {MAX_RAY_DISTANCE}, got {}",
                    self.ray_distance
                ),
            });
        }
        if !self.thickness.is_finite() || self.thickness < 0.0 {
            return Err(SsrError::InvalidConfig {
                field: "thickness",
                reason: format!("must be finite and non-negative, got {}", self.thickness),
            });
        }
        if !(0.0..1.0).contains(&self.screen_fade_size) {
            return Err(SsrError::InvalidConfig {
                field: "screen_fade_size",
                reason: format!("must be in [0, 1), got {}", self.screen_fade_size),
            });
        }
        if self.temporal_response_min > self.temporal_response_max {
            return Err(SsrError::InvalidConfig {
                field: "temporal_response_min",
                reason: format!(
                    "must not exceed temporal_response_max ({} > {})",
                    self.temporal_response_min, self.temporal_response_max
                ),
            });
        }
        Ok(())
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
