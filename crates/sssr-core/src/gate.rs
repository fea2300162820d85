//! Feasibility gate evaluated before any work is recorded.

use crate::config::SsrConfig;

/// What the host renderer can do this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    /// The camera renders with deferred shading, so G-buffers exist.
    pub deferred_shading: bool,
    pub motion_vectors: bool,
    pub compute: bool,
    pub texture_copy: bool,
}

impl HostCapabilities {
    /// A host that supports everything the effect needs.
    pub fn all() -> Self {
        Self {
            deferred_shading: true,
            motion_vectors: true,
            compute: true,
            texture_copy: true,
        }
    }
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self::all()
    }
}

/// Why a frame was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    ZeroIntensity,
    ZeroRayDistance,
    FullScreenFade,
    NotDeferred,
    NoMotionVectors,
    NoCompute,
    NoTextureCopy,
}

impl SkipReason {
    pub fn describe(self) -> &'static str {
        match self {
            SkipReason::Disabled => "effect disabled",
            SkipReason::ZeroIntensity => "intensity is zero",
            SkipReason::ZeroRayDistance => "ray distance is zero",
            SkipReason::FullScreenFade => "screen fade covers the whole screen",
            SkipReason::NotDeferred => "camera is not using deferred shading",
            SkipReason::NoMotionVectors => "host has no motion vectors",
            SkipReason::NoCompute => "host has no compute support",
            SkipReason::NoTextureCopy => "host cannot copy textures",
        }
    }
}

/// Returns the first failing condition, or `None` when the effect can run.
pub fn skip_reason(config: &SsrConfig, capabilities: &HostCapabilities) -> Option<SkipReason> {
    if !config.enabled {
        Some(SkipReason::Disabled)
    } else if config.intensity.is_nan() || config.intensity <= 0.0 {
        Some(SkipReason::ZeroIntensity)
    } else if config.ray_distance == 0 {
        Some(SkipReason::ZeroRayDistance)
    } else if config.screen_fade_size.is_nan() || config.screen_fade_size >= 1.0 {
        Some(SkipReason::FullScreenFade)
    } else if !capabilities.deferred_shading {
        Some(SkipReason::NotDeferred)
    } else if !capabilities.motion_vectors {
        Some(SkipReason::NoMotionVectors)
    } else if !capabilities.compute {
        Some(SkipReason::NoCompute)
    } else if !capabilities.texture_copy {
        Some(SkipReason::NoTextureCopy)
    } else {
        None
    }
}

pub fn is_enabled_and_supported(config: &SsrConfig, capabilities: &HostCapabilities) -> bool {
    skip_reason(config, capabilities).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intensity_is_skipped() {
        let config = SsrConfig::default();
        assert_eq!(
            skip_reason(&config, &HostCapabilities::all()),
            Some(SkipReason::ZeroIntensity)
        );
    }

    #[test]
    fn test_each_condition_gates() {
        let caps = HostCapabilities::all();
        let on = SsrConfig::new().with_intensity(1.0);
        assert!(is_enabled_and_supported(&on, &caps));

        assert_eq!(
            skip_reason(&on.clone().with_enabled(false), &caps),
            Some(SkipReason::Disabled)
        );
        assert_eq!(
            skip_reason(&on.clone().with_ray_distance(0), &caps),
            Some(SkipReason::ZeroRayDistance)
        );
        assert_eq!(
            skip_reason(&on.clone().with_screen_fade_size(1.0), &caps),
            Some(SkipReason::FullScreenFade)
        );

        let cases = [
            (
                HostCapabilities {
                    deferred_shading: false,
                    ..caps
                },
                SkipReason::NotDeferred,
            ),
            (
                HostCapabilities {
                    motion_vectors: false,
                    ..caps
                },
                SkipReason::NoMotionVectors,
            ),
            (HostCapabilities { compute: false, ..caps }, SkipReason::NoCompute),
            (
                HostCapabilities {
                    texture_copy: false,
                    ..caps
                },
                SkipReason::NoTextureCopy,
            ),
        ];
        for (caps, reason) in cases {
            assert_eq!(skip_reason(&on, &caps), Some(reason));
        }
    }
}
