//! Debug-view lookup table.

use crate::config::DebugPass;

/// Intermediate buffer a debug view writes to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intermediate {
    /// Fresnel-weighted reflection color.
    Reflection,
    /// Probe reflections the deferred pass already applied.
    Cubemap,
    /// Probe reflections replaced by screen-space reflections where confident.
    ReflectionAndCubemap,
    RaycastMask,
    /// Composite with probe reflections swapped for screen-space ones.
    CombineNoCubemap,
    RaycastHits,
    CostMap,
    /// Linear depth of pyramid level 0.
    Depth,
    Resolve,
}

impl Intermediate {
    pub const ALL: [Intermediate; 9] = [
        Intermediate::Reflection,
        Intermediate::Cubemap,
        Intermediate::ReflectionAndCubemap,
        Intermediate::RaycastMask,
        Intermediate::CombineNoCubemap,
        Intermediate::RaycastHits,
        Intermediate::CostMap,
        Intermediate::Depth,
        Intermediate::Resolve,
    ];

    /// Value the composite receives in its uniforms; 0 means "composite".
    pub fn code(self) -> u32 {
        match self {
            Intermediate::Reflection => 1,
            Intermediate::Cubemap => 2,
            Intermediate::ReflectionAndCubemap => 3,
            Intermediate::RaycastMask => 4,
            Intermediate::CombineNoCubemap => 5,
            Intermediate::RaycastHits => 6,
            Intermediate::CostMap => 7,
            Intermediate::Depth => 8,
            Intermediate::Resolve => 9,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.code() == code)
    }

    /// Name of the WGSL constant holding [`Intermediate::code`].
    pub fn shader_constant(self) -> &'static str {
        match self {
            Intermediate::Reflection => "SHOW_REFLECTION",
            Intermediate::Cubemap => "SHOW_CUBEMAP",
            Intermediate::ReflectionAndCubemap => "SHOW_REFLECTION_AND_CUBEMAP",
            Intermediate::RaycastMask => "SHOW_RAYCAST_MASK",
            Intermediate::CombineNoCubemap => "SHOW_COMBINE_NO_CUBEMAP",
            Intermediate::RaycastHits => "SHOW_RAYCAST_HITS",
            Intermediate::CostMap => "SHOW_COST_MAP",
            Intermediate::Depth => "SHOW_DEPTH",
            Intermediate::Resolve => "SHOW_RESOLVE",
        }
    }

    /// WGSL `const` declarations of every code, prepended to the composite shader.
    pub fn shader_constants() -> String {
        Self::ALL
            .iter()
            .map(|i| format!("const {}: u32 = {}u;\n", i.shader_constant(), i.code()))
            .collect()
    }
}

/// How one debug selector changes the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugView {
    /// Skips the normal composite and every cross-frame state update.
    pub bypasses_composite: bool,
    pub shows: Option<Intermediate>,
    /// The scratch buffer is filled with the scene minus probe reflections.
    pub strips_cubemap: bool,
}

const fn debug(shows: Intermediate) -> DebugView {
    DebugView {
        bypasses_composite: true,
        shows: Some(shows),
        strips_cubemap: true,
    }
}

/// Indexed by [`DebugPass::index`].
const DEBUG_VIEWS: [DebugView; 10] = [
    DebugView {
        bypasses_composite: false,
        shows: None,
        strips_cubemap: false,
    },
    debug(Intermediate::Reflection),
    debug(Intermediate::Cubemap),
    debug(Intermediate::ReflectionAndCubemap),
    debug(Intermediate::RaycastMask),
    debug(Intermediate::CombineNoCubemap),
    debug(Intermediate::RaycastHits),
    debug(Intermediate::CostMap),
    debug(Intermediate::Depth),
    debug(Intermediate::Resolve),
];

impl DebugPass {
    pub fn view(self) -> DebugView {
        DEBUG_VIEWS[self.index() as usize]
    }

    pub fn is_debug(self) -> bool {
        self.view().bypasses_composite
    }
}

impl DebugView {
    /// Composite selector written to the uniforms.
    pub fn shown_code(self) -> u32 {
        self.shows.map_or(0, Intermediate::code)
    }
}
