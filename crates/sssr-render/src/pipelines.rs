//! Shader modules, bind group layouts and pipelines for every kernel and blit pass.
//!
//! Binding 0 is always the frame uniform buffer. The slots a pass reads follow
//! in [`Kernel::reads`] / [`BlitPass::reads`] order, then the storage outputs
//! of a kernel in [`Kernel::writes`] order.

use std::collections::HashMap;
use std::num::NonZeroU64;

use sssr_core::{BlitPass, FrameUniforms, Intermediate, Kernel, Slot};

use crate::error::{RenderError, RenderResult};

const COMMON: &str = include_str!("shaders/common.wgsl");
const FULLSCREEN: &str = include_str!("shaders/fullscreen.wgsl");

fn kernel_source(kernel: Kernel) -> &'static str {
    match kernel {
        Kernel::MinDepth => include_str!("shaders/min_depth.wgsl"),
        Kernel::GaussianDownsample => include_str!("shaders/gaussian_downsample.wgsl"),
        Kernel::Raycast => include_str!("shaders/raycast.wgsl"),
        Kernel::Resolve => include_str!("shaders/resolve.wgsl"),
        Kernel::Temporal => include_str!("shaders/temporal.wgsl"),
        Kernel::MedianBlur => include_str!("shaders/median_blur.wgsl"),
        Kernel::WideBlur => include_str!("shaders/wide_blur.wgsl"),
    }
}

fn blit_source(pass: BlitPass) -> &'static str {
    match pass {
        BlitPass::CopyDepth => include_str!("shaders/copy_depth.wgsl"),
        BlitPass::CostMap => include_str!("shaders/cost_map.wgsl"),
        BlitPass::RemoveCubemap => include_str!("shaders/remove_cubemap.wgsl"),
        BlitPass::Recursive => include_str!("shaders/recursive.wgsl"),
        BlitPass::Blit => include_str!("shaders/blit.wgsl"),
        BlitPass::Combine => include_str!("shaders/combine.wgsl"),
    }
}

/// Full WGSL of a blit pass: shared declarations, the full-screen triangle,
/// and for the composite the intermediate codes.
fn blit_module_source(pass: BlitPass) -> String {
    let constants = match pass {
        BlitPass::Combine => Intermediate::shader_constants(),
        _ => String::new(),
    };
    format!("{COMMON}\n{FULLSCREEN}\n{constants}{}", blit_source(pass))
}

/// Storage format of a kernel output; must match the WGSL declaration.
pub fn storage_format(kernel: Kernel, slot: Slot) -> wgpu::TextureFormat {
    match (kernel, slot) {
        (Kernel::Raycast, Slot::Hits) => wgpu::TextureFormat::Rgba32Float,
        (Kernel::Raycast, Slot::Mask) | (Kernel::MinDepth, _) => wgpu::TextureFormat::R32Float,
        _ => wgpu::TextureFormat::Rgba16Float,
    }
}

fn uniform_entry(visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(std::mem::size_of::<FrameUniforms>() as u64),
        },
        count: None,
    }
}

fn texture_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, format: wgpu::TextureFormat) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

/// Pipeline and layout of one compute kernel.
#[derive(Debug)]
pub struct KernelPipeline {
    pub layout: wgpu::BindGroupLayout,
    pub pipeline: wgpu::ComputePipeline,
}

#[derive(Debug)]
struct BlitProgram {
    layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    module: wgpu::ShaderModule,
}

/// All pipelines of the effect.
///
/// Compute pipelines are built up front. Blit pipelines depend on the target
/// format and are built on first use per format.
#[derive(Debug)]
pub struct SsrPipelines {
    kernels: HashMap<Kernel, KernelPipeline>,
    programs: HashMap<BlitPass, BlitProgram>,
    blits: HashMap<(BlitPass, wgpu::TextureFormat), wgpu::RenderPipeline>,
}

impl SsrPipelines {
    pub fn new(device: &wgpu::Device) -> Self {
        let mut kernels = HashMap::new();
        for kernel in Kernel::ALL {
            kernels.insert(kernel, Self::build_kernel(device, kernel));
        }
        let mut programs = HashMap::new();
        for pass in BlitPass::ALL {
            programs.insert(pass, Self::build_program(device, pass));
        }
        log::debug!(
            "built {} SSR compute pipelines and {} blit programs",
            kernels.len(),
            programs.len()
        );
        Self {
            kernels,
            programs,
            blits: HashMap::new(),
        }
    }

    fn build_kernel(device: &wgpu::Device, kernel: Kernel) -> KernelPipeline {
        let name = kernel.name();
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(format!("{COMMON}\n{}", kernel_source(kernel)).into()),
        });

        let stage = wgpu::ShaderStages::COMPUTE;
        let mut entries = vec![uniform_entry(stage)];
        let mut binding = 1;
        for _ in kernel.reads() {
            entries.push(texture_entry(binding, stage));
            binding += 1;
        }
        for slot in kernel.writes() {
            entries.push(storage_entry(binding, storage_format(kernel, *slot)));
            binding += 1;
        }
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(name),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(name),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(name),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });
        KernelPipeline { layout, pipeline }
    }

    fn build_program(device: &wgpu::Device, pass: BlitPass) -> BlitProgram {
        let name = pass.name();
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(blit_module_source(pass).into()),
        });

        let stage = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;
        let mut entries = vec![uniform_entry(stage)];
        for (i, _) in pass.reads().iter().enumerate() {
            entries.push(texture_entry(i as u32 + 1, wgpu::ShaderStages::FRAGMENT));
        }
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(name),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(name),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        BlitProgram {
            layout,
            pipeline_layout,
            module,
        }
    }

    pub fn kernel(&self, kernel: Kernel) -> RenderResult<&KernelPipeline> {
        self.kernels
            .get(&kernel)
            .ok_or(RenderError::MissingPipeline(kernel.name()))
    }

    pub fn blit_layout(&self, pass: BlitPass) -> RenderResult<&wgpu::BindGroupLayout> {
        self.programs
            .get(&pass)
            .map(|p| &p.layout)
            .ok_or(RenderError::MissingPipeline(pass.name()))
    }

    /// Builds the pipeline of `pass` for `format` unless it exists.
    pub fn prepare_blit(
        &mut self,
        device: &wgpu::Device,
        pass: BlitPass,
        format: wgpu::TextureFormat,
    ) -> RenderResult<()> {
        if self.blits.contains_key(&(pass, format)) {
            return Ok(());
        }
        let program = self
            .programs
            .get(&pass)
            .ok_or(RenderError::MissingPipeline(pass.name()))?;
        log::debug!("building {} pipeline for {format:?}", pass.name());
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(pass.name()),
            layout: Some(&program.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &program.module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &program.module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        self.blits.insert((pass, format), pipeline);
        Ok(())
    }

    pub fn blit(&self, pass: BlitPass, format: wgpu::TextureFormat) -> RenderResult<&wgpu::RenderPipeline> {
        self.blits
            .get(&(pass, format))
            .ok_or(RenderError::MissingPipeline(pass.name()))
    }
}
