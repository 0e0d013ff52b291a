use gfx_hal::{format as f, pass::Subpass, prelude::*, pso, Backend};
use std::iter;
use std::ops::Range;

use crate::error::{Error, Result};
use crate::renderer::shader::ShaderStage;
use crate::renderer::vertex::VertexLayout;

const ENTRY_NAME: &str = "main";

pub struct Pipeline<B: Backend> {
    pub(super) pipeline: B::GraphicsPipeline,
    pipeline_layout: B::PipelineLayout,
}

impl<B: Backend> Pipeline<B> {
    pub fn new(
        device: &B::Device,
        vs_spirv: &[u32],
        fs_spirv: &[u32],
        render_pass: &B::RenderPass,
        layout: &VertexLayout,
    ) -> Result<Self> {
        let attributes = Self::attributes(layout)?;

        let pipeline_layout = unsafe {
            device.create_pipeline_layout(
                iter::empty::<B::DescriptorSetLayout>(),
                iter::empty::<(pso::ShaderStageFlags, Range<u32>)>(),
            )
        }
        .map_err(|err| Error::ProgramLink(format!("cannot create pipeline layout: {:?}", err)))?;

        let pipeline = Self::load_modules(device, vs_spirv, fs_spirv).and_then(
            |(vs_module, fs_module)| {
                let pipeline = Self::link(
                    device,
                    &vs_module,
                    &fs_module,
                    render_pass,
                    &pipeline_layout,
                    layout.stride,
                    attributes,
                );
                unsafe {
                    device.destroy_shader_module(vs_module);
                    device.destroy_shader_module(fs_module);
                }
                pipeline
            },
        );

        match pipeline {
            Ok(pipeline) => Ok(Pipeline {
                pipeline,
                pipeline_layout,
            }),
            Err(err) => {
                unsafe { device.destroy_pipeline_layout(pipeline_layout) };
                Err(err)
            }
        }
    }

    fn attributes(layout: &VertexLayout) -> Result<Vec<pso::AttributeDesc>> {
        layout
            .attributes
            .iter()
            .map(|attribute| {
                let format = match attribute.components {
                    1 => f::Format::R32Sfloat,
                    2 => f::Format::Rg32Sfloat,
                    3 => f::Format::Rgb32Sfloat,
                    4 => f::Format::Rgba32Sfloat,
                    n => {
                        return Err(Error::UnsupportedLayout(format!(
                            "location {} has {} components",
                            attribute.location, n
                        )))
                    }
                };
                Ok(pso::AttributeDesc {
                    location: attribute.location,
                    binding: 0,
                    element: pso::Element {
                        format,
                        offset: attribute.offset,
                    },
                })
            })
            .collect()
    }

    fn load_modules(
        device: &B::Device,
        vs_spirv: &[u32],
        fs_spirv: &[u32],
    ) -> Result<(B::ShaderModule, B::ShaderModule)> {
        let vs_module = unsafe { device.create_shader_module(vs_spirv) }.map_err(|err| {
            Error::ShaderCompilation {
                stage: ShaderStage::Vertex,
                log: format!("{:?}", err),
            }
        })?;
        match unsafe { device.create_shader_module(fs_spirv) } {
            Ok(fs_module) => Ok((vs_module, fs_module)),
            Err(err) => {
                unsafe { device.destroy_shader_module(vs_module) };
                Err(Error::ShaderCompilation {
                    stage: ShaderStage::Fragment,
                    log: format!("{:?}", err),
                })
            }
        }
    }

    fn link(
        device: &B::Device,
        vs_module: &B::ShaderModule,
        fs_module: &B::ShaderModule,
        render_pass: &B::RenderPass,
        pipeline_layout: &B::PipelineLayout,
        stride: u32,
        attributes: Vec<pso::AttributeDesc>,
    ) -> Result<B::GraphicsPipeline> {
        let shader_entries = pso::GraphicsShaderSet {
            vertex: pso::EntryPoint {
                entry: ENTRY_NAME,
                module: vs_module,
                specialization: pso::Specialization::default(),
            },
            hull: None,
            domain: None,
            geometry: None,
            fragment: Some(pso::EntryPoint {
                entry: ENTRY_NAME,
                module: fs_module,
                specialization: pso::Specialization::default(),
            }),
        };

        let subpass = Subpass {
            index: 0,
            main_pass: render_pass,
        };

        let mut pipeline_desc = pso::GraphicsPipelineDesc::new(
            shader_entries,
            pso::Primitive::TriangleList,
            pso::Rasterizer::FILL,
            pipeline_layout,
            subpass,
        );
        pipeline_desc.blender.targets.push(pso::ColorBlendDesc {
            mask: pso::ColorMask::ALL,
            blend: Some(pso::BlendState::ALPHA),
        });
        pipeline_desc.vertex_buffers.push(pso::VertexBufferDesc {
            binding: 0,
            stride,
            rate: pso::VertexInputRate::Vertex,
        });
        pipeline_desc.attributes = attributes;

        unsafe { device.create_graphics_pipeline(&pipeline_desc, None) }
            .map_err(|err| Error::ProgramLink(format!("{:?}", err)))
    }

    pub fn destroy(self, device: &B::Device) {
        unsafe {
            device.destroy_graphics_pipeline(self.pipeline);
            device.destroy_pipeline_layout(self.pipeline_layout);
        }
    }
}
