//! Drawing a [`Scene`] with wgpu.
//!
//! [`GpuRenderer`] is the [`RenderTarget`] of real previews. Scene geometry is
//! uploaded once per scene revision: each object's translation is baked into its
//! vertices and every part gets a bind group for its material. Camera and
//! lights are written every frame.
//!
//! The CPU side conversions ([`vertices_of`], [`LightsUniform::from_lights`],
//! [`MaterialUniform::from_material`]) are plain functions so they can be
//! checked without a GPU.

use std::{collections::HashMap, iter};

use cgmath::{InnerSpace, Vector3};
use wgpu::util::DeviceExt;

use crate::{
    camera::{Camera, CameraUniform, Projection},
    context::GpuContext,
    data_structures::{
        material::{Material, Side},
        scene::{Geometry, Light, MeshKind, Scene},
        texture::{self, Texture},
    },
    flow::RenderTarget,
    pipelines::basic::{self, ModelPipelines},
};

pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl GpuVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<GpuVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Vertices of `geometry` moved by `offset`.
///
/// Missing normals are left zero (the shader then shades faceted) and texture
/// coordinates are flipped vertically since OBJ counts `v` from the bottom.
pub fn vertices_of(geometry: &Geometry, offset: Vector3<f32>) -> Vec<GpuVertex> {
    geometry
        .positions
        .iter()
        .enumerate()
        .map(|(i, p)| GpuVertex {
            position: (Vector3::from(*p) + offset).into(),
            normal: geometry.normals.get(i).copied().unwrap_or([0.0; 3]),
            tex_coords: geometry
                .tex_coords
                .get(i)
                .map(|[u, v]| [*u, 1.0 - *v])
                .unwrap_or([0.0; 2]),
        })
        .collect()
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightsUniform {
    pub ambient: [f32; 4],
    pub directions: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    pub colors: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    pub count: [u32; 4],
}

impl LightsUniform {
    /// Ambient lights add up. Directional lights beyond the supported number,
    /// or placed on the origin, are left out.
    pub fn from_lights(lights: &[Light]) -> Self {
        let mut uniform = Self::zeroed();
        let mut count = 0usize;
        for light in lights {
            match *light {
                Light::Ambient { color } => {
                    for (sum, c) in uniform.ambient.iter_mut().zip(color.to_array()) {
                        *sum += c;
                    }
                }
                Light::Directional {
                    color,
                    intensity,
                    position,
                } => {
                    let direction = Vector3::from(position);
                    if count == MAX_DIRECTIONAL_LIGHTS || direction.magnitude2() == 0.0 {
                        log::debug!("directional light at {position:?} is not drawn");
                        continue;
                    }
                    let direction = direction.normalize();
                    let [r, g, b] = color.to_array();
                    uniform.directions[count] = [direction.x, direction.y, direction.z, 0.0];
                    uniform.colors[count] = [r * intensity, g * intensity, b * intensity, 1.0];
                    count += 1;
                }
            }
        }
        uniform.ambient[3] = 1.0;
        uniform.count[0] = count as u32;
        uniform
    }

    fn zeroed() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub flags: [u32; 4],
}

impl MaterialUniform {
    /// Parts without a material are drawn white and lit.
    pub fn from_material(material: Option<&Material>) -> Self {
        let fallback = Material::default();
        let m = material.unwrap_or(&fallback);
        let [ar, ag, ab] = m.ambient;
        let [dr, dg, db] = m.diffuse;
        let [sr, sg, sb] = m.specular;
        Self {
            ambient: [ar, ag, ab, 1.0],
            diffuse: [dr, dg, db, m.opacity],
            specular: [sr, sg, sb, m.shininess],
            flags: [m.lights as u32, m.diffuse_map.is_some() as u32, 0, 0],
        }
    }
}

#[derive(Debug)]
struct GpuMesh {
    kind: MeshKind,
    side: Side,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    material: wgpu::BindGroup,
}

#[derive(Debug)]
pub struct GpuRenderer {
    ctx: GpuContext,
    pipelines: ModelPipelines,
    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    lights_buffer: wgpu::Buffer,
    lights_bind_group: wgpu::BindGroup,
    material_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    white: Texture,
    meshes: Vec<GpuMesh>,
    uploaded_revision: Option<u64>,
}

impl GpuRenderer {
    pub fn new(ctx: GpuContext) -> Self {
        let device = &ctx.device;
        let camera_layout = basic::camera_layout(device);
        let lights_layout = basic::lights_layout(device);
        let material_layout = basic::material_layout(device);

        let camera_uniform = CameraUniform::default();
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        let lights_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lights Buffer"),
            contents: bytemuck::cast_slice(&[LightsUniform::from_lights(&[])]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let lights_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &lights_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: lights_buffer.as_entire_binding(),
            }],
            label: Some("lights_bind_group"),
        });

        let pipelines = ModelPipelines::new(
            device,
            ctx.config.format,
            &camera_layout,
            &lights_layout,
            &material_layout,
        );
        let sampler = texture::create_default_sampler(device);
        let white = Texture::create_solid([255; 4], device, &ctx.queue, "white");

        Self {
            pipelines,
            camera_uniform,
            camera_buffer,
            camera_bind_group,
            lights_buffer,
            lights_bind_group,
            material_layout,
            sampler,
            white,
            meshes: Vec::new(),
            uploaded_revision: None,
            ctx,
        }
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    fn upload(&mut self, scene: &Scene) {
        let mut textures: HashMap<String, Texture> = HashMap::new();
        let mut meshes = Vec::new();
        for object in scene.objects() {
            for part in &object.children {
                if part.geometry.is_empty() || part.geometry.indices.is_empty() {
                    continue;
                }
                let vertices = vertices_of(&part.geometry, object.position);
                let vertex_buffer = self.ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{:?} Vertex Buffer", part.name)),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let index_buffer = self.ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{:?} Index Buffer", part.name)),
                    contents: bytemuck::cast_slice(&part.geometry.indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
                let material = self.material_bind_group(part.material.as_ref(), &mut textures);
                meshes.push(GpuMesh {
                    kind: part.kind,
                    side: part.material.as_ref().map(|m| m.side).unwrap_or_default(),
                    vertex_buffer,
                    index_buffer,
                    index_count: part.geometry.indices.len() as u32,
                    material,
                });
            }
        }
        log::debug!(
            "uploaded {} meshes and {} textures for scene revision {}",
            meshes.len(),
            textures.len(),
            scene.revision()
        );
        self.meshes = meshes;
        self.uploaded_revision = Some(scene.revision());
    }

    fn material_bind_group(&self, material: Option<&Material>, textures: &mut HashMap<String, Texture>) -> wgpu::BindGroup {
        let uniform = MaterialUniform::from_material(material);
        let buffer = self.ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Material Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let map = material
            .and_then(|m| m.diffuse_map.as_ref())
            .and_then(|map| Some((map.url(), map.pixels.as_ref()?)));
        let view = match map {
            Some((url, pixels)) => {
                &textures
                    .entry(url.to_string())
                    .or_insert_with(|| Texture::from_rgba(&self.ctx.device, &self.ctx.queue, pixels, Some(url)))
                    .view
            }
            None => &self.white.view,
        };

        self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffer.as_entire_binding(),
                },
            ],
            label: Some("material_bind_group"),
        })
    }
}

impl RenderTarget for GpuRenderer {
    fn surface_size(&self) -> (u32, u32) {
        self.ctx.size()
    }

    fn set_surface_size(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
    }

    fn draw(&mut self, scene: &Scene, camera: &Camera, projection: &Projection) {
        if self.uploaded_revision != Some(scene.revision()) {
            self.upload(scene);
        }
        self.camera_uniform.update_view_proj(camera, projection);
        self.ctx
            .queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[self.camera_uniform]));
        self.ctx.queue.write_buffer(
            &self.lights_buffer,
            0,
            bytemuck::cast_slice(&[LightsUniform::from_lights(&scene.lights)]),
        );

        let output = match self.ctx.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(output) | wgpu::CurrentSurfaceTexture::Suboptimal(output) => output,
            // Reconfigure the surface if it's lost or outdated
            wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                self.ctx.reconfigure();
                return;
            }
            e => {
                log::error!("Unable to render {:?}", e);
                return;
            }
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(scene.background.into()),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
            render_pass.set_bind_group(1, &self.lights_bind_group, &[]);
            for mesh in &self.meshes {
                let pipeline = match mesh.kind {
                    MeshKind::Triangles => self.pipelines.triangles(mesh.side),
                    MeshKind::LineSegments => &self.pipelines.lines,
                };
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(2, &mesh.material, &[]);
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }
        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
    }
}
