//! Meshlet 光栅化内核
//!
//! 每个幸存的 (实例, 簇) 对应一个绘制实例，统一分配固定的顶点预算
//! （单簇三角形上限 × 3）。本地顶点索引超出 meshlet 实际三角形数的
//! 线程输出 w=0 的位置被裁剪，使一次固定大小的绘制可以覆盖任意大小
//! 的 meshlet，无需逐 meshlet 的间接计数。
//!
//! 顶点获取经过双重间接：本地索引 → 三角形索引池 → 顶点索引池 →
//! 顶点属性池。

use crate::resources::MeshBuffers;
use crate::uniforms::FrameUniforms;

/// 渲染目标配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetConfig {
    /// 颜色附件格式
    pub color_format: wgpu::TextureFormat,
    /// 深度附件格式
    pub depth_format: wgpu::TextureFormat,
    /// 反向 Z：深度比较用 Greater，清除值 0
    pub reverse_z: bool,
}

impl Default for RenderTargetConfig {
    fn default() -> Self {
        Self {
            color_format: wgpu::TextureFormat::Rgba16Float,
            depth_format: wgpu::TextureFormat::Depth24Plus,
            reverse_z: true,
        }
    }
}

impl RenderTargetConfig {
    /// 本配置下的深度清除值
    pub fn depth_clear_value(&self) -> f32 {
        if self.reverse_z {
            0.0
        } else {
            1.0
        }
    }
}

/// Meshlet 光栅化内核
///
/// 间接变体从剔除输出的可见簇列表取簇，直接变体把同一条管线绑定到
/// 预生成的每层级静态候选列表上。
pub struct ClusterRenderKernel {
    pipeline: wgpu::RenderPipeline,
    frame_layout: wgpu::BindGroupLayout,
    mesh_layout: wgpu::BindGroupLayout,
    clusters_layout: wgpu::BindGroupLayout,
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl ClusterRenderKernel {
    /// 创建光栅化内核
    ///
    /// `vertex_stride_floats` 与 `max_cluster_triangles` 经管线覆盖
    /// 常量进入着色器，因此内核与已加载的网格绑定（换网格需重建）。
    pub fn new(
        device: &wgpu::Device,
        target: &RenderTargetConfig,
        vertex_stride_floats: u32,
        max_cluster_triangles: u32,
    ) -> Self {
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Cluster Render Frame BGL"),
            entries: &[uniform_entry(0), uniform_entry(1)],
        });
        let mesh_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Cluster Render Mesh BGL"),
            entries: &[
                storage_entry(0),
                storage_entry(1),
                storage_entry(2),
                storage_entry(3),
                storage_entry(4),
            ],
        });
        let clusters_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Cluster Render Clusters BGL"),
            entries: &[storage_entry(0)],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Cluster Render Shader"),
            source: wgpu::ShaderSource::Wgsl(RENDER_CLUSTERS_SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Cluster Render Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &mesh_layout, &clusters_layout],
            push_constant_ranges: &[],
        });

        let constants = std::collections::HashMap::from([
            (
                "VERTEX_STRIDE_FLOATS".to_owned(),
                vertex_stride_floats as f64,
            ),
            (
                "MAX_TRIANGLES_PER_CLUSTER".to_owned(),
                max_cluster_triangles as f64,
            ),
        ]);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Cluster Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vertex",
                compilation_options: wgpu::PipelineCompilationOptions {
                    constants: &constants,
                    zero_initialize_workgroup_memory: false,
                },
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: target.depth_format,
                depth_write_enabled: true,
                depth_compare: if target.reverse_z {
                    wgpu::CompareFunction::Greater
                } else {
                    wgpu::CompareFunction::Less
                },
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fragment",
                compilation_options: wgpu::PipelineCompilationOptions {
                    constants: &constants,
                    zero_initialize_workgroup_memory: false,
                },
                targets: &[Some(wgpu::ColorTargetState {
                    format: target.color_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
        });

        Self {
            pipeline,
            frame_layout,
            mesh_layout,
            clusters_layout,
        }
    }

    /// 渲染管线
    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    /// 创建每帧 Uniform 绑定组
    pub fn frame_bind_group(
        &self,
        device: &wgpu::Device,
        frame: &FrameUniforms,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cluster Render Frame BG"),
            layout: &self.frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame.render_camera_buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: frame.settings_buffer().as_entire_binding(),
                },
            ],
        })
    }

    /// 创建网格与实例池绑定组
    pub fn mesh_bind_group(&self, device: &wgpu::Device, mesh: &MeshBuffers) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cluster Render Mesh BG"),
            layout: &self.mesh_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: mesh.instances.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: mesh.meshlets.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: mesh.meshlet_vertices.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: mesh.meshlet_triangles.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: mesh.vertices.as_entire_binding(),
                },
            ],
        })
    }

    /// 为一个簇列表（可见簇或静态 LOD 候选）创建绑定组
    pub fn clusters_bind_group(
        &self,
        device: &wgpu::Device,
        clusters: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cluster Render Clusters BG"),
            layout: &self.clusters_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: clusters.as_entire_binding(),
            }],
        })
    }
}

/// 把 (簇索引, 三角形索引) 打包成唯一标识（与着色器一致）
///
/// 三角形索引严格小于单簇三角形数上限，不同簇的标识区间互不重叠。
pub fn pack_cluster_triangle_id(
    cluster_index: u32,
    triangle_index: u32,
    max_cluster_triangles: u32,
) -> u32 {
    cluster_index * max_cluster_triangles + triangle_index
}

/// 从打包标识拆出 (簇索引, 三角形索引)
pub fn unpack_cluster_triangle_id(id: u32, max_cluster_triangles: u32) -> (u32, u32) {
    (id / max_cluster_triangles, id % max_cluster_triangles)
}

/// Meshlet 光栅化着色器
const RENDER_CLUSTERS_SHADER: &str = r#"
override VERTEX_STRIDE_FLOATS: u32 = 3u;
override MAX_TRIANGLES_PER_CLUSTER: u32 = 128u;

struct Camera {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
}

struct RenderSettings {
    mode: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
}

struct Instance {
    model: mat4x4<f32>,
}

struct ClusterInstance {
    instance_index: u32,
    cluster_index: u32,
}

struct Meshlet {
    vertex_offset: u32,
    triangle_offset: u32,
    vertex_count: u32,
    triangle_count: u32,
}

@group(0) @binding(0) var<uniform> camera: Camera;
@group(0) @binding(1) var<uniform> settings: RenderSettings;

@group(1) @binding(0) var<storage, read> instances: array<Instance>;
@group(1) @binding(1) var<storage, read> meshlets: array<Meshlet>;
@group(1) @binding(2) var<storage, read> meshlet_vertices: array<u32>;
@group(1) @binding(3) var<storage, read> meshlet_triangles: array<u32>;
@group(1) @binding(4) var<storage, read> vertex_data: array<f32>;

@group(2) @binding(0) var<storage, read> clusters: array<ClusterInstance>;

// 双重间接：本地索引 → 三角形池 → 顶点池 → 属性池
fn fetch_position(meshlet: Meshlet, vertex_index: u32) -> vec3<f32> {
    let index = meshlet_vertices[meshlet.vertex_offset
            + meshlet_triangles[meshlet.triangle_offset + vertex_index]]
        * VERTEX_STRIDE_FLOATS;
    return vec3<f32>(
        vertex_data[index],
        vertex_data[index + 1u],
        vertex_data[index + 2u],
    );
}

// 稳定的哈希伪随机调试色
fn debug_color(index: u32) -> vec3<f32> {
    return unpack4x8unorm(((index % 127u) + 1u) * 123456789u).rgb;
}

struct VertexOut {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec3<f32>,
}

@vertex
fn vertex(
    @builtin(instance_index) draw_instance: u32,
    @builtin(vertex_index) vertex_index: u32,
) -> VertexOut {
    let cluster_instance = clusters[draw_instance];
    let meshlet = meshlets[cluster_instance.cluster_index];
    if vertex_index >= meshlet.triangle_count * 3u {
        // 超出实际三角形数（含零三角形的退化 meshlet）：w=0 被裁剪
        return VertexOut(vec4<f32>(1.0, 1.0, 1.0, 0.0), vec3<f32>());
    }

    var id = cluster_instance.cluster_index;
    if settings.mode == 1u {
        // 打包 (簇索引, 三角形索引) 标识，可视化三角形边界；
        // 三角形索引 < 单簇上限，乘法打包对任意上限都不串位
        id = cluster_instance.cluster_index * MAX_TRIANGLES_PER_CLUSTER + vertex_index / 3u;
    }

    let position = fetch_position(meshlet, vertex_index);
    return VertexOut(
        camera.projection * camera.view
            * instances[cluster_instance.instance_index].model
            * vec4<f32>(position, 1.0),
        debug_color(id),
    );
}

@fragment
fn fragment(frag_in: VertexOut) -> @location(0) vec4<f32> {
    return vec4<f32>(saturate(frag_in.color), 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_target_defaults() {
        let target = RenderTargetConfig::default();
        assert_eq!(target.color_format, wgpu::TextureFormat::Rgba16Float);
        assert_eq!(target.depth_format, wgpu::TextureFormat::Depth24Plus);
        assert!(target.reverse_z);
    }

    #[test]
    fn test_depth_clear_value_follows_z_convention() {
        let reverse = RenderTargetConfig::default();
        assert_eq!(reverse.depth_clear_value(), 0.0);
        let forward = RenderTargetConfig {
            reverse_z: false,
            ..Default::default()
        };
        assert_eq!(forward.depth_clear_value(), 1.0);
    }

    #[test]
    fn test_cluster_triangle_id_unique_beyond_128_triangles() {
        // 单簇三角形数上限超过 128 时标识也不冲突
        // （固定 7 位移位打包时 (1, 200) 与 (2, 72) 会撞到同一个值）
        let max = 256;
        let a = pack_cluster_triangle_id(1, 200, max);
        let b = pack_cluster_triangle_id(2, 72, max);
        assert_ne!(a, b);
        assert_eq!(unpack_cluster_triangle_id(a, max), (1, 200));
        assert_eq!(unpack_cluster_triangle_id(b, max), (2, 72));
    }

    #[test]
    fn test_cluster_triangle_id_roundtrip() {
        for max in [64, 128, 254] {
            for cluster in [0, 1, 1000] {
                for triangle in [0, max / 2, max - 1] {
                    let id = pack_cluster_triangle_id(cluster, triangle, max);
                    assert_eq!(unpack_cluster_triangle_id(id, max), (cluster, triangle));
                }
            }
        }
    }
}
