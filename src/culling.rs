//! LOD 选择与簇剔除
//!
//! 算法核心：每个 (实例, 簇) 候选对一个计算着色器线程。
//! 投影自身与父级的简化误差到屏幕空间，只有"自身误差 ≤ 阈值 且
//! 父级误差 > 阈值"的簇被选中——即细节刚好足够的最粗层级；误差沿
//! 层级单调不减保证每条根到叶路径恰好选中一层。选中的簇再做 5 平面
//! 视锥测试，幸存者通过原子计数器压缩进可见簇列表。
//!
//! 同名的 CPU 参考实现与着色器逐行对应，用作测试基准与回退路径。

use crate::frustum::Frustum;
use crate::hierarchy::{
    ClusterBounds, ClusterInstance, ErrorBounds, GroupError, Instance, ERROR_INFINITE,
};
use crate::resources::MeshBuffers;
use crate::uniforms::{Camera, CullingConfig, FrameUniforms};
use glam::{Mat4, Vec3};

/// 计算着色器工作组大小（与着色器中的常量一致）
pub const WORKGROUP_SIZE: u32 = 256;

// ========================================
// CPU 参考实现
// ========================================

/// 投影一条误差记录到屏幕空间
///
/// 哨兵值直通：误差为 0（叶子，总可选）或 [`ERROR_INFINITE`]（根的
/// 父级，永不满足）时原样返回。相机位于包围球内时距离被钳到 z_near
/// 而不是报错。
pub fn project_group_error(
    transform: &Mat4,
    group: &GroupError,
    camera_position: Vec3,
    config: &CullingConfig,
) -> f32 {
    if group.error == 0.0 || group.error == ERROR_INFINITE {
        return group.error;
    }
    let center = transform.transform_point3(Vec3::from(group.center));
    let dist = (center.distance(camera_position) - group.radius * config.radius_scale)
        .max(config.z_near);
    let size = dist / config.resolution_scale;
    if size <= 1e-5 {
        // 投影尺寸非正：该层级永不选中
        return ERROR_INFINITE;
    }
    group.error / size
}

/// 该簇是否是当前视点下被选中的 LOD 层级
pub fn is_selected_lod(
    transform: &Mat4,
    bounds: &ErrorBounds,
    camera_position: Vec3,
    config: &CullingConfig,
) -> bool {
    let cluster_error = project_group_error(transform, &bounds.cluster, camera_position, config);
    let parent_error = project_group_error(transform, &bounds.parent, camera_position, config);
    parent_error > config.error_threshold && cluster_error <= config.error_threshold
}

/// 剔除候选列表的 CPU 参考路径
///
/// 与计算着色器语义一致（输出顺序确定，而着色器的压缩顺序不定）。
pub fn cull_candidates(
    candidates: &[ClusterInstance],
    instances: &[Instance],
    error_bounds: &[ErrorBounds],
    cluster_bounds: &[ClusterBounds],
    camera: &Camera,
    config: &CullingConfig,
) -> Vec<ClusterInstance> {
    let frustum = Frustum::from_view_projection(camera.view_projection());
    candidates
        .iter()
        .filter(|candidate| {
            let transform = instances[candidate.instance_index as usize].matrix();
            if !is_selected_lod(
                &transform,
                &error_bounds[candidate.cluster_index as usize],
                camera.position,
                config,
            ) {
                return false;
            }
            let bounds = &cluster_bounds[candidate.cluster_index as usize];
            let center = transform.transform_point3(Vec3::from(bounds.center));
            frustum.sphere_visible(center, bounds.radius)
        })
        .copied()
        .collect()
}

// ========================================
// GPU 剔除内核
// ========================================

/// LOD 剔除内核
///
/// 派发 ⌈候选数 / 工作组大小⌉ 个工作组；超出有效候选数的线程空转。
/// 唯一的共享可变状态是间接参数里的原子实例计数器和只追加的可见簇
/// 列表，幸存者之间的输出顺序不确定。
pub struct ClusterCullKernel {
    pipeline: wgpu::ComputePipeline,
    frame_layout: wgpu::BindGroupLayout,
    mesh_layout: wgpu::BindGroupLayout,
    candidates_layout: wgpu::BindGroupLayout,
    output_layout: wgpu::BindGroupLayout,
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl ClusterCullKernel {
    /// 创建剔除内核
    ///
    /// `max_cluster_triangles` 是单簇三角形数上限，决定幸存簇统一的
    /// 顶点预算，因此内核与已加载的网格绑定（换网格需重建）。
    pub fn new(device: &wgpu::Device, max_cluster_triangles: u32) -> Self {
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Cluster Cull Frame BGL"),
            entries: &[uniform_entry(0), uniform_entry(1)],
        });
        let mesh_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Cluster Cull Mesh BGL"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, true),
                storage_entry(2, true),
            ],
        });
        let candidates_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Cluster Cull Candidates BGL"),
            entries: &[storage_entry(0, true), storage_entry(1, true)],
        });
        let output_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Cluster Cull Output BGL"),
            entries: &[storage_entry(0, false), storage_entry(1, false)],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Cluster Cull Shader"),
            source: wgpu::ShaderSource::Wgsl(CULL_CLUSTERS_SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Cluster Cull Pipeline Layout"),
            bind_group_layouts: &[
                &frame_layout,
                &mesh_layout,
                &candidates_layout,
                &output_layout,
            ],
            push_constant_ranges: &[],
        });

        let constants = std::collections::HashMap::from([(
            "MAX_TRIANGLES_PER_CLUSTER".to_owned(),
            max_cluster_triangles as f64,
        )]);
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Cluster Cull Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "cull_clusters",
            compilation_options: wgpu::PipelineCompilationOptions {
                constants: &constants,
                zero_initialize_workgroup_memory: false,
            },
        });

        Self {
            pipeline,
            frame_layout,
            mesh_layout,
            candidates_layout,
            output_layout,
        }
    }

    /// 创建每帧 Uniform 绑定组
    pub fn frame_bind_group(
        &self,
        device: &wgpu::Device,
        frame: &FrameUniforms,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cluster Cull Frame BG"),
            layout: &self.frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame.cull_camera_buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: frame.params_buffer().as_entire_binding(),
                },
            ],
        })
    }

    /// 创建网格与实例池绑定组
    pub fn mesh_bind_group(&self, device: &wgpu::Device, mesh: &MeshBuffers) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cluster Cull Mesh BG"),
            layout: &self.mesh_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: mesh.instances.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: mesh.error_bounds.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: mesh.cluster_bounds.as_entire_binding(),
                },
            ],
        })
    }

    /// 创建候选列表绑定组
    pub fn candidates_bind_group(
        &self,
        device: &wgpu::Device,
        mesh: &MeshBuffers,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cluster Cull Candidates BG"),
            layout: &self.candidates_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: mesh.candidates.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: mesh.candidate_count.as_entire_binding(),
                },
            ],
        })
    }

    /// 创建输出（可见簇 + 间接参数）绑定组
    pub fn output_bind_group(&self, device: &wgpu::Device, mesh: &MeshBuffers) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Cluster Cull Output BG"),
            layout: &self.output_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: mesh.visible.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: mesh.indirect.buffer().as_entire_binding(),
                },
            ],
        })
    }

    /// 录制剔除派发
    ///
    /// 调用方需先清零间接参数缓冲区。
    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        frame_bg: &wgpu::BindGroup,
        mesh_bg: &wgpu::BindGroup,
        candidates_bg: &wgpu::BindGroup,
        output_bg: &wgpu::BindGroup,
        num_candidates: u32,
    ) {
        let workgroups = (num_candidates + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;
        tracing::trace!(candidates = num_candidates, workgroups, "cull dispatch");

        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Cluster Cull Pass"),
            timestamp_writes: None,
        });
        cpass.set_pipeline(&self.pipeline);
        cpass.set_bind_group(0, frame_bg, &[]);
        cpass.set_bind_group(1, mesh_bg, &[]);
        cpass.set_bind_group(2, candidates_bg, &[]);
        cpass.set_bind_group(3, output_bg, &[]);
        cpass.dispatch_workgroups(workgroups, 1, 1);
    }
}

/// 剔除计算着色器
const CULL_CLUSTERS_SHADER: &str = r#"
const F32_MAX: f32 = 3.4028235e+38;

override MAX_TRIANGLES_PER_CLUSTER: u32 = 128u;

struct Camera {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    position: vec3<f32>,
    _pad: f32,
    frustum: array<vec4<f32>, 5>,
}

struct CullingParams {
    resolution_scale: f32,
    z_near: f32,
    threshold: f32,
    radius_scale: f32,
}

struct Instance {
    model: mat4x4<f32>,
}

struct ClusterInstance {
    instance_index: u32,
    cluster_index: u32,
}

struct DrawIndirectArgs {
    vertex_count: u32,
    instance_count: atomic<u32>,
    first_vertex: u32,
    first_instance: u32,
}

struct GroupError {
    center: vec3<f32>,
    radius: f32,
    error: f32,
}

struct ClusterBounds {
    center: vec3<f32>,
    radius: f32,
}

@group(0) @binding(0) var<uniform> camera: Camera;
@group(0) @binding(1) var<uniform> params: CullingParams;

@group(1) @binding(0) var<storage, read> instances: array<Instance>;
@group(1) @binding(1) var<storage, read> error_bounds: array<f32>;
@group(1) @binding(2) var<storage, read> cluster_bounds: array<ClusterBounds>;

@group(2) @binding(0) var<storage, read> candidates: array<ClusterInstance>;
@group(2) @binding(1) var<storage, read> candidate_count: u32;

@group(3) @binding(0) var<storage, read_write> visible_clusters: array<ClusterInstance>;
@group(3) @binding(1) var<storage, read_write> draw_args: DrawIndirectArgs;

fn project_group_error(transform: mat4x4<f32>, group: GroupError) -> f32 {
    // 哨兵值直通：0 = 叶子总可选，F32_MAX = 根的父级永不满足
    if group.error == 0.0 || group.error == F32_MAX {
        return group.error;
    }
    var dist = distance((transform * vec4<f32>(group.center, 1.0)).xyz, camera.position)
        - group.radius * params.radius_scale;
    dist = max(dist, params.z_near);
    let size = dist / params.resolution_scale;
    if size <= 0.00001 {
        return F32_MAX;
    }
    return group.error / size;
}

// 误差上界是原始 float 数组：vec3 的 16 字节对齐会破坏每簇 10 float 的
// 紧凑线格式，只能手工取数
fn load_group_error(base: u32) -> GroupError {
    return GroupError(
        vec3<f32>(error_bounds[base], error_bounds[base + 1u], error_bounds[base + 2u]),
        error_bounds[base + 3u],
        error_bounds[base + 4u],
    );
}

fn is_selected_lod(transform: mat4x4<f32>, cluster_index: u32) -> bool {
    let base = cluster_index * 10u;
    let parent_error = project_group_error(transform, load_group_error(base));
    let cluster_error = project_group_error(transform, load_group_error(base + 5u));
    return parent_error > params.threshold && cluster_error <= params.threshold;
}

@compute
@workgroup_size(256, 1, 1)
fn cull_clusters(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let thread_id = global_id.x;
    if thread_id >= candidate_count {
        return;
    }

    let candidate = candidates[thread_id];
    let transform = instances[candidate.instance_index].model;

    if !is_selected_lod(transform, candidate.cluster_index) {
        return;
    }

    // 视锥测试：有符号距离 + 半径
    let bounds = cluster_bounds[candidate.cluster_index];
    let center = vec4<f32>((transform * vec4<f32>(bounds.center, 1.0)).xyz, 1.0);
    let visible =
        (dot(center, camera.frustum[0]) + bounds.radius >= 0.0) &&
        (dot(center, camera.frustum[1]) + bounds.radius >= 0.0) &&
        (dot(center, camera.frustum[2]) + bounds.radius >= 0.0) &&
        (dot(center, camera.frustum[3]) + bounds.radius >= 0.0) &&
        (dot(center, camera.frustum[4]) + bounds.radius >= 0.0);
    if !visible {
        return;
    }

    // 法线锥背面剔除未启用：锥体数据不随实例变换，结果未经验证

    visible_clusters[atomicAdd(&draw_args.instance_count, 1u)] = candidate;
    // 常量部分由每个幸存者重复写入，last-writer-wins 无害
    draw_args.vertex_count = MAX_TRIANGLES_PER_CLUSTER * 3u;
    draw_args.first_vertex = 0u;
    draw_args.first_instance = 0u;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::build_candidates;
    use proptest::prelude::*;

    fn test_camera(position: Vec3) -> Camera {
        Camera {
            view: Mat4::look_at_rh(position, Vec3::ZERO, Vec3::Y),
            projection: Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0),
            position,
        }
    }

    fn group(radius: f32, error: f32) -> GroupError {
        GroupError {
            center: [0.0; 3],
            radius,
            error,
        }
    }

    // 两层链：簇 0 是叶子，簇 1 是它的父级。半径选取使相机在
    // 距离 2 处投影出子误差 0.3、父误差 0.6。
    fn two_level_bounds() -> Vec<ErrorBounds> {
        let parent_record = group(2.0 - 1.0 / 0.6, 1.0);
        vec![
            ErrorBounds {
                parent: parent_record,
                cluster: group(2.0 - 0.1 / 0.3, 0.1),
            },
            ErrorBounds {
                parent: group(0.0, ERROR_INFINITE),
                cluster: parent_record,
            },
        ]
    }

    fn unit_bounds(count: usize) -> Vec<ClusterBounds> {
        vec![
            ClusterBounds {
                center: [0.0; 3],
                radius: 1.0,
            };
            count
        ]
    }

    #[test]
    fn test_sentinel_errors_pass_through() {
        let config = CullingConfig::default();
        let zero = project_group_error(&Mat4::IDENTITY, &group(1.0, 0.0), Vec3::ZERO, &config);
        assert_eq!(zero, 0.0);
        let infinite = project_group_error(
            &Mat4::IDENTITY,
            &group(1.0, ERROR_INFINITE),
            Vec3::ZERO,
            &config,
        );
        assert_eq!(infinite, ERROR_INFINITE);
    }

    #[test]
    fn test_camera_inside_sphere_clamps_to_z_near() {
        // 数值边界：distance - radius <= 0 时钳到 z_near 而不是出错
        let config = CullingConfig::default();
        let projected =
            project_group_error(&Mat4::IDENTITY, &group(10.0, 0.5), Vec3::ZERO, &config);
        assert_eq!(projected, 0.5 / config.z_near);
    }

    #[test]
    fn test_zero_z_near_inside_sphere_never_selects() {
        // z_near = 0 且相机在包围球内：钳位后投影尺寸为 0，
        // 走非正尺寸分支，该层级永不选中
        let config = CullingConfig {
            z_near: 0.0,
            ..Default::default()
        };
        let projected =
            project_group_error(&Mat4::IDENTITY, &group(10.0, 0.5), Vec3::ZERO, &config);
        assert_eq!(projected, ERROR_INFINITE);
    }

    #[test]
    fn test_lod_selection_flips_with_distance() {
        // parent error=1.0, child error=0.1, threshold=0.5；
        // 距离 2 投影出 child=0.3 / parent=0.6 → 只选子簇；
        // 距离翻倍误差减半 → 选中翻转到父簇
        let config = CullingConfig {
            error_threshold: 0.5,
            ..Default::default()
        };
        let bounds = two_level_bounds();
        let near = Vec3::new(0.0, 0.0, 2.0);

        let child = project_group_error(&Mat4::IDENTITY, &bounds[0].cluster, near, &config);
        let parent = project_group_error(&Mat4::IDENTITY, &bounds[0].parent, near, &config);
        assert!((child - 0.3).abs() < 1e-5, "child projected to {child}");
        assert!((parent - 0.6).abs() < 1e-5, "parent projected to {parent}");

        assert!(is_selected_lod(&Mat4::IDENTITY, &bounds[0], near, &config));
        assert!(!is_selected_lod(&Mat4::IDENTITY, &bounds[1], near, &config));

        let far = Vec3::new(0.0, 0.0, 4.0);
        assert!(!is_selected_lod(&Mat4::IDENTITY, &bounds[0], far, &config));
        assert!(is_selected_lod(&Mat4::IDENTITY, &bounds[1], far, &config));
    }

    #[test]
    fn test_exactly_one_lod_selected_along_path() {
        // 三层链，误差沿层级单调不减；任意距离下恰好选中一层
        let leaf = group(0.5, 0.0);
        let mid = group(1.0, 0.2);
        let coarse = group(2.0, 1.5);
        let root_parent = group(0.0, ERROR_INFINITE);
        let path = [
            ErrorBounds {
                parent: mid,
                cluster: leaf,
            },
            ErrorBounds {
                parent: coarse,
                cluster: mid,
            },
            ErrorBounds {
                parent: root_parent,
                cluster: coarse,
            },
        ];
        let config = CullingConfig {
            error_threshold: 0.5,
            ..Default::default()
        };
        for step in 0..200 {
            let distance = 0.05 + step as f32 * 0.5;
            let position = Vec3::new(0.0, 0.0, distance);
            let selected = path
                .iter()
                .filter(|bounds| is_selected_lod(&Mat4::IDENTITY, bounds, position, &config))
                .count();
            assert_eq!(selected, 1, "distance {distance}: {selected} levels selected");
        }
    }

    #[test]
    fn test_cull_counts_and_survivors() {
        let config = CullingConfig {
            error_threshold: 0.5,
            ..Default::default()
        };
        let instances = [Instance::default()];
        let candidates = build_candidates(2, 1);
        let error_bounds = two_level_bounds();
        let cluster_bounds = unit_bounds(2);
        let camera = test_camera(Vec3::new(0.0, 0.0, 2.0));

        let survivors = cull_candidates(
            &candidates,
            &instances,
            &error_bounds,
            &cluster_bounds,
            &camera,
            &config,
        );
        // LOD 选择 + 视锥都通过的恰好是子簇
        assert_eq!(
            survivors,
            vec![ClusterInstance {
                instance_index: 0,
                cluster_index: 0
            }]
        );
        assert!(survivors.len() <= candidates.len());
    }

    #[test]
    fn test_cluster_beyond_far_plane_never_survives() {
        // 包围球整体在远平面外 → 零幸存者，本帧什么都不画
        let config = CullingConfig::default();
        let instances = [Instance::from_matrix(Mat4::from_translation(Vec3::new(
            0.0, 0.0, -500.0,
        )))];
        let candidates = build_candidates(2, 1);
        let error_bounds = two_level_bounds();
        let cluster_bounds = unit_bounds(2);
        let camera = test_camera(Vec3::new(0.0, 0.0, 2.0));

        let survivors = cull_candidates(
            &candidates,
            &instances,
            &error_bounds,
            &cluster_bounds,
            &camera,
            &config,
        );
        assert!(survivors.is_empty());
    }

    #[test]
    fn test_fully_inside_and_selected_always_survives() {
        let config = CullingConfig {
            error_threshold: 0.5,
            ..Default::default()
        };
        let instances = [Instance::default()];
        // 只有叶子簇，父级误差投影后远超阈值
        let error_bounds = [ErrorBounds {
            parent: group(0.0, ERROR_INFINITE),
            cluster: group(0.0, 0.0),
        }];
        let cluster_bounds = [ClusterBounds {
            center: [0.0, 0.0, 0.0],
            radius: 0.5,
        }];
        let camera = test_camera(Vec3::new(0.0, 0.0, 5.0));

        let survivors = cull_candidates(
            &build_candidates(1, 1),
            &instances,
            &error_bounds,
            &cluster_bounds,
            &camera,
            &config,
        );
        assert_eq!(survivors.len(), 1);
    }

    #[test]
    fn test_identical_input_identical_output() {
        let config = CullingConfig {
            error_threshold: 0.5,
            ..Default::default()
        };
        let instances = [Instance::default(), Instance::default()];
        let candidates = build_candidates(2, 2);
        let error_bounds = two_level_bounds();
        let cluster_bounds = unit_bounds(2);
        let camera = test_camera(Vec3::new(0.0, 0.0, 2.0));

        let first = cull_candidates(
            &candidates,
            &instances,
            &error_bounds,
            &cluster_bounds,
            &camera,
            &config,
        );
        let second = cull_candidates(
            &candidates,
            &instances,
            &error_bounds,
            &cluster_bounds,
            &camera,
            &config,
        );
        assert_eq!(first, second);
    }

    proptest! {
        // 误差投影对距离单调不增（固定误差与半径）
        #[test]
        fn prop_projection_monotone_in_distance(
            error in 0.001f32..1000.0,
            radius in 0.0f32..10.0,
            near in 1.0f32..100.0,
            extra in 0.1f32..1000.0,
        ) {
            let config = CullingConfig::default();
            let group = group(radius, error);
            let near_position = Vec3::new(0.0, 0.0, near + radius);
            let far_position = Vec3::new(0.0, 0.0, near + radius + extra);
            let near_projected =
                project_group_error(&Mat4::IDENTITY, &group, near_position, &config);
            let far_projected =
                project_group_error(&Mat4::IDENTITY, &group, far_position, &config);
            prop_assert!(far_projected <= near_projected);
        }

        // 幸存者数量永不超过候选数量
        #[test]
        fn prop_survivors_bounded_by_candidates(
            distance in 0.5f32..200.0,
            threshold in 0.01f32..10.0,
        ) {
            let config = CullingConfig {
                error_threshold: threshold,
                ..Default::default()
            };
            let instances = [Instance::default()];
            let candidates = build_candidates(2, 1);
            let survivors = cull_candidates(
                &candidates,
                &instances,
                &two_level_bounds(),
                &unit_bounds(2),
                &test_camera(Vec3::new(0.0, 0.0, distance)),
                &config,
            );
            prop_assert!(survivors.len() <= candidates.len());
        }
    }
}
