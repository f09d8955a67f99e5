//! 设备端层级资源
//!
//! 为层级负载分配存储缓冲区，并派生候选列表（每个簇 × 每个活动实例）。
//! 网格切换时整体替换；单个绑定超出容量直接报错，分块上传不在范围内。

use crate::hierarchy::{ClusterHierarchy, ClusterInstance, HierarchyError, Instance};
use crate::indirect::IndirectArgsBuffer;
use thiserror::Error;
use wgpu::util::DeviceExt;

/// 资源上传错误类型
#[derive(Error, Debug)]
pub enum UploadError {
    /// 层级负载超出单个绑定的容量
    #[error("hierarchy payload exceeds binding capacity: required {required} bytes, available {available}")]
    ResourceLimitExceeded { required: u64, available: u64 },
    /// 层级数据不合法
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
}

/// 检查单个绑定是否超出设备容量
fn ensure_binding_fits(required: u64, available: u64) -> Result<(), UploadError> {
    if required > available {
        return Err(UploadError::ResourceLimitExceeded {
            required,
            available,
        });
    }
    Ok(())
}

/// 候选总数按 64 位计算并检查绑定容量
///
/// 簇数 × 实例数在 u32 中可能回绕，回绕后的检查会放过实际超限的
/// 负载；这里先在 u64 中算出真实乘积再比对容量。
fn ensure_candidates_fit(
    num_clusters: u32,
    num_instances: u32,
    limit: u64,
) -> Result<u64, UploadError> {
    let total = num_clusters as u64 * num_instances as u64;
    ensure_binding_fits(total.saturating_mul(8), limit)?;
    Ok(total)
}

/// 生成完整候选列表：每个活动实例与每个簇配对
pub fn build_candidates(num_clusters: u32, num_instances: u32) -> Vec<ClusterInstance> {
    let mut candidates =
        Vec::with_capacity(num_clusters as usize * num_instances as usize);
    for instance_index in 0..num_instances {
        for cluster_index in 0..num_clusters {
            candidates.push(ClusterInstance {
                instance_index,
                cluster_index,
            });
        }
    }
    candidates
}

/// 一个已加载网格的全部设备资源（加载句柄）
///
/// 层级负载本身不可变；`instances` 每帧由调用方重写，`visible` 与
/// `indirect` 是本子系统独占的逐帧临时状态。
pub struct MeshBuffers {
    /// 顶点属性池
    pub vertices: wgpu::Buffer,
    /// meshlet 记录
    pub meshlets: wgpu::Buffer,
    /// 顶点索引池
    pub meshlet_vertices: wgpu::Buffer,
    /// 三角形索引池
    pub meshlet_triangles: wgpu::Buffer,
    /// 逐簇误差上界（原始 float 布局，每簇 10 个）
    pub error_bounds: wgpu::Buffer,
    /// 逐簇包围球
    pub cluster_bounds: wgpu::Buffer,
    /// 实例变换（每帧重写）
    pub instances: wgpu::Buffer,
    /// 完整候选列表（仅网格切换时重建）
    pub candidates: wgpu::Buffer,
    /// 候选总数
    pub candidate_count: wgpu::Buffer,
    /// 每个 LOD 层级的静态候选列表（直接变体）
    pub lod_candidates: Vec<wgpu::Buffer>,
    /// 每个 LOD 层级的候选数
    pub lod_candidate_counts: Vec<u32>,
    /// 可见簇列表（逐帧临时状态）
    pub visible: wgpu::Buffer,
    /// 间接绘制参数（逐帧临时状态）
    pub indirect: IndirectArgsBuffer,
    /// 簇总数
    pub num_clusters: u32,
    /// 活动实例数
    pub num_instances: u32,
    /// 候选总数
    pub num_candidates: u32,
    /// 顶点步长（float 数）
    pub vertex_stride_floats: u32,
    /// 单簇三角形数上限
    pub max_cluster_triangles: u32,
}

impl MeshBuffers {
    /// 为层级负载与候选列表分配并填充设备存储
    ///
    /// # 错误
    ///
    /// 层级数据不合法，或任一绑定超出
    /// `max_storage_buffer_binding_size` 时返回错误（分块不在范围内）。
    pub fn upload(
        device: &wgpu::Device,
        hierarchy: &ClusterHierarchy,
        num_instances: u32,
    ) -> Result<Self, UploadError> {
        hierarchy.validate()?;

        // 候选列表至少覆盖一个实例，零大小的存储绑定不合法
        let num_instances = num_instances.max(1);
        let num_clusters = hierarchy.num_clusters() as u32;
        let limit = device.limits().max_storage_buffer_binding_size as u64;
        // 通过容量检查后乘积必然小于 limit / 8，收窄回 u32 不丢位
        let num_candidates = ensure_candidates_fit(num_clusters, num_instances, limit)? as u32;

        let vertices_size = (hierarchy.vertices.len() * 4) as u64;
        let candidates_size = num_candidates as u64 * 8;
        for size in [
            vertices_size,
            (hierarchy.meshlets.len() * 16) as u64,
            (hierarchy.meshlet_vertices.len() * 4) as u64,
            (hierarchy.meshlet_triangles.len() * 4) as u64,
            (hierarchy.error_bounds.len() * 40) as u64,
            (hierarchy.cluster_bounds.len() * 16) as u64,
            num_instances as u64 * 64,
        ] {
            ensure_binding_fits(size, limit)?;
        }

        let make_storage = |label: &str, contents: &[u8]| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::STORAGE,
            })
        };

        let vertices = make_storage("Hierarchy Vertices", bytemuck::cast_slice(&hierarchy.vertices));
        let meshlets = make_storage("Hierarchy Meshlets", bytemuck::cast_slice(&hierarchy.meshlets));
        let meshlet_vertices = make_storage(
            "Hierarchy Meshlet Vertices",
            bytemuck::cast_slice(&hierarchy.meshlet_vertices),
        );
        let meshlet_triangles = make_storage(
            "Hierarchy Meshlet Triangles",
            bytemuck::cast_slice(&hierarchy.meshlet_triangles),
        );
        let error_bounds = make_storage(
            "Hierarchy Error Bounds",
            bytemuck::cast_slice(&hierarchy.error_bounds),
        );
        let cluster_bounds = make_storage(
            "Hierarchy Cluster Bounds",
            bytemuck::cast_slice(&hierarchy.cluster_bounds),
        );

        // 实例缓冲区每帧由调用方重写，先填充单位矩阵
        let identity_instances = vec![Instance::default(); num_instances as usize];
        let instances = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Cluster Instances (Transforms)"),
            contents: bytemuck::cast_slice(&identity_instances),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        let candidate_list = build_candidates(num_clusters, num_instances);
        let candidates = make_storage("Full Candidate List", bytemuck::cast_slice(&candidate_list));
        let candidate_count = make_storage("Candidate Count", bytemuck::bytes_of(&num_candidates));

        // 直接变体的每层级静态候选列表
        let mut lod_candidates = Vec::with_capacity(hierarchy.num_lods());
        let mut lod_candidate_counts = Vec::with_capacity(hierarchy.num_lods());
        for lod in 0..hierarchy.num_lods() {
            let range = hierarchy.lod_cluster_range(lod);
            let mut list =
                Vec::with_capacity(range.len() * num_instances as usize);
            for instance_index in 0..num_instances {
                for cluster_index in range.clone() {
                    list.push(ClusterInstance {
                        instance_index,
                        cluster_index,
                    });
                }
            }
            lod_candidate_counts.push(list.len() as u32);
            lod_candidates.push(make_storage(
                &format!("LOD {lod} Candidate List"),
                bytemuck::cast_slice(&list),
            ));
        }

        // 可见簇列表按最坏情况（全部候选幸存）预留
        let visible = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Visible Clusters"),
            size: candidates_size.max(8),
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        let indirect = IndirectArgsBuffer::new(device);

        tracing::info!(
            clusters = num_clusters,
            instances = num_instances,
            candidates = num_candidates,
            lods = hierarchy.num_lods(),
            vertex_bytes = vertices_size,
            "uploaded cluster hierarchy"
        );

        Ok(Self {
            vertices,
            meshlets,
            meshlet_vertices,
            meshlet_triangles,
            error_bounds,
            cluster_bounds,
            instances,
            candidates,
            candidate_count,
            lod_candidates,
            lod_candidate_counts,
            visible,
            indirect,
            num_clusters,
            num_instances,
            num_candidates,
            vertex_stride_floats: hierarchy.vertex_stride_floats,
            max_cluster_triangles: hierarchy.max_cluster_triangles,
        })
    }

    /// 写入本帧实例变换
    ///
    /// 实例数多于加载时声明的数量时截断（候选列表只覆盖声明的实例）。
    pub fn write_instances(&self, queue: &wgpu::Queue, instances: &[Instance]) {
        if instances.is_empty() {
            return;
        }
        if instances.len() as u32 > self.num_instances {
            tracing::warn!(
                provided = instances.len(),
                capacity = self.num_instances,
                "more instances than candidate list covers, truncating"
            );
        }
        let count = (instances.len() as u32).min(self.num_instances) as usize;
        queue.write_buffer(
            &self.instances,
            0,
            bytemuck::cast_slice(&instances[..count]),
        );
    }
}
