//! 簇层级数据模型
//!
//! 定义外部层级构建器产出的内存布局契约（meshlet 记录、索引池、
//! 包围球、误差上界），以及 CPU 侧的层级容器。层级数据在一次加载后
//! 不可变，整体替换；逐簇误差沿层级单调不减由构建器保证，此处不做
//! 二次校验。

use thiserror::Error;

/// 单簇三角形数上限对应的哨兵误差值（永不选中该层级）
pub const ERROR_INFINITE: f32 = f32::MAX;

/// 层级数据错误类型
#[derive(Error, Debug)]
pub enum HierarchyError {
    /// 逐簇表长度不一致
    #[error("per-cluster table length mismatch: {meshlets} meshlets, {error_bounds} error bounds, {cluster_bounds} cluster bounds")]
    LengthMismatch {
        meshlets: usize,
        error_bounds: usize,
        cluster_bounds: usize,
    },
    /// meshlet 的索引池偏移越界
    #[error("meshlet {index} references data outside the shared index pools")]
    MeshletOutOfBounds { index: usize },
    /// 顶点步长不足以容纳位置
    #[error("vertex stride must be at least 3 floats, got {0}")]
    BadStride(u32),
    /// 顶点数据长度不是步长的整数倍
    #[error("vertex data length {len} is not a multiple of stride {stride}")]
    BadVertexData { len: usize, stride: u32 },
    /// LOD 偏移表非严格递增或越界
    #[error("lod offsets must start at 0, be ascending and stay within {clusters} clusters")]
    BadLodOffsets { clusters: usize },
}

/// Meshlet 记录：共享索引池中的一段
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Meshlet {
    /// 顶点索引池偏移
    pub vertex_offset: u32,
    /// 三角形索引池偏移
    pub triangle_offset: u32,
    /// 顶点数
    pub vertex_count: u32,
    /// 三角形数
    pub triangle_count: u32,
}

/// 簇的紧包围球，用于视锥测试
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ClusterBounds {
    /// 球心
    pub center: [f32; 3],
    /// 半径
    pub radius: f32,
}

/// 一组簇的误差记录：包围球 + 绝对简化误差
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GroupError {
    /// 误差包围球球心
    pub center: [f32; 3],
    /// 误差包围球半径
    pub radius: f32,
    /// 绝对简化误差；0 表示叶子（总可选），[`ERROR_INFINITE`] 表示根的父级
    pub error: f32,
}

/// 单簇的误差上界：父级记录在前、自身在后（线格式：每簇 10 个 float）
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ErrorBounds {
    /// 父级（更粗一层）的误差记录
    pub parent: GroupError,
    /// 簇自身的误差记录
    pub cluster: GroupError,
}

/// 实例：一个模型变换
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Instance {
    /// 模型矩阵（列主序）
    pub model: [[f32; 4]; 4],
}

impl Default for Instance {
    fn default() -> Self {
        Self {
            model: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }
}

impl Instance {
    /// 从 glam 矩阵创建实例
    pub fn from_matrix(model: glam::Mat4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
        }
    }

    /// 转回 glam 矩阵
    pub fn matrix(&self) -> glam::Mat4 {
        glam::Mat4::from_cols_array_2d(&self.model)
    }
}

/// 剔除工作的单位：一个 (实例, 簇) 配对
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ClusterInstance {
    /// 实例索引
    pub instance_index: u32,
    /// 簇索引
    pub cluster_index: u32,
}

/// CPU 侧的簇层级容器
///
/// 由外部构建器产出，对本 crate 只读。`lod_offsets` 假定簇按 LOD
/// 层级排序，`lod_offsets[i]` 为第 i 层第一个簇的索引（第 0 层最细）。
#[derive(Debug, Clone, Default)]
pub struct ClusterHierarchy {
    /// 顶点属性池：每顶点 `vertex_stride_floats` 个 float，前 3 个为位置
    pub vertices: Vec<f32>,
    /// 顶点步长（float 数），至少为 3
    pub vertex_stride_floats: u32,
    /// meshlet 记录
    pub meshlets: Vec<Meshlet>,
    /// 顶点索引池（索引进顶点属性池）
    pub meshlet_vertices: Vec<u32>,
    /// 三角形索引池（meshlet 局部顶点索引）
    pub meshlet_triangles: Vec<u32>,
    /// 逐簇误差上界
    pub error_bounds: Vec<ErrorBounds>,
    /// 逐簇包围球
    pub cluster_bounds: Vec<ClusterBounds>,
    /// 每个 LOD 层级的起始簇索引（递增）
    pub lod_offsets: Vec<u32>,
    /// 单簇三角形数上限
    pub max_cluster_triangles: u32,
}

impl ClusterHierarchy {
    /// 簇总数
    pub fn num_clusters(&self) -> usize {
        self.meshlets.len()
    }

    /// LOD 层级数
    pub fn num_lods(&self) -> usize {
        self.lod_offsets.len()
    }

    /// 第 `lod` 层的簇索引区间
    pub fn lod_cluster_range(&self, lod: usize) -> std::ops::Range<u32> {
        let start = self.lod_offsets[lod];
        let end = if lod + 1 < self.lod_offsets.len() {
            self.lod_offsets[lod + 1]
        } else {
            self.num_clusters() as u32
        };
        start..end
    }

    /// 校验表长度、索引池偏移与 LOD 偏移表
    ///
    /// 不校验误差沿层级的单调性（构建器保证）。
    pub fn validate(&self) -> Result<(), HierarchyError> {
        if self.vertex_stride_floats < 3 {
            return Err(HierarchyError::BadStride(self.vertex_stride_floats));
        }
        if self.vertices.len() % self.vertex_stride_floats as usize != 0 {
            return Err(HierarchyError::BadVertexData {
                len: self.vertices.len(),
                stride: self.vertex_stride_floats,
            });
        }
        if self.error_bounds.len() != self.meshlets.len()
            || self.cluster_bounds.len() != self.meshlets.len()
        {
            return Err(HierarchyError::LengthMismatch {
                meshlets: self.meshlets.len(),
                error_bounds: self.error_bounds.len(),
                cluster_bounds: self.cluster_bounds.len(),
            });
        }

        let num_vertices = (self.vertices.len() / self.vertex_stride_floats.max(1) as usize) as u32;
        for (index, meshlet) in self.meshlets.iter().enumerate() {
            let vertex_end = meshlet.vertex_offset as u64 + meshlet.vertex_count as u64;
            let triangle_end =
                meshlet.triangle_offset as u64 + meshlet.triangle_count as u64 * 3;
            if vertex_end > self.meshlet_vertices.len() as u64
                || triangle_end > self.meshlet_triangles.len() as u64
            {
                return Err(HierarchyError::MeshletOutOfBounds { index });
            }
            // 局部三角形索引必须落在 meshlet 自己的顶点窗口内
            let triangles = &self.meshlet_triangles
                [meshlet.triangle_offset as usize..triangle_end as usize];
            if triangles.iter().any(|&local| local >= meshlet.vertex_count) {
                return Err(HierarchyError::MeshletOutOfBounds { index });
            }
            let vertex_indices = &self.meshlet_vertices
                [meshlet.vertex_offset as usize..vertex_end as usize];
            if vertex_indices.iter().any(|&v| v >= num_vertices) {
                return Err(HierarchyError::MeshletOutOfBounds { index });
            }
        }

        let clusters = self.num_clusters();
        let ascending = self
            .lod_offsets
            .windows(2)
            .all(|pair| pair[0] < pair[1]);
        // 每个层级至少一个簇，零大小的候选缓冲区无法绑定
        if self.lod_offsets.first().copied() != Some(0)
            || !ascending
            || self
                .lod_offsets
                .last()
                .map_or(true, |&last| last as usize >= clusters)
        {
            return Err(HierarchyError::BadLodOffsets { clusters });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 两个簇各一个三角形的最小层级
    fn tiny_hierarchy() -> ClusterHierarchy {
        ClusterHierarchy {
            vertices: vec![
                0.0, 0.0, 0.0, //
                1.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, //
            ],
            vertex_stride_floats: 3,
            meshlets: vec![
                Meshlet {
                    vertex_offset: 0,
                    triangle_offset: 0,
                    vertex_count: 3,
                    triangle_count: 1,
                },
                Meshlet {
                    vertex_offset: 0,
                    triangle_offset: 0,
                    vertex_count: 3,
                    triangle_count: 1,
                },
            ],
            meshlet_vertices: vec![0, 1, 2],
            meshlet_triangles: vec![0, 1, 2],
            error_bounds: vec![
                ErrorBounds {
                    parent: GroupError {
                        center: [0.0; 3],
                        radius: 1.0,
                        error: 1.0,
                    },
                    cluster: GroupError {
                        center: [0.0; 3],
                        radius: 1.0,
                        error: 0.0,
                    },
                },
                ErrorBounds {
                    parent: GroupError {
                        center: [0.0; 3],
                        radius: 1.0,
                        error: ERROR_INFINITE,
                    },
                    cluster: GroupError {
                        center: [0.0; 3],
                        radius: 1.0,
                        error: 1.0,
                    },
                },
            ],
            cluster_bounds: vec![
                ClusterBounds {
                    center: [0.0; 3],
                    radius: 1.0,
                },
                ClusterBounds {
                    center: [0.0; 3],
                    radius: 1.0,
                },
            ],
            lod_offsets: vec![0, 1],
            max_cluster_triangles: 128,
        }
    }

    #[test]
    fn test_wire_layout_sizes() {
        // §外部接口 约定的线格式
        assert_eq!(std::mem::size_of::<Meshlet>(), 16);
        assert_eq!(std::mem::size_of::<ClusterBounds>(), 16);
        assert_eq!(std::mem::size_of::<GroupError>(), 20);
        assert_eq!(std::mem::size_of::<ErrorBounds>(), 40);
        assert_eq!(std::mem::size_of::<ClusterInstance>(), 8);
        assert_eq!(std::mem::size_of::<Instance>(), 64);
    }

    #[test]
    fn test_error_bounds_parent_first() {
        let bounds = ErrorBounds {
            parent: GroupError {
                center: [1.0, 2.0, 3.0],
                radius: 4.0,
                error: 5.0,
            },
            cluster: GroupError {
                center: [6.0, 7.0, 8.0],
                radius: 9.0,
                error: 10.0,
            },
        };
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&bounds));
        assert_eq!(floats, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
    }

    #[test]
    fn test_instance_default_is_identity() {
        let instance = Instance::default();
        assert_eq!(instance.matrix(), glam::Mat4::IDENTITY);
    }

    #[test]
    fn test_validate_ok() {
        assert!(tiny_hierarchy().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_bounds_meshlet() {
        let mut hierarchy = tiny_hierarchy();
        hierarchy.meshlets[1].triangle_offset = 2;
        assert!(matches!(
            hierarchy.validate(),
            Err(HierarchyError::MeshletOutOfBounds { index: 1 })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_stride() {
        let mut hierarchy = tiny_hierarchy();
        hierarchy.vertex_stride_floats = 2;
        assert!(matches!(
            hierarchy.validate(),
            Err(HierarchyError::BadStride(2))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_lod_offsets() {
        let mut hierarchy = tiny_hierarchy();
        hierarchy.lod_offsets = vec![1, 0];
        assert!(matches!(
            hierarchy.validate(),
            Err(HierarchyError::BadLodOffsets { .. })
        ));
    }

    #[test]
    fn test_lod_cluster_range() {
        let hierarchy = tiny_hierarchy();
        assert_eq!(hierarchy.lod_cluster_range(0), 0..1);
        assert_eq!(hierarchy.lod_cluster_range(1), 1..2);
    }
}
