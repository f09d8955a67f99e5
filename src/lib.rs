//! # Meshlet Renderer
//!
//! GPU 驱动的 meshlet LOD 选择、剔除与渲染管线。
//!
//! 网格被离线切分为小三角形簇（meshlet），并组织为带误差上界的层级
//! LOD 结构（本 crate 将其视为只读输入）。每帧对每个 (实例, 簇) 候选对：
//! 根据投影到屏幕空间的简化误差选择细节层级，做视锥剔除，幸存者原子
//! 压缩进可见簇列表，最后由一次间接绘制精确光栅化可见几何体。
//!
//! ## 架构设计
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Meshlet LOD Pipeline                     │
//! ├─────────────────────────────────────────────────────────┤
//! │  1. Upload Hierarchy + Candidate List                    │
//! │     - 簇记录 / 索引池 / 误差上界 上传到存储缓冲区          │
//! │                                                          │
//! │  2. LOD Selection + Frustum Culling (Compute Shader)     │
//! │     - 每个候选对一个线程，投影误差选层级并做视锥测试        │
//! │     - 幸存者通过原子计数器压缩进可见簇列表                  │
//! │                                                          │
//! │  3. Indirect Draw                                        │
//! │     - 一次 DrawIndirect，GPU 自动确定实例数               │
//! │     - 每个可见簇固定顶点预算，越界顶点被裁剪                │
//! └─────────────────────────────────────────────────────────┘
//! ```

/// Cluster hierarchy data model and wire-layout types
pub mod hierarchy;
/// Frustum plane extraction and sphere visibility tests
pub mod frustum;
/// Per-frame camera / culling configuration uniforms
pub mod uniforms;
/// Indirect draw argument buffer shared between cull and draw
pub mod indirect;
/// LOD selection and cluster culling (compute kernel + CPU reference path)
pub mod culling;
/// Meshlet rasterization kernel
pub mod render_clusters;
/// Device-resident hierarchy storage and candidate lists
pub mod resources;
/// Renderer orchestration (direct and indirect variants)
pub mod renderer;

pub use culling::{cull_candidates, ClusterCullKernel};
pub use hierarchy::{
    ClusterBounds, ClusterHierarchy, ClusterInstance, ErrorBounds, GroupError, Instance, Meshlet,
};
pub use indirect::{DrawIndirectArgs, IndirectArgsBuffer};
pub use renderer::{ClusterRenderer, DirectClusterRenderer, IndirectClusterRenderer, RenderTargetConfig};
pub use resources::{MeshBuffers, UploadError};
pub use uniforms::{Camera, CullingConfig, FrameUniforms, RenderMode, RenderSettings};
