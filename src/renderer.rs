//! 渲染器编排
//!
//! 两个变体实现同一能力接口 {update, encode}，由带标签的
//! [`ClusterRenderer`] 枚举选择（策略对象而非继承）：
//!
//! - **直接变体**：固定 LOD，无计算阶段，逐层级静态候选列表 1:1
//!   映射到绘制，作为基线。
//! - **间接变体**（设计目标）：每帧逐簇 LOD 选择 + 剔除，无论层级
//!   混合如何都恰好发出一次间接绘制。
//!
//! 每帧一条命令序列：更新 Uniform → 一次剔除派发 → 一个带间接绘制的
//! 渲染通道。派发先于绘制录制在同一提交里，按序执行即是全部所需的
//! 同步。

use crate::culling::ClusterCullKernel;
use crate::hierarchy::{ClusterHierarchy, Instance};
use crate::render_clusters::ClusterRenderKernel;
use crate::resources::{MeshBuffers, UploadError};
use crate::uniforms::{Camera, CullingConfig, FrameUniforms, RenderSettings};

pub use crate::render_clusters::RenderTargetConfig;

/// 间接变体：逐帧 LOD 选择 + 剔除 + 一次间接绘制
pub struct IndirectClusterRenderer {
    target: RenderTargetConfig,
    mesh: MeshBuffers,
    frame: FrameUniforms,
    cull: ClusterCullKernel,
    raster: ClusterRenderKernel,
    cull_frame_bg: wgpu::BindGroup,
    cull_mesh_bg: wgpu::BindGroup,
    cull_candidates_bg: wgpu::BindGroup,
    cull_output_bg: wgpu::BindGroup,
    render_frame_bg: wgpu::BindGroup,
    render_mesh_bg: wgpu::BindGroup,
    render_clusters_bg: wgpu::BindGroup,
}

impl IndirectClusterRenderer {
    /// 加载层级并创建间接变体
    pub fn new(
        device: &wgpu::Device,
        hierarchy: &ClusterHierarchy,
        num_instances: u32,
        target: RenderTargetConfig,
    ) -> Result<Self, UploadError> {
        let mesh = MeshBuffers::upload(device, hierarchy, num_instances)?;
        let frame = FrameUniforms::new(device);
        let cull = ClusterCullKernel::new(device, mesh.max_cluster_triangles);
        let raster = ClusterRenderKernel::new(
            device,
            &target,
            mesh.vertex_stride_floats,
            mesh.max_cluster_triangles,
        );

        let cull_frame_bg = cull.frame_bind_group(device, &frame);
        let cull_mesh_bg = cull.mesh_bind_group(device, &mesh);
        let cull_candidates_bg = cull.candidates_bind_group(device, &mesh);
        let cull_output_bg = cull.output_bind_group(device, &mesh);
        let render_frame_bg = raster.frame_bind_group(device, &frame);
        let render_mesh_bg = raster.mesh_bind_group(device, &mesh);
        let render_clusters_bg = raster.clusters_bind_group(device, &mesh.visible);

        Ok(Self {
            target,
            mesh,
            frame,
            cull,
            raster,
            cull_frame_bg,
            cull_mesh_bg,
            cull_candidates_bg,
            cull_output_bg,
            render_frame_bg,
            render_mesh_bg,
            render_clusters_bg,
        })
    }

    /// 更新本帧 Uniform 与实例变换
    ///
    /// `update_culling_camera` 为 false 时剔除相机保持冻结（调试）。
    pub fn update(
        &mut self,
        queue: &wgpu::Queue,
        camera: &Camera,
        instances: &[Instance],
        config: &CullingConfig,
        settings: &RenderSettings,
        update_culling_camera: bool,
    ) {
        self.mesh.write_instances(queue, instances);
        self.frame
            .update(queue, camera, config, settings, update_culling_camera);
    }

    /// 录制本帧命令：清零参数 → 剔除派发 → 一次间接绘制
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        color_target: &wgpu::TextureView,
        depth_target: &wgpu::TextureView,
    ) {
        // 逐帧临时状态在使用前完全重新初始化
        self.mesh.indirect.reset(encoder);
        self.cull.encode(
            encoder,
            &self.cull_frame_bg,
            &self.cull_mesh_bg,
            &self.cull_candidates_bg,
            &self.cull_output_bg,
            self.mesh.num_candidates,
        );

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Cluster Render Pass (Indirect)"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_target,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.target.depth_clear_value()),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rpass.set_pipeline(self.raster.pipeline());
        rpass.set_bind_group(0, &self.render_frame_bg, &[]);
        rpass.set_bind_group(1, &self.render_mesh_bg, &[]);
        rpass.set_bind_group(2, &self.render_clusters_bg, &[]);
        rpass.draw_indirect(self.mesh.indirect.buffer(), 0);
    }

    /// 整体替换已绑定的网格
    ///
    /// 重新上传负载并重建内核与绑定组；下一次 encode 只会看到新网格。
    pub fn swap_mesh(
        &mut self,
        device: &wgpu::Device,
        hierarchy: &ClusterHierarchy,
    ) -> Result<(), UploadError> {
        let mesh = MeshBuffers::upload(device, hierarchy, self.mesh.num_instances)?;
        // 覆盖常量随网格变化，两条管线都要重建
        self.cull = ClusterCullKernel::new(device, mesh.max_cluster_triangles);
        self.raster = ClusterRenderKernel::new(
            device,
            &self.target,
            mesh.vertex_stride_floats,
            mesh.max_cluster_triangles,
        );
        self.cull_frame_bg = self.cull.frame_bind_group(device, &self.frame);
        self.cull_mesh_bg = self.cull.mesh_bind_group(device, &mesh);
        self.cull_candidates_bg = self.cull.candidates_bind_group(device, &mesh);
        self.cull_output_bg = self.cull.output_bind_group(device, &mesh);
        self.render_frame_bg = self.raster.frame_bind_group(device, &self.frame);
        self.render_mesh_bg = self.raster.mesh_bind_group(device, &mesh);
        self.render_clusters_bg = self.raster.clusters_bind_group(device, &mesh.visible);
        self.mesh = mesh;
        tracing::info!(clusters = self.mesh.num_clusters, "swapped cluster hierarchy");
        Ok(())
    }

    /// 已绑定的网格资源
    pub fn mesh(&self) -> &MeshBuffers {
        &self.mesh
    }
}

/// 直接变体：固定 LOD、无剔除阶段的基线
pub struct DirectClusterRenderer {
    target: RenderTargetConfig,
    mesh: MeshBuffers,
    frame: FrameUniforms,
    raster: ClusterRenderKernel,
    render_frame_bg: wgpu::BindGroup,
    render_mesh_bg: wgpu::BindGroup,
    lod_bind_groups: Vec<wgpu::BindGroup>,
    lod: u32,
}

impl DirectClusterRenderer {
    /// 加载层级并创建直接变体
    pub fn new(
        device: &wgpu::Device,
        hierarchy: &ClusterHierarchy,
        num_instances: u32,
        target: RenderTargetConfig,
    ) -> Result<Self, UploadError> {
        let mesh = MeshBuffers::upload(device, hierarchy, num_instances)?;
        let frame = FrameUniforms::new(device);
        let raster = ClusterRenderKernel::new(
            device,
            &target,
            mesh.vertex_stride_floats,
            mesh.max_cluster_triangles,
        );

        let render_frame_bg = raster.frame_bind_group(device, &frame);
        let render_mesh_bg = raster.mesh_bind_group(device, &mesh);
        let lod_bind_groups = mesh
            .lod_candidates
            .iter()
            .map(|buffer| raster.clusters_bind_group(device, buffer))
            .collect();

        Ok(Self {
            target,
            mesh,
            frame,
            raster,
            render_frame_bg,
            render_mesh_bg,
            lod_bind_groups,
            lod: 0,
        })
    }

    /// 更新本帧 Uniform 与实例变换；固定 LOD 取自渲染设置
    pub fn update(
        &mut self,
        queue: &wgpu::Queue,
        camera: &Camera,
        instances: &[Instance],
        config: &CullingConfig,
        settings: &RenderSettings,
        update_culling_camera: bool,
    ) {
        self.mesh.write_instances(queue, instances);
        self.frame
            .update(queue, camera, config, settings, update_culling_camera);
        // 请求的层级钳到有效范围
        self.lod = settings
            .lod
            .min(self.lod_bind_groups.len().saturating_sub(1) as u32);
    }

    /// 录制本帧命令：静态候选列表 1:1 映射到一次直接绘制
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        color_target: &wgpu::TextureView,
        depth_target: &wgpu::TextureView,
    ) {
        let lod = self.lod as usize;
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Cluster Render Pass (Direct)"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_target,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.target.depth_clear_value()),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rpass.set_pipeline(self.raster.pipeline());
        rpass.set_bind_group(0, &self.render_frame_bg, &[]);
        rpass.set_bind_group(1, &self.render_mesh_bg, &[]);
        rpass.set_bind_group(2, &self.lod_bind_groups[lod], &[]);
        rpass.draw(
            0..self.mesh.max_cluster_triangles * 3,
            0..self.mesh.lod_candidate_counts[lod],
        );
    }

    /// 整体替换已绑定的网格
    pub fn swap_mesh(
        &mut self,
        device: &wgpu::Device,
        hierarchy: &ClusterHierarchy,
    ) -> Result<(), UploadError> {
        let mesh = MeshBuffers::upload(device, hierarchy, self.mesh.num_instances)?;
        self.raster = ClusterRenderKernel::new(
            device,
            &self.target,
            mesh.vertex_stride_floats,
            mesh.max_cluster_triangles,
        );
        self.render_frame_bg = self.raster.frame_bind_group(device, &self.frame);
        self.render_mesh_bg = self.raster.mesh_bind_group(device, &mesh);
        self.lod_bind_groups = mesh
            .lod_candidates
            .iter()
            .map(|buffer| self.raster.clusters_bind_group(device, buffer))
            .collect();
        self.lod = self.lod.min(self.lod_bind_groups.len().saturating_sub(1) as u32);
        self.mesh = mesh;
        tracing::info!(clusters = self.mesh.num_clusters, "swapped cluster hierarchy");
        Ok(())
    }

    /// LOD 层级数
    pub fn num_lods(&self) -> usize {
        self.lod_bind_groups.len()
    }
}

/// 簇渲染器：选定变体的策略对象
pub enum ClusterRenderer {
    /// 固定 LOD 基线
    Direct(DirectClusterRenderer),
    /// 逐帧剔除 + 间接绘制（设计目标）
    Indirect(IndirectClusterRenderer),
}

impl ClusterRenderer {
    /// 创建直接变体
    pub fn new_direct(
        device: &wgpu::Device,
        hierarchy: &ClusterHierarchy,
        num_instances: u32,
        target: RenderTargetConfig,
    ) -> Result<Self, UploadError> {
        Ok(Self::Direct(DirectClusterRenderer::new(
            device,
            hierarchy,
            num_instances,
            target,
        )?))
    }

    /// 创建间接变体
    pub fn new_indirect(
        device: &wgpu::Device,
        hierarchy: &ClusterHierarchy,
        num_instances: u32,
        target: RenderTargetConfig,
    ) -> Result<Self, UploadError> {
        Ok(Self::Indirect(IndirectClusterRenderer::new(
            device,
            hierarchy,
            num_instances,
            target,
        )?))
    }

    /// 更新本帧 Uniform、实例与设置
    pub fn update(
        &mut self,
        queue: &wgpu::Queue,
        camera: &Camera,
        instances: &[Instance],
        config: &CullingConfig,
        settings: &RenderSettings,
        update_culling_camera: bool,
    ) {
        match self {
            Self::Direct(renderer) => renderer.update(
                queue,
                camera,
                instances,
                config,
                settings,
                update_culling_camera,
            ),
            Self::Indirect(renderer) => renderer.update(
                queue,
                camera,
                instances,
                config,
                settings,
                update_culling_camera,
            ),
        }
    }

    /// 录制本帧命令序列
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        color_target: &wgpu::TextureView,
        depth_target: &wgpu::TextureView,
    ) {
        match self {
            Self::Direct(renderer) => renderer.encode(encoder, color_target, depth_target),
            Self::Indirect(renderer) => renderer.encode(encoder, color_target, depth_target),
        }
    }

    /// 整体替换已绑定的网格
    pub fn swap_mesh(
        &mut self,
        device: &wgpu::Device,
        hierarchy: &ClusterHierarchy,
    ) -> Result<(), UploadError> {
        match self {
            Self::Direct(renderer) => renderer.swap_mesh(device, hierarchy),
            Self::Indirect(renderer) => renderer.swap_mesh(device, hierarchy),
        }
    }
}
