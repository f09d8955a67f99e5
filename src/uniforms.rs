//! 每帧 Uniform 更新
//!
//! 推导并上传相机矩阵、5 个视锥平面与剔除配置。剔除相机可以独立于
//! 显示相机冻结（调试用），由每次更新的布尔开关控制。

use crate::frustum::Frustum;
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// 调用方提供的相机状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// 视图矩阵
    pub view: Mat4,
    /// 投影矩阵
    pub projection: Mat4,
    /// 世界空间位置
    pub position: Vec3,
}

impl Camera {
    /// 视图投影矩阵
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            position: Vec3::ZERO,
        }
    }
}

/// 剔除配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CullingConfig {
    /// 分辨率缩放：屏幕误差 = 投影误差 × resolution_scale
    pub resolution_scale: f32,
    /// 近平面距离，误差投影的距离下限
    pub z_near: f32,
    /// 屏幕空间误差阈值（像素）
    pub error_threshold: f32,
    /// 误差包围球半径缩放
    pub radius_scale: f32,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            resolution_scale: 1.0,
            z_near: 0.01,
            error_threshold: 1.0,
            radius_scale: 1.0,
        }
    }
}

/// 渲染模式：可见簇的调试着色方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderMode {
    /// 每簇一个稳定的哈希伪随机颜色
    #[default]
    ClusterColor,
    /// 按打包的 (簇索引, 三角形索引) 标识着色，可视化三角形边界
    ClusterTriangleId,
}

impl RenderMode {
    /// uniform 中的模式编号
    pub fn as_uniform(self) -> u32 {
        match self {
            RenderMode::ClusterColor => 0,
            RenderMode::ClusterTriangleId => 1,
        }
    }
}

/// 渲染设置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RenderSettings {
    /// 调试着色模式
    pub mode: RenderMode,
    /// 直接变体使用的固定 LOD 层级（间接变体忽略）
    pub lod: u32,
}

/// 剔除阶段相机 Uniform
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CullCameraUniforms {
    /// 视图矩阵
    pub view: [[f32; 4]; 4],
    /// 投影矩阵
    pub projection: [[f32; 4]; 4],
    /// 相机世界位置
    pub position: [f32; 3],
    /// 填充
    pub _pad: f32,
    /// 视锥平面（左、右、上、下、远）
    pub frustum: [[f32; 4]; 5],
}

impl CullCameraUniforms {
    /// 从相机状态推导剔除相机快照
    pub fn from_camera(camera: &Camera) -> Self {
        Self {
            view: camera.view.to_cols_array_2d(),
            projection: camera.projection.to_cols_array_2d(),
            position: camera.position.to_array(),
            _pad: 0.0,
            frustum: Frustum::from_view_projection(camera.view_projection()).to_raw(),
        }
    }
}

/// 光栅化阶段相机 Uniform
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RenderCameraUniforms {
    /// 视图矩阵
    pub view: [[f32; 4]; 4],
    /// 投影矩阵
    pub projection: [[f32; 4]; 4],
}

impl RenderCameraUniforms {
    /// 从相机状态推导光栅化相机快照
    pub fn from_camera(camera: &Camera) -> Self {
        Self {
            view: camera.view.to_cols_array_2d(),
            projection: camera.projection.to_cols_array_2d(),
        }
    }
}

/// 误差投影参数 Uniform
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CullingParamsUniform {
    /// 分辨率缩放
    pub resolution_scale: f32,
    /// 近平面距离
    pub z_near: f32,
    /// 误差阈值
    pub threshold: f32,
    /// 半径缩放
    pub radius_scale: f32,
}

impl From<CullingConfig> for CullingParamsUniform {
    fn from(config: CullingConfig) -> Self {
        Self {
            resolution_scale: config.resolution_scale,
            z_near: config.z_near,
            threshold: config.error_threshold,
            radius_scale: config.radius_scale,
        }
    }
}

/// 渲染设置 Uniform
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RenderSettingsUniform {
    /// 渲染模式编号
    pub mode: u32,
    /// 填充
    pub _pad: [u32; 3],
}

/// 每帧 Uniform 缓冲区集合
pub struct FrameUniforms {
    cull_camera_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,
    render_camera_buffer: wgpu::Buffer,
    settings_buffer: wgpu::Buffer,
    /// 剔除相机尚未写入过（首帧强制写入，即便调用方要求冻结）
    culling_initialized: bool,
}

impl FrameUniforms {
    /// 创建每帧 Uniform 缓冲区
    pub fn new(device: &wgpu::Device) -> Self {
        let make_uniform = |label: &str, size: usize| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: size as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        Self {
            cull_camera_buffer: make_uniform(
                "Cull Camera Uniforms",
                std::mem::size_of::<CullCameraUniforms>(),
            ),
            params_buffer: make_uniform(
                "Culling Params",
                std::mem::size_of::<CullingParamsUniform>(),
            ),
            render_camera_buffer: make_uniform(
                "Render Camera Uniforms",
                std::mem::size_of::<RenderCameraUniforms>(),
            ),
            settings_buffer: make_uniform(
                "Render Settings",
                std::mem::size_of::<RenderSettingsUniform>(),
            ),
            culling_initialized: false,
        }
    }

    /// 上传本帧 Uniform
    ///
    /// 显示相机与渲染设置每帧更新；剔除相机与剔除参数仅在
    /// `update_culling_camera` 为 true（或首帧）时更新，否则保持上一次
    /// 的快照（冻结剔除相机调试）。
    pub fn update(
        &mut self,
        queue: &wgpu::Queue,
        camera: &Camera,
        config: &CullingConfig,
        settings: &RenderSettings,
        update_culling_camera: bool,
    ) {
        queue.write_buffer(
            &self.render_camera_buffer,
            0,
            bytemuck::bytes_of(&RenderCameraUniforms::from_camera(camera)),
        );
        queue.write_buffer(
            &self.settings_buffer,
            0,
            bytemuck::bytes_of(&RenderSettingsUniform {
                mode: settings.mode.as_uniform(),
                _pad: [0; 3],
            }),
        );

        if update_culling_camera || !self.culling_initialized {
            queue.write_buffer(
                &self.cull_camera_buffer,
                0,
                bytemuck::bytes_of(&CullCameraUniforms::from_camera(camera)),
            );
            queue.write_buffer(
                &self.params_buffer,
                0,
                bytemuck::bytes_of(&CullingParamsUniform::from(*config)),
            );
            self.culling_initialized = true;
        }
    }

    /// 剔除相机 Uniform 缓冲区
    pub fn cull_camera_buffer(&self) -> &wgpu::Buffer {
        &self.cull_camera_buffer
    }

    /// 剔除参数 Uniform 缓冲区
    pub fn params_buffer(&self) -> &wgpu::Buffer {
        &self.params_buffer
    }

    /// 光栅化相机 Uniform 缓冲区
    pub fn render_camera_buffer(&self) -> &wgpu::Buffer {
        &self.render_camera_buffer
    }

    /// 渲染设置 Uniform 缓冲区
    pub fn settings_buffer(&self) -> &wgpu::Buffer {
        &self.settings_buffer
    }
}
