//! 间接绘制参数缓冲区
//!
//! 剔除与绘制共享的临时状态：每帧在剔除派发前清零，由剔除内核的
//! 原子计数器与常量写入填充，随后被同一提交里的间接绘制读取。

/// 间接绘制参数
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawIndirectArgs {
    /// 顶点数（每个可见簇的固定顶点预算）
    pub vertex_count: u32,
    /// 实例数（剔除内核的原子计数器）
    pub instance_count: u32,
    /// 第一个顶点
    pub first_vertex: u32,
    /// 第一个实例
    pub first_instance: u32,
}

impl DrawIndirectArgs {
    /// 缓冲区字节大小
    pub const SIZE: wgpu::BufferAddress = std::mem::size_of::<DrawIndirectArgs>() as u64;
}

/// 可复用的间接绘制参数缓冲区
///
/// 每帧复用同一块缓冲区而不是重新分配；清零发生在命令序列内部，
/// 先于剔除派发，消除上一帧残留数据。
pub struct IndirectArgsBuffer {
    buffer: wgpu::Buffer,
}

impl IndirectArgsBuffer {
    /// 创建间接绘制参数缓冲区
    pub fn new(device: &wgpu::Device) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cluster Indirect Args"),
            size: DrawIndirectArgs::SIZE,
            usage: wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self { buffer }
    }

    /// 在剔除派发前清零本帧参数
    pub fn reset(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_buffer(&self.buffer, 0, None);
    }

    /// 获取缓冲区
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}
