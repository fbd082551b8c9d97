//! 渲染上下文依赖的两个协作层
//!
//! - [`GpuCapability`]：设备导入、外部 image 包装、帧提交与完成计数
//! - [`RenderAbstraction`]：把 capability 层的 texture 变成渲染器可以绘制的 target
//!
//! Vulkan 实现位于 [`vulkan`]，测试使用 `fake` 中不依赖设备的实现。

use ash::vk;

use crate::{error::EmbedResult, log_context::LogContext};

#[cfg(test)]
pub(crate) mod fake;
pub mod vulkan;

/// 导入时请求的 queue，目前只会请求一个 graphics queue
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueueRequest {
    pub family_index: u32,
    pub count: u32,
}

/// 交给 capability 层的导入描述
pub struct ImportDescriptor<'a> {
    pub vk_entry: ash::Entry,
    pub instance: vk::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: vk::Device,
    pub queue: vk::Queue,
    pub queue_graphics: QueueRequest,
    /// 为 None 时假定必要的 features 已经开启
    pub features: Option<&'a vk::PhysicalDeviceFeatures2<'a>>,
}

/// 包装外部 image 所需的信息
#[derive(Copy, Clone, Debug)]
pub struct TextureWrapInfo {
    pub image: vk::Image,
    pub width: u32,
    pub height: u32,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
}

/// 把 texture 从宿主程序交给渲染器
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TextureRelease {
    /// 宿主程序声明的当前 layout
    pub layout: vk::ImageLayout,
    /// 单 queue，始终为 `QUEUE_FAMILY_IGNORED`
    pub queue_family: u32,
}

/// 宿主程序提供的 semaphore 以及对应的值（binary semaphore 忽略该值）
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SyncPoint {
    pub semaphore: vk::Semaphore,
    pub value: u64,
}

/// 导入之后得到的设备能力信息
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GpuCaps {
    pub api_version: u32,
    pub device_name: String,
    /// features 是否由宿主程序给出的链检查过
    pub features_verified: bool,
    /// 支持 video decode 的 queue family，仅上报
    pub video_decode_queue_family: Option<u32>,
    pub video_decode_extensions: Vec<String>,
}

pub trait GpuTexture {
    fn image(&self) -> vk::Image;
    fn extent(&self) -> vk::Extent2D;
    fn format(&self) -> vk::Format;
    /// 渲染器记录的当前 layout
    fn layout(&self) -> vk::ImageLayout;
}

/// GPU capability 层
pub trait GpuCapability: Sized {
    type Texture: GpuTexture;
    /// 录制命令使用的对象
    type Recorder;

    /// # Safety
    /// `desc` 中的 handle 必须合法，并且在返回对象的整个生命周期内保持有效
    unsafe fn import(log: &LogContext, desc: &ImportDescriptor<'_>) -> EmbedResult<Self>;

    fn caps(&self) -> GpuCaps;

    fn wrap(&self, info: &TextureWrapInfo) -> EmbedResult<Self::Texture>;
    fn release(&self, texture: &mut Self::Texture, release: TextureRelease);
    fn destroy_texture(&self, texture: Self::Texture);

    /// 开始一帧，texture 转换为可以作为 color attachment 的 layout
    fn begin_frame(&mut self, texture: &mut Self::Texture) -> EmbedResult<&Self::Recorder>;
    /// 结束并提交一帧，返回本次提交的完成计数
    fn submit(
        &mut self,
        texture: &mut Self::Texture,
        final_layout: vk::ImageLayout,
        wait: Option<SyncPoint>,
        signal: Option<SyncPoint>,
    ) -> EmbedResult<u64>;

    /// 当前的完成计数
    fn completed(&self) -> EmbedResult<u64>;
    /// 阻塞直到完成计数达到 `value`
    fn wait(&self, value: u64) -> EmbedResult<()>;
    /// 等待所有已提交的工作
    fn finish(&self) -> EmbedResult<()>;

    fn destroy(self);
}

/// 渲染抽象层，由 capability 层创建
pub trait RenderAbstraction<G: GpuCapability>: Sized {
    type Target;

    fn create(gpu: &G, log: &LogContext) -> EmbedResult<Self>;

    /// `view` 为 null 时由渲染抽象层自己创建
    fn wrap_target(&mut self, gpu: &G, texture: &G::Texture, view: vk::ImageView) -> EmbedResult<Self::Target>;
    fn destroy_target(&mut self, gpu: &G, target: Self::Target);

    fn destroy(self, gpu: &G);
}
