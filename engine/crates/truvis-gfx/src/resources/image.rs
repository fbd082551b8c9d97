use ash::vk;
use ash::vk::Handle;

use crate::{
    error::{GfxError, GfxResult},
    foundation::debug_name::DebugType,
};

/// image 当前由谁使用
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GfxImageOwner {
    /// 宿主程序持有，渲染器不能访问
    User,
    /// 已经 release 给渲染器
    Renderer,
}

/// 包装外部 image 所需的信息
#[derive(Copy, Clone, Debug)]
pub struct GfxImageWrapInfo {
    pub image: vk::Image,
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
}

/// 宿主程序创建的 image
///
/// 内存不属于 GfxImage，因此 destroy 时只会丢弃 handle，不会调用 vkDestroyImage
pub struct GfxImage {
    handle: vk::Image,

    extent: vk::Extent2D,
    format: vk::Format,
    usage: vk::ImageUsageFlags,

    /// 渲染器记录的 layout
    layout: vk::ImageLayout,
    owner: GfxImageOwner,

    name: String,
}

// 创建与销毁
impl GfxImage {
    pub fn wrap(info: &GfxImageWrapInfo, debug_name: &str) -> GfxResult<Self> {
        if info.image.is_null() {
            return Err(GfxError::InvalidImage("image handle is null"));
        }
        if info.extent.width == 0 || info.extent.height == 0 {
            return Err(GfxError::InvalidImage("image extent is zero"));
        }

        Ok(Self {
            handle: info.image,
            extent: info.extent,
            format: info.format,
            usage: info.usage,
            layout: vk::ImageLayout::UNDEFINED,
            owner: GfxImageOwner::User,
            name: debug_name.to_string(),
        })
    }

    #[inline]
    pub fn destroy(mut self) {
        self.handle = vk::Image::null();
    }
}

// getters
impl GfxImage {
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.extent.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.extent.height
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn usage(&self) -> vk::ImageUsageFlags {
        self.usage
    }

    #[inline]
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }

    #[inline]
    pub fn owner(&self) -> GfxImageOwner {
        self.owner
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

// 所有权状态
impl GfxImage {
    /// 宿主程序把 image 交给渲染器，`layout` 是宿主程序声明的当前 layout
    ///
    /// 只支持单个 queue，`queue_family` 必须是 `QUEUE_FAMILY_IGNORED`
    pub fn release(&mut self, layout: vk::ImageLayout, queue_family: u32) {
        debug_assert_eq!(queue_family, vk::QUEUE_FAMILY_IGNORED, "queue family ownership transfer is not supported");
        self.layout = layout;
        self.owner = GfxImageOwner::Renderer;
    }

    /// 录制 barrier 之后更新记录的 layout
    #[inline]
    pub fn set_layout(&mut self, layout: vk::ImageLayout) {
        self.layout = layout;
    }

    /// 渲染完成，交还给宿主程序
    #[inline]
    pub fn return_to_user(&mut self) {
        self.owner = GfxImageOwner::User;
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.owner == GfxImageOwner::Renderer
    }

    /// 开始一帧，记录的 layout 变为 `COLOR_ATTACHMENT_OPTIMAL`，返回之前的 layout
    pub fn begin_render(&mut self) -> vk::ImageLayout {
        std::mem::replace(&mut self.layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
    }

    /// 本帧没有提交成功，录制的 barrier 都没有执行
    ///
    /// layout 恢复为开始渲染之前的值，并交还给宿主程序，需要重新 release 之后才能再次渲染
    pub fn abort_render(&mut self, layout_before_render: vk::ImageLayout) {
        self.layout = layout_before_render;
        self.owner = GfxImageOwner::User;
    }
}

impl Drop for GfxImage {
    fn drop(&mut self) {
        debug_assert!(self.handle.is_null(), "GfxImage must be destroyed manually.");
    }
}

impl DebugType for GfxImage {
    fn debug_type_name() -> &'static str {
        "GfxImage"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

impl std::fmt::Display for GfxImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GfxImage({}, {:?}, {}x{})", self.name, self.handle, self.extent.width, self.extent.height)
    }
}
