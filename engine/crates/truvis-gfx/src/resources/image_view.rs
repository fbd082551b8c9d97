use std::rc::Rc;

use ash::vk;
use ash::vk::Handle;

use crate::{
    error::{GfxError, GfxResult},
    foundation::{debug_name::DebugType, device::GfxDevice},
    resources::image::GfxImage,
};

/// 宿主程序没有提供 view 时，由渲染器为外部 image 创建的 view
///
/// view 属于渲染器，image 仍然属于宿主程序。需要在 image 被 forget 之前调用 [`GfxImageView::destroy`]
pub struct GfxImageView {
    handle: vk::ImageView,
    /// view 所指向的外部 image
    image: vk::Image,
    desc: GfxImageViewDesc,

    name: String,
    gfx_device: Rc<GfxDevice>,
}

// 创建与销毁
impl GfxImageView {
    /// 为已经包装好的外部 image 创建 view
    pub fn for_image(gfx_device: &Rc<GfxDevice>, image: &GfxImage, desc: GfxImageViewDesc) -> GfxResult<Self> {
        if image.handle().is_null() || desc.format == vk::Format::UNDEFINED {
            return Err(GfxError::InvalidImage("image view needs a live image and a defined format"));
        }

        let view_ci = vk::ImageViewCreateInfo::default()
            .image(image.handle())
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(desc.format)
            .components(vk::ComponentMapping::default())
            .subresource_range(desc.subresource_range());
        let handle = unsafe { gfx_device.create_image_view(&view_ci, None)? };

        let view = Self {
            handle,
            image: image.handle(),
            desc,
            name: format!("{}-view", image.name()),
            gfx_device: gfx_device.clone(),
        };
        gfx_device.set_debug_name(&view, &view.name);
        log::debug!("created {} for {}", view, image);
        Ok(view)
    }

    pub fn destroy(mut self) {
        log::debug!("destroy {}", self);
        unsafe {
            self.gfx_device.destroy_image_view(self.handle, None);
        }
        self.handle = vk::ImageView::null();
    }
}
impl Drop for GfxImageView {
    fn drop(&mut self) {
        debug_assert!(self.handle.is_null(), "GfxImageView must be destroyed manually.");
    }
}

// getters
impl GfxImageView {
    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.handle
    }

    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn desc(&self) -> &GfxImageViewDesc {
        &self.desc
    }
}
impl DebugType for GfxImageView {
    fn debug_type_name() -> &'static str {
        "GfxImageView"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl std::fmt::Display for GfxImageView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ImageView({}, {:?}, {:?})", self.name, self.handle, self.desc.format)
    }
}

/// render target 只会用到第 0 个 mip 以及第 0 个 layer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GfxImageViewDesc {
    /// 可以与 image 的 format 不同，只要二者兼容
    pub(crate) format: vk::Format,
    pub(crate) aspect_mask: vk::ImageAspectFlags,
}
impl GfxImageViewDesc {
    /// 用作 color attachment 的 view
    pub fn color(format: vk::Format) -> Self {
        Self {
            format,
            aspect_mask: vk::ImageAspectFlags::COLOR,
        }
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn aspect_mask(&self) -> vk::ImageAspectFlags {
        self.aspect_mask
    }

    #[inline]
    fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect_mask,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_desc_covers_first_subresource() {
        let desc = GfxImageViewDesc::color(vk::Format::R8G8B8A8_SRGB);
        assert_eq!(desc.format(), vk::Format::R8G8B8A8_SRGB);
        assert_eq!(desc.aspect_mask(), vk::ImageAspectFlags::COLOR);

        let range = desc.subresource_range();
        assert_eq!((range.base_mip_level, range.level_count), (0, 1));
        assert_eq!((range.base_array_layer, range.layer_count), (0, 1));
    }
}
