use std::collections::HashMap;

use ash::vk;
use ash::vk::Handle;
use itertools::Itertools;
use truvis_gfx::{
    gfx::Gfx,
    resources::{
        image::GfxImage,
        image_view::{GfxImageView, GfxImageViewDesc},
    },
};

use crate::{
    backend::RenderAbstraction,
    error::{EmbedError, EmbedResult},
    log_context::LogContext,
};

/// 渲染器可能使用的 color attachment 格式
const CANDIDATE_FORMATS: [vk::Format; 6] = [
    vk::Format::B8G8R8A8_UNORM,
    vk::Format::B8G8R8A8_SRGB,
    vk::Format::R8G8B8A8_UNORM,
    vk::Format::R8G8B8A8_SRGB,
    vk::Format::A2B10G10R10_UNORM_PACK32,
    vk::Format::R16G16B16A16_SFLOAT,
];

/// 可以作为渲染目标所需的 format features
const RENDER_TARGET_FEATURES: vk::FormatFeatureFlags = vk::FormatFeatureFlags::from_raw(
    vk::FormatFeatureFlags::COLOR_ATTACHMENT.as_raw() | vk::FormatFeatureFlags::TRANSFER_DST.as_raw(),
);

/// 基于 [`Gfx`] 的渲染抽象
///
/// 负责检查 target 的格式能否用于渲染，以及在宿主程序没有提供 view 时创建 view
pub struct GfxRa {
    /// format 是否可以渲染的缓存
    format_cache: HashMap<vk::Format, bool>,
}

/// 可以直接用于 dynamic rendering 的 target
pub struct GfxRaTarget {
    image: vk::Image,
    view: vk::ImageView,
    /// 宿主程序没有提供 view 时由 GfxRa 创建
    owned_view: Option<GfxImageView>,
    extent: vk::Extent2D,
    format: vk::Format,
}

// getters
impl GfxRaTarget {
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn owns_view(&self) -> bool {
        self.owned_view.is_some()
    }
}

// tools
impl GfxRaTarget {
    #[inline]
    pub fn render_area(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent: self.extent,
        }
    }

    #[inline]
    pub fn viewport(&self) -> vk::Viewport {
        vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    /// 在 `begin_frame` 之后，target 处于 `COLOR_ATTACHMENT_OPTIMAL`
    pub fn color_attachment(&self, clear_color: [f32; 4]) -> vk::RenderingAttachmentInfo<'static> {
        vk::RenderingAttachmentInfo::default()
            .image_view(self.view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue { float32: clear_color },
            })
    }
}

impl GfxRa {
    fn is_renderable(&mut self, gfx: &Gfx, format: vk::Format) -> bool {
        *self.format_cache.entry(format).or_insert_with(|| {
            !gfx.find_supported_format(&[format], vk::ImageTiling::OPTIMAL, RENDER_TARGET_FEATURES).is_empty()
        })
    }
}

impl RenderAbstraction<Gfx> for GfxRa {
    type Target = GfxRaTarget;

    fn create(gpu: &Gfx, log: &LogContext) -> EmbedResult<Self> {
        let renderable =
            gpu.find_supported_format(&CANDIDATE_FORMATS, vk::ImageTiling::OPTIMAL, RENDER_TARGET_FEATURES);
        if renderable.is_empty() {
            log.error(format_args!("none of the candidate formats can be used as a render target"));
            return Err(EmbedError::Unsupported("no renderable color format".to_string()));
        }
        log.debug(format_args!("renderable formats: {:?}", renderable));

        let format_cache = CANDIDATE_FORMATS.iter().map(|f| (*f, renderable.contains(f))).collect();
        Ok(Self { format_cache })
    }

    fn wrap_target(&mut self, gpu: &Gfx, texture: &GfxImage, view: vk::ImageView) -> EmbedResult<GfxRaTarget> {
        if !self.is_renderable(gpu, texture.format()) {
            return Err(EmbedError::Generic(format!("format {:?} can not be rendered to", texture.format())));
        }

        let owned_view = if view.is_null() {
            let view = GfxImageView::for_image(gpu.gfx_device(), texture, GfxImageViewDesc::color(texture.format()))
                .map_err(|e| EmbedError::Generic(format!("failed to create image view: {e}")))?;
            Some(view)
        } else {
            None
        };

        Ok(GfxRaTarget {
            image: texture.handle(),
            view: owned_view.as_ref().map_or(view, |v| v.handle()),
            owned_view,
            extent: texture.extent(),
            format: texture.format(),
        })
    }

    fn destroy_target(&mut self, _gpu: &Gfx, target: GfxRaTarget) {
        if let Some(view) = target.owned_view {
            view.destroy();
        }
    }

    fn destroy(self, _gpu: &Gfx) {
        log::debug!(
            "destroy GfxRa, cached formats: {:?}",
            self.format_cache.iter().filter(|(_, ok)| **ok).map(|(f, _)| f).sorted_by_key(|f| f.as_raw()).collect_vec()
        );
    }
}
