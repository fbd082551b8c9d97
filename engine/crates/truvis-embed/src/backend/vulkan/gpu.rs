use ash::vk;
use truvis_gfx::{
    commands::{command_buffer::GfxCommandBuffer, semaphore::GfxSemaphoreInfo},
    error::format_api_version,
    gfx::{Gfx, GfxImportInfo},
    resources::image::{GfxImage, GfxImageWrapInfo},
};

use crate::{
    backend::{GpuCapability, GpuCaps, GpuTexture, ImportDescriptor, SyncPoint, TextureRelease, TextureWrapInfo},
    error::{EmbedError, EmbedResult},
    log_context::LogContext,
};

impl GpuTexture for GfxImage {
    #[inline]
    fn image(&self) -> vk::Image {
        self.handle()
    }

    #[inline]
    fn extent(&self) -> vk::Extent2D {
        GfxImage::extent(self)
    }

    #[inline]
    fn format(&self) -> vk::Format {
        GfxImage::format(self)
    }

    #[inline]
    fn layout(&self) -> vk::ImageLayout {
        GfxImage::layout(self)
    }
}

/// 宿主程序的 semaphore 在任意 stage 之前等待
#[inline]
fn to_semaphore_info(point: SyncPoint) -> GfxSemaphoreInfo {
    GfxSemaphoreInfo::new(point.semaphore, vk::PipelineStageFlags::ALL_COMMANDS, point.value)
}

impl GpuCapability for Gfx {
    type Texture = GfxImage;
    type Recorder = GfxCommandBuffer;

    unsafe fn import(log: &LogContext, desc: &ImportDescriptor<'_>) -> EmbedResult<Self> {
        if desc.queue_graphics.count != 1 {
            return Err(EmbedError::Unsupported(format!(
                "exactly one graphics queue is supported, {} requested",
                desc.queue_graphics.count
            )));
        }

        let import_info = GfxImportInfo {
            vk_entry: desc.vk_entry.clone(),
            instance: desc.instance,
            physical_device: desc.physical_device,
            device: desc.device,
            queue: desc.queue,
            queue_family_index: desc.queue_graphics.family_index,
            features: desc.features,
        };
        let gfx = unsafe { Gfx::import(&import_info) }.map_err(|e| {
            log.error(format_args!("failed to import vulkan device: {e}"));
            EmbedError::Unsupported(e.to_string())
        })?;

        log.info(format_args!(
            "imported vulkan device: {}, api {}",
            gfx.physical_device().device_name(),
            format_api_version(gfx.physical_device().api_version())
        ));
        Ok(gfx)
    }

    fn caps(&self) -> GpuCaps {
        let physical_device = self.physical_device();
        GpuCaps {
            api_version: physical_device.api_version(),
            device_name: physical_device.device_name(),
            features_verified: self.features_verified(),
            video_decode_queue_family: physical_device.video_decode_queue_family().map(|f| f.queue_family_index),
            video_decode_extensions: physical_device.video_decode_exts().to_vec(),
        }
    }

    fn wrap(&self, info: &TextureWrapInfo) -> EmbedResult<Self::Texture> {
        let wrap_info = GfxImageWrapInfo {
            image: info.image,
            extent: vk::Extent2D {
                width: info.width,
                height: info.height,
            },
            format: info.format,
            usage: info.usage,
        };
        self.wrap_image(&wrap_info, "embed-target").map_err(|e| EmbedError::Generic(e.to_string()))
    }

    #[inline]
    fn release(&self, texture: &mut Self::Texture, release: TextureRelease) {
        self.release_image(texture, release.layout, release.queue_family);
    }

    #[inline]
    fn destroy_texture(&self, texture: Self::Texture) {
        self.destroy_image(texture);
    }

    fn begin_frame(&mut self, texture: &mut Self::Texture) -> EmbedResult<&Self::Recorder> {
        Gfx::begin_frame(self, texture).map_err(|e| EmbedError::Generic(e.to_string()))
    }

    fn submit(
        &mut self,
        texture: &mut Self::Texture,
        final_layout: vk::ImageLayout,
        wait: Option<SyncPoint>,
        signal: Option<SyncPoint>,
    ) -> EmbedResult<u64> {
        self.submit_frame(texture, final_layout, wait.map(to_semaphore_info), signal.map(to_semaphore_info))
            .map_err(|e| EmbedError::Generic(e.to_string()))
    }

    #[inline]
    fn completed(&self) -> EmbedResult<u64> {
        Gfx::completed(self).map_err(|e| EmbedError::Generic(e.to_string()))
    }

    #[inline]
    fn wait(&self, value: u64) -> EmbedResult<()> {
        Gfx::wait(self, value).map_err(|e| EmbedError::Generic(e.to_string()))
    }

    #[inline]
    fn finish(&self) -> EmbedResult<()> {
        Gfx::finish(self).map_err(|e| EmbedError::Generic(e.to_string()))
    }

    #[inline]
    fn destroy(self) {
        Gfx::destroy(self);
    }
}
