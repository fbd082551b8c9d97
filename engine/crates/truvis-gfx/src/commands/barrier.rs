use ash::vk;

/// barrier 使用的 src 和 dst 访问 mask
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GfxBarrierMask {
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
}

impl GfxBarrierMask {
    /// 宿主程序交过来的 image：之前的访问不可知，因此等待所有命令
    pub const ACQUIRE_FROM_HOST: Self = Self {
        src_stage: vk::PipelineStageFlags::ALL_COMMANDS,
        dst_stage: vk::PipelineStageFlags::from_raw(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT.as_raw() | vk::PipelineStageFlags::TRANSFER.as_raw(),
        ),
        src_access: vk::AccessFlags::MEMORY_WRITE,
        dst_access: vk::AccessFlags::from_raw(
            vk::AccessFlags::COLOR_ATTACHMENT_READ.as_raw()
                | vk::AccessFlags::COLOR_ATTACHMENT_WRITE.as_raw()
                | vk::AccessFlags::TRANSFER_WRITE.as_raw(),
        ),
    };

    /// 渲染结束，交还给宿主程序：之后的访问不可知
    pub const RELEASE_TO_HOST: Self = Self {
        src_stage: vk::PipelineStageFlags::from_raw(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT.as_raw() | vk::PipelineStageFlags::TRANSFER.as_raw(),
        ),
        dst_stage: vk::PipelineStageFlags::ALL_COMMANDS,
        src_access: vk::AccessFlags::from_raw(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE.as_raw() | vk::AccessFlags::TRANSFER_WRITE.as_raw(),
        ),
        dst_access: vk::AccessFlags::from_raw(
            vk::AccessFlags::MEMORY_READ.as_raw() | vk::AccessFlags::MEMORY_WRITE.as_raw(),
        ),
    };
}

/// 便捷创建 image memory barrier 的结构体
///
/// 只有一个 queue，因此 queue family 始终为 `QUEUE_FAMILY_IGNORED`
#[derive(Clone, Copy, Debug)]
pub struct GfxImageBarrier {
    inner: vk::ImageMemoryBarrier<'static>,
    src_stage: vk::PipelineStageFlags,
    dst_stage: vk::PipelineStageFlags,
}

impl Default for GfxImageBarrier {
    fn default() -> Self {
        Self {
            inner: vk::ImageMemoryBarrier {
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::UNDEFINED,
                src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_array_layer: 0,
                    layer_count: 1,
                    base_mip_level: 0,
                    level_count: 1,
                },
                ..Default::default()
            },
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        }
    }
}

impl GfxImageBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inner(&self) -> &vk::ImageMemoryBarrier<'static> {
        &self.inner
    }

    #[inline]
    pub fn src_stage(&self) -> vk::PipelineStageFlags {
        self.src_stage
    }

    #[inline]
    pub fn dst_stage(&self) -> vk::PipelineStageFlags {
        self.dst_stage
    }

    /// builder
    #[inline]
    pub fn layout_transfer(mut self, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> Self {
        self.inner.old_layout = old_layout;
        self.inner.new_layout = new_layout;
        self
    }

    /// builder
    #[inline]
    pub fn mask(mut self, mask: GfxBarrierMask) -> Self {
        self.src_stage = mask.src_stage;
        self.dst_stage = mask.dst_stage;
        self.inner.src_access_mask = mask.src_access;
        self.inner.dst_access_mask = mask.dst_access;
        self
    }

    /// builder
    #[inline]
    pub fn image(mut self, image: vk::Image) -> Self {
        self.inner.image = image;
        self
    }
}
