use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::{
    commands::barrier::GfxImageBarrier,
    error::GfxResult,
    foundation::{debug_name::DebugType, device::GfxDevice},
};

/// 从 [`GfxCommandPool`](crate::commands::command_pool::GfxCommandPool) 分配的 command buffer
///
/// 跟随 pool 一起释放，因此没有单独的 destroy
#[derive(Clone)]
pub struct GfxCommandBuffer {
    vk_handle: vk::CommandBuffer,
    name: String,

    gfx_device: Rc<GfxDevice>,
}

impl GfxCommandBuffer {
    pub(crate) fn new(vk_handle: vk::CommandBuffer, gfx_device: Rc<GfxDevice>, name: &str) -> Self {
        Self {
            vk_handle,
            name: name.to_string(),
            gfx_device,
        }
    }
}

// getters
impl GfxCommandBuffer {
    #[inline]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        self.vk_handle
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 录制其他命令时使用的函数表
    #[inline]
    pub fn device(&self) -> &ash::Device {
        self.gfx_device.ash_device()
    }
}

// 生命周期
impl GfxCommandBuffer {
    #[inline]
    pub fn begin(&self, usage_flag: vk::CommandBufferUsageFlags) -> GfxResult<()> {
        let _span = crate::gfx_span!("GfxCommandBuffer::begin");
        unsafe {
            self.gfx_device
                .begin_command_buffer(self.vk_handle, &vk::CommandBufferBeginInfo::default().flags(usage_flag))?;
        }
        Ok(())
    }

    #[inline]
    pub fn end(&self) -> GfxResult<()> {
        unsafe { self.gfx_device.end_command_buffer(self.vk_handle)? };
        Ok(())
    }

    /// 需要 pool 带有 `RESET_COMMAND_BUFFER` 标志
    #[inline]
    pub fn reset(&self) -> GfxResult<()> {
        unsafe {
            self.gfx_device
                .reset_command_buffer(self.vk_handle, vk::CommandBufferResetFlags::empty())?;
        }
        Ok(())
    }
}

// 绘制类型命令
impl GfxCommandBuffer {
    #[inline]
    pub fn cmd_begin_rendering(&self, render_info: &vk::RenderingInfo) {
        unsafe {
            self.gfx_device.cmd_begin_rendering(self.vk_handle, render_info);
        }
    }

    #[inline]
    pub fn cmd_end_rendering(&self) {
        unsafe {
            self.gfx_device.cmd_end_rendering(self.vk_handle);
        }
    }
}

// 同步命令
impl GfxCommandBuffer {
    /// 所有 barrier 的 stage 会合并到一次 vkCmdPipelineBarrier 中
    pub fn image_memory_barrier(&self, barriers: &[GfxImageBarrier]) {
        if barriers.is_empty() {
            return;
        }

        let src_stage = barriers.iter().fold(vk::PipelineStageFlags::empty(), |acc, b| acc | b.src_stage());
        let dst_stage = barriers.iter().fold(vk::PipelineStageFlags::empty(), |acc, b| acc | b.dst_stage());
        let image_barriers = barriers.iter().map(|b| *b.inner()).collect_vec();
        unsafe {
            self.gfx_device.cmd_pipeline_barrier(
                self.vk_handle,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &image_barriers,
            );
        }
    }
}

impl DebugType for GfxCommandBuffer {
    fn debug_type_name() -> &'static str {
        "GfxCommandBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_handle
    }
}
