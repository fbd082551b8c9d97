use std::rc::Rc;

use ash::vk;

use crate::{
    commands::submit_info::GfxSubmitInfo,
    error::GfxResult,
    foundation::{debug_name::DebugType, device::GfxDevice},
};

#[derive(Clone, Debug)]
pub struct GfxQueueFamily {
    pub name: String,
    pub queue_family_index: u32,
    pub queue_flags: vk::QueueFlags,
    pub queue_count: u32,
}

/// 宿主程序传入的 queue
///
/// # destroy
/// queue 跟随 device 销毁，而 device 属于宿主程序，因此这里不需要任何销毁操作
pub struct GfxQueue {
    pub(crate) vk_queue: vk::Queue,
    pub(crate) queue_family: GfxQueueFamily,
    pub(crate) gfx_device: Rc<GfxDevice>,
}
impl DebugType for GfxQueue {
    fn debug_type_name() -> &'static str {
        "GfxQueue"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_queue
    }
}

// new & init
impl GfxQueue {
    pub fn new(vk_queue: vk::Queue, queue_family: GfxQueueFamily, gfx_device: Rc<GfxDevice>) -> Self {
        Self {
            vk_queue,
            queue_family,
            gfx_device,
        }
    }
}

// getter
impl GfxQueue {
    #[inline]
    pub fn queue_family(&self) -> &GfxQueueFamily {
        &self.queue_family
    }

    #[inline]
    pub fn handle(&self) -> vk::Queue {
        self.vk_queue
    }
}

// tools
impl GfxQueue {
    /// 提交一个 batch，不使用 fence，完成情况通过 timeline semaphore 追踪
    pub fn submit(&self, batch: &GfxSubmitInfo) -> GfxResult<()> {
        batch.with_submit_info(|submit_info| unsafe {
            self.gfx_device.queue_submit(self.vk_queue, std::slice::from_ref(submit_info), vk::Fence::null())
        })?;
        Ok(())
    }
}
