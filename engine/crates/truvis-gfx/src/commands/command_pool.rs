use std::rc::Rc;

use ash::vk;
use ash::vk::Handle;

use crate::{
    commands::{command_buffer::GfxCommandBuffer, queue::GfxQueueFamily},
    error::GfxResult,
    foundation::{debug_name::DebugType, device::GfxDevice},
};

pub struct GfxCommandPool {
    handle: vk::CommandPool,
    queue_family_index: u32,

    gfx_device: Rc<GfxDevice>,
}

// 创建与销毁
impl GfxCommandPool {
    pub fn new(
        gfx_device: Rc<GfxDevice>,
        queue_family: &GfxQueueFamily,
        flags: vk::CommandPoolCreateFlags,
        debug_name: &str,
    ) -> GfxResult<Self> {
        let pool_ci = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family.queue_family_index)
            .flags(flags);
        let handle = unsafe { gfx_device.create_command_pool(&pool_ci, None)? };

        let command_pool = Self {
            handle,
            queue_family_index: queue_family.queue_family_index,
            gfx_device,
        };
        command_pool.gfx_device.set_debug_name(&command_pool, debug_name);
        Ok(command_pool)
    }

    /// 销毁 pool 时，从中分配的 command buffer 会一起释放
    #[inline]
    pub fn destroy(mut self) {
        unsafe {
            self.gfx_device.destroy_command_pool(self.handle, None);
        }
        self.handle = vk::CommandPool::null();
    }
}

// getters
impl GfxCommandPool {
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }

    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }
}

// tools
impl GfxCommandPool {
    pub fn allocate(&self, debug_name: &str) -> GfxResult<GfxCommandBuffer> {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.handle)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffer = unsafe { self.gfx_device.allocate_command_buffers(&info)?[0] };
        let command_buffer = GfxCommandBuffer::new(command_buffer, self.gfx_device.clone(), debug_name);
        self.gfx_device.set_debug_name(&command_buffer, debug_name);
        Ok(command_buffer)
    }
}

impl Drop for GfxCommandPool {
    fn drop(&mut self) {
        debug_assert!(self.handle.is_null(), "GfxCommandPool must be destroyed manually.");
    }
}

impl DebugType for GfxCommandPool {
    fn debug_type_name() -> &'static str {
        "GfxCommandPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
