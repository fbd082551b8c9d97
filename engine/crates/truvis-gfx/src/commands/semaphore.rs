use std::rc::Rc;

use ash::vk;
use ash::vk::Handle;

use crate::{
    error::GfxResult,
    foundation::{debug_name::DebugType, device::GfxDevice},
};

/// 提交时使用的 semaphore 等待/信号信息
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxSemaphoreInfo {
    /// Vulkan semaphore 原始句柄
    pub semaphore: vk::Semaphore,
    /// 等待的 pipeline stage，signal 时不使用
    pub stage: vk::PipelineStageFlags,
    /// Timeline semaphore 的值（binary semaphore 为 None）
    pub value: Option<u64>,
}

impl GfxSemaphoreInfo {
    /// 不确定 semaphore 类型时使用：值对 binary semaphore 无效
    #[inline]
    pub fn new(semaphore: vk::Semaphore, stage: vk::PipelineStageFlags, value: u64) -> Self {
        Self {
            semaphore,
            stage,
            value: Some(value),
        }
    }

    #[inline]
    pub fn binary(semaphore: vk::Semaphore, stage: vk::PipelineStageFlags) -> Self {
        Self {
            semaphore,
            stage,
            value: None,
        }
    }
}

/// 由 gfx 层自己创建的 semaphore
pub struct GfxSemaphore {
    semaphore: vk::Semaphore,
    gfx_device: Rc<GfxDevice>,
}

// 创建与销毁
impl GfxSemaphore {
    pub fn new_timeline(gfx_device: Rc<GfxDevice>, initial_value: u64, debug_name: &str) -> GfxResult<Self> {
        let mut timeline_type_ci = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let timeline_semaphore_ci = vk::SemaphoreCreateInfo::default().push_next(&mut timeline_type_ci);
        let semaphore = unsafe { gfx_device.create_semaphore(&timeline_semaphore_ci, None)? };

        let semaphore = Self { semaphore, gfx_device };
        semaphore.gfx_device.set_debug_name(&semaphore, debug_name);
        Ok(semaphore)
    }

    #[inline]
    pub fn destroy(mut self) {
        unsafe {
            self.gfx_device.destroy_semaphore(self.semaphore, None);
        }
        self.semaphore = vk::Semaphore::null();
    }
}

// getters
impl GfxSemaphore {
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

// tools
impl GfxSemaphore {
    /// 查询 timeline 当前的值，不会阻塞
    #[inline]
    pub fn counter_value(&self) -> GfxResult<u64> {
        Ok(unsafe { self.gfx_device.get_semaphore_counter_value(self.semaphore)? })
    }

    /// 在 host 端阻塞，直到 timeline 的值达到 `timeline_value`
    #[inline]
    pub fn wait_timeline(&self, timeline_value: u64, timeout_ns: u64) -> GfxResult<()> {
        unsafe {
            let wait_semaphore = [self.semaphore];
            let wait_info = vk::SemaphoreWaitInfo::default()
                .semaphores(&wait_semaphore)
                .values(std::slice::from_ref(&timeline_value));
            self.gfx_device.wait_semaphores(&wait_info, timeout_ns)?;
        }
        Ok(())
    }
}

impl Drop for GfxSemaphore {
    fn drop(&mut self) {
        debug_assert!(self.semaphore.is_null(), "GfxSemaphore must be destroyed manually.");
    }
}

impl DebugType for GfxSemaphore {
    fn debug_type_name() -> &'static str {
        "GfxSemaphore"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.semaphore
    }
}
