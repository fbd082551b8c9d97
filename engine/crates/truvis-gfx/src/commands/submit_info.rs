use ash::vk;
use itertools::Itertools;

use crate::commands::{command_buffer::GfxCommandBuffer, semaphore::GfxSemaphoreInfo};

/// Gfx 关于 submitInfo 的封装，更易用
///
/// 外部 device 不一定开启了 synchronization2，因此使用 vkQueueSubmit，
/// timeline semaphore 的值通过 `VkTimelineSemaphoreSubmitInfo` 传入。
/// 对于 binary semaphore，驱动会忽略对应的值。
#[derive(Default)]
pub struct GfxSubmitInfo {
    command_buffers: Vec<vk::CommandBuffer>,

    wait_semaphores: Vec<vk::Semaphore>,
    wait_stages: Vec<vk::PipelineStageFlags>,
    wait_values: Vec<u64>,

    signal_semaphores: Vec<vk::Semaphore>,
    signal_values: Vec<u64>,
}

impl GfxSubmitInfo {
    pub fn new(commands: &[GfxCommandBuffer]) -> Self {
        Self {
            command_buffers: commands.iter().map(|cmd| cmd.vk_handle()).collect_vec(),
            ..Default::default()
        }
    }

    #[inline]
    pub fn wait(mut self, info: &GfxSemaphoreInfo) -> Self {
        self.wait_semaphores.push(info.semaphore);
        self.wait_stages.push(info.stage);
        self.wait_values.push(info.value.unwrap_or_default());
        self
    }

    #[inline]
    pub fn signal(mut self, info: &GfxSemaphoreInfo) -> Self {
        self.signal_semaphores.push(info.semaphore);
        self.signal_values.push(info.value.unwrap_or_default());
        self
    }

    /// 构造出的 vk::SubmitInfo 引用了 self 内部的数组，因此只在回调中有效
    pub fn with_submit_info<R>(&self, f: impl FnOnce(&vk::SubmitInfo<'_>) -> R) -> R {
        let mut timeline_info = vk::TimelineSemaphoreSubmitInfo::default()
            .wait_semaphore_values(&self.wait_values)
            .signal_semaphore_values(&self.signal_values);
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&self.wait_semaphores)
            .wait_dst_stage_mask(&self.wait_stages)
            .command_buffers(&self.command_buffers)
            .signal_semaphores(&self.signal_semaphores)
            .push_next(&mut timeline_info);
        f(&submit_info)
    }
}

// getters
impl GfxSubmitInfo {
    #[inline]
    pub fn wait_semaphores(&self) -> &[vk::Semaphore] {
        &self.wait_semaphores
    }

    #[inline]
    pub fn signal_semaphores(&self) -> &[vk::Semaphore] {
        &self.signal_semaphores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_values_follow_semaphores() {
        let caller_wait = vk::Semaphore::from_raw(0x10);
        let caller_signal = vk::Semaphore::from_raw(0x20);
        let timeline = vk::Semaphore::from_raw(0x30);

        let batch = GfxSubmitInfo::default()
            .wait(&GfxSemaphoreInfo::binary(caller_wait, vk::PipelineStageFlags::ALL_COMMANDS))
            .signal(&GfxSemaphoreInfo::new(caller_signal, vk::PipelineStageFlags::ALL_COMMANDS, 7))
            .signal(&GfxSemaphoreInfo::new(timeline, vk::PipelineStageFlags::ALL_COMMANDS, 3));

        batch.with_submit_info(|info| {
            assert_eq!(info.wait_semaphore_count, 1);
            assert_eq!(info.signal_semaphore_count, 2);
            assert_eq!(info.command_buffer_count, 0);

            let timeline_info = unsafe { &*(info.p_next as *const vk::TimelineSemaphoreSubmitInfo<'_>) };
            assert_eq!(timeline_info.wait_semaphore_value_count, 1);
            assert_eq!(timeline_info.signal_semaphore_value_count, 2);

            let wait_values = unsafe { std::slice::from_raw_parts(timeline_info.p_wait_semaphore_values, 1) };
            let signal_values = unsafe { std::slice::from_raw_parts(timeline_info.p_signal_semaphore_values, 2) };
            // binary semaphore 的值为 0
            assert_eq!(wait_values, &[0]);
            assert_eq!(signal_values, &[7, 3]);
        });
        assert_eq!(batch.signal_semaphores(), &[caller_signal, timeline]);
    }

    #[test]
    fn test_empty_batch() {
        let batch = GfxSubmitInfo::default();
        batch.with_submit_info(|info| {
            assert_eq!(info.wait_semaphore_count, 0);
            assert_eq!(info.signal_semaphore_count, 0);
        });
        assert!(batch.wait_semaphores().is_empty());
    }
}
