//! 宿主程序与渲染器之间的同步
//!
//! 宿主程序给出 semaphore 时，在 GPU 上等待/signal，调用线程不会阻塞；
//! 否则在 host 上阻塞，直到本帧的提交执行完成。
//!
//! 等待一个永远不会被 signal 的 semaphore 属于宿主程序的使用错误，这里不做检测。

use ash::vk;
use ash::vk::Handle;

use crate::{
    backend::{GpuCapability, SyncPoint},
    error::EmbedResult,
    log_context::LogContext,
};

/// 宿主程序每帧提供的同步信息，只在一次 finish 中有效
///
/// 任一侧的 semaphore 为 null 时跳过该侧的同步。value 对 binary semaphore 无效。
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct VulkanSync {
    pub wait_semaphore: vk::Semaphore,
    pub wait_value: u64,
    pub signal_semaphore: vk::Semaphore,
    pub signal_value: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SyncMode {
    /// 在 GPU 上等待和 signal 宿主程序的 semaphore
    Semaphores,
    /// 在 host 上等待本帧完成
    Blocking,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SyncPlan {
    pub wait: Option<SyncPoint>,
    pub signal: Option<SyncPoint>,
}

impl SyncPlan {
    pub fn from_sync(sync: Option<&VulkanSync>) -> Self {
        let Some(sync) = sync else {
            return Self { wait: None, signal: None };
        };

        let point = |semaphore: vk::Semaphore, value: u64| {
            (!semaphore.is_null()).then_some(SyncPoint { semaphore, value })
        };
        Self {
            wait: point(sync.wait_semaphore, sync.wait_value),
            signal: point(sync.signal_semaphore, sync.signal_value),
        }
    }

    #[inline]
    pub fn mode(&self) -> SyncMode {
        if self.wait.is_some() || self.signal.is_some() {
            SyncMode::Semaphores
        } else {
            SyncMode::Blocking
        }
    }
}

/// 一帧提交的结果
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameSubmission {
    /// 本帧提交对应的完成计数
    pub value: u64,
    pub mode: SyncMode,
}

/// 提交一帧，不等待
pub(crate) fn submit_frame<G: GpuCapability>(
    gpu: &mut G,
    texture: &mut G::Texture,
    final_layout: vk::ImageLayout,
    plan: &SyncPlan,
    log: &LogContext,
) -> EmbedResult<FrameSubmission> {
    let value = gpu.submit(texture, final_layout, plan.wait, plan.signal).inspect_err(|e| {
        log.error(format_args!("frame submission failed: {e}"));
    })?;

    Ok(FrameSubmission {
        value,
        mode: plan.mode(),
    })
}

/// 阻塞模式下在 host 上等待本帧完成
///
/// 调用前需要已经记录好本帧的完成计数，等待失败时提交仍然有效
pub(crate) fn wait_frame<G: GpuCapability>(gpu: &G, submission: &FrameSubmission, log: &LogContext) -> EmbedResult<()> {
    if submission.mode != SyncMode::Blocking {
        return Ok(());
    }
    gpu.wait(submission.value).inspect_err(|e| {
        log.error(format_args!("failed to wait for frame {}: {e}", submission.value));
    })
}
