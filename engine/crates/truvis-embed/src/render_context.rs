use std::rc::Rc;

use truvis_gfx::gfx::Gfx;

use crate::{
    backend::{GpuCapability, GpuCaps, GpuTexture, RenderAbstraction, vulkan::GfxRa},
    config::EmbedConfig,
    device_import::{ImportedGpuContext, VulkanInitParams},
    error::{EmbedError, EmbedResult},
    log_context::LogSink,
    sync::{self, FrameSubmission, SyncPlan, VulkanSync},
    target::{RenderTargetProxy, TargetHandle, TargetSlots, VulkanFbo},
};

/// 使用宿主程序 Vulkan 设备的渲染上下文
pub type VulkanRenderContext = RenderContext<Gfx, GfxRa>;

/// 渲染上下文
///
/// 只能在一个线程中使用（持有 `Rc`，因此不是 `Send`）。
///
/// # 生命周期
/// - 构造：[`RenderContext::new`] 之后调用 [`RenderContext::init`]
/// - 每帧：[`RenderContext::bind`] -> [`RenderContext::render`] -> [`RenderContext::finish`]
/// - 销毁：[`RenderContext::destroy`]，drop 时也会调用。
///   顺序为 target -> 渲染抽象 -> capability -> 日志，可以重复调用，也可以在初始化失败后调用
pub struct RenderContext<G: GpuCapability, R: RenderAbstraction<G>> {
    /// 正在录制的帧
    recording: Option<TargetHandle>,
    slots: TargetSlots<G, R>,
    imported: ImportedGpuContext<G, R>,

    sink: Rc<dyn LogSink>,
    config: EmbedConfig,
}

// 创建与销毁
impl<G: GpuCapability, R: RenderAbstraction<G>> RenderContext<G, R> {
    pub fn new(sink: Rc<dyn LogSink>, config: EmbedConfig) -> EmbedResult<Self> {
        config.validate()?;
        Ok(Self {
            recording: None,
            slots: TargetSlots::new(config.target_slots),
            imported: ImportedGpuContext::default(),
            sink,
            config,
        })
    }

    /// 导入宿主程序的设备
    ///
    /// 失败时已经构造的对象会立即释放，上下文不可再使用
    ///
    /// # Safety
    /// `params` 中的所有 handle 必须合法，并且在本上下文被销毁之前保持有效；
    /// `params.features` 必须是合法的 Vulkan 结构体链
    pub unsafe fn init(&mut self, params: &VulkanInitParams<'_>) -> EmbedResult<()> {
        let _span = truvis_gfx::gfx_span!("RenderContext::init");

        if !self.imported.is_empty() {
            return Err(EmbedError::InvalidParameter("render context is already initialized".to_string()));
        }

        let result = unsafe { self.imported.import(&self.sink, &self.config, params) };
        if result.is_err() {
            self.imported.destroy();
        }
        result
    }

    /// 可以重复调用
    pub fn destroy(&mut self) {
        if let Some(gpu) = self.imported.gpu() {
            if let Err(e) = gpu.finish() {
                log::error!("failed to wait for gpu before destroying render context: {e}");
            }
        }

        self.recording = None;
        if let Some((gpu, ra, _)) = self.imported.parts_mut() {
            self.slots.release_all(gpu, ra);
        }
        self.imported.destroy();
    }
}

// getters
impl<G: GpuCapability, R: RenderAbstraction<G>> RenderContext<G, R> {
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.imported.is_complete()
    }

    #[inline]
    pub fn caps(&self) -> Option<&GpuCaps> {
        self.imported.caps()
    }

    #[inline]
    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    #[inline]
    pub fn target_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn proxy(&self, handle: TargetHandle) -> EmbedResult<&RenderTargetProxy> {
        Ok(&self.slots.get(handle)?.proxy)
    }

    pub fn target(&self, handle: TargetHandle) -> EmbedResult<&R::Target> {
        Ok(&self.slots.get(handle)?.target)
    }

    pub fn gpu(&self) -> Option<&G> {
        self.imported.gpu()
    }

    /// 最后一次使用该 target 的提交的完成计数
    #[inline]
    pub fn in_flight(&self, handle: TargetHandle) -> Option<u64> {
        self.slots.in_flight(handle)
    }
}

// 每帧
impl<G: GpuCapability, R: RenderAbstraction<G>> RenderContext<G, R> {
    /// 绑定本帧的 render target
    pub fn bind(&mut self, fbo: &VulkanFbo) -> EmbedResult<TargetHandle> {
        let _span = truvis_gfx::gfx_span!("RenderContext::bind");

        if self.recording.is_some() {
            return Err(EmbedError::InvalidParameter("a frame is being rendered, finish it first".to_string()));
        }
        let (gpu, ra, log) = self.imported.parts_mut().ok_or_else(Self::not_initialized)?;
        self.slots.bind(gpu, ra, log, fbo)
    }

    /// 开始一帧，target 处于 color attachment 的 layout，在回调中录制渲染命令
    pub fn render<T>(
        &mut self,
        handle: TargetHandle,
        f: impl FnOnce(&G::Recorder, &R::Target) -> T,
    ) -> EmbedResult<T> {
        if self.recording.is_some() {
            return Err(EmbedError::InvalidParameter("a frame is being rendered, finish it first".to_string()));
        }
        let (gpu, _, log) = self.imported.parts_mut().ok_or_else(Self::not_initialized)?;
        let bound = self.slots.get_mut(handle)?;

        let recorder = gpu.begin_frame(&mut bound.texture).inspect_err(|e| {
            log.error(format_args!("failed to begin frame: {e}"));
        })?;
        let output = f(recorder, &bound.target);

        self.recording = Some(handle);
        Ok(output)
    }

    /// 结束并提交本帧
    ///
    /// `sync` 为 None 或两侧都为 null 时，阻塞直到本帧在 GPU 上执行完成
    pub fn finish(&mut self, sync: Option<&VulkanSync>) -> EmbedResult<FrameSubmission> {
        let _span = truvis_gfx::gfx_span!("RenderContext::finish");

        let handle = self
            .recording
            .take()
            .ok_or_else(|| EmbedError::InvalidParameter("no frame is being rendered".to_string()))?;
        let (gpu, _, log) = self.imported.parts_mut().ok_or_else(Self::not_initialized)?;
        let bound = self.slots.get_mut(handle)?;

        let plan = SyncPlan::from_sync(sync);
        let target_layout = bound.proxy.target_layout;
        let submission = sync::submit_frame(gpu, &mut bound.texture, target_layout, &plan, log)?;

        // 先记录本帧的 layout 与完成计数，host 等待失败时提交依然有效
        bound.proxy.current_layout = bound.texture.layout();
        self.slots.mark_in_flight(handle, submission.value);
        log.debug(format_args!("frame {} submitted ({:?})", submission.value, submission.mode));

        sync::wait_frame(gpu, &submission, log)?;
        Ok(submission)
    }
}

// tools
impl<G: GpuCapability, R: RenderAbstraction<G>> RenderContext<G, R> {
    fn not_initialized() -> EmbedError {
        EmbedError::Generic("render context is not initialized".to_string())
    }
}

impl<G: GpuCapability, R: RenderAbstraction<G>> Drop for RenderContext<G, R> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;
    use ash::vk::Handle;

    use super::*;
    use crate::{
        backend::fake::{self, FakeGpu, FakeRa, RecordingSink},
        error::EmbedStatus,
    };

    type FakeContext = RenderContext<FakeGpu, FakeRa>;

    fn context(config: EmbedConfig) -> FakeContext {
        truvis_crate_tools::init_log::init_test_log();
        RenderContext::new(Rc::new(RecordingSink), config).unwrap()
    }

    fn initialized() -> FakeContext {
        let mut ctx = context(EmbedConfig::default());
        unsafe { ctx.init(&fake::valid_init_params()) }.unwrap();
        ctx
    }

    #[test]
    fn test_init_and_destroy() {
        fake::reset_world();
        let mut ctx = initialized();
        assert!(ctx.is_initialized());
        assert_eq!(ctx.caps().unwrap().device_name, "fake");
        fake::world(|w| assert_eq!(w.gpu_alive, 1));

        ctx.destroy();
        assert!(!ctx.is_initialized());
        ctx.destroy();
        drop(ctx);
        fake::world(|w| {
            assert_eq!(w.gpu_alive, 0);
            assert_eq!(w.ra_alive, 0);
            assert_eq!(w.events.iter().filter(|e| *e == "destroy gpu").count(), 1);
        });
    }

    #[test]
    fn test_init_twice_is_rejected() {
        fake::reset_world();
        let mut ctx = initialized();
        let err = unsafe { ctx.init(&fake::valid_init_params()) }.unwrap_err();
        assert_eq!(err.status(), EmbedStatus::InvalidParameter);
        fake::world(|w| assert_eq!(w.gpu_alive, 1));
    }

    #[test]
    fn test_missing_handle_then_destroy_is_noop() {
        fake::reset_world();
        let mut ctx = context(EmbedConfig::default());
        let params = VulkanInitParams {
            device: vk::Device::null(),
            ..fake::valid_init_params()
        };
        let result = unsafe { ctx.init(&params) };
        assert_eq!(EmbedStatus::from(&result), EmbedStatus::InvalidParameter);

        let before = fake::events();
        ctx.destroy();
        assert_eq!(fake::events(), before);
        assert!(matches!(ctx.bind(&fake::fbo(0x10, 4, 4)), Err(EmbedError::Generic(_))));
    }

    #[test]
    fn test_failed_init_releases_built_objects() {
        for fail_ra in [false, true] {
            fake::reset_world();
            fake::world(|w| {
                w.fail_import = !fail_ra;
                w.fail_ra_create = fail_ra;
            });

            let mut ctx = context(EmbedConfig::default());
            let err = unsafe { ctx.init(&fake::valid_init_params()) }.unwrap_err();
            assert_eq!(err.status(), EmbedStatus::Unsupported);

            // 失败时已经释放，之后的 destroy 不会再次释放
            fake::world(|w| {
                assert_eq!(w.gpu_alive, 0);
                assert_eq!(w.ra_alive, 0);
                assert!(w.events.last().unwrap().ends_with("log context destroyed"));
            });
            let before = fake::events();
            ctx.destroy();
            drop(ctx);
            assert_eq!(fake::events(), before);
        }
    }

    #[test]
    fn test_destroy_order() {
        fake::reset_world();
        let mut ctx = initialized();
        let handle = ctx.bind(&fake::fbo(0x10, 8, 8)).unwrap();
        ctx.render(handle, |_, _| ()).unwrap();
        ctx.finish(None).unwrap();
        drop(ctx);

        let events = fake::events();
        let position = |prefix: &str| events.iter().position(|e| e.starts_with(prefix)).unwrap();
        assert!(position("destroy_target") < position("destroy_texture"));
        assert!(position("destroy_texture") < position("destroy ra"));
        assert!(position("destroy ra") < position("destroy gpu"));
        assert!(events.last().unwrap().ends_with("log context destroyed"));
        fake::world(|w| {
            assert_eq!(w.live_textures, 0);
            assert_eq!(w.live_targets, 0);
        });
    }

    #[test]
    fn test_target_reports_target_layout_after_frame() {
        fake::reset_world();
        let mut ctx = initialized();
        let fbo = VulkanFbo {
            current_layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            target_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ..fake::fbo(0x10, 8, 8)
        };
        let handle = ctx.bind(&fbo).unwrap();
        assert_eq!(ctx.proxy(handle).unwrap().current_layout, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);

        let view = ctx.render(handle, |_, target| target.view).unwrap();
        assert_eq!(view, fbo.image_view);
        ctx.finish(None).unwrap();

        assert_eq!(ctx.proxy(handle).unwrap().current_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert!(fake::events().contains(&"begin_frame".to_string()));
    }

    #[test]
    fn test_blocking_finish_waits_for_counter() {
        fake::reset_world();
        let mut ctx = initialized();

        for frame in 1..=3u64 {
            let handle = ctx.bind(&fake::fbo(0x10, 8, 8)).unwrap();
            ctx.render(handle, |_, _| ()).unwrap();
            let submission = ctx.finish(Some(&VulkanSync::default())).unwrap();

            assert_eq!(submission.mode, sync::SyncMode::Blocking);
            assert_eq!(submission.value, frame);
            // 完成计数单调递增，返回时已经达到提交的值
            fake::world(|w| {
                assert_eq!(w.completed, frame);
                assert!(w.pending.is_empty());
            });
            assert!(fake::events().contains(&format!("wait {}", frame)));
        }
    }

    #[test]
    fn test_semaphore_finish_does_not_block() {
        fake::reset_world();
        let mut ctx = initialized();
        let signal = vk::Semaphore::from_raw(0x99);
        let sync = VulkanSync {
            wait_semaphore: vk::Semaphore::from_raw(0x98),
            wait_value: 5,
            signal_semaphore: signal,
            signal_value: 6,
        };

        let handle = ctx.bind(&fake::fbo(0x10, 8, 8)).unwrap();
        ctx.render(handle, |_, _| ()).unwrap();
        let submission = ctx.finish(Some(&sync)).unwrap();
        assert_eq!(submission.mode, sync::SyncMode::Semaphores);

        fake::world(|w| {
            assert_eq!(w.completed, 0);
            assert!(!w.events.iter().any(|e| e.starts_with("wait")));
            assert!(w.events.contains(&"submit 1 wait=Some((152, 5)) signal=Some((153, 6))".to_string()));
            // 提交完成之前 signal 不会发生
            assert_eq!(w.semaphore_values.get(&signal.as_raw()), None);
        });

        fake::retire_until(submission.value);
        fake::world(|w| assert_eq!(w.semaphore_values.get(&signal.as_raw()), Some(&6)));
    }

    #[test]
    fn test_finish_without_render_is_rejected() {
        fake::reset_world();
        let mut ctx = initialized();
        assert!(matches!(ctx.finish(None), Err(EmbedError::InvalidParameter(_))));

        let handle = ctx.bind(&fake::fbo(0x10, 8, 8)).unwrap();
        ctx.render(handle, |_, _| ()).unwrap();
        assert!(matches!(ctx.bind(&fake::fbo(0x20, 8, 8)), Err(EmbedError::InvalidParameter(_))));
        ctx.finish(None).unwrap();
    }

    #[test]
    fn test_pipelined_slots() {
        fake::reset_world();
        let config = EmbedConfig {
            target_slots: 2,
            ..Default::default()
        };
        let mut ctx = context(config);
        unsafe { ctx.init(&fake::valid_init_params()) }.unwrap();
        let sync = VulkanSync {
            signal_semaphore: vk::Semaphore::from_raw(0x99),
            signal_value: 1,
            ..Default::default()
        };

        let a = ctx.bind(&fake::fbo(0x10, 8, 8)).unwrap();
        ctx.render(a, |_, _| ()).unwrap();
        ctx.finish(Some(&sync)).unwrap();

        let b = ctx.bind(&fake::fbo(0x20, 8, 8)).unwrap();
        ctx.render(b, |_, _| ()).unwrap();
        ctx.finish(Some(&sync)).unwrap();
        assert!(!fake::events().iter().any(|e| e.starts_with("wait")));

        // 第三帧回到 a 的槽位，第一帧尚未完成，a 的 target 被保留而不是等待
        let c = ctx.bind(&fake::fbo(0x30, 8, 8)).unwrap();
        assert_eq!(c.index(), a.index());
        assert!(matches!(ctx.proxy(a), Err(EmbedError::InvalidParameter(_))));
        fake::world(|w| {
            assert!(!w.events.iter().any(|e| e.starts_with("wait")));
            assert!(!w.events.contains(&"destroy_target 0x10".to_string()));
            assert_eq!(w.completed, 0);
            assert_eq!(w.pending.len(), 2);
        });

        fake::retire_until(2);
        drop(ctx);
        fake::world(|w| {
            assert_eq!(w.live_textures, 0);
            assert_eq!(w.live_targets, 0);
        });
    }

    #[test]
    fn test_semaphore_frames_never_block_on_rebind() {
        fake::reset_world();
        let mut ctx = initialized();
        assert_eq!(ctx.target_slots(), 1);
        let signal = vk::Semaphore::from_raw(0x99);

        for frame in 1..=3u64 {
            let handle = ctx.bind(&fake::fbo(0x10, 8, 8)).unwrap();
            ctx.render(handle, |_, _| ()).unwrap();
            let sync = VulkanSync {
                signal_semaphore: signal,
                signal_value: frame,
                ..Default::default()
            };
            ctx.finish(Some(&sync)).unwrap();
        }

        fake::world(|w| {
            assert!(!w.events.iter().any(|e| e.starts_with("wait")));
            assert_eq!(w.completed, 0);
            // 前两帧的 target 都在等待 GPU 完成
            assert_eq!(w.live_targets, 3);
        });

        fake::retire_until(3);
        ctx.bind(&fake::fbo(0x10, 8, 8)).unwrap();
        fake::world(|w| assert_eq!(w.live_targets, 1));
    }

    #[test]
    fn test_failed_blocking_wait_keeps_slot_in_flight() {
        fake::reset_world();
        let mut ctx = initialized();
        let handle = ctx.bind(&fake::fbo(0x10, 8, 8)).unwrap();
        ctx.render(handle, |_, _| ()).unwrap();

        fake::world(|w| w.fail_wait = true);
        let err = ctx.finish(None).unwrap_err();
        assert!(matches!(err, EmbedError::Generic(_)));

        // 提交已经发生，记录与 GPU 上的状态一致
        assert_eq!(ctx.in_flight(handle), Some(1));
        assert_eq!(ctx.proxy(handle).unwrap().current_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        fake::world(|w| {
            w.fail_wait = false;
            assert_eq!(w.pending.len(), 1);
        });

        // 重新绑定时不会释放仍在执行中的 target
        ctx.bind(&fake::fbo(0x20, 8, 8)).unwrap();
        assert!(!fake::events().contains(&"destroy_target 0x10".to_string()));

        fake::retire_until(1);
        drop(ctx);
        fake::world(|w| {
            assert!(w.events.contains(&"destroy_target 0x10".to_string()));
            assert_eq!(w.live_textures, 0);
            assert_eq!(w.live_targets, 0);
        });
    }

    #[test]
    fn test_failed_submit_returns_target_to_caller() {
        fake::reset_world();
        let mut ctx = initialized();
        let fbo = VulkanFbo {
            current_layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            ..fake::fbo(0x10, 8, 8)
        };
        let handle = ctx.bind(&fbo).unwrap();
        ctx.render(handle, |_, _| ()).unwrap();

        fake::world(|w| w.fail_submit = true);
        let err = ctx.finish(None).unwrap_err();
        assert!(matches!(err, EmbedError::Generic(_)));
        fake::world(|w| w.fail_submit = false);

        // layout 回到本帧之前，没有提交在执行
        assert_eq!(ctx.proxy(handle).unwrap().current_layout, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
        assert_eq!(ctx.in_flight(handle), Some(0));
        assert_eq!(ctx.slots.get(handle).unwrap().texture.layout(), vk::ImageLayout::TRANSFER_SRC_OPTIMAL);

        // texture 已经交还给宿主程序，需要重新绑定
        assert!(matches!(ctx.render(handle, |_, _| ()), Err(EmbedError::Generic(_))));
        let rebound = ctx.bind(&fbo).unwrap();
        assert!(fake::events().contains(&"destroy_target 0x10".to_string()));
        ctx.render(rebound, |_, _| ()).unwrap();
        assert_eq!(ctx.finish(None).unwrap().value, 1);
    }
}
