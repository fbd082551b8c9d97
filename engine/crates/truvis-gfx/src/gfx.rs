use std::rc::Rc;

use ash::vk;

use crate::{
    commands::{
        barrier::{GfxBarrierMask, GfxImageBarrier},
        command_buffer::GfxCommandBuffer,
        command_pool::GfxCommandPool,
        queue::{GfxQueue, GfxQueueFamily},
        semaphore::{GfxSemaphore, GfxSemaphoreInfo},
        submit_info::GfxSubmitInfo,
    },
    error::{GfxError, GfxResult},
    foundation::{
        device::GfxDevice, features::GfxFeatureSet, instance::GfxInstance, physical_device::GfxPhysicalDevice,
    },
    resources::image::{GfxImage, GfxImageWrapInfo},
};

/// 导入外部设备所需的全部 handle
///
/// 所有 handle 都属于宿主程序，Gfx 不会销毁它们
pub struct GfxImportInfo<'a> {
    pub vk_entry: ash::Entry,
    pub instance: vk::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: vk::Device,
    pub queue: vk::Queue,
    pub queue_family_index: u32,
    /// 宿主程序创建 device 时使用的 features 链；为 None 时假定必要的 features 已经开启
    pub features: Option<&'a vk::PhysicalDeviceFeatures2<'a>>,
}

/// 每一帧使用的 command buffer，以及最后一次提交时 timeline 的值
struct GfxFrameCommand {
    cmd: GfxCommandBuffer,
    last_submit: u64,
}

/// 正在录制的帧
#[derive(Clone, Copy)]
struct GfxRecordingFrame {
    cmd_idx: usize,
    /// 开始录制前 image 的 layout，提交失败时恢复
    layout_before: vk::ImageLayout,
}

/// 基于外部设备的 GPU 上下文
///
/// 每个渲染上下文持有一个 Gfx，不使用全局单例。
/// 所有提交都会 signal 内部的 timeline semaphore，其值单调递增，用于追踪 GPU 完成进度。
///
/// # destroy
/// 需要手动调用 [`Gfx::destroy`]，顺序为：command pool -> timeline -> device -> instance
pub struct Gfx {
    frame: Option<GfxRecordingFrame>,
    frame_commands: Vec<GfxFrameCommand>,
    command_pool: GfxCommandPool,

    /// 完成计数
    timeline: GfxSemaphore,
    /// 最后一次提交时 signal 的值
    submitted: u64,

    gfx_queue: GfxQueue,
    gfx_device: Rc<GfxDevice>,
    physical_device: GfxPhysicalDevice,

    /// features 是否由宿主程序给出的链检查过，false 表示只是假定已经开启
    features_verified: bool,

    instance: GfxInstance,
}

// 创建与销毁
impl Gfx {
    /// 检查外部设备并导入
    ///
    /// # Safety
    /// `info` 中的所有 handle 必须合法，并且在 Gfx 的整个生命周期内保持有效；
    /// `info.features` 必须是合法的 Vulkan 结构体链
    pub unsafe fn import(info: &GfxImportInfo<'_>) -> GfxResult<Self> {
        let _span = crate::gfx_span!("Gfx::import");

        let instance = unsafe { GfxInstance::import(info.vk_entry.clone(), info.instance) };
        let physical_device = GfxPhysicalDevice::inspect(instance.ash_instance(), info.physical_device)?;
        physical_device.check_api_version()?;
        let queue_family = physical_device.graphics_queue_family(info.queue_family_index)?;

        if let Some(missing) = physical_device.supported_features().first_missing() {
            return Err(GfxError::MissingFeature(missing));
        }
        let features_verified = match info.features {
            Some(features) => {
                let enabled = unsafe { GfxFeatureSet::from_enabled_chain(features) };
                log::debug!("enabled features from caller chain: {:?}", enabled);
                if let Some(missing) = enabled.first_missing() {
                    return Err(GfxError::MissingFeature(missing));
                }
                true
            }
            None => {
                log::debug!("no feature chain given, assuming timelineSemaphore, hostQueryReset and dynamicRendering are enabled");
                false
            }
        };

        let gfx_device = Rc::new(unsafe { GfxDevice::import(instance.ash_instance(), info.device) });
        let (command_pool, timeline) = match Self::create_frame_objects(&gfx_device, &queue_family) {
            Ok(objects) => objects,
            Err(e) => {
                gfx_device.destroy();
                return Err(e);
            }
        };

        let gfx_queue = GfxQueue::new(info.queue, queue_family, gfx_device.clone());
        gfx_device.set_debug_name(&gfx_queue, "gfx");

        Ok(Self {
            frame: None,
            frame_commands: Vec::new(),
            command_pool,
            timeline,
            submitted: 0,
            gfx_queue,
            gfx_device,
            physical_device,
            features_verified,
            instance,
        })
    }

    /// 创建失败时，只销毁本函数已经创建的对象
    fn create_frame_objects(
        gfx_device: &Rc<GfxDevice>,
        queue_family: &GfxQueueFamily,
    ) -> GfxResult<(GfxCommandPool, GfxSemaphore)> {
        let command_pool = GfxCommandPool::new(
            gfx_device.clone(),
            queue_family,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            "frame",
        )?;
        match GfxSemaphore::new_timeline(gfx_device.clone(), 0, "completion") {
            Ok(timeline) => Ok((command_pool, timeline)),
            Err(e) => {
                command_pool.destroy();
                Err(e)
            }
        }
    }

    pub fn destroy(self) {
        let _span = crate::gfx_span!("Gfx::destroy");

        if let Err(e) = self.finish() {
            log::error!("failed to wait for submitted work before destroy: {}", e);
        }

        let Self {
            frame_commands,
            command_pool,
            timeline,
            gfx_queue,
            gfx_device,
            physical_device,
            instance,
            ..
        } = self;

        // command buffer 跟随 pool 一起释放
        drop(frame_commands);
        command_pool.destroy();
        timeline.destroy();
        drop(gfx_queue);
        gfx_device.destroy();
        drop(gfx_device);
        physical_device.destroy();
        instance.destroy();
    }
}

// getters
impl Gfx {
    #[inline]
    pub fn instance(&self) -> &GfxInstance {
        &self.instance
    }

    #[inline]
    pub fn physical_device(&self) -> &GfxPhysicalDevice {
        &self.physical_device
    }

    #[inline]
    pub fn gfx_device(&self) -> &Rc<GfxDevice> {
        &self.gfx_device
    }

    #[inline]
    pub fn gfx_queue(&self) -> &GfxQueue {
        &self.gfx_queue
    }

    #[inline]
    pub fn features_verified(&self) -> bool {
        self.features_verified
    }

    /// 最后一次提交的完成计数
    #[inline]
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    #[inline]
    pub fn timeline_semaphore(&self) -> vk::Semaphore {
        self.timeline.handle()
    }
}

// 外部 image
impl Gfx {
    pub fn wrap_image(&self, info: &GfxImageWrapInfo, name: &str) -> GfxResult<GfxImage> {
        let image = GfxImage::wrap(info, name)?;
        self.gfx_device.set_debug_name(&image, name);
        log::debug!("wrapped {}", image);
        Ok(image)
    }

    #[inline]
    pub fn release_image(&self, image: &mut GfxImage, layout: vk::ImageLayout, queue_family: u32) {
        image.release(layout, queue_family);
    }

    #[inline]
    pub fn destroy_image(&self, image: GfxImage) {
        log::debug!("forget {}", image);
        image.destroy();
    }
}

// 帧
impl Gfx {
    /// 开始录制一帧，image 会被转换为 `COLOR_ATTACHMENT_OPTIMAL`
    ///
    /// 复用 GPU 已经执行完的 command buffer，都在执行中时会新分配一个
    pub fn begin_frame(&mut self, image: &mut GfxImage) -> GfxResult<&GfxCommandBuffer> {
        let _span = crate::gfx_span!("Gfx::begin_frame");

        if self.frame.is_some() {
            return Err(GfxError::FrameState("previous frame is not submitted"));
        }
        if !image.is_released() {
            return Err(GfxError::ImageNotReleased(image.handle()));
        }

        let completed = self.completed()?;
        let frame_idx = match self.frame_commands.iter().position(|c| c.last_submit <= completed) {
            Some(idx) => idx,
            None => {
                let cmd = self.command_pool.allocate(&format!("frame-{}", self.frame_commands.len()))?;
                self.frame_commands.push(GfxFrameCommand { cmd, last_submit: 0 });
                self.frame_commands.len() - 1
            }
        };

        let cmd = &self.frame_commands[frame_idx].cmd;
        cmd.reset()?;
        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        cmd.image_memory_barrier(&[GfxImageBarrier::new()
            .image(image.handle())
            .layout_transfer(image.layout(), vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .mask(GfxBarrierMask::ACQUIRE_FROM_HOST)]);
        let layout_before = image.begin_render();

        self.frame = Some(GfxRecordingFrame {
            cmd_idx: frame_idx,
            layout_before,
        });
        Ok(cmd)
    }

    /// 结束录制并提交，返回本次提交的完成计数
    ///
    /// image 会被转换为 `final_layout` 并交还给宿主程序。
    /// `wait` 在渲染命令之前等待，`signal` 与内部 timeline 在所有命令完成后一起 signal。
    ///
    /// 提交失败时 image 恢复为开始录制之前的 layout，并交还给宿主程序
    pub fn submit_frame(
        &mut self,
        image: &mut GfxImage,
        final_layout: vk::ImageLayout,
        wait: Option<GfxSemaphoreInfo>,
        signal: Option<GfxSemaphoreInfo>,
    ) -> GfxResult<u64> {
        let _span = crate::gfx_span!("Gfx::submit_frame");

        let frame = self.frame.take().ok_or(GfxError::FrameState("no frame is being recorded"))?;
        match self.end_and_submit(frame.cmd_idx, image, final_layout, wait, signal) {
            Ok(value) => {
                image.set_layout(final_layout);
                image.return_to_user();
                Ok(value)
            }
            Err(e) => {
                log::error!("failed to submit frame, {} goes back to {:?}: {}", image, frame.layout_before, e);
                image.abort_render(frame.layout_before);
                Err(e)
            }
        }
    }

    fn end_and_submit(
        &mut self,
        cmd_idx: usize,
        image: &GfxImage,
        final_layout: vk::ImageLayout,
        wait: Option<GfxSemaphoreInfo>,
        signal: Option<GfxSemaphoreInfo>,
    ) -> GfxResult<u64> {
        let cmd = &self.frame_commands[cmd_idx].cmd;
        cmd.image_memory_barrier(&[GfxImageBarrier::new()
            .image(image.handle())
            .layout_transfer(image.layout(), final_layout)
            .mask(GfxBarrierMask::RELEASE_TO_HOST)]);
        cmd.end()?;

        let value = self.submitted + 1;
        let mut batch = GfxSubmitInfo::new(std::slice::from_ref(cmd));
        if let Some(wait) = wait {
            batch = batch.wait(&wait);
        }
        if let Some(signal) = signal {
            batch = batch.signal(&signal);
        }
        batch = batch.signal(&GfxSemaphoreInfo::new(
            self.timeline.handle(),
            vk::PipelineStageFlags::ALL_COMMANDS,
            value,
        ));
        log::trace!(
            "submit frame {}: wait {:?}, signal {:?}",
            value,
            batch.wait_semaphores(),
            batch.signal_semaphores()
        );
        self.gfx_queue.submit(&batch)?;

        self.submitted = value;
        self.frame_commands[cmd_idx].last_submit = value;
        Ok(value)
    }
}

// 完成计数
impl Gfx {
    #[inline]
    pub fn completed(&self) -> GfxResult<u64> {
        self.timeline.counter_value()
    }

    /// 阻塞直到完成计数达到 `value`
    ///
    /// 超过已提交的值时只等待到已提交的值，避免永远等待
    pub fn wait(&self, value: u64) -> GfxResult<()> {
        let _span = crate::gfx_span!("Gfx::wait");
        let value = value.min(self.submitted);
        if value == 0 {
            return Ok(());
        }
        self.timeline.wait_timeline(value, u64::MAX)
    }

    /// 等待所有已提交的工作完成
    #[inline]
    pub fn finish(&self) -> GfxResult<()> {
        self.wait(self.submitted)
    }
}

// tools
impl Gfx {
    /// 根据给定的格式，返回支持的格式
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Vec<vk::Format> {
        candidates
            .iter()
            .filter(|f| {
                let props = unsafe {
                    self.instance
                        .ash_instance()
                        .get_physical_device_format_properties(self.physical_device.vk_handle(), **f)
                };
                match tiling {
                    vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                    vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
                    _ => false,
                }
            })
            .copied()
            .collect()
    }
}
