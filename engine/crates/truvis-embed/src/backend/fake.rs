//! 不依赖设备的 capability 层与渲染抽象，用于测试
//!
//! 所有状态都放在线程局部的 [`FakeWorld`] 中：可以预先设置失败点，
//! 并模拟一个只有在 [`retire_until`] 被调用时才会前进的 GPU 完成计数。

use std::{cell::RefCell, collections::HashMap, ffi::c_char, fmt};

use ash::vk;
use ash::vk::Handle;

use crate::{
    backend::{
        GpuCapability, GpuCaps, GpuTexture, ImportDescriptor, RenderAbstraction, SyncPoint, TextureRelease,
        TextureWrapInfo,
    },
    device_import::VulkanInitParams,
    error::{EmbedError, EmbedResult},
    log_context::{LogContext, LogSink},
    target::VulkanFbo,
};

#[derive(Default)]
pub(crate) struct FakeWorld {
    pub events: Vec<String>,

    pub fail_import: bool,
    pub fail_ra_create: bool,
    pub fail_wrap: bool,
    pub fail_ra_wrap: bool,
    pub fail_submit: bool,
    pub fail_wait: bool,

    pub submitted: u64,
    pub completed: u64,
    /// 尚未完成的提交：完成计数以及需要 signal 的 semaphore
    pub pending: Vec<(u64, Option<SyncPoint>)>,
    /// semaphore 的 raw handle -> 当前值
    pub semaphore_values: HashMap<u64, u64>,

    pub gpu_alive: usize,
    pub ra_alive: usize,
    pub live_textures: usize,
    pub live_targets: usize,
}

thread_local! {
    static WORLD: RefCell<FakeWorld> = RefCell::new(FakeWorld::default());
}

pub(crate) fn world<T>(f: impl FnOnce(&mut FakeWorld) -> T) -> T {
    WORLD.with(|w| f(&mut w.borrow_mut()))
}

pub(crate) fn reset_world() {
    world(|w| *w = FakeWorld::default());
}

/// 模拟 GPU 执行完所有完成计数不大于 `value` 的提交
pub(crate) fn retire_until(value: u64) {
    world(|w| {
        let (retired, pending): (Vec<_>, Vec<_>) = w.pending.drain(..).partition(|(v, _)| *v <= value);
        w.pending = pending;
        for (v, signal) in retired {
            if let Some(signal) = signal {
                w.semaphore_values.insert(signal.semaphore.as_raw(), signal.value);
            }
            w.completed = w.completed.max(v);
        }
    });
}

pub(crate) fn events() -> Vec<String> {
    world(|w| w.events.clone())
}

fn push_event(event: String) {
    world(|w| w.events.push(event));
}

/// 把日志也记录为事件，便于检查顺序
pub(crate) struct RecordingSink;

impl LogSink for RecordingSink {
    fn log(&self, level: log::Level, args: &fmt::Arguments<'_>) {
        push_event(format!("log: {} {}", level, args));
    }
}

/// 不会被真正调用，只用于构造 `ash::Entry`
pub(crate) unsafe extern "system" fn fake_get_instance_proc_addr(
    _instance: vk::Instance,
    _name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    None
}

pub(crate) fn valid_init_params() -> VulkanInitParams<'static> {
    VulkanInitParams {
        instance: vk::Instance::from_raw(0x1),
        physical_device: vk::PhysicalDevice::from_raw(0x2),
        device: vk::Device::from_raw(0x3),
        graphics_queue: vk::Queue::from_raw(0x4),
        graphics_queue_family: 0,
        get_instance_proc_addr: Some(fake_get_instance_proc_addr),
        features: None,
    }
}

pub(crate) fn fbo(image: u64, width: u32, height: u32) -> VulkanFbo {
    VulkanFbo {
        image: vk::Image::from_raw(image),
        image_view: vk::ImageView::from_raw(image + 0x1000),
        width,
        height,
        format: vk::Format::B8G8R8A8_UNORM,
        current_layout: vk::ImageLayout::UNDEFINED,
        target_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        declared_usage: None,
    }
}

pub(crate) struct FakeTexture {
    image: vk::Image,
    extent: vk::Extent2D,
    format: vk::Format,
    layout: vk::ImageLayout,
    /// begin_frame 之前的 layout
    layout_before: vk::ImageLayout,
    pub usage: vk::ImageUsageFlags,
    released: bool,
}

impl GpuTexture for FakeTexture {
    fn image(&self) -> vk::Image {
        self.image
    }

    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn format(&self) -> vk::Format {
        self.format
    }

    fn layout(&self) -> vk::ImageLayout {
        self.layout
    }
}

pub(crate) struct FakeRecorder;

pub(crate) struct FakeGpu {
    recorder: FakeRecorder,
    features_verified: bool,
}

impl GpuCapability for FakeGpu {
    type Texture = FakeTexture;
    type Recorder = FakeRecorder;

    unsafe fn import(log: &LogContext, desc: &ImportDescriptor<'_>) -> EmbedResult<Self> {
        if world(|w| w.fail_import) {
            return Err(EmbedError::Unsupported("scripted import failure".to_string()));
        }
        log.info(format_args!("fake device imported"));
        world(|w| {
            w.gpu_alive += 1;
            w.events.push(format!(
                "import family={} count={} features={}",
                desc.queue_graphics.family_index,
                desc.queue_graphics.count,
                desc.features.is_some()
            ));
        });
        Ok(Self {
            recorder: FakeRecorder,
            features_verified: desc.features.is_some(),
        })
    }

    fn caps(&self) -> GpuCaps {
        GpuCaps {
            api_version: vk::API_VERSION_1_3,
            device_name: "fake".to_string(),
            features_verified: self.features_verified,
            video_decode_queue_family: None,
            video_decode_extensions: Vec::new(),
        }
    }

    fn wrap(&self, info: &TextureWrapInfo) -> EmbedResult<FakeTexture> {
        if world(|w| w.fail_wrap) {
            return Err(EmbedError::Generic("scripted wrap failure".to_string()));
        }
        world(|w| {
            w.live_textures += 1;
            w.events.push(format!("wrap {:#x}", info.image.as_raw()));
        });
        Ok(FakeTexture {
            image: info.image,
            extent: vk::Extent2D {
                width: info.width,
                height: info.height,
            },
            format: info.format,
            layout: vk::ImageLayout::UNDEFINED,
            layout_before: vk::ImageLayout::UNDEFINED,
            usage: info.usage,
            released: false,
        })
    }

    fn release(&self, texture: &mut FakeTexture, release: TextureRelease) {
        push_event(format!("release {:?} qf={:#x}", release.layout, release.queue_family));
        texture.layout = release.layout;
        texture.released = true;
    }

    fn destroy_texture(&self, texture: FakeTexture) {
        world(|w| {
            w.live_textures -= 1;
            w.events.push(format!("destroy_texture {:#x}", texture.image.as_raw()));
        });
    }

    fn begin_frame(&mut self, texture: &mut FakeTexture) -> EmbedResult<&FakeRecorder> {
        if !texture.released {
            return Err(EmbedError::Generic("texture is not released".to_string()));
        }
        push_event("begin_frame".to_string());
        texture.layout_before = texture.layout;
        texture.layout = vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL;
        Ok(&self.recorder)
    }

    fn submit(
        &mut self,
        texture: &mut FakeTexture,
        final_layout: vk::ImageLayout,
        wait: Option<SyncPoint>,
        signal: Option<SyncPoint>,
    ) -> EmbedResult<u64> {
        // 与 Gfx 一致：提交失败时 texture 回到 begin_frame 之前的状态并交还给宿主程序
        if world(|w| w.fail_submit) {
            push_event("submit failed".to_string());
            texture.layout = texture.layout_before;
            texture.released = false;
            return Err(EmbedError::Generic("scripted submit failure".to_string()));
        }
        let value = world(|w| {
            w.submitted += 1;
            w.pending.push((w.submitted, signal));
            w.events.push(format!(
                "submit {} wait={:?} signal={:?}",
                w.submitted,
                wait.map(|p| (p.semaphore.as_raw(), p.value)),
                signal.map(|p| (p.semaphore.as_raw(), p.value))
            ));
            w.submitted
        });
        texture.layout = final_layout;
        texture.released = false;
        Ok(value)
    }

    fn completed(&self) -> EmbedResult<u64> {
        Ok(world(|w| w.completed))
    }

    /// GPU 在 host 等待期间执行完对应的提交
    fn wait(&self, value: u64) -> EmbedResult<()> {
        if world(|w| w.fail_wait) {
            push_event(format!("wait {} failed", value));
            return Err(EmbedError::Generic("scripted wait failure".to_string()));
        }
        push_event(format!("wait {}", value));
        retire_until(value);
        Ok(())
    }

    fn finish(&self) -> EmbedResult<()> {
        let submitted = world(|w| w.submitted);
        self.wait(submitted)
    }

    fn destroy(self) {
        world(|w| {
            w.gpu_alive -= 1;
            w.events.push("destroy gpu".to_string());
        });
    }
}

pub(crate) struct FakeTarget {
    pub image: vk::Image,
    pub view: vk::ImageView,
}

pub(crate) struct FakeRa;

impl RenderAbstraction<FakeGpu> for FakeRa {
    type Target = FakeTarget;

    fn create(_gpu: &FakeGpu, _log: &LogContext) -> EmbedResult<Self> {
        if world(|w| w.fail_ra_create) {
            return Err(EmbedError::Generic("scripted ra failure".to_string()));
        }
        world(|w| {
            w.ra_alive += 1;
            w.events.push("create ra".to_string());
        });
        Ok(Self)
    }

    fn wrap_target(&mut self, _gpu: &FakeGpu, texture: &FakeTexture, view: vk::ImageView) -> EmbedResult<FakeTarget> {
        if world(|w| w.fail_ra_wrap) {
            return Err(EmbedError::Generic("scripted target failure".to_string()));
        }
        world(|w| {
            w.live_targets += 1;
            w.events.push(format!("wrap_target {:#x}", texture.image.as_raw()));
        });
        Ok(FakeTarget {
            image: texture.image,
            view,
        })
    }

    fn destroy_target(&mut self, _gpu: &FakeGpu, target: FakeTarget) {
        world(|w| {
            w.live_targets -= 1;
            w.events.push(format!("destroy_target {:#x}", target.image.as_raw()));
        });
    }

    fn destroy(self, _gpu: &FakeGpu) {
        world(|w| {
            w.ra_alive -= 1;
            w.events.push("destroy ra".to_string());
        });
    }
}
