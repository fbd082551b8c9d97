//! 导入宿主程序的 Vulkan 设备
//!
//! 构造顺序：日志上下文 -> 加载 entry -> 导入设备（capability 层）-> 渲染抽象。
//! 任何一步失败都会停止后续构造，已经构造出来的对象保留在 [`ImportedGpuContext`] 中，
//! 由 [`ImportedGpuContext::destroy`] 按相反顺序释放。

use std::rc::Rc;

use ash::vk;
use ash::vk::Handle;
use itertools::Itertools;

use crate::{
    backend::{GpuCapability, GpuCaps, ImportDescriptor, QueueRequest, RenderAbstraction},
    config::EmbedConfig,
    error::{EmbedError, EmbedResult},
    log_context::{LogContext, LogSink},
};

/// 宿主程序提供的设备参数
///
/// 所有 handle 都属于宿主程序，必须在渲染上下文的整个生命周期内保持有效，这里不会销毁它们
#[derive(Copy, Clone, Default)]
pub struct VulkanInitParams<'a> {
    pub instance: vk::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: vk::Device,
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,

    /// 为 None 时使用系统的 Vulkan loader
    pub get_instance_proc_addr: Option<vk::PFN_vkGetInstanceProcAddr>,
    /// 宿主程序创建 device 时使用的 features 链
    pub features: Option<&'a vk::PhysicalDeviceFeatures2<'a>>,
}

impl VulkanInitParams<'_> {
    /// 检查必须提供的 4 个 handle
    pub fn validate(&self) -> EmbedResult<()> {
        let missing = [
            ("instance", self.instance.is_null()),
            ("physical_device", self.physical_device.is_null()),
            ("device", self.device.is_null()),
            ("graphics_queue", self.graphics_queue.is_null()),
        ]
        .into_iter()
        .filter(|(_, is_null)| *is_null)
        .map(|(name, _)| name)
        .collect_vec();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(EmbedError::InvalidParameter(format!("missing vulkan handles: {}", missing.join(", "))))
        }
    }
}

/// 导入成功后得到的对象
///
/// 字段顺序即销毁顺序：渲染抽象 -> capability -> 日志
pub struct ImportedGpuContext<G: GpuCapability, R: RenderAbstraction<G>> {
    ra: Option<R>,
    gpu: Option<G>,
    caps: Option<GpuCaps>,
    log: Option<LogContext>,
}

impl<G: GpuCapability, R: RenderAbstraction<G>> Default for ImportedGpuContext<G, R> {
    fn default() -> Self {
        Self {
            ra: None,
            gpu: None,
            caps: None,
            log: None,
        }
    }
}

/// 统一归为 Unsupported，保留原本的信息
fn into_unsupported(e: EmbedError) -> EmbedError {
    match e {
        EmbedError::Unsupported(_) => e,
        EmbedError::InvalidParameter(msg) | EmbedError::Generic(msg) => EmbedError::Unsupported(msg),
    }
}

// 创建与销毁
impl<G: GpuCapability, R: RenderAbstraction<G>> ImportedGpuContext<G, R> {
    /// 按顺序构造各个对象
    ///
    /// 失败时已经构造的对象保留在 self 中，需要调用 [`Self::destroy`]
    ///
    /// # Safety
    /// `params` 中的 handle 必须合法，并且在 self 被销毁之前保持有效
    pub unsafe fn import(
        &mut self,
        sink: &Rc<dyn LogSink>,
        config: &EmbedConfig,
        params: &VulkanInitParams<'_>,
    ) -> EmbedResult<()> {
        // 1. 参数检查，此时还没有日志上下文，直接写入宿主程序的 sink
        if let Err(e) = params.validate() {
            sink.log(log::Level::Error, &format_args!("[{}] import failed: {}", config.log_prefix, e));
            return Err(e);
        }

        // 2. 日志上下文
        let log = self.log.insert(LogContext::new(sink.clone(), config.log_prefix.clone(), config.log_level));

        // 3. 加载 entry
        let vk_entry = match params.get_instance_proc_addr {
            Some(get_instance_proc_addr) => unsafe {
                ash::Entry::from_static_fn(ash::StaticFn { get_instance_proc_addr })
            },
            None => unsafe { ash::Entry::load() }.map_err(|e| {
                log.error(format_args!("failed to load the platform vulkan loader: {e}"));
                EmbedError::Unsupported(format!("vulkan loader is not available: {e}"))
            })?,
        };

        // 4. 导入描述
        if params.features.is_none() {
            if !config.assume_default_features {
                log.error(format_args!("no enabled feature chain given and default features are not assumed"));
                return Err(EmbedError::Unsupported("enabled device features are not described".to_string()));
            }
            log.debug(format_args!(
                "no enabled feature chain given, assuming timelineSemaphore, hostQueryReset and dynamicRendering are enabled"
            ));
        }
        let descriptor = ImportDescriptor {
            vk_entry,
            instance: params.instance,
            physical_device: params.physical_device,
            device: params.device,
            queue: params.graphics_queue,
            queue_graphics: QueueRequest {
                family_index: params.graphics_queue_family,
                count: 1,
            },
            features: params.features,
        };

        // 5. capability 层
        let gpu = unsafe { G::import(log, &descriptor) }.map_err(|e| {
            log.error(format_args!("device import failed: {e}"));
            into_unsupported(e)
        })?;
        let gpu = self.gpu.insert(gpu);

        // 6. 渲染抽象
        let caps = gpu.caps();
        log.info(format_args!(
            "gpu capability: {} (features {}), video decode family: {:?}",
            caps.device_name,
            if caps.features_verified { "verified" } else { "assumed" },
            caps.video_decode_queue_family
        ));
        self.caps = Some(caps);

        let ra = R::create(gpu, log).map_err(|e| {
            log.error(format_args!("failed to create rendering abstraction: {e}"));
            into_unsupported(e)
        })?;
        self.ra = Some(ra);

        Ok(())
    }

    /// 按构造的相反顺序释放，可以重复调用
    pub fn destroy(&mut self) {
        if let Some(ra) = self.ra.take() {
            if let Some(gpu) = &self.gpu {
                ra.destroy(gpu);
            }
        }
        self.caps = None;
        if let Some(gpu) = self.gpu.take() {
            gpu.destroy();
        }
        if let Some(log) = self.log.take() {
            log.destroy();
        }
    }
}

// getters
impl<G: GpuCapability, R: RenderAbstraction<G>> ImportedGpuContext<G, R> {
    /// 所有对象都构造完成
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.ra.is_some()
    }

    /// 没有任何对象
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ra.is_none() && self.gpu.is_none() && self.log.is_none()
    }

    #[inline]
    pub fn caps(&self) -> Option<&GpuCaps> {
        self.caps.as_ref()
    }

    #[inline]
    pub fn gpu(&self) -> Option<&G> {
        self.gpu.as_ref()
    }

    #[inline]
    pub fn log(&self) -> Option<&LogContext> {
        self.log.as_ref()
    }

    /// 同时借用各个对象
    #[inline]
    pub fn parts_mut(&mut self) -> Option<(&mut G, &mut R, &LogContext)> {
        match (&mut self.gpu, &mut self.ra, &self.log) {
            (Some(gpu), Some(ra), Some(log)) => Some((gpu, ra, log)),
            _ => None,
        }
    }
}
