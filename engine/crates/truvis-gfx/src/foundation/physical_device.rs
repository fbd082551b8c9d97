use std::ffi::CStr;

use ash::vk;
use itertools::Itertools;

use crate::{
    commands::queue::GfxQueueFamily,
    error::{GfxError, GfxResult, format_api_version},
    foundation::{debug_name::DebugType, features::GfxFeatureSet},
};

/// 宿主程序选定的物理显卡
///
/// 不会去枚举或挑选显卡，只对传入的 handle 做检查和信息收集
pub struct GfxPhysicalDevice {
    pub(crate) vk_handle: vk::PhysicalDevice,

    /// 当前 gpu 的基础属性
    pub(crate) basic_props: vk::PhysicalDeviceProperties,

    /// 当前 gpu 支持的（而不是已经开启的）features
    pub(crate) supported_features: GfxFeatureSet,

    pub(crate) queue_family_props: Vec<vk::QueueFamilyProperties>,

    /// 支持 video decode 的 queue family，仅用于上报能力
    pub(crate) video_decode_queue_family: Option<GfxQueueFamily>,

    /// 当前 gpu 支持的 video decode 相关 extensions
    pub(crate) video_decode_exts: Vec<String>,
}

impl GfxPhysicalDevice {
    /// 所需的最低 Vulkan 版本
    pub const REQUIRED_API_VERSION: u32 = vk::API_VERSION_1_3;

    pub fn inspect(instance: &ash::Instance, pdevice: vk::PhysicalDevice) -> GfxResult<Self> {
        unsafe {
            let basic_props = instance.get_physical_device_properties(pdevice);
            let physical_device_name = CStr::from_ptr(basic_props.device_name.as_ptr());
            log::info!(
                "imported gpu: {:?}, api version: {}",
                physical_device_name,
                format_api_version(basic_props.api_version)
            );

            let supported_features = GfxFeatureSet::query_supported(instance, pdevice);
            log::debug!("physical device supported features: {:?}", supported_features);

            let queue_family_props = instance.get_physical_device_queue_family_properties(pdevice);
            log::debug!("physical device: queue family props:\n{:#?}", queue_family_props);

            let video_decode_queue_family = queue_family_props
                .iter()
                .enumerate()
                .find(|(_, props)| props.queue_flags.contains(vk::QueueFlags::VIDEO_DECODE_KHR))
                .map(|(family_idx, props)| GfxQueueFamily {
                    name: "video-decode".to_string(),
                    queue_family_index: family_idx as u32,
                    queue_flags: props.queue_flags,
                    queue_count: props.queue_count,
                });

            // 只关心 video decode 相关的 extension，其他的由宿主程序自行负责开启
            let video_decode_exts = instance
                .enumerate_device_extension_properties(pdevice)?
                .iter()
                .filter_map(|ext| CStr::from_ptr(ext.extension_name.as_ptr()).to_str().ok())
                .filter(|name| name.starts_with("VK_KHR_video_decode"))
                .map(str::to_string)
                .sorted()
                .collect_vec();

            Ok(Self {
                vk_handle: pdevice,
                basic_props,
                supported_features,
                queue_family_props,
                video_decode_queue_family,
                video_decode_exts,
            })
        }
    }

    pub fn destroy(self) {
        // 无需销毁
    }
}

// 检查
impl GfxPhysicalDevice {
    pub fn check_api_version(&self) -> GfxResult<()> {
        if self.basic_props.api_version < Self::REQUIRED_API_VERSION {
            return Err(GfxError::ApiVersion {
                found: format_api_version(self.basic_props.api_version),
                required: format_api_version(Self::REQUIRED_API_VERSION),
            });
        }
        Ok(())
    }

    /// 根据宿主程序给出的 index 构造 queue family，要求支持 graphics
    pub fn graphics_queue_family(&self, queue_family_index: u32) -> GfxResult<GfxQueueFamily> {
        let props = self.queue_family_props.get(queue_family_index as usize).ok_or(GfxError::QueueFamily {
            index: queue_family_index,
            reason: "index out of range",
        })?;
        if !props.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            return Err(GfxError::QueueFamily {
                index: queue_family_index,
                reason: "graphics is not supported",
            });
        }

        Ok(GfxQueueFamily {
            name: "gfx".to_string(),
            queue_family_index,
            queue_flags: props.queue_flags,
            queue_count: props.queue_count,
        })
    }
}

// getters
impl GfxPhysicalDevice {
    #[inline]
    pub fn vk_handle(&self) -> vk::PhysicalDevice {
        self.vk_handle
    }

    #[inline]
    pub fn api_version(&self) -> u32 {
        self.basic_props.api_version
    }

    #[inline]
    pub fn supported_features(&self) -> GfxFeatureSet {
        self.supported_features
    }

    pub fn device_name(&self) -> String {
        unsafe { CStr::from_ptr(self.basic_props.device_name.as_ptr()) }.to_string_lossy().into_owned()
    }

    #[inline]
    pub fn video_decode_queue_family(&self) -> Option<&GfxQueueFamily> {
        self.video_decode_queue_family.as_ref()
    }

    #[inline]
    pub fn video_decode_exts(&self) -> &[String] {
        &self.video_decode_exts
    }
}

impl DebugType for GfxPhysicalDevice {
    fn debug_type_name() -> &'static str {
        "GfxPhysicalDevice"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_handle
    }
}
