use std::cell::Cell;
use std::{ffi::CString, ops::Deref};

use ash::vk;

use crate::foundation::debug_name::DebugType;

/// 外部逻辑设备的函数表
///
/// vk::Device 由宿主程序创建，这里不会调用 vkDestroyDevice。
/// 只有当宿主程序开启了 debug utils 时，才会加载对应的扩展函数用于设置 debug name。
pub struct GfxDevice {
    /// 核心 Vulkan 设备 API
    pub(crate) device: ash::Device,
    /// 调试工具扩展 API，宿主程序未开启时为 None
    pub(crate) debug_utils: Option<ash::ext::debug_utils::Device>,

    destroyed: Cell<bool>,
}

// 构造与销毁
impl GfxDevice {
    /// # Safety
    /// `device` 必须由 `instance` 对应的 physical device 创建，并且在 GfxDevice 的生命周期内保持有效
    pub unsafe fn import(instance: &ash::Instance, device: vk::Device) -> Self {
        let _span = crate::gfx_span!("GfxDevice::import");

        let ash_device = unsafe { ash::Device::load(instance.fp_v1_0(), device) };

        let debug_utils = unsafe {
            (instance.fp_v1_0().get_device_proc_addr)(device, c"vkSetDebugUtilsObjectNameEXT".as_ptr())
                .map(|_| ash::ext::debug_utils::Device::new(instance, &ash_device))
        };
        log::info!("imported device {:?}, debug utils: {}", device, debug_utils.is_some());

        Self {
            device: ash_device,
            debug_utils,
            destroyed: Cell::new(false),
        }
    }

    /// device 属于宿主程序，这里只标记函数表不再使用
    pub fn destroy(&self) {
        log::info!("releasing borrowed device: {:?}", self.device.handle());
        self.destroyed.set(true);
    }
}

// getters
impl GfxDevice {
    #[inline]
    pub fn vk_handle(&self) -> vk::Device {
        self.device.handle()
    }

    #[inline]
    pub fn ash_device(&self) -> &ash::Device {
        &self.device
    }
}

// tools
impl GfxDevice {
    pub fn set_debug_name<T: DebugType>(&self, handle: &T, name: impl AsRef<str>) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };

        let debug_name = format!("{}::{}", T::debug_type_name(), name.as_ref());
        let Ok(debug_name) = CString::new(debug_name) else {
            return;
        };
        let result = unsafe {
            debug_utils.set_debug_utils_object_name(
                &vk::DebugUtilsObjectNameInfoEXT::default()
                    .object_name(debug_name.as_c_str())
                    .object_handle(handle.vk_handle()),
            )
        };
        if let Err(e) = result {
            log::warn!("failed to set debug name {:?}: {}", debug_name, e);
        }
    }
}

impl Deref for GfxDevice {
    type Target = ash::Device;
    fn deref(&self) -> &Self::Target {
        &self.device
    }
}
impl Drop for GfxDevice {
    fn drop(&mut self) {
        debug_assert!(self.destroyed.get(), "GfxDevice must be destroyed before being dropped.");
    }
}
impl DebugType for GfxDevice {
    fn debug_type_name() -> &'static str {
        "GfxDevice"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.device.handle()
    }
}
