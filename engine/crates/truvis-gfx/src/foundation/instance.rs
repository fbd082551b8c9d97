use ash::vk;

/// 外部 instance 的函数表
///
/// vk::Instance 由宿主程序创建并持有，这里只加载函数指针，不负责销毁
pub struct GfxInstance {
    pub(crate) ash_instance: ash::Instance,

    /// vk 基础函数的接口
    ///
    /// 如果是由 `ash::Entry::load` 加载的，drop 之后会卸载 dll，因此放在最后一个字段
    pub(crate) vk_entry: ash::Entry,
}

// 创建与销毁
impl GfxInstance {
    /// # Safety
    /// `instance` 必须是通过 `vk_entry` 对应的 loader 创建的，
    /// 并且在 GfxInstance 的整个生命周期内保持有效
    pub unsafe fn import(vk_entry: ash::Entry, instance: vk::Instance) -> Self {
        let ash_instance = unsafe { ash::Instance::load(vk_entry.static_fn(), instance) };
        Self {
            ash_instance,
            vk_entry,
        }
    }

    pub fn destroy(self) {
        // instance 属于宿主程序，这里只丢弃函数表
        log::info!("releasing borrowed instance: {:?}", self.ash_instance.handle());
    }
}

// getters
impl GfxInstance {
    #[inline]
    pub fn ash_instance(&self) -> &ash::Instance {
        &self.ash_instance
    }

    #[inline]
    pub fn vk_instance(&self) -> vk::Instance {
        self.ash_instance.handle()
    }

    #[inline]
    pub fn vk_entry(&self) -> &ash::Entry {
        &self.vk_entry
    }
}
