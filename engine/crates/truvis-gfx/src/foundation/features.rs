use ash::vk;

/// 导入外部 device 时关心的 features
///
/// 外部 device 的 features 在创建时就已经确定，这里只做检查，不会去开启任何 feature
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GfxFeatureSet {
    pub timeline_semaphore: bool,
    pub host_query_reset: bool,
    /// render target 通过 dynamic rendering 绘制
    pub dynamic_rendering: bool,
}

// new & init
impl GfxFeatureSet {
    /// 查询 physical device 支持的 features
    pub fn query_supported(instance: &ash::Instance, pdevice: vk::PhysicalDevice) -> Self {
        let mut vk12_features = vk::PhysicalDeviceVulkan12Features::default();
        let mut vk13_features = vk::PhysicalDeviceVulkan13Features::default();
        let mut features2 =
            vk::PhysicalDeviceFeatures2::default().push_next(&mut vk12_features).push_next(&mut vk13_features);
        unsafe {
            instance.get_physical_device_features2(pdevice, &mut features2);
        }

        Self {
            timeline_semaphore: vk12_features.timeline_semaphore == vk::TRUE,
            host_query_reset: vk12_features.host_query_reset == vk::TRUE,
            dynamic_rendering: vk13_features.dynamic_rendering == vk::TRUE,
        }
    }

    /// 从宿主程序创建 device 时使用的 `VkPhysicalDeviceFeatures2` 链中解析出已经开启的 features
    ///
    /// 同时识别 Vulkan12Features / Vulkan13Features 以及单独的 TimelineSemaphore / HostQueryReset / DynamicRendering 结构体
    ///
    /// # Safety
    /// `features.p_next` 必须是合法的 Vulkan 结构体链
    pub unsafe fn from_enabled_chain(features: &vk::PhysicalDeviceFeatures2<'_>) -> Self {
        let mut enabled = Self::default();

        let mut next = features.p_next as *const vk::BaseInStructure<'_>;
        while !next.is_null() {
            let header = unsafe { &*next };
            match header.s_type {
                vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_2_FEATURES => {
                    let f = unsafe { &*(next as *const vk::PhysicalDeviceVulkan12Features<'_>) };
                    enabled.timeline_semaphore |= f.timeline_semaphore == vk::TRUE;
                    enabled.host_query_reset |= f.host_query_reset == vk::TRUE;
                }
                vk::StructureType::PHYSICAL_DEVICE_TIMELINE_SEMAPHORE_FEATURES => {
                    let f = unsafe { &*(next as *const vk::PhysicalDeviceTimelineSemaphoreFeatures<'_>) };
                    enabled.timeline_semaphore |= f.timeline_semaphore == vk::TRUE;
                }
                vk::StructureType::PHYSICAL_DEVICE_HOST_QUERY_RESET_FEATURES => {
                    let f = unsafe { &*(next as *const vk::PhysicalDeviceHostQueryResetFeatures<'_>) };
                    enabled.host_query_reset |= f.host_query_reset == vk::TRUE;
                }
                vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_3_FEATURES => {
                    let f = unsafe { &*(next as *const vk::PhysicalDeviceVulkan13Features<'_>) };
                    enabled.dynamic_rendering |= f.dynamic_rendering == vk::TRUE;
                }
                vk::StructureType::PHYSICAL_DEVICE_DYNAMIC_RENDERING_FEATURES => {
                    let f = unsafe { &*(next as *const vk::PhysicalDeviceDynamicRenderingFeatures<'_>) };
                    enabled.dynamic_rendering |= f.dynamic_rendering == vk::TRUE;
                }
                _ => (),
            }
            next = header.p_next;
        }

        enabled
    }

    /// 宿主程序创建 device 时至少需要开启的 Vulkan 1.2 features
    pub fn required_vk12_features() -> vk::PhysicalDeviceVulkan12Features<'static> {
        vk::PhysicalDeviceVulkan12Features::default().timeline_semaphore(true).host_query_reset(true)
    }

    /// 宿主程序创建 device 时至少需要开启的 Vulkan 1.3 features
    pub fn required_vk13_features() -> vk::PhysicalDeviceVulkan13Features<'static> {
        vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(true)
    }
}

// tools
impl GfxFeatureSet {
    /// 返回第一个缺失的必要 feature
    pub fn first_missing(&self) -> Option<&'static str> {
        if !self.timeline_semaphore {
            return Some("timelineSemaphore");
        }
        if !self.host_query_reset {
            return Some("hostQueryReset");
        }
        if !self.dynamic_rendering {
            return Some("dynamicRendering");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_chain() {
        let mut vk12 = GfxFeatureSet::required_vk12_features();
        let mut vk13 = GfxFeatureSet::required_vk13_features();
        let features = vk::PhysicalDeviceFeatures2::default().push_next(&mut vk12).push_next(&mut vk13);

        let enabled = unsafe { GfxFeatureSet::from_enabled_chain(&features) };
        assert!(enabled.timeline_semaphore);
        assert!(enabled.host_query_reset);
        assert!(enabled.dynamic_rendering);
        assert_eq!(enabled.first_missing(), None);
    }

    #[test]
    fn test_missing_dynamic_rendering() {
        let mut vk12 = GfxFeatureSet::required_vk12_features();
        let mut vk13 = vk::PhysicalDeviceVulkan13Features::default().synchronization2(true);
        let features = vk::PhysicalDeviceFeatures2::default().push_next(&mut vk12).push_next(&mut vk13);

        let enabled = unsafe { GfxFeatureSet::from_enabled_chain(&features) };
        assert!(!enabled.dynamic_rendering);
        assert_eq!(enabled.first_missing(), Some("dynamicRendering"));
    }

    #[test]
    fn test_split_feature_structs() {
        let mut timeline = vk::PhysicalDeviceTimelineSemaphoreFeatures::default().timeline_semaphore(true);
        let mut host_reset = vk::PhysicalDeviceHostQueryResetFeatures::default().host_query_reset(true);
        let mut dynamic_rendering = vk::PhysicalDeviceDynamicRenderingFeatures::default().dynamic_rendering(true);
        let features = vk::PhysicalDeviceFeatures2::default()
            .push_next(&mut timeline)
            .push_next(&mut host_reset)
            .push_next(&mut dynamic_rendering);

        let enabled = unsafe { GfxFeatureSet::from_enabled_chain(&features) };
        assert_eq!(
            enabled,
            GfxFeatureSet {
                timeline_semaphore: true,
                host_query_reset: true,
                dynamic_rendering: true,
            }
        );
    }

    #[test]
    fn test_missing_host_query_reset() {
        let mut vk12 = vk::PhysicalDeviceVulkan12Features::default().timeline_semaphore(true);
        let mut vk13 = vk::PhysicalDeviceVulkan13Features::default().synchronization2(true);
        let features = vk::PhysicalDeviceFeatures2::default().push_next(&mut vk12).push_next(&mut vk13);

        let enabled = unsafe { GfxFeatureSet::from_enabled_chain(&features) };
        assert_eq!(enabled.first_missing(), Some("hostQueryReset"));
    }

    #[test]
    fn test_empty_chain() {
        let features = vk::PhysicalDeviceFeatures2::default();
        let enabled = unsafe { GfxFeatureSet::from_enabled_chain(&features) };
        assert_eq!(enabled.first_missing(), Some("timelineSemaphore"));
    }
}
