use std::ffi::CStr;

use anyhow::Context;
use ash::vk;
use truvis_gfx::foundation::features::GfxFeatureSet;
use vk_mem::Alloc;

/// 宿主程序自己持有的 Vulkan 对象，渲染器只借用它们
pub struct HostDevice {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub pdevice: vk::PhysicalDevice,
    pub device: ash::Device,
    pub queue: vk::Queue,
    pub queue_family: u32,

    allocator: Option<vk_mem::Allocator>,
}

/// 宿主程序分配的颜色 image
pub struct HostImage {
    pub image: vk::Image,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub usage: vk::ImageUsageFlags,
    allocation: vk_mem::Allocation,
}

// 创建与销毁
impl HostDevice {
    pub fn new(app_name: &CStr) -> anyhow::Result<Self> {
        let entry = unsafe { ash::Entry::load() }.context("failed to load vulkan library")?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(app_name)
            .engine_name(c"Truvis")
            .api_version(vk::API_VERSION_1_3);
        let instance_ci = vk::InstanceCreateInfo::default().application_info(&app_info);
        let instance = unsafe { entry.create_instance(&instance_ci, None) }.context("failed to create instance")?;

        let (pdevice, queue_family) = match Self::pick_physical_device(&instance) {
            Ok(picked) => picked,
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                return Err(e);
            }
        };

        let device = match Self::create_device(&instance, pdevice, queue_family) {
            Ok(device) => device,
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                return Err(e);
            }
        };
        let queue = unsafe { device.get_device_queue(queue_family, 0) };

        let mut vma_ci = vk_mem::AllocatorCreateInfo::new(&instance, &device, pdevice);
        vma_ci.vulkan_api_version = vk::API_VERSION_1_3;
        let allocator = match unsafe { vk_mem::Allocator::new(vma_ci) } {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe {
                    device.destroy_device(None);
                    instance.destroy_instance(None);
                }
                return Err(e).context("failed to create allocator");
            }
        };

        Ok(Self {
            entry,
            instance,
            pdevice,
            device,
            queue,
            queue_family,
            allocator: Some(allocator),
        })
    }

    pub fn destroy(mut self) {
        unsafe {
            // allocator 需要在 device 之前销毁
            self.allocator = None;
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }

    fn pick_physical_device(instance: &ash::Instance) -> anyhow::Result<(vk::PhysicalDevice, u32)> {
        let pdevices = unsafe { instance.enumerate_physical_devices() }.context("failed to enumerate gpus")?;
        pdevices
            .into_iter()
            .filter(|pdevice| {
                let props = unsafe { instance.get_physical_device_properties(*pdevice) };
                props.api_version >= vk::API_VERSION_1_3
            })
            .find_map(|pdevice| {
                let families = unsafe { instance.get_physical_device_queue_family_properties(pdevice) };
                families
                    .iter()
                    .position(|props| props.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                    .map(|family| (pdevice, family as u32))
            })
            .context("no vulkan 1.3 gpu with a graphics queue")
    }

    fn create_device(
        instance: &ash::Instance,
        pdevice: vk::PhysicalDevice,
        queue_family: u32,
    ) -> anyhow::Result<ash::Device> {
        let priorities = [1.0];
        let queue_ci = vk::DeviceQueueCreateInfo::default().queue_family_index(queue_family).queue_priorities(&priorities);

        let mut vk12_features = GfxFeatureSet::required_vk12_features();
        let mut vk13_features = Self::vk13_features();
        let mut features2 =
            vk::PhysicalDeviceFeatures2::default().push_next(&mut vk12_features).push_next(&mut vk13_features);

        let device_ci = vk::DeviceCreateInfo::default()
            .queue_create_infos(std::slice::from_ref(&queue_ci))
            .push_next(&mut features2);
        unsafe { instance.create_device(pdevice, &device_ci, None) }.context("failed to create device")
    }

    fn vk13_features() -> vk::PhysicalDeviceVulkan13Features<'static> {
        GfxFeatureSet::required_vk13_features().synchronization2(true)
    }
}

// getters
impl HostDevice {
    /// 与创建 device 时相同的 features，交给渲染器检查
    ///
    /// 返回的结构体链引用了 `vk12_features` 和 `vk13_features`
    pub fn describe_features<'a>(
        vk12_features: &'a mut vk::PhysicalDeviceVulkan12Features<'static>,
        vk13_features: &'a mut vk::PhysicalDeviceVulkan13Features<'static>,
    ) -> vk::PhysicalDeviceFeatures2<'a> {
        *vk12_features = GfxFeatureSet::required_vk12_features();
        *vk13_features = Self::vk13_features();
        vk::PhysicalDeviceFeatures2::default().push_next(vk12_features).push_next(vk13_features)
    }
}

// 宿主程序的资源
impl HostDevice {
    pub fn create_image(&self, extent: vk::Extent2D, format: vk::Format) -> anyhow::Result<HostImage> {
        let allocator = self.allocator.as_ref().context("allocator already destroyed")?;
        let usage = vk::ImageUsageFlags::COLOR_ATTACHMENT
            | vk::ImageUsageFlags::TRANSFER_DST
            | vk::ImageUsageFlags::TRANSFER_SRC;
        let image_ci = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            ..Default::default()
        };

        let (image, allocation) =
            unsafe { allocator.create_image(&image_ci, &alloc_ci) }.context("failed to create host image")?;
        Ok(HostImage {
            image,
            format,
            extent,
            usage,
            allocation,
        })
    }

    pub fn destroy_image(&self, mut image: HostImage) {
        if let Some(allocator) = self.allocator.as_ref() {
            unsafe { allocator.destroy_image(image.image, &mut image.allocation) };
        }
    }

    pub fn create_timeline_semaphore(&self) -> anyhow::Result<vk::Semaphore> {
        let mut type_ci =
            vk::SemaphoreTypeCreateInfo::default().semaphore_type(vk::SemaphoreType::TIMELINE).initial_value(0);
        let semaphore_ci = vk::SemaphoreCreateInfo::default().push_next(&mut type_ci);
        unsafe { self.device.create_semaphore(&semaphore_ci, None) }.context("failed to create timeline semaphore")
    }

    /// 在 host 上等待 timeline semaphore 到达 `value`
    pub fn wait_timeline(&self, semaphore: vk::Semaphore, value: u64) -> anyhow::Result<()> {
        let semaphores = [semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default().semaphores(&semaphores).values(&values);
        unsafe { self.device.wait_semaphores(&wait_info, u64::MAX) }
            .with_context(|| format!("failed to wait host timeline value {value}"))
    }
}
