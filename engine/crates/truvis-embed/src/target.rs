//! 把宿主程序每帧的 image 绑定为 render target
//!
//! target 存放在固定数量的槽位中，按顺序轮流使用。每个槽位记录最后一次使用它的提交的完成计数。
//! 重新绑定一个仍在执行中的槽位时不会阻塞：旧的 target 被移入待释放列表，
//! 等完成计数越过该值之后，在之后的某次绑定中释放。

use ash::vk;
use ash::vk::Handle;
use itertools::Itertools;

use crate::{
    backend::{GpuCapability, RenderAbstraction, TextureRelease, TextureWrapInfo},
    error::{EmbedError, EmbedResult},
    log_context::LogContext,
};

/// 包装外部 image 时固定使用的 usage，宿主程序创建 image 时至少要包含这些
pub const TARGET_USAGE: vk::ImageUsageFlags = vk::ImageUsageFlags::from_raw(
    vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw() | vk::ImageUsageFlags::TRANSFER_DST.as_raw(),
);

/// 宿主程序每帧提供的 render target
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct VulkanFbo {
    pub image: vk::Image,
    /// 为 null 时由渲染器创建
    pub image_view: vk::ImageView,
    pub width: u32,
    pub height: u32,
    pub format: vk::Format,
    /// 交给渲染器时 image 所处的 layout
    pub current_layout: vk::ImageLayout,
    /// 渲染结束后 image 需要处于的 layout
    pub target_layout: vk::ImageLayout,
    /// 宿主程序创建 image 时使用的 usage，给出时会做检查
    pub declared_usage: Option<vk::ImageUsageFlags>,
}

impl VulkanFbo {
    pub fn validate(&self) -> EmbedResult<()> {
        if self.image.is_null() {
            return Err(EmbedError::InvalidParameter("target image is null".to_string()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(EmbedError::InvalidParameter(format!(
                "target size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if matches!(self.target_layout, vk::ImageLayout::UNDEFINED | vk::ImageLayout::PREINITIALIZED) {
            return Err(EmbedError::InvalidParameter(format!(
                "{:?} can not be used as target layout",
                self.target_layout
            )));
        }
        if let Some(usage) = self.declared_usage {
            if !usage.contains(TARGET_USAGE) {
                return Err(EmbedError::InvalidParameter(format!(
                    "target image usage {:?} lacks {:?}",
                    usage,
                    vk::ImageUsageFlags::from_raw(TARGET_USAGE.as_raw() & !usage.as_raw())
                )));
            }
        }
        Ok(())
    }
}

/// 一个已经绑定的 target 的记录
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderTargetProxy {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub width: u32,
    pub height: u32,
    pub format: vk::Format,
    pub current_layout: vk::ImageLayout,
    pub target_layout: vk::ImageLayout,
}

impl RenderTargetProxy {
    fn from_fbo(fbo: &VulkanFbo) -> Self {
        Self {
            image: fbo.image,
            view: fbo.image_view,
            width: fbo.width,
            height: fbo.height,
            format: fbo.format,
            current_layout: fbo.current_layout,
            target_layout: fbo.target_layout,
        }
    }
}

/// 指向某个槽位的 handle，槽位被重新绑定后旧的 handle 失效
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TargetHandle {
    index: u32,
    generation: u32,
}

impl TargetHandle {
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

pub(crate) struct BoundTarget<G: GpuCapability, R: RenderAbstraction<G>> {
    pub texture: G::Texture,
    pub target: R::Target,
    pub proxy: RenderTargetProxy,
}

struct TargetSlot<G: GpuCapability, R: RenderAbstraction<G>> {
    bound: Option<BoundTarget<G, R>>,
    generation: u32,
    /// 最后一次使用该槽位的提交的完成计数，0 表示没有提交过
    in_flight: u64,
}

pub(crate) struct TargetSlots<G: GpuCapability, R: RenderAbstraction<G>> {
    slots: Vec<TargetSlot<G, R>>,
    next: usize,
    /// 已经被替换、但 GPU 可能仍在使用的 target，以及需要等到的完成计数
    retired: Vec<(u64, BoundTarget<G, R>)>,
}

// 创建与销毁
impl<G: GpuCapability, R: RenderAbstraction<G>> TargetSlots<G, R> {
    pub fn new(count: usize) -> Self {
        let slots = (0..count.max(1))
            .map(|_| TargetSlot {
                bound: None,
                generation: 0,
                in_flight: 0,
            })
            .collect_vec();
        Self {
            slots,
            next: 0,
            retired: Vec::new(),
        }
    }

    /// 释放所有槽位以及待释放列表中的 target 与 texture，调用前需要确保 GPU 已经不再使用它们
    pub fn release_all(&mut self, gpu: &G, ra: &mut R) {
        for slot in &mut self.slots {
            if let Some(bound) = slot.bound.take() {
                Self::destroy_bound(gpu, ra, bound);
            }
            slot.in_flight = 0;
        }
        for (_, bound) in self.retired.drain(..) {
            Self::destroy_bound(gpu, ra, bound);
        }
    }

    fn destroy_bound(gpu: &G, ra: &mut R, bound: BoundTarget<G, R>) {
        ra.destroy_target(gpu, bound.target);
        gpu.destroy_texture(bound.texture);
    }

    /// 释放完成计数已经达到的待释放 target
    fn collect_retired(&mut self, gpu: &G, ra: &mut R, completed: u64) {
        let (done, pending): (Vec<_>, Vec<_>) =
            self.retired.drain(..).partition(|(value, _)| *value <= completed);
        self.retired = pending;
        for (_, bound) in done {
            Self::destroy_bound(gpu, ra, bound);
        }
    }
}

// 绑定
impl<G: GpuCapability, R: RenderAbstraction<G>> TargetSlots<G, R> {
    pub fn bind(&mut self, gpu: &G, ra: &mut R, log: &LogContext, fbo: &VulkanFbo) -> EmbedResult<TargetHandle> {
        if let Err(e) = fbo.validate() {
            log.error(format_args!("bind failed: {e}"));
            return Err(e);
        }

        let completed = gpu.completed()?;
        self.collect_retired(gpu, ra, completed);

        let index = self.next;
        self.next = (self.next + 1) % self.slots.len();
        let slot = &mut self.slots[index];

        if let Some(old) = slot.bound.take() {
            if slot.in_flight > completed {
                // 槽位仍在被 GPU 使用
                log.debug(format_args!("target slot {} is in flight until {}, retiring it", index, slot.in_flight));
                self.retired.push((slot.in_flight, old));
            } else {
                Self::destroy_bound(gpu, ra, old);
            }
        }
        slot.in_flight = 0;

        let wrap_info = TextureWrapInfo {
            image: fbo.image,
            width: fbo.width,
            height: fbo.height,
            format: fbo.format,
            usage: TARGET_USAGE,
        };
        let mut texture = gpu.wrap(&wrap_info).map_err(|e| {
            log.error(format_args!("failed to wrap target image {:?}: {e}", fbo.image));
            EmbedError::Generic(format!("failed to wrap target image: {e}"))
        })?;

        gpu.release(
            &mut texture,
            TextureRelease {
                layout: fbo.current_layout,
                queue_family: vk::QUEUE_FAMILY_IGNORED,
            },
        );

        let target = match ra.wrap_target(gpu, &texture, fbo.image_view) {
            Ok(target) => target,
            Err(e) => {
                gpu.destroy_texture(texture);
                log.error(format_args!("failed to wrap render target {:?}: {e}", fbo.image));
                return Err(EmbedError::Generic(format!("failed to wrap render target: {e}")));
            }
        };

        slot.generation = slot.generation.wrapping_add(1);
        slot.bound = Some(BoundTarget {
            texture,
            target,
            proxy: RenderTargetProxy::from_fbo(fbo),
        });
        Ok(TargetHandle {
            index: index as u32,
            generation: slot.generation,
        })
    }
}

// 访问
impl<G: GpuCapability, R: RenderAbstraction<G>> TargetSlots<G, R> {
    fn slot(&self, handle: TargetHandle) -> Option<&TargetSlot<G, R>> {
        self.slots.get(handle.index()).filter(|slot| slot.generation == handle.generation)
    }

    pub fn get(&self, handle: TargetHandle) -> EmbedResult<&BoundTarget<G, R>> {
        self.slot(handle)
            .and_then(|slot| slot.bound.as_ref())
            .ok_or_else(|| EmbedError::InvalidParameter(format!("stale target handle {:?}", handle)))
    }

    pub fn get_mut(&mut self, handle: TargetHandle) -> EmbedResult<&mut BoundTarget<G, R>> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.bound.as_mut())
            .ok_or_else(|| EmbedError::InvalidParameter(format!("stale target handle {:?}", handle)))
    }

    pub fn mark_in_flight(&mut self, handle: TargetHandle, value: u64) {
        if let Some(slot) = self.slots.get_mut(handle.index()) {
            slot.in_flight = value;
        }
    }

    pub fn in_flight(&self, handle: TargetHandle) -> Option<u64> {
        self.slot(handle).map(|slot| slot.in_flight)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// 等待 GPU 完成后才能释放的 target 数量
    #[inline]
    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }
}
