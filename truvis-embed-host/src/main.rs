//! headless 宿主程序
//!
//! 自己创建 instance、device 以及颜色 image，把它们交给 truvis-embed 渲染若干帧：
//! 偶数帧在 host 上阻塞等待，奇数帧通过宿主程序的 timeline semaphore 同步。
//!
//! 用法：`embed-host [config.json]`

mod host_device;

use std::rc::Rc;

use anyhow::Context;
use ash::vk;
use truvis_embed::{EmbedConfig, LogCrateSink, VulkanFbo, VulkanInitParams, VulkanRenderContext, VulkanSync};

use crate::host_device::{HostDevice, HostImage};

const FRAME_COUNT: u64 = 6;
const EXTENT: vk::Extent2D = vk::Extent2D {
    width: 1280,
    height: 720,
};

fn load_config() -> anyhow::Result<EmbedConfig> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(EmbedConfig::default());
    };
    let json = std::fs::read_to_string(&path).with_context(|| format!("failed to read config {path}"))?;
    EmbedConfig::from_json(&json).with_context(|| format!("invalid config {path}"))
}

fn main() -> anyhow::Result<()> {
    truvis_crate_tools::init_log::init_log();
    let _tracy = tracy_client::Client::start();

    let config = load_config()?;
    let host = HostDevice::new(c"truvis-embed-host")?;
    let result = run(&host, config);
    host.destroy();

    result
}

fn run(host: &HostDevice, config: EmbedConfig) -> anyhow::Result<()> {
    let image = host.create_image(EXTENT, vk::Format::B8G8R8A8_UNORM)?;
    let timeline = match host.create_timeline_semaphore() {
        Ok(timeline) => timeline,
        Err(e) => {
            host.destroy_image(image);
            return Err(e);
        }
    };

    let result = render_frames(host, &image, timeline, config);

    unsafe { host.device.destroy_semaphore(timeline, None) };
    host.destroy_image(image);

    result
}

fn render_frames(host: &HostDevice, image: &HostImage, timeline: vk::Semaphore, config: EmbedConfig) -> anyhow::Result<()> {
    let mut vk12_features = vk::PhysicalDeviceVulkan12Features::default();
    let mut vk13_features = vk::PhysicalDeviceVulkan13Features::default();
    let features = HostDevice::describe_features(&mut vk12_features, &mut vk13_features);

    let params = VulkanInitParams {
        instance: host.instance.handle(),
        physical_device: host.pdevice,
        device: host.device.handle(),
        graphics_queue: host.queue,
        graphics_queue_family: host.queue_family,
        get_instance_proc_addr: Some(host.entry.static_fn().get_instance_proc_addr),
        features: Some(&features),
    };

    let mut ctx = VulkanRenderContext::new(Rc::new(LogCrateSink::default()), config)?;
    unsafe { ctx.init(&params) }.context("failed to initialize render context")?;
    if let Some(caps) = ctx.caps() {
        log::info!(
            "rendering on {} (features verified: {})",
            caps.device_name,
            caps.features_verified
        );
    }

    // 第一帧之前 image 的内容没有意义，之后每帧结束时都处于 TRANSFER_SRC_OPTIMAL
    let mut current_layout = vk::ImageLayout::UNDEFINED;
    for frame in 1..=FRAME_COUNT {
        let fbo = VulkanFbo {
            image: image.image,
            image_view: vk::ImageView::null(),
            width: image.extent.width,
            height: image.extent.height,
            format: image.format,
            current_layout,
            target_layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            declared_usage: Some(image.usage),
        };
        let handle = ctx.bind(&fbo)?;

        let t = frame as f32 / FRAME_COUNT as f32;
        ctx.render(handle, |cmd, target| {
            let attachment = target.color_attachment([t, 0.2, 1.0 - t, 1.0]);
            let rendering_info = vk::RenderingInfo::default()
                .render_area(target.render_area())
                .layer_count(1)
                .color_attachments(std::slice::from_ref(&attachment));
            cmd.cmd_begin_rendering(&rendering_info);
            cmd.cmd_end_rendering();
        })?;

        let submission = if frame % 2 == 0 {
            ctx.finish(None)?
        } else {
            let sync = VulkanSync {
                signal_semaphore: timeline,
                signal_value: frame,
                ..Default::default()
            };
            let submission = ctx.finish(Some(&sync))?;
            host.wait_timeline(timeline, frame)?;
            submission
        };
        log::info!("frame {frame}: submission {} ({:?})", submission.value, submission.mode);

        current_layout = ctx.proxy(handle)?.current_layout;
    }

    ctx.destroy();
    Ok(())
}
