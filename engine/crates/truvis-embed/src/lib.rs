//! 在宿主程序的 Vulkan 设备上运行 Truvis 渲染
//!
//! 宿主程序持有 instance、device、queue 以及每帧的 image，这里负责：
//! - [`device_import`]：检查并导入宿主程序的设备
//! - [`target`]：把每帧的 image 包装为 render target，记录 layout
//! - [`sync`]：使用宿主程序的 semaphore 同步，或者在 host 上阻塞等待
//! - [`render_context`]：按顺序构造，并按相反顺序销毁上述对象
//!
//! ```ignore
//! let mut ctx = VulkanRenderContext::new(Rc::new(LogCrateSink::default()), EmbedConfig::default())?;
//! unsafe { ctx.init(&params)? };
//! let target = ctx.bind(&fbo)?;
//! ctx.render(target, |cmd, target| { /* 录制命令 */ })?;
//! ctx.finish(Some(&sync))?;
//! ```

pub mod backend;
pub mod config;
pub mod device_import;
pub mod error;
pub mod log_context;
pub mod render_context;
pub mod sync;
pub mod target;

pub use config::EmbedConfig;
pub use device_import::VulkanInitParams;
pub use error::{EmbedError, EmbedResult, EmbedStatus};
pub use log_context::{LogCrateSink, LogSink};
pub use render_context::{RenderContext, VulkanRenderContext};
pub use sync::{FrameSubmission, SyncMode, VulkanSync};
pub use target::{RenderTargetProxy, TargetHandle, VulkanFbo};
