//! Vulkan GFX 层（外部设备版本）
//!
//! instance、physical device、device 以及 queue 都由宿主程序创建并持有，
//! 这里只负责把这些 handle 导入成可用的函数表，并在其上提供：
//! - 设备能力检查（API 版本、queue family、timeline semaphore 等 features）
//! - 外部 image 的包装以及 layout 记录
//! - 命令录制、提交，以及基于 timeline semaphore 的完成计数
//!
//! 所有对象都通过 [`gfx::Gfx`] 持有，每个渲染上下文对应一个 [`gfx::Gfx`]。

pub mod commands;
pub mod error;
pub mod foundation;
pub mod gfx;
pub mod resources;

#[doc(hidden)]
pub use tracy_client as __tracy;

/// 只有在 tracy client 已经启动时才会创建 span
#[macro_export]
macro_rules! gfx_span {
    ($name:expr) => {
        $crate::__tracy::Client::running().map(|client| client.span($crate::__tracy::span_location!($name), 0))
    };
}
