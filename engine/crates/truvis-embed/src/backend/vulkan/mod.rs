//! 基于 truvis-gfx 的 Vulkan 实现

pub mod gpu;
pub mod ra;

pub use ra::{GfxRa, GfxRaTarget};
