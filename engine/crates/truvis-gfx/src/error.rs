use ash::vk;
use thiserror::Error;

/// GFX 层的错误
///
/// 这里只描述底层失败的原因，如何分类（参数错误 / 不支持 / 一般错误）由上层决定
#[derive(Error, Debug)]
pub enum GfxError {
    #[error("vulkan call failed: {0}")]
    Vk(#[from] vk::Result),

    #[error("device api version {found} is lower than required {required}")]
    ApiVersion { found: String, required: String },

    #[error("queue family {index} is not usable: {reason}")]
    QueueFamily { index: u32, reason: &'static str },

    #[error("device feature `{0}` is not available")]
    MissingFeature(&'static str),

    #[error("image {0:?} is still held by the caller, release it first")]
    ImageNotReleased(vk::Image),

    #[error("invalid image: {0}")]
    InvalidImage(&'static str),

    #[error("frame recording out of order: {0}")]
    FrameState(&'static str),
}

pub type GfxResult<T> = Result<T, GfxError>;

/// 将 vk api 版本格式化为 `major.minor.patch`
pub fn format_api_version(version: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(version),
        vk::api_version_minor(version),
        vk::api_version_patch(version)
    )
}
