use thiserror::Error;

/// 返回给宿主程序的状态码
///
/// 原始值保持稳定，C 风格的调用方可以直接比较整数
#[repr(i32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EmbedStatus {
    Success = 0,
    InvalidParameter = -4,
    Unsupported = -18,
    Generic = -20,
}

impl EmbedStatus {
    #[inline]
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Success),
            -4 => Some(Self::InvalidParameter),
            -18 => Some(Self::Unsupported),
            -20 => Some(Self::Generic),
            _ => None,
        }
    }

    #[inline]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl<T> From<&EmbedResult<T>> for EmbedStatus {
    fn from(result: &EmbedResult<T>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(e) => e.status(),
        }
    }
}

/// embed 层的错误，只有三类
///
/// - InvalidParameter：宿主程序传入的 handle 或尺寸缺失、不合法
/// - Unsupported：设备不满足要求，或依赖它的渲染抽象无法创建
/// - Generic：包装 image 等内部操作失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbedError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Generic(String),
}

impl EmbedError {
    pub fn status(&self) -> EmbedStatus {
        match self {
            Self::InvalidParameter(_) => EmbedStatus::InvalidParameter,
            Self::Unsupported(_) => EmbedStatus::Unsupported,
            Self::Generic(_) => EmbedStatus::Generic,
        }
    }
}

pub type EmbedResult<T> = Result<T, EmbedError>;
