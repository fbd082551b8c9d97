use serde::Deserialize;

use crate::error::{EmbedError, EmbedResult};

/// 渲染上下文的配置
///
/// 配置的加载由宿主程序负责，这里只提供默认值以及从 json 解析
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbedConfig {
    /// render target 槽位数量，至少为 1
    pub target_slots: usize,
    /// 日志前缀
    pub log_prefix: String,
    /// 发往宿主程序 sink 的最高日志等级
    pub log_level: log::LevelFilter,
    /// 宿主程序没有给出 features 链时，是否假定必要的 features 已经开启
    ///
    /// 为 false 时，缺少 features 链会导致导入失败（Unsupported）
    pub assume_default_features: bool,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            target_slots: 1,
            log_prefix: "truvis-embed".to_string(),
            log_level: log::LevelFilter::Info,
            assume_default_features: true,
        }
    }
}

impl EmbedConfig {
    pub fn from_json(json: &str) -> EmbedResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EmbedError::InvalidParameter(format!("failed to parse embed config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EmbedResult<()> {
        if self.target_slots == 0 {
            return Err(EmbedError::InvalidParameter("target_slots must be at least 1".to_string()));
        }
        Ok(())
    }
}
