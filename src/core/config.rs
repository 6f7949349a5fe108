use crate::core::error::{PlayerError, Result};
use crate::core::types::{Color, ScaleType};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 环境变量：控制消息等待超时（毫秒，0 表示不超时）
pub const ENV_DELIVERY_TIMEOUT_MS: &str = "MQ_PLAYER_DELIVERY_TIMEOUT_MS";
/// 环境变量：网络请求 User-Agent
pub const ENV_USER_AGENT: &str = "MQ_PLAYER_USER_AGENT";

/// 交给引擎数据源工厂的网络 / 缓存参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceOptions {
    pub user_agent: String,
    pub cache_dir: Option<PathBuf>,
}

/// 播放器配置
///
/// 加载顺序：默认值 → JSON 配置文件 → 环境变量覆盖
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// 等待渲染器确认控制消息的超时（毫秒）；`None` 表示一直等待
    pub delivery_timeout_ms: Option<u64>,
    /// 视频渲染器初始背景色
    pub background_color: Color,
    /// 视频渲染器初始缩放方式
    pub scale_type: ScaleType,
    /// 交给引擎的 User-Agent
    pub user_agent: String,
    /// 交给引擎的缓存目录
    pub cache_dir: Option<PathBuf>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            delivery_timeout_ms: None,
            background_color: Color::BLACK,
            scale_type: ScaleType::FitCenter,
            user_agent: "MQPlayer".to_string(),
            cache_dir: None,
        }
    }
}

impl PlayerConfig {
    /// 从 JSON 字符串解析（缺省字段取默认值）
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_str(json)?;
        Ok(config)
    }

    /// 从 JSON 文件加载
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        info!("📄 已加载配置文件: {}", path.display());
        Ok(config)
    }

    /// 加载配置：有路径则读文件，然后应用环境变量覆盖
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = env::var(ENV_DELIVERY_TIMEOUT_MS) {
            let ms: u64 = value.trim().parse().map_err(|e| {
                PlayerError::Config(format!("{} 不是合法的毫秒数 ({}): {}", ENV_DELIVERY_TIMEOUT_MS, value, e))
            })?;
            self.delivery_timeout_ms = if ms == 0 { None } else { Some(ms) };
        }

        if let Ok(value) = env::var(ENV_USER_AGENT) {
            if value.trim().is_empty() {
                warn!("⚠️  {} 为空，忽略", ENV_USER_AGENT);
            } else {
                self.user_agent = value;
            }
        }

        Ok(())
    }

    /// 设置数据源时一并交给引擎
    pub fn data_source_options(&self) -> DataSourceOptions {
        DataSourceOptions {
            user_agent: self.user_agent.clone(),
            cache_dir: self.cache_dir.clone(),
        }
    }

    /// 控制消息等待超时
    pub fn delivery_timeout(&self) -> Option<Duration> {
        self.delivery_timeout_ms.map(Duration::from_millis)
    }
}
