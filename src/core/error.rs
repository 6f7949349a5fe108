use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("不支持的媒体源类型: {0}")]
    UnsupportedSourceKind(String),

    #[error("播放器已释放，无法执行: {0}")]
    TerminalState(String),

    #[error("等待控制消息送达时被中断（消息仍会送达）")]
    DeliveryInterrupted,

    #[error("等待控制消息送达超时: {0:?}（消息仍在队列中）")]
    DeliveryTimeout(Duration),

    #[error("引擎错误: {0}")]
    Engine(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("其他错误: {0}")]
    Other(String),
}

impl PlayerError {
    /// 是否为可恢复错误（超时不会取消消息，调用方可以重试等待）
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PlayerError::DeliveryTimeout(_))
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
