//! MQ Player 渲染控制核心
//!
//! 控制线程把绘制目标尺寸、背景色、缩放方式、释放通知等控制消息
//! 投递到各渲染线程的串行队列，并可阻塞等待送达。

pub mod core;
pub mod player;
pub mod renderer;

pub use crate::core::{PlayerConfig, PlayerError, Result};
pub use crate::player::{Engine, EventListener, PlaybackFacade, PlayerEvent};
