use crate::core::{AudioRouting, DataSourceOptions, MediaSource, PlaybackState, Result};
use crate::player::surface::DisplayTarget;
use crate::renderer::RendererSet;
use parking_lot::RwLock;
use std::sync::Arc;

/// 引擎产生的事件，原样转发给应用层监听器
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// 播放状态或 play-when-ready 变化
    PlaybackStateChanged { play_when_ready: bool, state: PlaybackState },
    /// seek 完成（异步）
    SeekComplete { position_ms: i64 },
    /// 引擎错误（解码 / 网络等），不做解释
    Error(String),
    VolumeChanged(f32),
    DurationChanged(i64),
    PositionChanged { position_ms: i64, duration_ms: i64 },
    FirstFrameRendered,
    SpeedChanged(f32),
    VideoSizeChanged {
        width: u32,
        height: u32,
        rotation: u32,
        pixel_ratio: f32,
    },
    /// 已缓冲百分比 0 - 100
    BufferingPercentage(u8),
}

/// 事件监听器
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &PlayerEvent);
}

impl<F> EventListener for F
where
    F: Fn(&PlayerEvent) + Send + Sync,
{
    fn on_event(&self, event: &PlayerEvent) {
        self(event)
    }
}

// 只比较数据指针，不比较 vtable
fn same_listener(a: &Arc<dyn EventListener>, b: &Arc<dyn EventListener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// 线程安全的监听器集合
///
/// 写时复制：通知时遍历某一时刻的快照，并发的增删不会影响正在进行的通知。
#[derive(Default)]
pub struct ListenerSet {
    listeners: RwLock<Arc<Vec<Arc<dyn EventListener>>>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加监听器（同一个实例只加一次），返回是否新增
    pub fn add(&self, listener: Arc<dyn EventListener>) -> bool {
        let mut guard = self.listeners.write();
        if guard.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(listener);
        *guard = Arc::new(next);
        true
    }

    /// 移除监听器，返回是否存在
    pub fn remove(&self, listener: &Arc<dyn EventListener>) -> bool {
        let mut guard = self.listeners.write();
        if !guard.iter().any(|l| same_listener(l, listener)) {
            return false;
        }
        let next: Vec<_> = guard.iter().filter(|l| !same_listener(l, listener)).cloned().collect();
        *guard = Arc::new(next);
        true
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<dyn EventListener>>> {
        self.listeners.read().clone()
    }

    pub fn notify(&self, event: &PlayerEvent) {
        let snapshot = self.snapshot();
        for listener in snapshot.iter() {
            listener.on_event(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 被包装的播放引擎
///
/// 解封装、解码、缓冲、真正的画面呈现都在引擎里；这里只约定控制面接口。
/// play/pause 请求在引擎下一次处理时生效，状态变化最终都会以事件通知出来
/// （还没处理就被连续切换的中间状态可以合并）。
pub trait Engine: Send + Sync {
    /// 设置媒体源；`options` 带上数据源工厂需要的 User-Agent 和缓存目录
    fn set_source(&self, source: &MediaSource, options: &DataSourceOptions) -> Result<()>;
    fn prepare(&self) -> Result<()>;
    fn set_play_when_ready(&self, play: bool);
    fn play_when_ready(&self) -> bool;
    fn playback_state(&self) -> PlaybackState;
    /// `reset` 为 true 时同时清空位置和媒体源
    fn stop(&self, reset: bool);
    /// 异步 seek，完成时发出 `SeekComplete`
    fn seek_to(&self, position_ms: i64);
    fn position(&self) -> i64;
    /// 时长未知时为 None
    fn duration(&self) -> Option<i64>;
    fn set_speed(&self, speed: f32);
    fn set_volume(&self, volume: f32);
    fn set_audio_routing(&self, routing: AudioRouting);
    /// 把绘制目标交给引擎（None 表示清除）
    fn set_video_target(&self, target: Option<&DisplayTarget>);
    /// 当前存活的渲染器
    fn renderers(&self) -> RendererSet;
    fn add_listener(&self, listener: Arc<dyn EventListener>);
    fn remove_listener(&self, listener: &Arc<dyn EventListener>);
    /// 释放引擎：销毁渲染器并关闭它们的队列
    fn release(&self) -> Result<()>;
}
