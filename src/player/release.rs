use crate::core::{log_ctx, PlayerError, Result};
use crate::player::dispatch::MessageDispatcher;
use crate::player::display::DisplayBindingManager;
use crate::player::engine::Engine;
use crate::renderer::{ControlCommand, DeliveryBatch, RendererSet};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};

/// 释放状态（单调推进）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ReleaseState {
    Active = 0,
    Releasing = 1,
    Released = 2,
}

impl ReleaseState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReleaseState::Active,
            1 => ReleaseState::Releasing,
            _ => ReleaseState::Released,
        }
    }
}

/// 跨线程可见的释放状态：只在释放流程中写，每次派发前读
#[derive(Debug)]
pub struct ReleaseStateCell {
    state: AtomicU8,
}

impl ReleaseStateCell {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ReleaseState::Active as u8),
        }
    }

    pub fn load(&self) -> ReleaseState {
        ReleaseState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_released(&self) -> bool {
        self.load() == ReleaseState::Released
    }

    /// Active -> Releasing；不是 Active 时返回 false
    pub(crate) fn begin_release(&self) -> bool {
        self.state
            .compare_exchange(
                ReleaseState::Active as u8,
                ReleaseState::Releasing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn mark_released(&self) {
        self.state.store(ReleaseState::Released as u8, Ordering::Release);
    }

    /// 已释放时返回 `TerminalState`
    pub fn ensure_not_released(&self, operation: &str) -> Result<()> {
        if self.is_released() {
            Err(PlayerError::TerminalState(operation.to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for ReleaseStateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// 释放协调器
///
/// 释放顺序：
/// 1. Active -> Releasing
/// 2. 摘除绘制目标上的回调
/// 3. 给每个渲染器发 ReleaseRequested，等全部送达
/// 4. 释放引擎
/// 5. -> Released
///
/// 重复调用是成功的空操作；并发的第二次调用会等第一次走完再返回。
pub struct ReleaseCoordinator {
    sequence: Mutex<()>,
}

impl ReleaseCoordinator {
    pub fn new() -> Self {
        Self { sequence: Mutex::new(()) }
    }

    pub fn release(
        &self,
        dispatcher: &MessageDispatcher,
        display: &DisplayBindingManager,
        engine: &dyn Engine,
    ) -> Result<()> {
        let _sequence = self.sequence.lock();
        let state = dispatcher.release_state();

        if !state.begin_release() {
            debug!("{} release() 重复调用，当前状态 {:?}，忽略", log_ctx(), state.load());
            return Ok(());
        }
        info!("{} 🧹 开始释放播放器", log_ctx());

        display.release();

        let renderers = engine.renderers();
        let batch = Self::notify_renderers(dispatcher, &renderers);
        match dispatcher.wait(&batch) {
            Ok(()) => info!("{} ✅ {} 个渲染器已确认释放通知", log_ctx(), batch.len()),
            // 中断或超时都不终止释放：消息仍会被渲染线程执行
            Err(PlayerError::DeliveryInterrupted) => {
                warn!("{} ⚠️  等待释放通知时被中断，所有通知均已送达，继续释放", log_ctx())
            }
            Err(e) => warn!("{} ⚠️  等待释放通知失败: {}，继续释放", log_ctx(), e),
        }

        let engine_result = engine.release();
        state.mark_released();

        match engine_result {
            Ok(()) => {
                info!("{} ✅ 播放器已释放", log_ctx());
                Ok(())
            }
            Err(e) => {
                error!("{} ❌ 引擎释放失败: {}", log_ctx(), e);
                Err(e)
            }
        }
    }

    fn notify_renderers(dispatcher: &MessageDispatcher, renderers: &RendererSet) -> DeliveryBatch {
        let mut batch = DeliveryBatch::new();
        for renderer in renderers.iter() {
            match dispatcher.send(renderer, ControlCommand::ReleaseRequested) {
                Ok(pending) => batch.push(pending),
                // 队列已被引擎提前关闭，不影响其他渲染器
                Err(e) => warn!("{} ⚠️  无法通知渲染器 {} 释放: {}", log_ctx(), renderer.id(), e),
            }
        }
        batch
    }
}

impl Default for ReleaseCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
