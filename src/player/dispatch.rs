use crate::core::{log_ctx, Result, TrackType};
use crate::player::release::ReleaseStateCell;
use crate::renderer::message::Deadline;
use crate::renderer::{ControlCommand, DeliveryBatch, Interrupter, PendingDelivery, RendererHandle, RendererSet};
use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// 控制消息派发器
///
/// 每次发送前检查释放状态；等待时统一套用中断标记和（可选的）超时。
pub struct MessageDispatcher {
    release_state: Arc<ReleaseStateCell>,
    interrupter: Interrupter,
    timeout: Option<Duration>,
}

impl MessageDispatcher {
    pub fn new(release_state: Arc<ReleaseStateCell>, interrupter: Interrupter, timeout: Option<Duration>) -> Self {
        Self {
            release_state,
            interrupter,
            timeout,
        }
    }

    pub fn release_state(&self) -> &ReleaseStateCell {
        &self.release_state
    }

    pub fn interrupter(&self) -> &Interrupter {
        &self.interrupter
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// 发送到指定渲染器；已释放时返回 `TerminalState` 且不入队
    pub fn send(&self, renderer: &RendererHandle, command: ControlCommand) -> Result<PendingDelivery> {
        self.release_state
            .ensure_not_released(&format!("向渲染器 {} 发送 {:?}", renderer.id(), command.kind()))?;
        renderer.send(command)
    }

    /// 只发给该轨道类型的第一个渲染器；没有该类型渲染器时返回 None
    pub fn send_to_primary(
        &self,
        renderers: &RendererSet,
        track_type: TrackType,
        command: ControlCommand,
    ) -> Result<Option<PendingDelivery>> {
        self.release_state
            .ensure_not_released(&format!("发送 {:?}", command.kind()))?;
        match renderers.primary(track_type) {
            Some(renderer) => self.send(renderer, command).map(Some),
            None => {
                debug!("{} 没有 {:?} 渲染器，丢弃 {:?}", log_ctx(), track_type, command.kind());
                Ok(None)
            }
        }
    }

    /// 发给全部渲染器
    pub fn broadcast(&self, renderers: &RendererSet, command: ControlCommand) -> Result<DeliveryBatch> {
        let mut batch = DeliveryBatch::new();
        for renderer in renderers.iter() {
            batch.push(self.send(renderer, command)?);
        }
        Ok(batch)
    }

    /// 等待一批消息送达
    pub fn wait(&self, batch: &DeliveryBatch) -> Result<()> {
        batch.wait(Some(&self.interrupter), self.timeout.map(Deadline::after))
    }

    /// 等待单条消息送达
    pub fn wait_one(&self, pending: &PendingDelivery) -> Result<()> {
        pending.wait(Some(&self.interrupter), self.timeout.map(Deadline::after))
    }

    /// 发给主渲染器并阻塞到送达；返回是否真的发出
    pub fn send_to_primary_and_wait(
        &self,
        renderers: &RendererSet,
        track_type: TrackType,
        command: ControlCommand,
    ) -> Result<bool> {
        match self.send_to_primary(renderers, track_type, command)? {
            Some(pending) => {
                self.wait_one(&pending)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
