use crate::core::{log_ctx, PlayerError, RendererId, Result, TrackType};
use crate::renderer::message::{ControlCommand, ControlMessage, DeliverySlot, DeliveryState, Envelope, PendingDelivery};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// 渲染器：在自己的线程上消费控制消息
///
/// 只消费并确认，不会主动发起控制消息。
pub trait Renderer: Send {
    /// 服务的轨道类型
    fn track_type(&self) -> TrackType;

    /// 执行一条控制消息。返回错误时消息仍视为已送达（已取出并执行）
    fn handle_message(&mut self, message: &ControlMessage) -> Result<()>;
}

struct QueueInner {
    id: RendererId,
    // 关闭时取走发送端：此后的 send 直接失败，已入队的消息会被渲染线程取完
    tx: Mutex<Option<Sender<Envelope>>>,
}

/// 渲染器任务队列的引用，只提供"入队并等待"
#[derive(Clone)]
pub struct RendererHandle {
    inner: Arc<QueueInner>,
}

impl RendererHandle {
    /// 创建一条渲染器队列，返回句柄和渲染线程侧的收件箱
    pub fn channel(id: RendererId) -> (RendererHandle, RendererInbox) {
        let (tx, rx) = unbounded::<Envelope>();
        let handle = RendererHandle {
            inner: Arc::new(QueueInner {
                id,
                tx: Mutex::new(Some(tx)),
            }),
        };
        (handle, RendererInbox { id, rx })
    }

    pub fn id(&self) -> RendererId {
        self.inner.id
    }

    pub fn track_type(&self) -> TrackType {
        self.inner.id.track_type
    }

    /// 构造消息并入队（FIFO），返回等待句柄
    ///
    /// 队列已关闭时立即返回 `TerminalState`，不会阻塞。
    pub fn send(&self, command: ControlCommand) -> Result<PendingDelivery> {
        let message = Arc::new(ControlMessage::new(self.inner.id, command));
        let slot = Arc::new(DeliverySlot::new());

        let guard = self.inner.tx.lock();
        let tx = guard.as_ref().ok_or_else(|| {
            PlayerError::TerminalState(format!("渲染器 {} 的队列已关闭，无法发送 {:?}", self.inner.id, command.kind()))
        })?;

        // 先推进到 Sent 再入队，渲染线程随时可能取出并标记 Delivered
        slot.advance(DeliveryState::Sent);
        tx.send(Envelope::new(message.clone(), slot.clone())).map_err(|_| {
            PlayerError::TerminalState(format!("渲染器 {} 的线程已退出", self.inner.id))
        })?;
        drop(guard);

        debug!("{} 📨 消息 #{} {:?} -> {}", log_ctx(), message.id(), command, self.inner.id);
        Ok(PendingDelivery::new(message, slot))
    }

    /// 关闭队列（引擎销毁渲染器时调用）
    pub fn close(&self) {
        if self.inner.tx.lock().take().is_some() {
            info!("{} 🔒 渲染器 {} 队列已关闭", log_ctx(), self.inner.id);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.tx.lock().is_none()
    }

    /// 已入队、渲染线程还没取出的消息条数
    pub fn queued_len(&self) -> usize {
        self.inner.tx.lock().as_ref().map(Sender::len).unwrap_or(0)
    }

    /// 是否指向同一条队列
    pub fn same_queue(&self, other: &RendererHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for RendererHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererHandle")
            .field("id", &self.inner.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// 渲染线程侧的收件箱
///
/// 自带处理循环的渲染器在每轮循环里调用 [`RendererInbox::process_pending`]，
/// 让控制消息和正常的帧处理串行执行。
pub struct RendererInbox {
    id: RendererId,
    rx: Receiver<Envelope>,
}

impl RendererInbox {
    pub fn id(&self) -> RendererId {
        self.id
    }

    /// 非阻塞：执行当前队列里的全部消息，返回执行条数；队列已关闭且取空时返回 None
    pub fn process_pending(&self, renderer: &mut dyn Renderer) -> Option<usize> {
        let mut count = 0;
        loop {
            match self.rx.try_recv() {
                Ok(envelope) => {
                    Self::execute(renderer, envelope);
                    count += 1;
                }
                Err(TryRecvError::Empty) => return Some(count),
                Err(TryRecvError::Disconnected) => {
                    return if count > 0 { Some(count) } else { None };
                }
            }
        }
    }

    /// 阻塞等待下一条消息并执行；超时返回 Ok(false)，队列关闭且取空返回 Err
    pub fn process_next_timeout(&self, renderer: &mut dyn Renderer, timeout: Duration) -> Result<bool> {
        match self.rx.recv_timeout(timeout) {
            Ok(envelope) => {
                Self::execute(renderer, envelope);
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => {
                Err(PlayerError::TerminalState(format!("渲染器 {} 的队列已关闭", self.id)))
            }
        }
    }

    /// 阻塞执行消息，直到队列关闭并取空，返回执行条数
    pub fn run_until_closed(&self, renderer: &mut dyn Renderer) -> usize {
        let mut count = 0;
        // 发送端全部关闭后 recv 仍会先返回剩余消息
        while let Ok(envelope) = self.rx.recv() {
            Self::execute(renderer, envelope);
            count += 1;
        }
        count
    }

    fn execute(renderer: &mut dyn Renderer, envelope: Envelope) {
        let message = envelope.message();
        if let Err(e) = renderer.handle_message(message) {
            error!(
                "{} ❌ 渲染器 {} 执行消息 #{} ({:?}) 失败: {}",
                log_ctx(),
                message.target(),
                message.id(),
                message.kind(),
                e
            );
        }
        envelope.mark_delivered();
    }
}

/// 渲染线程管理器
///
/// 每个渲染器一个独立线程 + 串行任务队列，不同渲染器之间不保证顺序。
pub struct RendererThread {
    handle: RendererHandle,
    thread_handle: Option<JoinHandle<()>>,
}

impl RendererThread {
    /// 启动渲染线程
    pub fn spawn(index: usize, mut renderer: Box<dyn Renderer>) -> Result<Self> {
        let id = RendererId {
            track_type: renderer.track_type(),
            index,
        };
        let (handle, inbox) = RendererHandle::channel(id);

        let thread_handle = thread::Builder::new()
            .name(format!("renderer-{:?}-{}", id.track_type, id.index).to_lowercase())
            .spawn(move || {
                info!("{} 🎬 渲染线程启动: {}", log_ctx(), id);
                let count = inbox.run_until_closed(renderer.as_mut());
                info!("{} 🛑 渲染线程退出: {}（共执行 {} 条控制消息）", log_ctx(), id, count);
            })?;

        Ok(Self {
            handle,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn handle(&self) -> RendererHandle {
        self.handle.clone()
    }

    /// 停止线程
    /// - 关闭队列（已入队的消息仍会执行完）
    /// - join 线程
    pub fn shutdown(&mut self) {
        self.handle.close();
        if let Some(thread_handle) = self.thread_handle.take() {
            if thread_handle.join().is_err() {
                error!("{} ❌ 渲染线程 {} panic 退出", log_ctx(), self.handle.id());
            }
        }
    }
}

impl Drop for RendererThread {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            warn!("{} ⚠ RendererThread {} 被 drop，但未调用 shutdown()，正在停止", log_ctx(), self.handle.id());
            self.shutdown();
        }
    }
}
