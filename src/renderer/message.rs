//! 渲染控制消息
//!
//! 控制线程构造 [`ControlMessage`]，投递到目标渲染器的任务队列，
//! 然后通过 [`PendingDelivery`] 阻塞等待渲染线程执行完毕。
//!
//! 投递状态只会单向推进：`Pending → Sent → Delivered`。

use crate::core::{log_ctx, Color, PlayerError, RendererId, Result, ScaleType, Size};
use log::{error, warn};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// 消息类型（不带负载）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    SurfaceSizeChanged,
    BackgroundColorChanged,
    ScaleTypeChanged,
    ReleaseRequested,
}

/// 控制指令：消息类型 + 负载
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// 绘制目标尺寸变化
    SurfaceSizeChanged(Size),
    /// 背景色变化
    BackgroundColorChanged(Color),
    /// 缩放方式变化
    ScaleTypeChanged(ScaleType),
    /// 播放器即将释放
    ReleaseRequested,
}

impl ControlCommand {
    pub fn kind(&self) -> MessageKind {
        match self {
            ControlCommand::SurfaceSizeChanged(_) => MessageKind::SurfaceSizeChanged,
            ControlCommand::BackgroundColorChanged(_) => MessageKind::BackgroundColorChanged,
            ControlCommand::ScaleTypeChanged(_) => MessageKind::ScaleTypeChanged,
            ControlCommand::ReleaseRequested => MessageKind::ReleaseRequested,
        }
    }
}

/// 投递状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeliveryState {
    /// 已构造，尚未入队
    Pending,
    /// 已进入渲染器队列
    Sent,
    /// 渲染线程已取出并执行完毕
    Delivered,
}

impl DeliveryState {
    fn next(self) -> Option<DeliveryState> {
        match self {
            DeliveryState::Pending => Some(DeliveryState::Sent),
            DeliveryState::Sent => Some(DeliveryState::Delivered),
            DeliveryState::Delivered => None,
        }
    }
}

/// 控制消息（构造后不可变）
#[derive(Debug)]
pub struct ControlMessage {
    id: u64,
    target: RendererId,
    command: ControlCommand,
}

impl ControlMessage {
    pub fn new(target: RendererId, command: ControlCommand) -> Self {
        Self {
            id: NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed),
            target,
            command,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn target(&self) -> RendererId {
        self.target
    }

    pub fn command(&self) -> ControlCommand {
        self.command
    }

    pub fn kind(&self) -> MessageKind {
        self.command.kind()
    }
}

struct SlotInner {
    state: DeliveryState,
    // 消息没执行就被丢弃（渲染线程退出 / 队列被销毁）
    abandoned: bool,
}

/// 一次等待的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settled {
    Delivered,
    Abandoned,
    /// 截止时间到了仍未送达
    Pending,
}

/// 投递状态槽：派发方等待，渲染线程推进
pub(crate) struct DeliverySlot {
    inner: Mutex<SlotInner>,
    settled: Condvar,
}

impl DeliverySlot {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                state: DeliveryState::Pending,
                abandoned: false,
            }),
            settled: Condvar::new(),
        }
    }

    pub(crate) fn state(&self) -> DeliveryState {
        self.inner.lock().state
    }

    pub(crate) fn is_abandoned(&self) -> bool {
        self.inner.lock().abandoned
    }

    /// 推进到下一状态；跳跃、回退或已被丢弃都会被拒绝
    pub(crate) fn advance(&self, to: DeliveryState) -> bool {
        let mut inner = self.inner.lock();
        if inner.abandoned || inner.state.next() != Some(to) {
            error!("{} ❌ 非法的投递状态迁移: {:?} -> {:?}", log_ctx(), inner.state, to);
            return false;
        }
        inner.state = to;
        if to == DeliveryState::Delivered {
            self.settled.notify_all();
        }
        true
    }

    /// 标记为永远不会送达，唤醒所有等待方；已送达时不做任何事
    pub(crate) fn abandon(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == DeliveryState::Delivered || inner.abandoned {
            return false;
        }
        inner.abandoned = true;
        self.settled.notify_all();
        true
    }

    /// 等到送达或被丢弃；给了截止时间则最多等到那时
    pub(crate) fn wait_settled(&self, deadline: Option<Instant>) -> Settled {
        let mut inner = self.inner.lock();
        loop {
            if inner.state == DeliveryState::Delivered {
                return Settled::Delivered;
            }
            if inner.abandoned {
                return Settled::Abandoned;
            }
            match deadline {
                Some(deadline) => {
                    if self.settled.wait_until(&mut inner, deadline).timed_out() {
                        return match (inner.state, inner.abandoned) {
                            (DeliveryState::Delivered, _) => Settled::Delivered,
                            (_, true) => Settled::Abandoned,
                            _ => Settled::Pending,
                        };
                    }
                }
                None => self.settled.wait(&mut inner),
            }
        }
    }
}

/// 中断标记
///
/// 语义与线程中断一致：标记是粘滞的，等待方观察到后把中断重新抛给调用方，
/// 但不会撤回已入队的消息。可以在其他线程上调用 [`Interrupter::interrupt`]。
#[derive(Debug, Clone, Default)]
pub struct Interrupter {
    flag: Arc<AtomicBool>,
}

impl Interrupter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// 清除中断标记，返回之前是否处于中断状态
    pub fn clear(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }
}

/// 等待截止时间（保留原始超时值用于报错）
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Instant,
    timeout: Duration,
}

impl Deadline {
    pub(crate) fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            timeout,
        }
    }
}

/// 一条已入队消息的等待句柄
pub struct PendingDelivery {
    message: Arc<ControlMessage>,
    slot: Arc<DeliverySlot>,
}

impl PendingDelivery {
    pub(crate) fn new(message: Arc<ControlMessage>, slot: Arc<DeliverySlot>) -> Self {
        Self { message, slot }
    }

    pub fn message(&self) -> &ControlMessage {
        &self.message
    }

    pub fn state(&self) -> DeliveryState {
        self.slot.state()
    }

    pub fn is_delivered(&self) -> bool {
        self.state() == DeliveryState::Delivered
    }

    /// 渲染线程在执行这条消息之前就退出了，消息永远不会送达
    pub fn is_abandoned(&self) -> bool {
        self.slot.is_abandoned()
    }

    /// 阻塞直到渲染线程执行完这条消息
    ///
    /// 渲染线程在执行前退出（队列被销毁）时返回 `TerminalState`。
    pub fn block_until_delivered(&self) -> Result<()> {
        self.wait(None, None)
    }

    /// 可中断等待
    ///
    /// 中断不会缩短等待：消息执行完后才返回，若期间（或之前）被中断则返回
    /// `DeliveryInterrupted`，中断标记保持设置。渲染副作用无法撤回，
    /// 所以消息总会送达。
    pub fn block_until_delivered_interruptible(&self, interrupter: &Interrupter) -> Result<()> {
        self.wait(Some(interrupter), None)
    }

    /// 限时等待；超时返回 `DeliveryTimeout`，消息仍留在队列里稍后送达
    pub fn block_until_delivered_timeout(&self, timeout: Duration) -> Result<()> {
        self.wait(None, Some(Deadline::after(timeout)))
    }

    pub(crate) fn wait(&self, interrupter: Option<&Interrupter>, deadline: Option<Deadline>) -> Result<()> {
        match self.slot.wait_settled(deadline.map(|d| d.at)) {
            Settled::Delivered => {}
            Settled::Abandoned => {
                warn!(
                    "{} ⚠️  消息 #{} ({:?} -> {}) 未执行，渲染器已退出",
                    log_ctx(),
                    self.message.id(),
                    self.message.kind(),
                    self.message.target()
                );
                return Err(PlayerError::TerminalState(format!(
                    "渲染器 {} 已退出，消息 #{} ({:?}) 不会送达",
                    self.message.target(),
                    self.message.id(),
                    self.message.kind()
                )));
            }
            Settled::Pending => {
                warn!(
                    "{} ⏱️  消息 #{} ({:?} -> {}) 等待超时，仍在队列中",
                    log_ctx(),
                    self.message.id(),
                    self.message.kind(),
                    self.message.target()
                );
                let timeout = deadline.map(|d| d.timeout).unwrap_or_default();
                return Err(PlayerError::DeliveryTimeout(timeout));
            }
        }

        match interrupter {
            Some(interrupter) if interrupter.is_interrupted() => Err(PlayerError::DeliveryInterrupted),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for PendingDelivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingDelivery")
            .field("message", &self.message)
            .field("state", &self.state())
            .finish()
    }
}

/// 渲染线程侧收到的消息
///
/// 没有执行就被 drop（渲染线程 panic、队列连同未取出的消息一起销毁）时，
/// 把投递槽标记为丢弃，等待方得到 `TerminalState` 而不是一直阻塞。
pub(crate) struct Envelope {
    message: Arc<ControlMessage>,
    slot: Arc<DeliverySlot>,
    executed: bool,
}

impl Envelope {
    pub(crate) fn new(message: Arc<ControlMessage>, slot: Arc<DeliverySlot>) -> Self {
        Self {
            message,
            slot,
            executed: false,
        }
    }

    pub(crate) fn message(&self) -> &ControlMessage {
        &self.message
    }

    /// 执行完毕后调用，唤醒所有等待方
    pub(crate) fn mark_delivered(mut self) {
        self.slot.advance(DeliveryState::Delivered);
        self.executed = true;
    }
}

impl Drop for Envelope {
    fn drop(&mut self) {
        if !self.executed && self.slot.abandon() {
            warn!(
                "{} ⚠️  消息 #{} ({:?} -> {}) 未执行即被丢弃",
                log_ctx(),
                self.message.id(),
                self.message.kind(),
                self.message.target()
            );
        }
    }
}

/// 一批待确认的消息（例如"通知所有渲染器释放"）
#[derive(Debug, Default)]
pub struct DeliveryBatch {
    pending: Vec<PendingDelivery>,
}

impl DeliveryBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pending: PendingDelivery) {
        self.pending.push(pending);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingDelivery> {
        self.pending.iter()
    }

    /// 等待全部送达；有渲染器已退出时返回 `TerminalState`
    pub fn wait_all(&self) -> Result<()> {
        self.wait(None, None)
    }

    /// 可中断地等待全部送达：即使被中断也会等到每一条都送达，再返回 `DeliveryInterrupted`
    pub fn wait_all_interruptible(&self, interrupter: &Interrupter) -> Result<()> {
        self.wait(Some(interrupter), None)
    }

    /// 所有消息共享同一个截止时间
    pub fn wait_all_timeout(&self, timeout: Duration) -> Result<()> {
        self.wait(None, Some(Deadline::after(timeout)))
    }

    pub(crate) fn wait(&self, interrupter: Option<&Interrupter>, deadline: Option<Deadline>) -> Result<()> {
        let mut interrupted = false;
        for pending in &self.pending {
            match pending.wait(interrupter, deadline) {
                Ok(()) => {}
                Err(PlayerError::DeliveryInterrupted) => interrupted = true,
                Err(e) => return Err(e),
            }
        }
        if interrupted {
            Err(PlayerError::DeliveryInterrupted)
        } else {
            Ok(())
        }
    }
}

impl IntoIterator for DeliveryBatch {
    type Item = PendingDelivery;
    type IntoIter = std::vec::IntoIter<PendingDelivery>;

    fn into_iter(self) -> Self::IntoIter {
        self.pending.into_iter()
    }
}
