#![allow(dead_code)]

use crossbeam_channel::{Receiver, Sender};
use mq_player::core::{AudioRouting, DataSourceOptions, MediaSource, PlaybackState, RendererId, Result, Size, TrackType};
use mq_player::player::{
    DisplayKind, DisplayTarget, Engine, EventListener, ListenerSet, PlayerEvent, SurfaceHolder, SurfaceHolderCallback,
    SurfaceTextureListener, SurfaceView, TextureView,
};
use mq_player::renderer::{ControlCommand, ControlMessage, Renderer, RendererSet, RendererThread};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub type CommandLog = Arc<Mutex<Vec<ControlCommand>>>;
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// 阀门：渲染器每收到一条消息先发 entered，再等 open（发送端 drop 后永久放行）
pub struct Gate {
    pub entered: Receiver<RendererId>,
    open: Option<Sender<()>>,
}

pub struct GateHandle {
    entered: Sender<RendererId>,
    open: Receiver<()>,
}

impl Gate {
    pub fn new() -> (Gate, GateHandle) {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (open_tx, open_rx) = crossbeam_channel::unbounded();
        (
            Gate {
                entered: entered_rx,
                open: Some(open_tx),
            },
            GateHandle {
                entered: entered_tx,
                open: open_rx,
            },
        )
    }

    /// 等渲染器开始处理一条消息
    pub fn wait_entered(&self) -> RendererId {
        self.entered
            .recv_timeout(Duration::from_secs(5))
            .expect("renderer never picked up a message")
    }

    /// 放行一条消息
    pub fn step(&self) {
        if let Some(open) = &self.open {
            open.send(()).expect("renderer thread gone");
        }
    }

    /// 永久放行
    pub fn open(&mut self) {
        self.open.take();
    }
}

/// 把收到的指令写进共享日志的渲染器
pub struct RecordingRenderer {
    track_type: TrackType,
    log: CommandLog,
    gate: Option<GateHandle>,
}

impl RecordingRenderer {
    pub fn new(track_type: TrackType, log: CommandLog) -> Self {
        Self {
            track_type,
            log,
            gate: None,
        }
    }

    pub fn gated(track_type: TrackType, log: CommandLog, gate: GateHandle) -> Self {
        Self {
            track_type,
            log,
            gate: Some(gate),
        }
    }
}

impl Renderer for RecordingRenderer {
    fn track_type(&self) -> TrackType {
        self.track_type
    }

    fn handle_message(&mut self, message: &ControlMessage) -> Result<()> {
        if let Some(gate) = &self.gate {
            let _ = gate.entered.send(message.target());
            let _ = gate.open.recv();
        }
        self.log.lock().push(message.command());
        Ok(())
    }
}

/// 测试用引擎：渲染器跑在真实的渲染线程上
pub struct MockEngine {
    threads: Mutex<Vec<RendererThread>>,
    pub video_log: CommandLog,
    pub audio_log: CommandLog,
    pub listeners: ListenerSet,
    pub release_calls: AtomicUsize,
    pub volume: Mutex<Option<f32>>,
    pub video_targets: Mutex<Vec<Option<DisplayKind>>>,
    pub source_options: Mutex<Option<DataSourceOptions>>,
    play_when_ready: Mutex<bool>,
    state: Mutex<PlaybackState>,
    source: Mutex<Option<MediaSource>>,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Self::build(true, None)
    }

    pub fn with_video_gate(gate: GateHandle) -> Arc<Self> {
        Self::build(true, Some(gate))
    }

    pub fn audio_only() -> Arc<Self> {
        Self::build(false, None)
    }

    fn build(video: bool, gate: Option<GateHandle>) -> Arc<Self> {
        let video_log = CommandLog::default();
        let audio_log = CommandLog::default();
        let mut threads = Vec::new();
        if video {
            let renderer = match gate {
                Some(gate) => RecordingRenderer::gated(TrackType::Video, video_log.clone(), gate),
                None => RecordingRenderer::new(TrackType::Video, video_log.clone()),
            };
            threads.push(RendererThread::spawn(0, Box::new(renderer)).expect("spawn video renderer"));
        }
        threads.push(
            RendererThread::spawn(0, Box::new(RecordingRenderer::new(TrackType::Audio, audio_log.clone())))
                .expect("spawn audio renderer"),
        );

        Arc::new(Self {
            threads: Mutex::new(threads),
            video_log,
            audio_log,
            listeners: ListenerSet::new(),
            release_calls: AtomicUsize::new(0),
            volume: Mutex::new(None),
            video_targets: Mutex::new(Vec::new()),
            source_options: Mutex::new(None),
            play_when_ready: Mutex::new(false),
            state: Mutex::new(PlaybackState::Idle),
            source: Mutex::new(None),
        })
    }

    pub fn emit(&self, event: PlayerEvent) {
        self.listeners.notify(&event);
    }

    pub fn set_state(&self, state: PlaybackState) {
        *self.state.lock() = state;
        let play_when_ready = *self.play_when_ready.lock();
        self.emit(PlayerEvent::PlaybackStateChanged { play_when_ready, state });
    }

    pub fn source(&self) -> Option<MediaSource> {
        self.source.lock().clone()
    }

    pub fn video_commands(&self) -> Vec<ControlCommand> {
        self.video_log.lock().clone()
    }

    pub fn audio_commands(&self) -> Vec<ControlCommand> {
        self.audio_log.lock().clone()
    }
}

impl Engine for MockEngine {
    fn set_source(&self, source: &MediaSource, options: &DataSourceOptions) -> Result<()> {
        *self.source.lock() = Some(source.clone());
        *self.source_options.lock() = Some(options.clone());
        Ok(())
    }

    fn prepare(&self) -> Result<()> {
        *self.state.lock() = PlaybackState::Buffering;
        Ok(())
    }

    fn set_play_when_ready(&self, play: bool) {
        *self.play_when_ready.lock() = play;
    }

    fn play_when_ready(&self) -> bool {
        *self.play_when_ready.lock()
    }

    fn playback_state(&self) -> PlaybackState {
        *self.state.lock()
    }

    fn stop(&self, reset: bool) {
        *self.state.lock() = PlaybackState::Idle;
        if reset {
            *self.source.lock() = None;
        }
    }

    fn seek_to(&self, position_ms: i64) {
        self.emit(PlayerEvent::SeekComplete { position_ms });
    }

    fn position(&self) -> i64 {
        0
    }

    fn duration(&self) -> Option<i64> {
        None
    }

    fn set_speed(&self, speed: f32) {
        self.emit(PlayerEvent::SpeedChanged(speed));
    }

    fn set_volume(&self, volume: f32) {
        *self.volume.lock() = Some(volume);
    }

    fn set_audio_routing(&self, _routing: AudioRouting) {}

    fn set_video_target(&self, target: Option<&DisplayTarget>) {
        self.video_targets.lock().push(target.map(DisplayTarget::kind));
    }

    fn renderers(&self) -> RendererSet {
        self.threads.lock().iter().map(RendererThread::handle).collect()
    }

    fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners.add(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn EventListener>) {
        self.listeners.remove(listener);
    }

    fn release(&self) -> Result<()> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        let threads = std::mem::take(&mut *self.threads.lock());
        for mut thread in threads {
            thread.shutdown();
        }
        Ok(())
    }
}

/// 记录 add/remove 顺序的 SurfaceHolder
pub struct MockSurfaceHolder {
    name: &'static str,
    log: EventLog,
    callbacks: Mutex<Vec<Arc<dyn SurfaceHolderCallback>>>,
}

impl MockSurfaceHolder {
    pub fn new(name: &'static str, log: EventLog) -> Arc<Self> {
        Arc::new(Self {
            name,
            log,
            callbacks: Mutex::new(Vec::new()),
        })
    }

    pub fn callbacks(&self) -> Vec<Arc<dyn SurfaceHolderCallback>> {
        self.callbacks.lock().clone()
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// 模拟平台回调 surfaceChanged
    pub fn fire_changed(&self, width: u32, height: u32) {
        for callback in self.callbacks() {
            callback.surface_changed(width, height);
        }
    }
}

impl SurfaceHolder for MockSurfaceHolder {
    fn add_callback(&self, callback: Arc<dyn SurfaceHolderCallback>) {
        self.log.lock().push(format!("{}:add", self.name));
        self.callbacks.lock().push(callback);
    }

    fn remove_callback(&self, callback: &Arc<dyn SurfaceHolderCallback>) {
        self.log.lock().push(format!("{}:remove", self.name));
        self.callbacks
            .lock()
            .retain(|c| !std::ptr::addr_eq(Arc::as_ptr(c), Arc::as_ptr(callback)));
    }
}

pub struct MockSurfaceView {
    pub holder: Arc<MockSurfaceHolder>,
}

impl MockSurfaceView {
    pub fn new(name: &'static str, log: EventLog) -> Arc<Self> {
        Arc::new(Self {
            holder: MockSurfaceHolder::new(name, log),
        })
    }
}

impl SurfaceView for MockSurfaceView {
    fn holder(&self) -> Arc<dyn SurfaceHolder> {
        self.holder.clone()
    }
}

pub struct MockTextureView {
    name: &'static str,
    log: EventLog,
    available: bool,
    size: Mutex<Size>,
    listener: Mutex<Option<Arc<dyn SurfaceTextureListener>>>,
}

impl MockTextureView {
    pub fn new(name: &'static str, log: EventLog, available: bool, size: Size) -> Arc<Self> {
        Arc::new(Self {
            name,
            log,
            available,
            size: Mutex::new(size),
            listener: Mutex::new(None),
        })
    }

    pub fn listener(&self) -> Option<Arc<dyn SurfaceTextureListener>> {
        self.listener.lock().clone()
    }

    /// 模拟平台回调 onSurfaceTextureSizeChanged
    pub fn resize(&self, width: u32, height: u32) {
        *self.size.lock() = Size::new(width, height);
        if let Some(listener) = self.listener() {
            listener.on_size_changed(width, height);
        }
    }
}

impl TextureView for MockTextureView {
    fn is_available(&self) -> bool {
        self.available
    }

    fn size(&self) -> Size {
        *self.size.lock()
    }

    fn surface_texture_listener(&self) -> Option<Arc<dyn SurfaceTextureListener>> {
        self.listener()
    }

    fn set_surface_texture_listener(&self, listener: Option<Arc<dyn SurfaceTextureListener>>) {
        let action = if listener.is_some() { "set" } else { "clear" };
        self.log.lock().push(format!("{}:{}", self.name, action));
        *self.listener.lock() = listener;
    }
}

/// 应用自己的 TextureView 监听器，记录收到的尺寸
#[derive(Default)]
pub struct AppTextureListener {
    pub sizes: Mutex<Vec<Size>>,
}

impl SurfaceTextureListener for AppTextureListener {
    fn on_available(&self, width: u32, height: u32) {
        self.sizes.lock().push(Size::new(width, height));
    }

    fn on_size_changed(&self, width: u32, height: u32) {
        self.sizes.lock().push(Size::new(width, height));
    }

    fn on_destroyed(&self) -> bool {
        true
    }
}

/// 收集应用层收到的事件
pub fn event_collector() -> (Arc<dyn EventListener>, Arc<Mutex<Vec<PlayerEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let listener: Arc<dyn EventListener> = Arc::new(move |event: &PlayerEvent| sink.lock().push(event.clone()));
    (listener, events)
}

/// 轮询直到条件成立或超时
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
