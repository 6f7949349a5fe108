use crate::core::{log_ctx, AudioRouting, Color, MediaSource, PlaybackState, PlayerConfig, PlayerError, Result, ScaleType, TrackType};
use crate::player::dispatch::MessageDispatcher;
use crate::player::display::{DisplayBindingManager, RendererProvider};
use crate::player::engine::{Engine, EventListener, ListenerSet, PlayerEvent};
use crate::player::release::{ReleaseCoordinator, ReleaseState, ReleaseStateCell};
use crate::player::surface::{DisplayKind, DisplayTarget, SurfaceHolder, SurfaceView, TextureView};
use crate::renderer::{ControlCommand, Interrupter};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug)]
struct ForwardState {
    duration: Option<i64>,
    speed: f32,
    awaiting_prepare: bool,
    prepared: bool,
}

/// 挂在引擎上的唯一监听器，把事件扇出给应用层监听器
///
/// 时长、速度只在数值真正变化时转发；错误原样转发。
struct EventForwarder {
    listeners: Arc<ListenerSet>,
    state: Mutex<ForwardState>,
}

impl EventForwarder {
    fn new(listeners: Arc<ListenerSet>) -> Self {
        Self {
            listeners,
            state: Mutex::new(ForwardState {
                duration: None,
                speed: 1.0,
                awaiting_prepare: false,
                prepared: false,
            }),
        }
    }

    fn begin_prepare(&self) {
        let mut state = self.state.lock();
        state.awaiting_prepare = true;
        state.prepared = false;
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.awaiting_prepare = false;
        state.prepared = false;
        state.duration = None;
    }

    fn is_prepared(&self) -> bool {
        self.state.lock().prepared
    }
}

impl EventListener for EventForwarder {
    fn on_event(&self, event: &PlayerEvent) {
        let forward = {
            let mut state = self.state.lock();
            match event {
                PlayerEvent::DurationChanged(duration) => {
                    if state.duration == Some(*duration) {
                        false
                    } else {
                        state.duration = Some(*duration);
                        true
                    }
                }
                PlayerEvent::SpeedChanged(speed) => {
                    if state.speed == *speed {
                        false
                    } else {
                        state.speed = *speed;
                        true
                    }
                }
                PlayerEvent::PlaybackStateChanged {
                    state: PlaybackState::Ready,
                    ..
                } => {
                    if state.awaiting_prepare {
                        state.awaiting_prepare = false;
                        state.prepared = true;
                        info!("{} ✅ 媒体已就绪", log_ctx());
                    }
                    true
                }
                _ => true,
            }
        };

        if forward {
            self.listeners.notify(event);
        } else {
            debug!("{} 事件未变化，不转发: {:?}", log_ctx(), event);
        }
    }
}

/// 播放门面 - 应用层持有的对象
///
/// 传输控制直接转发给引擎；绘制目标与视频配置变化走渲染控制消息。
/// 释放后除 `release()` 外的操作都返回 `TerminalState`。
pub struct PlaybackFacade {
    engine: Arc<dyn Engine>,
    config: PlayerConfig,
    dispatcher: Arc<MessageDispatcher>,
    display: DisplayBindingManager,
    release: ReleaseCoordinator,
    listeners: Arc<ListenerSet>,
    forwarder: Arc<EventForwarder>,
    engine_listener: Arc<dyn EventListener>,
    source: Mutex<Option<MediaSource>>,
}

impl PlaybackFacade {
    pub fn new(engine: Arc<dyn Engine>, config: PlayerConfig) -> Self {
        info!("{} 🎮 创建播放门面...", log_ctx());
        let release_state = Arc::new(ReleaseStateCell::new());
        let dispatcher = Arc::new(MessageDispatcher::new(
            release_state,
            Interrupter::new(),
            config.delivery_timeout(),
        ));

        let renderer_engine = engine.clone();
        let renderers: RendererProvider = Arc::new(move || renderer_engine.renderers());
        let display = DisplayBindingManager::new(dispatcher.clone(), renderers);

        let listeners = Arc::new(ListenerSet::new());
        let forwarder = Arc::new(EventForwarder::new(listeners.clone()));
        let engine_listener: Arc<dyn EventListener> = forwarder.clone();
        engine.add_listener(engine_listener.clone());

        Self {
            engine,
            config,
            dispatcher,
            display,
            release: ReleaseCoordinator::new(),
            listeners,
            forwarder,
            engine_listener,
            source: Mutex::new(None),
        }
    }

    fn ensure_active(&self, operation: &str) -> Result<()> {
        self.dispatcher.release_state().ensure_not_released(operation)
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// 控制线程的中断标记；在其他线程上 interrupt() 后，正在进行的等待会在消息送达后返回中断
    pub fn interrupter(&self) -> Interrupter {
        self.dispatcher.interrupter().clone()
    }

    // ==================== 媒体源与传输控制 ====================

    /// 设置数据源；无法识别的 URI 直接失败，不改变任何状态
    pub fn set_data_source(&self, uri: &str) -> Result<()> {
        self.ensure_active("set_data_source")?;
        let source = MediaSource::from_uri(uri)?;
        info!("{} 📁 数据源: {} ({})", log_ctx(), source.uri, source.kind.as_str());
        self.engine.set_source(&source, &self.config.data_source_options())?;
        self.forwarder.reset();
        *self.source.lock() = Some(source);
        Ok(())
    }

    pub fn data_source(&self) -> Option<MediaSource> {
        self.source.lock().clone()
    }

    /// 准备播放；每次都把保存的数据源重新交给引擎（reset 会清空引擎侧的数据源）
    pub fn prepare(&self) -> Result<()> {
        self.ensure_active("prepare")?;
        let source = self
            .source
            .lock()
            .clone()
            .ok_or_else(|| PlayerError::Other("未设置数据源，无法 prepare".to_string()))?;
        self.engine.set_source(&source, &self.config.data_source_options())?;
        self.forwarder.begin_prepare();
        self.engine.prepare()
    }

    pub fn set_play_when_ready(&self, play: bool) -> Result<()> {
        self.ensure_active(if play { "start" } else { "pause" })?;
        info!("{} 🎬 {}", log_ctx(), if play { "播放" } else { "暂停" });
        self.engine.set_play_when_ready(play);
        Ok(())
    }

    pub fn start(&self) -> Result<()> {
        self.set_play_when_ready(true)
    }

    pub fn resume(&self) -> Result<()> {
        self.set_play_when_ready(true)
    }

    pub fn pause(&self) -> Result<()> {
        self.set_play_when_ready(false)
    }

    pub fn stop(&self) -> Result<()> {
        self.ensure_active("stop")?;
        info!("{} ⏹️  停止播放", log_ctx());
        self.engine.stop(false);
        Ok(())
    }

    /// 停止并重置位置，需要重新 prepare
    pub fn reset(&self) -> Result<()> {
        self.ensure_active("reset")?;
        info!("{} 🔄 重置播放器", log_ctx());
        self.engine.stop(true);
        self.forwarder.reset();
        Ok(())
    }

    pub fn seek_to(&self, position_ms: i64) -> Result<()> {
        self.ensure_active("seek_to")?;
        info!("{} 🎯 Seek 到: {} ms", log_ctx(), position_ms);
        self.engine.seek_to(position_ms.max(0));
        Ok(())
    }

    pub fn current_position(&self) -> Result<i64> {
        self.ensure_active("current_position")?;
        Ok(self.engine.position())
    }

    pub fn duration(&self) -> Result<Option<i64>> {
        self.ensure_active("duration")?;
        Ok(self.engine.duration())
    }

    pub fn is_playing(&self) -> bool {
        !self.is_released() && self.engine.play_when_ready() && self.engine.playback_state() == PlaybackState::Ready
    }

    pub fn is_prepared(&self) -> bool {
        self.forwarder.is_prepared()
    }

    pub fn is_released(&self) -> bool {
        self.dispatcher.release_state().is_released()
    }

    pub fn release_state(&self) -> ReleaseState {
        self.dispatcher.release_state().load()
    }

    pub fn set_speed(&self, speed: f32) -> Result<()> {
        self.ensure_active("set_speed")?;
        if !(speed.is_finite() && speed > 0.0) {
            return Err(PlayerError::Other(format!("非法的播放速度: {}", speed)));
        }
        self.engine.set_speed(speed);
        Ok(())
    }

    /// 设置音量 (0.0 - 1.0)
    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.ensure_active("set_volume")?;
        self.engine.set_volume(volume.clamp(0.0, 1.0));
        Ok(())
    }

    pub fn set_audio_routing(&self, routing: AudioRouting) -> Result<()> {
        self.ensure_active("set_audio_routing")?;
        self.engine.set_audio_routing(routing);
        Ok(())
    }

    // ==================== 监听器 ====================

    pub fn add_listener(&self, listener: Arc<dyn EventListener>) -> Result<()> {
        self.ensure_active("add_listener")?;
        self.listeners.add(listener);
        Ok(())
    }

    /// 移除监听器；释放后也允许调用
    pub fn remove_listener(&self, listener: &Arc<dyn EventListener>) -> bool {
        self.listeners.remove(listener)
    }

    // ==================== 绘制目标 ====================

    pub fn set_surface_view(&self, view: Option<Arc<dyn SurfaceView>>) -> Result<()> {
        self.ensure_active("set_surface_view")?;
        let target = view.clone().map(DisplayTarget::SurfaceView);
        self.engine.set_video_target(target.as_ref());
        self.display.set_surface_view(view)
    }

    pub fn set_surface_holder(&self, holder: Option<Arc<dyn SurfaceHolder>>) -> Result<()> {
        self.ensure_active("set_surface_holder")?;
        let target = holder.clone().map(DisplayTarget::SurfaceHolder);
        self.engine.set_video_target(target.as_ref());
        self.display.set_surface_holder(holder)
    }

    pub fn set_texture_view(&self, view: Option<Arc<dyn TextureView>>) -> Result<()> {
        self.ensure_active("set_texture_view")?;
        let target = view.clone().map(DisplayTarget::TextureView);
        self.engine.set_video_target(target.as_ref());
        self.display.set_texture_view(view)
    }

    pub fn display_kind(&self) -> Option<DisplayKind> {
        self.display.kind()
    }

    // ==================== 视频渲染配置 ====================

    /// 设置背景色，阻塞到视频渲染器确认
    pub fn set_background_color(&self, color: Color) -> Result<()> {
        self.ensure_active("set_background_color")?;
        self.send_to_video(ControlCommand::BackgroundColorChanged(color))
    }

    /// 设置缩放方式，阻塞到视频渲染器确认
    pub fn set_scale_type(&self, scale_type: ScaleType) -> Result<()> {
        self.ensure_active("set_scale_type")?;
        self.send_to_video(ControlCommand::ScaleTypeChanged(scale_type))
    }

    fn send_to_video(&self, command: ControlCommand) -> Result<()> {
        let renderers = self.engine.renderers();
        let sent = self
            .dispatcher
            .send_to_primary_and_wait(&renderers, TrackType::Video, command)?;
        if !sent {
            debug!("{} 当前没有视频渲染器，{:?} 未发送", log_ctx(), command.kind());
        }
        Ok(())
    }

    // ==================== 释放 ====================

    /// 释放播放器（幂等）
    pub fn release(&self) -> Result<()> {
        let result = self
            .release
            .release(&self.dispatcher, &self.display, self.engine.as_ref());
        if self.is_released() {
            self.engine.remove_listener(&self.engine_listener);
        }
        result
    }
}

impl Drop for PlaybackFacade {
    fn drop(&mut self) {
        if !self.is_released() {
            warn!("{} ⚠ PlaybackFacade 被 drop，但未调用 release()，正在释放", log_ctx());
            if let Err(e) = self.release() {
                warn!("{} ⚠️  自动释放失败: {}", log_ctx(), e);
            }
        }
    }
}
