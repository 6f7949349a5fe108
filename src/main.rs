use anyhow::{Context, Result};
use log::{debug, info};
use mq_player::core::{log_ctx, AudioRouting, Color, DataSourceOptions, MediaSource, PlaybackState, PlayerConfig, ScaleType, Size, TrackType};
use mq_player::player::{
    DisplayTarget, Engine, EventListener, ListenerSet, PlaybackFacade, PlayerEvent, SurfaceTextureListener, TextureView,
};
use mq_player::renderer::{
    ControlMessage, FrameGeometry, Renderer, RendererSet, RendererThread, VideoOutputState, VideoRenderer,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// 音频渲染器：只记录收到的控制消息
struct LoggingAudioRenderer;

impl Renderer for LoggingAudioRenderer {
    fn track_type(&self) -> TrackType {
        TrackType::Audio
    }

    fn handle_message(&mut self, message: &ControlMessage) -> mq_player::Result<()> {
        info!("{} 🔊 音频渲染器收到 {:?}", log_ctx(), message.command());
        Ok(())
    }
}

struct DemoState {
    source: Option<MediaSource>,
    play_when_ready: bool,
    playback_state: PlaybackState,
    position_ms: i64,
    threads: Vec<RendererThread>,
}

/// 无界面演示引擎：一个视频渲染线程 + 一个音频渲染线程，播放状态即时模拟
struct DemoEngine {
    state: Mutex<DemoState>,
    listeners: ListenerSet,
    video_state: Arc<Mutex<VideoOutputState>>,
}

impl DemoEngine {
    fn new(config: &PlayerConfig) -> Result<Self> {
        let video = VideoRenderer::new(config.background_color, config.scale_type);
        let video_state = video.shared_state();
        let threads = vec![
            RendererThread::spawn(0, Box::new(video)).context("启动视频渲染线程失败")?,
            RendererThread::spawn(0, Box::new(LoggingAudioRenderer)).context("启动音频渲染线程失败")?,
        ];

        Ok(Self {
            state: Mutex::new(DemoState {
                source: None,
                play_when_ready: false,
                playback_state: PlaybackState::Idle,
                position_ms: 0,
                threads,
            }),
            listeners: ListenerSet::new(),
            video_state,
        })
    }

    fn video_state(&self) -> Arc<Mutex<VideoOutputState>> {
        self.video_state.clone()
    }

    fn emit_state(&self) {
        let event = {
            let state = self.state.lock();
            PlayerEvent::PlaybackStateChanged {
                play_when_ready: state.play_when_ready,
                state: state.playback_state,
            }
        };
        self.listeners.notify(&event);
    }
}

impl Engine for DemoEngine {
    fn set_source(&self, source: &MediaSource, options: &DataSourceOptions) -> mq_player::Result<()> {
        info!(
            "{} 📁 引擎数据源: {} (UA: {}, 缓存: {:?})",
            log_ctx(),
            source.uri,
            options.user_agent,
            options.cache_dir
        );
        self.state.lock().source = Some(source.clone());
        Ok(())
    }

    fn prepare(&self) -> mq_player::Result<()> {
        self.state.lock().playback_state = PlaybackState::Buffering;
        self.emit_state();
        self.state.lock().playback_state = PlaybackState::Ready;
        self.emit_state();
        self.listeners.notify(&PlayerEvent::DurationChanged(60_000));
        // 重复的时长事件会被门面过滤
        self.listeners.notify(&PlayerEvent::DurationChanged(60_000));
        Ok(())
    }

    fn set_play_when_ready(&self, play: bool) {
        self.state.lock().play_when_ready = play;
        self.emit_state();
    }

    fn play_when_ready(&self) -> bool {
        self.state.lock().play_when_ready
    }

    fn playback_state(&self) -> PlaybackState {
        self.state.lock().playback_state
    }

    fn stop(&self, reset: bool) {
        {
            let mut state = self.state.lock();
            state.playback_state = PlaybackState::Idle;
            state.play_when_ready = false;
            if reset {
                state.position_ms = 0;
                state.source = None;
            }
        }
        self.emit_state();
    }

    fn seek_to(&self, position_ms: i64) {
        self.state.lock().position_ms = position_ms;
        self.listeners.notify(&PlayerEvent::SeekComplete { position_ms });
    }

    fn position(&self) -> i64 {
        self.state.lock().position_ms
    }

    fn duration(&self) -> Option<i64> {
        self.state.lock().source.as_ref().map(|_| 60_000)
    }

    fn set_speed(&self, speed: f32) {
        self.listeners.notify(&PlayerEvent::SpeedChanged(speed));
    }

    fn set_volume(&self, volume: f32) {
        self.listeners.notify(&PlayerEvent::VolumeChanged(volume));
    }

    fn set_audio_routing(&self, routing: AudioRouting) {
        debug!("{} 音频路由: {:?}", log_ctx(), routing);
    }

    fn set_video_target(&self, target: Option<&DisplayTarget>) {
        debug!("{} 引擎绘制目标: {:?}", log_ctx(), target);
    }

    fn renderers(&self) -> RendererSet {
        self.state.lock().threads.iter().map(RendererThread::handle).collect()
    }

    fn add_listener(&self, listener: Arc<dyn EventListener>) {
        self.listeners.add(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn EventListener>) {
        self.listeners.remove(listener);
    }

    fn release(&self) -> mq_player::Result<()> {
        let threads = std::mem::take(&mut self.state.lock().threads);
        for mut thread in threads {
            thread.shutdown();
        }
        Ok(())
    }
}

/// 模拟 TextureView：已布局好，尺寸变化时回调当前监听器
struct DemoTextureView {
    size: Mutex<Size>,
    listener: Mutex<Option<Arc<dyn SurfaceTextureListener>>>,
}

impl DemoTextureView {
    fn new(size: Size) -> Self {
        Self {
            size: Mutex::new(size),
            listener: Mutex::new(None),
        }
    }

    fn resize(&self, size: Size) {
        *self.size.lock() = size;
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener.on_size_changed(size.width, size.height);
        }
    }
}

impl TextureView for DemoTextureView {
    fn is_available(&self) -> bool {
        true
    }

    fn size(&self) -> Size {
        *self.size.lock()
    }

    fn surface_texture_listener(&self) -> Option<Arc<dyn SurfaceTextureListener>> {
        self.listener.lock().clone()
    }

    fn set_surface_texture_listener(&self, listener: Option<Arc<dyn SurfaceTextureListener>>) {
        *self.listener.lock() = listener;
    }
}

fn main() -> Result<()> {
    // 初始化日志
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("🎬 MQ Player 渲染控制演示启动");

    let config_path = std::env::args().nth(1);
    let config = PlayerConfig::load(config_path.as_deref().map(Path::new)).context("加载配置失败")?;
    info!("{} ⚙️  配置: {:?}", log_ctx(), config);

    let engine = Arc::new(DemoEngine::new(&config)?);
    let video_state = engine.video_state();
    let facade = PlaybackFacade::new(engine.clone(), config);

    let listener: Arc<dyn EventListener> = Arc::new(|event: &PlayerEvent| {
        info!("{} 📣 事件: {:?}", log_ctx(), event);
    });
    facade.add_listener(listener.clone())?;

    facade.set_data_source("https://example.com/live/stream.m3u8")?;
    facade.prepare()?;
    facade.start()?;
    info!("{} ▶️  is_playing = {}", log_ctx(), facade.is_playing());

    let view = Arc::new(DemoTextureView::new(Size::new(1280, 720)));
    facade.set_texture_view(Some(view.clone()))?;
    info!("{} 渲染器当前尺寸: {:?}", log_ctx(), video_state.lock().surface_size());

    view.resize(Size::new(1920, 1080));
    info!("{} 渲染器当前尺寸: {:?}", log_ctx(), video_state.lock().surface_size());

    facade.set_background_color(Color::from_argb(0xFF, 0x20, 0x20, 0x20))?;
    facade.set_scale_type(ScaleType::FitCenter)?;

    let frame = FrameGeometry {
        width: 1920,
        height: 800,
        stride: 1920,
        bit_depth: 1,
        rotation: 0,
    };
    if let Some(layout) = video_state.lock().layout(frame) {
        info!("{} 📐 纹理坐标: {:?}", log_ctx(), layout.texture_coords);
    }

    facade.release()?;
    info!("{} released = {}，渲染器已收到释放通知: {}", log_ctx(), facade.is_released(), video_state.lock().is_released());
    Ok(())
}
