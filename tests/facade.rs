mod common;

use common::{event_collector, init_logger, wait_until, Gate, MockEngine};
use mq_player::core::{Color, PlaybackState, PlayerConfig, PlayerError, ScaleType, SourceKind};
use mq_player::player::{DisplayKind, PlaybackFacade, PlayerEvent, ReleaseState};
use mq_player::renderer::ControlCommand;
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[test]
fn data_source_kind_is_inferred_and_forwarded() {
    init_logger();
    let engine = MockEngine::new();
    let facade = PlaybackFacade::new(engine.clone(), PlayerConfig::default());

    facade.set_data_source("https://cdn.example.com/vod/movie.mpd").unwrap();
    assert_eq!(engine.source().unwrap().kind, SourceKind::Dash);

    facade.set_data_source("https://cdn.example.com/live/index.m3u8?token=1").unwrap();
    assert_eq!(facade.data_source().unwrap().kind, SourceKind::Hls);
}

#[test]
fn unsupported_source_leaves_state_untouched() {
    init_logger();
    let engine = MockEngine::new();
    let facade = PlaybackFacade::new(engine.clone(), PlayerConfig::default());
    facade.set_data_source("/sdcard/movie.mp4").unwrap();

    let err = facade.set_data_source("ftp://example.com/movie.mp4").unwrap_err();
    assert!(matches!(err, PlayerError::UnsupportedSourceKind(_)));
    assert_eq!(facade.data_source().unwrap().uri, "/sdcard/movie.mp4");
    assert_eq!(engine.source().unwrap().kind, SourceKind::Progressive);
}

#[test]
fn prepare_requires_source_and_completes_on_first_ready() {
    init_logger();
    let engine = MockEngine::new();
    let facade = PlaybackFacade::new(engine.clone(), PlayerConfig::default());
    assert!(facade.prepare().is_err());

    facade.set_data_source("https://example.com/a.mp4").unwrap();
    facade.prepare().unwrap();
    assert!(!facade.is_prepared());

    engine.set_state(PlaybackState::Ready);
    assert!(facade.is_prepared());

    facade.start().unwrap();
    assert!(facade.is_playing());
    facade.pause().unwrap();
    assert!(!facade.is_playing());

    facade.reset().unwrap();
    assert!(!facade.is_prepared());
}

#[test]
fn listeners_receive_deduplicated_events() {
    init_logger();
    let engine = MockEngine::new();
    let facade = PlaybackFacade::new(engine.clone(), PlayerConfig::default());
    let (listener, events) = event_collector();
    facade.add_listener(listener.clone()).unwrap();

    engine.emit(PlayerEvent::DurationChanged(1_000));
    engine.emit(PlayerEvent::DurationChanged(1_000));
    engine.emit(PlayerEvent::DurationChanged(2_000));
    facade.set_speed(1.0).unwrap();
    facade.set_speed(1.5).unwrap();
    facade.set_speed(1.5).unwrap();
    engine.emit(PlayerEvent::Error("decoder failure".to_string()));
    facade.seek_to(5_000).unwrap();

    assert_eq!(
        events.lock().clone(),
        vec![
            PlayerEvent::DurationChanged(1_000),
            PlayerEvent::DurationChanged(2_000),
            PlayerEvent::SpeedChanged(1.5),
            PlayerEvent::Error("decoder failure".to_string()),
            PlayerEvent::SeekComplete { position_ms: 5_000 },
        ]
    );

    assert!(facade.remove_listener(&listener));
    engine.emit(PlayerEvent::FirstFrameRendered);
    assert_eq!(events.lock().len(), 5);
}

#[test]
fn volume_is_clamped_and_speed_validated() {
    init_logger();
    let engine = MockEngine::new();
    let facade = PlaybackFacade::new(engine.clone(), PlayerConfig::default());

    facade.set_volume(1.7).unwrap();
    assert_eq!(*engine.volume.lock(), Some(1.0));
    facade.set_volume(-0.2).unwrap();
    assert_eq!(*engine.volume.lock(), Some(0.0));

    assert!(facade.set_speed(0.0).is_err());
    assert!(facade.set_speed(f32::NAN).is_err());
}

#[test]
fn video_configuration_goes_to_primary_video_renderer() {
    init_logger();
    let engine = MockEngine::new();
    let facade = PlaybackFacade::new(engine.clone(), PlayerConfig::default());

    facade.set_background_color(Color::from_argb(0xFF, 0x10, 0x20, 0x30)).unwrap();
    facade.set_scale_type(ScaleType::FitY).unwrap();

    assert_eq!(
        engine.video_commands(),
        vec![
            ControlCommand::BackgroundColorChanged(Color(0xFF10_2030)),
            ControlCommand::ScaleTypeChanged(ScaleType::FitY),
        ]
    );
    assert!(engine.audio_commands().is_empty());
}

#[test]
fn missing_video_renderer_drops_configuration_silently() {
    init_logger();
    let engine = MockEngine::audio_only();
    let facade = PlaybackFacade::new(engine.clone(), PlayerConfig::default());

    facade.set_scale_type(ScaleType::FitX).unwrap();
    assert!(engine.audio_commands().is_empty());
}

#[test]
fn release_is_idempotent_and_notifies_every_renderer_once() {
    init_logger();
    let engine = MockEngine::new();
    let facade = PlaybackFacade::new(engine.clone(), PlayerConfig::default());
    assert_eq!(facade.release_state(), ReleaseState::Active);

    facade.release().unwrap();
    facade.release().unwrap();

    assert_eq!(facade.release_state(), ReleaseState::Released);
    assert_eq!(engine.video_commands(), vec![ControlCommand::ReleaseRequested]);
    assert_eq!(engine.audio_commands(), vec![ControlCommand::ReleaseRequested]);
    assert_eq!(engine.release_calls.load(Ordering::SeqCst), 1);
    // 门面挂在引擎上的监听器已摘除
    assert!(engine.listeners.is_empty());
}

#[test]
fn operations_after_release_report_terminal_state() {
    init_logger();
    let engine = MockEngine::new();
    let facade = PlaybackFacade::new(engine.clone(), PlayerConfig::default());
    let (listener, _events) = event_collector();
    facade.add_listener(listener.clone()).unwrap();
    facade.release().unwrap();

    assert!(matches!(facade.start(), Err(PlayerError::TerminalState(_))));
    assert!(matches!(
        facade.set_data_source("https://example.com/a.mp4"),
        Err(PlayerError::TerminalState(_))
    ));
    assert!(matches!(facade.set_scale_type(ScaleType::FitXy), Err(PlayerError::TerminalState(_))));
    assert!(matches!(facade.current_position(), Err(PlayerError::TerminalState(_))));
    assert!(matches!(facade.add_listener(listener.clone()), Err(PlayerError::TerminalState(_))));
    assert!(!facade.is_playing());
    assert!(facade.remove_listener(&listener));
    assert_eq!(facade.display_kind(), None::<DisplayKind>);
}

#[test]
fn drop_without_release_releases_engine() {
    init_logger();
    let engine = MockEngine::new();
    {
        let _facade = PlaybackFacade::new(engine.clone(), PlayerConfig::default());
    }
    assert_eq!(engine.release_calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.video_commands(), vec![ControlCommand::ReleaseRequested]);
}

#[test]
fn interrupted_configuration_change_still_reaches_renderer() {
    init_logger();
    let (mut gate, gate_handle) = Gate::new();
    let engine = MockEngine::with_video_gate(gate_handle);
    let facade = PlaybackFacade::new(engine.clone(), PlayerConfig::default());
    let interrupter = facade.interrupter();

    std::thread::scope(|scope| {
        let setter = scope.spawn(|| facade.set_background_color(Color::BLACK));
        gate.wait_entered();
        interrupter.interrupt();
        gate.open();
        assert!(matches!(setter.join().unwrap(), Err(PlayerError::DeliveryInterrupted)));
    });
    assert_eq!(engine.video_commands(), vec![ControlCommand::BackgroundColorChanged(Color::BLACK)]);

    interrupter.clear();
    facade.release().unwrap();
}

#[test]
fn delivery_timeout_is_recoverable() {
    init_logger();
    let (mut gate, gate_handle) = Gate::new();
    let engine = MockEngine::with_video_gate(gate_handle);
    let config = PlayerConfig {
        delivery_timeout_ms: Some(30),
        ..PlayerConfig::default()
    };
    let facade = PlaybackFacade::new(engine.clone(), config);

    let err = facade.set_scale_type(ScaleType::FitX).unwrap_err();
    assert!(matches!(err, PlayerError::DeliveryTimeout(_)));
    assert!(err.is_recoverable());
    assert!(!facade.is_released());

    gate.open();
    assert!(wait_until(Duration::from_secs(2), || engine.video_commands().len() == 1));
    assert_eq!(facade.display_kind(), None);
    facade.release().unwrap();
}

#[test]
fn prepare_after_reset_hands_source_back_to_engine() {
    init_logger();
    let engine = MockEngine::new();
    let facade = PlaybackFacade::new(engine.clone(), PlayerConfig::default());
    facade.set_data_source("https://example.com/a.mp4").unwrap();
    facade.prepare().unwrap();

    facade.reset().unwrap();
    assert!(engine.source().is_none());

    facade.prepare().unwrap();
    assert_eq!(engine.source().unwrap().uri, "https://example.com/a.mp4");
    engine.set_state(PlaybackState::Ready);
    assert!(facade.is_prepared());
}

#[test]
fn engine_receives_configured_user_agent_and_cache_dir() {
    init_logger();
    let engine = MockEngine::new();
    let config = PlayerConfig {
        user_agent: "demo/3.1".to_string(),
        cache_dir: Some(PathBuf::from("/data/downloads")),
        ..PlayerConfig::default()
    };
    let facade = PlaybackFacade::new(engine.clone(), config);

    facade.set_data_source("https://example.com/live.m3u8").unwrap();
    let options = engine.source_options.lock().clone().unwrap();
    assert_eq!(options.user_agent, "demo/3.1");
    assert_eq!(options.cache_dir, Some(PathBuf::from("/data/downloads")));
}
