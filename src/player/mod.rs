// 播放器控制面：派发、绘制目标绑定、释放、引擎接口与门面

pub mod dispatch;
pub mod display;
pub mod engine;
pub mod facade;
pub mod release;
pub mod surface;

pub use dispatch::MessageDispatcher;
pub use display::{DisplayBindingManager, RendererProvider};
pub use engine::{Engine, EventListener, ListenerSet, PlayerEvent};
pub use facade::PlaybackFacade;
pub use release::{ReleaseCoordinator, ReleaseState, ReleaseStateCell};
pub use surface::{
    DisplayKind, DisplayTarget, SurfaceHolder, SurfaceHolderCallback, SurfaceTextureListener, SurfaceView, TextureView,
};
