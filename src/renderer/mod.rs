// 渲染器控制消息协议：消息、队列、渲染线程

pub mod handle;
pub mod message;
pub mod registry;
pub mod video;

pub use handle::{Renderer, RendererHandle, RendererInbox, RendererThread};
pub use message::{
    ControlCommand, ControlMessage, DeliveryBatch, DeliveryState, Interrupter, MessageKind, PendingDelivery,
};
pub use registry::RendererSet;
pub use video::{compute_texture_coords, FrameGeometry, FrameLayout, VideoOutputState, VideoRenderer};
