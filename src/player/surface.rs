//! 平台绘制目标接口
//!
//! 三种绘制目标互斥：SurfaceView、SurfaceHolder、TextureView。
//! 平台回调约定都在控制线程上执行。

use crate::core::Size;
use std::fmt;
use std::sync::Arc;

/// SurfaceHolder 生命周期回调
pub trait SurfaceHolderCallback: Send + Sync {
    fn surface_created(&self) {}
    fn surface_changed(&self, width: u32, height: u32);
    fn surface_destroyed(&self) {}
}

pub trait SurfaceHolder: Send + Sync {
    fn add_callback(&self, callback: Arc<dyn SurfaceHolderCallback>);
    fn remove_callback(&self, callback: &Arc<dyn SurfaceHolderCallback>);
}

pub trait SurfaceView: Send + Sync {
    fn holder(&self) -> Arc<dyn SurfaceHolder>;
}

/// TextureView 的 SurfaceTexture 监听器
pub trait SurfaceTextureListener: Send + Sync {
    fn on_available(&self, width: u32, height: u32);
    fn on_size_changed(&self, width: u32, height: u32);
    /// 返回 true 表示由平台释放 SurfaceTexture
    fn on_destroyed(&self) -> bool;
    fn on_updated(&self) {}
}

pub trait TextureView: Send + Sync {
    /// SurfaceTexture 是否已可用
    fn is_available(&self) -> bool;
    /// 当前布局尺寸
    fn size(&self) -> Size;
    fn surface_texture_listener(&self) -> Option<Arc<dyn SurfaceTextureListener>>;
    fn set_surface_texture_listener(&self, listener: Option<Arc<dyn SurfaceTextureListener>>);
}

/// 绘制目标种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    SurfaceView,
    SurfaceHolder,
    TextureView,
}

/// 绘制目标（三选一）
#[derive(Clone)]
pub enum DisplayTarget {
    SurfaceView(Arc<dyn SurfaceView>),
    SurfaceHolder(Arc<dyn SurfaceHolder>),
    TextureView(Arc<dyn TextureView>),
}

impl DisplayTarget {
    pub fn kind(&self) -> DisplayKind {
        match self {
            DisplayTarget::SurfaceView(_) => DisplayKind::SurfaceView,
            DisplayTarget::SurfaceHolder(_) => DisplayKind::SurfaceHolder,
            DisplayTarget::TextureView(_) => DisplayKind::TextureView,
        }
    }
}

impl fmt::Debug for DisplayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisplayTarget::{:?}", self.kind())
    }
}
