use crate::core::{log_ctx, PlayerError, Result, Size, TrackType};
use crate::player::dispatch::MessageDispatcher;
use crate::player::surface::{
    DisplayKind, DisplayTarget, SurfaceHolder, SurfaceHolderCallback, SurfaceTextureListener, SurfaceView, TextureView,
};
use crate::renderer::{ControlCommand, RendererSet};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// 取当前渲染器集合（通常来自引擎）
pub type RendererProvider = Arc<dyn Fn() -> RendererSet + Send + Sync>;

fn same_object<T: ?Sized, U: ?Sized>(a: &Arc<T>, b: &Arc<U>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

struct HolderBinding {
    holder: Arc<dyn SurfaceHolder>,
    callback: Arc<dyn SurfaceHolderCallback>,
}

struct TextureBinding {
    view: Arc<dyn TextureView>,
    installed: Arc<dyn SurfaceTextureListener>,
    original: Option<Arc<dyn SurfaceTextureListener>>,
}

struct ActiveBinding {
    generation: u64,
    kind: DisplayKind,
    known_size: Size,
    holder: Option<HolderBinding>,
    texture: Option<TextureBinding>,
}

impl ActiveBinding {
    fn listener_installed(&self) -> bool {
        self.holder.is_some() || self.texture.is_some()
    }

    /// 摘除本绑定安装的回调；TextureView 只在我们的监听器仍在位时才还原原监听器
    fn uninstall(self) {
        if let Some(binding) = self.holder {
            binding.holder.remove_callback(&binding.callback);
        }
        if let Some(binding) = self.texture {
            let still_ours = binding
                .view
                .surface_texture_listener()
                .map(|current| same_object(&current, &binding.installed))
                .unwrap_or(false);
            if still_ours {
                binding.view.set_surface_texture_listener(binding.original);
            }
        }
        debug!("{} 🔌 已摘除 {:?} 绑定 (generation {})", log_ctx(), self.kind, self.generation);
    }
}

enum BindingState {
    Unbound,
    Bound(ActiveBinding),
    Released,
}

struct BindingShared {
    state: Mutex<BindingState>,
    next_generation: AtomicU64,
    dispatcher: Arc<MessageDispatcher>,
    renderers: RendererProvider,
}

impl BindingShared {
    /// 平台尺寸回调入口；过期绑定的回调直接丢弃
    fn on_surface_resized(&self, generation: u64, size: Size) {
        {
            let mut state = self.state.lock();
            match &mut *state {
                BindingState::Bound(binding) if binding.generation == generation => binding.known_size = size,
                _ => {
                    debug!("{} 忽略已解绑目标的尺寸回调 (generation {})", log_ctx(), generation);
                    return;
                }
            }
        }

        if let Err(e) = self.dispatch_size(size) {
            warn!("{} ⚠️  通知视频渲染器尺寸 {}x{} 失败: {}", log_ctx(), size.width, size.height, e);
        }
    }

    /// 发给视频渲染器并阻塞到送达，保证下一帧绘制前渲染器已拿到新尺寸
    fn dispatch_size(&self, size: Size) -> Result<()> {
        let renderers = (self.renderers)();
        let sent = self.dispatcher.send_to_primary_and_wait(
            &renderers,
            TrackType::Video,
            ControlCommand::SurfaceSizeChanged(size),
        )?;
        if sent {
            debug!("{} 📐 视频渲染器已确认尺寸 {}x{}", log_ctx(), size.width, size.height);
        }
        Ok(())
    }
}

struct HolderCallback {
    shared: Weak<BindingShared>,
    generation: u64,
}

impl SurfaceHolderCallback for HolderCallback {
    fn surface_created(&self) {
        debug!("{} surface created (generation {})", log_ctx(), self.generation);
    }

    fn surface_changed(&self, width: u32, height: u32) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_surface_resized(self.generation, Size::new(width, height));
        }
    }

    fn surface_destroyed(&self) {
        debug!("{} surface destroyed (generation {})", log_ctx(), self.generation);
    }
}

/// 包装 TextureView 原有监听器：所有事件先转发给原监听器
struct TextureListener {
    shared: Weak<BindingShared>,
    generation: u64,
    original: Option<Arc<dyn SurfaceTextureListener>>,
}

impl TextureListener {
    fn resized(&self, width: u32, height: u32) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_surface_resized(self.generation, Size::new(width, height));
        }
    }
}

impl SurfaceTextureListener for TextureListener {
    fn on_available(&self, width: u32, height: u32) {
        if let Some(original) = &self.original {
            original.on_available(width, height);
        }
        self.resized(width, height);
    }

    fn on_size_changed(&self, width: u32, height: u32) {
        if let Some(original) = &self.original {
            original.on_size_changed(width, height);
        }
        self.resized(width, height);
    }

    fn on_destroyed(&self) -> bool {
        self.original.as_ref().map(|original| original.on_destroyed()).unwrap_or(true)
    }

    fn on_updated(&self) {
        if let Some(original) = &self.original {
            original.on_updated();
        }
    }
}

/// 绘制目标绑定管理
///
/// 状态机：Unbound → Bound(kind) → Bound(new kind) → Released（终态）。
/// 切换绑定时在同一把锁内先摘旧回调再装新回调，新旧回调不会同时在位；
/// 旧绑定之后的回调因 generation 不匹配被丢弃。
///
/// 平台实现不得在 add_callback / set_surface_texture_listener 内部同步触发回调。
pub struct DisplayBindingManager {
    shared: Arc<BindingShared>,
}

impl DisplayBindingManager {
    pub fn new(dispatcher: Arc<MessageDispatcher>, renderers: RendererProvider) -> Self {
        Self {
            shared: Arc::new(BindingShared {
                state: Mutex::new(BindingState::Unbound),
                next_generation: AtomicU64::new(1),
                dispatcher,
                renderers,
            }),
        }
    }

    pub fn set_surface_view(&self, view: Option<Arc<dyn SurfaceView>>) -> Result<()> {
        match view {
            Some(view) => self.attach(DisplayTarget::SurfaceView(view)),
            None => self.detach_checked(),
        }
    }

    pub fn set_surface_holder(&self, holder: Option<Arc<dyn SurfaceHolder>>) -> Result<()> {
        match holder {
            Some(holder) => self.attach(DisplayTarget::SurfaceHolder(holder)),
            None => self.detach_checked(),
        }
    }

    pub fn set_texture_view(&self, view: Option<Arc<dyn TextureView>>) -> Result<()> {
        match view {
            Some(view) => self.attach(DisplayTarget::TextureView(view)),
            None => self.detach_checked(),
        }
    }

    /// 绑定新目标（先解绑旧目标）
    ///
    /// TextureView 已经可用且尺寸非零时，立即补发一次 SurfaceSizeChanged：
    /// 已布局好的目标之后可能不会再触发尺寸回调。
    /// 补发失败（中断 / 超时）时绑定本身仍然生效，错误返回给调用方。
    pub fn attach(&self, target: DisplayTarget) -> Result<()> {
        let kind = target.kind();
        let (generation, synthesized) = {
            let mut state = self.shared.state.lock();
            if matches!(*state, BindingState::Released) {
                return Err(PlayerError::TerminalState(format!("绑定 {:?}", kind)));
            }
            Self::detach_locked(&mut state);

            let generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);
            let mut binding = self.install(target, generation);
            let synthesized = match &binding.texture {
                Some(texture) if texture.view.is_available() && texture.view.size().is_laid_out() => {
                    Some(texture.view.size())
                }
                _ => None,
            };
            if let Some(size) = synthesized {
                binding.known_size = size;
            }
            *state = BindingState::Bound(binding);
            (generation, synthesized)
        };
        info!("{} 🖼️  已绑定 {:?} (generation {})", log_ctx(), kind, generation);

        if let Some(size) = synthesized {
            debug!("{} TextureView 已可用 ({}x{})，补发尺寸", log_ctx(), size.width, size.height);
            self.shared.dispatch_size(size)?;
        }
        Ok(())
    }

    fn install(&self, target: DisplayTarget, generation: u64) -> ActiveBinding {
        let kind = target.kind();
        let weak = Arc::downgrade(&self.shared);
        let mut binding = ActiveBinding {
            generation,
            kind,
            known_size: Size::ZERO,
            holder: None,
            texture: None,
        };

        match target {
            DisplayTarget::SurfaceView(view) => {
                binding.holder = Some(Self::install_holder(view.holder(), weak, generation));
            }
            DisplayTarget::SurfaceHolder(holder) => {
                binding.holder = Some(Self::install_holder(holder, weak, generation));
            }
            DisplayTarget::TextureView(view) => {
                let original = view.surface_texture_listener();
                let installed: Arc<dyn SurfaceTextureListener> = Arc::new(TextureListener {
                    shared: weak,
                    generation,
                    original: original.clone(),
                });
                view.set_surface_texture_listener(Some(installed.clone()));
                binding.texture = Some(TextureBinding {
                    view,
                    installed,
                    original,
                });
            }
        }
        binding
    }

    fn install_holder(holder: Arc<dyn SurfaceHolder>, shared: Weak<BindingShared>, generation: u64) -> HolderBinding {
        let callback: Arc<dyn SurfaceHolderCallback> = Arc::new(HolderCallback { shared, generation });
        holder.add_callback(callback.clone());
        HolderBinding { holder, callback }
    }

    fn detach_locked(state: &mut BindingState) {
        match std::mem::replace(state, BindingState::Unbound) {
            BindingState::Bound(binding) => binding.uninstall(),
            BindingState::Unbound => {}
            BindingState::Released => *state = BindingState::Released,
        }
    }

    /// 解绑当前目标；未绑定或已释放时为空操作
    pub fn detach(&self) {
        let mut state = self.shared.state.lock();
        Self::detach_locked(&mut state);
    }

    fn detach_checked(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if matches!(*state, BindingState::Released) {
            return Err(PlayerError::TerminalState("解绑绘制目标".to_string()));
        }
        Self::detach_locked(&mut state);
        Ok(())
    }

    /// 解绑并进入终态
    pub fn release(&self) {
        let mut state = self.shared.state.lock();
        Self::detach_locked(&mut state);
        *state = BindingState::Released;
    }

    pub fn kind(&self) -> Option<DisplayKind> {
        match &*self.shared.state.lock() {
            BindingState::Bound(binding) => Some(binding.kind),
            _ => None,
        }
    }

    /// 最近一次已知的目标尺寸
    pub fn known_size(&self) -> Option<Size> {
        match &*self.shared.state.lock() {
            BindingState::Bound(binding) => Some(binding.known_size),
            _ => None,
        }
    }

    pub fn is_listener_installed(&self) -> bool {
        match &*self.shared.state.lock() {
            BindingState::Bound(binding) => binding.listener_installed(),
            _ => false,
        }
    }

    pub fn is_released(&self) -> bool {
        matches!(*self.shared.state.lock(), BindingState::Released)
    }
}
