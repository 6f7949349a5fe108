use crate::core::{log_ctx, Color, Result, ScaleType, Size, TrackType};
use crate::renderer::handle::Renderer;
use crate::renderer::message::{ControlCommand, ControlMessage};
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::Arc;

/// 一帧的几何信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    /// 第 0 平面的行跨度（字节）
    pub stride: u32,
    /// 每个采样的字节数（8bit = 1，10bit = 2）
    pub bit_depth: u32,
    /// 顺时针旋转角度（0 / 90 / 180 / 270）
    pub rotation: u32,
}

impl FrameGeometry {
    fn is_rotated(&self) -> bool {
        self.rotation == 90 || self.rotation == 270
    }
}

/// 绘制一帧所需的纹理坐标与清屏颜色
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameLayout {
    /// 三角带四个顶点的纹理坐标 (u, v)
    pub texture_coords: [f32; 8],
    /// 背景色 [r, g, b, a]
    pub clear_color: [f32; 4],
}

// 上一次计算布局时的输入，任一变化才重新计算
#[derive(Debug, Clone, Copy, PartialEq)]
struct LayoutKey {
    frame: FrameGeometry,
    surface: Size,
    scale_type: ScaleType,
}

/// 视频输出状态：由控制消息驱动，在渲染线程上更新
#[derive(Debug)]
pub struct VideoOutputState {
    surface_size: Size,
    background: Color,
    scale_type: ScaleType,
    released: bool,
    cached: Option<(LayoutKey, [f32; 8])>,
    layout_computations: usize,
}

impl VideoOutputState {
    pub fn new(background: Color, scale_type: ScaleType) -> Self {
        Self {
            surface_size: Size::ZERO,
            background,
            scale_type,
            released: false,
            cached: None,
            layout_computations: 0,
        }
    }

    pub fn surface_size(&self) -> Size {
        self.surface_size
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn scale_type(&self) -> ScaleType {
        self.scale_type
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// 纹理坐标实际重新计算的次数
    pub fn layout_computations(&self) -> usize {
        self.layout_computations
    }

    /// 应用一条控制指令
    pub fn apply(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::SurfaceSizeChanged(size) => {
                debug!("{} 📐 视频输出尺寸: {}x{}", log_ctx(), size.width, size.height);
                self.surface_size = size;
            }
            ControlCommand::BackgroundColorChanged(color) => {
                debug!("{} 🎨 背景色: {:#010x}", log_ctx(), color.0);
                self.background = color;
            }
            ControlCommand::ScaleTypeChanged(scale_type) => {
                debug!("{} 🔍 缩放方式: {:?}", log_ctx(), scale_type);
                self.scale_type = scale_type;
            }
            ControlCommand::ReleaseRequested => {
                info!("{} 🧹 视频输出收到释放通知", log_ctx());
                self.released = true;
                self.cached = None;
            }
        }
    }

    /// 计算一帧的布局；绘制目标未布局或帧尺寸非法时返回 None
    pub fn layout(&mut self, frame: FrameGeometry) -> Option<FrameLayout> {
        if !self.surface_size.is_laid_out() || frame.width == 0 || frame.height == 0 || frame.stride == 0 {
            return None;
        }

        let key = LayoutKey {
            frame,
            surface: self.surface_size,
            scale_type: self.scale_type,
        };
        let texture_coords = match self.cached {
            Some((cached_key, coords)) if cached_key == key => coords,
            _ => {
                let coords = compute_texture_coords(frame, self.surface_size, self.scale_type);
                self.cached = Some((key, coords));
                self.layout_computations += 1;
                coords
            }
        };

        Some(FrameLayout {
            texture_coords,
            clear_color: self.background.to_rgba_f32(),
        })
    }
}

/// 按缩放方式计算纹理坐标
///
/// 非 FitXy 时，在被裁剪（或留边）的方向上计算内缩比例；
/// 旋转 90/270 时先交换宽高，最后交换两个方向的内缩；
/// 水平坐标再乘以 `width * bit_depth / stride` 去掉行跨度的填充，
/// 最后按帧的旋转角度重排四个顶点。
pub fn compute_texture_coords(frame: FrameGeometry, surface: Size, scale_type: ScaleType) -> [f32; 8] {
    let (mut width, mut height) = (frame.width as f32, frame.height as f32);
    if frame.is_rotated() {
        std::mem::swap(&mut width, &mut height);
    }
    let surface_width = surface.width as f32;
    let surface_height = surface.height as f32;

    let mut vertical = 0.0_f32;
    let mut horizontal = 0.0_f32;
    if scale_type != ScaleType::FitXy {
        let (fit_x, fit_y) = match scale_type {
            ScaleType::FitCenter => {
                let fit_x = width / surface_width >= height / surface_height;
                (fit_x, !fit_x)
            }
            ScaleType::FitX => (true, false),
            ScaleType::FitY => (false, true),
            ScaleType::FitXy => (false, false),
        };
        if fit_x {
            let texture_height = surface_width * height / width;
            vertical = (texture_height - surface_height) / 2.0 / texture_height;
        } else if fit_y {
            let texture_width = surface_height * width / height;
            horizontal = (texture_width - surface_width) / 2.0 / texture_width;
        }
    }

    if frame.is_rotated() {
        std::mem::swap(&mut horizontal, &mut vertical);
    }

    let crop = frame.width as f32 * frame.bit_depth as f32 / frame.stride as f32;
    let coords = [
        crop * horizontal,
        vertical,
        crop * horizontal,
        1.0 - vertical,
        crop * (1.0 - horizontal),
        vertical,
        crop * (1.0 - horizontal),
        1.0 - vertical,
    ];
    rotate_texture_coords(coords, frame.rotation)
}

/// 顶点按 (x, y) 成对存放；只认 90/180/270，其余角度原样返回
fn rotate_texture_coords(coords: [f32; 8], rotation: u32) -> [f32; 8] {
    let order: [usize; 4] = match rotation {
        90 => [1, 3, 0, 2],
        180 => [3, 2, 1, 0],
        270 => [2, 0, 3, 1],
        _ => return coords,
    };
    let mut rotated = [0.0_f32; 8];
    for (slot, &vertex) in order.iter().enumerate() {
        rotated[slot * 2] = coords[vertex * 2];
        rotated[slot * 2 + 1] = coords[vertex * 2 + 1];
    }
    rotated
}

/// 视频渲染器：状态放在共享锁里，渲染线程写，其他线程可以读
pub struct VideoRenderer {
    state: Arc<Mutex<VideoOutputState>>,
}

impl VideoRenderer {
    pub fn new(background: Color, scale_type: ScaleType) -> Self {
        Self {
            state: Arc::new(Mutex::new(VideoOutputState::new(background, scale_type))),
        }
    }

    pub fn shared_state(&self) -> Arc<Mutex<VideoOutputState>> {
        self.state.clone()
    }
}

impl Renderer for VideoRenderer {
    fn track_type(&self) -> TrackType {
        TrackType::Video
    }

    fn handle_message(&mut self, message: &ControlMessage) -> Result<()> {
        self.state.lock().apply(message.command());
        Ok(())
    }
}
