use crate::core::error::{PlayerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// 媒体源
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSource {
    pub uri: String,
    pub kind: SourceKind,
}

impl MediaSource {
    /// 从 URI 字符串解析媒体源
    ///
    /// 没有 scheme 的字符串当作本地文件（渐进式）；
    /// 无法归入任何已知传输协议的 scheme 直接返回 `UnsupportedSourceKind`。
    pub fn from_uri(uri: &str) -> Result<Self> {
        let trimmed = uri.trim();
        if trimmed.is_empty() {
            return Err(PlayerError::UnsupportedSourceKind("空 URI".to_string()));
        }

        let path = match Url::parse(trimmed) {
            Ok(url) => {
                if !Self::is_supported_scheme(url.scheme()) {
                    return Err(PlayerError::UnsupportedSourceKind(format!(
                        "{} (scheme: {})",
                        trimmed,
                        url.scheme()
                    )));
                }
                url.path().to_string()
            }
            // 相对路径 / 本地路径
            Err(url::ParseError::RelativeUrlWithoutBase) => trimmed.to_string(),
            Err(e) => {
                return Err(PlayerError::UnsupportedSourceKind(format!("{}: {}", trimmed, e)));
            }
        };

        Ok(Self {
            uri: trimmed.to_string(),
            kind: SourceKind::infer_from_path(&path),
        })
    }

    fn is_supported_scheme(scheme: &str) -> bool {
        matches!(
            scheme,
            "http" | "https" | "file" | "content" | "asset" | "android.resource" | "rawresource" | "data" | "rtmp"
        )
    }

    /// 判断是否为网络流
    pub fn is_network_stream(&self) -> bool {
        self.uri.starts_with("http://") || self.uri.starts_with("https://") || self.uri.starts_with("rtmp://")
    }
}

/// 媒体源传输协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// MPEG-DASH
    Dash,
    /// Smooth Streaming
    SmoothStreaming,
    /// HLS - HTTP Live Streaming
    Hls,
    /// 普通渐进式文件（本地或 HTTP）
    Progressive,
}

impl SourceKind {
    /// 按路径后缀推断
    pub fn infer_from_path(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".mpd") {
            SourceKind::Dash
        } else if lower.ends_with(".m3u8") {
            SourceKind::Hls
        } else if Self::is_smooth_streaming_path(&lower) {
            SourceKind::SmoothStreaming
        } else {
            SourceKind::Progressive
        }
    }

    // .ism / .isml，可带 /manifest 或 /manifest(format=...)
    fn is_smooth_streaming_path(lower: &str) -> bool {
        let base = match lower.rfind("/manifest") {
            Some(idx) => {
                let rest = &lower[idx + "/manifest".len()..];
                if rest.is_empty() || (rest.starts_with('(') && rest.ends_with(')')) {
                    &lower[..idx]
                } else {
                    lower
                }
            }
            None => lower,
        };
        base.ends_with(".ism") || base.ends_with(".isml")
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Dash => "DASH",
            SourceKind::SmoothStreaming => "SS",
            SourceKind::Hls => "HLS",
            SourceKind::Progressive => "Progressive",
        }
    }
}

/// 轨道类型，每个渲染器服务一种
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrackType {
    Audio,
    Video,
    Text,
    Metadata,
}

/// 渲染器标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RendererId {
    pub track_type: TrackType,
    pub index: usize,
}

impl fmt::Display for RendererId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.track_type, self.index)
    }
}

/// 画面尺寸（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const ZERO: Size = Size { width: 0, height: 0 };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 宽高都非零才算已布局
    pub fn is_laid_out(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// ARGB 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Color = Color(0xFF00_0000);

    pub fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Color(u32::from(a) << 24 | u32::from(r) << 16 | u32::from(g) << 8 | u32::from(b))
    }

    pub fn alpha(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn red(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn green(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn blue(&self) -> u8 {
        self.0 as u8
    }

    /// 归一化到 0.0 - 1.0 的 [r, g, b, a]（清屏颜色）
    pub fn to_rgba_f32(&self) -> [f32; 4] {
        [
            f32::from(self.red()) / 255.0,
            f32::from(self.green()) / 255.0,
            f32::from(self.blue()) / 255.0,
            f32::from(self.alpha()) / 255.0,
        ]
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// 画面缩放方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleType {
    /// 拉伸铺满
    FitXy,
    /// 等比缩放，完整显示
    #[default]
    FitCenter,
    /// 宽度铺满，高度裁剪
    FitX,
    /// 高度铺满，宽度裁剪
    FitY,
}

/// 引擎播放状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// 音频输出路由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioRouting {
    #[default]
    Music,
    VoiceCall,
    Ring,
    Alarm,
    Notification,
    System,
}
