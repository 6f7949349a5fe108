use crate::core::TrackType;
use crate::renderer::handle::RendererHandle;
use std::collections::BTreeMap;

/// 按轨道类型分组的渲染器集合
///
/// 查找视频渲染器是一次 map 访问，而不是遍历时做运行期类型判断。
#[derive(Debug, Clone, Default)]
pub struct RendererSet {
    by_track: BTreeMap<TrackType, Vec<RendererHandle>>,
}

impl RendererSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: RendererHandle) {
        self.by_track.entry(handle.track_type()).or_default().push(handle);
    }

    /// 该轨道类型的第一个渲染器（控制消息只发给它）
    pub fn primary(&self, track_type: TrackType) -> Option<&RendererHandle> {
        self.by_track.get(&track_type).and_then(|handles| handles.first())
    }

    pub fn of_type(&self, track_type: TrackType) -> &[RendererHandle] {
        self.by_track.get(&track_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 全部渲染器（按轨道类型、再按加入顺序）
    pub fn iter(&self) -> impl Iterator<Item = &RendererHandle> {
        self.by_track.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_track.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<RendererHandle> for RendererSet {
    fn from_iter<I: IntoIterator<Item = RendererHandle>>(iter: I) -> Self {
        let mut set = RendererSet::new();
        for handle in iter {
            set.insert(handle);
        }
        set
    }
}
