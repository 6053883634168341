use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use crate::config::CaptureSelection;
use crate::media::{MediaKind, TrackInfo};

/// Sink an input track is routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    Video,
    Audio,
    Subtitle,
    Ignore,
}

impl Route {
    pub fn kind(&self) -> Option<MediaKind> {
        match self {
            Route::Video => Some(MediaKind::Video),
            Route::Audio => Some(MediaKind::Audio),
            Route::Subtitle => Some(MediaKind::Subtitle),
            Route::Ignore => None,
        }
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "{}", kind),
            None => f.write_str("ignore"),
        }
    }
}

/// Immutable track-index → sink table, built once per session.
///
/// Per kind, the first track flagged default wins, otherwise the first track
/// of that kind. Every other track is ignored.
#[derive(Clone, Debug, Default)]
pub struct StreamRouter {
    routes: HashMap<usize, Route>,
    selected: HashMap<MediaKind, TrackInfo>,
}

impl StreamRouter {
    pub fn new(tracks: &[TrackInfo], selection: CaptureSelection) -> Self {
        let mut selected: HashMap<MediaKind, TrackInfo> = HashMap::new();
        for kind in [MediaKind::Video, MediaKind::Audio, MediaKind::Subtitle] {
            if !selection.wants(kind) {
                continue;
            }
            let candidates = || tracks.iter().filter(move |t| t.kind == kind);
            let best = candidates()
                .find(|t| t.is_default)
                .or_else(|| candidates().next());
            if let Some(track) = best {
                selected.insert(kind, track.clone());
            }
        }

        let mut routes = HashMap::new();
        for track in selected.values() {
            let route = match track.kind {
                MediaKind::Video => Route::Video,
                MediaKind::Audio => Route::Audio,
                MediaKind::Subtitle => Route::Subtitle,
                _ => continue,
            };
            routes.insert(track.index, route);
        }

        for (kind, track) in selected.iter() {
            log::info!(
                "route {} <- track {} ({}, time_base {})",
                kind,
                track.index,
                track.codec_name,
                track.time_base
            );
        }

        Self { routes, selected }
    }

    /// Unknown indices are ignored.
    pub fn classify(&self, track_index: usize) -> Route {
        self.routes
            .get(&track_index)
            .copied()
            .unwrap_or(Route::Ignore)
    }

    /// The track routed for `kind`, if any.
    pub fn track_for(&self, kind: MediaKind) -> Option<&TrackInfo> {
        self.selected.get(&kind)
    }

    pub fn has(&self, kind: MediaKind) -> bool {
        self.selected.contains_key(&kind)
    }

    /// Active kinds in a fixed order: video, audio, subtitle.
    pub fn active_kinds(&self) -> Vec<MediaKind> {
        [MediaKind::Video, MediaKind::Audio, MediaKind::Subtitle]
            .into_iter()
            .filter(|k| self.has(*k))
            .collect()
    }
}
