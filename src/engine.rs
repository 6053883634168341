//! Seams to the codec engine: where input units come from and what turns
//! them into output units. The core never decodes anything itself.

use crate::media::{MediaKind, MediaUnit, Samples, SubtitleEvent, TrackInfo, VideoFrame};

/// An input unit that knows which source track it belongs to.
pub trait TrackUnit {
    fn track_index(&self) -> usize;
}

/// Demultiplexed input.
pub trait MediaSource {
    type Unit: TrackUnit;

    fn tracks(&self) -> &[TrackInfo];

    /// Next unit in container order. `Ok(None)` means the input is exhausted.
    fn next_unit(&mut self) -> anyhow::Result<Option<Self::Unit>>;
}

/// One output of a decode or flush step.
#[derive(Clone, Debug)]
pub enum Output {
    Unit(MediaUnit),
    Audio(Samples),
}

impl Output {
    pub fn kind(&self) -> MediaKind {
        match self {
            Output::Unit(unit) => unit.kind(),
            Output::Audio(_) => MediaKind::Audio,
        }
    }
}

impl From<VideoFrame> for Output {
    fn from(frame: VideoFrame) -> Self {
        Output::Unit(MediaUnit::Video(frame))
    }
}

impl From<SubtitleEvent> for Output {
    fn from(event: SubtitleEvent) -> Self {
        Output::Unit(MediaUnit::Subtitle(event))
    }
}

impl From<Samples> for Output {
    fn from(samples: Samples) -> Self {
        Output::Audio(samples)
    }
}

#[derive(Debug)]
pub enum DecodeStatus {
    /// The unit was consumed but nothing came out yet.
    NeedsMoreInput,
    Produced(Vec<Output>),
}

impl DecodeStatus {
    pub fn from_outputs(outputs: Vec<Output>) -> Self {
        if outputs.is_empty() {
            DecodeStatus::NeedsMoreInput
        } else {
            DecodeStatus::Produced(outputs)
        }
    }
}

/// Decoding and filtering, one routed track per kind.
pub trait CodecEngine<U> {
    fn decode(&mut self, kind: MediaKind, unit: U) -> anyhow::Result<DecodeStatus>;

    /// Signals end of input for `kind` and returns whatever the decoder and
    /// filters still buffer. The track is exhausted afterwards.
    fn flush(&mut self, kind: MediaKind) -> anyhow::Result<Vec<Output>>;
}
