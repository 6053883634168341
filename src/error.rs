//! Error types for media-relay.
//!
//! Only conditions that end a session (or one track of it) and caller misuse
//! are errors. Queue overruns, transient emptiness and end-of-stream are
//! ordinary return values, see [`PushOutcome`](crate::queue::PushOutcome) and
//! [`Pull`](crate::queue::Pull).

use crate::media::{MediaKind, SampleFormat};

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The input could not be opened or demultiplexed. Ends the whole session.
    #[error("source error: {0:#}")]
    Source(#[source] anyhow::Error),

    /// Decoding or filtering failed for one track. That track stops, the others
    /// keep running.
    #[error("{kind} codec error: {source:#}")]
    Codec {
        kind: MediaKind,
        #[source]
        source: anyhow::Error,
    },

    /// The audio sink was read (or written) with the other sample width.
    #[error("audio sink holds {configured} samples, {requested} accessor used")]
    SampleFormatMismatch {
        configured: SampleFormat,
        requested: SampleFormat,
    },

    /// Audio was requested but the session routes no audio track.
    #[error("no audio track in session")]
    NoAudioTrack,

    /// Rejected construction-time configuration.
    #[error("invalid config: {0}")]
    Config(String),
}

impl CaptureError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn codec(kind: MediaKind, source: anyhow::Error) -> Self {
        Self::Codec { kind, source }
    }

    /// True for errors after which no sink will receive more data.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Source(_) | Self::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
