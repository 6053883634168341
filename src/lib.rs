//! Real-time fan-out of decoded media from one producing pipeline thread to
//! independent video, audio and subtitle consumers.
//!
//! The driver reads units from a [`MediaSource`], hands the routed ones to a
//! [`CodecEngine`] and publishes the results: audio samples go through a
//! lock-free ring, video frames and subtitle events through bounded
//! drop-on-full queues. Consumers observe end of stream once the driver has
//! drained the engine.

pub mod audio;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod media;
pub mod pacer;
pub mod queue;
pub mod ring_buffer;
pub mod router;
pub mod session;
pub mod task;

pub use audio::{audio_sink, AudioReader, AudioWriter};
pub use config::{CaptureConfig, CaptureSelection, Margins, VideoFilterConfig};
pub use driver::{DriverState, PipelineDriver, QueueReport, SessionReport, Sinks};
pub use engine::{CodecEngine, DecodeStatus, MediaSource, Output, TrackUnit};
pub use error::{CaptureError, Result};
pub use media::{
    rescale, MediaKind, MediaUnit, Rational, SampleFormat, Samples, SubtitleEvent, SubtitleRect,
    TrackInfo, VideoFrame,
};
pub use pacer::{PlaybackPacer, StreamTime};
pub use queue::{unit_queue, KeyUnit, Pull, PushOutcome, UnitReceiver, UnitSender};
pub use ring_buffer::{sample_ring, Sample, SampleConsumer, SampleProducer};
pub use router::{Route, StreamRouter};
pub use session::{CaptureSession, SessionInfo, SubtitleConsumer, VideoConsumer};
pub use task::{audio_blocks, SessionTask};
