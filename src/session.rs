//! Wires a source and a codec engine to the three sinks and hands out the
//! consumer ends.

use std::pin::Pin;

use futures::Stream;
use tokio_stream::wrappers::ReceiverStream;

use crate::audio::{audio_sink, AudioReader};
use crate::config::CaptureConfig;
use crate::driver::{PipelineDriver, SessionReport, Sinks};
use crate::engine::{CodecEngine, MediaSource};
use crate::error::{CaptureError, Result};
use crate::media::{MediaKind, Rational, SampleFormat, SubtitleEvent, VideoFrame};
use crate::pacer::PlaybackPacer;
use crate::queue::{unit_queue, Pull, UnitReceiver};
use crate::router::StreamRouter;

/// Read-only facts about an opened session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionInfo {
    pub track_count: usize,
    pub video_time_base: Option<Rational>,
    pub audio_time_base: Option<Rational>,
    pub subtitle_time_base: Option<Rational>,
    pub frame_rate: Option<Rational>,
    pub sample_rate: u32,
    pub sample_format: SampleFormat,
    pub budget: Option<u64>,
}

pub struct CaptureSession<S, E> {
    driver: PipelineDriver<S, E>,
    video: Option<VideoConsumer>,
    audio: Option<AudioReader>,
    subtitle: Option<SubtitleConsumer>,
    info: SessionInfo,
}

impl<S, E> CaptureSession<S, E>
where
    S: MediaSource,
    E: CodecEngine<S::Unit>,
{
    pub fn open(source: S, engine: E, config: &CaptureConfig) -> Result<Self> {
        config.validate()?;
        let router = StreamRouter::new(source.tracks(), config.capture);

        let video_track = router.track_for(MediaKind::Video);
        let video_time_base = config
            .time_base
            .or_else(|| video_track.map(|t| t.time_base))
            .filter(|_| video_track.is_some());
        let frame_rate = config
            .frame_rate
            .or_else(|| video_track.and_then(|t| t.frame_rate));
        let budget = video_budget(config.duration_secs, frame_rate, video_track.is_some());

        let info = SessionInfo {
            track_count: source.tracks().len(),
            video_time_base,
            audio_time_base: router.track_for(MediaKind::Audio).map(|t| t.time_base),
            subtitle_time_base: router.track_for(MediaKind::Subtitle).map(|t| t.time_base),
            frame_rate,
            sample_rate: config.sample_rate,
            sample_format: config.sample_format,
            budget,
        };

        let mut sinks = Sinks::default();
        let mut video = None;
        let mut audio = None;
        let mut subtitle = None;
        if let Some(time_base) = video_time_base {
            let (tx, rx) = unit_queue("video", config.queue_capacity)?;
            sinks.video = Some(tx);
            video = Some(VideoConsumer::new(rx, time_base));
        }
        if router.has(MediaKind::Audio) {
            let (writer, reader) = audio_sink(config.sample_format, config.ring_capacity)?;
            sinks.audio = Some(writer);
            audio = Some(reader);
        }
        if let Some(time_base) = info.subtitle_time_base {
            let (tx, rx) = unit_queue("subtitle", config.queue_capacity)?;
            sinks.subtitle = Some(tx);
            subtitle = Some(SubtitleConsumer { rx, time_base });
        }

        log::info!("session opened: {:?}", info);
        let driver = PipelineDriver::new(source, engine, router, sinks).with_budget(budget);
        Ok(Self {
            driver,
            video,
            audio,
            subtitle,
            info,
        })
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    /// The video consumer, once. `None` if no video is routed.
    pub fn take_video(&mut self) -> Option<VideoConsumer> {
        self.video.take()
    }

    /// The audio reader, once.
    pub fn take_audio(&mut self) -> Result<AudioReader> {
        self.audio.take().ok_or(CaptureError::NoAudioTrack)
    }

    pub fn take_subtitle(&mut self) -> Option<SubtitleConsumer> {
        self.subtitle.take()
    }

    /// Runs the driver on the calling thread until every sink is closed.
    ///
    /// Consumer ends that were never taken are dropped first, so their sinks
    /// discard instead of filling up and stalling the driver.
    pub fn run(&mut self) -> Result<SessionReport> {
        self.release_untaken();
        self.driver.run()
    }

    pub(crate) fn release_untaken(&mut self) {
        if self.audio.take().is_some() {
            log::debug!("audio reader never taken, its samples will be discarded");
        }
        if self.video.take().is_some() {
            log::debug!("video consumer never taken, its frames will be discarded");
        }
        if self.subtitle.take().is_some() {
            log::debug!("subtitle consumer never taken, its events will be discarded");
        }
    }

    pub fn report(&self) -> &SessionReport {
        self.driver.report()
    }

    pub fn into_driver(self) -> PipelineDriver<S, E> {
        self.driver
    }
}

/// `round(secs * frame_rate)` video units; zero or missing duration means
/// no budget.
pub fn video_budget(duration_secs: Option<u64>, frame_rate: Option<Rational>, has_video: bool) -> Option<u64> {
    let secs = duration_secs.filter(|s| *s > 0)?;
    if !has_video {
        log::warn!("duration of {}s ignored: no video track", secs);
        return None;
    }
    let Some(rate) = frame_rate.filter(|r| r.num > 0 && r.den > 0) else {
        log::warn!("duration of {}s ignored: unknown frame rate", secs);
        return None;
    };
    let budget = rate.scale(secs as i64).max(0) as u64;
    log::info!("video budget {} units ({}s at {} fps)", budget, secs, rate);
    Some(budget)
}

pub struct VideoConsumer {
    rx: UnitReceiver<VideoFrame>,
    time_base: Rational,
    pacer: Option<PlaybackPacer>,
}

impl VideoConsumer {
    fn new(rx: UnitReceiver<VideoFrame>, time_base: Rational) -> Self {
        Self {
            rx,
            time_base,
            pacer: None,
        }
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    /// Pace [`next_frame`](Self::next_frame) to the frame timestamps.
    pub fn paced(mut self) -> Self {
        self.pacer = Some(PlaybackPacer::new(self.time_base));
        self
    }

    pub fn pacer(&self) -> Option<&PlaybackPacer> {
        self.pacer.as_ref()
    }

    pub fn pull_frame(&mut self) -> Pull<VideoFrame> {
        self.rx.pull_nonblocking()
    }

    /// Next key frame, releasing the frames before it. `None` is end of stream.
    pub fn pull_key_frame(&mut self) -> Option<VideoFrame> {
        self.rx.pull_key_unit()
    }

    /// Waits for the next frame, sleeping out its PTS gap when paced. Parks
    /// the thread; async code uses [`into_stream`](Self::into_stream).
    pub fn next_frame(&mut self) -> Option<VideoFrame> {
        let frame = self.rx.pull_blocking()?;
        if let Some(pacer) = self.pacer.as_mut() {
            pacer.pace(frame.pts);
        }
        Some(frame)
    }

    pub fn skipped(&self) -> u64 {
        self.rx.skipped()
    }

    pub fn receiver(&mut self) -> &mut UnitReceiver<VideoFrame> {
        &mut self.rx
    }

    pub fn into_stream(self) -> ReceiverStream<VideoFrame> {
        self.rx.into_stream()
    }

    pub fn into_key_stream(self) -> Pin<Box<dyn Stream<Item = VideoFrame> + Send>> {
        self.rx.into_key_stream()
    }
}

pub struct SubtitleConsumer {
    rx: UnitReceiver<SubtitleEvent>,
    time_base: Rational,
}

impl SubtitleConsumer {
    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn pull_event(&mut self) -> Pull<SubtitleEvent> {
        self.rx.pull_nonblocking()
    }

    pub fn next_event(&mut self) -> Option<SubtitleEvent> {
        self.rx.pull_blocking()
    }

    pub fn into_stream(self) -> ReceiverStream<SubtitleEvent> {
        self.rx.into_stream()
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
