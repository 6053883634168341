//! The producing side of a session: one thread pulls input units, feeds the
//! codec engine and publishes outputs to the sinks, then drains and closes.

use std::collections::{BTreeMap, HashSet};
use std::fmt::{self, Display, Formatter};

use crate::audio::AudioWriter;
use crate::engine::{CodecEngine, DecodeStatus, MediaSource, Output, TrackUnit};
use crate::error::{CaptureError, Result};
use crate::media::{MediaKind, MediaUnit, SubtitleEvent, VideoFrame};
use crate::queue::{PushOutcome, UnitSender};
use crate::router::StreamRouter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Running,
    Draining,
    Closed,
}

/// Producer halves of the three sinks. A `None` sink is not routed (or was
/// closed early after a codec failure).
#[derive(Default)]
pub struct Sinks {
    pub video: Option<UnitSender<VideoFrame>>,
    pub audio: Option<AudioWriter>,
    pub subtitle: Option<UnitSender<SubtitleEvent>>,
}

impl Sinks {
    fn close(&mut self, kind: MediaKind) {
        match kind {
            MediaKind::Video => {
                if let Some(mut tx) = self.video.take() {
                    tx.mark_eof();
                }
            }
            MediaKind::Audio => {
                if let Some(mut writer) = self.audio.take() {
                    writer.stop();
                }
            }
            MediaKind::Subtitle => {
                if let Some(mut tx) = self.subtitle.take() {
                    tx.mark_eof();
                }
            }
            _ => {}
        }
    }

    fn close_all(&mut self) {
        for kind in [MediaKind::Video, MediaKind::Audio, MediaKind::Subtitle] {
            self.close(kind);
        }
    }
}

/// Push results for one unit queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueReport {
    pub queued: u64,
    pub dropped: u64,
    /// Refused because the consumer went away.
    pub refused: u64,
}

impl QueueReport {
    fn record(&mut self, outcome: PushOutcome) {
        match outcome {
            PushOutcome::Queued => self.queued += 1,
            PushOutcome::Dropped => self.dropped += 1,
            PushOutcome::Closed => self.refused += 1,
        }
    }

    /// Every unit handed to the queue, whatever happened to it.
    pub fn forwarded(&self) -> u64 {
        self.queued + self.dropped + self.refused
    }
}

#[derive(Clone, Debug, Default)]
pub struct SessionReport {
    pub units_read: u64,
    pub units_ignored: u64,
    /// Units read per source track, routed or not.
    pub units_per_track: BTreeMap<usize, u64>,
    /// Units of a failed track that were discarded without decoding.
    pub units_discarded: u64,
    pub video: QueueReport,
    pub subtitle: QueueReport,
    pub samples_written: u64,
    pub samples_discarded: u64,
    pub budget: Option<u64>,
    pub budget_reached: bool,
    pub failed_tracks: Vec<MediaKind>,
}

impl Display for SessionReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "read {} units ({} ignored), video {} queued / {} dropped, subtitle {} queued / {} dropped, audio {} samples",
            self.units_read,
            self.units_ignored,
            self.video.queued,
            self.video.dropped,
            self.subtitle.queued,
            self.subtitle.dropped,
            self.samples_written
        )?;
        if self.samples_discarded > 0 {
            write!(f, " ({} discarded)", self.samples_discarded)?;
        }
        if !self.failed_tracks.is_empty() {
            let failed: Vec<String> = self.failed_tracks.iter().map(|k| k.to_string()).collect();
            write!(f, ", failed: {}", failed.join(","))?;
        }
        Ok(())
    }
}

pub struct PipelineDriver<S, E> {
    source: S,
    engine: E,
    router: StreamRouter,
    sinks: Sinks,
    budget: Option<u64>,
    state: DriverState,
    // outputs produced after the budget was hit, forwarded first when draining
    deferred: Vec<Output>,
    disabled: HashSet<MediaKind>,
    codec_error: Option<CaptureError>,
    report: SessionReport,
}

impl<S, E> PipelineDriver<S, E>
where
    S: MediaSource,
    E: CodecEngine<S::Unit>,
{
    pub fn new(source: S, engine: E, router: StreamRouter, sinks: Sinks) -> Self {
        Self {
            source,
            engine,
            router,
            sinks,
            budget: None,
            state: DriverState::Idle,
            deferred: Vec::new(),
            disabled: HashSet::new(),
            codec_error: None,
            report: SessionReport::default(),
        }
    }

    /// Stop reading input once `budget` video units have been forwarded.
    pub fn with_budget(mut self, budget: Option<u64>) -> Self {
        self.budget = budget;
        self.report.budget = budget;
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn report(&self) -> &SessionReport {
        &self.report
    }

    /// Runs the session to `Closed`.
    ///
    /// Every sink is closed before this returns, whatever the outcome. A
    /// source error aborts at once; a codec error only stops its own track and
    /// is reported after the other tracks finished.
    pub fn run(&mut self) -> Result<SessionReport> {
        if self.state != DriverState::Idle {
            log::warn!("driver already ran (state {:?})", self.state);
            return Ok(self.report.clone());
        }
        self.state = DriverState::Running;
        log::info!(
            "driver running, budget {:?}, active {:?}",
            self.budget,
            self.router.active_kinds()
        );

        let result = self.pump();
        if result.is_ok() {
            self.drain();
        }
        self.sinks.close_all();
        self.state = DriverState::Closed;
        log::info!("driver closed: {}", self.report);

        result?;
        match self.codec_error.take() {
            Some(err) => Err(err),
            None => Ok(self.report.clone()),
        }
    }

    fn pump(&mut self) -> Result<()> {
        while self.state == DriverState::Running {
            if self.budget_reached() {
                self.begin_drain("video budget reached");
                break;
            }
            match self.source.next_unit() {
                Ok(Some(unit)) => self.process(unit),
                Ok(None) => self.begin_drain("input exhausted"),
                Err(e) => {
                    log::error!("source failed: {:#}", e);
                    return Err(CaptureError::Source(e));
                }
            }
        }
        Ok(())
    }

    fn process(&mut self, unit: S::Unit) {
        let index = unit.track_index();
        self.report.units_read += 1;
        *self.report.units_per_track.entry(index).or_default() += 1;

        let Some(kind) = self.router.classify(index).kind() else {
            self.report.units_ignored += 1;
            return;
        };
        if self.disabled.contains(&kind) {
            self.report.units_discarded += 1;
            return;
        }

        match self.engine.decode(kind, unit) {
            Ok(DecodeStatus::NeedsMoreInput) => {}
            Ok(DecodeStatus::Produced(outputs)) => self.forward_batch(outputs),
            Err(e) => self.fail_track(kind, e),
        }
    }

    fn forward_batch(&mut self, outputs: Vec<Output>) {
        let mut outputs = outputs.into_iter();
        while let Some(output) = outputs.next() {
            if self.budget_reached() {
                self.deferred.push(output);
                self.deferred.extend(outputs);
                break;
            }
            self.forward(output);
        }
    }

    fn forward(&mut self, output: Output) {
        match output {
            Output::Unit(MediaUnit::Video(frame)) => {
                if let Some(tx) = self.sinks.video.as_mut() {
                    self.report.video.record(tx.push(frame));
                }
            }
            Output::Unit(MediaUnit::Subtitle(event)) => {
                if let Some(tx) = self.sinks.subtitle.as_mut() {
                    self.report.subtitle.record(tx.push(event));
                }
            }
            Output::Audio(samples) => {
                let Some(writer) = self.sinks.audio.as_mut() else {
                    return;
                };
                match writer.push(&samples) {
                    Ok(true) => self.report.samples_written += samples.len() as u64,
                    Ok(false) => self.report.samples_discarded += samples.len() as u64,
                    Err(e) => self.fail_track(MediaKind::Audio, e.into()),
                }
            }
        }
    }

    fn budget_reached(&self) -> bool {
        self.budget
            .is_some_and(|budget| self.report.video.forwarded() >= budget)
    }

    fn begin_drain(&mut self, reason: &str) {
        log::info!("draining: {}", reason);
        if self.budget_reached() {
            self.report.budget_reached = true;
        }
        self.state = DriverState::Draining;
    }

    fn drain(&mut self) {
        let deferred = std::mem::take(&mut self.deferred);
        if !deferred.is_empty() {
            log::debug!("forwarding {} deferred outputs", deferred.len());
        }
        for output in deferred {
            self.forward(output);
        }

        for kind in self.router.active_kinds() {
            if self.disabled.contains(&kind) {
                continue;
            }
            match self.engine.flush(kind) {
                Ok(outputs) => {
                    log::debug!("{} flushed {} residual outputs", kind, outputs.len());
                    for output in outputs {
                        self.forward(output);
                    }
                }
                Err(e) => self.fail_track(kind, e),
            }
        }
    }

    fn fail_track(&mut self, kind: MediaKind, err: anyhow::Error) {
        log::error!("{} track disabled: {:#}", kind, err);
        self.disabled.insert(kind);
        self.sinks.close(kind);
        self.report.failed_tracks.push(kind);
        if self.codec_error.is_none() {
            self.codec_error = Some(CaptureError::codec(kind, err));
        }

        let active = self.router.active_kinds();
        if self.state == DriverState::Running && active.iter().all(|k| self.disabled.contains(k)) {
            self.begin_drain("every routed track failed");
        }
    }
}

#[cfg(test)]
#[path = "driver_test.rs"]
mod driver_test;
