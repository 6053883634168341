//! Async front end: the driver on tokio's blocking pool and the consumer
//! ends as `Stream`s.

use futures::Stream;
use tokio::task::JoinHandle;

use crate::audio::AudioReader;
use crate::driver::SessionReport;
use crate::engine::{CodecEngine, MediaSource};
use crate::error::{CaptureError, Result};
use crate::media::Samples;
use crate::session::CaptureSession;

/// A session whose driver runs on a blocking thread.
pub struct SessionTask {
    handle: JoinHandle<Result<SessionReport>>,
}

impl SessionTask {
    /// Take the consumer ends out of `session` before spawning it.
    pub fn spawn<S, E>(mut session: CaptureSession<S, E>) -> Self
    where
        S: MediaSource + Send + 'static,
        E: CodecEngine<S::Unit> + Send + 'static,
    {
        session.release_untaken();
        let handle = tokio::task::spawn_blocking(move || session.run());
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn join(self) -> Result<SessionReport> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => {
                log::error!("driver task failed: {}", e);
                Err(CaptureError::Source(anyhow::anyhow!("driver task failed: {}", e)))
            }
        }
    }
}

/// Audio as a stream of blocks of at most `block_len` samples. Each pull
/// runs on the blocking pool; the stream ends once the ring is stopped and
/// drained.
pub fn audio_blocks(reader: AudioReader, block_len: usize) -> impl Stream<Item = Samples> + Send {
    futures::stream::unfold(Some(reader), move |state| async move {
        let mut reader = state?;
        let pulled = tokio::task::spawn_blocking(move || {
            let block = reader.pull_block(block_len);
            (reader, block)
        })
        .await;
        match pulled {
            Ok((_, block)) if block.is_empty() => None,
            Ok((reader, block)) => Some((block, Some(reader))),
            Err(e) => {
                log::error!("audio pull failed: {}", e);
                None
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::config::CaptureConfig;
    use crate::engine::{DecodeStatus, Output, TrackUnit};
    use crate::media::{MediaKind, SampleFormat, SubtitleEvent, TrackInfo, VideoFrame};

    struct Tick(usize, i64);

    impl TrackUnit for Tick {
        fn track_index(&self) -> usize {
            self.0
        }
    }

    struct Ticks {
        tracks: Vec<TrackInfo>,
        next: i64,
        total: i64,
    }

    impl MediaSource for Ticks {
        type Unit = Tick;

        fn tracks(&self) -> &[TrackInfo] {
            &self.tracks
        }

        fn next_unit(&mut self) -> anyhow::Result<Option<Tick>> {
            if self.next == self.total {
                return Ok(None);
            }
            let n = self.next;
            self.next += 1;
            Ok(Some(Tick((n % 3) as usize, n / 3)))
        }
    }

    struct Echo;

    impl CodecEngine<Tick> for Echo {
        fn decode(&mut self, kind: MediaKind, unit: Tick) -> anyhow::Result<DecodeStatus> {
            let output: Output = match kind {
                MediaKind::Video => VideoFrame::new(vec![1u8; 4], 2, 2, Some(unit.1), true).into(),
                MediaKind::Audio => Samples::I16(vec![unit.1 as i16; 100]).into(),
                _ => SubtitleEvent::new(Some(unit.1), Vec::new()).into(),
            };
            Ok(DecodeStatus::Produced(vec![output]))
        }

        fn flush(&mut self, _kind: MediaKind) -> anyhow::Result<Vec<Output>> {
            Ok(Vec::new())
        }
    }

    fn session(total: i64) -> CaptureSession<Ticks, Echo> {
        let source = Ticks {
            tracks: vec![
                TrackInfo::new(0, MediaKind::Video),
                TrackInfo::new(1, MediaKind::Audio),
                TrackInfo::new(2, MediaKind::Subtitle),
            ],
            next: 0,
            total,
        };
        let config = CaptureConfig::default()
            .with_sample_format(SampleFormat::I16)
            .with_capacities(256, 64);
        CaptureSession::open(source, Echo, &config).unwrap()
    }

    #[tokio::test]
    async fn test_streams_until_eof() {
        let mut session = session(60);
        let video = session.take_video().unwrap().into_stream();
        let subtitle = session.take_subtitle().unwrap().into_stream();
        let audio = audio_blocks(session.take_audio().unwrap(), 64);
        let task = SessionTask::spawn(session);

        let (frames, events, blocks) = tokio::join!(
            video.collect::<Vec<_>>(),
            subtitle.collect::<Vec<_>>(),
            audio.collect::<Vec<_>>()
        );
        let report = task.join().await.unwrap();

        assert_eq!(frames.len(), 20);
        assert_eq!(events.len(), 20);
        let samples: usize = blocks.iter().map(Samples::len).sum();
        assert_eq!(samples, 20 * 100);
        assert!(blocks.iter().all(|b| b.format() == SampleFormat::I16));
        assert_eq!(report.samples_written, 2_000);
    }

    #[tokio::test]
    async fn test_join_reports_finish() {
        let mut session = session(3);
        let _video = session.take_video();
        let task = SessionTask::spawn(session);
        let report = task.join().await.unwrap();
        assert_eq!(report.units_read, 3);
    }
}
