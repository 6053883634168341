//! Presentation pacing for the video consumer: wait out the PTS gap between
//! consecutive frames before showing the next one.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use crate::media::{rescale, Rational};

#[derive(Clone, Debug)]
pub struct PlaybackPacer {
    time_base: Rational,
    last_pts: Option<i64>,
    first_pts: Option<i64>,
    frames: u64,
}

impl PlaybackPacer {
    pub fn new(time_base: Rational) -> Self {
        Self {
            time_base,
            last_pts: None,
            first_pts: None,
            frames: 0,
        }
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    /// Delay to apply before presenting a unit stamped `pts`.
    ///
    /// The first stamped unit waits zero. Unstamped units wait zero and leave
    /// the reference untouched; a PTS going backwards also waits zero but
    /// becomes the new reference.
    pub fn delay_for(&mut self, pts: Option<i64>) -> Duration {
        self.frames += 1;
        let Some(pts) = pts else {
            return Duration::ZERO;
        };
        self.first_pts.get_or_insert(pts);
        let delay = match self.last_pts.replace(pts) {
            Some(last) => rescale(pts.saturating_sub(last), self.time_base, Rational::MICROS),
            None => 0,
        };
        if delay > 0 {
            Duration::from_micros(delay as u64)
        } else {
            Duration::ZERO
        }
    }

    /// Blocks the calling thread for [`delay_for`](Self::delay_for).
    pub fn pace(&mut self, pts: Option<i64>) -> Duration {
        let delay = self.delay_for(pts);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        delay
    }

    pub async fn pace_async(&mut self, pts: Option<i64>) -> Duration {
        let delay = self.delay_for(pts);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        delay
    }

    /// Units seen so far, stamped or not.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Stream time between the first and the latest stamped unit.
    pub fn elapsed(&self) -> StreamTime {
        match (self.first_pts, self.last_pts) {
            (Some(first), Some(last)) => StreamTime::from_ticks(last - first, self.time_base),
            _ => StreamTime::default(),
        }
    }
}

/// Whole-second stream time, printed `h:mm:ss`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamTime {
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl StreamTime {
    pub fn from_ticks(ticks: i64, time_base: Rational) -> Self {
        let total = time_base.scale(ticks);
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }
}

impl Display for StreamTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_follow_pts_gaps() {
        let mut pacer = PlaybackPacer::new(Rational::MILLIS);
        let delays: Vec<_> = [0, 10, 30]
            .into_iter()
            .map(|pts| pacer.delay_for(Some(pts)))
            .collect();
        assert_eq!(
            delays,
            vec![Duration::ZERO, Duration::from_millis(10), Duration::from_millis(20)]
        );
    }

    #[test]
    fn test_missing_pts_keeps_reference() {
        let mut pacer = PlaybackPacer::new(Rational::MILLIS);
        assert_eq!(pacer.delay_for(None), Duration::ZERO);
        assert_eq!(pacer.delay_for(Some(100)), Duration::ZERO);
        assert_eq!(pacer.delay_for(None), Duration::ZERO);
        assert_eq!(pacer.delay_for(Some(140)), Duration::from_millis(40));
        assert_eq!(pacer.frames(), 4);
    }

    #[test]
    fn test_backwards_pts_does_not_wait() {
        let mut pacer = PlaybackPacer::new(Rational::new(1, 90_000));
        pacer.delay_for(Some(9_000));
        assert_eq!(pacer.delay_for(Some(3_000)), Duration::ZERO);
        // 3000 -> 6000 ticks is 1/30 s
        assert_eq!(pacer.delay_for(Some(6_000)), Duration::from_micros(33_333));
    }

    #[test]
    fn test_elapsed_stream_time() {
        let mut pacer = PlaybackPacer::new(Rational::MILLIS);
        assert_eq!(pacer.elapsed().to_string(), "0:00:00");
        pacer.delay_for(Some(1_000));
        pacer.delay_for(Some(1_000 + 3_725_000));
        assert_eq!(
            pacer.elapsed(),
            StreamTime {
                hours: 1,
                minutes: 2,
                seconds: 5
            }
        );
        assert_eq!(pacer.elapsed().to_string(), "1:02:05");
    }

    #[test]
    fn test_pace_sleeps() {
        let mut pacer = PlaybackPacer::new(Rational::MILLIS);
        pacer.pace(Some(0));
        let start = std::time::Instant::now();
        let delay = pacer.pace(Some(15));
        assert_eq!(delay, Duration::from_millis(15));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[tokio::test]
    async fn test_pace_async() {
        let mut pacer = PlaybackPacer::new(Rational::MILLIS);
        assert_eq!(pacer.pace_async(Some(5)).await, Duration::ZERO);
        assert_eq!(pacer.pace_async(Some(10)).await, Duration::from_millis(5));
    }
}
