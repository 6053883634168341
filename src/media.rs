use std::fmt::{self, Display, Formatter};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Track kind as declared by the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
    Subtitle,
    Data,
    Unknown,
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Subtitle => "subtitle",
            MediaKind::Data => "data",
            MediaKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A rational number, used both for stream time bases and frame rates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    /// One microsecond, the unit the pacer sleeps in.
    pub const MICROS: Rational = Rational::new(1, 1_000_000);
    pub const MILLIS: Rational = Rational::new(1, 1_000);

    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    pub fn is_valid(&self) -> bool {
        self.num != 0 && self.den != 0
    }

    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }

    /// `value * self`, rounded to the nearest integer (halves away from zero).
    pub fn scale(&self, value: i64) -> i64 {
        div_round_near(value as i128 * self.num as i128, self.den as i128)
    }
}

impl Display for Rational {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Rescales `value` expressed in `from` units into `to` units, rounding to the
/// nearest integer. A zero denominator on either side yields 0.
pub fn rescale(value: i64, from: Rational, to: Rational) -> i64 {
    let num = value as i128 * from.num as i128 * to.den as i128;
    let den = from.den as i128 * to.num as i128;
    div_round_near(num, den)
}

fn div_round_near(num: i128, den: i128) -> i64 {
    if den == 0 {
        return 0;
    }
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
    let q = if num >= 0 {
        (num + den / 2) / den
    } else {
        -((-num + den / 2) / den)
    };
    q.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Audio element width, fixed for the whole session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    #[serde(rename = "int16", alias = "s16")]
    I16,
    #[serde(rename = "float32", alias = "flt")]
    F32,
}

impl Default for SampleFormat {
    fn default() -> Self {
        SampleFormat::F32
    }
}

impl Display for SampleFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SampleFormat::I16 => f.write_str("int16"),
            SampleFormat::F32 => f.write_str("float32"),
        }
    }
}

/// A block of decoded mono samples handed from the codec engine to the driver.
#[derive(Clone, Debug, PartialEq)]
pub enum Samples {
    I16(Vec<i16>),
    F32(Vec<f32>),
}

impl Samples {
    pub fn format(&self) -> SampleFormat {
        match self {
            Samples::I16(_) => SampleFormat::I16,
            Samples::F32(_) => SampleFormat::F32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Samples::I16(v) => v.len(),
            Samples::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decoded (and filtered) video picture.
#[derive(Clone, Debug, Default)]
pub struct VideoFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    /// Bytes per row of the first plane.
    pub stride: usize,
    // e.g. "gray8", "yuv444p"
    pub format: String,
    pub pts: Option<i64>,
    pub is_key: bool,
}

impl VideoFrame {
    pub fn new(data: impl Into<Bytes>, width: u32, height: u32, pts: Option<i64>, is_key: bool) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            stride: width as usize,
            format: String::new(),
            pts,
            is_key,
        }
    }

    pub fn with_layout(mut self, stride: usize, format: &str) -> Self {
        self.stride = stride;
        self.format = format.to_string();
        self
    }

    pub fn pts_ms(&self, time_base: Rational) -> Option<i64> {
        self.pts.map(|pts| rescale(pts, time_base, Rational::MILLIS))
    }
}

impl Display for VideoFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VideoFrame data_len: {}, width: {}, height: {}, stride: {}, format: {}, pts: {:?}, is_key: {}",
            self.data.len(),
            self.width,
            self.height,
            self.stride,
            self.format,
            self.pts,
            self.is_key
        )
    }
}

/// One rectangle of a subtitle event.
#[derive(Clone, Debug, PartialEq)]
pub enum SubtitleRect {
    Text(String),
    /// ASS dialogue line, markup included.
    Ass(String),
    /// Bitmap subtitles carry no text; only their size is kept.
    Bitmap { width: u32, height: u32 },
}

impl SubtitleRect {
    pub fn text(&self) -> Option<&str> {
        match self {
            SubtitleRect::Text(s) | SubtitleRect::Ass(s) => Some(s),
            SubtitleRect::Bitmap { .. } => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubtitleEvent {
    pub pts: Option<i64>,
    /// Display window relative to `pts`, in milliseconds.
    pub start_ms: u32,
    pub end_ms: u32,
    pub rects: Vec<SubtitleRect>,
}

impl SubtitleEvent {
    pub fn new(pts: Option<i64>, rects: Vec<SubtitleRect>) -> Self {
        Self {
            pts,
            rects,
            ..Default::default()
        }
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.rects.iter().filter_map(SubtitleRect::text)
    }
}

/// A discrete unit delivered through a bounded queue. Audio is not boxed per
/// block, it goes through the sample ring instead.
#[derive(Clone, Debug)]
pub enum MediaUnit {
    Video(VideoFrame),
    Subtitle(SubtitleEvent),
}

impl MediaUnit {
    pub fn pts(&self) -> Option<i64> {
        match self {
            MediaUnit::Video(frame) => frame.pts,
            MediaUnit::Subtitle(event) => event.pts,
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            MediaUnit::Video(_) => MediaKind::Video,
            MediaUnit::Subtitle(_) => MediaKind::Subtitle,
        }
    }
}

/// Track description published by a [`MediaSource`](crate::engine::MediaSource).
#[derive(Clone, Debug)]
pub struct TrackInfo {
    pub index: usize,
    pub kind: MediaKind,
    /// Marked default/primary by the container.
    pub is_default: bool,
    pub time_base: Rational,
    /// Average frame rate, video only.
    pub frame_rate: Option<Rational>,
    pub codec_name: String,
}

impl TrackInfo {
    pub fn new(index: usize, kind: MediaKind) -> Self {
        Self {
            index,
            kind,
            is_default: false,
            time_base: Rational::new(1, 1_000),
            frame_rate: None,
            codec_name: String::new(),
        }
    }

    pub fn with_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn with_time_base(mut self, time_base: Rational) -> Self {
        self.time_base = time_base;
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: Rational) -> Self {
        self.frame_rate = Some(frame_rate);
        self
    }

    pub fn with_codec(mut self, codec_name: &str) -> Self {
        self.codec_name = codec_name.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_millis_to_micros() {
        assert_eq!(rescale(10, Rational::MILLIS, Rational::MICROS), 10_000);
        assert_eq!(rescale(-3, Rational::MILLIS, Rational::MICROS), -3_000);
    }

    #[test]
    fn test_rescale_rounds_to_nearest() {
        // 1/90000 s ticks into ms: 45 ticks = 0.5 ms, rounds away from zero
        assert_eq!(rescale(45, Rational::new(1, 90_000), Rational::MILLIS), 1);
        assert_eq!(rescale(44, Rational::new(1, 90_000), Rational::MILLIS), 0);
        assert_eq!(rescale(-45, Rational::new(1, 90_000), Rational::MILLIS), -1);
    }

    #[test]
    fn test_rescale_zero_denominator() {
        assert_eq!(rescale(10, Rational::new(1, 0), Rational::MICROS), 0);
    }

    #[test]
    fn test_rational_scale() {
        // 5 seconds at 30000/1001 fps
        assert_eq!(Rational::new(30_000, 1_001).scale(5), 150);
        assert_eq!(Rational::new(25, 1).scale(4), 100);
    }

    #[test]
    fn test_frame_pts_ms() {
        let frame = VideoFrame::new(vec![0u8; 4], 2, 2, Some(9_000), true);
        assert_eq!(frame.pts_ms(Rational::new(1, 90_000)), Some(100));
        assert_eq!(frame.stride, 2);
    }

    #[test]
    fn test_subtitle_texts_skip_bitmaps() {
        let event = SubtitleEvent::new(
            Some(0),
            vec![
                SubtitleRect::Text("hello".into()),
                SubtitleRect::Bitmap { width: 4, height: 4 },
                SubtitleRect::Ass("0,0,Default,,0,0,0,,world".into()),
            ],
        );
        let texts: Vec<_> = event.texts().collect();
        assert_eq!(texts, vec!["hello", "0,0,Default,,0,0,0,,world"]);
    }

    #[test]
    fn test_sample_format_serde_names() {
        let fmt: SampleFormat = serde_json::from_str("\"int16\"").unwrap();
        assert_eq!(fmt, SampleFormat::I16);
        let fmt: SampleFormat = serde_json::from_str("\"flt\"").unwrap();
        assert_eq!(fmt, SampleFormat::F32);
        assert_eq!(serde_json::to_string(&SampleFormat::I16).unwrap(), "\"int16\"");
    }
}
