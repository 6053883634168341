//! Media file metadata (similar to ffprobe), plus the descriptive tags.

use std::fmt;

use media_relay::{MediaKind, MediaSource};

use crate::input::AvInput;

/// Descriptive container tags. Missing tags are empty strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaData {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub composer: String,
    pub performer: String,
    pub album_artist: String,
    pub copyright: String,
    pub date: String,
    pub track: String,
    pub disc: String,
}

impl MetaData {
    pub const KEYS: [&'static str; 11] = [
        "title",
        "artist",
        "album",
        "genre",
        "composer",
        "performer",
        "album_artist",
        "copyright",
        "date",
        "track",
        "disc",
    ];

    /// Builds the tag set from `(key, value)` pairs. Keys match case-insensitively.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut tags = Self::default();
        for (key, value) in pairs {
            if let Some(slot) = tags.slot_mut(&key.to_ascii_lowercase()) {
                *slot = value.to_string();
            }
        }
        tags
    }

    pub fn read(input: &AvInput) -> Self {
        Self::from_pairs(input.metadata().iter())
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut String> {
        let slot = match key {
            "title" => &mut self.title,
            "artist" => &mut self.artist,
            "album" => &mut self.album,
            "genre" => &mut self.genre,
            "composer" => &mut self.composer,
            "performer" => &mut self.performer,
            "album_artist" => &mut self.album_artist,
            "copyright" => &mut self.copyright,
            "date" => &mut self.date,
            "track" => &mut self.track,
            "disc" => &mut self.disc,
            _ => return None,
        };
        Some(slot)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "title" => &self.title,
            "artist" => &self.artist,
            "album" => &self.album,
            "genre" => &self.genre,
            "composer" => &self.composer,
            "performer" => &self.performer,
            "album_artist" => &self.album_artist,
            "copyright" => &self.copyright,
            "date" => &self.date,
            "track" => &self.track,
            "disc" => &self.disc,
            _ => return None,
        };
        Some(value.as_str())
    }
}

impl fmt::Display for MetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for key in Self::KEYS {
            writeln!(f, "{}: {}", key.replace('_', " "), self.get(key).unwrap_or_default())?;
        }
        Ok(())
    }
}

/// Per-stream info (corresponds to ffprobe stream).
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub index: usize,
    pub kind: MediaKind,
    pub codec_name: String,
    /// e.g. "1/90000"
    pub time_base: String,
    pub is_default: bool,
    /// Video only.
    pub frame_rate: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Audio only.
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub format_name: String,
    /// None if unknown (e.g. raw h264).
    pub duration_sec: Option<f64>,
    pub bit_rate: i64,
    pub streams: Vec<StreamInfo>,
    pub tags: MetaData,
}

impl fmt::Display for MediaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[FORMAT]")?;
        writeln!(f, "format_name={}", self.format_name)?;
        match self.duration_sec {
            Some(d) => writeln!(f, "duration_sec={:.3}", d)?,
            None => writeln!(f, "duration_sec=N/A")?,
        }
        writeln!(f, "bit_rate={}", self.bit_rate)?;
        writeln!(f, "nb_streams={}", self.streams.len())?;
        writeln!(f, "[/FORMAT]")?;
        for s in &self.streams {
            writeln!(f, "[STREAM]")?;
            writeln!(f, "index={}", s.index)?;
            writeln!(f, "codec_type={}", s.kind)?;
            writeln!(f, "codec_name={}", s.codec_name)?;
            writeln!(f, "time_base={}", s.time_base)?;
            writeln!(f, "default={}", s.is_default as u8)?;
            if let Some(rate) = &s.frame_rate {
                writeln!(f, "avg_frame_rate={}", rate)?;
            }
            if let (Some(w), Some(h)) = (s.width, s.height) {
                writeln!(f, "width={}\nheight={}", w, h)?;
            }
            if let Some(sr) = s.sample_rate {
                writeln!(f, "sample_rate={}", sr)?;
            }
            if let Some(c) = s.channels {
                writeln!(f, "channels={}", c)?;
            }
            writeln!(f, "[/STREAM]")?;
        }
        writeln!(f, "[TAGS]")?;
        write!(f, "{}", self.tags)?;
        writeln!(f, "[/TAGS]")
    }
}

/// Opens `path` and describes its container, streams and tags.
pub fn probe(path: &str) -> anyhow::Result<MediaInfo> {
    let input = AvInput::open(path)?;
    let ctx = input.context();

    // AV_TIME_BASE = 1_000_000; duration is in 1/AV_TIME_BASE seconds
    let duration = ctx.duration();
    let duration_sec = if duration == ffmpeg_next::ffi::AV_NOPTS_VALUE || duration <= 0 {
        None
    } else {
        Some(duration as f64 / 1_000_000.0)
    };

    let streams = input
        .streams()
        .iter()
        .zip(input.tracks())
        .map(|(stream, track)| {
            let (width, height) = match track.kind {
                MediaKind::Video => (Some(stream.width()), Some(stream.height())),
                _ => (None, None),
            };
            let (sample_rate, channels) = match track.kind {
                MediaKind::Audio => {
                    let (rate, channels) = stream.audio_layout();
                    (Some(rate), Some(channels))
                }
                _ => (None, None),
            };
            StreamInfo {
                index: track.index,
                kind: track.kind,
                codec_name: track.codec_name.clone(),
                time_base: track.time_base.to_string(),
                is_default: track.is_default,
                frame_rate: track.frame_rate.map(|r| r.to_string()),
                width,
                height,
                sample_rate,
                channels,
            }
        })
        .collect();

    Ok(MediaInfo {
        format_name: ctx.format().name().to_string(),
        duration_sec,
        bit_rate: ctx.bit_rate(),
        streams,
        tags: MetaData::read(&input),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_from_pairs() {
        let tags = MetaData::from_pairs([
            ("TITLE", "Blue"),
            ("artist", "Joni"),
            ("album_artist", "Joni Mitchell"),
            ("encoder", "Lavf60"),
        ]);
        assert_eq!(tags.title, "Blue");
        assert_eq!(tags.artist, "Joni");
        assert_eq!(tags.get("album_artist"), Some("Joni Mitchell"));
        assert_eq!(tags.get("encoder"), None);
        assert!(tags.disc.is_empty());
    }

    #[test]
    fn test_tags_display() {
        let tags = MetaData::from_pairs([("date", "1971"), ("album_artist", "x")]);
        let text = tags.to_string();
        assert!(text.contains("date: 1971\n"));
        assert!(text.contains("album artist: x\n"));
        assert_eq!(text.lines().count(), MetaData::KEYS.len());
    }
}
