use std::ffi::CString;
use std::path::Path;

use ffmpeg_next::Dictionary;
use media_relay::{MediaKind, MediaSource, TrackInfo};

use crate::{packet::RawPacket, stream::AvStream};

/// A demuxer over a file, URL or capture device.
pub struct AvInput {
    inner: ffmpeg_next::format::context::Input,
    streams: Vec<AvStream>,
    tracks: Vec<TrackInfo>,
}

impl AvInput {
    /// Resolve input format by name (e.g. "x11grab", "v4l2") via FFmpeg's av_find_input_format.
    fn find_input_format(name: &str) -> anyhow::Result<ffmpeg_next::format::format::Input> {
        let cname = CString::new(name)
            .map_err(|e| anyhow::anyhow!("invalid format name {:?}: {}", name, e))?;
        let ptr = unsafe { ffmpeg_next::ffi::av_find_input_format(cname.as_ptr()) };
        if ptr.is_null() {
            return Err(anyhow::anyhow!("input format not found: {}", name));
        }
        Ok(unsafe { ffmpeg_next::format::format::Input::wrap(ptr as *mut _) })
    }

    pub fn new(url: &str, format: Option<&str>, options: Option<Dictionary>) -> anyhow::Result<Self> {
        use ffmpeg_next::format::format::Format;

        let path = Path::new(url);
        let input = match format {
            Some(name) => {
                let fmt = Self::find_input_format(name)?;
                let ctx = ffmpeg_next::format::open_with(
                    path,
                    &Format::Input(fmt),
                    options.unwrap_or_else(Dictionary::new),
                )?;
                ctx.input()
            }
            None => match options {
                Some(opts) => ffmpeg_next::format::input_with_dictionary(path, opts)?,
                None => ffmpeg_next::format::input(path)?,
            },
        };

        let streams: Vec<AvStream> = input.streams().map(AvStream::from).collect();
        let tracks = streams.iter().map(|s| s.info().clone()).collect();
        for stream in &streams {
            let info = stream.info();
            log::info!(
                "{}: stream {} {} ({}), time_base {}{}",
                url,
                info.index,
                info.kind,
                info.codec_name,
                info.time_base,
                if info.is_default { ", default" } else { "" }
            );
        }

        Ok(Self {
            inner: input,
            streams,
            tracks,
        })
    }

    pub fn open(url: &str) -> anyhow::Result<Self> {
        Self::new(url, None, None)
    }

    pub fn streams(&self) -> &[AvStream] {
        &self.streams
    }

    pub fn stream(&self, index: usize) -> Option<&AvStream> {
        self.streams.get(index)
    }

    pub fn context(&self) -> &ffmpeg_next::format::context::Input {
        &self.inner
    }

    /// Container-level tags.
    pub fn metadata(&self) -> ffmpeg_next::DictionaryRef<'_> {
        self.inner.metadata()
    }

    /// Next packet in container order. `Ok(None)` at end of input.
    pub fn read_packet(&mut self) -> anyhow::Result<Option<RawPacket>> {
        let mut packet = ffmpeg_next::Packet::empty();
        match packet.read(&mut self.inner) {
            Ok(()) => {
                let time_base = self
                    .streams
                    .get(packet.stream())
                    .map(|s| s.time_base())
                    .unwrap_or_else(|| ffmpeg_next::Rational::new(1, 1_000));
                Ok(Some((packet, time_base).into()))
            }
            Err(ffmpeg_next::Error::Eof) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("read packet: {}", e)),
        }
    }

    fn first_video(&self) -> Option<usize> {
        self.tracks
            .iter()
            .find(|t| t.kind == MediaKind::Video && t.is_default)
            .or_else(|| self.tracks.iter().find(|t| t.kind == MediaKind::Video))
            .map(|t| t.index)
    }

    /// Next packet of the primary video stream, skipping everything else.
    pub fn next_video_packet(&mut self) -> anyhow::Result<Option<RawPacket>> {
        let Some(video) = self.first_video() else {
            return Ok(None);
        };
        while let Some(packet) = self.read_packet()? {
            if packet.index() == video {
                return Ok(Some(packet));
            }
        }
        Ok(None)
    }

    /// Counts the packets of the primary video stream, then rewinds to the
    /// start of the input.
    pub fn count_video_packets(&mut self) -> anyhow::Result<u64> {
        let mut count = 0;
        while self.next_video_packet()?.is_some() {
            count += 1;
        }
        self.rewind()?;
        log::debug!("counted {} video packets", count);
        Ok(count)
    }

    pub fn rewind(&mut self) -> anyhow::Result<()> {
        self.inner
            .seek(0, ..)
            .map_err(|e| anyhow::anyhow!("rewind: {}", e))
    }
}

impl MediaSource for AvInput {
    type Unit = RawPacket;

    fn tracks(&self) -> &[TrackInfo] {
        &self.tracks
    }

    fn next_unit(&mut self) -> anyhow::Result<Option<RawPacket>> {
        self.read_packet()
    }
}
