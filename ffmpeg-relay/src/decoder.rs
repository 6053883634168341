use anyhow::Context as _;
use bytes::Bytes;
use ffmpeg_next::{Rational, Rescale, codec::subtitle, util::error};
use media_relay::{
    CaptureConfig, CodecEngine, DecodeStatus, MediaKind, MediaSource, Output, SampleFormat, Samples,
    StreamRouter, SubtitleEvent, SubtitleRect, VideoFrame,
};

use crate::{
    filter::FilterGraph,
    input::AvInput,
    packet::RawPacket,
    stream::AvStream,
};

/// Opens a codec context for `stream`, in the stream's own time base.
fn open_context(stream: &AvStream) -> anyhow::Result<ffmpeg_next::codec::Context> {
    let mut ctx = ffmpeg_next::codec::Context::new();
    unsafe {
        (*ctx.as_mut_ptr()).time_base = stream.time_base().into();
    }
    ctx.set_parameters(stream.parameters().clone())?;
    Ok(ctx)
}

/// `Ok(false)` once the decoder wants more input (or is drained).
fn received(result: Result<(), ffmpeg_next::Error>) -> anyhow::Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(ffmpeg_next::Error::Eof) => Ok(false),
        Err(ffmpeg_next::Error::Other { errno }) if errno == error::EAGAIN => Ok(false),
        Err(err) => Err(err.into()),
    }
}

struct VideoTrack {
    decoder: ffmpeg_next::decoder::Video,
    filter: FilterGraph,
    // frames leave the graph in `filter_time_base`, sinks expect `time_base`
    time_base: Rational,
    filter_time_base: Rational,
    decoded: ffmpeg_next::frame::Video,
    filtered: ffmpeg_next::frame::Video,
}

impl VideoTrack {
    fn open(stream: &AvStream, config: &CaptureConfig) -> anyhow::Result<Self> {
        let decoder = open_context(stream)?.decoder().video()?;
        if decoder.format() == ffmpeg_next::format::Pixel::None
            || decoder.width() == 0
            || decoder.height() == 0
        {
            return Err(anyhow::anyhow!("missing codec parameters"));
        }
        let fps = stream.info().frame_rate.map(|r| r.as_f64());
        let mut filter = FilterGraph::video(&decoder, stream.time_base(), fps, &config.video_filter)?;
        let filter_time_base = filter.output_time_base()?;
        Ok(Self {
            decoder,
            filter,
            time_base: stream.time_base(),
            filter_time_base,
            decoded: ffmpeg_next::frame::Video::empty(),
            filtered: ffmpeg_next::frame::Video::empty(),
        })
    }

    fn decode(&mut self, packet: &RawPacket) -> anyhow::Result<Vec<Output>> {
        self.decoder.send_packet(packet.packet())?;
        self.receive()
    }

    fn flush(&mut self) -> anyhow::Result<Vec<Output>> {
        self.decoder.send_eof()?;
        let mut outputs = self.receive()?;
        self.filter.flush()?;
        outputs.extend(self.drain_filter()?);
        Ok(outputs)
    }

    fn receive(&mut self) -> anyhow::Result<Vec<Output>> {
        while received(self.decoder.receive_frame(&mut self.decoded))? {
            let ts = self.decoded.timestamp();
            self.decoded.set_pts(ts);
            self.filter.push(&self.decoded)?;
        }
        self.drain_filter()
    }

    fn drain_filter(&mut self) -> anyhow::Result<Vec<Output>> {
        let mut outputs = Vec::new();
        while self.filter.pull(&mut self.filtered)? {
            let mut frame = video_frame(&self.filtered);
            if self.filter_time_base != self.time_base {
                frame.pts = frame
                    .pts
                    .map(|pts| pts.rescale(self.filter_time_base, self.time_base));
            }
            outputs.push(frame.into());
        }
        Ok(outputs)
    }
}

fn video_frame(frame: &ffmpeg_next::frame::Video) -> VideoFrame {
    let format = frame
        .format()
        .descriptor()
        .map(|d| d.name())
        .unwrap_or("unknown");
    VideoFrame::new(
        Bytes::copy_from_slice(frame.data(0)),
        frame.width(),
        frame.height(),
        frame.pts(),
        frame.is_key(),
    )
    .with_layout(frame.stride(0), format)
}

struct AudioTrack {
    decoder: ffmpeg_next::decoder::Audio,
    filter: FilterGraph,
    format: SampleFormat,
    decoded: ffmpeg_next::frame::Audio,
    filtered: ffmpeg_next::frame::Audio,
}

impl AudioTrack {
    fn open(stream: &AvStream, config: &CaptureConfig) -> anyhow::Result<Self> {
        let decoder = open_context(stream)?.decoder().audio()?;
        let (_, channels) = stream.audio_layout();
        let filter = FilterGraph::audio(
            &decoder,
            stream.time_base(),
            channels,
            config.sample_rate,
            config.sample_format,
        )?;
        Ok(Self {
            decoder,
            filter,
            format: config.sample_format,
            decoded: ffmpeg_next::frame::Audio::empty(),
            filtered: ffmpeg_next::frame::Audio::empty(),
        })
    }

    fn decode(&mut self, packet: &RawPacket) -> anyhow::Result<Vec<Output>> {
        self.decoder.send_packet(packet.packet())?;
        self.receive()
    }

    fn flush(&mut self) -> anyhow::Result<Vec<Output>> {
        self.decoder.send_eof()?;
        let mut outputs = self.receive()?;
        self.filter.flush()?;
        outputs.extend(self.drain_filter()?);
        Ok(outputs)
    }

    fn receive(&mut self) -> anyhow::Result<Vec<Output>> {
        while received(self.decoder.receive_frame(&mut self.decoded))? {
            let ts = self.decoded.timestamp();
            self.decoded.set_pts(ts);
            self.filter.push(&self.decoded)?;
        }
        self.drain_filter()
    }

    fn drain_filter(&mut self) -> anyhow::Result<Vec<Output>> {
        let mut outputs = Vec::new();
        while self.filter.pull(&mut self.filtered)? {
            // mono, packed: plane 0 holds every sample
            let samples = match self.format {
                SampleFormat::I16 => Samples::I16(self.filtered.plane::<i16>(0).to_vec()),
                SampleFormat::F32 => Samples::F32(self.filtered.plane::<f32>(0).to_vec()),
            };
            if !samples.is_empty() {
                outputs.push(samples.into());
            }
        }
        Ok(outputs)
    }
}

struct SubtitleTrack {
    decoder: ffmpeg_next::decoder::Subtitle,
    // decoded into and cleared again for every packet
    scratch: subtitle::Subtitle,
}

impl SubtitleTrack {
    fn open(stream: &AvStream) -> anyhow::Result<Self> {
        let decoder = open_context(stream)?.decoder().subtitle()?;
        Ok(Self {
            decoder,
            scratch: subtitle::Subtitle::new(),
        })
    }

    /// The scratch is cleared after every packet, decoded or failed.
    fn decode(&mut self, packet: &RawPacket) -> anyhow::Result<Vec<Output>> {
        let decoded = self
            .decoder
            .decode(packet.packet(), &mut self.scratch)
            .map(|got| {
                if got {
                    vec![subtitle_event(&self.scratch, packet.pts()).into()]
                } else {
                    Vec::new()
                }
            });
        clear_subtitle(&mut self.scratch);
        Ok(decoded?)
    }
}

fn subtitle_event(sub: &subtitle::Subtitle, pts: Option<i64>) -> SubtitleEvent {
    let rects = sub
        .rects()
        .filter_map(|rect| match rect {
            subtitle::Rect::Text(text) => Some(SubtitleRect::Text(text.get().to_string())),
            subtitle::Rect::Ass(ass) => Some(SubtitleRect::Ass(ass.get().to_string())),
            subtitle::Rect::Bitmap(bitmap) => Some(SubtitleRect::Bitmap {
                width: bitmap.width(),
                height: bitmap.height(),
            }),
            subtitle::Rect::None(_) => None,
        })
        .collect();
    SubtitleEvent {
        pts,
        start_ms: sub.start(),
        end_ms: sub.end(),
        rects,
    }
}

/// Releases the rects held by `sub` and zeroes it; safe to repeat.
fn clear_subtitle(sub: &mut subtitle::Subtitle) {
    unsafe { ffmpeg_next::ffi::avsubtitle_free(sub.as_mut_ptr()) };
}

/// Decoders and filter graphs for the routed tracks of one [`AvInput`].
pub struct FfmpegEngine {
    video: Option<VideoTrack>,
    audio: Option<AudioTrack>,
    subtitle: Option<SubtitleTrack>,
}

// Only ever driven from the one pipeline thread.
unsafe impl Send for FfmpegEngine {}

impl FfmpegEngine {
    /// Opens a decoder (and filter graph) for every track the session will
    /// route. A track that fails to open is left out and reports a codec
    /// error on its first unit.
    pub fn new(input: &AvInput, config: &CaptureConfig) -> anyhow::Result<Self> {
        let router = StreamRouter::new(input.tracks(), config.capture);
        let stream_for = |kind: MediaKind| {
            router
                .track_for(kind)
                .and_then(|track| input.stream(track.index))
        };

        let video = stream_for(MediaKind::Video).and_then(|stream| {
            VideoTrack::open(stream, config)
                .map_err(|e| log::error!("video decoder for stream {}: {:#}", stream.index(), e))
                .ok()
        });
        let audio = stream_for(MediaKind::Audio).and_then(|stream| {
            AudioTrack::open(stream, config)
                .map_err(|e| log::error!("audio decoder for stream {}: {:#}", stream.index(), e))
                .ok()
        });
        let subtitle = stream_for(MediaKind::Subtitle).and_then(|stream| {
            SubtitleTrack::open(stream)
                .map_err(|e| log::error!("subtitle decoder for stream {}: {:#}", stream.index(), e))
                .ok()
        });

        if video.is_none() && audio.is_none() && subtitle.is_none() {
            return Err(anyhow::anyhow!("no decodable track"));
        }
        Ok(Self {
            video,
            audio,
            subtitle,
        })
    }
}

impl CodecEngine<RawPacket> for FfmpegEngine {
    fn decode(&mut self, kind: MediaKind, unit: RawPacket) -> anyhow::Result<DecodeStatus> {
        let outputs = match kind {
            MediaKind::Video => self.video.as_mut().context("no video decoder")?.decode(&unit),
            MediaKind::Audio => self.audio.as_mut().context("no audio decoder")?.decode(&unit),
            MediaKind::Subtitle => self
                .subtitle
                .as_mut()
                .context("no subtitle decoder")?
                .decode(&unit),
            _ => Ok(Vec::new()),
        };
        outputs
            .with_context(|| format!("packet pts {:?}", unit.pts()))
            .map(DecodeStatus::from_outputs)
    }

    fn flush(&mut self, kind: MediaKind) -> anyhow::Result<Vec<Output>> {
        match kind {
            MediaKind::Video => self.video.as_mut().map_or(Ok(Vec::new()), VideoTrack::flush),
            MediaKind::Audio => self.audio.as_mut().map_or(Ok(Vec::new()), AudioTrack::flush),
            // subtitle decoders hold nothing back
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_subtitle_event() {
        let mut scratch = subtitle::Subtitle::new();
        let event = subtitle_event(&scratch, Some(1_500));
        assert_eq!(event.pts, Some(1_500));
        assert!(event.rects.is_empty());

        clear_subtitle(&mut scratch);
        clear_subtitle(&mut scratch);
        assert_eq!(scratch.rects().count(), 0);
    }

    #[test]
    fn test_received_maps_eagain_and_eof_to_false() {
        assert!(received(Ok(())).unwrap());
        assert!(!received(Err(ffmpeg_next::Error::Eof)).unwrap());
        assert!(!received(Err(ffmpeg_next::Error::Other { errno: error::EAGAIN })).unwrap());
        assert!(received(Err(ffmpeg_next::Error::InvalidData)).is_err());
    }
}
