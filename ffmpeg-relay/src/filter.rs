//! Filter graphs between the decoders and the sinks.

use ffmpeg_next::{ChannelLayout, Rational, filter, format::Pixel, format::Sample, util::error};
use media_relay::{SampleFormat, VideoFilterConfig};

/// Output pixel format of the video chain. Single plane, so a
/// [`VideoFrame`](media_relay::VideoFrame) carries the whole picture.
pub const VIDEO_PIXEL_FORMAT: Pixel = Pixel::GRAY8;

/// `fps,format,yadif,crop,scale` for a `width`x`height` source.
pub fn video_description(width: u32, height: u32, source_fps: Option<f64>, hints: &VideoFilterConfig) -> String {
    let crop = hints.crop;
    let crop_width = width.saturating_sub(crop.left + crop.right);
    let crop_height = height.saturating_sub(crop.top + crop.bottom);
    let out_width = hints.width.unwrap_or(crop_width);

    let mut chain = Vec::new();
    let fps = hints
        .fps
        .or_else(|| source_fps.filter(|f| *f > 0.0).map(|f| f.round() as u32));
    if let Some(fps) = fps {
        chain.push(format!("fps=fps={}:round=near", fps));
    }
    chain.push("format=gray".to_string());
    chain.push("yadif=0:-1:1".to_string());
    chain.push(format!(
        "crop={}:{}:{}:{}",
        crop_width, crop_height, crop.left, crop.top
    ));
    chain.push(format!("scale=w={}:h=-1", out_width));
    chain.join(",")
}

/// Resample to mono at `sample_rate` in the sink's element format.
pub fn audio_description(sample_rate: u32, format: SampleFormat) -> String {
    let fmt = match format {
        SampleFormat::I16 => "s16",
        SampleFormat::F32 => "flt",
    };
    format!(
        "aresample={},aformat=sample_fmts={}:channel_layouts=mono",
        sample_rate, fmt
    )
}

pub fn sink_sample(format: SampleFormat) -> Sample {
    match format {
        SampleFormat::I16 => Sample::I16(ffmpeg_next::format::sample::Type::Packed),
        SampleFormat::F32 => Sample::F32(ffmpeg_next::format::sample::Type::Packed),
    }
}

pub struct FilterGraph {
    graph: filter::Graph,
}

unsafe impl Send for FilterGraph {}

impl FilterGraph {
    pub fn video(
        decoder: &ffmpeg_next::decoder::Video,
        time_base: Rational,
        source_fps: Option<f64>,
        hints: &VideoFilterConfig,
    ) -> anyhow::Result<Self> {
        let pix_fmt: ffmpeg_next::ffi::AVPixelFormat = decoder.format().into();
        let aspect = decoder.aspect_ratio();
        let args = format!(
            "video_size={}x{}:pix_fmt={}:time_base={}/{}:pixel_aspect={}/{}",
            decoder.width(),
            decoder.height(),
            pix_fmt as i32,
            time_base.numerator(),
            time_base.denominator(),
            aspect.numerator(),
            aspect.denominator().max(1)
        );
        let description = video_description(decoder.width(), decoder.height(), source_fps, hints);
        log::info!("video filter: {}", description);

        let mut graph = filter::Graph::new();
        graph.add(&find("buffer")?, "in", &args)?;
        graph.add(&find("buffersink")?, "out", "")?;
        graph
            .get("out")
            .ok_or_else(|| anyhow::anyhow!("video sink missing"))?
            .set_pixel_format(VIDEO_PIXEL_FORMAT);
        Self::parse(graph, &description)
    }

    pub fn audio(
        decoder: &ffmpeg_next::decoder::Audio,
        time_base: Rational,
        channels: u32,
        sample_rate: u32,
        format: SampleFormat,
    ) -> anyhow::Result<Self> {
        let args = format!(
            "time_base={}/{}:sample_rate={}:sample_fmt={}:channel_layout={}c",
            time_base.numerator(),
            time_base.denominator(),
            decoder.rate(),
            decoder.format().name(),
            channels.max(1)
        );
        let description = audio_description(sample_rate, format);
        log::info!("audio filter: {}", description);

        let mut graph = filter::Graph::new();
        graph.add(&find("abuffer")?, "in", &args)?;
        graph.add(&find("abuffersink")?, "out", "")?;
        {
            let mut out = graph
                .get("out")
                .ok_or_else(|| anyhow::anyhow!("audio sink missing"))?;
            out.set_sample_format(sink_sample(format));
            out.set_channel_layout(ChannelLayout::MONO);
            out.set_sample_rate(sample_rate);
        }
        Self::parse(graph, &description)
    }

    fn parse(mut graph: filter::Graph, description: &str) -> anyhow::Result<Self> {
        graph.output("in", 0)?.input("out", 0)?.parse(description)?;
        graph.validate()?;
        Ok(Self { graph })
    }

    pub fn push(&mut self, frame: &ffmpeg_next::Frame) -> anyhow::Result<()> {
        self.source()?.source().add(frame)?;
        Ok(())
    }

    /// End of input: the graph releases whatever it still holds.
    pub fn flush(&mut self) -> anyhow::Result<()> {
        self.source()?.source().flush()?;
        Ok(())
    }

    /// Fills `out` with the next filtered frame. `false` when the graph needs
    /// more input or is exhausted.
    pub fn pull(&mut self, out: &mut ffmpeg_next::Frame) -> anyhow::Result<bool> {
        let mut ctx = self
            .graph
            .get("out")
            .ok_or_else(|| anyhow::anyhow!("filter sink missing"))?;
        match ctx.sink().frame(out) {
            Ok(()) => Ok(true),
            Err(ffmpeg_next::Error::Eof) => Ok(false),
            Err(ffmpeg_next::Error::Other { errno }) if errno == error::EAGAIN => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Time base of the frames leaving the graph; `fps` rewrites it to 1/fps.
    pub fn output_time_base(&mut self) -> anyhow::Result<Rational> {
        let ctx = self
            .graph
            .get("out")
            .ok_or_else(|| anyhow::anyhow!("filter sink missing"))?;
        let tb = unsafe { ffmpeg_next::ffi::av_buffersink_get_time_base(ctx.as_ptr()) };
        Ok(tb.into())
    }

    fn source(&mut self) -> anyhow::Result<filter::Context<'_>> {
        self.graph
            .get("in")
            .ok_or_else(|| anyhow::anyhow!("filter source missing"))
    }
}

fn find(name: &str) -> anyhow::Result<filter::Filter> {
    filter::find(name).ok_or_else(|| anyhow::anyhow!("filter {} not available", name))
}
