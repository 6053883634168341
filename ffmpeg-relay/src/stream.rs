use ffmpeg_next::{codec::Parameters, format::stream};
use media_relay::{MediaKind, Rational, TrackInfo};

unsafe impl Send for AvStream {}
unsafe impl Sync for AvStream {}

/// One input stream: the codec parameters a decoder is opened from, plus the
/// [`TrackInfo`] the router sees.
#[derive(Clone)]
pub struct AvStream {
    parameters: Parameters,
    time_base: ffmpeg_next::Rational,
    info: TrackInfo,
}

impl AvStream {
    pub fn index(&self) -> usize {
        self.info.index
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn time_base(&self) -> ffmpeg_next::Rational {
        self.time_base
    }

    pub fn info(&self) -> &TrackInfo {
        &self.info
    }

    pub fn kind(&self) -> MediaKind {
        self.info.kind
    }

    pub fn width(&self) -> u32 {
        unsafe {
            let ptr = self.parameters.as_ptr();
            (*ptr).width.max(0) as u32
        }
    }

    pub fn height(&self) -> u32 {
        unsafe {
            let ptr = self.parameters.as_ptr();
            (*ptr).height.max(0) as u32
        }
    }

    /// Audio only: sample rate and channel count.
    pub fn audio_layout(&self) -> (u32, u32) {
        unsafe {
            let ptr = self.parameters.as_ptr();
            let rate = (*ptr).sample_rate;
            let channels = (*ptr).ch_layout.nb_channels;
            (rate.max(0) as u32, channels.max(0) as u32)
        }
    }
}

pub fn media_kind(medium: ffmpeg_next::media::Type) -> MediaKind {
    match medium {
        ffmpeg_next::media::Type::Video => MediaKind::Video,
        ffmpeg_next::media::Type::Audio => MediaKind::Audio,
        ffmpeg_next::media::Type::Subtitle => MediaKind::Subtitle,
        ffmpeg_next::media::Type::Data | ffmpeg_next::media::Type::Attachment => MediaKind::Data,
        _ => MediaKind::Unknown,
    }
}

pub fn to_rational(r: ffmpeg_next::Rational) -> Rational {
    Rational::new(r.numerator(), r.denominator())
}

impl From<stream::Stream<'_>> for AvStream {
    fn from(stream: stream::Stream<'_>) -> Self {
        let parameters = stream.parameters();
        let kind = media_kind(parameters.medium());
        let mut info = TrackInfo::new(stream.index(), kind)
            .with_time_base(to_rational(stream.time_base()))
            .with_codec(parameters.id().name());
        if stream
            .disposition()
            .contains(ffmpeg_next::format::stream::Disposition::DEFAULT)
        {
            info = info.with_default();
        }
        let rate = stream.avg_frame_rate();
        if kind == MediaKind::Video && rate.numerator() > 0 && rate.denominator() > 0 {
            info = info.with_frame_rate(to_rational(rate));
        }
        Self {
            parameters,
            time_base: stream.time_base(),
            info,
        }
    }
}
