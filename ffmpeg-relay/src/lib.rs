//! FFmpeg implementation of the media-relay source and codec engine.

/// Registers FFmpeg components and sets FFmpeg's own log level. Call once at
/// startup, before opening any input.
pub fn init(codec_warnings: bool) -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))?;
    let level = if codec_warnings {
        ffmpeg_next::util::log::Level::Warning
    } else {
        ffmpeg_next::util::log::Level::Error
    };
    ffmpeg_next::util::log::set_level(level);
    Ok(())
}

pub mod decoder;
pub mod filter;
pub mod input;
pub mod metadata;
pub mod packet;
pub mod stream;

pub use decoder::FfmpegEngine;
pub use input::AvInput;
pub use metadata::{MediaInfo, MetaData, probe};
pub use packet::RawPacket;
