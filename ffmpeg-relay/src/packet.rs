use std::fmt;

use bytes::Bytes;
use ffmpeg_next::Rational;
use media_relay::TrackUnit;

use crate::stream::to_rational;

/// A demultiplexed packet and the time base of the stream it came from.
pub struct RawPacket {
    packet: ffmpeg_next::codec::packet::Packet,
    time_base: Rational,
}

impl RawPacket {
    pub fn pts(&self) -> Option<i64> {
        self.packet.pts()
    }

    /// Presentation time in milliseconds, if the packet carries one.
    pub fn pts_ms(&self) -> Option<i64> {
        self.pts().map(|pts| {
            media_relay::rescale(pts, to_rational(self.time_base), media_relay::Rational::MILLIS)
        })
    }

    pub fn size(&self) -> usize {
        self.packet.size()
    }

    pub fn index(&self) -> usize {
        self.packet.stream()
    }

    /// Copy of the compressed payload.
    pub fn payload(&self) -> Bytes {
        self.packet.data().map(Bytes::copy_from_slice).unwrap_or_default()
    }

    pub fn is_key(&self) -> bool {
        self.packet.is_key()
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub(crate) fn packet(&self) -> &ffmpeg_next::codec::packet::Packet {
        &self.packet
    }
}

impl TrackUnit for RawPacket {
    fn track_index(&self) -> usize {
        self.index()
    }
}

impl fmt::Display for RawPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream {} size {}", self.index(), self.size())?;
        match self.pts_ms() {
            Some(ms) => write!(f, " pts {}ms", ms)?,
            None => write!(f, " pts -")?,
        }
        if self.is_key() {
            write!(f, " key")?;
        }
        Ok(())
    }
}

impl From<(ffmpeg_next::codec::packet::Packet, Rational)> for RawPacket {
    fn from((packet, time_base): (ffmpeg_next::codec::packet::Packet, Rational)) -> Self {
        Self { packet, time_base }
    }
}
