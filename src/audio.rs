//! Audio sink: a sample ring whose element width is chosen once per session.

use crate::error::{CaptureError, Result};
use crate::media::{SampleFormat, Samples};
use crate::ring_buffer::{sample_ring, SampleConsumer, SampleProducer};

/// Creates the audio sink for `format`.
pub fn audio_sink(format: SampleFormat, capacity: usize) -> Result<(AudioWriter, AudioReader)> {
    match format {
        SampleFormat::I16 => {
            let (producer, consumer) = sample_ring::<i16>(capacity)?;
            Ok((AudioWriter::I16(producer), AudioReader::I16(consumer)))
        }
        SampleFormat::F32 => {
            let (producer, consumer) = sample_ring::<f32>(capacity)?;
            Ok((AudioWriter::F32(producer), AudioReader::F32(consumer)))
        }
    }
}

/// Producer side, owned by the pipeline driver.
pub enum AudioWriter {
    I16(SampleProducer<i16>),
    F32(SampleProducer<f32>),
}

impl AudioWriter {
    pub fn format(&self) -> SampleFormat {
        match self {
            AudioWriter::I16(_) => SampleFormat::I16,
            AudioWriter::F32(_) => SampleFormat::F32,
        }
    }

    /// Writes a decoded block, waiting for room in the ring.
    ///
    /// `Ok(false)` means the reader is gone and the block was discarded.
    pub fn push(&mut self, samples: &Samples) -> Result<bool> {
        match (self, samples) {
            (AudioWriter::I16(producer), Samples::I16(values)) => Ok(producer.push_samples(values)),
            (AudioWriter::F32(producer), Samples::F32(values)) => Ok(producer.push_samples(values)),
            (writer, samples) => Err(CaptureError::SampleFormatMismatch {
                configured: writer.format(),
                requested: samples.format(),
            }),
        }
    }

    pub fn stop(&mut self) {
        match self {
            AudioWriter::I16(producer) => producer.stop(),
            AudioWriter::F32(producer) => producer.stop(),
        }
    }

    pub fn written(&self) -> u64 {
        match self {
            AudioWriter::I16(producer) => producer.written(),
            AudioWriter::F32(producer) => producer.written(),
        }
    }

    pub fn discarded(&self) -> u64 {
        match self {
            AudioWriter::I16(producer) => producer.discarded(),
            AudioWriter::F32(producer) => producer.discarded(),
        }
    }
}

/// Consumer side, handed to the audio consumer thread.
pub enum AudioReader {
    I16(SampleConsumer<i16>),
    F32(SampleConsumer<f32>),
}

impl AudioReader {
    pub fn format(&self) -> SampleFormat {
        match self {
            AudioReader::I16(_) => SampleFormat::I16,
            AudioReader::F32(_) => SampleFormat::F32,
        }
    }

    /// Pulls up to `buf.len()` samples; fails if the sink holds `float32`.
    pub fn pull_samples_i16(&mut self, buf: &mut [i16]) -> Result<usize> {
        match self {
            AudioReader::I16(consumer) => Ok(consumer.pull_samples(buf)),
            AudioReader::F32(_) => Err(CaptureError::SampleFormatMismatch {
                configured: SampleFormat::F32,
                requested: SampleFormat::I16,
            }),
        }
    }

    /// Pulls up to `buf.len()` samples; fails if the sink holds `int16`.
    pub fn pull_samples_f32(&mut self, buf: &mut [f32]) -> Result<usize> {
        match self {
            AudioReader::F32(consumer) => Ok(consumer.pull_samples(buf)),
            AudioReader::I16(_) => Err(CaptureError::SampleFormatMismatch {
                configured: SampleFormat::I16,
                requested: SampleFormat::F32,
            }),
        }
    }

    /// Pulls up to `len` samples in whatever format the sink holds. An empty
    /// block means the producer stopped and everything was read.
    pub fn pull_block(&mut self, len: usize) -> Samples {
        match self {
            AudioReader::I16(consumer) => {
                let mut buf = vec![0i16; len];
                let n = consumer.pull_samples(&mut buf);
                buf.truncate(n);
                Samples::I16(buf)
            }
            AudioReader::F32(consumer) => {
                let mut buf = vec![0f32; len];
                let n = consumer.pull_samples(&mut buf);
                buf.truncate(n);
                Samples::F32(buf)
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        match self {
            AudioReader::I16(consumer) => consumer.is_finished(),
            AudioReader::F32(consumer) => consumer.is_finished(),
        }
    }

    pub fn read(&self) -> u64 {
        match self {
            AudioReader::I16(consumer) => consumer.read(),
            AudioReader::F32(consumer) => consumer.read(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i16_sink_round_trip() {
        let (mut writer, mut reader) = audio_sink(SampleFormat::I16, 64).unwrap();
        assert!(writer.push(&Samples::I16(vec![1, -2, 3])).unwrap());
        writer.stop();

        let mut buf = [0i16; 8];
        assert_eq!(reader.pull_samples_i16(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, -2, 3]);
        assert!(reader.is_finished());
        assert_eq!(writer.written(), 3);
    }

    #[test]
    fn test_wrong_width_pull_is_misuse() {
        let (_writer, mut reader) = audio_sink(SampleFormat::I16, 64).unwrap();
        let mut buf = [0f32; 8];
        let err = reader.pull_samples_f32(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::SampleFormatMismatch {
                configured: SampleFormat::I16,
                requested: SampleFormat::F32
            }
        ));

        let (_writer, mut reader) = audio_sink(SampleFormat::F32, 64).unwrap();
        let mut buf = [0i16; 8];
        assert!(reader.pull_samples_i16(&mut buf).is_err());
    }

    #[test]
    fn test_wrong_width_push_is_rejected() {
        let (mut writer, _reader) = audio_sink(SampleFormat::F32, 64).unwrap();
        let err = writer.push(&Samples::I16(vec![0; 4])).unwrap_err();
        assert!(matches!(err, CaptureError::SampleFormatMismatch { .. }));
        assert_eq!(writer.written(), 0);
    }

    #[test]
    fn test_pull_block_keeps_format() {
        let (mut writer, mut reader) = audio_sink(SampleFormat::F32, 64).unwrap();
        writer.push(&Samples::F32(vec![0.25; 10])).unwrap();
        writer.stop();
        assert_eq!(reader.pull_block(4), Samples::F32(vec![0.25; 4]));
        assert_eq!(reader.pull_block(16).len(), 6);
        assert!(reader.pull_block(16).is_empty());
    }

    #[test]
    fn test_dropped_writer_finishes_reader() {
        let (writer, mut reader) = audio_sink(SampleFormat::F32, 64).unwrap();
        drop(writer);
        let mut buf = [0f32; 8];
        assert_eq!(reader.pull_samples_f32(&mut buf).unwrap(), 0);
        assert!(reader.is_finished());
    }
}
