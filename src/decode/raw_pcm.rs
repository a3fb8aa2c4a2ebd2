//! Headerless PCM passthrough backend
//!
//! Raw sample data carries no signature, so this backend is never selected
//! by sniffing; the caller supplies the wire format explicitly via
//! [`RawPcmSpec`] and opens it through `open_raw_pcm`.

use crate::audio::convert::{i16_to_f32, i32_to_f32};
use crate::audio::types::{AudioSpec, FrameBlock, SampleFormat};
use crate::decode::{ContainerKind, DecoderBackend, StreamDecoder};
use crate::error::{Error, Result};
use std::io::{Seek, SeekFrom};
use symphonia::core::io::{MediaSource, MediaSourceStream, ReadBytes};

/// Wire format of a headerless PCM source (little-endian).
#[derive(Debug, Clone, Copy)]
pub struct RawPcmSpec {
    pub spec: AudioSpec,
    pub sample_format: SampleFormat,
}

impl RawPcmSpec {
    pub fn bytes_per_frame(&self) -> usize {
        self.spec.channels as usize * self.sample_format.bytes_per_sample()
    }
}

/// Raw PCM backend; `open` wraps the source without parsing anything.
pub struct RawPcmBackend {
    pub pcm_spec: RawPcmSpec,
}

impl DecoderBackend for RawPcmBackend {
    fn kind(&self) -> ContainerKind {
        ContainerKind::RawPcm
    }

    /// Headerless data matches anything, so raw PCM never claims a probe.
    fn probe(&self, _header: &[u8]) -> bool {
        false
    }

    fn open(&self, source: MediaSourceStream) -> Result<Box<dyn StreamDecoder>> {
        Ok(Box::new(RawPcmDecoder::new(source, self.pcm_spec)))
    }
}

/// Streaming reader over headerless PCM bytes.
pub struct RawPcmDecoder {
    source: MediaSourceStream,
    pcm_spec: RawPcmSpec,
    total_frames: Option<u64>,
    position: u64,
    eof: bool,
}

impl RawPcmDecoder {
    pub fn new(source: MediaSourceStream, pcm_spec: RawPcmSpec) -> Self {
        let total_frames = source
            .byte_len()
            .map(|len| len / pcm_spec.bytes_per_frame() as u64);
        Self {
            source,
            pcm_spec,
            total_frames,
            position: 0,
            eof: false,
        }
    }

    /// Convert little-endian wire bytes to f32 samples, whole frames only.
    fn convert(&self, bytes: &[u8], out: &mut Vec<f32>) {
        match self.pcm_spec.sample_format {
            SampleFormat::Int16 => {
                for b in bytes.chunks_exact(2) {
                    out.push(i16_to_f32(i16::from_le_bytes([b[0], b[1]])));
                }
            }
            SampleFormat::Int32 => {
                for b in bytes.chunks_exact(4) {
                    out.push(i32_to_f32(i32::from_le_bytes([b[0], b[1], b[2], b[3]])));
                }
            }
            SampleFormat::Float32 => {
                for b in bytes.chunks_exact(4) {
                    out.push(f32::from_le_bytes([b[0], b[1], b[2], b[3]]));
                }
            }
        }
    }
}

impl StreamDecoder for RawPcmDecoder {
    fn spec(&self) -> AudioSpec {
        self.pcm_spec.spec
    }

    fn container(&self) -> ContainerKind {
        ContainerKind::RawPcm
    }

    fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn decode(&mut self, max_frames: usize) -> Result<Option<FrameBlock>> {
        if self.eof {
            return Ok(None);
        }

        let bytes_per_frame = self.pcm_spec.bytes_per_frame();
        let mut buf = vec![0u8; max_frames * bytes_per_frame];
        let mut filled = 0;

        while filled < buf.len() {
            let n = self.source.read_buf(&mut buf[filled..])?;
            if n == 0 {
                self.eof = true;
                break;
            }
            filled += n;
        }

        // A trailing partial frame cannot be played; drop it.
        let whole = filled - (filled % bytes_per_frame);
        if whole == 0 {
            return Ok(None);
        }

        let mut samples = Vec::with_capacity(whole / self.pcm_spec.sample_format.bytes_per_sample());
        self.convert(&buf[..whole], &mut samples);
        self.position += (whole / bytes_per_frame) as u64;
        Ok(Some(FrameBlock::new(self.pcm_spec.spec, samples)))
    }

    fn seek(&mut self, frame: u64) -> Result<u64> {
        if !self.source.is_seekable() {
            return Err(Error::SeekUnsupported);
        }
        let byte = frame * self.pcm_spec.bytes_per_frame() as u64;
        self.source.seek(SeekFrom::Start(byte))?;
        self.position = frame;
        self.eof = false;
        Ok(frame)
    }

    fn corrupt_packets(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn pcm_source(bytes: Vec<u8>) -> MediaSourceStream {
        MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default())
    }

    fn i16_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn decodes_i16_le_frames() {
        let pcm_spec = RawPcmSpec {
            spec: AudioSpec::new(44100, 2),
            sample_format: SampleFormat::Int16,
        };
        let mut dec = RawPcmDecoder::new(pcm_source(i16_bytes(&[0, 16384, -16384, 32767])), pcm_spec);

        assert_eq!(dec.total_frames(), Some(2));
        let block = dec.decode(16).unwrap().unwrap();
        assert_eq!(block.frames(), 2);
        assert_eq!(block.samples[0], 0.0);
        assert!((block.samples[3] - 1.0).abs() < 1e-6);
        assert!(dec.decode(16).unwrap().is_none());
        assert_eq!(dec.position(), 2);
    }

    #[test]
    fn seek_rewinds_by_frames() {
        let pcm_spec = RawPcmSpec {
            spec: AudioSpec::new(8000, 1),
            sample_format: SampleFormat::Int16,
        };
        let mut dec = RawPcmDecoder::new(pcm_source(i16_bytes(&[1, 2, 3, 4])), pcm_spec);

        let first = dec.decode(4).unwrap().unwrap();
        assert_eq!(first.frames(), 4);

        assert_eq!(dec.seek(2).unwrap(), 2);
        let rest = dec.decode(4).unwrap().unwrap();
        assert_eq!(rest.frames(), 2);
        assert_eq!(rest.samples, first.samples[2..]);
    }

    #[test]
    fn trailing_partial_frame_dropped() {
        let pcm_spec = RawPcmSpec {
            spec: AudioSpec::new(8000, 2),
            sample_format: SampleFormat::Int16,
        };
        // 2 full frames plus 1 stray sample.
        let mut bytes = i16_bytes(&[1, 2, 3, 4]);
        bytes.extend(i16_bytes(&[5]));
        let mut dec = RawPcmDecoder::new(pcm_source(bytes), pcm_spec);

        let block = dec.decode(16).unwrap().unwrap();
        assert_eq!(block.frames(), 2);
        assert!(dec.decode(16).unwrap().is_none());
    }

    #[test]
    fn raw_pcm_never_probes() {
        let backend = RawPcmBackend {
            pcm_spec: RawPcmSpec {
                spec: AudioSpec::new(44100, 2),
                sample_format: SampleFormat::Int16,
            },
        };
        assert!(!backend.probe(b"RIFFxxxxWAVE"));
        assert!(!backend.probe(&[0u8; 16]));
    }
}
