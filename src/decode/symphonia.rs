//! Container decoder backends built on symphonia
//!
//! One backend per container (WAV, FLAC, MP3, Ogg/Vorbis), each pairing a
//! magic-byte probe with the matching symphonia format reader. All four
//! share [`SymphoniaDecoder`], which walks packets, normalizes every
//! decoded buffer to interleaved `f32`, and skips corrupt packets with a
//! counter instead of failing the stream.

use crate::audio::types::{AudioSpec, FrameBlock};
use crate::decode::{ContainerKind, DecoderBackend, StreamDecoder};
use crate::error::{Error, Result};
use symphonia::core::audio::SampleBuffer as SymphoniaSampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::{Error as SymphoniaError, SeekErrorKind};
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::units::{Time, TimeBase};
use symphonia::default::formats::{FlacReader, MpaReader, OggReader, WavReader};
use tracing::{debug, warn};

/// Streaming decoder over a symphonia format reader.
pub struct SymphoniaDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    container: ContainerKind,
    spec: AudioSpec,
    total_frames: Option<u64>,
    position: u64,
    /// Interleaved samples decoded but not yet handed out.
    pending: Vec<f32>,
    /// Reused interleaving scratch, grown on demand.
    sample_buf: Option<SymphoniaSampleBuffer<f32>>,
    corrupt_packets: u64,
    eof: bool,
}

impl SymphoniaDecoder {
    /// Build a decode handle from an already-constructed format reader.
    pub fn from_reader(format: Box<dyn FormatReader>, container: ContainerKind) -> Result<Self> {
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Malformed("no audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| Error::Malformed("sample rate not declared".to_string()))?;
        let channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| Error::Malformed("channel layout not declared".to_string()))?;

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| match e {
                SymphoniaError::Unsupported(_) => Error::UnsupportedFormat,
                e => Error::Malformed(format!("failed to create decoder: {}", e)),
            })?;

        let spec = AudioSpec::new(sample_rate, channels);
        debug!(
            "Opened {} stream: {}, {} total frames",
            container,
            spec,
            codec_params
                .n_frames
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            time_base: codec_params.time_base,
            container,
            spec,
            total_frames: codec_params.n_frames,
            position: 0,
            pending: Vec::new(),
            sample_buf: None,
            corrupt_packets: 0,
            eof: false,
        })
    }

    /// Append a decoded buffer to `pending` as interleaved f32.
    fn push_decoded(
        sample_buf: &mut Option<SymphoniaSampleBuffer<f32>>,
        pending: &mut Vec<f32>,
        decoded: symphonia::core::audio::AudioBufferRef<'_>,
    ) {
        let spec = *decoded.spec();
        let needed = decoded.capacity() * spec.channels.count();

        let recreate = match &sample_buf {
            Some(buf) => buf.capacity() < needed,
            None => true,
        };
        if recreate {
            *sample_buf = Some(SymphoniaSampleBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            pending.extend_from_slice(buf.samples());
        }
    }
}

impl StreamDecoder for SymphoniaDecoder {
    fn spec(&self) -> AudioSpec {
        self.spec
    }

    fn container(&self) -> ContainerKind {
        self.container
    }

    fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn decode(&mut self, max_frames: usize) -> Result<Option<FrameBlock>> {
        let channels = self.spec.channels as usize;
        let want = max_frames * channels;

        while self.pending.len() < want && !self.eof {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.eof = true;
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    // The reader hit a new stream; for single-track playback
                    // this is the end of the one we were decoding.
                    self.eof = true;
                    break;
                }
                Err(e) => return Err(Error::Malformed(format!("packet read failed: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    Self::push_decoded(&mut self.sample_buf, &mut self.pending, decoded)
                }
                Err(SymphoniaError::DecodeError(msg)) => {
                    // Recoverable: skip the packet, keep the stream alive.
                    self.corrupt_packets += 1;
                    warn!(
                        "Skipping corrupt {} packet ({} so far): {}",
                        self.container, self.corrupt_packets, msg
                    );
                    continue;
                }
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.eof = true;
                    break;
                }
                Err(e) => return Err(Error::Malformed(format!("decode failed: {}", e))),
            }
        }

        if self.pending.is_empty() {
            return Ok(None);
        }

        let take = want.min(self.pending.len());
        let samples: Vec<f32> = self.pending.drain(..take).collect();
        self.position += (samples.len() / channels) as u64;
        Ok(Some(FrameBlock::new(self.spec, samples)))
    }

    fn seek(&mut self, frame: u64) -> Result<u64> {
        let rate = self.spec.sample_rate as u64;
        let time = Time::new(frame / rate, (frame % rate) as f64 / rate as f64);

        let seeked = match self.format.seek(
            SeekMode::Accurate,
            SeekTo::Time {
                time,
                track_id: Some(self.track_id),
            },
        ) {
            Ok(seeked) => seeked,
            Err(SymphoniaError::Unsupported(_)) => return Err(Error::SeekUnsupported),
            Err(SymphoniaError::SeekError(kind)) => {
                return Err(match kind {
                    SeekErrorKind::Unseekable | SeekErrorKind::ForwardOnly => {
                        Error::SeekUnsupported
                    }
                    kind => Error::InvalidState(format!("seek failed: {:?}", kind)),
                })
            }
            Err(SymphoniaError::IoError(e)) => return Err(Error::Io(e)),
            Err(e) => return Err(Error::Malformed(format!("seek failed: {}", e))),
        };

        // Codec state from before the jump must not leak into the new
        // position, and neither may already-decoded samples.
        self.decoder.reset();
        self.pending.clear();
        self.eof = false;

        let landed = match self.time_base {
            Some(tb) => {
                let t = tb.calc_time(seeked.actual_ts);
                (t.seconds as f64 * rate as f64 + t.frac * rate as f64).round() as u64
            }
            None => seeked.actual_ts,
        };
        self.position = landed;
        debug!("Seek to frame {} landed on frame {}", frame, landed);
        Ok(landed)
    }

    fn corrupt_packets(&self) -> u64 {
        self.corrupt_packets
    }
}

fn open_reader<R: FormatReader + 'static>(
    kind: ContainerKind,
    source: MediaSourceStream,
) -> Result<Box<dyn StreamDecoder>> {
    let format = R::try_new(source, &FormatOptions::default()).map_err(|e| match e {
        SymphoniaError::Unsupported(_) => Error::UnsupportedFormat,
        SymphoniaError::IoError(e) => Error::Io(e),
        e => Error::Malformed(format!("failed to open {} container: {}", kind, e)),
    })?;
    Ok(Box::new(SymphoniaDecoder::from_reader(Box::new(format), kind)?))
}

/// RIFF/WAVE container backend.
pub struct WavBackend;

impl DecoderBackend for WavBackend {
    fn kind(&self) -> ContainerKind {
        ContainerKind::Wav
    }

    fn probe(&self, header: &[u8]) -> bool {
        header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WAVE"
    }

    fn open(&self, source: MediaSourceStream) -> Result<Box<dyn StreamDecoder>> {
        open_reader::<WavReader>(ContainerKind::Wav, source)
    }
}

/// Native FLAC container backend.
pub struct FlacBackend;

impl DecoderBackend for FlacBackend {
    fn kind(&self) -> ContainerKind {
        ContainerKind::Flac
    }

    fn probe(&self, header: &[u8]) -> bool {
        header.starts_with(b"fLaC")
    }

    fn open(&self, source: MediaSourceStream) -> Result<Box<dyn StreamDecoder>> {
        open_reader::<FlacReader>(ContainerKind::Flac, source)
    }
}

/// MPEG audio (MP3) backend.
///
/// The MP3 signature is weak: either an ID3v2 tag or a bare frame sync
/// word. Probed after the strong-magic containers so their files never
/// land here.
pub struct Mp3Backend;

impl DecoderBackend for Mp3Backend {
    fn kind(&self) -> ContainerKind {
        ContainerKind::Mp3
    }

    fn probe(&self, header: &[u8]) -> bool {
        if header.starts_with(b"ID3") {
            return true;
        }
        if header.len() < 2 {
            return false;
        }
        let sync = header[0] == 0xFF && (header[1] & 0xE0) == 0xE0;
        let version_ok = (header[1] >> 3) & 0x3 != 0b01; // reserved version
        let layer_ok = (header[1] >> 1) & 0x3 != 0b00; // reserved layer
        sync && version_ok && layer_ok
    }

    fn open(&self, source: MediaSourceStream) -> Result<Box<dyn StreamDecoder>> {
        open_reader::<MpaReader>(ContainerKind::Mp3, source)
    }
}

/// Ogg container backend (Vorbis streams).
pub struct OggVorbisBackend;

impl DecoderBackend for OggVorbisBackend {
    fn kind(&self) -> ContainerKind {
        ContainerKind::OggVorbis
    }

    fn probe(&self, header: &[u8]) -> bool {
        header.starts_with(b"OggS")
    }

    fn open(&self, source: MediaSourceStream) -> Result<Box<dyn StreamDecoder>> {
        open_reader::<OggReader>(ContainerKind::OggVorbis, source)
    }
}
