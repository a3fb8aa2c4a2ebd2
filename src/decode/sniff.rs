//! Format sniffing and decoder selection
//!
//! Reads a bounded header prefix from the source, asks each registered
//! backend in fixed priority order whether it recognizes the signature, and
//! delegates opening to the first match. Strong magic numbers go first
//! (WAV, FLAC), then the weakly-signatured MP3, then Ogg, so a container
//! with a real signature can never be claimed by the frame-sync heuristic.

use crate::audio::types::DecodedAudio;
use crate::decode::raw_pcm::{RawPcmDecoder, RawPcmSpec};
use crate::decode::symphonia::{FlacBackend, Mp3Backend, OggVorbisBackend, WavBackend};
use crate::decode::{DecoderBackend, SourceInfo, StreamDecoder};
use crate::error::{Error, Result};
use std::io::Cursor;
use std::path::Path;
use std::sync::OnceLock;
use symphonia::core::io::{MediaSource, MediaSourceStream, ReadBytes, SeekBuffered};
use tracing::debug;

/// Header prefix read for probing. Enough for every registered signature.
pub const PROBE_LEN: usize = 16;

/// Frames pulled per iteration by the whole-source decode conveniences.
const DRAIN_BLOCK_FRAMES: usize = 4096;

/// Registered backends in probe priority order.
fn registry() -> &'static [Box<dyn DecoderBackend>] {
    static REGISTRY: OnceLock<Vec<Box<dyn DecoderBackend>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        vec![
            Box::new(WavBackend),
            Box::new(FlacBackend),
            Box::new(Mp3Backend),
            Box::new(OggVorbisBackend),
        ]
    })
}

/// Read the probe prefix and restore the stream position.
///
/// Uses the stream's seekback buffer, so this works on forward-only
/// sources too: probing never permanently consumes bytes.
fn read_header(mss: &mut MediaSourceStream) -> Result<([u8; PROBE_LEN], usize)> {
    mss.ensure_seekback_buffer(PROBE_LEN);

    let mut header = [0u8; PROBE_LEN];
    let mut filled = 0;
    while filled < PROBE_LEN {
        match mss.read_buf(&mut header[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(Error::Io(e)),
        }
    }

    mss.seek_buffered_rev(filled);
    Ok((header, filled))
}

/// Open a byte source, selecting a decoder by content sniffing.
pub fn open_source(source: Box<dyn MediaSource>) -> Result<Box<dyn StreamDecoder>> {
    let mut mss = MediaSourceStream::new(source, Default::default());
    let (header, len) = read_header(&mut mss)?;

    match registry().iter().find(|b| b.probe(&header[..len])) {
        Some(backend) => {
            debug!("Source sniffed as {}", backend.kind());
            backend.open(mss)
        }
        None => Err(Error::UnsupportedFormat),
    }
}

/// Open an audio file, selecting a decoder by content sniffing.
pub fn open_path(path: &Path) -> Result<Box<dyn StreamDecoder>> {
    let file = std::fs::File::open(path)?;
    open_source(Box::new(file))
}

/// Open an in-memory buffer, selecting a decoder by content sniffing.
pub fn open_bytes(data: Vec<u8>) -> Result<Box<dyn StreamDecoder>> {
    open_source(Box::new(Cursor::new(data)))
}

/// Open a headerless PCM source with an explicitly supplied wire format.
pub fn open_raw_pcm(source: Box<dyn MediaSource>, pcm_spec: RawPcmSpec) -> Box<dyn StreamDecoder> {
    let mss = MediaSourceStream::new(source, Default::default());
    Box::new(RawPcmDecoder::new(mss, pcm_spec))
}

/// Inspect a source's format without building a playback session.
pub fn inspect(source: Box<dyn MediaSource>) -> Result<SourceInfo> {
    let decoder = open_source(source)?;
    Ok(SourceInfo {
        container: decoder.container(),
        spec: decoder.spec(),
        total_frames: decoder.total_frames(),
    })
}

/// Inspect an audio file's format.
pub fn inspect_file(path: &Path) -> Result<SourceInfo> {
    let file = std::fs::File::open(path)?;
    inspect(Box::new(file))
}

/// Decode an entire source into memory.
pub fn decode_all(source: Box<dyn MediaSource>) -> Result<DecodedAudio> {
    let mut decoder = open_source(source)?;
    let spec = decoder.spec();

    let mut samples = Vec::new();
    while let Some(block) = decoder.decode(DRAIN_BLOCK_FRAMES)? {
        samples.extend_from_slice(&block.samples);
    }

    Ok(DecodedAudio { spec, samples })
}

/// Decode an entire audio file into memory.
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    let file = std::fs::File::open(path)?;
    decode_all(Box::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::ContainerKind;

    fn claims(header: &[u8]) -> Vec<ContainerKind> {
        registry()
            .iter()
            .filter(|b| b.probe(header))
            .map(|b| b.kind())
            .collect()
    }

    #[test]
    fn each_signature_claimed_by_exactly_one_backend() {
        let cases: [(&[u8], ContainerKind); 5] = [
            (b"RIFF\x24\x08\x00\x00WAVEfmt ", ContainerKind::Wav),
            (b"fLaC\x00\x00\x00\x22\x10\x00", ContainerKind::Flac),
            (b"ID3\x04\x00\x00\x00\x00\x00\x00", ContainerKind::Mp3),
            (&[0xFF, 0xFB, 0x90, 0x64, 0x00, 0x00], ContainerKind::Mp3),
            (b"OggS\x00\x02\x00\x00\x00\x00", ContainerKind::OggVorbis),
        ];
        for (header, expected) in cases {
            assert_eq!(claims(header), vec![expected], "header {:?}", &header[..4]);
        }
    }

    #[test]
    fn unknown_data_claimed_by_nobody() {
        assert!(claims(b"\x00\x01\x02\x03\x04\x05\x06\x07").is_empty());
        assert!(claims(b"hello world!").is_empty());
    }

    #[test]
    fn unknown_source_is_unsupported() {
        let result = open_bytes(b"definitely not audio data".to_vec());
        assert!(matches!(result, Err(Error::UnsupportedFormat)));
    }

    #[test]
    fn empty_source_is_unsupported() {
        let result = open_bytes(Vec::new());
        assert!(matches!(result, Err(Error::UnsupportedFormat)));
    }
}
