//! WAV encoding for rendered audio.
//!
//! Output is canonical 44-byte-header RIFF/WAVE, PCM format 1, 16 bits per
//! sample, little-endian, channels interleaved.

use std::io::{Cursor, Write};

use binrw::{BinRead, BinWrite};
use cs_ir::AudioBuffer;
use tracing::debug;

use crate::FormatError;

/// Size of the header written by `write_wav`.
pub const WAV_HEADER_LEN: usize = 44;

const PCM_FORMAT: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
const FMT_CHUNK_LEN: u32 = 16;

/// Largest data chunk whose RIFF size still fits in 32 bits.
pub const MAX_DATA_SIZE: u64 = u32::MAX as u64 - 36;

/// The RIFF, fmt, and data chunk headers of a canonical PCM WAV file.
#[derive(BinRead, BinWrite, Clone, Debug, PartialEq, Eq)]
#[brw(little)]
pub struct WavHeader {
    pub riff_tag: [u8; 4],
    /// File length minus 8.
    pub riff_size: u32,
    pub wave_tag: [u8; 4],
    pub fmt_tag: [u8; 4],
    pub fmt_size: u32,
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_tag: [u8; 4],
    pub data_size: u32,
}

impl WavHeader {
    /// Header for `frames` frames of 16-bit PCM. Fails if the data would
    /// not fit in a 32-bit RIFF file.
    pub fn pcm16(channels: u16, sample_rate: u32, frames: usize) -> Result<Self, FormatError> {
        let block_align = channels * (BITS_PER_SAMPLE / 8);
        let data_size = frames as u64 * block_align as u64;
        if data_size > MAX_DATA_SIZE {
            return Err(FormatError::Unsupported(format!(
                "{} bytes of audio exceeds the 4 GiB WAV limit",
                data_size
            )));
        }
        let data_size = data_size as u32;
        Ok(Self {
            riff_tag: *b"RIFF",
            riff_size: 36 + data_size,
            wave_tag: *b"WAVE",
            fmt_tag: *b"fmt ",
            fmt_size: FMT_CHUNK_LEN,
            audio_format: PCM_FORMAT,
            channels,
            sample_rate,
            byte_rate: sample_rate * block_align as u32,
            block_align,
            bits_per_sample: BITS_PER_SAMPLE,
            data_tag: *b"data",
            data_size,
        })
    }
}

/// Convert a float sample to 16-bit PCM. Input is clamped to [-1, 1];
/// negative values scale by 0x8000 and the rest by 0x7FFF.
pub fn sample_to_pcm16(sample: f32) -> i16 {
    let s = if sample.is_finite() { sample.clamp(-1.0, 1.0) } else { 0.0 };
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Write `buffer` as a 16-bit PCM WAV stream.
pub fn write_wav(w: &mut impl Write, buffer: &AudioBuffer, sample_rate: u32) -> Result<(), FormatError> {
    let header = WavHeader::pcm16(buffer.channels(), sample_rate, buffer.frames())?;
    let mut head = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN));
    header.write(&mut head)?;
    w.write_all(head.get_ref())?;

    let mut data = Vec::with_capacity(header.data_size as usize);
    for sample in buffer.interleaved() {
        data.extend_from_slice(&sample_to_pcm16(sample).to_le_bytes());
    }
    w.write_all(&data)?;
    Ok(())
}

/// Encode `buffer` as WAV bytes.
pub fn buffer_to_wav(buffer: &AudioBuffer, sample_rate: u32) -> Result<Vec<u8>, FormatError> {
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + buffer.frames() * buffer.channels() as usize * 2);
    write_wav(&mut out, buffer, sample_rate)?;
    debug!(bytes = out.len(), frames = buffer.frames(), "encoded wav");
    Ok(out)
}

/// Parse and validate the 44-byte header at the start of `data`.
pub fn parse_wav_header(data: &[u8]) -> Result<WavHeader, FormatError> {
    if data.len() < WAV_HEADER_LEN {
        return Err(FormatError::UnexpectedEof);
    }
    let header = WavHeader::read(&mut Cursor::new(data))?;
    if &header.riff_tag != b"RIFF" || &header.wave_tag != b"WAVE" {
        return Err(FormatError::InvalidHeader("missing RIFF/WAVE tags"));
    }
    if &header.fmt_tag != b"fmt " || &header.data_tag != b"data" {
        return Err(FormatError::InvalidHeader("expected fmt chunk followed by data chunk"));
    }
    if header.audio_format != PCM_FORMAT {
        return Err(FormatError::Unsupported(format!("audio format {}", header.audio_format)));
    }
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_u16(data: &[u8], pos: usize) -> u16 {
        u16::from_le_bytes([data[pos], data[pos + 1]])
    }

    fn read_u32(data: &[u8], pos: usize) -> u32 {
        u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
    }

    #[test]
    fn header_fields_at_canonical_offsets() {
        let buffer = AudioBuffer::new(2, 100);
        let wav = buffer_to_wav(&buffer, 44100).unwrap();
        assert_eq!(wav.len(), 44 + 400);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(read_u32(&wav, 4), 36 + 400);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(read_u32(&wav, 16), 16);
        assert_eq!(read_u16(&wav, 20), 1);
        assert_eq!(read_u16(&wav, 22), 2);
        assert_eq!(read_u32(&wav, 24), 44100);
        assert_eq!(read_u32(&wav, 28), 44100 * 4);
        assert_eq!(read_u16(&wav, 32), 4);
        assert_eq!(read_u16(&wav, 34), 16);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(read_u32(&wav, 40), 400);
    }

    #[test]
    fn parse_round_trips_header() {
        let buffer = AudioBuffer::new(1, 10);
        let wav = buffer_to_wav(&buffer, 22050).unwrap();
        let header = parse_wav_header(&wav).unwrap();
        assert_eq!(header, WavHeader::pcm16(1, 22050, 10).unwrap());
    }

    #[test]
    fn sample_scaling_is_asymmetric() {
        assert_eq!(sample_to_pcm16(1.0), 0x7FFF);
        assert_eq!(sample_to_pcm16(-1.0), -0x8000);
        assert_eq!(sample_to_pcm16(0.0), 0);
        assert_eq!(sample_to_pcm16(2.5), 0x7FFF);
        assert_eq!(sample_to_pcm16(-7.0), -0x8000);
        assert_eq!(sample_to_pcm16(f32::NAN), 0);
    }

    #[test]
    fn samples_are_interleaved() {
        let mut buffer = AudioBuffer::new(2, 2);
        buffer.channel_mut(0).copy_from_slice(&[1.0, -1.0]);
        buffer.channel_mut(1).copy_from_slice(&[0.0, 0.5]);
        let wav = buffer_to_wav(&buffer, 8000).unwrap();
        let pcm: Vec<i16> = wav[44..]
            .chunks(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(pcm, vec![32767, 0, -32768, 16383]);
    }

    #[test]
    fn rejects_short_and_foreign_data() {
        assert!(matches!(parse_wav_header(b"RIFF"), Err(FormatError::UnexpectedEof)));
        let mut wav = buffer_to_wav(&AudioBuffer::new(1, 1), 8000).unwrap();
        wav[8..12].copy_from_slice(b"AVI ");
        assert!(matches!(parse_wav_header(&wav), Err(FormatError::InvalidHeader(_))));
    }

    #[test]
    fn oversized_data_is_refused() {
        let limit = (MAX_DATA_SIZE / 4) as usize;
        let header = WavHeader::pcm16(2, 44100, limit).unwrap();
        assert!(header.data_size as u64 <= MAX_DATA_SIZE);
        assert_eq!(header.riff_size as u64, 36 + header.data_size as u64);
        assert!(matches!(WavHeader::pcm16(2, 44100, limit + 1), Err(FormatError::Unsupported(_))));
    }
}
