//! PCM16 WAV 编码

use std::io::{self, Seek, SeekFrom, Write};

const BITS_PER_SAMPLE: u16 = 16;

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// 44 字节 WAV 头
fn header_bytes(data_size: u32, sample_rate: u32, channels: u16) -> Vec<u8> {
    let byte_rate = sample_rate * channels as u32 * (BITS_PER_SAMPLE / 8) as u32;
    let block_align = channels * (BITS_PER_SAMPLE / 8);

    let mut header = Vec::with_capacity(44);
    // RIFF header
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&(36 + data_size).to_le_bytes());
    header.extend_from_slice(b"WAVE");

    // fmt chunk
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    header.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    header.extend_from_slice(&channels.to_le_bytes());
    header.extend_from_slice(&sample_rate.to_le_bytes());
    header.extend_from_slice(&byte_rate.to_le_bytes());
    header.extend_from_slice(&block_align.to_le_bytes());
    header.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data chunk
    header.extend_from_slice(b"data");
    header.extend_from_slice(&data_size.to_le_bytes());
    header
}

fn write_header<W: Write>(
    out: &mut W,
    data_size: u32,
    sample_rate: u32,
    channels: u16,
) -> io::Result<()> {
    out.write_all(&header_bytes(data_size, sample_rate, channels))
}

/// 将单声道 f32 样本编码为完整的 WAV 文件
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let data_size = samples.len() * 2;
    let mut wav = header_bytes(data_size as u32, sample_rate, 1);
    wav.reserve(data_size);
    for &s in samples {
        wav.extend_from_slice(&to_i16(s).to_le_bytes());
    }
    wav
}

/// 流式 WAV 写入器，`finish` 时回填长度
pub struct WavWriter<W: Write + Seek> {
    out: W,
    sample_rate: u32,
    data_size: u32,
}

impl<W: Write + Seek> WavWriter<W> {
    pub fn new(mut out: W, sample_rate: u32) -> io::Result<Self> {
        write_header(&mut out, 0, sample_rate, 1)?;
        Ok(Self {
            out,
            sample_rate,
            data_size: 0,
        })
    }

    pub fn write_samples(&mut self, samples: &[f32]) -> io::Result<()> {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for &s in samples {
            bytes.extend_from_slice(&to_i16(s).to_le_bytes());
        }
        self.out.write_all(&bytes)?;
        self.data_size = self.data_size.saturating_add(bytes.len() as u32);
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.out.seek(SeekFrom::Start(0))?;
        write_header(&mut self.out, self.data_size, self.sample_rate, 1)?;
        self.out.seek(SeekFrom::End(0))?;
        self.out.flush()?;
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_header_fields() {
        let wav = encode_wav(&[0.0, 0.5, -1.0], 16_000);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]), 16_000);
        assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]), 6);
        assert_eq!(wav.len(), 50);
        assert_eq!(i16::from_le_bytes([wav[48], wav[49]]), -32767);
    }

    #[test]
    fn test_header_is_fixed_size() {
        let header = header_bytes(1_000, 22_050, 1);
        assert_eq!(header.len(), 44);
        assert_eq!(&header[36..40], b"data");
        assert_eq!(u32::from_le_bytes([header[4], header[5], header[6], header[7]]), 1_036);
    }

    #[test]
    fn test_streaming_writer_backfills_sizes() {
        let mut writer = WavWriter::new(Cursor::new(Vec::new()), 8_000).unwrap();
        writer.write_samples(&[0.1; 10]).unwrap();
        writer.write_samples(&[0.2; 5]).unwrap();
        let wav = writer.finish().unwrap().into_inner();

        let samples = [[0.1f32; 10].as_slice(), &[0.2; 5]].concat();
        assert_eq!(wav, encode_wav(&samples, 8_000));
    }
}
