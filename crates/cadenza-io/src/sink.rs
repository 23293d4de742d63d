//! Rendered-audio file sinks.

use crate::{Error, Result};
use cadenza_core::{AudioBufferList, FileSink, Status};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Container inferred from an output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// RIFF WAVE.
    Wav,
}

impl FileFormat {
    /// Infers the container from the file extension (`.wav`, `.wave`).
    pub fn infer<P: AsRef<Path>>(path: P) -> Result<Self> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "wav" | "wave" => Ok(Self::Wav),
            "" => Err(Error::UnsupportedFileType("no file extension".into())),
            other => Err(Error::UnsupportedFileType(format!(".{other}"))),
        }
    }
}

/// Sample encoding written to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    /// 16-bit signed integer PCM.
    Int16,
    /// 32-bit IEEE float.
    Float32,
}

impl SampleEncoding {
    /// Encoding for a bit depth of 16 or 32.
    pub fn from_bit_depth(bits: u16) -> Result<Self> {
        match bits {
            16 => Ok(Self::Int16),
            32 => Ok(Self::Float32),
            other => Err(Error::UnsupportedFormat(format!("{other}-bit samples"))),
        }
    }

    /// Bits per sample.
    pub fn bits(self) -> u16 {
        match self {
            Self::Int16 => 16,
            Self::Float32 => 32,
        }
    }
}

/// WAV file sink written block by block.
pub struct WavFileSink {
    writer: Option<WavWriter<BufWriter<File>>>,
    encoding: SampleEncoding,
    channels: usize,
    scratch: Vec<f32>,
    frames_written: u64,
}

impl std::fmt::Debug for WavFileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavFileSink")
            .field("encoding", &self.encoding)
            .field("channels", &self.channels)
            .field("frames_written", &self.frames_written)
            .field("finished", &self.writer.is_none())
            .finish()
    }
}

impl WavFileSink {
    /// Creates (or truncates) the file at `path`.
    pub fn create<P: AsRef<Path>>(
        path: P,
        sample_rate: u32,
        channels: u16,
        bit_depth: u16,
    ) -> Result<Self> {
        let path = path.as_ref();
        FileFormat::infer(path)?;
        let encoding = SampleEncoding::from_bit_depth(bit_depth)?;
        if channels == 0 {
            return Err(Error::UnsupportedFormat("zero channels".into()));
        }

        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: encoding.bits(),
            sample_format: match encoding {
                SampleEncoding::Int16 => SampleFormat::Int,
                SampleEncoding::Float32 => SampleFormat::Float,
            },
        };
        let writer = WavWriter::create(path, spec)?;
        tracing::info!(
            path = %path.display(),
            sample_rate,
            channels,
            bits = encoding.bits(),
            "created output file"
        );
        Ok(Self {
            writer: Some(writer),
            encoding,
            channels: usize::from(channels),
            scratch: Vec::new(),
            frames_written: 0,
        })
    }

    /// Frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn write_block(&mut self, frames: u32, buffer: &AudioBufferList) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(Error::Io(std::io::Error::other("file already finalized")));
        };
        let frames = (frames as usize).min(buffer.frames());
        self.scratch.resize(frames * self.channels, 0.0);
        buffer.interleave_into(&mut self.scratch, self.channels);

        match self.encoding {
            SampleEncoding::Float32 => {
                for &sample in &self.scratch {
                    writer.write_sample(sample)?;
                }
            }
            SampleEncoding::Int16 => {
                let max_val = f32::from(i16::MAX);
                for &sample in &self.scratch {
                    let int_sample = (sample * max_val).clamp(-max_val - 1.0, max_val) as i16;
                    writer.write_sample(int_sample)?;
                }
            }
        }
        self.frames_written += frames as u64;
        Ok(())
    }
}

impl FileSink for WavFileSink {
    fn write(&mut self, frames: u32, buffer: &AudioBufferList) -> std::result::Result<(), Status> {
        self.write_block(frames, buffer).map_err(|err| {
            tracing::error!(error = %err, "file write failed");
            err.status()
        })
    }

    fn finish(&mut self) -> std::result::Result<(), Status> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        writer.finalize().map_err(|err| {
            tracing::error!(error = %err, "failed to finalize file");
            Status::WRITE_FAILED
        })?;
        tracing::info!(frames = self.frames_written, "output file finalized");
        Ok(())
    }
}
