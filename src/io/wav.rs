//! RIFF/WAVE reading and writing
//!
//! [`WaveReader`] and [`WaveWriter`] move whole [`AudioBlock`]s between a
//! byte stream and memory. Frames are interleaved on disk and deinterleaved
//! into the block's channels, so a block's channel count decides how frames
//! are split. Integer PCM of 8, 16, 24 and 32 bits and IEEE float of 32 and
//! 64 bits are supported; samples are normalized to `[-1, 1]`.
//!
//! [`WaveSource`] and [`WaveSink`] wrap them as chain modules. A failed read
//! or write does not stop the chain: the module emits silence or passes its
//! input through, logs a warning and keeps the error until the owner collects
//! it with [`Chain::check`](crate::chain::Chain::check).
//!
//! ```text
//! "RIFF" size "WAVE"
//!   "fmt " 16  tag channels rate byte_rate align bits
//!   ...        (other chunks are skipped)
//!   "data" len samples...
//! ```

use crate::block::AudioBlock;
use crate::error::{ChainError, WavError};
use crate::info::ChainInfo;
use crate::module::{AudioModule, ProcessContext};
use log::warn;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

const FORMAT_PCM: u16 = 1;
const FORMAT_FLOAT: u16 = 3;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Bytes from the start of the stream to the first data byte we write
const HEADER_LEN: u64 = 44;

/// Encoding of one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Integer PCM; 8-bit data is unsigned
    Int(u16),
    /// IEEE float
    Float(u16),
}

impl SampleFormat {
    pub fn bits(self) -> u16 {
        match self {
            SampleFormat::Int(bits) | SampleFormat::Float(bits) => bits,
        }
    }

    fn tag(self) -> u16 {
        match self {
            SampleFormat::Int(_) => FORMAT_PCM,
            SampleFormat::Float(_) => FORMAT_FLOAT,
        }
    }

    fn from_fmt(tag: u16, bits: u16) -> Result<Self, WavError> {
        match (tag, bits) {
            (FORMAT_PCM, 8 | 16 | 24 | 32) => Ok(SampleFormat::Int(bits)),
            (FORMAT_FLOAT, 32 | 64) => Ok(SampleFormat::Float(bits)),
            (FORMAT_PCM | FORMAT_FLOAT, _) => Err(WavError::UnsupportedBitDepth(bits)),
            (tag, _) => Err(WavError::UnsupportedFormat(tag)),
        }
    }

    fn decode(self, bytes: &[u8]) -> f64 {
        match (self, bytes) {
            (SampleFormat::Int(8), [b]) => (*b as f64 - 128.0) / 128.0,
            (SampleFormat::Int(16), [a, b]) => i16::from_le_bytes([*a, *b]) as f64 / 32_768.0,
            (SampleFormat::Int(24), [a, b, c]) => {
                // Sign-extend through the top byte
                let v = i32::from_le_bytes([0, *a, *b, *c]) >> 8;
                v as f64 / 8_388_608.0
            }
            (SampleFormat::Int(32), [a, b, c, d]) => {
                i32::from_le_bytes([*a, *b, *c, *d]) as f64 / 2_147_483_648.0
            }
            (SampleFormat::Float(32), [a, b, c, d]) => f32::from_le_bytes([*a, *b, *c, *d]) as f64,
            (SampleFormat::Float(64), bytes) if bytes.len() == 8 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                f64::from_le_bytes(raw)
            }
            _ => 0.0,
        }
    }

    fn encode(self, value: f64, out: &mut Vec<u8>) {
        let v = value.clamp(-1.0, 1.0);
        match self {
            SampleFormat::Int(8) => out.push((v * 127.0 + 128.0).round() as u8),
            SampleFormat::Int(16) => out.extend_from_slice(&((v * 32_767.0).round() as i16).to_le_bytes()),
            SampleFormat::Int(24) => {
                let bytes = ((v * 8_388_607.0).round() as i32).to_le_bytes();
                out.extend_from_slice(&bytes[..3]);
            }
            SampleFormat::Int(_) => {
                out.extend_from_slice(&((v * 2_147_483_647.0).round() as i32).to_le_bytes())
            }
            SampleFormat::Float(64) => out.extend_from_slice(&value.to_le_bytes()),
            SampleFormat::Float(_) => out.extend_from_slice(&(value as f32).to_le_bytes()),
        }
    }
}

/// Stream layout of a WAVE file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub channels: u16,
    pub sample_rate: u32,
    pub format: SampleFormat,
}

impl WavSpec {
    /// Integer PCM layout
    pub fn pcm(channels: u16, sample_rate: u32, bits: u16) -> Self {
        Self {
            channels,
            sample_rate,
            format: SampleFormat::Int(bits),
        }
    }

    /// 32-bit float layout
    pub fn float(channels: u16, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
            format: SampleFormat::Float(32),
        }
    }

    /// Layout matching a chain descriptor
    pub fn from_info(info: &ChainInfo, format: SampleFormat) -> Self {
        Self {
            channels: info.channels as u16,
            sample_rate: info.sample_rate,
            format,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.format.bits() as usize / 8
    }

    /// Bytes per interleaved frame
    pub fn block_align(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    fn check(&self) -> Result<(), WavError> {
        SampleFormat::from_fmt(self.format.tag(), self.format.bits())?;
        if self.channels == 0 {
            return Err(WavError::Truncated("zero channels"));
        }
        Ok(())
    }
}

fn read_array<R: Read, const N: usize>(reader: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_u16<R: Read>(reader: &mut R) -> io::Result<u16> {
    read_array(reader).map(u16::from_le_bytes)
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    read_array(reader).map(u32::from_le_bytes)
}

fn skip<R: Read>(reader: &mut R, len: u64) -> io::Result<()> {
    let copied = io::copy(&mut reader.by_ref().take(len), &mut io::sink())?;
    if copied < len {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(())
}

/// Parse the `fmt ` chunk body
fn read_fmt<R: Read>(reader: &mut R, len: u32) -> Result<WavSpec, WavError> {
    if len < 16 {
        return Err(WavError::Truncated("fmt chunk shorter than 16 bytes"));
    }
    let mut tag = read_u16(reader)?;
    let channels = read_u16(reader)?;
    let sample_rate = read_u32(reader)?;
    let _byte_rate = read_u32(reader)?;
    let align = read_u16(reader)?;
    let bits = read_u16(reader)?;
    let mut consumed = 16;

    if tag == FORMAT_EXTENSIBLE && len >= 26 {
        // cbSize, valid bits, channel mask, then the sub-format GUID
        let _cb_size = read_u16(reader)?;
        let _valid_bits = read_u16(reader)?;
        let _mask = read_u32(reader)?;
        tag = read_u16(reader)?;
        consumed += 10;
    }
    skip(reader, (len - consumed) as u64 + (len & 1) as u64)?;

    let spec = WavSpec {
        channels,
        sample_rate,
        format: SampleFormat::from_fmt(tag, bits)?,
    };
    spec.check()?;
    if spec.block_align() != align as usize {
        return Err(WavError::Truncated("block align disagrees with bit depth"));
    }
    Ok(spec)
}

/// Map a clean end of stream during chunk scanning to a missing chunk
fn chunk_eof(err: io::Error, chunk: &'static str) -> WavError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        WavError::MissingChunk(chunk)
    } else {
        WavError::Io(err)
    }
}

/// Streaming WAVE decoder
pub struct WaveReader<R> {
    reader: R,
    spec: WavSpec,
    data_len: u64,
    read: u64,
}

impl<R: Read> WaveReader<R> {
    /// Parse the header and position the stream at the first sample
    pub fn new(mut reader: R) -> Result<Self, WavError> {
        let riff: [u8; 4] = read_array(&mut reader).map_err(|e| chunk_eof(e, "RIFF"))?;
        if &riff != b"RIFF" {
            return Err(WavError::BadMagic(riff));
        }
        let _riff_len = read_u32(&mut reader)?;
        let wave: [u8; 4] = read_array(&mut reader)?;
        if &wave != b"WAVE" {
            return Err(WavError::BadMagic(wave));
        }

        let mut spec = None;
        loop {
            let missing = if spec.is_none() { "fmt " } else { "data" };
            let id: [u8; 4] = read_array(&mut reader).map_err(|e| chunk_eof(e, missing))?;
            let len = read_u32(&mut reader).map_err(|e| chunk_eof(e, missing))?;
            match &id {
                b"fmt " => spec = Some(read_fmt(&mut reader, len)?),
                b"data" => {
                    let spec = spec.ok_or(WavError::MissingChunk("fmt "))?;
                    return Ok(Self {
                        reader,
                        spec,
                        data_len: len as u64,
                        read: 0,
                    });
                }
                _ => skip(&mut reader, len as u64 + (len & 1) as u64)
                    .map_err(|e| chunk_eof(e, missing))?,
            }
        }
    }

    pub fn spec(&self) -> &WavSpec {
        &self.spec
    }

    /// Frames in the data chunk
    pub fn total_frames(&self) -> u64 {
        self.data_len / self.spec.block_align() as u64
    }

    /// Frames not read yet
    pub fn frames_remaining(&self) -> u64 {
        (self.data_len - self.read) / self.spec.block_align() as u64
    }

    /// True once every frame has been read
    pub fn is_done(&self) -> bool {
        self.frames_remaining() == 0
    }

    /// Fill `block` with the next frames.
    ///
    /// Returns the number of frames read; frames past the end of the data and
    /// channels the file lacks are left silent. Channels beyond the block's
    /// channel count are dropped.
    pub fn read_block(&mut self, block: &mut AudioBlock) -> Result<usize, WavError> {
        block.clear();
        let frames = (block.frames() as u64).min(self.frames_remaining()) as usize;
        let align = self.spec.block_align();
        let width = self.spec.bytes_per_sample();
        let mut raw = vec![0u8; frames * align];
        self.reader.read_exact(&mut raw)?;
        self.read += raw.len() as u64;

        let channels = block.channels().min(self.spec.channels as usize);
        for (frame, bytes) in raw.chunks_exact(align).enumerate() {
            for ch in 0..channels {
                let sample = &bytes[ch * width..(ch + 1) * width];
                block.set(ch, frame, self.spec.format.decode(sample));
            }
        }
        Ok(frames)
    }

    /// Read everything left into one block with the file's channel count
    pub fn read_all(&mut self) -> Result<AudioBlock, WavError> {
        let mut block = AudioBlock::new(self.frames_remaining() as usize, self.spec.channels as usize);
        self.read_block(&mut block)?;
        Ok(block)
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl WaveReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WavError> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

/// Streaming WAVE encoder.
///
/// Sizes in the header are patched by [`finalize`](Self::finalize), which
/// needs a seekable stream.
pub struct WaveWriter<W: Write + Seek> {
    writer: W,
    spec: WavSpec,
    written: u64,
    finalized: bool,
}

impl<W: Write + Seek> WaveWriter<W> {
    /// Write a header with placeholder sizes
    pub fn new(mut writer: W, spec: WavSpec) -> Result<Self, WavError> {
        spec.check()?;
        let mut header = Vec::with_capacity(HEADER_LEN as usize);
        header.extend_from_slice(b"RIFF");
        header.extend_from_slice(&0u32.to_le_bytes());
        header.extend_from_slice(b"WAVE");
        header.extend_from_slice(b"fmt ");
        header.extend_from_slice(&16u32.to_le_bytes());
        header.extend_from_slice(&spec.format.tag().to_le_bytes());
        header.extend_from_slice(&spec.channels.to_le_bytes());
        header.extend_from_slice(&spec.sample_rate.to_le_bytes());
        header.extend_from_slice(&spec.byte_rate().to_le_bytes());
        header.extend_from_slice(&(spec.block_align() as u16).to_le_bytes());
        header.extend_from_slice(&spec.format.bits().to_le_bytes());
        header.extend_from_slice(b"data");
        header.extend_from_slice(&0u32.to_le_bytes());
        writer.write_all(&header)?;
        Ok(Self {
            writer,
            spec,
            written: 0,
            finalized: false,
        })
    }

    pub fn spec(&self) -> &WavSpec {
        &self.spec
    }

    /// Frames written so far
    pub fn frames_written(&self) -> u64 {
        self.written / self.spec.block_align() as u64
    }

    /// Interleave and append every frame of `block`.
    ///
    /// Channels the block lacks are written as silence.
    pub fn write_block(&mut self, block: &AudioBlock) -> Result<(), WavError> {
        let channels = self.spec.channels as usize;
        let mut raw = Vec::with_capacity(block.frames() * self.spec.block_align());
        for frame in 0..block.frames() {
            for ch in 0..channels {
                let value = if ch < block.channels() {
                    block.get(ch, frame)
                } else {
                    0.0
                };
                self.spec.format.encode(value, &mut raw);
            }
        }
        self.writer.write_all(&raw)?;
        self.written += raw.len() as u64;
        self.finalized = false;
        Ok(())
    }

    /// Patch the RIFF and data sizes and flush
    pub fn finalize(&mut self) -> Result<(), WavError> {
        let data_len = u32::try_from(self.written)
            .map_err(|_| WavError::Truncated("data exceeds 4 GiB"))?;
        let end = self.writer.stream_position()?;
        self.writer.seek(SeekFrom::Start(4))?;
        self.writer.write_all(&(36 + data_len).to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(HEADER_LEN - 4))?;
        self.writer.write_all(&data_len.to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;
        self.finalized = true;
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Finalize and hand back the stream
    pub fn into_inner(mut self) -> Result<W, WavError> {
        if !self.finalized {
            self.finalize()?;
        }
        Ok(self.writer)
    }
}

impl WaveWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P, spec: WavSpec) -> Result<Self, WavError> {
        Self::new(BufWriter::new(File::create(path)?), spec)
    }
}

/// Source module reading one block per cycle from a WAVE stream
pub struct WaveSource<R> {
    reader: WaveReader<R>,
    error: Option<WavError>,
}

impl<R: Read> WaveSource<R> {
    pub fn new(reader: WaveReader<R>) -> Self {
        Self {
            reader,
            error: None,
        }
    }

    pub fn reader(&self) -> &WaveReader<R> {
        &self.reader
    }

    /// True once the data chunk is exhausted
    pub fn is_done(&self) -> bool {
        self.reader.is_done()
    }

    /// Last read failure, if any
    pub fn error(&self) -> Option<&WavError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<WavError> {
        self.error.take()
    }
}

impl WaveSource<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WavError> {
        WaveReader::open(path).map(Self::new)
    }
}

impl<R: Read + Send + 'static> AudioModule for WaveSource<R> {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> AudioBlock {
        let mut block = ctx.create_block();
        if let Err(err) = self.reader.read_block(&mut block) {
            warn!("wave read failed, emitting silence: {err}");
            block.clear();
            self.error = Some(err);
        }
        block
    }

    fn take_fault(&mut self) -> Option<ChainError> {
        self.error.take().map(ChainError::from)
    }

    fn kind(&self) -> &'static str {
        "wave_source"
    }
}

/// Pass-through module appending every block to a WAVE stream.
///
/// The header is finalized on `stop`.
pub struct WaveSink<W: Write + Seek> {
    writer: WaveWriter<W>,
    error: Option<WavError>,
}

impl<W: Write + Seek> WaveSink<W> {
    pub fn new(writer: WaveWriter<W>) -> Self {
        Self {
            writer,
            error: None,
        }
    }

    pub fn writer(&self) -> &WaveWriter<W> {
        &self.writer
    }

    pub fn error(&self) -> Option<&WavError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<WavError> {
        self.error.take()
    }

    /// Finalize and hand back the stream
    pub fn into_inner(self) -> Result<W, WavError> {
        self.writer.into_inner()
    }
}

impl WaveSink<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P, spec: WavSpec) -> Result<Self, WavError> {
        WaveWriter::create(path, spec).map(Self::new)
    }
}

impl<W: Write + Seek + Send + 'static> AudioModule for WaveSink<W> {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> AudioBlock {
        let block = ctx.input_or_silence();
        if let Err(err) = self.writer.write_block(&block) {
            warn!("wave write failed: {err}");
            self.error = Some(err);
        }
        block
    }

    fn stop(&mut self) {
        if let Err(err) = self.writer.finalize() {
            warn!("wave finalize failed: {err}");
            self.error = Some(err);
        }
    }

    fn take_fault(&mut self) -> Option<ChainError> {
        self.error.take().map(ChainError::from)
    }

    fn kind(&self) -> &'static str {
        "wave_sink"
    }
}
