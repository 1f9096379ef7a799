//! Offset-addressed binary companion file.
//!
//! Every record is a `u64` element count followed by the element bytes. The
//! writer hands back the offset of the count; that offset is what the index
//! stores. The reader keeps one cursor and is used by one decode at a time.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::format::BLOB_COUNT_SIZE;
use crate::graph::{SocketType, SocketValue};
use crate::util::{Error, Result, Transform, Vec2, Vec3};

enum Sink {
    File(BufWriter<File>),
    Memory(Vec<u8>),
}

/// Append-only blob writer with a monotonically increasing offset.
pub struct BlobWriter {
    sink: Sink,
    pos: u64,
}

impl BlobWriter {
    /// Create (truncate) a blob file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            sink: Sink::File(BufWriter::with_capacity(1024 * 1024, file)),
            pos: 0,
        })
    }

    /// Blob kept in memory; see [`into_bytes`](Self::into_bytes).
    pub fn in_memory() -> Self {
        Self { sink: Sink::Memory(Vec::new()), pos: 0 }
    }

    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match &mut self.sink {
            Sink::File(w) => w.write_all(data)?,
            Sink::Memory(v) => v.extend_from_slice(data),
        }
        self.pos += data.len() as u64;
        Ok(())
    }

    /// Write one record and return its offset.
    pub fn write_record(&mut self, count: u64, bytes: &[u8]) -> Result<u64> {
        let offset = self.pos;
        let mut prefix = [0u8; BLOB_COUNT_SIZE as usize];
        (&mut prefix[..]).write_u64::<LittleEndian>(count)?;
        self.write_all(&prefix)?;
        self.write_all(bytes)?;
        Ok(offset)
    }

    /// Write raw bytes as a byte-element record.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<u64> {
        self.write_record(bytes.len() as u64, bytes)
    }

    /// Write a numeric array value. Errors for non-array values.
    pub fn write_array(&mut self, value: &SocketValue) -> Result<u64> {
        let (count, bytes) = encode_array(value)?;
        self.write_record(count, &bytes)
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Sink::File(w) = &mut self.sink {
            w.flush()?;
        }
        Ok(())
    }

    /// Contents of an in-memory blob (empty for file blobs).
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self.sink {
            Sink::Memory(v) => Ok(v),
            Sink::File(mut w) => {
                w.flush()?;
                Ok(Vec::new())
            }
        }
    }
}

enum Source {
    #[cfg(feature = "mmap")]
    Mmap(memmap2::Mmap),
    File(File),
    Memory(Cursor<Vec<u8>>),
}

#[cfg(feature = "mmap")]
fn map_source(file: &File, size: u64, use_mmap: bool) -> Result<Option<Source>> {
    if !use_mmap || size == 0 {
        return Ok(None);
    }
    // Safety: the blob is opened read-only and not modified while mapped.
    let map = unsafe { memmap2::Mmap::map(file) }?;
    Ok(Some(Source::Mmap(map)))
}

#[cfg(not(feature = "mmap"))]
fn map_source(_file: &File, _size: u64, _use_mmap: bool) -> Result<Option<Source>> {
    Ok(None)
}

/// Cursor-based blob reader.
pub struct BlobReader {
    source: Source,
    size: u64,
}

impl BlobReader {
    /// Open a blob file, memory-mapped when the `mmap` feature is enabled.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_opts(path, cfg!(feature = "mmap"))
    }

    pub fn open_opts(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::from_open(path, e))?;
        let size = file.metadata()?.len();

        if let Some(source) = map_source(&file, size, use_mmap)? {
            return Ok(Self { source, size });
        }
        Ok(Self { source: Source::File(file), size })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        Self { source: Source::Memory(Cursor::new(bytes)), size }
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    fn read_exact_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<()> {
        let end = pos
            .checked_add(buf.len() as u64)
            .ok_or(Error::UnexpectedEof(u64::MAX))?;
        if end > self.size {
            return Err(Error::UnexpectedEof(end));
        }
        match &mut self.source {
            #[cfg(feature = "mmap")]
            Source::Mmap(map) => buf.copy_from_slice(&map[pos as usize..end as usize]),
            Source::File(f) => {
                f.seek(SeekFrom::Start(pos))?;
                f.read_exact(buf)?;
            }
            Source::Memory(c) => {
                c.seek(SeekFrom::Start(pos))?;
                c.read_exact(buf)?;
            }
        }
        Ok(())
    }

    /// Read the record at `offset`: `(count, count * elem_size bytes)`.
    pub fn read_record(&mut self, offset: u64, elem_size: usize) -> Result<(u64, Vec<u8>)> {
        let mut prefix = [0u8; BLOB_COUNT_SIZE as usize];
        self.read_exact_at(offset, &mut prefix)?;
        let count = (&prefix[..]).read_u64::<LittleEndian>()?;
        let len = count
            .checked_mul(elem_size as u64)
            .filter(|len| *len <= self.size)
            .ok_or_else(|| Error::invalid(format!("blob record at {offset}: count {count} too large")))?;
        let mut data = vec![0u8; len as usize];
        self.read_exact_at(offset + BLOB_COUNT_SIZE, &mut data)?;
        Ok((count, data))
    }

    /// Read a byte-element record.
    pub fn read_bytes(&mut self, offset: u64) -> Result<Vec<u8>> {
        Ok(self.read_record(offset, 1)?.1)
    }

    /// Read a numeric array record of the given socket type.
    pub fn read_array(&mut self, offset: u64, ty: SocketType) -> Result<SocketValue> {
        if !ty.is_numeric_array() {
            return Err(Error::invalid(format!("{ty} is not stored in the blob")));
        }
        let (count, bytes) = self.read_record(offset, ty.element_size())?;
        decode_array(ty, count, &bytes)
    }
}

/// Element count and little-endian bytes of a numeric array value.
pub fn encode_array(value: &SocketValue) -> Result<(u64, Vec<u8>)> {
    let ty = value.socket_type();
    if !ty.is_numeric_array() {
        return Err(Error::invalid(format!("{ty} is not stored in the blob")));
    }
    let mut out = Vec::new();
    let count = match value {
        SocketValue::BoolArray(v) => {
            out.extend(v.iter().map(|b| u8::from(*b)));
            v.len()
        }
        SocketValue::IntArray(v) => {
            for x in v {
                out.write_i32::<LittleEndian>(*x)?;
            }
            v.len()
        }
        SocketValue::FloatArray(v) => {
            for x in v {
                out.write_f32::<LittleEndian>(*x)?;
            }
            v.len()
        }
        SocketValue::Float2Array(v) => {
            for x in v.iter().flat_map(|e| e.to_array()) {
                out.write_f32::<LittleEndian>(x)?;
            }
            v.len()
        }
        SocketValue::Float3Array(v) => {
            for x in v.iter().flat_map(|e| e.to_array()) {
                out.write_f32::<LittleEndian>(x)?;
            }
            v.len()
        }
        SocketValue::TransformArray(v) => {
            for x in v.iter().flat_map(|t| t.to_rows()) {
                out.write_f32::<LittleEndian>(x)?;
            }
            v.len()
        }
        _ => 0,
    };
    Ok((count as u64, out))
}

/// Inverse of [`encode_array`].
pub fn decode_array(ty: SocketType, count: u64, bytes: &[u8]) -> Result<SocketValue> {
    let expected = count as usize * ty.element_size();
    if bytes.len() != expected {
        return Err(Error::UnexpectedEof(bytes.len() as u64));
    }
    let mut rd = bytes;
    let mut floats = |n: usize| -> Result<Vec<f32>> {
        let mut v = vec![0f32; n];
        rd.read_f32_into::<LittleEndian>(&mut v)?;
        Ok(v)
    };
    let n = count as usize;
    let value = match ty {
        SocketType::BooleanArray => SocketValue::BoolArray(bytes.iter().map(|b| *b != 0).collect()),
        SocketType::IntArray => {
            let mut v = vec![0i32; n];
            (&bytes[..]).read_i32_into::<LittleEndian>(&mut v)?;
            SocketValue::IntArray(v)
        }
        SocketType::FloatArray => SocketValue::FloatArray(floats(n)?),
        SocketType::Float2Array => {
            SocketValue::Float2Array(floats(n * 2)?.chunks_exact(2).map(Vec2::from_slice).collect())
        }
        SocketType::Float3Array => {
            SocketValue::Float3Array(floats(n * 3)?.chunks_exact(3).map(Vec3::from_slice).collect())
        }
        SocketType::TransformArray => SocketValue::TransformArray(
            floats(n * 12)?
                .chunks_exact(12)
                .map(|c| {
                    let mut rows = [0.0; 12];
                    rows.copy_from_slice(c);
                    Transform::from_rows(&rows)
                })
                .collect(),
        ),
        _ => return Err(Error::invalid(format!("{ty} is not stored in the blob"))),
    };
    Ok(value)
}
