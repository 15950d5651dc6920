
//! Low level byte stream primitives shared by the EXR attribute, chunk and
//! pixel codec layers: little-endian primitive (de)serialization, a
//! single-byte-of-lookahead reader, and a byte-position-tracking wrapper used
//! to reserve and later back-patch the chunk offset table.

pub use ::std::io::{Read, Write, Seek, SeekFrom};
use half::slice::HalfFloatSliceExt;
use lebe::prelude::*;
use ::half::f16;
use crate::error::{Error, Result, UnitResult, IoResult};

pub fn skip_bytes(read: &mut impl Read, count: u64) -> UnitResult {
    let skipped = std::io::copy(
        &mut read.by_ref().take(count),
        &mut std::io::sink()
    )?;

    debug_assert_eq!(skipped, count);
    Ok(())
}

#[inline]
pub fn positive_i32(value: i32, name: &'static str) -> Result<u32> {
    if value < 0 { Err(Error::invalid(name)) }
    else { Ok(value as u32) }
}

/// Wraps a reader, remembering the single next byte before it is consumed.
/// Used to check for a header's terminating zero byte without consuming it
/// when the terminator has not actually arrived yet.
pub struct PeekRead<T> {
    inner: T,
    peeked: Option<IoResult<u8>>,
}

impl<T: Read> PeekRead<T> {
    pub fn new(inner: T) -> Self {
        Self { inner, peeked: None }
    }

    pub fn peek_u8(&mut self) -> &IoResult<u8> {
        self.peeked = self.peeked.take().or_else(|| Some(u8::read_from_little_endian(&mut self.inner)));
        self.peeked.as_ref().unwrap()
    }

    pub fn skip_if_eq(&mut self, value: u8) -> IoResult<bool> {
        match self.peek_u8() {
            Ok(peeked) if *peeked == value => {
                u8::read_from_little_endian(self).unwrap(); // skip, will be Ok(value)
                Ok(true)
            },

            Ok(_) => Ok(false),
            Err(_) => Err(u8::read_from_little_endian(self).err().unwrap())
        }
    }
}

impl<T: Read> Read for PeekRead<T> {
    fn read(&mut self, target_buffer: &mut [u8]) -> IoResult<usize> {
        if target_buffer.is_empty() {
            return Ok(0)
        }

        match self.peeked.take() {
            None => self.inner.read(target_buffer),
            Some(peeked) => {
                target_buffer[0] = peeked?;
                Ok(1 + self.inner.read(&mut target_buffer[1..])?)
            }
        }
    }
}

impl<T> PeekRead<Tracking<T>> {
    pub fn byte_position(&self) -> usize { self.inner.byte_position() }
}

impl<T: Read + Seek> PeekRead<Tracking<T>> {
    /// Jump to an absolute byte position in the underlying stream, dropping any peeked byte.
    /// Small forward jumps are read-and-discarded instead of seeking, so that non-seekable
    /// forward-only readers (wrapped in a `Tracking` that still happens to implement `Seek`
    /// only nominally) stay cheap for the common sequential-chunk case.
    pub fn skip_to(&mut self, position: usize) -> UnitResult {
        let current = self.byte_position();

        if position >= current && position - current <= 1024 {
            self.peeked = None;
            skip_bytes(&mut self.inner, (position - current) as u64)
        }
        else {
            self.peeked = None;
            self.inner.seek_read_to(position)
        }
    }
}


/// Wraps a reader or writer, counting the number of bytes that have passed
/// through it. On the write side, also supports seeking back to an earlier
/// position (to back-patch the chunk offset table) and resuming the count
/// from there.
pub struct Tracking<T> {
    inner: T,
    position: usize,
}

impl<T> Tracking<T> {
    pub fn new(inner: T) -> Self {
        Self { inner, position: 0 }
    }

    pub fn byte_position(&self) -> usize { self.position }
}

impl<T: Read> Read for Tracking<T> {
    fn read(&mut self, buffer: &mut [u8]) -> IoResult<usize> {
        let count = self.inner.read(buffer)?;
        self.position += count;
        Ok(count)
    }
}

impl<T: Write> Write for Tracking<T> {
    fn write(&mut self, buffer: &[u8]) -> IoResult<usize> {
        let count = self.inner.write(buffer)?;
        self.position += count;
        Ok(count)
    }

    fn flush(&mut self) -> IoResult<()> { self.inner.flush() }
}

impl<T: Write + Seek> Tracking<T> {
    /// Seek to an absolute byte position and resume tracking from there.
    /// Used to jump back into the reserved offset table area and overwrite
    /// placeholder zeroes with the real chunk offsets once they are known.
    pub fn seek_write_to(&mut self, position: usize) -> UnitResult {
        self.inner.seek(SeekFrom::Start(position as u64))?;
        self.position = position;
        Ok(())
    }
}

impl<T: Read + Seek> Tracking<T> {
    /// Seek to an absolute byte position and resume tracking from there.
    /// Used to jump directly to a chunk whose offset is already known, instead
    /// of reading and discarding everything in between.
    pub fn seek_read_to(&mut self, position: usize) -> UnitResult {
        self.inner.seek(SeekFrom::Start(position as u64))?;
        self.position = position;
        Ok(())
    }
}


/// extension trait for primitive types like numbers and arrays
pub trait Data: Sized + Default + Clone {
    #[inline]
    fn read(read: &mut impl Read) -> Result<Self>;

    #[inline]
    fn read_slice(read: &mut impl Read, slice: &mut[Self]) -> UnitResult;

    #[inline]
    fn read_vec(read: &mut impl Read, data_size: usize, estimated_max: usize, hard_max: Option<usize>) -> Result<Vec<Self>> {
        let mut vec = Vec::new();
        Self::read_into_vec(read, &mut vec, data_size, estimated_max, hard_max)?;
        Ok(vec)
    }

    #[inline]
    fn write(self, write: &mut impl Write) -> UnitResult;

    #[inline]
    fn write_slice(write: &mut impl Write, slice: &[Self]) -> UnitResult;

    const BYTE_SIZE: usize = ::std::mem::size_of::<Self>();

    /// Allocates in two stages: up to `estimated_max` elements are allocated
    /// eagerly, anything beyond that is pushed one element at a time so a
    /// corrupted size field cannot trigger a huge single allocation. If
    /// `hard_max` is set and the requested size exceeds it, reading aborts
    /// immediately instead of slowly reading element-by-element.
    #[inline]
    fn read_into_vec(read: &mut impl Read, data: &mut Vec<Self>, data_size: usize, estimated_max: usize, hard_max: Option<usize>) -> UnitResult {
        if let Some(hard_max) = hard_max {
            if data_size > hard_max {
                return Err(Error::corrupt("content size exceeds maximum"))
            }
        }

        let start = data.len();
        let end = start + data_size;
        let max_end = start + estimated_max;

        if data_size <= estimated_max {
            data.resize(end, Self::default());
            Self::read_slice(read, &mut data[start .. end])
        }
        else {
            data.resize(max_end, Self::default());
            Self::read_slice(read, &mut data[start .. max_end])?;

            for _ in estimated_max..data_size {
                data.push(Self::read(read)?);
            }

            Ok(())
        }
    }

    #[inline]
    fn write_i32_sized_slice<W: Write>(write: &mut W, slice: &[Self]) -> UnitResult {
        (slice.len() as i32).write(write)?;
        Self::write_slice(write, slice)
    }

    #[inline]
    fn read_i32_sized_vec(read: &mut impl Read, estimated_max: usize, hard_max: Option<usize>) -> Result<Vec<Self>> {
        let size = i32::read(read)?;

        if size < 0 { Err(Error::corrupt("negative array size")) }
        else { Self::read_vec(read, size as usize, estimated_max, hard_max) }
    }

    /// Read a single value without any endian conversion. Used for the in-memory sample
    /// buffers that pixel codecs (PIZ, B44, DWA) operate on directly; the conversion to the
    /// little-endian wire format happens once, in bulk, at the compressor boundary.
    #[inline]
    fn read_ne(read: &mut impl Read) -> Result<Self>;

    /// Write a single value without any endian conversion. See `read_ne`.
    #[inline]
    fn write_ne(self, write: &mut impl Write) -> UnitResult;

    /// Read a slice of values without any endian conversion. See `read_ne`.
    #[inline]
    fn read_slice_ne(read: &mut impl Read, slice: &mut [Self]) -> UnitResult {
        for element in slice { *element = Self::read_ne(read)?; }
        Ok(())
    }

    /// Write a slice of values without any endian conversion. See `read_ne`.
    #[inline]
    fn write_slice_ne(write: &mut impl Write, slice: &[Self]) -> UnitResult {
        for element in slice { element.clone().write_ne(write)?; }
        Ok(())
    }
}


macro_rules! implement_data_for_primitive {
    ($kind: ident) => {
        impl Data for $kind {
            fn read(read: &mut impl Read) -> Result<Self> {
                Ok(read.read_from_little_endian()?)
            }

            fn write(self, write: &mut impl Write) -> Result<()> {
                write.write_as_little_endian(&self)?;
                Ok(())
            }

            fn read_slice(read: &mut impl Read, slice: &mut [Self]) -> Result<()> {
                read.read_from_little_endian_into(slice)?;
                Ok(())
            }

            fn write_slice(write: &mut impl Write, slice: &[Self]) -> Result<()> {
                write.write_as_little_endian(slice)?;
                Ok(())
            }

            fn read_ne(read: &mut impl Read) -> Result<Self> {
                Ok(read.read_from_native_endian()?)
            }

            fn write_ne(self, write: &mut impl Write) -> Result<()> {
                write.write_as_native_endian(&self)?;
                Ok(())
            }

            fn read_slice_ne(read: &mut impl Read, slice: &mut [Self]) -> Result<()> {
                read.read_from_native_endian_into(slice)?;
                Ok(())
            }

            fn write_slice_ne(write: &mut impl Write, slice: &[Self]) -> Result<()> {
                write.write_as_native_endian(slice)?;
                Ok(())
            }
        }
    };
}

implement_data_for_primitive!(u8);
implement_data_for_primitive!(i8);
implement_data_for_primitive!(i16);
implement_data_for_primitive!(u16);
implement_data_for_primitive!(u32);
implement_data_for_primitive!(i32);
implement_data_for_primitive!(i64);
implement_data_for_primitive!(u64);
implement_data_for_primitive!(f32);
implement_data_for_primitive!(f64);


impl Data for f16 {
    fn read(read: &mut impl Read) -> Result<Self> {
        u16::read(read).map(f16::from_bits)
    }

    fn read_slice(read: &mut impl Read, slice: &mut [Self]) -> Result<()> {
        let bits = slice.reinterpret_cast_mut();
        u16::read_slice(read, bits)
    }

    fn write(self, write: &mut impl Write) -> Result<()> {
        self.to_bits().write(write)
    }

    fn write_slice(write: &mut impl Write, slice: &[Self]) -> Result<()> {
        let bits = slice.reinterpret_cast();
        u16::write_slice(write, bits)
    }

    fn read_ne(read: &mut impl Read) -> Result<Self> {
        u16::read_ne(read).map(f16::from_bits)
    }

    fn read_slice_ne(read: &mut impl Read, slice: &mut [Self]) -> Result<()> {
        let bits = slice.reinterpret_cast_mut();
        u16::read_slice_ne(read, bits)
    }

    fn write_ne(self, write: &mut impl Write) -> Result<()> {
        self.to_bits().write_ne(write)
    }

    fn write_slice_ne(write: &mut impl Write, slice: &[Self]) -> Result<()> {
        let bits = slice.reinterpret_cast();
        u16::write_slice_ne(write, bits)
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn peek(){
        use lebe::prelude::*;
        let buffer: &[u8] = &[0,1,2,3];
        let mut peek = PeekRead::new(buffer);

        assert_eq!(peek.peek_u8().as_ref().unwrap(), &0);
        assert_eq!(peek.peek_u8().as_ref().unwrap(), &0);
        assert_eq!(u8::read_from_little_endian(&mut peek).unwrap(), 0_u8);

        assert_eq!(peek.read(&mut [0,0]).unwrap(), 2);

        assert_eq!(peek.peek_u8().as_ref().unwrap(), &3);
        assert_eq!(u8::read_from_little_endian(&mut peek).unwrap(), 3_u8);

        assert!(peek.peek_u8().is_err());
        assert!(u8::read_from_little_endian(&mut peek).is_err());
    }

    #[test]
    fn tracking_counts_bytes() {
        let mut buffer = Vec::new();
        let mut tracked = Tracking::new(&mut buffer);
        tracked.write_all(&[1, 2, 3]).unwrap();
        assert_eq!(tracked.byte_position(), 3);
    }
}
