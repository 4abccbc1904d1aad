//! Primitive little-endian codec for a [`DataTemplate`](crate::data_template::DataTemplate)'s
//! byte blob.

use std::io::{Cursor, Read, Write};

use crate::error::{Result, TemplateError};

/// Types that can be read from the little-endian byte blob.
pub trait FromByteStream: Sized {
	fn read(stream: &mut Cursor<&[u8]>) -> Result<Self>;
}

/// Types that can be appended to the little-endian byte blob.
pub trait ToByteStream {
	fn write(&self, out: &mut Vec<u8>);
}

macro_rules! impl_byte_stream_for_le_int {
	($($ty: ty),*) => {$(
		impl FromByteStream for $ty {
			#[inline]
			fn read(stream: &mut Cursor<&[u8]>) -> Result<Self> {
				let mut buf = [0u8; std::mem::size_of::<$ty>()];
				stream.read_exact(&mut buf).map_err(|_| TemplateError::UnexpectedEndOfData)?;
				Ok(<$ty>::from_le_bytes(buf))
			}
		}

		impl ToByteStream for $ty {
			#[inline]
			fn write(&self, out: &mut Vec<u8>) {
				out.extend_from_slice(&self.to_le_bytes());
			}
		}
	)*};
}

impl_byte_stream_for_le_int!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl FromByteStream for bool {
	#[inline]
	fn read(stream: &mut Cursor<&[u8]>) -> Result<Self> {
		Ok(u8::read(stream)? != 0)
	}
}

impl ToByteStream for bool {
	#[inline]
	fn write(&self, out: &mut Vec<u8>) {
		(*self as u8).write(out);
	}
}

/// Strings are length-prefixed (`u16` byte count, little-endian) followed by
/// raw UTF-8 bytes, with no padding or null terminator.
pub fn write_string(out: &mut Vec<u8>, value: &str) {
	assert!(value.len() <= u16::MAX as usize, "string exceeds the 16-bit length prefix");
	(value.len() as u16).write(out);
	out.extend_from_slice(value.as_bytes());
}

pub fn read_string(stream: &mut Cursor<&[u8]>) -> Result<String> {
	let len = u16::read(stream)? as usize;
	let mut buf = vec![0u8; len];
	stream.read_exact(&mut buf).map_err(|_| TemplateError::UnexpectedEndOfData)?;
	String::from_utf8(buf).map_err(|_| TemplateError::InvalidUtf8)
}

/// Writes a blob of already-encoded bytes verbatim. Used by save to splice
/// an untouched subtree's byte range during a merge/diff copy.
pub fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
	out.extend_from_slice(bytes);
}

/// A write cursor over an in-progress byte blob, tracking the current
/// offset so callers can stamp it into a [`Tag`](crate::tag::Tag)'s
/// `data_offset` field.
#[derive(Default)]
pub struct ByteWriter {
	pub buf: Vec<u8>,
}

impl ByteWriter {
	pub fn offset(&self) -> usize {
		self.buf.len()
	}

	pub fn write<T: ToByteStream>(&mut self, value: &T) {
		value.write(&mut self.buf);
	}

	pub fn write_string(&mut self, value: &str) {
		write_string(&mut self.buf, value);
	}
}

impl Write for ByteWriter {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		self.buf.write(buf)
	}

	fn flush(&mut self) -> std::io::Result<()> {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn integers_round_trip() {
		let mut out = Vec::new();
		42i32.write(&mut out);
		let mut cursor = Cursor::new(out.as_slice());
		assert_eq!(i32::read(&mut cursor).unwrap(), 42);
	}

	#[test]
	fn strings_round_trip() {
		let mut out = Vec::new();
		write_string(&mut out, "héllo");
		let mut cursor = Cursor::new(out.as_slice());
		assert_eq!(read_string(&mut cursor).unwrap(), "héllo");
	}

	#[test]
	fn truncated_stream_is_an_error() {
		let out = vec![1u8, 2];
		let mut cursor = Cursor::new(out.as_slice());
		assert!(matches!(u32::read(&mut cursor), Err(TemplateError::UnexpectedEndOfData)));
	}
}
