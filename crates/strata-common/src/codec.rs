//! Little-endian primitive encoders shared by every binary record
//!
//! All multi-byte integers are written with `to_le_bytes` and read back with
//! `from_le_bytes`. Strings are a `u32` byte length followed by UTF-8 bytes.

use crate::{CommonError, CommonResult};
use std::io::{Read, Write};

/// Upper bound accepted for any single length prefix
pub const MAX_ENCODED_LEN: u64 = 1 << 28;

/// Write a single byte
pub fn write_u8(writer: &mut impl Write, value: u8) -> std::io::Result<()> {
    writer.write_all(&[value])
}

/// Write a little-endian u16
pub fn write_u16(writer: &mut impl Write, value: u16) -> std::io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Write a little-endian u32
pub fn write_u32(writer: &mut impl Write, value: u32) -> std::io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Write a little-endian u64
pub fn write_u64(writer: &mut impl Write, value: u64) -> std::io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Write a little-endian i16
pub fn write_i16(writer: &mut impl Write, value: i16) -> std::io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Write a little-endian i64
pub fn write_i64(writer: &mut impl Write, value: i64) -> std::io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Write a little-endian f64
pub fn write_f64(writer: &mut impl Write, value: f64) -> std::io::Result<()> {
    writer.write_all(&value.to_bits().to_le_bytes())
}

/// Write a length-prefixed UTF-8 string
pub fn write_str(writer: &mut impl Write, value: &str) -> std::io::Result<()> {
    write_u32(writer, value.len() as u32)?;
    writer.write_all(value.as_bytes())
}

/// Read a single byte
pub fn read_u8(reader: &mut impl Read) -> std::io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u16
pub fn read_u16(reader: &mut impl Read) -> std::io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

/// Read a little-endian u32
pub fn read_u32(reader: &mut impl Read) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64
pub fn read_u64(reader: &mut impl Read) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a little-endian i16
pub fn read_i16(reader: &mut impl Read) -> std::io::Result<i16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(i16::from_le_bytes(buf))
}

/// Read a little-endian i64
pub fn read_i64(reader: &mut impl Read) -> std::io::Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

/// Read a little-endian f64
pub fn read_f64(reader: &mut impl Read) -> std::io::Result<f64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(f64::from_bits(u64::from_le_bytes(buf)))
}

/// Read a length prefix, rejecting lengths above [`MAX_ENCODED_LEN`]
pub fn read_len(reader: &mut impl Read) -> CommonResult<usize> {
    let len = read_u32(reader)? as u64;
    if len > MAX_ENCODED_LEN {
        return Err(CommonError::LengthOverflow(len));
    }
    Ok(len as usize)
}

/// Read a length-prefixed UTF-8 string
pub fn read_string(reader: &mut impl Read) -> CommonResult<String> {
    let len = read_len(reader)?;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| CommonError::InvalidUtf8)
}
