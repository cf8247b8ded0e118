//! Shared read/write helpers for index blob headers.

use std::io::{Read, Write};

use crate::error::{Result, XiphosError};

/// Write a UTF-8 string prefixed by its length as u32 little-endian.
pub fn write_string<W: Write>(output: &mut W, value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    output.write_all(&(bytes.len() as u32).to_le_bytes())?;
    output.write_all(bytes)?;
    Ok(())
}

/// Read a length-prefixed UTF-8 string that was written with [`write_string`].
pub fn read_string<R: Read>(input: &mut R) -> Result<String> {
    let mut len_buf = [0u8; 4];
    input.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    input.read_exact(&mut buf)?;
    String::from_utf8(buf)
        .map_err(|e| XiphosError::index(format!("Invalid UTF-8 in index blob header: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_string_roundtrip() {
        let mut buf = Vec::new();
        write_string(&mut buf, "binary_flat").unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_string(&mut cursor).unwrap(), "binary_flat");
    }

    #[test]
    fn test_empty_string_roundtrip() {
        let mut buf = Vec::new();
        write_string(&mut buf, "").unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_string(&mut cursor).unwrap(), "");
    }
}
