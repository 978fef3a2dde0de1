//! Name-value pairs carried by `FCGI_PARAMS` and `FCGI_GET_VALUES`.
//!
//! Each length is one byte when below 128, otherwise four bytes big-endian
//! with the high bit set.

use std::collections::HashMap;

use bytes::{BufMut, Bytes, BytesMut};

use crate::fcgi::FcgiError;

/// Decode a complete params stream. Later duplicates win.
pub fn decode(mut buf: &[u8]) -> Result<HashMap<String, String>, FcgiError> {
    let mut params = HashMap::new();
    while !buf.is_empty() {
        let name_len = read_len(&mut buf)?;
        let value_len = read_len(&mut buf)?;
        if buf.len() < name_len + value_len {
            return Err(FcgiError::Params);
        }
        let name = String::from_utf8_lossy(&buf[..name_len]).into_owned();
        let value = String::from_utf8_lossy(&buf[name_len..name_len + value_len]).into_owned();
        buf = &buf[name_len + value_len..];
        params.insert(name, value);
    }
    Ok(params)
}

/// Encode pairs in iteration order.
pub fn encode<K, V, I>(pairs: I) -> Bytes
where
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
    I: IntoIterator<Item = (K, V)>,
{
    let mut buf = BytesMut::new();
    for (name, value) in pairs {
        let (name, value) = (name.as_ref(), value.as_ref());
        put_len(&mut buf, name.len());
        put_len(&mut buf, value.len());
        buf.put_slice(name);
        buf.put_slice(value);
    }
    buf.freeze()
}

fn read_len(buf: &mut &[u8]) -> Result<usize, FcgiError> {
    let first = *buf.first().ok_or(FcgiError::Params)?;
    if first & 0x80 == 0 {
        *buf = &buf[1..];
        return Ok(first as usize);
    }
    if buf.len() < 4 {
        return Err(FcgiError::Params);
    }
    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) & 0x7fff_ffff;
    *buf = &buf[4..];
    Ok(len as usize)
}

fn put_len(buf: &mut BytesMut, len: usize) {
    if len < 128 {
        buf.put_u8(len as u8);
    } else {
        buf.put_u32(len as u32 | 0x8000_0000);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_and_long_lengths() {
        let long_value = "v".repeat(300);
        let encoded = encode([("REQUEST_METHOD", "GET"), ("HTTP_COOKIE", long_value.as_str())]);

        // 1-byte lengths for the first pair
        assert_eq!(&encoded[..2], &[14, 3]);

        let params = decode(&encoded).unwrap();
        assert_eq!(params["REQUEST_METHOD"], "GET");
        assert_eq!(params["HTTP_COOKIE"].len(), 300);
    }

    #[test]
    fn four_byte_length_has_high_bit() {
        let value = "x".repeat(128);
        let encoded = encode([("K", value.as_str())]);
        assert_eq!(&encoded[..5], &[1, 0x80, 0, 0, 128]);
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let encoded = encode([("SCRIPT_NAME", "/index")]);
        assert!(decode(&encoded[..encoded.len() - 1]).is_err());
        assert!(decode(&[0x80, 0]).is_err());
    }

    #[test]
    fn empty_value() {
        let params = decode(&encode([("QUERY_STRING", "")])).unwrap();
        assert_eq!(params["QUERY_STRING"], "");
    }
}
