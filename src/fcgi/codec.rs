//! Record framing on top of `tokio_util::codec`.
//!
//! ```text
//! version(1) type(1) requestId(2) contentLength(2) paddingLength(1) reserved(1)
//! content[contentLength] padding[paddingLength]
//! ```

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::fcgi::record::{Record, RecordType, HEADER_LEN, MAX_CONTENT_LEN, VERSION_1};
use crate::fcgi::FcgiError;

/// Encodes and decodes FastCGI records. Outgoing content is padded to a
/// multiple of 8 bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordCodec;

impl Decoder for RecordCodec {
    type Item = Record;
    type Error = FcgiError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Record>, FcgiError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let version = src[0];
        if version != VERSION_1 {
            return Err(FcgiError::Version(version));
        }
        let record_type = RecordType::from(src[1]);
        let request_id = u16::from_be_bytes([src[2], src[3]]);
        let content_len = u16::from_be_bytes([src[4], src[5]]) as usize;
        let padding_len = src[6] as usize;

        let total = HEADER_LEN + content_len + padding_len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let content = src.split_to(content_len).freeze();
        src.advance(padding_len);

        Ok(Some(Record {
            record_type,
            request_id,
            content,
        }))
    }
}

impl Encoder<Record> for RecordCodec {
    type Error = FcgiError;

    fn encode(&mut self, record: Record, dst: &mut BytesMut) -> Result<(), FcgiError> {
        let content_len = record.content.len();
        if content_len > MAX_CONTENT_LEN {
            return Err(FcgiError::ContentTooLong(content_len));
        }
        let padding_len = (8 - content_len % 8) % 8;

        dst.reserve(HEADER_LEN + content_len + padding_len);
        dst.put_u8(VERSION_1);
        dst.put_u8(record.record_type.into());
        dst.put_u16(record.request_id);
        dst.put_u16(content_len as u16);
        dst.put_u8(padding_len as u8);
        dst.put_u8(0);
        dst.put_slice(&record.content);
        dst.put_bytes(0, padding_len);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn encode_pads_to_eight_bytes() {
        let mut buf = BytesMut::new();
        RecordCodec
            .encode(Record::new(RecordType::Stdout, 1, "hello"), &mut buf)
            .unwrap();

        assert_eq!(&buf[..8], &[1, 6, 0, 1, 0, 5, 3, 0]);
        assert_eq!(&buf[8..13], b"hello");
        assert_eq!(buf.len(), 16);
    }

    #[test]
    fn decode_waits_for_complete_record() {
        let mut full = BytesMut::new();
        RecordCodec
            .encode(Record::new(RecordType::Params, 3, "abc"), &mut full)
            .unwrap();

        let mut partial = BytesMut::from(&full[..10]);
        assert_eq!(RecordCodec.decode(&mut partial).unwrap(), None);

        partial.extend_from_slice(&full[10..]);
        let record = RecordCodec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(record.record_type, RecordType::Params);
        assert_eq!(record.request_id, 3);
        assert_eq!(record.content, Bytes::from_static(b"abc"));
        assert!(partial.is_empty());
    }

    #[test]
    fn decode_skips_foreign_padding() {
        // content "ab" with 6 bytes of padding, followed by an empty record
        let mut buf = BytesMut::from(&[1u8, 5, 0, 9, 0, 2, 6, 0][..]);
        buf.extend_from_slice(b"ab");
        buf.extend_from_slice(&[0xff; 6]);
        buf.extend_from_slice(&[1, 5, 0, 9, 0, 0, 0, 0]);

        let first = RecordCodec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.content, Bytes::from_static(b"ab"));
        let second = RecordCodec.decode(&mut buf).unwrap().unwrap();
        assert!(second.content.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn bad_version_is_rejected() {
        let mut buf = BytesMut::from(&[2u8, 1, 0, 1, 0, 0, 0, 0][..]);
        assert!(matches!(
            RecordCodec.decode(&mut buf),
            Err(FcgiError::Version(2))
        ));
    }

    #[test]
    fn oversized_content_is_rejected() {
        let mut buf = BytesMut::new();
        let record = Record::new(RecordType::Stdout, 1, vec![0u8; MAX_CONTENT_LEN + 1]);
        assert!(matches!(
            RecordCodec.encode(record, &mut buf),
            Err(FcgiError::ContentTooLong(_))
        ));
    }
}
