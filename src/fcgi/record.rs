//! FastCGI 1.0 records.

use bytes::{BufMut, Bytes, BytesMut};

use crate::fcgi::FcgiError;

pub const VERSION_1: u8 = 1;
pub const HEADER_LEN: usize = 8;
pub const MAX_CONTENT_LEN: usize = 65535;
/// Request id used by management records.
pub const MANAGEMENT_ID: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    BeginRequest,
    AbortRequest,
    EndRequest,
    Params,
    Stdin,
    Stdout,
    Stderr,
    Data,
    GetValues,
    GetValuesResult,
    UnknownType,
    Other(u8),
}

impl From<u8> for RecordType {
    fn from(value: u8) -> Self {
        match value {
            1 => RecordType::BeginRequest,
            2 => RecordType::AbortRequest,
            3 => RecordType::EndRequest,
            4 => RecordType::Params,
            5 => RecordType::Stdin,
            6 => RecordType::Stdout,
            7 => RecordType::Stderr,
            8 => RecordType::Data,
            9 => RecordType::GetValues,
            10 => RecordType::GetValuesResult,
            11 => RecordType::UnknownType,
            other => RecordType::Other(other),
        }
    }
}

impl From<RecordType> for u8 {
    fn from(value: RecordType) -> Self {
        match value {
            RecordType::BeginRequest => 1,
            RecordType::AbortRequest => 2,
            RecordType::EndRequest => 3,
            RecordType::Params => 4,
            RecordType::Stdin => 5,
            RecordType::Stdout => 6,
            RecordType::Stderr => 7,
            RecordType::Data => 8,
            RecordType::GetValues => 9,
            RecordType::GetValuesResult => 10,
            RecordType::UnknownType => 11,
            RecordType::Other(other) => other,
        }
    }
}

/// `protocolStatus` of an `FCGI_END_REQUEST` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProtocolStatus {
    RequestComplete = 0,
    CantMpxConn = 1,
    Overloaded = 2,
    UnknownRole = 3,
}

/// One record: header fields plus content. Padding never leaves the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub record_type: RecordType,
    pub request_id: u16,
    pub content: Bytes,
}

impl Record {
    pub fn new(record_type: RecordType, request_id: u16, content: impl Into<Bytes>) -> Self {
        Self {
            record_type,
            request_id,
            content: content.into(),
        }
    }

    pub fn end_request(request_id: u16, app_status: u32, status: ProtocolStatus) -> Self {
        let mut content = BytesMut::with_capacity(8);
        content.put_u32(app_status);
        content.put_u8(status as u8);
        content.put_bytes(0, 3);
        Self::new(RecordType::EndRequest, request_id, content.freeze())
    }

    pub fn unknown_type(record_type: u8) -> Self {
        let mut content = BytesMut::with_capacity(8);
        content.put_u8(record_type);
        content.put_bytes(0, 7);
        Self::new(RecordType::UnknownType, MANAGEMENT_ID, content.freeze())
    }

    /// Split `data` into as many records of `record_type` as needed.
    pub fn chunked(record_type: RecordType, request_id: u16, mut data: Bytes) -> impl Iterator<Item = Record> {
        std::iter::from_fn(move || {
            if data.is_empty() {
                return None;
            }
            let n = data.len().min(MAX_CONTENT_LEN);
            Some(Record::new(record_type, request_id, data.split_to(n)))
        })
    }
}

/// Body of an `FCGI_BEGIN_REQUEST` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeginRequest {
    pub role: u16,
    pub flags: u8,
}

impl BeginRequest {
    pub const RESPONDER: u16 = 1;
    pub const AUTHORIZER: u16 = 2;
    pub const FILTER: u16 = 3;
    pub const KEEP_CONN: u8 = 1;

    pub fn parse(content: &[u8]) -> Result<Self, FcgiError> {
        if content.len() < 8 {
            return Err(FcgiError::Malformed("FCGI_BEGIN_REQUEST"));
        }
        Ok(Self {
            role: u16::from_be_bytes([content[0], content[1]]),
            flags: content[2],
        })
    }

    pub fn keep_conn(&self) -> bool {
        self.flags & Self::KEEP_CONN != 0
    }

    pub fn encode(&self) -> Bytes {
        let mut content = BytesMut::with_capacity(8);
        content.put_u16(self.role);
        content.put_u8(self.flags);
        content.put_bytes(0, 5);
        content.freeze()
    }
}

/// Body of an `FCGI_END_REQUEST` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndRequest {
    pub app_status: u32,
    pub protocol_status: u8,
}

impl EndRequest {
    pub fn parse(content: &[u8]) -> Result<Self, FcgiError> {
        if content.len() < 8 {
            return Err(FcgiError::Malformed("FCGI_END_REQUEST"));
        }
        Ok(Self {
            app_status: u32::from_be_bytes([content[0], content[1], content[2], content[3]]),
            protocol_status: content[4],
        })
    }
}
