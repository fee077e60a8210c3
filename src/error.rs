use thiserror::Error;

use crate::dict::Namespace;

pub type Result<T> = std::result::Result<T, DecodeError>;

/// Everything that can go wrong while decoding a record or resolving names
/// against the header.
///
/// Malformations encountered *after* a record's fixed header has been read do
/// not surface as `Err` from `Record::decode`; they set the record's error
/// code instead, so the caller keeps whatever was decoded up to that point.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("truncated value: buffer ends inside a typed value")]
    TruncatedValue,
    #[error("record too short: {needed} bytes needed, {available} available")]
    RecordTooShort { needed: usize, available: usize },
    #[error("unknown {namespace} id {id}")]
    UnknownId { namespace: Namespace, id: usize },
    #[error("{namespace} field {name:?} is not declared in the header")]
    UnknownField { namespace: Namespace, name: String },
    #[error("field {name:?} is not present in this record")]
    FieldNotPresent { name: String },
    #[error("record has no FILTER entries")]
    NoFilterSet,
    #[error("reserved type tag {0:#x}")]
    ReservedTag(u8),
    #[error("invalid type descriptor: {0}")]
    BadDescriptor(&'static str),
    #[error("malformed header: {0}")]
    BadHeader(String),
    #[error("not a BCF stream (bad magic bytes)")]
    BadMagic,
    #[error("unsupported BCF version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },
    #[error("cannot encode record: {0}")]
    Encode(&'static str),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Decompress(#[from] niffler::Error),
}
