//! Encoder for the record wire layout, byte-symmetric with [`crate::parser`].
//!
//! Encoding is canonical: scalar integers and integer vectors take the
//! smallest width whose non-reserved range holds every value, and vector
//! counts below 15 use the packed descriptor form. Decoding followed by
//! re-encoding reproduces the input bytes for canonically encoded records.

use crate::error::{DecodeError, Result};
use crate::header::Header;
use crate::record::Record;
use crate::types::{
    TypeKind, TypedValue, END_OF_VECTOR_FLOAT, END_OF_VECTOR_INT16, END_OF_VECTOR_INT32,
    END_OF_VECTOR_INT8, MAGIC, VERSION_MAJOR, VERSION_MINOR,
};

pub fn put_u8(out: &mut Vec<u8>, v: u8) {
    out.push(v);
}

pub fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_u24(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes()[..3]);
}

pub fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_f32(out: &mut Vec<u8>, v: f32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_type_descriptor(out: &mut Vec<u8>, kind: TypeKind, len: usize) {
    if len < 15 {
        out.push(((len as u8) << 4) | kind as u8);
    } else {
        out.push(0xf0 | kind as u8);
        put_typed_int(out, len as i32);
    }
}

/// Scalar integer in the smallest width whose non-reserved range holds it.
pub fn put_typed_int(out: &mut Vec<u8>, v: i32) {
    if fits_i8(v) {
        put_type_descriptor(out, TypeKind::Int8, 1);
        out.push(v as i8 as u8);
    } else if fits_i16(v) {
        put_type_descriptor(out, TypeKind::Int16, 1);
        out.extend_from_slice(&(v as i16).to_le_bytes());
    } else {
        put_type_descriptor(out, TypeKind::Int32, 1);
        out.extend_from_slice(&v.to_le_bytes());
    }
}

// the low 8 values of each width's negative extreme are reserved
fn fits_i8(v: i32) -> bool {
    (i8::MIN as i32 + 8..=i8::MAX as i32).contains(&v)
}

fn fits_i16(v: i32) -> bool {
    (i16::MIN as i32 + 8..=i16::MAX as i32).contains(&v)
}

pub fn put_typed_ints(out: &mut Vec<u8>, values: &[i32]) {
    if values.is_empty() {
        put_type_descriptor(out, TypeKind::Missing, 0);
        return;
    }
    if values.iter().all(|&v| fits_i8(v)) {
        put_type_descriptor(out, TypeKind::Int8, values.len());
        out.extend(values.iter().map(|&v| v as i8 as u8));
    } else if values.iter().all(|&v| fits_i16(v)) {
        put_type_descriptor(out, TypeKind::Int16, values.len());
        for &v in values {
            out.extend_from_slice(&(v as i16).to_le_bytes());
        }
    } else {
        put_type_descriptor(out, TypeKind::Int32, values.len());
        for &v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
}

pub fn put_typed_string(out: &mut Vec<u8>, s: &str) {
    put_type_descriptor(out, TypeKind::String, s.len());
    out.extend_from_slice(s.as_bytes());
}

pub fn put_typed_value(out: &mut Vec<u8>, value: &TypedValue) {
    put_type_descriptor(out, value_kind(value), value.len());
    put_payload(out, value);
}

fn value_kind(value: &TypedValue) -> TypeKind {
    match value {
        TypedValue::Missing => TypeKind::Missing,
        TypedValue::Int8(_) => TypeKind::Int8,
        TypedValue::Int16(_) => TypeKind::Int16,
        TypedValue::Int32(_) => TypeKind::Int32,
        TypedValue::Float32(_) => TypeKind::Float32,
        TypedValue::String(_) => TypeKind::String,
    }
}

fn put_payload(out: &mut Vec<u8>, value: &TypedValue) {
    match value {
        TypedValue::Missing => {}
        TypedValue::Int8(v) => out.extend(v.iter().map(|&x| x as u8)),
        TypedValue::Int16(v) => {
            for x in v {
                out.extend_from_slice(&x.to_le_bytes());
            }
        }
        TypedValue::Int32(v) => {
            for x in v {
                out.extend_from_slice(&x.to_le_bytes());
            }
        }
        TypedValue::Float32(v) => {
            for x in v {
                out.extend_from_slice(&x.to_le_bytes());
            }
        }
        TypedValue::String(s) => out.extend_from_slice(s.as_bytes()),
    }
}

/// Payload padded to `len` elements with the end-of-vector sentinel of the
/// value's width (NUL bytes for strings), for per-sample blocks that share
/// one descriptor.
fn put_payload_padded(out: &mut Vec<u8>, value: &TypedValue, len: usize) -> Result<()> {
    if value.len() > len {
        return Err(DecodeError::Encode("FORMAT value longer than its block"));
    }
    let pad = len - value.len();
    put_payload(out, value);
    match value {
        TypedValue::Missing => {
            if len > 0 {
                return Err(DecodeError::Encode(
                    "missing FORMAT value in a sized block",
                ));
            }
        }
        TypedValue::Int8(_) => out.extend(std::iter::repeat(END_OF_VECTOR_INT8 as u8).take(pad)),
        TypedValue::Int16(_) => {
            for _ in 0..pad {
                out.extend_from_slice(&END_OF_VECTOR_INT16.to_le_bytes());
            }
        }
        TypedValue::Int32(_) => {
            for _ in 0..pad {
                out.extend_from_slice(&END_OF_VECTOR_INT32.to_le_bytes());
            }
        }
        TypedValue::Float32(_) => {
            for _ in 0..pad {
                out.extend_from_slice(&END_OF_VECTOR_FLOAT.to_le_bytes());
            }
        }
        TypedValue::String(_) => out.extend(std::iter::repeat(0u8).take(pad)),
    }
    Ok(())
}

/// Encodes one record: length prefix, fixed header, shared tail, per-sample
/// region. Inverse of [`crate::Record::decode`].
pub fn encode(record: &Record) -> Result<Vec<u8>> {
    let mut shared = Vec::new();
    put_i32(&mut shared, record.contig_id as i32);
    put_i32(&mut shared, record.pos as i32);
    put_i32(&mut shared, record.rlen as i32);
    put_f32(&mut shared, record.qual);
    put_u16(&mut shared, record.info.len() as u16);
    put_u16(&mut shared, record.alleles.len() as u16);
    put_u24(&mut shared, record.samples.len() as u32);
    let fmt_keys: Vec<usize> = record
        .samples
        .first()
        .map(|sample| sample.keys().copied().collect())
        .unwrap_or_default();
    put_u8(&mut shared, fmt_keys.len() as u8);

    put_typed_string(&mut shared, record.id.as_deref().unwrap_or(""));
    for allele in &record.alleles {
        put_typed_string(&mut shared, allele);
    }
    let filter_ids: Vec<i32> = record.filters.iter().map(|&id| id as i32).collect();
    put_typed_ints(&mut shared, &filter_ids);
    for (key, value) in &record.info {
        put_typed_int(&mut shared, *key as i32);
        put_typed_value(&mut shared, value);
    }

    let mut indiv = Vec::new();
    for key in &fmt_keys {
        put_typed_int(&mut indiv, *key as i32);
        let values: Vec<&TypedValue> = record
            .samples
            .iter()
            .map(|sample| {
                sample
                    .get(key)
                    .ok_or(DecodeError::Encode("FORMAT key missing for a sample"))
            })
            .collect::<Result<_>>()?;
        let kind = value_kind(values[0]);
        if values.iter().any(|&v| value_kind(v) != kind) {
            return Err(DecodeError::Encode(
                "inconsistent FORMAT value kinds across samples",
            ));
        }
        let len = values.iter().map(|v| v.len()).max().unwrap_or(0);
        put_type_descriptor(&mut indiv, kind, len);
        for value in values {
            put_payload_padded(&mut indiv, value, len)?;
        }
    }

    let mut out = Vec::with_capacity(8 + shared.len() + indiv.len());
    put_u32(&mut out, shared.len() as u32);
    put_u32(&mut out, indiv.len() as u32);
    out.extend_from_slice(&shared);
    out.extend_from_slice(&indiv);
    Ok(out)
}

/// Stream preamble: magic, version, and the length-prefixed header text.
pub fn put_stream_header(out: &mut Vec<u8>, header: &Header) {
    out.extend_from_slice(MAGIC);
    out.push(VERSION_MAJOR);
    out.push(VERSION_MINOR);
    let mut text = header.to_text().into_bytes();
    text.push(0);
    put_u32(out, text.len() as u32);
    out.extend_from_slice(&text);
}
