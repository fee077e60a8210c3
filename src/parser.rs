//! Binary codec for the per-record wire layout.
//!
//! Everything here is a pure function of a byte slice: no I/O, no
//! cross-record state. Every multi-byte read is bounds-checked before it
//! happens; running out of bytes is [`DecodeError::TruncatedValue`].

use std::convert::TryFrom;

use indexmap::IndexMap;
use log::warn;

use crate::error::{DecodeError, Result};
use crate::header::SharedHeader;
use crate::record::{Record, ERR_ALLELE, ERR_FORMAT, ERR_TAG, ERR_TRUNCATED};
use crate::types::{TypeDescriptor, TypeKind, TypedValue};

/// Record length prefix: `l_shared` and `l_indiv`, both `u32`.
pub(crate) const PREFIX_LEN: usize = 8;
/// Fixed fields at the start of the shared region:
/// `contig_id: i32`, `pos: i32`, `rlen: i32`, `qual: f32`,
/// `n_info: u16`, `n_allele: u16`, `n_sample: u24`, `n_fmt: u8`.
pub(crate) const FIXED_LEN: usize = 24;

macro_rules! le_number {
    ($name:ident, $parser:ident, $ty:ty) => {
        pub(crate) fn $name(input: &[u8]) -> Result<(&[u8], $ty)> {
            nom::number::complete::$parser::<&[u8], nom::error::Error<&[u8]>>(input)
                .map_err(|_| DecodeError::TruncatedValue)
        }
    };
}

le_number!(u8_le, le_u8, u8);
le_number!(i8_le, le_i8, i8);
le_number!(u16_le, le_u16, u16);
le_number!(i16_le, le_i16, i16);
le_number!(u24_le, le_u24, u32);
le_number!(u32_le, le_u32, u32);
le_number!(i32_le, le_i32, i32);
le_number!(f32_le, le_f32, f32);

fn take_bytes(input: &[u8], count: usize) -> Result<(&[u8], &[u8])> {
    if input.len() < count {
        return Err(DecodeError::TruncatedValue);
    }
    Ok((&input[count..], &input[..count]))
}

/// Reads one type descriptor byte, following the long form when the packed
/// count is 15.
pub(crate) fn type_descriptor(input: &[u8]) -> Result<(&[u8], TypeDescriptor)> {
    let (input, byte) = u8_le(input)?;
    let kind =
        TypeKind::try_from(byte & 0x0f).map_err(|_| DecodeError::ReservedTag(byte & 0x0f))?;
    let packed = (byte >> 4) as usize;
    if packed == 15 {
        let (input, num_elements) = typed_int(input)?;
        if num_elements < 0 {
            return Err(DecodeError::BadDescriptor("negative vector length"));
        }
        Ok((
            input,
            TypeDescriptor {
                kind,
                num_elements: num_elements as usize,
            },
        ))
    } else {
        Ok((
            input,
            TypeDescriptor {
                kind,
                num_elements: packed,
            },
        ))
    }
}

/// A self-describing scalar integer (dictionary keys, long-form lengths).
/// The packed count nibble must be exactly 1; a scalar never takes the long
/// count form, so the descriptor here is always a single byte.
pub(crate) fn typed_int(input: &[u8]) -> Result<(&[u8], i32)> {
    let (input, byte) = u8_le(input)?;
    let kind =
        TypeKind::try_from(byte & 0x0f).map_err(|_| DecodeError::ReservedTag(byte & 0x0f))?;
    if byte >> 4 != 1 {
        return Err(DecodeError::BadDescriptor("expected a scalar integer"));
    }
    match kind {
        TypeKind::Int8 => {
            let (input, v) = i8_le(input)?;
            Ok((input, v as i32))
        }
        TypeKind::Int16 => {
            let (input, v) = i16_le(input)?;
            Ok((input, v as i32))
        }
        TypeKind::Int32 => i32_le(input),
        _ => Err(DecodeError::BadDescriptor("expected an integer kind")),
    }
}

/// A self-describing string. `Missing` decodes as the empty string.
pub(crate) fn typed_string(input: &[u8]) -> Result<(&[u8], String)> {
    let (input, td) = type_descriptor(input)?;
    match td.kind {
        TypeKind::Missing => Ok((input, String::new())),
        TypeKind::String => {
            let (input, raw) = take_bytes(input, td.num_elements)?;
            Ok((input, String::from_utf8_lossy(raw).into_owned()))
        }
        _ => Err(DecodeError::BadDescriptor("expected a string value")),
    }
}

/// A self-describing integer vector, widened to `i32` (filter id lists).
pub(crate) fn typed_ints(input: &[u8]) -> Result<(&[u8], Vec<i32>)> {
    let (input, td) = type_descriptor(input)?;
    match value_payload(input, td)? {
        (input, TypedValue::Missing) => Ok((input, vec![])),
        (input, TypedValue::Int8(v)) => Ok((input, v.into_iter().map(i32::from).collect())),
        (input, TypedValue::Int16(v)) => Ok((input, v.into_iter().map(i32::from).collect())),
        (input, TypedValue::Int32(v)) => Ok((input, v)),
        _ => Err(DecodeError::BadDescriptor("expected an integer vector")),
    }
}

/// One self-describing typed value: descriptor plus payload.
pub(crate) fn typed_value(input: &[u8]) -> Result<(&[u8], TypedValue)> {
    let (input, td) = type_descriptor(input)?;
    value_payload(input, td)
}

/// Payload decode for an already-read descriptor. Split out because the
/// per-sample region shares one descriptor across all samples.
pub(crate) fn value_payload(
    input: &[u8],
    td: TypeDescriptor,
) -> Result<(&[u8], TypedValue)> {
    let n = td.num_elements;
    let width = |w: usize| n.checked_mul(w).ok_or(DecodeError::TruncatedValue);
    match td.kind {
        TypeKind::Missing => Ok((input, TypedValue::Missing)),
        TypeKind::Int8 => {
            let (input, raw) = take_bytes(input, width(1)?)?;
            Ok((input, TypedValue::Int8(raw.iter().map(|&b| b as i8).collect())))
        }
        TypeKind::Int16 => {
            let (input, raw) = take_bytes(input, width(2)?)?;
            let values = raw
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]))
                .collect();
            Ok((input, TypedValue::Int16(values)))
        }
        TypeKind::Int32 => {
            let (input, raw) = take_bytes(input, width(4)?)?;
            let values = raw
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            Ok((input, TypedValue::Int32(values)))
        }
        TypeKind::Float32 => {
            let (input, raw) = take_bytes(input, width(4)?)?;
            let values = raw
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            Ok((input, TypedValue::Float32(values)))
        }
        TypeKind::String => {
            let (input, raw) = take_bytes(input, n)?;
            Ok((
                input,
                TypedValue::String(String::from_utf8_lossy(raw).into_owned()),
            ))
        }
    }
}

/// Decodes one record from `input`, which must start at the record's length
/// prefix. The buffer may extend past the record; the declared lengths bound
/// all further reads.
///
/// Fails hard (`RecordTooShort`) only when the length prefix and fixed
/// header cannot be read in full. Later malformations set the record's
/// error code and leave everything decoded so far in place.
pub(crate) fn record(input: &[u8], header: SharedHeader) -> Result<Record> {
    let available = input.len();
    if available < PREFIX_LEN + FIXED_LEN {
        return Err(DecodeError::RecordTooShort {
            needed: PREFIX_LEN + FIXED_LEN,
            available,
        });
    }
    let (rest, l_shared) = u32_le(input)?;
    let (_, l_indiv) = u32_le(rest)?;
    let l_shared = l_shared as usize;
    let l_indiv = l_indiv as usize;
    let total = PREFIX_LEN + l_shared + l_indiv;
    if l_shared < FIXED_LEN || total > available {
        return Err(DecodeError::RecordTooShort {
            needed: total.max(PREFIX_LEN + FIXED_LEN),
            available,
        });
    }
    let shared = &input[PREFIX_LEN..PREFIX_LEN + l_shared];
    let indiv = &input[PREFIX_LEN + l_shared..total];

    let (shared, contig_id) = i32_le(shared)?;
    let (shared, pos) = i32_le(shared)?;
    let (shared, rlen) = i32_le(shared)?;
    let (shared, qual) = f32_le(shared)?;
    let (shared, n_info) = u16_le(shared)?;
    let (shared, n_allele) = u16_le(shared)?;
    let (shared, n_sample) = u24_le(shared)?;
    let (shared, n_fmt) = u8_le(shared)?;

    let mut record = Record {
        contig_id: contig_id as u32,
        pos: pos as u32,
        rlen: rlen as u32,
        qual,
        id: None,
        alleles: Vec::with_capacity(n_allele as usize),
        filters: vec![],
        info: IndexMap::with_capacity(n_info as usize),
        samples: vec![IndexMap::with_capacity(n_fmt as usize); n_sample as usize],
        error_code: 0,
        header,
    };

    if n_allele == 0 {
        record.error_code |= ERR_ALLELE;
    }
    if let Err(e) = decode_shared(shared, n_allele, n_info, &mut record) {
        record.error_code |= malformation_bits(&e);
        if record.alleles.len() != n_allele as usize {
            record.error_code |= ERR_ALLELE;
        }
        warn!(
            "malformed shared region at contig {} pos {}: {}",
            record.contig_id, record.pos, e
        );
        return Ok(record);
    }
    if let Err(e) = decode_indiv(indiv, n_sample as usize, n_fmt, &mut record) {
        record.error_code |= ERR_FORMAT | malformation_bits(&e);
        warn!(
            "malformed per-sample region at contig {} pos {}: {}",
            record.contig_id, record.pos, e
        );
    }
    Ok(record)
}

fn malformation_bits(e: &DecodeError) -> u32 {
    match e {
        DecodeError::TruncatedValue | DecodeError::RecordTooShort { .. } => ERR_TRUNCATED,
        DecodeError::ReservedTag(_) | DecodeError::BadDescriptor(_) => ERR_TAG,
        _ => ERR_TRUNCATED,
    }
}

fn decode_shared(
    mut input: &[u8],
    n_allele: u16,
    n_info: u16,
    record: &mut Record,
) -> Result<()> {
    let (rest, id) = typed_string(input)?;
    record.id = match id.as_str() {
        "" | "." => None,
        _ => Some(id),
    };
    input = rest;

    for _ in 0..n_allele {
        let (rest, allele) = typed_string(input)?;
        record.alleles.push(allele);
        input = rest;
    }

    let (rest, filter_ids) = typed_ints(input)?;
    record.filters = filter_ids
        .into_iter()
        .map(|id| {
            usize::try_from(id).map_err(|_| DecodeError::BadDescriptor("negative filter id"))
        })
        .collect::<Result<_>>()?;
    input = rest;

    for _ in 0..n_info {
        let (rest, key) = typed_int(input)?;
        let key =
            usize::try_from(key).map_err(|_| DecodeError::BadDescriptor("negative field key"))?;
        let (rest, value) = typed_value(rest)?;
        record.info.insert(key, value);
        input = rest;
    }
    Ok(())
}

/// Per-sample region, field-major: each block carries one FORMAT key, one
/// descriptor, then that many elements for every sample in turn.
fn decode_indiv(
    mut input: &[u8],
    n_sample: usize,
    n_fmt: u8,
    record: &mut Record,
) -> Result<()> {
    for _ in 0..n_fmt {
        let (rest, key) = typed_int(input)?;
        let key =
            usize::try_from(key).map_err(|_| DecodeError::BadDescriptor("negative field key"))?;
        let (rest, td) = type_descriptor(rest)?;
        let mut rest = rest;
        for sample in 0..n_sample {
            let (r, value) = value_payload(rest, td)?;
            record.samples[sample].insert(key, value);
            rest = r;
        }
        input = rest;
    }
    Ok(())
}
