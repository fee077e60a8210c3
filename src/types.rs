use std::fmt;
use std::str::FromStr;

use num_enum::TryFromPrimitive;
use strum::{Display, EnumString};

use crate::error::DecodeError;

pub(crate) const MAGIC: &[u8; 3] = b"BCF";
pub(crate) const VERSION_MAJOR: u8 = 2;
pub(crate) const VERSION_MINOR: u8 = 2;

// Reserved bit patterns, one pair per width. "Missing" marks an absent slot,
// "end of vector" pads vectors whose actual arity is below the declared one.
pub const MISSING_INT8: i8 = i8::MIN;
pub const END_OF_VECTOR_INT8: i8 = i8::MIN + 1;
pub const MISSING_INT16: i16 = i16::MIN;
pub const END_OF_VECTOR_INT16: i16 = i16::MIN + 1;
pub const MISSING_INT32: i32 = i32::MIN;
pub const END_OF_VECTOR_INT32: i32 = i32::MIN + 1;
pub const MISSING_FLOAT: u32 = 0x7F80_0001;
pub const END_OF_VECTOR_FLOAT: u32 = 0x7F80_0002;
/// QUAL shares the float missing pattern. Test bits, never float equality.
pub const MISSING_QUAL: u32 = MISSING_FLOAT;

/// Sentinel tests for wire scalars. Implemented per width because each width
/// reserves its own bit patterns.
pub trait Sentinel: Copy {
    fn is_missing(self) -> bool;
    fn is_end_of_vector(self) -> bool;
}

impl Sentinel for i8 {
    fn is_missing(self) -> bool {
        self == MISSING_INT8
    }
    fn is_end_of_vector(self) -> bool {
        self == END_OF_VECTOR_INT8
    }
}

impl Sentinel for i16 {
    fn is_missing(self) -> bool {
        self == MISSING_INT16
    }
    fn is_end_of_vector(self) -> bool {
        self == END_OF_VECTOR_INT16
    }
}

impl Sentinel for i32 {
    fn is_missing(self) -> bool {
        self == MISSING_INT32
    }
    fn is_end_of_vector(self) -> bool {
        self == END_OF_VECTOR_INT32
    }
}

impl Sentinel for f32 {
    fn is_missing(self) -> bool {
        self.to_bits() == MISSING_FLOAT
    }
    fn is_end_of_vector(self) -> bool {
        self.to_bits() == END_OF_VECTOR_FLOAT
    }
}

/// Primitive kind carried in the low nibble of a type descriptor byte.
#[derive(Debug, Clone, Copy, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum TypeKind {
    Missing = 0,
    Int8 = 1,
    Int16 = 2,
    Int32 = 3,
    Float32 = 5,
    String = 7,
}

/// One decoded type descriptor: primitive kind plus element count. The high
/// nibble of the descriptor byte holds counts up to 14; 15 means the true
/// count follows as a separately typed scalar integer.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TypeDescriptor {
    pub kind: TypeKind,
    pub num_elements: usize,
}

/// A fully materialized typed value. Integer widths are preserved as decoded
/// so that re-encoding reproduces the original bytes; sentinel translation
/// happens in the accessors, not at decode time.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Missing,
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Float32(Vec<f32>),
    String(String),
}

impl TypedValue {
    /// Raw element count, sentinels included.
    pub fn len(&self) -> usize {
        match self {
            TypedValue::Missing => 0,
            TypedValue::Int8(v) => v.len(),
            TypedValue::Int16(v) => v.len(),
            TypedValue::Int32(v) => v.len(),
            TypedValue::Float32(v) => v.len(),
            TypedValue::String(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Integer view, widened to `i32`: missing slots become `None`, trailing
    /// end-of-vector padding is dropped. `None` if this is not an integer
    /// value.
    pub fn ints(&self) -> Option<Vec<Option<i32>>> {
        fn cook<T: Sentinel + Into<i32>>(values: &[T]) -> Vec<Option<i32>> {
            values
                .iter()
                .take_while(|v| !v.is_end_of_vector())
                .map(|v| if v.is_missing() { None } else { Some((*v).into()) })
                .collect()
        }
        match self {
            TypedValue::Missing => Some(vec![]),
            TypedValue::Int8(v) => Some(cook(v)),
            TypedValue::Int16(v) => Some(cook(v)),
            TypedValue::Int32(v) => Some(cook(v)),
            _ => None,
        }
    }

    pub fn floats(&self) -> Option<Vec<Option<f32>>> {
        match self {
            TypedValue::Missing => Some(vec![]),
            TypedValue::Float32(v) => Some(
                v.iter()
                    .take_while(|v| !v.is_end_of_vector())
                    .map(|v| if v.is_missing() { None } else { Some(*v) })
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn first_int(&self) -> Option<i32> {
        self.ints()?.first().copied().flatten()
    }

    pub fn first_float(&self) -> Option<f32> {
        self.floats()?.first().copied().flatten()
    }

    /// String view with trailing NUL padding removed.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) => Some(s.trim_end_matches('\0')),
            _ => None,
        }
    }

    /// Comma-separated string view, one entry per vector element.
    pub fn strings(&self) -> Option<Vec<&str>> {
        self.as_str().map(|s| s.split(',').collect())
    }

    /// Flags are encoded as presence; any payload (even `Missing`) counts.
    pub fn flag(&self) -> bool {
        true
    }
}

/// Declared value type of an INFO or FORMAT field.
#[derive(Debug, Clone, Copy, Eq, PartialEq, EnumString, Display)]
pub enum ValueType {
    Integer,
    Float,
    Flag,
    Character,
    String,
}

/// Declared cardinality policy of an INFO or FORMAT field. The per-record
/// payload states the actual count, which may legally differ for the
/// non-`Count` policies.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Cardinality {
    Count(usize),
    Alleles,
    AlternateAlleles,
    Genotypes,
    Unknown,
}

impl FromStr for Cardinality {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Cardinality::AlternateAlleles),
            "R" => Ok(Cardinality::Alleles),
            "G" => Ok(Cardinality::Genotypes),
            "." => Ok(Cardinality::Unknown),
            n => n
                .parse()
                .map(Cardinality::Count)
                .map_err(|_| DecodeError::BadHeader(format!("invalid Number value {:?}", s))),
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::Count(n) => write!(f, "{}", n),
            Cardinality::AlternateAlleles => write!(f, "A"),
            Cardinality::Alleles => write!(f, "R"),
            Cardinality::Genotypes => write!(f, "G"),
            Cardinality::Unknown => write!(f, "."),
        }
    }
}

/// One allele call of a genotype, decoded from the packed GT integer
/// `(allele + 1) << 1 | phased`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum GenotypeAllele {
    Missing,
    Unphased(u32),
    Phased(u32),
}

impl GenotypeAllele {
    pub(crate) fn from_raw(raw: i32) -> Self {
        if raw <= 0 {
            return GenotypeAllele::Missing;
        }
        let index = ((raw >> 1) - 1) as u32;
        if raw & 1 == 1 {
            GenotypeAllele::Phased(index)
        } else {
            GenotypeAllele::Unphased(index)
        }
    }

    pub fn index(&self) -> Option<u32> {
        match self {
            GenotypeAllele::Missing => None,
            GenotypeAllele::Unphased(i) | GenotypeAllele::Phased(i) => Some(*i),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::convert::TryFrom;

    #[test]
    fn int8_sentinels_are_disjoint_from_data() {
        for v in i8::MIN..=i8::MAX {
            match v {
                MISSING_INT8 => assert!(v.is_missing() && !v.is_end_of_vector()),
                END_OF_VECTOR_INT8 => assert!(v.is_end_of_vector() && !v.is_missing()),
                _ => assert!(!v.is_missing() && !v.is_end_of_vector()),
            }
        }
    }

    #[test]
    fn int16_int32_sentinels() {
        assert!(MISSING_INT16.is_missing());
        assert!(END_OF_VECTOR_INT16.is_end_of_vector());
        assert!(!(-32760i16).is_missing());
        assert!(MISSING_INT32.is_missing());
        assert!(END_OF_VECTOR_INT32.is_end_of_vector());
        assert!(!0i32.is_missing());
    }

    #[test]
    fn float_missing_is_a_bit_pattern_not_nan() {
        let missing = f32::from_bits(MISSING_FLOAT);
        assert!(missing.is_missing());
        // ordinary NaN is data as far as the sentinel test goes
        assert!(!f32::NAN.is_missing());
        assert!(f32::from_bits(END_OF_VECTOR_FLOAT).is_end_of_vector());
        assert!(!0.0f32.is_missing());
    }

    #[test]
    fn ints_translates_sentinels_and_trims_padding() {
        let v = TypedValue::Int8(vec![
            4,
            MISSING_INT8,
            2,
            END_OF_VECTOR_INT8,
            END_OF_VECTOR_INT8,
        ]);
        assert_eq!(v.ints(), Some(vec![Some(4), None, Some(2)]));
        assert_eq!(v.first_int(), Some(4));
    }

    #[test]
    fn type_kind_rejects_reserved_tags() {
        assert!(TypeKind::try_from(4u8).is_err());
        assert!(TypeKind::try_from(6u8).is_err());
        assert_eq!(TypeKind::try_from(7u8).unwrap(), TypeKind::String);
    }

    #[test]
    fn cardinality_round_trips_through_display() {
        for s in &["0", "1", "4", "A", "R", "G", "."] {
            let c: Cardinality = s.parse().unwrap();
            assert_eq!(&c.to_string(), s);
        }
        assert!("x".parse::<Cardinality>().is_err());
    }

    #[test]
    fn genotype_allele_unpacks() {
        assert_eq!(GenotypeAllele::from_raw(2), GenotypeAllele::Unphased(0));
        assert_eq!(GenotypeAllele::from_raw(5), GenotypeAllele::Phased(1));
        assert_eq!(GenotypeAllele::from_raw(0), GenotypeAllele::Missing);
    }
}
