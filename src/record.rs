use indexmap::IndexMap;

use crate::dict::Namespace;
use crate::error::{DecodeError, Result};
use crate::header::SharedHeader;
use crate::parser;
use crate::types::{GenotypeAllele, TypedValue, MISSING_QUAL};
use crate::writer;

// error_code bits; zero means the record decoded cleanly
pub const ERR_TRUNCATED: u32 = 1;
pub const ERR_TAG: u32 = 1 << 1;
pub const ERR_ALLELE: u32 = 1 << 2;
pub const ERR_FORMAT: u32 = 1 << 3;

/// One materialized variant call.
///
/// Owns every decoded string and value; nothing borrows from the source
/// buffer, so the buffer may be reused for the next record immediately.
/// A nonzero [`error_code`](Record::error_code) means decoding stopped at a
/// malformation and only the fields decoded before it are populated.
#[derive(Debug, Clone)]
pub struct Record {
    pub(crate) contig_id: u32,
    pub(crate) pos: u32,
    pub(crate) rlen: u32,
    pub(crate) qual: f32,
    pub(crate) id: Option<String>,
    // index 0 is REF, the rest are ALT in declared order
    pub(crate) alleles: Vec<String>,
    pub(crate) filters: Vec<usize>,
    pub(crate) info: IndexMap<usize, TypedValue>,
    pub(crate) samples: Vec<IndexMap<usize, TypedValue>>,
    pub(crate) error_code: u32,
    pub(crate) header: SharedHeader,
}

impl Record {
    /// Decodes one record from a byte slice starting at its length prefix.
    ///
    /// `Err` is returned only when not even the fixed header could be read;
    /// any later malformation yields `Ok` with a nonzero error code and the
    /// fields decoded up to that point.
    pub fn decode(input: &[u8], header: SharedHeader) -> Result<Self> {
        parser::record(input, header)
    }

    /// Re-encodes this record into the wire layout `decode` reads.
    pub fn encode(&self) -> Result<Vec<u8>> {
        writer::encode(self)
    }

    pub fn contig_id(&self) -> u32 {
        self.contig_id
    }

    pub fn contig_name(&self) -> Result<&str> {
        self.header
            .dict()
            .resolve(Namespace::Contig, self.contig_id as usize)
    }

    /// 0-based position on the contig.
    pub fn pos(&self) -> u32 {
        self.pos
    }

    /// Reference span. Recomputed from the REF allele where possible; the
    /// stored value is only trusted for symbolic alleles (`<DEL>` etc.),
    /// whose extent the allele string cannot convey.
    pub fn span(&self) -> u32 {
        match self.alleles.first() {
            Some(r) if !r.starts_with('<') => r.len() as u32,
            _ => self.rlen,
        }
    }

    /// 0-based exclusive end position.
    pub fn end(&self) -> u32 {
        self.pos + self.span()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The REF allele. Empty only on records whose error code reports that
    /// decoding failed before any allele was read.
    pub fn ref_allele(&self) -> &str {
        self.alleles.first().map(String::as_str).unwrap_or("")
    }

    /// The i-th ALT allele, or `None` if the record has no such allele.
    /// Asking past the end is not an error.
    pub fn alt_allele(&self, i: usize) -> Option<&str> {
        self.alleles.get(i + 1).map(String::as_str)
    }

    pub fn alt_alleles(&self) -> &[String] {
        self.alleles.get(1..).unwrap_or(&[])
    }

    pub fn allele_count(&self) -> usize {
        self.alleles.len()
    }

    /// QUAL, or `None` when the reserved missing bit pattern is stored.
    pub fn qual(&self) -> Option<f32> {
        if self.qual.to_bits() == MISSING_QUAL {
            None
        } else {
            Some(self.qual)
        }
    }

    /// Raw filter ids. Empty means the record was never filter-evaluated,
    /// which is distinct from an explicit PASS entry.
    pub fn filter_ids(&self) -> &[usize] {
        &self.filters
    }

    pub fn filters(&self) -> Result<Vec<&str>> {
        self.filters
            .iter()
            .map(|&id| self.header.dict().resolve(Namespace::Filter, id))
            .collect()
    }

    pub fn first_filter_name(&self) -> Result<&str> {
        match self.filters.first() {
            None => Err(DecodeError::NoFilterSet),
            Some(&id) => self.header.dict().resolve(Namespace::Filter, id),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.filters.len() == 1
            && self
                .header
                .dict()
                .resolve(Namespace::Filter, self.filters[0])
                .map(|name| name == "PASS")
                .unwrap_or(false)
    }

    /// Named INFO value for this record.
    ///
    /// A name the header never declared fails with `UnknownField`; a
    /// declared name this record carries no value for fails with
    /// `FieldNotPresent`.
    pub fn info(&self, name: &str) -> Result<&TypedValue> {
        let id = self.header.dict().lookup(Namespace::Info, name)?;
        self.info
            .get(&id)
            .ok_or_else(|| DecodeError::FieldNotPresent {
                name: name.to_owned(),
            })
    }

    pub fn has_info(&self, name: &str) -> bool {
        self.info(name).is_ok()
    }

    /// Named FORMAT values, one per sample in header sample order.
    pub fn format(&self, name: &str) -> Result<Vec<&TypedValue>> {
        let id = self.header.dict().lookup(Namespace::Format, name)?;
        self.samples
            .iter()
            .map(|sample| {
                sample.get(&id).ok_or_else(|| DecodeError::FieldNotPresent {
                    name: name.to_owned(),
                })
            })
            .collect()
    }

    /// Decoded GT field: one allele-call vector per sample.
    pub fn genotypes(&self) -> Result<Vec<Vec<GenotypeAllele>>> {
        Ok(self
            .format("GT")?
            .into_iter()
            .map(|value| {
                value
                    .ints()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|raw| match raw {
                        Some(raw) => GenotypeAllele::from_raw(raw),
                        None => GenotypeAllele::Missing,
                    })
                    .collect()
            })
            .collect())
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn samples(&self) -> &[IndexMap<usize, TypedValue>] {
        &self.samples
    }

    pub fn error_code(&self) -> u32 {
        self.error_code
    }

    pub fn is_well_formed(&self) -> bool {
        self.error_code == 0
    }

    pub fn header(&self) -> &SharedHeader {
        &self.header
    }
}
