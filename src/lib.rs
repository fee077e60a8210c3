//! Decoder for BCF-style variant-call binary records: a header with
//! contig/FILTER/INFO/FORMAT dictionaries plus a stream of length-prefixed,
//! self-describing typed records.

pub mod dict;
pub mod error;
pub mod header;
pub(crate) mod parser;
pub mod reader;
pub mod record;
pub mod types;
pub mod writer;

pub use dict::{Dictionary, Namespace};
pub use error::{DecodeError, Result};
pub use header::{Header, HeaderBuilder, SharedHeader};
pub use reader::Records;
pub use record::Record;
pub use types::{Cardinality, GenotypeAllele, TypedValue, ValueType};

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::reader::Records;
    use super::*;

    #[test]
    fn stream_header_and_samples() {
        let header = Header::builder()
            .contig("chr1")
            .filter("PASS", "All filters passed")
            .sample("HG001")
            .sample("HG003")
            .build()
            .unwrap();
        let mut bytes = Vec::new();
        writer::put_stream_header(&mut bytes, &header);
        let records = Records::new(Cursor::new(bytes)).unwrap();
        assert_eq!(records.header().samples(), &["HG001", "HG003"]);
        assert_eq!(records.count(), 0);
    }
}
