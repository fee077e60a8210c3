use std::io::Cursor;

use anyhow::Result;

use bcf_decode::writer::{
    put_f32, put_i32, put_stream_header, put_typed_int, put_typed_ints, put_typed_string, put_u16,
    put_u24, put_u32, put_u8,
};
use bcf_decode::{
    Cardinality, DecodeError, GenotypeAllele, Header, Namespace, Records, ValueType,
};

fn header() -> Header {
    Header::builder()
        .contig("chr1")
        .contig("chr2")
        .filter("PASS", "All filters passed")
        .filter("LowQual", "low quality")
        .info("DP", Cardinality::Count(1), ValueType::Integer, "read depth")
        .info(
            "AF",
            Cardinality::AlternateAlleles,
            ValueType::Float,
            "allele frequency",
        )
        .format("GT", Cardinality::Count(1), ValueType::String, "genotype")
        .format("AD", Cardinality::Alleles, ValueType::Integer, "allelic depths")
        .sample("S1")
        .sample("S2")
        .build()
        .unwrap()
}

fn frame(shared: Vec<u8>, indiv: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::new();
    put_u32(&mut out, shared.len() as u32);
    put_u32(&mut out, indiv.len() as u32);
    out.extend_from_slice(&shared);
    out.extend_from_slice(&indiv);
    out
}

#[allow(clippy::too_many_arguments)]
fn fixed(
    shared: &mut Vec<u8>,
    contig: i32,
    pos: i32,
    rlen: i32,
    qual: f32,
    n_info: u16,
    n_allele: u16,
    n_sample: u32,
    n_fmt: u8,
) {
    put_i32(shared, contig);
    put_i32(shared, pos);
    put_i32(shared, rlen);
    put_f32(shared, qual);
    put_u16(shared, n_info);
    put_u16(shared, n_allele);
    put_u24(shared, n_sample);
    put_u8(shared, n_fmt);
}

#[test]
fn full_stream_round_trip() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let header = header();
    let mut stream = Vec::new();
    put_stream_header(&mut stream, &header);

    // record one: chr2:14369 rs42 G->A, QUAL 29.0, PASS, DP=14, AF=0.5,
    // GT and AD for both samples
    let mut shared = Vec::new();
    fixed(&mut shared, 1, 14369, 1, 29.0, 2, 2, 2, 2);
    put_typed_string(&mut shared, "rs42");
    put_typed_string(&mut shared, "G");
    put_typed_string(&mut shared, "A");
    put_typed_ints(&mut shared, &[0]);
    put_typed_int(&mut shared, 0); // DP
    put_typed_int(&mut shared, 14);
    put_typed_int(&mut shared, 1); // AF
    shared.push(0x15); // one float32
    put_f32(&mut shared, 0.5);

    let mut indiv = Vec::new();
    put_typed_int(&mut indiv, 0); // GT
    indiv.push(0x21); // two int8s per sample
    indiv.extend_from_slice(&[2, 4]); // 0/1
    indiv.extend_from_slice(&[4, 5]); // 1|1
    put_typed_int(&mut indiv, 1); // AD
    indiv.push(0x21);
    indiv.extend_from_slice(&[8, 6]);
    indiv.extend_from_slice(&[3, 11]);
    let record_one = frame(shared, indiv);
    stream.extend_from_slice(&record_one);

    // record two: chr1:100 A->AT, QUAL missing, unfiltered, no samples
    let mut shared = Vec::new();
    fixed(
        &mut shared,
        0,
        100,
        1,
        f32::from_bits(0x7F80_0001),
        0,
        2,
        0,
        0,
    );
    put_typed_string(&mut shared, "");
    put_typed_string(&mut shared, "A");
    put_typed_string(&mut shared, "AT");
    put_typed_ints(&mut shared, &[]);
    let record_two = frame(shared, Vec::new());
    stream.extend_from_slice(&record_two);

    let mut records = Records::new(Cursor::new(stream))?;
    assert_eq!(records.header().samples(), &["S1", "S2"]);

    let one = records.next().unwrap()?;
    assert!(one.is_well_formed());
    assert_eq!(one.contig_name().unwrap(), "chr2");
    assert_eq!(one.pos(), 14369);
    assert_eq!(one.id(), Some("rs42"));
    assert_eq!(one.ref_allele(), "G");
    assert_eq!(one.alt_allele(0), Some("A"));
    assert_eq!(one.alt_allele(1), None);
    assert_eq!(one.qual(), Some(29.0));
    assert!(one.is_pass());
    assert_eq!(one.first_filter_name().unwrap(), "PASS");
    assert_eq!(one.info("DP")?.first_int(), Some(14));
    assert_eq!(one.info("AF")?.first_float(), Some(0.5));
    assert_eq!(
        one.genotypes()?,
        vec![
            vec![GenotypeAllele::Unphased(0), GenotypeAllele::Unphased(1)],
            vec![GenotypeAllele::Unphased(1), GenotypeAllele::Phased(1)],
        ]
    );
    let ad = one.format("AD")?;
    assert_eq!(ad[0].ints(), Some(vec![Some(8), Some(6)]));
    assert_eq!(ad[1].ints(), Some(vec![Some(3), Some(11)]));
    // re-encoding reproduces the exact wire bytes
    assert_eq!(one.encode()?, record_one);

    let two = records.next().unwrap()?;
    assert!(two.is_well_formed());
    assert_eq!(two.contig_name().unwrap(), "chr1");
    assert_eq!(two.id(), None);
    assert_eq!(two.qual(), None);
    assert!(two.filter_ids().is_empty());
    assert!(!two.is_pass());
    assert!(matches!(
        two.info("DP"),
        Err(DecodeError::FieldNotPresent { .. })
    ));
    assert_eq!(two.encode()?, record_two);

    assert!(records.next().is_none());
    Ok(())
}

#[test]
fn dictionary_resolves_through_the_stream_header() -> Result<()> {
    let header = header();
    let mut stream = Vec::new();
    put_stream_header(&mut stream, &header);
    let records = Records::new(Cursor::new(stream))?;
    let dict = records.header().dict();
    for ns in [
        Namespace::Contig,
        Namespace::Filter,
        Namespace::Info,
        Namespace::Format,
    ] {
        for id in 0..dict.len(ns) {
            assert_eq!(dict.lookup(ns, dict.resolve(ns, id)?)?, id);
        }
    }
    Ok(())
}

#[test]
fn malformed_record_does_not_end_the_stream() -> Result<()> {
    let header = header();
    let mut stream = Vec::new();
    put_stream_header(&mut stream, &header);

    // truncated mid-INFO: one INFO pair declared, value payload cut off
    let mut shared = Vec::new();
    fixed(&mut shared, 0, 5, 1, 10.0, 1, 2, 0, 0);
    put_typed_string(&mut shared, "");
    put_typed_string(&mut shared, "C");
    put_typed_string(&mut shared, "T");
    put_typed_ints(&mut shared, &[1]);
    put_typed_int(&mut shared, 0);
    shared.push(0x23); // two int32s declared, none present
    stream.extend_from_slice(&frame(shared, Vec::new()));

    // followed by a clean record
    let mut shared = Vec::new();
    fixed(&mut shared, 0, 6, 1, 11.0, 0, 1, 0, 0);
    put_typed_string(&mut shared, "");
    put_typed_string(&mut shared, "T");
    put_typed_ints(&mut shared, &[0]);
    stream.extend_from_slice(&frame(shared, Vec::new()));

    let mut records = Records::new(Cursor::new(stream))?;
    let bad = records.next().unwrap()?;
    assert!(!bad.is_well_formed());
    assert_eq!(bad.ref_allele(), "C");
    assert_eq!(bad.first_filter_name().unwrap(), "LowQual");
    let good = records.next().unwrap()?;
    assert!(good.is_well_formed());
    assert_eq!(good.pos(), 6);
    assert!(records.next().is_none());
    Ok(())
}

#[test]
fn partial_length_prefix_is_an_error_not_end_of_stream() -> Result<()> {
    let header = header();
    let mut stream = Vec::new();
    put_stream_header(&mut stream, &header);
    // three bytes of what should be an 8-byte length prefix
    stream.extend_from_slice(&[3, 0, 0]);
    let mut records = Records::new(Cursor::new(stream))?;
    assert!(matches!(
        records.next(),
        Some(Err(DecodeError::Io(e))) if e.kind() == std::io::ErrorKind::UnexpectedEof
    ));
    assert!(records.next().is_none());
    Ok(())
}

#[test]
fn bad_magic_is_rejected() {
    assert!(matches!(
        Records::new(Cursor::new(b"NOT A BCF STREAM".to_vec())),
        Err(DecodeError::BadMagic)
    ));
}
