use std::collections::HashMap;

use getset::Getters;
use indexmap::IndexMap;
use itertools::Itertools;
use multimap::MultiMap;
use nom::branch::alt;
use nom::bytes::complete::{escaped, is_not, tag};
use nom::character::complete::{none_of, one_of};
use nom::combinator::{map, opt};
use nom::multi::separated_list0;
use nom::sequence::{delimited, separated_pair};
use nom::IResult;

use crate::dict::{Dictionary, Namespace};
use crate::error::{DecodeError, Result};
use crate::types::{Cardinality, ValueType};

#[cfg(not(feature = "sync"))]
pub type SharedHeader = std::rc::Rc<Header>;
#[cfg(feature = "sync")]
pub type SharedHeader = std::sync::Arc<Header>;

/// Declaration of an INFO or FORMAT field.
#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct FieldDecl {
    pub(crate) id: String,
    number: Cardinality,
    kind: ValueType,
    description: String,
    // may hold keys we do not interpret (Source, Version, ...)
    additional: HashMap<String, String>,
}

impl FieldDecl {
    pub fn new(
        id: impl Into<String>,
        number: Cardinality,
        kind: ValueType,
        description: impl Into<String>,
    ) -> Self {
        FieldDecl {
            id: id.into(),
            number,
            kind,
            description: description.into(),
            additional: Default::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct FilterDecl {
    pub(crate) id: String,
    description: String,
}

#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct ContigDecl {
    pub(crate) id: String,
    length: Option<usize>,
    additional: HashMap<String, String>,
}

/// Immutable per-source metadata: contig list, FILTER/INFO/FORMAT
/// declarations, sample names, and the name<->id dictionary derived from
/// them. Constructed once, then shared read-only by every record decoded
/// from the same source.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct Header {
    /// uninterpreted `##key=value` lines, e.g. fileformat
    meta: MultiMap<String, String>,
    contigs: Vec<ContigDecl>,
    filters: IndexMap<usize, FilterDecl>,
    infos: IndexMap<usize, FieldDecl>,
    formats: IndexMap<usize, FieldDecl>,
    samples: Vec<String>,
    dict: Dictionary,
}

impl Header {
    pub fn builder() -> HeaderBuilder {
        HeaderBuilder::default()
    }

    pub fn info_decl(&self, name: &str) -> Option<&FieldDecl> {
        let id = self.dict.lookup(Namespace::Info, name).ok()?;
        self.infos.get(&id)
    }

    pub fn format_decl(&self, name: &str) -> Option<&FieldDecl> {
        let id = self.dict.lookup(Namespace::Format, name).ok()?;
        self.formats.get(&id)
    }

    /// Parses the embedded VCF-style text header: `##contig=<...>`,
    /// `##FILTER=<...>`, `##INFO=<...>`, `##FORMAT=<...>` declarations, any
    /// other `##key=value` lines, and the final `#CHROM` sample line.
    ///
    /// Ids are assigned per namespace in declaration order; an `IDX=` key
    /// overrides the assignment for that entry.
    pub fn from_text(text: &str) -> Result<Self> {
        let mut builder = HeaderBuilder::default();
        for line in text.lines() {
            let line = line.trim_end_matches(&['\r', '\0'][..]);
            if line.is_empty() {
                continue;
            }
            if let Some(entry) = line.strip_prefix("##") {
                let (key, value) = entry
                    .split_once('=')
                    .ok_or_else(|| DecodeError::BadHeader(format!("not a key=value line: {:?}", line)))?;
                match key {
                    "contig" | "FILTER" | "INFO" | "FORMAT" => {
                        let fields = structured_fields(value)?;
                        builder = builder.declaration(key, &fields)?;
                    }
                    _ => builder = builder.meta(key, value),
                }
            } else if let Some(columns) = line.strip_prefix('#') {
                for sample in columns.split('\t').skip(9) {
                    builder = builder.sample(sample);
                }
            } else {
                return Err(DecodeError::BadHeader(format!(
                    "unexpected line outside header: {:?}",
                    line
                )));
            }
        }
        builder.build()
    }

    /// Serializes back to the text form `from_text` accepts. Explicit `IDX=`
    /// keys are emitted for FILTER/INFO/FORMAT entries so sparse id
    /// assignments survive the round trip.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        if !self.meta.contains_key("fileformat") {
            out.push_str("##fileformat=VCFv4.3\n");
        }
        for (key, values) in self.meta.iter_all() {
            for value in values {
                out.push_str(&format!("##{}={}\n", key, value));
            }
        }
        for contig in &self.contigs {
            out.push_str(&format!("##contig=<ID={}", contig.id));
            if let Some(length) = contig.length {
                out.push_str(&format!(",length={}", length));
            }
            push_extra_fields(&mut out, &contig.additional);
            out.push_str(">\n");
        }
        for (id, filter) in &self.filters {
            out.push_str(&format!(
                "##FILTER=<ID={},Description=\"{}\",IDX={}>\n",
                filter.id, filter.description, id
            ));
        }
        for (id, info) in &self.infos {
            out.push_str(&format!(
                "##INFO=<ID={},Number={},Type={},Description=\"{}\"",
                info.id, info.number, info.kind, info.description
            ));
            push_extra_fields(&mut out, &info.additional);
            out.push_str(&format!(",IDX={}>\n", id));
        }
        for (id, format) in &self.formats {
            out.push_str(&format!(
                "##FORMAT=<ID={},Number={},Type={},Description=\"{}\"",
                format.id, format.number, format.kind, format.description
            ));
            push_extra_fields(&mut out, &format.additional);
            out.push_str(&format!(",IDX={}>\n", id));
        }
        out.push_str("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO");
        if !self.samples.is_empty() {
            out.push_str("\tFORMAT\t");
            out.push_str(&self.samples.iter().join("\t"));
        }
        out.push('\n');
        out
    }
}

// values that would not survive unquoted get the quoted form back
fn push_extra_fields(out: &mut String, additional: &HashMap<String, String>) {
    for (key, value) in additional {
        if value.contains(',') || value.contains('>') {
            out.push_str(&format!(",{}=\"{}\"", key, value));
        } else {
            out.push_str(&format!(",{}={}", key, value));
        }
    }
}

fn quoted(input: &str) -> IResult<&str, &str> {
    delimited(
        tag("\""),
        map(opt(escaped(none_of("\\\""), '\\', one_of("\\\""))), |s| {
            s.unwrap_or("")
        }),
        tag("\""),
    )(input)
}

fn key_value(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(is_not("<,=>"), tag("="), alt((quoted, is_not(",>"))))(input)
}

fn structured_body(input: &str) -> IResult<&str, Vec<(&str, &str)>> {
    delimited(tag("<"), separated_list0(tag(","), key_value), tag(">"))(input)
}

fn structured_fields(value: &str) -> Result<Vec<(&str, &str)>> {
    let (rest, fields) = structured_body(value)
        .map_err(|_| DecodeError::BadHeader(format!("malformed declaration: {:?}", value)))?;
    if !rest.is_empty() {
        return Err(DecodeError::BadHeader(format!(
            "trailing garbage after declaration: {:?}",
            rest
        )));
    }
    Ok(fields)
}

fn required<'a>(fields: &[(&'a str, &'a str)], key: &str, what: &str) -> Result<&'a str> {
    fields
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
        .ok_or_else(|| DecodeError::BadHeader(format!("{} declaration missing {}", what, key)))
}

fn optional<'a>(fields: &[(&'a str, &'a str)], key: &str) -> Option<&'a str> {
    fields.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn declared_idx(fields: &[(&str, &str)]) -> Result<Option<usize>> {
    match optional(fields, "IDX") {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| DecodeError::BadHeader(format!("invalid IDX value {:?}", raw))),
    }
}

fn extra_fields(fields: &[(&str, &str)], known: &[&str]) -> HashMap<String, String> {
    fields
        .iter()
        .filter(|(k, _)| !known.contains(k))
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

/// Builds a [`Header`] either programmatically (tests, the container layer)
/// or from parsed text declarations.
#[derive(Debug, Default)]
pub struct HeaderBuilder {
    meta: MultiMap<String, String>,
    contigs: Vec<(ContigDecl, Option<usize>)>,
    filters: Vec<(FilterDecl, Option<usize>)>,
    infos: Vec<(FieldDecl, Option<usize>)>,
    formats: Vec<(FieldDecl, Option<usize>)>,
    samples: Vec<String>,
}

impl HeaderBuilder {
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn contig(mut self, name: impl Into<String>) -> Self {
        self.contigs.push((
            ContigDecl {
                id: name.into(),
                length: None,
                additional: Default::default(),
            },
            None,
        ));
        self
    }

    pub fn filter(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.filters.push((
            FilterDecl {
                id: name.into(),
                description: description.into(),
            },
            None,
        ));
        self
    }

    pub fn info(
        mut self,
        name: impl Into<String>,
        number: Cardinality,
        kind: ValueType,
        description: impl Into<String>,
    ) -> Self {
        self.infos
            .push((FieldDecl::new(name, number, kind, description), None));
        self
    }

    pub fn format(
        mut self,
        name: impl Into<String>,
        number: Cardinality,
        kind: ValueType,
        description: impl Into<String>,
    ) -> Self {
        self.formats
            .push((FieldDecl::new(name, number, kind, description), None));
        self
    }

    pub fn sample(mut self, name: impl Into<String>) -> Self {
        self.samples.push(name.into());
        self
    }

    fn declaration(mut self, key: &str, fields: &[(&str, &str)]) -> Result<Self> {
        let idx = declared_idx(fields)?;
        match key {
            "contig" => {
                let length = optional(fields, "length").and_then(|v| v.parse().ok());
                self.contigs.push((
                    ContigDecl {
                        id: required(fields, "ID", "contig")?.to_owned(),
                        length,
                        additional: extra_fields(fields, &["ID", "length", "IDX"]),
                    },
                    idx,
                ));
            }
            "FILTER" => {
                self.filters.push((
                    FilterDecl {
                        id: required(fields, "ID", "FILTER")?.to_owned(),
                        description: required(fields, "Description", "FILTER")?.to_owned(),
                    },
                    idx,
                ));
            }
            "INFO" | "FORMAT" => {
                let decl = FieldDecl {
                    id: required(fields, "ID", key)?.to_owned(),
                    number: required(fields, "Number", key)?.parse()?,
                    kind: required(fields, "Type", key)?
                        .parse()
                        .map_err(|_| DecodeError::BadHeader(format!("invalid Type in {} line", key)))?,
                    description: required(fields, "Description", key)?.to_owned(),
                    additional: extra_fields(
                        fields,
                        &["ID", "Number", "Type", "Description", "IDX"],
                    ),
                };
                if key == "INFO" {
                    self.infos.push((decl, idx));
                } else {
                    self.formats.push((decl, idx));
                }
            }
            _ => unreachable!("caller filters declaration keys"),
        }
        Ok(self)
    }

    pub fn build(self) -> Result<Header> {
        let contigs = assign_ids(self.contigs, "contig")?;
        // contig ids index a plain list, so they must be dense
        let contigs = {
            let mut ordered = vec![None; contigs.len()];
            for (id, decl) in contigs {
                if id >= ordered.len() {
                    return Err(DecodeError::BadHeader(format!(
                        "non-contiguous contig IDX {}",
                        id
                    )));
                }
                ordered[id] = Some(decl);
            }
            ordered.into_iter().flatten().collect::<Vec<_>>()
        };
        let filters = assign_ids(self.filters, "FILTER")?;
        let infos = assign_ids(self.infos, "INFO")?;
        let formats = assign_ids(self.formats, "FORMAT")?;

        let mut dict = Dictionary::default();
        for (id, contig) in contigs.iter().enumerate() {
            dict.insert(Namespace::Contig, id, &contig.id);
        }
        for (id, filter) in &filters {
            dict.insert(Namespace::Filter, *id, &filter.id);
        }
        for (id, info) in &infos {
            dict.insert(Namespace::Info, *id, &info.id);
        }
        for (id, format) in &formats {
            dict.insert(Namespace::Format, *id, &format.id);
        }

        Ok(Header {
            meta: self.meta,
            contigs,
            filters,
            infos,
            formats,
            samples: self.samples,
            dict,
        })
    }
}

fn assign_ids<T>(decls: Vec<(T, Option<usize>)>, what: &str) -> Result<IndexMap<usize, T>> {
    let mut out = IndexMap::with_capacity(decls.len());
    for (position, (decl, idx)) in decls.into_iter().enumerate() {
        let id = idx.unwrap_or(position);
        if out.insert(id, decl).is_some() {
            return Err(DecodeError::BadHeader(format!(
                "duplicate {} IDX {}",
                what, id
            )));
        }
    }
    Ok(out)
}
