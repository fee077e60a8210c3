use std::collections::HashMap;

use strum::Display;

use crate::error::{DecodeError, Result};

/// The four id spaces declared by a header. Each namespace is independent:
/// id 3 in `Filter` and id 3 in `Info` are unrelated entries.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Namespace {
    Contig,
    Filter,
    Info,
    Format,
}

impl Namespace {
    fn table(self) -> usize {
        match self {
            Namespace::Contig => 0,
            Namespace::Filter => 1,
            Namespace::Info => 2,
            Namespace::Format => 3,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Table {
    // id == index; gaps from sparse IDX declarations stay None
    names: Vec<Option<String>>,
    ids: HashMap<String, usize>,
}

/// Bidirectional map between small integer ids and header-declared names,
/// built once at header construction time in declaration order.
///
/// `resolve` is the hot path used while reading records; `lookup` serves
/// header construction and user-driven named queries.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    tables: [Table; 4],
}

impl Dictionary {
    pub(crate) fn insert(&mut self, namespace: Namespace, id: usize, name: &str) {
        let table = &mut self.tables[namespace.table()];
        if table.names.len() <= id {
            table.names.resize(id + 1, None);
        }
        table.names[id] = Some(name.to_owned());
        table.ids.insert(name.to_owned(), id);
    }

    pub fn resolve(&self, namespace: Namespace, id: usize) -> Result<&str> {
        self.tables[namespace.table()]
            .names
            .get(id)
            .and_then(|name| name.as_deref())
            .ok_or(DecodeError::UnknownId { namespace, id })
    }

    pub fn lookup(&self, namespace: Namespace, name: &str) -> Result<usize> {
        self.tables[namespace.table()]
            .ids
            .get(name)
            .copied()
            .ok_or_else(|| DecodeError::UnknownField {
                namespace,
                name: name.to_owned(),
            })
    }

    pub fn contains(&self, namespace: Namespace, name: &str) -> bool {
        self.tables[namespace.table()].ids.contains_key(name)
    }

    /// Number of id slots in a namespace, declared gaps included.
    pub fn len(&self, namespace: Namespace) -> usize {
        self.tables[namespace.table()].names.len()
    }

    pub fn is_empty(&self, namespace: Namespace) -> bool {
        self.len(namespace) == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn dict() -> Dictionary {
        let mut d = Dictionary::default();
        d.insert(Namespace::Contig, 0, "chr1");
        d.insert(Namespace::Contig, 1, "chr2");
        d.insert(Namespace::Filter, 0, "PASS");
        d.insert(Namespace::Filter, 1, "LowQual");
        d.insert(Namespace::Info, 0, "DP");
        d
    }

    #[test]
    fn resolve_and_lookup_are_inverses() {
        let d = dict();
        for ns in [Namespace::Contig, Namespace::Filter, Namespace::Info] {
            for id in 0..d.len(ns) {
                let name = d.resolve(ns, id).unwrap();
                assert_eq!(d.lookup(ns, name).unwrap(), id);
            }
        }
    }

    #[test]
    fn namespaces_are_independent() {
        let d = dict();
        assert_eq!(d.resolve(Namespace::Filter, 1).unwrap(), "LowQual");
        assert!(matches!(
            d.resolve(Namespace::Info, 1),
            Err(DecodeError::UnknownId {
                namespace: Namespace::Info,
                id: 1
            })
        ));
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let d = dict();
        assert!(d.lookup(Namespace::Info, "dp").is_err());
        assert_eq!(d.lookup(Namespace::Info, "DP").unwrap(), 0);
    }

    #[test]
    fn out_of_range_id_fails() {
        let d = dict();
        assert!(matches!(
            d.resolve(Namespace::Contig, 2),
            Err(DecodeError::UnknownId { .. })
        ));
    }
}
