//! String Table (EXI 7.3, Appendix D).
//!
//! Vergibt Compact Identifier für URIs, Prefixes, Local-Names und Werte.
//! Die Partitionen für Prefixes und Local-Names sind pro URI getrennt,
//! Werte liegen in einer einzigen globalen Partition.
//!
//! Encoder und Decoder registrieren Strings in derselben Reihenfolge;
//! dadurch stimmen die Identifier beider Seiten überein, ohne dass sie
//! übertragen werden müssen.
//!
//! # Beispiel
//!
//! ```
//! use exi_grammar::string_table::{Partition, PartitionedStringTable, StringTable};
//!
//! let mut table = PartitionedStringTable::new();
//! assert_eq!(table.lookup(Partition::Uri, ""), Some(0));
//! assert_eq!(table.lookup(Partition::Value, "red"), None);
//! let id = table.register(Partition::Value, "red");
//! assert_eq!(table.get(Partition::Value, id).map(|s| &**s), Some("red"));
//! ```

use std::collections::BTreeSet;
use std::rc::Rc;

use crate::FastHashMap;
use crate::qname::{URI_XML, URI_XSD, URI_XSI};
use crate::schema_grammar::SchemaGrammars;

/// Schwelle ab der eine Partition zusätzlich einen Hash-Index führt.
///
/// URI- und Prefix-Partitionen bleiben fast immer darunter.
const LINEAR_SCAN_THRESHOLD: usize = 64;

/// Table D-5: Local-Names der XSD-Namespace-Partition.
const XSD_BUILTIN_TYPES: [&str; 46] = [
    "ENTITIES", "ENTITY", "ID", "IDREF", "IDREFS", "NCName", "NMTOKEN", "NMTOKENS", "NOTATION", "Name",
    "QName", "anySimpleType", "anyType", "anyURI", "base64Binary", "boolean", "byte", "date", "dateTime",
    "decimal", "double", "duration", "float", "gDay", "gMonth", "gMonthDay", "gYear", "gYearMonth",
    "hexBinary", "int", "integer", "language", "long", "negativeInteger", "nonNegativeInteger",
    "nonPositiveInteger", "normalizedString", "positiveInteger", "short", "string", "time", "token",
    "unsignedByte", "unsignedInt", "unsignedLong", "unsignedShort",
];

/// Partition einer String Table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition<'a> {
    /// URIs.
    Uri,
    /// Prefixes einer URI.
    Prefix(&'a str),
    /// Local-Names einer URI.
    LocalName(&'a str),
    /// Werte (global).
    Value,
}

/// Zugriff auf eine partitionierte String Table.
pub trait StringTable {
    /// Compact Identifier eines Strings, falls registriert.
    fn lookup(&self, partition: Partition<'_>, value: &str) -> Option<usize>;

    /// Registriert einen String (idempotent) und liefert seinen Identifier.
    fn register(&mut self, partition: Partition<'_>, value: &str) -> usize;

    /// String zu einem Identifier.
    fn get(&self, partition: Partition<'_>, id: usize) -> Option<&Rc<str>>;

    /// Anzahl Einträge einer Partition.
    fn count(&self, partition: Partition<'_>) -> usize;
}

/// Einträge einer Partition mit optionalem Hash-Index.
#[derive(Debug, Clone, Default)]
struct Entries {
    items: Vec<Rc<str>>,
    index: Option<FastHashMap<Rc<str>, usize>>,
}

impl Entries {
    fn with_entries<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut entries = Self::default();
        for value in values {
            entries.add(value);
        }
        entries
    }

    fn lookup(&self, value: &str) -> Option<usize> {
        match &self.index {
            Some(map) => map.get(value).copied(),
            None => self.items.iter().position(|e| &**e == value),
        }
    }

    fn add(&mut self, value: &str) -> usize {
        if let Some(existing) = self.lookup(value) {
            return existing;
        }
        let id = self.items.len();
        let rc: Rc<str> = value.into();
        match &mut self.index {
            Some(map) => {
                map.insert(Rc::clone(&rc), id);
            }
            None if id + 1 >= LINEAR_SCAN_THRESHOLD => {
                let mut map = FastHashMap::with_capacity_and_hasher(id + 1, Default::default());
                for (i, e) in self.items.iter().enumerate() {
                    map.insert(Rc::clone(e), i);
                }
                map.insert(Rc::clone(&rc), id);
                self.index = Some(map);
            }
            None => {}
        }
        self.items.push(rc);
        id
    }

    fn get(&self, id: usize) -> Option<&Rc<str>> {
        self.items.get(id)
    }
}

/// String Table mit Partitionen nach EXI 7.3.1.
///
/// Vorbelegt mit den URIs `""`, XML, XSI, XSD, den Prefixes `""`, `xml`,
/// `xsi` und den Local-Names aus Appendix D sowie aus dem Schema.
#[derive(Debug, Clone)]
pub struct PartitionedStringTable {
    uris: Entries,
    prefixes: FastHashMap<Rc<str>, Entries>,
    local_names: FastHashMap<Rc<str>, Entries>,
    values: Entries,
}

impl Default for PartitionedStringTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PartitionedStringTable {
    /// Tabelle ohne Schema-Namen.
    pub fn new() -> Self {
        let mut table = Self {
            uris: Entries::with_entries(["", URI_XML, URI_XSI, URI_XSD]),
            prefixes: FastHashMap::default(),
            local_names: FastHashMap::default(),
            values: Entries::default(),
        };
        table.prefixes.insert(Rc::from(""), Entries::with_entries([""]));
        table.prefixes.insert(Rc::from(URI_XML), Entries::with_entries(["xml"]));
        table.prefixes.insert(Rc::from(URI_XSI), Entries::with_entries(["xsi"]));
        table.local_names.insert(Rc::from(URI_XML), Entries::with_entries(["base", "id", "lang", "space"]));
        table.local_names.insert(Rc::from(URI_XSI), Entries::with_entries(["nil", "type"]));
        table.local_names.insert(Rc::from(URI_XSD), Entries::with_entries(XSD_BUILTIN_TYPES));
        table
    }

    /// Tabelle vorbelegt mit allen Namen des Schemas (EXI D.3).
    ///
    /// Schema-URIs folgen den vier festen URIs in sortierter Reihenfolge;
    /// Local-Names je URI sind sortiert.
    pub fn for_schema(schema: &SchemaGrammars) -> Self {
        let mut table = Self::new();
        for (uri, names) in schema.schema_names() {
            table.uris.add(uri);
            let mut merged: BTreeSet<&str> = names.iter().map(|n| &**n).collect();
            if let Some(existing) = table.local_names.get(uri) {
                merged.extend(existing.items.iter().map(|n| &**n));
            }
            table.local_names.insert(Rc::clone(uri), Entries::with_entries(merged));
        }
        table
    }
}

impl StringTable for PartitionedStringTable {
    fn lookup(&self, partition: Partition<'_>, value: &str) -> Option<usize> {
        match partition {
            Partition::Uri => self.uris.lookup(value),
            Partition::Prefix(uri) => self.prefixes.get(uri)?.lookup(value),
            Partition::LocalName(uri) => self.local_names.get(uri)?.lookup(value),
            Partition::Value => self.values.lookup(value),
        }
    }

    fn register(&mut self, partition: Partition<'_>, value: &str) -> usize {
        match partition {
            Partition::Uri => self.uris.add(value),
            Partition::Prefix(uri) => self.prefixes.entry(Rc::from(uri)).or_default().add(value),
            Partition::LocalName(uri) => self.local_names.entry(Rc::from(uri)).or_default().add(value),
            Partition::Value => self.values.add(value),
        }
    }

    fn get(&self, partition: Partition<'_>, id: usize) -> Option<&Rc<str>> {
        match partition {
            Partition::Uri => self.uris.get(id),
            Partition::Prefix(uri) => self.prefixes.get(uri)?.get(id),
            Partition::LocalName(uri) => self.local_names.get(uri)?.get(id),
            Partition::Value => self.values.get(id),
        }
    }

    fn count(&self, partition: Partition<'_>) -> usize {
        match partition {
            Partition::Uri => self.uris.items.len(),
            Partition::Prefix(uri) => self.prefixes.get(uri).map_or(0, |p| p.items.len()),
            Partition::LocalName(uri) => self.local_names.get(uri).map_or(0, |p| p.items.len()),
            Partition::Value => self.values.items.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qname::QName;
    use crate::schema::{ElementDeclaration, SchemaInfo};

    #[test]
    fn builtin_partitions() {
        let table = PartitionedStringTable::new();
        assert_eq!(table.count(Partition::Uri), 4);
        assert_eq!(table.lookup(Partition::Uri, URI_XSI), Some(2));
        assert_eq!(table.lookup(Partition::Prefix(URI_XML), "xml"), Some(0));
        assert_eq!(table.lookup(Partition::LocalName(URI_XSI), "type"), Some(1));
        assert_eq!(table.count(Partition::LocalName(URI_XSD)), 46);
        assert_eq!(table.lookup(Partition::LocalName("urn:x"), "a"), None);
    }

    #[test]
    fn schema_names_are_sorted_per_uri() {
        let schema = SchemaInfo::builder()
            .element(ElementDeclaration::new(QName::new("urn:x", "zeta")))
            .element(ElementDeclaration::new(QName::new("urn:x", "alpha")))
            .build()
            .unwrap();
        let grammars = SchemaGrammars::build(&schema).unwrap();
        let table = PartitionedStringTable::for_schema(&grammars);
        assert_eq!(table.lookup(Partition::Uri, "urn:x"), Some(4));
        assert_eq!(table.lookup(Partition::LocalName("urn:x"), "alpha"), Some(0));
        assert_eq!(table.lookup(Partition::LocalName("urn:x"), "zeta"), Some(1));
        // XSI-Partition bleibt vollständig.
        assert_eq!(table.lookup(Partition::LocalName(URI_XSI), "nil"), Some(0));
    }

    #[test]
    fn register_is_idempotent_across_index_threshold() {
        let mut table = PartitionedStringTable::new();
        for i in 0..200 {
            assert_eq!(table.register(Partition::Value, &format!("v{i}")), i);
        }
        assert_eq!(table.register(Partition::Value, "v7"), 7);
        assert_eq!(table.lookup(Partition::Value, "v150"), Some(150));
        assert_eq!(table.get(Partition::Value, 63).map(|s| &**s), Some("v63"));
        assert_eq!(table.count(Partition::Value), 200);
    }

    #[test]
    fn new_uri_gets_fresh_partitions() {
        let mut table = PartitionedStringTable::new();
        assert_eq!(table.register(Partition::Uri, "urn:new"), 4);
        assert_eq!(table.register(Partition::Prefix("urn:new"), "n"), 0);
        assert_eq!(table.register(Partition::LocalName("urn:new"), "a"), 0);
        assert_eq!(table.get(Partition::Prefix("urn:new"), 0).map(|s| &**s), Some("n"));
    }
}
