//! Statische Schema-Grammar-Tabelle (EXI 8.5).
//!
//! Wird einmal aus einem [`SchemaInfo`] gebaut und danach nur noch gelesen.
//! Pro globalem Element und pro Typ existiert genau ein Eintrag: zwei
//! Vorkommen desselben globalen Typs bekommen dieselbe [`TypeId`] und teilen
//! sich damit zur Laufzeit auch ihre gelernten Productions.
//!
//! Typ-Identität:
//! - benannte Typen über ihren Namen (Stubs mit gleichem Namen werden über
//!   [`SchemaInfo::canonical_type`] auf die Tabelle aufgelöst)
//! - anonyme Typen über die Adresse ihres `Rc`
//!
//! `xs:anyType` und die XSD Built-in Simple Types sind immer vorhanden, damit
//! `xsi:type` sie auswählen kann.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::content_model::{self, ContentModel, StartTerm};
use crate::qname::{ExpandedNameId, InternedStr, QName, StringInterner, URI_XML, URI_XSD, URI_XSI};
use crate::schema::{
    AttributeWildcard, ContentType, ElementDeclaration, MaxOccurs, Particle, SchemaInfo,
    TypeDefinition, Wildcard,
};
use crate::{Error, FastHashMap, Result};

/// Index eines Typs in der Tabelle.
pub type TypeId = u32;

/// Index einer Element-Deklaration (global oder lokal) in der Tabelle.
pub type ElementId = u32;

/// XSD Built-in Simple Types, die per `xsi:type` wählbar sind.
const XSD_SIMPLE_TYPES: &[&str] = &[
    "anySimpleType",
    "string",
    "normalizedString",
    "token",
    "language",
    "Name",
    "NCName",
    "NMTOKEN",
    "ID",
    "IDREF",
    "ENTITY",
    "anyURI",
    "QName",
    "NOTATION",
    "boolean",
    "decimal",
    "integer",
    "nonPositiveInteger",
    "negativeInteger",
    "long",
    "int",
    "short",
    "byte",
    "nonNegativeInteger",
    "unsignedLong",
    "unsignedInt",
    "unsignedShort",
    "unsignedByte",
    "positiveInteger",
    "float",
    "double",
    "duration",
    "dateTime",
    "time",
    "date",
    "gYearMonth",
    "gYear",
    "gMonthDay",
    "gDay",
    "gMonth",
    "hexBinary",
    "base64Binary",
];

/// Deklariertes Attribut eines Complex Types (EXI 8.5.4.1.4).
#[derive(Debug, Clone)]
pub struct AttributeDecl {
    /// Name des Attributs.
    pub name: ExpandedNameId,
    /// `use="required"`.
    pub required: bool,
    /// Werttyp (None = anySimpleType).
    pub value_type: Option<Rc<TypeDefinition>>,
}

/// Attribute Wildcard nach Auflösung der Namespaces.
///
/// `##other` erzeugt wie `##any` AT(*) (EXI 8.5.4.1.3.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeWildcardGrammar {
    /// AT(*).
    Any,
    /// AT(uri:*) je URI, in Deklarationsreihenfolge.
    Namespaces(Vec<InternedStr>),
}

/// Content eines Typs.
#[derive(Debug, Clone)]
pub enum ContentGrammar {
    /// Nur EE.
    Empty,
    /// Ein Wert (None = anySimpleType), danach EE.
    Simple(Option<Rc<TypeDefinition>>),
    /// Geflachtes Content Model.
    Complex {
        /// Der DFA.
        model: ContentModel,
        /// Mixed Content: CH an jeder Stelle.
        mixed: bool,
        /// ElementId je lokaler Deklaration des Models.
        bindings: Vec<ElementId>,
    },
}

/// Grammar-Eintrag eines Typs.
#[derive(Debug, Clone)]
pub struct TypeGrammar {
    name: Option<ExpandedNameId>,
    attributes: Vec<AttributeDecl>,
    attribute_wildcard: Option<AttributeWildcardGrammar>,
    content: ContentGrammar,
    substitutable: bool,
}

impl TypeGrammar {
    /// Name des Typs (None für anonyme Typen).
    pub fn name(&self) -> Option<ExpandedNameId> {
        self.name
    }

    /// Attribute Uses, sortiert nach local-name, dann URI.
    pub fn attributes(&self) -> &[AttributeDecl] {
        &self.attributes
    }

    /// Attribute Wildcard.
    pub fn attribute_wildcard(&self) -> Option<&AttributeWildcardGrammar> {
        self.attribute_wildcard.as_ref()
    }

    /// Content.
    pub fn content(&self) -> &ContentGrammar {
        &self.content
    }

    /// Ob `xsi:type` als deklarierte Production angeboten wird
    /// (benannte Sub-Typen oder Union, EXI 8.5.4.1.3).
    pub fn substitutable(&self) -> bool {
        self.substitutable
    }

    /// Index des ersten Pflicht-Attributs ab `from`.
    pub fn first_required(&self, from: usize) -> Option<usize> {
        self.attributes
            .iter()
            .skip(from)
            .position(|a| a.required)
            .map(|i| i + from)
    }

    /// Ob der Content ohne weitere Events enden kann.
    pub fn content_can_end(&self) -> bool {
        match &self.content {
            ContentGrammar::Empty => true,
            ContentGrammar::Simple(_) => false,
            ContentGrammar::Complex { model, .. } => model.state(0).can_end,
        }
    }

    /// Ob der Content Mixed ist.
    pub fn is_mixed(&self) -> bool {
        matches!(self.content, ContentGrammar::Complex { mixed: true, .. })
    }

    /// Werttyp bei Simple Content.
    pub fn simple_value_type(&self) -> Option<Option<&Rc<TypeDefinition>>> {
        match &self.content {
            ContentGrammar::Simple(td) => Some(td.as_ref()),
            _ => None,
        }
    }
}

/// Grammar-Eintrag einer Element-Deklaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementGrammar {
    /// Name des Elements.
    pub name: ExpandedNameId,
    /// `nillable="true"`.
    pub nillable: bool,
    /// Typ des Elements.
    pub ty: TypeId,
}

/// Die statische Grammar-Tabelle.
#[derive(Debug)]
pub struct SchemaGrammars {
    interner: StringInterner,
    types: Vec<TypeGrammar>,
    elements: Vec<ElementGrammar>,
    global_elements: Vec<ElementId>,
    global_index: FastHashMap<ExpandedNameId, ElementId>,
    named_types: FastHashMap<ExpandedNameId, TypeId>,
    any_type: TypeId,
    schema_names: BTreeMap<Rc<str>, BTreeSet<Rc<str>>>,
}

impl SchemaGrammars {
    /// Baut die Tabelle mit der Standard-Obergrenze für Content-Model-Zustände.
    pub fn build(schema: &SchemaInfo) -> Result<Self> {
        Self::build_with_limit(schema, content_model::DEFAULT_MAX_STATES)
    }

    /// Baut die Tabelle.
    ///
    /// # Fehler
    ///
    /// - `Error::ContentModelTooComplex` wenn ein Content Model mehr als
    ///   `max_states` Zustände braucht
    /// - `Error::SchemaViolation` bei `<all>` Groups über 64 Member oder
    ///   unbekannten Substitution-Group-Membern
    pub fn build_with_limit(schema: &SchemaInfo, max_states: usize) -> Result<Self> {
        TableBuilder::new(schema, max_states)?.finish()
    }

    /// Interner mit allen Schema-Namen.
    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    /// Typ nach Id.
    pub fn type_grammar(&self, id: TypeId) -> &TypeGrammar {
        &self.types[id as usize]
    }

    /// Anzahl der Typen (inkl. Built-ins).
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Element nach Id.
    pub fn element(&self, id: ElementId) -> &ElementGrammar {
        &self.elements[id as usize]
    }

    /// Globale Elemente, sortiert nach local-name, dann URI.
    pub fn global_elements(&self) -> &[ElementId] {
        &self.global_elements
    }

    /// Sucht ein globales Element.
    pub fn global_element(&self, name: ExpandedNameId) -> Option<ElementId> {
        self.global_index.get(&name).copied()
    }

    /// Sucht einen benannten Typ (auch `xs:anyType` und XSD Built-ins).
    pub fn named_type(&self, name: ExpandedNameId) -> Option<TypeId> {
        self.named_types.get(&name).copied()
    }

    /// Id von `xs:anyType`.
    pub fn any_type(&self) -> TypeId {
        self.any_type
    }

    /// Alle Schema-Namen: URI → local-names, jeweils sortiert (EXI 7.3.1).
    pub fn schema_names(&self) -> &BTreeMap<Rc<str>, BTreeSet<Rc<str>>> {
        &self.schema_names
    }

    /// Löst einen Start-Term eines Content Models auf die ElementId auf.
    ///
    /// Substitution Group Member werden über ihre globale Deklaration
    /// gebunden, der Head über die lokale.
    pub fn bind_start(&self, ty: TypeId, term: &StartTerm) -> Result<Option<(ExpandedNameId, ElementId)>> {
        let StartTerm::Element { qname, decl } = term else {
            return Ok(None);
        };
        let ContentGrammar::Complex { model, bindings, .. } = &self.type_grammar(ty).content else {
            return Ok(None);
        };
        let name = self
            .interner
            .get_expanded(&qname.uri, &qname.local_name)
            .ok_or_else(|| Error::schema_violation(format!("element {qname} not interned")))?;
        let element = if model.element(*decl).qname() == qname {
            bindings[*decl]
        } else {
            self.global_element(name).ok_or_else(|| {
                Error::schema_violation(format!("substitution group member {qname} is not global"))
            })?
        };
        Ok(Some((name, element)))
    }
}

// ============================================================================
// Aufbau
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TypeKey {
    Named(Rc<QName>),
    Anonymous(usize),
}

struct TableBuilder<'s> {
    schema: &'s SchemaInfo,
    max_states: usize,
    interner: StringInterner,
    types: Vec<Option<TypeGrammar>>,
    type_ids: FastHashMap<TypeKey, TypeId>,
    pending: Vec<(TypeId, Rc<TypeDefinition>)>,
    elements: Vec<ElementGrammar>,
    global_elements: Vec<ElementId>,
    global_index: FastHashMap<ExpandedNameId, ElementId>,
    any_type: TypeId,
    schema_names: BTreeMap<Rc<str>, BTreeSet<Rc<str>>>,
}

impl<'s> TableBuilder<'s> {
    fn new(schema: &'s SchemaInfo, max_states: usize) -> Result<Self> {
        let mut interner = StringInterner::new();
        for uri in ["", URI_XML, URI_XSI, URI_XSD] {
            interner.intern(uri)?;
        }
        interner.intern_expanded(URI_XSI, "type")?;
        interner.intern_expanded(URI_XSI, "nil")?;

        let mut builder = Self {
            schema,
            max_states,
            interner,
            types: Vec::new(),
            type_ids: FastHashMap::default(),
            pending: Vec::new(),
            elements: Vec::new(),
            global_elements: Vec::new(),
            global_index: FastHashMap::default(),
            any_type: 0,
            schema_names: BTreeMap::new(),
        };

        // Benannte Schema-Typen zuerst: sie überschreiben gleichnamige Built-ins.
        for td in schema.type_definitions().values() {
            builder.type_id(td)?;
        }
        builder.any_type = builder.type_id(&Rc::new(any_type_definition()))?;
        for local in XSD_SIMPLE_TYPES {
            let td = TypeDefinition::simple(*local).named(QName::new(URI_XSD, *local));
            builder.type_id(&Rc::new(td))?;
        }

        for qname in schema.global_elements() {
            let Some(decl) = schema.get_element(qname) else {
                continue;
            };
            let id = builder.add_element(decl)?;
            builder.global_elements.push(id);
            builder.global_index.insert(builder.elements[id as usize].name, id);
        }
        for qname in schema.global_attributes().keys() {
            builder.record_name(qname)?;
        }
        Ok(builder)
    }

    fn finish(mut self) -> Result<SchemaGrammars> {
        while let Some((id, td)) = self.pending.pop() {
            let grammar = self.build_type(id, &td)?;
            self.types[id as usize] = Some(grammar);
        }

        let types = self
            .types
            .into_iter()
            .map(|t| t.ok_or_else(|| Error::schema_violation("unresolved type grammar")))
            .collect::<Result<Vec<_>>>()?;
        let named_types = types
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.name.map(|n| (n, i as TypeId)))
            .collect();

        Ok(SchemaGrammars {
            interner: self.interner,
            types,
            elements: self.elements,
            global_elements: self.global_elements,
            global_index: self.global_index,
            named_types,
            any_type: self.any_type,
            schema_names: self.schema_names,
        })
    }

    fn record_name(&mut self, qname: &QName) -> Result<ExpandedNameId> {
        let id = self.interner.intern_qname(qname)?;
        self.schema_names
            .entry(Rc::clone(&qname.uri))
            .or_default()
            .insert(Rc::clone(&qname.local_name));
        Ok(id)
    }

    /// Reserviert eine TypeId; der Eintrag wird in `finish` gebaut.
    fn type_id(&mut self, td: &Rc<TypeDefinition>) -> Result<TypeId> {
        let schema = self.schema;
        let td = schema.canonical_type(td);
        let key = match td.name() {
            Some(name) => TypeKey::Named(Rc::clone(name)),
            None => TypeKey::Anonymous(Rc::as_ptr(td) as usize),
        };
        if let Some(&id) = self.type_ids.get(&key) {
            return Ok(id);
        }
        let id = TypeId::try_from(self.types.len()).map_err(|_| Error::IntegerOverflow)?;
        self.types.push(None);
        self.type_ids.insert(key, id);
        self.pending.push((id, Rc::clone(td)));
        Ok(id)
    }

    fn add_element(&mut self, decl: &ElementDeclaration) -> Result<ElementId> {
        for qname in decl.matching_qnames() {
            self.record_name(qname)?;
        }
        let name = self.record_name(decl.qname())?;
        let ty = match decl.type_definition() {
            Some(td) => self.type_id(td)?,
            None => self.any_type,
        };
        let id = ElementId::try_from(self.elements.len()).map_err(|_| Error::IntegerOverflow)?;
        self.elements.push(ElementGrammar { name, nillable: decl.nillable(), ty });
        Ok(id)
    }

    /// Lokale Deklarationen, die einer globalen entsprechen, teilen deren Eintrag.
    fn bind_local(&mut self, decl: &ElementDeclaration) -> Result<ElementId> {
        let schema = self.schema;
        if let Some(global) = schema.get_element(decl.qname())
            && global.nillable() == decl.nillable()
            && match (global.type_definition(), decl.type_definition()) {
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
        {
            let name = self.interner.intern_qname(decl.qname())?;
            if let Some(&id) = self.global_index.get(&name) {
                return Ok(id);
            }
        }
        self.add_element(decl)
    }

    fn build_type(&mut self, id: TypeId, td: &Rc<TypeDefinition>) -> Result<TypeGrammar> {
        let schema = self.schema;
        let name = match td.name() {
            Some(n) => Some(self.record_name(n)?),
            None => None,
        };
        let substitutable = td.has_named_sub_types() || td.is_union() || id == self.any_type;

        let TypeDefinition::Complex { attributes, attribute_wildcard, content, .. } = &**td else {
            return Ok(TypeGrammar {
                name,
                attributes: Vec::new(),
                attribute_wildcard: None,
                content: ContentGrammar::Simple(simple_value(td)),
                substitutable,
            });
        };

        let mut uses: Vec<_> = attributes.iter().collect();
        uses.sort_by(|a, b| a.qname.cmp(&b.qname));
        let mut attribute_decls = Vec::with_capacity(uses.len());
        for use_ in uses {
            attribute_decls.push(AttributeDecl {
                name: self.record_name(&use_.qname)?,
                required: use_.required,
                value_type: use_
                    .type_definition
                    .as_ref()
                    .map(|t| Rc::clone(schema.canonical_type(t))),
            });
        }

        let attribute_wildcard = match attribute_wildcard {
            None => None,
            Some(AttributeWildcard::Any | AttributeWildcard::Not(_)) => Some(AttributeWildcardGrammar::Any),
            Some(AttributeWildcard::Namespaces(uris)) => {
                if uris.is_empty() {
                    return Err(Error::EmptyNamespaceList);
                }
                let mut ids = Vec::with_capacity(uris.len());
                for uri in uris {
                    let id = self.interner.intern(uri)?;
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                Some(AttributeWildcardGrammar::Namespaces(ids))
            }
        };

        let content = match content {
            ContentType::Empty => ContentGrammar::Empty,
            ContentType::Simple(value) => {
                ContentGrammar::Simple(Some(Rc::clone(schema.canonical_type(value))))
            }
            ContentType::ElementOnly(particle) => self.complex_content(particle, false)?,
            ContentType::Mixed(particle) => self.complex_content(particle, true)?,
        };

        Ok(TypeGrammar { name, attributes: attribute_decls, attribute_wildcard, content, substitutable })
    }

    fn complex_content(&mut self, particle: &Particle, mixed: bool) -> Result<ContentGrammar> {
        let model = ContentModel::build_with_limit(particle, self.max_states)?;
        for state in 0..model.len() {
            for start in &model.state(state as u32).starts {
                if let StartTerm::Namespace(uri) = &start.term {
                    self.interner.intern(uri)?;
                }
            }
        }
        let bindings = model
            .elements()
            .iter()
            .map(|decl| self.bind_local(decl))
            .collect::<Result<Vec<_>>>()?;
        Ok(ContentGrammar::Complex { model, mixed, bindings })
    }
}

/// Werttyp eines Simple Types; `xs:anySimpleType` validiert nicht.
fn simple_value(td: &Rc<TypeDefinition>) -> Option<Rc<TypeDefinition>> {
    let any_simple = td
        .name()
        .is_some_and(|n| &*n.uri == URI_XSD && &*n.local_name == "anySimpleType");
    (!any_simple).then(|| Rc::clone(td))
}

/// `xs:anyType`: beliebige Attribute, Mixed Content aus SE(*).
fn any_type_definition() -> TypeDefinition {
    let content = Particle::wildcard(Wildcard::any()).occurs(0, MaxOccurs::Unbounded);
    let mut td = TypeDefinition::complex(ContentType::Mixed(content))
        .named(QName::new(URI_XSD, "anyType"))
        .with_attribute_wildcard(AttributeWildcard::Any);
    td.set_named_sub_types();
    td
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeUse, ElementDeclaration};

    fn q(local: &str) -> QName {
        QName::new("", local)
    }

    fn lookup(table: &SchemaGrammars, uri: &str, local: &str) -> ExpandedNameId {
        table.interner().get_expanded(uri, local).unwrap()
    }

    #[test]
    fn empty_schema_has_builtin_types() {
        let table = SchemaGrammars::build(&SchemaInfo::empty()).unwrap();
        assert!(table.global_elements().is_empty());
        let any = table.type_grammar(table.any_type());
        assert!(any.substitutable());
        assert!(any.is_mixed());
        assert_eq!(any.attribute_wildcard(), Some(&AttributeWildcardGrammar::Any));
        let int = table.named_type(lookup(&table, URI_XSD, "int")).unwrap();
        assert!(matches!(table.type_grammar(int).content(), ContentGrammar::Simple(Some(_))));
        let any_simple = table.named_type(lookup(&table, URI_XSD, "anySimpleType")).unwrap();
        assert!(matches!(table.type_grammar(any_simple).content(), ContentGrammar::Simple(None)));
    }

    #[test]
    fn shared_named_type_has_one_id() {
        let shared = Rc::new(
            TypeDefinition::complex_empty()
                .named(QName::new("urn:t", "Point"))
                .with_attribute(AttributeUse::required(q("x"), None)),
        );
        let stub = Rc::new(TypeDefinition::complex_empty().named(QName::new("urn:t", "Point")));
        let schema = SchemaInfo::builder()
            .type_definition((*shared).clone())
            .element(ElementDeclaration::new(q("a")).with_type(Rc::clone(&shared)))
            .element(ElementDeclaration::new(q("b")).with_type(stub))
            .build()
            .unwrap();
        let table = SchemaGrammars::build(&schema).unwrap();
        let a = table.global_element(lookup(&table, "", "a")).unwrap();
        let b = table.global_element(lookup(&table, "", "b")).unwrap();
        assert_eq!(table.element(a).ty, table.element(b).ty);
        assert_eq!(table.type_grammar(table.element(a).ty).attributes().len(), 1);
    }

    #[test]
    fn attributes_sorted_and_required_located() {
        let td = Rc::new(
            TypeDefinition::complex_empty()
                .with_attribute(AttributeUse::optional(q("c"), None))
                .with_attribute(AttributeUse::required(q("b"), None))
                .with_attribute(AttributeUse::optional(q("a"), None)),
        );
        let schema = SchemaInfo::builder()
            .element(ElementDeclaration::new(q("e")).with_type(td))
            .build()
            .unwrap();
        let table = SchemaGrammars::build(&schema).unwrap();
        let e = table.global_element(lookup(&table, "", "e")).unwrap();
        let ty = table.type_grammar(table.element(e).ty);
        let names: Vec<&str> = ty
            .attributes()
            .iter()
            .map(|a| table.interner().resolve(a.name.local_name()))
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(ty.first_required(0), Some(1));
        assert_eq!(ty.first_required(2), None);
        assert!(ty.content_can_end());
    }

    #[test]
    fn local_reference_to_global_shares_entry() {
        let leaf = ElementDeclaration::new(q("leaf")).with_type(Rc::new(TypeDefinition::simple("int")));
        let root_type = Rc::new(TypeDefinition::complex(ContentType::ElementOnly(Particle::sequence(
            vec![Particle::element(leaf.clone())],
        ))));
        let schema = SchemaInfo::builder()
            .element(leaf)
            .element(ElementDeclaration::new(q("root")).with_type(root_type))
            .build()
            .unwrap();
        let table = SchemaGrammars::build(&schema).unwrap();
        let root = table.global_element(lookup(&table, "", "root")).unwrap();
        let root_ty = table.element(root).ty;
        let ContentGrammar::Complex { model, .. } = table.type_grammar(root_ty).content() else {
            panic!("Expected complex content");
        };
        let (name, bound) = table.bind_start(root_ty, &model.state(0).starts[0].term).unwrap().unwrap();
        assert_eq!(name, lookup(&table, "", "leaf"));
        assert_eq!(Some(bound), table.global_element(name));
    }

    #[test]
    fn union_types_are_substitutable() {
        let union = Rc::new(TypeDefinition::union(vec![
            Rc::new(TypeDefinition::simple("int")),
            Rc::new(TypeDefinition::simple("date")),
        ]));
        let schema = SchemaInfo::builder()
            .element(ElementDeclaration::new(q("u")).with_type(union))
            .build()
            .unwrap();
        let table = SchemaGrammars::build(&schema).unwrap();
        let u = table.global_element(lookup(&table, "", "u")).unwrap();
        assert!(table.type_grammar(table.element(u).ty).substitutable());
    }

    #[test]
    fn schema_names_are_grouped_by_uri() {
        let schema = SchemaInfo::builder()
            .element(ElementDeclaration::new(QName::new("urn:x", "b")))
            .element(ElementDeclaration::new(QName::new("urn:x", "a")))
            .global_attribute(QName::new("urn:y", "lang"), None)
            .build()
            .unwrap();
        let table = SchemaGrammars::build(&schema).unwrap();
        let names = table.schema_names();
        let x: Vec<&str> = names["urn:x"].iter().map(|s| &**s).collect();
        assert_eq!(x, vec!["a", "b"]);
        assert!(names["urn:y"].contains("lang"));
    }

    #[test]
    fn attribute_wildcard_other_maps_to_any() {
        let td = Rc::new(
            TypeDefinition::complex_empty()
                .with_attribute_wildcard(AttributeWildcard::Not(Some("urn:self".into()))),
        );
        let schema = SchemaInfo::builder()
            .element(ElementDeclaration::new(q("w")).with_type(td))
            .build()
            .unwrap();
        let table = SchemaGrammars::build(&schema).unwrap();
        let w = table.global_element(lookup(&table, "", "w")).unwrap();
        assert_eq!(
            table.type_grammar(table.element(w).ty).attribute_wildcard(),
            Some(&AttributeWildcardGrammar::Any)
        );
    }

    #[test]
    fn content_model_limit_propagates() {
        let td = Rc::new(TypeDefinition::complex(ContentType::ElementOnly(
            Particle::element(ElementDeclaration::new(q("x"))).occurs(0, MaxOccurs::Bounded(100)),
        )));
        let schema = SchemaInfo::builder()
            .element(ElementDeclaration::new(q("r")).with_type(td))
            .build()
            .unwrap();
        assert_eq!(
            SchemaGrammars::build_with_limit(&schema, 20).unwrap_err(),
            Error::ContentModelTooComplex(20)
        );
    }
}
