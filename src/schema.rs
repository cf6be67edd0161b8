//! Statisches Schema-Datenmodell für die Grammar-Generierung (EXI 8.5).
//!
//! Dieses Modul stellt `SchemaInfo` bereit: die bereits kompilierten
//! Schema-Komponenten, aus denen [`crate::schema_grammar`] die statischen
//! Grammars baut. XSD-Parsing selbst liegt außerhalb dieses Crates; Aufrufer
//! bauen das Modell über [`SchemaInfoBuilder`].
//!
//! # Referenzen
//!
//! - 8.5.1 Schema-informed Document Grammar
//! - 8.5.4.1.3 Type Grammars
//! - 8.5.4.1.4 Attribute Uses
//! - 8.5.4.1.5 Particles
//! - 8.5.4.1.6 Element Terms
//! - 8.5.4.1.7 Wildcard Terms
//! - 8.5.4.1.8 Model Group Terms

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::qname::QName;
use crate::{Error, Result};

// ============================================================================
// Simple Type Variety (XSD 1.0 Part 2 §4.1)
// ============================================================================

/// Variety eines Simple Types (XSD 1.0 Part 2 §4.1).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SimpleTypeVariety {
    /// Atomic: direkter Wert eines Built-in Typs.
    #[default]
    Atomic,
    /// List: Whitespace-separierte Liste von Werten des Item-Typs.
    List {
        /// Typ der einzelnen Listenelemente (None = anySimpleType).
        item_type: Option<Rc<TypeDefinition>>,
    },
    /// Union: Wert kann einem von mehreren Member-Typen entsprechen.
    Union {
        /// Member-Typen.
        member_types: Vec<Rc<TypeDefinition>>,
    },
}

// ============================================================================
// Type Definition (EXI 8.5.4.1.3)
// ============================================================================

/// Type-Definition (EXI 8.5.4.1.3).
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDefinition {
    /// Simple Type: nur CH-Content (EXI 8.5.4.1.3.1).
    ///
    /// ```text
    /// Type_i,0 : CH [schema-typed value] Type_i,1
    /// Type_i,1 : EE
    /// ```
    Simple {
        /// QName des Typs (Some für benannte Typen, None für anonyme).
        name: Option<Rc<QName>>,
        /// Atomic, List oder Union.
        variety: SimpleTypeVariety,
        /// QName des direkten Base-Typs (für Sub-Typ-Erkennung).
        base_type_qname: Option<Rc<QName>>,
        /// Der ultimative XSD Built-in Typ (z.B. "string", "int").
        ///
        /// Bestimmt die lexikalische Validierung (EXI 7.1).
        base_type: Option<String>,
        /// Enumerationswerte (leer = keine Enumeration-Facet).
        enumeration_values: Vec<String>,
        /// Ob benannte Typen von diesem Typ ableiten (EXI 8.5.4.4.2).
        has_named_sub_types: bool,
    },
    /// Complex Type: Attribute + Content (EXI 8.5.4.1.3.2).
    Complex {
        /// QName des Typs (Some für benannte Typen, None für anonyme).
        name: Option<Rc<QName>>,
        /// QName des Base-Typs bei Ableitung.
        base_type: Option<Rc<QName>>,
        /// Attribute Uses, beim Build nach QName sortiert (local-name, dann URI).
        attributes: Vec<AttributeUse>,
        /// Attribute Wildcard (None, Any, ##other oder Namespace-Liste).
        attribute_wildcard: Option<AttributeWildcard>,
        /// Content Type.
        content: ContentType,
        /// Ob benannte Typen von diesem Typ ableiten (EXI 8.5.4.4.2).
        has_named_sub_types: bool,
    },
}

impl TypeDefinition {
    /// Anonymer atomarer Simple Type über einem XSD Built-in (z.B. "int").
    pub fn simple(base_type: impl Into<String>) -> Self {
        TypeDefinition::Simple {
            name: None,
            variety: SimpleTypeVariety::Atomic,
            base_type_qname: None,
            base_type: Some(base_type.into()),
            enumeration_values: Vec::new(),
            has_named_sub_types: false,
        }
    }

    /// Anonymer List-Typ.
    pub fn list(item_type: Option<Rc<TypeDefinition>>) -> Self {
        TypeDefinition::Simple {
            name: None,
            variety: SimpleTypeVariety::List { item_type },
            base_type_qname: None,
            base_type: None,
            enumeration_values: Vec::new(),
            has_named_sub_types: false,
        }
    }

    /// Anonymer Union-Typ.
    pub fn union(member_types: Vec<Rc<TypeDefinition>>) -> Self {
        TypeDefinition::Simple {
            name: None,
            variety: SimpleTypeVariety::Union { member_types },
            base_type_qname: None,
            base_type: None,
            enumeration_values: Vec::new(),
            has_named_sub_types: false,
        }
    }

    /// Anonymer Complex Type mit gegebenem Content.
    pub fn complex(content: ContentType) -> Self {
        TypeDefinition::Complex {
            name: None,
            base_type: None,
            attributes: Vec::new(),
            attribute_wildcard: None,
            content,
            has_named_sub_types: false,
        }
    }

    /// Leerer Complex Type (nur Attribute, kein Content).
    pub fn complex_empty() -> Self {
        Self::complex(ContentType::Empty)
    }

    /// Builder: setzt den Typnamen.
    pub fn named(mut self, qname: QName) -> Self {
        let qname = Some(Rc::new(QName::new(qname.uri, qname.local_name)));
        match &mut self {
            TypeDefinition::Simple { name, .. } | TypeDefinition::Complex { name, .. } => {
                *name = qname
            }
        }
        self
    }

    /// Builder: setzt den Base-Typ (Ableitung).
    pub fn derived_from(mut self, base: QName) -> Self {
        let base = Some(Rc::new(QName::new(base.uri, base.local_name)));
        match &mut self {
            TypeDefinition::Simple { base_type_qname, .. } => *base_type_qname = base,
            TypeDefinition::Complex { base_type, .. } => *base_type = base,
        }
        self
    }

    /// Builder: fügt eine Attribute Use hinzu (nur Complex Types).
    pub fn with_attribute(mut self, attribute: AttributeUse) -> Self {
        if let TypeDefinition::Complex { attributes, .. } = &mut self {
            attributes.push(attribute);
        }
        self
    }

    /// Builder: setzt die Attribute Wildcard (nur Complex Types).
    pub fn with_attribute_wildcard(mut self, wildcard: AttributeWildcard) -> Self {
        if let TypeDefinition::Complex { attribute_wildcard, .. } = &mut self {
            *attribute_wildcard = Some(wildcard);
        }
        self
    }

    /// Builder: setzt Enumerationswerte (nur Simple Types).
    pub fn with_enumeration<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        if let TypeDefinition::Simple { enumeration_values, .. } = &mut self {
            *enumeration_values = values.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Gibt den QName des Typs zurück (None für anonyme Typen).
    pub fn name(&self) -> Option<&Rc<QName>> {
        match self {
            TypeDefinition::Simple { name, .. } | TypeDefinition::Complex { name, .. } => {
                name.as_ref()
            }
        }
    }

    /// Prüft ob dies ein Simple Type ist.
    pub fn is_simple(&self) -> bool {
        matches!(self, TypeDefinition::Simple { .. })
    }

    /// Prüft ob dieser Typ eine Union ist.
    ///
    /// Bei Union-Typen wird AT(xsi:type) auch bei strict=true deklariert (EXI 8.5.4.4.2).
    pub fn is_union(&self) -> bool {
        matches!(
            self,
            TypeDefinition::Simple { variety: SimpleTypeVariety::Union { .. }, .. }
        )
    }

    /// Prüft ob benannte Typen von diesem Typ ableiten (EXI 8.5.4.4.2).
    pub fn has_named_sub_types(&self) -> bool {
        match self {
            TypeDefinition::Simple { has_named_sub_types, .. }
            | TypeDefinition::Complex { has_named_sub_types, .. } => *has_named_sub_types,
        }
    }

    /// Gibt die Enumeration-Facet-Werte zurück.
    pub fn enumeration_values(&self) -> &[String] {
        match self {
            TypeDefinition::Simple { enumeration_values, .. } => enumeration_values,
            TypeDefinition::Complex { .. } => &[],
        }
    }

    /// QName des direkten Base-Typs.
    pub fn base_type_qname(&self) -> Option<&Rc<QName>> {
        match self {
            TypeDefinition::Simple { base_type_qname, .. } => base_type_qname.as_ref(),
            TypeDefinition::Complex { base_type, .. } => base_type.as_ref(),
        }
    }

    /// Attribute Uses (leer bei Simple Types).
    pub fn attributes(&self) -> &[AttributeUse] {
        match self {
            TypeDefinition::Complex { attributes, .. } => attributes,
            TypeDefinition::Simple { .. } => &[],
        }
    }

    /// Gibt die Attribute Wildcard dieses Typs zurück (nur für Complex Types).
    pub fn attribute_wildcard(&self) -> Option<&AttributeWildcard> {
        match self {
            TypeDefinition::Complex { attribute_wildcard, .. } => attribute_wildcard.as_ref(),
            TypeDefinition::Simple { .. } => None,
        }
    }

    pub(crate) fn set_named_sub_types(&mut self) {
        match self {
            TypeDefinition::Simple { has_named_sub_types, .. }
            | TypeDefinition::Complex { has_named_sub_types, .. } => *has_named_sub_types = true,
        }
    }
}

// ============================================================================
// Attribute Use (EXI 8.5.4.1.4)
// ============================================================================

/// Attribute Use für Complex Type Grammars (EXI 8.5.4.1.4).
///
/// ```text
/// Attribute_i,0 : AT(qname) [schema-typed value] Attribute_i,1
/// Attribute_i,0 : EE                          // nur falls optional
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeUse {
    /// QName des Attributs.
    pub qname: Rc<QName>,
    /// Ob das Attribut required ist.
    pub required: bool,
    /// Typ des Attributwerts. None = anySimpleType (jeder Wert gültig).
    pub type_definition: Option<Rc<TypeDefinition>>,
}

impl AttributeUse {
    /// Optionale Attribute Use.
    pub fn optional(qname: QName, type_definition: Option<Rc<TypeDefinition>>) -> Self {
        Self { qname: Rc::new(qname), required: false, type_definition }
    }

    /// Required Attribute Use.
    pub fn required(qname: QName, type_definition: Option<Rc<TypeDefinition>>) -> Self {
        Self { qname: Rc::new(qname), required: true, type_definition }
    }
}

// ============================================================================
// Attribute Wildcard (EXI 8.5.4.1.3.2)
// ============================================================================

/// Attribute Wildcard für Complex Type Grammars (EXI 8.5.4.1.3.2).
///
/// ```text
/// G_i,0 : AT(*) G_i,0          // Any, Not
/// G_i,0 : AT(uri_x:*) G_i,0    // je URI der Namespace-Liste
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeWildcard {
    /// ##any.
    Any,
    /// ##other: nicht im angegebenen Namespace (None = absent).
    Not(Option<String>),
    /// Namespace-Liste. Leerer String "" repräsentiert "absent".
    Namespaces(Vec<String>),
}

// ============================================================================
// Content Type (EXI 8.5.4.1.3.2)
// ============================================================================

/// Content Type für Complex Type Grammars (EXI 8.5.4.1.3.2).
#[derive(Debug, Clone, PartialEq)]
pub enum ContentType {
    /// Empty Content: nur EE.
    Empty,
    /// Simple Content mit dem Typ des Werts.
    Simple(Rc<TypeDefinition>),
    /// Element-Only Content.
    ElementOnly(Particle),
    /// Mixed Content: Particle + CH an jeder Stelle.
    Mixed(Particle),
}

// ============================================================================
// Particles (EXI 8.5.4.1.5 - 8.5.4.1.8)
// ============================================================================

/// MaxOccurs Constraint für Particles (EXI 8.5.4.1.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxOccurs {
    /// Endliche Obergrenze.
    Bounded(usize),
    /// `{max occurs} = unbounded`.
    Unbounded,
}

/// processContents Attribut für Wildcards (XSD 1.0 Part 1 §3.10).
///
/// Die Grammar ist davon unabhängig; das Feld dokumentiert das Modell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessContents {
    /// strict (default).
    #[default]
    Strict,
    /// lax.
    Lax,
    /// skip.
    Skip,
}

/// Namespace Constraint für Wildcards (EXI 8.5.4.1.7).
///
/// - `Any` und `Not` erzeugen SE(*)
/// - `Namespaces` erzeugt SE(uri:*) für jede URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WildcardConstraint {
    /// ##any.
    Any,
    /// ##other. `None` = absent.
    Not(Option<String>),
    /// Explizite Namespace-Liste. Leerer String "" repräsentiert "absent".
    Namespaces(Vec<String>),
}

/// Wildcard mit Namespace-Constraint und processContents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wildcard {
    /// Namespace-Constraint.
    pub constraint: WildcardConstraint,
    /// processContents.
    pub process_contents: ProcessContents,
}

impl Wildcard {
    /// Wildcard mit gegebener Constraint (processContents strict).
    pub fn new(constraint: WildcardConstraint) -> Self {
        Self { constraint, process_contents: ProcessContents::default() }
    }

    /// ##any Wildcard.
    pub fn any() -> Self {
        Self::new(WildcardConstraint::Any)
    }

    /// Wildcard über eine Namespace-Liste.
    pub fn namespaces<S: Into<String>>(uris: impl IntoIterator<Item = S>) -> Self {
        Self::new(WildcardConstraint::Namespaces(uris.into_iter().map(Into::into).collect()))
    }
}

/// Element Declaration (EXI 8.5.4.1.6).
///
/// Die Substitution Group enthält die Member E_1..E_{n-1}; E_0 ist das
/// Element selbst. Member müssen globale Elemente sein.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDeclaration {
    pub(crate) qname: Rc<QName>,
    pub(crate) substitution_group: Vec<Rc<QName>>,
    /// Head + Members, sortiert nach local-name dann URI.
    sorted_matching_qnames: Vec<Rc<QName>>,
    pub(crate) nillable: bool,
    pub(crate) type_definition: Option<Rc<TypeDefinition>>,
}

impl ElementDeclaration {
    /// Erstellt eine ElementDeclaration ohne Substitution Group.
    pub fn new(qname: QName) -> Self {
        let qname = Rc::new(QName::new(qname.uri, qname.local_name));
        Self {
            sorted_matching_qnames: vec![Rc::clone(&qname)],
            qname,
            substitution_group: Vec::new(),
            nillable: false,
            type_definition: None,
        }
    }

    /// Builder: setzt die Substitution Group (ohne das Element selbst).
    pub fn with_substitution_group(mut self, members: impl IntoIterator<Item = QName>) -> Self {
        self.substitution_group = members
            .into_iter()
            .map(|q| Rc::new(QName::new(q.uri, q.local_name)))
            .collect();
        self.finalize_matching_qnames();
        self
    }

    /// Builder: setzt nillable.
    pub fn with_nillable(mut self, nillable: bool) -> Self {
        self.nillable = nillable;
        self
    }

    /// Builder: setzt die Type-Definition.
    pub fn with_type(mut self, type_def: Rc<TypeDefinition>) -> Self {
        self.type_definition = Some(type_def);
        self
    }

    /// Gibt den QName des Elements zurück.
    pub fn qname(&self) -> &Rc<QName> {
        &self.qname
    }

    /// Gibt die Substitution Group zurück.
    pub fn substitution_group(&self) -> &[Rc<QName>] {
        &self.substitution_group
    }

    /// Gibt zurück ob das Element nillable ist.
    pub fn nillable(&self) -> bool {
        self.nillable
    }

    /// Gibt die Type-Definition zurück (None = xs:anyType).
    pub fn type_definition(&self) -> Option<&Rc<TypeDefinition>> {
        self.type_definition.as_ref()
    }

    /// Alle QNames die dieses Element matchen (Head + Substitution Group),
    /// sortiert nach local-name, dann URI (EXI 8.5.4.1.6).
    pub fn matching_qnames(&self) -> impl Iterator<Item = &Rc<QName>> + '_ {
        self.sorted_matching_qnames.iter()
    }

    fn finalize_matching_qnames(&mut self) {
        let mut all: Vec<Rc<QName>> = std::iter::once(Rc::clone(&self.qname))
            .chain(self.substitution_group.iter().cloned())
            .collect();
        all.sort();
        all.dedup_by(|a, b| **a == **b);
        self.sorted_matching_qnames = all;
    }
}

/// Model Group Compositor (EXI 8.5.4.1.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compositor {
    /// Particles in Reihenfolge (8.5.4.1.8.1).
    Sequence,
    /// Genau ein Particle (8.5.4.1.8.2).
    Choice,
    /// Particles in beliebiger Reihenfolge, je höchstens einmal (8.5.4.1.8.3).
    All,
}

/// Model Group (EXI 8.5.4.1.8).
#[derive(Debug, Clone, PartialEq)]
pub struct ModelGroup {
    /// Kombinationsregel.
    pub compositor: Compositor,
    /// Particles der Group, in Deklarationsreihenfolge.
    pub particles: Vec<Particle>,
}

impl ModelGroup {
    /// Erstellt eine neue Model Group.
    pub fn new(compositor: Compositor, particles: Vec<Particle>) -> Self {
        Self { compositor, particles }
    }

    /// Sequence.
    pub fn sequence(particles: Vec<Particle>) -> Self {
        Self::new(Compositor::Sequence, particles)
    }

    /// Choice.
    pub fn choice(particles: Vec<Particle>) -> Self {
        Self::new(Compositor::Choice, particles)
    }

    /// All Group.
    pub fn all(particles: Vec<Particle>) -> Self {
        Self::new(Compositor::All, particles)
    }
}

/// Particle Term (EXI 8.5.4.1.5).
#[derive(Debug, Clone, PartialEq)]
pub enum ParticleTerm {
    /// Element Declaration (8.5.4.1.6).
    Element(ElementDeclaration),
    /// Wildcard (8.5.4.1.7).
    Wildcard(Wildcard),
    /// Model Group (8.5.4.1.8).
    ModelGroup(ModelGroup),
}

/// Particle: Term mit Wiederholungsgrenzen (EXI 8.5.4.1.5).
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Minimale Anzahl Vorkommen.
    pub min_occurs: usize,
    /// Maximale Anzahl Vorkommen.
    pub max_occurs: MaxOccurs,
    /// Der Term.
    pub term: ParticleTerm,
}

impl Particle {
    /// Erstellt ein Particle mit Validierung.
    ///
    /// # Fehler
    ///
    /// `Error::InvalidParticleOccurs` wenn max < min.
    pub fn new(min_occurs: usize, max_occurs: MaxOccurs, term: ParticleTerm) -> Result<Self> {
        let p = Self { min_occurs, max_occurs, term };
        p.validate()?;
        Ok(p)
    }

    /// Erstellt ein Particle ohne Validierung. `SchemaInfoBuilder::build`
    /// prüft alle Particles erneut.
    pub fn new_unchecked(min_occurs: usize, max_occurs: MaxOccurs, term: ParticleTerm) -> Self {
        Self { min_occurs, max_occurs, term }
    }

    /// min=max=1.
    pub fn once(term: ParticleTerm) -> Self {
        Self::new_unchecked(1, MaxOccurs::Bounded(1), term)
    }

    /// min=0, max=1.
    pub fn optional(term: ParticleTerm) -> Self {
        Self::new_unchecked(0, MaxOccurs::Bounded(1), term)
    }

    /// min=0, max=unbounded.
    pub fn zero_or_more(term: ParticleTerm) -> Self {
        Self::new_unchecked(0, MaxOccurs::Unbounded, term)
    }

    /// min=1, max=unbounded.
    pub fn one_or_more(term: ParticleTerm) -> Self {
        Self::new_unchecked(1, MaxOccurs::Unbounded, term)
    }

    /// Element-Particle mit genau einem Vorkommen.
    pub fn element(decl: ElementDeclaration) -> Self {
        Self::once(ParticleTerm::Element(decl))
    }

    /// Wildcard-Particle mit genau einem Vorkommen.
    pub fn wildcard(wildcard: Wildcard) -> Self {
        Self::once(ParticleTerm::Wildcard(wildcard))
    }

    /// Sequence-Particle mit genau einem Vorkommen.
    pub fn sequence(particles: Vec<Particle>) -> Self {
        Self::once(ParticleTerm::ModelGroup(ModelGroup::sequence(particles)))
    }

    /// Choice-Particle mit genau einem Vorkommen.
    pub fn choice(particles: Vec<Particle>) -> Self {
        Self::once(ParticleTerm::ModelGroup(ModelGroup::choice(particles)))
    }

    /// All-Particle mit genau einem Vorkommen.
    pub fn all(particles: Vec<Particle>) -> Self {
        Self::once(ParticleTerm::ModelGroup(ModelGroup::all(particles)))
    }

    /// Builder: setzt die Occurs-Grenzen.
    pub fn occurs(mut self, min_occurs: usize, max_occurs: MaxOccurs) -> Self {
        self.min_occurs = min_occurs;
        self.max_occurs = max_occurs;
        self
    }

    /// Validiert Particle Constraints rekursiv.
    ///
    /// # Fehler
    ///
    /// - `Error::InvalidParticleOccurs` wenn max < min
    /// - `Error::EmptyNamespaceList` bei Wildcard mit leerer Namespace-Liste
    pub fn validate(&self) -> Result<()> {
        if let MaxOccurs::Bounded(max) = self.max_occurs
            && max < self.min_occurs
        {
            return Err(Error::InvalidParticleOccurs { min: self.min_occurs, max });
        }
        match &self.term {
            ParticleTerm::Element(_) => Ok(()),
            ParticleTerm::Wildcard(w) => match &w.constraint {
                WildcardConstraint::Namespaces(list) if list.is_empty() => {
                    Err(Error::EmptyNamespaceList)
                }
                _ => Ok(()),
            },
            ParticleTerm::ModelGroup(group) => {
                group.particles.iter().try_for_each(Particle::validate)
            }
        }
    }

    /// Durchläuft alle Element-Deklarationen dieses Particles (pre-order).
    pub(crate) fn for_each_element<'a>(&'a self, f: &mut impl FnMut(&'a ElementDeclaration)) {
        match &self.term {
            ParticleTerm::Element(decl) => f(decl),
            ParticleTerm::Wildcard(_) => {}
            ParticleTerm::ModelGroup(group) => {
                for p in &group.particles {
                    p.for_each_element(f);
                }
            }
        }
    }
}

// ============================================================================
// SchemaInfo
// ============================================================================

/// Kompiliertes Schema: globale Element-Deklarationen, benannte Typen und
/// globale Attribute.
///
/// # Sortierung (EXI 8.5.1)
///
/// Globale Elemente sind lexikografisch sortiert, erst nach local-name, dann
/// nach URI.
///
/// # Beispiel
///
/// ```
/// use exi_grammar::schema::{ElementDeclaration, SchemaInfo};
/// use exi_grammar::qname::QName;
///
/// let schema = SchemaInfo::builder()
///     .element(ElementDeclaration::new(QName::new("http://example.org", "book")))
///     .element(ElementDeclaration::new(QName::new("http://example.org", "author")))
///     .build()
///     .unwrap();
///
/// assert_eq!(&*schema.global_elements()[0].local_name, "author");
/// assert_eq!(&*schema.global_elements()[1].local_name, "book");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SchemaInfo {
    global_elements: Vec<Rc<QName>>,
    element_declarations: BTreeMap<Rc<QName>, Rc<ElementDeclaration>>,
    type_definitions: BTreeMap<Rc<QName>, Rc<TypeDefinition>>,
    global_attribute_types: BTreeMap<Rc<QName>, Option<Rc<TypeDefinition>>>,
}

impl SchemaInfo {
    /// Erstellt einen Builder für SchemaInfo.
    pub fn builder() -> SchemaInfoBuilder {
        SchemaInfoBuilder::default()
    }

    /// Leeres Schema: alle Elemente laufen über Built-in Grammars.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Globale Element-QNames, sortiert (EXI 8.5.1).
    pub fn global_elements(&self) -> &[Rc<QName>] {
        &self.global_elements
    }

    /// Globale Element-Deklarationen.
    pub fn element_declarations(&self) -> &BTreeMap<Rc<QName>, Rc<ElementDeclaration>> {
        &self.element_declarations
    }

    /// Sucht eine globale Element-Deklaration nach QName.
    pub fn get_element(&self, qname: &QName) -> Option<&Rc<ElementDeclaration>> {
        self.element_declarations.get(qname)
    }

    /// Benannte Type-Definitionen.
    pub fn type_definitions(&self) -> &BTreeMap<Rc<QName>, Rc<TypeDefinition>> {
        &self.type_definitions
    }

    /// Sucht eine benannte Type-Definition.
    pub fn get_type(&self, qname: &QName) -> Option<&Rc<TypeDefinition>> {
        self.type_definitions.get(qname)
    }

    /// Globale Attribute mit ihrem Typ (None = anySimpleType).
    pub fn global_attributes(&self) -> &BTreeMap<Rc<QName>, Option<Rc<TypeDefinition>>> {
        &self.global_attribute_types
    }

    /// Löst einen Typ auf die kanonische Definition auf.
    ///
    /// Benannte Typen werden über die Typ-Tabelle aufgelöst, damit abgeleitete
    /// Flags (`has_named_sub_types`) überall gleich sind.
    pub fn canonical_type<'a>(&'a self, td: &'a Rc<TypeDefinition>) -> &'a Rc<TypeDefinition> {
        td.name().and_then(|n| self.type_definitions.get(n)).unwrap_or(td)
    }
}

/// Builder für SchemaInfo.
#[derive(Debug, Clone, Default)]
pub struct SchemaInfoBuilder {
    elements: Vec<ElementDeclaration>,
    types: Vec<TypeDefinition>,
    global_attributes: Vec<(QName, Option<Rc<TypeDefinition>>)>,
}

impl SchemaInfoBuilder {
    /// Fügt eine globale Element-Deklaration hinzu.
    pub fn element(mut self, decl: ElementDeclaration) -> Self {
        self.elements.push(decl);
        self
    }

    /// Fügt mehrere globale Element-Deklarationen hinzu.
    pub fn elements(mut self, decls: impl IntoIterator<Item = ElementDeclaration>) -> Self {
        self.elements.extend(decls);
        self
    }

    /// Fügt eine benannte Type-Definition hinzu.
    pub fn type_definition(mut self, def: TypeDefinition) -> Self {
        self.types.push(def);
        self
    }

    /// Fügt ein globales Attribut hinzu.
    pub fn global_attribute(mut self, qname: QName, type_def: Option<Rc<TypeDefinition>>) -> Self {
        self.global_attributes.push((qname, type_def));
        self
    }

    /// Baut das SchemaInfo.
    ///
    /// Sortiert globale Elemente und Attribute Uses (local-name, dann URI),
    /// setzt `has_named_sub_types` aus den Ableitungen der benannten Typen
    /// und validiert alle Particles.
    ///
    /// # Fehler
    ///
    /// - `Error::SchemaViolation` bei anonymen Typen in der Typ-Tabelle,
    ///   doppelten Namen oder unbekannten Substitution-Group-Membern
    /// - `Error::InvalidParticleOccurs` / `Error::EmptyNamespaceList` aus
    ///   der Particle-Validierung
    pub fn build(self) -> Result<SchemaInfo> {
        let derived_bases: BTreeSet<Rc<QName>> = self
            .types
            .iter()
            .filter_map(|td| td.base_type_qname().cloned())
            .collect();

        let mut type_definitions = BTreeMap::new();
        for mut td in self.types {
            let Some(name) = td.name().cloned() else {
                return Err(Error::schema_violation("type table entry without a name"));
            };
            if derived_bases.contains(&name) {
                td.set_named_sub_types();
            }
            sort_attribute_uses(&mut td);
            validate_type(&td)?;
            if type_definitions.insert(name.clone(), Rc::new(td)).is_some() {
                return Err(Error::schema_violation(format!("duplicate type {name}")));
            }
        }

        let mut element_declarations = BTreeMap::new();
        for decl in self.elements {
            if let Some(td) = &decl.type_definition {
                validate_type(td)?;
            }
            let name = Rc::clone(&decl.qname);
            if element_declarations.insert(name.clone(), Rc::new(decl)).is_some() {
                return Err(Error::schema_violation(format!("duplicate element {name}")));
            }
        }
        for decl in element_declarations.values() {
            if let Some(member) = decl
                .substitution_group
                .iter()
                .find(|m| !element_declarations.contains_key(m.as_ref()))
            {
                return Err(Error::schema_violation(format!(
                    "substitution group member {member} of {} is not a global element",
                    decl.qname
                )));
            }
        }

        let global_elements = element_declarations.keys().cloned().collect();
        let global_attribute_types = self
            .global_attributes
            .into_iter()
            .map(|(q, td)| (Rc::new(QName::new(q.uri, q.local_name)), td))
            .collect();

        Ok(SchemaInfo {
            global_elements,
            element_declarations,
            type_definitions,
            global_attribute_types,
        })
    }
}

/// Attribute Uses werden nach local-name, dann URI sortiert (EXI 8.5.4.1.3.2).
fn sort_attribute_uses(td: &mut TypeDefinition) {
    if let TypeDefinition::Complex { attributes, .. } = td {
        attributes.sort_by(|a, b| a.qname.cmp(&b.qname));
    }
}

fn validate_type(td: &TypeDefinition) -> Result<()> {
    match td {
        TypeDefinition::Complex { content, attributes, attribute_wildcard, .. } => {
            if let Some(AttributeWildcard::Namespaces(list)) = attribute_wildcard
                && list.is_empty()
            {
                return Err(Error::EmptyNamespaceList);
            }
            let mut seen = BTreeSet::new();
            if let Some(dup) = attributes.iter().find(|a| !seen.insert(Rc::clone(&a.qname))) {
                return Err(Error::schema_violation(format!(
                    "duplicate attribute use {}",
                    dup.qname
                )));
            }
            match content {
                ContentType::ElementOnly(p) | ContentType::Mixed(p) => p.validate(),
                ContentType::Empty | ContentType::Simple(_) => Ok(()),
            }
        }
        TypeDefinition::Simple { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(local: &str) -> ElementDeclaration {
        ElementDeclaration::new(QName::new("", local))
    }

    #[test]
    fn global_elements_sorted_by_local_name_then_uri() {
        let schema = SchemaInfo::builder()
            .element(ElementDeclaration::new(QName::new("http://z.org", "item")))
            .element(ElementDeclaration::new(QName::new("http://a.org", "item")))
            .element(el("apple"))
            .element(el("item"))
            .build()
            .unwrap();
        let names: Vec<String> = schema.global_elements().iter().map(|q| q.to_string()).collect();
        assert_eq!(names, vec!["apple", "item", "{http://a.org}item", "{http://z.org}item"]);
    }

    #[test]
    fn duplicate_elements_are_rejected() {
        let err = SchemaInfo::builder().element(el("a")).element(el("a")).build().unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
    }

    #[test]
    fn particle_occurs_are_validated() {
        assert_eq!(
            Particle::new(2, MaxOccurs::Bounded(1), ParticleTerm::Element(el("a"))),
            Err(Error::InvalidParticleOccurs { min: 2, max: 1 })
        );
        let bad = Particle::sequence(vec![
            Particle::element(el("a")).occurs(3, MaxOccurs::Bounded(2)),
        ]);
        let td = Rc::new(TypeDefinition::complex(ContentType::ElementOnly(bad)));
        let err = SchemaInfo::builder().element(el("r").with_type(td)).build().unwrap_err();
        assert_eq!(err, Error::InvalidParticleOccurs { min: 3, max: 2 });
    }

    #[test]
    fn occurrence_shorthands() {
        let term = || ParticleTerm::Element(el("a"));
        let bounds = |p: Particle| (p.min_occurs, p.max_occurs);
        assert_eq!(bounds(Particle::optional(term())), (0, MaxOccurs::Bounded(1)));
        assert_eq!(bounds(Particle::zero_or_more(term())), (0, MaxOccurs::Unbounded));
        assert_eq!(bounds(Particle::one_or_more(term())), (1, MaxOccurs::Unbounded));
        assert!(Particle::one_or_more(term()).validate().is_ok());
    }

    #[test]
    fn simple_and_complex_types_are_distinguished() {
        let string = Rc::new(TypeDefinition::simple("string"));
        assert!(string.is_simple());
        let complex = TypeDefinition::complex(ContentType::Simple(Rc::clone(&string)));
        assert!(!complex.is_simple());
        assert!(!TypeDefinition::complex_empty().is_simple());
    }

    #[test]
    fn empty_namespace_list_is_rejected() {
        let p = Particle::wildcard(Wildcard::namespaces(Vec::<String>::new()));
        assert_eq!(p.validate(), Err(Error::EmptyNamespaceList));
        let td = TypeDefinition::complex_empty()
            .named(QName::new("", "T"))
            .with_attribute_wildcard(AttributeWildcard::Namespaces(vec![]));
        let err = SchemaInfo::builder().type_definition(td).build().unwrap_err();
        assert_eq!(err, Error::EmptyNamespaceList);
    }

    #[test]
    fn named_sub_types_are_derived_from_base_references() {
        let schema = SchemaInfo::builder()
            .type_definition(TypeDefinition::complex_empty().named(QName::new("urn:t", "Base")))
            .type_definition(
                TypeDefinition::complex_empty()
                    .named(QName::new("urn:t", "Derived"))
                    .derived_from(QName::new("urn:t", "Base")),
            )
            .build()
            .unwrap();
        assert!(schema.get_type(&QName::new("urn:t", "Base")).unwrap().has_named_sub_types());
        assert!(!schema.get_type(&QName::new("urn:t", "Derived")).unwrap().has_named_sub_types());
    }

    #[test]
    fn anonymous_type_in_table_is_rejected() {
        let err = SchemaInfo::builder()
            .type_definition(TypeDefinition::simple("string"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
    }

    #[test]
    fn attribute_uses_are_sorted() {
        let td = TypeDefinition::complex_empty()
            .named(QName::new("", "T"))
            .with_attribute(AttributeUse::optional(QName::new("", "b"), None))
            .with_attribute(AttributeUse::required(QName::new("urn:x", "a"), None))
            .with_attribute(AttributeUse::optional(QName::new("", "a"), None));
        let schema = SchemaInfo::builder().type_definition(td).build().unwrap();
        let attrs = schema.get_type(&QName::new("", "T")).unwrap().attributes();
        let names: Vec<String> = attrs.iter().map(|a| a.qname.to_string()).collect();
        assert_eq!(names, vec!["a", "{urn:x}a", "b"]);
    }

    #[test]
    fn substitution_group_members_sorted_and_checked() {
        let head = el("head").with_substitution_group([QName::new("", "beta"), QName::new("", "alpha")]);
        let names: Vec<&str> = head.matching_qnames().map(|q| &*q.local_name).collect();
        assert_eq!(names, vec!["alpha", "beta", "head"]);

        let err = SchemaInfo::builder().element(head.clone()).build().unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
        assert!(
            SchemaInfo::builder()
                .element(head)
                .element(el("alpha"))
                .element(el("beta"))
                .build()
                .is_ok()
        );
    }

    #[test]
    fn canonical_type_prefers_table_entry() {
        let name = QName::new("urn:t", "Base");
        let schema = SchemaInfo::builder()
            .type_definition(TypeDefinition::complex_empty().named(name.clone()))
            .type_definition(
                TypeDefinition::complex_empty()
                    .named(QName::new("urn:t", "Sub"))
                    .derived_from(name.clone()),
            )
            .build()
            .unwrap();
        let stale = Rc::new(TypeDefinition::complex_empty().named(name));
        assert!(schema.canonical_type(&stale).has_named_sub_types());
    }

    #[test]
    fn prefixes_are_dropped_from_declarations() {
        let decl = ElementDeclaration::new(QName::with_prefix("urn:a", "x", "p"));
        assert!(decl.qname().prefix.is_none());
    }
}
