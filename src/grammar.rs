//! Grammar-Zustände und deklarierte Productions (EXI 8.1, 8.4, 8.5).
//!
//! Ein Grammar-Zustand ist ein kleiner `Copy`-Wert ([`GrammarId`]); die
//! Productions werden aus der statischen Tabelle ([`SchemaGrammars`]) erst
//! bei Bedarf abgeleitet. Gelernte Productions leben getrennt davon in
//! einem [`GrammarNode`] pro Zustand.
//!
//! # Reihenfolge der deklarierten Productions (Tier 1)
//!
//! Für Start-Tag und Element-Content gilt die Kategorien-Reihenfolge:
//!
//! 1. `AT(xsi:type)` (nur bei ersetzbarem Typ, vor dem ersten Attribut)
//! 2. `AT(xsi:nil)` (nur nillable, vor dem ersten Attribut)
//! 3. `AT(q)` der noch offenen Attribute bis einschließlich dem nächsten
//!    Pflicht-Attribut
//! 4. `SE(q)` in DFA-Reihenfolge
//! 5. `EE` wenn kein Pflicht-Attribut fehlt und der Content enden kann
//! 6. `AT(uri:*)`, dann `AT(*)`
//! 7. `SE(uri:*)`, dann `SE(*)`
//! 8. `CH` (typed) bzw. `CH` untyped bei Mixed Content
//!
//! Gelernte Productions folgen danach (siehe [`GrammarNode`]), Escapes
//! kommen aus [`crate::undeclared`].

use std::fmt;

use log::{debug, warn};

use crate::content_model::{StartTerm, StateId};
use crate::options::ExiOptions;
use crate::qname::{ExpandedNameId, InternedStr};
use crate::schema_grammar::{AttributeWildcardGrammar, ContentGrammar, ElementId, SchemaGrammars, TypeId};
use crate::{Error, Result};

/// Obergrenze gelernter Productions pro Grammar-Zustand.
///
/// Danach wird nicht mehr gelernt; die Escapes bleiben nutzbar.
pub const MAX_LEARNED_PRODUCTIONS: usize = 100_000;

// ============================================================================
// Grammar-Zustand
// ============================================================================

/// Fortschritt innerhalb eines Start-Tags (EXI 8.5.4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagStage {
    /// Direkt nach SE.
    Initial,
    /// Nach SC; SC wird nicht erneut angeboten.
    SelfContained,
    /// Nach `xsi:type`; nur noch `xsi:nil` ist als xsi-Attribut erlaubt.
    Typed,
    /// Nach `xsi:nil="false"` oder einem gewöhnlichen Attribut.
    Settled,
    /// Nach `xsi:nil="true"`: nur noch Attribute und EE.
    Nilled,
}

impl TagStage {
    /// Ob `xsi:type` an dieser Stelle stehen darf.
    pub fn offers_xsi_type(self) -> bool {
        matches!(self, Self::Initial | Self::SelfContained)
    }

    /// Ob `xsi:nil` an dieser Stelle stehen darf.
    pub fn offers_xsi_nil(self) -> bool {
        matches!(self, Self::Initial | Self::SelfContained | Self::Typed)
    }

    /// Stage nach einem gewöhnlichen Attribut.
    pub fn after_attribute(self) -> Self {
        match self {
            Self::Nilled => Self::Nilled,
            _ => Self::Settled,
        }
    }
}

/// Phase einer Built-in Element Grammar (EXI 8.4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltInPhase {
    /// StartTagContent.
    StartTag,
    /// ElementContent.
    Content,
}

/// Identität eines Grammar-Zustands.
///
/// Zwei gleiche Ids liefern unter denselben Options und demselben
/// Lernstand dieselbe Event Type List.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrammarId {
    /// Vor SD, für Dokument und Fragment.
    DocumentStart,
    /// Nach SD: genau ein Root-Element.
    DocumentContent,
    /// Nach dem Root-Element: nur noch ED.
    DocumentEnd,
    /// Fragment-Inhalt: beliebig viele Top-Level-Elemente, dann ED.
    FragmentContent,
    /// Start-Tag eines schema-informierten Elements.
    StartTag {
        /// Typ des Elements (nach xsi:type der neue Typ).
        ty: TypeId,
        /// Ob das Element nillable ist.
        nillable: bool,
        /// Index des nächsten deklarierten Attributs.
        attr: u16,
        /// Fortschritt im Start-Tag.
        stage: TagStage,
    },
    /// Complex oder Empty Content nach dem Start-Tag.
    Content {
        /// Typ des Elements.
        ty: TypeId,
        /// DFA-Zustand (bei Empty Content immer 0).
        state: StateId,
    },
    /// Simple Content vor (`after == false`) oder nach dem Wert.
    Simple {
        /// Typ des Elements.
        ty: TypeId,
        /// Ob der Wert schon geschrieben wurde.
        after: bool,
    },
    /// Built-in Element Grammar eines nicht deklarierten Elements.
    BuiltIn {
        /// Name des Elements.
        qname: ExpandedNameId,
        /// Phase.
        phase: BuiltInPhase,
    },
}

impl GrammarId {
    /// Ob Attribute, NS und SC hier noch möglich sind.
    pub fn is_start_tag(&self) -> bool {
        matches!(
            self,
            Self::StartTag { .. } | Self::BuiltIn { phase: BuiltInPhase::StartTag, .. }
        )
    }

    /// Ob der Zustand zu einem Element gehört (nicht Dokument/Fragment).
    pub fn is_element(&self) -> bool {
        !matches!(
            self,
            Self::DocumentStart | Self::DocumentContent | Self::DocumentEnd | Self::FragmentContent
        )
    }

    /// Typ des Elements, falls schema-informiert.
    pub fn type_id(&self) -> Option<TypeId> {
        match *self {
            Self::StartTag { ty, .. } | Self::Content { ty, .. } | Self::Simple { ty, .. } => Some(ty),
            _ => None,
        }
    }
}

impl fmt::Display for GrammarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DocumentStart => write!(f, "Document"),
            Self::DocumentContent => write!(f, "DocContent"),
            Self::DocumentEnd => write!(f, "DocEnd"),
            Self::FragmentContent => write!(f, "FragmentContent"),
            Self::StartTag { ty, attr, stage, .. } => write!(f, "StartTag(type {ty}, attr {attr}, {stage:?})"),
            Self::Content { ty, state } => write!(f, "Content(type {ty}, state {state})"),
            Self::Simple { ty, after } => {
                write!(f, "Simple(type {ty}, {})", if *after { "after value" } else { "before value" })
            }
            Self::BuiltIn { phase, .. } => write!(f, "BuiltIn({phase:?})"),
        }
    }
}

// ============================================================================
// Terminals und Productions
// ============================================================================

/// Variante eines SE-Terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartElementKind {
    /// SE(qname).
    QName(ExpandedNameId),
    /// SE(uri:*).
    NamespaceWildcard(InternedStr),
    /// SE(*).
    Wildcard,
}

/// Variante eines AT-Terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// AT(qname) mit typisiertem Wert.
    QName(ExpandedNameId),
    /// AT(qname) [untyped value] (EXI 8.5.4.4.2).
    QNameUntyped(ExpandedNameId),
    /// AT(uri:*).
    NamespaceWildcard(InternedStr),
    /// AT(*).
    Wildcard,
    /// AT(*) [untyped value].
    WildcardUntyped,
}

/// Terminal-Symbol einer Production (EXI 8.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terminal {
    /// SD
    StartDocument,
    /// ED
    EndDocument,
    /// SE in einer der drei Varianten.
    StartElement(StartElementKind),
    /// EE
    EndElement,
    /// AT in einer der fünf Varianten.
    Attribute(AttributeKind),
    /// AT(xsi:type), Wert ist ein QName.
    XsiType,
    /// AT(xsi:nil), Wert ist ein Boolean.
    XsiNil,
    /// CH mit typisiertem Wert.
    Characters,
    /// CH [untyped value].
    CharactersUntyped,
    /// NS
    NamespaceDecl,
    /// SC
    SelfContained,
    /// CM
    Comment,
    /// PI
    ProcessingInstr,
}

impl Terminal {
    /// SE(*), SE(uri:*), AT(*), AT(*)[untyped] oder AT(uri:*).
    ///
    /// Bei diesen Terminals muss der Name mit dem Event übertragen werden.
    pub fn is_wildcard(&self) -> bool {
        matches!(
            self,
            Terminal::StartElement(StartElementKind::Wildcard | StartElementKind::NamespaceWildcard(_))
                | Terminal::Attribute(
                    AttributeKind::Wildcard
                        | AttributeKind::WildcardUntyped
                        | AttributeKind::NamespaceWildcard(_)
                )
        )
    }

    /// Ob der Wert ohne Typ-Prüfung als String übertragen wird.
    pub fn is_untyped(&self) -> bool {
        matches!(
            self,
            Terminal::CharactersUntyped
                | Terminal::Attribute(AttributeKind::QNameUntyped(_) | AttributeKind::WildcardUntyped)
        )
    }

    /// Fester Name des Terminals (SE(q), AT(q), AT(q)[untyped]).
    pub fn expanded_name(&self) -> Option<ExpandedNameId> {
        match *self {
            Terminal::StartElement(StartElementKind::QName(name))
            | Terminal::Attribute(AttributeKind::QName(name) | AttributeKind::QNameUntyped(name)) => Some(name),
            _ => None,
        }
    }

    /// Fester Namespace eines uri:*-Terminals.
    pub fn namespace(&self) -> Option<InternedStr> {
        match *self {
            Terminal::StartElement(StartElementKind::NamespaceWildcard(uri))
            | Terminal::Attribute(AttributeKind::NamespaceWildcard(uri)) => Some(uri),
            _ => None,
        }
    }

    /// Kurzes Kürzel wie in EXI-Listings (SE, AT, CH, ...).
    pub fn tag(&self) -> &'static str {
        match self {
            Terminal::StartDocument => "SD",
            Terminal::EndDocument => "ED",
            Terminal::StartElement(_) => "SE",
            Terminal::EndElement => "EE",
            Terminal::Attribute(_) | Terminal::XsiType | Terminal::XsiNil => "AT",
            Terminal::Characters | Terminal::CharactersUntyped => "CH",
            Terminal::NamespaceDecl => "NS",
            Terminal::SelfContained => "SC",
            Terminal::Comment => "CM",
            Terminal::ProcessingInstr => "PI",
        }
    }
}

/// Eine Production: Terminal, Folgezustand und Element-Bindung.
///
/// `next == None` beendet die Grammar (EE, ED). Bei `XsiType`/`XsiNil`
/// hängt der Folgezustand vom Wert ab und wird von der Engine bestimmt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Production {
    /// Das Terminal.
    pub terminal: Terminal,
    /// Folgezustand.
    pub next: Option<GrammarId>,
    /// Deklaration hinter einem SE(q) aus dem Schema.
    pub element: Option<ElementId>,
}

impl Production {
    /// Erstellt eine Production ohne Element-Bindung.
    pub fn new(terminal: Terminal, next: Option<GrammarId>) -> Self {
        Self { terminal, next, element: None }
    }

    /// Setzt die Element-Bindung.
    pub fn with_element(mut self, element: ElementId) -> Self {
        self.element = Some(element);
        self
    }
}

// ============================================================================
// Gelernte Productions (EXI 8.4.3)
// ============================================================================

/// Gelernte Productions eines Grammar-Zustands.
///
/// Sie stehen in Tier 1 hinter den deklarierten, in Lernreihenfolge.
#[derive(Debug, Clone, Default)]
pub struct GrammarNode {
    learned: Vec<Production>,
    capped: bool,
}

impl GrammarNode {
    /// Gelernte Productions in Lernreihenfolge.
    pub fn learned(&self) -> &[Production] {
        &self.learned
    }

    /// Ob `terminal` in Tier 1 bereits vorkommt (deklariert oder gelernt).
    pub fn has_terminal(&self, declared: &[Production], terminal: &Terminal) -> bool {
        declared.iter().chain(&self.learned).any(|p| p.terminal == *terminal)
    }

    /// Lernt eine Production.
    ///
    /// Gibt `false` zurück wenn das Terminal schon in Tier 1 steht oder die
    /// Obergrenze erreicht ist. Mehrfaches Lernen ist damit idempotent.
    pub fn learn_production(&mut self, id: GrammarId, declared: &[Production], production: Production) -> bool {
        if self.has_terminal(declared, &production.terminal) {
            return false;
        }
        if self.learned.len() >= MAX_LEARNED_PRODUCTIONS {
            if !self.capped {
                warn!("grammar {id}: learned production cap ({MAX_LEARNED_PRODUCTIONS}) reached, learning stops");
                self.capped = true;
            }
            return false;
        }
        debug!("grammar {id}: learned {:?}", production.terminal);
        self.learned.push(production);
        true
    }
}

// ============================================================================
// Deklarierte Productions
// ============================================================================

/// Einstieg in den Content eines Typs nach dem Start-Tag.
pub(crate) fn content_entry(table: &SchemaGrammars, ty: TypeId) -> GrammarId {
    match table.type_grammar(ty).content() {
        ContentGrammar::Simple(_) => GrammarId::Simple { ty, after: false },
        _ => GrammarId::Content { ty, state: 0 },
    }
}

/// Ende der in Tier 1 angebotenen deklarierten Attribute (exklusiv).
pub(crate) fn offered_attributes_end(table: &SchemaGrammars, ty: TypeId, attr: usize, stage: TagStage) -> usize {
    let t = table.type_grammar(ty);
    let len = t.attributes().len();
    if stage == TagStage::Nilled {
        return len;
    }
    t.first_required(attr).map_or(len, |r| r + 1)
}

/// Startzustand eines Start-Tags nach dem Attribut `k`.
fn after_attribute(ty: TypeId, nillable: bool, k: usize, stage: TagStage) -> Result<GrammarId> {
    let attr = u16::try_from(k + 1).map_err(|_| Error::IntegerOverflow)?;
    Ok(GrammarId::StartTag { ty, nillable, attr, stage: stage.after_attribute() })
}

/// SE-Kandidaten eines DFA-Zustands, nach Kategorie getrennt.
#[derive(Default)]
struct ContentStarts {
    named: Vec<Production>,
    namespaces: Vec<Production>,
    any: Option<Production>,
    can_end: bool,
    mixed: bool,
}

fn content_starts(table: &SchemaGrammars, ty: TypeId, state: StateId) -> Result<ContentStarts> {
    let mut out = ContentStarts::default();
    match table.type_grammar(ty).content() {
        ContentGrammar::Empty => out.can_end = true,
        ContentGrammar::Simple(_) => {}
        ContentGrammar::Complex { model, mixed, .. } => {
            let content_state = model.state(state);
            out.can_end = content_state.can_end;
            out.mixed = *mixed;
            for start in &content_state.starts {
                let next = Some(GrammarId::Content { ty, state: start.next });
                match &start.term {
                    StartTerm::Element { .. } => {
                        let (name, element) = table
                            .bind_start(ty, &start.term)?
                            .ok_or_else(|| Error::schema_violation("unbound content model element"))?;
                        out.named.push(
                            Production::new(Terminal::StartElement(StartElementKind::QName(name)), next)
                                .with_element(element),
                        );
                    }
                    StartTerm::Namespace(uri) => {
                        let uri = table
                            .interner()
                            .get(uri)
                            .ok_or_else(|| Error::schema_violation(format!("wildcard namespace {uri} not interned")))?;
                        out.namespaces
                            .push(Production::new(Terminal::StartElement(StartElementKind::NamespaceWildcard(uri)), next));
                    }
                    StartTerm::Any => {
                        out.any = Some(Production::new(Terminal::StartElement(StartElementKind::Wildcard), next));
                    }
                }
            }
        }
    }
    Ok(out)
}

fn global_starts(table: &SchemaGrammars, next: GrammarId, out: &mut Vec<Production>) {
    for &element in table.global_elements() {
        let name = table.element(element).name;
        out.push(
            Production::new(Terminal::StartElement(StartElementKind::QName(name)), Some(next)).with_element(element),
        );
    }
    out.push(Production::new(Terminal::StartElement(StartElementKind::Wildcard), Some(next)));
}

fn start_tag(
    table: &SchemaGrammars,
    ty: TypeId,
    nillable: bool,
    attr: u16,
    stage: TagStage,
    out: &mut Vec<Production>,
) -> Result<()> {
    let t = table.type_grammar(ty);
    let attr = usize::from(attr);

    if attr == 0 && stage.offers_xsi_type() && t.substitutable() {
        out.push(Production::new(Terminal::XsiType, None));
    }
    if attr == 0 && stage.offers_xsi_nil() && nillable {
        out.push(Production::new(Terminal::XsiNil, None));
    }

    let end = offered_attributes_end(table, ty, attr, stage);
    for (k, decl) in t.attributes().iter().enumerate().take(end).skip(attr) {
        out.push(Production::new(
            Terminal::Attribute(AttributeKind::QName(decl.name)),
            Some(after_attribute(ty, nillable, k, stage)?),
        ));
    }

    let required_missing = stage != TagStage::Nilled && t.first_required(attr).is_some();
    let starts = if stage == TagStage::Nilled {
        ContentStarts { can_end: true, ..ContentStarts::default() }
    } else {
        content_starts(table, ty, 0)?
    };

    out.extend(starts.named);
    if !required_missing && starts.can_end {
        out.push(Production::new(Terminal::EndElement, None));
    }

    let here = GrammarId::StartTag { ty, nillable, attr: attr as u16, stage: stage.after_attribute() };
    match t.attribute_wildcard() {
        Some(AttributeWildcardGrammar::Namespaces(uris)) => {
            for &uri in uris {
                out.push(Production::new(Terminal::Attribute(AttributeKind::NamespaceWildcard(uri)), Some(here)));
            }
        }
        Some(AttributeWildcardGrammar::Any) => {
            out.push(Production::new(Terminal::Attribute(AttributeKind::Wildcard), Some(here)));
        }
        None => {}
    }

    out.extend(starts.namespaces);
    out.extend(starts.any);

    if stage != TagStage::Nilled {
        match t.content() {
            ContentGrammar::Simple(_) => {
                out.push(Production::new(Terminal::Characters, Some(GrammarId::Simple { ty, after: true })));
            }
            _ if starts.mixed => {
                out.push(Production::new(Terminal::CharactersUntyped, Some(GrammarId::Content { ty, state: 0 })));
            }
            _ => {}
        }
    }
    Ok(())
}

fn element_content(table: &SchemaGrammars, ty: TypeId, state: StateId, out: &mut Vec<Production>) -> Result<()> {
    let starts = content_starts(table, ty, state)?;
    out.extend(starts.named);
    if starts.can_end {
        out.push(Production::new(Terminal::EndElement, None));
    }
    out.extend(starts.namespaces);
    out.extend(starts.any);
    if starts.mixed {
        out.push(Production::new(Terminal::CharactersUntyped, Some(GrammarId::Content { ty, state })));
    }
    Ok(())
}

/// Deklarierte Productions (Tier 1 ohne Gelerntes) eines Zustands.
///
/// # Fehler
///
/// `Error::SchemaViolation` wenn die Tabelle inkonsistent ist,
/// `Error::IntegerOverflow` bei mehr als 65535 Attributen.
pub(crate) fn declared_productions(
    table: &SchemaGrammars,
    options: &ExiOptions,
    id: GrammarId,
) -> Result<Vec<Production>> {
    let mut out = Vec::new();
    match id {
        GrammarId::DocumentStart => {
            let next = if options.fragment() { GrammarId::FragmentContent } else { GrammarId::DocumentContent };
            out.push(Production::new(Terminal::StartDocument, Some(next)));
        }
        GrammarId::DocumentContent => global_starts(table, GrammarId::DocumentEnd, &mut out),
        GrammarId::DocumentEnd => out.push(Production::new(Terminal::EndDocument, None)),
        GrammarId::FragmentContent => {
            global_starts(table, GrammarId::FragmentContent, &mut out);
            out.push(Production::new(Terminal::EndDocument, None));
        }
        GrammarId::StartTag { ty, nillable, attr, stage } => start_tag(table, ty, nillable, attr, stage, &mut out)?,
        GrammarId::Content { ty, state } => element_content(table, ty, state, &mut out)?,
        GrammarId::Simple { ty, after: false } => {
            out.push(Production::new(Terminal::Characters, Some(GrammarId::Simple { ty, after: true })));
        }
        GrammarId::Simple { after: true, .. } => out.push(Production::new(Terminal::EndElement, None)),
        GrammarId::BuiltIn { phase: BuiltInPhase::StartTag, .. } => {}
        GrammarId::BuiltIn { phase: BuiltInPhase::Content, .. } => {
            out.push(Production::new(Terminal::EndElement, None));
        }
    }
    Ok(out)
}
