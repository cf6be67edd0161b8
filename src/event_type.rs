//! Event Types und Event Type Lists (EXI 6.2, 8.2).
//!
//! Eine [`EventTypeList`] ist die geordnete Kandidatenliste eines
//! Grammar-Zustands: Tier 1 (deklariert, dann gelernt), Tier 2 (Escapes),
//! Tier 3 (CM/PI). Jeder Eintrag kennt seinen Event Code; der
//! [`EventCodeContext`] beschreibt die Bitbreiten für einen Serializer.

use std::fmt;

use crate::event_code::{EventCode, EventCodeContext};
use crate::grammar::{AttributeKind, GrammarId, Production, StartElementKind, Terminal};
use crate::qname::{ExpandedNameId, InternedStr, QName, StringInterner};
use crate::schema_grammar::ElementId;
use crate::{Error, Result};

/// Herkunft eines Eintrags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Aus dem Schema oder der Built-in Grammar.
    Declared,
    /// Zur Laufzeit gelernt.
    Learned,
    /// Escape- oder CM/PI-Tier.
    Undeclared,
}

/// Fachliche Art eines Event Types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StartDocument,
    EndDocument,
    StartElement,
    StartElementNs,
    StartElementGeneric,
    StartElementGenericUndeclared,
    EndElement,
    EndElementUndeclared,
    Attribute,
    AttributeNs,
    AttributeGeneric,
    AttributeGenericUndeclared,
    AttributeInvalidValue,
    AttributeAnyInvalidValue,
    AttributeXsiType,
    AttributeXsiNil,
    Characters,
    CharactersGeneric,
    CharactersGenericUndeclared,
    NamespaceDeclaration,
    SelfContained,
    Comment,
    ProcessingInstruction,
}

impl EventKind {
    /// Art eines Terminals je nach Herkunft.
    pub fn of(terminal: &Terminal, origin: Origin) -> Self {
        let undeclared = origin == Origin::Undeclared;
        match terminal {
            Terminal::StartDocument => Self::StartDocument,
            Terminal::EndDocument => Self::EndDocument,
            Terminal::StartElement(StartElementKind::QName(_)) => Self::StartElement,
            Terminal::StartElement(StartElementKind::NamespaceWildcard(_)) => Self::StartElementNs,
            Terminal::StartElement(StartElementKind::Wildcard) if undeclared => Self::StartElementGenericUndeclared,
            Terminal::StartElement(StartElementKind::Wildcard) => Self::StartElementGeneric,
            Terminal::EndElement if undeclared => Self::EndElementUndeclared,
            Terminal::EndElement => Self::EndElement,
            Terminal::Attribute(AttributeKind::QName(_)) => Self::Attribute,
            Terminal::Attribute(AttributeKind::QNameUntyped(_)) => Self::AttributeInvalidValue,
            Terminal::Attribute(AttributeKind::NamespaceWildcard(_)) => Self::AttributeNs,
            Terminal::Attribute(AttributeKind::Wildcard) if undeclared => Self::AttributeGenericUndeclared,
            Terminal::Attribute(AttributeKind::Wildcard) => Self::AttributeGeneric,
            Terminal::Attribute(AttributeKind::WildcardUntyped) => Self::AttributeAnyInvalidValue,
            Terminal::XsiType => Self::AttributeXsiType,
            Terminal::XsiNil => Self::AttributeXsiNil,
            Terminal::Characters => Self::Characters,
            Terminal::CharactersUntyped if undeclared => Self::CharactersGenericUndeclared,
            Terminal::CharactersUntyped => Self::CharactersGeneric,
            Terminal::NamespaceDecl => Self::NamespaceDeclaration,
            Terminal::SelfContained => Self::SelfContained,
            Terminal::Comment => Self::Comment,
            Terminal::ProcessingInstr => Self::ProcessingInstruction,
        }
    }

    /// Name in Großbuchstaben wie in Listings (`START_ELEMENT_NS`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartDocument => "START_DOCUMENT",
            Self::EndDocument => "END_DOCUMENT",
            Self::StartElement => "START_ELEMENT",
            Self::StartElementNs => "START_ELEMENT_NS",
            Self::StartElementGeneric => "START_ELEMENT_GENERIC",
            Self::StartElementGenericUndeclared => "START_ELEMENT_GENERIC_UNDECLARED",
            Self::EndElement => "END_ELEMENT",
            Self::EndElementUndeclared => "END_ELEMENT_UNDECLARED",
            Self::Attribute => "ATTRIBUTE",
            Self::AttributeNs => "ATTRIBUTE_NS",
            Self::AttributeGeneric => "ATTRIBUTE_GENERIC",
            Self::AttributeGenericUndeclared => "ATTRIBUTE_GENERIC_UNDECLARED",
            Self::AttributeInvalidValue => "ATTRIBUTE_INVALID_VALUE",
            Self::AttributeAnyInvalidValue => "ATTRIBUTE_ANY_INVALID_VALUE",
            Self::AttributeXsiType => "ATTRIBUTE_XSI_TYPE",
            Self::AttributeXsiNil => "ATTRIBUTE_XSI_NIL",
            Self::Characters => "CHARACTERS",
            Self::CharactersGeneric => "CHARACTERS_GENERIC",
            Self::CharactersGenericUndeclared => "CHARACTERS_GENERIC_UNDECLARED",
            Self::NamespaceDeclaration => "NAMESPACE_DECLARATION",
            Self::SelfContained => "SELF_CONTAINED",
            Self::Comment => "COMMENT",
            Self::ProcessingInstruction => "PROCESSING_INSTRUCTION",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ein Eintrag einer Event Type List.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventType {
    production: Production,
    origin: Origin,
    code: EventCode,
    index: usize,
}

impl EventType {
    /// Die zugrunde liegende Production.
    pub fn production(&self) -> &Production {
        &self.production
    }

    /// Terminal-Symbol.
    pub fn terminal(&self) -> &Terminal {
        &self.production.terminal
    }

    /// Folgezustand der Production (bei xsi:type/xsi:nil wertabhängig).
    pub fn next(&self) -> Option<GrammarId> {
        self.production.next
    }

    /// Element-Deklaration hinter einem SE(q).
    pub fn element(&self) -> Option<ElementId> {
        self.production.element
    }

    /// Herkunft.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Event Code.
    pub fn code(&self) -> EventCode {
        self.code
    }

    /// Position in der gesamten Liste (0-basiert, über alle Tiers).
    pub fn index(&self) -> usize {
        self.index
    }

    /// Tiefe (1-3) = Anzahl Teile des Event Codes.
    pub fn depth(&self) -> u8 {
        self.code.num_parts() as u8
    }

    /// (Tiefe, Index im Tier).
    pub fn position(&self) -> (u8, u32) {
        let within = match self.depth() {
            1 => self.code.part1(),
            2 => self.code.part2().unwrap_or_default(),
            _ => self.code.part3().unwrap_or_default(),
        };
        (self.depth(), within)
    }

    /// Fachliche Art.
    pub fn kind(&self) -> EventKind {
        EventKind::of(&self.production.terminal, self.origin)
    }

    /// Fester Name (SE(q), AT(q), AT(q)[untyped]).
    pub fn name(&self) -> Option<ExpandedNameId> {
        self.production.terminal.expanded_name()
    }

    /// Fester Namespace (SE(uri:*), AT(uri:*)).
    pub fn namespace(&self) -> Option<InternedStr> {
        self.production.terminal.namespace()
    }

    /// Fester Name als [`QName`]; xsi:type und xsi:nil inklusive.
    pub fn qname(&self, interner: &StringInterner) -> Option<QName> {
        match self.production.terminal {
            Terminal::XsiType => Some(QName::xsi_type()),
            Terminal::XsiNil => Some(QName::xsi_nil()),
            _ => self.name().map(|n| n.to_qname(interner)),
        }
    }

    /// Lesbare Form wie `1.0 AT(id)[untyped]`.
    pub fn label(&self, interner: &StringInterner) -> String {
        let t = &self.production.terminal;
        let mut out = format!("{} {}", self.code, t.tag());
        if let Some(name) = self.qname(interner) {
            out.push_str(&format!("({})", name.local_name));
        } else if let Some(uri) = self.namespace() {
            out.push_str(&format!("({}:*)", interner.resolve(uri)));
        } else if t.is_wildcard() {
            out.push_str("(*)");
        }
        if t.is_untyped() {
            out.push_str("[untyped]");
        }
        out
    }
}

/// Geordnete Kandidatenliste eines Grammar-Zustands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTypeList {
    items: Vec<EventType>,
    context: EventCodeContext,
    end_element: Option<usize>,
}

impl EventTypeList {
    /// Baut die Liste aus den drei Tiers.
    ///
    /// Tier 1 = `declared` plus `learned`. Gelernte SE(qname) stehen vor dem
    /// ersten deklarierten SE(uri:*)/SE(*), gelernte AT(qname) vor dem ersten
    /// deklarierten AT(uri:*)/AT(*). Der Rest folgt hinter `declared`, jeweils
    /// in Lernreihenfolge (EXI 8.4.3).
    ///
    /// # Fehler
    ///
    /// `Error::IntegerOverflow` wenn ein Tier mehr als `u32::MAX` Einträge hat.
    pub fn build(
        declared: &[Production],
        learned: &[Production],
        escapes: &[Production],
        misc: &[Production],
    ) -> Result<Self> {
        let count = |n: usize| u32::try_from(n).map_err(|_| Error::IntegerOverflow);
        let context = EventCodeContext::new(
            count(declared.len() + learned.len())?,
            count(escapes.len())?,
            count(misc.len())?,
        );

        let tiers: [(u8, Vec<(Production, Origin)>); 3] = [
            (1, merge_learned(declared, learned)),
            (2, escapes.iter().map(|p| (*p, Origin::Undeclared)).collect()),
            (3, misc.iter().map(|p| (*p, Origin::Undeclared)).collect()),
        ];

        let mut items = Vec::with_capacity(context.tier1() as usize + escapes.len() + misc.len());
        for (depth, tier) in tiers {
            for (i, (production, origin)) in tier.into_iter().enumerate() {
                let code = context.code_at(depth, i as u32);
                let index = items.len();
                items.push(EventType { production, origin, code, index });
            }
        }
        let end_element = items.iter().position(|et| et.production.terminal == Terminal::EndElement);
        Ok(Self { items, context, end_element })
    }

    /// Eintrag zu einem Event Code.
    ///
    /// # Fehler
    ///
    /// `Error::InvalidEventCode` wenn der Code keinen Eintrag adressiert.
    pub fn get(&self, code: &EventCode) -> Result<&EventType> {
        let (depth, within) = self.context.locate(code)?;
        let offset = match depth {
            1 => 0,
            2 => self.context.tier1(),
            _ => self.context.tier1() + self.context.tier2(),
        };
        self.items
            .get((offset + within) as usize)
            .ok_or_else(|| Error::invalid_event_code(code.to_string(), self.context.to_string()))
    }

    /// Eintrag nach Listenposition.
    pub fn item(&self, index: usize) -> Option<&EventType> {
        self.items.get(index)
    }

    /// Erster Eintrag mit diesem Terminal.
    pub fn position_of(&self, terminal: &Terminal) -> Option<&EventType> {
        self.items.iter().find(|et| et.production.terminal == *terminal)
    }

    /// Erster Eintrag der `pred` erfüllt.
    pub fn find(&self, pred: impl Fn(&EventType) -> bool) -> Option<&EventType> {
        self.items.iter().find(|et| pred(et))
    }

    /// Der EE-Eintrag, egal in welchem Tier.
    pub fn end_element(&self) -> Option<&EventType> {
        self.end_element.map(|i| &self.items[i])
    }

    /// Der EE-Eintrag nur wenn er deklariert oder gelernt ist (Tier 1).
    ///
    /// Das Escape-EE in Tier 2 zählt nicht.
    pub fn tier1_end_element(&self) -> Option<&EventType> {
        self.end_element().filter(|et| et.depth() == 1)
    }

    /// Alle Einträge in Code-Reihenfolge.
    pub fn iter(&self) -> std::slice::Iter<'_, EventType> {
        self.items.iter()
    }

    /// Einträge eines Tiers.
    pub fn tier(&self, depth: u8) -> &[EventType] {
        let t1 = self.context.tier1() as usize;
        let t2 = t1 + self.context.tier2() as usize;
        match depth {
            1 => &self.items[..t1],
            2 => &self.items[t1..t2],
            3 => &self.items[t2..],
            _ => &[],
        }
    }

    /// Anzahl aller Einträge.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Ob die Liste leer ist.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Tier-Größen für den Serializer.
    pub fn context(&self) -> EventCodeContext {
        self.context
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Category {
    Element,
    Attribute,
}

/// Kategorie einer gelernten Production mit Namen.
fn learned_category(terminal: &Terminal) -> Option<Category> {
    match terminal {
        Terminal::StartElement(StartElementKind::QName(_)) => Some(Category::Element),
        Terminal::Attribute(AttributeKind::QName(_) | AttributeKind::QNameUntyped(_)) => Some(Category::Attribute),
        _ => None,
    }
}

/// Kategorie eines deklarierten Wildcards.
fn wildcard_category(terminal: &Terminal) -> Option<Category> {
    match terminal {
        Terminal::StartElement(StartElementKind::Wildcard | StartElementKind::NamespaceWildcard(_)) => {
            Some(Category::Element)
        }
        Terminal::Attribute(
            AttributeKind::Wildcard | AttributeKind::WildcardUntyped | AttributeKind::NamespaceWildcard(_),
        ) => Some(Category::Attribute),
        _ => None,
    }
}

fn merge_learned(declared: &[Production], learned: &[Production]) -> Vec<(Production, Origin)> {
    let mut tier = Vec::with_capacity(declared.len() + learned.len());
    let mut placed: Vec<Category> = Vec::with_capacity(2);
    for production in declared {
        if let Some(category) = wildcard_category(&production.terminal) {
            if !placed.contains(&category) {
                placed.push(category);
                tier.extend(
                    learned
                        .iter()
                        .filter(|p| learned_category(&p.terminal) == Some(category))
                        .map(|p| (*p, Origin::Learned)),
                );
            }
        }
        tier.push((*production, Origin::Declared));
    }
    tier.extend(
        learned
            .iter()
            .filter(|p| !learned_category(&p.terminal).is_some_and(|c| placed.contains(&c)))
            .map(|p| (*p, Origin::Learned)),
    );
    tier
}

impl<'a> IntoIterator for &'a EventTypeList {
    type Item = &'a EventType;
    type IntoIter = std::slice::Iter<'a, EventType>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qname::InternedStr;

    fn name(i: u32) -> ExpandedNameId {
        ExpandedNameId::new(InternedStr(0), InternedStr(i))
    }

    fn se(i: u32) -> Production {
        Production::new(Terminal::StartElement(StartElementKind::QName(name(i))), Some(GrammarId::DocumentEnd))
    }

    #[test]
    fn codes_follow_tiers() {
        let ee = Production::new(Terminal::EndElement, None);
        let any = Production::new(Terminal::StartElement(StartElementKind::Wildcard), Some(GrammarId::DocumentEnd));
        let cm = Production::new(Terminal::Comment, Some(GrammarId::DocumentEnd));
        let list = EventTypeList::build(&[se(1), se(2)], &[se(3)], &[ee, any], &[cm]).unwrap();

        let codes: Vec<String> = list.iter().map(|et| et.code().to_string()).collect();
        assert_eq!(codes, ["0", "1", "2", "3.0", "3.1", "3.2.0"]);
        assert_eq!(list.item(2).unwrap().origin(), Origin::Learned);
        assert_eq!(list.end_element().unwrap().position(), (2, 0));
        assert_eq!(list.end_element().unwrap().kind(), EventKind::EndElementUndeclared);
        assert_eq!(list.item(4).unwrap().kind(), EventKind::StartElementGenericUndeclared);
        assert_eq!(list.tier(1).len(), 3);
        assert_eq!(list.tier(3)[0].kind(), EventKind::Comment);

        let hit = list.get(&EventCode::two(3, 1)).unwrap();
        assert_eq!(hit.index(), 4);
        assert!(list.get(&EventCode::one(3)).is_err());
    }

    #[test]
    fn learned_names_precede_declared_wildcards() {
        let any = Production::new(Terminal::StartElement(StartElementKind::Wildcard), Some(GrammarId::DocumentEnd));
        let ed = Production::new(Terminal::EndDocument, None);
        let list = EventTypeList::build(&[any, ed], &[se(7)], &[], &[]).unwrap();

        let layout: Vec<(String, EventKind)> = list.iter().map(|et| (et.code().to_string(), et.kind())).collect();
        assert_eq!(
            layout,
            [
                ("0".to_string(), EventKind::StartElement),
                ("1".to_string(), EventKind::StartElementGeneric),
                ("2".to_string(), EventKind::EndDocument),
            ]
        );
        assert_eq!(list.item(0).unwrap().origin(), Origin::Learned);
        assert_eq!(list.item(1).unwrap().origin(), Origin::Declared);
    }

    #[test]
    fn learned_attributes_precede_attribute_wildcard_only() {
        let at = |i| Production::new(Terminal::Attribute(AttributeKind::QName(name(i))), Some(GrammarId::DocumentEnd));
        let at_ns = Production::new(
            Terminal::Attribute(AttributeKind::NamespaceWildcard(InternedStr(4))),
            Some(GrammarId::DocumentEnd),
        );
        let at_any = Production::new(Terminal::Attribute(AttributeKind::Wildcard), Some(GrammarId::DocumentEnd));
        let ee = Production::new(Terminal::EndElement, None);
        let list = EventTypeList::build(&[at(1), at_ns, at_any, se(2)], &[at(3), ee, at(5)], &[], &[]).unwrap();

        let order: Vec<(Production, Origin)> = list.iter().map(|et| (*et.production(), et.origin())).collect();
        assert_eq!(
            order,
            [
                (at(1), Origin::Declared),
                (at(3), Origin::Learned),
                (at(5), Origin::Learned),
                (at_ns, Origin::Declared),
                (at_any, Origin::Declared),
                (se(2), Origin::Declared),
                (ee, Origin::Learned),
            ]
        );
        assert_eq!(list.tier1_end_element().unwrap().code(), EventCode::one(6));
    }

    #[test]
    fn tier1_end_element_ignores_escape() {
        let ee = Production::new(Terminal::EndElement, None);
        let escaped = EventTypeList::build(&[se(1)], &[], &[ee], &[]).unwrap();
        assert!(escaped.end_element().is_some());
        assert!(escaped.tier1_end_element().is_none());

        let declared = EventTypeList::build(&[se(1), ee], &[], &[], &[]).unwrap();
        assert_eq!(declared.tier1_end_element().unwrap().code(), EventCode::one(1));
    }

    #[test]
    fn single_entry_list_has_no_escape() {
        let ed = Production::new(Terminal::EndDocument, None);
        let list = EventTypeList::build(&[ed], &[], &[], &[]).unwrap();
        assert_eq!(list.context().part1_count(), 1);
        assert_eq!(list.context().bits_for_part1(), 0);
        assert_eq!(list.item(0).unwrap().kind().as_str(), "END_DOCUMENT");
        assert!(list.end_element().is_none());
    }

    #[test]
    fn kinds_distinguish_origin() {
        let any_at = Terminal::Attribute(AttributeKind::Wildcard);
        assert_eq!(EventKind::of(&any_at, Origin::Declared), EventKind::AttributeGeneric);
        assert_eq!(EventKind::of(&any_at, Origin::Undeclared), EventKind::AttributeGenericUndeclared);
        assert_eq!(
            EventKind::of(&Terminal::CharactersUntyped, Origin::Learned),
            EventKind::CharactersGeneric
        );
        assert_eq!(
            EventKind::of(&Terminal::Attribute(AttributeKind::QNameUntyped(name(0))), Origin::Undeclared),
            EventKind::AttributeInvalidValue
        );
    }
}
