//! Grammar Engine: ein Schritt durch einen Grammar-Zustand (EXI 8.4.3, 8.5.4.4).
//!
//! [`advance`] nimmt die Event Type List des aktuellen Zustands und wählt
//! beim Encodieren den passenden Eintrag (exakter Treffer vor dem
//! spezifischsten Escape), beim Decodieren den per Event Code adressierten.
//! Danach werden Folgezustand und Kind-Grammar bestimmt und gegebenenfalls
//! eine Production gelernt.
//!
//! # Auswahl beim Encodieren
//!
//! | Event | Reihenfolge |
//! |-------|-------------|
//! | SE    | SE(q), SE(uri:*), SE(*) deklariert, SE(*) Escape |
//! | AT    | xsi-Slot, AT(q) bei gültigem Wert, AT(q)[untyped], AT(uri:*), AT(*), AT(*)[untyped] |
//! | CH    | CH typed bei gültigem Wert, CH untyped (Tier 1 vor Tier 2) |
//! | EE    | EE in Tier 1, dann Tier 2 |

use log::trace;

use crate::event::{AtContent, ExiEvent};
use crate::event_code::EventCode;
use crate::event_type::{EventType, EventTypeList, Origin};
use crate::grammar::{AttributeKind, GrammarId, Production, StartElementKind, TagStage, Terminal};
use crate::grammar_cache::Grammars;
use crate::qname::QName;
use crate::schema::TypeDefinition;
use crate::schema_grammar::{SchemaGrammars, TypeId};
use crate::typed_value;
use crate::{Error, Result};

/// Eingabe eines Schritts.
#[derive(Debug, Clone, Copy)]
pub enum Input<'a> {
    /// Encoder: das Event bestimmt den Eintrag.
    Encode(&'a ExiEvent),
    /// Decoder: der Code bestimmt den Eintrag, das Event liefert Name und Wert.
    Decode(EventCode, &'a ExiEvent),
}

/// Folgezustände nach einem Event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Nächster Zustand der aktuellen Grammar (`None` = Grammar beendet).
    pub next: Option<GrammarId>,
    /// Start-Tag des neuen Elements nach SE.
    pub child: Option<GrammarId>,
}

/// Ergebnis eines Schritts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    /// Der gewählte Eintrag (Code relativ zur übergebenen Liste).
    pub event_type: EventType,
    /// Folgezustände.
    pub transition: Transition,
    /// Ob dabei eine Production gelernt wurde.
    pub learned: bool,
}

/// Eintrag zu einem Event Code.
///
/// # Fehler
///
/// `Error::InvalidEventCode` wenn der Code nichts adressiert.
pub fn resolve(list: &EventTypeList, code: EventCode) -> Result<&EventType> {
    list.get(&code)
}

/// Führt einen Schritt im Zustand `id` aus.
///
/// `list` muss die aktuelle Event Type List von `id` sein.
///
/// # Fehler
///
/// - Strict-Verletzungen (`UnexpectedElement`, `UnexpectedAttribute`,
///   `UnexpectedCharacters`, `EndElementNotAllowed`, `InvalidValue`)
/// - `OrderingViolation` für Events die kein Zustand annimmt
/// - `XsiTypeNotFound` für unbekannte xsi:type-Werte
/// - `InvalidEventCode` beim Decodieren
pub fn advance(grammars: &mut Grammars<'_>, id: GrammarId, list: &EventTypeList, input: Input<'_>) -> Result<Advance> {
    let (event_type, event) = match input {
        Input::Encode(event) => (*select(grammars, id, list, event)?, event),
        Input::Decode(code, event) => {
            let event_type = *resolve(list, code)?;
            if !accepts(event_type.terminal(), event) {
                return Err(Error::invalid_event_code(code.to_string(), id.to_string()));
            }
            (event_type, event)
        }
    };

    let transition = successor(grammars, id, &event_type, event)?;
    let learned = learn(grammars, id, &event_type, event)?;
    trace!("{id}: {} {} -> {:?}", event_type.code(), event_type.kind(), transition.next);
    Ok(Advance { event_type, transition, learned })
}

fn accepts(terminal: &Terminal, event: &ExiEvent) -> bool {
    matches!(
        (terminal, event),
        (Terminal::StartDocument, ExiEvent::StartDocument)
            | (Terminal::EndDocument, ExiEvent::EndDocument)
            | (Terminal::StartElement(_), ExiEvent::StartElement(_))
            | (Terminal::EndElement, ExiEvent::EndElement)
            | (Terminal::Attribute(_) | Terminal::XsiType | Terminal::XsiNil, ExiEvent::Attribute(_))
            | (Terminal::Characters | Terminal::CharactersUntyped, ExiEvent::Characters(_))
            | (Terminal::NamespaceDecl, ExiEvent::NamespaceDeclaration(_))
            | (Terminal::SelfContained, ExiEvent::SelfContained)
            | (Terminal::Comment, ExiEvent::Comment(_))
            | (Terminal::ProcessingInstr, ExiEvent::ProcessingInstruction(_))
    )
}

fn out_of_order(id: GrammarId, event: &ExiEvent) -> Error {
    Error::ordering_violation(id.to_string(), event.tag())
}

// ============================================================================
// Auswahl (Encoder)
// ============================================================================

fn select<'l>(grammars: &Grammars<'_>, id: GrammarId, list: &'l EventTypeList, event: &ExiEvent) -> Result<&'l EventType> {
    let found = match event {
        ExiEvent::StartDocument => list.position_of(&Terminal::StartDocument),
        ExiEvent::EndDocument => list.position_of(&Terminal::EndDocument),
        ExiEvent::StartElement(qname) => {
            return select_start(grammars, list, qname).ok_or_else(|| {
                if id.is_element() {
                    Error::UnexpectedElement(qname.to_string())
                } else {
                    out_of_order(id, event)
                }
            });
        }
        ExiEvent::EndElement => {
            return list.end_element().ok_or_else(|| {
                if id.is_element() {
                    Error::EndElementNotAllowed(id.to_string())
                } else {
                    out_of_order(id, event)
                }
            });
        }
        ExiEvent::Attribute(at) => return select_attribute(grammars, id, list, at, event),
        ExiEvent::Characters(ch) => return select_characters(grammars, id, list, &ch.value, event),
        ExiEvent::NamespaceDeclaration(_) => list.position_of(&Terminal::NamespaceDecl),
        ExiEvent::SelfContained => list.position_of(&Terminal::SelfContained),
        ExiEvent::Comment(_) => list.position_of(&Terminal::Comment),
        ExiEvent::ProcessingInstruction(_) => list.position_of(&Terminal::ProcessingInstr),
    };
    found.ok_or_else(|| out_of_order(id, event))
}

fn select_start<'l>(grammars: &Grammars<'_>, list: &'l EventTypeList, qname: &QName) -> Option<&'l EventType> {
    let interner = grammars.interner();
    let exact = interner
        .get_expanded(&qname.uri, &qname.local_name)
        .and_then(|name| list.position_of(&Terminal::StartElement(StartElementKind::QName(name))));
    exact
        .or_else(|| {
            let uri = interner.get(&qname.uri)?;
            list.position_of(&Terminal::StartElement(StartElementKind::NamespaceWildcard(uri)))
        })
        .or_else(|| list.position_of(&Terminal::StartElement(StartElementKind::Wildcard)))
}

fn select_attribute<'l>(
    grammars: &Grammars<'_>,
    id: GrammarId,
    list: &'l EventTypeList,
    at: &AtContent,
    event: &ExiEvent,
) -> Result<&'l EventType> {
    let cache = grammars.cache();
    let options = cache.options();
    let interner = grammars.interner();
    let qname = &at.qname;

    if qname.is_xsi_type() {
        if let Some(slot) = list.position_of(&Terminal::XsiType) {
            match resolve_xsi_type(grammars, &at.value) {
                Ok(_) => return Ok(slot),
                Err(e) if options.strict() => return Err(e),
                Err(_) => {}
            }
        }
    } else if qname.is_xsi_nil() && parse_boolean(&at.value).is_some() {
        if let Some(slot) = list.position_of(&Terminal::XsiNil) {
            return Ok(slot);
        }
    }

    if let Some(name) = interner.get_expanded(&qname.uri, &qname.local_name) {
        if let Some(typed) = list.position_of(&Terminal::Attribute(AttributeKind::QName(name))) {
            let valid = typed.origin() == Origin::Learned
                || options.preserve().lexical_values
                || attribute_value_valid(cache.table(), id, typed.production(), &at.value);
            if valid {
                return Ok(typed);
            }
            if let Some(untyped) = list.position_of(&Terminal::Attribute(AttributeKind::QNameUntyped(name))) {
                return Ok(untyped);
            }
            if options.strict() {
                return Err(Error::InvalidValue(format!("attribute {qname}: '{}'", at.value)));
            }
        }
    }

    interner
        .get(&qname.uri)
        .and_then(|uri| list.position_of(&Terminal::Attribute(AttributeKind::NamespaceWildcard(uri))))
        .or_else(|| list.position_of(&Terminal::Attribute(AttributeKind::Wildcard)))
        .or_else(|| list.position_of(&Terminal::Attribute(AttributeKind::WildcardUntyped)))
        .ok_or_else(|| {
            if id.is_start_tag() {
                Error::UnexpectedAttribute(qname.to_string())
            } else {
                out_of_order(id, event)
            }
        })
}

fn select_characters<'l>(
    grammars: &Grammars<'_>,
    id: GrammarId,
    list: &'l EventTypeList,
    value: &str,
    event: &ExiEvent,
) -> Result<&'l EventType> {
    let options = grammars.cache().options();
    if let Some(typed) = list.position_of(&Terminal::Characters) {
        let valid = options.preserve().lexical_values
            || typed_value::is_valid(value, simple_value_type(grammars.cache().table(), id));
        if valid {
            return Ok(typed);
        }
        if options.strict() {
            return Err(Error::InvalidValue(format!("'{value}' in {id}")));
        }
    }
    list.position_of(&Terminal::CharactersUntyped).ok_or_else(|| {
        if id.is_element() {
            Error::UnexpectedCharacters(id.to_string())
        } else {
            out_of_order(id, event)
        }
    })
}

/// Werttyp eines deklarierten Attributs im Start-Tag `id`.
fn attribute_value_valid(table: &SchemaGrammars, id: GrammarId, production: &Production, value: &str) -> bool {
    let (Some(ty), Terminal::Attribute(AttributeKind::QName(name))) = (id.type_id(), production.terminal) else {
        return true;
    };
    table
        .type_grammar(ty)
        .attributes()
        .iter()
        .find(|decl| decl.name == name)
        .is_none_or(|decl| typed_value::is_valid(value, decl.value_type.as_deref()))
}

/// Werttyp des Simple Contents (None = anySimpleType).
pub(crate) fn simple_value_type(table: &SchemaGrammars, id: GrammarId) -> Option<&TypeDefinition> {
    let ty = id.type_id()?;
    table.type_grammar(ty).simple_value_type().flatten().map(|td| td.as_ref())
}

/// Ob ein leerer Wert als typed CH gültig ist.
///
/// Im Strict-Modus schreibt die Session vor EE ein leeres CH, wenn der
/// Simple Content noch keinen Wert hat.
pub(crate) fn empty_value_valid(table: &SchemaGrammars, id: GrammarId) -> bool {
    typed_value::is_valid("", simple_value_type(table, id))
}

/// xsd:boolean Lexical Space.
pub(crate) fn parse_boolean(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Löst einen xsi:type-Wert (Clark-Notation oder lokaler Name) auf.
fn resolve_xsi_type(grammars: &Grammars<'_>, value: &str) -> Result<TypeId> {
    let not_found = || Error::XsiTypeNotFound(value.to_string());
    let qname = QName::from_clark(value).ok_or_else(not_found)?;
    let name = grammars
        .interner()
        .get_expanded(&qname.uri, &qname.local_name)
        .ok_or_else(not_found)?;
    grammars.cache().table().named_type(name).ok_or_else(not_found)
}

// ============================================================================
// Folgezustand und Lernen
// ============================================================================

fn attribute_value(event: &ExiEvent) -> Option<&str> {
    match event {
        ExiEvent::Attribute(at) => Some(&at.value),
        _ => None,
    }
}

fn successor(grammars: &mut Grammars<'_>, id: GrammarId, event_type: &EventType, event: &ExiEvent) -> Result<Transition> {
    let mut transition = Transition { next: event_type.next(), child: None };
    match (event_type.terminal(), id) {
        (Terminal::XsiType, GrammarId::StartTag { nillable, .. }) => {
            let value = attribute_value(event).unwrap_or_default();
            let ty = resolve_xsi_type(grammars, value)?;
            transition.next = Some(GrammarId::StartTag { ty, nillable, attr: 0, stage: TagStage::Typed });
        }
        (Terminal::XsiNil, GrammarId::StartTag { ty, nillable, .. }) => {
            let value = attribute_value(event).unwrap_or_default();
            let nil = parse_boolean(value)
                .ok_or_else(|| Error::InvalidValue(format!("xsi:nil '{value}' is not a boolean")))?;
            let stage = if nil { TagStage::Nilled } else { TagStage::Settled };
            transition.next = Some(GrammarId::StartTag { ty, nillable, attr: 0, stage });
        }
        (Terminal::XsiType | Terminal::XsiNil, _) => {
            return Err(Error::ordering_violation("xsi attribute in schema start tag", id.to_string()));
        }
        (Terminal::StartElement(_), _) => {
            if let ExiEvent::StartElement(qname) = event {
                transition.child = Some(grammars.child_grammar(event_type.production(), qname)?);
            }
        }
        _ => {}
    }
    Ok(transition)
}

/// Lernt nach einem Wildcard- oder Escape-Treffer (EXI 8.4.3).
///
/// xsi:type, xsi:nil und AT(q)[untyped] werden nicht gelernt.
fn learn(grammars: &mut Grammars<'_>, id: GrammarId, event_type: &EventType, event: &ExiEvent) -> Result<bool> {
    let production = match (event_type.terminal(), event) {
        (
            Terminal::StartElement(StartElementKind::Wildcard | StartElementKind::NamespaceWildcard(_)),
            ExiEvent::StartElement(qname),
        ) => {
            let name = grammars.interner_mut().intern_qname(qname)?;
            Production::new(Terminal::StartElement(StartElementKind::QName(name)), event_type.next())
        }
        (
            Terminal::Attribute(
                AttributeKind::Wildcard | AttributeKind::WildcardUntyped | AttributeKind::NamespaceWildcard(_),
            ),
            ExiEvent::Attribute(at),
        ) if !at.qname.is_xsi_type() && !at.qname.is_xsi_nil() => {
            let name = grammars.interner_mut().intern_qname(&at.qname)?;
            Production::new(Terminal::Attribute(AttributeKind::QName(name)), event_type.next())
        }
        (Terminal::EndElement, _) if event_type.origin() == Origin::Undeclared => {
            Production::new(Terminal::EndElement, None)
        }
        (Terminal::CharactersUntyped, _) if event_type.origin() == Origin::Undeclared => {
            Production::new(Terminal::CharactersUntyped, event_type.next())
        }
        _ => return Ok(false),
    };
    grammars.learn(id, production)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::event_type::EventKind;
    use crate::grammar::BuiltInPhase;
    use crate::grammar_cache::GrammarCache;
    use crate::options::ExiOptions;
    use crate::schema::{AttributeUse, ContentType, ElementDeclaration, SchemaInfo};

    fn int_element_cache(options: ExiOptions) -> GrammarCache {
        let td = TypeDefinition::complex(ContentType::Simple(Rc::new(TypeDefinition::simple("int"))))
            .with_attribute(AttributeUse::optional(QName::new("", "unit"), Some(Rc::new(TypeDefinition::simple("int")))));
        let schema = SchemaInfo::builder()
            .element(ElementDeclaration::new(QName::new("", "n")).with_type(Rc::new(td)))
            .build()
            .unwrap();
        GrammarCache::new(&schema, options).unwrap()
    }

    fn step(grammars: &mut Grammars<'_>, id: GrammarId, event: &ExiEvent) -> Result<Advance> {
        let list = grammars.event_types(id)?;
        advance(grammars, id, &list, Input::Encode(event))
    }

    fn root_start(grammars: &mut Grammars<'_>, cache: &GrammarCache) -> GrammarId {
        let doc = step(grammars, cache.document_grammar(), &ExiEvent::StartDocument).unwrap();
        let se = step(grammars, doc.transition.next.unwrap(), &ExiEvent::start("", "n")).unwrap();
        se.transition.child.unwrap()
    }

    #[test]
    fn invalid_attribute_value_takes_untyped_escape() {
        let cache = int_element_cache(ExiOptions::default());
        let mut grammars = cache.session();
        let start = root_start(&mut grammars, &cache);

        let ok = step(&mut grammars, start, &ExiEvent::attribute("", "unit", "12")).unwrap();
        assert_eq!(ok.event_type.kind(), EventKind::Attribute);
        let bad = step(&mut grammars, start, &ExiEvent::attribute("", "unit", "cm")).unwrap();
        assert_eq!(bad.event_type.kind(), EventKind::AttributeInvalidValue);
        assert_eq!(bad.transition.next, ok.transition.next);
        assert!(!bad.learned);
    }

    #[test]
    fn invalid_value_in_strict_mode_fails() {
        let cache = int_element_cache(ExiOptions::default().with_strict());
        let mut grammars = cache.session();
        let start = root_start(&mut grammars, &cache);
        assert!(matches!(
            step(&mut grammars, start, &ExiEvent::attribute("", "unit", "cm")),
            Err(Error::InvalidValue(_))
        ));
        assert!(matches!(
            step(&mut grammars, start, &ExiEvent::characters("abc")),
            Err(Error::InvalidValue(_))
        ));
        assert!(matches!(
            step(&mut grammars, start, &ExiEvent::start("", "x")),
            Err(Error::UnexpectedElement(_))
        ));
    }

    #[test]
    fn untyped_characters_are_learned_once() {
        let cache = int_element_cache(ExiOptions::default());
        let mut grammars = cache.session();
        let start = root_start(&mut grammars, &cache);

        let first = step(&mut grammars, start, &ExiEvent::characters("abc")).unwrap();
        assert_eq!(first.event_type.kind(), EventKind::CharactersGenericUndeclared);
        assert!(first.learned);
        assert_eq!(first.transition.next, Some(GrammarId::Simple { ty: start.type_id().unwrap(), after: true }));

        let second = step(&mut grammars, start, &ExiEvent::characters("abc")).unwrap();
        assert_eq!(second.event_type.kind(), EventKind::CharactersGeneric);
        assert_eq!(second.event_type.depth(), 1);
        assert!(!second.learned);
    }

    #[test]
    fn xsi_nil_true_collapses_content() {
        let cache = int_element_cache(ExiOptions::default());
        let mut grammars = cache.session();
        let start = root_start(&mut grammars, &cache);
        let nil = ExiEvent::Attribute(AtContent { qname: Rc::new(QName::xsi_nil()), value: Rc::from("true") });
        let adv = step(&mut grammars, start, &nil).unwrap();
        assert_eq!(adv.event_type.kind(), EventKind::AttributeXsiNil);
        let nilled = adv.transition.next.unwrap();
        assert!(matches!(nilled, GrammarId::StartTag { stage: TagStage::Nilled, .. }));

        let list = grammars.event_types(nilled).unwrap();
        assert_eq!(list.end_element().unwrap().depth(), 1);
        assert!(matches!(
            step(&mut grammars, nilled, &ExiEvent::characters("1")),
            Err(Error::UnexpectedCharacters(_))
        ));
    }

    #[test]
    fn xsi_type_switches_type() {
        let cache = GrammarCache::schema_less(ExiOptions::default()).unwrap();
        let mut grammars = cache.session();
        let doc = step(&mut grammars, GrammarId::DocumentStart, &ExiEvent::StartDocument).unwrap();
        let se = step(&mut grammars, doc.transition.next.unwrap(), &ExiEvent::start("", "v")).unwrap();
        let child = se.transition.child.unwrap();
        assert!(matches!(child, GrammarId::BuiltIn { phase: BuiltInPhase::StartTag, .. }));
        assert!(se.learned);

        // Built-in: xsi:type ist ein gewöhnliches Attribut.
        let xsi = ExiEvent::Attribute(AtContent {
            qname: Rc::new(QName::xsi_type()),
            value: Rc::from("{http://www.w3.org/2001/XMLSchema}int"),
        });
        let adv = step(&mut grammars, child, &xsi).unwrap();
        assert_eq!(adv.event_type.kind(), EventKind::AttributeGenericUndeclared);
        assert!(!adv.learned);

        // anyType: xsi:type wechselt den Typ.
        let any = cache.type_grammar(cache.table().any_type(), false);
        let adv = step(&mut grammars, any, &xsi).unwrap();
        assert_eq!(adv.event_type.kind(), EventKind::AttributeXsiType);
        let GrammarId::StartTag { ty, stage, .. } = adv.transition.next.unwrap() else {
            panic!("expected start tag");
        };
        assert_eq!(stage, TagStage::Typed);
        assert!(cache.table().type_grammar(ty).simple_value_type().is_some());

        let unknown = ExiEvent::Attribute(AtContent { qname: Rc::new(QName::xsi_type()), value: Rc::from("{urn:x}Nope") });
        let adv = step(&mut grammars, any, &unknown).unwrap();
        assert_eq!(adv.event_type.kind(), EventKind::AttributeGeneric);
    }

    #[test]
    fn decode_checks_event_against_code() {
        let cache = int_element_cache(ExiOptions::default());
        let mut grammars = cache.session();
        let list = grammars.event_types(GrammarId::DocumentStart).unwrap();
        let err = advance(&mut grammars, GrammarId::DocumentStart, &list, Input::Decode(EventCode::one(0), &ExiEvent::EndDocument));
        assert!(matches!(err, Err(Error::InvalidEventCode { .. })));
        let ok = advance(&mut grammars, GrammarId::DocumentStart, &list, Input::Decode(EventCode::one(0), &ExiEvent::StartDocument));
        assert_eq!(ok.unwrap().transition.next, Some(GrammarId::DocumentContent));
    }
}
