//! Encoder: Events zu Event Codes (EXI 6, 8.4.3).
//!
//! Der Encoder führt die Grammar Engine mit einem Event-Strom und liefert
//! pro Event einen [`CodeItem`]: Event Code, Tier-Größen der Liste und die
//! zugehörigen Werte. Die Bit-Serialisierung der Codes ist nicht Teil
//! dieses Crates; [`EventCodeContext`](crate::event_code::EventCodeContext)
//! enthält alles was ein Serializer dafür braucht.
//!
//! # Beispiel
//!
//! ```
//! use exi_grammar::encoder::encode;
//! use exi_grammar::event::ExiEvent;
//! use exi_grammar::grammar_cache::GrammarCache;
//! use exi_grammar::options::ExiOptions;
//!
//! let cache = GrammarCache::schema_less(ExiOptions::default()).unwrap();
//! let events = vec![
//!     ExiEvent::StartDocument,
//!     ExiEvent::start("", "root"),
//!     ExiEvent::EndElement,
//!     ExiEvent::EndDocument,
//! ];
//! let items = encode(&cache, &events).unwrap();
//! assert_eq!(items.len(), 4);
//! ```

use std::cmp::Ordering;

use log::{debug, trace};

use crate::engine::{self, Input};
use crate::error::{Error, Result};
use crate::event::{ChContent, ExiEvent};
use crate::event_type::EventTypeList;
use crate::grammar::GrammarId;
use crate::grammar_cache::GrammarCache;
use crate::options::ExiOptions;
use crate::qname::QName;
use crate::session::{CodeItem, EventDescription, Session};

/// Prüft ob ein String ausschließlich aus XML-Whitespace besteht (SP/TAB/CR/LF).
fn is_xml_whitespace(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
}

/// Ob ein Event unter den Preserve-Options überhaupt codiert wird (EXI 6.3).
fn should_encode_event(event: &ExiEvent, options: &ExiOptions) -> bool {
    let preserve = options.preserve();
    match event {
        ExiEvent::NamespaceDeclaration(_) => preserve.prefixes,
        ExiEvent::Comment(_) => preserve.comments,
        ExiEvent::ProcessingInstruction(_) => preserve.pis,
        _ => true,
    }
}

/// Event-Encoder einer Session.
#[derive(Debug)]
pub struct Encoder<'c> {
    session: Session<'c>,
    items: Vec<CodeItem>,
}

impl<'c> Encoder<'c> {
    /// Neuer Encoder mit frischem Lernstand und String Table.
    pub fn new(cache: &'c GrammarCache) -> Self {
        Self { session: Session::new(cache), items: Vec::new() }
    }

    /// Aktueller Grammar-Zustand.
    ///
    /// # Fehler
    ///
    /// `Error::OrderingViolation` nach ED.
    pub fn grammar(&self) -> Result<GrammarId> {
        self.session.current()
    }

    /// Event Type List des aktuellen Zustands.
    pub fn event_types(&mut self) -> Result<EventTypeList> {
        self.session.event_types().map(|(_, list)| list)
    }

    /// Bisher erzeugte Codes.
    pub fn items(&self) -> &[CodeItem] {
        &self.items
    }

    /// Codiert ein Event.
    ///
    /// Gibt `None` zurück wenn das Event verworfen wurde: NS, CM und PI
    /// ohne passende Preserve-Option sowie bedeutungsloser Whitespace.
    ///
    /// # Fehler
    ///
    /// Siehe [`engine::advance`]; zusätzlich `OrderingViolation` für
    /// Events nach ED.
    pub fn encode_event(&mut self, event: &ExiEvent) -> Result<Option<EventDescription>> {
        if !should_encode_event(event, self.session.cache().options()) {
            trace!("dropped {}", event.tag());
            return Ok(None);
        }
        if let ExiEvent::Characters(ch) = event
            && is_xml_whitespace(&ch.value)
            && self.session.ignores_whitespace()?
        {
            trace!("dropped ignorable whitespace");
            return Ok(None);
        }
        if matches!(event, ExiEvent::EndElement) && self.session.needs_empty_value()? {
            let empty = ExiEvent::Characters(ChContent { value: "".into() });
            self.encode_core(&empty)?;
        }
        self.encode_core(event).map(Some)
    }

    fn encode_core(&mut self, event: &ExiEvent) -> Result<EventDescription> {
        let (id, list) = self.session.event_types()?;
        let advance = engine::advance(self.session.grammars_mut(), id, &list, Input::Encode(event))?;
        let values = self.session.encode_values(&advance.event_type, event)?;
        self.session.apply(&advance, event)?;
        self.items.push(CodeItem { code: advance.event_type.code(), context: list.context(), values });
        Ok(EventDescription { event_type: advance.event_type, event: event.clone() })
    }

    /// Beendet die Session und liefert alle Codes.
    ///
    /// # Fehler
    ///
    /// `Error::OrderingViolation` wenn ED fehlt.
    pub fn finish(self) -> Result<Vec<CodeItem>> {
        if !self.session.is_finished() {
            let state = self.session.current().map(|id| id.to_string()).unwrap_or_default();
            return Err(Error::ordering_violation("ED", format!("end of input in {state}")));
        }
        debug!("encoded {} event codes", self.items.len());
        Ok(self.items)
    }
}

/// Sortierreihenfolge im Start-Tag: NS, SC, xsi:type, xsi:nil, dann
/// Attribute nach (local-name, URI) (EXI 6, 8.5.4.4.1).
fn start_tag_rank(event: &ExiEvent) -> (u8, Option<(&str, &str)>) {
    match event {
        ExiEvent::NamespaceDeclaration(_) => (0, None),
        ExiEvent::SelfContained => (1, None),
        ExiEvent::Attribute(at) if at.qname.is_xsi_type() => (2, None),
        ExiEvent::Attribute(at) if at.qname.is_xsi_nil() => (3, None),
        ExiEvent::Attribute(at) => (4, Some(attribute_key(&at.qname))),
        _ => (5, None),
    }
}

fn attribute_key(qname: &QName) -> (&str, &str) {
    (&qname.local_name, &qname.uri)
}

fn compare_start_tag(a: &&ExiEvent, b: &&ExiEvent) -> Ordering {
    start_tag_rank(a).cmp(&start_tag_rank(b))
}

/// Codiert eine vollständige Event-Folge.
///
/// NS, SC und Attribute direkt nach einem SE werden in die kanonische
/// Reihenfolge gebracht; die Sortierung ist stabil.
///
/// # Fehler
///
/// Siehe [`Encoder::encode_event`] und [`Encoder::finish`].
pub fn encode(cache: &GrammarCache, events: &[ExiEvent]) -> Result<Vec<CodeItem>> {
    let mut encoder = Encoder::new(cache);
    let mut i = 0;
    while i < events.len() {
        let event = &events[i];
        encoder.encode_event(event)?;
        i += 1;
        if !matches!(event, ExiEvent::StartElement(_)) {
            continue;
        }

        let mut group: Vec<&ExiEvent> = Vec::with_capacity(8);
        while let Some(next) = events.get(i) {
            match next {
                ExiEvent::NamespaceDeclaration(_) | ExiEvent::SelfContained | ExiEvent::Attribute(_) => {
                    group.push(next);
                    i += 1;
                }
                _ => break,
            }
        }
        group.sort_by(compare_start_tag);
        for member in group {
            encoder.encode_event(member)?;
        }
    }
    encoder.finish()
}
