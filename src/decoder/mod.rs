//! Decoder: Event Codes zurück zu Events (EXI 6, 8.4.3).
//!
//! Der Decoder adressiert mit jedem [`CodeItem`] einen Eintrag der
//! aktuellen Event Type List, baut aus den Werten das Event und führt die
//! Grammar Engine genau so weiter wie der Encoder.
//!
//! # Beispiel
//!
//! ```
//! use exi_grammar::decoder::decode;
//! use exi_grammar::encoder::encode;
//! use exi_grammar::event::ExiEvent;
//! use exi_grammar::grammar_cache::GrammarCache;
//! use exi_grammar::options::ExiOptions;
//!
//! let cache = GrammarCache::schema_less(ExiOptions::default()).unwrap();
//! let events = vec![
//!     ExiEvent::StartDocument,
//!     ExiEvent::start("", "root"),
//!     ExiEvent::characters("hi"),
//!     ExiEvent::EndElement,
//!     ExiEvent::EndDocument,
//! ];
//! let items = encode(&cache, &events).unwrap();
//! assert_eq!(decode(&cache, &items).unwrap(), events);
//! ```

use log::{debug, trace};

use crate::engine::{self, Input};
use crate::error::{Error, Result};
use crate::event::ExiEvent;
use crate::event_type::EventTypeList;
use crate::grammar::GrammarId;
use crate::grammar_cache::GrammarCache;
use crate::session::{CodeItem, EventDescription, Session};

/// Event-Decoder einer Session.
#[derive(Debug)]
pub struct Decoder<'c> {
    session: Session<'c>,
}

impl<'c> Decoder<'c> {
    /// Neuer Decoder mit frischem Lernstand und String Table.
    pub fn new(cache: &'c GrammarCache) -> Self {
        Self { session: Session::new(cache) }
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

    /// Ob ED gelesen wurde.
    pub fn is_finished(&self) -> bool {
        self.session.is_finished()
    }

    /// Decodiert einen Code.
    ///
    /// # Fehler
    ///
    /// - `Error::InvalidEventCode` wenn die Tier-Größen nicht zur aktuellen
    ///   Liste passen oder der Code nichts adressiert
    /// - `Error::InvalidString` bei unbekannten Compact Identifiern
    pub fn decode_item(&mut self, item: &CodeItem) -> Result<EventDescription> {
        self.decode_next(item).map(|(desc, _)| desc)
    }

    /// Wie [`Decoder::decode_item`], zusätzlich ob das Event nur der
    /// eingesetzte leere Wert vor EE ist.
    fn decode_next(&mut self, item: &CodeItem) -> Result<(EventDescription, bool)> {
        let placeholder_allowed = self.session.needs_empty_value()?;
        let (id, list) = self.session.event_types()?;
        if item.context != list.context() {
            return Err(Error::invalid_event_code(
                format!("{} in {}", item.code, item.context),
                format!("{id} expecting {}", list.context()),
            ));
        }
        let event_type = *engine::resolve(&list, item.code)?;
        let event = self.session.decode_event(&event_type, &item.values)?;
        let advance = engine::advance(self.session.grammars_mut(), id, &list, Input::Decode(item.code, &event))?;
        self.session.apply(&advance, &event)?;
        trace!("{id}: decoded {}", event.tag());
        let placeholder = placeholder_allowed && matches!(&event, ExiEvent::Characters(ch) if ch.value.is_empty());
        Ok((EventDescription { event_type: advance.event_type, event }, placeholder))
    }
}

/// Decodiert eine vollständige Code-Folge.
///
/// # Fehler
///
/// Siehe [`Decoder::decode_item`]; zusätzlich `OrderingViolation` wenn
/// die Folge vor ED endet.
pub fn decode(cache: &GrammarCache, items: &[CodeItem]) -> Result<Vec<ExiEvent>> {
    let mut decoder = Decoder::new(cache);
    let mut events = Vec::with_capacity(items.len());
    for item in items {
        let (desc, placeholder) = decoder.decode_next(item)?;
        if !placeholder {
            events.push(desc.event);
        }
    }
    if !decoder.is_finished() {
        return Err(Error::ordering_violation("ED", "end of code sequence"));
    }
    debug!("decoded {} events", events.len());
    Ok(events)
}
