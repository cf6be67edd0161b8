//! Gemeinsamer Zustand von Encoder und Decoder.
//!
//! Eine Session verfolgt den Grammar-Stack, die String Table und die
//! Self-Contained-Regionen. Encoder und Decoder rufen dieselben Schritte in
//! derselben Reihenfolge auf; dadurch entwickeln sich Grammars und String
//! Table auf beiden Seiten identisch.
//!
//! # Werte pro Event
//!
//! | Event Type | Werte |
//! |------------|-------|
//! | SE(q) / AT(q) | [Prefix] |
//! | SE(uri:*) / AT(uri:*) | Local-Name, [Prefix] |
//! | SE(*) / AT(*) | URI, Local-Name, [Prefix] |
//! | AT (alle) | zusätzlich der Wert |
//! | xsi:type | Literal (Clark-Notation) |
//! | xsi:nil | Boolean |
//! | CH | Wert |
//! | NS | URI, Prefix, Boolean |
//! | CM | Literal |
//! | PI | Literal Name, Literal Text |
//!
//! `[Prefix]` nur wenn Prefixes erhalten werden.

use std::mem;
use std::rc::Rc;

use crate::engine::{self, Advance};
use crate::event::{AtContent, ChContent, CmContent, ExiEvent, NsContent, PiContent};
use crate::event_code::{EventCode, EventCodeContext};
use crate::event_type::{EventType, EventTypeList};
use crate::grammar::{AttributeKind, GrammarId, StartElementKind, TagStage, Terminal};
use crate::grammar_cache::{GrammarCache, Grammars};
use crate::qname::QName;
use crate::schema_grammar::ContentGrammar;
use crate::string_table::{Partition, PartitionedStringTable, StringTable};
use crate::{Error, Result};

/// Ein String oder Flag, das zu einem Event Code gehört.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Compact Identifier eines bereits registrierten Strings.
    Hit(usize),
    /// Neuer String; wird auf beiden Seiten registriert.
    Miss(Rc<str>),
    /// String außerhalb der String Table.
    Literal(Rc<str>),
    /// Boolean.
    Boolean(bool),
}

/// Ein codiertes Event: Code, Tier-Größen und Werte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeItem {
    /// Event Code.
    pub code: EventCode,
    /// Tier-Größen der Liste, aus der der Code stammt.
    pub context: EventCodeContext,
    /// Werte in fester Reihenfolge.
    pub values: Vec<Value>,
}

/// Event zusammen mit dem Eintrag, über den es lief.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDescription {
    /// Der gewählte Eintrag.
    pub event_type: EventType,
    /// Das Event.
    pub event: ExiEvent,
}

#[derive(Debug)]
struct Frame {
    grammar: GrammarId,
    /// String Table von vor der Self-Contained-Region dieses Elements.
    saved_strings: Option<PartitionedStringTable>,
}

#[derive(Debug)]
pub(crate) struct Session<'c> {
    grammars: Grammars<'c>,
    strings: PartitionedStringTable,
    initial_strings: PartitionedStringTable,
    document: Option<GrammarId>,
    stack: Vec<Frame>,
}

impl<'c> Session<'c> {
    pub(crate) fn new(cache: &'c GrammarCache) -> Self {
        let initial_strings = PartitionedStringTable::for_schema(cache.table());
        Self {
            grammars: cache.session(),
            strings: initial_strings.clone(),
            initial_strings,
            document: Some(cache.document_grammar()),
            stack: Vec::new(),
        }
    }

    pub(crate) fn cache(&self) -> &'c GrammarCache {
        self.grammars.cache()
    }

    /// Aktueller Grammar-Zustand.
    pub(crate) fn current(&self) -> Result<GrammarId> {
        match self.stack.last() {
            Some(frame) => Ok(frame.grammar),
            None => self
                .document
                .ok_or_else(|| Error::ordering_violation("no further event", "event after end document")),
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.document.is_none() && self.stack.is_empty()
    }

    pub(crate) fn event_types(&mut self) -> Result<(GrammarId, EventTypeList)> {
        let id = self.current()?;
        let list = self.grammars.event_types(id)?;
        Ok((id, list))
    }

    pub(crate) fn grammars_mut(&mut self) -> &mut Grammars<'c> {
        &mut self.grammars
    }

    /// Ob Whitespace-CH im aktuellen Zustand ohne Bedeutung ist.
    pub(crate) fn ignores_whitespace(&self) -> Result<bool> {
        if self.cache().options().preserve().preserves_whitespace() {
            return Ok(false);
        }
        let id = self.current()?;
        let table = self.cache().table();
        Ok(match id {
            GrammarId::DocumentStart
            | GrammarId::DocumentContent
            | GrammarId::DocumentEnd
            | GrammarId::FragmentContent
            | GrammarId::StartTag { stage: TagStage::Nilled, .. } => true,
            GrammarId::StartTag { ty, .. } | GrammarId::Content { ty, .. } => matches!(
                table.type_grammar(ty).content(),
                ContentGrammar::Empty | ContentGrammar::Complex { mixed: false, .. }
            ),
            GrammarId::Simple { .. } | GrammarId::BuiltIn { .. } => false,
        })
    }

    /// Strict: Simple Content verlangt vor EE einen Wert (EXI 8.5.4.1.3.1).
    ///
    /// Der Encoder setzt dann ein leeres CH ein, der Decoder blendet es aus.
    pub(crate) fn needs_empty_value(&mut self) -> Result<bool> {
        if !self.cache().options().strict() {
            return Ok(false);
        }
        let (id, list) = self.event_types()?;
        Ok(list.tier1_end_element().is_none()
            && list.position_of(&Terminal::Characters).is_some()
            && engine::empty_value_valid(self.cache().table(), id))
    }

    /// Übernimmt die Folgezustände eines Schritts.
    pub(crate) fn apply(&mut self, advance: &Advance, event: &ExiEvent) -> Result<()> {
        let next = advance.transition.next;
        if self.stack.is_empty() {
            self.document = next;
        } else if let Some(next) = next {
            if let Some(frame) = self.stack.last_mut() {
                frame.grammar = next;
            }
        } else {
            self.close_element()?;
        }
        if let Some(child) = advance.transition.child {
            self.stack.push(Frame { grammar: child, saved_strings: None });
        }
        if matches!(event, ExiEvent::SelfContained) {
            self.open_region()?;
        }
        Ok(())
    }

    fn open_region(&mut self) -> Result<()> {
        let fresh = self.initial_strings.clone();
        let frame = self
            .stack
            .last_mut()
            .ok_or_else(|| Error::ordering_violation("SC directly after SE", "SC outside an element"))?;
        frame.saved_strings = Some(mem::replace(&mut self.strings, fresh));
        self.grammars.enter_region();
        Ok(())
    }

    fn close_element(&mut self) -> Result<()> {
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| Error::ordering_violation("open element", "EE"))?;
        if let Some(saved) = frame.saved_strings {
            self.strings = saved;
            self.grammars.leave_region()?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Werte (Encoder)
    // ------------------------------------------------------------------

    fn string_value(&mut self, partition: Partition<'_>, s: &Rc<str>) -> Value {
        match self.strings.lookup(partition, s) {
            Some(id) => Value::Hit(id),
            None => {
                self.strings.register(partition, s);
                Value::Miss(Rc::clone(s))
            }
        }
    }

    fn name_values(&mut self, terminal: &Terminal, qname: &QName, out: &mut Vec<Value>) {
        let wildcard = matches!(
            terminal,
            Terminal::StartElement(StartElementKind::Wildcard)
                | Terminal::Attribute(AttributeKind::Wildcard | AttributeKind::WildcardUntyped)
        );
        if wildcard {
            out.push(self.string_value(Partition::Uri, &qname.uri));
        }
        if wildcard || terminal.namespace().is_some() {
            out.push(self.string_value(Partition::LocalName(&qname.uri), &qname.local_name));
        }
        if self.cache().options().preserve().prefixes {
            let prefix: Rc<str> = qname.prefix.clone().unwrap_or_else(|| Rc::from(""));
            out.push(self.string_value(Partition::Prefix(&qname.uri), &prefix));
        }
    }

    /// Werte eines Events zum gewählten Eintrag.
    pub(crate) fn encode_values(&mut self, event_type: &EventType, event: &ExiEvent) -> Result<Vec<Value>> {
        let mut values = Vec::new();
        let terminal = event_type.terminal();
        match (terminal, event) {
            (Terminal::XsiType, ExiEvent::Attribute(at)) => values.push(Value::Literal(Rc::clone(&at.value))),
            (Terminal::XsiNil, ExiEvent::Attribute(at)) => {
                let nil = engine::parse_boolean(&at.value)
                    .ok_or_else(|| Error::InvalidValue(format!("xsi:nil '{}'", at.value)))?;
                values.push(Value::Boolean(nil));
            }
            (_, ExiEvent::StartElement(qname)) => self.name_values(terminal, qname, &mut values),
            (_, ExiEvent::Attribute(at)) => {
                self.name_values(terminal, &at.qname, &mut values);
                values.push(self.string_value(Partition::Value, &at.value));
            }
            (_, ExiEvent::Characters(ch)) => values.push(self.string_value(Partition::Value, &ch.value)),
            (_, ExiEvent::NamespaceDeclaration(ns)) => {
                values.push(self.string_value(Partition::Uri, &ns.uri));
                values.push(self.string_value(Partition::Prefix(&ns.uri), &ns.prefix));
                values.push(Value::Boolean(ns.local_element_ns));
            }
            (_, ExiEvent::Comment(cm)) => values.push(Value::Literal(Rc::clone(&cm.text))),
            (_, ExiEvent::ProcessingInstruction(pi)) => {
                values.push(Value::Literal(Rc::clone(&pi.name)));
                values.push(Value::Literal(Rc::clone(&pi.text)));
            }
            _ => {}
        }
        Ok(values)
    }

    // ------------------------------------------------------------------
    // Werte (Decoder)
    // ------------------------------------------------------------------

    fn read_string(&mut self, partition: Partition<'_>, value: Option<&Value>) -> Result<Rc<str>> {
        match value {
            Some(Value::Hit(id)) => self
                .strings
                .get(partition, *id)
                .cloned()
                .ok_or_else(|| Error::InvalidString(format!("{partition:?} id {id}"))),
            Some(Value::Miss(s)) => {
                self.strings.register(partition, s);
                Ok(Rc::clone(s))
            }
            Some(Value::Literal(s)) => Ok(Rc::clone(s)),
            Some(Value::Boolean(_)) | None => Err(Error::InvalidString(format!("{partition:?}: missing string"))),
        }
    }

    fn read_bool(value: Option<&Value>) -> Result<bool> {
        match value {
            Some(Value::Boolean(b)) => Ok(*b),
            _ => Err(Error::InvalidString("missing boolean".into())),
        }
    }

    fn read_name<'v>(
        &mut self,
        event_type: &EventType,
        values: &mut impl Iterator<Item = &'v Value>,
    ) -> Result<QName> {
        let terminal = event_type.terminal();
        let fixed = event_type.qname(self.grammars.interner());
        let (uri, local_name) = match fixed {
            Some(q) => (q.uri, q.local_name),
            None => {
                let uri = match terminal.namespace() {
                    Some(ns) => self.grammars.interner().resolve_rc(ns),
                    None => self.read_string(Partition::Uri, values.next())?,
                };
                let local_name = self.read_string(Partition::LocalName(&uri), values.next())?;
                (uri, local_name)
            }
        };
        let prefix = if self.cache().options().preserve().prefixes {
            let p = self.read_string(Partition::Prefix(&uri), values.next())?;
            (!p.is_empty()).then_some(p)
        } else {
            None
        };
        Ok(QName::with_optional_prefix(uri, local_name, prefix))
    }

    /// Baut das Event eines Eintrags aus den Werten.
    pub(crate) fn decode_event(&mut self, event_type: &EventType, values: &[Value]) -> Result<ExiEvent> {
        let mut values = values.iter();
        let event = match event_type.terminal() {
            Terminal::StartDocument => ExiEvent::StartDocument,
            Terminal::EndDocument => ExiEvent::EndDocument,
            Terminal::EndElement => ExiEvent::EndElement,
            Terminal::SelfContained => ExiEvent::SelfContained,
            Terminal::StartElement(_) => {
                ExiEvent::StartElement(Rc::new(self.read_name(event_type, &mut values)?))
            }
            Terminal::XsiType => ExiEvent::Attribute(AtContent {
                qname: Rc::new(QName::xsi_type()),
                value: self.read_string(Partition::Value, values.next())?,
            }),
            Terminal::XsiNil => {
                let nil = Self::read_bool(values.next())?;
                ExiEvent::Attribute(AtContent {
                    qname: Rc::new(QName::xsi_nil()),
                    value: Rc::from(if nil { "true" } else { "false" }),
                })
            }
            Terminal::Attribute(_) => {
                let qname = Rc::new(self.read_name(event_type, &mut values)?);
                let value = self.read_string(Partition::Value, values.next())?;
                ExiEvent::Attribute(AtContent { qname, value })
            }
            Terminal::Characters | Terminal::CharactersUntyped => ExiEvent::Characters(ChContent {
                value: self.read_string(Partition::Value, values.next())?,
            }),
            Terminal::NamespaceDecl => {
                let uri = self.read_string(Partition::Uri, values.next())?;
                let prefix = self.read_string(Partition::Prefix(&uri), values.next())?;
                let local_element_ns = Self::read_bool(values.next())?;
                ExiEvent::NamespaceDeclaration(NsContent { uri, prefix, local_element_ns })
            }
            Terminal::Comment => ExiEvent::Comment(CmContent {
                text: self.read_string(Partition::Value, values.next())?,
            }),
            Terminal::ProcessingInstr => {
                let name = self.read_string(Partition::Value, values.next())?;
                let text = self.read_string(Partition::Value, values.next())?;
                ExiEvent::ProcessingInstruction(PiContent { name, text })
            }
        };
        if values.next().is_some() {
            return Err(Error::InvalidString(format!("surplus values for {}", event_type.kind())));
        }
        Ok(event)
    }
}
