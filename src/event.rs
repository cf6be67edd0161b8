//! Infoset events (EXI 4, Table 4-1).
//!
//! The events an XML source produces for the encoder and the decoder hands
//! back. DOCTYPE and entity references are not modelled: no grammar phase
//! in this engine offers a slot for them.

use std::fmt;
use std::rc::Rc;

use crate::qname::QName;

/// Content for Namespace Declaration (NS) events.
///
/// When `local_element_ns` is true, the `uri` matches the URI of the
/// associated SE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsContent {
    /// The namespace URI being declared.
    pub uri: Rc<str>,
    /// The prefix bound to this URI (empty string for default namespace).
    pub prefix: Rc<str>,
    /// True if this NS event specifies the prefix of the associated element.
    pub local_element_ns: bool,
}

/// Content for Attribute (AT) events, including xsi:type and xsi:nil.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtContent {
    /// The qualified name of the attribute.
    pub qname: Rc<QName>,
    /// The lexical attribute value.
    pub value: Rc<str>,
}

/// Content for Characters (CH) events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChContent {
    /// The character data.
    pub value: Rc<str>,
}

/// Content for Comment (CM) events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmContent {
    /// The comment text.
    pub text: Rc<str>,
}

/// Content for Processing Instruction (PI) events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiContent {
    /// The PI target name.
    pub name: Rc<str>,
    /// The PI data.
    pub text: Rc<str>,
}

impl Default for NsContent {
    fn default() -> Self {
        Self { uri: Rc::from(""), prefix: Rc::from(""), local_element_ns: false }
    }
}

impl Default for CmContent {
    fn default() -> Self {
        Self { text: Rc::from("") }
    }
}

impl Default for PiContent {
    fn default() -> Self {
        Self { name: Rc::from(""), text: Rc::from("") }
    }
}

/// One infoset event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExiEvent {
    /// Start Document.
    StartDocument,
    /// End Document.
    EndDocument,
    /// Start Element with its qualified name.
    StartElement(Rc<QName>),
    /// End Element, closes the innermost open element.
    EndElement,
    /// Attribute. xsi:type and xsi:nil are ordinary attributes here; the
    /// grammar decides whether they select a dedicated slot.
    Attribute(AtContent),
    /// Character data.
    Characters(ChContent),
    /// Namespace declaration.
    NamespaceDeclaration(NsContent),
    /// Comment.
    Comment(CmContent),
    /// Processing instruction.
    ProcessingInstruction(PiContent),
    /// Marks the current element as self-contained (EXI 4). Only legal
    /// directly after its SE, before any attribute.
    SelfContained,
}

impl ExiEvent {
    /// Shorthand for an unprefixed start element.
    pub fn start(uri: &str, local_name: &str) -> Self {
        Self::StartElement(Rc::new(QName::new(uri, local_name)))
    }

    /// Shorthand for an unprefixed attribute.
    pub fn attribute(uri: &str, local_name: &str, value: &str) -> Self {
        Self::Attribute(AtContent {
            qname: Rc::new(QName::new(uri, local_name)),
            value: Rc::from(value),
        })
    }

    /// Shorthand for character data.
    pub fn characters(value: &str) -> Self {
        Self::Characters(ChContent { value: Rc::from(value) })
    }

    /// Short kind tag as used in event-code listings (SE, AT, CH, ...).
    pub fn tag(&self) -> &'static str {
        match self {
            Self::StartDocument => "SD",
            Self::EndDocument => "ED",
            Self::StartElement(_) => "SE",
            Self::EndElement => "EE",
            Self::Attribute(_) => "AT",
            Self::Characters(_) => "CH",
            Self::NamespaceDeclaration(_) => "NS",
            Self::Comment(_) => "CM",
            Self::ProcessingInstruction(_) => "PI",
            Self::SelfContained => "SC",
        }
    }
}

impl fmt::Display for ExiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartElement(q) => write!(f, "SE({q})"),
            Self::Attribute(at) => write!(f, "AT({})={:?}", at.qname, &*at.value),
            Self::Characters(ch) => write!(f, "CH({:?})", &*ch.value),
            Self::NamespaceDeclaration(ns) => write!(f, "NS({}={})", ns.prefix, ns.uri),
            Self::Comment(cm) => write!(f, "CM({:?})", &*cm.text),
            Self::ProcessingInstruction(pi) => write!(f, "PI({} {:?})", pi.name, &*pi.text),
            other => f.write_str(other.tag()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthands_build_unprefixed_names() {
        let ExiEvent::StartElement(q) = ExiEvent::start("urn:a", "A") else {
            panic!("Expected StartElement");
        };
        assert_eq!(&*q.uri, "urn:a");
        assert!(q.prefix.is_none());

        let ExiEvent::Attribute(at) = ExiEvent::attribute("", "id", "7") else {
            panic!("Expected Attribute");
        };
        assert_eq!(&*at.value, "7");
    }

    #[test]
    fn display_uses_clark_notation() {
        assert_eq!(ExiEvent::start("urn:a", "A").to_string(), "SE({urn:a}A)");
        assert_eq!(ExiEvent::start("", "A").to_string(), "SE(A)");
        assert_eq!(ExiEvent::EndElement.to_string(), "EE");
        assert_eq!(ExiEvent::characters("x").to_string(), "CH(\"x\")");
    }

    #[test]
    fn content_defaults_are_empty() {
        assert_eq!(&*NsContent::default().uri, "");
        assert_eq!(&*CmContent::default().text, "");
        assert_eq!(&*PiContent::default().name, "");
    }

    #[test]
    fn events_compare_by_value() {
        assert_eq!(ExiEvent::characters("a"), ExiEvent::characters("a"));
        assert_ne!(ExiEvent::characters("a"), ExiEvent::characters("b"));
        assert_eq!(ExiEvent::SelfContained.tag(), "SC");
    }
}
