//! Central error types for the grammar engine.
//!
//! Each variant names the EXI 1.0 section whose rule it enforces. Only
//! configuration errors, strict-mode schema violations and decode
//! desynchronization abort a session; schema deviations under default options
//! are resolved through escape productions and never reach this type.

use core::fmt;
use std::borrow::Cow;

/// All errors raised by grammar construction, encoding and decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// An event code does not address any entry of the current Event Type List (EXI 6.1, 6.2).
    ///
    /// Auf der Decoder-Seite bedeutet das Desynchronisation: entweder ist der
    /// Stream beschädigt oder Encoder und Decoder nutzen verschiedene Options.
    InvalidEventCode {
        /// Der Event Code der nicht passte (leer wenn nicht verfügbar).
        event_code: Cow<'static, str>,
        /// Der Grammar-Zustand in dem der Fehler auftrat (leer wenn nicht verfügbar).
        grammar_state: Cow<'static, str>,
    },
    /// An invalid combination of EXI options was specified (EXI 5.4).
    InvalidOptionCombination,
    /// A start element matches no production and strict mode forbids escapes (EXI 8.5.4.4.2).
    UnexpectedElement(String),
    /// An attribute matches no production and strict mode forbids escapes (EXI 8.5.4.4.2).
    UnexpectedAttribute(String),
    /// Character data matches no production and strict mode forbids escapes (EXI 8.5.4.4.2).
    UnexpectedCharacters(String),
    /// End element requested while mandatory content is still missing (EXI 8.5.4.4.2).
    EndElementNotAllowed(String),
    /// Events appear in an order no grammar phase accepts (EXI 8).
    OrderingViolation {
        /// Was erwartet wurde (leer wenn nicht verfügbar).
        expected: Cow<'static, str>,
        /// Was gefunden wurde (leer wenn nicht verfügbar).
        found: Cow<'static, str>,
    },
    /// A typed value does not match its declared type and no untyped escape exists (EXI 7.1).
    InvalidValue(String),
    /// xsi:type references a type not found in the schema (EXI 8.5.4.4).
    XsiTypeNotFound(String),
    /// The static schema model is inconsistent (EXI 8.5).
    SchemaViolation(Cow<'static, str>),
    /// A Particle has invalid occurs constraints: max < min (EXI 8.5.4.1.5).
    InvalidParticleOccurs { min: usize, max: usize },
    /// A WildcardConstraint::Namespaces has an empty namespace list (EXI 8.5.4.1.7).
    EmptyNamespaceList,
    /// Flattening a content model produced more states than the configured limit.
    ContentModelTooComplex(usize),
    /// A string table identifier does not exist in its partition (EXI 7.3).
    InvalidString(String),
    /// XML parsing failed.
    XmlParseError(String),
    /// An interner or counter exceeded its representable range.
    IntegerOverflow,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEventCode { event_code, grammar_state } => {
                if event_code.is_empty() && grammar_state.is_empty() {
                    write!(f, "invalid event code (EXI 6.1, 6.2)")
                } else if grammar_state.is_empty() {
                    write!(f, "invalid event code '{event_code}' (EXI 6.1, 6.2)")
                } else {
                    write!(f, "invalid event code '{event_code}' in state '{grammar_state}' (EXI 6.1, 6.2)")
                }
            }
            Self::InvalidOptionCombination => write!(f, "invalid EXI option combination (EXI 5.4)"),
            Self::UnexpectedElement(name) => write!(f, "unexpected element '{name}' (EXI 8.5.4.4.2)"),
            Self::UnexpectedAttribute(name) => write!(f, "unexpected attribute '{name}' (EXI 8.5.4.4.2)"),
            Self::UnexpectedCharacters(state) => {
                write!(f, "unexpected character data in state '{state}' (EXI 8.5.4.4.2)")
            }
            Self::EndElementNotAllowed(state) => {
                write!(f, "end element not allowed in state '{state}' (EXI 8.5.4.4.2)")
            }
            Self::OrderingViolation { expected, found } => {
                if expected.is_empty() && found.is_empty() {
                    write!(f, "event ordering violation (EXI 8)")
                } else {
                    write!(f, "event ordering violation: expected '{expected}', found '{found}' (EXI 8)")
                }
            }
            Self::InvalidValue(msg) => write!(f, "invalid typed value (EXI 7.1): {msg}"),
            Self::XsiTypeNotFound(type_name) => {
                write!(f, "xsi:type '{type_name}' not found in schema (EXI 8.5.4.4)")
            }
            Self::SchemaViolation(msg) => {
                if msg.is_empty() {
                    write!(f, "schema violation (EXI 8.5)")
                } else {
                    write!(f, "schema violation: {msg} (EXI 8.5)")
                }
            }
            Self::InvalidParticleOccurs { min, max } => {
                write!(f, "invalid particle occurs: max {max} < min {min} (EXI 8.5.4.1.5)")
            }
            Self::EmptyNamespaceList => {
                write!(f, "empty namespace list in WildcardConstraint (EXI 8.5.4.1.7)")
            }
            Self::ContentModelTooComplex(limit) => {
                write!(f, "content model exceeds {limit} grammar states (EXI 8.5.4.2)")
            }
            Self::InvalidString(msg) => write!(f, "invalid string table reference (EXI 7.3): {msg}"),
            Self::XmlParseError(msg) => write!(f, "XML parse error: {msg}"),
            Self::IntegerOverflow => write!(f, "integer overflow"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Erzeugt `InvalidEventCode` mit Kontext.
    pub fn invalid_event_code(
        event_code: impl Into<Cow<'static, str>>,
        grammar_state: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidEventCode {
            event_code: event_code.into(),
            grammar_state: grammar_state.into(),
        }
    }

    /// Erzeugt `OrderingViolation` mit Kontext.
    pub fn ordering_violation(
        expected: impl Into<Cow<'static, str>>,
        found: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::OrderingViolation {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Erzeugt `SchemaViolation` mit Nachricht.
    pub fn schema_violation(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::SchemaViolation(msg.into())
    }

    /// True für Schema-Verletzungen im strict-Modus (fatal, eigene Kategorie).
    pub fn is_strict_violation(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedElement(_)
                | Self::UnexpectedAttribute(_)
                | Self::UnexpectedCharacters(_)
                | Self::EndElementNotAllowed(_)
        )
    }
}

pub type Result<T> = core::result::Result<T, Error>;
