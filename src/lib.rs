//! exi-grammar – Schema-informed EXI 1.0 Grammar Engine
//!
//! Baut aus einem Schema-Modell die Grammars aus EXI 8.5, verwaltet den
//! Lernstand pro Session (EXI 8.4.3) und liefert für jeden Zustand die
//! geordnete Event Type List, aus der Event Codes entstehen.
//!
//! # Beispiel
//!
//! ```
//! use std::rc::Rc;
//! use exi_grammar::{ExiEvent, ExiOptions, GrammarCache, QName};
//! use exi_grammar::schema::{ContentType, ElementDeclaration, SchemaInfo, TypeDefinition};
//! use exi_grammar::encoder::encode;
//! use exi_grammar::decoder::decode;
//!
//! let note = TypeDefinition::complex(ContentType::Simple(Rc::new(TypeDefinition::simple("string"))));
//! let schema = SchemaInfo::builder()
//!     .element(ElementDeclaration::new(QName::new("", "note")).with_type(Rc::new(note)))
//!     .build()
//!     .unwrap();
//! let cache = GrammarCache::new(&schema, ExiOptions::default()).unwrap();
//!
//! let events = vec![
//!     ExiEvent::StartDocument,
//!     ExiEvent::start("", "note"),
//!     ExiEvent::characters("Hello"),
//!     ExiEvent::EndElement,
//!     ExiEvent::EndDocument,
//! ];
//! let items = encode(&cache, &events).unwrap();
//! assert_eq!(decode(&cache, &items).unwrap(), events);
//! ```

pub mod bit_width;
pub mod content_model;
pub mod decoder;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod event;
pub mod event_code;
pub mod event_type;
pub mod grammar;
pub mod grammar_cache;
pub mod options;
pub mod qname;
pub mod schema;
pub mod schema_grammar;
pub mod session;
pub mod string_table;
pub mod typed_value;
pub mod undeclared;
pub mod xml;

pub use error::{Error, Result};

/// HashMap mit ahash (schneller, nicht DoS-resistent – für interne Datenstrukturen).
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// IndexMap mit ahash (deterministische Iteration + schnelles Hashing).
pub(crate) type FastIndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;

// Public API: Events
pub use event::{AtContent, ChContent, CmContent, ExiEvent, NsContent, PiContent};

// Public API: Options
pub use options::{Alignment, ExiOptions, Preserve};

// Public API: Grammars
pub use event_code::{EventCode, EventCodeContext};
pub use event_type::{EventKind, EventType, EventTypeList, Origin};
pub use grammar::GrammarId;
pub use grammar_cache::{GrammarCache, Grammars};

// Public API: Encoder/Decoder
pub use decoder::{decode, Decoder};
pub use encoder::{encode, Encoder};
pub use session::{CodeItem, EventDescription, Value};

// Public API: Types
pub use qname::QName;
pub use schema::SchemaInfo;

// Public API: XML
pub use xml::parse_xml_events_from_str;
