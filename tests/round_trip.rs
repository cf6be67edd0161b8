//! Round-Trip über eine Options-Matrix.
//!
//! Für jedes XML-Dokument und jede passende Options-Variante:
//! 1. XML -> Events (quick-xml Adapter)
//! 2. Events -> Event Codes (Encoder)
//! 3. Event Codes -> Events (Decoder)
//! 4. Vergleich der kanonischen Form

use std::rc::Rc;

use exi_grammar::schema::*;
use exi_grammar::{
    decode, encode, parse_xml_events_from_str, Alignment, Decoder, ExiEvent, ExiOptions, GrammarCache, Preserve,
    QName,
};

include!("common/canonical.rs");
include!("common/schemas.rs");

// ============================================================================
// Testdaten
// ============================================================================

struct Case {
    name: &'static str,
    schema: Option<fn() -> SchemaInfo>,
    xml: &'static str,
    /// Dokument ist schema-gültig (Strict-Variante sinnvoll).
    valid: bool,
    fragment: bool,
}

fn product_nillable() -> SchemaInfo {
    product_schema(true)
}

const CASES: &[Case] = &[
    Case {
        name: "scenario_a",
        schema: Some(scenario_a_schema),
        xml: "<A>\n  <AB/>\n  <AC/>\n  <AC/>\n  <AD/>\n  <AE/>\n</A>",
        valid: true,
        fragment: false,
    },
    Case {
        name: "scenario_a_surplus",
        schema: Some(scenario_a_schema),
        xml: "<A><AB/><AC/><AC/><AC>late</AC><AD x=\"1\"/></A>",
        valid: false,
        fragment: false,
    },
    Case {
        name: "product",
        schema: Some(product_nillable),
        xml: r#"<product color="red" sku="12"><name>Lamp</name><price>9.50</price></product>"#,
        valid: true,
        fragment: false,
    },
    Case {
        name: "product_nil",
        schema: Some(product_nillable),
        xml: r#"<product xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" sku="3" xsi:nil="1"/>"#,
        valid: true,
        fragment: false,
    },
    Case {
        name: "product_invalid_values",
        schema: Some(product_nillable),
        xml: r#"<product sku="twelve"><name>Lamp</name><price>cheap</price></product>"#,
        valid: false,
        fragment: false,
    },
    Case {
        name: "all_group",
        schema: Some(all_group_schema),
        xml: "<r><b/><c/><a/></r>",
        valid: true,
        fragment: false,
    },
    Case {
        name: "mixed",
        schema: Some(mixed_schema),
        xml: r#"<doc>Hello <em>big</em> world<x a="1">free <y/></x></doc>"#,
        valid: false,
        fragment: false,
    },
    Case {
        name: "schema_less_nested",
        schema: None,
        xml: r#"<p:root xmlns:p="urn:p" xmlns="urn:d" p:id="7"><item n="1">one</item><item n="2">two</item><!--c--><?pi data?><item n="1">one</item></p:root>"#,
        valid: false,
        fragment: false,
    },
    Case {
        name: "schema_less_fragment",
        schema: None,
        xml: "<a>1</a>\n<b/><a>1</a>",
        valid: false,
        fragment: true,
    },
];

// ============================================================================
// Options-Matrix
// ============================================================================

fn variants(case: &Case) -> Vec<(&'static str, ExiOptions)> {
    let base = if case.fragment { ExiOptions::default().with_fragment() } else { ExiOptions::default() };
    let mut out = vec![
        ("default", base.clone()),
        ("byte_aligned", base.clone().with_alignment(Alignment::ByteAlignment)),
        (
            "whitespace",
            base.clone().with_preserve(Preserve { whitespace: true, ..Default::default() }),
        ),
        (
            "lexical",
            base.clone().with_preserve(Preserve { lexical_values: true, ..Default::default() }),
        ),
        (
            "fidelity",
            base.clone().with_preserve(Preserve { comments: true, pis: true, prefixes: true, ..Default::default() }),
        ),
        ("self_contained", base.clone().with_self_contained()),
    ];
    if case.valid {
        out.push(("strict", base.with_strict()));
    }
    out
}

fn cache_for(case: &Case, options: ExiOptions) -> GrammarCache {
    match case.schema {
        Some(schema) => GrammarCache::new(&schema(), options).unwrap(),
        None => GrammarCache::schema_less(options).unwrap(),
    }
}

#[test]
fn option_matrix_round_trips() {
    for case in CASES {
        for (variant, options) in variants(case) {
            let cache = cache_for(case, options.clone());
            let events = parse_xml_events_from_str(case.xml, &options)
                .unwrap_or_else(|e| panic!("{}/{variant}: parse failed: {e}", case.name));
            let items = encode(&cache, &events)
                .unwrap_or_else(|e| panic!("{}/{variant}: encode failed: {e}", case.name));
            let decoded = decode(&cache, &items)
                .unwrap_or_else(|e| panic!("{}/{variant}: decode failed: {e}", case.name));

            let keep_whitespace = options.preserve().preserves_whitespace();
            assert_eq!(
                canonical(&decoded, keep_whitespace),
                canonical(&events, keep_whitespace),
                "{}/{variant}",
                case.name
            );
        }
    }
}

/// Codes sind deterministisch: zwei Encoder-Läufe liefern dieselbe Folge.
#[test]
fn encoding_is_deterministic() {
    for case in CASES {
        let options = if case.fragment { ExiOptions::default().with_fragment() } else { ExiOptions::default() };
        let events = parse_xml_events_from_str(case.xml, &options).unwrap();
        let first = encode(&cache_for(case, options.clone()), &events).unwrap();
        let second = encode(&cache_for(case, options), &events).unwrap();
        assert_eq!(first, second, "{}", case.name);
    }
}

/// Ein Cache bedient mehrere Sessions, der Lernstand bleibt pro Session.
#[test]
fn cache_is_shared_across_sessions() {
    let case = &CASES[1];
    let cache = cache_for(case, ExiOptions::default());
    let events = parse_xml_events_from_str(case.xml, &ExiOptions::default()).unwrap();
    let first = encode(&cache, &events).unwrap();
    let second = encode(&cache, &events).unwrap();
    assert_eq!(first, second);
}

/// Prefixe überleben nur mit preserve.prefixes.
#[test]
fn prefixes_round_trip_when_preserved() {
    let case = &CASES[7];
    let options = ExiOptions::default().with_preserve(Preserve { prefixes: true, ..Default::default() });
    let cache = cache_for(case, options.clone());
    let events = parse_xml_events_from_str(case.xml, &options).unwrap();
    let decoded = decode(&cache, &encode(&cache, &events).unwrap()).unwrap();
    let ExiEvent::StartElement(root) = &decoded[1] else { panic!("expected SE, got {}", decoded[1]) };
    assert_eq!(root.prefix.as_deref(), Some("p"));
    assert!(decoded.iter().any(|e| matches!(e, ExiEvent::NamespaceDeclaration(ns) if &*ns.prefix == "p")));

    let plain = GrammarCache::schema_less(ExiOptions::default()).unwrap();
    let events = parse_xml_events_from_str(case.xml, &ExiOptions::default()).unwrap();
    let decoded = decode(&plain, &encode(&plain, &events).unwrap()).unwrap();
    let ExiEvent::StartElement(root) = &decoded[1] else { panic!("expected SE, got {}", decoded[1]) };
    assert_eq!(root.prefix, None);
}

/// SC-Regionen laufen durch Encoder und Decoder.
#[test]
fn self_contained_regions_round_trip() {
    let cache = GrammarCache::new(&mixed_schema(), ExiOptions::default().with_self_contained()).unwrap();
    let events = vec![
        ExiEvent::StartDocument,
        ExiEvent::start("", "doc"),
        ExiEvent::characters("shared"),
        ExiEvent::start("", "em"),
        ExiEvent::SelfContained,
        ExiEvent::characters("shared"),
        ExiEvent::start("", "inner"),
        ExiEvent::characters("shared"),
        ExiEvent::EndElement,
        ExiEvent::EndElement,
        ExiEvent::characters("shared"),
        ExiEvent::EndElement,
        ExiEvent::EndDocument,
    ];
    let items = encode(&cache, &events).unwrap();
    assert_eq!(decode(&cache, &items).unwrap(), events);
}

/// Der Decoder arbeitet auch Item für Item.
#[test]
fn streaming_decoder_matches_batch() {
    let case = &CASES[2];
    let cache = cache_for(case, ExiOptions::default());
    let events = parse_xml_events_from_str(case.xml, &ExiOptions::default()).unwrap();
    let items = encode(&cache, &events).unwrap();

    let mut decoder = Decoder::new(&cache);
    let mut streamed = Vec::new();
    for item in &items {
        assert!(!decoder.is_finished());
        streamed.push(decoder.decode_item(item).unwrap().event);
    }
    assert!(decoder.is_finished());
    assert_eq!(canonical(&streamed, false), canonical(&decode(&cache, &items).unwrap(), false));
}

#[test]
fn invalid_option_combinations_are_rejected() {
    let strict_comments = ExiOptions::default()
        .with_strict()
        .with_preserve(Preserve { comments: true, ..Default::default() });
    assert!(GrammarCache::new(&scenario_a_schema(), strict_comments).is_err());
    let strict_sc = ExiOptions::default().with_strict().with_self_contained();
    assert!(GrammarCache::schema_less(strict_sc).is_err());
}
