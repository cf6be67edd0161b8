//! XML-Text zu EXI Events.
//!
//! Nutzt quick-xml um aus einem XML-Dokument die Event-Folge für den
//! Encoder zu bauen. Die Preserve-Options bestimmen welche Konstrukte
//! überhaupt als Event erscheinen.

use crate::event::ExiEvent;
use crate::options::ExiOptions;
use crate::Result;

mod emit;

/// Parsing-Flags, abgeleitet aus ExiOptions.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ParseFlags {
    preserve_prefixes: bool,
    preserve_comments: bool,
    preserve_pis: bool,
    /// Insignifikanten Whitespace zwischen Elementen früh filtern.
    strip_whitespace: bool,
}

impl ParseFlags {
    pub(crate) fn from_options(opts: &ExiOptions) -> Self {
        let preserve = opts.preserve();
        Self {
            preserve_prefixes: preserve.prefixes,
            preserve_comments: preserve.comments,
            preserve_pis: preserve.pis,
            strip_whitespace: !preserve.preserves_whitespace(),
        }
    }
}

/// Parst XML aus einem String in EXI Events.
///
/// # Fehler
///
/// `Error::XmlParseError` bei nicht wohlgeformtem XML oder unbekannten
/// Namespace-Prefixes.
pub fn parse_xml_events_from_str(xml: &str, opts: &ExiOptions) -> Result<Vec<ExiEvent>> {
    let mut events = Vec::new();
    emit_xml_events_from_str_cb(xml, opts, |event| {
        events.push(event);
        Ok(())
    })?;
    Ok(events)
}

/// Parst XML aus einem String und ruft `emit` für jedes Event auf.
///
/// Analog zu [`parse_xml_events_from_str`], aber ohne Vec-Allokation.
pub fn emit_xml_events_from_str_cb(
    xml: &str,
    opts: &ExiOptions,
    emit: impl FnMut(ExiEvent) -> Result<()>,
) -> Result<()> {
    let flags = ParseFlags::from_options(opts);
    emit::emit_xml_events(xml, &flags, emit)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::error::Error;
    use crate::event::{AtContent, ChContent, NsContent};
    use crate::options::Preserve;
    use crate::qname::QName;

    fn parse(xml: &str) -> Vec<ExiEvent> {
        parse_xml_events_from_str(xml, &ExiOptions::default()).unwrap()
    }

    #[test]
    fn elements_attributes_and_text() {
        let events = parse(r#"<r b="2" a="1">x &amp; y</r>"#);
        assert_eq!(
            events,
            vec![
                ExiEvent::StartDocument,
                ExiEvent::start("", "r"),
                ExiEvent::attribute("", "a", "1"),
                ExiEvent::attribute("", "b", "2"),
                ExiEvent::characters("x & y"),
                ExiEvent::EndElement,
                ExiEvent::EndDocument,
            ]
        );
    }

    #[test]
    fn whitespace_between_children_is_stripped() {
        // Vor dem ersten Kind bleibt Whitespace stehen (könnte Simple Content sein).
        let events = parse("<r>\n  <a/>\n  <b>t</b>\n</r>");
        assert_eq!(events.len(), 10);
        let blank = events
            .iter()
            .filter(|e| matches!(e, ExiEvent::Characters(ch) if ch.value.trim().is_empty()))
            .count();
        assert_eq!(blank, 1);

        let opts = ExiOptions::default().with_preserve(Preserve { whitespace: true, ..Default::default() });
        let kept = parse_xml_events_from_str("<r>\n  <a/>\n</r>", &opts).unwrap();
        assert_eq!(kept.iter().filter(|e| matches!(e, ExiEvent::Characters(_))).count(), 2);
    }

    #[test]
    fn text_is_coalesced_across_cdata_and_references() {
        let events = parse("<r>a<![CDATA[<b>]]>&#x43;\r\nd</r>");
        assert_eq!(events[2], ExiEvent::Characters(ChContent { value: Rc::from("a<b>C\nd") }));
    }

    #[test]
    fn namespaces_follow_prefix_option() {
        let xml = r#"<p:r xmlns:p="urn:p" p:k="v"/>"#;
        let plain = parse(xml);
        assert_eq!(plain[1], ExiEvent::start("urn:p", "r"));
        assert_eq!(plain[2], ExiEvent::attribute("urn:p", "k", "v"));

        let opts = ExiOptions::default().with_preserve(Preserve { prefixes: true, ..Default::default() });
        let events = parse_xml_events_from_str(xml, &opts).unwrap();
        assert_eq!(
            events[2],
            ExiEvent::NamespaceDeclaration(NsContent {
                uri: Rc::from("urn:p"),
                prefix: Rc::from("p"),
                local_element_ns: true,
            })
        );
        let ExiEvent::StartElement(q) = &events[1] else { panic!("expected SE") };
        assert_eq!(q.prefix.as_deref(), Some("p"));
    }

    #[test]
    fn xsi_type_is_resolved_and_first() {
        let xml = r#"<r xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
                       xmlns:xs="http://www.w3.org/2001/XMLSchema" a="1" xsi:type="xs:int">5</r>"#;
        let events = parse(xml);
        assert_eq!(
            events[2],
            ExiEvent::Attribute(AtContent {
                qname: Rc::new(QName::xsi_type()),
                value: Rc::from("{http://www.w3.org/2001/XMLSchema}int"),
            })
        );
        assert_eq!(events[3], ExiEvent::attribute("", "a", "1"));
    }

    #[test]
    fn comments_and_pis_only_when_preserved() {
        let xml = "<r><!--c--><?app go?></r>";
        assert_eq!(parse(xml).len(), 4);
        let opts = ExiOptions::default().with_preserve(Preserve { comments: true, pis: true, ..Default::default() });
        let events = parse_xml_events_from_str(xml, &opts).unwrap();
        assert_eq!(events.len(), 6);
        assert!(matches!(&events[3], ExiEvent::ProcessingInstruction(pi) if &*pi.text == "go"));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(matches!(
            parse_xml_events_from_str("<r></s>", &ExiOptions::default()),
            Err(Error::XmlParseError(_))
        ));
        assert!(matches!(
            parse_xml_events_from_str("<r>text</r>tail", &ExiOptions::default()),
            Err(Error::XmlParseError(_))
        ));
    }
}
