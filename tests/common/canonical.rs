// Kanonische Textform von Event-Folgen für Round-Trip-Vergleiche.
//
// Wird per `include!` eingebunden. Benötigte Imports:
//   use exi_grammar::{ExiEvent, QName};

/// Name in Clark-Notation, Prefix wird ignoriert.
fn clark(q: &QName) -> String {
    if q.uri.is_empty() {
        q.local_name.to_string()
    } else {
        format!("{{{}}}{}", q.uri, q.local_name)
    }
}

/// Serialisiert Events zeilenweise.
///
/// Normalisierungen:
/// - Attribute und NS eines Start-Tags sortiert
/// - xsi:nil kanonisch (`1` -> `true`, `0` -> `false`)
/// - Whitespace-only CH übersprungen, außer `keep_whitespace`; leere CH bleiben
fn canonical(events: &[ExiEvent], keep_whitespace: bool) -> Vec<String> {
    let mut lines = Vec::new();
    let mut tag: Vec<String> = Vec::new();
    let flush = |tag: &mut Vec<String>, lines: &mut Vec<String>| {
        tag.sort();
        lines.append(tag);
    };

    for event in events {
        match event {
            ExiEvent::Attribute(at) => {
                let value = match &*at.value {
                    "1" if at.qname.is_xsi_nil() => "true",
                    "0" if at.qname.is_xsi_nil() => "false",
                    v => v,
                };
                tag.push(format!("AT({})={value:?}", clark(&at.qname)));
            }
            ExiEvent::NamespaceDeclaration(ns) => {
                tag.push(format!("NS({}={})", ns.prefix, ns.uri));
            }
            ExiEvent::SelfContained => tag.push("SC".to_string()),
            other => {
                flush(&mut tag, &mut lines);
                match other {
                    ExiEvent::Characters(ch)
                        if !keep_whitespace && !ch.value.is_empty() && ch.value.trim().is_empty() => {}
                    ExiEvent::StartElement(q) => lines.push(format!("SE({})", clark(q))),
                    other => lines.push(other.to_string()),
                }
            }
        }
    }
    flush(&mut tag, &mut lines);
    lines
}
