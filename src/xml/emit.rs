use std::borrow::Cow;
use std::rc::Rc;

use memchr::memchr;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesCData, BytesStart, BytesText, Event};
use quick_xml::name::{LocalName, QName as XmlQName, ResolveResult};
use quick_xml::reader::NsReader;

use crate::error::Error;
use crate::event::{AtContent, ChContent, CmContent, ExiEvent, NsContent, PiContent};
use crate::qname::{QName, URI_XSI};
use crate::{FastHashMap, Result};

use super::ParseFlags;

/// Wiederkehrende Namen teilen sich ein `Rc<QName>`.
type QNamePool = FastHashMap<(String, String, Option<String>), Rc<QName>>;

pub(crate) fn emit_xml_events(
    xml: &str,
    flags: &ParseFlags,
    mut emit: impl FnMut(ExiEvent) -> Result<()>,
) -> Result<()> {
    // XML 1.0 Sec. 2.11: Zeilenumbruch-Normalisierung
    let normalized = normalize_line_endings(xml);
    let mut reader = NsReader::from_str(&normalized);
    reader.config_mut().trim_text(false);

    let mut depth: usize = 0;
    // CH-Coalescing: gepufferter Text wird vor jedem Nicht-CH-Event geflusht.
    let mut pending_ch: Option<String> = None;
    // Pro Tiefe: wurde schon ein Kind-SE gesehen? Danach ist reiner
    // Whitespace zwischen Elementen insignifikant.
    let mut had_child_se: Vec<bool> = Vec::new();
    let mut pool = QNamePool::default();

    emit(ExiEvent::StartDocument)?;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                flush_pending_ch(&mut pending_ch, &mut emit)?;
                if let Some(flag) = had_child_se.last_mut() {
                    *flag = true;
                }
                emit_start(&reader, &e, flags, false, &mut pool, &mut emit)?;
                depth += 1;
                had_child_se.push(false);
            }
            Ok(Event::Empty(e)) => {
                flush_pending_ch(&mut pending_ch, &mut emit)?;
                if let Some(flag) = had_child_se.last_mut() {
                    *flag = true;
                }
                emit_start(&reader, &e, flags, true, &mut pool, &mut emit)?;
            }
            Ok(Event::End(_)) => {
                flush_pending_ch(&mut pending_ch, &mut emit)?;
                had_child_se.pop();
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::XmlParseError("end tag without start tag".to_string()))?;
                emit(ExiEvent::EndElement)?;
            }
            Ok(Event::Text(e)) => {
                let ignorable = flags.strip_whitespace
                    && depth > 0
                    && pending_ch.is_none()
                    && had_child_se.last() == Some(&true)
                    && e.as_ref().iter().all(|&b| matches!(b, b' ' | b'\t' | b'\n'));
                if !ignorable && let Some(value) = decode_text(&e)? {
                    push_text(&mut pending_ch, depth, value)?;
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(value) = decode_cdata(e)? {
                    push_text(&mut pending_ch, depth, value)?;
                }
            }
            Ok(Event::GeneralRef(e)) => {
                let name = decode_utf8(e.as_ref())?;
                let resolved = if let Some(code) = name.strip_prefix('#') {
                    resolve_char_reference(code).map(String::from)
                } else {
                    resolve_predefined_entity(name).map(str::to_string)
                };
                let value = resolved
                    .ok_or_else(|| Error::XmlParseError(format!("unresolvable entity reference &{name};")))?;
                push_text(&mut pending_ch, depth, value)?;
            }
            Ok(Event::Comment(e)) => {
                // Ohne preserve.comments kein Flush: Text links und rechts verschmilzt.
                if flags.preserve_comments {
                    flush_pending_ch(&mut pending_ch, &mut emit)?;
                    let text = decode_utf8(e.as_ref())?;
                    emit(ExiEvent::Comment(CmContent { text: Rc::from(text) }))?;
                }
            }
            Ok(Event::PI(e)) => {
                if flags.preserve_pis {
                    flush_pending_ch(&mut pending_ch, &mut emit)?;
                    let name = decode_utf8(e.target())?;
                    // S zwischen Target und Daten ist Trenner, nicht Inhalt (XML 1.0 Sec. 2.6).
                    let text = decode_utf8(e.content())?.trim_start();
                    emit(ExiEvent::ProcessingInstruction(PiContent { name: Rc::from(name), text: Rc::from(text) }))?;
                }
            }
            Ok(Event::Decl(_) | Event::DocType(_)) => {}
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlParseError(format!(
                    "parse XML error at {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }

    if depth != 0 {
        return Err(Error::XmlParseError(format!("{depth} unclosed element(s) at end of input")));
    }
    flush_pending_ch(&mut pending_ch, &mut emit)?;
    emit(ExiEvent::EndDocument)
}

/// Flusht gepufferte CH-Daten als Characters-Event.
fn flush_pending_ch(pending_ch: &mut Option<String>, emit: &mut impl FnMut(ExiEvent) -> Result<()>) -> Result<()> {
    if let Some(text) = pending_ch.take() {
        emit(ExiEvent::Characters(ChContent { value: Rc::from(text) }))?;
    }
    Ok(())
}

/// CH-Coalescing; Text außerhalb des Wurzelelements muss Whitespace sein.
fn push_text(pending_ch: &mut Option<String>, depth: usize, value: String) -> Result<()> {
    if depth == 0 {
        if value.trim().is_empty() {
            return Ok(());
        }
        return Err(Error::XmlParseError("character data outside root element".to_string()));
    }
    match pending_ch {
        Some(existing) => existing.push_str(&value),
        None => *pending_ch = Some(value),
    }
    Ok(())
}

fn pooled(pool: &mut QNamePool, uri: String, local_name: String, prefix: Option<String>) -> Rc<QName> {
    let key = (uri, local_name, prefix);
    if let Some(found) = pool.get(&key) {
        return Rc::clone(found);
    }
    let qname = Rc::new(QName::with_optional_prefix(
        Rc::from(key.0.as_str()),
        Rc::from(key.1.as_str()),
        key.2.as_deref().map(Rc::from),
    ));
    pool.insert(key, Rc::clone(&qname));
    qname
}

/// Sortierschlüssel: xsi:type, xsi:nil, dann (local-name, URI).
fn attribute_rank(qname: &QName) -> (u8, &str, &str) {
    let rank = match (&*qname.uri, &*qname.local_name) {
        (URI_XSI, "type") => 0,
        (URI_XSI, "nil") => 1,
        _ => 2,
    };
    (rank, &qname.local_name, &qname.uri)
}

fn emit_start(
    reader: &NsReader<&[u8]>,
    e: &BytesStart<'_>,
    flags: &ParseFlags,
    is_empty: bool,
    pool: &mut QNamePool,
    emit: &mut impl FnMut(ExiEvent) -> Result<()>,
) -> Result<()> {
    let (elem_uri, elem_local, elem_prefix) = resolve_name(reader.resolver().resolve_element(e.name()), e.name())?;
    let elem_qname = pooled(
        pool,
        elem_uri.clone(),
        elem_local,
        if flags.preserve_prefixes { elem_prefix.clone() } else { None },
    );
    emit(ExiEvent::StartElement(elem_qname))?;

    let mut ns_decls = Vec::new();
    let mut attrs: Vec<(Rc<QName>, String)> = Vec::with_capacity(8);

    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|er| Error::XmlParseError(er.to_string()))?;
        let value = unescape_attr_value(decode_utf8(attr.value.as_ref())?)?.into_owned();

        if let Some(ns) = namespace_decl(attr.key.as_ref(), value.as_str(), &elem_uri, elem_prefix.as_deref())? {
            if flags.preserve_prefixes {
                ns_decls.push(ns);
            }
            continue;
        }

        let (uri, local_name, prefix) = resolve_name(reader.resolver().resolve_attribute(attr.key), attr.key)?;
        let qname = pooled(pool, uri, local_name, if flags.preserve_prefixes { prefix } else { None });
        // xsi:type-Wert ist ein QName; der Prefix wird hier aufgelöst (EXI 8.5.4.4).
        let value = if qname.is_xsi_type() { resolve_xsi_type_value(reader, &value) } else { value };
        attrs.push((qname, value));
    }

    attrs.sort_by(|(a, _), (b, _)| attribute_rank(a).cmp(&attribute_rank(b)));

    for ns in ns_decls {
        emit(ExiEvent::NamespaceDeclaration(ns))?;
    }
    for (qname, value) in attrs {
        emit(ExiEvent::Attribute(AtContent { qname, value: Rc::from(value) }))?;
    }
    if is_empty {
        emit(ExiEvent::EndElement)?;
    }
    Ok(())
}

fn resolve_name(
    resolved: (ResolveResult<'_>, LocalName<'_>),
    raw: XmlQName<'_>,
) -> Result<(String, String, Option<String>)> {
    let (ns, local) = resolved;
    let uri = match ns {
        ResolveResult::Bound(ns) => decode_utf8(ns.as_ref())?.to_string(),
        ResolveResult::Unbound => String::new(),
        ResolveResult::Unknown(p) => {
            return Err(Error::XmlParseError(format!(
                "unknown namespace prefix '{}'",
                String::from_utf8_lossy(&p)
            )));
        }
    };
    let local_name = decode_utf8(local.as_ref())?.to_string();
    let prefix = match raw.prefix() {
        Some(p) => Some(decode_utf8(p.as_ref())?.to_string()),
        None => None,
    };
    Ok((uri, local_name, prefix))
}

/// Löst den Prefix im xsi:type-Wert auf und liefert Clark-Notation `{URI}local`.
/// Ohne Prefix oder bei unbekanntem Prefix bleibt der Wert unverändert.
fn resolve_xsi_type_value(reader: &NsReader<&[u8]>, value: &str) -> String {
    let trimmed = value.trim();
    let (ns, local) = reader.resolver().resolve_element(XmlQName(trimmed.as_bytes()));
    match (ns, std::str::from_utf8(local.as_ref())) {
        (ResolveResult::Bound(ns), Ok(local)) => match std::str::from_utf8(ns.as_ref()) {
            Ok(uri) => format!("{{{uri}}}{local}"),
            Err(_) => value.to_string(),
        },
        (ResolveResult::Unbound, Ok(local)) if !trimmed.contains(':') => local.to_string(),
        _ => value.to_string(),
    }
}

fn namespace_decl(key: &[u8], uri: &str, elem_uri: &str, elem_prefix: Option<&str>) -> Result<Option<NsContent>> {
    let prefix = if key == b"xmlns" {
        ""
    } else if let Some(p) = key.strip_prefix(b"xmlns:") {
        decode_utf8(p)?
    } else {
        return Ok(None);
    };
    let local_element_ns = elem_prefix.unwrap_or("") == prefix && elem_uri == uri;
    Ok(Some(NsContent { uri: uri.into(), prefix: prefix.into(), local_element_ns }))
}

/// Ersetzt Zeichen- und vordefinierte Entity-Referenzen in Attributwerten.
fn unescape_attr_value(value: &str) -> Result<Cow<'_, str>> {
    let bytes = value.as_bytes();
    let Some(mut amp) = memchr(b'&', bytes) else {
        return Ok(Cow::Borrowed(value));
    };
    let mut out = String::with_capacity(value.len());
    let mut pos = 0;
    loop {
        out.push_str(&value[pos..amp]);
        let semi = memchr(b';', &bytes[amp + 1..])
            .map(|rel| amp + 1 + rel)
            .ok_or_else(|| Error::XmlParseError(format!("unterminated reference in '{value}'")))?;
        let name = &value[amp + 1..semi];
        let resolved = match name.strip_prefix('#') {
            Some(code) => resolve_char_reference(code).map(String::from),
            None => resolve_predefined_entity(name).map(str::to_string),
        };
        out.push_str(
            &resolved.ok_or_else(|| Error::XmlParseError(format!("unresolvable entity reference &{name};")))?,
        );
        pos = semi + 1;
        match memchr(b'&', &bytes[pos..]) {
            Some(rel) => amp = pos + rel,
            None => {
                out.push_str(&value[pos..]);
                return Ok(Cow::Owned(out));
            }
        }
    }
}

/// XML 1.0 Sec. 2.11: \r\n -> \n, alleinstehende \r -> \n
fn normalize_line_endings(s: &str) -> Cow<'_, str> {
    if memchr(b'\r', s.as_bytes()).is_none() {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.replace("\r\n", "\n").replace('\r', "\n"))
}

fn decode_utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| Error::XmlParseError(e.to_string()))
}

fn decode_text(e: &BytesText<'_>) -> Result<Option<String>> {
    let raw = decode_utf8(e.as_ref())?;
    let text = quick_xml::escape::unescape(raw).map_err(|er| Error::XmlParseError(er.to_string()))?;
    Ok((!text.is_empty()).then(|| text.into_owned()))
}

fn decode_cdata(e: BytesCData<'_>) -> Result<Option<String>> {
    let text = decode_utf8(&e)?;
    Ok((!text.is_empty()).then(|| text.to_string()))
}

/// `49` (dezimal) oder `x31` (hexadezimal), ohne `&#` und `;`.
fn resolve_char_reference(code: &str) -> Option<char> {
    let code_point = match code.strip_prefix('x') {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => code.parse::<u32>().ok()?,
    };
    char::from_u32(code_point)
}
