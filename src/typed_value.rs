//! Lexikalische Validierung typisierter Werte (EXI 7.1, Table 7-1).
//!
//! Die Grammar entscheidet anhand dieser Prüfung, ob ein Attribut- oder
//! Character-Wert über die typisierte Production laufen darf oder über die
//! "invalid value"/untyped Escape-Production ausweichen muss. Die eigentliche
//! Wert-Codierung liegt beim externen Serializer.
//!
//! # Referenzen
//!
//! - 7.1: Built-in EXI Datatype Representations
//! - 8.5.4.4.1: AT(qname) [untyped value] für ungültige Werte

use std::borrow::Cow;

use crate::schema::{ContentType, SimpleTypeVariety, TypeDefinition};

/// Löst den ultimativen Built-in Basistyp für eine TypeDefinition auf.
///
/// Union-Typen gelten als "string" (Zeichen-Repräsentation), List-Typen als
/// "list". Complex Types mit Simple Content liefern den Typ ihres Werts.
pub fn resolve_base_type(type_def: &TypeDefinition) -> Option<&str> {
    match type_def {
        TypeDefinition::Simple { variety, base_type, .. } => match variety {
            SimpleTypeVariety::Union { .. } => Some("string"),
            SimpleTypeVariety::List { .. } => Some("list"),
            SimpleTypeVariety::Atomic => base_type.as_deref(),
        },
        TypeDefinition::Complex { content: ContentType::Simple(inner), .. } => {
            resolve_base_type(inner)
        }
        TypeDefinition::Complex { .. } => None,
    }
}

/// Prüft ob ein aufgelöster Basis-Typ ein String-basierter Typ ist.
///
/// Für diese Typen ist jeder lexikalische Wert gültig (abgesehen von
/// Enumerationen).
pub fn is_string_base_type(base_type: Option<&str>) -> bool {
    matches!(
        base_type,
        Some("string") | Some("normalizedString") | Some("token") | Some("language")
            | Some("Name") | Some("NCName") | Some("NMTOKEN") | Some("NMTOKENS")
            | Some("ID") | Some("IDREF") | Some("IDREFS") | Some("ENTITY")
            | Some("ENTITIES") | Some("anyURI") | Some("QName") | Some("NOTATION")
            | Some("anySimpleType") | None
    )
}

/// Prüft einen Wert gegen einen (optionalen) Typ.
///
/// `None` steht für anySimpleType: jeder Wert ist gültig.
pub fn is_valid(value: &str, type_def: Option<&TypeDefinition>) -> bool {
    let Some(td) = type_def else {
        return true;
    };
    match td {
        TypeDefinition::Simple { variety, base_type, enumeration_values, .. } => {
            let lexical_ok = match variety {
                SimpleTypeVariety::Union { .. } => true,
                SimpleTypeVariety::List { item_type } => value
                    .split_ascii_whitespace()
                    .all(|item| is_valid(item, item_type.as_deref())),
                SimpleTypeVariety::Atomic => is_valid_for_base_type(value, base_type.as_deref()),
            };
            lexical_ok
                && (enumeration_values.is_empty()
                    || matches_enumeration(value, base_type.as_deref(), enumeration_values))
        }
        TypeDefinition::Complex { content: ContentType::Simple(inner), .. } => {
            is_valid(value, Some(inner))
        }
        // Complex Types ohne Simple Content haben keinen typisierten Wert.
        TypeDefinition::Complex { .. } => true,
    }
}

/// Prüft einen Wert gegen einen XSD Built-in Basistyp.
pub fn is_valid_for_base_type(value: &str, base_type: Option<&str>) -> bool {
    if is_string_base_type(base_type) {
        return true;
    }
    let Some(base_type) = base_type else {
        return true;
    };
    let v = value.trim();
    match base_type {
        "boolean" => matches!(v, "true" | "false" | "1" | "0"),
        "decimal" => is_decimal(v),
        "float" | "double" => is_float(v),
        "base64Binary" => is_base64(value),
        "hexBinary" => v.len() % 2 == 0 && v.bytes().all(|b| b.is_ascii_hexdigit()),
        "dateTime" => parse_date_time(v).is_some(),
        "date" => split_timezone(v).and_then(|(d, _)| parse_date(d)).is_some(),
        "time" => split_timezone(v).and_then(|(t, _)| parse_time(t)).is_some(),
        "gYear" => split_timezone(v).and_then(|(y, _)| parse_year(y)).is_some(),
        "gYearMonth" => split_timezone(v)
            .and_then(|(ym, _)| {
                let (y, m) = ym.rsplit_once('-')?;
                parse_year(y)?;
                parse_range(m, 2, 1, 12)
            })
            .is_some(),
        "gMonth" => split_timezone(v)
            .and_then(|(m, _)| parse_range(m.strip_prefix("--")?, 2, 1, 12))
            .is_some(),
        "gMonthDay" => split_timezone(v)
            .and_then(|(md, _)| {
                let (m, d) = md.strip_prefix("--")?.split_once('-')?;
                parse_range(m, 2, 1, 12)?;
                parse_range(d, 2, 1, 31)
            })
            .is_some(),
        "gDay" => split_timezone(v)
            .and_then(|(d, _)| parse_range(d.strip_prefix("---")?, 2, 1, 31))
            .is_some(),
        "duration" => is_duration(v),
        other => match integer_bounds(other) {
            Some((min, max)) => parse_integer(v).is_some_and(|n| n >= min && n <= max),
            // Unbekannte Built-ins werden wie Strings behandelt.
            None => true,
        },
    }
}

/// Wertebereiche der Integer-Familie (XSD 1.0 Part 2 §3.3).
fn integer_bounds(base_type: &str) -> Option<(i128, i128)> {
    Some(match base_type {
        "integer" => (i128::MIN, i128::MAX),
        "nonPositiveInteger" => (i128::MIN, 0),
        "negativeInteger" => (i128::MIN, -1),
        "nonNegativeInteger" => (0, i128::MAX),
        "positiveInteger" => (1, i128::MAX),
        "long" => (i64::MIN as i128, i64::MAX as i128),
        "int" => (i32::MIN as i128, i32::MAX as i128),
        "short" => (i16::MIN as i128, i16::MAX as i128),
        "byte" => (i8::MIN as i128, i8::MAX as i128),
        "unsignedLong" => (0, u64::MAX as i128),
        "unsignedInt" => (0, u32::MAX as i128),
        "unsignedShort" => (0, u16::MAX as i128),
        "unsignedByte" => (0, u8::MAX as i128),
        _ => return None,
    })
}

fn parse_integer(v: &str) -> Option<i128> {
    let digits = v.strip_prefix(['+', '-']).unwrap_or(v);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    v.strip_prefix('+').unwrap_or(v).parse().ok()
}

fn is_decimal(v: &str) -> bool {
    let unsigned = v.strip_prefix(['+', '-']).unwrap_or(v);
    let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    (!int.is_empty() || !frac.is_empty())
        && int.bytes().all(|b| b.is_ascii_digit())
        && frac.bytes().all(|b| b.is_ascii_digit())
}

fn is_float(v: &str) -> bool {
    if matches!(v, "INF" | "-INF" | "+INF" | "NaN") {
        return true;
    }
    let (mantissa, exponent) = match v.find(['e', 'E']) {
        Some(pos) => (&v[..pos], Some(&v[pos + 1..])),
        None => (v, None),
    };
    is_decimal(mantissa) && exponent.is_none_or(|e| parse_integer(e).is_some())
}

/// base64Binary: Whitespace ist im Lexical Space erlaubt (EXI 7.1.1).
fn is_base64(value: &str) -> bool {
    use base64::Engine;
    let compact: String = value.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD.decode(compact).is_ok()
}

fn is_duration(v: &str) -> bool {
    let body = v.strip_prefix('-').unwrap_or(v);
    let Some(body) = body.strip_prefix('P') else {
        return false;
    };
    let (date, time) = body.split_once('T').unwrap_or((body, ""));
    if date.is_empty() && time.is_empty() || body.ends_with('T') {
        return false;
    }
    duration_fields(date, &['Y', 'M', 'D']) && duration_fields(time, &['H', 'M', 'S'])
}

/// Prüft `nY nM nD` bzw. `nH nM nS` in fester Reihenfolge.
fn duration_fields(mut s: &str, designators: &[char]) -> bool {
    let mut next = 0;
    while !s.is_empty() {
        let Some(pos) = s.find(|c: char| c.is_ascii_alphabetic()) else {
            return false;
        };
        let (num, rest) = s.split_at(pos);
        let Some(d) = rest.chars().next() else {
            return false;
        };
        let Some(idx) = designators[next..].iter().position(|&x| x == d) else {
            return false;
        };
        let numeric_ok = if d == 'S' { is_decimal(num) } else { parse_integer(num).is_some() };
        if num.starts_with(['+', '-']) || !numeric_ok {
            return false;
        }
        next += idx + 1;
        s = &rest[1..];
    }
    true
}

/// Trennt einen optionalen Timezone-Suffix (`Z`, `+hh:mm`, `-hh:mm`) ab.
fn split_timezone(v: &str) -> Option<(&str, Option<i16>)> {
    if let Some(main) = v.strip_suffix('Z') {
        return Some((main, Some(0)));
    }
    if v.len() > 6 && v.is_char_boundary(v.len() - 6) {
        let (main, tz) = v.split_at(v.len() - 6);
        if !tz.is_ascii() {
            return Some((v, None));
        }
        let sign = match tz.as_bytes()[0] {
            b'+' => 1,
            b'-' => -1,
            _ => return Some((v, None)),
        };
        if tz.as_bytes()[3] != b':' {
            return Some((v, None));
        }
        let hours = parse_range(&tz[1..3], 2, 0, 14)?;
        let minutes = parse_range(&tz[4..6], 2, 0, 59)?;
        return Some((main, Some(sign * (hours as i16 * 60 + minutes as i16))));
    }
    Some((v, None))
}

fn parse_range(s: &str, width: usize, min: u32, max: u32) -> Option<u32> {
    if s.len() != width || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u32 = s.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

fn parse_year(s: &str) -> Option<i64> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.len() < 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn parse_date(s: &str) -> Option<()> {
    let (rest, day) = s.rsplit_once('-')?;
    let (year, month) = rest.rsplit_once('-')?;
    parse_year(year)?;
    parse_range(month, 2, 1, 12)?;
    parse_range(day, 2, 1, 31)?;
    Some(())
}

fn parse_time(s: &str) -> Option<()> {
    let (hms, frac) = s.split_once('.').unwrap_or((s, ""));
    let mut parts = hms.split(':');
    let hour = parse_range(parts.next()?, 2, 0, 24)?;
    let minute = parse_range(parts.next()?, 2, 0, 59)?;
    let second = parse_range(parts.next()?, 2, 0, 60)?;
    if parts.next().is_some() || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.contains('.') && frac.is_empty() {
        return None;
    }
    // 24:00:00 ist nur als Tagesende erlaubt.
    (hour < 24 || minute == 0 && second == 0 && frac.bytes().all(|b| b == b'0')).then_some(())
}

fn parse_date_time(v: &str) -> Option<()> {
    let (main, _) = split_timezone(v)?;
    let (date, time) = main.split_once('T')?;
    parse_date(date)?;
    parse_time(time)
}

/// Vergleicht einen Wert mit den Enumerationswerten im Werteraum des Basistyps.
fn matches_enumeration(value: &str, base_type: Option<&str>, enumeration: &[String]) -> bool {
    let normalized = normalize_enum_value(value, base_type);
    enumeration
        .iter()
        .any(|candidate| normalize_enum_value(candidate, base_type) == normalized)
}

/// Normalisiert einen Enum-Wert in eine kanonische Form für den Vergleich.
pub fn normalize_enum_value<'a>(value: &'a str, base_type: Option<&str>) -> Cow<'a, str> {
    match base_type {
        Some("boolean") => match value.trim() {
            "1" | "true" => Cow::Borrowed("true"),
            "0" | "false" => Cow::Borrowed("false"),
            _ => Cow::Borrowed(value),
        },
        Some(bt) if integer_bounds(bt).is_some() => match parse_integer(value.trim()) {
            Some(n) => Cow::Owned(n.to_string()),
            None => Cow::Borrowed(value),
        },
        Some("string") => Cow::Borrowed(value),
        Some("normalizedString") => replace_whitespace(value),
        _ => collapse_whitespace(value),
    }
}

fn replace_whitespace(value: &str) -> Cow<'_, str> {
    if !value.bytes().any(|b| matches!(b, b'\t' | b'\n' | b'\r')) {
        return Cow::Borrowed(value);
    }
    Cow::Owned(
        value
            .chars()
            .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
            .collect(),
    )
}

fn collapse_whitespace(value: &str) -> Cow<'_, str> {
    let collapsed: Vec<&str> = value.split_ascii_whitespace().collect();
    let joined = collapsed.join(" ");
    if joined == value {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(joined)
    }
}
