//! Qualified names and name interning.
//!
//! [`QName`] is the public, `Rc`-backed name type carried by infoset events.
//! Grammars and event types never store strings: they refer to names through
//! the `Copy` ids [`InternedStr`] and [`ExpandedNameId`] handed out by a
//! [`StringInterner`].
//!
//! ## Interning
//!
//! Die statische Grammar-Tabelle besitzt einen Interner mit allen Schema-Namen.
//! Jede Session klont ihn und internt dort zusätzlich Namen, die erst zur
//! Laufzeit auftauchen (gelernte Productions, Built-in Grammars).

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use ahash::AHasher;

use crate::{Error, FastHashMap, Result};

/// Namespace der XML Schema Instance Attribute (xsi:type, xsi:nil).
pub const URI_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Namespace der XML Schema Built-in Typen.
pub const URI_XSD: &str = "http://www.w3.org/2001/XMLSchema";

/// Namespace des `xml:` Prefix.
pub const URI_XML: &str = "http://www.w3.org/XML/1998/namespace";

// ============================================================================
// Interning: StringInterner, InternedStr, ExpandedNameId
// ============================================================================

/// Index in den [`StringInterner`]. `Copy`-Type, kein Heap.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InternedStr(pub(crate) u32);

impl fmt::Debug for InternedStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InternedStr({})", self.0)
    }
}

/// Semantische Identität eines QName: URI + local-name (ohne Prefix).
///
/// Zwei Namen sind gleich, wenn URI und local-name gleich sind, unabhängig
/// vom Prefix. Vergleich ist 2 × u32-Vergleich statt 2 × String-Vergleich.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExpandedNameId {
    pub(crate) uri: InternedStr,
    pub(crate) local_name: InternedStr,
}

impl fmt::Debug for ExpandedNameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExpandedNameId({:?}, {:?})", self.uri, self.local_name)
    }
}

impl ExpandedNameId {
    /// Erstellt eine neue ExpandedNameId.
    pub fn new(uri: InternedStr, local_name: InternedStr) -> Self {
        Self { uri, local_name }
    }

    /// Die URI-Komponente.
    pub fn uri(&self) -> InternedStr {
        self.uri
    }

    /// Die local-name-Komponente.
    pub fn local_name(&self) -> InternedStr {
        self.local_name
    }

    /// Löst die ExpandedNameId zu Strings auf.
    pub fn resolve<'a>(&self, interner: &'a StringInterner) -> (&'a str, &'a str) {
        (interner.resolve(self.uri), interner.resolve(self.local_name))
    }

    /// Wie `to_qname()`, aber teilt die Rc<str>-Instanzen des Interners.
    pub fn to_qname(&self, interner: &StringInterner) -> QName {
        let uri = interner.resolve_rc(self.uri);
        let local_name = interner.resolve_rc(self.local_name);
        QName::with_optional_prefix(uri, local_name, None)
    }

    /// Clark-Notation `{uri}local` (ohne Klammern bei leerer URI).
    pub fn to_clark(&self, interner: &StringInterner) -> String {
        let (uri, local_name) = self.resolve(interner);
        if uri.is_empty() {
            local_name.to_string()
        } else {
            format!("{{{uri}}}{local_name}")
        }
    }
}

/// Pool für `Rc<QName>`: Gibt für dieselbe `ExpandedNameId` immer denselben
/// `Rc<QName>` zurück. Der Decoder baut so pro Event nur einen Refcount auf.
pub(crate) struct QNamePool {
    cache: FastHashMap<ExpandedNameId, Rc<QName>>,
}

impl QNamePool {
    pub(crate) fn new() -> Self {
        Self {
            cache: FastHashMap::default(),
        }
    }

    /// Gibt den gecachten `Rc<QName>` zurück oder erstellt einen neuen.
    /// Bei `Some(prefix)` wird nicht gepoolt (Prefix variiert je nach NS-Kontext).
    pub(crate) fn get(
        &mut self,
        expanded: ExpandedNameId,
        prefix: Option<Rc<str>>,
        interner: &StringInterner,
    ) -> Rc<QName> {
        match prefix {
            None => Rc::clone(
                self.cache
                    .entry(expanded)
                    .or_insert_with(|| Rc::new(expanded.to_qname(interner))),
            ),
            Some(pfx) => Rc::new(QName::with_optional_prefix(
                interner.resolve_rc(expanded.uri),
                interner.resolve_rc(expanded.local_name),
                Some(pfx),
            )),
        }
    }
}

/// Zentraler String-Pool für Namen und Namespaces.
///
/// Speichert jeden String einmalig als `Rc<str>`. Sowohl `strings` (Index→String)
/// als auch `lookup` (String→Index) zeigen auf denselben Rc.
#[derive(Clone)]
pub struct StringInterner {
    strings: Vec<Rc<str>>,
    lookup: FastHashMap<Rc<str>, u32>,
}

impl StringInterner {
    /// Erstellt einen neuen, leeren Interner.
    pub fn new() -> Self {
        Self {
            strings: Vec::new(),
            lookup: FastHashMap::default(),
        }
    }

    /// Internt einen String. Bereits bekannte Strings werden dedupliziert.
    pub fn intern(&mut self, s: &str) -> Result<InternedStr> {
        if let Some(&idx) = self.lookup.get(s) {
            return Ok(InternedStr(idx));
        }
        let idx = u32::try_from(self.strings.len()).map_err(|_| Error::IntegerOverflow)?;
        let rc: Rc<str> = Rc::from(s);
        self.strings.push(Rc::clone(&rc));
        self.lookup.insert(rc, idx);
        Ok(InternedStr(idx))
    }

    /// Sucht einen String ohne ihn anzulegen.
    ///
    /// Für den Encoder: ein Name, der nie interniert wurde, kann keine
    /// spezifische Production haben.
    #[inline]
    pub fn get(&self, s: &str) -> Option<InternedStr> {
        self.lookup.get(s).map(|&idx| InternedStr(idx))
    }

    /// Sucht URI + local-name ohne sie anzulegen.
    pub fn get_expanded(&self, uri: &str, local_name: &str) -> Option<ExpandedNameId> {
        Some(ExpandedNameId::new(self.get(uri)?, self.get(local_name)?))
    }

    /// Löst einen InternedStr zu &str auf.
    #[inline]
    pub fn resolve(&self, id: InternedStr) -> &str {
        &self.strings[id.0 as usize]
    }

    /// Gibt den internierten Rc<str> zurück (Rc::clone = nur Refcount-Inkrement).
    #[inline]
    pub fn resolve_rc(&self, id: InternedStr) -> Rc<str> {
        Rc::clone(&self.strings[id.0 as usize])
    }

    /// Anzahl der internierten Strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Ob der Interner leer ist.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Internt nur URI + local-name und gibt ExpandedNameId zurück.
    pub fn intern_expanded(&mut self, uri: &str, local_name: &str) -> Result<ExpandedNameId> {
        let uri = self.intern(uri)?;
        let local_name = self.intern(local_name)?;
        Ok(ExpandedNameId::new(uri, local_name))
    }

    /// Internt einen QName (Prefix wird ignoriert).
    pub fn intern_qname(&mut self, qname: &QName) -> Result<ExpandedNameId> {
        self.intern_expanded(&qname.uri, &qname.local_name)
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StringInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringInterner({} strings)", self.strings.len())
    }
}

// ============================================================================
// QName
// ============================================================================

/// A QName value with URI, local-name, and optional prefix.
///
/// Two qnames are equal if they have the same uri and local-name, regardless
/// of their prefix values. `PartialEq`, `Eq`, `Ord` and `Hash` therefore only
/// consider `uri` and `local_name`.
///
/// `identity` ist ein vorberechneter 64-Bit-Hash von (uri, local_name).
#[derive(Clone)]
pub struct QName {
    /// The namespace URI. Empty string means no namespace.
    pub uri: Rc<str>,
    /// The local name.
    pub local_name: Rc<str>,
    /// The optional prefix. Only carried when prefixes are preserved.
    pub prefix: Option<Rc<str>>,
    identity: u64,
}

impl fmt::Debug for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QName")
            .field("uri", &self.uri)
            .field("local_name", &self.local_name)
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Berechnet den Identity-Hash für ein QName (uri + local_name).
pub(crate) fn compute_identity(uri: &str, local_name: &str) -> u64 {
    let mut hasher = AHasher::default();
    uri.hash(&mut hasher);
    local_name.hash(&mut hasher);
    hasher.finish()
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
            && self.uri == other.uri
            && self.local_name == other.local_name
    }
}

impl Eq for QName {}

impl PartialEq<QName> for Rc<QName> {
    fn eq(&self, other: &QName) -> bool {
        **self == *other
    }
}

impl PartialEq<Rc<QName>> for QName {
    fn eq(&self, other: &Rc<QName>) -> bool {
        *self == **other
    }
}

impl PartialOrd for QName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sortierung: erst local_name, dann uri (Schema-Ordnung für globale
/// Elemente und Attribute, EXI 8.5.1).
impl Ord for QName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.local_name
            .cmp(&other.local_name)
            .then_with(|| self.uri.cmp(&other.uri))
    }
}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

/// Display: `prefix:local_name` wenn Prefix vorhanden, sonst Clark-Notation.
impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(pfx) if !pfx.is_empty() => write!(f, "{pfx}:{}", self.local_name),
            _ if self.uri.is_empty() => f.write_str(&self.local_name),
            _ => write!(f, "{{{}}}{}", self.uri, self.local_name),
        }
    }
}

impl Default for QName {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl QName {
    /// Creates a new QName with the given URI and local-name, without prefix.
    pub fn new(uri: impl Into<Rc<str>>, local_name: impl Into<Rc<str>>) -> Self {
        let uri = uri.into();
        let local_name = local_name.into();
        let identity = compute_identity(&uri, &local_name);
        Self { uri, local_name, prefix: None, identity }
    }

    /// Creates a new QName with URI, local-name, and prefix.
    pub fn with_prefix(
        uri: impl Into<Rc<str>>,
        local_name: impl Into<Rc<str>>,
        prefix: impl Into<Rc<str>>,
    ) -> Self {
        let mut qname = Self::new(uri, local_name);
        qname.prefix = Some(prefix.into());
        qname
    }

    pub(crate) fn with_optional_prefix(
        uri: Rc<str>,
        local_name: Rc<str>,
        prefix: Option<Rc<str>>,
    ) -> Self {
        let identity = compute_identity(&uri, &local_name);
        Self { uri, local_name, prefix, identity }
    }

    /// Parst Clark-Notation `{uri}local` oder einen unqualifizierten Namen.
    ///
    /// Gibt `None` zurück für `prefix:local` (Prefix ohne NS-Kontext nicht auflösbar).
    pub fn from_clark(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(rest) = value.strip_prefix('{') {
            let (uri, local_name) = rest.split_once('}')?;
            if local_name.is_empty() {
                return None;
            }
            return Some(Self::new(uri, local_name));
        }
        if value.is_empty() || value.contains(':') {
            return None;
        }
        Some(Self::new("", value))
    }

    /// xsi:type QName.
    pub fn xsi_type() -> Self {
        Self::with_prefix(URI_XSI, "type", "xsi")
    }

    /// xsi:nil QName.
    pub fn xsi_nil() -> Self {
        Self::with_prefix(URI_XSI, "nil", "xsi")
    }

    /// Check ob dieser QName xsi:type ist.
    #[inline]
    pub fn is_xsi_type(&self) -> bool {
        &*self.uri == URI_XSI && &*self.local_name == "type"
    }

    /// Check ob dieser QName xsi:nil ist.
    #[inline]
    pub fn is_xsi_nil(&self) -> bool {
        &*self.uri == URI_XSI && &*self.local_name == "nil"
    }
}
