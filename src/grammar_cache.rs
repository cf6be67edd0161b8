//! Grammar Cache und Session-Arena (EXI 8.4.3, 8.5).
//!
//! [`GrammarCache`] hält die unveränderliche Schema-Tabelle und die
//! Options; er wird einmal gebaut und von beliebig vielen Sessions geteilt.
//! [`Grammars`] ist der veränderliche Teil einer Session: gelernte
//! Productions pro Grammar-Zustand, gestapelt nach Self-Contained-Regionen.
//!
//! # Beispiel
//!
//! ```
//! use exi_grammar::grammar_cache::GrammarCache;
//! use exi_grammar::options::ExiOptions;
//! use exi_grammar::schema::SchemaInfo;
//!
//! let cache = GrammarCache::new(&SchemaInfo::empty(), ExiOptions::default()).unwrap();
//! let mut grammars = cache.session();
//! let list = grammars.event_types(cache.document_grammar()).unwrap();
//! assert_eq!(list.len(), 1);
//! ```

use std::rc::Rc;

use log::debug;

use crate::event_type::EventTypeList;
use crate::grammar::{self, BuiltInPhase, GrammarId, GrammarNode, Production, TagStage};
use crate::options::ExiOptions;
use crate::qname::{ExpandedNameId, QName, StringInterner};
use crate::schema::SchemaInfo;
use crate::schema_grammar::{ElementId, SchemaGrammars, TypeId};
use crate::undeclared;
use crate::{Error, FastHashMap, Result};

/// Schema-Tabelle plus Options, geteilt zwischen Sessions.
#[derive(Debug, Clone)]
pub struct GrammarCache {
    table: Rc<SchemaGrammars>,
    options: ExiOptions,
}

impl GrammarCache {
    /// Prüft die Options und baut die Tabelle.
    ///
    /// # Fehler
    ///
    /// - `Error::InvalidOptionCombination` bei unzulässigen Options
    /// - Fehler beim Aufbau der Tabelle (siehe [`SchemaGrammars::build`])
    pub fn new(schema: &SchemaInfo, options: ExiOptions) -> Result<Self> {
        options.validate()?;
        let table = SchemaGrammars::build(schema)?;
        Ok(Self { table: Rc::new(table), options })
    }

    /// Cache ohne Schema: nur Built-in Grammars und XSD-Typen.
    pub fn schema_less(options: ExiOptions) -> Result<Self> {
        Self::new(&SchemaInfo::empty(), options)
    }

    /// Teilt eine bereits gebaute Tabelle mit anderen Options.
    pub fn with_table(table: Rc<SchemaGrammars>, options: ExiOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { table, options })
    }

    /// Die Options.
    pub fn options(&self) -> &ExiOptions {
        &self.options
    }

    /// Die Schema-Tabelle.
    pub fn table(&self) -> &SchemaGrammars {
        &self.table
    }

    /// Startzustand eines Dokuments oder Fragments.
    pub fn document_grammar(&self) -> GrammarId {
        GrammarId::DocumentStart
    }

    /// Start-Tag einer Element-Deklaration.
    pub fn element_grammar(&self, element: ElementId) -> GrammarId {
        let e = self.table.element(element);
        self.type_grammar(e.ty, e.nillable)
    }

    /// Start-Tag eines Typs.
    pub fn type_grammar(&self, ty: TypeId, nillable: bool) -> GrammarId {
        GrammarId::StartTag { ty, nillable, attr: 0, stage: TagStage::Initial }
    }

    /// Built-in Grammar eines nicht deklarierten Elements.
    pub fn built_in_grammar(&self, qname: ExpandedNameId) -> GrammarId {
        GrammarId::BuiltIn { qname, phase: BuiltInPhase::StartTag }
    }

    /// Grammar eines per Wildcard oder gelernt gematchten Elements:
    /// globale Deklaration falls vorhanden, sonst Built-in.
    pub fn global_or_built_in(&self, qname: ExpandedNameId) -> GrammarId {
        match self.table.global_element(qname) {
            Some(element) => self.element_grammar(element),
            None => self.built_in_grammar(qname),
        }
    }

    /// Neue Session mit leerem Lernstand.
    pub fn session(&self) -> Grammars<'_> {
        Grammars::new(self)
    }
}

/// Veränderlicher Grammar-Zustand einer Session.
///
/// Die Namen nicht deklarierter Elemente und Attribute werden in einer
/// Kopie des Tabellen-Interners registriert; Ids bekannter Namen bleiben
/// dadurch gleich.
#[derive(Debug)]
pub struct Grammars<'c> {
    cache: &'c GrammarCache,
    interner: StringInterner,
    declared: FastHashMap<GrammarId, Rc<[Production]>>,
    regions: Vec<FastHashMap<GrammarId, GrammarNode>>,
}

impl<'c> Grammars<'c> {
    /// Neue Session.
    pub fn new(cache: &'c GrammarCache) -> Self {
        Self {
            cache,
            interner: cache.table().interner().clone(),
            declared: FastHashMap::default(),
            regions: vec![FastHashMap::default()],
        }
    }

    /// Der zugrunde liegende Cache.
    pub fn cache(&self) -> &'c GrammarCache {
        self.cache
    }

    /// Interner der Session.
    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    /// Interner der Session, veränderlich.
    pub fn interner_mut(&mut self) -> &mut StringInterner {
        &mut self.interner
    }

    /// Deklarierte Productions eines Zustands (memoisiert).
    pub fn declared(&mut self, id: GrammarId) -> Result<Rc<[Production]>> {
        if let Some(found) = self.declared.get(&id) {
            return Ok(Rc::clone(found));
        }
        let built: Rc<[Production]> =
            grammar::declared_productions(self.cache.table(), self.cache.options(), id)?.into();
        self.declared.insert(id, Rc::clone(&built));
        Ok(built)
    }

    /// Gelernte Productions eines Zustands in der aktuellen Region.
    pub fn learned(&self, id: GrammarId) -> &[Production] {
        self.regions
            .last()
            .and_then(|region| region.get(&id))
            .map(GrammarNode::learned)
            .unwrap_or_default()
    }

    /// Die Event Type List eines Zustands.
    ///
    /// # Fehler
    ///
    /// Nur bei inkonsistenter Tabelle oder Überlauf.
    pub fn event_types(&mut self, id: GrammarId) -> Result<EventTypeList> {
        let declared = self.declared(id)?;
        let learned = self.learned(id);
        let mut tier1 = Vec::with_capacity(declared.len() + learned.len());
        tier1.extend_from_slice(&declared);
        tier1.extend_from_slice(learned);

        let table = self.cache.table();
        let options = self.cache.options();
        let escapes = undeclared::escape_productions(table, options, id, &tier1)?;
        let misc = undeclared::misc_productions(table, options, id);
        EventTypeList::build(&declared, learned, &escapes, &misc)
    }

    /// Lernt eine Production im Zustand `id` der aktuellen Region.
    ///
    /// Gibt zurück ob die Liste sich dadurch geändert hat.
    pub fn learn(&mut self, id: GrammarId, production: Production) -> Result<bool> {
        let declared = self.declared(id)?;
        let region = self
            .regions
            .last_mut()
            .ok_or_else(|| Error::schema_violation("no active grammar region"))?;
        Ok(region.entry(id).or_default().learn_production(id, &declared, production))
    }

    /// Grammar des Kind-Elements nach einem SE.
    ///
    /// Deklarierte SE(q) tragen ihre Element-Bindung; bei Wildcards und
    /// gelernten SE wird über den Namen aufgelöst.
    pub fn child_grammar(&mut self, production: &Production, qname: &QName) -> Result<GrammarId> {
        if let Some(element) = production.element {
            return Ok(self.cache.element_grammar(element));
        }
        let name = self.interner.intern_qname(qname)?;
        Ok(self.cache.global_or_built_in(name))
    }

    /// Öffnet eine Self-Contained-Region: Lernstand beginnt leer (EXI 8.5.4.4.1).
    pub fn enter_region(&mut self) {
        self.regions.push(FastHashMap::default());
        debug!("self-contained region opened (depth {})", self.regions.len() - 1);
    }

    /// Schließt die innerste Region und verwirft ihren Lernstand.
    ///
    /// # Fehler
    ///
    /// `Error::OrderingViolation` wenn keine Region offen ist.
    pub fn leave_region(&mut self) -> Result<()> {
        if self.regions.len() <= 1 {
            return Err(Error::ordering_violation("open self-contained region", "region end"));
        }
        self.regions.pop();
        debug!("self-contained region closed (depth {})", self.regions.len());
        Ok(())
    }

    /// Anzahl offener Self-Contained-Regionen.
    pub fn region_depth(&self) -> usize {
        self.regions.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_type::Origin;
    use crate::grammar::{StartElementKind, Terminal};
    use crate::options::Alignment;
    use crate::schema::ElementDeclaration;

    fn cache() -> GrammarCache {
        let schema = SchemaInfo::builder()
            .element(ElementDeclaration::new(QName::new("", "root")))
            .build()
            .unwrap();
        GrammarCache::new(&schema, ExiOptions::default()).unwrap()
    }

    #[test]
    fn rejects_invalid_options() {
        let options = ExiOptions::default().with_compression().with_alignment(Alignment::ByteAlignment);
        assert_eq!(
            GrammarCache::new(&SchemaInfo::empty(), options).unwrap_err(),
            Error::InvalidOptionCombination
        );
    }

    #[test]
    fn learning_extends_tier_one() {
        let cache = cache();
        let mut grammars = cache.session();
        let id = GrammarId::DocumentContent;
        let before = grammars.event_types(id).unwrap();

        let name = grammars.interner_mut().intern_expanded("", "other").unwrap();
        let learned = Production::new(
            Terminal::StartElement(StartElementKind::QName(name)),
            Some(GrammarId::DocumentEnd),
        );
        assert!(grammars.learn(id, learned).unwrap());
        assert!(!grammars.learn(id, learned).unwrap());

        let after = grammars.event_types(id).unwrap();
        assert_eq!(after.context().tier1(), before.context().tier1() + 1);
        // SE(root), gelerntes SE(other), SE(*)
        let tier1: Vec<_> = after.tier(1).iter().map(|et| (*et.production(), et.origin())).collect();
        assert_eq!(tier1[1], (learned, Origin::Learned));
        assert_eq!(tier1[2].0.terminal, Terminal::StartElement(StartElementKind::Wildcard));
    }

    #[test]
    fn regions_isolate_learning() {
        let cache = cache();
        let mut grammars = cache.session();
        let id = GrammarId::DocumentContent;
        let name = grammars.interner_mut().intern_expanded("", "x").unwrap();
        let learned = Production::new(
            Terminal::StartElement(StartElementKind::QName(name)),
            Some(GrammarId::DocumentEnd),
        );

        grammars.enter_region();
        assert!(grammars.learn(id, learned).unwrap());
        assert_eq!(grammars.learned(id).len(), 1);
        grammars.leave_region().unwrap();
        assert!(grammars.learned(id).is_empty());
        assert_eq!(grammars.region_depth(), 0);
        assert!(grammars.leave_region().is_err());
    }

    #[test]
    fn wildcard_children_resolve_to_globals_first() {
        let cache = cache();
        let mut grammars = cache.session();
        let any = Production::new(Terminal::StartElement(StartElementKind::Wildcard), None);

        let root = grammars.child_grammar(&any, &QName::new("", "root")).unwrap();
        assert!(matches!(root, GrammarId::StartTag { stage: TagStage::Initial, .. }));

        let other = grammars.child_grammar(&any, &QName::new("urn:x", "other")).unwrap();
        assert!(matches!(other, GrammarId::BuiltIn { phase: BuiltInPhase::StartTag, .. }));
    }
}
