//! Flattening von Content Models zu einem DFA (EXI 8.5.4.1.5 - 8.5.4.2).
//!
//! Statt die Particle-Struktur bei jedem Event neu zu durchlaufen, werden alle
//! erreichbaren Konfigurationen einmal berechnet und als Zustände interniert.
//! Eine Konfiguration ist pro Particle `(abgeschlossene Vorkommen, Zustand des
//! laufenden Vorkommens)`; Zustände eines Terms sind:
//!
//! - Leaf: das Element/die Wildcard ist gestartet (und damit abgeschlossen)
//! - Sequence: Index des aktuellen Kind-Particles + dessen Konfiguration
//! - Choice: gewählter Zweig + dessen Konfiguration
//! - All: Bitmaske der verbrauchten Member + optional der laufende Member
//!
//! Vorkommen über `min_occurs` hinaus sind bei `unbounded` nicht
//! unterscheidbar und werden auf `min_occurs` gekappt. Damit bleibt die
//! Zustandsmenge endlich; ihre Größe ist zusätzlich begrenzt
//! ([`Error::ContentModelTooComplex`]).
//!
//! # Reihenfolge der Kandidaten
//!
//! Pro Zustand liegen die möglichen Start-Terms in fester Reihenfolge vor:
//! zuerst die Fortsetzung des laufenden Vorkommens, dann ein neues Vorkommen
//! desselben Particles, dann spätere Geschwister. Bei doppelten Terminals
//! gewinnt der erste Kandidat.

use std::rc::Rc;

use crate::qname::QName;
use crate::schema::{Compositor, ElementDeclaration, MaxOccurs, Particle, ParticleTerm, WildcardConstraint};
use crate::{Error, FastHashMap, FastIndexMap, Result};

/// Index eines DFA-Zustands. Zustand 0 ist der Startzustand.
pub type StateId = u32;

/// Standard-Obergrenze für die Anzahl der Zustände eines Content Models.
pub const DEFAULT_MAX_STATES: usize = 10_000;

/// Maximale Member-Anzahl einer `<all>` Group (Bitmaske).
const MAX_ALL_MEMBERS: usize = 64;

/// Ein Start-Terminal des Content Models.
#[derive(Debug, Clone)]
pub enum StartTerm {
    /// SE(qname). `decl` indiziert [`ContentModel::element`]; bei Substitution
    /// Group Membern zeigt er auf die Deklaration des Heads.
    Element {
        /// Name des Elements (Head oder Member).
        qname: Rc<QName>,
        /// Index der lokalen Element-Deklaration.
        decl: usize,
    },
    /// SE(uri:*).
    Namespace(Rc<str>),
    /// SE(*).
    Any,
}

impl StartTerm {
    fn same_terminal(&self, other: &StartTerm) -> bool {
        match (self, other) {
            (StartTerm::Element { qname: a, .. }, StartTerm::Element { qname: b, .. }) => a == b,
            (StartTerm::Namespace(a), StartTerm::Namespace(b)) => a == b,
            (StartTerm::Any, StartTerm::Any) => true,
            _ => false,
        }
    }
}

/// Ein Kandidat eines Zustands: Terminal + Folgezustand.
#[derive(Debug, Clone)]
pub struct Start {
    /// Das Terminal.
    pub term: StartTerm,
    /// Zustand nach dem Terminal (das Kind-Element selbst läuft in seiner
    /// eigenen Grammar).
    pub next: StateId,
}

/// Ein DFA-Zustand.
#[derive(Debug, Clone)]
pub struct ContentState {
    /// Kandidaten in Kandidaten-Reihenfolge, ohne doppelte Terminals.
    pub starts: Vec<Start>,
    /// Ob das Content Model hier ohne weitere Pflicht-Inhalte enden kann.
    pub can_end: bool,
}

/// Geflachtes Content Model.
#[derive(Debug, Clone)]
pub struct ContentModel {
    states: Vec<ContentState>,
    elements: Vec<ElementDeclaration>,
}

impl ContentModel {
    /// Flacht ein Particle mit [`DEFAULT_MAX_STATES`] als Obergrenze.
    pub fn build(particle: &Particle) -> Result<Self> {
        Self::build_with_limit(particle, DEFAULT_MAX_STATES)
    }

    /// Flacht ein Particle.
    ///
    /// # Fehler
    ///
    /// - `Error::ContentModelTooComplex` wenn mehr als `max_states` Zustände entstehen
    /// - `Error::SchemaViolation` bei `<all>` Groups mit mehr als 64 Membern
    pub fn build_with_limit(particle: &Particle, max_states: usize) -> Result<Self> {
        let mut tree = Tree::default();
        let root = tree.add(particle)?;
        let mut walker = Walker { tree: &tree, start_memo: FastHashMap::default() };

        let mut index: FastIndexMap<PState, ()> = FastIndexMap::default();
        index.insert(PState::initial(), ());
        let mut states = Vec::new();
        let mut pos = 0;
        while let Some((config, _)) = index.get_index(pos) {
            let config = config.clone();
            let can_end = walker.finishable(root, &config);
            let mut starts: Vec<Start> = Vec::new();
            for (term, next) in walker.firsts(root, &config) {
                if starts.iter().any(|s| s.term.same_terminal(&term)) {
                    continue;
                }
                let (id, _) = index.insert_full(next, ());
                if index.len() > max_states {
                    return Err(Error::ContentModelTooComplex(max_states));
                }
                starts.push(Start { term, next: id as StateId });
            }
            states.push(ContentState { starts, can_end });
            pos += 1;
        }

        Ok(Self { states, elements: tree.elements })
    }

    /// Anzahl der Zustände.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Ob das Modell keine Zustände hat (nie der Fall nach `build`).
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Zustand nach Id.
    pub fn state(&self, id: StateId) -> &ContentState {
        &self.states[id as usize]
    }

    /// Lokale Element-Deklaration eines [`StartTerm::Element`].
    pub fn element(&self, decl: usize) -> &ElementDeclaration {
        &self.elements[decl]
    }

    /// Alle lokalen Element-Deklarationen in Dokumentreihenfolge.
    pub fn elements(&self) -> &[ElementDeclaration] {
        &self.elements
    }
}

// ============================================================================
// Particle-Baum
// ============================================================================

type NodeId = usize;

#[derive(Debug)]
struct Node {
    min: u32,
    max: Option<u32>,
    term: NodeTerm,
    /// Term ohne Events abschließbar.
    term_nullable: bool,
}

impl Node {
    fn nullable(&self) -> bool {
        self.min == 0 || self.term_nullable
    }

    /// Zählt ein abgeschlossenes Vorkommen, bei `unbounded` gekappt auf `min`.
    fn bump(&self, count: u32) -> u32 {
        let next = count.saturating_add(1);
        match self.max {
            None => next.min(self.min),
            Some(_) => next,
        }
    }

    fn exhausted(&self, count: u32) -> bool {
        self.max.is_some_and(|max| count >= max)
    }
}

#[derive(Debug)]
enum NodeTerm {
    Leaf(Vec<StartTerm>),
    Group(Compositor, Vec<NodeId>),
}

#[derive(Debug, Default)]
struct Tree {
    nodes: Vec<Node>,
    elements: Vec<ElementDeclaration>,
}

fn clamp(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl Tree {
    fn add(&mut self, particle: &Particle) -> Result<NodeId> {
        let (term, term_nullable) = match &particle.term {
            ParticleTerm::Element(decl) => {
                let idx = self.elements.len();
                self.elements.push(decl.clone());
                let terms = decl
                    .matching_qnames()
                    .map(|q| StartTerm::Element { qname: Rc::clone(q), decl: idx })
                    .collect();
                (NodeTerm::Leaf(terms), false)
            }
            ParticleTerm::Wildcard(w) => {
                let terms = match &w.constraint {
                    WildcardConstraint::Any | WildcardConstraint::Not(_) => vec![StartTerm::Any],
                    WildcardConstraint::Namespaces(uris) => {
                        if uris.is_empty() {
                            return Err(Error::EmptyNamespaceList);
                        }
                        let mut terms: Vec<StartTerm> = Vec::with_capacity(uris.len());
                        for uri in uris {
                            let term = StartTerm::Namespace(Rc::from(uri.as_str()));
                            if !terms.iter().any(|t| t.same_terminal(&term)) {
                                terms.push(term);
                            }
                        }
                        terms
                    }
                };
                (NodeTerm::Leaf(terms), false)
            }
            ParticleTerm::ModelGroup(group) => {
                if group.compositor == Compositor::All && group.particles.len() > MAX_ALL_MEMBERS {
                    return Err(Error::schema_violation(format!(
                        "all group with {} particles exceeds {MAX_ALL_MEMBERS}",
                        group.particles.len()
                    )));
                }
                let children = group
                    .particles
                    .iter()
                    .map(|p| self.add(p))
                    .collect::<Result<Vec<_>>>()?;
                let nullable = match group.compositor {
                    Compositor::Sequence | Compositor::All => {
                        children.iter().all(|&c| self.nodes[c].nullable())
                    }
                    Compositor::Choice => {
                        children.is_empty() || children.iter().any(|&c| self.nodes[c].nullable())
                    }
                };
                (NodeTerm::Group(group.compositor, children), nullable)
            }
        };
        let max = match particle.max_occurs {
            MaxOccurs::Bounded(max) => Some(clamp(max)),
            MaxOccurs::Unbounded => None,
        };
        self.nodes.push(Node { min: clamp(particle.min_occurs), max, term, term_nullable });
        Ok(self.nodes.len() - 1)
    }
}

// ============================================================================
// Konfigurationen
// ============================================================================

/// Konfiguration eines Particles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PState {
    /// Abgeschlossene Vorkommen (gekappt).
    count: u32,
    /// Zustand des laufenden Vorkommens.
    inner: Option<Box<TermState>>,
}

impl PState {
    fn initial() -> Self {
        Self { count: 0, inner: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TermState {
    Leaf,
    Seq { idx: u32, cur: PState },
    Choice { branch: u32, cur: PState },
    All { consumed: u64, cur: Option<(u32, PState)> },
}

type Firsts = Vec<(StartTerm, PState)>;
type TermFirsts = Vec<(StartTerm, TermState)>;

struct Walker<'a> {
    tree: &'a Tree,
    start_memo: FastHashMap<NodeId, Rc<TermFirsts>>,
}

impl<'a> Walker<'a> {
    fn children(&self, id: NodeId) -> &'a [NodeId] {
        let tree = self.tree;
        match &tree.nodes[id].term {
            NodeTerm::Group(_, children) => children,
            NodeTerm::Leaf(_) => &[],
        }
    }

    /// Kann das Particle in dieser Konfiguration abgeschlossen werden?
    fn finishable(&self, id: NodeId, s: &PState) -> bool {
        let node = &self.tree.nodes[id];
        match &s.inner {
            Some(ts) => {
                self.term_finishable(id, ts)
                    && (s.count.saturating_add(1) >= node.min || node.term_nullable)
            }
            None => s.count >= node.min || node.term_nullable,
        }
    }

    fn term_finishable(&self, id: NodeId, ts: &TermState) -> bool {
        let children = self.children(id);
        let nodes = &self.tree.nodes;
        match ts {
            TermState::Leaf => true,
            TermState::Seq { idx, cur } => {
                let idx = *idx as usize;
                self.finishable(children[idx], cur)
                    && children[idx + 1..].iter().all(|&c| nodes[c].nullable())
            }
            TermState::Choice { branch, cur } => self.finishable(children[*branch as usize], cur),
            TermState::All { consumed, cur } => {
                cur.as_ref()
                    .is_none_or(|(i, s)| self.finishable(children[*i as usize], s))
                    && children
                        .iter()
                        .enumerate()
                        .all(|(j, &c)| consumed & (1u64 << j) != 0 || nodes[c].nullable())
            }
        }
    }

    /// Start-Kandidaten eines Particles in Kandidaten-Reihenfolge.
    fn firsts(&mut self, id: NodeId, s: &PState) -> Firsts {
        let node = &self.tree.nodes[id];
        let mut out = Vec::new();
        match &s.inner {
            Some(ts) => {
                for (term, next) in self.term_firsts(id, ts) {
                    out.push((term, self.normalize(id, s.count, next)));
                }
                if self.term_finishable(id, ts) {
                    self.fresh_firsts(id, node.bump(s.count), &mut out);
                }
            }
            None => self.fresh_firsts(id, s.count, &mut out),
        }
        out
    }

    fn fresh_firsts(&mut self, id: NodeId, count: u32, out: &mut Firsts) {
        if self.tree.nodes[id].exhausted(count) {
            return;
        }
        let starts = self.term_start(id);
        for (term, ts) in starts.iter() {
            out.push((term.clone(), self.normalize(id, count, ts.clone())));
        }
    }

    /// Ein gestartetes Leaf ist sofort abgeschlossen.
    fn normalize(&self, id: NodeId, count: u32, ts: TermState) -> PState {
        match ts {
            TermState::Leaf => PState { count: self.tree.nodes[id].bump(count), inner: None },
            other => PState { count, inner: Some(Box::new(other)) },
        }
    }

    /// Start-Kandidaten eines frischen Vorkommens (memoisiert pro Knoten).
    fn term_start(&mut self, id: NodeId) -> Rc<TermFirsts> {
        if let Some(memo) = self.start_memo.get(&id) {
            return Rc::clone(memo);
        }
        let tree = self.tree;
        let starts = match &tree.nodes[id].term {
            NodeTerm::Leaf(terms) => terms.iter().map(|t| (t.clone(), TermState::Leaf)).collect(),
            NodeTerm::Group(_, children) if children.is_empty() => Vec::new(),
            NodeTerm::Group(Compositor::Sequence, children) => {
                self.seq_firsts(children, 0, &PState::initial())
            }
            NodeTerm::Group(Compositor::Choice, children) => {
                let mut out = Vec::new();
                for (branch, &child) in children.iter().enumerate() {
                    for (term, cur) in self.firsts(child, &PState::initial()) {
                        out.push((term, TermState::Choice { branch: branch as u32, cur }));
                    }
                }
                out
            }
            NodeTerm::Group(Compositor::All, children) => self.all_firsts(children, 0, None),
        };
        let starts = Rc::new(starts);
        self.start_memo.insert(id, Rc::clone(&starts));
        starts
    }

    fn term_firsts(&mut self, id: NodeId, ts: &TermState) -> TermFirsts {
        let children = self.children(id);
        match ts {
            TermState::Leaf => Vec::new(),
            TermState::Seq { idx, cur } => self.seq_firsts(children, *idx as usize, cur),
            TermState::Choice { branch, cur } => self
                .firsts(children[*branch as usize], cur)
                .into_iter()
                .map(|(term, cur)| (term, TermState::Choice { branch: *branch, cur }))
                .collect(),
            TermState::All { consumed, cur } => self.all_firsts(children, *consumed, cur.as_ref()),
        }
    }

    fn seq_firsts(&mut self, children: &[NodeId], idx: usize, cur: &PState) -> TermFirsts {
        let nodes = &self.tree.nodes;
        let mut out: TermFirsts = self
            .firsts(children[idx], cur)
            .into_iter()
            .map(|(term, cur)| (term, TermState::Seq { idx: idx as u32, cur }))
            .collect();
        if self.finishable(children[idx], cur) {
            for (j, &child) in children.iter().enumerate().skip(idx + 1) {
                for (term, cur) in self.firsts(child, &PState::initial()) {
                    out.push((term, TermState::Seq { idx: j as u32, cur }));
                }
                if !nodes[child].nullable() {
                    break;
                }
            }
        }
        out
    }

    fn all_firsts(
        &mut self,
        children: &[NodeId],
        consumed: u64,
        cur: Option<&(u32, PState)>,
    ) -> TermFirsts {
        let mut out = Vec::new();
        let open = match cur {
            Some((i, s)) => {
                let child = children[*i as usize];
                for (term, next) in self.firsts(child, s) {
                    let cur = self.all_member(child, *i, next);
                    out.push((term, TermState::All { consumed, cur }));
                }
                self.finishable(child, s)
            }
            None => true,
        };
        if open {
            for (j, &child) in children.iter().enumerate() {
                let bit = 1u64 << j;
                if consumed & bit != 0 {
                    continue;
                }
                for (term, next) in self.firsts(child, &PState::initial()) {
                    let cur = self.all_member(child, j as u32, next);
                    out.push((term, TermState::All { consumed: consumed | bit, cur }));
                }
            }
        }
        out
    }

    /// Ein erschöpfter Member braucht keinen eigenen Zustand mehr.
    fn all_member(&self, child: NodeId, i: u32, s: PState) -> Option<(u32, PState)> {
        if s.inner.is_none() && self.tree.nodes[child].exhausted(s.count) {
            None
        } else {
            Some((i, s))
        }
    }
}
