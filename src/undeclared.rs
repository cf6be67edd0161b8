//! Undeclared Productions: Escape-Tier und CM/PI-Tier (EXI 8.5.4.4).
//!
//! Tier 2 enthält die Escapes für Abweichungen vom Schema sowie NS und SC,
//! Tier 3 die per Preserve-Option erhaltenen Comments und PIs. Beide Tiers
//! hängen nur von Zustand, Options und dem aktuellen Tier 1 ab.
//!
//! # Reihenfolge Tier 2 (Start-Tag, nicht strict)
//!
//! ```text
//! EE                  wenn in Tier 1 kein EE steht
//! AT(xsi:type)        Stage Initial, vor dem ersten Attribut, nicht deklariert
//! AT(xsi:nil)         Stage Initial/Typed, vor dem ersten Attribut, nicht deklariert
//! AT(q)[untyped]      je in Tier 1 angebotenem deklarierten Attribut
//! AT(*)[untyped]
//! SE(*)
//! CH[untyped]         wenn in Tier 1 kein untyped CH steht
//! NS                  Preserve.prefixes
//! SC                  selfContained, Stage Initial, vor dem ersten Attribut
//! ```
//!
//! Im Strict-Modus fallen alle Escapes weg. Built-in Grammars behalten ihre
//! generischen Productions auch dann (EXI 8.4.3).

use crate::grammar::{
    self, AttributeKind, BuiltInPhase, GrammarId, Production, StartElementKind, TagStage, Terminal,
};
use crate::options::ExiOptions;
use crate::schema_grammar::SchemaGrammars;
use crate::Result;

fn has(tier1: &[Production], terminal: Terminal) -> bool {
    tier1.iter().any(|p| p.terminal == terminal)
}

/// Escape-Tier (Tiefe 2) eines Zustands.
///
/// `tier1` sind die deklarierten und gelernten Productions in Listenreihenfolge.
pub(crate) fn escape_productions(
    table: &SchemaGrammars,
    options: &ExiOptions,
    id: GrammarId,
    tier1: &[Production],
) -> Result<Vec<Production>> {
    let mut out = Vec::new();
    match id {
        GrammarId::DocumentStart
        | GrammarId::DocumentContent
        | GrammarId::DocumentEnd
        | GrammarId::FragmentContent => {}
        GrammarId::StartTag { ty, nillable, attr, stage } => {
            if !options.strict() {
                let here = GrammarId::StartTag { ty, nillable, attr, stage: stage.after_attribute() };
                let entry = grammar::content_entry(table, ty);

                if !has(tier1, Terminal::EndElement) {
                    out.push(Production::new(Terminal::EndElement, None));
                }
                if attr == 0 && stage == TagStage::Initial && !has(tier1, Terminal::XsiType) {
                    out.push(Production::new(Terminal::XsiType, None));
                }
                if attr == 0
                    && matches!(stage, TagStage::Initial | TagStage::Typed)
                    && !has(tier1, Terminal::XsiNil)
                {
                    out.push(Production::new(Terminal::XsiNil, None));
                }
                // Untyped-Varianten der in Tier 1 angebotenen Attribute, gleicher Folgezustand.
                out.extend(tier1.iter().filter_map(|p| match p.terminal {
                    Terminal::Attribute(AttributeKind::QName(name)) => Some(Production::new(
                        Terminal::Attribute(AttributeKind::QNameUntyped(name)),
                        p.next,
                    )),
                    _ => None,
                }).take(declared_attribute_count(table, id)));
                out.push(Production::new(Terminal::Attribute(AttributeKind::WildcardUntyped), Some(here)));
                if stage != TagStage::Nilled {
                    out.push(Production::new(Terminal::StartElement(StartElementKind::Wildcard), Some(entry)));
                    if !has(tier1, Terminal::CharactersUntyped) {
                        let after = match entry {
                            GrammarId::Simple { ty, .. } => GrammarId::Simple { ty, after: true },
                            other => other,
                        };
                        out.push(Production::new(Terminal::CharactersUntyped, Some(after)));
                    }
                }
            }
            if options.preserve().prefixes {
                out.push(Production::new(Terminal::NamespaceDecl, Some(id)));
            }
            if options.self_contained() && attr == 0 && stage == TagStage::Initial {
                out.push(Production::new(
                    Terminal::SelfContained,
                    Some(GrammarId::StartTag { ty, nillable, attr, stage: TagStage::SelfContained }),
                ));
            }
        }
        GrammarId::Content { .. } | GrammarId::Simple { after: true, .. } => {
            if !options.strict() {
                if !has(tier1, Terminal::EndElement) {
                    out.push(Production::new(Terminal::EndElement, None));
                }
                out.push(Production::new(Terminal::StartElement(StartElementKind::Wildcard), Some(id)));
                if !has(tier1, Terminal::CharactersUntyped) {
                    out.push(Production::new(Terminal::CharactersUntyped, Some(id)));
                }
            }
        }
        GrammarId::Simple { ty, after: false } => {
            if !options.strict() {
                if !has(tier1, Terminal::EndElement) {
                    out.push(Production::new(Terminal::EndElement, None));
                }
                out.push(Production::new(Terminal::StartElement(StartElementKind::Wildcard), Some(id)));
                if !has(tier1, Terminal::CharactersUntyped) {
                    out.push(Production::new(
                        Terminal::CharactersUntyped,
                        Some(GrammarId::Simple { ty, after: true }),
                    ));
                }
            }
        }
        GrammarId::BuiltIn { qname, phase: BuiltInPhase::StartTag } => {
            let content = GrammarId::BuiltIn { qname, phase: BuiltInPhase::Content };
            if !has(tier1, Terminal::EndElement) {
                out.push(Production::new(Terminal::EndElement, None));
            }
            out.push(Production::new(Terminal::Attribute(AttributeKind::Wildcard), Some(id)));
            out.push(Production::new(Terminal::StartElement(StartElementKind::Wildcard), Some(content)));
            if !has(tier1, Terminal::CharactersUntyped) {
                out.push(Production::new(Terminal::CharactersUntyped, Some(content)));
            }
            if options.preserve().prefixes {
                out.push(Production::new(Terminal::NamespaceDecl, Some(id)));
            }
            if options.self_contained() {
                out.push(Production::new(Terminal::SelfContained, Some(id)));
            }
        }
        GrammarId::BuiltIn { phase: BuiltInPhase::Content, .. } => {
            out.push(Production::new(Terminal::StartElement(StartElementKind::Wildcard), Some(id)));
            if !has(tier1, Terminal::CharactersUntyped) {
                out.push(Production::new(Terminal::CharactersUntyped, Some(id)));
            }
        }
    }
    Ok(out)
}

/// Anzahl der deklarierten Attribute die ein Start-Tag in Tier 1 anbietet.
///
/// Gelernte AT(q) stehen hinter den deklarierten und bekommen keine
/// Untyped-Variante.
fn declared_attribute_count(table: &SchemaGrammars, id: GrammarId) -> usize {
    match id {
        GrammarId::StartTag { ty, attr, stage, .. } => {
            let attr = usize::from(attr);
            grammar::offered_attributes_end(table, ty, attr, stage).saturating_sub(attr)
        }
        _ => 0,
    }
}

/// CM/PI-Tier (Tiefe 3) eines Zustands.
///
/// Ein Comment oder PI im Start-Tag beendet die Attribute.
pub(crate) fn misc_productions(table: &SchemaGrammars, options: &ExiOptions, id: GrammarId) -> Vec<Production> {
    let preserve = options.preserve();
    if id == GrammarId::DocumentStart || !(preserve.comments || preserve.pis) {
        return Vec::new();
    }
    let next = match id {
        GrammarId::StartTag { stage: TagStage::Nilled, .. } => id,
        GrammarId::StartTag { ty, .. } => grammar::content_entry(table, ty),
        GrammarId::BuiltIn { qname, phase: BuiltInPhase::StartTag } => {
            GrammarId::BuiltIn { qname, phase: BuiltInPhase::Content }
        }
        other => other,
    };
    let mut out = Vec::with_capacity(2);
    if preserve.comments {
        out.push(Production::new(Terminal::Comment, Some(next)));
    }
    if preserve.pis {
        out.push(Production::new(Terminal::ProcessingInstr, Some(next)));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::grammar::declared_productions;
    use crate::options::Preserve;
    use crate::qname::QName;
    use crate::schema::{AttributeUse, ContentType, ElementDeclaration, Particle, SchemaInfo, TypeDefinition};
    use crate::schema_grammar::TypeId;

    fn terminals(productions: &[Production]) -> Vec<Terminal> {
        productions.iter().map(|p| p.terminal).collect()
    }

    fn table_with_attribute() -> (SchemaGrammars, TypeId) {
        let td = TypeDefinition::complex(ContentType::ElementOnly(Particle::element(ElementDeclaration::new(
            QName::new("", "child"),
        ))))
        .with_attribute(AttributeUse::required(QName::new("", "id"), None));
        let schema = SchemaInfo::builder()
            .element(ElementDeclaration::new(QName::new("", "e")).with_type(Rc::new(td)))
            .build()
            .unwrap();
        let table = SchemaGrammars::build(&schema).unwrap();
        let name = table.interner().get_expanded("", "e").unwrap();
        let ty = table.element(table.global_element(name).unwrap()).ty;
        (table, ty)
    }

    fn tiers(table: &SchemaGrammars, options: &ExiOptions, id: GrammarId) -> (Vec<Production>, Vec<Production>) {
        let tier1 = declared_productions(table, options, id).unwrap();
        let tier2 = escape_productions(table, options, id, &tier1).unwrap();
        (tier1, tier2)
    }

    #[test]
    fn start_tag_escape_order() {
        let (table, ty) = table_with_attribute();
        let options = ExiOptions::default().with_preserve(Preserve { prefixes: true, ..Preserve::default() });
        let id = GrammarId::StartTag { ty, nillable: false, attr: 0, stage: TagStage::Initial };
        let (tier1, tier2) = tiers(&table, &options, id);
        let id_name = table.interner().get_expanded("", "id").unwrap();

        assert_eq!(terminals(&tier1), vec![Terminal::Attribute(AttributeKind::QName(id_name))]);
        assert_eq!(
            terminals(&tier2),
            vec![
                Terminal::EndElement,
                Terminal::XsiType,
                Terminal::XsiNil,
                Terminal::Attribute(AttributeKind::QNameUntyped(id_name)),
                Terminal::Attribute(AttributeKind::WildcardUntyped),
                Terminal::StartElement(StartElementKind::Wildcard),
                Terminal::CharactersUntyped,
                Terminal::NamespaceDecl,
            ]
        );
        // Untyped-Variante teilt den Folgezustand.
        assert_eq!(tier2[3].next, tier1[0].next);
    }

    #[test]
    fn strict_mode_has_no_escapes() {
        let (table, ty) = table_with_attribute();
        let options = ExiOptions::default().with_strict();
        let id = GrammarId::StartTag { ty, nillable: false, attr: 0, stage: TagStage::Initial };
        let (_, tier2) = tiers(&table, &options, id);
        assert!(tier2.is_empty());
        assert!(misc_productions(&table, &options, id).is_empty());
    }

    #[test]
    fn nilled_start_tag_has_no_content_escapes() {
        let (table, ty) = table_with_attribute();
        let options = ExiOptions::default();
        let id = GrammarId::StartTag { ty, nillable: false, attr: 0, stage: TagStage::Nilled };
        let (tier1, tier2) = tiers(&table, &options, id);
        assert_eq!(tier1.last().unwrap().terminal, Terminal::EndElement);
        assert!(!tier2.iter().any(|p| matches!(
            p.terminal,
            Terminal::StartElement(_) | Terminal::CharactersUntyped | Terminal::EndElement | Terminal::XsiNil
        )));
    }

    #[test]
    fn built_in_grammars_keep_generic_productions_in_strict_mode() {
        let table = SchemaGrammars::build(&SchemaInfo::empty()).unwrap();
        let options = ExiOptions::default().with_strict();
        let qname = table.interner().get_expanded(crate::qname::URI_XSI, "nil").unwrap();
        let start = GrammarId::BuiltIn { qname, phase: BuiltInPhase::StartTag };
        let (tier1, tier2) = tiers(&table, &options, start);
        assert!(tier1.is_empty());
        assert_eq!(
            terminals(&tier2),
            vec![
                Terminal::EndElement,
                Terminal::Attribute(AttributeKind::Wildcard),
                Terminal::StartElement(StartElementKind::Wildcard),
                Terminal::CharactersUntyped,
            ]
        );
        let content = GrammarId::BuiltIn { qname, phase: BuiltInPhase::Content };
        let (tier1, tier2) = tiers(&table, &options, content);
        assert_eq!(terminals(&tier1), vec![Terminal::EndElement]);
        assert_eq!(tier2.len(), 2);
    }

    #[test]
    fn comments_in_start_tag_enter_content() {
        let (table, ty) = table_with_attribute();
        let options = ExiOptions::default().with_preserve(Preserve { comments: true, pis: true, ..Preserve::default() });
        let id = GrammarId::StartTag { ty, nillable: false, attr: 0, stage: TagStage::Initial };
        let misc = misc_productions(&table, &options, id);
        assert_eq!(terminals(&misc), vec![Terminal::Comment, Terminal::ProcessingInstr]);
        assert_eq!(misc[0].next, Some(GrammarId::Content { ty, state: 0 }));
        assert!(misc_productions(&table, &options, GrammarId::DocumentStart).is_empty());
        assert_eq!(misc_productions(&table, &options, GrammarId::DocumentEnd).len(), 2);
    }
}
