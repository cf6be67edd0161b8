// Test-Schemas für die Integrationstests.
//
// Wird per `include!` eingebunden. Benötigte Imports:
//   use std::rc::Rc;
//   use exi_grammar::QName;
//   use exi_grammar::schema::*;

fn leaf(local: &str) -> Particle {
    Particle::element(ElementDeclaration::new(QName::new("", local)))
}

fn simple_element(local: &str, base: &str) -> ElementDeclaration {
    let td = TypeDefinition::complex(ContentType::Simple(Rc::new(TypeDefinition::simple(base))));
    ElementDeclaration::new(QName::new("", local)).with_type(Rc::new(td))
}

/// A = sequence(sequence(AB, AC{0,2}), AD, AE?).
fn scenario_a_schema() -> SchemaInfo {
    let content = Particle::sequence(vec![
        Particle::sequence(vec![leaf("AB"), leaf("AC").occurs(0, MaxOccurs::Bounded(2))]),
        leaf("AD"),
        Particle::optional(ParticleTerm::Element(ElementDeclaration::new(QName::new("", "AE")))),
    ]);
    let a = ElementDeclaration::new(QName::new("", "A"))
        .with_type(Rc::new(TypeDefinition::complex(ContentType::ElementOnly(content))));
    SchemaInfo::builder().element(a).build().unwrap()
}

/// `product` mit Pflicht-Attribut `sku` (int) und optionalem `color`;
/// `price` als decimal Simple Content.
fn product_schema(nillable: bool) -> SchemaInfo {
    let content = Particle::sequence(vec![
        Particle::element(simple_element("name", "string")),
        Particle::optional(ParticleTerm::Element(simple_element("price", "decimal"))),
    ]);
    let td = TypeDefinition::complex(ContentType::ElementOnly(content))
        .with_attribute(AttributeUse::required(
            QName::new("", "sku"),
            Some(Rc::new(TypeDefinition::simple("int"))),
        ))
        .with_attribute(AttributeUse::optional(
            QName::new("", "color"),
            Some(Rc::new(TypeDefinition::simple("string"))),
        ));
    let product = ElementDeclaration::new(QName::new("", "product"))
        .with_type(Rc::new(td))
        .with_nillable(nillable);
    SchemaInfo::builder().element(product).build().unwrap()
}

/// `r` = all(a, b, c?).
fn all_group_schema() -> SchemaInfo {
    let content = Particle::all(vec![
        leaf("a"),
        leaf("b"),
        Particle::optional(ParticleTerm::Element(ElementDeclaration::new(QName::new("", "c")))),
    ]);
    let r = ElementDeclaration::new(QName::new("", "r"))
        .with_type(Rc::new(TypeDefinition::complex(ContentType::ElementOnly(content))));
    SchemaInfo::builder().element(r).build().unwrap()
}

/// `doc` mit Mixed Content aus `em*` und einem Wildcard-Anhang.
fn mixed_schema() -> SchemaInfo {
    let content = Particle::sequence(vec![
        Particle::zero_or_more(ParticleTerm::Element(ElementDeclaration::new(QName::new("", "em")))),
        Particle::zero_or_more(ParticleTerm::Wildcard(Wildcard::any())),
    ]);
    let doc = ElementDeclaration::new(QName::new("", "doc"))
        .with_type(Rc::new(TypeDefinition::complex(ContentType::Mixed(content))));
    SchemaInfo::builder().element(doc).build().unwrap()
}
