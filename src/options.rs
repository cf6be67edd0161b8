//! Grammar options (EXI 5.4, Table 5-1).
//!
//! One immutable bundle of flags that parameterizes every grammar built in a
//! session. Only the options that change the event-candidate enumeration are
//! modelled here, plus the alignment/compression pair because it constrains
//! which self-contained combinations are legal.
//!
//! # Beispiel
//!
//! ```
//! use exi_grammar::options::{Alignment, ExiOptions, Preserve};
//!
//! let opts = ExiOptions::default()
//!     .with_alignment(Alignment::ByteAlignment)
//!     .with_preserve(Preserve { comments: true, ..Preserve::default() });
//!
//! assert_eq!(opts.alignment(), Alignment::ByteAlignment);
//! assert!(opts.preserve().comments);
//! assert!(opts.validate().is_ok());
//! ```

use crate::{Error, Result};

/// Alignment of event codes and content items (EXI 5.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    /// Event codes and content are packed in bits without padding (default).
    #[default]
    BitPacked,
    /// Event codes and content are aligned on byte boundaries.
    ByteAlignment,
    /// All compression steps except DEFLATE are applied.
    PreCompression,
}

/// Fidelity options controlling which optional event kinds get a slot (EXI 5.4, 6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Preserve {
    /// CM events get a slot in the miscellaneous tier.
    pub comments: bool,
    /// PI events get a slot in the miscellaneous tier.
    pub pis: bool,
    /// NS events get a slot in start-tag phases; prefixes travel with names.
    pub prefixes: bool,
    /// Values are kept lexically; typed slots never fall back to untyped escapes.
    pub lexical_values: bool,
    /// Whitespace-only character data in element-only content is kept.
    ///
    /// Lokales Steuerungsfeld, `lexical_values` impliziert ebenfalls
    /// Whitespace-Erhalt.
    pub whitespace: bool,
}

impl Preserve {
    /// Prueft ob Whitespace erhalten werden soll.
    ///
    /// Wahr wenn `whitespace` explizit gesetzt ist oder `lexical_values`
    /// aktiviert ist (impliziert WS-Erhalt).
    pub fn preserves_whitespace(&self) -> bool {
        self.whitespace || self.lexical_values
    }
}

/// Grammar options (EXI 5.4, Table 5-1).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExiOptions {
    pub(crate) alignment: Alignment,
    pub(crate) compression: bool,
    pub(crate) strict: bool,
    pub(crate) fragment: bool,
    pub(crate) preserve: Preserve,
    pub(crate) self_contained: bool,
}

impl ExiOptions {
    // --- Getter ---

    /// Alignment of event codes and content items.
    pub fn alignment(&self) -> Alignment { self.alignment }
    /// EXI compression is used.
    pub fn compression(&self) -> bool { self.compression }
    /// Strict productions only: no undeclared-content escapes.
    pub fn strict(&self) -> bool { self.strict }
    /// Body is a fragment (several top-level elements).
    pub fn fragment(&self) -> bool { self.fragment }
    /// Fidelity options.
    pub fn preserve(&self) -> &Preserve { &self.preserve }
    /// Self-contained regions enabled.
    pub fn self_contained(&self) -> bool { self.self_contained }

    // --- Builder-Setter (Fluent API) ---

    /// Setzt das Alignment.
    pub fn with_alignment(mut self, alignment: Alignment) -> Self { self.alignment = alignment; self }
    /// Aktiviert Compression.
    pub fn with_compression(mut self) -> Self { self.compression = true; self }
    /// Aktiviert Strict-Modus.
    pub fn with_strict(mut self) -> Self { self.strict = true; self }
    /// Aktiviert Fragment-Modus.
    pub fn with_fragment(mut self) -> Self { self.fragment = true; self }
    /// Setzt die Preserve-Optionen.
    pub fn with_preserve(mut self, preserve: Preserve) -> Self { self.preserve = preserve; self }
    /// Aktiviert Self-Contained.
    pub fn with_self_contained(mut self) -> Self { self.self_contained = true; self }

    // --- Mutable Setter ---

    /// Setzt das Alignment.
    pub fn set_alignment(&mut self, alignment: Alignment) { self.alignment = alignment; }
    /// Setzt Compression.
    pub fn set_compression(&mut self, val: bool) { self.compression = val; }
    /// Setzt Strict-Modus.
    pub fn set_strict(&mut self, val: bool) { self.strict = val; }
    /// Setzt Fragment-Modus.
    pub fn set_fragment(&mut self, val: bool) { self.fragment = val; }
    /// Setzt die Preserve-Optionen.
    pub fn set_preserve(&mut self, preserve: Preserve) { self.preserve = preserve; }
    /// Setzt Self-Contained.
    pub fn set_self_contained(&mut self, val: bool) { self.self_contained = val; }

    /// Validates the option combination (EXI 5.4).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidOptionCombination` if:
    /// - `compression` is true and `alignment` is not `BitPacked`
    /// - `strict` is true and any of `preserve.comments`, `preserve.pis`,
    ///   `preserve.prefixes` or `self_contained` is true
    /// - `self_contained` is true and `compression` is true or `alignment` is
    ///   `PreCompression`
    pub fn validate(&self) -> Result<()> {
        // "alignment" MUST NOT appear together with "compression"
        if self.compression && self.alignment != Alignment::BitPacked {
            return Err(Error::InvalidOptionCombination);
        }

        let incompatible_with_strict = self.preserve.comments
            || self.preserve.pis
            || self.preserve.prefixes
            || self.self_contained;
        if self.strict && incompatible_with_strict {
            return Err(Error::InvalidOptionCombination);
        }

        let incompatible_with_self_contained =
            self.compression || self.alignment == Alignment::PreCompression;
        if self.self_contained && incompatible_with_self_contained {
            return Err(Error::InvalidOptionCombination);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_lenient_and_valid() {
        let opts = ExiOptions::default();
        assert_eq!(opts.alignment(), Alignment::BitPacked);
        assert!(!opts.strict());
        assert!(!opts.fragment());
        assert!(!opts.self_contained());
        assert_eq!(*opts.preserve(), Preserve::default());
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn builder_and_setters_agree() {
        let built = ExiOptions::default().with_strict().with_fragment();
        let mut set = ExiOptions::default();
        set.set_strict(true);
        set.set_fragment(true);
        assert_eq!(built, set);
    }

    #[test]
    fn compression_with_byte_alignment_is_invalid() {
        let opts = ExiOptions::default()
            .with_compression()
            .with_alignment(Alignment::ByteAlignment);
        assert_eq!(opts.validate(), Err(Error::InvalidOptionCombination));
    }

    #[test]
    fn compression_with_bit_packed_is_valid() {
        assert!(ExiOptions::default().with_compression().validate().is_ok());
    }

    #[test]
    fn strict_rejects_preserved_comments_pis_and_prefixes() {
        for preserve in [
            Preserve { comments: true, ..Preserve::default() },
            Preserve { pis: true, ..Preserve::default() },
            Preserve { prefixes: true, ..Preserve::default() },
        ] {
            let opts = ExiOptions::default().with_strict().with_preserve(preserve);
            assert_eq!(opts.validate(), Err(Error::InvalidOptionCombination), "{preserve:?}");
        }
    }

    #[test]
    fn strict_with_lexical_values_is_valid() {
        let opts = ExiOptions::default()
            .with_strict()
            .with_preserve(Preserve { lexical_values: true, ..Preserve::default() });
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn strict_with_self_contained_is_invalid() {
        let opts = ExiOptions::default().with_strict().with_self_contained();
        assert_eq!(opts.validate(), Err(Error::InvalidOptionCombination));
    }

    #[test]
    fn self_contained_with_compression_or_precompression_is_invalid() {
        let compressed = ExiOptions::default().with_self_contained().with_compression();
        assert_eq!(compressed.validate(), Err(Error::InvalidOptionCombination));
        let precompressed = ExiOptions::default()
            .with_self_contained()
            .with_alignment(Alignment::PreCompression);
        assert_eq!(precompressed.validate(), Err(Error::InvalidOptionCombination));
    }

    #[test]
    fn self_contained_with_byte_alignment_is_valid() {
        let opts = ExiOptions::default()
            .with_self_contained()
            .with_alignment(Alignment::ByteAlignment);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn preserves_whitespace_implied_by_lexical_values() {
        let p = Preserve { lexical_values: true, ..Preserve::default() };
        assert!(p.preserves_whitespace());
        assert!(!Preserve::default().preserves_whitespace());
        assert!(Preserve { whitespace: true, ..Preserve::default() }.preserves_whitespace());
    }
}
