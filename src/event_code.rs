//! Event Codes (EXI 6.1, 6.2).
//!
//! Event Codes identifizieren einen Eintrag der Event Type List und bestehen
//! aus 1-3 Teilen. Jeder Teil wird als n-bit unsigned integer serialisiert,
//! wobei n von der Anzahl der Geschwister abhängt.
//!
//! # Geschwister (EXI 6.2)
//!
//! Die Event Type List ist in drei Tiers aufgeteilt:
//! - Tier 1: deklarierte und gelernte Productions, Code `n`
//! - Tier 2: Escape-Productions unter dem Escape-Wert `n1`, Code `n1.m`
//! - Tier 3: CM/PI unter `n1.n2`, Code `n1.n2.k`
//!
//! Der Escape-Wert eines Tiers existiert nur wenn ein tieferes Tier nicht
//! leer ist. Damit gibt es pro Liste genau eine Geschwister-Gruppe je Teil,
//! und [`EventCodeContext`] kommt mit drei Zählern aus.

use std::fmt;

use crate::bit_width;
use crate::{Error, Result};

/// Ein Event Code mit 1-3 Teilen.
///
/// Die Teile werden hierarchisch interpretiert (z.B. "1.3.0" = Teil1=1,
/// Teil2=3, Teil3=0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventCode {
    part1: u32,
    part2: Option<u32>,
    part3: Option<u32>,
}

impl EventCode {
    /// Erstellt einen Event Code mit einem Teil.
    pub fn one(part1: u32) -> Self {
        Self { part1, part2: None, part3: None }
    }

    /// Erstellt einen Event Code mit zwei Teilen.
    pub fn two(part1: u32, part2: u32) -> Self {
        Self { part1, part2: Some(part2), part3: None }
    }

    /// Erstellt einen Event Code mit drei Teilen.
    pub fn three(part1: u32, part2: u32, part3: u32) -> Self {
        Self { part1, part2: Some(part2), part3: Some(part3) }
    }

    /// Anzahl der Teile (1-3), entspricht der Tiefe in der Event Type List.
    pub fn num_parts(&self) -> usize {
        1 + self.part2.is_some() as usize + self.part3.is_some() as usize
    }

    /// Gibt den ersten Teil zurück.
    pub fn part1(&self) -> u32 {
        self.part1
    }

    /// Gibt den zweiten Teil zurück (falls vorhanden).
    pub fn part2(&self) -> Option<u32> {
        self.part2
    }

    /// Gibt den dritten Teil zurück (falls vorhanden).
    pub fn part3(&self) -> Option<u32> {
        self.part3
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.part1)?;
        if let Some(p2) = self.part2 {
            write!(f, ".{p2}")?;
        }
        if let Some(p3) = self.part3 {
            write!(f, ".{p3}")?;
        }
        Ok(())
    }
}

/// Kontext einer Event Type List: Anzahl der Einträge pro Tier (EXI 6.2).
///
/// Ein externer Serializer braucht nur diesen Kontext um Codes zu schreiben
/// oder zu lesen; die Liste selbst bleibt in der Engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventCodeContext {
    tier1: u32,
    tier2: u32,
    tier3: u32,
}

impl EventCodeContext {
    /// Erstellt einen Kontext aus den Tier-Größen.
    pub fn new(tier1: u32, tier2: u32, tier3: u32) -> Self {
        Self { tier1, tier2, tier3 }
    }

    /// Anzahl der Tier-1-Einträge (ohne Escape-Wert).
    pub fn tier1(&self) -> u32 {
        self.tier1
    }

    /// Anzahl der Tier-2-Einträge (ohne Escape-Wert).
    pub fn tier2(&self) -> u32 {
        self.tier2
    }

    /// Anzahl der Tier-3-Einträge.
    pub fn tier3(&self) -> u32 {
        self.tier3
    }

    /// Ob Part1 einen Escape-Wert zu Tier 2/3 besitzt.
    pub fn has_second_level(&self) -> bool {
        self.tier2 > 0 || self.tier3 > 0
    }

    /// Ob Part2 einen Escape-Wert zu Tier 3 besitzt.
    pub fn has_third_level(&self) -> bool {
        self.tier3 > 0
    }

    /// Distinct values für Part1 (inkl. Escape).
    pub fn part1_count(&self) -> u32 {
        self.tier1 + u32::from(self.has_second_level())
    }

    /// Distinct values für Part2 unter dem Escape-Wert (inkl. Escape zu Tier 3).
    pub fn part2_count(&self) -> u32 {
        self.tier2 + u32::from(self.has_third_level())
    }

    /// Distinct values für Part3.
    pub fn part3_count(&self) -> u32 {
        self.tier3
    }

    /// Bitbreite für Part1 (bit-packed).
    pub fn bits_for_part1(&self) -> u8 {
        bit_width::for_count_u32(self.part1_count())
    }

    /// Bitbreite für Part2 (bit-packed).
    pub fn bits_for_part2(&self) -> u8 {
        bit_width::for_count_u32(self.part2_count())
    }

    /// Bitbreite für Part3 (bit-packed).
    pub fn bits_for_part3(&self) -> u8 {
        bit_width::for_count_u32(self.part3_count())
    }

    /// Byte-Breite für Part1 (byte-aligned, EXI 6.2 Table 6-2).
    pub fn bytes_for_part1(&self) -> u8 {
        bit_width::bytes_for_count_u32(self.part1_count())
    }

    /// Byte-Breite für Part2 (byte-aligned).
    pub fn bytes_for_part2(&self) -> u8 {
        bit_width::bytes_for_count_u32(self.part2_count())
    }

    /// Byte-Breite für Part3 (byte-aligned).
    pub fn bytes_for_part3(&self) -> u8 {
        bit_width::bytes_for_count_u32(self.part3_count())
    }

    /// Bitbreiten aller Teile des gegebenen Codes, in Reihenfolge.
    pub fn bit_widths(&self, code: &EventCode) -> Vec<u8> {
        let mut widths = vec![self.bits_for_part1()];
        if code.part2().is_some() {
            widths.push(self.bits_for_part2());
        }
        if code.part3().is_some() {
            widths.push(self.bits_for_part3());
        }
        widths
    }

    /// Event Code des `index`-ten Eintrags in Tier `depth` (1-3).
    pub fn code_at(&self, depth: u8, index: u32) -> EventCode {
        match depth {
            1 => EventCode::one(index),
            2 => EventCode::two(self.tier1, index),
            _ => EventCode::three(self.tier1, self.tier2, index),
        }
    }

    /// Prüft einen Code gegen den Kontext und liefert (Tiefe, Index im Tier).
    ///
    /// Ein Code der auf einen Escape-Wert endet oder außerhalb liegt ist eine
    /// Desynchronisation (EXI 6.1).
    pub fn locate(&self, code: &EventCode) -> Result<(u8, u32)> {
        let invalid = || Error::invalid_event_code(code.to_string(), self.to_string());
        match (code.part2(), code.part3()) {
            (None, _) if code.part1() < self.tier1 => Ok((1, code.part1())),
            (Some(p2), None)
                if self.has_second_level() && code.part1() == self.tier1 && p2 < self.tier2 =>
            {
                Ok((2, p2))
            }
            (Some(p2), Some(p3))
                if self.has_third_level()
                    && code.part1() == self.tier1
                    && p2 == self.tier2
                    && p3 < self.tier3 =>
            {
                Ok((3, p3))
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for EventCodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tiers({}, {}, {})", self.tier1, self.tier2, self.tier3)
    }
}
