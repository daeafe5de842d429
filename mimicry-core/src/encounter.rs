//! Encounter contexts: one in-universe way to obtain a creature, plus the
//! lazy source collaborator the controller pulls them from.

use crate::rng::Xoroshiro128Plus;
use crate::species::{BallId, FormId, Gender, MoveId, SpeciesId, TypeTag};
use crate::template::{EncounterFilter, FilterCmp, FilterProp};
use crate::versions::VersionId;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Legacy seed-derivation layout. The variants differ only in which frames
/// are skipped between the derived sub-values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegacyMethod {
    One,
    Two,
    Four,
}

/// What shininess the context itself can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShinyClass {
    Never,
    Always,
    Random,
    FixedValue,
    AlwaysStar,
    AlwaysSquare,
}

impl ShinyClass {
    #[must_use]
    pub const fn is_forced_shiny(self) -> bool {
        matches!(self, Self::Always | Self::AlwaysStar | Self::AlwaysSquare)
    }
}

/// Which ability slots the context may roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityPolicy {
    /// Either visible slot.
    Any12,
    /// Either visible slot or the hidden slot.
    Any12H,
    OnlyFirst,
    OnlySecond,
    OnlyHidden,
}

/// Secondary-type derivation for raid contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypePool {
    /// Fixed to the species' own type tag.
    Base(TypeTag),
    /// Derived from the winning seed.
    Random,
}

/// Closed set of encounter categories. Synthesis strategy dispatch matches
/// on this union; there is deliberately no open-ended inspection anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncounterKind {
    LegacyStatic { method: LegacyMethod },
    LegacyWild { method: LegacyMethod },
    LegacyGift { method: LegacyMethod },
    ModernWild { flawless_ivs: u8, correlated: bool },
    Raid {
        flawless_ivs: u8,
        rate_total: u16,
        rate_threshold: u16,
        type_pool: TypePool,
    },
    Egg,
    Trade { fixed_pid: Option<u32> },
    Gift,
}

impl EncounterKind {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::LegacyStatic { .. } => "LegacyStatic",
            Self::LegacyWild { .. } => "LegacyWild",
            Self::LegacyGift { .. } => "LegacyGift",
            Self::ModernWild { .. } => "ModernWild",
            Self::Raid { .. } => "Raid",
            Self::Egg => "Egg",
            Self::Trade { .. } => "Trade",
            Self::Gift => "Gift",
        }
    }

    /// Kinds whose attributes can be regenerated from a caller-fixed seed.
    #[must_use]
    pub const fn supports_fixed_seed(&self) -> bool {
        matches!(self, Self::ModernWild { .. } | Self::Raid { .. })
    }
}

/// One obtainable-context record, consumed read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterContext {
    pub species: SpeciesId,
    #[serde(default)]
    pub form: FormId,
    pub version: VersionId,
    pub generation: u8,
    pub kind: EncounterKind,
    pub level_min: u8,
    pub level_max: u8,
    /// Relaxed minimum for downleveled re-releases of the same context.
    #[serde(default)]
    pub downlevel_min: Option<u8>,
    #[serde(default)]
    pub fixed_ball: Option<BallId>,
    pub shiny: ShinyClass,
    pub ability: AbilityPolicy,
    #[serde(default)]
    pub fixed_ivs: Option<[u8; 6]>,
    #[serde(default)]
    pub fixed_ec: Option<u32>,
    #[serde(default)]
    pub fixed_gender: Option<Gender>,
    #[serde(default)]
    pub is_alpha: bool,
    /// Never leaves its origin save; skip handler stamping.
    #[serde(default)]
    pub untradeable: bool,
    #[serde(default)]
    pub met_location: u16,
    /// Moves the context can legally carry (empty = unrestricted).
    #[serde(default)]
    pub legal_moves: SmallVec<[MoveId; 8]>,
}

impl EncounterContext {
    /// Effective level floor including the downleveled relaxation.
    #[must_use]
    pub fn effective_level_min(&self) -> u8 {
        self.downlevel_min.map_or(self.level_min, |dl| dl.min(self.level_min))
    }

    /// Cheap pre-derivation gate for raid contexts: whether the raid slot
    /// can appear at all for a given seed. Non-raid kinds always pass.
    #[must_use]
    pub fn can_appear(&self, seed: u32) -> bool {
        match self.kind {
            EncounterKind::Raid {
                rate_total,
                rate_threshold,
                ..
            } if rate_total > 0 => {
                let mut rng = Xoroshiro128Plus::new(u64::from(seed));
                (rng.next_int(u64::from(rate_total)) as u16) < rate_threshold
            }
            _ => true,
        }
    }

    /// Evaluate one override filter against this context.
    #[must_use]
    pub fn matches_filter(&self, filter: &EncounterFilter) -> bool {
        match filter.prop {
            FilterProp::Kind => cmp_text(self.kind.name(), filter.cmp, &filter.value),
            FilterProp::ShinyClass => {
                cmp_text(shiny_class_name(self.shiny), filter.cmp, &filter.value)
            }
            FilterProp::LevelMin => cmp_numeric(u32::from(self.level_min), filter.cmp, &filter.value),
            FilterProp::MetLocation => {
                cmp_numeric(u32::from(self.met_location), filter.cmp, &filter.value)
            }
        }
    }
}

const fn shiny_class_name(class: ShinyClass) -> &'static str {
    match class {
        ShinyClass::Never => "Never",
        ShinyClass::Always => "Always",
        ShinyClass::Random => "Random",
        ShinyClass::FixedValue => "FixedValue",
        ShinyClass::AlwaysStar => "AlwaysStar",
        ShinyClass::AlwaysSquare => "AlwaysSquare",
    }
}

fn cmp_text(actual: &str, cmp: FilterCmp, expected: &str) -> bool {
    match cmp {
        FilterCmp::Eq => actual.eq_ignore_ascii_case(expected),
        FilterCmp::Ne => !actual.eq_ignore_ascii_case(expected),
        // Ordered comparers over names degrade to equality.
        _ => actual.eq_ignore_ascii_case(expected),
    }
}

fn cmp_numeric(actual: u32, cmp: FilterCmp, expected: &str) -> bool {
    let Ok(expected) = expected.parse::<u32>() else {
        return false;
    };
    match cmp {
        FilterCmp::Eq => actual == expected,
        FilterCmp::Ne => actual != expected,
        FilterCmp::Gt => actual > expected,
        FilterCmp::Ge => actual >= expected,
        FilterCmp::Lt => actual < expected,
        FilterCmp::Le => actual <= expected,
    }
}

/// A stub of the template handed to the source for enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumerationStub {
    pub species: SpeciesId,
    pub form: FormId,
}

/// Lazy encounter enumeration collaborator. Ordering beyond the supplied
/// version list is unspecified; the controller always consumes this through
/// a bounded, time-boxed loop.
pub trait EncounterSource {
    fn enumerate<'a>(
        &'a self,
        stub: EnumerationStub,
        moves: &'a [MoveId],
        versions: &'a [VersionId],
    ) -> Box<dyn Iterator<Item = EncounterContext> + 'a>;

    /// Data revision string for the freshness precondition gate.
    fn data_version(&self) -> &str {
        "builtin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wild_context() -> EncounterContext {
        EncounterContext {
            species: 7,
            form: 0,
            version: VersionId(30),
            generation: 8,
            kind: EncounterKind::ModernWild {
                flawless_ivs: 0,
                correlated: false,
            },
            level_min: 12,
            level_max: 20,
            downlevel_min: None,
            fixed_ball: None,
            shiny: ShinyClass::Random,
            ability: AbilityPolicy::Any12,
            fixed_ivs: None,
            fixed_ec: None,
            fixed_gender: None,
            is_alpha: false,
            untradeable: false,
            met_location: 44,
            legal_moves: SmallVec::new(),
        }
    }

    #[test]
    fn downlevel_relaxes_floor() {
        let mut ctx = wild_context();
        assert_eq!(ctx.effective_level_min(), 12);
        ctx.downlevel_min = Some(5);
        assert_eq!(ctx.effective_level_min(), 5);
    }

    #[test]
    fn kind_filter_matches_by_name() {
        let ctx = wild_context();
        let filter = EncounterFilter {
            prop: FilterProp::Kind,
            cmp: FilterCmp::Eq,
            value: String::from("ModernWild"),
        };
        assert!(ctx.matches_filter(&filter));
        let negated = EncounterFilter {
            cmp: FilterCmp::Ne,
            ..filter
        };
        assert!(!ctx.matches_filter(&negated));
    }

    #[test]
    fn level_filter_uses_ordered_comparers() {
        let ctx = wild_context();
        let filter = EncounterFilter {
            prop: FilterProp::LevelMin,
            cmp: FilterCmp::Le,
            value: String::from("12"),
        };
        assert!(ctx.matches_filter(&filter));
        let above = EncounterFilter {
            cmp: FilterCmp::Gt,
            ..filter
        };
        assert!(!ctx.matches_filter(&above));
    }

    #[test]
    fn raid_appear_gate_is_deterministic() {
        let mut ctx = wild_context();
        ctx.kind = EncounterKind::Raid {
            flawless_ivs: 4,
            rate_total: 100,
            rate_threshold: 30,
            type_pool: TypePool::Random,
        };
        let first = ctx.can_appear(0x1234);
        assert_eq!(first, ctx.can_appear(0x1234));
        // Threshold of the full range always appears.
        ctx.kind = EncounterKind::Raid {
            flawless_ivs: 4,
            rate_total: 100,
            rate_threshold: 100,
            type_pool: TypePool::Random,
        };
        assert!(ctx.can_appear(0x9999));
    }

    #[test]
    fn fixed_seed_support_is_kind_scoped() {
        assert!(
            EncounterKind::Raid {
                flawless_ivs: 0,
                rate_total: 0,
                rate_threshold: 0,
                type_pool: TypePool::Random,
            }
            .supports_fixed_seed()
        );
        assert!(!EncounterKind::Egg.supports_fixed_seed());
    }
}
