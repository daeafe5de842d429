//! Per-attempt bias constraints steering the RNG search.
//!
//! Criteria never force invalid output: they only decide which rolled
//! values are acceptable, and context-specific revision relaxes them where
//! the destination can fix an attribute after the fact (mints, capsules).

use crate::constants::{IV_UNSET, STAT_COUNT};
use crate::encounter::{EncounterContext, EncounterKind, ShinyClass};
use crate::species::{AbilitySlot, Gender, Lineage, Nature, SpeciesInfo};
use crate::template::{ShinyPolicy, Template};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Criteria {
    /// Per-stat requirement; -1 = don't care.
    pub ivs: [i8; STAT_COUNT],
    pub nature: Option<Nature>,
    pub gender: Option<Gender>,
    pub shiny: ShinyPolicy,
    pub ability_slot: Option<AbilitySlot>,
    /// Required derived-lineage branch for multi-outcome base encounters.
    pub target_branch: Option<Lineage>,
}

impl Criteria {
    #[must_use]
    pub fn from_template(template: &Template, info: &SpeciesInfo) -> Self {
        let ability_slot = template
            .ability
            .and_then(|ability| info.slot_of_ability(ability));
        let target_branch = info
            .lineage
            .filter(|lineage| lineage.base_species != template.species);
        Self {
            ivs: template.ivs,
            nature: template.nature,
            gender: template.gender,
            shiny: template.shiny_request(),
            ability_slot,
            target_branch,
        }
    }

    /// Context-specific revision before an attempt.
    ///
    /// Modern generations can re-stamp natures with mints, so the nature
    /// requirement is dropped there; shiny-locked raid styles clear the
    /// shiny request; modern wild searches only steer toward the extreme
    /// IVs that the correlation could actually produce.
    #[must_use]
    pub fn revised_for(&self, ctx: &EncounterContext) -> Self {
        let mut revised = *self;
        if ctx.generation > 7 {
            revised.nature = None;
        }
        if matches!(ctx.kind, EncounterKind::Raid { .. }) && ctx.shiny == ShinyClass::Never {
            revised.shiny = ShinyPolicy::NotRequested;
        }
        if let EncounterKind::ModernWild { .. } = ctx.kind {
            let has_extreme = self.ivs.iter().any(|iv| *iv == 0 || *iv == 31);
            if has_extreme {
                for iv in &mut revised.ivs {
                    if *iv > 0 {
                        *iv = 31;
                    }
                }
            }
        }
        revised
    }

    /// Check rolled IVs, speed slot last (it is the most often rerolled
    /// stat, so mismatches elsewhere reject sooner).
    #[must_use]
    pub fn ivs_ok(&self, ivs: &[u8; STAT_COUNT]) -> bool {
        const SPEED: usize = STAT_COUNT - 1;
        for i in 0..SPEED {
            if self.ivs[i] != IV_UNSET && self.ivs[i] != ivs[i] as i8 {
                return false;
            }
        }
        self.ivs[SPEED] == IV_UNSET || self.ivs[SPEED] == ivs[SPEED] as i8
    }

    #[must_use]
    pub fn nature_ok(&self, nature: Nature) -> bool {
        self.nature.is_none_or(|wanted| wanted == nature)
    }

    #[must_use]
    pub fn gender_ok(&self, gender: Gender) -> bool {
        self.gender.is_none_or(|wanted| wanted == gender)
    }

    #[must_use]
    pub fn branch_ok(&self, pid: u32) -> bool {
        self.target_branch
            .is_none_or(|lineage| lineage.branch_of(pid) == lineage.group)
    }
}
