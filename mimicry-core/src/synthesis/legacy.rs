//! Legacy seed search: draw 32-bit seeds until the derived identity value
//! satisfies the criteria.
//!
//! The derivation layout is fixed per method; nature, ability slot and
//! gender all hang off the identity value, so the only way to honor a
//! request is to keep drawing seeds. After `LEGACY_COMPROMISE_AFTER`
//! unsuccessful trials the nature requirement is relaxed; the loop hard
//! stops at `LEGACY_TRIAL_CEILING` and returns the best compromise found.
//! This strategy never errors.

use crate::candidate::Candidate;
use crate::constants::{LEGACY_COMPROMISE_AFTER, LEGACY_TRIAL_CEILING, STAT_COUNT};
use crate::criteria::Criteria;
use crate::encounter::{EncounterContext, EncounterKind, LegacyMethod};
use crate::rng::Lcrng;
use crate::species::{AbilitySlot, Gender, Nature, SpeciesInfo};
use crate::synthesis::SynthesisReport;
use log::debug;
use rand::Rng;

/// Everything a single seed derives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyDerivation {
    pub pid: u32,
    pub ivs: [u8; STAT_COUNT],
}

/// Derive the identity value and IV blocks for one seed.
#[must_use]
pub fn derive(method: LegacyMethod, seed: u32) -> LegacyDerivation {
    let mut rng = Lcrng::new(seed);
    let low = rng.next16();
    let high = rng.next16();
    let pid = (u32::from(high) << 16) | u32::from(low);
    let iv1 = match method {
        LegacyMethod::Two => {
            rng.skip();
            rng.next16()
        }
        _ => rng.next16(),
    };
    let iv2 = match method {
        LegacyMethod::Four => {
            rng.skip();
            rng.next16()
        }
        _ => rng.next16(),
    };
    LegacyDerivation {
        pid,
        ivs: unpack_ivs(iv1, iv2),
    }
}

/// Unpack the two 15-bit IV blocks: HP/ATK/DEF then SPE/SPA/SPD in 5-bit
/// lanes, stored in canonical HP/ATK/DEF/SPA/SPD/SPE order.
const fn unpack_ivs(iv1: u16, iv2: u16) -> [u8; STAT_COUNT] {
    [
        (iv1 & 0x1F) as u8,
        ((iv1 >> 5) & 0x1F) as u8,
        ((iv1 >> 10) & 0x1F) as u8,
        ((iv2 >> 5) & 0x1F) as u8,
        ((iv2 >> 10) & 0x1F) as u8,
        (iv2 & 0x1F) as u8,
    ]
}

#[must_use]
pub const fn nature_of(pid: u32) -> Nature {
    Nature((pid % crate::constants::NATURE_COUNT as u32) as u8)
}

#[must_use]
pub const fn ability_slot_of(pid: u32) -> AbilitySlot {
    if pid & 1 == 0 {
        AbilitySlot::First
    } else {
        AbilitySlot::Second
    }
}

pub fn search<R: Rng>(
    candidate: &mut Candidate,
    ctx: &EncounterContext,
    criteria: &Criteria,
    info: &SpeciesInfo,
    rng: &mut R,
) -> SynthesisReport {
    let method = method_of(ctx);
    let mut compromise = false;
    let mut fallback: Option<(u32, LegacyDerivation)> = None;
    let mut last = (0u32, derive(method, 0));
    let mut trials = 0u32;

    while trials < LEGACY_TRIAL_CEILING {
        trials += 1;
        if trials == LEGACY_COMPROMISE_AFTER {
            compromise = true;
            debug!(
                "legacy search entering compromise mode after {trials} trials (species {})",
                ctx.species
            );
        }

        let seed = rng.next_u32();
        let derived = derive(method, seed);
        last = (seed, derived);

        if !matches_except_nature(criteria, info, &derived) {
            continue;
        }
        if fallback.is_none() {
            fallback = Some((seed, derived));
        }
        if !compromise && !criteria.nature_ok(nature_of(derived.pid)) {
            continue;
        }

        apply(candidate, info, seed, &derived);
        return SynthesisReport {
            seed_trials: trials,
            compromised: compromise,
        };
    }

    // Exhausted: the best nature-compromised hit, or the final derivation.
    let (seed, derived) = fallback.unwrap_or(last);
    apply(candidate, info, seed, &derived);
    debug!(
        "legacy search exhausted {trials} trials for species {}; returning compromise",
        ctx.species
    );
    SynthesisReport {
        seed_trials: trials,
        compromised: true,
    }
}

const fn method_of(ctx: &EncounterContext) -> LegacyMethod {
    match ctx.kind {
        EncounterKind::LegacyStatic { method }
        | EncounterKind::LegacyWild { method }
        | EncounterKind::LegacyGift { method } => method,
        _ => LegacyMethod::One,
    }
}

fn matches_except_nature(
    criteria: &Criteria,
    info: &SpeciesInfo,
    derived: &LegacyDerivation,
) -> bool {
    if !criteria.branch_ok(derived.pid) {
        return false;
    }
    if !ability_ok(criteria, derived.pid) {
        return false;
    }
    let gender = Gender::from_pid_and_ratio(derived.pid, info.gender_ratio);
    criteria.gender_ok(gender) && criteria.ivs_ok(&derived.ivs)
}

/// Hidden-slot requests cannot be satisfied from the identity value's low
/// bit; they are repaired post-search, so only visible slots gate here.
fn ability_ok(criteria: &Criteria, pid: u32) -> bool {
    match criteria.ability_slot {
        Some(AbilitySlot::Hidden) | None => true,
        Some(slot) => slot == ability_slot_of(pid),
    }
}

fn apply(candidate: &mut Candidate, info: &SpeciesInfo, seed: u32, derived: &LegacyDerivation) {
    candidate.pid = derived.pid;
    // The seed value mirrors the identity value until the transfer parity
    // step finalizes it.
    candidate.ec = seed;
    candidate.ivs = derived.ivs;
    candidate.nature = nature_of(derived.pid);
    candidate.stat_nature = candidate.nature;
    let slot = ability_slot_of(derived.pid);
    candidate.ability_slot = slot;
    candidate.ability = info.ability_in_slot(slot);
    candidate.gender = Gender::from_pid_and_ratio(derived.pid, info.gender_ratio);
}
