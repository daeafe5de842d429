//! Modern linear-stream synthesis: one deterministic bit stream per
//! attempt, consumed in a fixed call order.
//!
//! Order for the wild stream: seed value, identity value (with shiny
//! policy retry/forcing), flawless slot selection, remaining IV rolls,
//! ability slot, gender threshold roll, nature, then the two size bytes.
//! Every draw shifts all later values; the order must never change.

use crate::candidate::Candidate;
use crate::constants::{IV_MAX, IV_UNSET, MODERN_TRIAL_CEILING, STAT_COUNT};
use crate::criteria::Criteria;
use crate::encounter::{AbilityPolicy, EncounterContext, EncounterKind};
use crate::rng::Xoroshiro128Plus;
use crate::shiny;
use crate::species::{AbilitySlot, Gender, Nature, SpeciesInfo};
use crate::synthesis::SynthesisReport;
use crate::template::ShinyPolicy;
use log::debug;
use rand::Rng;

/// Attributes rolled from one stream, post-identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeBlock {
    pub ivs: [u8; STAT_COUNT],
    pub ability_slot: AbilitySlot,
    pub gender: Gender,
    pub nature: Nature,
    pub height: u8,
    pub weight: u8,
}

/// Roll the shared post-identity attribute block in fixed order.
pub fn roll_attribute_block(
    stream: &mut Xoroshiro128Plus,
    flawless: u8,
    ability: AbilityPolicy,
    info: &SpeciesInfo,
) -> AttributeBlock {
    let mut ivs = [IV_UNSET; STAT_COUNT];
    for _ in 0..flawless.min(STAT_COUNT as u8) {
        // Duplicate slots are redrawn; the discarded draws still consume
        // stream positions, which later values depend on.
        let mut index = stream.next_int(STAT_COUNT as u64) as usize;
        while ivs[index] != IV_UNSET {
            index = stream.next_int(STAT_COUNT as u64) as usize;
        }
        ivs[index] = IV_MAX as i8;
    }
    let mut rolled = [0u8; STAT_COUNT];
    for (slot, iv) in rolled.iter_mut().zip(ivs.iter()) {
        *slot = if *iv == IV_UNSET {
            stream.next_int(u64::from(IV_MAX) + 1) as u8
        } else {
            *iv as u8
        };
    }

    let ability_slot = roll_ability_slot(stream, ability);
    let gender = roll_gender(stream, info.gender_ratio);
    let nature = Nature(stream.next_int(25) as u8);
    let height = (stream.next_int(0x81) + stream.next_int(0x80)) as u8;
    let weight = (stream.next_int(0x81) + stream.next_int(0x80)) as u8;

    AttributeBlock {
        ivs: rolled,
        ability_slot,
        gender,
        nature,
        height,
        weight,
    }
}

fn roll_ability_slot(stream: &mut Xoroshiro128Plus, policy: AbilityPolicy) -> AbilitySlot {
    match policy {
        AbilityPolicy::Any12H => match stream.next_int(3) {
            0 => AbilitySlot::First,
            1 => AbilitySlot::Second,
            _ => AbilitySlot::Hidden,
        },
        AbilityPolicy::Any12 => {
            if stream.next_int(2) == 0 {
                AbilitySlot::First
            } else {
                AbilitySlot::Second
            }
        }
        AbilityPolicy::OnlyFirst => AbilitySlot::First,
        AbilityPolicy::OnlySecond => AbilitySlot::Second,
        AbilityPolicy::OnlyHidden => AbilitySlot::Hidden,
    }
}

fn roll_gender(stream: &mut Xoroshiro128Plus, ratio: u8) -> Gender {
    match ratio {
        crate::constants::RATIO_MAGIC_GENDERLESS => Gender::Genderless,
        crate::constants::RATIO_MAGIC_FEMALE => Gender::Female,
        crate::constants::RATIO_MAGIC_MALE => Gender::Male,
        _ => {
            let roll = stream.next_int(100) as u32;
            if roll < female_threshold(ratio) {
                Gender::Female
            } else {
                Gender::Male
            }
        }
    }
}

/// Percent threshold below which the gender roll is female.
#[must_use]
pub const fn female_threshold(ratio: u8) -> u32 {
    match ratio {
        31 => 12,
        63 => 25,
        127 => 50,
        191 => 75,
        225 => 89,
        other => other as u32 * 100 / 254,
    }
}

/// Whether a rolled identity value violates the shiny policy and the seed
/// must be retried.
const fn policy_rejects(policy: ShinyPolicy, xor: u16) -> bool {
    match policy {
        ShinyPolicy::NotRequested => xor < 16,
        ShinyPolicy::Requested => xor >= 16,
        ShinyPolicy::Star => xor == 0 || xor >= 16,
        ShinyPolicy::Square => xor != 0,
    }
}

/// Wild linear synthesis. Bounded: after `MODERN_TRIAL_CEILING` seeds the
/// last stream is kept and the requested IVs are fixed directly, so the
/// strategy degrades instead of spinning.
pub fn find_wild<R: Rng>(
    candidate: &mut Candidate,
    ctx: &EncounterContext,
    criteria: &Criteria,
    info: &SpeciesInfo,
    rng: &mut R,
    fixed_seed: Option<u64>,
) -> SynthesisReport {
    let flawless = match ctx.kind {
        EncounterKind::ModernWild { flawless_ivs, .. } => flawless_ivs,
        _ => 0,
    };

    if let Some(seed) = fixed_seed {
        synthesize_from_seed(candidate, seed as u32, flawless, ctx.ability, info);
        force_policy(candidate, criteria.shiny);
        return SynthesisReport {
            seed_trials: 1,
            compromised: false,
        };
    }

    let mut trials = 0u32;
    while trials < MODERN_TRIAL_CEILING {
        trials += 1;
        let seed = rng.next_u32();
        let mut stream = Xoroshiro128Plus::new(u64::from(seed));
        let ec = stream.next_u32();
        let pid = stream.next_u32();
        if policy_rejects(criteria.shiny, shiny::shiny_xor(pid, candidate.id32())) {
            continue;
        }
        let block = roll_attribute_block(&mut stream, flawless, ctx.ability, info);
        if !criteria.ivs_ok(&block.ivs)
            || !criteria.gender_ok(block.gender)
            || !criteria.nature_ok(block.nature)
        {
            continue;
        }
        apply(candidate, ec, pid, &block, info);
        return SynthesisReport {
            seed_trials: trials,
            compromised: false,
        };
    }

    // Degraded path: roll one final stream, then pin the requested IVs and
    // shiny state directly.
    debug!(
        "wild stream search exhausted {trials} trials for species {}; fixing attributes directly",
        ctx.species
    );
    let seed = rng.next_u32();
    synthesize_from_seed(candidate, seed, flawless, ctx.ability, info);
    for (slot, want) in candidate.ivs.iter_mut().zip(criteria.ivs.iter()) {
        if *want != IV_UNSET {
            *slot = *want as u8;
        }
    }
    force_policy(candidate, criteria.shiny);
    SynthesisReport {
        seed_trials: trials,
        compromised: true,
    }
}

fn synthesize_from_seed(
    candidate: &mut Candidate,
    seed: u32,
    flawless: u8,
    ability: AbilityPolicy,
    info: &SpeciesInfo,
) {
    let mut stream = Xoroshiro128Plus::new(u64::from(seed));
    let ec = stream.next_u32();
    let pid = stream.next_u32();
    let block = roll_attribute_block(&mut stream, flawless, ability, info);
    apply(candidate, ec, pid, &block, info);
}

fn apply(candidate: &mut Candidate, ec: u32, pid: u32, block: &AttributeBlock, info: &SpeciesInfo) {
    candidate.ec = ec;
    candidate.pid = pid;
    candidate.ivs = block.ivs;
    candidate.ability_slot = block.ability_slot;
    candidate.ability = info.ability_in_slot(block.ability_slot);
    candidate.gender = block.gender;
    candidate.nature = block.nature;
    candidate.stat_nature = block.nature;
    candidate.height = block.height;
    candidate.weight = block.weight;
}

fn force_policy(candidate: &mut Candidate, policy: ShinyPolicy) {
    match policy {
        ShinyPolicy::NotRequested => {
            candidate.pid = shiny::unshiny_pid(candidate.pid, candidate.id32());
        }
        ShinyPolicy::Requested | ShinyPolicy::Star => {
            if !candidate.is_shiny() || candidate.shiny_xor() == 0 {
                candidate.pid =
                    shiny::forced_shiny_pid(candidate.tid16, candidate.sid16, candidate.pid, 1);
            }
        }
        ShinyPolicy::Square => {
            if candidate.shiny_xor() != 0 {
                candidate.pid =
                    shiny::forced_shiny_pid(candidate.tid16, candidate.sid16, candidate.pid, 0);
            }
        }
    }
}

/// Direct assignment for modern gift/trade contexts with no stream
/// correlation: requested attributes are copied, unset ones rolled freely
/// from the outer generator.
pub fn assign_direct<R: Rng>(
    candidate: &mut Candidate,
    ctx: &EncounterContext,
    criteria: &Criteria,
    info: &SpeciesInfo,
    rng: &mut R,
) -> SynthesisReport {
    for (slot, want) in candidate.ivs.iter_mut().zip(criteria.ivs.iter()) {
        *slot = if *want == IV_UNSET {
            (rng.next_u32() % (u32::from(IV_MAX) + 1)) as u8
        } else {
            *want as u8
        };
    }
    if let Some(ivs) = ctx.fixed_ivs {
        candidate.ivs = ivs;
    }
    if ctx.fixed_ec.is_none() {
        candidate.ec = rng.next_u32();
    }

    let fixed_pid = matches!(ctx.kind, EncounterKind::Trade { fixed_pid: Some(_) });
    if !fixed_pid {
        force_policy(candidate, criteria.shiny);
    }

    candidate.nature = criteria.nature.unwrap_or(Nature((rng.next_u32() % 25) as u8));
    candidate.stat_nature = candidate.nature;
    if ctx.fixed_gender.is_none() {
        candidate.gender = Gender::from_pid_and_ratio(candidate.pid, info.gender_ratio);
    }
    let slot = criteria.ability_slot.unwrap_or(match ctx.ability {
        AbilityPolicy::OnlySecond => AbilitySlot::Second,
        AbilityPolicy::OnlyHidden => AbilitySlot::Hidden,
        _ => AbilitySlot::First,
    });
    candidate.ability_slot = slot;
    candidate.ability = info.ability_in_slot(slot);

    SynthesisReport {
        seed_trials: 1,
        compromised: false,
    }
}
