//! Attribute synthesis: generation-keyed deterministic RNG emulation.
//!
//! Each encounter category maps to exactly one strategy through a closed
//! lookup on `EncounterKind`. Strategies fill the RNG-derived attributes
//! (seed value, identity value, IVs, nature, ability slot, gender, size
//! bytes) bit-exactly in the originating game's internal call order.

mod egg;
mod legacy;
mod modern;
mod overworld;
mod raid;

pub use modern::AttributeBlock;

use crate::candidate::Candidate;
use crate::criteria::Criteria;
use crate::encounter::{EncounterContext, EncounterKind};
use crate::species::{SpeciesData, SpeciesInfo};
use rand::Rng;
use thiserror::Error;

/// Error while synthesizing one candidate. Treated by the controller as a
/// rejection of that candidate, never a search abort.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    #[error("no species entry for {species} form {form} in generation {generation}")]
    MissingSpeciesInfo {
        species: u16,
        form: u8,
        generation: u8,
    },
    #[error("fixed seed supplied for a context that cannot replay one")]
    FixedSeedUnsupported,
}

/// Which strategy a context resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    LegacySeedSearch,
    ModernWild,
    OverworldCorrelated,
    RaidSeedSearch,
    EggInheritance,
    /// Modern gift/trade contexts with no stream correlation: requested
    /// attributes are assigned directly, unset ones rolled freely.
    DirectAssignment,
    /// All relevant attributes are pre-fixed; perform no mutation.
    Predetermined,
}

/// Closed strategy-lookup table.
#[must_use]
pub fn strategy_for(ctx: &EncounterContext) -> Strategy {
    if is_predetermined(ctx) {
        return Strategy::Predetermined;
    }
    match ctx.kind {
        EncounterKind::LegacyStatic { .. }
        | EncounterKind::LegacyWild { .. }
        | EncounterKind::LegacyGift { .. } => Strategy::LegacySeedSearch,
        EncounterKind::ModernWild { correlated: true, .. } => Strategy::OverworldCorrelated,
        EncounterKind::ModernWild { .. } => Strategy::ModernWild,
        EncounterKind::Raid { .. } => Strategy::RaidSeedSearch,
        EncounterKind::Egg => Strategy::EggInheritance,
        EncounterKind::Trade { .. } | EncounterKind::Gift => Strategy::DirectAssignment,
    }
}

/// Whether the context declares every RNG-derived attribute as already
/// determined. This is THE single authority consulted both before
/// synthesis and by the post-processing steps that would otherwise
/// re-derive seed values or sizes; evaluating it differently in two places
/// would double-synthesize.
#[must_use]
pub fn is_predetermined(ctx: &EncounterContext) -> bool {
    let identity_fixed = match ctx.kind {
        EncounterKind::Trade { fixed_pid } => fixed_pid.is_some(),
        _ => ctx.fixed_ec.is_some(),
    };
    ctx.fixed_ivs.is_some() && identity_fixed
}

/// Outcome report from one synthesis run, consumed by search statistics
/// and the legacy trial-bound tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SynthesisReport {
    pub seed_trials: u32,
    /// A constraint was relaxed to terminate (legacy nature compromise,
    /// bounded-retry degradation).
    pub compromised: bool,
}

/// Fill every unset RNG-derived attribute of `candidate`.
///
/// # Errors
///
/// Returns an error when the personal table lacks the context's species or
/// a fixed seed is supplied for a kind that cannot replay one. Both are
/// candidate-level rejections.
pub fn synthesize<R: Rng>(
    candidate: &mut Candidate,
    ctx: &EncounterContext,
    criteria: &Criteria,
    data: &dyn SpeciesData,
    rng: &mut R,
    fixed_seed: Option<u64>,
) -> Result<SynthesisReport, SynthesisError> {
    let strategy = strategy_for(ctx);
    if fixed_seed.is_some() && !ctx.kind.supports_fixed_seed() {
        return Err(SynthesisError::FixedSeedUnsupported);
    }
    if strategy == Strategy::Predetermined {
        return Ok(SynthesisReport::default());
    }

    let info = species_info(ctx, data)?;
    let report = match strategy {
        Strategy::LegacySeedSearch => legacy::search(candidate, ctx, criteria, &info, rng),
        Strategy::ModernWild => modern::find_wild(candidate, ctx, criteria, &info, rng, fixed_seed),
        Strategy::OverworldCorrelated => overworld::search(candidate, ctx, criteria, &info, rng),
        Strategy::RaidSeedSearch => raid::search(candidate, ctx, criteria, &info, rng, fixed_seed),
        Strategy::EggInheritance => egg::inherit(candidate, ctx, criteria, &info, rng),
        Strategy::DirectAssignment => modern::assign_direct(candidate, ctx, criteria, &info, rng),
        Strategy::Predetermined => SynthesisReport::default(),
    };
    Ok(report)
}

fn species_info(
    ctx: &EncounterContext,
    data: &dyn SpeciesData,
) -> Result<SpeciesInfo, SynthesisError> {
    data.info(ctx.species, ctx.form, ctx.generation).ok_or(
        SynthesisError::MissingSpeciesInfo {
            species: ctx.species,
            form: ctx.form,
            generation: ctx.generation,
        },
    )
}
