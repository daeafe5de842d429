//! The working entity record built up by one search attempt.
//!
//! A candidate is owned by exactly one attempt: materialized fresh from a
//! context, mutated through synthesis and post-processing, then either
//! returned or discarded. No instance is ever reused across attempts.

use crate::constants::{LINEAGE_REROLL_CEILING, STAT_COUNT};
use crate::criteria::Criteria;
use crate::encounter::{EncounterContext, EncounterKind};
use crate::shiny;
use crate::species::{
    AbilityId, AbilitySlot, BallId, FormId, Gender, ItemId, MoveId, Nature, SpeciesId, TypeTag,
};
use crate::template::Template;
use crate::trainer::TrainerIdentity;
use crate::versions::VersionId;
use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

/// Error while turning a context into a workable candidate. Always treated
/// as rejection of the one candidate, never as a search failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaterializeError {
    #[error("lineage branch never landed on group {want} within {tries} rerolls")]
    LineageExhausted { want: u8, tries: u32 },
    #[error("context level range {min}-{max} cannot contain the request")]
    LevelRange { min: u8, max: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub species: SpeciesId,
    pub form: FormId,
    pub level: u8,
    pub met_level: u8,
    pub met_location: u16,
    pub version: VersionId,
    pub generation: u8,
    /// Seed value (encryption-constant equivalent).
    pub ec: u32,
    /// Identity value (PID equivalent).
    pub pid: u32,
    pub ivs: [u8; STAT_COUNT],
    pub evs: [u16; STAT_COUNT],
    pub nature: Nature,
    /// Displayed temperament after a mint; equals `nature` until minted.
    pub stat_nature: Nature,
    pub ability: AbilityId,
    pub ability_slot: AbilitySlot,
    pub gender: Gender,
    pub tid16: u16,
    pub sid16: u16,
    pub ot_name: String,
    pub ot_gender: Gender,
    /// 0 = with the original trainer, 1 = traded.
    pub handler: u8,
    pub handler_name: String,
    pub handler_gender: Gender,
    pub friendship: u8,
    pub handler_friendship: u8,
    pub moves: [MoveId; 4],
    pub relearn_moves: [MoveId; 4],
    pub held_item: ItemId,
    pub ball: BallId,
    pub height: u8,
    pub weight: u8,
    pub scale: u8,
    pub hyper_trained: [bool; STAT_COUNT],
    /// Per-stat display markings (0 = none, 1 = plain, 2 = accented).
    pub markings: [u8; STAT_COUNT],
    pub marks: SmallVec<[u8; 2]>,
    pub ribbons: SmallVec<[u8; 2]>,
    pub battle_ready: bool,
    pub secondary_type: Option<TypeTag>,
    pub is_alpha: bool,
    pub untradeable: bool,
}

impl Candidate {
    /// Placeholder candidate mirroring the untouched template; used when a
    /// search times out or fails before any attempt is made.
    #[must_use]
    pub fn from_template(template: &Template, trainer: &TrainerIdentity) -> Self {
        Self {
            species: template.species,
            form: template.form,
            level: template.level,
            met_level: template.level,
            met_location: 0,
            version: trainer.version,
            generation: trainer.generation,
            ec: 0,
            pid: 0,
            ivs: [0; STAT_COUNT],
            evs: template.evs,
            nature: template.nature.unwrap_or(Nature(0)),
            stat_nature: template.nature.unwrap_or(Nature(0)),
            ability: template.ability.unwrap_or(0),
            ability_slot: AbilitySlot::First,
            gender: template.gender.unwrap_or(Gender::Genderless),
            tid16: trainer.tid16,
            sid16: trainer.sid16,
            ot_name: trainer.name.clone(),
            ot_gender: trainer.gender,
            handler: 0,
            handler_name: String::new(),
            handler_gender: trainer.gender,
            friendship: 0,
            handler_friendship: 0,
            moves: template.moves,
            relearn_moves: [0; 4],
            held_item: template.held_item,
            ball: template.ball,
            height: 0,
            weight: 0,
            scale: 0,
            hyper_trained: [false; STAT_COUNT],
            markings: [0; STAT_COUNT],
            marks: SmallVec::new(),
            ribbons: SmallVec::new(),
            battle_ready: false,
            secondary_type: template.secondary_type,
            is_alpha: false,
            untradeable: false,
        }
    }

    /// Materialize a fresh candidate from an encounter context.
    ///
    /// The context's pre-fixed fields are honored; a provisional identity
    /// value is rolled for kinds that do not derive it during synthesis.
    /// When the context's base species branches into a multi-outcome
    /// lineage, the roll is rejection-sampled (bounded) until the derived
    /// branch lands in the requested group.
    ///
    /// # Errors
    ///
    /// Returns an error if the level range cannot hold the request or the
    /// lineage reroll ceiling is exhausted.
    pub fn materialize<R: Rng>(
        ctx: &EncounterContext,
        template: &Template,
        trainer: &TrainerIdentity,
        criteria: &Criteria,
        rng: &mut R,
    ) -> Result<Self, MaterializeError> {
        if template.level < ctx.effective_level_min() {
            return Err(MaterializeError::LevelRange {
                min: ctx.level_min,
                max: ctx.level_max,
            });
        }

        let fixed_pid = match ctx.kind {
            EncounterKind::Trade { fixed_pid } => fixed_pid,
            _ => None,
        };
        let pid = match fixed_pid {
            Some(pid) => pid,
            None => roll_branch_pid(criteria, rng)?,
        };

        let mut candidate = Self::from_template(template, trainer);
        candidate.species = ctx.species;
        candidate.form = ctx.form;
        candidate.version = ctx.version;
        candidate.generation = ctx.generation;
        candidate.met_level = ctx.level_min;
        candidate.met_location = ctx.met_location;
        candidate.pid = pid;
        candidate.ec = ctx.fixed_ec.unwrap_or(pid);
        candidate.is_alpha = ctx.is_alpha;
        candidate.untradeable = ctx.untradeable;
        if let Some(ivs) = ctx.fixed_ivs {
            candidate.ivs = ivs;
        }
        if let Some(gender) = ctx.fixed_gender {
            candidate.gender = gender;
        }
        Ok(candidate)
    }

    #[must_use]
    pub const fn id32(&self) -> u32 {
        ((self.sid16 as u32) << 16) | self.tid16 as u32
    }

    #[must_use]
    pub const fn shiny_xor(&self) -> u16 {
        shiny::shiny_xor(self.pid, self.id32())
    }

    #[must_use]
    pub const fn is_shiny(&self) -> bool {
        shiny::is_shiny(self.pid, self.id32())
    }

    #[must_use]
    pub fn has_move(&self, id: MoveId) -> bool {
        self.moves.contains(&id)
    }
}

fn roll_branch_pid<R: Rng>(criteria: &Criteria, rng: &mut R) -> Result<u32, MaterializeError> {
    let Some(lineage) = criteria.target_branch else {
        return Ok(rng.next_u32());
    };
    for _ in 0..LINEAGE_REROLL_CEILING {
        let pid = rng.next_u32();
        if lineage.branch_of(pid) == lineage.group {
            return Ok(pid);
        }
    }
    Err(MaterializeError::LineageExhausted {
        want: lineage.group,
        tries: LINEAGE_REROLL_CEILING,
    })
}
