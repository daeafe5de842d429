//! The search controller: enumerate, filter, synthesize, post-process,
//! validate. First oracle-valid match wins.

use crate::candidate::{Candidate, MaterializeError};
use crate::config::SearchConfig;
use crate::criteria::Criteria;
use crate::encounter::{EncounterSource, EnumerationStub};
use crate::filter::{self, FilterRequest};
use crate::oracle::LegalityOracle;
use crate::postprocess::{self, PipelineRequest};
use crate::species::{AbilitySlot, FormId, SpeciesData, SpeciesInfo};
use crate::synthesis::{self, SynthesisError};
use crate::template::Template;
use crate::trainer::TrainerIdentity;
use crate::versions::{OrderingRules, VersionCatalog};
use log::{debug, trace};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Terminal status of one search. All states are terminal once reached;
/// there are no retries across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// Oracle-valid candidate matching the requested species.
    Regenerated,
    /// Stream exhausted without a valid match.
    Failed,
    /// Wall-clock budget exceeded mid-loop.
    Timeout,
    /// Stale-data precondition tripped before any search began.
    VersionMismatch,
}

/// Search diagnostics. Lost progress-counter updates aside, these are the
/// only observable side channel a search produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub contexts_seen: u32,
    pub contexts_filtered: u32,
    pub synthesis_attempts: u32,
    pub oracle_calls: u32,
    pub elapsed: Duration,
}

/// Exactly one candidate per call. On `Failed` the candidate is the last
/// attempted (invalid) one, surfaced for diagnostics only — callers must
/// never treat it as usable output. On `Timeout` and `VersionMismatch` it
/// mirrors the untouched template.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub status: SearchStatus,
    pub candidate: Candidate,
    pub stats: SearchStats,
}

#[derive(Debug, Error)]
enum AttemptError {
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

/// Borrowed view over the collaborators one search needs.
pub struct SearchController<'a> {
    pub source: &'a dyn EncounterSource,
    pub oracle: &'a dyn LegalityOracle,
    pub data: &'a dyn SpeciesData,
    pub catalog: &'a VersionCatalog,
    pub config: &'a SearchConfig,
}

impl SearchController<'_> {
    /// Resolve a template into a concrete candidate.
    pub fn resolve<R: Rng>(
        &self,
        trainer: &TrainerIdentity,
        template: &Template,
        rng: &mut R,
    ) -> SearchOutcome {
        static NEVER: AtomicBool = AtomicBool::new(false);
        self.resolve_cancellable(trainer, template, rng, &NEVER)
    }

    /// Resolve with an external cancel signal. Both the signal and the
    /// wall-clock budget are polled once per encounter iteration —
    /// deliberately coarse, never mid-synthesis.
    pub fn resolve_cancellable<R: Rng>(
        &self,
        trainer: &TrainerIdentity,
        template: &Template,
        rng: &mut R,
        cancel: &AtomicBool,
    ) -> SearchOutcome {
        let started = Instant::now();
        let mut stats = SearchStats::default();

        if self.is_data_stale() {
            debug!("encounter data revision mismatch; refusing to search");
            return outcome(
                SearchStatus::VersionMismatch,
                Candidate::from_template(template, trainer),
                stats,
                started,
            );
        }

        let trainer = self.effective_trainer(trainer, template);
        let info = self.species_info_or_default(template, trainer.generation);
        let base_criteria = Criteria::from_template(template, &info);
        let hidden_requested = base_criteria.ability_slot == Some(AbilitySlot::Hidden);

        let mut versions = self.catalog.ordered_search_list(&OrderingRules {
            destination: trainer.version,
            priority: self.config.prioritize_version,
            native_only: self.config.native_only,
            hidden_ability_requested: hidden_requested,
        });
        for (cmp, target) in &template.overrides.version_filters {
            self.catalog.apply_filter(&mut versions, *cmp, *target);
        }

        let filter_req = FilterRequest {
            template,
            config: self.config,
            dest_version: trainer.version,
            dest_generation: trainer.generation,
            relaxed_ev_cap: self.catalog.has_relaxed_ev_cap(trainer.version),
            hidden_ability_requested: hidden_requested,
        };
        let moves = template.requested_moves();
        let deadline = started + self.config.timeout();
        let mut last: Option<Candidate> = None;

        for form in self.form_order(template, trainer.generation) {
            let stub = EnumerationStub {
                species: template.species,
                form,
            };
            for ctx in self.source.enumerate(stub, &moves, &versions) {
                // One poll per encounter; a long synthesis in between is
                // the accepted trade-off.
                if Instant::now() >= deadline || cancel.load(Ordering::Relaxed) {
                    debug!("search budget exhausted after {:?}", started.elapsed());
                    return outcome(
                        SearchStatus::Timeout,
                        Candidate::from_template(template, &trainer),
                        stats,
                        started,
                    );
                }
                stats.contexts_seen += 1;

                if !template
                    .overrides
                    .encounter_filters
                    .iter()
                    .all(|f| ctx.matches_filter(f))
                {
                    stats.contexts_filtered += 1;
                    continue;
                }
                if template.overrides.seed_filter.is_some() && !ctx.kind.supports_fixed_seed() {
                    stats.contexts_filtered += 1;
                    continue;
                }
                if !filter::accepts(&filter_req, &ctx, self.data) {
                    stats.contexts_filtered += 1;
                    continue;
                }

                let criteria = base_criteria.revised_for(&ctx);
                stats.synthesis_attempts += 1;
                let candidate = match self.attempt(template, &trainer, &ctx, &criteria, rng) {
                    Ok(candidate) => candidate,
                    Err(err) => {
                        // Ill-formed contexts reject one candidate, never
                        // the whole search.
                        debug!("candidate rejected: {err}");
                        continue;
                    }
                };

                stats.oracle_calls += 1;
                let verdict = self.oracle.validate(&candidate);
                if verdict.valid && candidate.species == template.species {
                    return outcome(SearchStatus::Regenerated, candidate, stats, started);
                }
                trace!(
                    "candidate for context {} invalid: {:?}",
                    ctx.kind.name(),
                    verdict.diagnostics
                );
                last = Some(candidate);
            }
        }

        let candidate = last.unwrap_or_else(|| Candidate::from_template(template, &trainer));
        outcome(SearchStatus::Failed, candidate, stats, started)
    }

    fn attempt<R: Rng>(
        &self,
        template: &Template,
        trainer: &TrainerIdentity,
        ctx: &crate::encounter::EncounterContext,
        criteria: &Criteria,
        rng: &mut R,
    ) -> Result<Candidate, AttemptError> {
        let mut candidate = Candidate::materialize(ctx, template, trainer, criteria, rng)?;
        let report = synthesis::synthesize(
            &mut candidate,
            ctx,
            criteria,
            self.data,
            rng,
            template.overrides.seed_filter,
        )?;
        if report.compromised {
            trace!(
                "synthesis compromised after {} trials for context {}",
                report.seed_trials,
                ctx.kind.name()
            );
        }

        let info = self
            .data
            .info(ctx.species, ctx.form, ctx.generation)
            .or_else(|| self.data.info(template.species, template.form, ctx.generation))
            .unwrap_or_else(|| default_info(template));
        let pipeline = PipelineRequest {
            template,
            ctx,
            trainer,
            config: self.config,
            criteria,
        };
        postprocess::finalize(&mut candidate, &pipeline, &info, self.oracle, rng);
        Ok(candidate)
    }

    fn is_data_stale(&self) -> bool {
        if self.config.dev_mode {
            return false;
        }
        match &self.config.expected_data_version {
            Some(expected) => expected != self.source.data_version(),
            None => false,
        }
    }

    /// Trainer overrides from the instruction list, honored only when the
    /// configuration allows them.
    fn effective_trainer(&self, trainer: &TrainerIdentity, template: &Template) -> TrainerIdentity {
        let overrides = &template.overrides.trainer;
        if !self.config.allow_trainer_override || overrides.is_empty() {
            return trainer.clone();
        }
        let mut resolved = trainer.clone();
        if let Some(name) = &overrides.name {
            resolved.name = name.clone();
        }
        if let Some(gender) = overrides.gender {
            resolved.gender = gender;
        }
        match (overrides.tid7, overrides.sid7) {
            (None, None) => {}
            (tid, sid) => {
                let tid = tid.unwrap_or(0);
                let sid = sid.unwrap_or(0);
                if resolved.generation >= 7 {
                    let (tid16, sid16) = TrainerIdentity::repack_seven_digit(tid, sid);
                    resolved.tid16 = tid16;
                    resolved.sid16 = sid16;
                } else {
                    resolved.tid16 = (tid & 0xFFFF) as u16;
                    resolved.sid16 = (sid & 0xFFFF) as u16;
                }
            }
        }
        resolved
    }

    fn species_info_or_default(&self, template: &Template, generation: u8) -> SpeciesInfo {
        self.data
            .info(template.species, template.form, generation)
            .or_else(|| self.data.info(template.species, 0, generation))
            .unwrap_or_else(|| default_info(template))
    }

    /// Requested form first, then every other obtainable form.
    fn form_order(&self, template: &Template, generation: u8) -> Vec<FormId> {
        let count = self.data.form_count(template.species, generation).max(1);
        let base_info = self.data.info(template.species, 0, generation);
        let mut order = vec![template.form];
        for form in 0..count {
            if form == template.form {
                continue;
            }
            let battle_only = base_info
                .as_ref()
                .is_some_and(|info| info.is_battle_only_form(form));
            if !battle_only {
                order.push(form);
            }
        }
        order
    }
}

fn default_info(template: &Template) -> SpeciesInfo {
    SpeciesInfo {
        species: template.species,
        form: template.form,
        abilities: [0, 0],
        hidden_ability: 0,
        gender_ratio: crate::constants::RATIO_MAGIC_GENDERLESS,
        base_friendship: 70,
        form_count: 1,
        battle_only_forms: vec![],
        shiny_locked: false,
        lineage: None,
        egg_gender_lock: None,
        gender_linked_form: false,
        form_item: None,
        body_color: 0,
    }
}

fn outcome(
    status: SearchStatus,
    candidate: Candidate,
    mut stats: SearchStats,
    started: Instant,
) -> SearchOutcome {
    stats.elapsed = started.elapsed();
    SearchOutcome {
        status,
        candidate,
        stats,
    }
}
