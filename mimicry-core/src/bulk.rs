//! Bulk roster generation: one independent search per template, fanned
//! across a worker pool.

use crate::candidate::Candidate;
use crate::encounter::EncounterSource;
use crate::oracle::LegalityOracle;
use crate::search::{SearchController, SearchStatus};
use crate::species::SpeciesData;
use crate::template::Template;
use crate::trainer::TrainerIdentity;
use crate::Regenerator;
use log::debug;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

impl<S, O, D> Regenerator<S, O, D>
where
    S: EncounterSource + Send + Sync,
    O: LegalityOracle + Send + Sync,
    D: SpeciesData + Send + Sync,
{
    /// Generate one candidate per template. Failed and timed-out units are
    /// dropped; the survivors come back sorted by species.
    ///
    /// `progress` is a feedback-only counter bumped once per finished unit
    /// with relaxed ordering: readers may observe it lagging, which is
    /// acceptable for UI display.
    pub fn generate_roster(
        &self,
        trainer: &TrainerIdentity,
        templates: &[Template],
        progress: &AtomicUsize,
    ) -> Vec<Candidate> {
        let workers = thread::available_parallelism().map_or(1, |n| n.get()).min(
            templates.len().max(1),
        );
        let chunk_size = templates.len().div_ceil(workers.max(1)).max(1);

        let mut generated: Vec<Candidate> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for chunk in templates.chunks(chunk_size) {
                handles.push(scope.spawn(move || {
                    let controller: SearchController<'_> = self.controller();
                    let mut rng = SmallRng::from_entropy();
                    let mut local = Vec::new();
                    for template in chunk {
                        let outcome = controller.resolve(trainer, template, &mut rng);
                        if outcome.status == SearchStatus::Regenerated {
                            local.push(outcome.candidate);
                        } else {
                            debug!(
                                "roster unit species {} ended {:?}",
                                template.species, outcome.status
                            );
                        }
                        progress.fetch_add(1, Ordering::Relaxed);
                    }
                    local
                }));
            }
            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap_or_default())
                .collect()
        });

        generated.sort_by_key(|candidate| (candidate.species, candidate.form));
        generated
    }
}
