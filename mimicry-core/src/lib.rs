//! Mimicry Engine
//!
//! Encounter search and attribute synthesis for regenerating game creature
//! records that pass an external legality oracle. The engine enumerates
//! candidate generation contexts lazily, rejects cheaply, synthesizes the
//! RNG-derived attributes with bit-exact emulators, finalizes the rest
//! deterministically, and returns the first oracle-valid match.

pub mod bulk;
pub mod candidate;
pub mod config;
pub mod constants;
pub mod criteria;
pub mod encounter;
pub mod filter;
pub mod oracle;
pub mod postprocess;
pub mod rng;
pub mod search;
pub mod shiny;
pub mod species;
pub mod synthesis;
pub mod template;
pub mod trainer;
pub mod versions;

// Re-export commonly used types
pub use candidate::{Candidate, MaterializeError};
pub use config::SearchConfig;
pub use criteria::Criteria;
pub use encounter::{
    AbilityPolicy, EncounterContext, EncounterKind, EncounterSource, EnumerationStub,
    LegacyMethod, ShinyClass, TypePool,
};
pub use oracle::{LegalityOracle, Verdict};
pub use search::{SearchController, SearchOutcome, SearchStats, SearchStatus};
pub use species::{
    AbilityId, AbilitySlot, BallId, FormId, Gender, ItemId, Lineage, MoveId, Nature, SpeciesData,
    SpeciesId, SpeciesInfo, SpeciesTable, SpeciesTableEntry, TypeTag,
};
pub use synthesis::{Strategy, SynthesisError, SynthesisReport};
pub use template::{
    EncounterFilter, FilterCmp, FilterProp, InstructionError, RegenOptions, ShinyPolicy, Template,
    TrainerOverride, parse_instructions,
};
pub use trainer::TrainerIdentity;
pub use versions::{OrderingRules, VersionCatalog, VersionId, VersionInfo};

use anyhow::Context;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Extra slack the outer race grants the self-polling inner loop before
/// declaring the worker lost.
const TIMEOUT_GRACE: Duration = Duration::from_millis(250);

/// Load the species table and version catalog from JSON documents.
///
/// # Errors
///
/// Returns an error when either document fails to parse.
pub fn load_data(
    species_json: &str,
    catalog_json: &str,
) -> Result<(SpeciesTable, VersionCatalog), anyhow::Error> {
    let table = SpeciesTable::from_json(species_json).context("parsing species table")?;
    let catalog = VersionCatalog::from_json(catalog_json).context("parsing version catalog")?;
    Ok((table, catalog))
}

/// Engine facade binding the four collaborators to a configuration.
///
/// Collaborators are shared behind `Arc` so timeout wrappers and bulk
/// fan-out can hand them to worker threads without copying the tables.
pub struct Regenerator<S, O, D>
where
    S: EncounterSource,
    O: LegalityOracle,
    D: SpeciesData,
{
    source: Arc<S>,
    oracle: Arc<O>,
    data: Arc<D>,
    catalog: Arc<VersionCatalog>,
    config: SearchConfig,
}

impl<S, O, D> Regenerator<S, O, D>
where
    S: EncounterSource,
    O: LegalityOracle,
    D: SpeciesData,
{
    pub fn new(source: S, oracle: O, data: D, catalog: VersionCatalog, config: SearchConfig) -> Self {
        Self {
            source: Arc::new(source),
            oracle: Arc::new(oracle),
            data: Arc::new(data),
            catalog: Arc::new(catalog),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Borrow a controller over the shared collaborators.
    #[must_use]
    pub fn controller(&self) -> SearchController<'_> {
        SearchController {
            source: &*self.source,
            oracle: &*self.oracle,
            data: &*self.data,
            catalog: &self.catalog,
            config: &self.config,
        }
    }

    /// Synchronous resolve with an entropy-seeded generator.
    pub fn resolve(&self, trainer: &TrainerIdentity, template: &Template) -> SearchOutcome {
        let mut rng = SmallRng::from_entropy();
        self.controller().resolve(trainer, template, &mut rng)
    }

    /// Synchronous resolve with a caller-supplied generator, for
    /// reproducible runs.
    pub fn resolve_seeded<R: rand::Rng>(
        &self,
        trainer: &TrainerIdentity,
        template: &Template,
        rng: &mut R,
    ) -> SearchOutcome {
        self.controller().resolve(trainer, template, rng)
    }
}

impl<S, O, D> Regenerator<S, O, D>
where
    S: EncounterSource + Send + Sync + 'static,
    O: LegalityOracle + Send + Sync + 'static,
    D: SpeciesData + Send + Sync + 'static,
{
    /// Run the search on a worker thread raced against the wall-clock
    /// budget, with a cooperative cancel signal.
    ///
    /// The inner loop self-polls the same budget once per encounter, so
    /// the outer race is a safety net; when it fires, the cancel flag is
    /// raised and the worker winds down at its next poll instead of being
    /// abandoned mid-flight.
    pub fn resolve_with_timeout(
        &self,
        trainer: &TrainerIdentity,
        template: &Template,
    ) -> SearchOutcome {
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        {
            let source = Arc::clone(&self.source);
            let oracle = Arc::clone(&self.oracle);
            let data = Arc::clone(&self.data);
            let catalog = Arc::clone(&self.catalog);
            let config = self.config.clone();
            let cancel = Arc::clone(&cancel);
            let trainer = trainer.clone();
            let template = template.clone();
            thread::spawn(move || {
                let controller = SearchController {
                    source: &*source,
                    oracle: &*oracle,
                    data: &*data,
                    catalog: &catalog,
                    config: &config,
                };
                let mut rng = SmallRng::from_entropy();
                let outcome =
                    controller.resolve_cancellable(&trainer, &template, &mut rng, &cancel);
                // The receiver may already have given up; that is fine.
                let _ = tx.send(outcome);
            });
        }

        match rx.recv_timeout(self.config.timeout() + TIMEOUT_GRACE) {
            Ok(outcome) => outcome,
            Err(_) => {
                cancel.store(true, Ordering::Relaxed);
                SearchOutcome {
                    status: SearchStatus::Timeout,
                    candidate: Candidate::from_template(template, trainer),
                    stats: SearchStats::default(),
                }
            }
        }
    }

    /// Awaitable variant of [`Self::resolve_with_timeout`].
    #[cfg(feature = "async")]
    pub async fn resolve_with_timeout_async(
        &self,
        trainer: &TrainerIdentity,
        template: &Template,
    ) -> SearchOutcome {
        let cancel = Arc::new(AtomicBool::new(false));
        let handle = {
            let source = Arc::clone(&self.source);
            let oracle = Arc::clone(&self.oracle);
            let data = Arc::clone(&self.data);
            let catalog = Arc::clone(&self.catalog);
            let config = self.config.clone();
            let cancel = Arc::clone(&cancel);
            let trainer = trainer.clone();
            let template = template.clone();
            tokio::task::spawn_blocking(move || {
                let controller = SearchController {
                    source: &*source,
                    oracle: &*oracle,
                    data: &*data,
                    catalog: &catalog,
                    config: &config,
                };
                let mut rng = SmallRng::from_entropy();
                controller.resolve_cancellable(&trainer, &template, &mut rng, &cancel)
            })
        };

        let budget = self.config.timeout() + TIMEOUT_GRACE;
        match tokio::time::timeout(budget, handle).await {
            Ok(Ok(outcome)) => outcome,
            _ => {
                cancel.store(true, Ordering::Relaxed);
                SearchOutcome {
                    status: SearchStatus::Timeout,
                    candidate: Candidate::from_template(template, trainer),
                    stats: SearchStats::default(),
                }
            }
        }
    }
}
