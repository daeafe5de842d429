//! The legality oracle collaborator: ground truth for "is this record
//! indistinguishable from legitimate procedural generation". The engine
//! never second-guesses a verdict.

use crate::candidate::Candidate;
use crate::encounter::EncounterContext;
use crate::species::MoveId;
use smallvec::SmallVec;

/// Oracle answer for one candidate.
#[derive(Debug, Clone, Default)]
pub struct Verdict {
    pub valid: bool,
    /// Human-readable findings; surfaced on failed searches for
    /// diagnostics only.
    pub diagnostics: Vec<String>,
}

impl Verdict {
    #[must_use]
    pub const fn valid() -> Self {
        Self {
            valid: true,
            diagnostics: Vec::new(),
        }
    }

    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            diagnostics: vec![reason.into()],
        }
    }
}

pub trait LegalityOracle {
    fn validate(&self, candidate: &Candidate) -> Verdict;

    /// Moves the oracle would consider legal replacements for empty or
    /// stripped slots; used by the move-repair pipeline step.
    fn suggested_moves(
        &self,
        candidate: &Candidate,
        ctx: &EncounterContext,
    ) -> SmallVec<[MoveId; 4]> {
        let _ = candidate;
        ctx.legal_moves.iter().copied().take(4).collect()
    }
}
