//! Version catalog and deterministic search-order rules.

use crate::template::FilterCmp;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Opaque version identifier; semantics live in the catalog.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct VersionId(pub u8);

/// One catalog entry. Entries with `members` are combined pseudo-versions
/// (a paired release sharing one regional dex) that expand to their halves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub id: VersionId,
    pub generation: u8,
    /// The other half of a paired release, if any.
    #[serde(default)]
    pub pair: Option<VersionId>,
    /// Destinations with a relaxed aggregate EV cap skip the sum ceiling.
    #[serde(default)]
    pub relaxed_ev_cap: bool,
    /// Non-empty marks a combined pseudo-entry.
    #[serde(default)]
    pub members: Vec<VersionId>,
}

/// Read-only version catalog collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionCatalog {
    pub entries: Vec<VersionInfo>,
}

pub type VersionList = SmallVec<[VersionId; 8]>;

impl VersionCatalog {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a catalog from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into catalog entries.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn get(&self, id: VersionId) -> Option<&VersionInfo> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    #[must_use]
    pub fn generation_of(&self, id: VersionId) -> u8 {
        self.get(id).map_or(0, |entry| entry.generation)
    }

    #[must_use]
    pub fn has_relaxed_ev_cap(&self, id: VersionId) -> bool {
        self.get(id).is_some_and(|entry| entry.relaxed_ev_cap)
    }

    /// Expand a combined pseudo-version into its ordered halves; concrete
    /// versions expand to themselves.
    #[must_use]
    pub fn expand(&self, id: VersionId) -> VersionList {
        match self.get(id) {
            Some(entry) if !entry.members.is_empty() => entry.members.iter().copied().collect(),
            _ => SmallVec::from_slice(&[id]),
        }
    }

    /// Destination plus its paired half, for native-only searches.
    #[must_use]
    pub fn paired_with(&self, id: VersionId) -> VersionList {
        let mut list: VersionList = SmallVec::from_slice(&[id]);
        if let Some(pair) = self.get(id).and_then(|entry| entry.pair) {
            list.push(pair);
        }
        list
    }

    /// Compute the ordered version list for one search.
    ///
    /// Destination (or the explicit priority version) first, the rest in
    /// descending generation order; paired halves travel adjacently; a
    /// hidden-ability request drops the capsule-less legacy generations
    /// when the destination predates the unlock generation.
    #[must_use]
    pub fn ordered_search_list(&self, rules: &OrderingRules) -> VersionList {
        let dest_gen = self.generation_of(rules.destination);
        if rules.native_only {
            return self.paired_with(rules.destination);
        }

        let mut list: VersionList = self
            .entries
            .iter()
            .filter(|entry| entry.members.is_empty())
            .filter(|entry| entry.generation <= dest_gen)
            .map(|entry| entry.id)
            .collect();
        // Stable: catalog order breaks ties within one generation.
        list.sort_by_key(|id| std::cmp::Reverse(self.generation_of(*id)));

        let focus = rules.priority.unwrap_or(rules.destination);
        promote(&mut list, &self.expand(focus));
        self.keep_pairs_adjacent(&mut list);

        if rules.hidden_ability_requested && dest_gen < crate::constants::ABILITY_UNLOCK_GENERATION
        {
            list.retain(|id| {
                let generation = self.generation_of(*id);
                generation != 3 && generation != 4
            });
        }
        list
    }

    /// Restrict a list with a version filter from the template overrides.
    pub fn apply_filter(&self, list: &mut VersionList, cmp: FilterCmp, target: VersionId) {
        let targets = self.expand(target);
        list.retain(|id| {
            let matched = targets.contains(id);
            match cmp {
                FilterCmp::Eq => matched,
                FilterCmp::Ne => !matched,
                FilterCmp::Gt => targets.iter().any(|t| id.0 > t.0),
                FilterCmp::Ge => targets.iter().any(|t| id.0 >= t.0),
                FilterCmp::Lt => targets.iter().any(|t| id.0 < t.0),
                FilterCmp::Le => targets.iter().any(|t| id.0 <= t.0),
            }
        });
    }

    fn keep_pairs_adjacent(&self, list: &mut VersionList) {
        let snapshot: Vec<VersionId> = list.to_vec();
        for id in snapshot {
            let Some(pair) = self.get(id).and_then(|entry| entry.pair) else {
                continue;
            };
            let Some(pos) = list.iter().position(|v| *v == id) else {
                continue;
            };
            if let Some(pair_pos) = list.iter().position(|v| *v == pair)
                && pair_pos > pos + 1
            {
                list.remove(pair_pos);
                list.insert(pos + 1, pair);
            }
        }
    }
}

/// Inputs to `ordered_search_list`, threaded from the search configuration.
#[derive(Debug, Clone, Copy)]
pub struct OrderingRules {
    pub destination: VersionId,
    pub priority: Option<VersionId>,
    pub native_only: bool,
    pub hidden_ability_requested: bool,
}

/// Move every id in `front` to the head of the list, preserving their
/// relative order and the order of everything else.
fn promote(list: &mut VersionList, front: &[VersionId]) {
    let mut matched = 0;
    for target in front {
        if let Some(pos) = list.iter().position(|id| id == target)
            && pos >= matched
        {
            let id = list.remove(pos);
            list.insert(matched, id);
            matched += 1;
        }
    }
}
