//! Species identity types and the personal-data collaborator.

use crate::constants::{RATIO_MAGIC_FEMALE, RATIO_MAGIC_GENDERLESS, RATIO_MAGIC_MALE};
use crate::versions::VersionId;
use serde::{Deserialize, Serialize};

pub type SpeciesId = u16;
pub type FormId = u8;
pub type MoveId = u16;
pub type AbilityId = u16;
pub type ItemId = u16;
pub type BallId = u8;
pub type TypeTag = u8;

/// One of the 25 derived temperament values (identity value modulo 25).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nature(pub u8);

impl Nature {
    /// Neutral mint applied when a rolled nature is immutable but the
    /// requested stat spread needs a neutral temperament.
    pub const SERIOUS: Self = Self(12);

    #[must_use]
    pub const fn is_neutral(self) -> bool {
        self.0 % 6 == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Genderless,
}

impl Gender {
    /// Legacy derivation from the identity value's low byte.
    #[must_use]
    pub const fn from_pid_and_ratio(pid: u32, ratio: u8) -> Self {
        match ratio {
            RATIO_MAGIC_GENDERLESS => Self::Genderless,
            RATIO_MAGIC_FEMALE => Self::Female,
            RATIO_MAGIC_MALE => Self::Male,
            _ => {
                if ((pid & 0xFF) as u8) < ratio {
                    Self::Female
                } else {
                    Self::Male
                }
            }
        }
    }

    /// Modern derivation from a percentile roll against the same ratio.
    #[must_use]
    pub const fn from_roll_and_ratio(roll: u32, ratio: u8) -> Self {
        match ratio {
            RATIO_MAGIC_GENDERLESS => Self::Genderless,
            RATIO_MAGIC_FEMALE => Self::Female,
            RATIO_MAGIC_MALE => Self::Male,
            _ => {
                // roll is 1..=252 inclusive, matching the egg generator.
                if roll < ratio as u32 {
                    Self::Female
                } else {
                    Self::Male
                }
            }
        }
    }
}

/// Ability slot within a species entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilitySlot {
    First,
    Second,
    Hidden,
}

/// Per-species personal data for one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesInfo {
    pub species: SpeciesId,
    #[serde(default)]
    pub form: FormId,
    pub abilities: [AbilityId; 2],
    #[serde(default)]
    pub hidden_ability: AbilityId,
    pub gender_ratio: u8,
    #[serde(default = "default_friendship")]
    pub base_friendship: u8,
    #[serde(default = "default_form_count")]
    pub form_count: u8,
    /// Forms that only exist mid-battle and never produce encounters.
    #[serde(default)]
    pub battle_only_forms: Vec<FormId>,
    /// Shiny state can never be altered for these forms.
    #[serde(default)]
    pub shiny_locked: bool,
    /// Multi-outcome derived lineage this species belongs to, if any.
    #[serde(default)]
    pub lineage: Option<Lineage>,
    /// Egg pre-check: species whose gender is fixed by the species pair.
    #[serde(default)]
    pub egg_gender_lock: Option<Gender>,
    /// Egg pre-check: form decided by a dedicated gender-linked roll.
    #[serde(default)]
    pub gender_linked_form: bool,
    /// Item that must be held while in a non-base form.
    #[serde(default)]
    pub form_item: Option<ItemId>,
    /// Body color index for the ball-matching heuristic.
    #[serde(default)]
    pub body_color: u8,
}

const fn default_friendship() -> u8 {
    70
}

const fn default_form_count() -> u8 {
    1
}

impl SpeciesInfo {
    #[must_use]
    pub fn ability_in_slot(&self, slot: AbilitySlot) -> AbilityId {
        match slot {
            AbilitySlot::First => self.abilities[0],
            AbilitySlot::Second => self.abilities[1],
            AbilitySlot::Hidden => self.hidden_ability,
        }
    }

    /// Slot whose ability id matches, preferring non-hidden slots.
    #[must_use]
    pub fn slot_of_ability(&self, ability: AbilityId) -> Option<AbilitySlot> {
        if self.abilities[0] == ability {
            Some(AbilitySlot::First)
        } else if self.abilities[1] == ability {
            Some(AbilitySlot::Second)
        } else if self.hidden_ability == ability && self.hidden_ability != 0 {
            Some(AbilitySlot::Hidden)
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_battle_only_form(&self, form: FormId) -> bool {
        self.battle_only_forms.contains(&form)
    }
}

/// Membership in a multi-outcome derived lineage: a base encounter splits
/// into `group_count` outcome groups decided by the identity value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    pub base_species: SpeciesId,
    pub group_count: u8,
    /// Group this species resolves into, from the base's branch value.
    pub group: u8,
}

impl Lineage {
    /// Branch value derived from an identity value: the upper half is
    /// reduced modulo `5 * group_count`, then bucketed into groups of 5.
    #[must_use]
    pub const fn branch_of(self, pid: u32) -> u8 {
        (((pid >> 16) % (self.group_count as u32 * 5)) / 5) as u8
    }
}

/// Read-only personal-data collaborator queried by generation/version.
pub trait SpeciesData {
    /// Personal entry for a species/form in a generation, if it exists.
    fn info(&self, species: SpeciesId, form: FormId, generation: u8) -> Option<SpeciesInfo>;

    /// Whether the species/form pair is obtainable in a version at all.
    fn exists_in_version(&self, version: VersionId, species: SpeciesId, form: FormId) -> bool;

    fn form_count(&self, species: SpeciesId, generation: u8) -> u8 {
        self.info(species, 0, generation)
            .map_or(0, |info| info.form_count)
    }
}

/// Serde-backed table implementation, keyed by (species, form, generation).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeciesTable {
    pub entries: Vec<SpeciesTableEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesTableEntry {
    pub info: SpeciesInfo,
    /// Generations this entry covers (empty = all).
    #[serde(default)]
    pub generations: Vec<u8>,
    /// Versions the species/form is present in (empty = all).
    #[serde(default)]
    pub versions: Vec<VersionId>,
}

impl SpeciesTable {
    /// Create an empty table (useful for tests)
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a table from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into table entries.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn find(&self, species: SpeciesId, form: FormId, generation: u8) -> Option<&SpeciesTableEntry> {
        self.entries.iter().find(|entry| {
            entry.info.species == species
                && entry.info.form == form
                && (entry.generations.is_empty() || entry.generations.contains(&generation))
        })
    }
}

impl SpeciesData for SpeciesTable {
    fn info(&self, species: SpeciesId, form: FormId, generation: u8) -> Option<SpeciesInfo> {
        self.find(species, form, generation)
            .map(|entry| entry.info.clone())
    }

    fn exists_in_version(&self, version: VersionId, species: SpeciesId, form: FormId) -> bool {
        self.entries.iter().any(|entry| {
            entry.info.species == species
                && entry.info.form == form
                && (entry.versions.is_empty() || entry.versions.contains(&version))
        })
    }
}
