//! The immutable request: what the caller wants regenerated, plus the
//! parsed free-form override instructions.

use crate::constants::{IV_UNSET, STAT_COUNT};
use crate::species::{
    AbilityId, BallId, FormId, Gender, ItemId, MoveId, Nature, SpeciesId, TypeTag,
};
use crate::versions::VersionId;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

/// Requested shiny outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShinyPolicy {
    #[default]
    NotRequested,
    /// Shiny, tier unspecified.
    Requested,
    /// Shiny, star tier (distance 1-15).
    Star,
    /// Shiny, square tier (distance 0).
    Square,
}

impl ShinyPolicy {
    #[must_use]
    pub const fn wants_shiny(self) -> bool {
        !matches!(self, Self::NotRequested)
    }
}

/// Comparison operator carried by an override filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterCmp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// Closed property set an encounter filter may address. Hand-curated on
/// purpose: filters are not a general predicate language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterProp {
    Kind,
    LevelMin,
    ShinyClass,
    MetLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterFilter {
    pub prop: FilterProp,
    pub cmp: FilterCmp,
    pub value: String,
}

/// Trainer detail overrides parsed from `Key: Value` lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainerOverride {
    pub name: Option<String>,
    pub tid7: Option<u32>,
    pub sid7: Option<u32>,
    pub gender: Option<Gender>,
}

impl TrainerOverride {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.tid7.is_none() && self.sid7.is_none() && self.gender.is_none()
    }
}

/// Parsed override instructions attached to a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenOptions {
    pub trainer: TrainerOverride,
    pub encounter_filters: SmallVec<[EncounterFilter; 2]>,
    pub version_filters: SmallVec<[(FilterCmp, VersionId); 2]>,
    pub seed_filter: Option<u64>,
    /// Forced ball choice (0 = none).
    pub ball: BallId,
    /// Extra shiny tier request refining the template's boolean.
    pub shiny: Option<ShinyPolicy>,
    pub alpha: Option<bool>,
    /// Apply one random legal mark during post-processing.
    pub random_mark: bool,
}

/// A malformed override line. Reported as a message, never a search status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstructionError {
    #[error("unrecognized instruction line: {0}")]
    Unrecognized(String),
    #[error("unknown filter property: {0}")]
    UnknownProperty(String),
    #[error("invalid value for {key}: {value}")]
    BadValue { key: String, value: String },
}

/// The immutable search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub species: SpeciesId,
    #[serde(default)]
    pub form: FormId,
    pub level: u8,
    /// None = random / don't care.
    #[serde(default)]
    pub nature: Option<Nature>,
    #[serde(default)]
    pub shiny: ShinyPolicy,
    /// -1 = unconstrained.
    #[serde(default = "unset_ivs")]
    pub ivs: [i8; STAT_COUNT],
    #[serde(default)]
    pub evs: [u16; STAT_COUNT],
    /// 0 = empty slot.
    #[serde(default)]
    pub moves: [MoveId; 4],
    /// None = unspecified; any ability slot is acceptable.
    #[serde(default)]
    pub ability: Option<AbilityId>,
    #[serde(default)]
    pub held_item: ItemId,
    /// 0 = no preference.
    #[serde(default)]
    pub ball: BallId,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub secondary_type: Option<TypeTag>,
    #[serde(default)]
    pub overrides: RegenOptions,
}

const fn unset_ivs() -> [i8; STAT_COUNT] {
    [IV_UNSET; STAT_COUNT]
}

impl Template {
    #[must_use]
    pub fn new(species: SpeciesId, level: u8) -> Self {
        Self {
            species,
            form: 0,
            level,
            nature: None,
            shiny: ShinyPolicy::NotRequested,
            ivs: unset_ivs(),
            evs: [0; STAT_COUNT],
            moves: [0; 4],
            ability: None,
            held_item: 0,
            ball: 0,
            gender: None,
            secondary_type: None,
            overrides: RegenOptions::default(),
        }
    }

    /// Effective shiny request: the override tier refines the boolean.
    #[must_use]
    pub fn shiny_request(&self) -> ShinyPolicy {
        match self.overrides.shiny {
            Some(tier) if self.shiny.wants_shiny() || tier.wants_shiny() => tier,
            _ => self.shiny,
        }
    }

    #[must_use]
    pub fn requested_moves(&self) -> SmallVec<[MoveId; 4]> {
        self.moves.iter().copied().filter(|m| *m != 0).collect()
    }

    #[must_use]
    pub fn ev_sum(&self) -> u32 {
        self.evs.iter().map(|ev| u32::from(*ev)).sum()
    }

    /// Parse free-form override lines into `self.overrides`, collecting
    /// malformed lines as error values.
    pub fn apply_instructions(&mut self, lines: &[String]) -> Vec<InstructionError> {
        let (options, errors) = parse_instructions(lines);
        self.overrides = options;
        errors
    }
}

const FILTER_PREFIX: char = '~';

/// Parse override lines: `Key: Value` trainer/extra settings, `~`-prefixed
/// encounter and version filters, and `Seed:` filters.
#[must_use]
pub fn parse_instructions(lines: &[String]) -> (RegenOptions, Vec<InstructionError>) {
    let mut options = RegenOptions::default();
    let mut errors = Vec::new();

    for raw in lines {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix(FILTER_PREFIX) {
            if let Err(err) = parse_filter(rest, &mut options) {
                errors.push(err);
            }
            continue;
        }
        match line.split_once(':') {
            Some((key, value)) => {
                if let Err(err) = parse_setting(key.trim(), value.trim(), &mut options) {
                    errors.push(err);
                }
            }
            None => errors.push(InstructionError::Unrecognized(line.to_string())),
        }
    }
    (options, errors)
}

fn parse_setting(key: &str, value: &str, options: &mut RegenOptions) -> Result<(), InstructionError> {
    let bad = |key: &str, value: &str| InstructionError::BadValue {
        key: key.to_string(),
        value: value.to_string(),
    };
    match key {
        "OT" => options.trainer.name = Some(value.to_string()),
        "TID" => {
            options.trainer.tid7 = Some(value.parse().map_err(|_| bad(key, value))?);
        }
        "SID" => {
            options.trainer.sid7 = Some(value.parse().map_err(|_| bad(key, value))?);
        }
        "OTGender" => {
            options.trainer.gender = Some(match value {
                "Male" | "M" => Gender::Male,
                "Female" | "F" => Gender::Female,
                _ => return Err(bad(key, value)),
            });
        }
        "Seed" => {
            let digits = value.trim_start_matches("0x");
            options.seed_filter = Some(u64::from_str_radix(digits, 16).map_err(|_| bad(key, value))?);
        }
        "Ball" => {
            options.ball = value.parse().map_err(|_| bad(key, value))?;
        }
        "Shiny" => {
            options.shiny = Some(match value {
                "Star" => ShinyPolicy::Star,
                "Square" => ShinyPolicy::Square,
                "Yes" | "True" => ShinyPolicy::Requested,
                "No" | "False" => ShinyPolicy::NotRequested,
                _ => return Err(bad(key, value)),
            });
        }
        "Alpha" => {
            options.alpha = Some(match value {
                "Yes" | "True" => true,
                "No" | "False" => false,
                _ => return Err(bad(key, value)),
            });
        }
        "Mark" => {
            options.random_mark = value.eq_ignore_ascii_case("random");
            if !options.random_mark {
                return Err(bad(key, value));
            }
        }
        _ => return Err(InstructionError::Unrecognized(format!("{key}: {value}"))),
    }
    Ok(())
}

fn parse_filter(rest: &str, options: &mut RegenOptions) -> Result<(), InstructionError> {
    let (cmp, body) = split_comparer(rest)
        .ok_or_else(|| InstructionError::Unrecognized(format!("{FILTER_PREFIX}{rest}")))?;
    let (prop, value) = body
        .split_once('=')
        .ok_or_else(|| InstructionError::Unrecognized(format!("{FILTER_PREFIX}{rest}")))?;
    let value = value.trim();

    if prop == "Version" {
        let id: u8 = value.parse().map_err(|_| InstructionError::BadValue {
            key: String::from("Version"),
            value: value.to_string(),
        })?;
        options.version_filters.push((cmp, VersionId(id)));
        return Ok(());
    }

    let prop = match prop {
        "Kind" => FilterProp::Kind,
        "LevelMin" => FilterProp::LevelMin,
        "ShinyClass" => FilterProp::ShinyClass,
        "MetLocation" => FilterProp::MetLocation,
        other => return Err(InstructionError::UnknownProperty(other.to_string())),
    };
    options.encounter_filters.push(EncounterFilter {
        prop,
        cmp,
        value: value.to_string(),
    });
    Ok(())
}

fn split_comparer(body: &str) -> Option<(FilterCmp, &str)> {
    for (prefix, cmp) in [
        (">=", FilterCmp::Ge),
        ("<=", FilterCmp::Le),
        (">", FilterCmp::Gt),
        ("<", FilterCmp::Lt),
        ("=", FilterCmp::Eq),
        ("!", FilterCmp::Ne),
    ] {
        if let Some(rest) = body.strip_prefix(prefix) {
            return Some((cmp, rest));
        }
    }
    None
}
