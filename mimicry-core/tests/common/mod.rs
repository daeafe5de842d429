//! Shared fixtures: a small version catalog, a species table, a scripted
//! encounter source, and a consistency oracle standing in for the real
//! legality engine.
#![allow(dead_code)]

use mimicry_core::{
    AbilityPolicy, Candidate, EncounterContext, EncounterKind, EncounterSource, EnumerationStub,
    LegacyMethod, LegalityOracle, MoveId, ShinyClass, SpeciesTable, TrainerIdentity, Verdict,
    VersionCatalog, VersionId,
};
use smallvec::SmallVec;

pub const V_LEGACY_A: VersionId = VersionId(10);
pub const V_LEGACY_B: VersionId = VersionId(11);
pub const V_MODERN: VersionId = VersionId(30);

pub const PHANTOM: u16 = 91;
pub const COMMON: u16 = 7;
pub const ABSENT: u16 = 999;

pub const PHANTOM_ABILITY: u16 = 123;
pub const PHANTOM_MOVES: [MoveId; 4] = [95, 185, 171, 104];

pub fn catalog() -> VersionCatalog {
    VersionCatalog::from_json(
        r#"{
        "entries": [
            { "id": 10, "generation": 4, "pair": 11 },
            { "id": 11, "generation": 4, "pair": 10 },
            { "id": 30, "generation": 8 }
        ]
    }"#,
    )
    .expect("fixture catalog parses")
}

pub fn species_table() -> SpeciesTable {
    SpeciesTable::from_json(
        r#"{
        "entries": [
            {
                "info": {
                    "species": 91,
                    "abilities": [123, 123],
                    "hidden_ability": 0,
                    "gender_ratio": 255,
                    "base_friendship": 0,
                    "body_color": 4
                },
                "versions": [10, 11, 30]
            },
            {
                "info": {
                    "species": 7,
                    "abilities": [65, 66],
                    "hidden_ability": 67,
                    "gender_ratio": 127,
                    "base_friendship": 70,
                    "body_color": 1
                },
                "versions": [10, 11, 30]
            }
        ]
    }"#,
    )
    .expect("fixture table parses")
}

pub fn trainer() -> TrainerIdentity {
    TrainerIdentity {
        name: String::from("Mira"),
        tid16: 0x1234,
        sid16: 0x5678,
        version: V_MODERN,
        generation: 8,
        ..TrainerIdentity::default()
    }
}

/// Fixed-gift legacy context for the phantom species.
pub fn phantom_gift() -> EncounterContext {
    EncounterContext {
        species: PHANTOM,
        form: 0,
        version: V_LEGACY_A,
        generation: 4,
        kind: EncounterKind::LegacyGift {
            method: LegacyMethod::One,
        },
        level_min: 50,
        level_max: 50,
        downlevel_min: None,
        fixed_ball: None,
        shiny: ShinyClass::Random,
        ability: AbilityPolicy::Any12,
        fixed_ivs: None,
        fixed_ec: None,
        fixed_gender: None,
        is_alpha: false,
        untradeable: false,
        met_location: 72,
        legal_moves: SmallVec::from_slice(&PHANTOM_MOVES),
    }
}

pub fn common_wild() -> EncounterContext {
    EncounterContext {
        species: COMMON,
        form: 0,
        version: V_MODERN,
        generation: 8,
        kind: EncounterKind::ModernWild {
            flawless_ivs: 0,
            correlated: false,
        },
        level_min: 10,
        level_max: 40,
        downlevel_min: None,
        fixed_ball: None,
        shiny: ShinyClass::Random,
        ability: AbilityPolicy::Any12,
        fixed_ivs: None,
        fixed_ec: None,
        fixed_gender: None,
        is_alpha: false,
        untradeable: false,
        met_location: 12,
        legal_moves: SmallVec::new(),
    }
}

/// Scripted source: returns its contexts for any stub whose species
/// matches, restricted to the requested versions.
pub struct ScriptedSource {
    pub contexts: Vec<EncounterContext>,
    pub revision: String,
}

impl ScriptedSource {
    pub fn new(contexts: Vec<EncounterContext>) -> Self {
        Self {
            contexts,
            revision: String::from("builtin"),
        }
    }
}

impl EncounterSource for ScriptedSource {
    fn enumerate<'a>(
        &'a self,
        stub: EnumerationStub,
        _moves: &'a [MoveId],
        versions: &'a [VersionId],
    ) -> Box<dyn Iterator<Item = EncounterContext> + 'a> {
        let versions: Vec<VersionId> = versions.to_vec();
        Box::new(
            self.contexts
                .iter()
                .filter(move |ctx| {
                    ctx.species == stub.species
                        && ctx.form == stub.form
                        && versions.contains(&ctx.version)
                })
                .cloned(),
        )
    }

    fn data_version(&self) -> &str {
        &self.revision
    }
}

/// Endless stream of one context, for bounded-termination tests.
pub struct EndlessSource(pub EncounterContext);

impl EncounterSource for EndlessSource {
    fn enumerate<'a>(
        &'a self,
        _stub: EnumerationStub,
        _moves: &'a [MoveId],
        _versions: &'a [VersionId],
    ) -> Box<dyn Iterator<Item = EncounterContext> + 'a> {
        Box::new(std::iter::repeat_with(|| self.0.clone()))
    }
}

/// Stand-in oracle enforcing the internal invariants a legitimate record
/// always satisfies.
pub struct ConsistencyOracle;

impl LegalityOracle for ConsistencyOracle {
    fn validate(&self, candidate: &Candidate) -> Verdict {
        if candidate.ivs.iter().any(|iv| *iv > 31) {
            return Verdict::invalid("impossible stat roll");
        }
        if candidate.met_level > candidate.level {
            return Verdict::invalid("met level above current level");
        }
        if candidate.level == 0 || candidate.level > 100 {
            return Verdict::invalid("level out of range");
        }
        if matches!(candidate.generation, 3 | 4) {
            // Identity-linked nature: the seed value preserves the
            // original identity even after the transfer parity flip.
            let linked = (candidate.ec % 25) as u8;
            if candidate.nature.0 != linked {
                return Verdict::invalid("nature detached from identity value");
            }
        }
        Verdict::valid()
    }
}

/// Oracle that rejects everything, for exhaustion paths.
pub struct RejectingOracle;

impl LegalityOracle for RejectingOracle {
    fn validate(&self, _candidate: &Candidate) -> Verdict {
        Verdict::invalid("scripted rejection")
    }
}
