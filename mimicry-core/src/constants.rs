//! Engine-wide tuning constants and magic values.

/// Seed trials before the legacy synthesizer relaxes its nature requirement.
pub const LEGACY_COMPROMISE_AFTER: u32 = 2_500_000;

/// Hard ceiling on seed trials for a single legacy encounter attempt.
pub const LEGACY_TRIAL_CEILING: u32 = 5_000_000;

/// Bounded reroll count for branching-lineage materialization.
pub const LINEAGE_REROLL_CEILING: u32 = 256;

/// Bounded trials per flawless-count when reversing an overworld seed.
pub const OVERWORLD_SEED_TRIALS: u32 = 65_536;

/// Seed trials before the modern wild stream degrades to direct IV fixes.
pub const MODERN_TRIAL_CEILING: u32 = 1_000_000;

/// Seed trials before the raid search gives up on full criteria.
pub const RAID_TRIAL_CEILING: u32 = 1_000_000;

/// Identity-value XOR distances below this count as shiny.
pub const SHINY_XOR_THRESHOLD: u16 = 16;

/// Nature values are derived modulo this count.
pub const NATURE_COUNT: u8 = 25;

/// Aggregate EV ceiling for destinations without a relaxed cap.
pub const EV_SUM_CEILING: u32 = 510;

/// Per-stat EV ceiling for modern destinations.
pub const EV_STAT_CEILING: u16 = 252;

/// Per-stat effort ceiling under legacy semantics (all-zero request = max).
pub const EV_STAT_CEILING_LEGACY: u16 = 65_535;

/// Generations using the legacy all-zero-means-maximum effort convention.
pub const LEGACY_EV_GENERATION_MAX: u8 = 2;

/// First generation where hidden abilities can be unlocked post-capture.
pub const ABILITY_UNLOCK_GENERATION: u8 = 8;

/// Level floor for hyper-training in its debut generation.
pub const HYPER_TRAIN_MIN_LEVEL: u8 = 100;

/// Maximum per-stat IV roll (inclusive).
pub const IV_MAX: u8 = 31;

/// Sentinel for an unconstrained IV request.
pub const IV_UNSET: i8 = -1;

/// IV slots ordered as stored: HP, ATK, DEF, SPA, SPD, SPE.
pub const STAT_COUNT: usize = 6;

/// Gender-ratio magic values from the personal tables.
pub const RATIO_MAGIC_MALE: u8 = 0;
pub const RATIO_MAGIC_FEMALE: u8 = 254;
pub const RATIO_MAGIC_GENDERLESS: u8 = 255;

/// Move id of the frustration-style move that inverts friendship stamping.
pub const MOVE_FRUSTRATION: u16 = 218;

/// Highest item id present per generation, for held-item stripping.
/// Index 0 is unused; generations 1..=9.
pub const MAX_ITEM_ID_BY_GENERATION: [u16; 10] =
    [0, 0, 0, 376, 536, 638, 775, 959, 1607, 2400];
