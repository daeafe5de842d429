//! Deterministic finalization between synthesis and validation.
//!
//! Step order is fixed: later steps read what earlier steps wrote (the
//! parity correction reads the final identity value, the shiny finalizer
//! reads the corrected one, size derivation reads both halves). The only
//! non-deterministic input is the outer generator used for random mark
//! selection.

use crate::candidate::Candidate;
use crate::config::SearchConfig;
use crate::constants::{
    EV_STAT_CEILING, EV_STAT_CEILING_LEGACY, HYPER_TRAIN_MIN_LEVEL, IV_MAX, IV_UNSET,
    LEGACY_EV_GENERATION_MAX, MAX_ITEM_ID_BY_GENERATION, MOVE_FRUSTRATION, STAT_COUNT,
};
use crate::criteria::Criteria;
use crate::encounter::{EncounterContext, EncounterKind};
use crate::oracle::LegalityOracle;
use crate::shiny;
use crate::species::{Nature, SpeciesInfo};
use crate::synthesis::is_predetermined;
use crate::template::{ShinyPolicy, Template};
use crate::trainer::TrainerIdentity;
use log::debug;
use rand::Rng;

/// Marks a modern wild capture may legally carry.
const LEGAL_RANDOM_MARKS: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];

/// Ribbon awarded by the origin generation for any captured entity.
const RIBBON_CAPTURE: u8 = 1;

pub struct PipelineRequest<'a> {
    pub template: &'a Template,
    pub ctx: &'a EncounterContext,
    pub trainer: &'a TrainerIdentity,
    pub config: &'a SearchConfig,
    pub criteria: &'a Criteria,
}

/// Run every finalization step in order.
pub fn finalize<R: Rng>(
    candidate: &mut Candidate,
    req: &PipelineRequest<'_>,
    info: &SpeciesInfo,
    oracle: &dyn LegalityOracle,
    rng: &mut R,
) {
    reconcile_species_level(candidate, req);
    stamp_handler(candidate, req);
    reconcile_nature_ability(candidate, req, info);
    repair_moves(candidate, req, oracle);
    apply_evs(candidate, req);
    fix_held_item(candidate, req, info);
    apply_friendship(candidate, info);
    finalize_seed_parity(candidate, req);
    finalize_shiny(candidate, req, info);
    hyper_train(candidate, req);
    derive_sizes(candidate, req);
    apply_marks(candidate, req, rng);
    finalize_ball(candidate, req, info);
    apply_battle_ready(candidate, req, oracle);
}

/// Stamp the requested species/level over the context's base lineage and
/// clamp the met level.
fn reconcile_species_level(candidate: &mut Candidate, req: &PipelineRequest<'_>) {
    candidate.species = req.template.species;
    candidate.form = req.template.form;
    candidate.level = req.template.level;
    if candidate.met_level > candidate.level {
        candidate.met_level = candidate.level;
    }
}

/// Handler identity: untouched for untradeable contexts, otherwise flagged
/// as traded whenever the destination trainer is not the original one.
fn stamp_handler(candidate: &mut Candidate, req: &PipelineRequest<'_>) {
    if candidate.untradeable {
        return;
    }
    let same_trainer = candidate.ot_name == req.trainer.name
        && candidate.tid16 == req.trainer.tid16
        && candidate.sid16 == req.trainer.sid16;
    if same_trainer {
        candidate.handler = 0;
        return;
    }
    candidate.handler = 1;
    candidate.handler_name = req.trainer.name.clone();
    candidate.handler_gender = req.trainer.gender;
}

/// Natures are immutable once rolled in modern generations; the displayed
/// stat nature takes a mint instead. Ability slots repair toward the
/// requested id where the species actually carries it.
fn reconcile_nature_ability(
    candidate: &mut Candidate,
    req: &PipelineRequest<'_>,
    info: &SpeciesInfo,
) {
    if let Some(wanted) = req.template.nature
        && candidate.nature != wanted
    {
        match req.ctx.generation {
            // Rolled nature is immutable; a mint fixes the displayed one.
            8.. => {
                candidate.stat_nature = if wanted.is_neutral() {
                    Nature::SERIOUS
                } else {
                    wanted
                };
            }
            // Nature decoupled from the identity value: free to restamp.
            5..=7 => {
                candidate.nature = wanted;
                candidate.stat_nature = wanted;
            }
            // Identity-linked: the seed search already honored the nature
            // or compromised deliberately. Leave it alone.
            _ => {}
        }
    }

    if let Some(wanted) = req.template.ability
        && candidate.ability != wanted
        && let Some(slot) = info.slot_of_ability(wanted)
    {
        candidate.ability_slot = slot;
        candidate.ability = wanted;
    }
}

/// Strip moves the context cannot carry, then backfill empty slots from
/// the oracle's suggestions.
fn repair_moves(candidate: &mut Candidate, req: &PipelineRequest<'_>, oracle: &dyn LegalityOracle) {
    let pool = &req.ctx.legal_moves;
    if !pool.is_empty() {
        for slot in &mut candidate.moves {
            if *slot != 0 && !pool.contains(slot) {
                *slot = 0;
            }
        }
    }
    if candidate.moves.iter().any(|m| *m == 0) {
        let current = candidate.moves;
        let mut next = oracle
            .suggested_moves(candidate, req.ctx)
            .into_iter()
            .filter(move |m| !current.contains(m));
        for slot in &mut candidate.moves {
            if *slot == 0
                && let Some(replacement) = next.next()
            {
                *slot = replacement;
            }
        }
    }
    candidate.relearn_moves = candidate.moves;
}

/// Copy the requested effort values; under legacy semantics an all-zero
/// request means maximum effort in every stat.
fn apply_evs(candidate: &mut Candidate, req: &PipelineRequest<'_>) {
    let legacy = req.ctx.generation <= LEGACY_EV_GENERATION_MAX;
    let all_zero = req.template.evs.iter().all(|ev| *ev == 0);
    if legacy && all_zero {
        candidate.evs = [EV_STAT_CEILING_LEGACY; STAT_COUNT];
        return;
    }
    let cap = if legacy {
        EV_STAT_CEILING_LEGACY
    } else {
        EV_STAT_CEILING
    };
    for (slot, ev) in candidate.evs.iter_mut().zip(req.template.evs.iter()) {
        *slot = (*ev).min(cap);
    }
}

/// Form-linked items are remapped; items beyond the destination's item
/// table are stripped.
fn fix_held_item(candidate: &mut Candidate, req: &PipelineRequest<'_>, info: &SpeciesInfo) {
    candidate.held_item = req.template.held_item;
    if candidate.form != 0
        && let Some(required) = info.form_item
    {
        candidate.held_item = required;
    }
    let generation = usize::from(req.trainer.generation.min(9));
    if candidate.held_item > MAX_ITEM_ID_BY_GENERATION[generation] {
        debug!(
            "stripping held item {} unavailable in generation {generation}",
            candidate.held_item
        );
        candidate.held_item = 0;
    }
}

fn apply_friendship(candidate: &mut Candidate, info: &SpeciesInfo) {
    candidate.friendship = info.base_friendship;
    candidate.handler_friendship = if candidate.has_move(MOVE_FRUSTRATION) {
        0
    } else {
        255
    };
}

/// Seed-value finalization for transfers out of the legacy generations:
/// the seed value copies the identity value, and a disagreement in the
/// XOR-derived parity bit flips the identity's top bit.
fn finalize_seed_parity(candidate: &mut Candidate, req: &PipelineRequest<'_>) {
    if is_predetermined(req.ctx) {
        return;
    }
    if !matches!(req.ctx.generation, 3..=5) || req.trainer.generation < 6 {
        return;
    }
    candidate.ec = candidate.pid;
    if shiny::needs_parity_correction(candidate.tid16, candidate.sid16, candidate.pid) {
        candidate.pid ^= 0x8000_0000;
    }
}

/// Honor the shiny request, leaving locked species and rolled
/// generation-9 tiers untouched.
///
/// Legacy origins keep their identity value intact — nature, ability and
/// gender all hang off it — and move the secret id instead; modern
/// origins adjust the identity value.
fn finalize_shiny(candidate: &mut Candidate, req: &PipelineRequest<'_>, info: &SpeciesInfo) {
    if info.shiny_locked {
        return;
    }
    let legacy = req.ctx.generation <= 5;
    let want = req.criteria.shiny;
    match want {
        ShinyPolicy::NotRequested => {
            if !candidate.is_shiny() {
                return;
            }
            if legacy {
                candidate.sid16 ^= 0x1000;
            } else {
                candidate.pid = shiny::unshiny_pid(candidate.pid, candidate.id32());
            }
        }
        ShinyPolicy::Requested => {
            if candidate.is_shiny() {
                return;
            }
            if legacy {
                set_shiny_sid(candidate, 1);
            } else {
                candidate.pid =
                    shiny::forced_shiny_pid(candidate.tid16, candidate.sid16, candidate.pid, 1);
            }
        }
        ShinyPolicy::Star | ShinyPolicy::Square => {
            let xor = candidate.shiny_xor();
            let distance = u16::from(want == ShinyPolicy::Star);
            let wrong_tier = if want == ShinyPolicy::Square {
                xor != 0
            } else {
                xor == 0 || xor >= 16
            };
            if !wrong_tier {
                return;
            }
            // Generation-9 tiers are immutable once rolled.
            if req.ctx.generation == 9 {
                return;
            }
            if legacy {
                set_shiny_sid(candidate, distance);
            } else {
                candidate.pid = shiny::forced_shiny_pid(
                    candidate.tid16,
                    candidate.sid16,
                    candidate.pid,
                    distance,
                );
            }
        }
    }
}

/// Pick the secret id that puts the unchanged identity value at exactly
/// `distance` from the trainer identity.
fn set_shiny_sid(candidate: &mut Candidate, distance: u16) {
    let pid_hi = (candidate.pid >> 16) as u16;
    let pid_lo = (candidate.pid & 0xFFFF) as u16;
    candidate.sid16 = candidate.tid16 ^ pid_hi ^ pid_lo ^ distance;
}

/// Hyper-train stats below maximum, skipping anything the criteria pinned
/// on purpose.
fn hyper_train(candidate: &mut Candidate, req: &PipelineRequest<'_>) {
    if req.trainer.generation < 7 || candidate.level < HYPER_TRAIN_MIN_LEVEL {
        return;
    }
    for i in 0..STAT_COUNT {
        candidate.hyper_trained[i] =
            candidate.ivs[i] != IV_MAX && req.criteria.ivs[i] == IV_UNSET;
    }
}

/// Height/weight/scale from the identity and seed halves, per generation.
///
/// Kinds that already drew their size bytes from the synthesis stream
/// (wild and raid) keep them; re-deriving here would break the stream
/// correlation the synthesizer just established.
fn derive_sizes(candidate: &mut Candidate, req: &PipelineRequest<'_>) {
    if is_predetermined(req.ctx)
        || matches!(
            req.ctx.kind,
            EncounterKind::ModernWild { .. } | EncounterKind::Raid { .. }
        )
    {
        return;
    }
    if req.trainer.generation < 8 {
        return;
    }
    let pid_hi = candidate.pid >> 16;
    let pid_lo = candidate.pid & 0xFFFF;
    let height = (pid_hi % 0x80) + (pid_lo % 0x81);
    let weight = ((candidate.ec >> 16) % 0x80) + ((candidate.ec & 0xFFFF) % 0x81);
    let scale = (pid_hi.wrapping_mul(height) % 0x80) + (pid_lo.wrapping_mul(height) % 0x81);
    candidate.height = height as u8;
    candidate.weight = weight as u8;
    candidate.scale = scale as u8;
}

/// IV-derived display markings, plus one random legal mark on request.
fn apply_marks<R: Rng>(candidate: &mut Candidate, req: &PipelineRequest<'_>, rng: &mut R) {
    if req.config.use_markings && req.ctx.generation > 3 {
        let accented = req.ctx.generation >= 7;
        for i in 0..STAT_COUNT {
            candidate.markings[i] = match candidate.ivs[i] {
                v if v == IV_MAX => 1,
                0 | 1 if accented => 2,
                _ => 0,
            };
        }
    }
    if req.template.overrides.random_mark
        && matches!(req.ctx.kind, EncounterKind::ModernWild { .. })
    {
        let pick = LEGAL_RANDOM_MARKS[rng.gen_range(0..LEGAL_RANDOM_MARKS.len())];
        if !candidate.marks.contains(&pick) {
            candidate.marks.push(pick);
        }
    }
    if req.config.set_all_legal_ribbons
        && req.ctx.generation >= 3
        && !matches!(req.ctx.kind, EncounterKind::Egg)
        && !candidate.ribbons.contains(&RIBBON_CAPTURE)
    {
        candidate.ribbons.push(RIBBON_CAPTURE);
    }
}

/// Explicit ball choice wins unless the context fixes one; otherwise a
/// body-color heuristic picks something that looks deliberate.
fn finalize_ball(candidate: &mut Candidate, req: &PipelineRequest<'_>, info: &SpeciesInfo) {
    if let Some(fixed) = req.ctx.fixed_ball {
        candidate.ball = fixed;
        return;
    }
    let explicit = if req.template.ball != 0 {
        req.template.ball
    } else {
        req.template.overrides.ball
    };
    if explicit != 0 {
        candidate.ball = explicit;
        return;
    }
    if req.config.set_matching_balls {
        candidate.ball = matching_ball(info.body_color);
    } else if candidate.ball == 0 {
        candidate.ball = 1;
    }
}

/// Color-to-ball preference table.
#[must_use]
pub const fn matching_ball(body_color: u8) -> u8 {
    match body_color {
        0 => 4,  // red
        1 => 5,  // blue
        2 => 6,  // yellow
        3 => 7,  // green
        4 => 10, // black
        5 => 11, // brown
        6 => 12, // purple
        7 => 14, // gray
        8 => 15, // white
        _ => 1,
    }
}

/// Speculative battle-ready toggle: apply, re-validate, roll back when the
/// oracle disagrees.
fn apply_battle_ready(
    candidate: &mut Candidate,
    req: &PipelineRequest<'_>,
    oracle: &dyn LegalityOracle,
) {
    if !req.config.set_battle_flag || candidate.version == req.trainer.version {
        return;
    }
    let saved_relearn = candidate.relearn_moves;
    candidate.relearn_moves = [0; 4];
    candidate.battle_ready = true;
    if !oracle.validate(candidate).valid {
        candidate.battle_ready = false;
        candidate.relearn_moves = saved_relearn;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encounter::{AbilityPolicy, LegacyMethod, ShinyClass};
    use crate::oracle::Verdict;
    use crate::versions::VersionId;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use smallvec::SmallVec;

    struct YesOracle;
    impl LegalityOracle for YesOracle {
        fn validate(&self, _candidate: &Candidate) -> Verdict {
            Verdict::valid()
        }
    }

    struct NoBattleReadyOracle;
    impl LegalityOracle for NoBattleReadyOracle {
        fn validate(&self, candidate: &Candidate) -> Verdict {
            if candidate.battle_ready {
                Verdict::invalid("battle flag breaks the record")
            } else {
                Verdict::valid()
            }
        }
    }

    fn info() -> SpeciesInfo {
        SpeciesInfo {
            species: 7,
            form: 0,
            abilities: [65, 66],
            hidden_ability: 67,
            gender_ratio: 127,
            base_friendship: 70,
            form_count: 1,
            battle_only_forms: vec![],
            shiny_locked: false,
            lineage: None,
            egg_gender_lock: None,
            gender_linked_form: false,
            form_item: None,
            body_color: 1,
        }
    }

    fn legacy_ctx() -> EncounterContext {
        EncounterContext {
            species: 7,
            form: 0,
            version: VersionId(10),
            generation: 3,
            kind: EncounterKind::LegacyStatic {
                method: LegacyMethod::One,
            },
            level_min: 30,
            level_max: 30,
            downlevel_min: None,
            fixed_ball: None,
            shiny: ShinyClass::Random,
            ability: AbilityPolicy::Any12,
            fixed_ivs: None,
            fixed_ec: None,
            fixed_gender: None,
            is_alpha: false,
            untradeable: false,
            met_location: 0,
            legal_moves: SmallVec::new(),
        }
    }

    fn trainer() -> TrainerIdentity {
        TrainerIdentity {
            generation: 8,
            version: VersionId(30),
            ..TrainerIdentity::default()
        }
    }

    fn open_criteria() -> Criteria {
        Criteria {
            ivs: [IV_UNSET; STAT_COUNT],
            nature: None,
            gender: None,
            shiny: ShinyPolicy::NotRequested,
            ability_slot: None,
            target_branch: None,
        }
    }

    fn run(
        candidate: &mut Candidate,
        template: &Template,
        ctx: &EncounterContext,
        criteria: &Criteria,
        config: &SearchConfig,
        oracle: &dyn LegalityOracle,
    ) {
        let trainer = trainer();
        let req = PipelineRequest {
            template,
            ctx,
            trainer: &trainer,
            config,
            criteria,
        };
        let mut rng = ChaCha20Rng::from_seed([61u8; 32]);
        finalize(candidate, &req, &info(), oracle, &mut rng);
    }

    #[test]
    fn legacy_all_zero_evs_mean_maximum() {
        let template = Template::new(7, 30);
        let mut candidate = Candidate::from_template(&template, &trainer());
        let ctx = EncounterContext {
            generation: 2,
            ..legacy_ctx()
        };
        run(
            &mut candidate,
            &template,
            &ctx,
            &open_criteria(),
            &SearchConfig::default(),
            &YesOracle,
        );
        assert!(candidate.evs.iter().all(|ev| *ev == EV_STAT_CEILING_LEGACY));
    }

    #[test]
    fn modern_evs_copy_with_per_stat_cap() {
        let mut template = Template::new(7, 30);
        template.evs = [300, 4, 0, 0, 0, 252];
        let mut candidate = Candidate::from_template(&template, &trainer());
        run(
            &mut candidate,
            &template,
            &legacy_ctx(),
            &open_criteria(),
            &SearchConfig::default(),
            &YesOracle,
        );
        assert_eq!(candidate.evs, [252, 4, 0, 0, 0, 252]);
    }

    #[test]
    fn parity_correction_links_seed_and_identity() {
        let template = Template::new(7, 30);
        let mut candidate = Candidate::from_template(&template, &trainer());
        // Construct an identity whose masked XOR lands exactly on 8.
        candidate.tid16 = 0;
        candidate.sid16 = 0;
        candidate.pid = 0x0000_0008;
        run(
            &mut candidate,
            &template,
            &legacy_ctx(),
            &open_criteria(),
            &SearchConfig::default(),
            &YesOracle,
        );
        assert_eq!(candidate.ec, 0x0000_0008);
        assert_eq!(candidate.pid, 0x8000_0008);
    }

    #[test]
    fn shiny_finalizer_corrects_tier_outside_generation_nine() {
        let template = Template::new(7, 30);
        let mut criteria = open_criteria();
        criteria.shiny = ShinyPolicy::Square;
        let mut candidate = Candidate::from_template(&template, &trainer());
        candidate.pid = 0x1234_5678;
        run(
            &mut candidate,
            &template,
            &legacy_ctx(),
            &criteria,
            &SearchConfig::default(),
            &YesOracle,
        );
        assert_eq!(candidate.shiny_xor(), 0);
    }

    #[test]
    fn hyper_training_skips_pinned_and_maxed_stats() {
        let template = Template::new(7, 100);
        let mut criteria = open_criteria();
        criteria.ivs[1] = 7;
        let mut candidate = Candidate::from_template(&template, &trainer());
        candidate.ivs = [31, 7, 20, 0, 14, 31];
        run(
            &mut candidate,
            &template,
            &legacy_ctx(),
            &criteria,
            &SearchConfig::default(),
            &YesOracle,
        );
        assert_eq!(
            candidate.hyper_trained,
            [false, false, true, true, true, false]
        );
    }

    #[test]
    fn stream_rolled_sizes_survive_finalization() {
        let template = Template::new(7, 50);
        let wild = EncounterContext {
            generation: 8,
            kind: EncounterKind::ModernWild {
                flawless_ivs: 0,
                correlated: false,
            },
            ..legacy_ctx()
        };
        let mut candidate = Candidate::from_template(&template, &trainer());
        candidate.height = 7;
        candidate.weight = 9;
        run(
            &mut candidate,
            &template,
            &wild,
            &open_criteria(),
            &SearchConfig::default(),
            &YesOracle,
        );
        assert_eq!((candidate.height, candidate.weight), (7, 9));

        // A legacy transfer has no stream sizes; the identity-half
        // formula fills them in.
        let mut transferred = Candidate::from_template(&template, &trainer());
        transferred.pid = 0xABCD_1234;
        transferred.ec = 0x5555_AAAA;
        run(
            &mut transferred,
            &template,
            &legacy_ctx(),
            &open_criteria(),
            &SearchConfig::default(),
            &YesOracle,
        );
        assert!(transferred.height != 0 && transferred.weight != 0);
    }

    #[test]
    fn battle_ready_rolls_back_when_oracle_objects() {
        let template = Template::new(7, 50);
        let config = SearchConfig {
            set_battle_flag: true,
            ..SearchConfig::default()
        };
        let mut candidate = Candidate::from_template(&template, &trainer());
        candidate.version = VersionId(10);
        candidate.moves = [10, 20, 30, 40];
        run(
            &mut candidate,
            &template,
            &legacy_ctx(),
            &open_criteria(),
            &config,
            &NoBattleReadyOracle,
        );
        assert!(!candidate.battle_ready);
        assert_eq!(candidate.relearn_moves, [10, 20, 30, 40]);

        let mut accepted = Candidate::from_template(&template, &trainer());
        accepted.version = VersionId(10);
        run(
            &mut accepted,
            &template,
            &legacy_ctx(),
            &open_criteria(),
            &config,
            &YesOracle,
        );
        assert!(accepted.battle_ready);
    }

    #[test]
    fn move_repair_strips_and_backfills() {
        let mut template = Template::new(7, 50);
        template.moves = [95, 500, 0, 0];
        let mut ctx = legacy_ctx();
        ctx.legal_moves = SmallVec::from_slice(&[95, 171, 212, 33]);
        let mut candidate = Candidate::from_template(&template, &trainer());
        run(
            &mut candidate,
            &template,
            &ctx,
            &open_criteria(),
            &SearchConfig::default(),
            &YesOracle,
        );
        assert!(candidate.moves.contains(&95));
        assert!(!candidate.moves.contains(&500));
        assert!(candidate.moves.iter().all(|m| *m != 0));
    }

    #[test]
    fn fixed_ball_wins_over_everything() {
        let mut template = Template::new(7, 50);
        template.ball = 9;
        let mut ctx = legacy_ctx();
        ctx.fixed_ball = Some(2);
        let mut candidate = Candidate::from_template(&template, &trainer());
        run(
            &mut candidate,
            &template,
            &ctx,
            &open_criteria(),
            &SearchConfig::default(),
            &YesOracle,
        );
        assert_eq!(candidate.ball, 2);
    }

    #[test]
    fn matching_ball_follows_body_color() {
        let template = Template::new(7, 50);
        let mut candidate = Candidate::from_template(&template, &trainer());
        run(
            &mut candidate,
            &template,
            &legacy_ctx(),
            &open_criteria(),
            &SearchConfig::default(),
            &YesOracle,
        );
        // Fixture species is blue-bodied.
        assert_eq!(candidate.ball, matching_ball(1));
    }
}
