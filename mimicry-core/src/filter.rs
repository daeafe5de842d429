//! Cheap accept/reject predicates applied before any expensive work.
//!
//! Every predicate is independent and order-insensitive; they are listed
//! cheapest first purely for speed. Rejecting here costs a few comparisons;
//! rejecting after synthesis costs millions of RNG trials.

use crate::config::SearchConfig;
use crate::constants::{ABILITY_UNLOCK_GENERATION, EV_SUM_CEILING};
use crate::encounter::{EncounterContext, ShinyClass};
use crate::species::SpeciesData;
use crate::template::{ShinyPolicy, Template};
use crate::versions::VersionId;

/// Everything the predicates need besides the context itself.
pub struct FilterRequest<'a> {
    pub template: &'a Template,
    pub config: &'a SearchConfig,
    pub dest_version: VersionId,
    pub dest_generation: u8,
    pub relaxed_ev_cap: bool,
    pub hidden_ability_requested: bool,
}

/// Apply the full predicate set; true means the context survives.
#[must_use]
pub fn accepts(req: &FilterRequest<'_>, ctx: &EncounterContext, data: &dyn SpeciesData) -> bool {
    level_ok(req, ctx)
        && ball_ok(req, ctx)
        && shiny_ok(req, ctx)
        && alpha_ok(req, ctx)
        && gender_ok(req, ctx)
        && hidden_ability_ok(req, ctx)
        && ev_sum_ok(req, ctx)
        && species_exists(req, data)
}

/// Requested level must clear the context floor, or its relaxed
/// downleveled floor when one is declared.
#[must_use]
pub fn level_ok(req: &FilterRequest<'_>, ctx: &EncounterContext) -> bool {
    req.template.level >= ctx.effective_level_min()
}

/// A context-fixed ball only conflicts with an explicitly forced one.
#[must_use]
pub fn ball_ok(req: &FilterRequest<'_>, ctx: &EncounterContext) -> bool {
    if !req.config.force_specified_ball {
        return true;
    }
    match ctx.fixed_ball {
        Some(fixed) => {
            let forced = req.template.overrides.ball;
            forced == 0 || forced == fixed
        }
        None => true,
    }
}

/// The shiny compatibility matrix. Tier mismatches against a plain
/// `Always` context are accepted; the synthesizer corrects the tier later
/// (except in generation 9, where the rolled tier is immutable and the
/// finalizer leaves it alone).
#[must_use]
pub fn shiny_ok(req: &FilterRequest<'_>, ctx: &EncounterContext) -> bool {
    match (req.template.shiny_request(), ctx.shiny) {
        (ShinyPolicy::NotRequested, class) => !class.is_forced_shiny(),
        (_, ShinyClass::Never) => false,
        (ShinyPolicy::Star, ShinyClass::AlwaysSquare) => false,
        (ShinyPolicy::Square, ShinyClass::AlwaysStar) => false,
        _ => true,
    }
}

#[must_use]
pub fn alpha_ok(req: &FilterRequest<'_>, ctx: &EncounterContext) -> bool {
    match req.template.overrides.alpha {
        Some(requested) => ctx.is_alpha == requested,
        None => !ctx.is_alpha,
    }
}

/// A context that fixes a single gender must match an explicit request.
#[must_use]
pub fn gender_ok(req: &FilterRequest<'_>, ctx: &EncounterContext) -> bool {
    match (req.template.gender, ctx.fixed_gender) {
        (Some(wanted), Some(fixed)) => wanted == fixed,
        _ => true,
    }
}

/// Hidden abilities from the capsule-less legacy generations cannot be
/// unlocked unless the destination has reached the unlock generation.
#[must_use]
pub fn hidden_ability_ok(req: &FilterRequest<'_>, ctx: &EncounterContext) -> bool {
    if !req.hidden_ability_requested {
        return true;
    }
    !(matches!(ctx.generation, 3 | 4) && req.dest_generation < ABILITY_UNLOCK_GENERATION)
}

/// Aggregate EV ceiling, skipped for relaxed-cap destinations and for the
/// earliest generations whose effort model predates the ceiling.
#[must_use]
pub fn ev_sum_ok(req: &FilterRequest<'_>, ctx: &EncounterContext) -> bool {
    if ctx.generation <= 2 || req.relaxed_ev_cap {
        return true;
    }
    req.template.ev_sum() <= EV_SUM_CEILING
}

#[must_use]
pub fn species_exists(req: &FilterRequest<'_>, data: &dyn SpeciesData) -> bool {
    data.exists_in_version(req.dest_version, req.template.species, req.template.form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encounter::{AbilityPolicy, EncounterKind, LegacyMethod};
    use crate::species::SpeciesTable;
    use smallvec::SmallVec;

    fn ctx(shiny: ShinyClass) -> EncounterContext {
        EncounterContext {
            species: 7,
            form: 0,
            version: VersionId(10),
            generation: 4,
            kind: EncounterKind::LegacyStatic {
                method: LegacyMethod::One,
            },
            level_min: 30,
            level_max: 30,
            downlevel_min: None,
            fixed_ball: None,
            shiny,
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

    fn request<'a>(template: &'a Template, config: &'a SearchConfig) -> FilterRequest<'a> {
        FilterRequest {
            template,
            config,
            dest_version: VersionId(10),
            dest_generation: 4,
            relaxed_ev_cap: false,
            hidden_ability_requested: false,
        }
    }

    #[test]
    fn shiny_matrix_not_requested_row() {
        let template = Template::new(7, 50);
        let config = SearchConfig::default();
        let req = request(&template, &config);
        assert!(shiny_ok(&req, &ctx(ShinyClass::Never)));
        assert!(!shiny_ok(&req, &ctx(ShinyClass::Always)));
        assert!(shiny_ok(&req, &ctx(ShinyClass::Random)));
        assert!(shiny_ok(&req, &ctx(ShinyClass::FixedValue)));
        assert!(!shiny_ok(&req, &ctx(ShinyClass::AlwaysStar)));
        assert!(!shiny_ok(&req, &ctx(ShinyClass::AlwaysSquare)));
    }

    #[test]
    fn shiny_matrix_unspecified_tier_row() {
        let mut template = Template::new(7, 50);
        template.shiny = ShinyPolicy::Requested;
        let config = SearchConfig::default();
        let req = request(&template, &config);
        assert!(!shiny_ok(&req, &ctx(ShinyClass::Never)));
        for class in [
            ShinyClass::Always,
            ShinyClass::Random,
            ShinyClass::FixedValue,
            ShinyClass::AlwaysStar,
            ShinyClass::AlwaysSquare,
        ] {
            assert!(shiny_ok(&req, &ctx(class)), "{class:?}");
        }
    }

    #[test]
    fn shiny_matrix_tier_rows() {
        let mut template = Template::new(7, 50);
        template.shiny = ShinyPolicy::Star;
        let config = SearchConfig::default();
        let req = request(&template, &config);
        assert!(shiny_ok(&req, &ctx(ShinyClass::Always)));
        assert!(shiny_ok(&req, &ctx(ShinyClass::AlwaysStar)));
        assert!(!shiny_ok(&req, &ctx(ShinyClass::AlwaysSquare)));

        template.shiny = ShinyPolicy::Square;
        let req = request(&template, &config);
        assert!(shiny_ok(&req, &ctx(ShinyClass::Always)));
        assert!(!shiny_ok(&req, &ctx(ShinyClass::AlwaysStar)));
        assert!(shiny_ok(&req, &ctx(ShinyClass::AlwaysSquare)));
    }

    #[test]
    fn level_floor_respects_downlevel() {
        let template = Template::new(7, 25);
        let config = SearchConfig::default();
        let req = request(&template, &config);
        let mut context = ctx(ShinyClass::Random);
        assert!(!level_ok(&req, &context));
        context.downlevel_min = Some(20);
        assert!(level_ok(&req, &context));
    }

    #[test]
    fn forced_ball_must_match_fixed_ball() {
        let mut template = Template::new(7, 50);
        template.overrides.ball = 4;
        let config = SearchConfig {
            force_specified_ball: true,
            ..SearchConfig::default()
        };
        let req = request(&template, &config);
        let mut context = ctx(ShinyClass::Random);
        context.fixed_ball = Some(3);
        assert!(!ball_ok(&req, &context));
        context.fixed_ball = Some(4);
        assert!(ball_ok(&req, &context));
        template.overrides.ball = 0;
        let req = request(&template, &config);
        let mut context = ctx(ShinyClass::Random);
        context.fixed_ball = Some(3);
        assert!(ball_ok(&req, &context));
    }

    #[test]
    fn hidden_ability_blocked_in_capsule_less_generations() {
        let template = Template::new(7, 50);
        let config = SearchConfig::default();
        let mut req = request(&template, &config);
        req.hidden_ability_requested = true;
        assert!(!hidden_ability_ok(&req, &ctx(ShinyClass::Random)));
        req.dest_generation = 8;
        assert!(hidden_ability_ok(&req, &ctx(ShinyClass::Random)));
    }

    #[test]
    fn ev_ceiling_skipped_for_relaxed_destinations() {
        let mut template = Template::new(7, 50);
        template.evs = [252, 252, 252, 0, 0, 60]; // 816 > 510
        let config = SearchConfig::default();
        let mut req = request(&template, &config);
        assert!(!ev_sum_ok(&req, &ctx(ShinyClass::Random)));
        req.relaxed_ev_cap = true;
        assert!(ev_sum_ok(&req, &ctx(ShinyClass::Random)));
    }

    #[test]
    fn predicate_conjunction_is_order_independent() {
        let template = Template::new(7, 50);
        let config = SearchConfig::default();
        let req = request(&template, &config);
        let context = ctx(ShinyClass::Random);
        let table = SpeciesTable::empty();

        let results = [
            level_ok(&req, &context),
            ball_ok(&req, &context),
            shiny_ok(&req, &context),
            alpha_ok(&req, &context),
            gender_ok(&req, &context),
            hidden_ability_ok(&req, &context),
            ev_sum_ok(&req, &context),
            species_exists(&req, &table),
        ];
        // Any permutation of independent predicates yields the same
        // conjunction; spot-check both evaluation orders.
        let forward = results.iter().all(|r| *r);
        let reverse = results.iter().rev().all(|r| *r);
        assert_eq!(forward, reverse);
        assert_eq!(forward, accepts(&req, &context, &table));
    }
}
