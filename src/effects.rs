//! Composition of modifier effects into an effective recipe

use tracing::trace;

use crate::models::{Facility, Modifier, Recipe};

/// What a building looks like once its modifiers are applied
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveProfile {
    /// Base recipe with replacements and extra outputs, scaled by productivity
    pub recipe: Recipe,
    pub productivity: f64,
    pub workforce: u32,
}

impl EffectiveProfile {
    /// The unmodified building
    pub fn base(facility: &Facility) -> Self {
        Self {
            recipe: facility.base_recipe.clone(),
            productivity: 1.0,
            workforce: facility.workforce,
        }
    }
}

/// Fold `modifiers` over the building's base recipe, in order.
///
/// Workforce is truncated after every modifier, so the result depends on
/// modifier order. Productivity scales every input and output once, after
/// the fold.
pub fn apply_modifiers(facility: &Facility, modifiers: &[&Modifier]) -> EffectiveProfile {
    let mut profile = EffectiveProfile::base(facility);

    for modifier in modifiers {
        profile.productivity += modifier.productivity_bonus();
        profile.workforce = reduce_workforce(profile.workforce, modifier.workforce_reduction());

        let inputs = &mut profile.recipe.inputs;
        for (original, replacement) in modifier.input_replacements() {
            if let Some(rate) = inputs.remove(original) {
                inputs.insert(replacement.to_string(), rate);
            }
        }

        // amount/cycle -> cycles/min -> divided by 60 once more
        let cycles_per_minute = facility.cycles_per_minute();
        for (good, amount_per_cycle) in modifier.extra_outputs() {
            let extra = f64::from(amount_per_cycle) * cycles_per_minute / 60.0;
            *profile
                .recipe
                .outputs
                .entry(good.to_string())
                .or_insert(0.0) += extra;
        }

        trace!(
            facility = %facility.name,
            modifier = %modifier.name,
            productivity = profile.productivity,
            workforce = profile.workforce,
            "applied modifier"
        );
    }

    let productivity = profile.productivity;
    let recipe = &mut profile.recipe;
    for rate in recipe.inputs.values_mut().chain(recipe.outputs.values_mut()) {
        *rate *= productivity;
    }

    profile
}

fn reduce_workforce(workforce: u32, reduction: f64) -> u32 {
    let reduced = (f64::from(workforce) * (1.0 - reduction)).floor();
    reduced.max(0.0) as u32
}
