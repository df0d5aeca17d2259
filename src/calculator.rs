//! Production chain calculator logic

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::effects::{self, EffectiveProfile};
use crate::models::{ChainNode, FacilityUsage, Mode, ResolvedNode};
use crate::selection::{ModifierSelection, PriorityHeuristic};

/// Why a good in the chain could not be resolved. Failures stay local to
/// their subtree; the rest of the chain is still calculated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("Good '{0}' not found in system")]
    UnknownGood(String),

    #[error("No building found to produce '{0}'")]
    NoProducerFound(String),

    #[error("Building '{facility}' does not produce '{good}'")]
    NonProducingRecipe { facility: String, good: String },

    #[error("Cyclic dependency: '{good}' is already on the resolution path ({})", .path.join(" -> "))]
    CyclicDependency { good: String, path: Vec<String> },
}

impl Serialize for ResolveError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("error", &self.to_string())?;
        map.end()
    }
}

/// Recursively turns a target rate into a tree of building counts.
///
/// Every input edge is resolved independently: a good needed along two
/// paths appears twice in the tree.
pub struct ChainResolver<'c, P = PriorityHeuristic> {
    catalog: &'c Catalog,
    policy: P,
}

impl<'c> ChainResolver<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self::with_policy(catalog, PriorityHeuristic)
    }
}

impl<'c, P: ModifierSelection> ChainResolver<'c, P> {
    pub fn with_policy(catalog: &'c Catalog, policy: P) -> Self {
        Self { catalog, policy }
    }

    /// Calculate the production chain for `good` at `target_rate` t/min
    pub fn resolve(&self, good: &str, target_rate: f64, mode: Mode) -> ChainNode {
        let mut path = Vec::new();
        self.resolve_edge(good, target_rate, mode, &mut path)
    }

    /// Every recursive step goes through here; demand aggregation for goods
    /// shared between paths would hook in at this point.
    fn resolve_edge(
        &self,
        good: &str,
        target_rate: f64,
        mode: Mode,
        path: &mut Vec<String>,
    ) -> ChainNode {
        if path.iter().any(|g| g == good) {
            let mut cycle = path.clone();
            cycle.push(good.to_string());
            return self.failed(ResolveError::CyclicDependency {
                good: good.to_string(),
                path: cycle,
            });
        }

        path.push(good.to_string());
        let node = match self.resolve_node(good, target_rate, mode, path) {
            Ok(node) => ChainNode::Resolved(node),
            Err(err) => self.failed(err),
        };
        path.pop();
        node
    }

    fn resolve_node(
        &self,
        good_name: &str,
        target_rate: f64,
        mode: Mode,
        path: &mut Vec<String>,
    ) -> Result<ResolvedNode, ResolveError> {
        let good = self
            .catalog
            .good(good_name)
            .ok_or_else(|| ResolveError::UnknownGood(good_name.to_string()))?;

        if good.is_raw {
            debug!(good = good_name, rate = target_rate, "raw good");
            return Ok(ResolvedNode::raw(good_name, target_rate));
        }

        let facility = self
            .catalog
            .find_producer(good_name)
            .ok_or_else(|| ResolveError::NoProducerFound(good_name.to_string()))?;

        let (profile, applied_modifiers) = match mode {
            Mode::Base => (EffectiveProfile::base(facility), Vec::new()),
            Mode::Optimized => {
                let compatible = self.catalog.compatible_modifiers(&facility.tags);
                let selected = self.policy.select(facility, &compatible);
                let profile = effects::apply_modifiers(facility, &selected);
                let names: Vec<String> = selected.iter().map(|m| m.name.clone()).collect();
                (profile, names)
            }
        };

        let output_rate = profile.recipe.output_rate(good_name);
        if output_rate <= 0.0 {
            return Err(ResolveError::NonProducingRecipe {
                facility: facility.name.clone(),
                good: good_name.to_string(),
            });
        }

        let facility_count = target_rate / output_rate;
        debug!(
            good = good_name,
            rate = target_rate,
            facility = %facility.name,
            count = facility_count,
            productivity = profile.productivity,
            "resolved"
        );

        let mut required_input_rates = BTreeMap::new();
        let mut sub_chains = BTreeMap::new();
        for (input, &rate) in &profile.recipe.inputs {
            let required = rate * facility_count;
            let sub_chain = self.resolve_edge(input, required, mode, path);
            required_input_rates.insert(input.clone(), required);
            sub_chains.insert(input.clone(), sub_chain);
        }

        Ok(ResolvedNode {
            good: good_name.to_string(),
            target_rate,
            is_raw: false,
            facility_count,
            productivity: profile.productivity,
            facility: Some(FacilityUsage {
                facility_name: facility.name.clone(),
                workforce_per_facility: profile.workforce,
                workforce_kind: facility.workforce_kind.clone(),
                total_workforce: f64::from(profile.workforce) * facility_count,
                facility_locations: facility.locations.clone(),
                effective_recipe: profile.recipe,
            }),
            applied_modifiers,
            required_input_rates,
            sub_chains,
        })
    }

    fn failed(&self, err: ResolveError) -> ChainNode {
        warn!("{}", err);
        ChainNode::Failed(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Effect, Facility, Good, Modifier, Recipe};
    use crate::sample;
    use crate::selection::NoModifiers;
    use proptest::prelude::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    fn facility(name: &str, recipe: Recipe, tags: &[&str], enhanceable: bool) -> Facility {
        Facility {
            name: name.to_string(),
            base_recipe: recipe,
            cycle_time_secs: 60.0,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            enhanceable,
            workforce: 20,
            workforce_kind: "Engineers".to_string(),
            locations: vec!["New World".to_string(), "Old World".to_string()],
        }
    }

    fn chocolate_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.register_good(Good::raw("Cocoa"));
        catalog.register_good(Good::raw("Sugar"));
        catalog.register_good(Good::produced("Chocolate"));
        catalog
            .register_facility(facility(
                "Chocolate Factory",
                Recipe::new(&[("Cocoa", 1.5), ("Sugar", 0.5)], &[("Chocolate", 1.0)]),
                &["Production", "New World"],
                true,
            ))
            .unwrap();
        catalog.register_modifier(Modifier {
            name: "Electricity".to_string(),
            target_tags: ["Production".to_string()].into_iter().collect(),
            effects: vec![Effect::Productivity { bonus: 0.5 }],
        });
        catalog
    }

    fn resolved(node: &ChainNode) -> &ResolvedNode {
        node.as_resolved()
            .unwrap_or_else(|| panic!("expected resolved node, got {:?}", node))
    }

    #[test]
    fn raw_good_echoes_rate() {
        let catalog = chocolate_catalog();
        let node = ChainResolver::new(&catalog).resolve("Cocoa", 3.25, Mode::Optimized);
        let node = resolved(&node);

        assert!(node.is_raw);
        assert_eq!(node.target_rate, 3.25);
        assert_eq!(node.facility_count, 0.0);
        assert!(node.sub_chains.is_empty());
        assert!(node.facility.is_none());
    }

    #[test]
    fn unknown_good_is_an_error_node() {
        let catalog = chocolate_catalog();
        let node = ChainResolver::new(&catalog).resolve("Schnapps", 1.0, Mode::Base);

        assert_eq!(
            node.error(),
            Some(&ResolveError::UnknownGood("Schnapps".to_string()))
        );
        assert_eq!(
            serde_json::to_value(&node).unwrap(),
            serde_json::json!({"error": "Good 'Schnapps' not found in system"})
        );
    }

    #[test]
    fn produced_good_without_building_is_an_error_node() {
        let mut catalog = chocolate_catalog();
        catalog.register_good(Good::produced("Beer"));
        let node = ChainResolver::new(&catalog).resolve("Beer", 1.0, Mode::Base);

        assert_eq!(
            node.error().unwrap().to_string(),
            "No building found to produce 'Beer'"
        );
    }

    #[test]
    fn chocolate_base_chain() {
        let catalog = chocolate_catalog();
        let node = ChainResolver::new(&catalog).resolve("Chocolate", 8.0, Mode::Base);
        let node = resolved(&node);

        assert_eq!(node.facility_count, 8.0);
        assert_eq!(node.productivity, 1.0);
        assert!(node.applied_modifiers.is_empty());

        let cocoa = resolved(&node.sub_chains["Cocoa"]);
        let sugar = resolved(&node.sub_chains["Sugar"]);
        assert!(cocoa.is_raw && sugar.is_raw);
        assert_eq!(cocoa.target_rate, 12.0);
        assert_eq!(sugar.target_rate, 4.0);
        assert_eq!(node.required_input_rates["Cocoa"], 12.0);

        let usage = node.facility.as_ref().unwrap();
        assert_eq!(usage.facility_name, "Chocolate Factory");
        assert_eq!(usage.workforce_per_facility, 20);
        assert_eq!(usage.total_workforce, 160.0);
    }

    #[test]
    fn chocolate_optimized_chain_uses_electricity() {
        let catalog = chocolate_catalog();
        let node = ChainResolver::new(&catalog).resolve("Chocolate", 8.0, Mode::Optimized);
        let node = resolved(&node);

        assert_eq!(node.applied_modifiers, vec!["Electricity"]);
        assert!(approx(node.productivity, 1.5));

        let usage = node.facility.as_ref().unwrap();
        assert!(approx(usage.effective_recipe.output_rate("Chocolate"), 1.5));
        assert!(approx(node.facility_count, 8.0 / 1.5));
        assert_eq!(usage.workforce_per_facility, 20);
        assert!(approx(usage.total_workforce, 20.0 * 8.0 / 1.5));

        // inputs scale with productivity, so raw demand is unchanged
        assert!(approx(node.required_input_rates["Cocoa"], 12.0));
        assert!(approx(node.required_input_rates["Sugar"], 4.0));
    }

    #[test]
    fn base_mode_ignores_modifiers_everywhere() {
        let catalog = sample::catalog().unwrap();
        let node = ChainResolver::new(&catalog).resolve("Bread", 4.0, Mode::Base);

        fn check(node: &ChainNode) {
            let node = node.as_resolved().unwrap();
            assert_eq!(node.productivity, 1.0);
            assert!(node.applied_modifiers.is_empty());
            node.sub_chains.values().for_each(check);
        }
        check(&node);
    }

    #[test]
    fn sample_bread_chain_optimized() {
        let catalog = sample::catalog().unwrap();
        let node = ChainResolver::new(&catalog).resolve("Bread", 4.0, Mode::Optimized);
        let bread = resolved(&node);

        assert_eq!(bread.applied_modifiers, vec!["Master Baker"]);
        let flour = resolved(&bread.sub_chains["Flour"]);
        assert_eq!(flour.applied_modifiers, vec!["Master Baker"]);
        let grain = resolved(&flour.sub_chains["Grain"]);
        assert!(grain.is_raw);
    }

    #[test]
    fn non_producing_effective_recipe_is_an_error() {
        let mut catalog = Catalog::new();
        catalog.register_good(Good::produced("Schnapps"));
        catalog.register_good(Good::raw("Potato"));
        catalog
            .register_facility(facility(
                "Distillery",
                Recipe::new(&[("Potato", 1.0)], &[("Schnapps", 1.0)]),
                &["Production"],
                false,
            ))
            .unwrap();
        catalog.register_modifier(Modifier {
            name: "Automation".to_string(),
            target_tags: ["Production".to_string()].into_iter().collect(),
            effects: vec![Effect::Productivity { bonus: -1.0 }],
        });

        let resolver = ChainResolver::new(&catalog);
        assert!(resolver.resolve("Schnapps", 1.0, Mode::Base).as_resolved().is_some());
        assert_eq!(
            resolver.resolve("Schnapps", 1.0, Mode::Optimized).error(),
            Some(&ResolveError::NonProducingRecipe {
                facility: "Distillery".to_string(),
                good: "Schnapps".to_string(),
            })
        );
    }

    #[test]
    fn failing_input_does_not_abort_siblings() {
        let mut catalog = chocolate_catalog();
        catalog.register_good(Good::produced("Sugar"));
        let node = ChainResolver::new(&catalog).resolve("Chocolate", 8.0, Mode::Base);
        let node = resolved(&node);

        assert_eq!(node.facility_count, 8.0);
        assert_eq!(node.required_input_rates["Sugar"], 4.0);
        assert!(node.sub_chains["Sugar"].error().is_some());
        assert!(resolved(&node.sub_chains["Cocoa"]).is_raw);
    }

    #[test]
    fn replaced_input_is_resolved_instead_of_original() {
        let mut catalog = Catalog::new();
        catalog.register_good(Good::produced("Bread"));
        catalog.register_good(Good::raw("Flour"));
        catalog.register_good(Good::raw("Rye"));
        catalog
            .register_facility(facility(
                "Bakery",
                Recipe::new(&[("Flour", 1.0)], &[("Bread", 1.0)]),
                &["Production"],
                false,
            ))
            .unwrap();
        catalog.register_modifier(Modifier {
            name: "Automation".to_string(),
            target_tags: ["Production".to_string()].into_iter().collect(),
            effects: vec![Effect::ReplaceInput {
                original: "Flour".to_string(),
                replacement: "Rye".to_string(),
            }],
        });

        let node = ChainResolver::new(&catalog).resolve("Bread", 2.0, Mode::Optimized);
        let node = resolved(&node);
        assert!(node.sub_chains.contains_key("Rye"));
        assert!(!node.sub_chains.contains_key("Flour"));
        assert_eq!(node.required_input_rates["Rye"], 2.0);
    }

    #[test]
    fn cycle_is_reported_at_repeated_good() {
        let mut catalog = Catalog::new();
        catalog.register_good(Good::produced("Egg"));
        catalog.register_good(Good::produced("Chicken"));
        catalog.register_good(Good::raw("Grain"));
        catalog
            .register_facility(facility(
                "Coop",
                Recipe::new(&[("Chicken", 1.0)], &[("Egg", 2.0)]),
                &[],
                false,
            ))
            .unwrap();
        catalog
            .register_facility(facility(
                "Hatchery",
                Recipe::new(&[("Egg", 1.0), ("Grain", 1.0)], &[("Chicken", 1.0)]),
                &[],
                false,
            ))
            .unwrap();

        let node = ChainResolver::new(&catalog).resolve("Egg", 2.0, Mode::Base);
        let egg = resolved(&node);
        let chicken = resolved(&egg.sub_chains["Chicken"]);

        assert!(resolved(&chicken.sub_chains["Grain"]).is_raw);
        match chicken.sub_chains["Egg"].error() {
            Some(ResolveError::CyclicDependency { good, path }) => {
                assert_eq!(good, "Egg");
                assert_eq!(path, &vec!["Egg", "Chicken", "Egg"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn shared_good_is_resolved_per_path() {
        let mut catalog = Catalog::new();
        catalog.register_good(Good::produced("Cake"));
        catalog.register_good(Good::produced("Dough"));
        catalog.register_good(Good::produced("Cream"));
        catalog.register_good(Good::raw("Sugar"));
        catalog
            .register_facility(facility(
                "Confectionery",
                Recipe::new(&[("Dough", 1.0), ("Cream", 1.0)], &[("Cake", 1.0)]),
                &[],
                false,
            ))
            .unwrap();
        catalog
            .register_facility(facility("Kneader", Recipe::new(&[("Sugar", 1.0)], &[("Dough", 1.0)]), &[], false))
            .unwrap();
        catalog
            .register_facility(facility("Dairy", Recipe::new(&[("Sugar", 2.0)], &[("Cream", 1.0)]), &[], false))
            .unwrap();

        let node = ChainResolver::new(&catalog).resolve("Cake", 1.0, Mode::Base);
        let cake = resolved(&node);
        let via_dough = resolved(&resolved(&cake.sub_chains["Dough"]).sub_chains["Sugar"]);
        let via_cream = resolved(&resolved(&cake.sub_chains["Cream"]).sub_chains["Sugar"]);
        assert_eq!(via_dough.target_rate, 1.0);
        assert_eq!(via_cream.target_rate, 2.0);
    }

    #[test]
    fn optimized_with_empty_policy_matches_base() {
        let catalog = sample::catalog().unwrap();
        let base = ChainResolver::new(&catalog).resolve("Bread", 3.0, Mode::Base);
        let optimized =
            ChainResolver::with_policy(&catalog, NoModifiers).resolve("Bread", 3.0, Mode::Optimized);
        assert_eq!(base, optimized);
    }

    #[test]
    fn serialized_node_uses_building_field_names() {
        let catalog = chocolate_catalog();
        let node = ChainResolver::new(&catalog).resolve("Chocolate", 8.0, Mode::Base);
        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(json["good_name"], "Chocolate");
        assert_eq!(json["building_name"], "Chocolate Factory");
        assert_eq!(json["building_count"], 8.0);
        assert_eq!(json["workforce_per_building"], 20);
        assert_eq!(json["workforce_type"], "Engineers");
        assert_eq!(json["recipe"], "1.5 Cocoa + 0.5 Sugar -> 1 Chocolate");
        assert_eq!(json["inputs"]["Sugar"], 4.0);
        assert_eq!(json["sub_chains"]["Cocoa"]["is_raw"], true);
        assert!(json["sub_chains"]["Cocoa"].get("building_name").is_none());
    }

    fn check_rates(node: &ChainNode) {
        let Some(node) = node.as_resolved() else {
            return;
        };
        if let Some(usage) = &node.facility {
            let recipe = &usage.effective_recipe;
            let produced = node.facility_count * recipe.output_rate(&node.good);
            assert!(approx(produced, node.target_rate));
            for (good, &required) in &node.required_input_rates {
                assert!(approx(required, recipe.input_rate(good) * node.facility_count));
                let sub = node.sub_chains[good].as_resolved().unwrap();
                assert!(approx(sub.target_rate, required));
            }
        }
        node.sub_chains.values().for_each(check_rates);
    }

    proptest! {
        #[test]
        fn facility_counts_meet_target_rates(
            target in 0.01f64..1000.0,
            grain_in in 0.1f64..10.0,
            flour_out in 0.1f64..10.0,
            flour_in in 0.1f64..10.0,
            bread_out in 0.1f64..10.0,
            optimized in any::<bool>(),
        ) {
            let mut catalog = sample::catalog().unwrap();
            let mill = Facility {
                base_recipe: Recipe::new(&[("Grain", grain_in)], &[("Flour", flour_out)]),
                ..catalog.facility("Mill").unwrap().clone()
            };
            let bakery = Facility {
                base_recipe: Recipe::new(&[("Flour", flour_in)], &[("Bread", bread_out)]),
                ..catalog.facility("Bakery").unwrap().clone()
            };
            catalog.register_facility(mill).unwrap();
            catalog.register_facility(bakery).unwrap();

            let mode = if optimized { Mode::Optimized } else { Mode::Base };
            let node = ChainResolver::new(&catalog).resolve("Bread", target, mode);
            check_rates(&node);
        }
    }
}
