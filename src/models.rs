//! Data models for Anno goods, production buildings and modifiers

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::calculator::ResolveError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Good {
    pub name: String,
    /// Raw goods have no producing building and terminate a chain
    #[serde(default)]
    pub is_raw: bool,
}

impl Good {
    pub fn raw(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_raw: true,
        }
    }

    pub fn produced(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_raw: false,
        }
    }
}

/// Throughput of a building in tons per minute
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub inputs: BTreeMap<String, f64>,
    #[serde(default)]
    pub outputs: BTreeMap<String, f64>,
}

impl Recipe {
    pub fn new(inputs: &[(&str, f64)], outputs: &[(&str, f64)]) -> Self {
        Self {
            inputs: rate_map(inputs),
            outputs: rate_map(outputs),
        }
    }

    pub fn input_rate(&self, good: &str) -> f64 {
        self.inputs.get(good).copied().unwrap_or(0.0)
    }

    pub fn output_rate(&self, good: &str) -> f64 {
        self.outputs.get(good).copied().unwrap_or(0.0)
    }
}

fn rate_map(rates: &[(&str, f64)]) -> BTreeMap<String, f64> {
    rates
        .iter()
        .map(|&(good, rate)| (good.to_string(), rate))
        .collect()
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn side(f: &mut fmt::Formatter<'_>, rates: &BTreeMap<String, f64>) -> fmt::Result {
            if rates.is_empty() {
                return write!(f, "nothing");
            }
            for (i, (good, rate)) in rates.iter().enumerate() {
                if i > 0 {
                    write!(f, " + ")?;
                }
                write!(f, "{} {}", rate, good)?;
            }
            Ok(())
        }

        side(f, &self.inputs)?;
        write!(f, " -> ")?;
        side(f, &self.outputs)
    }
}

/// A production building type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub name: String,
    pub base_recipe: Recipe,
    pub cycle_time_secs: f64,
    /// Used for modifier targeting, e.g. "Production", "Old World"
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Whether the building can be electrified
    #[serde(default)]
    pub enhanceable: bool,
    #[serde(default)]
    pub workforce: u32,
    #[serde(default)]
    pub workforce_kind: String,
    #[serde(default)]
    pub locations: Vec<String>,
}

impl Facility {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn cycles_per_minute(&self) -> f64 {
        if self.cycle_time_secs <= 0.0 {
            return 0.0;
        }
        60.0 / self.cycle_time_secs
    }
}

/// One atomic rule contributed by a modifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    Productivity { bonus: f64 },
    ReplaceInput { original: String, replacement: String },
    ExtraOutput { good: String, amount_per_cycle: u32 },
    WorkforceReduction { fraction: f64 },
}

impl Effect {
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::Productivity { .. } => "productivity",
            Effect::ReplaceInput { .. } => "replace_input",
            Effect::ExtraOutput { .. } => "extra_output",
            Effect::WorkforceReduction { .. } => "workforce_reduction",
        }
    }
}

/// Anything that alters building operation: items, electricity, policies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub name: String,
    #[serde(default)]
    pub target_tags: BTreeSet<String>,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

impl Modifier {
    pub fn applies_to(&self, tags: &BTreeSet<String>) -> bool {
        self.target_tags.iter().any(|tag| tags.contains(tag))
    }

    pub fn productivity_bonus(&self) -> f64 {
        self.effects
            .iter()
            .map(|effect| match effect {
                Effect::Productivity { bonus } => *bonus,
                _ => 0.0,
            })
            .sum()
    }

    pub fn workforce_reduction(&self) -> f64 {
        self.effects
            .iter()
            .map(|effect| match effect {
                Effect::WorkforceReduction { fraction } => *fraction,
                _ => 0.0,
            })
            .sum()
    }

    pub fn input_replacements(&self) -> impl Iterator<Item = (&str, &str)> {
        self.effects.iter().filter_map(|effect| match effect {
            Effect::ReplaceInput {
                original,
                replacement,
            } => Some((original.as_str(), replacement.as_str())),
            _ => None,
        })
    }

    pub fn extra_outputs(&self) -> impl Iterator<Item = (&str, u32)> {
        self.effects.iter().filter_map(|effect| match effect {
            Effect::ExtraOutput {
                good,
                amount_per_cycle,
            } => Some((good.as_str(), *amount_per_cycle)),
            _ => None,
        })
    }
}

/// Calculation mode for a production chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Base recipes, no modifiers
    Base,
    /// Heuristically selected modifiers applied to every building
    Optimized,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Base => write!(f, "base"),
            Mode::Optimized => write!(f, "optimized"),
        }
    }
}

/// Result of a production chain calculation for one good
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChainNode {
    Failed(ResolveError),
    Resolved(ResolvedNode),
}

impl ChainNode {
    pub fn as_resolved(&self) -> Option<&ResolvedNode> {
        match self {
            ChainNode::Resolved(node) => Some(node),
            ChainNode::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ResolveError> {
        match self {
            ChainNode::Failed(err) => Some(err),
            ChainNode::Resolved(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedNode {
    #[serde(rename = "good_name")]
    pub good: String,
    pub target_rate: f64,
    pub is_raw: bool,
    #[serde(rename = "building_count")]
    pub facility_count: f64,
    pub productivity: f64,
    /// Absent for raw goods
    #[serde(flatten)]
    pub facility: Option<FacilityUsage>,
    #[serde(rename = "modifiers")]
    pub applied_modifiers: Vec<String>,
    #[serde(rename = "inputs")]
    pub required_input_rates: BTreeMap<String, f64>,
    pub sub_chains: BTreeMap<String, ChainNode>,
}

impl ResolvedNode {
    pub fn raw(good: &str, target_rate: f64) -> Self {
        Self {
            good: good.to_string(),
            target_rate,
            is_raw: true,
            facility_count: 0.0,
            productivity: 1.0,
            facility: None,
            applied_modifiers: Vec::new(),
            required_input_rates: BTreeMap::new(),
            sub_chains: BTreeMap::new(),
        }
    }
}

/// The building side of a resolved, non-raw node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacilityUsage {
    #[serde(rename = "building_name")]
    pub facility_name: String,
    #[serde(rename = "workforce_per_building")]
    pub workforce_per_facility: u32,
    #[serde(rename = "workforce_type")]
    pub workforce_kind: String,
    pub total_workforce: f64,
    #[serde(rename = "building_locations")]
    pub facility_locations: Vec<String>,
    #[serde(rename = "recipe", serialize_with = "serialize_display")]
    pub effective_recipe: Recipe,
}

fn serialize_display<T: fmt::Display, S: Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
