//! Modifier selection for optimized calculations

use crate::models::{Facility, Modifier};

pub const OLD_WORLD_TAG: &str = "Old World";
pub const MASTER_BAKER: &str = "Master Baker";
pub const ELECTRICITY: &str = "Electricity";
pub const AUTOMATION: &str = "Automation";

/// Chooses which compatible modifiers to apply to a building.
///
/// `compatible` is in catalog registration order. The returned modifiers
/// are applied in the order given.
pub trait ModifierSelection {
    fn select<'m>(&self, facility: &Facility, compatible: &[&'m Modifier]) -> Vec<&'m Modifier>;
}

/// Fixed priority rules, picks at most one modifier:
///
/// 1. Old World buildings get "Master Baker" when it is compatible.
/// 2. Other buildings get "Electricity" when they can be electrified.
/// 3. Anything still without a modifier gets "Automation".
#[derive(Debug, Default, Clone, Copy)]
pub struct PriorityHeuristic;

impl ModifierSelection for PriorityHeuristic {
    fn select<'m>(&self, facility: &Facility, compatible: &[&'m Modifier]) -> Vec<&'m Modifier> {
        let by_name = |name: &str| compatible.iter().copied().find(|m| m.name == name);

        let mut selected = Vec::new();

        if facility.has_tag(OLD_WORLD_TAG) {
            selected.extend(by_name(MASTER_BAKER));
        } else if facility.enhanceable {
            selected.extend(by_name(ELECTRICITY));
        }

        if selected.is_empty() {
            selected.extend(by_name(AUTOMATION));
        }

        selected
    }
}

/// Selects nothing; an optimized run with this policy matches base mode
#[derive(Debug, Default, Clone, Copy)]
pub struct NoModifiers;

impl ModifierSelection for NoModifiers {
    fn select<'m>(&self, _facility: &Facility, _compatible: &[&'m Modifier]) -> Vec<&'m Modifier> {
        Vec::new()
    }
}
