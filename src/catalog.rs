//! In-memory registry of goods, buildings and modifiers
//!
//! The catalog is populated once (from the database, an import or the
//! sample data) and only borrowed immutably while chains are resolved.
//! Registration order is significant: the first registered producer of a
//! good wins, and compatible modifiers are reported in registration order.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;
use tracing::debug;

use crate::models::{Facility, Good, Modifier};

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("Building '{name}' has invalid cycle time {cycle_time_secs}s")]
    InvalidCycleTime { name: String, cycle_time_secs: f64 },

    #[error("Building '{name}' has invalid rate {rate} for '{good}'")]
    InvalidRate { name: String, good: String, rate: f64 },
}

#[derive(Debug, Default, Clone)]
pub struct Catalog {
    goods: Vec<Good>,
    good_index: HashMap<String, usize>,
    facilities: Vec<Facility>,
    facility_index: HashMap<String, usize>,
    modifiers: Vec<Modifier>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a good, replacing any good of the same name
    pub fn register_good(&mut self, good: Good) {
        match self.good_index.get(&good.name) {
            Some(&idx) => self.goods[idx] = good,
            None => {
                self.good_index.insert(good.name.clone(), self.goods.len());
                self.goods.push(good);
            }
        }
    }

    /// Register a building. A building with an existing name keeps its
    /// registration slot.
    pub fn register_facility(&mut self, facility: Facility) -> Result<(), CatalogError> {
        validate_facility(&facility)?;

        match self.facility_index.get(&facility.name) {
            Some(&idx) => {
                debug!(facility = %facility.name, "replacing registered building");
                self.facilities[idx] = facility;
            }
            None => {
                self.facility_index
                    .insert(facility.name.clone(), self.facilities.len());
                self.facilities.push(facility);
            }
        }
        Ok(())
    }

    pub fn register_modifier(&mut self, modifier: Modifier) {
        self.modifiers.push(modifier);
    }

    pub fn good(&self, name: &str) -> Option<&Good> {
        self.good_index.get(name).map(|&idx| &self.goods[idx])
    }

    pub fn facility(&self, name: &str) -> Option<&Facility> {
        self.facility_index.get(name).map(|&idx| &self.facilities[idx])
    }

    pub fn goods(&self) -> &[Good] {
        &self.goods
    }

    pub fn facilities(&self) -> &[Facility] {
        &self.facilities
    }

    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    /// First registered building whose base recipe outputs `good`
    pub fn find_producer(&self, good: &str) -> Option<&Facility> {
        self.facilities
            .iter()
            .find(|facility| facility.base_recipe.output_rate(good) > 0.0)
    }

    pub fn compatible_modifiers(&self, tags: &BTreeSet<String>) -> Vec<&Modifier> {
        self.modifiers
            .iter()
            .filter(|modifier| modifier.applies_to(tags))
            .collect()
    }
}

fn validate_facility(facility: &Facility) -> Result<(), CatalogError> {
    if !facility.cycle_time_secs.is_finite() || facility.cycle_time_secs <= 0.0 {
        return Err(CatalogError::InvalidCycleTime {
            name: facility.name.clone(),
            cycle_time_secs: facility.cycle_time_secs,
        });
    }

    let recipe = &facility.base_recipe;
    for (good, &rate) in recipe.inputs.iter().chain(recipe.outputs.iter()) {
        if !rate.is_finite() || rate < 0.0 {
            return Err(CatalogError::InvalidRate {
                name: facility.name.clone(),
                good: good.clone(),
                rate,
            });
        }
    }
    Ok(())
}
