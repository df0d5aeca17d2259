//! Sample Anno 1800 data for trying the calculator without an import

use crate::catalog::{Catalog, CatalogError};
use crate::models::{Effect, Facility, Good, Modifier, Recipe};

fn set(items: &[&str]) -> std::collections::BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Bread and chocolate chains with electricity, Master Baker and automation
pub fn catalog() -> Result<Catalog, CatalogError> {
    let mut catalog = Catalog::new();

    for good in [
        Good::raw("Grain"),
        Good::produced("Flour"),
        Good::produced("Bread"),
        Good::raw("Cocoa"),
        Good::raw("Sugar"),
        Good::produced("Chocolate"),
    ] {
        catalog.register_good(good);
    }

    let facilities = [
        Facility {
            name: "Mill".to_string(),
            base_recipe: Recipe::new(&[("Grain", 2.0)], &[("Flour", 1.5)]),
            cycle_time_secs: 30.0,
            tags: set(&["Production", "Old World"]),
            enhanceable: true,
            workforce: 10,
            workforce_kind: "Workers".to_string(),
            locations: list(&["Old World"]),
        },
        Facility {
            name: "Bakery".to_string(),
            base_recipe: Recipe::new(&[("Flour", 1.0)], &[("Bread", 0.8)]),
            cycle_time_secs: 45.0,
            tags: set(&["Production", "Old World"]),
            enhanceable: true,
            workforce: 15,
            workforce_kind: "Artisans".to_string(),
            locations: list(&["Old World"]),
        },
        Facility {
            name: "Chocolate Factory".to_string(),
            base_recipe: Recipe::new(&[("Cocoa", 1.5), ("Sugar", 0.5)], &[("Chocolate", 1.0)]),
            cycle_time_secs: 60.0,
            tags: set(&["Production", "New World"]),
            enhanceable: true,
            workforce: 20,
            workforce_kind: "Engineers".to_string(),
            locations: list(&["New World", "Old World"]),
        },
    ];
    for facility in facilities {
        catalog.register_facility(facility)?;
    }

    catalog.register_modifier(Modifier {
        name: "Electricity".to_string(),
        target_tags: set(&["Production"]),
        effects: vec![Effect::Productivity { bonus: 0.5 }],
    });
    catalog.register_modifier(Modifier {
        name: "Master Baker".to_string(),
        target_tags: set(&["Old World"]),
        effects: vec![
            Effect::Productivity { bonus: 0.25 },
            Effect::ExtraOutput {
                good: "Bread".to_string(),
                amount_per_cycle: 1,
            },
            Effect::WorkforceReduction { fraction: 0.3 },
        ],
    });
    catalog.register_modifier(Modifier {
        name: "Automation".to_string(),
        target_tags: set(&["Production"]),
        effects: vec![Effect::WorkforceReduction { fraction: 0.5 }],
    });

    Ok(catalog)
}
