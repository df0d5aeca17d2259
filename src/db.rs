//! Database schema and operations

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, params};

use crate::catalog::Catalog;
use crate::models::{Effect, Facility, Good, Modifier, Recipe};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS goods (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            is_raw INTEGER NOT NULL
        );

        -- Production buildings, registration order is the row id
        CREATE TABLE IF NOT EXISTS facilities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            cycle_time_s REAL NOT NULL,
            enhanceable INTEGER NOT NULL,
            workforce INTEGER NOT NULL,
            workforce_kind TEXT NOT NULL
        );

        -- Base recipe rates in t/min, direction is 'in' or 'out'
        CREATE TABLE IF NOT EXISTS facility_rates (
            facility_id INTEGER NOT NULL,
            direction TEXT NOT NULL,
            good TEXT NOT NULL,
            rate REAL NOT NULL,
            PRIMARY KEY (facility_id, direction, good)
        );

        CREATE TABLE IF NOT EXISTS facility_tags (
            facility_id INTEGER NOT NULL,
            tag TEXT NOT NULL,
            PRIMARY KEY (facility_id, tag)
        );

        CREATE TABLE IF NOT EXISTS facility_locations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            facility_id INTEGER NOT NULL,
            location TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS modifiers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS modifier_tags (
            modifier_id INTEGER NOT NULL,
            tag TEXT NOT NULL,
            PRIMARY KEY (modifier_id, tag)
        );

        -- One row per effect; which value columns are set depends on kind
        CREATE TABLE IF NOT EXISTS modifier_effects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            modifier_id INTEGER NOT NULL,
            kind TEXT NOT NULL,
            value REAL,
            good TEXT,
            replacement TEXT,
            amount INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_facility_rates_good ON facility_rates(good);
        CREATE INDEX IF NOT EXISTS idx_modifier_effects_modifier ON modifier_effects(modifier_id);
        "#,
    )?;
    Ok(())
}

/// Clear all catalog data (for re-import)
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM modifier_effects;
        DELETE FROM modifier_tags;
        DELETE FROM modifiers;
        DELETE FROM facility_locations;
        DELETE FROM facility_tags;
        DELETE FROM facility_rates;
        DELETE FROM facilities;
        DELETE FROM goods;
        "#,
    )?;
    Ok(())
}

/// Insert or replace a good
pub fn insert_good(conn: &Connection, good: &Good) -> Result<()> {
    conn.execute(
        "INSERT INTO goods (name, is_raw) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET is_raw = excluded.is_raw",
        (&good.name, good.is_raw),
    )?;
    Ok(())
}

/// Insert a building, replacing the details of an existing one with the
/// same name while keeping its registration position
pub fn insert_facility(conn: &Connection, facility: &Facility) -> Result<()> {
    conn.execute(
        "INSERT INTO facilities (name, cycle_time_s, enhanceable, workforce, workforce_kind)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(name) DO UPDATE SET
            cycle_time_s = excluded.cycle_time_s,
            enhanceable = excluded.enhanceable,
            workforce = excluded.workforce,
            workforce_kind = excluded.workforce_kind",
        (
            &facility.name,
            facility.cycle_time_secs,
            facility.enhanceable,
            facility.workforce,
            &facility.workforce_kind,
        ),
    )?;
    let id: i64 = conn.query_row(
        "SELECT id FROM facilities WHERE name = ?1",
        [&facility.name],
        |row| row.get(0),
    )?;

    conn.execute("DELETE FROM facility_rates WHERE facility_id = ?1", [id])?;
    conn.execute("DELETE FROM facility_tags WHERE facility_id = ?1", [id])?;
    conn.execute("DELETE FROM facility_locations WHERE facility_id = ?1", [id])?;

    let recipe = &facility.base_recipe;
    let rates = recipe
        .inputs
        .iter()
        .map(|rate| ("in", rate))
        .chain(recipe.outputs.iter().map(|rate| ("out", rate)));
    for (direction, (good, rate)) in rates {
        conn.execute(
            "INSERT INTO facility_rates (facility_id, direction, good, rate) VALUES (?1, ?2, ?3, ?4)",
            params![id, direction, good, rate],
        )?;
    }
    for tag in &facility.tags {
        conn.execute(
            "INSERT INTO facility_tags (facility_id, tag) VALUES (?1, ?2)",
            params![id, tag],
        )?;
    }
    for location in &facility.locations {
        conn.execute(
            "INSERT INTO facility_locations (facility_id, location) VALUES (?1, ?2)",
            params![id, location],
        )?;
    }
    Ok(())
}

/// Append a modifier with its target tags and effects
pub fn insert_modifier(conn: &Connection, modifier: &Modifier) -> Result<()> {
    conn.execute("INSERT INTO modifiers (name) VALUES (?1)", [&modifier.name])?;
    let id = conn.last_insert_rowid();

    for tag in &modifier.target_tags {
        conn.execute(
            "INSERT INTO modifier_tags (modifier_id, tag) VALUES (?1, ?2)",
            params![id, tag],
        )?;
    }

    for effect in &modifier.effects {
        let (value, good, replacement, amount) = match effect {
            Effect::Productivity { bonus } => (Some(*bonus), None, None, None),
            Effect::WorkforceReduction { fraction } => (Some(*fraction), None, None, None),
            Effect::ReplaceInput {
                original,
                replacement,
            } => (None, Some(original.as_str()), Some(replacement.as_str()), None),
            Effect::ExtraOutput {
                good,
                amount_per_cycle,
            } => (None, Some(good.as_str()), None, Some(*amount_per_cycle)),
        };
        conn.execute(
            "INSERT INTO modifier_effects (modifier_id, kind, value, good, replacement, amount)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, effect.kind(), value, good, replacement, amount],
        )?;
    }
    Ok(())
}

/// Write a whole catalog, keeping its registration order
pub fn save_catalog(conn: &Connection, catalog: &Catalog) -> Result<()> {
    for good in catalog.goods() {
        insert_good(conn, good)?;
    }
    for facility in catalog.facilities() {
        insert_facility(conn, facility)?;
    }
    for modifier in catalog.modifiers() {
        insert_modifier(conn, modifier)?;
    }
    Ok(())
}

/// Load the whole catalog in registration order
pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let mut catalog = Catalog::new();

    for good in list_goods(conn)? {
        catalog.register_good(good);
    }
    for facility in list_facilities(conn)? {
        let name = facility.name.clone();
        catalog
            .register_facility(facility)
            .with_context(|| format!("Invalid building '{}' in database", name))?;
    }
    for modifier in list_modifiers(conn)? {
        catalog.register_modifier(modifier);
    }

    Ok(catalog)
}

/// List all goods in registration order
pub fn list_goods(conn: &Connection) -> Result<Vec<Good>> {
    let mut stmt = conn.prepare("SELECT name, is_raw FROM goods ORDER BY id")?;

    let rows = stmt.query_map([], |row| {
        Ok(Good {
            name: row.get(0)?,
            is_raw: row.get(1)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// List all buildings in registration order
pub fn list_facilities(conn: &Connection) -> Result<Vec<Facility>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, cycle_time_s, enhanceable, workforce, workforce_kind
         FROM facilities ORDER BY id",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            Facility {
                name: row.get(1)?,
                base_recipe: Recipe::default(),
                cycle_time_secs: row.get(2)?,
                enhanceable: row.get(3)?,
                workforce: row.get(4)?,
                workforce_kind: row.get(5)?,
                tags: Default::default(),
                locations: Vec::new(),
            },
        ))
    })?;

    let mut results = Vec::new();
    for row in rows {
        let (id, mut facility) = row?;
        load_facility_details(conn, id, &mut facility)?;
        results.push(facility);
    }
    Ok(results)
}

fn load_facility_details(conn: &Connection, id: i64, facility: &mut Facility) -> Result<()> {
    let mut stmt =
        conn.prepare("SELECT direction, good, rate FROM facility_rates WHERE facility_id = ?1")?;
    let rows = stmt.query_map([id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
        ))
    })?;
    for row in rows {
        let (direction, good, rate) = row?;
        match direction.as_str() {
            "in" => facility.base_recipe.inputs.insert(good, rate),
            "out" => facility.base_recipe.outputs.insert(good, rate),
            other => bail!("Unknown rate direction '{}' for '{}'", other, facility.name),
        };
    }

    let mut stmt = conn.prepare("SELECT tag FROM facility_tags WHERE facility_id = ?1")?;
    for tag in stmt.query_map([id], |row| row.get(0))? {
        facility.tags.insert(tag?);
    }

    let mut stmt =
        conn.prepare("SELECT location FROM facility_locations WHERE facility_id = ?1 ORDER BY id")?;
    for location in stmt.query_map([id], |row| row.get(0))? {
        facility.locations.push(location?);
    }
    Ok(())
}

/// List all modifiers in registration order
pub fn list_modifiers(conn: &Connection) -> Result<Vec<Modifier>> {
    let mut stmt = conn.prepare("SELECT id, name FROM modifiers ORDER BY id")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;

    let mut results = Vec::new();
    for row in rows {
        let (id, name) = row?;

        let mut tag_stmt = conn.prepare("SELECT tag FROM modifier_tags WHERE modifier_id = ?1")?;
        let mut target_tags = std::collections::BTreeSet::new();
        for tag in tag_stmt.query_map([id], |row| row.get::<_, String>(0))? {
            target_tags.insert(tag?);
        }

        let mut effect_stmt = conn.prepare(
            "SELECT kind, value, good, replacement, amount
             FROM modifier_effects WHERE modifier_id = ?1 ORDER BY id",
        )?;
        let effect_rows = effect_stmt.query_map([id], |row| {
            Ok(EffectRow {
                kind: row.get(0)?,
                value: row.get(1)?,
                good: row.get(2)?,
                replacement: row.get(3)?,
                amount: row.get(4)?,
            })
        })?;
        let mut effects = Vec::new();
        for effect in effect_rows {
            let effect = effect?;
            effects.push(
                effect
                    .into_effect()
                    .with_context(|| format!("Invalid effect on modifier '{}'", name))?,
            );
        }

        results.push(Modifier {
            name,
            target_tags,
            effects,
        });
    }
    Ok(results)
}

struct EffectRow {
    kind: String,
    value: Option<f64>,
    good: Option<String>,
    replacement: Option<String>,
    amount: Option<u32>,
}

impl EffectRow {
    fn into_effect(self) -> Result<Effect> {
        let effect = match (self.kind.as_str(), self.value, self.good, self.replacement, self.amount) {
            ("productivity", Some(bonus), ..) => Effect::Productivity { bonus },
            ("workforce_reduction", Some(fraction), ..) => Effect::WorkforceReduction { fraction },
            ("replace_input", _, Some(original), Some(replacement), _) => Effect::ReplaceInput {
                original,
                replacement,
            },
            ("extra_output", _, Some(good), _, Some(amount_per_cycle)) => Effect::ExtraOutput {
                good,
                amount_per_cycle,
            },
            (kind, ..) => bail!("Unknown or incomplete effect of kind '{}'", kind),
        };
        Ok(effect)
    }
}
