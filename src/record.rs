//! Mapping between [`CharacterSheet`] and the flat row stored in the `characters` table.
//!
//! The table keeps the health ledger as individual columns (`hp_bonus_l1`..`hp_dmg_l6`) and the
//! affinities inside the `points` JSON column. Values read back are coerced leniently.

use chrono::{SecondsFormat, Utc};
use log::warn;
use serde_json::{Map, Value};

use crate::character::{Affinity, CharacterSheet};
use crate::error::{Error, Result};
use crate::health::{HealthLedger, Tier, clamp_bonus, clamp_damage, clamp_level, compute_derived};
use crate::session::Role;
use strum::IntoEnumIterator;

const HP_MAX: &str = "hp_max";
const HP_CURRENT: &str = "hp_current";
const HP_TOTAL_DAMAGE: &str = "hp_total_damage";
const HP_WOUNDS: &str = "hp_wounds";
const HP_MALUS_NOTES: &str = "hp_malus_notes";

fn bonus_column(tier: Tier) -> String {
    format!("hp_bonus_l{}", tier.number())
}

fn damage_column(tier: Tier) -> String {
    format!("hp_dmg_l{}", tier.number())
}

/// Lenient numeric coercion for persisted values.
pub mod lenient {
    use log::warn;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use std::collections::BTreeMap;

    // Numbers, numeric strings and booleans are accepted. Anything else reads as zero.
    pub fn coerce(value: &Value, field: &str) -> i32 {
        match try_coerce(value) {
            Some(number) => number,
            None => {
                if !value.is_null() {
                    warn!("Non-numeric value {} for '{}', using 0", value, field);
                }
                0
            }
        }
    }

    pub fn try_coerce(value: &Value) -> Option<i32> {
        let number = match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            }
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }?;
        Some(number.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
    }

    pub fn int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(coerce(&value, "number"))
    }

    pub fn opt_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(coerce(&value, "number")))
    }

    pub fn int_map<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, i32>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let mut map = BTreeMap::new();
        if let Value::Object(entries) = value {
            for (key, entry) in entries {
                let number = coerce(&entry, &key);
                map.insert(key, number);
            }
        }
        Ok(map)
    }
}

/// Owner data joined onto a roster row by the embedded `profiles` select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub sheet: CharacterSheet,
    pub owner_email: Option<String>,
    pub owner_role: Option<Role>,
}

impl RosterEntry {
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.sheet.name.to_lowercase().contains(&query)
            || self.sheet.crew.to_lowercase().contains(&query)
    }
}

pub fn filter_roster<'a>(entries: &'a [RosterEntry], query: &str) -> Vec<&'a RosterEntry> {
    entries.iter().filter(|entry| entry.matches(query)).collect()
}

pub fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn to_row(sheet: &CharacterSheet) -> Result<Value> {
    to_row_stamped(sheet, &now_stamp())
}

pub fn to_row_stamped(sheet: &CharacterSheet, updated_at: &str) -> Result<Value> {
    let mut value = serde_json::to_value(sheet)?;
    let row = value
        .as_object_mut()
        .ok_or_else(|| Error::BadRequest("character did not serialize to an object".to_string()))?;

    row.remove("health");
    let affinities = row.remove("affinities").unwrap_or(Value::Array(Vec::new()));
    if let Some(Value::Object(points)) = row.get_mut("points") {
        points.insert("affinities".to_string(), affinities);
    }

    let ledger = &sheet.health;
    for tier in Tier::iter() {
        let entry = ledger.entry(tier);
        row.insert(bonus_column(tier), Value::from(entry.bonus));
        row.insert(damage_column(tier), Value::from(entry.damage));
    }
    let derived = compute_derived(ledger, sheet.level());
    row.insert(HP_MAX.to_string(), Value::from(derived.total_capacity));
    row.insert(HP_CURRENT.to_string(), Value::from(derived.current));
    row.insert(HP_TOTAL_DAMAGE.to_string(), Value::from(ledger.total_damage()));
    row.insert(
        HP_WOUNDS.to_string(),
        ledger.wounds.map(Value::from).unwrap_or(Value::Null),
    );
    row.insert(
        HP_MALUS_NOTES.to_string(),
        Value::String(ledger.malus_notes.clone()),
    );
    row.insert("updated_at".to_string(), Value::String(updated_at.to_string()));
    Ok(value)
}

pub fn from_row(row: Value) -> Result<CharacterSheet> {
    let Value::Object(mut row) = strip_nulls(row) else {
        return Err(Error::BadRequest("character row is not an object".to_string()));
    };
    row.remove("profiles");
    let health = take_ledger(&mut row);
    let affinities = take_affinities(&mut row);

    let mut sheet: CharacterSheet = serde_json::from_value(Value::Object(row))?;
    sheet.health = health;
    sheet.affinities = affinities;
    sheet.status.level = clamp_level(sheet.status.level);
    sheet.health.settle(sheet.status.level);
    Ok(sheet)
}

pub fn roster_entry(row: Value) -> Result<RosterEntry> {
    let owner = match row.get("profiles") {
        Some(Value::Array(items)) => items.first().cloned(),
        Some(Value::Object(profile)) => Some(Value::Object(profile.clone())),
        _ => None,
    };
    let owner_email = owner
        .as_ref()
        .and_then(|p| p.get("email"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let owner_role = owner
        .as_ref()
        .and_then(|p| p.get("role"))
        .and_then(Value::as_str)
        .map(Role::parse);
    Ok(RosterEntry {
        sheet: from_row(row)?,
        owner_email,
        owner_role,
    })
}

fn take_ledger(row: &mut Map<String, Value>) -> HealthLedger {
    let mut ledger = HealthLedger::default();
    for tier in Tier::iter() {
        let bonus_key = bonus_column(tier);
        let damage_key = damage_column(tier);
        let entry = ledger.entry_mut(tier);
        if let Some(value) = row.remove(&bonus_key) {
            entry.bonus = clamp_bonus(lenient::coerce(&value, &bonus_key));
        }
        if let Some(value) = row.remove(&damage_key) {
            entry.damage = clamp_damage(lenient::coerce(&value, &damage_key));
        }
    }
    ledger.wounds = row
        .remove(HP_WOUNDS)
        .map(|value| lenient::coerce(&value, HP_WOUNDS));
    ledger.malus_notes = match row.remove(HP_MALUS_NOTES) {
        Some(Value::String(notes)) => notes,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    // Derived columns are recomputed on every write and never read back.
    for key in [HP_MAX, HP_CURRENT, HP_TOTAL_DAMAGE, "health"] {
        row.remove(key);
    }
    ledger
}

fn take_affinities(row: &mut Map<String, Value>) -> Vec<Affinity> {
    let nested = row
        .get_mut("points")
        .and_then(Value::as_object_mut)
        .and_then(|points| points.remove("affinities"));
    let top_level = row.remove("affinities");
    match nested.or(top_level) {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(affinity) => Some(affinity),
                Err(e) => {
                    warn!("Skipping malformed affinity: {}", e);
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

// Null means "not set" in the table; dropping it lets serde defaults apply.
fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthEdit;
    use serde_json::json;

    fn wounded_sheet() -> CharacterSheet {
        let mut sheet = CharacterSheet::new_for("owner-1");
        sheet.name = "Rufy".to_string();
        sheet.crew = "Cappello di Paglia".to_string();
        sheet.apply_health_edit(HealthEdit::Bonus(Tier::Leso, 2));
        sheet.apply_health_edit(HealthEdit::TotalDamage(9));
        sheet.affinities.push(Affinity {
            name: "Zoro".to_string(),
            value: 3,
        });
        sheet
    }

    #[test]
    fn row_flattens_the_ledger() {
        let row = to_row_stamped(&wounded_sheet(), "2024-01-01T00:00:00.000Z").unwrap();
        assert_eq!(row["hp_bonus_l3"], 2);
        assert_eq!(row["hp_dmg_l1"], 5);
        assert_eq!(row["hp_dmg_l2"], 4);
        assert_eq!(row["hp_total_damage"], 9);
        assert_eq!(row["hp_max"], 17);
        assert_eq!(row["hp_current"], 8);
        assert_eq!(row["points"]["affinities"][0]["name"], "Zoro");
        assert!(row.get("health").is_none());
        assert!(row.get("affinities").is_none());
        assert_eq!(row["updated_at"], "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn row_maps_back_to_the_same_sheet() {
        let sheet = wounded_sheet();
        let row = to_row_stamped(&sheet, "2024-01-01T00:00:00.000Z").unwrap();
        let back = from_row(row).unwrap();
        assert_eq!(back.health, sheet.health);
        assert_eq!(back.affinities, sheet.affinities);
        assert_eq!(back.name, "Rufy");
        assert_eq!(back.updated_at.as_deref(), Some("2024-01-01T00:00:00.000Z"));
    }

    #[test]
    fn non_numeric_values_read_as_zero() {
        let row = json!({
            "user_id": "owner-2",
            "name": "Nami",
            "hp_bonus_l1": "3",
            "hp_dmg_l1": "abc",
            "hp_dmg_l2": null,
            "hp_dmg_l3": 2.7,
            "characteristics": { "POT": "7", "AGI": "fast", "RES": true },
            "status": { "level": "0" },
            "combat": { "defense": null, "swimMovement": "4" }
        });
        let sheet = from_row(row).unwrap();
        assert_eq!(sheet.health.entry(Tier::Illeso).bonus, 3);
        assert_eq!(sheet.health.entry(Tier::Illeso).damage, 0);
        assert_eq!(sheet.health.entry(Tier::Graffiato).damage, 0);
        assert_eq!(sheet.health.entry(Tier::Leso).damage, 2);
        assert_eq!(sheet.characteristics.pot, 7);
        assert_eq!(sheet.characteristics.agi, 0);
        assert_eq!(sheet.characteristics.res, 1);
        assert_eq!(sheet.characteristics.vol, 5);
        assert_eq!(sheet.status.level, 1);
        assert_eq!(sheet.combat.defense, 0);
        assert_eq!(sheet.combat.swim_movement, Some(4));
        assert_eq!(sheet.combat.base_movement, 5);
    }

    #[test]
    fn out_of_range_rows_are_brought_into_the_ledger_domain() {
        let row = json!({
            "user_id": "owner-3",
            "status": { "level": 3_000_000_000u64 },
            "hp_bonus_l1": i64::MAX,
            "hp_dmg_l2": 40,
        });
        let sheet = from_row(row).unwrap();
        assert_eq!(sheet.status.level, crate::health::MAX_LEVEL);
        assert_eq!(sheet.health.entry(Tier::Illeso).bonus, crate::health::MAX_BONUS);
        assert_eq!(sheet.health.entry(Tier::Graffiato).damage, 40);
        let summary = sheet.health_summary();
        assert_eq!(summary.current, summary.max - 40);

        let low = from_row(json!({ "user_id": "owner-4", "hp_dmg_l1": 9 })).unwrap();
        assert_eq!(low.health.damages(), [5, 0, 0, 0, 0, 4]);
    }

    #[test]
    fn nested_affinities_win_over_top_level() {
        let row = json!({
            "affinities": [{ "name": "old", "value": 1 }],
            "points": { "fatigue": 2, "affinities": [{ "name": "new", "value": "4" }] }
        });
        let sheet = from_row(row).unwrap();
        assert_eq!(sheet.affinities.len(), 1);
        assert_eq!(sheet.affinities[0].name, "new");
        assert_eq!(sheet.affinities[0].value, 4);
        assert_eq!(sheet.points.fatigue, 2);
    }

    #[test]
    fn roster_keeps_joined_owner_and_filters() {
        let row = json!({
            "name": "Usopp",
            "crew": "Cappello di Paglia",
            "profiles": { "id": "u3", "email": "usopp@example.com", "role": "player" }
        });
        let entries = vec![
            roster_entry(row).unwrap(),
            roster_entry(json!({ "name": "Smoker", "crew": "Marina" })).unwrap(),
        ];
        assert_eq!(entries[0].owner_email.as_deref(), Some("usopp@example.com"));
        assert_eq!(entries[0].owner_role, Some(Role::Player));
        assert_eq!(filter_roster(&entries, "paglia").len(), 1);
        assert_eq!(filter_roster(&entries, "SMOK")[0].sheet.name, "Smoker");
        assert_eq!(filter_roster(&entries, "  ").len(), 2);
    }
}
