// Character record for the pirate role-playing sheet.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::health::{
    HealthEdit, HealthLedger, HealthOutcome, TemporaryPenalty, Tier, clamp_level,
};
use crate::record::lenient;

// The six characteristics. Display gives the column prefix used by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Attribute {
    #[strum(to_string = "POT")]
    Pot,
    #[strum(to_string = "AGI")]
    Agi,
    #[strum(to_string = "RES")]
    Res,
    #[strum(to_string = "CAR")]
    Car,
    #[strum(to_string = "VOL")]
    Vol,
    #[strum(to_string = "PER")]
    Per,
}

impl Attribute {
    pub fn full_name(self) -> &'static str {
        match self {
            Attribute::Pot => "Potenza",
            Attribute::Agi => "Agilità",
            Attribute::Res => "Resistenza",
            Attribute::Car => "Carisma",
            Attribute::Vol => "Volontà",
            Attribute::Per => "Percezione",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Column {
    #[strum(to_string = "base")]
    Base,
    #[strum(to_string = "bonus")]
    Bonus,
    #[strum(to_string = "temp")]
    Temp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Characteristic {
    pub base: i32,
    pub bonus: i32,
    pub temp: i32,
}

impl Characteristic {
    pub fn effective(&self) -> i32 {
        self.base + self.bonus + self.temp
    }
}

// Flat layout matches the JSON column stored by the backend: `POT`, `POT_bonus`, `POT_temp`...
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Characteristics {
    #[serde(rename = "POT", deserialize_with = "lenient::int")]
    pub pot: i32,
    #[serde(rename = "POT_bonus", deserialize_with = "lenient::int")]
    pub pot_bonus: i32,
    #[serde(rename = "POT_temp", deserialize_with = "lenient::int")]
    pub pot_temp: i32,
    #[serde(rename = "AGI", deserialize_with = "lenient::int")]
    pub agi: i32,
    #[serde(rename = "AGI_bonus", deserialize_with = "lenient::int")]
    pub agi_bonus: i32,
    #[serde(rename = "AGI_temp", deserialize_with = "lenient::int")]
    pub agi_temp: i32,
    #[serde(rename = "RES", deserialize_with = "lenient::int")]
    pub res: i32,
    #[serde(rename = "RES_bonus", deserialize_with = "lenient::int")]
    pub res_bonus: i32,
    #[serde(rename = "RES_temp", deserialize_with = "lenient::int")]
    pub res_temp: i32,
    #[serde(rename = "CAR", deserialize_with = "lenient::int")]
    pub car: i32,
    #[serde(rename = "CAR_bonus", deserialize_with = "lenient::int")]
    pub car_bonus: i32,
    #[serde(rename = "CAR_temp", deserialize_with = "lenient::int")]
    pub car_temp: i32,
    #[serde(rename = "VOL", deserialize_with = "lenient::int")]
    pub vol: i32,
    #[serde(rename = "VOL_bonus", deserialize_with = "lenient::int")]
    pub vol_bonus: i32,
    #[serde(rename = "VOL_temp", deserialize_with = "lenient::int")]
    pub vol_temp: i32,
    #[serde(rename = "PER", deserialize_with = "lenient::int")]
    pub per: i32,
    #[serde(rename = "PER_bonus", deserialize_with = "lenient::int")]
    pub per_bonus: i32,
    #[serde(rename = "PER_temp", deserialize_with = "lenient::int")]
    pub per_temp: i32,
    #[serde(rename = "combatStyle")]
    pub combat_style: String,
}

impl Default for Characteristics {
    fn default() -> Self {
        Characteristics {
            pot: 5,
            pot_bonus: 0,
            pot_temp: 0,
            agi: 5,
            agi_bonus: 0,
            agi_temp: 0,
            res: 5,
            res_bonus: 0,
            res_temp: 0,
            car: 5,
            car_bonus: 0,
            car_temp: 0,
            vol: 5,
            vol_bonus: 0,
            vol_temp: 0,
            per: 5,
            per_bonus: 0,
            per_temp: 0,
            combat_style: String::new(),
        }
    }
}

impl Characteristics {
    pub fn get(&self, attribute: Attribute) -> Characteristic {
        let (base, bonus, temp) = match attribute {
            Attribute::Pot => (self.pot, self.pot_bonus, self.pot_temp),
            Attribute::Agi => (self.agi, self.agi_bonus, self.agi_temp),
            Attribute::Res => (self.res, self.res_bonus, self.res_temp),
            Attribute::Car => (self.car, self.car_bonus, self.car_temp),
            Attribute::Vol => (self.vol, self.vol_bonus, self.vol_temp),
            Attribute::Per => (self.per, self.per_bonus, self.per_temp),
        };
        Characteristic { base, bonus, temp }
    }

    pub fn column_mut(&mut self, attribute: Attribute, column: Column) -> &mut i32 {
        match (attribute, column) {
            (Attribute::Pot, Column::Base) => &mut self.pot,
            (Attribute::Pot, Column::Bonus) => &mut self.pot_bonus,
            (Attribute::Pot, Column::Temp) => &mut self.pot_temp,
            (Attribute::Agi, Column::Base) => &mut self.agi,
            (Attribute::Agi, Column::Bonus) => &mut self.agi_bonus,
            (Attribute::Agi, Column::Temp) => &mut self.agi_temp,
            (Attribute::Res, Column::Base) => &mut self.res,
            (Attribute::Res, Column::Bonus) => &mut self.res_bonus,
            (Attribute::Res, Column::Temp) => &mut self.res_temp,
            (Attribute::Car, Column::Base) => &mut self.car,
            (Attribute::Car, Column::Bonus) => &mut self.car_bonus,
            (Attribute::Car, Column::Temp) => &mut self.car_temp,
            (Attribute::Vol, Column::Base) => &mut self.vol,
            (Attribute::Vol, Column::Bonus) => &mut self.vol_bonus,
            (Attribute::Vol, Column::Temp) => &mut self.vol_temp,
            (Attribute::Per, Column::Base) => &mut self.per,
            (Attribute::Per, Column::Bonus) => &mut self.per_bonus,
            (Attribute::Per, Column::Temp) => &mut self.per_temp,
        }
    }

    // The wound penalty owns the AGI and RES temporary columns.
    pub fn apply_penalty(&mut self, penalty: TemporaryPenalty) {
        self.agi_temp = penalty.agi;
        self.res_temp = penalty.res;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Points {
    #[serde(deserialize_with = "lenient::int")]
    pub fatigue: i32, // Stanchezza
    #[serde(deserialize_with = "lenient::int")]
    pub shounen: i32,
    #[serde(deserialize_with = "lenient::int")]
    pub willpower: i32, // Volontà
    #[serde(deserialize_with = "lenient::int")]
    pub morale: i32,
    #[serde(deserialize_with = "lenient::int")]
    pub material: i32, // Punti Materiale
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum AbilityCategory {
    #[strum(to_string = "Fisiche")]
    Physical,
    #[strum(to_string = "Interazione")]
    Interaction,
    #[strum(to_string = "Combattimento")]
    Combat,
    #[strum(to_string = "Sociali")]
    Social,
    #[strum(to_string = "Navali")]
    Naval,
    #[strum(to_string = "Professioni")]
    Profession,
    #[strum(to_string = "Conoscenze")]
    Knowledge,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Abilities {
    pub physical: Vec<String>,
    pub interaction: Vec<String>,
    pub combat: Vec<String>,
    pub social: Vec<String>,
    pub naval: Vec<String>,
    pub profession: Vec<String>,
    pub knowledge: Vec<String>,
}

impl Abilities {
    pub fn category(&self, category: AbilityCategory) -> &Vec<String> {
        match category {
            AbilityCategory::Physical => &self.physical,
            AbilityCategory::Interaction => &self.interaction,
            AbilityCategory::Combat => &self.combat,
            AbilityCategory::Social => &self.social,
            AbilityCategory::Naval => &self.naval,
            AbilityCategory::Profession => &self.profession,
            AbilityCategory::Knowledge => &self.knowledge,
        }
    }

    pub fn category_mut(&mut self, category: AbilityCategory) -> &mut Vec<String> {
        match category {
            AbilityCategory::Physical => &mut self.physical,
            AbilityCategory::Interaction => &mut self.interaction,
            AbilityCategory::Combat => &mut self.combat,
            AbilityCategory::Social => &mut self.social,
            AbilityCategory::Naval => &mut self.naval,
            AbilityCategory::Profession => &mut self.profession,
            AbilityCategory::Knowledge => &mut self.knowledge,
        }
    }

    pub fn add(&mut self, category: AbilityCategory, entry: &str) {
        let entry = entry.trim();
        if !entry.is_empty() {
            self.category_mut(category).push(entry.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        AbilityCategory::iter().all(|category| self.category(category).is_empty())
    }

    // Bulk import: one entry per non-blank line, filed under social.
    pub fn from_text(text: &str) -> Self {
        let mut abilities = Abilities::default();
        for line in text.lines() {
            abilities.add(AbilityCategory::Social, line);
        }
        abilities
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alteration {
    #[serde(deserialize_with = "lenient::int")]
    pub level: i32,
    pub label: String,
}

impl Default for Alteration {
    fn default() -> Self {
        Alteration {
            level: 1,
            label: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Status {
    pub traits: Vec<String>,    // Pregi/Difetti
    pub qualities: Vec<String>, // Qualità fuori dal combattimento
    pub alterations: Vec<Alteration>,
    #[serde(deserialize_with = "lenient::int")]
    pub level: i32,
    #[serde(deserialize_with = "lenient::int")]
    pub experience: i32,
}

impl Default for Status {
    fn default() -> Self {
        Status {
            traits: Vec::new(),
            qualities: Vec::new(),
            alterations: Vec::new(),
            level: 1,
            experience: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum WeaponType {
    #[default]
    #[strum(to_string = "mischia")]
    Melee,
    #[strum(to_string = "distanza")]
    Ranged,
    #[strum(to_string = "altro")]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Attack {
    pub name: String,
    pub style: String,
    pub weapon_type: WeaponType,
    pub damage: String,
    pub bonus: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Combat {
    #[serde(deserialize_with = "lenient::int")]
    pub defense: i32,
    #[serde(deserialize_with = "lenient::int")]
    pub rd: i32, // Riduzione Danno
    #[serde(deserialize_with = "lenient::int")]
    pub initiative: i32,
    #[serde(deserialize_with = "lenient::int")]
    pub base_movement: i32,
    #[serde(deserialize_with = "lenient::opt_int", skip_serializing_if = "Option::is_none")]
    pub swim_movement: Option<i32>,
    #[serde(deserialize_with = "lenient::opt_int", skip_serializing_if = "Option::is_none")]
    pub fly_movement: Option<i32>,
    pub attacks: Vec<Attack>,
    pub taken_damage: String,
    pub temp_modifiers: String,
    pub techniques: Vec<String>,
}

impl Default for Combat {
    fn default() -> Self {
        Combat {
            defense: 0,
            rd: 0,
            initiative: 0,
            base_movement: 5,
            swim_movement: None,
            fly_movement: None,
            attacks: Vec::new(),
            taken_damage: String::new(),
            temp_modifiers: String::new(),
            techniques: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Item {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(deserialize_with = "lenient::opt_int", skip_serializing_if = "Option::is_none")]
    pub material_points: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Relation {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Equipment {
    pub items: Vec<Item>,
    pub melee_weapons: Vec<Item>,
    pub ranged_weapons: Vec<Item>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carry_capacity: Option<String>,
    pub relations: Vec<Relation>, // Amicizia e Affinità
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Affinity {
    pub name: String,
    #[serde(deserialize_with = "lenient::int")]
    pub value: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterSheet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub name: String,
    pub background: String,
    pub dream: String,
    pub race: String,
    pub size: String,
    pub crew: String,
    pub appearance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub job: String, // Mestiere
    pub characteristics: Characteristics,
    pub points: Points,
    pub abilities: Abilities,
    pub status: Status,
    pub combat: Combat,
    pub equipment: Equipment,
    pub health: HealthLedger,
    pub affinities: Vec<Affinity>,
    #[serde(deserialize_with = "lenient::int_map")]
    pub modifiers: BTreeMap<String, i32>, // es. movement: -3, AGI: -1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// One display row of the health table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierRow {
    pub tier: Tier,
    pub base_shown: i32,
    pub bonus: i32,
    pub damage: i32,
    pub total: i32,
}

/// Display-ready health values for the sheet view and the PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSummary {
    pub rows: Vec<TierRow>,
    pub max: i32,
    pub total_damage: i32,
    pub current: i32,
    pub wound_tier: Tier,
    pub penalty: TemporaryPenalty,
    pub malus_notes: String,
}

impl CharacterSheet {
    pub fn new_for(user_id: impl Into<String>) -> Self {
        let mut modifiers = BTreeMap::new();
        modifiers.insert("movement".to_string(), 0);
        modifiers.insert("AGI".to_string(), 0);
        modifiers.insert("RES".to_string(), 0);
        CharacterSheet {
            user_id: Some(user_id.into()),
            modifiers,
            ..CharacterSheet::default()
        }
    }

    // Level as used by the calculator, kept inside the ledger domain.
    pub fn level(&self) -> i32 {
        clamp_level(self.status.level)
    }

    pub fn set_level(&mut self, level: i32) -> HealthOutcome {
        self.status.level = clamp_level(level);
        self.refresh_health()
    }

    pub fn apply_health_edit(&mut self, edit: HealthEdit) -> HealthOutcome {
        let level = self.level();
        let outcome = self.health.apply(edit, level);
        self.characteristics.apply_penalty(outcome.penalty);
        outcome
    }

    // Re-derive the penalty after anything that changes capacities or damages.
    pub fn refresh_health(&mut self) -> HealthOutcome {
        let outcome = self.health.evaluate(self.level());
        self.characteristics.apply_penalty(outcome.penalty);
        outcome
    }

    pub fn health_summary(&self) -> HealthSummary {
        let level = self.level();
        let outcome = self.health.evaluate(level);
        let rows = Tier::iter()
            .map(|tier| {
                let entry = self.health.entry(tier);
                let total = outcome.derived.tier_capacity[tier.index()];
                TierRow {
                    tier,
                    base_shown: total.saturating_sub(entry.bonus),
                    bonus: entry.bonus,
                    damage: entry.damage,
                    total,
                }
            })
            .collect();
        HealthSummary {
            rows,
            max: outcome.derived.total_capacity,
            total_damage: outcome.derived.total_damage,
            current: outcome.derived.current,
            wound_tier: outcome.wound_tier,
            penalty: outcome.penalty,
            malus_notes: self.health.malus_notes.clone(),
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "Senza nome"
        } else {
            &self.name
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sheet_starts_unhurt_at_level_one() {
        let sheet = CharacterSheet::new_for("user-1");
        assert_eq!(sheet.level(), 1);
        assert_eq!(sheet.characteristics.get(Attribute::Pot).base, 5);
        let summary = sheet.health_summary();
        assert_eq!(summary.max, 15);
        assert_eq!(summary.current, 15);
        assert_eq!(summary.wound_tier, Tier::Illeso);
    }

    #[test]
    fn crossing_the_fourth_tier_sets_temporary_penalty() {
        let mut sheet = CharacterSheet::new_for("user-1");
        sheet.apply_health_edit(HealthEdit::TotalDamage(13));
        assert_eq!(sheet.characteristics.agi_temp, -1);
        assert_eq!(sheet.characteristics.res_temp, -1);
        assert_eq!(sheet.characteristics.get(Attribute::Agi).effective(), 4);

        sheet.apply_health_edit(HealthEdit::TotalDamage(3));
        assert_eq!(sheet.characteristics.agi_temp, 0);
        assert_eq!(sheet.characteristics.res_temp, 0);
    }

    #[test]
    fn levelling_up_can_lift_the_penalty() {
        let mut sheet = CharacterSheet::new_for("user-1");
        sheet.apply_health_edit(HealthEdit::TotalDamage(13));
        assert_eq!(sheet.characteristics.agi_temp, -1);
        // Level 3 widens tiers 1-5 by two each, so 13 damage only reaches tier 2.
        let outcome = sheet.set_level(3);
        assert_eq!(outcome.wound_tier, Tier::Graffiato);
        assert_eq!(sheet.characteristics.agi_temp, 0);
    }

    #[test]
    fn summary_rows_show_level_adjusted_base() {
        let mut sheet = CharacterSheet::new_for("user-1");
        sheet.status.level = 3;
        sheet.apply_health_edit(HealthEdit::Bonus(Tier::Illeso, 2));
        let summary = sheet.health_summary();
        assert_eq!(summary.rows[0].base_shown, 7);
        assert_eq!(summary.rows[0].total, 9);
        assert_eq!(summary.rows[5].base_shown, 0);
    }

    #[test]
    fn bulk_ability_text_goes_to_social() {
        let abilities = Abilities::from_text("Navigazione\n\n  Cucina  \n");
        assert_eq!(abilities.social, vec!["Navigazione", "Cucina"]);
        assert!(abilities.physical.is_empty());
        assert!(!abilities.is_empty());
    }

    #[test]
    fn characteristics_use_flat_column_names() {
        let mut characteristics = Characteristics::default();
        *characteristics.column_mut(Attribute::Per, Column::Bonus) = 2;
        let json = serde_json::to_value(&characteristics).unwrap();
        assert_eq!(json["PER_bonus"], 2);
        assert_eq!(json["POT"], 5);
        assert_eq!(json["combatStyle"], "");
    }
}
