//! Editable fields of the character sheet, as shown in the editor.
//!
//! Every field reads its current value as a single line of text and writes it back from the
//! text the user typed. Health fields go through the ledger so derived values and the temporary
//! penalty stay in step with every keystroke.

use strum::IntoEnumIterator;

use crate::character::{
    AbilityCategory, Abilities, Affinity, Alteration, Attack, Attribute, CharacterSheet, Column,
    Item, Relation, WeaponType,
};
use crate::health::{HealthEdit, Tier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Race,
    Size,
    Crew,
    Job,
    Dream,
    Appearance,
    Background,
    ImageUrl,
    Level,
    Experience,
    Characteristic(Attribute, Column),
    CombatStyle,
    TierBonus(Tier),
    TierDamage(Tier),
    TotalDamage,
    Wounds,
    MalusNotes,
    Fatigue,
    Shounen,
    Willpower,
    Morale,
    Material,
    Ability(AbilityCategory),
    AbilityImport,
    Traits,
    Qualities,
    Alterations,
    Affinities,
    Relations,
    Defense,
    Rd,
    Initiative,
    BaseMovement,
    SwimMovement,
    FlyMovement,
    Attacks,
    Techniques,
    TakenDamage,
    TempModifiers,
    Modifiers,
    Items,
    MeleeWeapons,
    RangedWeapons,
    CarryCapacity,
    EquipmentNotes,
}

const SEPARATOR: char = ';';

fn parse_int(text: &str) -> Result<i32, String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(0);
    }
    text.parse::<i32>()
        .map_err(|_| format!("'{}' non è un numero", text))
}

fn parse_opt_int(text: &str) -> Result<Option<i32>, String> {
    if text.trim().is_empty() {
        Ok(None)
    } else {
        parse_int(text).map(Some)
    }
}

fn split_list(text: &str) -> Vec<String> {
    text.split(SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn join_list(items: &[String]) -> String {
    items.join("; ")
}

// `name (note)` pairs used by items and relations.
fn split_note(entry: &str) -> (String, Option<String>) {
    match entry.strip_suffix(')').and_then(|rest| rest.rsplit_once(" (")) {
        Some((name, note)) => (name.trim().to_string(), Some(note.trim().to_string())),
        None => (entry.trim().to_string(), None),
    }
}

fn with_note(name: &str, note: Option<&str>) -> String {
    match note {
        Some(note) if !note.trim().is_empty() => format!("{} ({})", name, note),
        _ => name.to_string(),
    }
}

fn read_items(items: &[Item]) -> String {
    items
        .iter()
        .map(|item| with_note(&item.name, item.notes.as_deref()))
        .collect::<Vec<_>>()
        .join("; ")
}

// Material points are not shown in the line, so they are kept for items that keep their name.
fn write_items(previous: &[Item], text: &str) -> Vec<Item> {
    split_list(text)
        .iter()
        .map(|entry| {
            let (name, notes) = split_note(entry);
            let material_points = previous
                .iter()
                .find(|item| item.name == name)
                .and_then(|item| item.material_points);
            Item {
                name,
                notes,
                material_points,
            }
        })
        .collect()
}

fn parse_pairs(text: &str) -> Vec<(String, i32)> {
    split_list(text)
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => (key.trim().to_string(), parse_int(value).unwrap_or_default()),
            None => (entry.clone(), 0),
        })
        .collect()
}

fn weapon_type(text: &str) -> WeaponType {
    match text.trim().to_lowercase().as_str() {
        "distanza" | "ranged" => WeaponType::Ranged,
        "altro" | "other" => WeaponType::Other,
        _ => WeaponType::Melee,
    }
}

fn read_attacks(attacks: &[Attack]) -> String {
    attacks
        .iter()
        .map(|a| format!("{} | {} | {} | {} | {}", a.name, a.style, a.weapon_type, a.damage, a.bonus))
        .collect::<Vec<_>>()
        .join("; ")
}

fn write_attacks(text: &str) -> Vec<Attack> {
    split_list(text)
        .iter()
        .map(|entry| {
            let mut parts = entry.split('|').map(str::trim);
            let mut next = || parts.next().unwrap_or_default().to_string();
            Attack {
                name: next(),
                style: next(),
                weapon_type: weapon_type(&next()),
                damage: next(),
                bonus: next(),
            }
        })
        .collect()
}

fn read_alterations(alterations: &[Alteration]) -> String {
    alterations
        .iter()
        .map(|a| format!("{}: {}", a.level, a.label))
        .collect::<Vec<_>>()
        .join("; ")
}

fn write_alterations(text: &str) -> Vec<Alteration> {
    split_list(text)
        .iter()
        .map(|entry| match entry.split_once(':') {
            Some((level, label)) if parse_int(level).is_ok() => Alteration {
                level: parse_int(level).unwrap_or(1).max(1),
                label: label.trim().to_string(),
            },
            _ => Alteration {
                level: 1,
                label: entry.clone(),
            },
        })
        .collect()
}

impl Field {
    /// Editor order, grouped by sheet section.
    pub fn all() -> Vec<Field> {
        let mut fields = vec![
            Field::Name,
            Field::Race,
            Field::Size,
            Field::Crew,
            Field::Job,
            Field::Dream,
            Field::Appearance,
            Field::Background,
            Field::ImageUrl,
            Field::Level,
            Field::Experience,
        ];
        for attribute in Attribute::iter() {
            for column in Column::iter() {
                fields.push(Field::Characteristic(attribute, column));
            }
        }
        fields.push(Field::CombatStyle);
        for tier in Tier::iter() {
            fields.push(Field::TierBonus(tier));
            fields.push(Field::TierDamage(tier));
        }
        fields.extend([
            Field::TotalDamage,
            Field::Wounds,
            Field::MalusNotes,
            Field::Fatigue,
            Field::Shounen,
            Field::Willpower,
            Field::Morale,
            Field::Material,
        ]);
        fields.extend(AbilityCategory::iter().map(Field::Ability));
        fields.extend([
            Field::AbilityImport,
            Field::Traits,
            Field::Qualities,
            Field::Alterations,
            Field::Affinities,
            Field::Relations,
            Field::Defense,
            Field::Rd,
            Field::Initiative,
            Field::BaseMovement,
            Field::SwimMovement,
            Field::FlyMovement,
            Field::Attacks,
            Field::Techniques,
            Field::TakenDamage,
            Field::TempModifiers,
            Field::Modifiers,
            Field::Items,
            Field::MeleeWeapons,
            Field::RangedWeapons,
            Field::CarryCapacity,
            Field::EquipmentNotes,
        ]);
        fields
    }

    pub fn section(self) -> &'static str {
        use Field::*;
        match self {
            Name | Race | Size | Crew | Job | Dream | Appearance | Background | ImageUrl | Level
            | Experience => "Dati anagrafici",
            Characteristic(..) | CombatStyle => "Caratteristiche",
            TierBonus(_) | TierDamage(_) | TotalDamage | Wounds | MalusNotes => "Livelli di Salute",
            Fatigue | Shounen | Willpower | Morale | Material | Ability(_) | AbilityImport
            | Traits | Qualities | Alterations => "Punti & Abilità",
            Affinities | Relations => "Amicizia & Affinità",
            Defense | Rd | Initiative | BaseMovement | SwimMovement | FlyMovement | Attacks
            | Techniques | TakenDamage | TempModifiers | Modifiers => "Combattimento",
            Items | MeleeWeapons | RangedWeapons | CarryCapacity | EquipmentNotes => {
                "Equipaggiamento"
            }
        }
    }

    pub fn label(self) -> String {
        match self {
            Field::Name => "Nome".to_string(),
            Field::Race => "Razza".to_string(),
            Field::Size => "Taglia".to_string(),
            Field::Crew => "Ciurma".to_string(),
            Field::Job => "Mestiere".to_string(),
            Field::Dream => "Sogno".to_string(),
            Field::Appearance => "Aspetto".to_string(),
            Field::Background => "Background".to_string(),
            Field::ImageUrl => "Immagine (URL)".to_string(),
            Field::Level => "Livello".to_string(),
            Field::Experience => "Esperienza".to_string(),
            Field::Characteristic(attribute, Column::Base) => attribute.to_string(),
            Field::Characteristic(attribute, column) => format!("{} {}", attribute, column),
            Field::CombatStyle => "Stile di combattimento".to_string(),
            Field::TierBonus(tier) => format!("{} bonus", tier.label()),
            Field::TierDamage(tier) => format!("{} danni", tier.label()),
            Field::TotalDamage => "Danni totali".to_string(),
            Field::Wounds => "Ferite".to_string(),
            Field::MalusNotes => "Note malus".to_string(),
            Field::Fatigue => "Stanchezza".to_string(),
            Field::Shounen => "Punti Shounen".to_string(),
            Field::Willpower => "Volontà".to_string(),
            Field::Morale => "Morale".to_string(),
            Field::Material => "Punti Materiale".to_string(),
            Field::Ability(category) => format!("Abilità {}", category),
            Field::AbilityImport => "Importa abilità (una per riga)".to_string(),
            Field::Traits => "Pregi/Difetti".to_string(),
            Field::Qualities => "Qualità".to_string(),
            Field::Alterations => "Alterazioni (liv: nome)".to_string(),
            Field::Affinities => "Affinità (nome=valore)".to_string(),
            Field::Relations => "Amicizie (nome (affinità))".to_string(),
            Field::Defense => "Difesa".to_string(),
            Field::Rd => "RD".to_string(),
            Field::Initiative => "Iniziativa".to_string(),
            Field::BaseMovement => "Movimento".to_string(),
            Field::SwimMovement => "Movimento nuoto".to_string(),
            Field::FlyMovement => "Movimento volo".to_string(),
            Field::Attacks => "Attacchi (nome | stile | tipo | danni | bonus)".to_string(),
            Field::Techniques => "Tecniche".to_string(),
            Field::TakenDamage => "Danni subiti".to_string(),
            Field::TempModifiers => "Modificatori temporanei".to_string(),
            Field::Modifiers => "Modificatori (chiave=valore)".to_string(),
            Field::Items => "Oggetti".to_string(),
            Field::MeleeWeapons => "Armi da mischia".to_string(),
            Field::RangedWeapons => "Armi a distanza".to_string(),
            Field::CarryCapacity => "Capacità di carico".to_string(),
            Field::EquipmentNotes => "Note equipaggiamento".to_string(),
        }
    }

    /// Applied once when the user leaves the field instead of on every keystroke.
    pub fn commits_on_blur(self) -> bool {
        matches!(self, Field::AbilityImport)
    }

    pub fn read(self, sheet: &CharacterSheet) -> String {
        let c = &sheet.combat;
        let e = &sheet.equipment;
        match self {
            Field::Name => sheet.name.clone(),
            Field::Race => sheet.race.clone(),
            Field::Size => sheet.size.clone(),
            Field::Crew => sheet.crew.clone(),
            Field::Job => sheet.job.clone(),
            Field::Dream => sheet.dream.clone(),
            Field::Appearance => sheet.appearance.clone(),
            Field::Background => sheet.background.clone(),
            Field::ImageUrl => sheet.image_url.clone().unwrap_or_default(),
            Field::Level => sheet.level().to_string(),
            Field::Experience => sheet.status.experience.to_string(),
            Field::Characteristic(attribute, column) => {
                let value = sheet.characteristics.get(attribute);
                match column {
                    Column::Base => value.base,
                    Column::Bonus => value.bonus,
                    Column::Temp => value.temp,
                }
                .to_string()
            }
            Field::CombatStyle => sheet.characteristics.combat_style.clone(),
            Field::TierBonus(tier) => sheet.health.entry(tier).bonus.to_string(),
            Field::TierDamage(tier) => sheet.health.entry(tier).damage.to_string(),
            Field::TotalDamage => sheet.health.total_damage().to_string(),
            Field::Wounds => sheet.health.wounds.map(|w| w.to_string()).unwrap_or_default(),
            Field::MalusNotes => sheet.health.malus_notes.clone(),
            Field::Fatigue => sheet.points.fatigue.to_string(),
            Field::Shounen => sheet.points.shounen.to_string(),
            Field::Willpower => sheet.points.willpower.to_string(),
            Field::Morale => sheet.points.morale.to_string(),
            Field::Material => sheet.points.material.to_string(),
            Field::Ability(category) => join_list(sheet.abilities.category(category)),
            Field::AbilityImport => String::new(),
            Field::Traits => join_list(&sheet.status.traits),
            Field::Qualities => join_list(&sheet.status.qualities),
            Field::Alterations => read_alterations(&sheet.status.alterations),
            Field::Affinities => sheet
                .affinities
                .iter()
                .map(|a| format!("{}={}", a.name, a.value))
                .collect::<Vec<_>>()
                .join("; "),
            Field::Relations => e
                .relations
                .iter()
                .map(|r| with_note(&r.name, r.affinity.as_deref()))
                .collect::<Vec<_>>()
                .join("; "),
            Field::Defense => c.defense.to_string(),
            Field::Rd => c.rd.to_string(),
            Field::Initiative => c.initiative.to_string(),
            Field::BaseMovement => c.base_movement.to_string(),
            Field::SwimMovement => c.swim_movement.map(|v| v.to_string()).unwrap_or_default(),
            Field::FlyMovement => c.fly_movement.map(|v| v.to_string()).unwrap_or_default(),
            Field::Attacks => read_attacks(&c.attacks),
            Field::Techniques => join_list(&c.techniques),
            Field::TakenDamage => c.taken_damage.clone(),
            Field::TempModifiers => c.temp_modifiers.clone(),
            Field::Modifiers => sheet
                .modifiers
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect::<Vec<_>>()
                .join("; "),
            Field::Items => read_items(&e.items),
            Field::MeleeWeapons => read_items(&e.melee_weapons),
            Field::RangedWeapons => read_items(&e.ranged_weapons),
            Field::CarryCapacity => e.carry_capacity.clone().unwrap_or_default(),
            Field::EquipmentNotes => join_list(&e.notes),
        }
    }

    /// Writes `text` into the sheet. On error the sheet is left unchanged.
    pub fn write(self, sheet: &mut CharacterSheet, text: &str) -> Result<(), String> {
        let trimmed = text.trim();
        match self {
            Field::Name => sheet.name = text.to_string(),
            Field::Race => sheet.race = text.to_string(),
            Field::Size => sheet.size = text.to_string(),
            Field::Crew => sheet.crew = text.to_string(),
            Field::Job => sheet.job = text.to_string(),
            Field::Dream => sheet.dream = text.to_string(),
            Field::Appearance => sheet.appearance = text.to_string(),
            Field::Background => sheet.background = text.to_string(),
            Field::ImageUrl => {
                sheet.image_url = Some(trimmed.to_string()).filter(|url| !url.is_empty())
            }
            Field::Level => {
                sheet.set_level(parse_int(text)?);
            }
            Field::Experience => sheet.status.experience = parse_int(text)?,
            Field::Characteristic(attribute, column) => {
                *sheet.characteristics.column_mut(attribute, column) = parse_int(text)?
            }
            Field::CombatStyle => sheet.characteristics.combat_style = text.to_string(),
            Field::TierBonus(tier) => {
                sheet.apply_health_edit(HealthEdit::Bonus(tier, parse_int(text)?));
            }
            Field::TierDamage(tier) => {
                sheet.apply_health_edit(HealthEdit::Damage(tier, parse_int(text)?));
            }
            Field::TotalDamage => {
                sheet.apply_health_edit(HealthEdit::TotalDamage(parse_int(text)?));
            }
            Field::Wounds => sheet.health.wounds = parse_opt_int(text)?,
            Field::MalusNotes => {
                sheet.apply_health_edit(HealthEdit::MalusNotes(text.to_string()));
            }
            Field::Fatigue => sheet.points.fatigue = parse_int(text)?,
            Field::Shounen => sheet.points.shounen = parse_int(text)?,
            Field::Willpower => sheet.points.willpower = parse_int(text)?,
            Field::Morale => sheet.points.morale = parse_int(text)?,
            Field::Material => sheet.points.material = parse_int(text)?,
            Field::Ability(category) => *sheet.abilities.category_mut(category) = split_list(text),
            Field::AbilityImport => {
                let imported = Abilities::from_text(text);
                sheet.abilities.social.extend(imported.social);
            }
            Field::Traits => sheet.status.traits = split_list(text),
            Field::Qualities => sheet.status.qualities = split_list(text),
            Field::Alterations => sheet.status.alterations = write_alterations(text),
            Field::Affinities => {
                sheet.affinities = parse_pairs(text)
                    .into_iter()
                    .map(|(name, value)| Affinity { name, value })
                    .collect()
            }
            Field::Relations => {
                sheet.equipment.relations = split_list(text)
                    .iter()
                    .map(|entry| {
                        let (name, affinity) = split_note(entry);
                        Relation { name, affinity }
                    })
                    .collect()
            }
            Field::Defense => sheet.combat.defense = parse_int(text)?,
            Field::Rd => sheet.combat.rd = parse_int(text)?,
            Field::Initiative => sheet.combat.initiative = parse_int(text)?,
            Field::BaseMovement => sheet.combat.base_movement = parse_int(text)?,
            Field::SwimMovement => sheet.combat.swim_movement = parse_opt_int(text)?,
            Field::FlyMovement => sheet.combat.fly_movement = parse_opt_int(text)?,
            Field::Attacks => sheet.combat.attacks = write_attacks(text),
            Field::Techniques => sheet.combat.techniques = split_list(text),
            Field::TakenDamage => sheet.combat.taken_damage = text.to_string(),
            Field::TempModifiers => sheet.combat.temp_modifiers = text.to_string(),
            Field::Modifiers => sheet.modifiers = parse_pairs(text).into_iter().collect(),
            Field::Items => sheet.equipment.items = write_items(&sheet.equipment.items, text),
            Field::MeleeWeapons => {
                sheet.equipment.melee_weapons = write_items(&sheet.equipment.melee_weapons, text)
            }
            Field::RangedWeapons => {
                sheet.equipment.ranged_weapons = write_items(&sheet.equipment.ranged_weapons, text)
            }
            Field::CarryCapacity => {
                sheet.equipment.carry_capacity = Some(text.to_string()).filter(|_| !trimmed.is_empty())
            }
            Field::EquipmentNotes => sheet.equipment.notes = split_list(text),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> CharacterSheet {
        CharacterSheet::new_for("u1")
    }

    #[test]
    fn every_field_belongs_to_a_document_section() {
        let document = crate::export::SheetDocument::from_sheet(&sheet());
        for field in Field::all() {
            assert!(document.section(field.section()).is_some(), "{:?}", field);
        }
    }

    #[test]
    fn total_damage_edit_redistributes_and_sets_penalty() {
        let mut sheet = sheet();
        Field::TotalDamage.write(&mut sheet, "13").unwrap();
        assert_eq!(Field::TierDamage(Tier::Ferito).read(&sheet), "1");
        assert_eq!(Field::Characteristic(Attribute::Agi, Column::Temp).read(&sheet), "-1");
        assert_eq!(Field::TotalDamage.read(&sheet), "13");
    }

    #[test]
    fn invalid_numbers_leave_the_sheet_untouched() {
        let mut sheet = sheet();
        let before = sheet.clone();
        assert!(Field::Defense.write(&mut sheet, "tanta").is_err());
        assert!(Field::TierBonus(Tier::Illeso).write(&mut sheet, "x").is_err());
        assert_eq!(sheet, before);
        Field::Defense.write(&mut sheet, "").unwrap();
        assert_eq!(sheet.combat.defense, 0);
    }

    #[test]
    fn level_edit_is_clamped() {
        let mut sheet = sheet();
        Field::Level.write(&mut sheet, "-2").unwrap();
        assert_eq!(sheet.status.level, 1);
        Field::Level.write(&mut sheet, "2147483647").unwrap();
        assert_eq!(sheet.status.level, crate::health::MAX_LEVEL);
    }

    #[test]
    fn huge_health_values_are_clamped() {
        let mut sheet = sheet();
        Field::TierBonus(Tier::Illeso).write(&mut sheet, "2147483647").unwrap();
        assert_eq!(sheet.health.entry(Tier::Illeso).bonus, crate::health::MAX_BONUS);
        Field::TierDamage(Tier::Graffiato).write(&mut sheet, "2147483647").unwrap();
        assert_eq!(Field::TierDamage(Tier::Graffiato).read(&sheet), "4");
        Field::TotalDamage.write(&mut sheet, "2147483647").unwrap();
        let summary = sheet.health_summary();
        assert_eq!(summary.total_damage, crate::health::MAX_DAMAGE);
        assert_eq!(summary.current, 0);
        assert!(summary.penalty.is_active());
    }

    #[test]
    fn list_fields_round_trip() {
        let mut sheet = sheet();
        Field::Affinities.write(&mut sheet, "Zoro=3; Nami").unwrap();
        assert_eq!(Field::Affinities.read(&sheet), "Zoro=3; Nami=0");

        Field::Attacks
            .write(&mut sheet, "Gomu Gomu | pugno | mischia | 2d6 | +1")
            .unwrap();
        assert_eq!(sheet.combat.attacks[0].damage, "2d6");
        assert_eq!(
            Field::Attacks.read(&sheet),
            "Gomu Gomu | pugno | mischia | 2d6 | +1"
        );

        Field::Alterations.write(&mut sheet, "2: Avvelenato; Stordito").unwrap();
        assert_eq!(Field::Alterations.read(&sheet), "2: Avvelenato; 1: Stordito");
    }

    #[test]
    fn items_keep_notes_and_material_points() {
        let mut sheet = sheet();
        sheet.equipment.items.push(Item {
            name: "Corda".to_string(),
            notes: None,
            material_points: Some(2),
        });
        Field::Items.write(&mut sheet, "Corda (10 m); Lanterna").unwrap();
        assert_eq!(sheet.equipment.items[0].notes.as_deref(), Some("10 m"));
        assert_eq!(sheet.equipment.items[0].material_points, Some(2));
        assert_eq!(sheet.equipment.items[1].name, "Lanterna");
        assert_eq!(Field::Items.read(&sheet), "Corda (10 m); Lanterna");
    }

    #[test]
    fn ability_import_appends_to_social() {
        let mut sheet = sheet();
        sheet.abilities.social.push("Contrattare".to_string());
        Field::AbilityImport.write(&mut sheet, "Mentire\nIntimidire\n").unwrap();
        assert_eq!(sheet.abilities.social, ["Contrattare", "Mentire", "Intimidire"]);
        assert!(Field::AbilityImport.commits_on_blur());
    }
}
