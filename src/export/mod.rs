//! Sheet rendering shared by the terminal view and the PDF exporter.

pub mod pdf;

pub use pdf::PdfExporter;

use strum::IntoEnumIterator;

use crate::character::{AbilityCategory, Attribute, CharacterSheet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub lines: Vec<String>,
}

impl Section {
    fn new(title: &str) -> Self {
        Section {
            title: title.to_string(),
            lines: Vec::new(),
        }
    }

    fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn field(&mut self, label: &str, value: &str) {
        let value = value.trim();
        self.push(format!("{}: {}", label, if value.is_empty() { "-" } else { value }));
    }

    fn list(&mut self, label: &str, items: &[String]) {
        if items.is_empty() {
            self.push(format!("{}: -", label));
        } else {
            self.push(format!("{}: {}", label, items.join(", ")));
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetDocument {
    pub title: String,
    pub sections: Vec<Section>,
    pub image_url: Option<String>,
}

fn signed(value: i32) -> String {
    if value > 0 { format!("+{}", value) } else { value.to_string() }
}

impl SheetDocument {
    pub fn from_sheet(sheet: &CharacterSheet) -> Self {
        SheetDocument {
            title: format!("Scheda di {}", sheet.display_name()),
            sections: vec![
                personal(sheet),
                characteristics(sheet),
                health(sheet),
                points_and_abilities(sheet),
                affinities(sheet),
                combat(sheet),
                equipment(sheet),
            ],
            image_url: sheet.image_url.clone().filter(|url| !url.trim().is_empty()),
        }
    }

    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.title == title)
    }

    pub fn line_count(&self) -> usize {
        self.sections.iter().map(|s| s.lines.len() + 2).sum::<usize>() + 1
    }
}

fn personal(sheet: &CharacterSheet) -> Section {
    let mut section = Section::new("Dati anagrafici");
    section.field("Nome", &sheet.name);
    section.field("Razza", &sheet.race);
    section.field("Taglia", &sheet.size);
    section.field("Ciurma", &sheet.crew);
    section.field("Mestiere", &sheet.job);
    section.field("Sogno", &sheet.dream);
    section.field("Aspetto", &sheet.appearance);
    section.field("Background", &sheet.background);
    section.push(format!(
        "Livello: {}  Esperienza: {}",
        sheet.level(),
        sheet.status.experience
    ));
    section
}

fn characteristics(sheet: &CharacterSheet) -> Section {
    let mut section = Section::new("Caratteristiche");
    for attribute in Attribute::iter() {
        let value = sheet.characteristics.get(attribute);
        section.push(format!(
            "{} ({}): {}  [base {}, bonus {}, temp {}]",
            attribute,
            attribute.full_name(),
            value.effective(),
            value.base,
            signed(value.bonus),
            signed(value.temp)
        ));
    }
    section.field("Stile di combattimento", &sheet.characteristics.combat_style);
    section
}

fn health(sheet: &CharacterSheet) -> Section {
    let summary = sheet.health_summary();
    let mut section = Section::new("Livelli di Salute");
    for row in &summary.rows {
        section.push(format!(
            "{}: base {} bonus {} totale {} danni {}",
            row.tier.label(),
            row.base_shown,
            signed(row.bonus),
            row.total,
            row.damage
        ));
    }
    section.push(format!(
        "PF massimi: {}  Danni totali: {}  PF attuali: {}",
        summary.max, summary.total_damage, summary.current
    ));
    section.push(format!("Stato: {}", summary.wound_tier.label()));
    if summary.penalty.is_active() {
        section.push(format!(
            "Malus temporaneo: AGI {} RES {}",
            summary.penalty.agi, summary.penalty.res
        ));
    }
    section.field("Note malus", &summary.malus_notes);
    section
}

fn points_and_abilities(sheet: &CharacterSheet) -> Section {
    let points = &sheet.points;
    let mut section = Section::new("Punti & Abilità");
    section.push(format!(
        "Stanchezza: {}  Shounen: {}  Volontà: {}  Morale: {}  Materiale: {}",
        points.fatigue, points.shounen, points.willpower, points.morale, points.material
    ));
    for category in AbilityCategory::iter() {
        section.list(&category.to_string(), sheet.abilities.category(category));
    }
    section.list("Pregi/Difetti", &sheet.status.traits);
    section.list("Qualità", &sheet.status.qualities);
    for alteration in &sheet.status.alterations {
        section.push(format!("Alterazione (liv {}): {}", alteration.level, alteration.label));
    }
    section
}

fn affinities(sheet: &CharacterSheet) -> Section {
    let mut section = Section::new("Amicizia & Affinità");
    if sheet.affinities.is_empty() && sheet.equipment.relations.is_empty() {
        section.push("-");
    }
    for affinity in &sheet.affinities {
        section.push(format!("{}: {}", affinity.name, affinity.value));
    }
    for relation in &sheet.equipment.relations {
        match relation.affinity.as_deref() {
            Some(affinity) if !affinity.trim().is_empty() => {
                section.push(format!("{} ({})", relation.name, affinity))
            }
            _ => section.push(relation.name.clone()),
        }
    }
    section
}

fn combat(sheet: &CharacterSheet) -> Section {
    let combat = &sheet.combat;
    let mut section = Section::new("Combattimento");
    section.push(format!(
        "Difesa: {}  RD: {}  Iniziativa: {}",
        combat.defense, combat.rd, combat.initiative
    ));
    let mut movement = format!("Movimento: {}", combat.base_movement);
    if let Some(swim) = combat.swim_movement {
        movement.push_str(&format!("  Nuoto: {}", swim));
    }
    if let Some(fly) = combat.fly_movement {
        movement.push_str(&format!("  Volo: {}", fly));
    }
    section.push(movement);
    for attack in &combat.attacks {
        section.push(format!(
            "Attacco {} ({}, {}): danni {} bonus {}",
            attack.name, attack.style, attack.weapon_type, attack.damage, attack.bonus
        ));
    }
    section.list("Tecniche", &combat.techniques);
    section.field("Danni subiti", &combat.taken_damage);
    section.field("Modificatori temporanei", &combat.temp_modifiers);
    let modifiers: Vec<String> = sheet
        .modifiers
        .iter()
        .filter(|(_, value)| **value != 0)
        .map(|(key, value)| format!("{} {}", key, signed(*value)))
        .collect();
    section.list("Modificatori", &modifiers);
    section
}

fn equipment(sheet: &CharacterSheet) -> Section {
    let equipment = &sheet.equipment;
    let mut section = Section::new("Equipaggiamento");
    let describe = |items: &[crate::character::Item]| -> Vec<String> {
        items
            .iter()
            .map(|item| match (&item.notes, item.material_points) {
                (Some(notes), _) if !notes.trim().is_empty() => format!("{} ({})", item.name, notes),
                (_, Some(points)) => format!("{} [{} PM]", item.name, points),
                _ => item.name.clone(),
            })
            .collect()
    };
    section.list("Oggetti", &describe(&equipment.items));
    section.list("Armi da mischia", &describe(&equipment.melee_weapons));
    section.list("Armi a distanza", &describe(&equipment.ranged_weapons));
    section.field(
        "Capacità di carico",
        equipment.carry_capacity.as_deref().unwrap_or(""),
    );
    section.list("Note", &equipment.notes);
    section
}

/// File name for an exported sheet: `{name}.pdf`, or `scheda.pdf` for an unnamed character.
pub fn export_file_name(sheet: &CharacterSheet) -> String {
    format!("{}.pdf", sanitize_file_name(&sheet.name))
}

pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').trim();
    if cleaned.is_empty() {
        "scheda".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::Affinity;
    use crate::health::HealthEdit;

    #[test]
    fn document_has_all_sections_in_order() {
        let document = SheetDocument::from_sheet(&CharacterSheet::new_for("u1"));
        let titles: Vec<&str> = document.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            [
                "Dati anagrafici",
                "Caratteristiche",
                "Livelli di Salute",
                "Punti & Abilità",
                "Amicizia & Affinità",
                "Combattimento",
                "Equipaggiamento"
            ]
        );
        assert_eq!(document.title, "Scheda di Senza nome");
    }

    #[test]
    fn health_section_uses_calculator_values() {
        let mut sheet = CharacterSheet::new_for("u1");
        sheet.name = "Franky".to_string();
        sheet.apply_health_edit(HealthEdit::TotalDamage(13));
        let document = SheetDocument::from_sheet(&sheet);
        let health = document.section("Livelli di Salute").unwrap();
        assert!(health.lines.contains(&"PF massimi: 15  Danni totali: 13  PF attuali: 2".to_string()));
        assert!(health.lines.contains(&"Stato: Liv 4 - Ferito".to_string()));
        assert!(health.lines.contains(&"Malus temporaneo: AGI -1 RES -1".to_string()));

        let characteristics = document.section("Caratteristiche").unwrap();
        assert!(characteristics.lines[1].starts_with("AGI (Agilità): 4"));
    }

    #[test]
    fn affinities_are_listed() {
        let mut sheet = CharacterSheet::new_for("u1");
        sheet.affinities.push(Affinity {
            name: "Robin".to_string(),
            value: 2,
        });
        let document = SheetDocument::from_sheet(&sheet);
        assert_eq!(document.section("Amicizia & Affinità").unwrap().lines, ["Robin: 2"]);
    }

    #[test]
    fn file_names_are_sanitized() {
        let mut sheet = CharacterSheet::new_for("u1");
        assert_eq!(export_file_name(&sheet), "scheda.pdf");
        sheet.name = "Monkey D. Rufy/Capitano".to_string();
        assert_eq!(export_file_name(&sheet), "Monkey D. Rufy_Capitano.pdf");
        assert_eq!(sanitize_file_name(" .. "), "scheda");
    }
}
