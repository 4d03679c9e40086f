//! Health ledger: six ordered wound tiers and the arithmetic derived from them.
//!
//! Everything here is a pure function of the stored tier array and the character level.
//! Nothing is cached; callers re-run the computation after every edit.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

pub const TIER_COUNT: usize = 6;

// Fixed capacity of each tier before level and bonus.
pub const BASE_CAPACITY: [i32; TIER_COUNT] = [5, 4, 3, 2, 1, 0];

// First tier at which the temporary AGI/RES penalty applies.
pub const PENALTY_TIER: Tier = Tier::Ferito;

// Domain of the values a sheet may carry into the ledger. Edits and stored rows are clamped
// to these before any arithmetic runs.
pub const MAX_LEVEL: i32 = 1_000;
pub const MAX_BONUS: i32 = 10_000;
pub const MAX_DAMAGE: i32 = 1_000_000;

pub fn clamp_level(level: i32) -> i32 {
    level.clamp(1, MAX_LEVEL)
}

pub fn clamp_bonus(bonus: i32) -> i32 {
    bonus.clamp(-MAX_BONUS, MAX_BONUS)
}

pub fn clamp_damage(damage: i32) -> i32 {
    damage.clamp(0, MAX_DAMAGE)
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumIter,
)]
pub enum Tier {
    Illeso,
    Graffiato,
    Leso,
    Ferito,
    Straziato,
    Moribondo,
}

impl Tier {
    pub fn index(self) -> usize {
        self as usize
    }

    // 1-based tier number, as shown on the sheet and used in the column names.
    pub fn number(self) -> u8 {
        self as u8 + 1
    }

    pub fn from_number(number: i64) -> Option<Tier> {
        Tier::iter().find(|tier| i64::from(tier.number()) == number)
    }

    pub fn base_capacity(self) -> i32 {
        BASE_CAPACITY[self.index()]
    }

    // The terminal tier is a fixed state and never grows with level.
    pub fn receives_level_bonus(self) -> bool {
        self != Tier::Moribondo
    }

    pub fn label(self) -> String {
        format!("Liv {} - {}", self.number(), self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierEntry {
    pub bonus: i32,
    pub damage: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthLedger {
    pub tiers: [TierEntry; TIER_COUNT],
    pub malus_notes: String,
    pub wounds: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthDerived {
    pub tier_capacity: [i32; TIER_COUNT],
    pub total_capacity: i32,
    pub total_damage: i32,
    pub current: i32,
}

/// Attribute modifiers gated on the wound tier. Always recomputed, never stored on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemporaryPenalty {
    pub agi: i32,
    pub res: i32,
}

impl TemporaryPenalty {
    pub fn for_tier(tier: Tier) -> Self {
        if tier >= PENALTY_TIER {
            TemporaryPenalty { agi: -1, res: -1 }
        } else {
            TemporaryPenalty::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.agi != 0 || self.res != 0
    }
}

/// The two ways a ledger changes: direct per-tier edits, or one aggregate damage figure that
/// is redistributed over all tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEdit {
    Bonus(Tier, i32),
    Damage(Tier, i32),
    TotalDamage(i32),
    MalusNotes(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthOutcome {
    pub derived: HealthDerived,
    pub wound_tier: Tier,
    pub penalty: TemporaryPenalty,
}

pub fn level_bonus(level: i32) -> i32 {
    level.saturating_sub(1).max(0)
}

impl HealthLedger {
    pub fn entry(&self, tier: Tier) -> &TierEntry {
        &self.tiers[tier.index()]
    }

    pub fn entry_mut(&mut self, tier: Tier) -> &mut TierEntry {
        &mut self.tiers[tier.index()]
    }

    pub fn tier_capacity(&self, tier: Tier, level: i32) -> i32 {
        let level_add = if tier.receives_level_bonus() {
            level_bonus(level)
        } else {
            0
        };
        tier.base_capacity()
            .saturating_add(level_add)
            .saturating_add(self.entry(tier).bonus)
    }

    pub fn capacities(&self, level: i32) -> [i32; TIER_COUNT] {
        let mut capacities = [0; TIER_COUNT];
        for tier in Tier::iter() {
            capacities[tier.index()] = self.tier_capacity(tier, level);
        }
        capacities
    }

    pub fn damages(&self) -> [i32; TIER_COUNT] {
        self.tiers.map(|entry| entry.damage)
    }

    pub fn total_damage(&self) -> i32 {
        self.tiers
            .iter()
            .fold(0i32, |total, entry| total.saturating_add(entry.damage))
    }

    pub fn set_damages(&mut self, damages: [i32; TIER_COUNT]) {
        for (entry, damage) in self.tiers.iter_mut().zip(damages) {
            entry.damage = damage;
        }
    }

    /// Moves any damage a tier cannot hold into the last tier, keeping the total.
    pub fn settle(&mut self, level: i32) {
        let mut excess = 0i32;
        for tier in Tier::iter().filter(|tier| *tier != Tier::Moribondo) {
            let capacity = self.tier_capacity(tier, level).max(0);
            let entry = self.entry_mut(tier);
            if entry.damage > capacity {
                excess = excess.saturating_add(entry.damage - capacity);
                entry.damage = capacity;
            }
        }
        let last = self.entry_mut(Tier::Moribondo);
        last.damage = last.damage.saturating_add(excess);
    }

    pub fn evaluate(&self, level: i32) -> HealthOutcome {
        let derived = compute_derived(self, level);
        let wound_tier = derive_wound_tier(derived.total_damage, level, self);
        HealthOutcome {
            derived,
            wound_tier,
            penalty: TemporaryPenalty::for_tier(wound_tier),
        }
    }

    pub fn apply(&mut self, edit: HealthEdit, level: i32) -> HealthOutcome {
        match edit {
            HealthEdit::Bonus(tier, bonus) => self.entry_mut(tier).bonus = clamp_bonus(bonus),
            HealthEdit::Damage(tier, damage) => {
                let mut damage = clamp_damage(damage);
                // Only the last tier may hold more than its capacity.
                if tier != Tier::Moribondo {
                    damage = damage.min(self.tier_capacity(tier, level).max(0));
                }
                self.entry_mut(tier).damage = damage;
            }
            HealthEdit::TotalDamage(total) => {
                let damages = distribute_damage(clamp_damage(total), level, self);
                self.set_damages(damages);
            }
            HealthEdit::MalusNotes(notes) => self.malus_notes = notes,
        }
        self.evaluate(level)
    }
}

pub fn compute_derived(ledger: &HealthLedger, level: i32) -> HealthDerived {
    let tier_capacity = ledger.capacities(level);
    let total_capacity = tier_capacity
        .iter()
        .fold(0i32, |total, capacity| total.saturating_add(*capacity));
    let total_damage = ledger.total_damage();
    HealthDerived {
        tier_capacity,
        total_capacity,
        total_damage,
        current: total_capacity.saturating_sub(total_damage).max(0),
    }
}

/// Greedy fill from tier 1 to tier 6. Whatever is left after the last tier lands in tier 6,
/// which is the only tier allowed to exceed its capacity.
pub fn distribute_damage(total_damage: i32, level: i32, ledger: &HealthLedger) -> [i32; TIER_COUNT] {
    let mut allocated = [0; TIER_COUNT];
    let mut remaining = total_damage.max(0);

    for tier in Tier::iter() {
        // A negative bonus can push a capacity below zero; such a tier simply holds nothing.
        let capacity = ledger.tier_capacity(tier, level).max(0);
        let take = remaining.min(capacity);
        allocated[tier.index()] = take;
        remaining -= take;
    }

    if remaining > 0 {
        let last = &mut allocated[Tier::Moribondo.index()];
        *last = last.saturating_add(remaining);
    }
    allocated
}

pub fn derive_wound_tier(total_damage: i32, level: i32, ledger: &HealthLedger) -> Tier {
    let mut remaining = total_damage.max(0);
    if remaining == 0 {
        return Tier::Illeso;
    }
    for tier in Tier::iter() {
        remaining = remaining.saturating_sub(ledger.tier_capacity(tier, level).max(0));
        if remaining <= 0 {
            return tier;
        }
    }
    Tier::Moribondo
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> HealthLedger {
        HealthLedger::default()
    }

    #[test]
    fn level_one_capacity_is_fifteen() {
        let derived = compute_derived(&fresh(), 1);
        assert_eq!(derived.tier_capacity, [5, 4, 3, 2, 1, 0]);
        assert_eq!(derived.total_capacity, 15);
        assert_eq!(derived.current, 15);
    }

    #[test]
    fn level_bonus_skips_the_terminal_tier() {
        let mut ledger = fresh();
        ledger.entry_mut(Tier::Illeso).bonus = 1;
        ledger.entry_mut(Tier::Moribondo).bonus = 2;
        let derived = compute_derived(&ledger, 3);
        assert_eq!(derived.tier_capacity[0], 5 + 2 + 1);
        assert_eq!(derived.tier_capacity[5], 2);
        assert_eq!(derived.total_capacity, 15 + 2 * 5 + 3);
    }

    #[test]
    fn level_below_one_gets_no_bonus() {
        assert_eq!(level_bonus(0), 0);
        assert_eq!(level_bonus(-4), 0);
        assert_eq!(compute_derived(&fresh(), 0).total_capacity, 15);
    }

    #[test]
    fn seven_damage_fills_the_first_two_tiers() {
        let mut ledger = fresh();
        let outcome = ledger.apply(HealthEdit::TotalDamage(7), 1);
        assert_eq!(ledger.damages(), [5, 2, 0, 0, 0, 0]);
        assert_eq!(outcome.derived.current, 8);
        assert_eq!(outcome.wound_tier, Tier::Graffiato);
        assert!(!outcome.penalty.is_active());
    }

    #[test]
    fn overflow_lands_in_the_last_tier() {
        let mut ledger = fresh();
        let outcome = ledger.apply(HealthEdit::TotalDamage(16), 1);
        assert_eq!(ledger.damages(), [5, 4, 3, 2, 1, 1]);
        assert_eq!(outcome.derived.current, 0);
        assert_eq!(outcome.wound_tier, Tier::Moribondo);
        assert_eq!(outcome.penalty, TemporaryPenalty { agi: -1, res: -1 });
    }

    #[test]
    fn wound_tier_boundaries() {
        let ledger = fresh();
        assert_eq!(derive_wound_tier(0, 1, &ledger), Tier::Illeso);
        assert_eq!(derive_wound_tier(-3, 1, &ledger), Tier::Illeso);
        assert_eq!(derive_wound_tier(5, 1, &ledger), Tier::Illeso);
        assert_eq!(derive_wound_tier(6, 1, &ledger), Tier::Graffiato);
        assert_eq!(derive_wound_tier(12, 1, &ledger), Tier::Leso);
        assert_eq!(derive_wound_tier(13, 1, &ledger), Tier::Ferito);
        assert_eq!(derive_wound_tier(15, 1, &ledger), Tier::Straziato);
        assert_eq!(derive_wound_tier(40, 1, &ledger), Tier::Moribondo);
    }

    #[test]
    fn penalty_starts_at_the_fourth_tier() {
        assert!(!TemporaryPenalty::for_tier(Tier::Leso).is_active());
        assert!(TemporaryPenalty::for_tier(Tier::Ferito).is_active());
        assert!(TemporaryPenalty::for_tier(Tier::Moribondo).is_active());
    }

    #[test]
    fn negative_capacity_tiers_hold_no_damage() {
        let mut ledger = fresh();
        ledger.entry_mut(Tier::Graffiato).bonus = -6;
        let damages = distribute_damage(8, 1, &ledger);
        assert_eq!(damages, [5, 0, 3, 0, 0, 0]);
    }

    #[test]
    fn direct_damage_edits_are_clamped_at_zero() {
        let mut ledger = fresh();
        let outcome = ledger.apply(HealthEdit::Damage(Tier::Leso, -4), 1);
        assert_eq!(ledger.entry(Tier::Leso).damage, 0);
        assert_eq!(outcome.derived.total_damage, 0);
    }

    #[test]
    fn direct_damage_stays_within_the_tier() {
        let mut ledger = fresh();
        ledger.apply(HealthEdit::Damage(Tier::Illeso, 50), 1);
        assert_eq!(ledger.entry(Tier::Illeso).damage, 5);
        ledger.apply(HealthEdit::Damage(Tier::Graffiato, 3), 3);
        assert_eq!(ledger.entry(Tier::Graffiato).damage, 3);
        ledger.apply(HealthEdit::Damage(Tier::Moribondo, 50), 1);
        assert_eq!(ledger.entry(Tier::Moribondo).damage, 50);
    }

    #[test]
    fn settling_moves_excess_into_the_last_tier() {
        let mut ledger = fresh();
        ledger.entry_mut(Tier::Illeso).damage = 9;
        ledger.entry_mut(Tier::Leso).damage = 1;
        ledger.settle(1);
        assert_eq!(ledger.damages(), [5, 0, 1, 0, 0, 4]);
        assert_eq!(ledger.total_damage(), 10);
    }

    #[test]
    fn extreme_values_saturate_instead_of_overflowing() {
        let mut ledger = fresh();
        ledger.entry_mut(Tier::Illeso).bonus = i32::MAX;
        ledger.entry_mut(Tier::Graffiato).bonus = i32::MAX;
        ledger.entry_mut(Tier::Moribondo).damage = i32::MAX;
        let derived = compute_derived(&ledger, i32::MAX);
        assert_eq!(derived.tier_capacity[0], i32::MAX);
        assert_eq!(derived.total_capacity, i32::MAX);
        assert_eq!(derived.current, 0);
        assert_eq!(derive_wound_tier(i32::MAX, i32::MAX, &ledger), Tier::Illeso);
        let damages = distribute_damage(i32::MAX, 1, &fresh());
        assert_eq!(damages[5], i32::MAX - 15);
    }

    #[test]
    fn edits_are_clamped_to_the_sheet_domain() {
        let mut ledger = fresh();
        ledger.apply(HealthEdit::Bonus(Tier::Illeso, i32::MAX), 1);
        assert_eq!(ledger.entry(Tier::Illeso).bonus, MAX_BONUS);
        let outcome = ledger.apply(HealthEdit::TotalDamage(i32::MAX), 1);
        assert_eq!(outcome.derived.total_damage, MAX_DAMAGE);
        assert_eq!(outcome.wound_tier, Tier::Moribondo);
        assert_eq!(clamp_level(i32::MAX), MAX_LEVEL);
        assert_eq!(clamp_level(-3), 1);
    }

    #[test]
    fn tiers_round_trip_through_numbers() {
        for tier in Tier::iter() {
            assert_eq!(Tier::from_number(i64::from(tier.number())), Some(tier));
        }
        assert_eq!(Tier::from_number(7), None);
        assert_eq!(Tier::Ferito.label(), "Liv 4 - Ferito");
    }
}
