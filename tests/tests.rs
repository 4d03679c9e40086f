// ../tests/tests.rs
use log_pose::health::{HealthEdit, PENALTY_TIER, TemporaryPenalty, level_bonus};
use log_pose::record::{from_row, to_row};
use log_pose::session::{Profile, Session};
use log_pose::store::{LocalStore, RemoteStore};
use log_pose::{
    BackendClient, CharacterSheet, CharacterStore, Error, HealthLedger, Identity, Repository, Role,
    Tier, compute_derived, derive_wound_tier, distribute_damage,
};
use proptest::prelude::*;
use serde_json::json;
use strum::IntoEnumIterator;

fn ledger_with_bonuses(bonuses: &[i32]) -> HealthLedger {
    let mut ledger = HealthLedger::default();
    for (tier, bonus) in Tier::iter().zip(bonuses) {
        ledger.entry_mut(tier).bonus = *bonus;
    }
    ledger
}

fn identity(user_id: &str, role: Role) -> Identity {
    Identity::new(
        Session {
            access_token: "token".to_string(),
            refresh_token: "refresh".to_string(),
            user_id: user_id.to_string(),
            email: Some(format!("{}@example.com", user_id)),
            expires_at: None,
        },
        Some(Profile {
            id: user_id.to_string(),
            email: Some(format!("{}@example.com", user_id)),
            role,
            created_at: None,
        }),
    )
}

proptest! {
    #[test]
    fn capacity_is_base_plus_bonus_plus_level(
        level in 1i32..60,
        bonuses in prop::collection::vec(-10i32..10, 6),
    ) {
        let ledger = ledger_with_bonuses(&bonuses);
        let derived = compute_derived(&ledger, level);
        for tier in Tier::iter() {
            let level_add = if tier == Tier::Moribondo { 0 } else { level - 1 };
            prop_assert_eq!(
                derived.tier_capacity[tier.index()],
                tier.base_capacity() + bonuses[tier.index()] + level_add
            );
        }
        prop_assert_eq!(derived.total_capacity, derived.tier_capacity.iter().sum::<i32>());
    }

    #[test]
    fn distribution_conserves_damage(
        total in 0i32..400,
        level in 1i32..30,
        bonuses in prop::collection::vec(-8i32..8, 6),
    ) {
        let ledger = ledger_with_bonuses(&bonuses);
        let allocated = distribute_damage(total, level, &ledger);
        prop_assert_eq!(allocated.iter().sum::<i32>(), total);
        prop_assert!(allocated.iter().all(|damage| *damage >= 0));
        for tier in Tier::iter().filter(|tier| *tier != Tier::Moribondo) {
            prop_assert!(allocated[tier.index()] <= ledger.tier_capacity(tier, level).max(0));
        }
    }

    #[test]
    fn redistributing_the_allocated_sum_is_stable(
        total in 0i32..200,
        level in 1i32..20,
        bonuses in prop::collection::vec(-8i32..8, 6),
    ) {
        let mut ledger = ledger_with_bonuses(&bonuses);
        let allocated = distribute_damage(total, level, &ledger);
        let again = distribute_damage(allocated.iter().sum(), level, &ledger);
        prop_assert_eq!(again, allocated);

        ledger.apply(HealthEdit::TotalDamage(total), level);
        let first = ledger.damages();
        ledger.apply(HealthEdit::TotalDamage(ledger.total_damage()), level);
        prop_assert_eq!(ledger.damages(), first);
    }

    #[test]
    fn wound_tier_never_improves_with_more_damage(
        total in 0i32..200,
        level in 1i32..20,
        bonuses in prop::collection::vec(-8i32..8, 6),
    ) {
        let ledger = ledger_with_bonuses(&bonuses);
        prop_assert!(
            derive_wound_tier(total, level, &ledger) <= derive_wound_tier(total + 1, level, &ledger)
        );
    }

    #[test]
    fn penalty_follows_the_wound_tier(
        total in 0i32..100,
        level in 1i32..10,
        bonuses in prop::collection::vec(-8i32..8, 6),
    ) {
        let mut ledger = ledger_with_bonuses(&bonuses);
        let outcome = ledger.apply(HealthEdit::TotalDamage(total), level);
        let expected = if outcome.wound_tier >= PENALTY_TIER {
            TemporaryPenalty { agi: -1, res: -1 }
        } else {
            TemporaryPenalty::default()
        };
        prop_assert_eq!(outcome.penalty, expected);
        prop_assert_eq!(outcome.derived.current, (outcome.derived.total_capacity - total).max(0));
    }

    #[test]
    fn huge_inputs_never_panic(
        bonus in any::<i32>(),
        damage in any::<i32>(),
        level in any::<i32>(),
    ) {
        let mut sheet = CharacterSheet::new_for("brook");
        sheet.set_level(level);
        sheet.apply_health_edit(HealthEdit::Bonus(Tier::Moribondo, bonus));
        sheet.apply_health_edit(HealthEdit::Damage(Tier::Illeso, damage));
        let outcome = sheet.apply_health_edit(HealthEdit::TotalDamage(damage));
        prop_assert!(outcome.derived.current >= 0);
        prop_assert!(outcome.derived.total_damage >= 0);
    }
}

#[test]
fn level_bonus_starts_at_level_two() {
    assert_eq!(level_bonus(0), 0);
    assert_eq!(level_bonus(1), 0);
    assert_eq!(level_bonus(4), 3);
}

#[test]
fn overflow_lands_in_the_last_tier() {
    let ledger = HealthLedger::default();
    assert_eq!(distribute_damage(20, 1, &ledger), [5, 4, 3, 2, 1, 5]);
    assert_eq!(derive_wound_tier(20, 1, &ledger), Tier::Moribondo);
    assert_eq!(derive_wound_tier(0, 1, &ledger), Tier::Illeso);
}

#[test]
fn level_three_widens_the_first_five_tiers() {
    let mut ledger = HealthLedger::default();
    assert_eq!(distribute_damage(10, 3, &ledger), [7, 3, 0, 0, 0, 0]);
    assert_eq!(derive_wound_tier(10, 3, &ledger), Tier::Graffiato);
    assert_eq!(distribute_damage(30, 3, &ledger), [7, 6, 5, 4, 3, 5]);

    ledger.entry_mut(Tier::Illeso).bonus = 1;
    ledger.entry_mut(Tier::Moribondo).bonus = 2;
    assert_eq!(compute_derived(&ledger, 3).tier_capacity, [8, 6, 5, 4, 3, 2]);
    assert_eq!(distribute_damage(27, 3, &ledger), [8, 6, 5, 4, 3, 1]);
}

#[test]
fn sheet_penalty_reaches_the_characteristics() {
    let mut sheet = CharacterSheet::new_for("zoro");
    let outcome = sheet.apply_health_edit(HealthEdit::TotalDamage(13));
    assert_eq!(outcome.wound_tier, Tier::Ferito);
    assert_eq!(sheet.characteristics.agi_temp, -1);
    assert_eq!(sheet.characteristics.res_temp, -1);

    sheet.apply_health_edit(HealthEdit::TotalDamage(2));
    assert_eq!(sheet.characteristics.agi_temp, 0);
    assert_eq!(sheet.characteristics.res_temp, 0);
}

#[test]
fn stored_rows_keep_health_and_coerce_loose_numbers() {
    let mut sheet = CharacterSheet::new_for("nami");
    sheet.name = "Nami".to_string();
    sheet.set_level(3);
    sheet.apply_health_edit(HealthEdit::Bonus(Tier::Illeso, 2));
    sheet.apply_health_edit(HealthEdit::TotalDamage(9));

    let row = to_row(&sheet).unwrap();
    assert_eq!(row["hp_bonus_l1"], json!(2));
    assert_eq!(row["hp_max"], json!(compute_derived(&sheet.health, 3).total_capacity));
    assert!(row.get("health").is_none());

    let restored = from_row(row).unwrap();
    assert_eq!(restored.health.damages(), sheet.health.damages());
    assert_eq!(restored.level(), 3);

    let loose = from_row(json!({
        "user_id": "usopp",
        "name": "Usopp",
        "characteristics": { "POT": "7", "AGI": "tanto" },
        "status": { "level": 0 },
        "hp_dmg_l1": "3",
        "hp_bonus_l2": null,
    }))
    .unwrap();
    assert_eq!(loose.characteristics.pot, 7);
    assert_eq!(loose.characteristics.agi, 0);
    assert_eq!(loose.level(), 1);
    assert_eq!(loose.health.entry(Tier::Illeso).damage, 3);
}

#[tokio::test]
async fn unreachable_backend_falls_back_to_the_cache() {
    // Nothing listens on the discard port, so every request fails to connect.
    let client = BackendClient::new("http://127.0.0.1:9", "anon").unwrap();
    let cache = LocalStore::open_in_memory().await.unwrap();
    let repository = Repository::new(RemoteStore::new(client), Some(cache.clone()));
    let player = identity("chopper", Role::Player);

    let mut sheet = CharacterSheet::new_for("chopper");
    sheet.name = "Tony Tony Chopper".to_string();
    let saved = repository.upsert(&player, sheet).await.unwrap();
    assert!(saved.id.is_some());
    assert_eq!(cache.row_count().await.unwrap(), 1);

    let fetched = repository
        .fetch_by_owner(&player, "chopper")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.name, "Tony Tony Chopper");

    let master = identity("shanks", Role::Master);
    let roster = repository.list_all(&master).await.unwrap();
    assert_eq!(roster.len(), 1);
}

#[tokio::test]
async fn players_cannot_read_other_sheets_offline() {
    let client = BackendClient::new("http://127.0.0.1:9", "anon").unwrap();
    let cache = LocalStore::open_in_memory().await.unwrap();
    let repository = Repository::new(RemoteStore::new(client), Some(cache));
    let sanji = identity("sanji", Role::Player);
    repository
        .upsert(&sanji, CharacterSheet::new_for("sanji"))
        .await
        .unwrap();

    let zoro = identity("zoro", Role::Player);
    assert!(matches!(
        repository.fetch_by_owner(&zoro, "sanji").await,
        Err(Error::Forbidden)
    ));
    assert!(matches!(repository.list_all(&zoro).await, Err(Error::Forbidden)));
}
