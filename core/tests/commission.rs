//! Integration tests for commission distribution and the commission task.
//!
//! Customers inserted directly through the store simulate the
//! "automation failed" case: a profile exists but no commission was paid.

use affiliate_core::{
    commission::{distribute_and_record, distribute_commission, referral_chain},
    config::LedgerConfig,
    engine::MaintenanceEngine,
    error::LedgerError,
    onboarding::{create_admin, create_promoter, NewPromoter},
    store::{LedgerStore, Profile},
    types::{ProfileStatus, Role, RunMode},
};
use chrono::{TimeZone, Utc};

fn promoter(store: &LedgerStore, name: &str, parent: Option<&Profile>) -> Profile {
    create_promoter(
        store,
        &LedgerConfig::default_test(),
        NewPromoter {
            name: name.into(),
            email: None,
            phone: None,
            parent_id: parent.map(|p| p.profile_id.clone()),
        },
        Utc::now(),
    )
    .unwrap()
}

/// A customer row with no schedule and no commission.
fn bare_customer(store: &LedgerStore, public_id: &str, promoter: &Profile) -> Profile {
    let customer = Profile {
        profile_id: format!("id-{public_id}"),
        role: Role::Customer,
        name: public_id.into(),
        email: None,
        phone: None,
        public_id: public_id.into(),
        parent_promoter_id: Some(promoter.profile_id.clone()),
        wallet_balance: 0.0,
        status: ProfileStatus::Active,
        created_at: Utc::now(),
    };
    store.insert_profile(&customer).unwrap();
    customer
}

#[test]
fn distribution_is_idempotent() {
    let mut engine = MaintenanceEngine::build_test("comm-t1".into()).unwrap();
    let config = LedgerConfig::default_test();
    let p1 = promoter(&engine.store, "Top", None);
    let p2 = promoter(&engine.store, "Direct", Some(&p1));
    let customer = bare_customer(&engine.store, "CUST-200", &p2);

    let first = distribute_commission(&engine.store, &config.commission, &customer.profile_id, Utc::now()).unwrap();
    let second = distribute_commission(&engine.store, &config.commission, &customer.profile_id, Utc::now()).unwrap();

    assert_eq!(first.credited.len(), 2);
    assert!(second.credited.is_empty(), "second run must not credit again");
    assert_eq!(second.already_present, vec![1, 2]);
    assert_eq!(engine.store.wallet_balance(&p2.profile_id).unwrap(), 500.0);
    assert_eq!(engine.store.wallet_balance(&p1.profile_id).unwrap(), 100.0);

    let report = engine.sweep(RunMode::Check).unwrap();
    assert_eq!(report.count("commission_missing"), 0);
}

#[test]
fn check_mode_reports_missing_commission() {
    let mut engine = MaintenanceEngine::build_test("comm-t2".into()).unwrap();
    let p1 = promoter(&engine.store, "Direct", None);
    bare_customer(&engine.store, "CUST-201", &p1);

    let report = engine.sweep(RunMode::Check).unwrap();

    assert_eq!(report.count("commission_missing"), 1);
    assert_eq!(report.count("commission_credited"), 0);
    assert_eq!(engine.store.commission_count().unwrap(), 0);
    assert_eq!(engine.store.wallet_balance(&p1.profile_id).unwrap(), 0.0);
}

#[test]
fn repair_mode_pays_missing_levels_and_keeps_wallets_in_sync() {
    let mut engine = MaintenanceEngine::build_test("comm-t3".into()).unwrap();
    let admin = create_admin(&engine.store, "ADMIN", "Head Office", Utc::now()).unwrap();
    let p1 = promoter(&engine.store, "Top", Some(&admin));
    let p2 = promoter(&engine.store, "Direct", Some(&p1));
    bare_customer(&engine.store, "CUST-202", &p2);
    bare_customer(&engine.store, "CUST-203", &p1);

    let report = engine.sweep(RunMode::Repair).unwrap();

    assert_eq!(report.count("commission_missing"), 2);
    assert_eq!(report.count("commission_credited"), 8);
    // Wallet task runs after commission repair and must find nothing.
    assert_eq!(report.count("wallet_drift_detected"), 0);
    assert_eq!(engine.store.wallet_balance(&p2.profile_id).unwrap(), 500.0);
    assert_eq!(engine.store.wallet_balance(&p1.profile_id).unwrap(), 600.0);
    assert_eq!(engine.store.wallet_balance(&admin.profile_id).unwrap(), 500.0);
}

#[test]
fn referral_cycle_is_detected() {
    let store = LedgerStore::in_memory().unwrap();
    store.migrate().unwrap();
    let p1 = promoter(&store, "A", None);
    let p2 = promoter(&store, "B", Some(&p1));
    store
        .execute_admin_sql(&format!(
            "UPDATE profile SET parent_promoter_id = '{}' WHERE profile_id = '{}'",
            p2.profile_id, p1.profile_id
        ))
        .unwrap();

    let err = referral_chain(&store, &p2.profile_id, 10).unwrap_err();
    assert!(matches!(err, LedgerError::ReferralCycle { .. }), "got {err}");

    // Depth limit stops the walk before the cycle is revisited.
    let chain = referral_chain(&store, &p2.profile_id, 2).unwrap();
    assert_eq!(chain.len(), 2);
}

#[test]
fn sweep_skips_customers_with_broken_chains() {
    let mut engine = MaintenanceEngine::build_test("comm-t5".into()).unwrap();
    let p1 = promoter(&engine.store, "A", None);
    let p2 = promoter(&engine.store, "B", Some(&p1));
    engine
        .store
        .execute_admin_sql(&format!(
            "UPDATE profile SET parent_promoter_id = '{}' WHERE profile_id = '{}'",
            p2.profile_id, p1.profile_id
        ))
        .unwrap();
    bare_customer(&engine.store, "CUST-204", &p2);
    let healthy = promoter(&engine.store, "C", None);
    bare_customer(&engine.store, "CUST-205", &healthy);

    let report = engine.sweep(RunMode::Repair).unwrap();

    // The broken customer is skipped; the healthy one is still repaired.
    assert_eq!(report.count("commission_missing"), 1);
    assert_eq!(engine.store.wallet_balance(&healthy.profile_id).unwrap(), 500.0);
    assert_eq!(engine.store.wallet_balance(&p2.profile_id).unwrap(), 0.0);
}

#[test]
fn distributing_for_a_promoter_is_rejected() {
    let store = LedgerStore::in_memory().unwrap();
    store.migrate().unwrap();
    let p1 = promoter(&store, "A", None);

    let err = distribute_commission(
        &store,
        &LedgerConfig::default_test().commission,
        &p1.profile_id,
        Utc::now(),
    )
    .unwrap_err();
    assert!(matches!(err, LedgerError::RoleMismatch { .. }), "got {err}");
}

#[test]
fn commission_rows_carry_the_distribution_time() {
    let store = LedgerStore::in_memory().unwrap();
    store.migrate().unwrap();
    let p1 = promoter(&store, "A", None);
    let customer = bare_customer(&store, "CUST-206", &p1);
    let at = Utc.with_ymd_and_hms(2025, 3, 15, 10, 0, 0).unwrap();

    distribute_commission(&store, &LedgerConfig::default_test().commission, &customer.profile_id, at)
        .unwrap();

    let rows = store.commissions_for_customer(&customer.profile_id).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].created_at, at);
}

#[test]
fn manual_distribution_is_logged_under_its_run() {
    let store = LedgerStore::in_memory().unwrap();
    store.migrate().unwrap();
    let p1 = promoter(&store, "Top", None);
    let p2 = promoter(&store, "Direct", Some(&p1));
    let customer = bare_customer(&store, "CUST-207", &p2);
    let config = LedgerConfig::default_test();

    let outcome =
        distribute_and_record(&store, &config.commission, &customer.profile_id, "distribute-t1", Utc::now())
            .unwrap();

    let entries = store.events_for_run("distribute-t1").unwrap();
    assert_eq!(outcome.credited.len(), 2);
    assert_eq!(entries.len(), outcome.events().len());
    assert!(entries.iter().all(|e| e.task == "commission"));
    assert_eq!(
        entries.iter().filter(|e| e.event_type == "commission_credited").count(),
        2
    );

    // A second manual run finds nothing to pay and logs nothing new.
    let again =
        distribute_and_record(&store, &config.commission, &customer.profile_id, "distribute-t2", Utc::now())
            .unwrap();
    assert!(again.credited.is_empty());
    assert_eq!(
        store.events_for_run("distribute-t2").unwrap().len(),
        again.events().len()
    );
}

#[test]
fn failed_manual_distribution_leaves_no_run() {
    let store = LedgerStore::in_memory().unwrap();
    store.migrate().unwrap();
    let p1 = promoter(&store, "A", None);

    let err = distribute_and_record(
        &store,
        &LedgerConfig::default_test().commission,
        &p1.profile_id,
        "distribute-t3",
        Utc::now(),
    )
    .unwrap_err();
    assert!(matches!(err, LedgerError::RoleMismatch { .. }), "got {err}");

    // The run row rolled back with the failure, so the id is free again.
    let customer = bare_customer(&store, "CUST-208", &p1);
    distribute_and_record(
        &store,
        &LedgerConfig::default_test().commission,
        &customer.profile_id,
        "distribute-t3",
        Utc::now(),
    )
    .unwrap();
}
