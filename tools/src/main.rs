//! ledger-doctor: operator tool for the affiliate ledger.
//!
//! Usage:
//!   ledger-doctor check --db affiliate.db
//!   ledger-doctor repair --db affiliate.db --data-dir ./data
//!   ledger-doctor drift --db affiliate.db
//!   ledger-doctor schedule --customer CUST-001 --db affiliate.db
//!   ledger-doctor distribute --customer CUST-001 --db affiliate.db
//!
//! `--json` prints the sweep report as JSON instead of the summary.

use anyhow::{bail, Context, Result};
use affiliate_core::{
    commission::distribute_and_record,
    config::LedgerConfig,
    engine::{MaintenanceEngine, SweepReport},
    schedule::inspect_schedule,
    store::{LedgerStore, Profile},
    types::{Role, RunMode},
    wallet::{wallet_drift, wallet_positions},
};
use std::collections::BTreeMap;
use std::env;

const USAGE: &str =
    "usage: ledger-doctor <check|repair|drift|schedule|distribute> [--customer ID] [--db PATH] [--data-dir DIR] [--json] [--all]";

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let Some(command) = args.get(1).filter(|a| !a.starts_with("--")) else {
        bail!(USAGE);
    };
    let db = flag_value(&args, "--db").unwrap_or("affiliate.db");
    let data_dir = flag_value(&args, "--data-dir").unwrap_or("./data");
    let json = args.iter().any(|a| a == "--json");

    let config = LedgerConfig::load(data_dir)
        .with_context(|| format!("loading config from {data_dir}"))?;
    let store = LedgerStore::open(db).with_context(|| format!("opening {db}"))?;
    store.migrate()?;
    log::info!("ledger-doctor {command} against {db}");

    match command.as_str() {
        "check" => sweep(store, &config, RunMode::Check, json),
        "repair" => sweep(store, &config, RunMode::Repair, json),
        "drift" => print_drift(&store, &config, args.iter().any(|a| a == "--all")),
        "schedule" => {
            let customer = find_customer(&store, &args)?;
            print_schedule(&store, &config, &customer)
        }
        "distribute" => {
            let customer = find_customer(&store, &args)?;
            let now = chrono::Utc::now();
            let run_id = run_id("distribute", now);
            let outcome =
                distribute_and_record(&store, &config.commission, &customer.profile_id, &run_id, now)?;
            println!("=== DISTRIBUTION: {} ({run_id}) ===", customer.public_id);
            for share in &outcome.credited {
                println!(
                    "  level {} -> {:<38} {:>10.2}",
                    share.level, share.recipient_id, share.amount
                );
            }
            println!("  credited:        {:.2}", outcome.total_credited());
            println!("  already present: {:?}", outcome.already_present);
            for u in &outcome.unallocated {
                println!("  unallocated:     level {} ({:.2})", u.level, u.amount);
            }
            Ok(())
        }
        other => bail!("unknown command '{other}'\n{USAGE}"),
    }
}

fn sweep(store: LedgerStore, config: &LedgerConfig, mode: RunMode, json: bool) -> Result<()> {
    let run_id = run_id(mode.as_str(), chrono::Utc::now());
    let mut engine = MaintenanceEngine::build(run_id, config, store);
    let report = engine.sweep(mode)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn run_id(kind: &str, now: chrono::DateTime<chrono::Utc>) -> String {
    format!("{kind}-{}", now.format("%Y%m%dT%H%M%S%.3f"))
}

fn print_summary(report: &SweepReport) {
    let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
    for (_, event) in &report.events {
        *by_type.entry(event.event_type()).or_default() += 1;
    }

    println!("=== SWEEP SUMMARY ===");
    println!("  run_id:  {}", report.run_id);
    println!("  mode:    {}", report.mode);
    println!("  events:  {}", report.events.len());
    for (event_type, count) in &by_type {
        println!("    {event_type:<26} {count}");
    }
    if let Some(task) = &report.halted_by {
        println!("  halted by '{task}': run `ledger-doctor repair` to add missing columns");
    }
    if report.is_clean() {
        println!("  ledger is consistent");
    }
}

fn print_drift(store: &LedgerStore, config: &LedgerConfig, all: bool) -> Result<()> {
    let rows = if all {
        wallet_positions(store)?
    } else {
        wallet_drift(store, &config.wallet)?
    };

    println!("=== WALLET DRIFT (tolerance {:.2}) ===", config.wallet.tolerance);
    if rows.is_empty() {
        println!("  (no drift)");
        return Ok(());
    }
    println!(
        "  {:<12} {:<24} {:>12} {:>12} {:>12}",
        "code", "name", "cached", "ledger", "delta"
    );
    for w in &rows {
        println!(
            "  {:<12} {:<24} {:>12.2} {:>12.2} {:>+12.2}",
            w.public_id, w.name, w.cached_balance, w.ledger_total, w.delta
        );
    }
    Ok(())
}

fn print_schedule(store: &LedgerStore, config: &LedgerConfig, customer: &Profile) -> Result<()> {
    let rows = store.installments_for(&customer.profile_id)?;
    let health = inspect_schedule(&config.schedule, &rows);

    println!("=== SCHEDULE: {} ({}) ===", customer.public_id, customer.name);
    println!("  installments: {}/{}", health.present, config.schedule.installment_count);
    println!("  missing:      {:?}", health.missing);
    println!("  duplicated:   {:?}", health.duplicated);
    println!("  out of range: {:?}", health.out_of_range);
    println!("  complete:     {}", health.is_complete());
    Ok(())
}

/// Resolve `--customer` by public identifier first, then by profile id.
fn find_customer(store: &LedgerStore, args: &[String]) -> Result<Profile> {
    let Some(id) = flag_value(args, "--customer") else {
        bail!("--customer ID is required\n{USAGE}");
    };
    let profile = match store.profile_by_public_id(id)? {
        Some(p) => Some(p),
        None => store.profile(id)?,
    };
    match profile {
        Some(p) if p.role == Role::Customer => Ok(p),
        Some(p) => bail!("{id} is a {}, not a customer", p.role),
        None => bail!("no customer with identifier {id}"),
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
