//! Onboarding: creating admins, promoters and customers.
//!
//! `create_customer` is the single authoritative path: the customer profile,
//! the full payment schedule, the commission rows and the wallet credits
//! commit together or not at all.

use crate::{
    commission::{distribute_commission, DistributionOutcome},
    config::{LedgerConfig, PromoterIdConfig},
    error::{LedgerError, LedgerResult},
    event::{EventLogEntry, LedgerEvent},
    schedule::{generate_schedule, Installment},
    store::{LedgerStore, PinRequestRow, Profile},
    types::{PinRequestStatus, ProfileId, ProfileStatus, Role, ONBOARDING_RUN},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPromoter {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Sponsoring promoter or admin; None for a top-level promoter.
    pub parent_id: Option<ProfileId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCustomer {
    /// External identifier; must be unique across all profiles.
    pub public_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub promoter_id: ProfileId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerCreated {
    pub profile: Profile,
    pub schedule: Vec<Installment>,
    pub distribution: DistributionOutcome,
}

/// Next free promoter code: prefix + (highest numeric suffix + 1), zero-padded.
pub fn next_promoter_id(store: &LedgerStore, config: &PromoterIdConfig) -> LedgerResult<String> {
    let highest = store
        .public_ids_with_prefix(&config.prefix)?
        .iter()
        .filter_map(|id| id.strip_prefix(&config.prefix)?.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    let next = highest.checked_add(1).ok_or_else(|| {
        LedgerError::InvalidInput(format!("promoter codes with prefix {} are exhausted", config.prefix))
    })?;
    Ok(format!("{}{:0width$}", config.prefix, next, width = config.width))
}

pub fn create_admin(
    store: &LedgerStore,
    public_id: &str,
    name: &str,
    now: DateTime<Utc>,
) -> LedgerResult<Profile> {
    require_text("public_id", public_id)?;
    require_text("name", name)?;
    store.in_transaction(|store| {
        reject_duplicate(store, public_id)?;
        let profile = new_profile(Role::Admin, public_id, name, None, None, None, now);
        store.insert_profile(&profile)?;
        record(
            store,
            &LedgerEvent::AdminCreated {
                profile_id: profile.profile_id.clone(),
                public_id: public_id.to_string(),
            },
        )?;
        log::info!("onboarding: created admin {public_id}");
        Ok(profile)
    })
}

pub fn create_promoter(
    store: &LedgerStore,
    config: &LedgerConfig,
    new: NewPromoter,
    now: DateTime<Utc>,
) -> LedgerResult<Profile> {
    require_text("name", &new.name)?;
    store.in_transaction(|store| {
        if let Some(parent_id) = &new.parent_id {
            require_referrer(store, parent_id)?;
        }
        let public_id = next_promoter_id(store, &config.promoter_id)?;
        let profile = new_profile(
            Role::Promoter,
            &public_id,
            &new.name,
            new.email.clone(),
            new.phone.clone(),
            new.parent_id.clone(),
            now,
        );
        store.insert_profile(&profile)?;
        record(
            store,
            &LedgerEvent::PromoterCreated {
                profile_id: profile.profile_id.clone(),
                public_id: public_id.clone(),
                parent_id: new.parent_id.clone(),
            },
        )?;
        log::info!("onboarding: created promoter {public_id}");
        Ok(profile)
    })
}

/// Create a customer with their schedule and commissions in one transaction.
pub fn create_customer(
    store: &LedgerStore,
    config: &LedgerConfig,
    new: NewCustomer,
    now: DateTime<Utc>,
) -> LedgerResult<CustomerCreated> {
    let public_id = new.public_id.trim().to_string();
    require_text("public_id", &public_id)?;
    require_text("name", &new.name)?;

    store.in_transaction(|store| {
        reject_duplicate(store, &public_id)?;
        require_referrer(store, &new.promoter_id)?;

        let profile = new_profile(
            Role::Customer,
            &public_id,
            &new.name,
            new.email.clone(),
            new.phone.clone(),
            Some(new.promoter_id.clone()),
            now,
        );
        store.insert_profile(&profile)?;

        let schedule = generate_schedule(&config.schedule, &profile.profile_id, now.date_naive());
        for installment in &schedule {
            store.insert_installment(installment)?;
        }

        let distribution = distribute_commission(store, &config.commission, &profile.profile_id, now)?;

        record(
            store,
            &LedgerEvent::CustomerCreated {
                profile_id: profile.profile_id.clone(),
                public_id: public_id.clone(),
                promoter_id: new.promoter_id.clone(),
            },
        )?;
        record(
            store,
            &LedgerEvent::ScheduleGenerated {
                customer_id: profile.profile_id.clone(),
                installments: schedule.len() as u32,
            },
        )?;
        for event in distribution.events() {
            record(store, &event)?;
        }

        log::info!(
            "onboarding: created customer {public_id} with {} installments, {:.2} commission",
            schedule.len(),
            distribution.total_credited()
        );
        Ok(CustomerCreated {
            profile,
            schedule,
            distribution,
        })
    })
}

/// Record a promoter's request for customer-activation PINs.
pub fn request_pins(
    store: &LedgerStore,
    promoter_id: &str,
    pin_count: u32,
    now: DateTime<Utc>,
) -> LedgerResult<PinRequestRow> {
    if pin_count == 0 {
        return Err(LedgerError::InvalidInput(
            "pin_count must be at least 1".into(),
        ));
    }
    store.in_transaction(|store| {
        require_referrer(store, promoter_id)?;
        let request = PinRequestRow {
            request_id: uuid::Uuid::new_v4().to_string(),
            promoter_id: promoter_id.to_string(),
            pin_count,
            status: PinRequestStatus::Pending,
            created_at: now,
        };
        store.insert_pin_request(&request)?;
        record(
            store,
            &LedgerEvent::PinsRequested {
                request_id: request.request_id.clone(),
                promoter_id: request.promoter_id.clone(),
                pin_count,
            },
        )?;
        log::info!("onboarding: {promoter_id} requested {pin_count} pins");
        Ok(request)
    })
}

fn new_profile(
    role: Role,
    public_id: &str,
    name: &str,
    email: Option<String>,
    phone: Option<String>,
    parent_promoter_id: Option<ProfileId>,
    now: DateTime<Utc>,
) -> Profile {
    Profile {
        profile_id: uuid::Uuid::new_v4().to_string(),
        role,
        name: name.trim().to_string(),
        email,
        phone,
        public_id: public_id.to_string(),
        parent_promoter_id,
        wallet_balance: 0.0,
        status: ProfileStatus::Active,
        created_at: now,
    }
}

fn require_text(field: &str, value: &str) -> LedgerResult<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}

fn reject_duplicate(store: &LedgerStore, public_id: &str) -> LedgerResult<()> {
    if store.public_id_exists(public_id)? {
        return Err(LedgerError::DuplicateIdentifier {
            public_id: public_id.to_string(),
        });
    }
    Ok(())
}

/// The profile must exist and be allowed to refer (promoter or admin).
fn require_referrer(store: &LedgerStore, profile_id: &str) -> LedgerResult<Profile> {
    let profile = store
        .profile(profile_id)?
        .ok_or_else(|| LedgerError::ProfileNotFound {
            profile_id: profile_id.to_string(),
        })?;
    if !profile.role.can_refer() {
        return Err(LedgerError::RoleMismatch {
            profile_id: profile.profile_id,
            expected: "promoter or admin",
            actual: profile.role,
        });
    }
    Ok(profile)
}

fn record(store: &LedgerStore, event: &LedgerEvent) -> LedgerResult<()> {
    store.append_event(&EventLogEntry::new(ONBOARDING_RUN, "onboarding", event)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> LedgerStore {
        let store = LedgerStore::in_memory().unwrap();
        store.migrate().unwrap();
        store
    }

    #[test]
    fn first_promoter_id_is_one() {
        let store = store();
        let config = LedgerConfig::default_test();
        assert_eq!(
            next_promoter_id(&store, &config.promoter_id).unwrap(),
            "PROM0001"
        );
    }

    #[test]
    fn promoter_id_follows_highest_suffix_not_count() {
        let store = store();
        let config = LedgerConfig::default_test();
        let now = Utc::now();
        // A gap left by manual edits must not produce a collision.
        create_admin(&store, "PROM0007", "legacy", now).unwrap();
        create_admin(&store, "PROMX", "not numeric", now).unwrap();

        assert_eq!(
            next_promoter_id(&store, &config.promoter_id).unwrap(),
            "PROM0008"
        );
    }

    #[test]
    fn exhausted_promoter_sequence_is_an_error() {
        let store = store();
        let config = LedgerConfig::default_test();
        create_admin(&store, &format!("PROM{}", u64::MAX), "last code", Utc::now()).unwrap();

        let err = next_promoter_id(&store, &config.promoter_id).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)), "got: {err}");
    }

    #[test]
    fn new_profiles_are_active() {
        let store = store();
        let admin = create_admin(&store, "ADMIN", "Head Office", Utc::now()).unwrap();
        assert_eq!(admin.status, ProfileStatus::Active);
        assert_eq!(
            store.profile(&admin.profile_id).unwrap().unwrap().status,
            ProfileStatus::Active
        );
    }

    #[test]
    fn blank_name_is_rejected() {
        let store = store();
        let config = LedgerConfig::default_test();
        let err = create_promoter(
            &store,
            &config,
            NewPromoter {
                name: "   ".into(),
                email: None,
                phone: None,
                parent_id: None,
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)), "got: {err}");
    }
}
