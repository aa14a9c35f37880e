//! Shared primitive types used across the ledger.

use crate::error::LedgerError;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A stable, unique identifier for any profile (uuid v4 text).
pub type ProfileId = String;

/// The identifier of one maintenance sweep.
pub type RunId = String;

/// Run id used for events written outside of a sweep.
pub const ONBOARDING_RUN: &str = "onboarding";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Promoter,
    Customer,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Credited,
    Pending,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PinRequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// Whether a maintenance sweep only reports defects or also fixes them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Check,
    Repair,
}

/// Text-backed enums stored in SQLite as their snake_case name.
macro_rules! text_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(LedgerError::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                text.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum!(Role, "role", {
    Admin => "admin",
    Promoter => "promoter",
    Customer => "customer",
});

text_enum!(ProfileStatus, "profile status", {
    Active => "active",
    Inactive => "inactive",
});

text_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Paid => "paid",
});

text_enum!(CommissionStatus, "commission status", {
    Credited => "credited",
    Pending => "pending",
});

text_enum!(PinRequestStatus, "pin request status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

text_enum!(RunMode, "run mode", {
    Check => "check",
    Repair => "repair",
});

impl Role {
    /// Roles that can sit in a referral chain and hold a wallet.
    pub fn can_refer(&self) -> bool {
        matches!(self, Self::Admin | Self::Promoter)
    }
}
