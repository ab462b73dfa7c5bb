//! Debts between a creditor and a debtor.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::payment::Payment;
use crate::{DebtId, Money, TypesError, UserId};

/// Debt lifecycle state.
///
/// `Pending` is the only state that accepts edits, payments or manual
/// transitions. `Paid` can drop back to `Pending` when a payment is deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtStatus {
    Pending,
    Paid,
    Cancelled,
}

impl DebtStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DebtStatus::Pending => "pending",
            DebtStatus::Paid => "paid",
            DebtStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, DebtStatus::Pending)
    }
}

impl fmt::Display for DebtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DebtStatus {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DebtStatus::Pending),
            "paid" => Ok(DebtStatus::Paid),
            "cancelled" => Ok(DebtStatus::Cancelled),
            other => Err(TypesError::UnknownVariant {
                kind: "debt status",
                value: other.to_string(),
            }),
        }
    }
}

/// A stored debt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    pub debt_id: DebtId,
    pub creditor_id: UserId,
    pub debtor_id: UserId,
    pub amount: Money,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: DebtStatus,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Debt {
    /// True if `user_id` is the creditor or the debtor.
    pub fn is_party(&self, user_id: UserId) -> bool {
        self.creditor_id == user_id || self.debtor_id == user_id
    }

    /// Pending with a due date strictly before `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == DebtStatus::Pending && self.due_date.is_some_and(|due| due < today)
    }
}

/// Input for a new debt. The creditor is always the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewDebt {
    pub debtor_id: UserId,
    pub amount: Money,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
}

/// Partial debt update. `None` leaves the field unchanged; status is not
/// patchable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtPatch {
    pub amount: Option<Money>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl DebtPatch {
    /// Merge the provided fields into `debt`.
    pub fn apply(&self, debt: &mut Debt) {
        if let Some(amount) = self.amount {
            debt.amount = amount;
        }
        if let Some(description) = &self.description {
            debt.description = Some(description.clone());
        }
        if let Some(due_date) = self.due_date {
            debt.due_date = Some(due_date);
        }
    }
}

/// A debt with party names and payment totals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtSummary {
    #[serde(flatten)]
    pub debt: Debt,
    pub creditor_name: String,
    pub debtor_name: String,
    pub total_paid: Money,
    pub remaining: Money,
    pub is_overdue: bool,
}

/// A summary plus the debt's payments, newest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtDetails {
    #[serde(flatten)]
    pub summary: DebtSummary,
    pub payments: Vec<Payment>,
}
