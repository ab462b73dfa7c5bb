//! Payments recorded against a debt.

use serde::{Deserialize, Serialize};

use crate::{DebtId, Money, PaymentId};

/// A stored payment. Immutable once created; it can only be deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub payment_id: PaymentId,
    pub debt_id: DebtId,
    pub amount: Money,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_at: u64,
}

/// Input for a new payment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPayment {
    pub debt_id: DebtId,
    pub amount: Money,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

/// A payment with the debt's description and party names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSummary {
    #[serde(flatten)]
    pub payment: Payment,
    pub debt_description: Option<String>,
    pub creditor_name: String,
    pub debtor_name: String,
}
