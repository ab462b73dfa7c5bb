//! Payment ledger.
//!
//! Writes run in an IMMEDIATE transaction so the remaining-balance check,
//! the insert and the status recompute see one consistent debt. The
//! `payments_within_remaining` trigger rejects anything that slips past.

use rusqlite::{Connection, TransactionBehavior};
use tally_db::queries::{debts, payments};
use tally_db::DbError;
use tally_types::auth::AuthenticatedUser;
use tally_types::debt::{Debt, DebtStatus};
use tally_types::payment::{NewPayment, Payment, PaymentSummary};
use tally_types::{DebtId, Money, PaymentId, UserId, MAX_NOTES_LEN, MAX_PAYMENT_METHOD_LEN};
use tracing::info;
use uuid::Uuid;

use crate::debts::{authorize, check_amount};
use crate::{check_len, Error, Result};

/// A payment write together with the parent debt as it stands afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub debt: Debt,
}

/// Record a payment against a pending debt the caller is a party to.
///
/// The debt flips to paid once payments cover its amount.
///
/// # Errors
///
/// - [`Error::InvalidArgument`] for a non-positive amount or one above the
///   remaining balance
/// - [`Error::InvalidOperation`] if the debt is not pending
/// - [`Error::NotFound`] / [`Error::Forbidden`] as for [`authorize`]
pub fn create(
    conn: &mut Connection,
    caller: &AuthenticatedUser,
    new: NewPayment,
    now: u64,
) -> Result<PaymentOutcome> {
    check_amount(new.amount)?;
    if let Some(method) = &new.payment_method {
        check_len("payment method", method, MAX_PAYMENT_METHOD_LEN)?;
    }
    if let Some(notes) = &new.notes {
        check_len("notes", notes, MAX_NOTES_LEN)?;
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut debt = authorize(&tx, caller, new.debt_id)?;
    if debt.status != DebtStatus::Pending {
        return Err(Error::InvalidOperation(format!(
            "cannot add a payment to a {} debt",
            debt.status
        )));
    }
    let paid = debts::total_paid(&tx, debt.debt_id)?;
    let remaining = debt.amount - paid;
    if new.amount > remaining {
        return Err(Error::InvalidArgument(format!(
            "payment exceeds remaining balance of {remaining}"
        )));
    }

    let payment = Payment {
        payment_id: Uuid::new_v4(),
        debt_id: debt.debt_id,
        amount: new.amount,
        payment_method: new.payment_method,
        notes: new.notes,
        created_at: now,
    };
    payments::insert(&tx, &payment).map_err(|e| match e {
        DbError::Constraint(_) => {
            Error::InvalidArgument("payment exceeds remaining balance".into())
        }
        other => other.into(),
    })?;

    if paid + payment.amount >= debt.amount {
        debts::set_status(&tx, debt.debt_id, DebtStatus::Paid, now)?;
        debt.status = DebtStatus::Paid;
        debt.updated_at = now;
    }
    tx.commit()?;

    info!(
        payment_id = %payment.payment_id,
        debt_id = %debt.debt_id,
        amount = %payment.amount,
        debt_status = %debt.status,
        "payment recorded"
    );
    Ok(PaymentOutcome { payment, debt })
}

/// Remove a payment. A paid debt that is no longer covered goes back to
/// pending.
pub fn delete(
    conn: &mut Connection,
    caller: &AuthenticatedUser,
    payment_id: PaymentId,
    now: u64,
) -> Result<PaymentOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let payment = payments::get(&tx, payment_id)?;
    let mut debt = authorize(&tx, caller, payment.debt_id)?;
    payments::delete(&tx, payment_id)?;

    if debt.status == DebtStatus::Paid && debts::total_paid(&tx, debt.debt_id)? < debt.amount {
        debts::set_status(&tx, debt.debt_id, DebtStatus::Pending, now)?;
        debt.status = DebtStatus::Pending;
        debt.updated_at = now;
    }
    tx.commit()?;

    info!(
        payment_id = %payment_id,
        debt_id = %debt.debt_id,
        debt_status = %debt.status,
        "payment deleted"
    );
    Ok(PaymentOutcome { payment, debt })
}

pub fn get(conn: &Connection, caller: &AuthenticatedUser, payment_id: PaymentId) -> Result<Payment> {
    let payment = payments::get(conn, payment_id)?;
    authorize(conn, caller, payment.debt_id)?;
    Ok(payment)
}

/// Payments on one debt, newest first.
pub fn for_debt(conn: &Connection, caller: &AuthenticatedUser, debt_id: DebtId) -> Result<Vec<Payment>> {
    authorize(conn, caller, debt_id)?;
    Ok(payments::list_for_debt(conn, debt_id)?)
}

/// Payments on every debt `user_id` is a party to, newest first.
pub fn for_user(conn: &Connection, user_id: UserId) -> Result<Vec<Payment>> {
    Ok(payments::list_for_user(conn, user_id)?)
}

pub fn summaries(conn: &Connection, user_id: UserId) -> Result<Vec<PaymentSummary>> {
    Ok(payments::summaries_for_user(conn, user_id)?)
}

pub fn total_paid_for_debt(conn: &Connection, caller: &AuthenticatedUser, debt_id: DebtId) -> Result<Money> {
    authorize(conn, caller, debt_id)?;
    Ok(debts::total_paid(conn, debt_id)?)
}

/// Would [`create`] accept `amount` right now? Read-only.
pub fn validate_amount(
    conn: &Connection,
    caller: &AuthenticatedUser,
    debt_id: DebtId,
    amount: Money,
) -> Result<bool> {
    let debt = authorize(conn, caller, debt_id)?;
    if debt.status != DebtStatus::Pending || !amount.is_positive() {
        return Ok(false);
    }
    let remaining = debt.amount - debts::total_paid(conn, debt_id)?;
    Ok(amount <= remaining)
}

/// True iff `user_id` is a party to the payment's debt. False for a missing
/// payment.
pub fn user_can_access(conn: &Connection, user_id: UserId, payment_id: PaymentId) -> Result<bool> {
    let payment = match payments::get(conn, payment_id) {
        Ok(payment) => payment,
        Err(DbError::NotFound(_)) => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    crate::debts::user_can_access(conn, user_id, payment.debt_id)
}
