//! Debt lifecycle.
//!
//! Only a pending debt accepts edits, payments or manual transitions. Paid
//! and cancelled debts are terminal, except that deleting a payment can
//! drop a paid debt back to pending (see [`crate::payments::delete`]).

use rusqlite::{Connection, TransactionBehavior};
use tally_db::queries::debts::{self, Filter};
use tally_db::queries::{payments, users};
use tally_db::DbError;
use tally_types::auth::AuthenticatedUser;
use tally_types::debt::{Debt, DebtDetails, DebtPatch, DebtStatus, DebtSummary, NewDebt};
use tally_types::{date_of, DebtId, Money, UserId, MAX_DESCRIPTION_LEN};
use tracing::info;
use uuid::Uuid;

use crate::{check_len, Error, Result};

/// Which of the caller's debts a listing returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebtView {
    /// Caller is creditor or debtor.
    All,
    AsCreditor,
    AsDebtor,
    Pending,
    /// Pending and due before today.
    Overdue,
}

impl DebtView {
    fn filter(self, user_id: UserId, now: u64) -> Filter {
        match self {
            DebtView::All => Filter::Involving(user_id),
            DebtView::AsCreditor => Filter::AsCreditor(user_id),
            DebtView::AsDebtor => Filter::AsDebtor(user_id),
            DebtView::Pending => Filter::Pending(user_id),
            DebtView::Overdue => Filter::Overdue(user_id, date_of(now)),
        }
    }
}

pub(crate) fn check_amount(amount: Money) -> Result<()> {
    if !amount.is_positive() {
        return Err(Error::InvalidArgument("amount must be greater than zero".into()));
    }
    Ok(())
}

fn check_description(description: Option<&str>) -> Result<()> {
    if let Some(description) = description {
        check_len("description", description, MAX_DESCRIPTION_LEN)?;
    }
    Ok(())
}

/// Load a debt the caller is a party to.
///
/// # Errors
///
/// [`Error::NotFound`] if the debt is missing, [`Error::Forbidden`] if the
/// caller is neither creditor nor debtor.
pub fn authorize(conn: &Connection, caller: &AuthenticatedUser, debt_id: DebtId) -> Result<Debt> {
    let debt = debts::get(conn, debt_id)?;
    if !debt.is_party(caller.user_id) {
        return Err(Error::Forbidden("not a party to this debt".into()));
    }
    Ok(debt)
}

/// True iff `user_id` is the creditor or debtor. False for a missing debt.
pub fn user_can_access(conn: &Connection, user_id: UserId, debt_id: DebtId) -> Result<bool> {
    match debts::get(conn, debt_id) {
        Ok(debt) => Ok(debt.is_party(user_id)),
        Err(DbError::NotFound(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Record a new pending debt with the caller as creditor.
pub fn create(conn: &Connection, caller: &AuthenticatedUser, new: NewDebt, now: u64) -> Result<Debt> {
    if new.debtor_id == caller.user_id {
        return Err(Error::InvalidArgument(
            "creditor and debtor must be different users".into(),
        ));
    }
    check_amount(new.amount)?;
    check_description(new.description.as_deref())?;
    if !users::exists(conn, caller.user_id)? || !users::exists(conn, new.debtor_id)? {
        return Err(Error::InvalidArgument(
            "creditor or debtor does not exist or is inactive".into(),
        ));
    }

    let debt = Debt {
        debt_id: Uuid::new_v4(),
        creditor_id: caller.user_id,
        debtor_id: new.debtor_id,
        amount: new.amount,
        description: new.description,
        due_date: new.due_date,
        status: DebtStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    debts::insert(conn, &debt)?;

    info!(
        debt_id = %debt.debt_id,
        creditor_id = %debt.creditor_id,
        debtor_id = %debt.debtor_id,
        amount = %debt.amount,
        "debt created"
    );
    Ok(debt)
}

/// A debt with party names, totals and its payments.
pub fn get(conn: &Connection, caller: &AuthenticatedUser, debt_id: DebtId, now: u64) -> Result<DebtDetails> {
    authorize(conn, caller, debt_id)?;
    let summary = debts::summary(conn, debt_id, date_of(now))?;
    let payments = payments::list_for_debt(conn, debt_id)?;
    Ok(DebtDetails { summary, payments })
}

/// Apply a patch to a pending debt.
///
/// Lowering the amount below what has been paid is rejected. Lowering it to
/// exactly the paid total settles the debt.
pub fn update(
    conn: &mut Connection,
    caller: &AuthenticatedUser,
    debt_id: DebtId,
    patch: &DebtPatch,
    now: u64,
) -> Result<Debt> {
    if let Some(amount) = patch.amount {
        check_amount(amount)?;
    }
    check_description(patch.description.as_deref())?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut debt = authorize(&tx, caller, debt_id)?;
    if debt.status != DebtStatus::Pending {
        return Err(Error::InvalidOperation(format!(
            "cannot edit a {} debt",
            debt.status
        )));
    }

    patch.apply(&mut debt);
    let paid = debts::total_paid(&tx, debt_id)?;
    if debt.amount < paid {
        return Err(Error::InvalidArgument(format!(
            "amount cannot be less than the {paid} already paid"
        )));
    }
    if paid.is_positive() && debt.amount == paid {
        debt.status = DebtStatus::Paid;
    }
    debt.updated_at = now;
    debts::update(&tx, &debt)?;
    tx.commit()?;

    info!(debt_id = %debt_id, status = %debt.status, "debt updated");
    Ok(debt)
}

fn transition(
    conn: &Connection,
    caller: &AuthenticatedUser,
    debt_id: DebtId,
    to: DebtStatus,
    now: u64,
) -> Result<Debt> {
    let mut debt = authorize(conn, caller, debt_id)?;
    if debt.status != DebtStatus::Pending {
        return Err(Error::InvalidOperation(format!(
            "debt is already {}",
            debt.status
        )));
    }
    // Another connection may have settled it since the read.
    if !debts::resolve_pending(conn, debt_id, to, now)? {
        return Err(Error::InvalidOperation("debt is no longer pending".into()));
    }
    debt.status = to;
    debt.updated_at = now;

    info!(debt_id = %debt_id, user_id = %caller.user_id, status = %to, "debt status changed");
    Ok(debt)
}

/// Settle a pending debt by hand.
pub fn mark_paid(conn: &Connection, caller: &AuthenticatedUser, debt_id: DebtId, now: u64) -> Result<Debt> {
    transition(conn, caller, debt_id, DebtStatus::Paid, now)
}

pub fn cancel(conn: &Connection, caller: &AuthenticatedUser, debt_id: DebtId, now: u64) -> Result<Debt> {
    transition(conn, caller, debt_id, DebtStatus::Cancelled, now)
}

/// Hard delete. Returns the removed debt.
pub fn delete(conn: &Connection, caller: &AuthenticatedUser, debt_id: DebtId) -> Result<Debt> {
    let debt = authorize(conn, caller, debt_id)?;
    debts::delete(conn, debt_id)?;
    info!(debt_id = %debt_id, user_id = %caller.user_id, "debt deleted");
    Ok(debt)
}

/// The caller's debts in `view`, newest first.
pub fn list(conn: &Connection, caller: &AuthenticatedUser, view: DebtView, now: u64) -> Result<Vec<Debt>> {
    Ok(debts::list(conn, view.filter(caller.user_id, now))?)
}

/// Like [`list`] but with names, totals and overdue flags.
pub fn summaries(
    conn: &Connection,
    caller: &AuthenticatedUser,
    view: DebtView,
    now: u64,
) -> Result<Vec<DebtSummary>> {
    Ok(debts::summaries(
        conn,
        view.filter(caller.user_id, now),
        date_of(now),
    )?)
}

/// What others still owe `user_id` over pending debts.
pub fn total_owed_to(conn: &Connection, user_id: UserId) -> Result<Money> {
    Ok(debts::total_owed_to(conn, user_id)?)
}

/// What `user_id` still owes over pending debts.
pub fn total_owed_by(conn: &Connection, user_id: UserId) -> Result<Money> {
    Ok(debts::total_owed_by(conn, user_id)?)
}
