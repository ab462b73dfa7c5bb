//! Debt query functions.

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use tally_types::debt::{Debt, DebtStatus, DebtSummary};
use tally_types::user::display_name;
use tally_types::{DebtId, Money, UserId};

use crate::{constraint, not_found, parse_column, DbError, Result};

const COLUMNS: &str = "d.debt_id, d.creditor_id, d.debtor_id, d.amount_cents, d.description, \
                       d.due_date, d.status, d.created_at, d.updated_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<Debt> {
    Ok(Debt {
        debt_id: row.get(0)?,
        creditor_id: row.get(1)?,
        debtor_id: row.get(2)?,
        amount: Money::from_cents(row.get(3)?),
        description: row.get(4)?,
        due_date: row.get(5)?,
        status: parse_column(row, 6)?,
        created_at: row.get::<_, i64>(7)? as u64,
        updated_at: row.get::<_, i64>(8)? as u64,
    })
}

/// Which debts a listing returns. Every variant is scoped to one user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    /// Creditor or debtor.
    Involving(UserId),
    AsCreditor(UserId),
    AsDebtor(UserId),
    /// Pending, either side.
    Pending(UserId),
    /// Pending, either side, due strictly before the given date.
    Overdue(UserId, NaiveDate),
}

impl Filter {
    fn clause(&self) -> &'static str {
        match self {
            Filter::Involving(_) => "(d.creditor_id = ?1 OR d.debtor_id = ?1)",
            Filter::AsCreditor(_) => "d.creditor_id = ?1",
            Filter::AsDebtor(_) => "d.debtor_id = ?1",
            Filter::Pending(_) => "(d.creditor_id = ?1 OR d.debtor_id = ?1) AND d.status = 'pending'",
            Filter::Overdue(..) => {
                "(d.creditor_id = ?1 OR d.debtor_id = ?1) AND d.status = 'pending' \
                 AND d.due_date IS NOT NULL AND d.due_date < ?2"
            }
        }
    }

    fn params(&self) -> Vec<Value> {
        match *self {
            Filter::Involving(user)
            | Filter::AsCreditor(user)
            | Filter::AsDebtor(user)
            | Filter::Pending(user) => vec![Value::Blob(user.as_bytes().to_vec())],
            Filter::Overdue(user, today) => vec![
                Value::Blob(user.as_bytes().to_vec()),
                Value::Text(today.format("%F").to_string()),
            ],
        }
    }
}

/// Insert a new debt. Self-debts and non-positive amounts are rejected by
/// the store as [`DbError::Constraint`].
pub fn insert(conn: &Connection, debt: &Debt) -> Result<()> {
    conn.execute(
        "INSERT INTO debts (debt_id, creditor_id, debtor_id, amount_cents, description,
                            due_date, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            debt.debt_id,
            debt.creditor_id,
            debt.debtor_id,
            debt.amount.cents(),
            debt.description,
            debt.due_date,
            debt.status.as_str(),
            debt.created_at as i64,
            debt.updated_at as i64,
        ],
    )
    .map_err(constraint)?;
    Ok(())
}

/// Get a debt by id.
pub fn get(conn: &Connection, debt_id: DebtId) -> Result<Debt> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM debts d WHERE d.debt_id = ?1"),
        [debt_id],
        map_row,
    )
    .map_err(not_found("debt"))
}

/// Persist the mutable fields of `debt`: amount, description, due date,
/// status and `updated_at`.
pub fn update(conn: &Connection, debt: &Debt) -> Result<()> {
    let updated = conn
        .execute(
            "UPDATE debts SET amount_cents = ?1, description = ?2, due_date = ?3,
                              status = ?4, updated_at = ?5
             WHERE debt_id = ?6",
            rusqlite::params![
                debt.amount.cents(),
                debt.description,
                debt.due_date,
                debt.status.as_str(),
                debt.updated_at as i64,
                debt.debt_id,
            ],
        )
        .map_err(constraint)?;
    if updated == 0 {
        return Err(DbError::NotFound("debt".into()));
    }
    Ok(())
}

/// Set only the status.
pub fn set_status(conn: &Connection, debt_id: DebtId, status: DebtStatus, now: u64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE debts SET status = ?1, updated_at = ?2 WHERE debt_id = ?3",
        rusqlite::params![status.as_str(), now as i64, debt_id],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound("debt".into()));
    }
    Ok(())
}

/// Move a pending debt to `status`. Returns false if the debt is gone or
/// no longer pending.
pub fn resolve_pending(conn: &Connection, debt_id: DebtId, status: DebtStatus, now: u64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE debts SET status = ?1, updated_at = ?2 WHERE debt_id = ?3 AND status = 'pending'",
        rusqlite::params![status.as_str(), now as i64, debt_id],
    )?;
    Ok(updated > 0)
}

/// Hard-delete a debt; its payments cascade.
pub fn delete(conn: &Connection, debt_id: DebtId) -> Result<()> {
    let deleted = conn.execute("DELETE FROM debts WHERE debt_id = ?1", [debt_id])?;
    if deleted == 0 {
        return Err(DbError::NotFound("debt".into()));
    }
    Ok(())
}

/// Debts matching `filter`, newest first.
pub fn list(conn: &Connection, filter: Filter) -> Result<Vec<Debt>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM debts d WHERE {} ORDER BY d.created_at DESC, d.rowid DESC",
        filter.clause()
    ))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(filter.params()), map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn summary_select(where_clause: &str) -> String {
    format!(
        "SELECT {COLUMNS}, c.first_name, c.last_name, b.first_name, b.last_name, r.paid_cents
         FROM debts d
         JOIN users c ON c.user_id = d.creditor_id
         JOIN users b ON b.user_id = d.debtor_id
         JOIN debt_remaining r ON r.debt_id = d.debt_id
         WHERE {where_clause}
         ORDER BY d.created_at DESC, d.rowid DESC"
    )
}

fn map_summary(row: &Row<'_>, today: NaiveDate) -> rusqlite::Result<DebtSummary> {
    let debt = map_row(row)?;
    let creditor_name = display_name(&row.get::<_, String>(9)?, &row.get::<_, String>(10)?);
    let debtor_name = display_name(&row.get::<_, String>(11)?, &row.get::<_, String>(12)?);
    let total_paid = Money::from_cents(row.get(13)?);
    let is_overdue = debt.is_overdue(today);
    Ok(DebtSummary {
        remaining: debt.amount - total_paid,
        debt,
        creditor_name,
        debtor_name,
        total_paid,
        is_overdue,
    })
}

/// Summary (names, totals, overdue flag) of one debt.
pub fn summary(conn: &Connection, debt_id: DebtId, today: NaiveDate) -> Result<DebtSummary> {
    conn.query_row(&summary_select("d.debt_id = ?1"), [debt_id], |row| {
        map_summary(row, today)
    })
    .map_err(not_found("debt"))
}

/// Summaries of the debts matching `filter`, newest first.
pub fn summaries(conn: &Connection, filter: Filter, today: NaiveDate) -> Result<Vec<DebtSummary>> {
    let mut stmt = conn.prepare(&summary_select(filter.clause()))?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(filter.params()), |row| {
            map_summary(row, today)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Sum of payments recorded against a debt.
pub fn total_paid(conn: &Connection, debt_id: DebtId) -> Result<Money> {
    let cents: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM payments WHERE debt_id = ?1",
        [debt_id],
        |row| row.get(0),
    )?;
    Ok(Money::from_cents(cents))
}

/// Remaining balance over pending debts where `user_id` is the creditor.
pub fn total_owed_to(conn: &Connection, user_id: UserId) -> Result<Money> {
    let cents: i64 = conn.query_row(
        "SELECT COALESCE(SUM(remaining_cents), 0) FROM debt_remaining
         WHERE creditor_id = ?1 AND status = 'pending'",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(Money::from_cents(cents))
}

/// Remaining balance over pending debts where `user_id` is the debtor.
pub fn total_owed_by(conn: &Connection, user_id: UserId) -> Result<Money> {
    let cents: i64 = conn.query_row(
        "SELECT COALESCE(SUM(remaining_cents), 0) FROM debt_remaining
         WHERE debtor_id = ?1 AND status = 'pending'",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(Money::from_cents(cents))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_user, test_db};
    use uuid::Uuid;

    fn debt(creditor: UserId, debtor: UserId, cents: i64, at: u64) -> Debt {
        Debt {
            debt_id: Uuid::new_v4(),
            creditor_id: creditor,
            debtor_id: debtor,
            amount: Money::from_cents(cents),
            description: Some("lunch".into()),
            due_date: None,
            status: DebtStatus::Pending,
            created_at: at,
            updated_at: at,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_insert_and_get() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        let mut d = debt(alice, bob, 10_000, 100);
        d.due_date = Some(date(2024, 3, 1));
        insert(&conn, &d).expect("insert");

        assert_eq!(get(&conn, d.debt_id).expect("get"), d);
    }

    #[test]
    fn test_store_rejects_self_debt_and_zero_amount() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        assert!(matches!(
            insert(&conn, &debt(alice, alice, 100, 1)),
            Err(DbError::Constraint(_))
        ));
        assert!(matches!(
            insert(&conn, &debt(alice, bob, 0, 1)),
            Err(DbError::Constraint(_))
        ));
    }

    #[test]
    fn test_filters() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        let carol = seed_user(&conn, "Carol");

        let ab = debt(alice, bob, 1_000, 100);
        let ca = debt(carol, alice, 2_000, 200);
        let mut bc = debt(bob, carol, 3_000, 300);
        bc.status = DebtStatus::Paid;
        let mut overdue = debt(alice, carol, 4_000, 400);
        overdue.due_date = Some(date(2024, 1, 10));
        for d in [&ab, &ca, &bc, &overdue] {
            insert(&conn, d).expect("insert");
        }

        let ids = |f| -> Vec<DebtId> {
            list(&conn, f)
                .expect("list")
                .into_iter()
                .map(|d| d.debt_id)
                .collect()
        };

        assert_eq!(
            ids(Filter::Involving(alice)),
            vec![overdue.debt_id, ca.debt_id, ab.debt_id]
        );
        assert_eq!(ids(Filter::AsCreditor(alice)), vec![overdue.debt_id, ab.debt_id]);
        assert_eq!(ids(Filter::AsDebtor(alice)), vec![ca.debt_id]);
        assert_eq!(ids(Filter::Pending(bob)), vec![ab.debt_id]);
        assert_eq!(
            ids(Filter::Overdue(carol, date(2024, 1, 11))),
            vec![overdue.debt_id]
        );
        assert!(ids(Filter::Overdue(carol, date(2024, 1, 10))).is_empty());
    }

    #[test]
    fn test_update_and_status() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        let mut d = debt(alice, bob, 1_000, 100);
        insert(&conn, &d).expect("insert");

        d.amount = Money::from_cents(1_500);
        d.description = None;
        d.updated_at = 200;
        update(&conn, &d).expect("update");
        assert!(resolve_pending(&conn, d.debt_id, DebtStatus::Cancelled, 300).expect("cancel"));
        assert!(!resolve_pending(&conn, d.debt_id, DebtStatus::Paid, 400).expect("settled"));

        let stored = get(&conn, d.debt_id).expect("get");
        assert_eq!(stored.amount, Money::from_cents(1_500));
        assert_eq!(stored.description, None);
        assert_eq!(stored.status, DebtStatus::Cancelled);
        assert_eq!(stored.updated_at, 300);
    }

    #[test]
    fn test_summary_and_totals() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        let d = debt(alice, bob, 10_000, 100);
        insert(&conn, &d).expect("insert");
        conn.execute(
            "INSERT INTO payments (payment_id, debt_id, amount_cents, created_at) VALUES (?1, ?2, 6000, 150)",
            rusqlite::params![Uuid::new_v4(), d.debt_id],
        )
        .expect("payment");

        let s = summary(&conn, d.debt_id, date(2024, 1, 1)).expect("summary");
        assert_eq!(s.creditor_name, "Alice Test");
        assert_eq!(s.debtor_name, "Bob Test");
        assert_eq!(s.total_paid, Money::from_cents(6_000));
        assert_eq!(s.remaining, Money::from_cents(4_000));
        assert!(!s.is_overdue);

        assert_eq!(total_paid(&conn, d.debt_id).expect("paid"), Money::from_cents(6_000));
        assert_eq!(total_owed_to(&conn, alice).expect("owed"), Money::from_cents(4_000));
        assert_eq!(total_owed_by(&conn, bob).expect("owes"), Money::from_cents(4_000));
        assert_eq!(total_owed_by(&conn, alice).expect("owes"), Money::ZERO);

        let all = summaries(&conn, Filter::Involving(bob), date(2024, 1, 1)).expect("all");
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_delete_cascades_payments() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        let d = debt(alice, bob, 10_000, 100);
        insert(&conn, &d).expect("insert");
        conn.execute(
            "INSERT INTO payments (payment_id, debt_id, amount_cents, created_at) VALUES (?1, ?2, 100, 150)",
            rusqlite::params![Uuid::new_v4(), d.debt_id],
        )
        .expect("payment");

        delete(&conn, d.debt_id).expect("delete");
        let left: i64 = conn
            .query_row("SELECT COUNT(*) FROM payments", [], |row| row.get(0))
            .expect("count");
        assert_eq!(left, 0);
    }
}
