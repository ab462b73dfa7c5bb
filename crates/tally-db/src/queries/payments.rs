//! Payment query functions.

use rusqlite::{Connection, Row};
use tally_types::payment::{Payment, PaymentSummary};
use tally_types::user::display_name;
use tally_types::{DebtId, Money, PaymentId, UserId};

use crate::{constraint, not_found, DbError, Result};

const COLUMNS: &str = "p.payment_id, p.debt_id, p.amount_cents, p.payment_method, p.notes, p.created_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        payment_id: row.get(0)?,
        debt_id: row.get(1)?,
        amount: Money::from_cents(row.get(2)?),
        payment_method: row.get(3)?,
        notes: row.get(4)?,
        created_at: row.get::<_, i64>(5)? as u64,
    })
}

/// Insert a payment.
///
/// A payment larger than the debt's remaining balance is aborted by the
/// `payments_within_remaining` trigger and surfaces as
/// [`DbError::Constraint`].
pub fn insert(conn: &Connection, payment: &Payment) -> Result<()> {
    conn.execute(
        "INSERT INTO payments (payment_id, debt_id, amount_cents, payment_method, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            payment.payment_id,
            payment.debt_id,
            payment.amount.cents(),
            payment.payment_method,
            payment.notes,
            payment.created_at as i64,
        ],
    )
    .map_err(constraint)?;
    Ok(())
}

/// Get a payment by id.
pub fn get(conn: &Connection, payment_id: PaymentId) -> Result<Payment> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM payments p WHERE p.payment_id = ?1"),
        [payment_id],
        map_row,
    )
    .map_err(not_found("payment"))
}

/// Hard-delete a payment.
pub fn delete(conn: &Connection, payment_id: PaymentId) -> Result<()> {
    let deleted = conn.execute("DELETE FROM payments WHERE payment_id = ?1", [payment_id])?;
    if deleted == 0 {
        return Err(DbError::NotFound("payment".into()));
    }
    Ok(())
}

/// Payments against one debt, newest first.
pub fn list_for_debt(conn: &Connection, debt_id: DebtId) -> Result<Vec<Payment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM payments p WHERE p.debt_id = ?1
         ORDER BY p.created_at DESC, p.rowid DESC"
    ))?;
    let rows = stmt
        .query_map([debt_id], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Payments on every debt where `user_id` is a party, newest first.
pub fn list_for_user(conn: &Connection, user_id: UserId) -> Result<Vec<Payment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM payments p
         JOIN debts d ON d.debt_id = p.debt_id
         WHERE d.creditor_id = ?1 OR d.debtor_id = ?1
         ORDER BY p.created_at DESC, p.rowid DESC"
    ))?;
    let rows = stmt
        .query_map([user_id], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Payments with their debt description and party names, for every debt
/// where `user_id` is a party, newest first.
pub fn summaries_for_user(conn: &Connection, user_id: UserId) -> Result<Vec<PaymentSummary>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS}, d.description, c.first_name, c.last_name, b.first_name, b.last_name
         FROM payments p
         JOIN debts d ON d.debt_id = p.debt_id
         JOIN users c ON c.user_id = d.creditor_id
         JOIN users b ON b.user_id = d.debtor_id
         WHERE d.creditor_id = ?1 OR d.debtor_id = ?1
         ORDER BY p.created_at DESC, p.rowid DESC"
    ))?;
    let rows = stmt
        .query_map([user_id], |row| {
            Ok(PaymentSummary {
                payment: map_row(row)?,
                debt_description: row.get(6)?,
                creditor_name: display_name(&row.get::<_, String>(7)?, &row.get::<_, String>(8)?),
                debtor_name: display_name(&row.get::<_, String>(9)?, &row.get::<_, String>(10)?),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::debts;
    use crate::testutil::{seed_user, test_db};
    use tally_types::debt::{Debt, DebtStatus};
    use uuid::Uuid;

    fn seed_debt(conn: &Connection, creditor: UserId, debtor: UserId, cents: i64) -> DebtId {
        let debt = Debt {
            debt_id: Uuid::new_v4(),
            creditor_id: creditor,
            debtor_id: debtor,
            amount: Money::from_cents(cents),
            description: Some("rent".into()),
            due_date: None,
            status: DebtStatus::Pending,
            created_at: 10,
            updated_at: 10,
        };
        debts::insert(conn, &debt).expect("seed debt");
        debt.debt_id
    }

    fn payment(debt_id: DebtId, cents: i64, at: u64) -> Payment {
        Payment {
            payment_id: Uuid::new_v4(),
            debt_id,
            amount: Money::from_cents(cents),
            payment_method: Some("cash".into()),
            notes: None,
            created_at: at,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        let debt_id = seed_debt(&conn, alice, bob, 10_000);
        let p = payment(debt_id, 6_000, 100);
        insert(&conn, &p).expect("insert");

        assert_eq!(get(&conn, p.payment_id).expect("get"), p);
    }

    #[test]
    fn test_trigger_caps_at_remaining() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        let debt_id = seed_debt(&conn, alice, bob, 10_000);
        insert(&conn, &payment(debt_id, 6_000, 100)).expect("first");

        let over = insert(&conn, &payment(debt_id, 4_001, 110));
        match over {
            Err(DbError::Constraint(msg)) => assert!(msg.contains("exceeds remaining")),
            other => unreachable!("expected constraint, got {other:?}"),
        }
        insert(&conn, &payment(debt_id, 4_000, 120)).expect("exact remainder");
        assert_eq!(
            debts::total_paid(&conn, debt_id).expect("total"),
            Money::from_cents(10_000)
        );
    }

    #[test]
    fn test_lists_newest_first() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        let carol = seed_user(&conn, "Carol");
        let ab = seed_debt(&conn, alice, bob, 10_000);
        let bc = seed_debt(&conn, bob, carol, 10_000);
        let p1 = payment(ab, 100, 100);
        let p2 = payment(bc, 200, 200);
        let p3 = payment(ab, 300, 300);
        for p in [&p1, &p2, &p3] {
            insert(&conn, p).expect("insert");
        }

        let for_debt: Vec<_> = list_for_debt(&conn, ab)
            .expect("list")
            .into_iter()
            .map(|p| p.payment_id)
            .collect();
        assert_eq!(for_debt, vec![p3.payment_id, p1.payment_id]);

        assert_eq!(list_for_user(&conn, bob).expect("bob").len(), 3);
        assert_eq!(list_for_user(&conn, carol).expect("carol").len(), 1);
    }

    #[test]
    fn test_summaries_carry_names() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        let debt_id = seed_debt(&conn, alice, bob, 10_000);
        insert(&conn, &payment(debt_id, 2_500, 100)).expect("insert");

        let summaries = summaries_for_user(&conn, alice).expect("summaries");
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].debt_description.as_deref(), Some("rent"));
        assert_eq!(summaries[0].creditor_name, "Alice Test");
        assert_eq!(summaries[0].debtor_name, "Bob Test");
        assert_eq!(summaries[0].payment.amount, Money::from_cents(2_500));
    }

    #[test]
    fn test_delete() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        let debt_id = seed_debt(&conn, alice, bob, 10_000);
        let p = payment(debt_id, 1_000, 100);
        insert(&conn, &p).expect("insert");
        delete(&conn, p.payment_id).expect("delete");
        assert!(matches!(get(&conn, p.payment_id), Err(DbError::NotFound(_))));
    }
}
