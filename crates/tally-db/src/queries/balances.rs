//! Balance projection reads over the `user_balance` view.

use rusqlite::{Connection, Row};
use tally_types::user::UserBalance;
use tally_types::{Money, UserId};

use crate::{not_found, Result};

const SELECT: &str = "SELECT user_id, email, first_name, last_name, owed_to_me_cents, i_owe_cents,
                             owed_to_me_cents - i_owe_cents AS net_cents
                      FROM user_balance";

fn map_row(row: &Row<'_>) -> rusqlite::Result<UserBalance> {
    Ok(UserBalance {
        user_id: row.get(0)?,
        email: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        total_owed_to_me: Money::from_cents(row.get(4)?),
        total_i_owe: Money::from_cents(row.get(5)?),
        net_balance: Money::from_cents(row.get(6)?),
    })
}

/// Balance of one active user.
pub fn for_user(conn: &Connection, user_id: UserId) -> Result<UserBalance> {
    conn.query_row(&format!("{SELECT} WHERE user_id = ?1"), [user_id], map_row)
        .map_err(not_found("user balance"))
}

/// Balances of every active user, highest net balance first.
pub fn all(conn: &Connection) -> Result<Vec<UserBalance>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT} ORDER BY net_cents DESC, first_name, last_name"
    ))?;
    let rows = stmt
        .query_map([], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::{debts, users};
    use crate::testutil::{seed_user, test_db};
    use crate::DbError;
    use tally_types::debt::{Debt, DebtStatus};
    use uuid::Uuid;

    fn seed_debt(conn: &Connection, creditor: UserId, debtor: UserId, cents: i64, status: DebtStatus) {
        let debt = Debt {
            debt_id: Uuid::new_v4(),
            creditor_id: creditor,
            debtor_id: debtor,
            amount: Money::from_cents(cents),
            description: None,
            due_date: None,
            status,
            created_at: 10,
            updated_at: 10,
        };
        debts::insert(conn, &debt).expect("seed debt");
    }

    #[test]
    fn test_balance_counts_pending_only() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        seed_debt(&conn, alice, bob, 10_000, DebtStatus::Pending);
        seed_debt(&conn, alice, bob, 5_000, DebtStatus::Cancelled);
        seed_debt(&conn, bob, alice, 2_000, DebtStatus::Pending);

        let a = for_user(&conn, alice).expect("alice");
        assert_eq!(a.total_owed_to_me, Money::from_cents(10_000));
        assert_eq!(a.total_i_owe, Money::from_cents(2_000));
        assert_eq!(a.net_balance, Money::from_cents(8_000));

        let b = for_user(&conn, bob).expect("bob");
        assert_eq!(b.net_balance, Money::from_cents(-8_000));
    }

    #[test]
    fn test_all_ordered_by_net_desc() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        let carol = seed_user(&conn, "Carol");
        seed_debt(&conn, bob, alice, 3_000, DebtStatus::Pending);

        let order: Vec<_> = all(&conn)
            .expect("all")
            .into_iter()
            .map(|b| b.user_id)
            .collect();
        assert_eq!(order, vec![bob, carol, alice]);
    }

    #[test]
    fn test_inactive_user_has_no_balance() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        users::set_active(&conn, alice, false, 50).expect("deactivate");
        assert!(matches!(for_user(&conn, alice), Err(DbError::NotFound(_))));
        assert!(all(&conn).expect("all").is_empty());
    }
}
