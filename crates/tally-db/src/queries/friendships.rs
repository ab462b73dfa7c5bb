//! Friendship query functions.
//!
//! Rows are directed (requester -> addressee) but the store keeps at most one
//! row per unordered pair. Friend lists read the `accepted_friends` view.

use rusqlite::{Connection, OptionalExtension, Row};
use tally_types::friendship::{Friend, FriendRequest, Friendship, FriendshipStatus};
use tally_types::{FriendshipId, UserId};

use crate::{constraint, not_found, parse_column, DbError, Result};

const COLUMNS: &str = "friendship_id, requester_id, addressee_id, status, created_at, updated_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<Friendship> {
    Ok(Friendship {
        friendship_id: row.get(0)?,
        requester_id: row.get(1)?,
        addressee_id: row.get(2)?,
        status: parse_column(row, 3)?,
        created_at: row.get::<_, i64>(4)? as u64,
        updated_at: row.get::<_, i64>(5)? as u64,
    })
}

fn map_request(row: &Row<'_>) -> rusqlite::Result<FriendRequest> {
    Ok(FriendRequest {
        friendship_id: row.get(0)?,
        counterpart_id: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        status: parse_column(row, 5)?,
        created_at: row.get::<_, i64>(6)? as u64,
    })
}

/// Insert a friendship. A second row for the same pair, in either
/// direction, is a [`DbError::Constraint`].
pub fn insert(conn: &Connection, friendship: &Friendship) -> Result<()> {
    conn.execute(
        "INSERT INTO friendships (friendship_id, requester_id, addressee_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            friendship.friendship_id,
            friendship.requester_id,
            friendship.addressee_id,
            friendship.status.as_str(),
            friendship.created_at as i64,
            friendship.updated_at as i64,
        ],
    )
    .map_err(constraint)?;
    Ok(())
}

/// Get a friendship by id.
pub fn get(conn: &Connection, friendship_id: FriendshipId) -> Result<Friendship> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM friendships WHERE friendship_id = ?1"),
        [friendship_id],
        map_row,
    )
    .map_err(not_found("friendship"))
}

/// The relationship between two users, in whichever direction it exists.
pub fn find_between(conn: &Connection, a: UserId, b: UserId) -> Result<Option<Friendship>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {COLUMNS} FROM friendships
                 WHERE (requester_id = ?1 AND addressee_id = ?2)
                    OR (requester_id = ?2 AND addressee_id = ?1)"
            ),
            [a, b],
            map_row,
        )
        .optional()?;
    Ok(row)
}

/// True if a row `requester -> addressee` with `status` exists (directional).
pub fn exists_directed(
    conn: &Connection,
    requester: UserId,
    addressee: UserId,
    status: FriendshipStatus,
) -> Result<bool> {
    let found: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM friendships
                       WHERE requester_id = ?1 AND addressee_id = ?2 AND status = ?3)",
        rusqlite::params![requester, addressee, status.as_str()],
        |row| row.get(0),
    )?;
    Ok(found)
}

/// Answer a pending request with `status`. Returns false if the row is
/// gone or no longer pending.
pub fn answer_pending(
    conn: &Connection,
    friendship_id: FriendshipId,
    status: FriendshipStatus,
    now: u64,
) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE friendships SET status = ?1, updated_at = ?2
         WHERE friendship_id = ?3 AND status = 'pending'",
        rusqlite::params![status.as_str(), now as i64, friendship_id],
    )?;
    Ok(updated > 0)
}

/// Hard-delete a request that is still pending. Returns false otherwise.
pub fn delete_pending(conn: &Connection, friendship_id: FriendshipId) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM friendships WHERE friendship_id = ?1 AND status = 'pending'",
        [friendship_id],
    )?;
    Ok(deleted > 0)
}

/// Hard-delete the accepted friendship between two users, either direction.
/// Returns false if there was none.
pub fn delete_accepted_between(conn: &Connection, a: UserId, b: UserId) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM friendships
         WHERE status = 'accepted'
           AND ((requester_id = ?1 AND addressee_id = ?2)
             OR (requester_id = ?2 AND addressee_id = ?1))",
        [a, b],
    )?;
    Ok(deleted > 0)
}

/// Accepted friends of `user_id` from the `accepted_friends` projection,
/// ordered by first then last name.
pub fn friends_of(conn: &Connection, user_id: UserId) -> Result<Vec<Friend>> {
    let mut stmt = conn.prepare(
        "SELECT friend_id, email, first_name, last_name, friends_since
         FROM accepted_friends
         WHERE user_id = ?1
         ORDER BY first_name, last_name",
    )?;
    let rows = stmt
        .query_map([user_id], |row| {
            Ok(Friend {
                friend_id: row.get(0)?,
                email: row.get(1)?,
                first_name: row.get(2)?,
                last_name: row.get(3)?,
                friends_since: row.get::<_, i64>(4)? as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Pending requests addressed to `user_id`, annotated with the requester.
pub fn pending_received(conn: &Connection, user_id: UserId) -> Result<Vec<FriendRequest>> {
    let mut stmt = conn.prepare(
        "SELECT f.friendship_id, u.user_id, u.email, u.first_name, u.last_name, f.status, f.created_at
         FROM friendships f
         JOIN users u ON u.user_id = f.requester_id
         WHERE f.addressee_id = ?1 AND f.status = 'pending'
         ORDER BY f.created_at DESC, f.rowid DESC",
    )?;
    let rows = stmt
        .query_map([user_id], map_request)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Pending requests sent by `user_id`, annotated with the addressee.
pub fn pending_sent(conn: &Connection, user_id: UserId) -> Result<Vec<FriendRequest>> {
    let mut stmt = conn.prepare(
        "SELECT f.friendship_id, u.user_id, u.email, u.first_name, u.last_name, f.status, f.created_at
         FROM friendships f
         JOIN users u ON u.user_id = f.addressee_id
         WHERE f.requester_id = ?1 AND f.status = 'pending'
         ORDER BY f.created_at DESC, f.rowid DESC",
    )?;
    let rows = stmt
        .query_map([user_id], map_request)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_user, test_db};
    use uuid::Uuid;

    fn request(requester: UserId, addressee: UserId, at: u64) -> Friendship {
        Friendship {
            friendship_id: Uuid::new_v4(),
            requester_id: requester,
            addressee_id: addressee,
            status: FriendshipStatus::Pending,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        let f = request(alice, bob, 100);
        insert(&conn, &f).expect("insert");

        assert_eq!(get(&conn, f.friendship_id).expect("get"), f);
        assert!(exists_directed(&conn, alice, bob, FriendshipStatus::Pending).expect("exists"));
        assert!(!exists_directed(&conn, bob, alice, FriendshipStatus::Pending).expect("exists"));
    }

    #[test]
    fn test_reverse_duplicate_rejected_by_store() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        insert(&conn, &request(alice, bob, 100)).expect("insert");

        assert!(matches!(
            insert(&conn, &request(bob, alice, 200)),
            Err(DbError::Constraint(_))
        ));
        assert!(matches!(
            insert(&conn, &request(alice, bob, 200)),
            Err(DbError::Constraint(_))
        ));
    }

    #[test]
    fn test_self_request_rejected_by_store() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        assert!(matches!(
            insert(&conn, &request(alice, alice, 100)),
            Err(DbError::Constraint(_))
        ));
    }

    #[test]
    fn test_find_between_either_direction() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        let carol = seed_user(&conn, "Carol");
        let f = request(alice, bob, 100);
        insert(&conn, &f).expect("insert");

        assert_eq!(find_between(&conn, bob, alice).expect("find"), Some(f.clone()));
        assert_eq!(find_between(&conn, alice, bob).expect("find"), Some(f));
        assert_eq!(find_between(&conn, alice, carol).expect("find"), None);
    }

    #[test]
    fn test_accepted_view_both_directions() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        let carol = seed_user(&conn, "Carol");
        let ab = request(alice, bob, 100);
        let ca = request(carol, alice, 100);
        insert(&conn, &ab).expect("insert");
        insert(&conn, &ca).expect("insert");
        assert!(answer_pending(&conn, ab.friendship_id, FriendshipStatus::Accepted, 150).expect("accept"));
        assert!(answer_pending(&conn, ca.friendship_id, FriendshipStatus::Accepted, 160).expect("accept"));

        let names: Vec<_> = friends_of(&conn, alice)
            .expect("friends")
            .into_iter()
            .map(|f| f.first_name)
            .collect();
        assert_eq!(names, vec!["Bob", "Carol"]);

        let bobs = friends_of(&conn, bob).expect("friends");
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].friend_id, alice);
        assert_eq!(bobs[0].friends_since, 150);
    }

    #[test]
    fn test_pending_lists() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        let carol = seed_user(&conn, "Carol");
        insert(&conn, &request(alice, bob, 100)).expect("insert");
        insert(&conn, &request(carol, bob, 200)).expect("insert");

        let received = pending_received(&conn, bob).expect("received");
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].counterpart_id, carol);
        assert_eq!(received[1].counterpart_id, alice);

        let sent = pending_sent(&conn, alice).expect("sent");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].counterpart_id, bob);
        assert_eq!(sent[0].first_name, "Bob");
    }

    #[test]
    fn test_delete_accepted_between() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        let f = request(alice, bob, 100);
        insert(&conn, &f).expect("insert");

        assert!(!delete_accepted_between(&conn, bob, alice).expect("pending not removed"));
        assert!(answer_pending(&conn, f.friendship_id, FriendshipStatus::Accepted, 150).expect("accept"));
        assert!(delete_accepted_between(&conn, bob, alice).expect("remove"));
        assert!(find_between(&conn, alice, bob).expect("find").is_none());
    }

    #[test]
    fn test_answered_request_cannot_be_answered_again() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        let f = request(alice, bob, 100);
        insert(&conn, &f).expect("insert");

        assert!(answer_pending(&conn, f.friendship_id, FriendshipStatus::Blocked, 150).expect("block"));
        assert!(!answer_pending(&conn, f.friendship_id, FriendshipStatus::Accepted, 160).expect("accept"));
        assert!(!delete_pending(&conn, f.friendship_id).expect("delete"));
        assert_eq!(get(&conn, f.friendship_id).expect("get").status, FriendshipStatus::Blocked);
    }

    #[test]
    fn test_delete_pending() {
        let conn = test_db();
        let alice = seed_user(&conn, "Alice");
        let bob = seed_user(&conn, "Bob");
        let f = request(alice, bob, 100);
        insert(&conn, &f).expect("insert");
        assert!(delete_pending(&conn, f.friendship_id).expect("delete"));
        assert!(matches!(get(&conn, f.friendship_id), Err(DbError::NotFound(_))));
        assert!(!delete_pending(&conn, f.friendship_id).expect("already gone"));
    }
}
