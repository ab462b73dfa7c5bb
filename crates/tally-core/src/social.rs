//! Friendship requests and the friend graph.
//!
//! One row per unordered pair of users. A request starts `pending`; the
//! addressee accepts it, blocks it, or rejects it (which deletes the row).

use rusqlite::{Connection, TransactionBehavior};
use tally_db::queries::{friendships, users};
use tally_db::DbError;
use tally_types::auth::AuthenticatedUser;
use tally_types::friendship::{Friend, FriendRequest, Friendship, FriendshipStatus};
use tally_types::{FriendshipId, UserId};
use tracing::info;
use uuid::Uuid;

use crate::{Error, Result};

/// Send a friend request from the caller to `addressee_id`.
///
/// # Errors
///
/// - [`Error::InvalidArgument`] for a request to oneself
/// - [`Error::NotFound`] if the addressee is missing or inactive
/// - [`Error::Conflict`] if the pair already has a relationship
pub fn send_request(
    conn: &mut Connection,
    caller: &AuthenticatedUser,
    addressee_id: UserId,
    now: u64,
) -> Result<Friendship> {
    if caller.user_id == addressee_id {
        return Err(Error::InvalidArgument(
            "cannot send a friend request to yourself".into(),
        ));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if !users::exists(&tx, addressee_id)? {
        return Err(Error::NotFound("user".into()));
    }
    if let Some(existing) = friendships::find_between(&tx, caller.user_id, addressee_id)? {
        return Err(Error::Conflict(
            match existing.status {
                FriendshipStatus::Accepted => "already friends",
                FriendshipStatus::Pending => "friend request already pending",
                FriendshipStatus::Blocked => "relationship is blocked",
            }
            .into(),
        ));
    }

    let friendship = Friendship {
        friendship_id: Uuid::new_v4(),
        requester_id: caller.user_id,
        addressee_id,
        status: FriendshipStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    friendships::insert(&tx, &friendship).map_err(|e| match e {
        DbError::Constraint(_) => Error::Conflict("relationship already exists".into()),
        other => other.into(),
    })?;
    tx.commit()?;

    info!(
        friendship_id = %friendship.friendship_id,
        requester_id = %caller.user_id,
        addressee_id = %addressee_id,
        "friend request sent"
    );
    Ok(friendship)
}

/// Load a pending request the caller may answer.
fn pending_for_addressee(
    conn: &Connection,
    caller: &AuthenticatedUser,
    friendship_id: FriendshipId,
) -> Result<Friendship> {
    let friendship = friendships::get(conn, friendship_id)?;
    if friendship.addressee_id != caller.user_id {
        return Err(Error::Forbidden(
            "only the addressee can answer a friend request".into(),
        ));
    }
    if friendship.status != FriendshipStatus::Pending {
        return Err(Error::InvalidOperation(format!(
            "friend request is {}",
            friendship.status
        )));
    }
    Ok(friendship)
}

fn answer(
    conn: &Connection,
    caller: &AuthenticatedUser,
    friendship_id: FriendshipId,
    status: FriendshipStatus,
    now: u64,
) -> Result<Friendship> {
    let mut friendship = pending_for_addressee(conn, caller, friendship_id)?;
    if !friendships::answer_pending(conn, friendship_id, status, now)? {
        return Err(Error::InvalidOperation("friend request was already answered".into()));
    }
    friendship.status = status;
    friendship.updated_at = now;

    info!(friendship_id = %friendship_id, status = %status, "friend request answered");
    Ok(friendship)
}

pub fn accept(
    conn: &Connection,
    caller: &AuthenticatedUser,
    friendship_id: FriendshipId,
    now: u64,
) -> Result<Friendship> {
    answer(conn, caller, friendship_id, FriendshipStatus::Accepted, now)
}

pub fn block(
    conn: &Connection,
    caller: &AuthenticatedUser,
    friendship_id: FriendshipId,
    now: u64,
) -> Result<Friendship> {
    answer(conn, caller, friendship_id, FriendshipStatus::Blocked, now)
}

/// Reject a pending request. The row is deleted, so the pair may try again.
pub fn reject(conn: &Connection, caller: &AuthenticatedUser, friendship_id: FriendshipId) -> Result<()> {
    pending_for_addressee(conn, caller, friendship_id)?;
    if !friendships::delete_pending(conn, friendship_id)? {
        return Err(Error::InvalidOperation("friend request was already answered".into()));
    }
    info!(friendship_id = %friendship_id, "friend request rejected");
    Ok(())
}

/// End an accepted friendship, whichever side sent the original request.
pub fn remove_friend(conn: &Connection, caller: &AuthenticatedUser, friend_id: UserId) -> Result<()> {
    if !friendships::delete_accepted_between(conn, caller.user_id, friend_id)? {
        return Err(Error::NotFound("friendship".into()));
    }
    info!(user_id = %caller.user_id, friend_id = %friend_id, "friend removed");
    Ok(())
}

pub fn friends(conn: &Connection, user_id: UserId) -> Result<Vec<Friend>> {
    Ok(friendships::friends_of(conn, user_id)?)
}

pub fn pending_received(conn: &Connection, user_id: UserId) -> Result<Vec<FriendRequest>> {
    Ok(friendships::pending_received(conn, user_id)?)
}

pub fn pending_sent(conn: &Connection, user_id: UserId) -> Result<Vec<FriendRequest>> {
    Ok(friendships::pending_sent(conn, user_id)?)
}

/// Symmetric.
pub fn are_friends(conn: &Connection, a: UserId, b: UserId) -> Result<bool> {
    Ok(friendships::find_between(conn, a, b)?
        .is_some_and(|f| f.status == FriendshipStatus::Accepted))
}

/// Directional: `requester` asked `addressee` and has no answer yet.
pub fn has_pending_request(conn: &Connection, requester: UserId, addressee: UserId) -> Result<bool> {
    Ok(friendships::exists_directed(
        conn,
        requester,
        addressee,
        FriendshipStatus::Pending,
    )?)
}

pub fn get_friendship(conn: &Connection, a: UserId, b: UserId) -> Result<Option<Friendship>> {
    Ok(friendships::find_between(conn, a, b)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{register, test_db, BASE_TIME};
    use crate::users;

    #[test]
    fn test_request_then_accept() {
        let mut conn = test_db();
        let alice = register(&mut conn, "Alice");
        let bob = register(&mut conn, "Bob");

        let request = send_request(&mut conn, &alice, bob.user_id, BASE_TIME).expect("send");
        assert!(has_pending_request(&conn, alice.user_id, bob.user_id).expect("pending"));
        assert!(!has_pending_request(&conn, bob.user_id, alice.user_id).expect("pending"));

        let accepted = accept(&conn, &bob, request.friendship_id, BASE_TIME + 1).expect("accept");
        assert_eq!(accepted.status, FriendshipStatus::Accepted);
        assert!(are_friends(&conn, alice.user_id, bob.user_id).expect("friends"));
        assert!(are_friends(&conn, bob.user_id, alice.user_id).expect("friends"));

        let again = send_request(&mut conn, &alice, bob.user_id, BASE_TIME + 2);
        assert!(matches!(again, Err(Error::Conflict(msg)) if msg == "already friends"));
    }

    #[test]
    fn test_send_request_rejections() {
        let mut conn = test_db();
        let alice = register(&mut conn, "Alice");
        let bob = register(&mut conn, "Bob");

        assert!(matches!(
            send_request(&mut conn, &alice, alice.user_id, BASE_TIME),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            send_request(&mut conn, &alice, Uuid::new_v4(), BASE_TIME),
            Err(Error::NotFound(_))
        ));

        send_request(&mut conn, &alice, bob.user_id, BASE_TIME).expect("send");
        let reverse = send_request(&mut conn, &bob, alice.user_id, BASE_TIME);
        assert!(matches!(reverse, Err(Error::Conflict(msg)) if msg == "friend request already pending"));
    }

    #[test]
    fn test_inactive_addressee_not_found() {
        let mut conn = test_db();
        let alice = register(&mut conn, "Alice");
        let bob = register(&mut conn, "Bob");
        users::deactivate(&mut conn, bob.user_id, BASE_TIME).expect("deactivate");

        assert!(matches!(
            send_request(&mut conn, &alice, bob.user_id, BASE_TIME),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_only_addressee_answers_pending() {
        let mut conn = test_db();
        let alice = register(&mut conn, "Alice");
        let bob = register(&mut conn, "Bob");
        let carol = register(&mut conn, "Carol");
        let request = send_request(&mut conn, &alice, bob.user_id, BASE_TIME).expect("send");

        assert!(matches!(
            accept(&conn, &alice, request.friendship_id, BASE_TIME),
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            reject(&conn, &carol, request.friendship_id),
            Err(Error::Forbidden(_))
        ));

        block(&conn, &bob, request.friendship_id, BASE_TIME).expect("block");
        assert!(matches!(
            accept(&conn, &bob, request.friendship_id, BASE_TIME),
            Err(Error::InvalidOperation(_))
        ));
        let blocked = send_request(&mut conn, &alice, bob.user_id, BASE_TIME);
        assert!(matches!(blocked, Err(Error::Conflict(msg)) if msg == "relationship is blocked"));

        assert!(matches!(
            accept(&conn, &bob, Uuid::new_v4(), BASE_TIME),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_reject_allows_retry() {
        let mut conn = test_db();
        let alice = register(&mut conn, "Alice");
        let bob = register(&mut conn, "Bob");
        let request = send_request(&mut conn, &alice, bob.user_id, BASE_TIME).expect("send");

        reject(&conn, &bob, request.friendship_id).expect("reject");
        assert!(get_friendship(&conn, alice.user_id, bob.user_id)
            .expect("get")
            .is_none());
        send_request(&mut conn, &bob, alice.user_id, BASE_TIME + 1).expect("retry");
    }

    #[test]
    fn test_friend_lists_and_removal() {
        let mut conn = test_db();
        let alice = register(&mut conn, "Alice");
        let bob = register(&mut conn, "Bob");
        let carol = register(&mut conn, "Carol");
        let ab = send_request(&mut conn, &alice, bob.user_id, BASE_TIME).expect("send");
        send_request(&mut conn, &carol, alice.user_id, BASE_TIME + 1).expect("send");
        accept(&conn, &bob, ab.friendship_id, BASE_TIME + 2).expect("accept");

        let friends_of_bob = friends(&conn, bob.user_id).expect("friends");
        assert_eq!(friends_of_bob.len(), 1);
        assert_eq!(friends_of_bob[0].friend_id, alice.user_id);

        let received = pending_received(&conn, alice.user_id).expect("received");
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].counterpart_id, carol.user_id);
        assert_eq!(pending_sent(&conn, carol.user_id).expect("sent").len(), 1);

        assert!(matches!(
            remove_friend(&conn, &alice, carol.user_id),
            Err(Error::NotFound(_))
        ));
        remove_friend(&conn, &bob, alice.user_id).expect("remove");
        assert!(!are_friends(&conn, alice.user_id, bob.user_id).expect("friends"));
    }
}
