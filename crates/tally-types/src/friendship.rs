//! Friendship requests and the accepted-friends projection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{FriendshipId, TypesError, UserId};

/// Friendship state. Rejected requests are deleted, so there is no
/// `Rejected` variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
    Blocked,
}

impl FriendshipStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FriendshipStatus::Pending => "pending",
            FriendshipStatus::Accepted => "accepted",
            FriendshipStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for FriendshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FriendshipStatus {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FriendshipStatus::Pending),
            "accepted" => Ok(FriendshipStatus::Accepted),
            "blocked" => Ok(FriendshipStatus::Blocked),
            other => Err(TypesError::UnknownVariant {
                kind: "friendship status",
                value: other.to_string(),
            }),
        }
    }
}

/// A directed friendship row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friendship {
    pub friendship_id: FriendshipId,
    pub requester_id: UserId,
    pub addressee_id: UserId,
    pub status: FriendshipStatus,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Friendship {
    /// True if `user_id` is either end of the relationship.
    pub fn involves(&self, user_id: UserId) -> bool {
        self.requester_id == user_id || self.addressee_id == user_id
    }
}

/// One accepted friend, seen from a user's side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    pub friend_id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub friends_since: u64,
}

/// A pending request annotated with the other party's display fields.
///
/// For received requests the counterpart is the requester; for sent
/// requests it is the addressee.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    pub friendship_id: FriendshipId,
    pub counterpart_id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub status: FriendshipStatus,
    pub created_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_strings() {
        for status in [
            FriendshipStatus::Pending,
            FriendshipStatus::Accepted,
            FriendshipStatus::Blocked,
        ] {
            assert_eq!(status.as_str().parse::<FriendshipStatus>().expect("parse"), status);
        }
        assert!("rejected".parse::<FriendshipStatus>().is_err());
    }

    #[test]
    fn test_involves() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let f = Friendship {
            friendship_id: Uuid::new_v4(),
            requester_id: a,
            addressee_id: b,
            status: FriendshipStatus::Pending,
            created_at: 0,
            updated_at: 0,
        };
        assert!(f.involves(a));
        assert!(f.involves(b));
        assert!(!f.involves(Uuid::new_v4()));
    }
}
