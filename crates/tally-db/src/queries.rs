//! Database query functions organized by entity.

pub mod balances;
pub mod debts;
pub mod friendships;
pub mod payments;
pub mod sessions;
pub mod tokens;
pub mod users;
