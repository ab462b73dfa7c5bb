//! Integration tests for Tally.
//!
//! The tests under `tests/` drive `tally-core` against a real SQLite
//! database, in memory or on disk, the way the server does. This library
//! only holds the fixtures they share.
//!
//! ```sh
//! cargo test -p tally-integration-tests
//! ```

use rusqlite::Connection;
use tally_core::{Identity, IdentitySettings, Result};
use tally_crypto::jwt::TokenSigner;
use tally_crypto::password::HashParams;
use tally_types::auth::AuthenticatedUser;
use tally_types::user::NewUser;

/// Fixed clock for tests that do not care about expiry.
pub const BASE_TIME: u64 = 1_700_000_000;

/// Password given to every fixture user.
pub const PASSWORD: &str = "correct horse";

/// Identity manager with cheap hashing and a fixed key.
pub fn identity() -> Result<Identity> {
    let signer = TokenSigner::new(&[9u8; 32], "tally", "tally-clients", 3_600)?;
    Ok(Identity::new(
        signer,
        IdentitySettings {
            hash_params: HashParams::minimal(),
            ..IdentitySettings::default()
        },
    ))
}

/// Register `first_name` as `<first_name>@example.com` and return the caller
/// value handlers would build from its token.
pub fn register(identity: &Identity, conn: &Connection, first_name: &str) -> Result<AuthenticatedUser> {
    let user = identity.register(
        conn,
        NewUser {
            email: format!("{}@example.com", first_name.to_lowercase()),
            password: PASSWORD.to_string(),
            first_name: first_name.to_string(),
            last_name: "Test".to_string(),
            phone: None,
        },
        BASE_TIME,
    )?;
    Ok(AuthenticatedUser::from(&user))
}
