//! Identity and session management.
//!
//! Access tokens are stateless HS256 JWTs. Refresh tokens are opaque, stored
//! only as digests, and rotate on every use. Password reset and email
//! verification tokens are single-use and bound to one purpose.

use std::sync::OnceLock;

use rusqlite::{Connection, TransactionBehavior};
use tally_crypto::jwt::{Subject, TokenSigner};
use tally_crypto::password::{hash_password, verify_password, HashParams};
use tally_crypto::token;
use tally_db::queries::{sessions, tokens, users};
use tally_db::DbError;
use tally_types::auth::{AuthTokens, AuthenticatedUser, Session, TokenPurpose, VerificationToken};
use tally_types::user::{NewUser, User};
use tally_types::{
    UserId, MAX_EMAIL_LEN, MAX_NAME_LEN, MAX_PHONE_LEN, MIN_PASSWORD_LEN, SECS_PER_DAY,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{check_len, check_required, Error, Result};

const INVALID_TOKEN: &str = "invalid or expired token";

/// Lifetimes and hashing cost used by [`Identity`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentitySettings {
    pub refresh_ttl_secs: u64,
    pub password_reset_ttl_secs: u64,
    pub email_verification_ttl_secs: u64,
    pub hash_params: HashParams,
}

impl Default for IdentitySettings {
    /// Refresh 7 days, reset 1 hour, verification 24 hours.
    fn default() -> Self {
        Self {
            refresh_ttl_secs: 7 * SECS_PER_DAY,
            password_reset_ttl_secs: 3_600,
            email_verification_ttl_secs: SECS_PER_DAY,
            hash_params: HashParams::default(),
        }
    }
}

/// Registration, login and credential lifecycle.
///
/// Argon2 work is split from storage work: [`Identity::prepare_user`],
/// [`Identity::check_credentials`], [`Identity::prepare_password_change`]
/// and [`Identity::hash_new_password`] never touch the database, so an
/// async caller can run them on a blocking thread without holding the
/// connection. The one-call forms compose the two halves.
#[derive(Clone, Debug)]
pub struct Identity {
    signer: TokenSigner,
    settings: IdentitySettings,
    /// Verified against on a login miss so that unknown emails cost the
    /// same as wrong passwords.
    dummy_hash: OnceLock<String>,
}

/// A validated registration with its password already hashed.
#[derive(Clone, Debug)]
pub struct PreparedUser {
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
}

impl Identity {
    pub fn new(signer: TokenSigner, settings: IdentitySettings) -> Self {
        Self {
            signer,
            settings,
            dummy_hash: OnceLock::new(),
        }
    }

    pub fn settings(&self) -> &IdentitySettings {
        &self.settings
    }

    /// Create an active, unverified user.
    ///
    /// # Errors
    ///
    /// [`Error::Conflict`] if the email is taken (case-insensitive),
    /// [`Error::InvalidArgument`] for a short password or malformed fields.
    pub fn register(&self, conn: &Connection, new: NewUser, now: u64) -> Result<User> {
        let prepared = self.prepare_user(new)?;
        self.insert_user(conn, prepared, now)
    }

    /// Validate a registration and hash its password.
    pub fn prepare_user(&self, new: NewUser) -> Result<PreparedUser> {
        check_required("email", &new.email, MAX_EMAIL_LEN)?;
        if !new.email.contains('@') {
            return Err(Error::InvalidArgument("email is not valid".into()));
        }
        check_password(&new.password)?;
        check_required("first name", &new.first_name, MAX_NAME_LEN)?;
        check_required("last name", &new.last_name, MAX_NAME_LEN)?;
        if let Some(phone) = &new.phone {
            check_len("phone", phone, MAX_PHONE_LEN)?;
        }

        Ok(PreparedUser {
            email: users::normalize_email(&new.email),
            password_hash: hash_password(&new.password, &self.settings.hash_params)?,
            first_name: new.first_name.trim().to_string(),
            last_name: new.last_name.trim().to_string(),
            phone: new.phone,
        })
    }

    /// Store a prepared registration.
    pub fn insert_user(&self, conn: &Connection, prepared: PreparedUser, now: u64) -> Result<User> {
        if users::email_exists(conn, &prepared.email)? {
            return Err(Error::Conflict("email is already registered".into()));
        }

        let user = User {
            user_id: Uuid::new_v4(),
            email: prepared.email,
            password_hash: prepared.password_hash,
            first_name: prepared.first_name,
            last_name: prepared.last_name,
            phone: prepared.phone,
            is_active: true,
            email_verified: false,
            created_at: now,
            updated_at: now,
        };
        users::insert(conn, &user).map_err(|e| match e {
            DbError::Constraint(_) => Error::Conflict("email is already registered".into()),
            other => other.into(),
        })?;

        info!(user_id = %user.user_id, "registered user");
        Ok(user)
    }

    /// Check credentials and open a new session.
    ///
    /// Every failure is the same [`Error::Unauthorized`].
    pub fn login(&self, conn: &Connection, email: &str, password: &str, now: u64) -> Result<AuthTokens> {
        let candidate = self.login_candidate(conn, email)?;
        let user = self.check_credentials(candidate, password)?;
        self.start_session(conn, user.user_id, now)
    }

    /// The active account a login for `email` would check against.
    pub fn login_candidate(&self, conn: &Connection, email: &str) -> Result<Option<User>> {
        Ok(users::find_active_by_email(conn, email)?)
    }

    /// Verify `password` against the account found for a login, if any.
    ///
    /// A missing account still costs one Argon2 verification.
    pub fn check_credentials(&self, candidate: Option<User>, password: &str) -> Result<User> {
        let Some(user) = candidate else {
            verify_password(password, self.dummy_hash()?)?;
            debug!("login for unknown or inactive email");
            return Err(Error::Unauthorized);
        };
        if !verify_password(password, &user.password_hash)? {
            debug!(user_id = %user.user_id, "login with wrong password");
            return Err(Error::Unauthorized);
        }
        Ok(user)
    }

    /// Open a session for a user whose credentials were checked. The user is
    /// re-read, so one deactivated in the meantime is refused.
    pub fn start_session(&self, conn: &Connection, user_id: UserId, now: u64) -> Result<AuthTokens> {
        let user = users::get(conn, user_id).map_err(unauthorized_if_missing)?;
        if !user.is_active {
            return Err(Error::Unauthorized);
        }
        let tokens = self.open_session(conn, &user, now)?;
        info!(user_id = %user.user_id, "user logged in");
        Ok(tokens)
    }

    /// Exchange a refresh token for a new token pair. The presented token
    /// stops working.
    pub fn refresh(&self, conn: &mut Connection, refresh_token: &str, now: u64) -> Result<AuthTokens> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let session = sessions::find_active(&tx, &token::digest(refresh_token), now)
            .map_err(unauthorized_if_missing)?;
        if !sessions::deactivate(&tx, session.session_id)? {
            return Err(Error::Unauthorized);
        }
        let user = users::get(&tx, session.user_id).map_err(unauthorized_if_missing)?;
        if !user.is_active {
            return Err(Error::Unauthorized);
        }

        let tokens = self.open_session(&tx, &user, now)?;
        tx.commit()?;

        debug!(user_id = %user.user_id, session_id = %session.session_id, "rotated refresh token");
        Ok(tokens)
    }

    /// Close the caller's session for this refresh token. Returns false if
    /// no active session matched.
    pub fn logout(&self, conn: &Connection, user_id: UserId, refresh_token: &str) -> Result<bool> {
        let closed = sessions::deactivate_by_token(conn, user_id, &token::digest(refresh_token))?;
        if closed {
            info!(user_id = %user_id, "user logged out");
        }
        Ok(closed)
    }

    /// Replace the password after checking the current one, then close every
    /// session of the user.
    pub fn change_password(
        &self,
        conn: &mut Connection,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
        now: u64,
    ) -> Result<()> {
        let stored = self.stored_password_hash(conn, user_id)?;
        let hash = self.prepare_password_change(&stored, current_password, new_password)?;
        self.store_password(conn, user_id, &stored, &hash, now)
    }

    /// The PHC string a password change is checked against.
    pub fn stored_password_hash(&self, conn: &Connection, user_id: UserId) -> Result<String> {
        Ok(users::get(conn, user_id)?.password_hash)
    }

    /// Check `current_password` against `stored_hash` and hash the new one.
    pub fn prepare_password_change(
        &self,
        stored_hash: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<String> {
        check_password(new_password)?;
        if !verify_password(current_password, stored_hash)? {
            return Err(Error::InvalidArgument("current password is incorrect".into()));
        }
        self.hash_new_password(new_password)
    }

    /// Swap in `new_hash` if the stored hash is still `expected_hash`, then
    /// close every session of the user.
    pub fn store_password(
        &self,
        conn: &mut Connection,
        user_id: UserId,
        expected_hash: &str,
        new_hash: &str,
        now: u64,
    ) -> Result<()> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if users::get(&tx, user_id)?.password_hash != expected_hash {
            return Err(Error::Conflict("password was changed concurrently".into()));
        }
        users::update_password(&tx, user_id, new_hash, now)?;
        let closed = sessions::deactivate_all(&tx, user_id)?;
        tx.commit()?;

        info!(user_id = %user_id, sessions_closed = closed, "password changed");
        Ok(())
    }

    /// Length check and hash for a password about to be stored.
    pub fn hash_new_password(&self, new_password: &str) -> Result<String> {
        check_password(new_password)?;
        Ok(hash_password(new_password, &self.settings.hash_params)?)
    }

    /// Issue a password reset token if the email belongs to an active user.
    ///
    /// Callers must report success either way; `None` only tells the caller
    /// there is nothing to deliver.
    pub fn forgot_password(&self, conn: &Connection, email: &str, now: u64) -> Result<Option<String>> {
        let Some(user) = users::find_active_by_email(conn, email)? else {
            debug!("password reset requested for unknown email");
            return Ok(None);
        };
        let raw = self.issue_token(
            conn,
            user.user_id,
            TokenPurpose::PasswordReset,
            self.settings.password_reset_ttl_secs,
            now,
        )?;
        info!(user_id = %user.user_id, "password reset token issued");
        Ok(Some(raw))
    }

    /// Redeem a reset token for the user owning `email` and set a new
    /// password. Every session of the user is closed.
    pub fn reset_password(
        &self,
        conn: &mut Connection,
        reset_token: &str,
        email: &str,
        new_password: &str,
        now: u64,
    ) -> Result<()> {
        let hash = self.hash_new_password(new_password)?;
        self.reset_password_hashed(conn, reset_token, email, &hash, now)
    }

    /// [`Identity::reset_password`] with the hash from
    /// [`Identity::hash_new_password`].
    pub fn reset_password_hashed(
        &self,
        conn: &mut Connection,
        reset_token: &str,
        email: &str,
        new_hash: &str,
        now: u64,
    ) -> Result<()> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let stored = redeemable(&tx, reset_token, TokenPurpose::PasswordReset, now)?;
        let user = users::get_by_email(&tx, email).map_err(|e| match e {
            DbError::NotFound(_) => Error::InvalidArgument(INVALID_TOKEN.into()),
            other => other.into(),
        })?;
        if user.user_id != stored.user_id {
            return Err(Error::InvalidArgument(INVALID_TOKEN.into()));
        }
        consume(&tx, &stored)?;
        users::update_password(&tx, user.user_id, new_hash, now)?;
        let closed = sessions::deactivate_all(&tx, user.user_id)?;
        tx.commit()?;

        info!(user_id = %user.user_id, sessions_closed = closed, "password reset");
        Ok(())
    }

    /// Issue an email verification token for a user.
    pub fn generate_email_verification_token(
        &self,
        conn: &Connection,
        user_id: UserId,
        now: u64,
    ) -> Result<String> {
        users::get(conn, user_id)?;
        self.issue_token(
            conn,
            user_id,
            TokenPurpose::EmailVerification,
            self.settings.email_verification_ttl_secs,
            now,
        )
    }

    /// Issue a fresh verification token for a user who is not yet verified.
    pub fn resend_verification(&self, conn: &Connection, user_id: UserId, now: u64) -> Result<String> {
        let user = users::get(conn, user_id)?;
        if user.email_verified {
            return Err(Error::InvalidOperation("email is already verified".into()));
        }
        self.generate_email_verification_token(conn, user_id, now)
    }

    /// Redeem a verification token issued to `user_id`.
    pub fn verify_email(
        &self,
        conn: &mut Connection,
        verification_token: &str,
        user_id: UserId,
        now: u64,
    ) -> Result<()> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let stored = redeemable(&tx, verification_token, TokenPurpose::EmailVerification, now)?;
        if stored.user_id != user_id {
            return Err(Error::InvalidArgument(INVALID_TOKEN.into()));
        }
        consume(&tx, &stored)?;
        users::set_email_verified(&tx, user_id, now)?;
        tx.commit()?;

        info!(user_id = %user_id, "email verified");
        Ok(())
    }

    /// Signature, issuer, audience and expiry check only.
    pub fn validate_token(&self, access_token: &str, now: u64) -> bool {
        self.signer.validate(access_token, now).is_ok()
    }

    /// Resolve a bearer access token to the caller it was issued for.
    pub fn authenticate(&self, access_token: &str, now: u64) -> Result<AuthenticatedUser> {
        let claims = self.signer.validate(access_token, now).map_err(|e| {
            debug!(error = %e, "rejected access token");
            Error::Unauthorized
        })?;
        Ok(AuthenticatedUser {
            user_id: claims.sub,
            email: claims.email,
            display_name: claims.name,
            email_verified: claims.email_verified,
        })
    }

    fn open_session(&self, conn: &Connection, user: &User, now: u64) -> Result<AuthTokens> {
        let name = user.display_name();
        let (access_token, access_token_expires_at) = self.signer.issue(
            &Subject {
                user_id: user.user_id,
                email: &user.email,
                name: &name,
                email_verified: user.email_verified,
            },
            now,
        )?;

        let refresh_token = token::generate();
        let session = Session {
            session_id: Uuid::new_v4(),
            user_id: user.user_id,
            expires_at: now + self.settings.refresh_ttl_secs,
            is_active: true,
            created_at: now,
        };
        sessions::insert(conn, &session, &token::digest(&refresh_token))?;

        Ok(AuthTokens {
            access_token,
            access_token_expires_at,
            refresh_token,
            refresh_token_expires_at: session.expires_at,
            user: user.profile(),
        })
    }

    fn issue_token(
        &self,
        conn: &Connection,
        user_id: UserId,
        purpose: TokenPurpose,
        ttl_secs: u64,
        now: u64,
    ) -> Result<String> {
        let raw = token::generate();
        let stored = VerificationToken {
            token_id: Uuid::new_v4(),
            user_id,
            purpose,
            expires_at: now + ttl_secs,
            is_used: false,
            created_at: now,
        };
        tokens::insert(conn, &stored, &token::digest(&raw))?;
        Ok(raw)
    }

    /// Hash of a random password at the configured cost, made on first use.
    fn dummy_hash(&self) -> Result<&str> {
        if let Some(hash) = self.dummy_hash.get() {
            return Ok(hash);
        }
        let hash = hash_password(&token::generate(), &self.settings.hash_params)?;
        Ok(self.dummy_hash.get_or_init(|| hash))
    }
}

fn check_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::InvalidArgument(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn unauthorized_if_missing(e: DbError) -> Error {
    match e {
        DbError::NotFound(_) => Error::Unauthorized,
        other => other.into(),
    }
}

/// Look up an unused, unexpired token of `purpose`.
fn redeemable(
    conn: &Connection,
    raw: &str,
    purpose: TokenPurpose,
    now: u64,
) -> Result<VerificationToken> {
    let stored = tokens::find(conn, &token::digest(raw), purpose).map_err(|e| match e {
        DbError::NotFound(_) => Error::InvalidArgument(INVALID_TOKEN.into()),
        other => other.into(),
    })?;
    if !stored.is_redeemable(now) {
        return Err(Error::InvalidArgument(INVALID_TOKEN.into()));
    }
    Ok(stored)
}

fn consume(conn: &Connection, stored: &VerificationToken) -> Result<()> {
    if !tokens::mark_used(conn, stored.token_id)? {
        return Err(Error::InvalidArgument(INVALID_TOKEN.into()));
    }
    Ok(())
}
