//! SQL schema definitions.

/// Complete schema for Tally v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Identity & sessions
-- ============================================================

CREATE TABLE IF NOT EXISTS users (
    user_id BLOB PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    phone TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    email_verified INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    session_id BLOB PRIMARY KEY,
    user_id BLOB NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    refresh_token_digest TEXT NOT NULL UNIQUE,
    expires_at INTEGER NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id, is_active);

CREATE TABLE IF NOT EXISTS verification_tokens (
    token_id BLOB PRIMARY KEY,
    user_id BLOB NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    purpose TEXT NOT NULL CHECK (purpose IN ('email_verification', 'password_reset')),
    token_digest TEXT NOT NULL UNIQUE,
    expires_at INTEGER NOT NULL,
    is_used INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_verification_tokens_user ON verification_tokens(user_id);

-- ============================================================
-- Social graph
-- ============================================================

CREATE TABLE IF NOT EXISTS friendships (
    friendship_id BLOB PRIMARY KEY,
    requester_id BLOB NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    addressee_id BLOB NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    status TEXT NOT NULL CHECK (status IN ('pending', 'accepted', 'blocked')),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    CHECK (requester_id <> addressee_id),
    UNIQUE (requester_id, addressee_id)
);

-- One row per unordered pair, whichever side asked first.
CREATE UNIQUE INDEX IF NOT EXISTS idx_friendships_pair
    ON friendships(min(requester_id, addressee_id), max(requester_id, addressee_id));

CREATE INDEX IF NOT EXISTS idx_friendships_addressee ON friendships(addressee_id, status);

-- ============================================================
-- Debts & payments
-- ============================================================

CREATE TABLE IF NOT EXISTS debts (
    debt_id BLOB PRIMARY KEY,
    creditor_id BLOB NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    debtor_id BLOB NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
    description TEXT,
    due_date TEXT,
    status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'paid', 'cancelled')),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    CHECK (creditor_id <> debtor_id)
);

CREATE INDEX IF NOT EXISTS idx_debts_creditor ON debts(creditor_id, status);
CREATE INDEX IF NOT EXISTS idx_debts_debtor ON debts(debtor_id, status);

CREATE TABLE IF NOT EXISTS payments (
    payment_id BLOB PRIMARY KEY,
    debt_id BLOB NOT NULL REFERENCES debts(debt_id) ON DELETE CASCADE,
    amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
    payment_method TEXT,
    notes TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_payments_debt ON payments(debt_id);

-- Payments may never push a debt past its amount, whatever the caller checked.
CREATE TRIGGER IF NOT EXISTS payments_within_remaining
BEFORE INSERT ON payments
WHEN NEW.amount_cents > (
    SELECT d.amount_cents - COALESCE(
        (SELECT SUM(p.amount_cents) FROM payments p WHERE p.debt_id = NEW.debt_id), 0)
    FROM debts d WHERE d.debt_id = NEW.debt_id
)
BEGIN
    SELECT RAISE(ABORT, 'payment exceeds remaining balance');
END;

-- ============================================================
-- Projections
-- ============================================================

CREATE VIEW IF NOT EXISTS accepted_friends AS
SELECT f.requester_id AS user_id,
       f.addressee_id AS friend_id,
       u.email AS email,
       u.first_name AS first_name,
       u.last_name AS last_name,
       f.updated_at AS friends_since
FROM friendships f
JOIN users u ON u.user_id = f.addressee_id
WHERE f.status = 'accepted' AND u.is_active = 1
UNION ALL
SELECT f.addressee_id, f.requester_id, u.email, u.first_name, u.last_name, f.updated_at
FROM friendships f
JOIN users u ON u.user_id = f.requester_id
WHERE f.status = 'accepted' AND u.is_active = 1;

CREATE VIEW IF NOT EXISTS debt_remaining AS
SELECT d.debt_id,
       d.creditor_id,
       d.debtor_id,
       d.status,
       d.amount_cents,
       COALESCE(p.paid_cents, 0) AS paid_cents,
       d.amount_cents - COALESCE(p.paid_cents, 0) AS remaining_cents
FROM debts d
LEFT JOIN (
    SELECT debt_id, SUM(amount_cents) AS paid_cents FROM payments GROUP BY debt_id
) p ON p.debt_id = d.debt_id;

CREATE VIEW IF NOT EXISTS user_balance AS
SELECT u.user_id,
       u.email,
       u.first_name,
       u.last_name,
       COALESCE((SELECT SUM(r.remaining_cents) FROM debt_remaining r
                 WHERE r.creditor_id = u.user_id AND r.status = 'pending'), 0) AS owed_to_me_cents,
       COALESCE((SELECT SUM(r.remaining_cents) FROM debt_remaining r
                 WHERE r.debtor_id = u.user_id AND r.status = 'pending'), 0) AS i_owe_cents
FROM users u
WHERE u.is_active = 1;
"#;
