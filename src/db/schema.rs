pub const SCHEMA_VERSION: &str = "1";

pub const CREATE_SCHEMA_SQL: &str = r#"
BEGIN TRANSACTION;

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', '1');

-- Raw ledger lines, one per imported CSV row. Never updated or deleted.
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,                 -- Calendar date, YYYY-MM-DD
    merchant TEXT NOT NULL,
    category TEXT,
    account TEXT,
    original_statement TEXT,
    notes TEXT,
    amount REAL NOT NULL,
    created_at INTEGER NOT NULL         -- Timestamp when imported (UTC)
);

CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions (date);
CREATE INDEX IF NOT EXISTS idx_transactions_group ON transactions (merchant, amount);

-- Recurring-charge candidates derived from transactions
CREATE TABLE IF NOT EXISTS subscriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    merchant TEXT NOT NULL,
    amount REAL NOT NULL,
    frequency TEXT NOT NULL,            -- 'monthly', 'quarterly' or 'annual'
    day_of_month INTEGER NOT NULL,
    last_transaction_date TEXT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT 1,
    is_false_positive BOOLEAN NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,        -- Timestamp when first detected (UTC)
    UNIQUE (merchant, amount, day_of_month)
);

CREATE INDEX IF NOT EXISTS idx_subscriptions_last_date ON subscriptions (last_transaction_date);

COMMIT;
"#;
