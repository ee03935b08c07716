//! Database schema definitions

/// SQL to create all tables
/// NOTE: bars are stored as a JSON array so Decimal prices keep their exact text form
pub const CREATE_TABLES: &str = r#"
-- Read-through cache of fetched bars, one row per (symbol, period, interval)
CREATE TABLE IF NOT EXISTS bar_cache (
    symbol TEXT NOT NULL,
    period TEXT NOT NULL,
    interval TEXT NOT NULL,
    fetched_at INTEGER NOT NULL,
    row_count INTEGER NOT NULL DEFAULT 0,
    bars_json TEXT NOT NULL,
    PRIMARY KEY (symbol, period, interval)
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_bar_cache_fetched ON bar_cache(fetched_at)
"#;

/// ALTER TABLE migrations (applied after CREATE_TABLES, duplicate columns tolerated)
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE bar_cache ADD COLUMN provider TEXT NOT NULL DEFAULT 'yahoo'",
];
