use anyhow::{Context, Result};
use rusqlite::Connection;

pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn new(db_path: &str) -> Result<Self> {
        let db_path = db_path.strip_prefix("sqlite:").unwrap_or(db_path);
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at {}", db_path))?;

        let db = Database { conn };
        db.create_tables()?;
        Ok(db)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let db = Database { conn };
        db.create_tables()?;
        Ok(db)
    }

    fn create_tables(&self) -> Result<()> {
        // One row per pair; re-scanning a range is a no-op
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS pairs (
                pair_address TEXT PRIMARY KEY,
                token0_address TEXT NOT NULL,
                token1_address TEXT NOT NULL,
                deployer_address TEXT NOT NULL,
                factory_address TEXT NOT NULL,
                stable INTEGER,
                block_number INTEGER,
                transaction_hash TEXT,
                log_index INTEGER
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_pairs_token0 
             ON pairs(token0_address)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_pairs_token1 
             ON pairs(token1_address)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_pairs_factory 
             ON pairs(factory_address)",
            [],
        )?;

        Ok(())
    }
}
