use crate::decoder::NormalizedPairRecord;
use crate::error::PersistenceError;
use crate::sink::RecordSink;
use alloy_primitives::{Address, B256};
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, ToSql, params, params_from_iter};
use serde::Serialize;
use std::str::FromStr;

pub struct PairRepository<'a> {
    conn: &'a rusqlite::Connection,
}

#[derive(Debug, Clone, Default)]
pub struct PairFilter {
    /// Matches either side of the pair.
    pub token: Option<Address>,
    pub factory: Option<Address>,
    pub stable: Option<bool>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Serialize)]
pub struct PairStats {
    pub total_pairs: usize,
    pub factories: usize,
    pub stable_pairs: usize,
    pub volatile_pairs: usize,
    pub earliest_block: Option<u64>,
    pub latest_block: Option<u64>,
}

fn address_key(address: &Address) -> String {
    format!("{address:?}")
}

impl<'a> PairRepository<'a> {
    const INSERT_PAIR: &'static str = "INSERT OR IGNORE INTO pairs (
            pair_address, token0_address, token1_address,
            deployer_address, factory_address, stable,
            block_number, transaction_hash, log_index
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

    const SELECT_PAIR: &'static str = "SELECT pair_address, token0_address, token1_address, deployer_address, factory_address, stable, block_number, transaction_hash, log_index FROM pairs";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Returns the number of rows written (0 for an already known pair).
    pub fn insert(&self, pair: &NormalizedPairRecord) -> rusqlite::Result<usize> {
        self.conn.execute(
            Self::INSERT_PAIR,
            params![
                address_key(&pair.pair_address),
                address_key(&pair.token0),
                address_key(&pair.token1),
                address_key(&pair.deployer_address),
                address_key(&pair.factory_address),
                pair.stable,
                pair.block_number,
                pair.transaction_hash.map(|hash| format!("{hash:?}")),
                pair.log_index,
            ],
        )
    }

    pub fn get_pair(&self, pair_address: &Address) -> Result<Option<NormalizedPairRecord>> {
        let query = format!("{} WHERE pair_address = ?1", Self::SELECT_PAIR);
        let pair = self
            .conn
            .query_row(
                &query,
                params![address_key(pair_address)],
                Self::row_to_pair,
            )
            .optional()?;
        Ok(pair)
    }

    pub fn query_pairs(&self, filter: &PairFilter) -> Result<Vec<NormalizedPairRecord>> {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(token) = &filter.token {
            conditions.push("(token0_address = ? OR token1_address = ?)");
            params.push(Box::new(address_key(token)));
            params.push(Box::new(address_key(token)));
        }

        if let Some(factory) = &filter.factory {
            conditions.push("factory_address = ?");
            params.push(Box::new(address_key(factory)));
        }

        if let Some(stable) = filter.stable {
            conditions.push("stable = ?");
            params.push(Box::new(stable));
        }

        let mut query = Self::SELECT_PAIR.to_string();
        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }
        query.push_str(" ORDER BY block_number, log_index");
        query.push_str(&format!(" LIMIT {} OFFSET {}", filter.limit, filter.offset));

        let mut stmt = self.conn.prepare(&query)?;
        let pairs = stmt
            .query_map(params_from_iter(params), Self::row_to_pair)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pairs)
    }

    pub fn get_statistics(&self) -> Result<PairStats> {
        let (total_pairs, factories, stable_pairs, volatile_pairs): (usize, usize, usize, usize) =
            self.conn.query_row(
                "SELECT COUNT(*), COUNT(DISTINCT factory_address),
                        COUNT(CASE WHEN stable = 1 THEN 1 END),
                        COUNT(CASE WHEN stable = 0 THEN 1 END)
                 FROM pairs",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        let (earliest_block, latest_block): (Option<u64>, Option<u64>) = self.conn.query_row(
            "SELECT MIN(block_number), MAX(block_number) FROM pairs",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(PairStats {
            total_pairs,
            factories,
            stable_pairs,
            volatile_pairs,
            earliest_block,
            latest_block,
        })
    }

    fn parse_column<T>(row: &Row, index: usize) -> rusqlite::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        T::from_str(&row.get::<_, String>(index)?).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                index,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
    }

    fn row_to_pair(row: &Row) -> rusqlite::Result<NormalizedPairRecord> {
        let transaction_hash = match row.get::<_, Option<String>>(7)? {
            Some(hash) => Some(B256::from_str(&hash).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    7,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?),
            None => None,
        };

        Ok(NormalizedPairRecord {
            pair_address: Self::parse_column(row, 0)?,
            token0: Self::parse_column(row, 1)?,
            token1: Self::parse_column(row, 2)?,
            deployer_address: Self::parse_column(row, 3)?,
            factory_address: Self::parse_column(row, 4)?,
            stable: row.get(5)?,
            block_number: row.get(6)?,
            transaction_hash,
            log_index: row.get(8)?,
        })
    }
}

impl RecordSink for PairRepository<'_> {
    fn insert_record(&mut self, record: &NormalizedPairRecord) -> Result<bool, PersistenceError> {
        Ok(self.insert(record)? == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Database;
    use alloy_primitives::address;

    fn pair(n: u8, factory: Address, stable: Option<bool>) -> NormalizedPairRecord {
        NormalizedPairRecord {
            pair_address: Address::repeat_byte(n),
            token0: address!("0x4200000000000000000000000000000000000006"),
            token1: Address::repeat_byte(0xf0 | n),
            deployer_address: factory,
            factory_address: factory,
            stable,
            block_number: Some(100 + u64::from(n)),
            transaction_hash: Some(B256::repeat_byte(n)),
            log_index: Some(0),
        }
    }

    fn all() -> PairFilter {
        PairFilter {
            limit: 100,
            ..PairFilter::default()
        }
    }

    #[test]
    fn insert_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let mut repo = PairRepository::new(&db.conn);
        let record = pair(1, Address::repeat_byte(0xaa), None);

        assert!(repo.insert_record(&record).unwrap());
        assert!(!repo.insert_record(&record).unwrap());
        assert_eq!(repo.get_statistics().unwrap().total_pairs, 1);
    }

    #[test]
    fn round_trips_a_record() {
        let db = Database::in_memory().unwrap();
        let repo = PairRepository::new(&db.conn);
        let record = pair(2, Address::repeat_byte(0xaa), Some(true));
        repo.insert(&record).unwrap();

        assert_eq!(repo.get_pair(&record.pair_address).unwrap(), Some(record));
        assert_eq!(repo.get_pair(&Address::ZERO).unwrap(), None);
    }

    #[test]
    fn keeps_missing_provenance_as_null() {
        let db = Database::in_memory().unwrap();
        let repo = PairRepository::new(&db.conn);
        let mut record = pair(3, Address::repeat_byte(0xaa), None);
        record.block_number = None;
        record.transaction_hash = None;
        record.log_index = None;
        repo.insert(&record).unwrap();

        assert_eq!(repo.get_pair(&record.pair_address).unwrap(), Some(record));
    }

    #[test]
    fn filters_by_token_factory_and_stable() {
        let db = Database::in_memory().unwrap();
        let repo = PairRepository::new(&db.conn);
        let factory_a = Address::repeat_byte(0xaa);
        let factory_b = Address::repeat_byte(0xbb);
        repo.insert(&pair(1, factory_a, None)).unwrap();
        repo.insert(&pair(2, factory_a, Some(true))).unwrap();
        repo.insert(&pair(3, factory_b, Some(false))).unwrap();

        let by_factory = repo
            .query_pairs(&PairFilter {
                factory: Some(factory_a),
                ..all()
            })
            .unwrap();
        assert_eq!(by_factory.len(), 2);

        let stable = repo
            .query_pairs(&PairFilter {
                stable: Some(true),
                ..all()
            })
            .unwrap();
        assert_eq!(stable.len(), 1);
        assert_eq!(stable[0].pair_address, Address::repeat_byte(2));

        let by_token = repo
            .query_pairs(&PairFilter {
                token: Some(Address::repeat_byte(0xf3)),
                ..all()
            })
            .unwrap();
        assert_eq!(by_token.len(), 1);

        let shared_token = repo
            .query_pairs(&PairFilter {
                token: Some(address!("0x4200000000000000000000000000000000000006")),
                ..all()
            })
            .unwrap();
        assert_eq!(shared_token.len(), 3);
    }

    #[test]
    fn paginates_in_block_order() {
        let db = Database::in_memory().unwrap();
        let repo = PairRepository::new(&db.conn);
        for n in [5, 1, 3] {
            repo.insert(&pair(n, Address::repeat_byte(0xaa), None)).unwrap();
        }

        let page = repo
            .query_pairs(&PairFilter {
                limit: 2,
                offset: 1,
                ..PairFilter::default()
            })
            .unwrap();
        let blocks: Vec<_> = page.iter().map(|p| p.block_number.unwrap()).collect();
        assert_eq!(blocks, vec![103, 105]);
    }

    #[test]
    fn statistics_summarize_pairs() {
        let db = Database::in_memory().unwrap();
        let repo = PairRepository::new(&db.conn);
        repo.insert(&pair(1, Address::repeat_byte(0xaa), None)).unwrap();
        repo.insert(&pair(2, Address::repeat_byte(0xaa), Some(true))).unwrap();
        repo.insert(&pair(3, Address::repeat_byte(0xbb), Some(false))).unwrap();

        let stats = repo.get_statistics().unwrap();
        assert_eq!(stats.total_pairs, 3);
        assert_eq!(stats.factories, 2);
        assert_eq!(stats.stable_pairs, 1);
        assert_eq!(stats.volatile_pairs, 1);
        assert_eq!(stats.earliest_block, Some(101));
        assert_eq!(stats.latest_block, Some(103));
    }

    #[test]
    fn statistics_on_empty_table() {
        let db = Database::in_memory().unwrap();
        let stats = PairRepository::new(&db.conn).get_statistics().unwrap();
        assert_eq!(stats.total_pairs, 0);
        assert_eq!(stats.earliest_block, None);
    }
}
