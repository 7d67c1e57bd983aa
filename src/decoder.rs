use crate::error::MalformedLogError;
use crate::events::EventKind;
use crate::rpc::LogEntry;
use alloy_primitives::{Address, B256};
use serde::Serialize;

const WORD: usize = 32;

/// The shape every decoder produces, whatever the source layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedPairRecord {
    pub pair_address: Address,
    pub token0: Address,
    pub token1: Address,
    pub deployer_address: Address,
    pub factory_address: Address,
    pub stable: Option<bool>,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StableSource {
    None,
    Topic3,
}

/// Where one variant keeps its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    /// Index of the data word whose low 20 bytes hold the pair address.
    pair_word: usize,
    stable: StableSource,
}

impl Layout {
    fn required_topics(&self) -> usize {
        match self.stable {
            StableSource::None => 3,
            StableSource::Topic3 => 4,
        }
    }

    fn required_data(&self) -> usize {
        (self.pair_word + 1) * WORD
    }
}

fn layout(kind: EventKind) -> Option<Layout> {
    let layout = match kind {
        EventKind::PairTopicA => Layout {
            pair_word: 1,
            stable: StableSource::None,
        },
        EventKind::PoolTopicB => Layout {
            pair_word: 0,
            stable: StableSource::None,
        },
        EventKind::PoolTopicC => Layout {
            pair_word: 1,
            stable: StableSource::None,
        },
        // word 0 holds a flag this variant does not report
        EventKind::PairTopicD => Layout {
            pair_word: 1,
            stable: StableSource::None,
        },
        EventKind::PoolTopicE => Layout {
            pair_word: 0,
            stable: StableSource::Topic3,
        },
        EventKind::Unknown => return None,
    };
    Some(layout)
}

/// Low-order 20 bytes of a 32-byte topic.
pub fn topic_address(topic: &B256) -> Address {
    Address::from_word(*topic)
}

/// Low-order 20 bytes of data word `index`. The caller checks the length.
fn word_address(data: &[u8], index: usize) -> Address {
    let end = (index + 1) * WORD;
    Address::from_slice(&data[end - 20..end])
}

fn require_topics(entry: &LogEntry, required: usize) -> Result<(), MalformedLogError> {
    if entry.topics.len() < required {
        return Err(MalformedLogError::TooFewTopics {
            required,
            actual: entry.topics.len(),
        });
    }
    Ok(())
}

fn require_data(entry: &LogEntry, required: usize) -> Result<(), MalformedLogError> {
    if entry.data.len() < required {
        return Err(MalformedLogError::ShortData {
            required,
            actual: entry.data.len(),
        });
    }
    Ok(())
}

fn record(entry: &LogEntry, pair_address: Address, factory_address: Address) -> NormalizedPairRecord {
    NormalizedPairRecord {
        pair_address,
        token0: topic_address(&entry.topics[1]),
        token1: topic_address(&entry.topics[2]),
        deployer_address: entry.address,
        factory_address,
        stable: None,
        block_number: entry.block_number,
        transaction_hash: entry.transaction_hash,
        log_index: entry.log_index,
    }
}

impl EventKind {
    /// Decodes a log already classified as `self`.
    ///
    /// Returns `Ok(None)` for `Unknown`. The emitting contract is recorded as
    /// both deployer and factory.
    pub fn decode(
        &self,
        entry: &LogEntry,
    ) -> Result<Option<NormalizedPairRecord>, MalformedLogError> {
        let Some(layout) = layout(*self) else {
            return Ok(None);
        };

        // token topics come first so a short topic list is reported before short data
        require_topics(entry, 3)?;
        require_data(entry, layout.required_data())?;
        require_topics(entry, layout.required_topics())?;

        let pair_address = word_address(&entry.data, layout.pair_word);
        let mut decoded = record(entry, pair_address, entry.address);
        if layout.stable == StableSource::Topic3 {
            decoded.stable = Some(entry.topics[3] != B256::ZERO);
        }
        Ok(Some(decoded))
    }
}

/// Decodes any log emitted by a configured factory, regardless of topic 0.
///
/// Uses the two-token `PairCreated` layout: tokens in topics 1 and 2 and the
/// pair in data word 0. The configured factory is recorded as the factory and
/// the emitting contract as the deployer.
pub fn decode_factory_log(
    entry: &LogEntry,
    factory_address: Address,
) -> Result<NormalizedPairRecord, MalformedLogError> {
    require_topics(entry, 3)?;
    require_data(entry, WORD)?;

    let pair_address = word_address(&entry.data, 0);
    Ok(record(entry, pair_address, factory_address))
}
