//! Factory event signatures and classification by topic 0.
//!
//! The tag names follow the factory deployments they were first seen on and
//! do not all match the event name each contract actually emits. Dispatch
//! depends only on the signature value.

use crate::rpc::LogEntry;
use alloy_primitives::{B256, b256};
use std::fmt;

/// `PoolCreated(address indexed, address indexed, uint24 indexed, int24, address)`.
pub const PAIR_TOPIC_A: B256 =
    b256!("0x783cca1c0412dd0d695e784568c96da2e9c22ff989357a2e8b1d9b2b4e6b7118");
/// `PairCreated(address indexed, address indexed, address, uint256)`.
pub const POOL_TOPIC_B: B256 =
    b256!("0x0d3648bd0f6ba80134a33ba9275ac585d9d315f0ad8355cddefde31afa28d0e9");
pub const POOL_TOPIC_C: B256 =
    b256!("0xf04da67755adf58739649e2fb9949a6328518141b7ac9e44aa10320688b04900");
pub const PAIR_TOPIC_D: B256 =
    b256!("0xc4805696c66d7cf352fc1d6bb633ad5ee82f6cb577c453024b6e0eb8306c6fc9");
/// Carries the stable flag as a third indexed topic.
pub const POOL_TOPIC_E: B256 =
    b256!("0x2128d88d14c80cb081c1252a5acff7a264671bf199ce226b53788fb26065005e");

/// Topic-0 values of every event shape the scanner decodes, in query order.
pub const KNOWN_SIGNATURES: [B256; 5] = [
    PAIR_TOPIC_A,
    POOL_TOPIC_B,
    POOL_TOPIC_C,
    PAIR_TOPIC_D,
    POOL_TOPIC_E,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PairTopicA,
    PoolTopicB,
    PoolTopicC,
    PairTopicD,
    PoolTopicE,
    Unknown,
}

impl EventKind {
    pub const KNOWN: [EventKind; 5] = [
        EventKind::PairTopicA,
        EventKind::PoolTopicB,
        EventKind::PoolTopicC,
        EventKind::PairTopicD,
        EventKind::PoolTopicE,
    ];

    pub fn from_signature(topic0: &B256) -> Self {
        EventKind::KNOWN
            .into_iter()
            .find(|kind| kind.signature().as_ref() == Some(topic0))
            .unwrap_or(EventKind::Unknown)
    }

    pub fn signature(&self) -> Option<B256> {
        match self {
            EventKind::PairTopicA => Some(PAIR_TOPIC_A),
            EventKind::PoolTopicB => Some(POOL_TOPIC_B),
            EventKind::PoolTopicC => Some(POOL_TOPIC_C),
            EventKind::PairTopicD => Some(PAIR_TOPIC_D),
            EventKind::PoolTopicE => Some(POOL_TOPIC_E),
            EventKind::Unknown => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::PairTopicA => "pair-topic-a",
            EventKind::PoolTopicB => "pool-topic-b",
            EventKind::PoolTopicC => "pool-topic-c",
            EventKind::PairTopicD => "pair-topic-d",
            EventKind::PoolTopicE => "pool-topic-e",
            EventKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Classifies a log by its first topic. Logs without topics are `Unknown`.
pub fn classify(entry: &LogEntry) -> EventKind {
    entry
        .topics
        .first()
        .map(EventKind::from_signature)
        .unwrap_or(EventKind::Unknown)
}
