//! Walks a block range window by window and persists every pair creation
//! log it can decode.
//!
//! Fetch errors end the scan: there is no checkpoint, so continuing past a
//! failed window would silently under-report. Malformed logs, unknown
//! topics and insert failures are logged and skipped.

use crate::config::{Config, FactoryEntry, ScanMode};
use crate::decoder::{NormalizedPairRecord, decode_factory_log};
use crate::error::{FetchError, ScanError};
use crate::events::{KNOWN_SIGNATURES, classify};
use crate::fetcher::LogFetcher;
use crate::pagination::{BlockWindow, paginate};
use crate::rpc::{ChainClient, LogEntry};
use crate::sink::RecordSink;
use alloy_primitives::Address;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One kind of query issued for every window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTarget {
    /// All known signatures, optionally restricted to some emitters.
    Topics { addresses: Vec<Address> },
    /// Everything a single factory emitted.
    Factory(FactoryEntry),
}

impl fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanTarget::Topics { addresses } if addresses.is_empty() => {
                write!(f, "{} event signatures", KNOWN_SIGNATURES.len())
            }
            ScanTarget::Topics { addresses } => write!(
                f,
                "{} event signatures on {} contracts",
                KNOWN_SIGNATURES.len(),
                addresses.len()
            ),
            ScanTarget::Factory(factory) => match &factory.entity_id {
                Some(entity) => write!(f, "factory {:?} ({})", factory.address, entity),
                None => write!(f, "factory {:?}", factory.address),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanPlan {
    pub start_block: u64,
    /// Exclusive. `None` resolves to the chain head + 1 when the scan starts.
    pub end_block: Option<u64>,
    pub page_size: u64,
    pub targets: Vec<ScanTarget>,
    /// Fetches kept in flight; results are still consumed in window order.
    pub concurrency: usize,
}

impl ScanPlan {
    pub fn from_config(config: &Config) -> Self {
        let targets = match config.scan_mode {
            ScanMode::Topics => vec![ScanTarget::Topics {
                addresses: config.scan_addresses.clone(),
            }],
            ScanMode::Factories => config
                .factories
                .iter()
                .cloned()
                .map(ScanTarget::Factory)
                .collect(),
        };

        ScanPlan {
            start_block: config.start_block,
            end_block: config.end_block,
            page_size: config.page_size,
            targets,
            concurrency: config.concurrency.max(1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub windows: u64,
    pub requests: u64,
    pub logs: u64,
    pub decoded: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub malformed: u64,
    pub unknown: u64,
    pub insert_failures: u64,
}

pub struct Scanner<C, S> {
    fetcher: LogFetcher<C>,
    sink: S,
    plan: ScanPlan,
}

impl<C: ChainClient, S: RecordSink> Scanner<C, S> {
    pub fn new(fetcher: LogFetcher<C>, sink: S, plan: ScanPlan) -> Self {
        Scanner {
            fetcher,
            sink,
            plan,
        }
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub async fn run(&mut self) -> Result<ScanSummary, ScanError> {
        let started = Instant::now();
        let end_block = self.resolve_end_block().await?;
        let start_block = self.plan.start_block;

        if start_block >= end_block {
            info!(
                "Nothing to scan: start block {} is not below end block {}",
                start_block, end_block
            );
            return Ok(ScanSummary::default());
        }

        self.log_range_bounds(start_block, end_block).await?;
        info!(
            "Scanning blocks {} to {} in windows of {} blocks ({} target(s), concurrency {})",
            start_block,
            end_block,
            self.plan.page_size,
            self.plan.targets.len(),
            self.plan.concurrency
        );

        let Scanner {
            fetcher,
            sink,
            plan,
        } = self;
        let fetcher = &*fetcher;
        let targets = &plan.targets;

        let requests = paginate(start_block, end_block, plan.page_size)
            .flat_map(move |window| targets.iter().map(move |target| (window, target)));

        let mut results = stream::iter(requests)
            .map(move |(window, target)| async move {
                let logs = match target {
                    ScanTarget::Topics { addresses } => {
                        fetcher.fetch(&window, addresses, &KNOWN_SIGNATURES).await
                    }
                    ScanTarget::Factory(factory) => {
                        fetcher.fetch(&window, &[factory.address], &[]).await
                    }
                };
                (window, target, logs)
            })
            .buffered(plan.concurrency);

        let mut summary = ScanSummary::default();
        let mut current_window: Option<BlockWindow> = None;

        while let Some((window, target, logs)) = results.next().await {
            if current_window != Some(window) {
                info!(
                    "Processing blocks {} to {}...",
                    window.from_block, window.to_block
                );
                summary.windows += 1;
                current_window = Some(window);
            }
            info!("Processing {}", target);

            let logs = logs.map_err(|source| ScanError::Fetch { window, source })?;
            summary.requests += 1;
            info!("Found {} logs for {}", logs.len(), target);

            for entry in &logs {
                process_entry(target, entry, &mut *sink, &mut summary);
            }
        }

        if let Err(e) = sink.flush() {
            warn!("Failed to flush record sink: {}", e);
        }

        info!(
            "Scan completed in {:?}: {} windows, {} requests, {} logs, {} decoded, {} inserted, {} already known, {} malformed, {} unknown, {} insert failures",
            started.elapsed(),
            summary.windows,
            summary.requests,
            summary.logs,
            summary.decoded,
            summary.inserted,
            summary.duplicates,
            summary.malformed,
            summary.unknown,
            summary.insert_failures
        );

        Ok(summary)
    }

    async fn resolve_end_block(&self) -> Result<u64, ScanError> {
        if let Some(end_block) = self.plan.end_block {
            return Ok(end_block);
        }

        let head = self.fetcher.latest_block().await.map_err(ScanError::Chain)?;
        info!("No end block configured, scanning up to chain head {}", head);
        Ok(head.saturating_add(1))
    }

    async fn log_range_bounds(&self, start_block: u64, end_block: u64) -> Result<(), ScanError> {
        for number in [start_block, end_block - 1] {
            match self.fetcher.block(number).await.map_err(ScanError::Chain)? {
                Some(block) => info!("Block {} has timestamp {}", block.number, block.timestamp),
                None => warn!("Block {} not found on chain", number),
            }
        }
        Ok(())
    }
}

fn process_entry<S: RecordSink>(
    target: &ScanTarget,
    entry: &LogEntry,
    sink: &mut S,
    summary: &mut ScanSummary,
) {
    summary.logs += 1;

    let decoded = match target {
        ScanTarget::Topics { .. } => classify(entry).decode(entry),
        ScanTarget::Factory(factory) => decode_factory_log(entry, factory.address).map(Some),
    };

    let record = match decoded {
        Ok(Some(record)) => record,
        Ok(None) => {
            summary.unknown += 1;
            debug!(
                "Skipping log with unrecognized topic {:?} from {:?}",
                entry.topics.first(),
                entry.address
            );
            return;
        }
        Err(e) => {
            summary.malformed += 1;
            warn!(
                "Skipping malformed log from {:?} in tx {:?}: {}",
                entry.address, entry.transaction_hash, e
            );
            return;
        }
    };

    summary.decoded += 1;
    log_record(&record);

    match sink.insert_record(&record) {
        Ok(true) => summary.inserted += 1,
        Ok(false) => summary.duplicates += 1,
        Err(e) => {
            summary.insert_failures += 1;
            warn!("Failed to insert pair {:?}: {}", record.pair_address, e);
        }
    }
}

fn log_record(record: &NormalizedPairRecord) {
    match record.stable {
        Some(stable) => info!(
            "New pair created: {:?}, tokens: {:?}, {:?}, stable: {}, deployer: {:?}, factory: {:?}",
            record.pair_address,
            record.token0,
            record.token1,
            stable,
            record.deployer_address,
            record.factory_address
        ),
        None => info!(
            "New pair created: {:?}, tokens: {:?}, {:?}, deployer: {:?}, factory: {:?}",
            record.pair_address,
            record.token0,
            record.token1,
            record.deployer_address,
            record.factory_address
        ),
    }
}

/// Lets a caller tell a cancelled run apart from a transport failure.
pub fn is_cancellation(error: &ScanError) -> bool {
    matches!(
        error,
        ScanError::Fetch {
            source: FetchError::RateLimitAbort(_),
            ..
        } | ScanError::Chain(FetchError::RateLimitAbort(_))
    )
}
