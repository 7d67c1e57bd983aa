use alloy::providers::fillers::FillProvider;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, Filter, Log};
use alloy_primitives::{Address, B256, Bytes};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

type AlloyFullProvider = FillProvider<
    alloy::providers::fillers::JoinFill<
        alloy::providers::Identity,
        alloy::providers::fillers::JoinFill<
            alloy::providers::fillers::GasFiller,
            alloy::providers::fillers::JoinFill<
                alloy::providers::fillers::BlobGasFiller,
                alloy::providers::fillers::JoinFill<
                    alloy::providers::fillers::NonceFiller,
                    alloy::providers::fillers::ChainIdFiller,
                >,
            >,
        >,
    >,
    alloy::providers::RootProvider,
>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120); // 2 minutes timeout per request

/// A log as returned by the node, reduced to what the decoders read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<u64>,
}

impl From<Log> for LogEntry {
    fn from(log: Log) -> Self {
        LogEntry {
            address: log.address(),
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
            block_number: log.block_number,
            transaction_hash: log.transaction_hash,
            log_index: log.log_index,
        }
    }
}

/// One `eth_getLogs` request. Block bounds are inclusive, as on the wire.
///
/// An empty `addresses` or `topics` set leaves that dimension unfiltered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub from_block: u64,
    pub to_block: u64,
    pub addresses: Vec<Address>,
    pub topics: Vec<B256>,
}

impl LogQuery {
    pub fn to_filter(&self) -> Filter {
        let mut filter = Filter::new()
            .from_block(self.from_block)
            .to_block(self.to_block);

        if !self.addresses.is_empty() {
            filter = filter.address(self.addresses.clone());
        }
        if !self.topics.is_empty() {
            filter = filter.event_signature(self.topics.clone());
        }
        filter
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSummary {
    pub number: u64,
    pub timestamp: u64,
}

/// The chain queries the scanner depends on.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn filter_logs(&self, query: &LogQuery) -> Result<Vec<LogEntry>>;

    async fn get_latest_block(&self) -> Result<u64>;

    async fn get_block_by_number(&self, number: u64) -> Result<Option<BlockSummary>>;
}

#[async_trait]
impl<T: ChainClient + ?Sized> ChainClient for Arc<T> {
    async fn filter_logs(&self, query: &LogQuery) -> Result<Vec<LogEntry>> {
        self.as_ref().filter_logs(query).await
    }

    async fn get_latest_block(&self) -> Result<u64> {
        self.as_ref().get_latest_block().await
    }

    async fn get_block_by_number(&self, number: u64) -> Result<Option<BlockSummary>> {
        self.as_ref().get_block_by_number(number).await
    }
}

/// HTTP JSON-RPC client. Requests are never retried: a failure or timeout is
/// returned to the caller as is.
#[derive(Clone)]
pub struct RpcClient {
    provider: AlloyFullProvider,
    url: String,
}

impl RpcClient {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let parsed_url = rpc_url
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid RPC URL: {}", rpc_url))?;
        let provider: AlloyFullProvider = ProviderBuilder::new().connect_http(parsed_url);

        Ok(RpcClient {
            provider,
            url: rpc_url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn bounded<T, E, F>(&self, method: &str, future: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        match timeout(REQUEST_TIMEOUT, future).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!("RPC error on {} ({}): {}", self.url, method, e);
                Err(anyhow::anyhow!("{} failed: {}", method, e))
            }
            Err(_) => {
                warn!(
                    "Request timeout after {} seconds on {} ({})",
                    REQUEST_TIMEOUT.as_secs(),
                    self.url,
                    method
                );
                Err(anyhow::anyhow!(
                    "{} timed out after {} seconds",
                    method,
                    REQUEST_TIMEOUT.as_secs()
                ))
            }
        }
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    async fn filter_logs(&self, query: &LogQuery) -> Result<Vec<LogEntry>> {
        let filter = query.to_filter();
        let logs = self
            .bounded("eth_getLogs", self.provider.get_logs(&filter))
            .await?;
        Ok(logs.into_iter().map(LogEntry::from).collect())
    }

    async fn get_latest_block(&self) -> Result<u64> {
        self.bounded("eth_blockNumber", self.provider.get_block_number())
            .await
    }

    async fn get_block_by_number(&self, number: u64) -> Result<Option<BlockSummary>> {
        let block = self
            .bounded(
                "eth_getBlockByNumber",
                self.provider
                    .get_block_by_number(BlockNumberOrTag::Number(number))
                    .into_future(),
            )
            .await
            .with_context(|| format!("Failed to fetch block {}", number))?;

        Ok(block.map(|block| BlockSummary {
            number: block.header.number,
            timestamp: block.header.timestamp,
        }))
    }
}
