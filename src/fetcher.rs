use crate::error::FetchError;
use crate::pagination::BlockWindow;
use crate::rate_limiter::RateLimiter;
use crate::rpc::{BlockSummary, ChainClient, LogEntry, LogQuery};
use alloy_primitives::{Address, B256};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Issues chain queries, one rate-limiter permit per request.
pub struct LogFetcher<C> {
    client: C,
    limiter: Arc<RateLimiter>,
    cancel: CancellationToken,
    inclusive_end: bool,
}

impl<C: ChainClient> LogFetcher<C> {
    pub fn new(client: C, limiter: Arc<RateLimiter>, cancel: CancellationToken) -> Self {
        LogFetcher {
            client,
            limiter,
            cancel,
            inclusive_end: false,
        }
    }

    /// Also query each window's `to_block`.
    pub fn with_inclusive_end(mut self, inclusive_end: bool) -> Self {
        self.inclusive_end = inclusive_end;
        self
    }

    /// Fetches the logs of one window.
    ///
    /// `topics` is an OR over topic 0; `addresses` restricts the emitter. An
    /// empty slice leaves that dimension open.
    pub async fn fetch(
        &self,
        window: &BlockWindow,
        addresses: &[Address],
        topics: &[B256],
    ) -> Result<Vec<LogEntry>, FetchError> {
        let (from_block, to_block) = window.rpc_bounds(self.inclusive_end);
        let query = LogQuery {
            from_block,
            to_block,
            addresses: addresses.to_vec(),
            topics: topics.to_vec(),
        };

        self.limiter.acquire(&self.cancel).await?;
        debug!("Filtering logs for block range {} to {}", from_block, to_block);

        self.client
            .filter_logs(&query)
            .await
            .map_err(FetchError::Transport)
    }

    pub async fn latest_block(&self) -> Result<u64, FetchError> {
        self.limiter.acquire(&self.cancel).await?;
        self.client
            .get_latest_block()
            .await
            .map_err(FetchError::Transport)
    }

    pub async fn block(&self, number: u64) -> Result<Option<BlockSummary>, FetchError> {
        self.limiter.acquire(&self.cancel).await?;
        self.client
            .get_block_by_number(number)
            .await
            .map_err(FetchError::Transport)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::RateLimitAbort;
    use crate::rate_limiter::Clock;
    use crate::rate_limiter::tests::FakeClock;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// In-memory chain. Logs are served by inclusive block number and
    /// filtered the way a node would.
    #[derive(Default)]
    pub(crate) struct FakeChain {
        pub(crate) logs: Vec<LogEntry>,
        pub(crate) head: u64,
        pub(crate) fail_from_block: Option<u64>,
        /// Serve every log in range, like a node that ignores topic filters.
        pub(crate) ignore_topics: bool,
        pub(crate) queries: Mutex<Vec<LogQuery>>,
        pub(crate) timestamps: HashMap<u64, u64>,
    }

    impl FakeChain {
        pub(crate) fn queries(&self) -> Vec<LogQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn filter_logs(&self, query: &LogQuery) -> Result<Vec<LogEntry>> {
            self.queries.lock().unwrap().push(query.clone());

            if let Some(fail_from) = self.fail_from_block {
                if query.to_block >= fail_from {
                    anyhow::bail!("connection reset by peer");
                }
            }

            Ok(self
                .logs
                .iter()
                .filter(|log| {
                    let block = log.block_number.unwrap_or_default();
                    block >= query.from_block && block <= query.to_block
                })
                .filter(|log| query.addresses.is_empty() || query.addresses.contains(&log.address))
                .filter(|log| {
                    self.ignore_topics
                        || query.topics.is_empty()
                        || log.topics.first().is_some_and(|t| query.topics.contains(t))
                })
                .cloned()
                .collect())
        }

        async fn get_latest_block(&self) -> Result<u64> {
            Ok(self.head)
        }

        async fn get_block_by_number(&self, number: u64) -> Result<Option<BlockSummary>> {
            Ok(self.timestamps.get(&number).map(|&timestamp| BlockSummary {
                number,
                timestamp,
            }))
        }
    }

    pub(crate) fn fake_limiter(rate: f64) -> (Arc<RateLimiter>, FakeClock) {
        let clock = FakeClock::new();
        let limiter = RateLimiter::with_clock(rate, Box::new(clock.clone())).unwrap();
        (Arc::new(limiter), clock)
    }

    fn window(from_block: u64, to_block: u64) -> BlockWindow {
        BlockWindow {
            from_block,
            to_block,
        }
    }

    #[tokio::test]
    async fn half_open_window_excludes_upper_block() {
        let chain = Arc::new(FakeChain::default());
        let (limiter, _) = fake_limiter(10.0);
        let fetcher = LogFetcher::new(chain.clone(), limiter, CancellationToken::new());

        fetcher.fetch(&window(100, 200), &[], &[]).await.unwrap();

        let queries = chain.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!((queries[0].from_block, queries[0].to_block), (100, 199));
    }

    #[tokio::test]
    async fn inclusive_window_queries_upper_block() {
        let chain = Arc::new(FakeChain::default());
        let (limiter, _) = fake_limiter(10.0);
        let fetcher = LogFetcher::new(chain.clone(), limiter, CancellationToken::new())
            .with_inclusive_end(true);

        fetcher.fetch(&window(100, 200), &[], &[]).await.unwrap();

        assert_eq!(chain.queries()[0].to_block, 200);
    }

    #[tokio::test]
    async fn passes_address_and_topic_sets() {
        let chain = Arc::new(FakeChain::default());
        let (limiter, _) = fake_limiter(10.0);
        let fetcher = LogFetcher::new(chain.clone(), limiter, CancellationToken::new());
        let addresses = [Address::repeat_byte(1), Address::repeat_byte(2)];
        let topics = [B256::repeat_byte(3)];

        fetcher.fetch(&window(0, 10), &addresses, &topics).await.unwrap();

        let query = &chain.queries()[0];
        assert_eq!(query.addresses, addresses.to_vec());
        assert_eq!(query.topics, topics.to_vec());
    }

    #[tokio::test]
    async fn each_fetch_takes_one_permit() {
        let chain = Arc::new(FakeChain::default());
        let (limiter, clock) = fake_limiter(4.0);
        let fetcher = LogFetcher::new(chain.clone(), limiter.clone(), CancellationToken::new());
        let start = clock.now();

        for from in (0..50).step_by(10) {
            fetcher.fetch(&window(from, from + 10), &[], &[]).await.unwrap();
        }

        // five permits at 4/s: the fifth is granted at +1s, the next would be +1.25s
        assert_eq!(chain.queries().len(), 5);
        let next = limiter.acquire(&CancellationToken::new()).await.unwrap();
        assert_eq!(next - start, Duration::from_millis(1250));
    }

    #[tokio::test]
    async fn n_fetches_span_at_least_n_minus_one_intervals() {
        let chain = Arc::new(FakeChain::default());
        let (limiter, clock) = fake_limiter(2.0);
        let fetcher = LogFetcher::new(chain, limiter, CancellationToken::new());
        let start: Instant = clock.now();

        for from in 0..6 {
            fetcher.fetch(&window(from, from + 1), &[], &[]).await.unwrap();
        }

        assert!(clock.now() - start >= Duration::from_millis(2500));
    }

    #[tokio::test]
    async fn transport_error_is_surfaced() {
        let chain = Arc::new(FakeChain {
            fail_from_block: Some(0),
            ..FakeChain::default()
        });
        let (limiter, _) = fake_limiter(10.0);
        let fetcher = LogFetcher::new(chain, limiter, CancellationToken::new());

        let err = fetcher.fetch(&window(0, 10), &[], &[]).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn cancellation_aborts_before_querying() {
        let chain = Arc::new(FakeChain::default());
        let (limiter, _) = fake_limiter(10.0);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let fetcher = LogFetcher::new(chain.clone(), limiter, cancel);

        let err = fetcher.fetch(&window(0, 10), &[], &[]).await.unwrap_err();
        assert!(matches!(err, FetchError::RateLimitAbort(RateLimitAbort)));
        assert!(chain.queries().is_empty());
    }

    #[tokio::test]
    async fn chain_head_and_block_lookups_are_limited_too() {
        let chain = Arc::new(FakeChain {
            head: 42,
            timestamps: HashMap::from([(7, 1_700_000_000)]),
            ..FakeChain::default()
        });
        let (limiter, clock) = fake_limiter(1.0);
        let fetcher = LogFetcher::new(chain, limiter, CancellationToken::new());
        let start = clock.now();

        assert_eq!(fetcher.latest_block().await.unwrap(), 42);
        assert_eq!(
            fetcher.block(7).await.unwrap(),
            Some(BlockSummary {
                number: 7,
                timestamp: 1_700_000_000
            })
        );
        assert_eq!(fetcher.block(8).await.unwrap(), None);
        assert_eq!(clock.now() - start, Duration::from_secs(2));
    }
}
