// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;
use std::time::Duration;

use ethers::providers::{Http, Middleware, Provider, ProviderError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{
    Address, BlockId, Bytes, Filter, Log, TransactionRequest, H256,
};
use tokio::sync::Semaphore;

use ocr_checker_types::BlockRange;
use ocr_checker_utils::metric::Metrics;
use ocr_checker_utils::{Error, Result};

/// The chain RPC surface the discovery engine consumes. Pluggable so the
/// engine can be run against an in-memory fake.
#[async_trait::async_trait]
pub trait ChainGateway: Send + Sync {
    /// Current head block number.
    async fn head_block(&self) -> Result<u64>;

    /// Unix timestamp (seconds) of block `number`.
    async fn block_time(&self, number: u64) -> Result<u64>;

    /// Logs emitted by `contract` carrying `topic0`, within the
    /// inclusive block `range`. Order is not guaranteed.
    async fn query_logs(
        &self,
        contract: Address,
        topic0: H256,
        range: BlockRange,
    ) -> Result<Vec<Log>>;

    /// Raw `eth_call` against `contract`, optionally at a historical
    /// block.
    async fn call(
        &self,
        contract: Address,
        data: Bytes,
        at_block: Option<u64>,
    ) -> Result<Bytes>;
}

/// The production gateway: a thin, timeout-bounded adapter over an
/// ethers [`Provider`].
pub struct EthersGateway {
    provider: Provider<Http>,
    call_timeout: Duration,
}

impl EthersGateway {
    /// Wraps `provider`, bounding every call with `call_timeout`.
    pub fn new(provider: Provider<Http>, call_timeout: Duration) -> Self {
        Self {
            provider,
            call_timeout,
        }
    }

    async fn bounded<F, T>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = std::result::Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(res) => res.map_err(Error::from),
            Err(_) => Err(Error::EthersProvider(ProviderError::CustomError(
                "rpc call timed out".into(),
            ))),
        }
    }
}

/// Classifies a provider failure on a log query. Nodes signal their
/// range cap and their rate limiting only through error strings, so this
/// is a substring sniff over the known vocabularies.
fn classify_logs_error(err: ProviderError, range: BlockRange) -> Error {
    let msg = err.to_string();
    let lower = msg.to_lowercase();
    let rate_limited = lower.contains("rate limit")
        || lower.contains("too many requests")
        || lower.contains("429");
    if rate_limited {
        return Error::RateLimited { retry_after: None };
    }
    let too_large = lower.contains("block range")
        || lower.contains("query returned more than")
        || lower.contains("range is too large")
        || lower.contains("exceeds the range");
    if too_large {
        return Error::RangeTooLarge { range };
    }
    Error::EthersProvider(err)
}

#[async_trait::async_trait]
impl ChainGateway for EthersGateway {
    async fn head_block(&self) -> Result<u64> {
        let number = self.bounded(self.provider.get_block_number()).await?;
        Ok(number.as_u64())
    }

    async fn block_time(&self, number: u64) -> Result<u64> {
        let block = self.bounded(self.provider.get_block(number)).await?;
        let block = block.ok_or(Error::BlockNotFound(number))?;
        Ok(block.timestamp.as_u64())
    }

    async fn query_logs(
        &self,
        contract: Address,
        topic0: H256,
        range: BlockRange,
    ) -> Result<Vec<Log>> {
        let filter = Filter::new()
            .address(contract)
            .topic0(topic0)
            .from_block(range.start)
            .to_block(range.end);
        match tokio::time::timeout(
            self.call_timeout,
            self.provider.get_logs(&filter),
        )
        .await
        {
            Ok(Ok(logs)) => Ok(logs),
            Ok(Err(e)) => Err(classify_logs_error(e, range)),
            Err(_) => Err(Error::EthersProvider(ProviderError::CustomError(
                "rpc call timed out".into(),
            ))),
        }
    }

    async fn call(
        &self,
        contract: Address,
        data: Bytes,
        at_block: Option<u64>,
    ) -> Result<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new()
            .to(contract)
            .data(data)
            .into();
        let block = at_block.map(|b| BlockId::from(b));
        self.bounded(self.provider.call(&tx, block)).await
    }
}

/// A decorator that funnels every gateway call through the process-wide
/// fan-out semaphore, so that no combination of harvests, locators, and
/// timestamp lookups exceeds the configured concurrency.
pub struct GatedGateway {
    inner: Arc<dyn ChainGateway>,
    gate: Arc<Semaphore>,
    metrics: Option<Arc<Metrics>>,
}

impl GatedGateway {
    /// Gates `inner` behind `gate`.
    pub fn new(
        inner: Arc<dyn ChainGateway>,
        gate: Arc<Semaphore>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self {
            inner,
            gate,
            metrics,
        }
    }

    async fn permit(&self) -> Result<tokio::sync::SemaphorePermit<'_>> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| Error::Internal("rpc gate closed".into()))?;
        if let Some(metrics) = &self.metrics {
            metrics.rpc_calls_total.inc();
        }
        Ok(permit)
    }
}

#[async_trait::async_trait]
impl ChainGateway for GatedGateway {
    async fn head_block(&self) -> Result<u64> {
        let _permit = self.permit().await?;
        self.inner.head_block().await
    }

    async fn block_time(&self, number: u64) -> Result<u64> {
        let _permit = self.permit().await?;
        self.inner.block_time(number).await
    }

    async fn query_logs(
        &self,
        contract: Address,
        topic0: H256,
        range: BlockRange,
    ) -> Result<Vec<Log>> {
        let _permit = self.permit().await?;
        self.inner.query_logs(contract, topic0, range).await
    }

    async fn call(
        &self,
        contract: Address,
        data: Bytes,
        at_block: Option<u64>,
    ) -> Result<Bytes> {
        let _permit = self.permit().await?;
        self.inner.call(contract, data, at_block).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_cap_vocabulary_is_recognized() {
        let range = BlockRange::new(0, 9_999);
        let err = classify_logs_error(
            ProviderError::CustomError(
                "query returned more than 10000 results".into(),
            ),
            range,
        );
        assert!(err.is_range_too_large());

        let err = classify_logs_error(
            ProviderError::CustomError("429 Too Many Requests".into()),
            range,
        );
        assert!(err.is_rate_limited());

        let err = classify_logs_error(
            ProviderError::CustomError("connection reset by peer".into()),
            range,
        );
        assert!(err.is_transient());
        assert!(!err.is_range_too_large());
    }
}
