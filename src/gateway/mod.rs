//! Provider gateway for OpenAI-compatible chat completions.

pub mod error;
pub mod openai;
pub mod pricing;
pub mod types;
pub mod usage;

use std::sync::Arc;

use openai::{ChatProvider, OpenAiCompatibleAdapter};
use usage::{CallStatus, ProviderCallRecord, UsageSink as UsageSinkTrait};

pub use error::{ErrorContext, ProviderError};
pub use pricing::*;
pub use types::*;
pub use usage::{TallyUsageSink, TracingUsageSink, UsageSink, UsageTotals};

/// One chat round trip. Retries are the caller's business.
#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Gateway over a single OpenAI-compatible endpoint that records every call
/// to a [`UsageSink`].
pub struct ProviderGateway<U: UsageSinkTrait> {
    adapter: OpenAiCompatibleAdapter,
    usage_sink: Arc<U>,
}

#[async_trait::async_trait]
impl<U: UsageSinkTrait> ChatGateway for ProviderGateway<U> {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        ProviderGateway::chat(self, req).await
    }
}

impl<U: UsageSinkTrait> ProviderGateway<U> {
    pub fn new(adapter: OpenAiCompatibleAdapter, usage_sink: Arc<U>) -> Self {
        Self {
            adapter,
            usage_sink,
        }
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        match self.adapter.chat(&req).await {
            Ok(resp) => {
                self.record_usage(&req, &resp, CallStatus::Success, None)
                    .await;
                Ok(resp)
            }
            Err(err) => {
                let code = err.code().to_string();
                self.record_usage(&req, &ChatResponse::empty(), CallStatus::Error, Some(code))
                    .await;
                Err(err)
            }
        }
    }

    async fn record_usage(
        &self,
        req: &ChatRequest,
        resp: &ChatResponse,
        status: CallStatus,
        error_code: Option<String>,
    ) {
        let record = ProviderCallRecord::new(
            req.model.provider(),
            "chat/completions",
            req.model.model_id(),
            req.attribution.caller,
        )
        .tokens(resp.input_tokens as i32, resp.output_tokens as i32)
        .cost(resp.cost_nanodollars)
        .completions(req.n, resp.completions.len() as u32)
        .job(req.attribution.job_id)
        .stimulus(req.attribution.stimulus_id.clone())
        .latency(resp.latency.as_millis() as i32);

        let record = if status == CallStatus::Error {
            record.error(error_code.unwrap_or_else(|| "provider_error".to_string()))
        } else {
            record
        };

        self.usage_sink.record(record).await;
    }
}
