// Oracle adapter
//
// The oracle is the external text-generation service. The driver only needs a
// blocking request/response call; streaming, if the service offers it, is
// consumed in full inside the adapter.

pub mod ollama;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use ollama::OllamaOracle;

/// One generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub system: String,
    pub temperature: f32,
    pub context_length: Option<u32>,
    /// Tokens to predict; negative means unlimited
    pub max_tokens: Option<i32>,
    /// JSON schema the reply should follow
    pub format: Option<Value>,
}

/// Text-generation service used for translation and reevaluation
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Generate a complete reply for the request
    async fn generate(&self, request: &GenerateRequest) -> Result<String>;

    /// Fail with a connectivity error if the service or a model is unavailable
    async fn check_connection(&self, models: &[String]) -> Result<()>;
}
