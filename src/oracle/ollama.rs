use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::OracleConfig;
use crate::error::{BisubError, Result};
use super::{GenerateRequest, Oracle};

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a Value>,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
}

/// One line of the streamed /api/generate reply
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Collects newline-delimited JSON chunks into the full reply text
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    pending: Vec<u8>,
    text: String,
    done: bool,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; lines may be split across calls
    pub fn push(&mut self, bytes: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(bytes);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.consume_line(&line)?;
        }
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Flush any unterminated last line and return the reply
    pub fn finish(mut self) -> Result<String> {
        let rest = std::mem::take(&mut self.pending);
        self.consume_line(&rest)?;
        Ok(self.text)
    }

    fn consume_line(&mut self, line: &[u8]) -> Result<()> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        let chunk: GenerateChunk = serde_json::from_str(line)
            .map_err(|e| BisubError::Oracle(format!("Malformed stream chunk: {}", e)))?;
        if let Some(error) = chunk.error {
            return Err(BisubError::Oracle(error));
        }

        self.text.push_str(&chunk.response);
        self.done |= chunk.done;
        Ok(())
    }
}

/// Oracle backed by an Ollama server
pub struct OllamaOracle {
    client: Client,
    endpoint: String,
}

impl OllamaOracle {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("bisub/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Oracle for OllamaOracle {
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let body = GenerateBody {
            model: &request.model,
            prompt: &request.prompt,
            system: &request.system,
            stream: true,
            format: request.format.as_ref(),
            options: GenerateOptions {
                temperature: request.temperature,
                num_ctx: request.context_length,
                num_predict: request.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.endpoint);
        debug!("Sending generate request to {} (model {})", url, request.model);

        let mut response = self.client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BisubError::Oracle(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(BisubError::Oracle(format!(
                "Ollama API error {}: {}", status, error_text
            )));
        }

        let mut stream = StreamAccumulator::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| BisubError::Oracle(format!("Stream interrupted: {}", e)))?
        {
            stream.push(&chunk)?;
            if stream.is_done() {
                break;
            }
        }

        let text = stream.finish()?;
        debug!("Raw oracle reply: {}", text);
        Ok(text)
    }

    async fn check_connection(&self, models: &[String]) -> Result<()> {
        let response = self.client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| BisubError::Connectivity(format!("{}: {}", self.endpoint, e)))?;

        if !response.status().is_success() {
            return Err(BisubError::Connectivity(format!(
                "{} answered with {}", self.endpoint, response.status()
            )));
        }

        let url = format!("{}/api/show", self.endpoint);
        for model in models {
            let response = self.client
                .post(&url)
                .json(&json!({ "name": model }))
                .send()
                .await
                .map_err(|e| BisubError::Connectivity(format!("Failed to query model '{}': {}", model, e)))?;

            if !response.status().is_success() {
                return Err(BisubError::Connectivity(format!(
                    "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
                    model, model
                )));
            }
            info!("Ollama model '{}' is available", model);
        }

        Ok(())
    }
}
