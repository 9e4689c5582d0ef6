use std::sync::Mutex;

use async_trait::async_trait;

use bisub::error::{BisubError, Result};
use bisub::oracle::{GenerateRequest, Oracle};

/// Oracle that answers each batch by prefixing every source with "DE: ".
///
/// The prompt template must be `{batch}` so the prompt is the JSON array of
/// sources. After `fail_after` successful calls every request fails.
pub struct EchoOracle {
    fail_after: Option<usize>,
    prompts: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl EchoOracle {
    pub fn new() -> Self {
        Self {
            fail_after: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_after(calls: usize) -> Self {
        Self {
            fail_after: Some(calls),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every source that was sent for translation, in order
    pub fn sent_sources(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter_map(|prompt| serde_json::from_str::<Vec<String>>(prompt).ok())
            .flatten()
            .collect()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Oracle for EchoOracle {
    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let mut prompts = self.prompts.lock().unwrap();
        if self.fail_after.is_some_and(|limit| prompts.len() >= limit) {
            return Err(BisubError::Oracle("service went away".to_string()));
        }
        prompts.push(request.prompt.clone());

        let sources: Vec<String> = serde_json::from_str(&request.prompt)?;
        let translations: Vec<String> = sources.iter().map(|source| format!("DE: {}", source)).collect();
        Ok(serde_json::to_string(&translations)?)
    }

    async fn check_connection(&self, _models: &[String]) -> Result<()> {
        Ok(())
    }
}

/// Six raw cues that reformat into four sentence units
pub const RAW_SRT: &str = "1
00:00:01,000 --> 00:00:02,000
I think

2
00:00:02,000 --> 00:00:03,500
we should go.

3
00:00:04,000 --> 00:00:05,000
- Who's there?
- Me.

4
00:00:06,000 --> 00:00:07,000
Open the door.

5
00:00:08,000 --> 00:00:09,000
It's cold

6
00:00:09,000 --> 00:00:10,000
outside!
";
