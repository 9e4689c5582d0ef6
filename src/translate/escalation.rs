use crate::config::TranslateConfig;

/// Model and temperature used for an attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ModelChoice {
    pub model: String,
    pub temperature: f32,
}

/// Where a batch stands in the retry/fallback escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Primary { attempt: u32 },
    Fallback { attempt: u32 },
    Success,
    Fatal,
}

/// Result of validating one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Valid,
    Invalid,
}

/// Retry the primary model, then escalate to the fallback, then give up
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    primary: ModelChoice,
    fallback: Option<ModelChoice>,
    max_attempts: u32,
}

impl EscalationPolicy {
    pub fn new(primary: ModelChoice, fallback: Option<ModelChoice>, max_attempts: u32) -> Self {
        Self {
            primary,
            fallback,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &TranslateConfig) -> Self {
        let primary = ModelChoice {
            model: config.model.clone(),
            temperature: config.temperature,
        };
        let fallback = config.distinct_fallback().map(|model| ModelChoice {
            model: model.to_string(),
            temperature: config.fallback_temperature,
        });
        Self::new(primary, fallback, config.max_attempts)
    }

    pub fn start(&self) -> AttemptState {
        AttemptState::Primary { attempt: 1 }
    }

    /// Model to use in `state`; `None` once the state is terminal
    pub fn model_for(&self, state: &AttemptState) -> Option<&ModelChoice> {
        match state {
            AttemptState::Primary { .. } => Some(&self.primary),
            AttemptState::Fallback { .. } => self.fallback.as_ref(),
            AttemptState::Success | AttemptState::Fatal => None,
        }
    }

    pub fn next(&self, state: &AttemptState, outcome: Outcome) -> AttemptState {
        match (*state, outcome) {
            (AttemptState::Success, _) => AttemptState::Success,
            (AttemptState::Fatal, _) => AttemptState::Fatal,
            (_, Outcome::Valid) => AttemptState::Success,
            (AttemptState::Primary { attempt }, Outcome::Invalid) if attempt < self.max_attempts => {
                AttemptState::Primary { attempt: attempt + 1 }
            }
            (AttemptState::Primary { .. }, Outcome::Invalid) if self.fallback.is_some() => {
                AttemptState::Fallback { attempt: 1 }
            }
            (AttemptState::Fallback { attempt }, Outcome::Invalid) if attempt < self.max_attempts => {
                AttemptState::Fallback { attempt: attempt + 1 }
            }
            (_, Outcome::Invalid) => AttemptState::Fatal,
        }
    }

    /// Attempts made before a batch is declared fatal
    pub fn total_attempts(&self) -> u32 {
        if self.fallback.is_some() {
            self.max_attempts * 2
        } else {
            self.max_attempts
        }
    }
}
