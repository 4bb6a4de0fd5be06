use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep_until, timeout, Instant};

use super::machine::{decide, AttemptOutcome, Transition, MAX_RETRIES};
use super::services::{ComparatorService, GenerationService};
use super::types::{AcceptedScript, ExhaustedReport, GenerationAttempt, GenerationJob};
use crate::core::cancel::CancelToken;
use crate::core::config::settings::LoopSettings;
use crate::core::errors::RagError;
use crate::prompt::generation_prompt;
use crate::text::{clean_generated_script, normalize};

#[derive(Debug, Clone, Copy)]
pub struct LoopPolicy {
    pub attempt_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for LoopPolicy {
    fn default() -> Self {
        Self::from(&LoopSettings::default())
    }
}

impl From<&LoopSettings> for LoopPolicy {
    fn from(settings: &LoopSettings) -> Self {
        Self {
            attempt_timeout: Duration::from_secs(settings.attempt_timeout_secs.max(1)),
            request_timeout: Duration::from_secs(settings.request_timeout_secs.max(1)),
        }
    }
}

/// Drives generate/validate attempts until one is accepted or attempts run out.
pub struct GenerationLoop {
    generator: Arc<dyn GenerationService>,
    comparator: Arc<dyn ComparatorService>,
    policy: LoopPolicy,
}

enum Interrupt {
    Cancelled,
    Deadline,
}

impl GenerationLoop {
    pub fn new(
        generator: Arc<dyn GenerationService>,
        comparator: Arc<dyn ComparatorService>,
        policy: LoopPolicy,
    ) -> Self {
        Self {
            generator,
            comparator,
            policy,
        }
    }

    pub fn policy(&self) -> LoopPolicy {
        self.policy
    }

    /// Runs at most [`MAX_RETRIES`] attempts for `job`.
    ///
    /// The in-flight attempt is dropped as soon as `cancel` fires or the request
    /// deadline passes, so an interrupted attempt never reaches the record.
    pub async fn run(&self, job: &GenerationJob, cancel: &CancelToken) -> Result<AcceptedScript, RagError> {
        let deadline = Instant::now() + self.policy.request_timeout;
        let mut attempts: Vec<GenerationAttempt> = Vec::new();
        let mut hint: Option<String> = None;

        for attempt_index in 1..=MAX_RETRIES {
            if cancel.is_cancelled() {
                return Err(interrupted(Interrupt::Cancelled, attempts));
            }
            if Instant::now() >= deadline {
                return Err(interrupted(Interrupt::Deadline, attempts));
            }

            tracing::info!("Generation attempt {}/{}", attempt_index, MAX_RETRIES);
            let step = self.attempt(attempt_index, job, hint.as_deref());
            let (attempt, outcome) = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!("Generation cancelled during attempt {}", attempt_index);
                    return Err(interrupted(Interrupt::Cancelled, attempts));
                }
                _ = sleep_until(deadline) => {
                    tracing::warn!("Request deadline passed during attempt {}", attempt_index);
                    return Err(interrupted(Interrupt::Deadline, attempts));
                }
                result = step => result,
            };

            let transition = decide(attempt_index, &outcome, hint.as_deref());
            tracing::info!(
                "Attempt {} scored {:.3} -> {:?}",
                attempt_index,
                attempt.comparator_score,
                transition
            );
            attempts.push(attempt);

            match transition {
                Transition::Accept => return Ok(accepted(attempts)),
                Transition::Retry { hint: next } => hint = next,
                Transition::Exhausted => break,
            }
        }

        Err(exhausted(attempts))
    }

    async fn attempt(
        &self,
        attempt_index: u32,
        job: &GenerationJob,
        hint: Option<&str>,
    ) -> (GenerationAttempt, AttemptOutcome) {
        let prompt = generation_prompt(&job.formatted_context, hint, &job.publish_cycle);
        let generated = timeout(self.policy.attempt_timeout, self.generator.complete(&prompt)).await;
        let mut attempt = GenerationAttempt {
            attempt_index,
            prompt,
            ..GenerationAttempt::default()
        };

        let raw = match generated {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => {
                tracing::warn!("Generation failed on attempt {}: {}", attempt_index, err);
                attempt.error = Some(err.to_string());
                return (attempt, AttemptOutcome::GenerationFailed);
            }
            Err(_) => {
                tracing::warn!("Generation timed out on attempt {}", attempt_index);
                attempt.error = Some(format!(
                    "generation timed out after {}s",
                    self.policy.attempt_timeout.as_secs()
                ));
                return (attempt, AttemptOutcome::GenerationFailed);
            }
        };

        let generated_text = clean_generated_script(&raw);
        attempt.raw_response = Some(raw);
        if generated_text.is_empty() {
            tracing::warn!("Generation returned an empty script on attempt {}", attempt_index);
            attempt.error = Some(RagError::GenerationService("empty script".to_string()).to_string());
            return (attempt, AttemptOutcome::GenerationFailed);
        }

        attempt.normalized_response = normalize(&generated_text);
        attempt.generated_text = generated_text;
        let reference = normalize(&job.reference_solution);

        let compared = timeout(
            self.policy.attempt_timeout,
            self.comparator.compare(&reference, &attempt.normalized_response),
        )
        .await;

        match compared {
            Ok(Ok(verdict)) => {
                attempt.comparator_score = verdict.comparator_score;
                attempt.differences = verdict.differences.clone();
                (attempt, AttemptOutcome::Scored(verdict))
            }
            Ok(Err(err)) => {
                tracing::warn!("Comparator failed on attempt {}: {}", attempt_index, err);
                attempt.error = Some(err.to_string());
                (attempt, AttemptOutcome::ComparatorFailed)
            }
            Err(_) => {
                tracing::warn!("Comparator timed out on attempt {}", attempt_index);
                attempt.error = Some(
                    RagError::ComparatorService(format!(
                        "timed out after {}s",
                        self.policy.attempt_timeout.as_secs()
                    ))
                    .to_string(),
                );
                (attempt, AttemptOutcome::ComparatorFailed)
            }
        }
    }
}

fn attempts_used(attempts: &[GenerationAttempt]) -> u32 {
    attempts.len() as u32
}

fn accepted(attempts: Vec<GenerationAttempt>) -> AcceptedScript {
    let last = attempts.last().cloned().unwrap_or_default();
    AcceptedScript {
        generated_text: last.generated_text,
        comparator_score: last.comparator_score,
        differences: last.differences,
        attempts_used: attempts_used(&attempts),
        attempts,
    }
}

fn exhausted(attempts: Vec<GenerationAttempt>) -> RagError {
    RagError::RetriesExhausted(Box::new(ExhaustedReport {
        attempts_used: attempts_used(&attempts),
        last_attempt: attempts.last().cloned().unwrap_or_default(),
        attempts,
    }))
}

fn interrupted(kind: Interrupt, attempts: Vec<GenerationAttempt>) -> RagError {
    let attempts_used = attempts_used(&attempts);
    let last_attempt = attempts.into_iter().last().map(Box::new);
    match kind {
        Interrupt::Cancelled => RagError::Cancelled {
            attempts_used,
            last_attempt,
        },
        Interrupt::Deadline => RagError::RequestTimeout {
            attempts_used,
            last_attempt,
        },
    }
}
