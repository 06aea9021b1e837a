//! The narration pipeline for one combat event: assemble the prompt, race
//! the model against a deadline, parse, substitute names, or fall back.
//!
//! `narrate` is infallible by contract: the game loop always gets a line of
//! text, never an error and never a stall past the deadline.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use skald_core::types::{CombatEvent, NarrationResult};
use skald_llm::{Completion, LlmError};

use crate::context::RetrievalCoordinator;
use crate::prompt::{build_prompt, PLACEHOLDER_ATTACKER, PLACEHOLDER_DEFENDER};

#[derive(Debug, Error)]
pub enum NarrateError {
    #[error("narration deadline elapsed")]
    TimedOut,

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("model response was not the expected JSON: {0}")]
    MalformedResponse(String),

    #[error("model returned an empty narrative")]
    EmptyNarrative,
}

pub struct NarrationOrchestrator {
    coordinator: RetrievalCoordinator,
    gateway: Arc<dyn Completion>,
    deadline: Duration,
}

#[derive(Deserialize, Default)]
struct RawNarration {
    #[serde(default)]
    move_name: String,
    #[serde(default)]
    narrative: String,
    #[serde(default)]
    effect: String,
}

impl NarrationOrchestrator {
    pub fn new(
        coordinator: RetrievalCoordinator,
        gateway: Arc<dyn Completion>,
        deadline: Duration,
    ) -> Self {
        Self {
            coordinator,
            gateway,
            deadline,
        }
    }

    /// Narrate one combat exchange. Always returns displayable text within
    /// the configured deadline; any failure produces the deterministic
    /// fallback line instead.
    pub async fn narrate(&self, event: &CombatEvent) -> String {
        self.narrate_with_deadline(event, self.deadline).await
    }

    pub async fn narrate_with_deadline(&self, event: &CombatEvent, deadline: Duration) -> String {
        match self.generate(event, "", deadline).await {
            Ok(result) => format!("{} ({})", result.narrative, result.effect),
            Err(e) => {
                tracing::warn!(
                    attacker = %event.attacker.name,
                    defender = %event.defender.name,
                    error = %e,
                    "narration failed, using fallback"
                );
                fallback_line(event)
            }
        }
    }

    /// Opportunistic variant for non-critical embellishment: extra caller
    /// context is woven into the prompt, and any failure yields an empty
    /// string so the caller simply shows nothing.
    pub async fn narrate_with_context(&self, event: &CombatEvent, extra: &str) -> String {
        match self.generate(event, extra, self.deadline).await {
            Ok(result) => format!("{} ({})", result.narrative, result.effect),
            Err(e) => {
                tracing::debug!(error = %e, "opportunistic narration failed");
                String::new()
            }
        }
    }

    /// The full pipeline with structured output, for callers that render
    /// the fields themselves.
    pub async fn generate(
        &self,
        event: &CombatEvent,
        extra_context: &str,
        deadline: Duration,
    ) -> Result<NarrationResult, NarrateError> {
        let attacker_ctx = self
            .coordinator
            .character_context(&event.attacker, "attacker")
            .await;
        let defender_ctx = self
            .coordinator
            .character_context(&event.defender, "defender")
            .await;
        let additional = if extra_context.is_empty() {
            self.coordinator
                .battle_context(&event.attacker, &event.defender)
                .await
        } else {
            extra_context.to_string()
        };
        let segments = build_prompt(event, &attacker_ctx, &defender_ctx, &additional);

        // losing the race drops the in-flight request, which cancels it
        let raw = tokio::time::timeout(deadline, self.gateway.complete(&segments))
            .await
            .map_err(|_| NarrateError::TimedOut)??;

        let parsed = parse_narration(&raw)?;
        let attacker = event.attacker.name.as_str();
        let defender = event.defender.name.as_str();
        Ok(NarrationResult {
            move_name: substitute(&parsed.move_name, attacker, defender),
            narrative: substitute(&parsed.narrative, attacker, defender),
            effect: substitute(&parsed.effect, attacker, defender),
        })
    }
}

/// The deterministic last-resort line. Pure string formatting; cannot fail.
pub fn fallback_line(event: &CombatEvent) -> String {
    if event.hit {
        format!(
            "{} struck {}! (dealt {} damage)",
            event.attacker.name, event.defender.name, event.damage
        )
    } else {
        format!(
            "{}'s attack was evaded by {}! (no damage)",
            event.attacker.name, event.defender.name
        )
    }
}

fn parse_narration(raw: &str) -> Result<RawNarration, NarrateError> {
    let cleaned = strip_fences(raw);
    let parsed: RawNarration = serde_json::from_str(cleaned)
        .map_err(|e| NarrateError::MalformedResponse(e.to_string()))?;
    if parsed.narrative.trim().is_empty() {
        return Err(NarrateError::EmptyNarrative);
    }
    Ok(parsed)
}

/// Models wrap JSON in ``` fences despite instructions; tolerate it.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches('\n')
        .trim_end_matches('`')
        .trim()
}

/// Replace each placeholder occurrence exactly once, left to right.
/// Substituted names are never rescanned, so a participant name that
/// happens to contain placeholder syntax cannot trigger a second pass.
fn substitute(text: &str, attacker: &str, defender: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let a = rest.find(PLACEHOLDER_ATTACKER);
        let d = rest.find(PLACEHOLDER_DEFENDER);
        let (idx, token, name) = match (a, d) {
            (Some(ai), Some(di)) => {
                if ai <= di {
                    (ai, PLACEHOLDER_ATTACKER, attacker)
                } else {
                    (di, PLACEHOLDER_DEFENDER, defender)
                }
            }
            (Some(ai), None) => (ai, PLACEHOLDER_ATTACKER, attacker),
            (None, Some(di)) => (di, PLACEHOLDER_DEFENDER, defender),
            (None, None) => break,
        };
        out.push_str(&rest[..idx]);
        out.push_str(name);
        rest = &rest[idx + token.len()..];
    }
    out.push_str(rest);
    out
}
