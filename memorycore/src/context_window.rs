//! Zone logic for context-window usage.

use crate::error::{MemoryError, Result};
use crate::optimizer::Profile;

/// Usage band of a context window, recomputed on every estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// ≤ 50% usage — no action.
    Green,
    /// 50–70% — pruning and artifact-registry compaction apply on next build.
    Yellow,
    /// 70–85% — checkpoint and refresh before the next outgoing call.
    Orange,
    /// > 85% — refuse new calls until a checkpoint + refresh happens.
    Red,
}

impl Zone {
    /// The refresh threshold is inclusive: exactly 70% usage is already
    /// orange, and red begins strictly above 85%.
    fn from_usage(used_pct: f64) -> Zone {
        if used_pct <= 0.50 {
            Zone::Green
        } else if used_pct < 0.70 {
            Zone::Yellow
        } else if used_pct <= 0.85 {
            Zone::Orange
        } else {
            Zone::Red
        }
    }
}

/// Token-count estimator and zone tracker for a single context window.
pub struct ContextWindowManager {
    context_window: u32,
}

/// `chars / 4` with a 10% safety margin, the approximation named for
/// models that don't expose a tokenizer.
pub fn estimate_tokens(text: &str) -> u32 {
    let raw = text.chars().count() as f64 / 4.0;
    (raw * 1.1).ceil() as u32
}

impl ContextWindowManager {
    pub fn new(context_window: u32) -> Self {
        Self { context_window }
    }

    pub fn context_window(&self) -> u32 {
        self.context_window
    }

    /// Fraction of the window consumed by `used_tokens`.
    pub fn usage(&self, used_tokens: u32) -> f64 {
        if self.context_window == 0 {
            return 1.0;
        }
        used_tokens as f64 / self.context_window as f64
    }

    pub fn zone(&self, used_tokens: u32) -> Zone {
        Zone::from_usage(self.usage(used_tokens))
    }

    /// Called before issuing an outgoing call. Returns `Err(ContextCritical)`
    /// in the red zone — the caller must checkpoint and refresh first.
    pub fn guard_outgoing_call(&self, used_tokens: u32) -> Result<Zone> {
        let zone = self.zone(used_tokens);
        if zone == Zone::Red {
            return Err(MemoryError::ContextCritical {
                used_pct: self.usage(used_tokens) * 100.0,
            });
        }
        Ok(zone)
    }

    /// Whether the profile's usage-triggered checkpoint threshold has been crossed.
    pub fn should_checkpoint(&self, used_tokens: u32, profile: &Profile) -> bool {
        self.usage(used_tokens) >= profile.ckpt_at_usage
    }
}
