//! Adaptive optimization profile, selected from a declared context window.

use serde::{Deserialize, Serialize};

/// A tuned set of working-memory bounds and checkpoint cadence for a
/// particular context-window size class.
///
/// Selected once at startup by [`Profile::for_window`] and held for the
/// life of the [`crate::MemoryCore`] it configures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: ProfileName,
    /// Maximum number of operations retained in working memory.
    pub max_operations: usize,
    /// Maximum fraction of the context window working memory may occupy.
    pub max_tokens_pct: f64,
    /// Checkpoint every N operations, in addition to usage-triggered ones.
    pub ckpt_every_ops: usize,
    /// Usage fraction at which a checkpoint is forced regardless of operation count.
    pub ckpt_at_usage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileName {
    UltraAggressive,
    Aggressive,
    BalancedAggressive,
    Balanced,
    Minimal,
}

impl Profile {
    const ULTRA_AGGRESSIVE: Profile = Profile {
        name: ProfileName::UltraAggressive,
        max_operations: 10,
        max_tokens_pct: 0.05,
        ckpt_every_ops: 20,
        ckpt_at_usage: 0.70,
    };
    const AGGRESSIVE: Profile = Profile {
        name: ProfileName::Aggressive,
        max_operations: 20,
        max_tokens_pct: 0.07,
        ckpt_every_ops: 50,
        ckpt_at_usage: 0.70,
    };
    const BALANCED_AGGRESSIVE: Profile = Profile {
        name: ProfileName::BalancedAggressive,
        max_operations: 40,
        max_tokens_pct: 0.08,
        ckpt_every_ops: 80,
        ckpt_at_usage: 0.75,
    };
    const BALANCED: Profile = Profile {
        name: ProfileName::Balanced,
        max_operations: 75,
        max_tokens_pct: 0.10,
        ckpt_every_ops: 100,
        ckpt_at_usage: 0.80,
    };
    const MINIMAL: Profile = Profile {
        name: ProfileName::Minimal,
        max_operations: 100,
        max_tokens_pct: 0.10,
        ckpt_every_ops: 200,
        ckpt_at_usage: 0.85,
    };

    /// Select a profile from a declared or auto-detected context window, in tokens.
    pub fn for_window(context_window: u32) -> Profile {
        match context_window {
            0..=4_000 => Self::ULTRA_AGGRESSIVE,
            4_001..=32_000 => Self::AGGRESSIVE,
            32_001..=100_000 => Self::BALANCED_AGGRESSIVE,
            100_001..=250_000 => Self::BALANCED,
            _ => Self::MINIMAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_pick_expected_profile() {
        assert_eq!(Profile::for_window(4_000).name, ProfileName::UltraAggressive);
        assert_eq!(Profile::for_window(4_001).name, ProfileName::Aggressive);
        assert_eq!(Profile::for_window(32_000).name, ProfileName::Aggressive);
        assert_eq!(Profile::for_window(32_001).name, ProfileName::BalancedAggressive);
        assert_eq!(Profile::for_window(100_000).name, ProfileName::BalancedAggressive);
        assert_eq!(Profile::for_window(100_001).name, ProfileName::Balanced);
        assert_eq!(Profile::for_window(250_000).name, ProfileName::Balanced);
        assert_eq!(Profile::for_window(250_001).name, ProfileName::Minimal);
    }

    #[test]
    fn checkpoint_usage_increases_with_window() {
        let small = Profile::for_window(2_000);
        let large = Profile::for_window(1_000_000);
        assert!(small.ckpt_at_usage <= large.ckpt_at_usage);
    }
}
