// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Context-window planner: decides `num_ctx` for the next upstream call
//! from the session's current configuration, the model's advertised
//! maximum, and usage from the previous exchange.

use crate::session::{AdjustmentReason, ContextWindowConfig};

/// Tokens consumed by the previous exchange, as reported on the terminal
/// chat chunk.
#[derive(Debug, Clone, Copy)]
pub struct LastUsage {
    pub prompt_eval_count: u32,
    pub eval_count: u32,
}

impl LastUsage {
    fn total(&self) -> u32 {
        self.prompt_eval_count + self.eval_count
    }
}

fn safe_ceiling(model_max_context: u32) -> u32 {
    ((model_max_context as f64) * 0.9).floor() as u32
}

/// Decides the window for the next call and the reason that decision was
/// made. Does not mutate `config` — callers record a non-`NoAdjustment`
/// result via [`ContextWindowConfig::record_adjustment`].
pub fn plan(
    config: &ContextWindowConfig,
    model_max_context: u32,
    has_exchanged_messages: bool,
    last_usage: Option<LastUsage>,
    model_changed: bool,
) -> (u32, AdjustmentReason) {
    let ceiling = safe_ceiling(model_max_context);

    if config.manual_override {
        return (config.current_window, AdjustmentReason::ManualOverride);
    }

    if !has_exchanged_messages {
        return (ceiling.min(8192), AdjustmentReason::InitialSetup);
    }

    if let Some(usage) = last_usage {
        let threshold = (config.current_window as f64) * 0.5;
        if (usage.total() as f64) > threshold {
            let scaled = ((usage.total() as f64) * 1.5).ceil() as u32;
            return (ceiling.min(scaled), AdjustmentReason::UsageThreshold);
        }
    }

    if model_changed {
        return (ceiling.min(8192), AdjustmentReason::ModelChange);
    }

    (config.current_window, AdjustmentReason::NoAdjustment)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ContextWindowConfig {
        ContextWindowConfig::default()
    }

    #[test]
    fn manual_override_keeps_current_window() {
        let mut cfg = base_config();
        cfg.manual_override = true;
        cfg.current_window = 2048;
        let (window, reason) = plan(&cfg, 32768, true, None, false);
        assert_eq!(window, 2048);
        assert_eq!(reason, AdjustmentReason::ManualOverride);
    }

    #[test]
    fn no_history_yet_uses_initial_setup() {
        let cfg = base_config();
        let (window, reason) = plan(&cfg, 32768, false, None, false);
        assert_eq!(window, 8192);
        assert_eq!(reason, AdjustmentReason::InitialSetup);
    }

    #[test]
    fn initial_setup_respects_low_safe_ceiling() {
        let cfg = base_config();
        let (window, reason) = plan(&cfg, 4096, false, None, false);
        assert_eq!(window, 3686); // floor(4096*0.9)
        assert_eq!(reason, AdjustmentReason::InitialSetup);
    }

    #[test]
    fn heavy_usage_scales_window_by_1_5x() {
        let cfg = base_config();
        let usage = LastUsage { prompt_eval_count: 3000, eval_count: 2000 }; // 5000 > 0.5*8192
        let (window, reason) = plan(&cfg, 32768, true, Some(usage), false);
        assert_eq!(window, 7500); // ceil(5000*1.5)
        assert_eq!(reason, AdjustmentReason::UsageThreshold);
    }

    #[test]
    fn heavy_usage_clamped_to_safe_ceiling() {
        let cfg = base_config();
        let usage = LastUsage { prompt_eval_count: 20000, eval_count: 20000 };
        let (window, reason) = plan(&cfg, 32768, true, Some(usage), false);
        assert_eq!(window, 29491); // floor(32768*0.9)
        assert_eq!(reason, AdjustmentReason::UsageThreshold);
    }

    #[test]
    fn light_usage_falls_through_to_model_change_check() {
        let cfg = base_config();
        let usage = LastUsage { prompt_eval_count: 100, eval_count: 100 };
        let (window, reason) = plan(&cfg, 32768, true, Some(usage), true);
        assert_eq!(window, 8192);
        assert_eq!(reason, AdjustmentReason::ModelChange);
    }

    #[test]
    fn no_usage_no_model_change_is_no_adjustment() {
        let cfg = base_config();
        let (window, reason) = plan(&cfg, 32768, true, None, false);
        assert_eq!(window, 8192);
        assert_eq!(reason, AdjustmentReason::NoAdjustment);
    }
}
