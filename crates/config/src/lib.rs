//! Configuration module for the residency scheduling engine.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Default weights for the Tier-3 objective: α·Gini(hours) + β·Gini(calls) +
/// γ·handoff_count + δ·fragmentation + ε·preference_deficit +
/// ζ·utilization_overshoot.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectiveWeights {
    pub hours_equity: f64,
    pub call_equity: f64,
    pub continuity: f64,
    pub fragmentation: f64,
    pub preference: f64,
    pub utilization_overshoot: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            hours_equity: 1.0,
            call_equity: 1.0,
            continuity: 0.5,
            fragmentation: 0.25,
            preference: 0.75,
            utilization_overshoot: 1.5,
        }
    }
}

/// Utilization classification thresholds (spec §9 open question: defaults
/// made configurable rather than hardcoded).
#[derive(Debug, Clone, Deserialize)]
pub struct UtilizationThresholds {
    pub yellow: f64,
    pub orange: f64,
    pub red: f64,
    pub black: f64,
}

impl Default for UtilizationThresholds {
    fn default() -> Self {
        Self {
            yellow: 0.70,
            orange: 0.80,
            red: 0.85,
            black: 0.95,
        }
    }
}

/// Tier-3 equity targets used both as optimization signals and as the
/// relaxation order's first fallback (spec §4.B "Relaxation order").
#[derive(Debug, Clone, Deserialize)]
pub struct EquityTargets {
    pub workload_gini: f64,
    pub call_gini: f64,
}

impl Default for EquityTargets {
    fn default() -> Self {
        Self {
            workload_gini: 0.15,
            call_gini: 0.10,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Weighted Tier-3 objective coefficients; externally tunable per spec §4.C.
    pub objective_weights: ObjectiveWeights,
    /// Green/Yellow/Orange/Red/Black utilization boundaries.
    pub utilization_thresholds: UtilizationThresholds,
    /// Tier-3 equity targets (Gini coefficients).
    pub equity_targets: EquityTargets,
    /// Duty-hour weight per rotation category, keyed by category name.
    /// Spec §9 open question: the source material gives no authoritative
    /// table, so this is a configuration input with a plausible default.
    pub rotation_hour_weights: HashMap<String, f64>,
    /// Required continuity clinic half-days per week, keyed by PGY level
    /// (spec §4.B Tier-2 "weekly continuity clinic": "the PGY-level-specific
    /// count" with no authoritative table given, so this is a configuration
    /// input mirroring `rotation_hour_weights`).
    pub continuity_clinic_half_days: HashMap<u8, u32>,
    /// Swap rollback window (spec §4.D: 24 hours).
    pub rollback_window: Duration,
    /// Default solver timeout when a request does not specify one (spec §4.C:
    /// 5-300 seconds).
    pub default_solver_timeout: Duration,
    /// Solver heartbeat / cancellation-check period (spec §5: default 1s).
    pub heartbeat_period: Duration,
    /// Hours added to onboarding for supplemental recovery strategies
    /// (spec §4.E recovery planning: default 32 hours).
    pub supplemental_onboarding_hours: f64,
    /// Auto-detection window after a swap commit (spec §4.D: 5 minutes).
    pub auto_detection_window: Duration,
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to
    /// documented defaults for every tunable that spec §9 leaves open.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env_var("DATABASE_URL")?,
            objective_weights: ObjectiveWeights::default(),
            utilization_thresholds: UtilizationThresholds::default(),
            equity_targets: EquityTargets::default(),
            rotation_hour_weights: default_rotation_hour_weights(),
            continuity_clinic_half_days: default_continuity_clinic_half_days(),
            rollback_window: Duration::from_secs(env_var_or_parse(
                "ROLLBACK_WINDOW_SECS",
                24 * 3600,
            )?),
            default_solver_timeout: Duration::from_secs(env_var_or_parse(
                "DEFAULT_SOLVER_TIMEOUT_SECS",
                60,
            )?),
            heartbeat_period: Duration::from_millis(env_var_or_parse(
                "HEARTBEAT_PERIOD_MS",
                1000,
            )?),
            supplemental_onboarding_hours: env_var_or_parse_f64(
                "SUPPLEMENTAL_ONBOARDING_HOURS",
                32.0,
            )?,
            auto_detection_window: Duration::from_secs(env_var_or_parse(
                "AUTO_DETECTION_WINDOW_SECS",
                5 * 60,
            )?),
        })
    }

    /// A fully-defaulted configuration for downstream crates' unit tests,
    /// which exercise pure logic against an in-memory `ScheduleView` and
    /// never touch `database_url`.
    pub fn default_for_tests() -> Self {
        Self {
            database_url: "postgres://localhost/test".to_string(),
            objective_weights: ObjectiveWeights::default(),
            utilization_thresholds: UtilizationThresholds::default(),
            equity_targets: EquityTargets::default(),
            rotation_hour_weights: default_rotation_hour_weights(),
            continuity_clinic_half_days: default_continuity_clinic_half_days(),
            rollback_window: Duration::from_secs(24 * 3600),
            default_solver_timeout: Duration::from_secs(60),
            heartbeat_period: Duration::from_millis(1000),
            supplemental_onboarding_hours: 32.0,
            auto_detection_window: Duration::from_secs(5 * 60),
        }
    }
}

fn default_rotation_hour_weights() -> HashMap<String, f64> {
    let mut weights = HashMap::new();
    weights.insert("Inpatient".to_string(), 12.0);
    weights.insert("Clinic".to_string(), 8.0);
    weights.insert("NightFloat".to_string(), 12.0);
    weights.insert("Call".to_string(), 14.0);
    weights.insert("Procedures".to_string(), 10.0);
    weights.insert("Emergency".to_string(), 10.0);
    weights
}

fn default_continuity_clinic_half_days() -> HashMap<u8, u32> {
    let mut counts = HashMap::new();
    counts.insert(1, 1);
    counts.insert(2, 2);
    counts.insert(3, 2);
    counts
}

fn env_var(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn env_var_or_parse(name: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), raw)),
        Err(_) => Ok(default),
    }
}

fn env_var_or_parse_f64(name: &str, default: f64) -> Result<f64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_or_parse_uses_default() {
        let val = env_var_or_parse("NON_EXISTENT_VAR_12345", 42).unwrap();
        assert_eq!(val, 42);
    }

    #[test]
    fn test_default_objective_weights_are_positive() {
        let weights = ObjectiveWeights::default();
        assert!(weights.hours_equity > 0.0);
        assert!(weights.utilization_overshoot > 0.0);
    }

    #[test]
    fn test_utilization_thresholds_are_monotonic() {
        let t = UtilizationThresholds::default();
        assert!(t.yellow < t.orange);
        assert!(t.orange < t.red);
        assert!(t.red < t.black);
    }
}
