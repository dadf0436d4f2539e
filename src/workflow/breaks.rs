//! Break-condition evaluation for detected loops.
//!
//! A loop exits when its explicit condition fires, its per-loop iteration
//! ceiling is reached, or its output stagnates. With no condition and no
//! stagnation the loop keeps running and the global safety ceilings apply.

use serde::{Deserialize, Serialize};

use crate::workflow::loops::LoopMetadata;

/// Numeric comparison operator for threshold conditions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CmpOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
}

/// User-configured condition attached to a loop-closing connection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BreakCondition {
    /// Exit when the latest output contains the given substring.
    Contains {
        value: String,
    },
    /// Exit when the latest output equals the given string exactly.
    Equals {
        value: String,
    },
    /// Exit when the latest output parses as a number satisfying the comparison.
    Threshold {
        op: CmpOp,
        value: f64,
    },
}

/// Break configuration carried by a loop-closing connection.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BreakConfig {
    #[serde(default)]
    pub condition: Option<BreakCondition>,
    /// per-loop iteration ceiling, independent of the global sweep ceiling
    #[serde(default)]
    pub max_iterations: Option<u32>,
}

/// Outcome of a break-condition evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakDecision {
    pub should_exit: bool,
    pub reason: String,
}

impl BreakDecision {
    fn exit(reason: impl Into<String>) -> Self {
        Self {
            should_exit: true,
            reason: reason.into(),
        }
    }

    fn proceed() -> Self {
        Self {
            should_exit: false,
            reason: String::new(),
        }
    }
}

impl BreakCondition {
    pub fn matches(
        &self,
        latest: &str,
    ) -> bool {
        match self {
            BreakCondition::Contains {
                value,
            } => latest.contains(value.as_str()),
            BreakCondition::Equals {
                value,
            } => latest == value,
            BreakCondition::Threshold {
                op,
                value,
            } => match latest.trim().parse::<f64>() {
                Ok(actual) => match op {
                    CmpOp::Gt => actual > *value,
                    CmpOp::Lt => actual < *value,
                    CmpOp::Ge => actual >= *value,
                    CmpOp::Le => actual <= *value,
                    CmpOp::Eq => actual == *value,
                },
                Err(_) => false,
            },
        }
    }
}

/// Decide whether a loop should terminate given its run history and the
/// latest output produced by one of its member nodes.
///
/// `latest` is evaluated before it is appended to the loop history, so
/// stagnation compares against strictly prior iterations.
pub fn should_exit_loop(
    meta: &LoopMetadata,
    latest: &str,
) -> BreakDecision {
    if let Some(config) = &meta.config {
        if let Some(condition) = &config.condition {
            if condition.matches(latest) {
                return BreakDecision::exit(format!("break condition satisfied: {:?}", condition));
            }
        }
        if let Some(max) = config.max_iterations {
            if meta.current_iteration >= max {
                return BreakDecision::exit(format!("loop iteration limit of {} reached", max));
            }
        }
    }

    // Implicit stagnation: byte-identical repeat of a prior output.
    if !latest.is_empty() && meta.history.iter().any(|prior| prior == latest) {
        return BreakDecision::exit("output stagnated (identical to a previous iteration)");
    }

    BreakDecision::proceed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_with(
        config: Option<BreakConfig>,
        history: Vec<&str>,
        iteration: u32,
    ) -> LoopMetadata {
        let mut meta = LoopMetadata::new("loop-0".to_string(), ["a".to_string(), "b".to_string()].into(), vec![], config);
        meta.current_iteration = iteration;
        for entry in history {
            meta.push_history(entry.to_string());
        }
        meta
    }

    #[test]
    fn test_contains_condition() {
        let config = BreakConfig {
            condition: Some(BreakCondition::Contains {
                value: "DONE".to_string(),
            }),
            max_iterations: None,
        };
        let meta = meta_with(Some(config), vec![], 0);

        assert!(should_exit_loop(&meta, "task is DONE now").should_exit);
        assert!(!should_exit_loop(&meta, "still working").should_exit);
    }

    #[test]
    fn test_equals_condition_is_exact() {
        let config = BreakConfig {
            condition: Some(BreakCondition::Equals {
                value: "stop".to_string(),
            }),
            max_iterations: None,
        };
        let meta = meta_with(Some(config), vec![], 0);

        assert!(should_exit_loop(&meta, "stop").should_exit);
        assert!(!should_exit_loop(&meta, "stop now").should_exit);
    }

    #[test]
    fn test_threshold_condition() {
        let config = BreakConfig {
            condition: Some(BreakCondition::Threshold {
                op: CmpOp::Ge,
                value: 10.0,
            }),
            max_iterations: None,
        };
        let meta = meta_with(Some(config), vec![], 0);

        assert!(should_exit_loop(&meta, "12.5").should_exit);
        assert!(should_exit_loop(&meta, " 10 ").should_exit);
        assert!(!should_exit_loop(&meta, "9").should_exit);
        assert!(!should_exit_loop(&meta, "not a number").should_exit);
    }

    #[test]
    fn test_per_loop_iteration_ceiling() {
        let config = BreakConfig {
            condition: None,
            max_iterations: Some(3),
        };
        assert!(!should_exit_loop(&meta_with(Some(config.clone()), vec![], 2), "x2").should_exit);
        assert!(should_exit_loop(&meta_with(Some(config), vec![], 3), "x3").should_exit);
    }

    #[test]
    fn test_stagnation_on_identical_output() {
        let meta = meta_with(None, vec!["alpha", "beta"], 2);
        assert!(should_exit_loop(&meta, "alpha").should_exit);
        assert!(!should_exit_loop(&meta, "gamma").should_exit);
    }

    #[test]
    fn test_empty_output_never_counts_as_stagnation() {
        let meta = meta_with(None, vec![""], 1);
        assert!(!should_exit_loop(&meta, "").should_exit);
    }

    #[test]
    fn test_unconfigured_varying_loop_continues() {
        let meta = meta_with(None, vec!["one", "two"], 2);
        let decision = should_exit_loop(&meta, "three");
        assert!(!decision.should_exit);
        assert!(decision.reason.is_empty());
    }
}
