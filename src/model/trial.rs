//! Per-trial configuration

use crate::knob::KnobValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How many of the last trials in a study train from scratch
const FINAL_TRIALS: usize = 10;

/// Parameter-sharing policy between trials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SharedParamsPolicy {
    /// Train from scratch
    None,
    /// Seed from the best parameters seen by this worker
    LocalBest,
}

/// Plan for one trial, derived from its position in the study
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialPlan {
    /// Knob values forced for this trial, on top of the sampled set
    pub override_knobs: BTreeMap<String, KnobValue>,
    /// Where the trial's starting weights come from
    pub shared_params: SharedParamsPolicy,
    /// Whether the trial's parameters are worth persisting
    pub should_save: bool,
}

impl TrialPlan {
    /// Default plan: search trials seed from the local best and skip
    /// saving; the last [`FINAL_TRIALS`] train from scratch and save.
    pub fn default_for(trial_no: usize, total_trials: usize) -> Self {
        let is_final = total_trials.saturating_sub(trial_no) < FINAL_TRIALS;
        if is_final {
            Self {
                override_knobs: BTreeMap::new(),
                shared_params: SharedParamsPolicy::None,
                should_save: true,
            }
        } else {
            Self {
                override_knobs: BTreeMap::new(),
                shared_params: SharedParamsPolicy::LocalBest,
                should_save: false,
            }
        }
    }

    /// Builder-style knob override
    pub fn with_override(mut self, name: &str, value: KnobValue) -> Self {
        self.override_knobs.insert(name.to_string(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_trials_share_and_skip_save() {
        let plan = TrialPlan::default_for(10, 100);
        assert_eq!(plan.shared_params, SharedParamsPolicy::LocalBest);
        assert!(!plan.should_save);
        assert!(plan.override_knobs.is_empty());
    }

    #[test]
    fn test_final_trials_train_from_scratch() {
        let plan = TrialPlan::default_for(95, 100);
        assert_eq!(plan.shared_params, SharedParamsPolicy::None);
        assert!(plan.should_save);
    }

    #[test]
    fn test_final_window_boundary() {
        // 100 - 90 = 10 is not < 10: still a search trial
        let plan = TrialPlan::default_for(90, 100);
        assert_eq!(plan.shared_params, SharedParamsPolicy::LocalBest);
        // 100 - 91 = 9 < 10: final trial
        let plan = TrialPlan::default_for(91, 100);
        assert_eq!(plan.shared_params, SharedParamsPolicy::None);
    }

    #[test]
    fn test_with_override() {
        let plan = TrialPlan::default_for(95, 100)
            .with_override("max_trial_epochs", KnobValue::Int(300));
        assert_eq!(plan.override_knobs.get("max_trial_epochs"), Some(&KnobValue::Int(300)));
    }

    #[test]
    fn test_trial_plan_serde() {
        let plan = TrialPlan::default_for(0, 100);
        let json = serde_json::to_string(&plan).unwrap();
        let parsed: TrialPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.shared_params, SharedParamsPolicy::LocalBest);
    }
}
