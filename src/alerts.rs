use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::error::DoseResult;
use crate::patient::PatientParameters;
use crate::regimen::Regimen;

/// Result of a dose-limit check for one drug. Absence of an alert
/// (`Option::None` on the dose state) means "not exceeded".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoseAlert {
    pub is_exceeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Boundary to the dose-limit evaluator. The rule content is not part of
/// this engine; errors from an implementation are treated as "no alert".
pub trait DoseLimitAdvisor {
    fn check(&self, drug_name: &str, dose: f64, schedule: &str) -> DoseResult<DoseAlert>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyAlert {
    pub severity: AlertSeverity,
    pub message: String,
}

/// Boundary to the comprehensive safety evaluator (interactions, biomarker
/// contraindications, ...). Consumed opaquely; failure means no alerts.
pub trait SafetyEngine {
    fn comprehensive_check(
        &self,
        regimen: &Regimen,
        patient: &PatientParameters,
        calculated_doses: &[(String, f64)],
        biomarker_status: Option<&str>,
        current_medications: &[String],
    ) -> DoseResult<Vec<SafetyAlert>>;
}

/// Reference advisor backed by a static per-administration ceiling table,
/// so the engine runs standalone without an external rule service.
pub struct ThresholdLimitAdvisor {
    limits: HashMap<String, f64>, // mg per administration
}

impl ThresholdLimitAdvisor {
    pub fn new(limits: HashMap<String, f64>) -> Self {
        Self { limits }
    }
}

impl Default for ThresholdLimitAdvisor {
    fn default() -> Self {
        let mut limits = HashMap::new();
        limits.insert("Vincristine".to_string(), 2.0);
        limits.insert("Bleomycin".to_string(), 30.0);
        limits.insert("Cisplatin".to_string(), 200.0);
        limits.insert("Doxorubicin".to_string(), 150.0);
        Self { limits }
    }
}

impl DoseLimitAdvisor for ThresholdLimitAdvisor {
    fn check(&self, drug_name: &str, dose: f64, _schedule: &str) -> DoseResult<DoseAlert> {
        match self.limits.get(drug_name) {
            Some(&limit) if dose > limit => Ok(DoseAlert {
                is_exceeded: true,
                warning: Some(format!(
                    "{} dose {:.1} mg exceeds the {:.1} mg limit",
                    drug_name, dose, limit
                )),
                suggested_action: Some(format!("Reduce to at most {:.1} mg", limit)),
            }),
            _ => Ok(DoseAlert {
                is_exceeded: false,
                warning: None,
                suggested_action: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_advisor_flags_exceeded_dose() {
        let advisor = ThresholdLimitAdvisor::default();
        let alert = advisor.check("Vincristine", 2.8, "q3w").unwrap();

        assert!(alert.is_exceeded);
        assert!(alert.warning.unwrap().contains("2.8"));
        assert!(alert.suggested_action.unwrap().contains("2.0"));
    }

    #[test]
    fn test_threshold_advisor_passes_dose_within_limit() {
        let advisor = ThresholdLimitAdvisor::default();
        let alert = advisor.check("Vincristine", 1.4, "q3w").unwrap();

        assert!(!alert.is_exceeded);
        assert!(alert.warning.is_none());
    }

    #[test]
    fn test_threshold_advisor_ignores_unknown_drug() {
        let advisor = ThresholdLimitAdvisor::default();
        let alert = advisor.check("Paclitaxel", 9999.0, "q3w").unwrap();

        assert!(!alert.is_exceeded);
    }
}
