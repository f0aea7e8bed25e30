use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{DoseError, DoseResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientParameters {
    pub bsa: f64,                  // Body surface area (m²)
    pub weight: f64,               // kg
    pub height: f64,               // cm
    pub age: f64,                  // years
    pub sex: Sex,
    pub creatinine_clearance: f64, // mL/min
    #[serde(default)]
    pub use_bsa_cap: bool,
    #[serde(default = "default_bsa_cap")]
    pub bsa_cap: f64,
}

fn default_bsa_cap() -> f64 {
    2.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    Other,
}

impl PatientParameters {
    pub fn from_file<P: AsRef<Path>>(path: P) -> DoseResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let patient: PatientParameters = serde_json::from_str(&content)?;
        patient.validate()?;
        Ok(patient)
    }

    pub fn validate(&self) -> DoseResult<()> {
        // bsa <= 0 is a legal (empty-form) state handled by the engine reset,
        // so it is not rejected here.
        for (name, value) in [
            ("bsa", self.bsa),
            ("weight", self.weight),
            ("height", self.height),
            ("age", self.age),
            ("creatinineClearance", self.creatinine_clearance),
            ("bsaCap", self.bsa_cap),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DoseError::InvalidPatient(
                    format!("{} must be a non-negative number, got {}", name, value)
                ));
            }
        }

        Ok(())
    }

    /// BSA fed into the dose formulas: capped iff capping is enabled.
    pub fn effective_bsa(&self) -> f64 {
        if self.use_bsa_cap {
            self.bsa.min(self.bsa_cap)
        } else {
            self.bsa
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn patient() -> PatientParameters {
        PatientParameters {
            bsa: 2.3,
            weight: 95.0,
            height: 182.0,
            age: 61.0,
            sex: Sex::Male,
            creatinine_clearance: 80.0,
            use_bsa_cap: false,
            bsa_cap: 2.0,
        }
    }

    #[test]
    fn test_effective_bsa_uncapped() {
        let p = patient();
        assert_relative_eq!(p.effective_bsa(), 2.3);
    }

    #[test]
    fn test_effective_bsa_applies_cap_only_when_enabled() {
        let mut p = patient();
        p.use_bsa_cap = true;
        assert_relative_eq!(p.effective_bsa(), 2.0);

        p.bsa = 1.7;
        assert_relative_eq!(p.effective_bsa(), 1.7);
    }

    #[test]
    fn test_validate_rejects_negative_values() {
        let mut p = patient();
        p.weight = -1.0;
        assert!(matches!(p.validate(), Err(DoseError::InvalidPatient(_))));
    }

    #[test]
    fn test_zero_bsa_is_valid() {
        let mut p = patient();
        p.bsa = 0.0;
        assert!(p.validate().is_ok());
    }
}
