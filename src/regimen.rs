use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use crate::error::{DoseError, DoseResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Regimen {
    pub id: String,
    pub name: String,
    pub schedule: String,
    pub drugs: Vec<DrugDefinition>,
}

/// A single drug as defined by the regimen catalog. Immutable once loaded;
/// everything the clinician can change lives in the editable dose state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugDefinition {
    pub name: String,
    /// Dosing expression: a numeric string ("75") or "AUC <n>".
    pub dosage: String,
    #[serde(default)]
    pub unit: DoseUnit,
    pub route: String,
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub drug_class: Option<String>,
    #[serde(default)]
    pub administration_duration: Option<String>,
    #[serde(default)]
    pub dilution: Option<String>,
    #[serde(default)]
    pub available_solvents: Vec<String>,
    #[serde(default)]
    pub available_volumes: Vec<String>,
}

/// Dosing unit selecting the calculation formula. Unknown unit strings fall
/// through to `Plain` (fixed-dose) rather than failing the whole catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DoseUnit {
    MgPerM2,
    MgPerKg,
    Auc,
    #[default]
    Plain,
}

impl DoseUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoseUnit::MgPerM2 => "mg/m²",
            DoseUnit::MgPerKg => "mg/kg",
            DoseUnit::Auc => "AUC",
            DoseUnit::Plain => "plain",
        }
    }
}

impl From<String> for DoseUnit {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "mg/m²" => DoseUnit::MgPerM2,
            "mg/kg" => DoseUnit::MgPerKg,
            "AUC" => DoseUnit::Auc,
            _ => DoseUnit::Plain,
        }
    }
}

impl From<DoseUnit> for String {
    fn from(unit: DoseUnit) -> String {
        unit.as_str().to_string()
    }
}

impl Regimen {
    pub fn from_file<P: AsRef<Path>>(path: P) -> DoseResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let regimen: Regimen = serde_json::from_str(&content)?;
        regimen.validate()?;
        Ok(regimen)
    }

    pub fn validate(&self) -> DoseResult<()> {
        if self.id.trim().is_empty() {
            return Err(DoseError::InvalidRegimen(
                "Regimen id must not be empty".to_string()
            ));
        }

        if self.drugs.is_empty() {
            return Err(DoseError::InvalidRegimen(
                format!("Regimen {} contains no drugs", self.id)
            ));
        }

        // Drug name is the merge identity, so it must be unique per regimen.
        let mut seen = HashSet::new();
        for drug in &self.drugs {
            if drug.name.trim().is_empty() {
                return Err(DoseError::InvalidRegimen(
                    format!("Regimen {} contains a drug without a name", self.id)
                ));
            }
            if !seen.insert(drug.name.as_str()) {
                return Err(DoseError::InvalidRegimen(
                    format!("Duplicate drug name in regimen {}: {}", self.id, drug.name)
                ));
            }
        }

        Ok(())
    }

    pub fn drug(&self, name: &str) -> Option<&DrugDefinition> {
        self.drugs.iter().find(|drug| drug.name == name)
    }
}

impl DrugDefinition {
    /// First catalog solvent, used as the default selection for new state.
    pub fn default_solvent(&self) -> Option<String> {
        self.available_solvents.first().cloned()
    }

    pub fn default_volume(&self) -> Option<String> {
        self.available_volumes.first().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drug(name: &str) -> DrugDefinition {
        DrugDefinition {
            name: name.to_string(),
            dosage: "75".to_string(),
            unit: DoseUnit::MgPerM2,
            route: "IV".to_string(),
            day: None,
            drug_class: None,
            administration_duration: None,
            dilution: None,
            available_solvents: vec![],
            available_volumes: vec![],
        }
    }

    #[test]
    fn test_validate_rejects_duplicate_drug_names() {
        let regimen = Regimen {
            id: "FOLFOX".to_string(),
            name: "FOLFOX".to_string(),
            schedule: "q2w".to_string(),
            drugs: vec![drug("Oxaliplatin"), drug("Oxaliplatin")],
        };

        assert!(matches!(
            regimen.validate(),
            Err(DoseError::InvalidRegimen(_))
        ));
    }

    #[test]
    fn test_unknown_unit_deserializes_as_plain() {
        let json = r#"{
            "id": "R1",
            "name": "Test",
            "schedule": "q3w",
            "drugs": [
                {"name": "Filgrastim", "dosage": "300", "unit": "µg", "route": "SC"}
            ]
        }"#;

        let regimen: Regimen = serde_json::from_str(json).unwrap();
        assert_eq!(regimen.drugs[0].unit, DoseUnit::Plain);
    }

    #[test]
    fn test_known_units_deserialize() {
        let json = r#"{"name": "Cisplatin", "dosage": "75", "unit": "mg/m²", "route": "IV"}"#;
        let drug: DrugDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(drug.unit, DoseUnit::MgPerM2);

        let json = r#"{"name": "Carboplatin", "dosage": "AUC 5", "unit": "AUC", "route": "IV"}"#;
        let drug: DrugDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(drug.unit, DoseUnit::Auc);
    }
}
