pub mod adjust;

use log::debug;
use crate::error::{DoseError, DoseResult};
use crate::regimen::{DoseUnit, DrugDefinition};

/// Parse the leading float prefix of a string ("75 mg" -> 75.0).
/// Unparsable input resolves to 0.0, never an error.
pub fn parse_leading_float(raw: &str) -> f64 {
    let s = raw.trim();
    let mut len = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;

    for (i, c) in s.char_indices() {
        match c {
            '+' | '-' if i == 0 => len = 1,
            '0'..='9' => {
                seen_digit = true;
                len = i + 1;
            }
            '.' if !seen_dot => {
                seen_dot = true;
                len = i + 1;
            }
            _ => break,
        }
    }

    if !seen_digit {
        return 0.0;
    }

    s[..len].parse::<f64>().unwrap_or(0.0)
}

/// AUC value of a Calvert expression ("AUC 6" -> 6.0).
fn parse_auc_value(dosage: &str) -> f64 {
    let stripped = dosage
        .trim()
        .strip_prefix("AUC")
        .unwrap_or(dosage)
        .trim();
    parse_leading_float(stripped)
}

/// Raw dose for one drug, before clinical adjustments.
///
/// Formula selection, in order:
/// 1. mg/m² -> dosage × effective BSA
/// 2. mg/kg -> dosage × weight
/// 3. expression contains "AUC" -> Calvert: AUC × (CrCl + 25)
/// 4. otherwise the expression itself is the dose
///
/// A non-finite result is an error so the caller can zero out the one
/// failing drug without aborting its siblings.
pub fn resolve_raw_dose(
    drug: &DrugDefinition,
    effective_bsa: f64,
    weight: f64,
    creatinine_clearance: f64,
) -> DoseResult<f64> {
    let dose = match drug.unit {
        DoseUnit::MgPerM2 => parse_leading_float(&drug.dosage) * effective_bsa,
        DoseUnit::MgPerKg => parse_leading_float(&drug.dosage) * weight,
        _ if drug.dosage.contains("AUC") => {
            parse_auc_value(&drug.dosage) * (creatinine_clearance + 25.0)
        }
        _ => parse_leading_float(&drug.dosage),
    };

    if !dose.is_finite() {
        return Err(DoseError::Calculation(
            format!("Non-finite dose for {}: {}", drug.name, dose)
        ));
    }

    debug!("Resolved raw dose for {}: {:.2} mg", drug.name, dose);
    Ok(dose)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn drug(name: &str, dosage: &str, unit: DoseUnit) -> DrugDefinition {
        DrugDefinition {
            name: name.to_string(),
            dosage: dosage.to_string(),
            unit,
            route: "IV".to_string(),
            day: None,
            drug_class: Some("chemotherapy".to_string()),
            administration_duration: None,
            dilution: None,
            available_solvents: vec![],
            available_volumes: vec![],
        }
    }

    #[test]
    fn test_parse_leading_float() {
        assert_relative_eq!(parse_leading_float("75"), 75.0);
        assert_relative_eq!(parse_leading_float("12.5 mg"), 12.5);
        assert_relative_eq!(parse_leading_float("-0.5"), -0.5);
        assert_relative_eq!(parse_leading_float("  80  "), 80.0);
        assert_relative_eq!(parse_leading_float("abc"), 0.0);
        assert_relative_eq!(parse_leading_float(""), 0.0);
        assert_relative_eq!(parse_leading_float("7.5.3"), 7.5);
    }

    #[test]
    fn test_bsa_based_dose() {
        let d = drug("Cisplatin", "75", DoseUnit::MgPerM2);
        let dose = resolve_raw_dose(&d, 1.8, 70.0, 90.0).unwrap();
        assert_relative_eq!(dose, 135.0);
    }

    #[test]
    fn test_weight_based_dose() {
        let d = drug("Trastuzumab", "6", DoseUnit::MgPerKg);
        let dose = resolve_raw_dose(&d, 1.8, 70.0, 90.0).unwrap();
        assert_relative_eq!(dose, 420.0);
    }

    #[test]
    fn test_calvert_formula() {
        // Scenario: AUC 6 at CrCl 70 -> 6 × (70 + 25) = 570 mg
        let d = drug("Carboplatin", "AUC 6", DoseUnit::Auc);
        let dose = resolve_raw_dose(&d, 1.8, 70.0, 70.0).unwrap();
        assert_relative_eq!(dose, 570.0);
    }

    #[test]
    fn test_unit_takes_precedence_over_auc_expression() {
        // mg/m² wins even if the expression mentions AUC
        let d = drug("Oddball", "5 AUC", DoseUnit::MgPerM2);
        let dose = resolve_raw_dose(&d, 2.0, 70.0, 70.0).unwrap();
        assert_relative_eq!(dose, 10.0);
    }

    #[test]
    fn test_plain_dose_passthrough() {
        let d = drug("Vincristine", "2", DoseUnit::Plain);
        let dose = resolve_raw_dose(&d, 1.8, 70.0, 90.0).unwrap();
        assert_relative_eq!(dose, 2.0);
    }

    #[test]
    fn test_unparsable_dosage_resolves_to_zero() {
        let d = drug("Broken", "per protocol", DoseUnit::Plain);
        let dose = resolve_raw_dose(&d, 1.8, 70.0, 90.0).unwrap();
        assert_relative_eq!(dose, 0.0);
    }

    #[test]
    fn test_unparsable_auc_value_resolves_to_zero() {
        let d = drug("Carboplatin", "AUC ?", DoseUnit::Auc);
        let dose = resolve_raw_dose(&d, 1.8, 70.0, 70.0).unwrap();
        assert_relative_eq!(dose, 0.0);
    }

    #[test]
    fn test_non_finite_result_is_an_error() {
        let d = drug("Carboplatin", "AUC 6", DoseUnit::Auc);
        assert!(resolve_raw_dose(&d, 1.8, 70.0, f64::NAN).is_err());
    }
}
