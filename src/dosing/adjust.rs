use log::debug;
use crate::regimen::DrugDefinition;

const RENAL_CRCL_THRESHOLD: f64 = 60.0; // mL/min
const RENAL_REDUCTION_FACTOR: f64 = 0.75;
const ELDERLY_AGE_THRESHOLD: f64 = 75.0; // years
const ELDERLY_REDUCTION_FACTOR: f64 = 0.9;

/// Apply the ordered clinical adjustment rules to a raw dose.
///
/// The factors are cumulative and multiplicative; evaluation order is fixed
/// (renal, then age) so repeated runs are reproducible.
pub fn apply_clinical_adjustments(
    drug: &DrugDefinition,
    raw_dose: f64,
    age: f64,
    creatinine_clearance: f64,
) -> f64 {
    let mut dose = raw_dose;

    // Renal rule. Applies to Cisplatin only; Carboplatin is deliberately
    // exempt because its Calvert formula already incorporates renal function.
    if drug.name == "Cisplatin" && creatinine_clearance < RENAL_CRCL_THRESHOLD {
        dose *= RENAL_REDUCTION_FACTOR;
        debug!(
            "Renal adjustment for {} at CrCl {:.0}: ×{}",
            drug.name, creatinine_clearance, RENAL_REDUCTION_FACTOR
        );
    }

    // Age rule for cytotoxic agents.
    if age >= ELDERLY_AGE_THRESHOLD && drug.drug_class.as_deref() == Some("chemotherapy") {
        dose *= ELDERLY_REDUCTION_FACTOR;
        debug!(
            "Age adjustment for {} at age {:.0}: ×{}",
            drug.name, age, ELDERLY_REDUCTION_FACTOR
        );
    }

    dose
}
