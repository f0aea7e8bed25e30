use serde::{Deserialize, Serialize};
use crate::alerts::DoseAlert;
use crate::dosing::parse_leading_float;
use crate::regimen::DrugDefinition;

/// Round to one decimal place, half away from zero (`f64::round` semantics):
/// 101.25 rounds to 101.3, -0.25 rounds to -0.3.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// One manual dose edit. Both modes funnel through
/// [`EditableDoseState::apply_edit`], the single derivation path for
/// `adjusted_dose` and `final_dose`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DoseEdit {
    Absolute { dose: f64 },
    Percentage { percent: f64 },
}

/// The mutable working record for one drug of the active regimen.
///
/// Identity for merging is the drug name. `calculated_dose` is overwritten by
/// every recomputation; the remaining fields carry clinician edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditableDoseState {
    pub drug: DrugDefinition,
    pub calculated_dose: f64,
    pub adjusted_dose: f64,
    pub final_dose: f64,
    #[serde(default)]
    pub reduction_percentage: f64,
    #[serde(default = "default_selected")]
    pub selected: bool,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub administration_duration: Option<String>,
    #[serde(default)]
    pub solvent: Option<String>,
    #[serde(default)]
    pub selected_solvent_type: Option<String>,
    #[serde(default)]
    pub selected_volume: Option<String>,
    #[serde(default)]
    pub dose_alert: Option<DoseAlert>,
}

fn default_selected() -> bool {
    true
}

impl EditableDoseState {
    /// Fresh state for a drug appearing for the first time.
    pub fn new(drug: DrugDefinition, calculated_dose: f64, dose_alert: Option<DoseAlert>) -> Self {
        let administration_duration = drug.administration_duration.clone();
        let solvent = drug.default_solvent();
        let selected_volume = drug.default_volume();

        EditableDoseState {
            drug,
            calculated_dose,
            adjusted_dose: calculated_dose,
            final_dose: round1(calculated_dose),
            reduction_percentage: 0.0,
            selected: true,
            notes: String::new(),
            administration_duration,
            solvent: solvent.clone(),
            selected_solvent_type: solvent,
            selected_volume,
            dose_alert,
        }
    }

    /// Apply one edit and re-derive the dependent dose fields.
    pub fn apply_edit(&mut self, edit: DoseEdit) {
        match edit {
            DoseEdit::Absolute { dose } => {
                // The stored reduction percentage is intentionally left
                // untouched; it may diverge from a direct dose edit.
                self.adjusted_dose = dose;
            }
            DoseEdit::Percentage { percent } => {
                self.reduction_percentage = percent;
                self.adjusted_dose = self.calculated_dose * (1.0 - percent / 100.0);
            }
        }
        self.final_dose = round1(self.adjusted_dose);
    }

    pub fn set_adjusted_dose(&mut self, raw: &str) {
        self.apply_edit(DoseEdit::Absolute {
            dose: parse_leading_float(raw),
        });
    }

    pub fn set_reduction_percentage(&mut self, raw: &str) {
        self.apply_edit(DoseEdit::Percentage {
            percent: parse_leading_float(raw),
        });
    }

    /// Selection only gates the exported document; doses are untouched.
    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    pub fn set_notes(&mut self, notes: String) {
        self.notes = notes;
    }

    pub fn set_administration_duration(&mut self, value: Option<String>) {
        self.administration_duration = value;
    }

    pub fn set_solvent(&mut self, value: Option<String>) {
        self.solvent = value;
    }

    pub fn set_solvent_type(&mut self, value: Option<String>) {
        self.selected_solvent_type = value;
    }

    pub fn set_volume(&mut self, value: Option<String>) {
        self.selected_volume = value;
    }

    /// Reduction derived from the current doses, for display. This is
    /// recomputed on every call and may legitimately disagree with the
    /// stored `reduction_percentage` after a direct dose edit.
    pub fn total_reduction_percent(&self) -> f64 {
        if self.calculated_dose == 0.0 {
            0.0
        } else {
            (((self.calculated_dose - self.adjusted_dose) / self.calculated_dose) * 100.0).round()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::regimen::DoseUnit;

    fn state(calculated: f64) -> EditableDoseState {
        let drug = DrugDefinition {
            name: "Paclitaxel".to_string(),
            dosage: "175".to_string(),
            unit: DoseUnit::MgPerM2,
            route: "IV".to_string(),
            day: Some("1".to_string()),
            drug_class: Some("chemotherapy".to_string()),
            administration_duration: Some("3 h".to_string()),
            dilution: Some("in 500 mL".to_string()),
            available_solvents: vec!["NaCl 0.9%".to_string(), "Glucose 5%".to_string()],
            available_volumes: vec!["250 mL".to_string(), "500 mL".to_string()],
        };
        EditableDoseState::new(drug, calculated, None)
    }

    #[test]
    fn test_new_state_defaults() {
        let s = state(315.06);

        assert_relative_eq!(s.adjusted_dose, 315.06);
        assert_relative_eq!(s.final_dose, 315.1);
        assert_relative_eq!(s.reduction_percentage, 0.0);
        assert!(s.selected);
        assert_eq!(s.administration_duration.as_deref(), Some("3 h"));
        assert_eq!(s.solvent.as_deref(), Some("NaCl 0.9%"));
        assert_eq!(s.selected_volume.as_deref(), Some("250 mL"));
    }

    #[test]
    fn test_final_dose_invariant_after_every_edit() {
        let mut s = state(200.0);

        s.set_adjusted_dose("187.62");
        assert_relative_eq!(s.final_dose, round1(s.adjusted_dose));

        s.set_reduction_percentage("15");
        assert_relative_eq!(s.final_dose, round1(s.adjusted_dose));

        s.set_adjusted_dose("abc");
        assert_relative_eq!(s.adjusted_dose, 0.0);
        assert_relative_eq!(s.final_dose, 0.0);
    }

    #[test]
    fn test_percentage_edit_derives_adjusted_dose() {
        let mut s = state(200.0);
        s.set_reduction_percentage("20");

        assert_relative_eq!(s.adjusted_dose, 160.0);
        assert_relative_eq!(s.final_dose, 160.0);
        assert_relative_eq!(s.reduction_percentage, 20.0);
    }

    #[test]
    fn test_absolute_edit_leaves_stored_percentage_untouched() {
        let mut s = state(200.0);
        s.set_reduction_percentage("20");
        s.set_adjusted_dose("100");

        // Stored percentage and derived display value legitimately diverge.
        assert_relative_eq!(s.reduction_percentage, 20.0);
        assert_relative_eq!(s.total_reduction_percent(), 50.0);
    }

    #[test]
    fn test_total_reduction_percent_zero_calculated_dose() {
        let mut s = state(0.0);
        s.set_adjusted_dose("10");
        assert_relative_eq!(s.total_reduction_percent(), 0.0);
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        assert_relative_eq!(round1(101.25), 101.3);
        assert_relative_eq!(round1(0.25), 0.3);
        assert_relative_eq!(round1(-0.25), -0.3);
        assert_relative_eq!(round1(101.24), 101.2);
    }

    #[test]
    fn test_selection_toggle_does_not_touch_doses() {
        let mut s = state(200.0);
        s.set_reduction_percentage("10");
        let before = s.clone();

        s.set_selected(false);

        assert!(!s.selected);
        assert_relative_eq!(s.adjusted_dose, before.adjusted_dose);
        assert_relative_eq!(s.final_dose, before.final_dose);
    }
}
