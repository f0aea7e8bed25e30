use chrono::NaiveDate;
use log::{debug, info, warn};
use crate::alerts::{DoseAlert, DoseLimitAdvisor, SafetyAlert, SafetyEngine};
use crate::dosing::adjust::apply_clinical_adjustments;
use crate::dosing::resolve_raw_dose;
use crate::draft::DraftRecord;
use crate::error::{DoseError, DoseResult};
use crate::patient::PatientParameters;
use crate::regimen::Regimen;
use crate::state::{round1, EditableDoseState};

/// One calculation session: the active regimen, patient parameters, and the
/// editable per-drug state, with every recomputation trigger funneled through
/// [`DoseSession::recalculate`].
///
/// All methods run synchronously to completion; a multi-threaded embedding
/// serializes access by wrapping the session in a `Mutex`.
pub struct DoseSession {
    regimen: Option<Regimen>,
    patient: PatientParameters,
    patient_identifier: String,
    biomarker_status: Option<String>,
    current_medications: Vec<String>,
    cycle_number: u32,
    treatment_date: Option<NaiveDate>,
    clinical_notes: String,
    selected_premedications: Vec<String>,
    selected_antiemetics: Vec<String>,
    dose_states: Vec<EditableDoseState>,
    safety_alerts: Vec<SafetyAlert>,
    advisor: Box<dyn DoseLimitAdvisor>,
    safety_engine: Option<Box<dyn SafetyEngine>>,
}

impl DoseSession {
    pub fn new(patient: PatientParameters, advisor: Box<dyn DoseLimitAdvisor>) -> Self {
        DoseSession {
            regimen: None,
            patient,
            patient_identifier: String::new(),
            biomarker_status: None,
            current_medications: Vec::new(),
            cycle_number: 1,
            treatment_date: None,
            clinical_notes: String::new(),
            selected_premedications: Vec::new(),
            selected_antiemetics: Vec::new(),
            dose_states: Vec::new(),
            safety_alerts: Vec::new(),
            advisor,
            safety_engine: None,
        }
    }

    pub fn with_safety_engine(mut self, engine: Box<dyn SafetyEngine>) -> Self {
        self.safety_engine = Some(engine);
        self
    }

    pub fn regimen(&self) -> Option<&Regimen> {
        self.regimen.as_ref()
    }

    pub fn patient(&self) -> &PatientParameters {
        &self.patient
    }

    pub fn dose_states(&self) -> &[EditableDoseState] {
        &self.dose_states
    }

    pub fn dose_state(&self, drug_name: &str) -> Option<&EditableDoseState> {
        self.dose_states.iter().find(|s| s.drug.name == drug_name)
    }

    pub fn safety_alerts(&self) -> &[SafetyAlert] {
        &self.safety_alerts
    }

    pub fn patient_identifier(&self) -> &str {
        &self.patient_identifier
    }

    pub fn cycle_number(&self) -> u32 {
        self.cycle_number
    }

    pub fn treatment_date(&self) -> Option<NaiveDate> {
        self.treatment_date
    }

    pub fn clinical_notes(&self) -> &str {
        &self.clinical_notes
    }

    pub fn selected_premedications(&self) -> &[String] {
        &self.selected_premedications
    }

    pub fn selected_antiemetics(&self) -> &[String] {
        &self.selected_antiemetics
    }

    // ---- Recomputation triggers -------------------------------------------

    pub fn set_regimen(&mut self, regimen: Option<Regimen>) {
        self.regimen = regimen;
        self.recalculate();
    }

    pub fn set_bsa(&mut self, bsa: f64) {
        self.patient.bsa = bsa;
        self.recalculate();
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.patient.weight = weight;
        self.recalculate();
    }

    pub fn set_creatinine_clearance(&mut self, creatinine_clearance: f64) {
        self.patient.creatinine_clearance = creatinine_clearance;
        self.recalculate();
    }

    pub fn set_age(&mut self, age: f64) {
        self.patient.age = age;
        self.recalculate();
    }

    pub fn set_use_bsa_cap(&mut self, use_bsa_cap: bool) {
        self.patient.use_bsa_cap = use_bsa_cap;
        self.recalculate();
    }

    pub fn set_bsa_cap(&mut self, bsa_cap: f64) {
        self.patient.bsa_cap = bsa_cap;
        self.recalculate();
    }

    pub fn set_biomarker_status(&mut self, status: Option<String>) {
        self.biomarker_status = status;
        self.recalculate();
    }

    /// Replace the full patient parameter set in one recomputation.
    pub fn set_patient(&mut self, patient: PatientParameters) {
        self.patient = patient;
        self.recalculate();
    }

    // ---- Non-trigger session fields ---------------------------------------

    pub fn set_patient_identifier(&mut self, identifier: String) {
        self.patient_identifier = identifier;
    }

    pub fn set_current_medications(&mut self, medications: Vec<String>) {
        self.current_medications = medications;
    }

    pub fn set_cycle_number(&mut self, cycle_number: u32) {
        self.cycle_number = cycle_number;
    }

    pub fn set_treatment_date(&mut self, date: Option<NaiveDate>) {
        self.treatment_date = date;
    }

    pub fn set_clinical_notes(&mut self, notes: String) {
        self.clinical_notes = notes;
    }

    pub fn set_selected_premedications(&mut self, premedications: Vec<String>) {
        self.selected_premedications = premedications;
    }

    pub fn set_selected_antiemetics(&mut self, antiemetics: Vec<String>) {
        self.selected_antiemetics = antiemetics;
    }

    // ---- Recalculation -----------------------------------------------------

    /// Rebuild the dose state list from the current regimen and patient,
    /// preserving clinician edits for drugs that persist by name.
    ///
    /// No regimen or a non-positive BSA is a hard reset, not a merge.
    pub fn recalculate(&mut self) {
        // Clone the regimen to avoid borrowing conflicts with the merge below.
        let regimen = match (self.regimen.clone(), self.patient.bsa > 0.0) {
            (Some(regimen), true) => regimen,
            _ => {
                self.dose_states.clear();
                self.safety_alerts.clear();
                debug!("Recalculation skipped: no regimen or BSA <= 0, state cleared");
                return;
            }
        };

        let mut next_states = Vec::with_capacity(regimen.drugs.len());

        for drug in &regimen.drugs {
            let (fresh_dose, fresh_alert) = self.compute_drug(drug, &regimen.schedule);

            let state = match self.dose_states.iter().find(|s| s.drug.name == drug.name) {
                Some(prior) => EditableDoseState {
                    drug: drug.clone(),
                    calculated_dose: fresh_dose,
                    adjusted_dose: prior.adjusted_dose,
                    final_dose: round1(prior.adjusted_dose),
                    reduction_percentage: prior.reduction_percentage,
                    selected: prior.selected,
                    notes: prior.notes.clone(),
                    administration_duration: prior
                        .administration_duration
                        .clone()
                        .or_else(|| drug.administration_duration.clone()),
                    solvent: prior.solvent.clone(),
                    selected_solvent_type: prior.selected_solvent_type.clone(),
                    selected_volume: prior.selected_volume.clone(),
                    // An existing alert wins over the fresh one. This can mask
                    // a newly resolved or newly emerged limit condition and is
                    // kept deliberately; see DESIGN.md.
                    dose_alert: prior.dose_alert.clone().or(fresh_alert),
                },
                None => EditableDoseState::new(drug.clone(), fresh_dose, fresh_alert),
            };

            next_states.push(state);
        }

        // Drugs absent from the new regimen are dropped here.
        self.dose_states = next_states;
        info!(
            "Recalculated {} doses for regimen {}",
            self.dose_states.len(),
            regimen.id
        );

        self.run_safety_check(&regimen);
    }

    /// Resolve and adjust one drug. A per-drug failure yields dose 0 and no
    /// alert so the rest of the batch computes normally.
    fn compute_drug(&self, drug: &crate::regimen::DrugDefinition, schedule: &str) -> (f64, Option<DoseAlert>) {
        let raw = match resolve_raw_dose(
            drug,
            self.patient.effective_bsa(),
            self.patient.weight,
            self.patient.creatinine_clearance,
        ) {
            Ok(dose) => dose,
            Err(err) => {
                warn!("Dose calculation failed for {}: {}", drug.name, err);
                return (0.0, None);
            }
        };

        let adjusted = apply_clinical_adjustments(
            drug,
            raw,
            self.patient.age,
            self.patient.creatinine_clearance,
        );

        let alert = match self.advisor.check(&drug.name, adjusted, schedule) {
            Ok(alert) => Some(alert),
            Err(err) => {
                warn!("Dose limit check failed for {}: {}", drug.name, err);
                None
            }
        };

        (adjusted, alert)
    }

    fn run_safety_check(&mut self, regimen: &Regimen) {
        let Some(engine) = &self.safety_engine else {
            self.safety_alerts.clear();
            return;
        };

        let doses: Vec<(String, f64)> = self
            .dose_states
            .iter()
            .map(|s| (s.drug.name.clone(), s.calculated_dose))
            .collect();

        self.safety_alerts = match engine.comprehensive_check(
            regimen,
            &self.patient,
            &doses,
            self.biomarker_status.as_deref(),
            &self.current_medications,
        ) {
            Ok(alerts) => alerts,
            Err(err) => {
                warn!("Safety check failed, continuing without alerts: {}", err);
                Vec::new()
            }
        };
    }

    // ---- Manual edit operations, addressed by drug name --------------------

    fn state_mut(&mut self, drug_name: &str) -> DoseResult<&mut EditableDoseState> {
        self.dose_states
            .iter_mut()
            .find(|s| s.drug.name == drug_name)
            .ok_or_else(|| DoseError::UnknownDrug(drug_name.to_string()))
    }

    pub fn set_adjusted_dose(&mut self, drug_name: &str, raw: &str) -> DoseResult<()> {
        self.state_mut(drug_name)?.set_adjusted_dose(raw);
        Ok(())
    }

    pub fn set_reduction_percentage(&mut self, drug_name: &str, raw: &str) -> DoseResult<()> {
        self.state_mut(drug_name)?.set_reduction_percentage(raw);
        Ok(())
    }

    pub fn set_selected(&mut self, drug_name: &str, selected: bool) -> DoseResult<()> {
        self.state_mut(drug_name)?.set_selected(selected);
        Ok(())
    }

    pub fn set_notes(&mut self, drug_name: &str, notes: String) -> DoseResult<()> {
        self.state_mut(drug_name)?.set_notes(notes);
        Ok(())
    }

    pub fn set_administration_duration(
        &mut self,
        drug_name: &str,
        value: Option<String>,
    ) -> DoseResult<()> {
        self.state_mut(drug_name)?.set_administration_duration(value);
        Ok(())
    }

    pub fn set_solvent(&mut self, drug_name: &str, value: Option<String>) -> DoseResult<()> {
        self.state_mut(drug_name)?.set_solvent(value);
        Ok(())
    }

    pub fn set_solvent_type(&mut self, drug_name: &str, value: Option<String>) -> DoseResult<()> {
        self.state_mut(drug_name)?.set_solvent_type(value);
        Ok(())
    }

    pub fn set_volume(&mut self, drug_name: &str, value: Option<String>) -> DoseResult<()> {
        self.state_mut(drug_name)?.set_volume(value);
        Ok(())
    }

    // ---- Draft integration -------------------------------------------------

    /// Project the session into its persistable draft. The patient identifier
    /// is not part of the draft type, so it can never reach storage.
    pub fn to_draft(&self) -> DraftRecord {
        DraftRecord {
            schema_version: crate::draft::DRAFT_SCHEMA_VERSION,
            patient: self.patient.clone(),
            cycle_number: self.cycle_number,
            treatment_date: self.treatment_date,
            clinical_notes: self.clinical_notes.clone(),
            selected_premedications: self.selected_premedications.clone(),
            selected_antiemetics: self.selected_antiemetics.clone(),
            dose_states: self.dose_states.clone(),
        }
    }

    /// Restore a previously persisted draft, then recompute so calculated
    /// doses are fresh while restored edits are preserved by the merge.
    /// The patient identifier is always reset, whatever the draft held.
    pub fn restore_draft(&mut self, draft: DraftRecord) {
        self.patient = draft.patient;
        self.cycle_number = draft.cycle_number;
        self.treatment_date = draft.treatment_date;
        self.clinical_notes = draft.clinical_notes;
        self.selected_premedications = draft.selected_premedications;
        self.selected_antiemetics = draft.selected_antiemetics;
        self.dose_states = draft.dose_states;
        self.patient_identifier = String::new();
        self.recalculate();
    }
}
