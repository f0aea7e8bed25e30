use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use crate::engine::DoseSession;
use crate::error::{DoseError, DoseResult};
use crate::state::EditableDoseState;

/// Solvents accepted in the exported document. Anything else becomes `None`
/// rather than being passed through silently.
pub const SOLVENT_ALLOW_LIST: [&str; 4] = [
    "NaCl 0.9%",
    "Glucose 5%",
    "Ringer's solution",
    "Water for injection",
];

/// The finalized projection handed to rendering/PDF. Pure formatting; no
/// dose arithmetic happens here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentData {
    pub regimen_id: String,
    pub regimen_name: String,
    pub schedule: String,
    pub cycle_number: u32,
    pub treatment_date: Option<NaiveDate>,
    pub clinical_notes: String,
    pub selected_premedications: Vec<String>,
    pub selected_antiemetics: Vec<String>,
    pub calculated_drugs: Vec<CalculatedDrug>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatedDrug {
    pub name: String,
    pub calculated_dose: String,
    pub final_dose: String,
    pub route: String,
    pub day: Option<String>,
    pub adjustment_notes: String,
    pub preparation_instructions: Option<String>,
    pub administration_duration: Option<String>,
    pub solvent: Option<String>,
    pub volume: Option<String>,
}

/// Project the selected subset of the session into the export document.
pub fn assemble(session: &DoseSession) -> DoseResult<TreatmentData> {
    let regimen = session.regimen().ok_or_else(|| {
        DoseError::InvalidRegimen("No active regimen to assemble treatment data from".to_string())
    })?;

    let calculated_drugs = session
        .dose_states()
        .iter()
        .filter(|state| state.selected)
        .map(project_drug)
        .collect();

    Ok(TreatmentData {
        regimen_id: regimen.id.clone(),
        regimen_name: regimen.name.clone(),
        schedule: regimen.schedule.clone(),
        cycle_number: session.cycle_number(),
        treatment_date: session.treatment_date(),
        clinical_notes: session.clinical_notes().to_string(),
        selected_premedications: session.selected_premedications().to_vec(),
        selected_antiemetics: session.selected_antiemetics().to_vec(),
        calculated_drugs,
    })
}

fn project_drug(state: &EditableDoseState) -> CalculatedDrug {
    CalculatedDrug {
        name: state.drug.name.clone(),
        calculated_dose: format_dose(state.calculated_dose),
        // Taken verbatim from the state; the assembler never re-derives it.
        final_dose: format_dose(state.final_dose),
        route: state.drug.route.clone(),
        day: state.drug.day.clone(),
        adjustment_notes: state.notes.clone(),
        preparation_instructions: state.drug.dilution.clone(),
        administration_duration: state
            .administration_duration
            .clone()
            .or_else(|| state.drug.administration_duration.clone()),
        solvent: validated_solvent(state.solvent.as_deref()),
        volume: state.selected_volume.clone(),
    }
}

fn format_dose(dose: f64) -> String {
    format!("{:.1} mg", dose)
}

fn validated_solvent(solvent: Option<&str>) -> Option<String> {
    solvent
        .filter(|s| SOLVENT_ALLOW_LIST.contains(s))
        .map(str::to_string)
}

/// Write the export artifacts: the machine-readable document, the drug
/// table, and a human-readable summary.
pub fn save_treatment<P: AsRef<Path>>(data: &TreatmentData, output_dir: P) -> DoseResult<()> {
    let output_path = output_dir.as_ref();
    std::fs::create_dir_all(output_path)?;

    let file = File::create(output_path.join("treatment.json"))?;
    serde_json::to_writer_pretty(file, data)?;

    save_drug_table(data, output_path.join("treatment_drugs.csv"))?;

    std::fs::write(output_path.join("treatment_report.md"), generate_report(data))?;

    info!("Treatment document saved to {:?}", output_path);
    Ok(())
}

fn save_drug_table<P: AsRef<Path>>(data: &TreatmentData, path: P) -> DoseResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record([
        "DRUG", "CALCULATED_DOSE", "FINAL_DOSE", "ROUTE", "DAY", "SOLVENT", "DURATION", "NOTES",
    ])?;

    for drug in &data.calculated_drugs {
        writer.write_record([
            drug.name.as_str(),
            drug.calculated_dose.as_str(),
            drug.final_dose.as_str(),
            drug.route.as_str(),
            drug.day.as_deref().unwrap_or(""),
            drug.solvent.as_deref().unwrap_or(""),
            drug.administration_duration.as_deref().unwrap_or(""),
            drug.adjustment_notes.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Render the markdown summary of the treatment document.
pub fn generate_report(data: &TreatmentData) -> String {
    let mut drug_lines = String::new();
    for drug in &data.calculated_drugs {
        drug_lines.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            drug.name,
            drug.final_dose,
            drug.route,
            drug.day.as_deref().unwrap_or("-"),
            drug.administration_duration.as_deref().unwrap_or("-"),
        ));
    }

    format!(
        r#"# Treatment Plan: {name}

- **Regimen**: {name} ({id})
- **Schedule**: {schedule}
- **Cycle**: {cycle}
- **Date**: {date}

## Drugs

| Drug | Final dose | Route | Day | Duration |
|------|-----------|-------|-----|----------|
{drugs}
## Premedication

{premeds}

## Antiemetics

{antiemetics}

## Clinical notes

{notes}
"#,
        name = data.regimen_name,
        id = data.regimen_id,
        schedule = data.schedule,
        cycle = data.cycle_number,
        date = data
            .treatment_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "not scheduled".to_string()),
        drugs = drug_lines,
        premeds = if data.selected_premedications.is_empty() {
            "none".to_string()
        } else {
            data.selected_premedications.join(", ")
        },
        antiemetics = if data.selected_antiemetics.is_empty() {
            "none".to_string()
        } else {
            data.selected_antiemetics.join(", ")
        },
        notes = if data.clinical_notes.is_empty() {
            "none"
        } else {
            &data.clinical_notes
        },
    )
}
