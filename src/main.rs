use anyhow::Context;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

mod alerts;
mod dosing;
mod draft;
mod engine;
mod error;
mod output;
mod patient;
mod regimen;
mod state;

use crate::alerts::ThresholdLimitAdvisor;
use crate::draft::{migrate_drafts, DraftPersistenceGateway, FileStore, DEFAULT_DEBOUNCE};
use crate::engine::DoseSession;
use crate::patient::PatientParameters;
use crate::regimen::Regimen;

#[derive(Parser)]
#[command(name = "chemodose")]
#[command(about = "Chemotherapy dose calculation with edit-preserving recalculation")]
struct Cli {
    /// Regimen definition file (JSON)
    #[arg(short, long)]
    regimen: PathBuf,

    /// Patient parameters file (JSON)
    #[arg(short, long)]
    patient: PathBuf,

    /// Output directory for the treatment document
    #[arg(short, long)]
    output: PathBuf,

    /// Draft store file
    #[arg(short, long, default_value = "drafts.json")]
    drafts: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let regimen = Regimen::from_file(&cli.regimen)
        .with_context(|| format!("Failed to load regimen from {:?}", cli.regimen))?;
    info!("Loaded regimen {} ({} drugs)", regimen.name, regimen.drugs.len());

    let patient = PatientParameters::from_file(&cli.patient)
        .with_context(|| format!("Failed to load patient parameters from {:?}", cli.patient))?;

    let store = FileStore::open(&cli.drafts)
        .with_context(|| format!("Failed to open draft store {:?}", cli.drafts))?;
    let mut gateway = DraftPersistenceGateway::new(store, DEFAULT_DEBOUNCE);
    migrate_drafts(gateway.store_mut()).context("Draft migration failed")?;

    let mut session = DoseSession::new(patient.clone(), Box::new(ThresholdLimitAdvisor::default()));
    session.set_regimen(Some(regimen.clone()));

    if let Some(record) = gateway.load(&regimen.id) {
        info!("Restoring draft for regimen {}", regimen.id);
        session.restore_draft(record);
    }

    // The parameters passed on the command line are the current measurements
    // and take precedence over whatever the draft stored.
    session.set_patient(patient);

    for dose in session.dose_states() {
        info!(
            "{}: calculated {:.1} mg, final {:.1} mg",
            dose.drug.name, dose.calculated_dose, dose.final_dose
        );
        if let Some(alert) = &dose.dose_alert {
            if alert.is_exceeded {
                info!(
                    "  dose alert: {}",
                    alert.warning.as_deref().unwrap_or("limit exceeded")
                );
            }
        }
    }

    gateway.schedule_save(&regimen.id, &session.to_draft(), Instant::now());
    gateway.flush();

    let treatment = output::assemble(&session).context("Failed to assemble treatment data")?;
    output::save_treatment(&treatment, &cli.output)
        .with_context(|| format!("Failed to write treatment document to {:?}", cli.output))?;
    info!(
        "Exported {} selected drug(s) to {:?}",
        treatment.calculated_drugs.len(),
        cli.output
    );

    Ok(())
}
