use thiserror::Error;

#[derive(Error, Debug)]
pub enum DoseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid regimen: {0}")]
    InvalidRegimen(String),

    #[error("Invalid patient parameters: {0}")]
    InvalidPatient(String),

    #[error("Dose calculation error: {0}")]
    Calculation(String),

    #[error("No dose state for drug: {0}")]
    UnknownDrug(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

pub type DoseResult<T> = Result<T, DoseError>;
