//! Labeled corpus loading from CSV

use crate::types::{LabeledRecord, RawInput};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// One row of the training corpus. Unlisted columns (diag_2, diag_3) are ignored.
#[derive(Debug, Deserialize)]
struct CorpusRow {
    time_in_hospital: u32,
    n_lab_procedures: u32,
    n_procedures: u32,
    n_medications: u32,
    n_outpatient: u32,
    n_inpatient: u32,
    n_emergency: u32,
    #[serde(alias = "number_diagnoses")]
    n_diagnoses: u32,
    age: String,
    medical_specialty: String,
    diag_1: String,
    change: String,
    diabetes_med: String,
    glucose_test: String,
    #[serde(rename = "A1Ctest")]
    a1c_test: String,
    readmitted: String,
}

impl From<CorpusRow> for LabeledRecord {
    fn from(row: CorpusRow) -> Self {
        let input = RawInput {
            length_of_stay: row.time_in_hospital,
            lab_procedures: row.n_lab_procedures,
            procedures: row.n_procedures,
            medications: row.n_medications,
            outpatient_visits: row.n_outpatient,
            inpatient_visits: row.n_inpatient,
            emergency_visits: row.n_emergency,
            n_diagnoses: row.n_diagnoses,
            age: row.age,
            medical_specialty: row.medical_specialty,
            diag_1: row.diag_1,
            change: row.change,
            diabetes_med: row.diabetes_med,
            glucose_test: row.glucose_test,
            a1c_test: row.a1c_test,
        };
        LabeledRecord::new(input, row.readmitted)
    }
}

/// Read every row of a headed CSV corpus.
///
/// A malformed row (missing column, non-numeric count) fails the whole load
/// with its line number; vocabulary membership is checked later, per record.
pub fn read_corpus<R: Read>(reader: R) -> Result<Vec<LabeledRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (i, row) in reader.deserialize::<CorpusRow>().enumerate() {
        // Header is line 1
        let row = row.with_context(|| format!("Malformed corpus row at line {}", i + 2))?;
        records.push(row.into());
    }
    Ok(records)
}

pub fn load_corpus<P: AsRef<Path>>(path: P) -> Result<Vec<LabeledRecord>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open corpus {}", path.display()))?;
    let records = read_corpus(file)?;
    info!(path = %path.display(), records = records.len(), "Corpus loaded");
    Ok(records)
}
