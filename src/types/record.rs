//! Patient-encounter records as supplied by a UI form or a corpus file

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw attributes of one patient encounter.
///
/// Categorical fields are free-form strings here; the feature store decides
/// whether they belong to the trained vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInput {
    /// Length of stay in days
    #[serde(alias = "time_in_hospital")]
    pub length_of_stay: u32,

    #[serde(alias = "n_lab_procedures")]
    pub lab_procedures: u32,

    #[serde(alias = "n_procedures")]
    pub procedures: u32,

    #[serde(alias = "n_medications")]
    pub medications: u32,

    /// Previous-year outpatient visits
    #[serde(alias = "n_outpatient")]
    pub outpatient_visits: u32,

    /// Previous-year inpatient visits
    #[serde(alias = "n_inpatient")]
    pub inpatient_visits: u32,

    /// Previous-year emergency visits
    #[serde(alias = "n_emergency")]
    pub emergency_visits: u32,

    #[serde(alias = "number_diagnoses")]
    pub n_diagnoses: u32,

    /// Age bracket, e.g. "[70-80)"
    pub age: String,

    pub medical_specialty: String,

    /// Primary diagnosis category
    pub diag_1: String,

    /// Medication change flag
    pub change: String,

    pub diabetes_med: String,

    pub glucose_test: String,

    #[serde(rename = "A1Ctest", alias = "a1c_test")]
    pub a1c_test: String,
}

impl RawInput {
    pub fn numeric(&self, field: NumericField) -> f64 {
        let value = match field {
            NumericField::LengthOfStay => self.length_of_stay,
            NumericField::LabProcedures => self.lab_procedures,
            NumericField::Procedures => self.procedures,
            NumericField::Medications => self.medications,
            NumericField::OutpatientVisits => self.outpatient_visits,
            NumericField::InpatientVisits => self.inpatient_visits,
            NumericField::EmergencyVisits => self.emergency_visits,
            NumericField::Diagnoses => self.n_diagnoses,
        };
        f64::from(value)
    }

    pub fn categorical(&self, field: CategoricalField) -> &str {
        match field {
            CategoricalField::Age => &self.age,
            CategoricalField::MedicalSpecialty => &self.medical_specialty,
            CategoricalField::PrimaryDiagnosis => &self.diag_1,
            CategoricalField::Change => &self.change,
            CategoricalField::DiabetesMed => &self.diabetes_med,
            CategoricalField::GlucoseTest => &self.glucose_test,
            CategoricalField::A1cTest => &self.a1c_test,
        }
    }

    pub fn categorical_mut(&mut self, field: CategoricalField) -> &mut String {
        match field {
            CategoricalField::Age => &mut self.age,
            CategoricalField::MedicalSpecialty => &mut self.medical_specialty,
            CategoricalField::PrimaryDiagnosis => &mut self.diag_1,
            CategoricalField::Change => &mut self.change,
            CategoricalField::DiabetesMed => &mut self.diabetes_med,
            CategoricalField::GlucoseTest => &mut self.glucose_test,
            CategoricalField::A1cTest => &mut self.a1c_test,
        }
    }
}

/// Numeric encounter attributes, in training column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NumericField {
    LengthOfStay,
    LabProcedures,
    Procedures,
    Medications,
    OutpatientVisits,
    InpatientVisits,
    EmergencyVisits,
    Diagnoses,
}

impl NumericField {
    pub const ALL: [NumericField; 8] = [
        NumericField::LengthOfStay,
        NumericField::LabProcedures,
        NumericField::Procedures,
        NumericField::Medications,
        NumericField::OutpatientVisits,
        NumericField::InpatientVisits,
        NumericField::EmergencyVisits,
        NumericField::Diagnoses,
    ];

    /// Column name used by the training corpus.
    pub fn name(self) -> &'static str {
        match self {
            NumericField::LengthOfStay => "time_in_hospital",
            NumericField::LabProcedures => "n_lab_procedures",
            NumericField::Procedures => "n_procedures",
            NumericField::Medications => "n_medications",
            NumericField::OutpatientVisits => "n_outpatient",
            NumericField::InpatientVisits => "n_inpatient",
            NumericField::EmergencyVisits => "n_emergency",
            NumericField::Diagnoses => "n_diagnoses",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// Categorical encounter attributes, in training column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CategoricalField {
    #[serde(rename = "age")]
    Age,
    #[serde(rename = "medical_specialty")]
    MedicalSpecialty,
    #[serde(rename = "diag_1")]
    PrimaryDiagnosis,
    #[serde(rename = "change")]
    Change,
    #[serde(rename = "diabetes_med")]
    DiabetesMed,
    #[serde(rename = "glucose_test")]
    GlucoseTest,
    #[serde(rename = "A1Ctest")]
    A1cTest,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 7] = [
        CategoricalField::Age,
        CategoricalField::MedicalSpecialty,
        CategoricalField::PrimaryDiagnosis,
        CategoricalField::Change,
        CategoricalField::DiabetesMed,
        CategoricalField::GlucoseTest,
        CategoricalField::A1cTest,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CategoricalField::Age => "age",
            CategoricalField::MedicalSpecialty => "medical_specialty",
            CategoricalField::PrimaryDiagnosis => "diag_1",
            CategoricalField::Change => "change",
            CategoricalField::DiabetesMed => "diabetes_med",
            CategoricalField::GlucoseTest => "glucose_test",
            CategoricalField::A1cTest => "A1Ctest",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl fmt::Display for CategoricalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name of the outcome column in the training corpus.
pub const OUTCOME_FIELD: &str = "readmitted";

/// A raw input paired with its observed outcome label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRecord {
    pub input: RawInput,
    pub outcome: String,
}

impl LabeledRecord {
    pub fn new(input: RawInput, outcome: impl Into<String>) -> Self {
        Self {
            input,
            outcome: outcome.into(),
        }
    }
}
