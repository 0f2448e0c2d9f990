//! Engineered numeric features computed from raw encounter attributes.
//!
//! Every prediction path calls [`DerivedFeatures::compute`]; nothing else
//! recomputes these values.

use crate::types::RawInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DerivedField {
    MedicationIntensity,
    TotalPriorVisits,
}

impl DerivedField {
    pub const ALL: [DerivedField; 2] = [
        DerivedField::MedicationIntensity,
        DerivedField::TotalPriorVisits,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DerivedField::MedicationIntensity => "medication_intensity",
            DerivedField::TotalPriorVisits => "total_prior_visits",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedFeatures {
    /// Medications per day of stay
    pub medication_intensity: f64,
    /// Outpatient + inpatient + emergency visits
    pub total_prior_visits: f64,
}

impl DerivedFeatures {
    pub fn compute(raw: &RawInput) -> Self {
        let medications = f64::from(raw.medications);
        // A zero-day stay keeps the raw medication count.
        let medication_intensity = if raw.length_of_stay > 0 {
            medications / f64::from(raw.length_of_stay)
        } else {
            medications
        };

        let total_prior_visits = f64::from(raw.outpatient_visits)
            + f64::from(raw.inpatient_visits)
            + f64::from(raw.emergency_visits);

        Self {
            medication_intensity,
            total_prior_visits,
        }
    }

    pub fn get(&self, field: DerivedField) -> f64 {
        match field {
            DerivedField::MedicationIntensity => self.medication_intensity,
            DerivedField::TotalPriorVisits => self.total_prior_visits,
        }
    }
}
