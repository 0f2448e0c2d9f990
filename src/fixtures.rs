//! Shared test data: a small trained vocabulary, model artifacts fitted
//! against it, and a labeled corpus that only uses known levels.

use crate::features::{CategoryVocabulary, FeatureStore, FieldKind, OutcomeVocabulary};
use crate::models::linear::{LogisticArtifact, LogisticModel};
use crate::models::tree::{ForestArtifact, ForestModel, NodeSpec, TreeArtifact, TreeModel};
use crate::models::{FittedModel, InferenceEngine, ModelId, ModelRegistry, ScoreAggregator};
use crate::types::{CategoricalField, LabeledRecord, RawInput, RiskTierThresholds};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

pub const VERSION: &str = "test-v1";

fn strings(levels: &[&str]) -> Vec<String> {
    levels.iter().map(|l| l.to_string()).collect()
}

pub fn vocabularies() -> Vec<CategoryVocabulary> {
    let levels = |field: CategoricalField| -> Vec<String> {
        match field {
            CategoricalField::Age => strings(&[
                "[40-50)", "[50-60)", "[60-70)", "[70-80)", "[80-90)", "[90-100)",
            ]),
            CategoricalField::MedicalSpecialty => strings(&[
                "Cardiology",
                "Emergency/Trauma",
                "Family/GeneralPractice",
                "InternalMedicine",
                "Missing",
                "Other",
                "Surgery",
            ]),
            CategoricalField::PrimaryDiagnosis => strings(&[
                "Circulatory",
                "Diabetes",
                "Digestive",
                "Injury",
                "Missing",
                "Musculoskeletal",
                "Other",
                "Respiratory",
            ]),
            CategoricalField::Change | CategoricalField::DiabetesMed => strings(&["no", "yes"]),
            CategoricalField::GlucoseTest | CategoricalField::A1cTest => {
                strings(&["high", "no", "normal"])
            }
        }
    };

    CategoricalField::ALL
        .into_iter()
        .map(|field| CategoryVocabulary::new(field, FieldKind::for_field(field), levels(field)))
        .collect()
}

pub fn outcome() -> OutcomeVocabulary {
    OutcomeVocabulary {
        levels: strings(&["no", "yes"]),
        positive: "yes".to_string(),
    }
}

pub fn feature_store() -> FeatureStore {
    FeatureStore::new(VERSION, "yes", outcome(), vocabularies(), true).unwrap()
}

/// The reference encounter used across the scoring tests.
pub fn raw_input() -> RawInput {
    RawInput {
        length_of_stay: 3,
        lab_procedures: 43,
        procedures: 0,
        medications: 16,
        outpatient_visits: 0,
        inpatient_visits: 0,
        emergency_visits: 0,
        n_diagnoses: 3,
        age: "[70-80)".to_string(),
        medical_specialty: "Missing".to_string(),
        diag_1: "Circulatory".to_string(),
        change: "no".to_string(),
        diabetes_med: "no".to_string(),
        glucose_test: "no".to_string(),
        a1c_test: "no".to_string(),
    }
}

/// Deterministic labeled corpus covering every vocabulary level and both outcomes.
pub fn corpus() -> Vec<LabeledRecord> {
    let vocab = vocabularies();
    let level = |field: CategoricalField, i: usize| -> String {
        let levels = vocab[field as usize].levels();
        levels[i % levels.len()].clone()
    };

    (0..24u32)
        .map(|i| {
            let n = i as usize;
            let input = RawInput {
                length_of_stay: i % 9,
                lab_procedures: 20 + (i * 7) % 60,
                procedures: i % 4,
                medications: 5 + (i * 3) % 25,
                outpatient_visits: i % 3,
                inpatient_visits: (i / 3) % 4,
                emergency_visits: i % 2,
                n_diagnoses: 1 + i % 9,
                age: level(CategoricalField::Age, n),
                medical_specialty: level(CategoricalField::MedicalSpecialty, n),
                diag_1: level(CategoricalField::PrimaryDiagnosis, n),
                change: level(CategoricalField::Change, n / 2),
                diabetes_med: level(CategoricalField::DiabetesMed, n / 3),
                glucose_test: level(CategoricalField::GlucoseTest, n),
                a1c_test: level(CategoricalField::A1cTest, n + 1),
            };
            let outcome = if (i / 3) % 4 > 0 || i % 5 == 0 { "yes" } else { "no" };
            LabeledRecord::new(input, outcome)
        })
        .collect()
}

pub fn logistic_artifact() -> LogisticArtifact {
    let coefficients = BTreeMap::from([
        ("time_in_hospital".to_string(), 0.04),
        ("n_inpatient".to_string(), 0.35),
        ("n_emergency".to_string(), 0.12),
        ("total_prior_visits".to_string(), 0.08),
        ("medication_intensity".to_string(), 0.01),
        ("age:[70-80)".to_string(), 0.15),
        ("age:[80-90)".to_string(), 0.2),
        ("medical_specialty:Emergency/Trauma".to_string(), 0.1),
        ("diag_1:Diabetes".to_string(), 0.18),
        ("diabetes_med".to_string(), 0.22),
        ("A1Ctest:high".to_string(), 0.05),
    ]);
    LogisticArtifact {
        feature_store_version: VERSION.to_string(),
        intercept: -0.9,
        coefficients,
    }
}

fn tree_fields() -> Vec<String> {
    feature_store()
        .tree_schema()
        .names()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn leaf(probability: f64) -> NodeSpec {
    NodeSpec::Leaf { probability }
}

/// Inpatient history first, then age bracket.
fn inpatient_age_tree() -> Vec<NodeSpec> {
    vec![
        NodeSpec::Numeric {
            field: "n_inpatient".to_string(),
            threshold: 0.5,
            left: 1,
            right: 4,
        },
        NodeSpec::Categorical {
            field: "age".to_string(),
            left_levels: strings(&["[70-80)", "[80-90)", "[90-100)"]),
            left: 2,
            right: 3,
        },
        leaf(0.45),
        leaf(0.25),
        leaf(0.7),
    ]
}

pub fn tree_artifact() -> TreeArtifact {
    TreeArtifact {
        feature_store_version: VERSION.to_string(),
        fields: tree_fields(),
        nodes: inpatient_age_tree(),
    }
}

pub fn forest_artifact() -> ForestArtifact {
    ForestArtifact {
        feature_store_version: VERSION.to_string(),
        fields: tree_fields(),
        trees: vec![
            inpatient_age_tree(),
            vec![
                NodeSpec::Numeric {
                    field: "total_prior_visits".to_string(),
                    threshold: 1.5,
                    left: 1,
                    right: 2,
                },
                leaf(0.2),
                leaf(0.6),
            ],
            vec![
                NodeSpec::Categorical {
                    field: "medical_specialty".to_string(),
                    left_levels: strings(&["Missing", "Other"]),
                    left: 1,
                    right: 2,
                },
                leaf(0.3),
                leaf(0.5),
            ],
        ],
    }
}

pub fn forest_model(store: &FeatureStore) -> Box<dyn FittedModel> {
    Box::new(
        ForestModel::from_artifact(forest_artifact(), store, Path::new("random_forest.json"))
            .unwrap(),
    )
}

pub fn registry(store: &FeatureStore) -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry.insert(Box::new(
        LogisticModel::from_artifact(logistic_artifact(), store).unwrap(),
    ));
    registry.insert(Box::new(
        TreeModel::from_artifact(tree_artifact(), store, Path::new("decision_tree.json")).unwrap(),
    ));
    registry.insert(forest_model(store));
    registry
}

pub fn engine() -> InferenceEngine {
    let store = feature_store();
    let registry = registry(&store);
    InferenceEngine::new(
        Arc::new(store),
        Arc::new(registry),
        ScoreAggregator::default(),
        RiskTierThresholds::default(),
    )
}

/// Models fitted with the outcome placeholder, served by a store without it.
pub fn drifted_engine() -> InferenceEngine {
    let trained = feature_store();
    let registry = registry(&trained);
    let drifted = FeatureStore::new(
        trained.version(),
        trained.affirmative_token(),
        trained.outcome().clone(),
        trained.fields().to_vec(),
        false,
    )
    .unwrap();
    InferenceEngine::new(
        Arc::new(drifted),
        Arc::new(registry),
        ScoreAggregator::default(),
        RiskTierThresholds::default(),
    )
}

/// Write all three model artifacts into `dir` under their canonical names.
pub fn write_model_artifacts(dir: &Path) {
    let write = |id: ModelId, json: Vec<u8>| {
        std::fs::write(dir.join(id.artifact_file()), json).unwrap();
    };
    write(ModelId::Linear, serde_json::to_vec_pretty(&logistic_artifact()).unwrap());
    write(ModelId::Tree, serde_json::to_vec_pretty(&tree_artifact()).unwrap());
    write(ModelId::Ensemble, serde_json::to_vec_pretty(&forest_artifact()).unwrap());
}
