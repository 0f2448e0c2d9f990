//! Artifacts written to disk, loaded through the config, and scored.

use readmission_pipeline::config::AppConfig;
use readmission_pipeline::data::load_corpus;
use readmission_pipeline::evaluation::Evaluator;
use readmission_pipeline::models::linear::LogisticArtifact;
use readmission_pipeline::models::tree::{ForestArtifact, NodeSpec, TreeArtifact};
use readmission_pipeline::report;
use readmission_pipeline::{
    FeatureStore, InferenceEngine, ModelId, PipelineError, RawInput, RiskTier,
};
use std::collections::BTreeMap;
use std::path::Path;

const CORPUS: &str = "\
age,time_in_hospital,n_lab_procedures,n_procedures,n_medications,n_outpatient,n_inpatient,n_emergency,medical_specialty,diag_1,diag_2,diag_3,glucose_test,A1Ctest,change,diabetes_med,n_diagnoses,readmitted
[70-80),8,72,1,18,2,0,0,Missing,Circulatory,Respiratory,Other,no,no,no,yes,9,no
[70-80),3,34,2,13,0,0,0,Other,Other,Other,Other,no,no,no,yes,6,no
[50-60),5,45,0,18,0,0,0,Missing,Circulatory,Circulatory,Circulatory,no,no,yes,yes,7,yes
[70-80),2,36,0,12,1,0,0,Missing,Circulatory,Other,Diabetes,no,no,yes,yes,5,yes
[60-70),1,42,0,7,0,0,0,InternalMedicine,Other,Circulatory,Respiratory,no,no,no,yes,3,no
[40-50),2,51,0,10,0,0,0,Missing,Other,Other,Other,no,no,no,no,4,yes
[50-60),4,44,2,21,0,1,0,Missing,Injury,Other,Other,normal,high,yes,yes,9,yes
[60-70),1,19,6,16,1,0,0,Family/GeneralPractice,Circulatory,Other,Other,no,no,no,yes,6,no
[70-80),4,67,3,13,0,2,0,Emergency/Trauma,Respiratory,Circulatory,Circulatory,high,no,yes,yes,9,yes
[80-90),6,51,0,14,0,0,1,Missing,Digestive,Respiratory,Circulatory,no,normal,no,no,8,no
";

const VERSION: &str = "e2e-v1";

fn reference_input() -> RawInput {
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

fn leaf(probability: f64) -> NodeSpec {
    NodeSpec::Leaf { probability }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) {
    std::fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}

/// Derive the store from the corpus and write it plus three models under `root`.
fn write_artifacts(root: &Path) -> std::path::PathBuf {
    let corpus_path = root.join("corpus.csv");
    std::fs::write(&corpus_path, CORPUS).unwrap();

    let store = FeatureStore::derive(&load_corpus(&corpus_path).unwrap(), VERSION).unwrap();
    store.save(root.join("feature_store.json")).unwrap();

    let models_dir = root.join("models");
    std::fs::create_dir(&models_dir).unwrap();
    let fields: Vec<String> = store
        .tree_schema()
        .names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let linear = LogisticArtifact {
        feature_store_version: VERSION.to_string(),
        intercept: -1.2,
        coefficients: BTreeMap::from([
            ("n_inpatient".to_string(), 0.9),
            ("total_prior_visits".to_string(), 0.2),
            ("change".to_string(), 0.8),
            ("age:[70-80)".to_string(), 0.3),
        ]),
    };
    write_json(&models_dir.join(ModelId::Linear.artifact_file()), &linear);

    let change_tree = vec![
        NodeSpec::Categorical {
            field: "change".to_string(),
            left_levels: vec!["yes".to_string()],
            left: 1,
            right: 2,
        },
        leaf(0.8),
        NodeSpec::Numeric {
            field: "n_inpatient".to_string(),
            threshold: 0.5,
            left: 3,
            right: 4,
        },
        leaf(0.2),
        leaf(0.6),
    ];
    let tree = TreeArtifact {
        feature_store_version: VERSION.to_string(),
        fields: fields.clone(),
        nodes: change_tree.clone(),
    };
    write_json(&models_dir.join(ModelId::Tree.artifact_file()), &tree);

    let forest = ForestArtifact {
        feature_store_version: VERSION.to_string(),
        fields,
        trees: vec![
            change_tree,
            vec![
                NodeSpec::Numeric {
                    field: "medication_intensity".to_string(),
                    threshold: 4.0,
                    left: 1,
                    right: 2,
                },
                leaf(0.3),
                leaf(0.5),
            ],
        ],
    };
    write_json(&models_dir.join(ModelId::Ensemble.artifact_file()), &forest);

    let config_path = root.join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            "[artifacts]\nfeature_store = {:?}\nmodels_dir = {:?}\n",
            root.join("feature_store.json").display().to_string(),
            models_dir.display().to_string()
        ),
    )
    .unwrap();
    config_path
}

fn engine(root: &Path) -> InferenceEngine {
    let config = AppConfig::load_from_path(write_artifacts(root)).unwrap();
    InferenceEngine::from_config(&config).unwrap()
}

#[test]
fn test_reference_encounter_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());

    let prediction = engine.predict(&reference_input()).unwrap();

    // tree: change=no, no inpatient visits
    assert_eq!(prediction.models[&ModelId::Tree].probability, 0.2);
    // forest: (0.2 + 0.5) / 2, intensity 16/3 > 4
    assert!((prediction.models[&ModelId::Ensemble].probability - 0.35).abs() < 1e-12);
    // linear: sigmoid(-1.2 + 0.3)
    let linear = 1.0 / (1.0 + (0.9f64).exp());
    assert!((prediction.models[&ModelId::Linear].probability - linear).abs() < 1e-12);

    let mean = (0.2 + 0.35 + linear) / 3.0;
    assert!((prediction.probability - mean).abs() < 1e-12);
    assert_eq!(prediction.risk_tier, RiskTier::Low);

    assert_eq!(prediction.models[&ModelId::Tree].risk_tier, RiskTier::Low);
    assert_eq!(prediction.models[&ModelId::Ensemble].risk_tier, RiskTier::Moderate);
    assert_eq!(prediction.models[&ModelId::Linear].risk_tier, RiskTier::Low);
}

#[test]
fn test_high_risk_encounter() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());

    let mut raw = reference_input();
    raw.change = "yes".to_string();
    raw.inpatient_visits = 3;

    let prediction = engine.predict(&raw).unwrap();
    assert_eq!(prediction.risk_tier, RiskTier::High);
}

#[test]
fn test_unknown_level_is_rejected_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());

    let mut raw = reference_input();
    // Surgery never appears in the corpus
    raw.medical_specialty = "Surgery".to_string();

    assert!(matches!(
        engine.predict(&raw),
        Err(PipelineError::UnknownCategory { .. })
    ));
}

#[test]
fn test_missing_required_model_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_artifacts(dir.path());
    std::fs::remove_file(dir.path().join("models").join(ModelId::Ensemble.artifact_file()))
        .unwrap();

    let config = AppConfig::load_from_path(config_path).unwrap();
    assert!(InferenceEngine::from_config(&config).is_err());
}

#[test]
fn test_evaluate_corpus_and_write_reports() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path());
    let records = load_corpus(dir.path().join("corpus.csv")).unwrap();

    let reports = Evaluator::new(&engine, 0.5)
        .evaluate_models(&[], &records)
        .unwrap();
    assert_eq!(reports.len(), 3);

    let tree = reports.iter().find(|r| r.model == ModelId::Tree).unwrap();
    assert_eq!(tree.evaluated, records.len());
    // every change=yes row in the corpus was readmitted
    assert_eq!(tree.confusion.false_positive, 0);
    assert!(tree.metrics.auc.unwrap() > 0.5);

    let metrics_path = dir.path().join("metrics.csv");
    let roc_path = dir.path().join("roc.csv");
    report::save_metrics(&reports, &metrics_path).unwrap();
    report::save_roc(&reports, &roc_path).unwrap();

    let metrics = std::fs::read_to_string(metrics_path).unwrap();
    assert!(metrics.lines().any(|l| l == "ensemble,skipped,0"));
    let roc = std::fs::read_to_string(roc_path).unwrap();
    assert!(roc.starts_with("model,threshold,fpr,tpr"));
}
