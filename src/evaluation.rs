//! Batch scoring of labeled records into classification metrics.
//!
//! Records that can not be encoded are skipped and counted; any other
//! failure aborts the batch, since it means the artifacts disagree with each
//! other.

use crate::error::Result;
use crate::models::{InferenceEngine, ModelId};
use crate::types::LabeledRecord;
use serde::Serialize;
use tracing::{info, warn};

/// 2x2 confusion counts with the readmitted outcome as the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_positive: u64,
    pub true_negative: u64,
    pub false_positive: u64,
    pub false_negative: u64,
}

impl ConfusionMatrix {
    pub fn record(&mut self, actual: bool, predicted: bool) {
        match (actual, predicted) {
            (true, true) => self.true_positive += 1,
            (false, false) => self.true_negative += 1,
            (false, true) => self.false_positive += 1,
            (true, false) => self.false_negative += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.true_positive + self.true_negative + self.false_positive + self.false_negative
    }
}

/// Standard classification metrics. `None` marks an undefined value, such as
/// precision when nothing was predicted positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub specificity: Option<f64>,
    pub f1: Option<f64>,
    pub auc: Option<f64>,
}

impl Metrics {
    pub fn from_confusion(cm: &ConfusionMatrix, auc: Option<f64>) -> Self {
        let tp = cm.true_positive as f64;
        let tn = cm.true_negative as f64;
        let fp = cm.false_positive as f64;
        let fn_ = cm.false_negative as f64;

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = match (precision, recall) {
            (Some(p), Some(r)) if p + r > 0.0 => Some(2.0 * p * r / (p + r)),
            _ => None,
        };

        Self {
            accuracy: ratio(tp + tn, cm.total() as f64),
            precision,
            recall,
            specificity: ratio(tn, tn + fp),
            f1,
            auc,
        }
    }

    /// Metric name/value pairs in report order.
    pub fn entries(&self) -> [(&'static str, Option<f64>); 6] {
        [
            ("accuracy", self.accuracy),
            ("precision", self.precision),
            ("recall", self.recall),
            ("specificity", self.specificity),
            ("f1", self.f1),
            ("auc", self.auc),
        ]
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator > 0.0 {
        Some(numerator / denominator)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub false_positive_rate: f64,
    pub true_positive_rate: f64,
}

/// ROC curve over every distinct scored probability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocCurve {
    pub points: Vec<RocPoint>,
    /// Trapezoidal area; undefined without both classes present
    pub auc: Option<f64>,
}

impl RocCurve {
    /// `scored` holds (probability, actual-positive) pairs.
    pub fn compute(scored: &[(f64, bool)]) -> Self {
        let positives = scored.iter().filter(|(_, actual)| *actual).count();
        let negatives = scored.len() - positives;
        if positives == 0 || negatives == 0 {
            return Self {
                points: Vec::new(),
                auc: None,
            };
        }

        let mut sorted = scored.to_vec();
        sorted.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut points = vec![RocPoint {
            threshold: f64::INFINITY,
            false_positive_rate: 0.0,
            true_positive_rate: 0.0,
        }];
        let (mut tp, mut fp) = (0usize, 0usize);
        let mut i = 0;
        while i < sorted.len() {
            let threshold = sorted[i].0;
            // Ties share one threshold and move the curve diagonally.
            while i < sorted.len() && sorted[i].0 == threshold {
                if sorted[i].1 {
                    tp += 1;
                } else {
                    fp += 1;
                }
                i += 1;
            }
            points.push(RocPoint {
                threshold,
                false_positive_rate: fp as f64 / negatives as f64,
                true_positive_rate: tp as f64 / positives as f64,
            });
        }

        let auc = points
            .windows(2)
            .map(|w| {
                (w[1].false_positive_rate - w[0].false_positive_rate)
                    * (w[0].true_positive_rate + w[1].true_positive_rate)
                    / 2.0
            })
            .sum();

        Self {
            points,
            auc: Some(auc),
        }
    }
}

/// A record left out of the metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordError {
    /// Position in the input batch
    pub index: usize,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub model: ModelId,
    pub confusion: ConfusionMatrix,
    pub metrics: Metrics,
    pub roc: RocCurve,
    /// Records that contributed to the metrics
    pub evaluated: usize,
    pub skipped: Vec<RecordError>,
}

impl EvaluationReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Scores labeled batches through an [`InferenceEngine`].
pub struct Evaluator<'a> {
    engine: &'a InferenceEngine,
    decision_threshold: f64,
}

impl<'a> Evaluator<'a> {
    pub fn new(engine: &'a InferenceEngine, decision_threshold: f64) -> Self {
        Self {
            engine,
            decision_threshold,
        }
    }

    pub fn evaluate(&self, id: ModelId, records: &[LabeledRecord]) -> Result<EvaluationReport> {
        self.engine.registry().get(id)?;

        let outcome = self.engine.store().outcome();
        let mut confusion = ConfusionMatrix::default();
        let mut scored = Vec::with_capacity(records.len());
        let mut skipped = Vec::new();

        for (index, record) in records.iter().enumerate() {
            let result = outcome.is_positive(&record.outcome).and_then(|actual| {
                self.engine
                    .score(id, &record.input)
                    .map(|probability| (probability, actual))
            });

            match result {
                Ok((probability, actual)) => {
                    confusion.record(actual, probability >= self.decision_threshold);
                    scored.push((probability, actual));
                }
                Err(e) if e.is_record_level() => {
                    warn!(model = %id, record = index, error = %e, "Skipping record");
                    skipped.push(RecordError {
                        index,
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        let roc = RocCurve::compute(&scored);
        let metrics = Metrics::from_confusion(&confusion, roc.auc);

        info!(
            model = %id,
            evaluated = scored.len(),
            skipped = skipped.len(),
            accuracy = ?metrics.accuracy,
            auc = ?metrics.auc,
            "Evaluation complete"
        );

        Ok(EvaluationReport {
            model: id,
            confusion,
            metrics,
            roc,
            evaluated: scored.len(),
            skipped,
        })
    }

    /// Evaluate each id in `ids` (every loaded model when empty), stopping at
    /// the first fatal error.
    pub fn evaluate_models(
        &self,
        ids: &[ModelId],
        records: &[LabeledRecord],
    ) -> Result<Vec<EvaluationReport>> {
        let ids = if ids.is_empty() {
            self.engine.registry().loaded()
        } else {
            ids.to_vec()
        };
        ids.into_iter().map(|id| self.evaluate(id, records)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::fixtures;
    use crate::models::{ModelRegistry, ScoreAggregator};
    use crate::types::RiskTierThresholds;
    use std::sync::Arc;

    #[test]
    fn test_metrics_from_confusion() {
        let cm = ConfusionMatrix {
            true_positive: 30,
            true_negative: 50,
            false_positive: 10,
            false_negative: 10,
        };
        let metrics = Metrics::from_confusion(&cm, None);

        assert_eq!(metrics.accuracy, Some(0.8));
        assert_eq!(metrics.precision, Some(0.75));
        assert_eq!(metrics.recall, Some(0.75));
        assert_eq!(metrics.specificity, Some(50.0 / 60.0));
        assert!((metrics.f1.unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_no_positive_predictions_leaves_precision_undefined() {
        let cm = ConfusionMatrix {
            true_positive: 0,
            true_negative: 5,
            false_positive: 0,
            false_negative: 3,
        };
        let metrics = Metrics::from_confusion(&cm, None);

        assert_eq!(metrics.precision, None);
        assert_eq!(metrics.recall, Some(0.0));
        assert_eq!(metrics.f1, None);
        assert_eq!(metrics.specificity, Some(1.0));
    }

    #[test]
    fn test_roc_auc() {
        let scored = [(0.9, true), (0.8, false), (0.7, true), (0.1, false)];
        let roc = RocCurve::compute(&scored);

        assert_eq!(roc.points.len(), 5);
        assert_eq!(roc.points.last().unwrap().true_positive_rate, 1.0);
        assert_eq!(roc.points.last().unwrap().false_positive_rate, 1.0);
        assert!((roc.auc.unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_roc_ties_form_one_step() {
        let roc = RocCurve::compute(&[(0.5, true), (0.5, false)]);

        assert_eq!(roc.points.len(), 2);
        assert_eq!(roc.auc, Some(0.5));
    }

    #[test]
    fn test_roc_single_class_is_undefined() {
        let roc = RocCurve::compute(&[(0.4, true), (0.6, true)]);
        assert_eq!(roc.auc, None);
        assert!(roc.points.is_empty());
    }

    #[test]
    fn test_skips_unencodable_records() {
        let engine = fixtures::engine();
        let mut records = fixtures::corpus();
        let total = records.len();
        records[1].input.medical_specialty = "Nonexistent-Dept".to_string();
        records[4].outcome = "Readmitted".to_string();

        let report = Evaluator::new(&engine, 0.5)
            .evaluate(ModelId::Linear, &records)
            .unwrap();

        assert_eq!(report.skipped_count(), 2);
        assert_eq!(report.evaluated, total - 2);
        assert_eq!(report.confusion.total() as usize, total - 2);
        assert_eq!(report.skipped[0].index, 1);
        assert_eq!(report.skipped[0].kind, "unknown_category");
        assert_eq!(report.skipped[1].index, 4);
    }

    #[test]
    fn test_all_negative_predictions() {
        let engine = fixtures::engine();
        let records = fixtures::corpus();

        // The fixture tree never exceeds 0.7
        let report = Evaluator::new(&engine, 0.9)
            .evaluate(ModelId::Tree, &records)
            .unwrap();

        assert!(report.confusion.true_positive + report.confusion.false_negative > 0);
        assert_eq!(report.metrics.precision, None);
        assert_eq!(report.metrics.recall, Some(0.0));
    }

    #[test]
    fn test_record_order_does_not_change_report() {
        let engine = fixtures::engine();
        let records = fixtures::corpus();
        let mut reversed = records.clone();
        reversed.reverse();

        let evaluator = Evaluator::new(&engine, 0.5);
        for id in ModelId::ALL {
            let a = evaluator.evaluate(id, &records).unwrap();
            let b = evaluator.evaluate(id, &reversed).unwrap();
            assert_eq!(a.metrics, b.metrics);
            assert_eq!(a.roc, b.roc);
        }
    }

    #[test]
    fn test_evaluate_all_loaded_models() {
        let engine = fixtures::engine();
        let reports = Evaluator::new(&engine, 0.5)
            .evaluate_models(&[], &fixtures::corpus())
            .unwrap();

        let ids: Vec<ModelId> = reports.iter().map(|r| r.model).collect();
        assert_eq!(ids, ModelId::ALL.to_vec());
        for report in &reports {
            assert!(report.metrics.auc.is_some());
        }
    }

    #[test]
    fn test_missing_model_aborts() {
        let engine = InferenceEngine::new(
            Arc::new(fixtures::feature_store()),
            Arc::new(ModelRegistry::new()),
            ScoreAggregator::default(),
            RiskTierThresholds::default(),
        );

        let err = Evaluator::new(&engine, 0.5)
            .evaluate(ModelId::Ensemble, &fixtures::corpus())
            .unwrap_err();
        assert!(matches!(err, PipelineError::ModelNotLoaded(ModelId::Ensemble)));
    }

    #[test]
    fn test_schema_drift_aborts_batch() {
        let engine = fixtures::drifted_engine();

        let err = Evaluator::new(&engine, 0.5)
            .evaluate(ModelId::Tree, &fixtures::corpus())
            .unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    }
}
