//! Model-specific encodings of a raw input.
//!
//! Both forms go through the same vocabulary checks and the same derived
//! feature calculation, so the batch evaluator and the interactive service
//! can not drift apart.

use crate::error::{PipelineError, Result};
use crate::features::derived::{DerivedFeatures, DerivedField};
use crate::features::store::{indicator_column, ColumnSchema, FeatureStore, FieldKind, TreeColumn};
use crate::types::{NumericField, RawInput};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Layout a fitted model consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingForm {
    /// One-hot expanded numeric vector
    Linear,
    /// Categorical values kept as levels
    Tree,
}

impl fmt::Display for EncodingForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingForm::Linear => f.write_str("linear"),
            EncodingForm::Tree => f.write_str("tree"),
        }
    }
}

/// Numeric vector in training column order.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearVector {
    columns: Vec<String>,
    values: Vec<f64>,
}

impl LinearVector {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i])
    }

    /// Fails unless the column set and order equal `schema` exactly.
    pub fn conforms_to(&self, schema: &ColumnSchema) -> Result<()> {
        if self.columns.len() != self.values.len() {
            return Err(PipelineError::schema_mismatch(format!(
                "{} columns but {} values",
                self.columns.len(),
                self.values.len()
            )));
        }
        if self.columns.as_slice() != schema.columns() {
            let extra: Vec<&String> = self
                .columns
                .iter()
                .filter(|c| schema.index_of(c).is_none())
                .collect();
            let missing: Vec<&String> = schema
                .columns()
                .iter()
                .filter(|c| !self.columns.contains(c))
                .collect();
            return Err(PipelineError::schema_mismatch(format!(
                "linear columns differ from schema (extra {extra:?}, missing {missing:?})"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeValue {
    Numeric(f64),
    Level(String),
}

/// Field values in tree-schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeRecord {
    fields: Vec<(TreeColumn, TreeValue)>,
}

impl TreeRecord {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = TreeColumn> + '_ {
        self.fields.iter().map(|(column, _)| *column)
    }

    pub fn value(&self, index: usize) -> Option<&TreeValue> {
        self.fields.get(index).map(|(_, value)| value)
    }

    pub fn get(&self, column: TreeColumn) -> Option<&TreeValue> {
        self.fields
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, value)| value)
    }
}

/// An encoded record in the layout of one model family.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedVector {
    Linear(LinearVector),
    Tree(TreeRecord),
}

impl EncodedVector {
    pub fn form(&self) -> EncodingForm {
        match self {
            EncodedVector::Linear(_) => EncodingForm::Linear,
            EncodedVector::Tree(_) => EncodingForm::Tree,
        }
    }
}

/// Encode `raw` in the requested form.
pub fn encode(raw: &RawInput, store: &FeatureStore, form: EncodingForm) -> Result<EncodedVector> {
    match form {
        EncodingForm::Linear => encode_linear(raw, store).map(EncodedVector::Linear),
        EncodingForm::Tree => encode_tree(raw, store).map(EncodedVector::Tree),
    }
}

/// One-hot encoding for the logistic model.
///
/// Nominal fields expand to one indicator per level, binary fields become 1
/// only on an exact match with the store's affirmative token, and numeric and
/// derived values pass through. The result always carries exactly the
/// store's linear schema.
pub fn encode_linear(raw: &RawInput, store: &FeatureStore) -> Result<LinearVector> {
    let derived = DerivedFeatures::compute(raw);
    let schema = store.linear_schema();
    let mut produced: Vec<(String, f64)> = Vec::with_capacity(schema.len());

    for field in NumericField::ALL {
        produced.push((field.name().to_string(), raw.numeric(field)));
    }
    for field in DerivedField::ALL {
        produced.push((field.name().to_string(), derived.get(field)));
    }

    for vocab in store.fields() {
        let value = raw.categorical(vocab.field);
        vocab.check(value)?;
        match vocab.kind {
            FieldKind::Binary => {
                let flag = if value == store.affirmative_token() { 1.0 } else { 0.0 };
                produced.push((vocab.field.name().to_string(), flag));
            }
            FieldKind::Nominal => {
                for level in vocab.levels() {
                    let indicator = if level == value { 1.0 } else { 0.0 };
                    produced.push((indicator_column(vocab.field, level), indicator));
                }
            }
        }
    }

    assemble_linear(produced, schema)
}

/// Place produced columns into schema order. Schema columns nobody produced
/// stay 0. A produced column outside the schema, or one produced twice, is a
/// drift defect; together with the vocabulary/schema agreement checked when
/// the store is built, this keeps the output on the training layout.
pub(crate) fn assemble_linear(
    produced: Vec<(String, f64)>,
    schema: &ColumnSchema,
) -> Result<LinearVector> {
    let mut values = vec![0.0; schema.len()];
    let mut filled = vec![false; schema.len()];

    for (column, value) in produced {
        let index = schema.index_of(&column).ok_or_else(|| {
            PipelineError::schema_mismatch(format!("column '{column}' is not in the training schema"))
        })?;
        if filled[index] {
            return Err(PipelineError::schema_mismatch(format!(
                "column '{column}' produced twice"
            )));
        }
        values[index] = value;
        filled[index] = true;
    }

    Ok(LinearVector {
        columns: schema.columns().to_vec(),
        values,
    })
}

/// Level-preserving encoding for the tree models, using the first outcome
/// level as the placeholder.
pub fn encode_tree(raw: &RawInput, store: &FeatureStore) -> Result<TreeRecord> {
    let placeholder = store
        .outcome()
        .levels
        .first()
        .ok_or_else(|| PipelineError::schema_mismatch("outcome vocabulary is empty"))?;
    encode_tree_with_placeholder(raw, store, placeholder)
}

/// Tree encoding with an explicit outcome placeholder.
///
/// The placeholder only exists because the tree schema carries the outcome
/// column. Loaded tree models are rejected if they split on it, so its value
/// can not reach a probability.
pub fn encode_tree_with_placeholder(
    raw: &RawInput,
    store: &FeatureStore,
    placeholder: &str,
) -> Result<TreeRecord> {
    let derived = DerivedFeatures::compute(raw);
    let columns = store.tree_schema().columns();
    let mut fields = Vec::with_capacity(columns.len());

    for &column in columns {
        let value = match column {
            TreeColumn::Numeric(field) => TreeValue::Numeric(raw.numeric(field)),
            TreeColumn::Derived(field) => TreeValue::Numeric(derived.get(field)),
            TreeColumn::Categorical(field) => {
                let value = raw.categorical(field);
                store.vocabulary(field).check(value)?;
                TreeValue::Level(value.to_string())
            }
            TreeColumn::Outcome => {
                store.outcome().check(placeholder)?;
                TreeValue::Level(placeholder.to_string())
            }
        };
        fields.push((column, value));
    }

    Ok(TreeRecord { fields })
}
