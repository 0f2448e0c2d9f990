//! Training-time vocabularies and column layouts.
//!
//! A [`FeatureStore`] is built once, either derived from a training corpus or
//! loaded from the JSON artifact the training run emitted, and is read-only
//! afterwards. Every encoder call and every model load references the same
//! instance, usually behind an `Arc`.

use crate::error::{PipelineError, Result};
use crate::features::derived::DerivedField;
use crate::types::{CategoricalField, LabeledRecord, NumericField, OUTCOME_FIELD};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// Token that marks the affirmative level of a binary field.
pub const DEFAULT_AFFIRMATIVE_TOKEN: &str = "yes";

/// Outcome label treated as the positive (readmitted) class.
pub const DEFAULT_POSITIVE_OUTCOME: &str = "yes";

/// How a categorical field is laid out in the linear encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// One 0/1 column, set when the value equals the affirmative token
    Binary,
    /// One indicator column per level
    Nominal,
}

impl FieldKind {
    /// Layout used when deriving a store from a corpus.
    pub fn for_field(field: CategoricalField) -> Self {
        match field {
            CategoricalField::Change | CategoricalField::DiabetesMed => FieldKind::Binary,
            _ => FieldKind::Nominal,
        }
    }
}

/// Name of the linear indicator column for one level of a nominal field.
pub fn indicator_column(field: CategoricalField, level: &str) -> String {
    format!("{}:{}", field.name(), level)
}

/// Closed, ordered set of levels for one categorical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryVocabulary {
    pub field: CategoricalField,
    pub kind: FieldKind,
    levels: Vec<String>,
}

impl CategoryVocabulary {
    pub fn new(field: CategoricalField, kind: FieldKind, levels: Vec<String>) -> Self {
        Self {
            field,
            kind,
            levels,
        }
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn position(&self, value: &str) -> Option<usize> {
        self.levels.iter().position(|level| level == value)
    }

    pub fn contains(&self, value: &str) -> bool {
        self.position(value).is_some()
    }

    /// Index of `value` among the levels, or `UnknownCategory`.
    pub fn check(&self, value: &str) -> Result<usize> {
        self.position(value)
            .ok_or_else(|| PipelineError::unknown_category(self.field.name(), value))
    }
}

/// Levels of the outcome column and which of them is the positive class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeVocabulary {
    pub levels: Vec<String>,
    pub positive: String,
}

impl OutcomeVocabulary {
    pub fn check(&self, label: &str) -> Result<usize> {
        self.levels
            .iter()
            .position(|level| level == label)
            .ok_or_else(|| PipelineError::unknown_category(OUTCOME_FIELD, label))
    }

    pub fn is_positive(&self, label: &str) -> Result<bool> {
        self.check(label)?;
        Ok(label == self.positive)
    }
}

/// Fixed column order of the linear encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ColumnSchema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl ColumnSchema {
    pub fn new(columns: Vec<String>) -> std::result::Result<Self, String> {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if index.insert(column.clone(), i).is_some() {
                return Err(format!("duplicate column '{column}'"));
            }
        }
        Ok(Self { columns, index })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }
}

impl PartialEq for ColumnSchema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for ColumnSchema {}

impl TryFrom<Vec<String>> for ColumnSchema {
    type Error = String;

    fn try_from(columns: Vec<String>) -> std::result::Result<Self, Self::Error> {
        Self::new(columns)
    }
}

impl From<ColumnSchema> for Vec<String> {
    fn from(schema: ColumnSchema) -> Self {
        schema.columns
    }
}

/// One field of the tree-form record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeColumn {
    Numeric(NumericField),
    Derived(DerivedField),
    Categorical(CategoricalField),
    /// Structural placeholder for the outcome column. Never read by a model.
    Outcome,
}

impl TreeColumn {
    pub fn name(self) -> &'static str {
        match self {
            TreeColumn::Numeric(f) => f.name(),
            TreeColumn::Derived(f) => f.name(),
            TreeColumn::Categorical(f) => f.name(),
            TreeColumn::Outcome => OUTCOME_FIELD,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        if name == OUTCOME_FIELD {
            return Some(TreeColumn::Outcome);
        }
        NumericField::from_name(name)
            .map(TreeColumn::Numeric)
            .or_else(|| DerivedField::from_name(name).map(TreeColumn::Derived))
            .or_else(|| CategoricalField::from_name(name).map(TreeColumn::Categorical))
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, TreeColumn::Numeric(_) | TreeColumn::Derived(_))
    }
}

/// Field order of the tree-form record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct TreeSchema {
    columns: Vec<TreeColumn>,
}

impl TreeSchema {
    pub fn new(columns: Vec<TreeColumn>) -> std::result::Result<Self, String> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(*column) {
                return Err(format!("duplicate tree field '{}'", column.name()));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[TreeColumn] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    pub fn includes_outcome(&self) -> bool {
        self.columns.contains(&TreeColumn::Outcome)
    }
}

impl TryFrom<Vec<String>> for TreeSchema {
    type Error = String;

    fn try_from(names: Vec<String>) -> std::result::Result<Self, Self::Error> {
        let columns = names
            .iter()
            .map(|name| {
                TreeColumn::from_name(name).ok_or_else(|| format!("unknown tree field '{name}'"))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::new(columns)
    }
}

impl From<TreeSchema> for Vec<String> {
    fn from(schema: TreeSchema) -> Self {
        schema.columns.iter().map(|c| c.name().to_string()).collect()
    }
}

/// Vocabularies and layouts captured when the training dataset was finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStore {
    version: String,
    affirmative_token: String,
    outcome: OutcomeVocabulary,
    fields: Vec<CategoryVocabulary>,
    linear_schema: ColumnSchema,
    tree_schema: TreeSchema,
}

impl FeatureStore {
    /// Assemble a store with canonical linear and tree layouts.
    pub fn new(
        version: impl Into<String>,
        affirmative_token: impl Into<String>,
        outcome: OutcomeVocabulary,
        mut fields: Vec<CategoryVocabulary>,
        outcome_placeholder: bool,
    ) -> Result<Self> {
        let affirmative_token = affirmative_token.into();
        fields.sort_by_key(|v| v.field);

        let linear_schema = ColumnSchema::new(canonical_linear_columns(&fields))
            .map_err(PipelineError::InvalidCorpus)?;
        let tree_schema = TreeSchema::new(canonical_tree_columns(outcome_placeholder))
            .map_err(PipelineError::InvalidCorpus)?;

        let store = Self {
            version: version.into(),
            affirmative_token,
            outcome,
            fields,
            linear_schema,
            tree_schema,
        };
        store.validate().map_err(PipelineError::InvalidCorpus)?;
        Ok(store)
    }

    /// Capture vocabularies from a training corpus.
    ///
    /// Levels are sorted, so deriving twice from the same corpus yields the
    /// same store regardless of record order. Binary fields always get the
    /// affirmative token as a level; a corpus that never contains it yields a
    /// column that is always 0.
    pub fn derive(records: &[LabeledRecord], version: impl Into<String>) -> Result<Self> {
        if records.is_empty() {
            return Err(PipelineError::InvalidCorpus("no records".to_string()));
        }

        let fields = CategoricalField::ALL
            .into_iter()
            .map(|field| {
                let kind = FieldKind::for_field(field);
                let mut levels: BTreeSet<&str> = records
                    .iter()
                    .map(|r| r.input.categorical(field))
                    .collect();
                if kind == FieldKind::Binary {
                    levels.insert(DEFAULT_AFFIRMATIVE_TOKEN);
                }
                CategoryVocabulary::new(
                    field,
                    kind,
                    levels.into_iter().map(str::to_string).collect(),
                )
            })
            .collect();

        let outcome_levels: BTreeSet<&str> = records.iter().map(|r| r.outcome.as_str()).collect();
        let outcome = OutcomeVocabulary {
            levels: outcome_levels.into_iter().map(str::to_string).collect(),
            positive: DEFAULT_POSITIVE_OUTCOME.to_string(),
        };

        let store = Self::new(version, DEFAULT_AFFIRMATIVE_TOKEN, outcome, fields, true)?;
        info!(
            version = %store.version,
            records = records.len(),
            linear_columns = store.linear_schema.len(),
            "Feature store derived from training corpus"
        );
        Ok(store)
    }

    /// Read and validate a feature store artifact.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| PipelineError::ArtifactIo {
            path: path.to_path_buf(),
            source,
        })?;
        let mut store: FeatureStore = serde_json::from_reader(BufReader::new(file)).map_err(
            |source| PipelineError::ArtifactFormat {
                path: path.to_path_buf(),
                source,
            },
        )?;
        store.fields.sort_by_key(|v| v.field);
        store
            .validate()
            .map_err(|reason| PipelineError::InvalidArtifact {
                path: path.to_path_buf(),
                reason,
            })?;

        info!(
            path = %path.display(),
            version = %store.version,
            linear_columns = store.linear_schema.len(),
            tree_fields = store.tree_schema.columns().len(),
            "Feature store loaded"
        );
        Ok(store)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| PipelineError::ArtifactIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).map_err(|source| {
            PipelineError::ArtifactFormat {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    fn validate(&self) -> std::result::Result<(), String> {
        for (expected, vocab) in CategoricalField::ALL.iter().zip(&self.fields) {
            if vocab.field != *expected {
                return Err(format!("missing or duplicated field '{expected}'"));
            }
        }
        if self.fields.len() != CategoricalField::ALL.len() {
            return Err(format!(
                "expected {} categorical fields, found {}",
                CategoricalField::ALL.len(),
                self.fields.len()
            ));
        }

        for vocab in &self.fields {
            check_levels(vocab.field.name(), &vocab.levels)?;
            if vocab.kind == FieldKind::Binary && !vocab.contains(&self.affirmative_token) {
                return Err(format!(
                    "binary field '{}' has no '{}' level",
                    vocab.field, self.affirmative_token
                ));
            }
        }

        check_levels(OUTCOME_FIELD, &self.outcome.levels)?;
        if !self.outcome.levels.contains(&self.outcome.positive) {
            return Err(format!(
                "positive outcome '{}' is not an outcome level",
                self.outcome.positive
            ));
        }

        let expected: HashSet<String> = canonical_linear_columns(&self.fields).into_iter().collect();
        let actual: HashSet<String> = self.linear_schema.columns().iter().cloned().collect();
        if expected != actual {
            let mut missing: Vec<_> = expected.difference(&actual).cloned().collect();
            let mut extra: Vec<_> = actual.difference(&expected).cloned().collect();
            missing.sort();
            extra.sort();
            return Err(format!(
                "linear schema drifted from vocabulary (missing {missing:?}, extra {extra:?})"
            ));
        }

        for column in canonical_tree_columns(false) {
            if !self.tree_schema.columns().contains(&column) {
                return Err(format!("tree schema lacks field '{}'", column.name()));
            }
        }

        Ok(())
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn affirmative_token(&self) -> &str {
        &self.affirmative_token
    }

    pub fn outcome(&self) -> &OutcomeVocabulary {
        &self.outcome
    }

    pub fn fields(&self) -> &[CategoryVocabulary] {
        &self.fields
    }

    pub fn vocabulary(&self, field: CategoricalField) -> &CategoryVocabulary {
        // validate() guarantees one entry per field in declaration order
        &self.fields[field as usize]
    }

    pub fn linear_schema(&self) -> &ColumnSchema {
        &self.linear_schema
    }

    pub fn tree_schema(&self) -> &TreeSchema {
        &self.tree_schema
    }
}

fn check_levels(field: &str, levels: &[String]) -> std::result::Result<(), String> {
    if levels.is_empty() {
        return Err(format!("field '{field}' has no levels"));
    }
    let mut seen = HashSet::new();
    for level in levels {
        if !seen.insert(level) {
            return Err(format!("field '{field}' repeats level '{level}'"));
        }
    }
    Ok(())
}

fn canonical_linear_columns(fields: &[CategoryVocabulary]) -> Vec<String> {
    let mut columns: Vec<String> = NumericField::ALL
        .iter()
        .map(|f| f.name().to_string())
        .chain(DerivedField::ALL.iter().map(|f| f.name().to_string()))
        .collect();

    for vocab in fields {
        match vocab.kind {
            FieldKind::Binary => columns.push(vocab.field.name().to_string()),
            FieldKind::Nominal => columns.extend(
                vocab
                    .levels
                    .iter()
                    .map(|level| indicator_column(vocab.field, level)),
            ),
        }
    }
    columns
}

fn canonical_tree_columns(outcome_placeholder: bool) -> Vec<TreeColumn> {
    let mut columns: Vec<TreeColumn> = NumericField::ALL
        .into_iter()
        .map(TreeColumn::Numeric)
        .chain(DerivedField::ALL.into_iter().map(TreeColumn::Derived))
        .chain(CategoricalField::ALL.into_iter().map(TreeColumn::Categorical))
        .collect();
    if outcome_placeholder {
        columns.push(TreeColumn::Outcome);
    }
    columns
}
