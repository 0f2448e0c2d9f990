//! Feature store, derived features and model-specific encoders

pub mod derived;
pub mod encoder;
pub mod store;

pub use derived::{DerivedFeatures, DerivedField};
pub use encoder::{
    encode, encode_linear, encode_tree, encode_tree_with_placeholder, EncodedVector,
    EncodingForm, LinearVector, TreeRecord, TreeValue,
};
pub use store::{
    indicator_column, CategoryVocabulary, ColumnSchema, FeatureStore, FieldKind,
    OutcomeVocabulary, TreeColumn, TreeSchema,
};
