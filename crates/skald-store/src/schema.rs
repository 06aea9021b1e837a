use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Arrow schema for the knowledge table. The vector width comes from the
/// configured embedding dimensionality and must match the embedder.
pub fn build_store_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("file_path", DataType::Utf8, false),
        Field::new("content_hash", DataType::Utf8, false),
        Field::new("chunk_index", DataType::Int32, false),
        Field::new("file_size", DataType::Int64, false),
        Field::new("last_modified", DataType::Float64, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim),
            true,
        ),
    ]))
}

/// Width of the FixedSizeList vector column, if the field is one.
pub fn vector_dim_of(schema: &Schema) -> Option<i32> {
    match schema.field_with_name("vector").ok()?.data_type() {
        DataType::FixedSizeList(_, size) => Some(*size),
        _ => None,
    }
}
