mod fields;
mod scanner;

pub use fields::{clamp_score, FieldReader, SCORE_MAX, SCORE_MIN};
pub use scanner::{extract_json_payload, strip_wrappers, ExtractedPayload};

use tracing::debug;

use crate::error::ExtractionError;

/// A result type the extractor can build from a model payload.
pub trait StructuredOutput: Sized {
    /// Human-readable schema name used in validation errors.
    const SCHEMA: &'static str;

    fn from_fields(fields: &mut FieldReader<'_>) -> Self;
}

/// Locates, parses and coerces `raw` into `T`.
///
/// Missing or wrong-typed fields take their documented defaults; only text with no
/// JSON object, unparseable JSON, or an object sharing no field with `T` fail.
pub fn extract_structured<T: StructuredOutput>(raw: &str) -> Result<T, ExtractionError> {
    let payload = extract_json_payload(raw)?;
    from_payload(&payload)
}

pub fn from_payload<T: StructuredOutput>(payload: &ExtractedPayload) -> Result<T, ExtractionError> {
    let mut fields = FieldReader::new(T::SCHEMA, payload);
    let value = T::from_fields(&mut fields);
    let defaulted = fields.finish()?;
    if !defaulted.is_empty() {
        debug!(schema = T::SCHEMA, ?defaulted, "fields recovered with defaults");
    }
    Ok(value)
}
