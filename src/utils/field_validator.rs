// utils/field_validator.rs

use validator::{ValidationError as FieldError, ValidationErrors};

use crate::error::ValidationError;

/// Custom `validator` check: the value must have non-whitespace content.
/// The value itself is kept as given, not trimmed.
pub fn not_blank(value: &str) -> Result<(), FieldError> {
    if value.trim().is_empty() {
        return Err(FieldError::new("blank"));
    }
    Ok(())
}

/// Picks the cause for the first field, in `order`, that failed validation.
///
/// Field names are the struct's own field names.
pub fn first_failure<I>(errors: &ValidationErrors, order: I) -> ValidationError
where
    I: IntoIterator<Item = (&'static str, ValidationError)>,
{
    let failed = errors.field_errors();
    order
        .into_iter()
        .find(|(field, _)| failed.contains_key(field))
        .map(|(_, cause)| cause)
        .unwrap_or_else(|| ValidationError::MalformedBody(errors.to_string()))
}
