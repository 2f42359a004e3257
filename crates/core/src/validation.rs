//! Input validation utilities.
//!
//! Checks applied to caller-supplied submission content before it reaches the lifecycle or
//! storage.

use crate::{ClinicError, ClinicResult};
use serde_json::Value;

/// Validates the free-form exam answers attached to a submission.
///
/// The value must be a JSON object and its compact serialisation must not exceed `max_bytes`.
///
/// # Errors
///
/// Returns [`ClinicError::InvalidArgument`] if either condition fails.
pub fn validate_form_data(form_data: &Value, max_bytes: usize) -> ClinicResult<()> {
    if !form_data.is_object() {
        return Err(ClinicError::InvalidArgument(
            "form_data must be a JSON object".into(),
        ));
    }

    let size = serde_json::to_vec(form_data)
        .map_err(ClinicError::Serialization)?
        .len();
    if size > max_bytes {
        return Err(ClinicError::InvalidArgument(format!(
            "form_data exceeds maximum size of {max_bytes} bytes"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_form_data_accepts_object() {
        assert!(validate_form_data(&json!({ "blood_pressure": "120/80" }), 1024).is_ok());
    }

    #[test]
    fn test_validate_form_data_rejects_non_objects() {
        for value in [json!([]), json!("text"), json!(null), json!(3)] {
            assert!(matches!(
                validate_form_data(&value, 1024),
                Err(ClinicError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_validate_form_data_rejects_oversized() {
        let big = json!({ "notes": "x".repeat(100) });
        assert!(validate_form_data(&big, 50).is_err());
        assert!(validate_form_data(&big, 1000).is_ok());
    }
}
