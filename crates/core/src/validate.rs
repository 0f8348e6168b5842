//! Input validation
//!
//! Everything here runs before a request leaves the process. A record that
//! fails validation is never submitted, and vectors are never coerced by
//! truncation or padding.

use crate::error::{AnnError, AnnResult};
use crate::record::Sidecar;

/// Maximum collection name length accepted by both remote stores
pub const MAX_COLLECTION_NAME_LEN: usize = 255;

/// Maximum record key length
pub const MAX_KEY_LEN: usize = 1024;

/// Validate a collection name
///
/// # Validation Rules
/// - Cannot be empty
/// - Cannot exceed 255 characters
/// - Must start with a letter or '_'
/// - May contain only ASCII letters, digits, '_' and '-'
pub fn validate_collection_name(name: &str) -> AnnResult<()> {
    if name.is_empty() {
        return Err(AnnError::invalid_input("Collection name cannot be empty"));
    }

    if name.len() > MAX_COLLECTION_NAME_LEN {
        return Err(AnnError::invalid_input(format!(
            "Collection name cannot exceed {} characters",
            MAX_COLLECTION_NAME_LEN
        )));
    }

    let first = name.chars().next().unwrap_or('0');
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(AnnError::invalid_input(format!(
            "Collection name '{}' must start with a letter or '_'",
            name
        )));
    }

    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(AnnError::invalid_input(format!(
            "Collection name '{}' contains invalid character {:?}",
            name, bad
        )));
    }

    Ok(())
}

/// Validate a record key
///
/// # Validation Rules
/// - Cannot be empty (both stores reject empty primary keys)
/// - Cannot exceed 1024 characters
/// - Cannot contain null bytes
pub fn validate_record_key(key: &str) -> AnnResult<()> {
    if key.is_empty() {
        return Err(AnnError::invalid_input("Record key cannot be empty"));
    }

    if key.len() > MAX_KEY_LEN {
        return Err(AnnError::invalid_input(format!(
            "Record key cannot exceed {} characters",
            MAX_KEY_LEN
        )));
    }

    if key.contains('\0') {
        return Err(AnnError::invalid_input(
            "Record key cannot contain null bytes",
        ));
    }

    Ok(())
}

/// Validate a vector against the collection dimension
///
/// Rejects wrong lengths and non-finite components with `Schema`.
pub fn validate_vector(collection: &str, expected: usize, vector: &[f32]) -> AnnResult<()> {
    if vector.len() != expected {
        return Err(AnnError::schema(
            collection,
            format!(
                "Dimension mismatch: expected {}, got {}",
                expected,
                vector.len()
            ),
        ));
    }

    if let Some(pos) = vector.iter().position(|x| !x.is_finite()) {
        return Err(AnnError::schema(
            collection,
            format!("Vector component {} is not finite", pos),
        ));
    }

    Ok(())
}

/// Check a record key against the primary field's declared `max_length`
///
/// The length is counted in bytes, as the stores count it for VarChar.
pub fn validate_key_length(key: &str, max_length: usize) -> AnnResult<()> {
    if key.len() > max_length {
        return Err(AnnError::invalid_input(format!(
            "Record key is {} bytes, the primary field allows at most {}",
            key.len(),
            max_length
        )));
    }
    Ok(())
}

/// Validate sidecar field names against the reserved primary/vector names
pub fn validate_sidecar(sidecar: &Sidecar, reserved: &[&str]) -> AnnResult<()> {
    for name in sidecar.keys() {
        if name.is_empty() {
            return Err(AnnError::invalid_input("Sidecar field name cannot be empty"));
        }
        if reserved.contains(&name.as_str()) {
            return Err(AnnError::invalid_input(format!(
                "Sidecar field '{}' collides with a reserved field",
                name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    #[test]
    fn test_valid_collection_names() {
        assert!(validate_collection_name("reverse_image_search").is_ok());
        assert!(validate_collection_name("images-2048").is_ok());
        assert!(validate_collection_name("_staging").is_ok());
        assert!(validate_collection_name("a").is_ok());
    }

    #[test]
    fn test_invalid_collection_names() {
        assert!(validate_collection_name("").is_err());
        assert!(validate_collection_name("1images").is_err());
        assert!(validate_collection_name("has space").is_err());
        assert!(validate_collection_name("has/slash").is_err());
        assert!(validate_collection_name(&"a".repeat(256)).is_err());
        assert!(validate_collection_name(&"a".repeat(255)).is_ok());
    }

    #[test]
    fn test_record_keys() {
        assert!(validate_record_key("train/goldfish/n01443537_1.JPEG").is_ok());
        assert!(validate_record_key("").is_err());
        assert!(validate_record_key("a\0b").is_err());
        assert!(validate_record_key(&"k".repeat(1025)).is_err());
        assert!(validate_record_key(&"k".repeat(1024)).is_ok());
    }

    #[test]
    fn test_key_length_counts_bytes() {
        assert!(validate_key_length(&"k".repeat(64), 64).is_ok());
        let err = validate_key_length(&"k".repeat(65), 64).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        // 'é' is two bytes in UTF-8
        assert!(validate_key_length(&"é".repeat(33), 64).is_err());
    }

    #[test]
    fn test_vector_non_finite_rejected() {
        let err = validate_vector("c", 3, &[1.0, f32::NAN, 0.0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(validate_vector("c", 2, &[f32::INFINITY, 0.0]).is_err());
    }

    #[test]
    fn test_sidecar_reserved_names() {
        let mut sidecar = Sidecar::new();
        sidecar.insert("path".to_string(), "a.jpg".into());
        assert!(validate_sidecar(&sidecar, &["id", "embedding"]).is_ok());

        sidecar.insert("embedding".to_string(), "oops".into());
        assert!(validate_sidecar(&sidecar, &["id", "embedding"]).is_err());
    }

    proptest! {
        #[test]
        fn prop_dimension_mismatch_always_schema_error(
            expected in 1usize..64,
            got in 0usize..64,
        ) {
            prop_assume!(expected != got);
            let v = vec![0.5f32; got];
            let err = validate_vector("c", expected, &v).unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::Schema);
        }

        #[test]
        fn prop_matching_finite_vector_accepted(
            v in proptest::collection::vec(-1e6f32..1e6, 1..64),
        ) {
            prop_assert!(validate_vector("c", v.len(), &v).is_ok());
        }
    }
}
