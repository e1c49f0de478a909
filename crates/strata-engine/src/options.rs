//! Environment options
//!
//! Table sizes and pool limits of one [`Environment`](crate::Environment).
//! Options can be built in code or parsed from TOML.

use crate::error::{ClassError, ClassResult};
use serde::{Deserialize, Serialize};

/// Width in bits of the per-class traversal record
pub const TRAVERSAL_RECORD_BITS: usize = 256;

/// Options for one environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvOptions {
    /// Buckets of the class hash index
    pub class_table_size: u32,

    /// Buckets of the slot-name hash index
    pub slot_name_table_size: u32,

    /// Range of symbol hash values
    pub symbol_table_size: u32,

    /// Growth and shrink granule of the class id map
    pub class_id_chunk: usize,

    /// Number of traversal ids that may be held at once
    pub max_traversals: usize,

    /// Install the built-in system classes at construction
    pub create_system_classes: bool,
}

impl EnvOptions {
    /// Parse options from TOML; missing keys take their defaults
    pub fn from_toml_str(text: &str) -> ClassResult<Self> {
        let options: EnvOptions =
            toml::from_str(text).map_err(|e| ClassError::InvalidOptions(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Reject sizes the tables cannot work with
    pub fn validate(&self) -> ClassResult<()> {
        if self.class_table_size == 0 {
            return Err(ClassError::InvalidOptions(
                "class_table_size must be positive".into(),
            ));
        }
        if self.slot_name_table_size == 0 {
            return Err(ClassError::InvalidOptions(
                "slot_name_table_size must be positive".into(),
            ));
        }
        if self.symbol_table_size == 0 {
            return Err(ClassError::InvalidOptions(
                "symbol_table_size must be positive".into(),
            ));
        }
        if self.class_id_chunk == 0 {
            return Err(ClassError::InvalidOptions(
                "class_id_chunk must be positive".into(),
            ));
        }
        if self.max_traversals == 0 || self.max_traversals > TRAVERSAL_RECORD_BITS {
            return Err(ClassError::InvalidOptions(format!(
                "max_traversals must be between 1 and {}",
                TRAVERSAL_RECORD_BITS
            )));
        }
        Ok(())
    }
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            class_table_size: 167,
            slot_name_table_size: 167,
            symbol_table_size: 1021,
            class_id_chunk: 30,
            max_traversals: TRAVERSAL_RECORD_BITS,
            create_system_classes: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(EnvOptions::default().validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let options = EnvOptions::from_toml_str(
            "max_traversals = 8\ncreate_system_classes = true\n",
        )
        .unwrap();
        assert_eq!(options.max_traversals, 8);
        assert!(options.create_system_classes);
        assert_eq!(options.class_table_size, 167);
    }

    #[test]
    fn test_traversal_pool_bounded_by_record() {
        let err = EnvOptions::from_toml_str("max_traversals = 257").unwrap_err();
        assert!(matches!(err, ClassError::InvalidOptions(_)));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        assert!(EnvOptions::from_toml_str("class_table_size = \"big\"").is_err());
    }
}
