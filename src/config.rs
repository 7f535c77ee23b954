use serde::Deserialize;

use crate::core::{DataError, Result};

/// Data layer configuration
///
/// Shared by the metadata cache (field classification), the fuzzy search
/// synthesizer and the archivable manager.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DataLayerConfig {
    /// Field toggled by archive operations when an archivable type does not
    /// mark its flag explicitly
    pub archive_flag_field: String,

    /// Classify the archive flag as non-updatable so generic update paths
    /// never overwrite it
    pub protect_archive_flag: bool,

    /// Method name of the generated fuzzy search lookup
    pub fuzzy_method_name: String,

    /// Bound parameter name of the fuzzy search term
    pub search_term_param: String,
}

impl DataLayerConfig {
    pub fn new() -> Self {
        Self {
            archive_flag_field: "is_archived".to_string(),
            protect_archive_flag: false,
            fuzzy_method_name: "fuzzy_search".to_string(),
            search_term_param: "searchTerm".to_string(),
        }
    }

    /// Set the default archive flag field
    pub fn archive_flag_field(mut self, field: &str) -> Self {
        self.archive_flag_field = field.to_string();
        self
    }

    /// Protect (or expose) the archive flag from generic updates
    pub fn protect_archive_flag(mut self, protect: bool) -> Self {
        self.protect_archive_flag = protect;
        self
    }

    /// Set the fuzzy search method name
    pub fn fuzzy_method_name(mut self, name: &str) -> Self {
        self.fuzzy_method_name = name.to_string();
        self
    }

    /// Set the fuzzy search parameter name
    pub fn search_term_param(mut self, name: &str) -> Self {
        self.search_term_param = name.to_string();
        self
    }

    /// Parse from a JSON document; absent keys keep their defaults
    ///
    /// ```
    /// # use recordforge::DataLayerConfig;
    /// let config = DataLayerConfig::from_json_str(r#"{"protect_archive_flag": true}"#).unwrap();
    /// assert!(config.protect_archive_flag);
    /// assert_eq!(config.archive_flag_field, "is_archived");
    /// ```
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|err| DataError::Config(format!("invalid data layer config: {}", err)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("archive_flag_field", &self.archive_flag_field),
            ("fuzzy_method_name", &self.fuzzy_method_name),
            ("search_term_param", &self.search_term_param),
        ] {
            if value.trim().is_empty() {
                return Err(DataError::Config(format!("'{}' must not be empty", key)));
            }
        }
        Ok(())
    }
}

impl Default for DataLayerConfig {
    fn default() -> Self {
        Self::new()
    }
}
