pub mod dispatch;

use rustc_hash::FxHashMap;

use crate::config::ModelConfig;
use crate::error::ProxyError;

/// Case-insensitive index from client-facing model names to upstream models.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<ModelConfig>,
    index: FxHashMap<String, usize>,
}

impl ModelRegistry {
    /// Build the index. On duplicate names the first entry wins; config
    /// validation rejects duplicates before this point.
    #[must_use]
    pub fn new(models: &[ModelConfig]) -> Self {
        let mut index = FxHashMap::default();
        for (idx, model) in models.iter().enumerate() {
            index.entry(model.name.to_lowercase()).or_insert(idx);
        }
        Self {
            models: models.to_vec(),
            index,
        }
    }

    /// Resolve a requested model name.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::InvalidModel` for an unknown name.
    pub fn lookup(&self, name: &str) -> Result<&ModelConfig, ProxyError> {
        let found = match self.index.get(name) {
            Some(idx) => Some(*idx),
            None => self.index.get(&name.to_lowercase()).copied(),
        };
        found
            .and_then(|idx| self.models.get(idx))
            .ok_or_else(|| ProxyError::InvalidModel(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelConfig> {
        self.models.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_models;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = ModelRegistry::new(&default_models());
        let model = registry.lookup("DeepSeek-R1").unwrap();
        assert_eq!(model.upstream_id, "deep_seek");
        assert!(model.support_functions.is_empty());

        let model = registry.lookup("deepseek-v3-SEARCH").unwrap();
        assert_eq!(model.upstream_id, "deep_seek_v3");
        assert_eq!(model.support_functions, vec!["supportInternetSearch"]);
    }

    #[test]
    fn test_unknown_model() {
        let registry = ModelRegistry::new(&default_models());
        let err = registry.lookup("gpt-4o").unwrap_err();
        assert!(matches!(err, ProxyError::InvalidModel(ref name) if name == "gpt-4o"));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_iter_keeps_config_order() {
        let registry = ModelRegistry::new(&default_models());
        let names: Vec<&str> = registry.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names.first(), Some(&"deepseek-v3"));
        assert_eq!(registry.len(), default_models().len());
    }
}
