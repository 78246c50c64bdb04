//! # Transform Registry
//!
//! Maps configuration names to transform factories. Every name is known at
//! startup, so an unknown name fails before the batch opens a query.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::customer::{self, CustomerPartitionTransform};
use super::user_status::{self, SelectAllTransform, UserStatusTransform};
use super::{Transform, TransformError};

/// Builds a transform from its `transform_options`
pub type TransformFactory = fn(&Value) -> Result<Arc<dyn Transform>, TransformError>;

/// Registry of constructible transforms
#[derive(Clone, Default)]
pub struct TransformRegistry {
    factories: BTreeMap<String, TransformFactory>,
}

impl TransformRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every transform shipped with docshift
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(customer::NAME, build_customer_partition);
        registry.register(user_status::USER_STATUS, build_user_status);
        registry.register(user_status::SELECT_ALL, build_select_all);
        registry
    }

    /// Register a factory; a later registration under the same name wins
    pub fn register(&mut self, name: impl Into<String>, factory: TransformFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Instantiate the transform registered as `name`
    pub fn create(&self, name: &str, options: &Value) -> Result<Arc<dyn Transform>, TransformError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| TransformError::UnknownTransform(name.to_string()))?;
        factory(options)
    }

    /// Whether a name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("names", &self.names())
            .finish()
    }
}

fn build_customer_partition(options: &Value) -> Result<Arc<dyn Transform>, TransformError> {
    Ok(Arc::new(CustomerPartitionTransform::from_options(options)?))
}

fn build_user_status(_options: &Value) -> Result<Arc<dyn Transform>, TransformError> {
    Ok(Arc::new(UserStatusTransform))
}

fn build_select_all(_options: &Value) -> Result<Arc<dyn Transform>, TransformError> {
    Ok(Arc::new(SelectAllTransform))
}
