//! Customer name to customer id relocation
//!
//! Documents of one type carry a free-text `customer` name. This transform
//! resolves it through a fixed table, stores the id in `customerId`, drops
//! the name and moves the document into the customer's partition.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::document::{Document, QueryFilter};

use super::{Transform, TransformError, TransformResult};

pub const NAME: &str = "customer-partition";

const CUSTOMER_FIELD: &str = "customer";
const CUSTOMER_ID_FIELD: &str = "customerId";
const TYPE_FIELD: &str = "_type";

#[derive(Debug, Deserialize)]
struct Options {
    #[serde(default)]
    document_type: Option<String>,
    mapping: BTreeMap<String, String>,
}

/// Maps `customer` names to partition keys
#[derive(Debug, Clone)]
pub struct CustomerPartitionTransform {
    document_type: Option<String>,
    mapping: BTreeMap<String, String>,
}

impl CustomerPartitionTransform {
    /// Create from a document type (optional) and a mapping table
    pub fn new(
        document_type: Option<String>,
        mapping: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            document_type,
            mapping: mapping.into_iter().collect(),
        }
    }

    /// Build from `transform_options`
    pub fn from_options(options: &Value) -> Result<Self, TransformError> {
        let options: Options =
            serde_json::from_value(options.clone()).map_err(|e| TransformError::InvalidOptions {
                transform: NAME.to_string(),
                reason: e.to_string(),
            })?;

        if options.mapping.is_empty() {
            return Err(TransformError::InvalidOptions {
                transform: NAME.to_string(),
                reason: "mapping must not be empty".to_string(),
            });
        }

        Ok(Self::new(options.document_type, options.mapping))
    }
}

impl Transform for CustomerPartitionTransform {
    fn name(&self) -> &str {
        NAME
    }

    fn query(&self) -> QueryFilter {
        let filter = match &self.document_type {
            Some(t) => QueryFilter::all().eq(TYPE_FIELD, Value::String(t.clone())),
            None => QueryFilter::all(),
        };
        // Relocated documents no longer carry a name and drop out of the scan
        filter.exists(CUSTOMER_FIELD)
    }

    fn apply(&self, document: &Document) -> Result<TransformResult, TransformError> {
        let customer = match document.body.get(CUSTOMER_FIELD) {
            None | Some(Value::Null) => return Ok(TransformResult::Skip),
            Some(Value::String(s)) => s,
            Some(other) => {
                return Err(TransformError::InvalidField {
                    field: CUSTOMER_FIELD.to_string(),
                    reason: format!("expected string, found {}", other),
                })
            }
        };

        let customer_id =
            self.mapping
                .get(customer)
                .ok_or_else(|| TransformError::UnmappedValue {
                    field: CUSTOMER_FIELD.to_string(),
                    value: customer.clone(),
                })?;

        let mut replacement = document.clone();
        replacement.remove(CUSTOMER_FIELD);
        replacement.set(CUSTOMER_ID_FIELD, Value::String(customer_id.clone()));
        replacement.partition_key = customer_id.clone();

        Ok(TransformResult::Replace(replacement))
    }
}
