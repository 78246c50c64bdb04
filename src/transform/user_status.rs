//! User account rewrites
//!
//! `user-status` renames `userId` to `userIdentifier` and folds legacy
//! closure flags into `status`. `select-all` selects every document and
//! never rewrites one; it exists to drive `delete_documents` runs.

use serde_json::Value;

use crate::document::{Document, QueryFilter};

use super::{Transform, TransformError, TransformResult};

pub const USER_STATUS: &str = "user-status";
pub const SELECT_ALL: &str = "select-all";

const B2C_TYPE: &str = "MT.Users.B2C";
const B2B_TYPE: &str = "MT.Users.B2B";

/// Normalizes user identifiers and status values
#[derive(Debug, Clone, Default)]
pub struct UserStatusTransform;

impl Transform for UserStatusTransform {
    fn name(&self) -> &str {
        USER_STATUS
    }

    fn query(&self) -> QueryFilter {
        QueryFilter::all()
    }

    fn apply(&self, document: &Document) -> Result<TransformResult, TransformError> {
        let mut replacement = document.clone();

        if let Some(user_id) = replacement.remove("userId") {
            if !user_id.is_null() {
                replacement.set("userIdentifier", user_id);
            }
        }

        match document.get_str("_type") {
            Some(B2C_TYPE) => {
                let closed = match document.body.get("closed") {
                    None | Some(Value::Null) => false,
                    Some(Value::Bool(b)) => *b,
                    Some(other) => {
                        return Err(TransformError::InvalidField {
                            field: "closed".to_string(),
                            reason: format!("expected bool, found {}", other),
                        })
                    }
                };
                if closed {
                    replacement.set("status", Value::String("Closed".into()));
                }
            }
            Some(B2B_TYPE) => {
                if document.get_str("status") == Some("WaitingForClosure") {
                    replacement.set("status", Value::String("Suspended".into()));
                }
            }
            _ => return Ok(TransformResult::Skip),
        }

        if replacement == *document {
            return Ok(TransformResult::Skip);
        }
        Ok(TransformResult::Replace(replacement))
    }
}

/// Selects everything, rewrites nothing
#[derive(Debug, Clone, Default)]
pub struct SelectAllTransform;

impl Transform for SelectAllTransform {
    fn name(&self) -> &str {
        SELECT_ALL
    }

    fn query(&self) -> QueryFilter {
        QueryFilter::all()
    }

    fn apply(&self, _document: &Document) -> Result<TransformResult, TransformError> {
        Ok(TransformResult::Skip)
    }
}
