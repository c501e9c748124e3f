use miette::Diagnostic;
use thiserror::Error;

use crate::authz::store::StoreError;
use crate::authz::types::Action;

#[derive(Debug, Error, Diagnostic)]
pub enum AuthzError {
    /// A denied check. Says nothing about whether the resource exists.
    #[error("`{subject}` is not authorized to {action} `{resource}`")]
    #[diagnostic(code(permissions::authz::unauthorized))]
    Unauthorized {
        subject: String,
        resource: String,
        action: Action,
    },

    #[error("Storage failure: {0}")]
    #[diagnostic(
        code(permissions::authz::storage),
        help("The policy change was not applied; the in-memory rule set is unchanged")
    )]
    Storage(#[from] StoreError),
}

impl AuthzError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AuthzError::Unauthorized { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_message() {
        let err = AuthzError::Unauthorized {
            subject: "alice".into(),
            resource: "model-1".into(),
            action: Action::Write,
        };
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "`alice` is not authorized to write `model-1`");
    }

    #[test]
    fn test_storage_wraps_store_error() {
        let err: AuthzError = StoreError::Corrupt("action `x`".into()).into();
        assert!(!err.is_unauthorized());
        assert!(err.to_string().contains("action `x`"));
    }
}
