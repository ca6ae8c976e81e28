use thiserror::Error;

use super::provisioner::Step;

/// SQLSTATE for `CREATE DATABASE` on an existing name.
const DUPLICATE_DATABASE: &str = "42P04";
/// SQLSTATE for `CREATE ROLE` on an existing name.
const DUPLICATE_OBJECT: &str = "42710";

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{step} failed: {source}")]
    CreateFailed {
        step: Step,
        #[source]
        source: sqlx::Error,
    },
    #[error("role {role} not found after grants")]
    RoleVerificationFailed { role: String },
    #[error("quota installation failed: {source}")]
    QuotaInstallFailed {
        #[source]
        source: sqlx::Error,
    },
    #[error("could not obtain a connection to {db}: {source}")]
    PoolAcquisitionFailed {
        db: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("timed out during {step}")]
    Timeout { step: Step },
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("could not connect to the administrative database: {source}")]
    Connect {
        #[source]
        source: sqlx::Error,
    },
    #[error("provisioning task ended without a result")]
    Aborted,
    #[error("query failed: {source}")]
    Query {
        #[source]
        source: sqlx::Error,
    },
}

impl ProvisionError {
    /// True when a freshly generated name could succeed where this one failed.
    pub fn is_name_collision(&self) -> bool {
        match self {
            ProvisionError::CreateFailed { source, .. } => sqlstate(source)
                .map(|code| code == DUPLICATE_DATABASE || code == DUPLICATE_OBJECT)
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Short machine label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisionError::CreateFailed { .. } => "create_failed",
            ProvisionError::RoleVerificationFailed { .. } => "role_verification_failed",
            ProvisionError::QuotaInstallFailed { .. } => "quota_install_failed",
            ProvisionError::PoolAcquisitionFailed { .. } => "pool_acquisition_failed",
            ProvisionError::Timeout { .. } => "timeout",
            ProvisionError::InvalidIdentifier(_) => "invalid_identifier",
            ProvisionError::Connect { .. } => "connect",
            ProvisionError::Aborted => "aborted",
            ProvisionError::Query { .. } => "query",
        }
    }
}

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_not_collisions() {
        let err = ProvisionError::CreateFailed {
            step: Step::CreateDatabase,
            source: sqlx::Error::RowNotFound,
        };
        assert!(!err.is_name_collision());
        assert_eq!(err.kind(), "create_failed");
    }

    #[test]
    fn verification_failure_names_the_role() {
        let err = ProvisionError::RoleVerificationFailed { role: "user_db_1".into() };
        assert_eq!(err.to_string(), "role user_db_1 not found after grants");
        assert!(!err.is_name_collision());
    }
}
