use std::env;
use std::fmt::{self, Debug, Display};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

impl Error {
    pub fn is_invalid_input_error(&self) -> bool {
        self.code == 101
    }

    pub fn is_configuration_error(&self) -> bool {
        self.code == 102
    }

    /// Infrastructure faults use codes below 100; anything above is the caller's to fix.
    pub fn is_internal(&self) -> bool {
        (1..=99).contains(&self.code)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        env_var_error(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        database_error(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        serialization_error(err)
    }
}

pub fn invalid_input_error() -> Error {
    Error {
        code: 101,
        message: "invalid input".into(),
    }
}

pub fn configuration_error(field: &str) -> Error {
    Error {
        code: 102,
        message: format!("invalid configuration: {}", field),
    }
}

pub fn env_var_error(_: env::VarError) -> Error {
    Error {
        code: 1,
        message: "environment variable error".into(),
    }
}

pub fn database_error<T: Debug>(err: T) -> Error {
    tracing::error!("database error: {:?}", err);

    Error {
        code: 2,
        message: "database error".into(),
    }
}

pub fn serialization_error(_: serde_json::Error) -> Error {
    Error {
        code: 3,
        message: "serialization error".into(),
    }
}

#[test]
fn error_codes_split_internal_from_caller_faults() {
    assert!(database_error("boom").is_internal());
    assert!(!invalid_input_error().is_internal());
    assert!(configuration_error("pricePerKm").is_configuration_error());
    assert_eq!(
        configuration_error("pricePerKm").to_string(),
        "[102] invalid configuration: pricePerKm"
    );
}
