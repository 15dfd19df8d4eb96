use thiserror::Error;

/// Service-level errors that can occur in business logic
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Product not found: {id}")]
    ProductNotFound { id: String },

    #[error("No products found: {criteria}")]
    NoProductsFound { criteria: String },

    #[error("Cart not found for user: {user_id}")]
    CartNotFound { user_id: String },

    #[error("Cart item not found: product_id={product_id}, user_id={user_id}")]
    CartItemNotFound { user_id: String, product_id: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Repository error: {source}")]
    Repository {
        #[from]
        source: RepositoryError,
    },
}

/// Repository-level errors for data access operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database connection failed")]
    ConnectionFailed,

    #[error("Conditional check failed")]
    ConditionFailed,

    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("AWS SDK error: {message}")]
    AwsSdk { message: String },

    #[error("DynamoDB table not found: {table_name}. Ensure the table exists and IAM permissions are correct.")]
    TableNotFound { table_name: String },

    #[error("Invalid document: {message}")]
    InvalidDocument { message: String },

    #[error("Timeout occurred during operation")]
    Timeout,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

/// Validation errors raised while casting request bodies to a collection schema
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Cast to {expected} failed for value {value} at path \"{field}\"")]
    CastFailed {
        field: String,
        expected: String,
        value: String,
    },

    #[error("Request body must be a JSON object")]
    NotAnObject,
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::ValidationError {
            message: err.to_string(),
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result type alias for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ServiceError::ProductNotFound {
            id: "p-001".to_string(),
        };
        assert_eq!(error.to_string(), "Product not found: p-001");
    }

    #[test]
    fn test_cast_failure_display() {
        let error = ValidationError::CastFailed {
            field: "price".to_string(),
            expected: "Number".to_string(),
            value: "\"cheap\"".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Cast to Number failed for value \"cheap\" at path \"price\""
        );
    }

    #[test]
    fn test_error_conversion() {
        let validation_error = ValidationError::NotAnObject;

        let service_error: ServiceError = validation_error.into();
        match service_error {
            ServiceError::ValidationError { message } => {
                assert!(message.contains("JSON object"));
            }
            _ => panic!("Expected ValidationError conversion"),
        }
    }

    #[test]
    fn test_repository_error_from_serde() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json");
        assert!(json_error.is_err());

        let repo_error: RepositoryError = json_error.unwrap_err().into();
        match repo_error {
            RepositoryError::Serialization { .. } => {}
            _ => panic!("Expected Serialization error"),
        }
    }
}
