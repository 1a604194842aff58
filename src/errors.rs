use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

/// Error taxonomy for the REST layer.
///
/// Every variant renders as `{"success": false, "message": ..., "errors": [...]}`
/// with the matching HTTP status. Store failures never leak internals; the
/// detail only goes to the server log.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },

    #[error("{0}")]
    Duplicate(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Server error")]
    Store(#[from] sqlx::Error),
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = flatten_validation_errors(&errors);
        Self::Validation {
            message: "Validation failed".to_string(),
            details,
        }
    }
}

/// Flattens validator output into `field: message` strings, nested structs
/// included.
fn flatten_validation_errors(errors: &validator::ValidationErrors) -> Vec<String> {
    use validator::ValidationErrorsKind;

    let mut details = Vec::new();
    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string());
                    details.push(format!("{field}: {message}"));
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                for detail in flatten_validation_errors(nested) {
                    details.push(format!("{field}.{detail}"));
                }
            }
            ValidationErrorsKind::List(map) => {
                for (index, nested) in map {
                    for detail in flatten_validation_errors(nested) {
                        details.push(format!("{field}[{index}].{detail}"));
                    }
                }
            }
        }
    }
    details.sort();
    details
}

/// Extractor config that reports malformed JSON bodies (including
/// out-of-enum values) inside the standard error envelope instead of
/// actix's plain-text default.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::Validation {
            message: err.to_string(),
            details: Vec::new(),
        }
        .into()
    })
}

/// Same envelope guarantee for undeserializable query strings.
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        ApiError::Validation {
            message: err.to_string(),
            details: Vec::new(),
        }
        .into()
    })
}

/// Same envelope guarantee for unparseable path segments.
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        ApiError::Validation {
            message: err.to_string(),
            details: Vec::new(),
        }
        .into()
    })
}

/// Whether a store error is a unique-constraint violation (SQLSTATE 23505).
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505")
    )
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<String>>,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::Duplicate(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::Store(err) = self {
            log::error!("Store error: {err:?}");
        }

        let errors = match self {
            ApiError::Validation { details, .. } if !details.is_empty() => Some(details.clone()),
            _ => None,
        };

        HttpResponse::build(self.status_code()).json(ErrorBody {
            success: false,
            message: self.to_string(),
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 1))]
        name: String,
        #[validate(range(min = 1, max = 5))]
        rating: i32,
    }

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            ApiError::Validation {
                message: "bad input".into(),
                details: Vec::new(),
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Duplicate("already reviewed".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized("who are you".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("not yours".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("gone".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Store(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_errors_do_not_leak_detail() {
        let error = ApiError::Store(sqlx::Error::PoolTimedOut);
        assert_eq!(error.to_string(), "Server error");
    }

    #[test]
    fn validator_errors_flatten_to_field_details() {
        let probe = Probe {
            name: String::new(),
            rating: 9,
        };
        let api_error: ApiError = probe.validate().unwrap_err().into();
        match api_error {
            ApiError::Validation { details, .. } => {
                assert_eq!(details.len(), 2);
                assert!(details.iter().any(|d| d.starts_with("name:")));
                assert!(details.iter().any(|d| d.starts_with("rating:")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn row_not_found_is_not_a_unique_violation() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[actix_web::test]
    async fn out_of_enum_category_keeps_error_envelope() {
        use actix_web::{test, App};

        use crate::models::CreateBusinessRequest;

        async fn accept(_: web::Json<CreateBusinessRequest>) -> HttpResponse {
            HttpResponse::Ok().finish()
        }

        let app = test::init_service(
            App::new()
                .app_data(json_config())
                .route("/business", web::post().to(accept)),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/business")
            .set_json(serde_json::json!({ "category": "Plumbing" }))
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["success"], serde_json::json!(false));
        assert!(body["message"].as_str().unwrap().contains("Plumbing"));
    }

    #[actix_web::test]
    async fn non_numeric_page_keeps_error_envelope() {
        use actix_web::{test, App};

        use crate::models::BusinessListQuery;

        async fn accept(_: web::Query<BusinessListQuery>) -> HttpResponse {
            HttpResponse::Ok().finish()
        }

        let app = test::init_service(
            App::new()
                .app_data(query_config())
                .route("/business", web::get().to(accept)),
        )
        .await;

        let request = test::TestRequest::get()
            .uri("/business?page=abc")
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["success"], serde_json::json!(false));
        assert!(body["message"].is_string());
    }
}
