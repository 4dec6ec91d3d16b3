use crate::utils::error::AppError;
use indexmap::IndexMap;
use okapi::openapi3::SchemaObject;
use rocket_okapi::gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::RefOr;
use rocket_okapi::okapi::openapi3::{MediaType, Response, Responses};
use rocket_okapi::response::OpenApiResponderInner;
use serde_json::json;

// Document every error status a route can produce, with one example body each
impl OpenApiResponderInner for AppError {
    fn responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        let mut responses = Responses::default();

        let examples = [
            ("Bad Request", AppError::ValidationError("at least one seat must be selected".into())),
            ("Unauthorized", AppError::AuthError("missing bearer token".into())),
            ("Forbidden", AppError::Forbidden("admin only".into())),
            ("Not Found", AppError::SeatNotFound("E42".into())),
            ("Conflict", AppError::SeatConflict("E1".into())),
            ("Internal Server Error", AppError::DatabaseError("connection reset".into())),
            ("Service Unavailable", AppError::Transient("deadlock detected".into())),
            ("Gateway Timeout", AppError::Timeout("create booking did not finish within 5s".into())),
        ];

        for (description, error) in examples {
            let mut content = IndexMap::new();
            content.insert(
                "application/json".to_string(),
                MediaType {
                    schema: Some(SchemaObject::default()),
                    example: Some(json!({
                        "error": error.to_string(),
                        "code": error.code(),
                        "kind": error.kind(),
                    })),
                    ..Default::default()
                },
            );

            responses.responses.insert(
                error.status().code.to_string(),
                RefOr::Object(Response {
                    description: description.to_string(),
                    content,
                    ..Default::default()
                }),
            );
        }

        Ok(responses)
    }
}
