//! Form field extraction for urlencoded and multipart bodies.

use crate::error::ServiceError;
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header,
    Form,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Form fields decoded into `T`.
///
/// Accepts `application/x-www-form-urlencoded` and `multipart/form-data`.
/// An empty body without a form content type decodes as no fields, so `T`
/// falls back to its serde defaults. Any other body is rejected.
#[derive(Debug, Clone)]
pub struct FormFields<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for FormFields<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let fields = if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ServiceError::InvalidRequest(e.body_text()))?;
            multipart_fields(multipart).await?
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(pairs) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ServiceError::InvalidRequest(e.body_text()))?;
            pairs
                .into_iter()
                .map(|(name, value)| (name, Value::String(value)))
                .collect()
        } else {
            let body = Bytes::from_request(req, state)
                .await
                .map_err(|e| ServiceError::InvalidRequest(e.body_text()))?;
            if !body.is_empty() {
                return Err(ServiceError::UnsupportedMediaType(if content_type.is_empty() {
                    "missing content type".to_string()
                } else {
                    content_type
                }));
            }
            Map::new()
        };

        serde_json::from_value(Value::Object(fields))
            .map(FormFields)
            .map_err(|e| ServiceError::InvalidRequest(e.to_string()))
    }
}

/// Collect every multipart field as text. Later duplicates win.
async fn multipart_fields(mut multipart: Multipart) -> Result<Map<String, Value>, ServiceError> {
    let mut fields = Map::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let value = field.text().await?;
        fields.insert(name, Value::String(value));
    }
    Ok(fields)
}
