//! Request body parsing for record mutations.
//!
//! Create and update accept either a JSON object or `multipart/form-data`.
//! Multipart text fields are flattened into the same JSON object shape a
//! JSON client would send (`result.value` becomes `{"result": {"value": ..}}`)
//! and parts named `files` that carry a file name are collected as uploads.

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use serde_json::{Map, Value};

use crate::api::error::ApiError;
use crate::attachments::UploadedFile;

/// Multipart part name carrying attachments.
pub const FILES_FIELD: &str = "files";

/// A parsed mutation body: record fields plus any uploaded files.
#[derive(Debug, Default)]
pub struct RecordBody {
    pub fields: Map<String, Value>,
    pub uploads: Vec<UploadedFile>,
}

/// Read a JSON or multipart body into a [`RecordBody`].
pub async fn read_record_body<S>(req: Request, state: &S) -> Result<RecordBody, ApiError>
where
    S: Send + Sync,
{
    let is_multipart = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?;
        read_multipart(multipart).await
    } else {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read body: {e}")))?;
        parse_json_object(&bytes).map(|fields| RecordBody {
            fields,
            uploads: Vec::new(),
        })
    }
}

fn parse_json_object(bytes: &[u8]) -> Result<Map<String, Value>, ApiError> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::BadRequest("Body must be a JSON object".into())),
        Err(e) => Err(ApiError::BadRequest(format!("Invalid JSON body: {e}"))),
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<RecordBody, ApiError> {
    let mut body = RecordBody::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to read multipart field: {e}");
                return Err(ApiError::BadRequest(format!("Invalid multipart body: {e}")));
            }
        };

        let name = field.name().unwrap_or("").to_string();
        if name.is_empty() {
            continue;
        }

        if name == FILES_FIELD {
            // Text parts under the files name are not uploads.
            let Some(file_name) = field.file_name().map(str::to_string) else {
                continue;
            };
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(|e| {
                tracing::warn!("Failed to read upload bytes: {e}");
                ApiError::BadRequest(format!("Failed to read file data: {e}"))
            })?;
            body.uploads.push(UploadedFile {
                file_name,
                content_type,
                bytes,
            });
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read field {name}: {e}")))?;
        insert_flattened(&mut body.fields, &name, text);
    }

    Ok(body)
}

/// Insert a form value under a possibly dotted key.
///
/// The key is split at the first dot only; a non-object value already
/// stored under the parent key is replaced. Later values win.
pub fn insert_flattened(fields: &mut Map<String, Value>, key: &str, value: String) {
    match key.split_once('.') {
        Some((parent, child)) if !parent.is_empty() && !child.is_empty() => {
            let entry = fields
                .entry(parent.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(children) = entry {
                children.insert(child.to_string(), Value::String(value));
            }
        }
        _ => {
            fields.insert(key.to_string(), Value::String(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde_json::json;

    const BOUNDARY: &str = "X-HEALTH-TECH-BOUNDARY";

    fn multipart_request(parts: &[(&str, Option<&str>, &str)]) -> Request {
        let mut body = Vec::new();
        for (name, file_name, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(f) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(content.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        axum::http::Request::builder()
            .method("POST")
            .uri("/api/tests")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    #[test]
    fn flattening_nests_dotted_keys() {
        let mut fields = Map::new();
        insert_flattened(&mut fields, "patientName", "Jane Doe".into());
        insert_flattened(&mut fields, "result.value", "7.2".into());
        insert_flattened(&mut fields, "result.unit", "mmol/L".into());
        assert_eq!(
            Value::Object(fields),
            json!({"patientName": "Jane Doe", "result": {"value": "7.2", "unit": "mmol/L"}})
        );
    }

    #[test]
    fn flattening_splits_at_first_dot_and_replaces_scalars() {
        let mut fields = Map::new();
        insert_flattened(&mut fields, "result", "oops".into());
        insert_flattened(&mut fields, "result.a.b", "x".into());
        assert_eq!(Value::Object(fields), json!({"result": {"a.b": "x"}}));
    }

    #[test]
    fn flattening_later_value_wins() {
        let mut fields = Map::new();
        insert_flattened(&mut fields, "notes", "first".into());
        insert_flattened(&mut fields, "notes", "second".into());
        assert_eq!(fields["notes"], "second");
    }

    #[tokio::test]
    async fn json_body_is_parsed() {
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/api/tests")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"patientName":"Jane Doe"}"#))
            .unwrap();
        let body = read_record_body(req, &()).await.unwrap();
        assert_eq!(body.fields["patientName"], "Jane Doe");
        assert!(body.uploads.is_empty());
    }

    #[tokio::test]
    async fn non_object_json_is_rejected() {
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/api/tests")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("[1,2,3]"))
            .unwrap();
        assert!(matches!(
            read_record_body(req, &()).await,
            Err(ApiError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn multipart_collects_fields_and_files() {
        let req = multipart_request(&[
            ("patientName", None, "Jane Doe"),
            ("result.value", None, "negative"),
            ("files", Some("scan.pdf"), "%PDF-1.4"),
            ("files", Some("photo.png"), "PNG-DATA"),
            ("files", None, "not a file"),
        ]);
        let body = read_record_body(req, &()).await.unwrap();

        assert_eq!(body.fields["patientName"], "Jane Doe");
        assert_eq!(body.fields["result"]["value"], "negative");
        assert!(body.fields.get("files").is_none());
        let names: Vec<_> = body.uploads.iter().map(|u| u.file_name.as_str()).collect();
        assert_eq!(names, vec!["scan.pdf", "photo.png"]);
        assert_eq!(&body.uploads[0].bytes[..], b"%PDF-1.4");
    }
}
