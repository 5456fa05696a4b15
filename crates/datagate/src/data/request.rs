//! Request-backed data: decode an HTTP request into a data source.
//!
//! Bodyless methods read the query string. `POST`, `PUT` and `PATCH`
//! requests are decoded by content type:
//!
//! | Content type                        | Source                        |
//! |-------------------------------------|-------------------------------|
//! | `multipart/form-data`               | [`FormData`] with files       |
//! | `application/x-www-form-urlencoded` | [`FormData`]                  |
//! | `application/json`                  | [`MapData`] (raw bytes kept)  |
//!
//! Query values are appended after form body values.

use bytes::Bytes;
use http::{header, Method, Request};

use super::{DataSource, FormData, MapData, UploadedFile};
use crate::config::global_options;
use crate::error::DataError;

/// Decode a request using the global body size limit.
pub fn from_request<B: AsRef<[u8]>>(req: &Request<B>) -> Result<Box<dyn DataSource>, DataError> {
    from_request_with_limit(req, global_options().max_form_size)
}

/// Decode a request, rejecting bodies larger than `limit` bytes.
pub fn from_request_with_limit<B: AsRef<[u8]>>(
    req: &Request<B>,
    limit: usize,
) -> Result<Box<dyn DataSource>, DataError> {
    let query = req.uri().query().unwrap_or_default();

    if !matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH) {
        trace_debug!(method = %req.method(), "reading request query");
        return Ok(Box::new(FormData::from_query(query)?));
    }

    let body = req.body().as_ref();
    if body.len() > limit {
        return Err(DataError::BodyTooLarge {
            size: body.len(),
            limit,
        });
    }

    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    trace_debug!(method = %req.method(), content_type = %mime, size = body.len(), "decoding request body");

    match mime.as_str() {
        "multipart/form-data" => {
            let boundary = extract_boundary(content_type)
                .ok_or_else(|| DataError::Body("missing boundary in Content-Type".to_string()))?;
            let mut data = FormData::new();
            for part in parse_multipart(body, &boundary)? {
                match part.file_name {
                    Some(file_name) => data.add_file(UploadedFile::new(
                        part.name,
                        file_name,
                        part.content_type,
                        part.data,
                    )),
                    None => data.add(part.name, String::from_utf8_lossy(&part.data)),
                }
            }
            data.add_values(query_pairs(query)?);
            Ok(Box::new(data))
        }
        "application/x-www-form-urlencoded" => {
            let text = std::str::from_utf8(body)
                .map_err(|_| DataError::Body("form body is not valid UTF-8".to_string()))?;
            let mut data = FormData::from_query(text)?;
            data.add_values(query_pairs(query)?);
            Ok(Box::new(data))
        }
        "application/json" => Ok(Box::new(MapData::from_json_bytes(body)?)),
        _ => Err(DataError::UnsupportedContentType(content_type.to_string())),
    }
}

fn query_pairs(query: &str) -> Result<Vec<(String, String)>, DataError> {
    serde_urlencoded::from_str(query)
        .map_err(|e| DataError::Body(format!("malformed query string: {}", e)))
}

/// One part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    /// Form field name
    pub name: String,
    /// File name, set for file uploads
    pub file_name: Option<String>,
    /// Declared content type
    pub content_type: Option<String>,
    /// Part contents
    pub data: Bytes,
}

fn extract_boundary(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        part.trim()
            .strip_prefix("boundary=")
            .map(|boundary| boundary.trim_matches('"').to_string())
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Parse a `multipart/form-data` body.
///
/// Part bodies are kept as raw bytes, so binary uploads survive intact.
/// Parts without a `name` are dropped.
pub fn parse_multipart(body: &[u8], boundary: &str) -> Result<Vec<MultipartPart>, DataError> {
    let delimiter = format!("--{}", boundary);
    let delimiter = delimiter.as_bytes();

    let start = find(body, delimiter)
        .ok_or_else(|| DataError::Body("multipart boundary not found".to_string()))?;
    let mut rest = &body[start + delimiter.len()..];
    let mut parts = Vec::new();

    loop {
        if rest.starts_with(b"--") {
            break;
        }
        let Some(end) = find(rest, delimiter) else {
            return Err(DataError::Body("unterminated multipart body".to_string()));
        };
        let section = &rest[..end];
        rest = &rest[end + delimiter.len()..];

        let section = section.strip_prefix(b"\r\n").unwrap_or(section);
        let section = section.strip_suffix(b"\r\n").unwrap_or(section);
        let Some(split) = find(section, b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&section[..split]);
        let data = &section[split + 4..];

        let mut name = None;
        let mut file_name = None;
        let mut content_type = None;

        for line in headers.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            match key.trim().to_ascii_lowercase().as_str() {
                "content-disposition" => {
                    for param in value.split(';').map(str::trim) {
                        if let Some(v) = param.strip_prefix("name=") {
                            name = Some(v.trim_matches('"').to_string());
                        } else if let Some(v) = param.strip_prefix("filename=") {
                            file_name = Some(v.trim_matches('"').to_string());
                        }
                    }
                }
                "content-type" => content_type = Some(value.trim().to_string()),
                _ => {}
            }
        }

        if let Some(name) = name {
            parts.push(MultipartPart {
                name,
                file_name,
                content_type,
                data: Bytes::copy_from_slice(data),
            });
        }
    }

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BOUNDARY: &str = "----DatagateBoundary";

    fn multipart_body() -> String {
        format!(
            "--{b}\r\n\
             Content-Disposition: form-data; name=\"name\"\r\n\
             \r\n\
             inhere\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"avatar\"; filename=\"me.png\"\r\n\
             Content-Type: image/png\r\n\
             \r\n\
             \u{1}PNG\r\n\
             --{b}--\r\n",
            b = BOUNDARY
        )
    }

    #[test]
    fn boundary_extraction() {
        assert_eq!(
            extract_boundary("multipart/form-data; boundary=abc").as_deref(),
            Some("abc")
        );
        assert_eq!(
            extract_boundary("multipart/form-data; boundary=\"quoted\"").as_deref(),
            Some("quoted")
        );
        assert_eq!(extract_boundary("multipart/form-data"), None);
    }

    #[test]
    fn parse_values_and_files() {
        let parts = parse_multipart(multipart_body().as_bytes(), BOUNDARY).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "name");
        assert_eq!(parts[0].data, Bytes::from_static(b"inhere"));
        assert_eq!(parts[1].file_name.as_deref(), Some("me.png"));
        assert_eq!(parts[1].content_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn get_request_reads_query() {
        let req = Request::get("/users?name=inhere&age=10")
            .body(Vec::<u8>::new())
            .unwrap();
        let data = from_request(&req).unwrap();
        assert_eq!(data.get("name"), Some(json!("inhere")));
        assert_eq!(data.get("age"), Some(json!("10")));
    }

    #[test]
    fn urlencoded_body_then_query() {
        let req = Request::post("/users?tag=b")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("name=inhere&tag=a")
            .unwrap();
        let data = from_request(&req).unwrap();
        assert_eq!(data.get("name"), Some(json!("inhere")));
        assert_eq!(data.get("tag"), Some(json!(["a", "b"])));
    }

    #[test]
    fn json_body() {
        let req = Request::put("/users")
            .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
            .body(r#"{"name": "inhere", "age": 100}"#)
            .unwrap();
        let data = from_request(&req).unwrap();
        assert_eq!(data.get("age"), Some(json!(100)));
        let map = data.as_any().downcast_ref::<MapData>().unwrap();
        assert!(map.raw_json().is_some());
    }

    #[test]
    fn multipart_body_with_files() {
        let req = Request::post("/upload?lang=rust")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(multipart_body())
            .unwrap();
        let data = from_request(&req).unwrap();
        assert_eq!(data.get("name"), Some(json!("inhere")));
        assert_eq!(data.get("lang"), Some(json!("rust")));
        assert_eq!(data.get("avatar"), None);
        assert_eq!(data.file("avatar").map(|f| f.file_name()), Some("me.png"));
    }

    #[test]
    fn rejects_unknown_types_and_large_bodies() {
        let req = Request::post("/")
            .header(header::CONTENT_TYPE, "text/plain")
            .body("hello")
            .unwrap();
        let err = from_request(&req).err().unwrap();
        assert!(matches!(err, DataError::UnsupportedContentType(_)));
        assert!(err.to_string().starts_with("invalid input data"));

        let req = Request::post("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(vec![b' '; 32])
            .unwrap();
        let err = from_request_with_limit(&req, 16).err().unwrap();
        assert!(matches!(err, DataError::BodyTooLarge { size: 32, limit: 16 }));
    }
}
