use datagate::data::from_request_with_limit;
use datagate::DataError;
use http::{header, Method, Request};
use serde_json::json;

fn post(content_type: &str, body: &[u8]) -> Request<Vec<u8>> {
    Request::builder()
        .method(Method::POST)
        .uri("/users?source=web")
        .header(header::CONTENT_TYPE, content_type)
        .body(body.to_vec())
        .unwrap()
}

#[test]
fn test_urlencoded_body_with_query() {
    let req = post(
        "application/x-www-form-urlencoded; charset=utf-8",
        b"name=inhere&age=30",
    );
    let mut v = datagate::request(&req);
    v.filter_rule("age", "int");
    v.string_rules([
        ("name", "required|minLen:4"),
        ("age", "int:1,99"),
        ("source", "enum:web,app"),
    ]);

    assert!(v.validate(), "{}", v.errors());
    assert_eq!(v.safe_val("age"), Some(&json!(30)));
    assert_eq!(v.safe_val("source"), Some(&json!("web")));
}

#[test]
fn test_json_body() {
    let req = post("application/json", br#"{"name": "inhere", "age": 100}"#);
    let mut v = datagate::request(&req);
    v.set_stop_on_error(false);
    v.string_rules([("name", "required|minLen:7"), ("age", "int|range:1,99")]);

    assert!(!v.validate());
    assert_eq!(v.errors().first("name"), Some("name min length is 7"));
    assert_eq!(
        v.errors().first("age"),
        Some("age value must be in the range 1 - 99")
    );
}

#[test]
fn test_multipart_with_files() {
    let body = concat!(
        "--XyZ\r\n",
        "Content-Disposition: form-data; name=\"title\"\r\n",
        "\r\n",
        "holiday\r\n",
        "--XyZ\r\n",
        "Content-Disposition: form-data; name=\"avatar\"; filename=\"me.png\"\r\n",
        "Content-Type: image/png\r\n",
        "\r\n",
        "\u{1}PNGDATA\r\n",
        "--XyZ\r\n",
        "Content-Disposition: form-data; name=\"notes\"; filename=\"notes.txt\"\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "hello\r\n",
        "--XyZ--\r\n",
    );
    let req = post("multipart/form-data; boundary=XyZ", body.as_bytes());

    let mut v = datagate::request(&req);
    v.set_stop_on_error(false);
    v.string_rules([
        ("title", "required|minLen:3"),
        ("avatar", "isFile|isImage:png,jpeg"),
        ("notes", "isImage"),
    ]);
    v.string_rule("notes", "inMimeTypes:text/plain,text/markdown");

    assert!(!v.validate());
    assert!(!v.errors().has("title"));
    assert!(!v.errors().has("avatar"));
    assert_eq!(
        v.errors().field("notes"),
        Some(&["notes must be an uploaded image file".to_string()][..])
    );

    let form = v.record::<datagate::FormData>().unwrap();
    assert_eq!(form.file_names().collect::<Vec<_>>(), ["avatar", "notes"]);
}

#[test]
fn test_missing_file_is_reported_when_empty_values_are_checked() {
    let req = post(
        "multipart/form-data; boundary=b",
        b"--b\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nx\r\n--b--\r\n",
    );
    let mut v = datagate::request(&req);
    v.set_skip_on_empty(false);
    v.string_rule("avatar", "isFile");

    assert!(!v.validate());
    assert_eq!(v.errors().one(), Some("avatar must be an uploaded file"));
}

#[test]
fn test_get_reads_query_only() {
    let req = Request::builder()
        .method(Method::GET)
        .uri("/search?q=rust&page=2")
        .body(b"ignored=1".to_vec())
        .unwrap();
    let mut v = datagate::request(&req);
    v.string_rules([("q", "required"), ("page", "int|min:1")]);

    assert!(v.validate());
    assert!(v.get("ignored").is_none());
}

#[test]
fn test_decode_failures_become_construction_errors() {
    for req in [
        post("application/json", b"{broken"),
        post("text/csv", b"a,b"),
        post("multipart/form-data", b"--x\r\n"),
    ] {
        let mut v = datagate::request(&req);
        v.string_rule("name", "required");
        assert!(v.errors().to_string().contains("invalid input data"));
        assert!(!v.validate());
    }
}

#[test]
fn test_body_limit() {
    let req = post("application/json", br#"{"name": "a long enough name"}"#);
    let err = from_request_with_limit(&req, 8).err().unwrap();
    assert!(matches!(err, DataError::BodyTooLarge { limit: 8, .. }));
}
