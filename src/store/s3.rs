use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::blocking::{Client, Response};
use reqwest::header::HOST;
use reqwest::{Method, StatusCode};
use sha2::{Digest, Sha256};

use super::{validate_name, BlobStore, StoreError};

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "s3";

/// Path-style S3 client for MinIO-like endpoints over plain HTTP.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    host: String,
    access_key: String,
    secret_key: String,
    region: String,
}

impl S3Store {
    /// `endpoint` is `host:port`, optionally prefixed with `http://`.
    pub fn new(
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        region: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        if endpoint.starts_with("https://") {
            return Err(StoreError::Config(format!(
                "TLS endpoints are not supported: {endpoint}"
            )));
        }
        let host = endpoint
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();
        if host.is_empty() || host.contains('/') {
            return Err(StoreError::Config(format!("invalid endpoint '{endpoint}'")));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Config(format!("building HTTP client: {e}")))?;

        Ok(Self {
            client,
            host,
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            region: region.to_string(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn send(&self, method: Method, path: &str, body: &[u8]) -> Result<Response, StoreError> {
        let payload_hash = hex::encode(Sha256::digest(body));
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let authorization = self.authorization(method.as_str(), path, &payload_hash, now)?;

        log::debug!("S3 {method} {path} ({} bytes)", body.len());

        self.client
            .request(method, format!("http://{}{}", self.host, path))
            .header(HOST, &self.host)
            .header("x-amz-date", amz_date)
            .header("x-amz-content-sha256", payload_hash)
            .header("authorization", authorization)
            .body(body.to_vec())
            .send()
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    StoreError::Unreachable(format!("{}: {e}", self.host))
                } else {
                    StoreError::Backend {
                        status: 0,
                        message: e.to_string(),
                    }
                }
            })
    }

    /// AWS Signature Version 4 `Authorization` header value.
    fn authorization(
        &self,
        method: &str,
        path: &str,
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let signed_headers = "host;x-amz-content-sha256;x-amz-date";

        let canonical_request = format!(
            "{method}\n{path}\n\nhost:{}\nx-amz-content-sha256:{payload_hash}\nx-amz-date:{amz_date}\n\n{signed_headers}\n{payload_hash}",
            self.host
        );
        let scope = format!("{date}/{}/{SERVICE}/aws4_request", self.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let key = signing_key(&self.secret_key, &date, &self.region, SERVICE)?;
        let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

        Ok(format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.access_key
        ))
    }
}

impl BlobStore for S3Store {
    fn list_buckets(&self) -> Result<Vec<String>, StoreError> {
        let response = self.send(Method::GET, "/", &[])?;
        let body = read_success(response, "", "")?;
        Ok(xml_values(&String::from_utf8_lossy(&body), "Name"))
    }

    fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        validate_name(bucket)?;
        let response = self.send(Method::HEAD, &format!("/{}", uri_encode(bucket)), &[])?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(StoreError::Backend {
                status: s.as_u16(),
                message: format!("HEAD bucket '{bucket}'"),
            }),
        }
    }

    fn make_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        validate_name(bucket)?;
        let response = self.send(Method::PUT, &format!("/{}", uri_encode(bucket)), &[])?;
        read_success(response, bucket, "")?;
        Ok(())
    }

    fn get_object(&self, bucket: &str, object: &str) -> Result<Vec<u8>, StoreError> {
        validate_name(bucket)?;
        validate_name(object)?;
        let path = format!("/{}/{}", uri_encode(bucket), uri_encode(object));
        let response = self.send(Method::GET, &path, &[])?;
        read_success(response, bucket, object)
    }

    fn put_object(&self, bucket: &str, object: &str, data: &[u8]) -> Result<(), StoreError> {
        validate_name(bucket)?;
        validate_name(object)?;
        let path = format!("/{}/{}", uri_encode(bucket), uri_encode(object));
        let response = self.send(Method::PUT, &path, data)?;
        read_success(response, bucket, object)?;
        Ok(())
    }
}

/// Read the body of a successful response, or translate an S3 error document.
fn read_success(response: Response, bucket: &str, object: &str) -> Result<Vec<u8>, StoreError> {
    let status = response.status();
    let body = response
        .bytes()
        .map_err(|e| StoreError::Backend {
            status: status.as_u16(),
            message: format!("reading response body: {e}"),
        })?
        .to_vec();

    if status.is_success() {
        return Ok(body);
    }

    let text = String::from_utf8_lossy(&body);
    let code = xml_values(&text, "Code").into_iter().next().unwrap_or_default();
    match code.as_str() {
        "NoSuchBucket" => Err(StoreError::NoSuchBucket(bucket.to_string())),
        "NoSuchKey" => Err(StoreError::NoSuchObject {
            bucket: bucket.to_string(),
            object: object.to_string(),
        }),
        _ => Err(StoreError::Backend {
            status: status.as_u16(),
            message: xml_values(&text, "Message")
                .into_iter()
                .next()
                .unwrap_or(code),
        }),
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StoreError::Config(format!("invalid signing key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>, StoreError> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

/// Percent-encode a path, keeping `/` separators and unreserved characters.
fn uri_encode(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Text content of every `<tag>…</tag>` element, in document order.
fn xml_values(xml: &str, tag: &str) -> Vec<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut values = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        let Some(end) = after.find(&close) else {
            break;
        };
        values.push(after[..end].to_string());
        rest = &after[end + close.len()..];
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store() -> S3Store {
        S3Store::new("minio:9000", "admin", "password", "us-east-1", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn derives_documented_signing_key() {
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn authorization_header_is_deterministic() {
        let s = store();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let hash = hex::encode(Sha256::digest(b""));
        let a = s.authorization("GET", "/datasets/a.csv", &hash, now).unwrap();
        let b = s.authorization("GET", "/datasets/a.csv", &hash, now).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("AWS4-HMAC-SHA256 Credential=admin/20240501/us-east-1/s3/aws4_request"));
        assert!(a.contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date"));

        let other = s.authorization("GET", "/datasets/b.csv", &hash, now).unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn encodes_object_paths() {
        assert_eq!(uri_encode("datasets/HAM10000 metadata.csv"), "datasets/HAM10000%20metadata.csv");
        assert_eq!(uri_encode("a~b_c-d.e"), "a~b_c-d.e");
    }

    #[test]
    fn parses_error_documents() {
        let xml = "<Error><Code>NoSuchKey</Code><Message>gone</Message></Error>";
        assert_eq!(xml_values(xml, "Code"), vec!["NoSuchKey"]);
        let list = "<Buckets><Bucket><Name>a</Name></Bucket><Bucket><Name>b</Name></Bucket></Buckets>";
        assert_eq!(xml_values(list, "Name"), vec!["a", "b"]);
    }

    #[test]
    fn rejects_tls_and_paths_in_endpoint() {
        let t = Duration::from_secs(1);
        assert!(S3Store::new("https://minio:9000", "a", "b", "us-east-1", t).is_err());
        assert!(S3Store::new("minio:9000/x", "a", "b", "us-east-1", t).is_err());
        assert_eq!(S3Store::new("http://minio:9000/", "a", "b", "us-east-1", t).unwrap().host(), "minio:9000");
    }
}
