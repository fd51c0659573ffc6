//! AWS Signature Version 4 helpers for S3-compatible object stores.
//!
//! Two flavours are needed: header-signed requests for writes and metadata lookups, and
//! query-presigned GET URLs handed back to clients.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

type HmacSha256 = Hmac<Sha256>;

/// Payload hash used for presigned URLs, whose body is unknown at signing time.
pub(crate) const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Static credentials and scope used for signing.
#[derive(Clone)]
pub(crate) struct SigningCredentials {
    pub(crate) access_key: String,
    pub(crate) secret_key: String,
    pub(crate) region: String,
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("access_key", &self.access_key)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// Headers to attach to a header-signed request.
#[derive(Debug, Clone)]
pub(crate) struct SignedHeaders {
    pub(crate) authorization: String,
    pub(crate) amz_date: String,
    pub(crate) content_sha256: String,
}

/// Sign a request with an `Authorization` header.
pub(crate) fn sign_request(
    credentials: &SigningCredentials,
    method: &str,
    host: &str,
    canonical_uri: &str,
    payload: &[u8],
    now: OffsetDateTime,
) -> SignedHeaders {
    let (date_stamp, amz_date) = format_timestamps(now);
    let content_sha256 = hex_sha256(payload);

    let canonical_headers =
        format!("host:{host}\nx-amz-content-sha256:{content_sha256}\nx-amz-date:{amz_date}\n");
    let signed_headers = "host;x-amz-content-sha256;x-amz-date";
    let canonical_request = format!(
        "{method}\n{canonical_uri}\n\n{canonical_headers}\n{signed_headers}\n{content_sha256}"
    );

    let scope = credential_scope(&date_stamp, &credentials.region);
    let signature = signature(credentials, &date_stamp, &amz_date, &scope, &canonical_request);

    SignedHeaders {
        authorization: format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            credentials.access_key
        ),
        amz_date,
        content_sha256,
    }
}

/// Build the query string of a presigned GET URL (without the leading `?`).
pub(crate) fn presign_query(
    credentials: &SigningCredentials,
    host: &str,
    canonical_uri: &str,
    expires_secs: u64,
    now: OffsetDateTime,
) -> String {
    let (date_stamp, amz_date) = format_timestamps(now);
    let scope = credential_scope(&date_stamp, &credentials.region);
    let credential = format!("{}/{scope}", credentials.access_key);

    // Keys are already in canonical (sorted) order.
    let params = [
        ("X-Amz-Algorithm", "AWS4-HMAC-SHA256".to_string()),
        ("X-Amz-Credential", credential),
        ("X-Amz-Date", amz_date.clone()),
        ("X-Amz-Expires", expires_secs.to_string()),
        ("X-Amz-SignedHeaders", "host".to_string()),
    ];
    let canonical_query = params
        .iter()
        .map(|(key, value)| format!("{}={}", uri_encode(key), uri_encode(value)))
        .collect::<Vec<_>>()
        .join("&");

    let canonical_request = format!(
        "GET\n{canonical_uri}\n{canonical_query}\nhost:{host}\n\nhost\n{UNSIGNED_PAYLOAD}"
    );
    let signature = signature(credentials, &date_stamp, &amz_date, &scope, &canonical_request);

    format!("{canonical_query}&X-Amz-Signature={signature}")
}

/// Percent-encode a single path segment or query component (RFC 3986 unreserved set kept).
pub(crate) fn uri_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

fn signature(
    credentials: &SigningCredentials,
    date_stamp: &str,
    amz_date: &str,
    scope: &str,
    canonical_request: &str,
) -> String {
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
        hex_sha256(canonical_request.as_bytes())
    );
    let key = derive_signing_key(&credentials.secret_key, date_stamp, &credentials.region);
    hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()))
}

fn credential_scope(date_stamp: &str, region: &str) -> String {
    format!("{date_stamp}/{region}/s3/aws4_request")
}

fn format_timestamps(now: OffsetDateTime) -> (String, String) {
    let date_stamp = format!(
        "{:04}{:02}{:02}",
        now.year(),
        u8::from(now.month()),
        now.day()
    );
    let amz_date = format!(
        "{date_stamp}T{:02}{:02}{:02}Z",
        now.hour(),
        now.minute(),
        now.second()
    );
    (date_stamp, amz_date)
}

fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, b"s3");
    hmac_sha256(&k_service, b"aws4_request")
}
