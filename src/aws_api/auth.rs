use crate::aws_api::config::AwsConfig;
use crate::aws_api::error::Error;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use http::header::{AUTHORIZATION, HOST};
use http::{HeaderMap, HeaderValue, Method, Request, Uri};
use http_body_util::Full;
use sha2::Digest;
use sha2::Sha256;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

type HmacSha256 = Hmac<Sha256>;

/// Signs requests with AWS Signature Version 4 using the credentials held in
/// an [`AwsConfig`].
pub struct AwsRequestSigner<'a, C> {
    service: &'a str,
    region: &'a str,
    config: &'a AwsConfig,
    clock: C,
}

impl<'a, C> AwsRequestSigner<'a, C>
where
    C: Clock,
{
    pub fn new(service: &'a str, region: &'a str, config: &'a AwsConfig, clock: C) -> Self {
        Self {
            service,
            region,
            config,
            clock,
        }
    }

    pub fn sign(
        &self,
        uri: Uri,
        method: Method,
        mut headers: HeaderMap,
        payload: Vec<u8>,
    ) -> Result<Request<Full<Bytes>>, Error> {
        let now = self.clock.now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();

        if !headers.contains_key(HOST) {
            let host = uri
                .host()
                .ok_or_else(|| Error::SignatureError(format!("No host in uri: {}", uri)))?;
            let host_value = match uri.port_u16() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            };
            headers.insert(HOST, header_value(&host_value, "host header")?);
        }

        if let Some(token) = self.config.aws_session_token.as_deref() {
            headers.insert("X-Amz-Security-Token", header_value(token, "session token")?);
        }
        headers.insert("X-Amz-Date", header_value(&amz_date, "date")?);

        let (canonical_headers, signed_headers) = canonical_headers(&headers);
        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method,
            uri.path(),
            canonical_query(uri.query()),
            canonical_headers,
            signed_headers,
            hex::encode(Sha256::digest(&payload))
        );

        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            credential_scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signature = self.calculate_signature(&date_stamp, &string_to_sign)?;
        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.config.aws_access_key_id, credential_scope, signed_headers, signature
        );
        headers.insert(
            AUTHORIZATION,
            header_value(&authorization, "authorization header")?,
        );

        let mut req = Request::builder()
            .uri(uri)
            .method(method)
            .body(Full::from(Bytes::from(payload)))
            .map_err(Error::RequestBuildError)?;
        *req.headers_mut() = headers;

        Ok(req)
    }

    fn calculate_signature(&self, date_stamp: &str, string_to_sign: &str) -> Result<String, Error> {
        let k_secret = format!("AWS4{}", self.config.aws_secret_access_key);

        let k_date = sign_hmac(k_secret.as_bytes(), date_stamp.as_bytes())?;
        let k_region = sign_hmac(&k_date, self.region.as_bytes())?;
        let k_service = sign_hmac(&k_region, self.service.as_bytes())?;
        let k_signing = sign_hmac(&k_service, b"aws4_request")?;

        Ok(hex::encode(sign_hmac(
            &k_signing,
            string_to_sign.as_bytes(),
        )?))
    }
}

fn header_value(value: &str, what: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value).map_err(|_| Error::SignatureError(format!("Invalid {}", what)))
}

// Query params sorted by key then value, already percent encoded by the caller
fn canonical_query(query: Option<&str>) -> String {
    let Some(q) = query else {
        return String::new();
    };

    let mut params: Vec<(&str, &str)> = q
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|s| s.split_once('=').unwrap_or((s, "")))
        .collect();
    params.sort();

    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<String>>()
        .join("&")
}

// Returns the canonical header block and the signed header list
fn canonical_headers(headers: &HeaderMap) -> (String, String) {
    let mut pairs: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_lowercase(),
                value.to_str().unwrap_or_default().trim().to_string(),
            )
        })
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let canonical = pairs
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect::<String>();
    let signed = pairs
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<&str>>()
        .join(";");

    (canonical, signed)
}

fn sign_hmac(key: &[u8], message: &[u8]) -> Result<Vec<u8>, Error> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| Error::SignatureError("Invalid HMAC key".to_string()))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}
