use crate::aws_api::auth::{AwsRequestSigner, SystemClock};
use crate::aws_api::config::{AwsConfig, ServiceEndpoint};
use crate::aws_api::error::Error;
use crate::aws_api::iam::Iam;
use crate::aws_api::query::{FORM_CONTENT_TYPE, QueryRequest};
use crate::aws_api::redshift::Redshift;
use crate::aws_api::xml::XmlElement;
use crate::util::http::response_string;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method, Request, Uri};
use http_body_util::{BodyExt, Full};
use hyper_rustls::ConfigBuilderExt;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use rustls::{ClientConfig, RootCertStore};
use std::time::Duration;
use tower::BoxError;
use tracing::{debug, warn};

/// Main client for AWS services
pub struct AwsClient {
    pub(crate) config: AwsConfig,
    client: HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl AwsClient {
    /// Create a new AWS client
    pub fn new(config: AwsConfig) -> Result<Self, BoxError> {
        let client = build_hyper_client()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &AwsConfig {
        &self.config
    }

    /// Get an instance of the IAM service
    pub fn iam(&self) -> Iam<'_> {
        Iam::new(self)
    }

    /// Get an instance of the Redshift service
    pub fn redshift(&self) -> Redshift<'_> {
        Redshift::new(self)
    }

    /// Sends a request, bounded by the configured request timeout.
    pub async fn perform(&self, req: Request<Full<Bytes>>) -> Result<Bytes, Error> {
        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, self.send(req)).await {
            Ok(res) => res,
            Err(_) => Err(Error::Timeout(timeout)),
        }
    }

    async fn send(&self, req: Request<Full<Bytes>>) -> Result<Bytes, Error> {
        let resp = self.client.request(req).await?;

        // Handle AWS errors
        let (parts, body) = resp.into_parts();
        if !parts.status.is_success() {
            let error_body = response_string(body).await?;
            return Err(parse_error_response(parts.status.as_u16(), error_body));
        }

        Ok(body.collect().await?.to_bytes())
    }

    /// Signs and sends a Query protocol request, returning the parsed XML response.
    pub async fn query(
        &self,
        endpoint: &ServiceEndpoint,
        request: &QueryRequest,
    ) -> Result<XmlElement, Error> {
        let uri = endpoint.url.parse::<Uri>()?;

        let mut hdrs = HeaderMap::new();
        hdrs.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));

        let signer = AwsRequestSigner::new(
            endpoint.service,
            &endpoint.signing_region,
            &self.config,
            SystemClock,
        );
        let signed_request = signer.sign(
            uri,
            Method::POST,
            hdrs,
            request.encode().into_bytes(),
        )?;

        debug!(
            service = endpoint.service,
            action = request.action(),
            "Sending AWS request"
        );
        let response = self.perform(signed_request).await?;

        XmlElement::parse(response.as_ref())
    }
}

// Query protocol errors look like
// <ErrorResponse><Error><Code>..</Code><Message>..</Message></Error></ErrorResponse>
fn parse_error_response(status: u16, body: String) -> Error {
    let parsed = XmlElement::parse(body.as_bytes())
        .ok()
        .and_then(|root| {
            let err = if root.name == "Error" {
                Some(&root)
            } else {
                root.descendant("Error")
            }?;
            Some((
                err.find_text(&["Code"]).unwrap_or_default().to_string(),
                err.find_text(&["Message"]).unwrap_or_default().to_string(),
            ))
        });

    match parsed {
        Some((code, message)) => Error::AwsError {
            status,
            code,
            message,
        },
        None => Error::AwsError {
            status,
            code: String::new(),
            message: body,
        },
    }
}

fn build_hyper_client() -> Result<HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>, BoxError>
{
    let tls_config = match ClientConfig::builder().with_native_roots() {
        Ok(builder) => builder.with_no_client_auth(),
        Err(e) => {
            // Plain http endpoints (endpoint_url overrides) still work
            warn!(error = %e, "Unable to load native root certificates");
            ClientConfig::builder()
                .with_root_certificates(RootCertStore::empty())
                .with_no_client_auth()
        }
    };

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http()
        .enable_http1()
        .build();

    let client = hyper_util::client::legacy::Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(2)
        .timer(TokioTimer::new())
        .build::<_, Full<Bytes>>(https);

    Ok(client)
}
