use crate::aws_api::IAM_SERVICE;
use std::time::Duration;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct AwsConfig {
    pub(crate) region: String,
    pub(crate) aws_access_key_id: String,
    pub(crate) aws_secret_access_key: String,
    pub(crate) aws_session_token: Option<String>,
    pub(crate) endpoint_url: Option<String>,
    pub(crate) request_timeout: Duration,
}

/// Where a request for a given service goes, and the region it is signed for.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceEndpoint {
    pub service: &'static str,
    pub url: String,
    pub signing_region: String,
}

impl AwsConfig {
    pub fn new(access_key_id: &str, secret_access_key: &str) -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            aws_access_key_id: access_key_id.to_string(),
            aws_secret_access_key: secret_access_key.to_string(),
            aws_session_token: None,
            endpoint_url: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    pub fn with_session_token(mut self, token: Option<String>) -> Self {
        self.aws_session_token = token;
        self
    }

    pub fn with_endpoint_url(mut self, endpoint_url: Option<String>) -> Self {
        self.endpoint_url = endpoint_url;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// The ARN partition the configured region belongs to.
    pub fn partition(&self) -> &'static str {
        partition_for_region(&self.region)
    }

    pub fn endpoint(&self, service: &'static str) -> ServiceEndpoint {
        let china = self.region.starts_with("cn-");

        // IAM is a global service, it is signed for the partition's home region
        let signing_region = match service {
            IAM_SERVICE if china => "cn-north-1".to_string(),
            IAM_SERVICE if self.region.starts_with("us-gov-") => "us-gov-west-1".to_string(),
            IAM_SERVICE => DEFAULT_REGION.to_string(),
            _ => self.region.clone(),
        };

        if let Some(url) = &self.endpoint_url {
            return ServiceEndpoint {
                service,
                url: url.clone(),
                signing_region,
            };
        }

        let domain = if china {
            "amazonaws.com.cn"
        } else {
            "amazonaws.com"
        };

        let url = match service {
            IAM_SERVICE if china => format!("https://iam.cn-north-1.{}/", domain),
            IAM_SERVICE if self.region.starts_with("us-gov-") => {
                format!("https://iam.us-gov.{}/", domain)
            }
            IAM_SERVICE => format!("https://iam.{}/", domain),
            _ => format!("https://{}.{}.{}/", service, self.region, domain),
        };

        ServiceEndpoint {
            service,
            url,
            signing_region,
        }
    }
}

pub fn partition_for_region(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else {
        "aws"
    }
}
