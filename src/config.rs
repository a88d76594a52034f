use crate::aws_api::arn::AwsArn;
use crate::aws_api::config::{AwsConfig, DEFAULT_REGION, partition_for_region};
use ini::{Ini, ParseOption, Properties};
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "dl.cfg";

pub const AWS_SECTION: &str = "AWS";
pub const IAM_SECTION: &str = "IAM";
pub const S3_SECTION: &str = "S3";
pub const REDSHIFT_SECTION: &str = "Redshift";

static ROLE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w+=,.@-]{1,64}$").unwrap());
static POLICY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w+=,.@-]{1,128}$").unwrap());
static BUCKET_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").unwrap());
static REGION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d+$").unwrap());

#[derive(Debug)]
pub enum ConfigError {
    Load { path: String, message: String },
    MissingSection(&'static str),
    MissingKey {
        section: &'static str,
        key: &'static str,
    },
    InvalidValue {
        section: &'static str,
        key: &'static str,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Load { path, message } => {
                write!(f, "Unable to load config file {}: {}", path, message)
            }
            ConfigError::MissingSection(section) => {
                write!(f, "Config is missing section [{}]", section)?;
                write_hint(f, section)
            }
            ConfigError::MissingKey { section, key } => {
                write!(f, "Config is missing key {} in section [{}]", key, section)?;
                write_hint(f, section)
            }
            ConfigError::InvalidValue {
                section,
                key,
                reason,
            } => write!(f, "Invalid value for {} in [{}]: {}", key, section, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

fn write_hint(f: &mut fmt::Formatter<'_>, section: &str) -> fmt::Result {
    if section == S3_SECTION {
        write!(
            f,
            " (bucket_name must name the S3 bucket the access policy grants)"
        )?;
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq)]
pub struct AwsSection {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub region: String,
    pub endpoint_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IamSection {
    pub role_name: String,
    pub policy_name: String,
    pub policy_arn: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct S3Section {
    pub bucket_name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RedshiftSection {
    pub cluster_identifier: String,
}

/// Everything the provisioning run needs, read once at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct ProvisionConfig {
    pub aws: AwsSection,
    pub iam: IamSection,
    pub s3: S3Section,
    pub redshift: RedshiftSection,
}

impl ProvisionConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ini = Ini::load_from_file_opt(path, parse_options()).map_err(|e| ConfigError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Self::from_ini(&ini)
    }

    pub fn from_ini_str(contents: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str_opt(contents, parse_options()).map_err(|e| {
            ConfigError::Load {
                path: "<string>".to_string(),
                message: e.to_string(),
            }
        })?;

        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let aws = section(ini, AWS_SECTION)?;
        let region = optional(aws, "region").unwrap_or_else(|| DEFAULT_REGION.to_string());
        if !REGION_RE.is_match(&region) {
            return Err(invalid(AWS_SECTION, "region", "not a region name"));
        }

        let aws = AwsSection {
            access_key_id: required(aws, AWS_SECTION, "access_key_id")?,
            secret_access_key: required(aws, AWS_SECTION, "secret_access_key")?,
            session_token: optional(aws, "session_token"),
            region,
            endpoint_url: optional(aws, "endpoint_url"),
        };

        let iam = section(ini, IAM_SECTION)?;
        let iam = IamSection {
            role_name: required(iam, IAM_SECTION, "role_name")?,
            policy_name: required(iam, IAM_SECTION, "policy_name")?,
            policy_arn: required(iam, IAM_SECTION, "policy_arn")?,
        };
        if !ROLE_NAME_RE.is_match(&iam.role_name) {
            return Err(invalid(IAM_SECTION, "role_name", "not a valid IAM role name"));
        }
        if !POLICY_NAME_RE.is_match(&iam.policy_name) {
            return Err(invalid(IAM_SECTION, "policy_name", "not a valid IAM policy name"));
        }
        match iam.policy_arn.parse::<AwsArn>() {
            Ok(arn) if arn.is_iam_policy() => {}
            Ok(_) => return Err(invalid(IAM_SECTION, "policy_arn", "not an IAM policy ARN")),
            Err(e) => return Err(invalid(IAM_SECTION, "policy_arn", &e.to_string())),
        }

        let s3 = S3Section {
            bucket_name: required(section(ini, S3_SECTION)?, S3_SECTION, "bucket_name")?,
        };
        if !BUCKET_NAME_RE.is_match(&s3.bucket_name) {
            return Err(invalid(S3_SECTION, "bucket_name", "not a valid bucket name"));
        }

        let redshift = RedshiftSection {
            cluster_identifier: required(
                section(ini, REDSHIFT_SECTION)?,
                REDSHIFT_SECTION,
                "cluster_identifier",
            )?,
        };

        Ok(ProvisionConfig {
            aws,
            iam,
            s3,
            redshift,
        })
    }

    pub fn aws_config(&self, request_timeout: Duration) -> AwsConfig {
        AwsConfig::new(&self.aws.access_key_id, &self.aws.secret_access_key)
            .with_region(&self.aws.region)
            .with_session_token(self.aws.session_token.clone())
            .with_endpoint_url(self.aws.endpoint_url.clone())
            .with_request_timeout(request_timeout)
    }

    pub fn bucket_arn(&self) -> AwsArn {
        AwsArn::s3_bucket(partition_for_region(&self.aws.region), &self.s3.bucket_name)
    }
}

// Secrets routinely contain characters that must not be treated as escapes
fn parse_options() -> ParseOption {
    ParseOption {
        enabled_escape: false,
        ..ParseOption::default()
    }
}

fn section<'i>(ini: &'i Ini, name: &'static str) -> Result<&'i Properties, ConfigError> {
    ini.section(Some(name))
        .ok_or(ConfigError::MissingSection(name))
}

fn required(
    props: &Properties,
    section: &'static str,
    key: &'static str,
) -> Result<String, ConfigError> {
    optional(props, key).ok_or(ConfigError::MissingKey { section, key })
}

fn optional(props: &Properties, key: &str) -> Option<String> {
    props
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

fn invalid(section: &'static str, key: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section,
        key,
        reason: reason.to_string(),
    }
}
