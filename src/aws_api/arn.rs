use crate::aws_api::error::Error;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq)]
pub struct AwsArn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    pub resource_type: String,
    pub resource_id: String,
    // separator between type and id, either ':' or '/'
    separator: Option<char>,
}

impl FromStr for AwsArn {
    type Err = Error;

    // Handles arn:partition:service:region:account:resource where resource is
    // either a bare id, type/id or type:id. Region and account may be empty (IAM, S3).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.splitn(6, ':').collect();
        if parts.len() != 6 || parts[0] != "arn" {
            return Err(Error::ArnParseError(s.to_string()));
        }

        let (partition, service, resource) = (parts[1], parts[2], parts[5]);
        if partition.is_empty() || service.is_empty() || resource.is_empty() {
            return Err(Error::ArnParseError(s.to_string()));
        }

        let split = resource
            .char_indices()
            .find(|(_, c)| *c == '/' || *c == ':');
        let (resource_type, resource_id, separator) = match split {
            Some((idx, c)) => (&resource[..idx], &resource[idx + 1..], Some(c)),
            None => ("", resource, None),
        };

        if resource_id.is_empty() {
            return Err(Error::ArnParseError(s.to_string()));
        }

        Ok(AwsArn {
            partition: partition.to_string(),
            service: service.to_string(),
            region: parts[3].to_string(),
            account_id: parts[4].to_string(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            separator,
        })
    }
}

impl fmt::Display for AwsArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:",
            self.partition, self.service, self.region, self.account_id
        )?;
        match self.separator {
            Some(sep) => write!(f, "{}{}{}", self.resource_type, sep, self.resource_id),
            None => write!(f, "{}", self.resource_id),
        }
    }
}

impl AwsArn {
    /// ARN of an S3 bucket. Buckets carry neither region nor account.
    pub fn s3_bucket(partition: &str, bucket: &str) -> Self {
        AwsArn {
            partition: partition.to_string(),
            service: "s3".to_string(),
            region: "".to_string(),
            account_id: "".to_string(),
            resource_type: "".to_string(),
            resource_id: bucket.to_string(),
            separator: None,
        }
    }

    /// The ARN addressing every object key below this bucket.
    pub fn s3_objects(&self) -> String {
        format!("{}/*", self)
    }

    pub fn is_iam_policy(&self) -> bool {
        self.service == "iam" && self.resource_type == "policy"
    }
}
