use crate::aws_api::arn::AwsArn;
use serde::{Deserialize, Serialize};

pub const POLICY_VERSION: &str = "2012-10-17";
pub const REDSHIFT_PRINCIPAL: &str = "redshift.amazonaws.com";

pub const ASSUME_ROLE_ACTION: &str = "sts:AssumeRole";
pub const BUCKET_LIST_ACTIONS: &[&str] = &["s3:ListBucket"];
pub const OBJECT_ACTIONS: &[&str] = &["s3:PutObject", "s3:GetObject", "s3:DeleteObject"];

/// An IAM policy document, serialized with the field names IAM expects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statement: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    #[serde(rename = "Effect")]
    pub effect: Effect,
    #[serde(rename = "Principal", skip_serializing_if = "Option::is_none", default)]
    pub principal: Option<Principal>,
    #[serde(rename = "Action")]
    pub action: Vec<String>,
    #[serde(rename = "Resource", skip_serializing_if = "Vec::is_empty", default)]
    pub resource: Vec<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(rename = "Service")]
    pub service: String,
}

impl PolicyDocument {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn actions(list: &[&str]) -> Vec<String> {
    list.iter().map(|a| a.to_string()).collect()
}

/// Trust policy letting the Redshift service assume the role.
pub fn redshift_trust_policy() -> PolicyDocument {
    PolicyDocument {
        version: POLICY_VERSION.to_string(),
        statement: vec![Statement {
            effect: Effect::Allow,
            principal: Some(Principal {
                service: REDSHIFT_PRINCIPAL.to_string(),
            }),
            action: actions(&[ASSUME_ROLE_ACTION]),
            resource: Vec::new(),
        }],
    }
}

/// Grants listing the bucket and reading, writing and deleting its objects.
pub fn bucket_access_policy(bucket: &AwsArn) -> PolicyDocument {
    PolicyDocument {
        version: POLICY_VERSION.to_string(),
        statement: vec![
            Statement {
                effect: Effect::Allow,
                principal: None,
                action: actions(BUCKET_LIST_ACTIONS),
                resource: vec![bucket.to_string()],
            },
            Statement {
                effect: Effect::Allow,
                principal: None,
                action: actions(OBJECT_ACTIONS),
                resource: vec![bucket.s3_objects()],
            },
        ],
    }
}
