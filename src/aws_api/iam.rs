use crate::aws_api::client::AwsClient;
use crate::aws_api::config::ServiceEndpoint;
use crate::aws_api::error::Error;
use crate::aws_api::query::QueryRequest;
use crate::aws_api::xml::XmlElement;
use crate::aws_api::{IAM_API_VERSION, IAM_SERVICE};

pub struct Iam<'a> {
    client: &'a AwsClient,
    endpoint: ServiceEndpoint,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Role {
    pub role_name: String,
    pub role_id: Option<String>,
    pub arn: String,
    pub path: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Policy {
    pub policy_name: String,
    pub policy_id: Option<String>,
    pub arn: String,
}

impl Role {
    fn from_xml(elem: &XmlElement) -> Result<Self, Error> {
        Ok(Role {
            role_name: required(elem, "RoleName")?,
            role_id: optional(elem, "RoleId"),
            arn: required(elem, "Arn")?,
            path: optional(elem, "Path"),
        })
    }
}

impl Policy {
    fn from_xml(elem: &XmlElement) -> Result<Self, Error> {
        Ok(Policy {
            policy_name: required(elem, "PolicyName")?,
            policy_id: optional(elem, "PolicyId"),
            arn: required(elem, "Arn")?,
        })
    }
}

impl<'a> Iam<'a> {
    pub(crate) fn new(client: &'a AwsClient) -> Self {
        Self {
            client,
            endpoint: client.config.endpoint(IAM_SERVICE),
        }
    }

    pub async fn create_role(
        &self,
        role_name: &str,
        assume_role_policy: &str,
        description: Option<&str>,
    ) -> Result<Role, Error> {
        let req = QueryRequest::new("CreateRole", IAM_API_VERSION)
            .param("RoleName", role_name)
            .param("AssumeRolePolicyDocument", assume_role_policy)
            .param_opt("Description", description);

        let root = self.client.query(&self.endpoint, &req).await?;
        Role::from_xml(result_element(&root, &["CreateRoleResult", "Role"])?)
    }

    pub async fn get_role(&self, role_name: &str) -> Result<Role, Error> {
        let req = QueryRequest::new("GetRole", IAM_API_VERSION).param("RoleName", role_name);

        let root = self.client.query(&self.endpoint, &req).await?;
        Role::from_xml(result_element(&root, &["GetRoleResult", "Role"])?)
    }

    pub async fn create_policy(
        &self,
        policy_name: &str,
        policy_document: &str,
        description: Option<&str>,
    ) -> Result<Policy, Error> {
        let req = QueryRequest::new("CreatePolicy", IAM_API_VERSION)
            .param("PolicyName", policy_name)
            .param("PolicyDocument", policy_document)
            .param_opt("Description", description);

        let root = self.client.query(&self.endpoint, &req).await?;
        Policy::from_xml(result_element(&root, &["CreatePolicyResult", "Policy"])?)
    }

    pub async fn attach_role_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), Error> {
        let req = QueryRequest::new("AttachRolePolicy", IAM_API_VERSION)
            .param("RoleName", role_name)
            .param("PolicyArn", policy_arn);

        // Response carries only request metadata
        self.client.query(&self.endpoint, &req).await?;
        Ok(())
    }
}

fn result_element<'x>(
    root: &'x XmlElement,
    path: &[&'static str],
) -> Result<&'x XmlElement, Error> {
    root.find(path)
        .ok_or(Error::MissingField(path[path.len() - 1]))
}

fn required(elem: &XmlElement, field: &'static str) -> Result<String, Error> {
    match elem.find_text(&[field]) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(Error::MissingField(field)),
    }
}

fn optional(elem: &XmlElement, field: &str) -> Option<String> {
    elem.find_text(&[field])
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}
