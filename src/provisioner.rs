//! The provisioning sequence: create the Redshift role, create and attach the
//! bucket access policy, then look up the cluster's connection details.
//!
//! Role creation, policy creation and attachment are best effort. Their
//! failures are reported and recorded, and the run carries on. Reading the
//! role ARN and describing the cluster are fatal when they fail.

use crate::aws_api::error::{Error, ErrorKind};
use crate::aws_api::iam::{Iam, Policy, Role};
use crate::aws_api::redshift::{Cluster, Redshift};
use crate::config::ProvisionConfig;
use crate::policy::{PolicyDocument, bucket_access_policy, redshift_trust_policy};
use std::fmt;
use std::io::Write;
use tracing::{debug, info, warn};

pub const ROLE_DESCRIPTION: &str = "Allows Redshift clusters to call AWS services on your behalf.";
pub const POLICY_DESCRIPTION: &str = "Read, write and delete access to a single S3 bucket.";

/// Identity service calls the provisioner needs.
#[allow(async_fn_in_trait)]
pub trait IamApi {
    async fn create_role(&self, role_name: &str, trust: &PolicyDocument) -> Result<Role, Error>;

    async fn get_role(&self, role_name: &str) -> Result<Role, Error>;

    async fn create_policy(
        &self,
        policy_name: &str,
        document: &PolicyDocument,
    ) -> Result<Policy, Error>;

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), Error>;
}

/// Cluster control plane calls the provisioner needs.
#[allow(async_fn_in_trait)]
pub trait RedshiftApi {
    async fn describe_clusters(&self, identifier: Option<&str>) -> Result<Vec<Cluster>, Error>;
}

impl IamApi for Iam<'_> {
    async fn create_role(&self, role_name: &str, trust: &PolicyDocument) -> Result<Role, Error> {
        Iam::create_role(self, role_name, &trust.to_json()?, Some(ROLE_DESCRIPTION)).await
    }

    async fn get_role(&self, role_name: &str) -> Result<Role, Error> {
        Iam::get_role(self, role_name).await
    }

    async fn create_policy(
        &self,
        policy_name: &str,
        document: &PolicyDocument,
    ) -> Result<Policy, Error> {
        Iam::create_policy(
            self,
            policy_name,
            &document.to_json()?,
            Some(POLICY_DESCRIPTION),
        )
        .await
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), Error> {
        Iam::attach_role_policy(self, role_name, policy_arn).await
    }
}

impl RedshiftApi for Redshift<'_> {
    async fn describe_clusters(&self, identifier: Option<&str>) -> Result<Vec<Cluster>, Error> {
        Redshift::describe_clusters(self, identifier).await
    }
}

/// Connection details of a cluster.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterEndpoint {
    pub identifier: String,
    pub address: String,
    pub port: Option<u16>,
    pub security_group_id: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    CreateRole,
    CreatePolicy,
    AttachPolicy,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::CreateRole => "create role",
            Step::CreatePolicy => "create policy",
            Step::AttachPolicy => "attach policy",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepFailure {
    pub step: Step,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProvisionReport {
    pub role_arn: String,
    pub created_role_arn: Option<String>,
    pub created_policy_arn: Option<String>,
    pub attached_policy_arn: Option<String>,
    pub cluster: ClusterEndpoint,
    pub failures: Vec<StepFailure>,
}

impl ProvisionReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Linear scan for the descriptor with the given identifier. Redshift stores
/// identifiers lower cased, so the comparison ignores ASCII case.
pub fn find_cluster<'c>(clusters: &'c [Cluster], identifier: &str) -> Option<&'c Cluster> {
    clusters
        .iter()
        .find(|c| c.identifier.eq_ignore_ascii_case(identifier))
}

pub struct Provisioner<'a, I, R, W> {
    config: &'a ProvisionConfig,
    iam: I,
    redshift: R,
    out: W,
}

impl<'a, I, R, W> Provisioner<'a, I, R, W>
where
    I: IamApi,
    R: RedshiftApi,
    W: Write,
{
    pub fn new(config: &'a ProvisionConfig, iam: I, redshift: R, out: W) -> Self {
        Self {
            config,
            iam,
            redshift,
            out,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    fn status(&mut self, line: fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.out, "{}", line) {
            debug!(error = %e, "Unable to write status line");
        }
    }

    fn report_failure(&mut self, step: Step, err: &Error) {
        warn!(step = %step, kind = %err.kind(), error = %err, "Provisioning step failed");
        self.status(format_args!("Failed to {}: {}", step, err.message()));
    }

    /// Creates the role Redshift can assume. The failure is reported before it
    /// is returned, callers may ignore it.
    pub async fn create_role(&mut self, role_name: &str) -> Result<String, Error> {
        let trust = redshift_trust_policy();
        match self.iam.create_role(role_name, &trust).await {
            Ok(role) => {
                info!(role = %role.role_name, arn = %role.arn, "Created IAM role");
                self.status(format_args!(
                    "Created role {} with ARN {}",
                    role.role_name, role.arn
                ));
                Ok(role.arn)
            }
            Err(e) => {
                self.report_failure(Step::CreateRole, &e);
                Err(e)
            }
        }
    }

    pub async fn get_role_arn(&mut self, role_name: &str) -> Result<String, Error> {
        let role = self.iam.get_role(role_name).await?;
        self.status(format_args!("Role {} has ARN {}", role_name, role.arn));
        Ok(role.arn)
    }

    /// Creates the bucket access policy. The failure is reported before it is
    /// returned, callers may ignore it.
    pub async fn create_policy(&mut self, policy_name: &str) -> Result<String, Error> {
        let document = bucket_access_policy(&self.config.bucket_arn());
        match self.iam.create_policy(policy_name, &document).await {
            Ok(policy) => {
                info!(policy = %policy.policy_name, arn = %policy.arn, "Created IAM policy");
                self.status(format_args!(
                    "Created policy {} with ARN {}",
                    policy.policy_name, policy.arn
                ));

                // Attachment uses the configured ARN, not this one
                if policy.arn != self.config.iam.policy_arn {
                    warn!(
                        created = %policy.arn,
                        configured = %self.config.iam.policy_arn,
                        "Created policy ARN differs from the configured policy_arn"
                    );
                }
                Ok(policy.arn)
            }
            Err(e) => {
                self.report_failure(Step::CreatePolicy, &e);
                Err(e)
            }
        }
    }

    pub async fn attach_policy(&mut self, role_name: &str, policy_arn: &str) -> Result<(), Error> {
        match self.iam.attach_role_policy(role_name, policy_arn).await {
            Ok(()) => {
                info!(role = role_name, policy_arn, "Attached policy to role");
                self.status(format_args!("Attached policy {} to role {}", policy_arn, role_name));
                Ok(())
            }
            Err(e) => {
                self.report_failure(Step::AttachPolicy, &e);
                Err(e)
            }
        }
    }

    pub async fn describe_cluster(
        &mut self,
        cluster_identifier: &str,
    ) -> Result<ClusterEndpoint, Error> {
        let clusters = match self.redshift.describe_clusters(Some(cluster_identifier)).await {
            Ok(clusters) => clusters,
            Err(e) if e.kind() == ErrorKind::ResourceNotFound => Vec::new(),
            Err(e) => return Err(e),
        };

        let cluster = find_cluster(&clusters, cluster_identifier)
            .ok_or_else(|| Error::ClusterNotFound(cluster_identifier.to_string()))?;

        let endpoint = cluster
            .endpoint
            .as_ref()
            .ok_or_else(|| Error::ClusterIncomplete {
                identifier: cluster.identifier.clone(),
                missing: "endpoint",
            })?;
        let security_group = cluster
            .vpc_security_groups
            .first()
            .ok_or_else(|| Error::ClusterIncomplete {
                identifier: cluster.identifier.clone(),
                missing: "VPC security group",
            })?;

        let details = ClusterEndpoint {
            identifier: cluster.identifier.clone(),
            address: endpoint.address.clone(),
            port: endpoint.port,
            security_group_id: security_group.id.clone(),
        };

        self.status(format_args!("Cluster endpoint: {}", details.address));
        self.status(format_args!(
            "Cluster VPC security group: {}",
            details.security_group_id
        ));
        Ok(details)
    }

    /// Runs every step in order.
    pub async fn run(&mut self) -> Result<ProvisionReport, Error> {
        let config = self.config;
        let role_name = config.iam.role_name.as_str();
        let mut failures = Vec::new();

        let created_role_arn = record(
            Step::CreateRole,
            self.create_role(role_name).await,
            &mut failures,
        );

        let role_arn = self.get_role_arn(role_name).await?;

        let created_policy_arn = record(
            Step::CreatePolicy,
            self.create_policy(&config.iam.policy_name).await,
            &mut failures,
        );

        let attached_policy_arn = record(
            Step::AttachPolicy,
            self.attach_policy(role_name, &config.iam.policy_arn).await,
            &mut failures,
        )
        .map(|_| config.iam.policy_arn.clone());

        let cluster = self
            .describe_cluster(&config.redshift.cluster_identifier)
            .await?;

        Ok(ProvisionReport {
            role_arn,
            created_role_arn,
            created_policy_arn,
            attached_policy_arn,
            cluster,
            failures,
        })
    }
}

fn record<T>(step: Step, res: Result<T, Error>, failures: &mut Vec<StepFailure>) -> Option<T> {
    match res {
        Ok(v) => Some(v),
        Err(e) => {
            failures.push(StepFailure {
                step,
                kind: e.kind(),
                message: e.message(),
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws_api::redshift::{Endpoint, VpcSecurityGroup};
    use crate::policy::{Effect, REDSHIFT_PRINCIPAL};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    const ROLE_ARN: &str = "arn:aws:iam::123456789012:role/R";
    const POLICY_ARN: &str = "arn:aws:iam::123456789012:policy/P";

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        CreateRole(String, PolicyDocument),
        GetRole(String),
        CreatePolicy(String, PolicyDocument),
        Attach(String, String),
        Describe(Option<String>),
    }

    #[derive(Default)]
    struct FakeCloud {
        calls: RefCell<Vec<Call>>,
        existing_roles: Vec<String>,
        fail_create_role: bool,
        fail_create_policy: bool,
        fail_attach: bool,
        clusters: RefCell<VecDeque<Result<Vec<Cluster>, Error>>>,
    }

    fn aws_error(status: u16, code: &str, message: &str) -> Error {
        Error::AwsError {
            status,
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    impl IamApi for &FakeCloud {
        async fn create_role(
            &self,
            role_name: &str,
            trust: &PolicyDocument,
        ) -> Result<Role, Error> {
            self.calls
                .borrow_mut()
                .push(Call::CreateRole(role_name.to_string(), trust.clone()));
            if self.fail_create_role {
                return Err(aws_error(403, "AccessDenied", "not allowed to create role"));
            }
            if self.existing_roles.iter().any(|r| r == role_name) {
                return Err(aws_error(
                    409,
                    "EntityAlreadyExists",
                    &format!("Role with name {} already exists.", role_name),
                ));
            }
            Ok(Role {
                role_name: role_name.to_string(),
                role_id: None,
                arn: format!("arn:aws:iam::123456789012:role/{}", role_name),
                path: None,
            })
        }

        async fn get_role(&self, role_name: &str) -> Result<Role, Error> {
            self.calls
                .borrow_mut()
                .push(Call::GetRole(role_name.to_string()));
            let known = self.existing_roles.iter().any(|r| r == role_name)
                || !self.fail_create_role
                    && self
                        .calls
                        .borrow()
                        .iter()
                        .any(|c| matches!(c, Call::CreateRole(name, _) if name == role_name));
            if !known {
                return Err(aws_error(
                    404,
                    "NoSuchEntity",
                    &format!("The role with name {} cannot be found.", role_name),
                ));
            }
            Ok(Role {
                role_name: role_name.to_string(),
                role_id: None,
                arn: format!("arn:aws:iam::123456789012:role/{}", role_name),
                path: None,
            })
        }

        async fn create_policy(
            &self,
            policy_name: &str,
            document: &PolicyDocument,
        ) -> Result<Policy, Error> {
            self.calls
                .borrow_mut()
                .push(Call::CreatePolicy(policy_name.to_string(), document.clone()));
            if self.fail_create_policy {
                return Err(aws_error(403, "AccessDenied", "not allowed to create policy"));
            }
            Ok(Policy {
                policy_name: policy_name.to_string(),
                policy_id: None,
                arn: format!("arn:aws:iam::123456789012:policy/{}", policy_name),
            })
        }

        async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), Error> {
            self.calls
                .borrow_mut()
                .push(Call::Attach(role_name.to_string(), policy_arn.to_string()));
            if self.fail_attach {
                return Err(aws_error(404, "NoSuchEntity", "policy does not exist"));
            }
            Ok(())
        }
    }

    impl RedshiftApi for &FakeCloud {
        async fn describe_clusters(&self, identifier: Option<&str>) -> Result<Vec<Cluster>, Error> {
            self.calls
                .borrow_mut()
                .push(Call::Describe(identifier.map(|s| s.to_string())));
            self.clusters
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn test_config() -> ProvisionConfig {
        ProvisionConfig::from_ini_str(&format!(
            r#"
[AWS]
access_key_id = AKID
secret_access_key = SECRET

[IAM]
role_name = R
policy_name = P
policy_arn = {}

[S3]
bucket_name = bucket-name

[Redshift]
cluster_identifier = X
"#,
            POLICY_ARN
        ))
        .unwrap()
    }

    fn cluster(id: &str, address: &str, sgs: &[&str]) -> Cluster {
        Cluster {
            identifier: id.to_string(),
            status: Some("available".to_string()),
            endpoint: Some(Endpoint {
                address: address.to_string(),
                port: Some(5439),
            }),
            vpc_security_groups: sgs
                .iter()
                .map(|id| VpcSecurityGroup {
                    id: id.to_string(),
                    status: Some("active".to_string()),
                })
                .collect(),
        }
    }

    fn provisioner<'a>(
        config: &'a ProvisionConfig,
        cloud: &'a FakeCloud,
    ) -> Provisioner<'a, &'a FakeCloud, &'a FakeCloud, Vec<u8>> {
        Provisioner::new(config, cloud, cloud, Vec::new())
    }

    fn call_names(cloud: &FakeCloud) -> Vec<&'static str> {
        cloud
            .calls
            .borrow()
            .iter()
            .map(|c| match c {
                Call::CreateRole(..) => "create_role",
                Call::GetRole(..) => "get_role",
                Call::CreatePolicy(..) => "create_policy",
                Call::Attach(..) => "attach",
                Call::Describe(..) => "describe",
            })
            .collect()
    }

    fn output<I: IamApi, R: RedshiftApi>(p: Provisioner<'_, I, R, Vec<u8>>) -> String {
        String::from_utf8(p.into_output()).unwrap()
    }

    #[tokio::test]
    async fn test_create_role_sends_redshift_trust_policy() {
        let config = test_config();
        let cloud = FakeCloud::default();
        let mut p = provisioner(&config, &cloud);

        let arn = p.create_role("R").await.unwrap();
        assert_eq!(ROLE_ARN, arn);

        let calls = cloud.calls.borrow();
        assert_eq!(1, calls.len());
        let Call::CreateRole(name, trust) = &calls[0] else {
            panic!("unexpected call: {:?}", calls[0]);
        };
        assert_eq!("R", name.as_str());
        assert_eq!(1, trust.statement.len());
        let statement = &trust.statement[0];
        assert_eq!(Effect::Allow, statement.effect);
        assert_eq!(
            REDSHIFT_PRINCIPAL,
            statement.principal.as_ref().unwrap().service
        );
        assert_eq!(vec!["sts:AssumeRole".to_string()], statement.action);
        drop(calls);

        let out = output(p);
        assert!(out.contains("R"));
        assert!(out.contains(ROLE_ARN));
    }

    #[tokio::test]
    async fn test_create_existing_role_is_reported() {
        let config = test_config();
        let cloud = FakeCloud {
            existing_roles: vec!["R".to_string()],
            ..Default::default()
        };
        let mut p = provisioner(&config, &cloud);

        let err = p.create_role("R").await.unwrap_err();
        assert_eq!(ErrorKind::ResourceExists, err.kind());

        let out = output(p);
        assert!(out.contains("Role with name R already exists."));
    }

    #[tokio::test]
    async fn test_create_policy_document() {
        let config = test_config();
        let cloud = FakeCloud::default();
        let mut p = provisioner(&config, &cloud);

        let arn = p.create_policy("P").await.unwrap();
        assert_eq!(POLICY_ARN, arn);

        let calls = cloud.calls.borrow();
        let Call::CreatePolicy(name, doc) = &calls[0] else {
            panic!("unexpected call: {:?}", calls[0]);
        };
        assert_eq!("P", name.as_str());
        assert_eq!(2, doc.statement.len());
        assert_eq!(vec!["s3:ListBucket".to_string()], doc.statement[0].action);
        assert_eq!(
            vec!["arn:aws:s3:::bucket-name".to_string()],
            doc.statement[0].resource
        );
        assert_eq!(
            vec![
                "s3:PutObject".to_string(),
                "s3:GetObject".to_string(),
                "s3:DeleteObject".to_string()
            ],
            doc.statement[1].action
        );
        assert_eq!(
            vec!["arn:aws:s3:::bucket-name/*".to_string()],
            doc.statement[1].resource
        );
    }

    #[tokio::test]
    async fn test_attach_uses_configured_arn_after_policy_failure() {
        let config = test_config();
        let cloud = FakeCloud {
            fail_create_policy: true,
            clusters: RefCell::new(VecDeque::from(vec![Ok(vec![cluster(
                "X",
                "host:5439",
                &["sg-1"],
            )])])),
            ..Default::default()
        };
        let mut p = provisioner(&config, &cloud);

        let report = p.run().await.unwrap();

        let attaches: Vec<Call> = cloud
            .calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, Call::Attach(..)))
            .cloned()
            .collect();
        assert_eq!(
            vec![Call::Attach("R".to_string(), POLICY_ARN.to_string())],
            attaches
        );

        assert!(!report.is_complete());
        assert_eq!(None, report.created_policy_arn);
        assert_eq!(Some(POLICY_ARN.to_string()), report.attached_policy_arn);
        assert_eq!(
            vec![StepFailure {
                step: Step::CreatePolicy,
                kind: ErrorKind::PermissionDenied,
                message: "not allowed to create policy".to_string(),
            }],
            report.failures
        );
    }

    #[tokio::test]
    async fn test_describe_cluster_found() {
        let config = test_config();
        let cloud = FakeCloud {
            clusters: RefCell::new(VecDeque::from(vec![Ok(vec![cluster(
                "X",
                "host:5439",
                &["sg-1"],
            )])])),
            ..Default::default()
        };
        let mut p = provisioner(&config, &cloud);

        let details = p.describe_cluster("X").await.unwrap();
        assert_eq!(
            ("host:5439", "sg-1"),
            (
                details.address.as_str(),
                details.security_group_id.as_str()
            )
        );
        assert_eq!(
            vec![Call::Describe(Some("X".to_string()))],
            *cloud.calls.borrow()
        );

        let out = output(p);
        assert!(out.contains("host:5439"));
        assert!(out.contains("sg-1"));
    }

    #[tokio::test]
    async fn test_describe_cluster_not_found() {
        let config = test_config();
        let cloud = FakeCloud {
            clusters: RefCell::new(VecDeque::from(vec![
                Ok(vec![cluster("other", "other:5439", &["sg-2"])]),
                Err(aws_error(404, "ClusterNotFound", "Cluster X not found.")),
            ])),
            ..Default::default()
        };
        let mut p = provisioner(&config, &cloud);

        let err = p.describe_cluster("X").await.unwrap_err();
        assert!(matches!(err, Error::ClusterNotFound(ref id) if id == "X"));
        assert_eq!(ErrorKind::ResourceNotFound, err.kind());

        // The provider's own not-found answer maps to the same result
        let err = p.describe_cluster("X").await.unwrap_err();
        assert!(matches!(err, Error::ClusterNotFound(_)));
    }

    #[tokio::test]
    async fn test_describe_cluster_without_endpoint() {
        let config = test_config();
        let mut creating = cluster("X", "", &[]);
        creating.endpoint = None;
        creating.status = Some("creating".to_string());
        let cloud = FakeCloud {
            clusters: RefCell::new(VecDeque::from(vec![
                Ok(vec![creating]),
                Ok(vec![cluster("X", "host", &[])]),
            ])),
            ..Default::default()
        };
        let mut p = provisioner(&config, &cloud);

        let err = p.describe_cluster("X").await.unwrap_err();
        assert!(matches!(
            err,
            Error::ClusterIncomplete {
                missing: "endpoint",
                ..
            }
        ));

        let err = p.describe_cluster("X").await.unwrap_err();
        assert!(matches!(
            err,
            Error::ClusterIncomplete {
                missing: "VPC security group",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_describe_propagates_other_errors() {
        let config = test_config();
        let cloud = FakeCloud {
            clusters: RefCell::new(VecDeque::from(vec![Err(aws_error(
                403,
                "AccessDenied",
                "denied",
            ))])),
            ..Default::default()
        };
        let mut p = provisioner(&config, &cloud);

        let err = p.describe_cluster("X").await.unwrap_err();
        assert_eq!(ErrorKind::PermissionDenied, err.kind());
    }

    #[tokio::test]
    async fn test_full_run_with_existing_role() {
        let config = test_config();
        let cloud = FakeCloud {
            existing_roles: vec!["R".to_string()],
            clusters: RefCell::new(VecDeque::from(vec![Ok(vec![
                cluster("a", "a:5439", &["sg-a"]),
                cluster("x", "host:5439", &["sg-1", "sg-2"]),
            ])])),
            ..Default::default()
        };
        let mut p = provisioner(&config, &cloud);

        let report = p.run().await.unwrap();

        assert_eq!(ROLE_ARN, report.role_arn);
        assert_eq!(None, report.created_role_arn);
        assert_eq!(Some(POLICY_ARN.to_string()), report.created_policy_arn);
        assert_eq!(1, report.failures.len());
        assert_eq!(Step::CreateRole, report.failures[0].step);
        assert_eq!(ErrorKind::ResourceExists, report.failures[0].kind);
        assert_eq!("x", report.cluster.identifier);
        assert_eq!("sg-1", report.cluster.security_group_id);

        let names = call_names(&cloud);
        assert_eq!(
            vec!["create_role", "get_role", "create_policy", "attach", "describe"],
            names
        );
    }

    #[tokio::test]
    async fn test_missing_role_is_fatal() {
        let config = test_config();
        let cloud = FakeCloud::default();
        let mut p = provisioner(&config, &cloud);

        let err = p.get_role_arn("unknown").await.unwrap_err();
        assert_eq!(ErrorKind::ResourceNotFound, err.kind());
        assert_eq!(vec![Call::GetRole("unknown".to_string())], *cloud.calls.borrow());
    }

    #[tokio::test]
    async fn test_run_stops_when_role_cannot_be_read() {
        let config = test_config();
        let cloud = FakeCloud {
            fail_create_role: true,
            ..Default::default()
        };
        let mut p = provisioner(&config, &cloud);

        let err = p.run().await.unwrap_err();
        assert_eq!(ErrorKind::ResourceNotFound, err.kind());
        assert_eq!(vec!["create_role", "get_role"], call_names(&cloud));

        let out = output(p);
        assert!(out.contains("not allowed to create role"));
    }

    #[tokio::test]
    async fn test_run_stops_when_cluster_is_missing() {
        let config = test_config();
        let cloud = FakeCloud {
            clusters: RefCell::new(VecDeque::from(vec![Ok(vec![cluster(
                "other",
                "other:5439",
                &["sg-o"],
            )])])),
            ..Default::default()
        };
        let mut p = provisioner(&config, &cloud);

        let err = p.run().await.unwrap_err();
        assert!(matches!(err, Error::ClusterNotFound(ref id) if id == "X"));
        assert_eq!(ErrorKind::ResourceNotFound, err.kind());
        assert_eq!(
            vec!["create_role", "get_role", "create_policy", "attach", "describe"],
            call_names(&cloud)
        );
    }

    #[tokio::test]
    async fn test_attach_failure_is_not_fatal() {
        let config = test_config();
        let cloud = FakeCloud {
            fail_attach: true,
            clusters: RefCell::new(VecDeque::from(vec![Ok(vec![cluster(
                "X",
                "host:5439",
                &["sg-1"],
            )])])),
            ..Default::default()
        };
        let mut p = provisioner(&config, &cloud);

        let report = p.run().await.unwrap();
        assert_eq!(None, report.attached_policy_arn);
        assert_eq!(Step::AttachPolicy, report.failures[0].step);
        assert_eq!("host:5439", report.cluster.address);

        let out = output(p);
        assert!(out.contains("Failed to attach policy: policy does not exist"));
    }
}
