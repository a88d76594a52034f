use crate::aws_api::client::AwsClient;
use crate::aws_api::config::ServiceEndpoint;
use crate::aws_api::error::Error;
use crate::aws_api::query::QueryRequest;
use crate::aws_api::xml::XmlElement;
use crate::aws_api::{REDSHIFT_API_VERSION, REDSHIFT_SERVICE};
use tracing::debug;

// Guards against a provider that keeps handing back the same marker
const MAX_DESCRIBE_PAGES: usize = 100;

pub struct Redshift<'a> {
    client: &'a AwsClient,
    endpoint: ServiceEndpoint,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cluster {
    pub identifier: String,
    pub status: Option<String>,
    pub endpoint: Option<Endpoint>,
    pub vpc_security_groups: Vec<VpcSecurityGroup>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Endpoint {
    pub address: String,
    pub port: Option<u16>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VpcSecurityGroup {
    pub id: String,
    pub status: Option<String>,
}

impl Cluster {
    fn from_xml(elem: &XmlElement) -> Result<Self, Error> {
        let identifier = elem
            .find_text(&["ClusterIdentifier"])
            .filter(|s| !s.is_empty())
            .ok_or(Error::MissingField("ClusterIdentifier"))?
            .to_string();

        let endpoint = elem
            .child("Endpoint")
            .and_then(|e| {
                let address = e.find_text(&["Address"]).filter(|s| !s.is_empty())?;
                Some(Endpoint {
                    address: address.to_string(),
                    port: e.find_text(&["Port"]).and_then(|p| p.parse().ok()),
                })
            });

        let vpc_security_groups = elem
            .child("VpcSecurityGroups")
            .map(|groups| {
                groups
                    .children_named("VpcSecurityGroup")
                    .filter_map(|g| {
                        let id = g.find_text(&["VpcSecurityGroupId"])?;
                        Some(VpcSecurityGroup {
                            id: id.to_string(),
                            status: g.find_text(&["Status"]).map(|s| s.to_string()),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Cluster {
            identifier,
            status: elem.find_text(&["ClusterStatus"]).map(|s| s.to_string()),
            endpoint,
            vpc_security_groups,
        })
    }
}

impl<'a> Redshift<'a> {
    pub(crate) fn new(client: &'a AwsClient) -> Self {
        Self {
            client,
            endpoint: client.config.endpoint(REDSHIFT_SERVICE),
        }
    }

    /// Lists clusters, optionally filtered by identifier, following every page.
    pub async fn describe_clusters(&self, identifier: Option<&str>) -> Result<Vec<Cluster>, Error> {
        let mut clusters = Vec::new();
        let mut marker: Option<String> = None;

        for _ in 0..MAX_DESCRIBE_PAGES {
            let req = QueryRequest::new("DescribeClusters", REDSHIFT_API_VERSION)
                .param_opt("ClusterIdentifier", identifier)
                .param_opt("Marker", marker.as_deref());

            let root = self.client.query(&self.endpoint, &req).await?;
            let result = root
                .child("DescribeClustersResult")
                .ok_or(Error::MissingField("DescribeClustersResult"))?;

            if let Some(list) = result.child("Clusters") {
                for c in list.children_named("Cluster") {
                    clusters.push(Cluster::from_xml(c)?);
                }
            }

            marker = result
                .find_text(&["Marker"])
                .filter(|m| !m.is_empty())
                .map(|m| m.to_string());
            if marker.is_none() {
                return Ok(clusters);
            }
            debug!(count = clusters.len(), "Fetching next page of clusters");
        }

        Ok(clusters)
    }
}
