pub mod arn;
mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod iam;
pub mod query;
pub mod redshift;
pub mod xml;

pub const IAM_SERVICE: &str = "iam";
pub const REDSHIFT_SERVICE: &str = "redshift";

pub const IAM_API_VERSION: &str = "2010-05-08";
pub const REDSHIFT_API_VERSION: &str = "2012-12-01";
