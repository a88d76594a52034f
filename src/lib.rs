pub mod aws_api;
pub mod config;
pub mod policy;
pub mod provisioner;
pub mod util;

#[cfg(test)]
mod test_util;
