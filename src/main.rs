use clap::{Parser, ValueEnum};
use redshift_iam_setup::aws_api::client::AwsClient;
use redshift_iam_setup::config::{DEFAULT_CONFIG_FILE, ProvisionConfig};
use redshift_iam_setup::provisioner::{ProvisionReport, Provisioner};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::time::Instant;
use tower::BoxError;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

#[derive(Debug, Parser)]
#[command(name = "redshift-iam-setup")]
#[command(bin_name = "redshift-iam-setup")]
struct Arguments {
    #[arg(long, env = "PROVISION_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    /// Config file holding credentials and resource names
    config: PathBuf,

    #[arg(long, env = "PROVISION_LOG_LEVEL", default_value = "info")]
    /// Log configuration
    log_level: String,

    #[arg(value_enum, long, env = "PROVISION_LOG_FORMAT", default_value = "text")]
    /// Log format
    log_format: LogFormatArg,

    #[arg(long, env = "PROVISION_REQUEST_TIMEOUT", default_value = "30", value_parser = parse_timeout)]
    /// Timeout in seconds for each AWS API call
    request_timeout: Duration,

    // This is ignored in these options, but we keep it here to avoid an error on unknown
    // options
    #[arg(long)]
    env_file: Option<String>,
}

// Minimal option to allow us to parse out the env from a file
#[derive(Debug, Parser)]
#[clap(ignore_errors = true)]
struct EnvFileArguments {
    #[arg(long, env = "PROVISION_ENV_FILE")]
    env_file: Option<String>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

fn main() -> ExitCode {
    let start_time = Instant::now();

    let env_opt = EnvFileArguments::parse();
    if let Some(env_file) = env_opt.env_file {
        if let Err(e) = load_env_file(&env_file) {
            eprintln!("Can not load envfile: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let opt = Arguments::parse();

    let _logger = match setup_logging(&opt.log_level, opt.log_format) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ERROR: unable to set up logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = match ProvisionConfig::load(&opt.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration.");
            return ExitCode::from(1);
        }
    };

    match run_provisioning(&config, opt.request_timeout) {
        Ok(report) => {
            if !report.is_complete() {
                for failure in &report.failures {
                    warn!(
                        step = %failure.step,
                        kind = %failure.kind,
                        "Step did not complete: {}",
                        failure.message
                    );
                }
            }
            info!(
                "Provisioning finished in {}ms",
                start_time.elapsed().as_millis()
            );
        }
        Err(e) => {
            error!(error = %e, "Provisioning failed.");
            return ExitCode::from(1);
        }
    }

    ExitCode::SUCCESS
}

fn load_env_file(env_file: &String) -> Result<(), BoxError> {
    let subs = load_env_file_updates(env_file)?;

    for (key, val) in subs {
        unsafe { env::set_var(key, val) }
    }

    Ok(())
}

fn load_env_file_updates(env_file: &String) -> Result<Vec<(String, String)>, BoxError> {
    let mut updates = Vec::new();
    for item in dotenvy::from_filename_iter(env_file)
        .map_err(|e| format!("failed to open env file {}: {}", env_file, e))?
    {
        let (key, val) = item.map_err(|e| format!("unable to parse line: {}", e))?;
        updates.push((key, val))
    }

    Ok(updates)
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    let secs: u64 = s
        .parse()
        .map_err(|e| format!("invalid timeout {}: {}", s, e))?;
    if secs == 0 {
        return Err("timeout must be at least one second".to_string());
    }
    Ok(Duration::from_secs(secs))
}

#[tokio::main(flavor = "current_thread")]
async fn run_provisioning(
    config: &ProvisionConfig,
    request_timeout: Duration,
) -> Result<ProvisionReport, BoxError> {
    // Already installed is fine
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let client = AwsClient::new(config.aws_config(request_timeout))?;
    info!(
        region = client.config().region(),
        role = %config.iam.role_name,
        cluster = %config.redshift.cluster_identifier,
        "Starting provisioning"
    );

    let mut provisioner = Provisioner::new(
        config,
        client.iam(),
        client.redshift(),
        std::io::stdout(),
    );

    Ok(provisioner.run().await?)
}

type LoggerGuard = tracing_appender::non_blocking::WorkerGuard;

// Status lines own stdout, logs go to stderr
fn setup_logging(log_level: &str, format: LogFormatArg) -> Result<LoggerGuard, BoxError> {
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_writer)
        // disable printing of the module
        .with_target(false);

    let registry = Registry::default().with(EnvFilter::new(log_level));
    match format {
        LogFormatArg::Text => {
            tracing::subscriber::set_global_default(registry.with(layer.compact()))?
        }
        LogFormatArg::Json => tracing::subscriber::set_global_default(registry.with(layer.json()))?,
    }

    Ok(guard)
}

#[cfg(test)]
mod test {
    use crate::{load_env_file_updates, parse_timeout};
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_env_var_subs() {
        let tf = write_env_file(vec![
            "PROVISION_CONFIG=/etc/provision/dl.cfg",
            "PROVISION_LOG_LEVEL=\"debug\"",
            "AWS_PROFILE_SUFFIX=${PROVISION_TEST_TEAM}-dwh",
        ]);

        unsafe { std::env::set_var("PROVISION_TEST_TEAM", "analytics") };

        let tf_path = tf.path().to_str().unwrap().to_string();
        let updates = load_env_file_updates(&tf_path).unwrap();

        assert_eq!(
            vec![
                (
                    "PROVISION_CONFIG".to_string(),
                    "/etc/provision/dl.cfg".to_string()
                ),
                ("PROVISION_LOG_LEVEL".to_string(), "debug".to_string()),
                (
                    "AWS_PROFILE_SUFFIX".to_string(),
                    "analytics-dwh".to_string()
                ),
            ],
            updates
        );

        unsafe { std::env::remove_var("PROVISION_TEST_TEAM") };
    }

    #[test]
    fn test_missing_env_file() {
        assert!(load_env_file_updates(&"/nonexistent/.env".to_string()).is_err());
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(Duration::from_secs(30), parse_timeout("30").unwrap());
        assert!(parse_timeout("0").is_err());
        assert!(parse_timeout("soon").is_err());
    }

    fn write_env_file(envs: Vec<&str>) -> NamedTempFile {
        let mut tf = NamedTempFile::new().unwrap();

        for env in envs {
            tf.write_all(format!("{}\n", env).as_ref()).unwrap();
        }
        tf.flush().unwrap();

        tf
    }
}
