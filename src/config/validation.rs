use std::path::PathBuf;

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use garde::Validate;

use super::AppConfig;
use crate::error::{ObservabilityError, Result};
use crate::observability::options::TraceOption;

/// Prefix of environment overrides, nested with `__`: `DBTRACE_LOGGING__LEVEL`
pub const ENV_PREFIX: &str = "DBTRACE_";

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "dbtrace", version, about = "Traced database client demo")]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, env = "DBTRACE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level filter
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format: json or pretty
    #[arg(long)]
    pub log_format: Option<String>,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    pub metrics_listen: Option<String>,

    /// Attach SQL text to spans
    #[arg(long)]
    pub annotate_sql: bool,

    /// Number of demo workload iterations
    #[arg(long, default_value_t = 3)]
    pub iterations: u32,
}

/// Load configuration: defaults, then the TOML file, then `DBTRACE_*`
/// environment variables, then CLI flags.
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));

    if let Some(path) = &cli.config {
        if !path.exists() {
            return Err(ObservabilityError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
    figment = apply_cli_overrides(figment, cli);

    let config: AppConfig = figment.extract()?;
    config.validate()?;

    Ok(config)
}

fn apply_cli_overrides(mut figment: Figment, cli: &Cli) -> Figment {
    if let Some(level) = &cli.log_level {
        figment = figment.merge(Serialized::default("logging.level", level));
    }
    if let Some(format) = &cli.log_format {
        figment = figment.merge(Serialized::default("logging.format", format));
    }
    if let Some(listen) = &cli.metrics_listen {
        figment = figment.merge(Serialized::default("metrics.listen", listen));
    }
    if cli.annotate_sql {
        figment = figment.merge(Serialized::default(
            "annotation.options",
            vec![TraceOption::AnnotateTracesWithSql],
        ));
    }
    figment
}
