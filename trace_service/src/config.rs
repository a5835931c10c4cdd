use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, ValueHint};
use zktracer::TracerConfig;

const HELP_HEADING: &str = "Trace service options";

// If not provided, traces are written to `./traces/`.
fn default_output_dir() -> PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("traces");
    path
}

/// Command line and environment configuration of the service.
#[derive(Args, Clone, PartialEq, Eq, Debug)]
pub struct ServiceConfig {
    /// Directory where the conflated trace files are written.
    #[arg(short = 'o', long, env = "ZKTRACER_TRACES_OUTPUT_DIR", help_heading = HELP_HEADING, value_hint = ValueHint::DirPath, default_value = default_output_dir().into_os_string())]
    traces_output_dir: PathBuf,
    /// Trace engine version requests must expect.
    #[arg(long, env = "ZKTRACER_ENGINE_VERSION", help_heading = HELP_HEADING, default_value_t = crate::version())]
    engine_version: String,
    /// JSON file with the chain id and the per-module line count limits.
    #[arg(long, env = "ZKTRACER_TRACER_CONFIG", help_heading = HELP_HEADING, value_hint = ValueHint::FilePath)]
    tracer_config: Option<PathBuf>,
}

/// Runtime configuration of the service, fixed once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceServiceConfig {
    traces_output_dir: PathBuf,
    engine_version: String,
    tracer: TracerConfig,
}

impl TraceServiceConfig {
    /// A configuration serving the current engine version with a default
    /// tracer.
    pub fn new(traces_output_dir: impl Into<PathBuf>) -> Self {
        Self {
            traces_output_dir: traces_output_dir.into(),
            engine_version: crate::version(),
            tracer: TracerConfig::default(),
        }
    }

    pub fn with_engine_version(mut self, engine_version: impl Into<String>) -> Self {
        self.engine_version = engine_version.into();
        self
    }

    pub fn with_tracer_config(mut self, tracer: TracerConfig) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn traces_output_dir(&self) -> &std::path::Path {
        &self.traces_output_dir
    }

    pub fn engine_version(&self) -> &str {
        &self.engine_version
    }

    pub const fn tracer(&self) -> &TracerConfig {
        &self.tracer
    }
}

impl TryFrom<ServiceConfig> for TraceServiceConfig {
    type Error = anyhow::Error;

    fn try_from(cli: ServiceConfig) -> anyhow::Result<Self> {
        let tracer = match &cli.tracer_config {
            Some(path) => TracerConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => TracerConfig::default(),
        };
        Ok(Self::new(cli.traces_output_dir)
            .with_engine_version(cli.engine_version)
            .with_tracer_config(tracer))
    }
}
