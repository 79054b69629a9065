use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for kindling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KindlingConfig {
    /// Server-under-test settings
    pub server: ServerConfig,
    /// Ephemeral cluster settings
    pub cluster: ClusterConfig,
    /// Integration suite settings
    pub tests: TestSuiteConfig,
    /// Trigger gating settings
    pub trigger: TriggerConfig,
    /// Step and job time budgets
    pub timeouts: TimeoutConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Workspace settings
    pub workspace: WorkspaceConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Program used to start the server under test
    pub command: String,
    /// Arguments for the server command
    pub args: Vec<String>,
    /// API URL handed to the test suite (and exported to the server process)
    pub api_url: String,
    /// Health endpoint polled by the readiness gate
    pub health_url: String,
    /// File capturing the server's stdout/stderr for the run
    pub log_file: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusterConfig {
    /// Name of the ephemeral cluster, also keys the per-host run lock
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TestSuiteConfig {
    /// Program used to run the integration suite
    pub command: String,
    /// Arguments for the test runner
    pub args: Vec<String>,
    /// Directory the suite is invoked from, relative to the workspace root
    pub working_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TriggerConfig {
    /// Branch whose pushes may invoke the pipeline
    pub main_branch: String,
    /// Changed-path globs that warrant a run for PR/push events
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    /// Overall job budget in seconds
    pub job_seconds: u64,
    /// Readiness gate budget in seconds
    pub readiness_seconds: u64,
    /// Interval between readiness probes in milliseconds
    pub readiness_poll_interval_ms: u64,
    /// Per-probe HTTP request timeout in milliseconds
    pub probe_request_timeout_ms: u64,
    /// Budget for the unconditional teardown phase in seconds
    pub teardown_grace_seconds: u64,
    /// Timeout for toolchain/cluster shell-outs in seconds
    pub command_seconds: u64,
}

impl TimeoutConfig {
    pub fn job(&self) -> Duration {
        Duration::from_secs(self.job_seconds)
    }

    pub fn readiness(&self) -> Duration {
        Duration::from_secs(self.readiness_seconds)
    }

    pub fn readiness_poll_interval(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_interval_ms)
    }

    pub fn probe_request(&self) -> Duration {
        Duration::from_millis(self.probe_request_timeout_ms)
    }

    pub fn teardown_grace(&self) -> Duration {
        Duration::from_secs(self.teardown_grace_seconds)
    }

    pub fn command(&self) -> Duration {
        Duration::from_secs(self.command_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON log lines instead of the human format
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    /// Root of the checked-out source tree the run operates on
    pub root: String,
    /// Where run reports land when --report is given without a path
    pub report_dir: String,
}

impl Default for KindlingConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                command: "uv".to_string(),
                args: vec!["run".to_string(), "server".to_string(), "start".to_string()],
                api_url: "http://127.0.0.1:4200/api".to_string(),
                health_url: "http://127.0.0.1:4200/api/health".to_string(),
                log_file: "server.log".to_string(),
            },
            cluster: ClusterConfig {
                name: "kindling-test".to_string(),
            },
            tests: TestSuiteConfig {
                command: "uv".to_string(),
                args: vec!["run".to_string(), "pytest".to_string(), "tests".to_string()],
                working_dir: ".".to_string(),
            },
            trigger: TriggerConfig {
                main_branch: "main".to_string(),
                paths: vec![
                    "src/**".to_string(),
                    "tests/**".to_string(),
                    "Cargo.toml".to_string(),
                ],
            },
            timeouts: TimeoutConfig {
                job_seconds: 600, // 10 minutes for the whole job
                readiness_seconds: 300,
                readiness_poll_interval_ms: 2000,
                probe_request_timeout_ms: 5000,
                teardown_grace_seconds: 60,
                command_seconds: 120,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
            workspace: WorkspaceConfig {
                root: ".".to_string(),
                report_dir: ".kindling".to_string(),
            },
        }
    }
}

impl KindlingConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (kindling.toml)
    /// 3. Environment variables (prefixed with KINDLING_)
    pub fn load() -> Result<Self> {
        let defaults = Config::try_from(&KindlingConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        if Path::new("kindling.toml").exists() {
            builder = builder.add_source(File::with_name("kindling"));
        }

        builder = builder.add_source(
            Environment::with_prefix("KINDLING")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut kindling_config: KindlingConfig = config.try_deserialize()?;

        // Short-form env vars matching the original job's surface keep working
        if let Ok(api_url) = std::env::var("KINDLING_API_URL") {
            kindling_config.server.api_url = api_url;
        }
        if let Ok(level) = std::env::var("KINDLING_LOG_LEVEL") {
            kindling_config.observability.log_level = level;
        }

        Ok(kindling_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<KindlingConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = KindlingConfig::load_env_file();
        KindlingConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static KindlingConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
