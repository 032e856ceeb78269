//! jobctl CLI
//!
//! Entry point for the `jobctl` command-line tool. Results are printed to
//! stdout as JSON; diagnostics go to stderr. The exit code follows the
//! failure kind of the error.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use jobctl::config::{default_config_path, CliOverrides};
use jobctl::logging::{self, LogFormat};
use jobctl::protocol::{JobId, JobRunsListRequest, JobSettings, FORMAT_MULTI_TASK};
use jobctl::{
    validate, CancelFlag, ClientConfig, FailureKind, HttpTransport, JobError, JobResource,
    JobResourceSpec, JobsApi, RunStatePoller, Transport,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "jobctl")]
#[command(about = "Manage remote compute jobs and keep always-running jobs running", version)]
struct Cli {
    /// Path to config file (default: ~/.config/jobctl/config.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Workspace URL
    #[arg(long, env = "JOBCTL_HOST", global = true)]
    host: Option<String>,

    /// Bearer token
    #[arg(long, env = "JOBCTL_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List jobs
    List {
        /// Use the multi-task API
        #[arg(long)]
        multi_task: bool,
    },

    /// Show one job
    Get {
        id: String,

        /// Resource file whose settings select the API version
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,

        /// Use the multi-task API
        #[arg(long)]
        multi_task: bool,
    },

    /// Create a job from a resource file
    Create {
        #[arg(long, short = 'f')]
        file: PathBuf,
    },

    /// Replace a job's settings from a resource file
    Update {
        id: String,

        #[arg(long, short = 'f')]
        file: PathBuf,
    },

    /// Delete a job (succeeds if it is already gone)
    Delete {
        id: String,

        #[arg(long, short = 'f')]
        file: Option<PathBuf>,

        #[arg(long)]
        multi_task: bool,
    },

    /// Cancel the active run, if any, and start a new one
    Restart {
        id: String,

        #[arg(long, short = 'f')]
        file: Option<PathBuf>,

        #[arg(long)]
        multi_task: bool,
    },

    /// List runs of a job
    Runs {
        id: String,

        /// Only runs that have not terminated
        #[arg(long)]
        active: bool,

        #[arg(long, default_value_t = 25)]
        limit: u32,

        #[arg(long, default_value_t = 0)]
        offset: u32,

        #[arg(long)]
        multi_task: bool,
    },

    /// Compare a resource file with the remote job
    Plan {
        id: String,

        #[arg(long, short = 'f')]
        file: PathBuf,
    },

    /// Check a resource file without contacting the service
    Validate {
        #[arg(long, short = 'f')]
        file: PathBuf,
    },
}

/// CLI errors
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] jobctl::ConfigError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("cannot read resource file {path}: {message}")]
    ResourceFile { path: String, message: String },

    #[error("cannot set up {0}")]
    Setup(String),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Job(err) => err.exit_code(),
            CliError::Config(_) | CliError::ResourceFile { .. } => FailureKind::Usage as i32,
            CliError::Setup(_) => FailureKind::Transport as i32,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let overrides = CliOverrides {
        host: cli.host.clone(),
        token: cli.token.clone(),
        log_level: cli.log_level.clone(),
        log_format: cli.log_format,
    };
    let (config_path, required) = match &cli.config {
        Some(path) => (Some(path.clone()), true),
        None => (default_config_path(), false),
    };
    let config = match ClientConfig::load(config_path.as_deref(), required, &overrides) {
        Ok(config) => config,
        Err(e) => exit_with(CliError::Config(e)),
    };

    if let Err(e) = logging::init(&config.logging.level, config.logging.format) {
        eprintln!("warning: {e}");
    }
    for source in &config.sources {
        tracing::debug!(
            origin = ?source.origin,
            path = source.path.as_deref(),
            digest = source.digest.as_deref(),
            "config layer"
        );
    }
    tracing::debug!(?config, "configuration loaded");

    if let Err(e) = run(cli.command, &config) {
        if let CliError::Job(job_err) = &e {
            if let Some(job_id) = job_err.created_job_id() {
                // The job exists even though the command failed
                print_json(&serde_json::json!({ "job_id": job_id }));
            }
        }
        exit_with(e);
    }
}

fn exit_with(err: CliError) -> ! {
    eprintln!("Error: {err}");
    process::exit(err.exit_code());
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error: cannot encode output: {e}"),
    }
}

fn parse_job_id(id: &str) -> Result<JobId, CliError> {
    Ok(id.parse::<JobId>().map_err(JobError::from)?)
}

/// Read a resource file; `.toml` files are TOML, everything else JSON
fn load_spec(path: &Path) -> Result<JobResourceSpec, CliError> {
    let file_error = |message: String| CliError::ResourceFile {
        path: path.display().to_string(),
        message,
    };
    let contents = fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;

    let is_toml = path.extension().and_then(|e| e.to_str()) == Some("toml");
    if is_toml {
        toml::from_str(&contents).map_err(|e| file_error(e.to_string()))
    } else {
        serde_json::from_str(&contents).map_err(|e| file_error(e.to_string()))
    }
}

/// Settings used only to pick the API version
fn known_settings(file: Option<&Path>, multi_task: bool) -> Result<JobSettings, CliError> {
    let mut settings = match file {
        Some(path) => load_spec(path)?.desired_settings(),
        None => JobSettings::default(),
    };
    if multi_task {
        settings.format = Some(FORMAT_MULTI_TASK.to_string());
    }
    Ok(settings)
}

fn connect(config: &ClientConfig) -> Result<Arc<dyn Transport>, CliError> {
    let transport = HttpTransport::new(config.http_transport_config()?)
        .map_err(|e| CliError::Setup(format!("HTTP client: {e}")))?;
    Ok(Arc::new(transport))
}

fn resource(config: &ClientConfig, transport: Arc<dyn Transport>) -> Result<JobResource, CliError> {
    let cancel = CancelFlag::new();
    cancel
        .install()
        .map_err(|e| CliError::Setup(format!("signal handler: {e}")))?;
    let poller = RunStatePoller::new(config.poll_config()).with_cancel_flag(cancel);

    Ok(JobResource::new(transport, poller)
        .with_host(config.require_host()?.to_string())
        .with_timeouts(config.resource_timeouts()))
}

fn run(command: Commands, config: &ClientConfig) -> Result<(), CliError> {
    match command {
        Commands::Validate { file } => {
            let spec = load_spec(&file)?;
            validate(&spec)?;
            print_json(&serde_json::json!({
                "valid": true,
                "api_version": jobctl::select_version(&spec.settings).as_str(),
                "fingerprint": jobctl::fingerprint(&spec.desired_settings())?,
            }));
        }
        Commands::List { multi_task } => {
            let settings = known_settings(None, multi_task)?;
            let jobs = JobsApi::for_settings(connect(config)?, &settings).list()?;
            print_json(&jobs);
        }
        Commands::Get {
            id,
            file,
            multi_task,
        } => {
            let job_id = parse_job_id(&id)?;
            let known = known_settings(file.as_deref(), multi_task)?;
            let view = resource(config, connect(config)?)?.read(job_id, &known)?;
            print_json(&view);
        }
        Commands::Create { file } => {
            let spec = load_spec(&file)?;
            let resource = resource(config, connect(config)?)?;
            let job_id = resource.create(&spec)?;
            print_json(&serde_json::json!({
                "job_id": job_id,
                "url": resource.url(job_id),
            }));
        }
        Commands::Update { id, file } => {
            let job_id = parse_job_id(&id)?;
            let spec = load_spec(&file)?;
            let restarted = resource(config, connect(config)?)?.update(job_id, &spec)?;
            print_json(&serde_json::json!({
                "job_id": job_id,
                "restart": restarted,
            }));
        }
        Commands::Delete {
            id,
            file,
            multi_task,
        } => {
            let job_id = parse_job_id(&id)?;
            let known = known_settings(file.as_deref(), multi_task)?;
            resource(config, connect(config)?)?.delete(job_id, &known)?;
            print_json(&serde_json::json!({ "job_id": job_id, "deleted": true }));
        }
        Commands::Restart {
            id,
            file,
            multi_task,
        } => {
            let job_id = parse_job_id(&id)?;
            let known = known_settings(file.as_deref(), multi_task)?;
            let outcome = resource(config, connect(config)?)?.restart(job_id, &known)?;
            print_json(&outcome);
        }
        Commands::Runs {
            id,
            active,
            limit,
            offset,
            multi_task,
        } => {
            let job_id = parse_job_id(&id)?;
            let settings = known_settings(None, multi_task)?;
            let request = JobRunsListRequest {
                job_id: Some(job_id),
                active_only: active,
                completed_only: false,
                offset,
                limit,
            };
            let page = JobsApi::for_settings(connect(config)?, &settings)
                .runs_list(&request)
                .map_err(JobError::from)?;
            print_json(&page);
        }
        Commands::Plan { id, file } => {
            let job_id = parse_job_id(&id)?;
            let spec = load_spec(&file)?;
            let plan = resource(config, connect(config)?)?.plan(job_id, &spec)?;
            print_json(&plan);
        }
    }
    Ok(())
}
