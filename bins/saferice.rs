use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use configs::AppConfig;
use dotenvy::dotenv;
use models::{LoginRequest, Nutrient, OutlineReport, SignupRequest, SingleGrainReport};
use serde::Serialize;
use serde_json::{json, Value};
use service::api::{ContentClient, InferenceClient};
use service::auth::AuthService;
use service::catalog;
use service::session::FileSessionStore;
use service::submission::Submission;
use service::registry::Backend;
use service::{Dispatcher, Endpoints, ImagePart, RequestError};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "saferice", version, about = "SafeRice client: account, catalog and rice photo analysis")]
struct Cli {
    /// Config file; defaults to $CONFIG_PATH or ./config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print dispatch metrics (Prometheus text) to stderr on exit
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session locally
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "SAFERICE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Signup(SignupArgs),
    Logout,
    Whoami,
    Profile,
    /// Dish catalog with optional filters
    Cuisine {
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long)]
        rice_type: Option<String>,
        #[arg(long)]
        nutrient: Option<Nutrient>,
    },
    /// Medicine catalog with optional filters
    Medicine {
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long)]
        disease: Option<String>,
    },
    /// Distinct rice types in the dish catalog
    RiceTypes,
    Diseases,
    /// Treatment for one disease, or every known solution
    Solution { disease: Option<String> },
    DiagnoseHealth { image: String },
    DiagnoseDisease { image: String },
    /// Single-grain nutrition; prints the first grain
    AnalyzeRice { image: String },
    ClassifyGrains { image: String },
    /// Multi-grain outline; `--save` writes the annotated image
    Outline {
        image: String,
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Show the resolved URL of every service
    Endpoints,
}

#[derive(Args, Debug)]
struct SignupArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long, env = "SAFERICE_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long, env = "SAFERICE_CONFIRM_PASSWORD", hide_env_values = true)]
    confirm_password: String,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(p) => {
            let mut cfg = configs::load_from_file(&p.to_string_lossy())
                .with_context(|| format!("reading {}", p.display()))?;
            cfg.normalize_and_validate()?;
            Ok(cfg)
        }
        None => {
            let default_path = configs::default_path();
            if !Path::new(&default_path).exists() {
                warn!(event = "config_fallback", path = %default_path, "no config file, using built-in defaults");
            }
            AppConfig::load_and_validate()
        }
    }
}

fn emit<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn as_json<T, F>(work: F) -> Result<Value, RequestError>
where
    T: Serialize,
    F: Future<Output = Result<T, RequestError>>,
{
    let out = work.await?;
    serde_json::to_value(out).map_err(|e| RequestError::decode(e.to_string()))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    let endpoints = Endpoints::from_config(&cfg.registries);

    if let Command::Endpoints = cli.command {
        let table: serde_json::Map<String, Value> = endpoints
            .resolved()
            .into_iter()
            .map(|(service, url)| {
                let value = match url {
                    Ok(url) => json!(url),
                    Err(e) => json!({ "error": e.to_string() }),
                };
                (service.name().to_string(), value)
            })
            .collect();
        let registries: serde_json::Map<String, Value> = [Backend::Content, Backend::Inference]
            .into_iter()
            .map(|backend| {
                let registry = endpoints.registry(backend).current();
                let services: Vec<&str> = registry.service_names().collect();
                (registry.label().to_string(), json!({ "base_host": registry.base_host(), "services": services }))
            })
            .collect();
        emit(&json!({ "routes": table, "registries": registries }))?;
        endpoints.validate_routes()?;
        return Ok(());
    }
    if let Err(e) = endpoints.validate_routes() {
        warn!(event = "route_missing", error = %e, "registry has no port for a known service");
    }

    let dispatcher = Arc::new(Dispatcher::new(&cfg.dispatch)?);
    let content = ContentClient::new(endpoints.clone(), Arc::clone(&dispatcher));
    let inference = InferenceClient::new(endpoints, dispatcher);
    let store = Arc::new(FileSessionStore::open(&cfg.session.path).await?);
    info!(event = "session_store", path = %store.path().display(), "session store ready");
    let auth = AuthService::new(content.clone(), store);
    // one screen action per invocation; dropped (and cancelled) with this future
    let screen = Submission::<Value>::new(cfg.submission.policy);

    match cli.command {
        Command::Login { username, password } => {
            let session = auth.login(LoginRequest { username, password }).await?;
            emit(&json!({ "logged_in": true, "use_id": session.user_id }))?;
        }
        Command::Signup(args) => {
            let message = auth
                .signup(SignupRequest {
                    first_name: args.first_name,
                    last_name: args.last_name,
                    username: args.username,
                    email: args.email,
                    password: args.password,
                    confirm_password: args.confirm_password,
                })
                .await?;
            emit(&json!({ "signed_up": true, "message": message }))?;
        }
        Command::Logout => {
            auth.logout().await?;
            emit(&json!({ "logged_out": true }))?;
        }
        Command::Whoami => emit(&json!({ "username": auth.username().await? }))?,
        Command::Profile => emit(&auth.profile().await?)?,
        Command::Cuisine { query, rice_type, nutrient } => {
            let dishes = content.get_cuisine().await?;
            emit(&catalog::filter_dishes(&dishes, &query, rice_type.as_deref(), nutrient))?;
        }
        Command::Medicine { query, disease } => {
            let medicines = content.get_medicine().await?;
            emit(&catalog::filter_medicines(&medicines, &query, disease.as_deref()))?;
        }
        Command::RiceTypes => {
            let dishes = content.get_cuisine().await?;
            emit(&catalog::rice_types(&dishes))?;
        }
        Command::Diseases => emit(&content.get_diseases().await?)?,
        Command::Solution { disease } => {
            let solutions = content.get_disease_solutions().await?;
            match disease {
                Some(name) => match catalog::find_solution(&solutions, &name) {
                    Some(found) => emit(found)?,
                    None => bail!("no solution recorded for {name}"),
                },
                None => emit(&solutions)?,
            }
        }
        Command::DiagnoseHealth { image } => {
            emit(&screen.submit(as_json(inference.diagnose_health(ImagePart::jpeg(image)))).await?)?;
        }
        Command::DiagnoseDisease { image } => {
            emit(&screen.submit(as_json(inference.diagnose_disease(ImagePart::jpeg(image)))).await?)?;
        }
        Command::AnalyzeRice { image } => {
            let value = screen.submit(as_json(inference.analyze_rice(ImagePart::jpeg(image)))).await?;
            let report: SingleGrainReport = serde_json::from_value(value)?;
            match report.first_grain() {
                Some(grain) => emit(grain)?,
                None => println!("no grain data"),
            }
        }
        Command::ClassifyGrains { image } => {
            emit(&screen.submit(as_json(inference.classify_grains(ImagePart::jpeg(image)))).await?)?;
        }
        Command::Outline { image, save } => {
            let value = screen.submit(as_json(inference.analyze_outline(ImagePart::jpeg(image)))).await?;
            let mut report: OutlineReport = serde_json::from_value(value)?;
            if let Some(path) = save {
                match report.outlined_image_bytes()? {
                    Some(bytes) => {
                        common::env::ensure_parent_dir(&path).await?;
                        tokio::fs::write(&path, bytes).await?;
                        info!(event = "outline_saved", path = %path.display(), "annotated image written");
                    }
                    None => warn!(event = "outline_missing", "response carried no outlined image"),
                }
            }
            // the base64 blob is not useful on a terminal
            report.outlined_image = None;
            emit(&report)?;
        }
        Command::Endpoints => {}
    }
    Ok(())
}

fn main() -> ExitCode {
    dotenv().ok();
    common::utils::logging::init_logging_from_env();

    let cli = Cli::parse();
    let service_id = Uuid::new_v4();
    let pid = std::process::id();
    let version = env!("CARGO_PKG_VERSION");

    std::panic::set_hook(Box::new(move |info| {
        error!(service = "saferice", event = "panic", %service_id, pid, message = %info, "unhandled panic occurred");
    }));

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "saferice", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    info!(service = "saferice", event = "start", %service_id, pid, version, "client starting");
    let metrics = cli.metrics;

    let code = rt.block_on(async move {
        tokio::select! {
            res = run(cli) => match res {
                Ok(()) => {
                    info!(service = "saferice", event = "stop", %service_id, pid, "client finished");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("error: {e:#}");
                    ExitCode::FAILURE
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!(service = "saferice", event = "shutdown_signal", %service_id, pid, "received Ctrl+C, cancelling");
                ExitCode::FAILURE
            }
        }
    });

    if metrics {
        match service::observability::encode_metrics() {
            Ok(text) => eprint!("{text}"),
            Err(e) => warn!(event = "metrics_encode_failed", error = %e, "could not encode metrics"),
        }
    }
    code
}
