//! KYCShield CLI

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kycshield_client::render::{self, OutputFormat};
use kycshield_client::{
    AccessToken, ClientConfig, CollectorMode, HttpVerificationApi, MediaFile, Session,
    SingleCheck, Slot, UnifiedVerifier, UploadCollector, VerificationApi,
};
use kycshield_common::{Capability, KycError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "kycshield")]
#[command(about = "Submit media to the KYCShield verification service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API base URL
    #[arg(long, global = true, env = "KYCSHIELD_BASE_URL")]
    base_url: Option<String>,

    /// Bearer token from a previous login
    #[arg(long, global = true, env = "KYCSHIELD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Per-call timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print the access token
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "KYCSHIELD_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Exchange a refresh token for a new access token
    Refresh {
        #[arg(long, env = "KYCSHIELD_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,
    },

    /// Check a video for deepfakes
    Video { path: PathBuf },

    /// Check an identity document for fraud
    Document { path: PathBuf },

    /// Match a selfie against an ID photo
    Face {
        #[arg(long)]
        selfie: PathBuf,

        #[arg(long)]
        id_photo: PathBuf,
    },

    /// Run video, document and face checks in sequence
    Unified {
        #[arg(long)]
        video: PathBuf,

        #[arg(long)]
        document: PathBuf,

        #[arg(long)]
        selfie: PathBuf,
    },

    /// Query each capability's health endpoint
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // before loading config so its warnings are not lost
    init_tracing(ClientConfig::log_json_from_lookup(|key| std::env::var(key).ok()));

    let mut config = ClientConfig::from_env().context("invalid KYCSHIELD_* configuration")?;
    if let Some(base_url) = cli.base_url.clone() {
        config.base_url = base_url;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.timeouts.request_timeout_ms = timeout_ms;
    }
    config.validate()?;

    let session = Arc::new(match cli.token.clone() {
        Some(token) => Session::with_token(AccessToken::bearer(token)),
        None => Session::new(),
    });
    let api = Arc::new(HttpVerificationApi::new(&config, session)?);
    let format = OutputFormat::from_json_flag(cli.json);

    let result = match cli.command {
        Commands::Login { email, password } => cmd_login(&api, &email, &password, format).await,
        Commands::Refresh { refresh_token } => cmd_refresh(&api, refresh_token, format).await,
        Commands::Video { path } => {
            let files = vec![(Slot::Video, path)];
            cmd_single(api, &config, Capability::Video, files, format).await
        }
        Commands::Document { path } => {
            let files = vec![(Slot::Document, path)];
            cmd_single(api, &config, Capability::Document, files, format).await
        }
        Commands::Face { selfie, id_photo } => {
            let files = vec![(Slot::Selfie, selfie), (Slot::IdPhoto, id_photo)];
            cmd_single(api, &config, Capability::Face, files, format).await
        }
        Commands::Unified {
            video,
            document,
            selfie,
        } => {
            let files = vec![
                (Slot::Video, video),
                (Slot::Document, document),
                (Slot::Selfie, selfie),
            ];
            cmd_unified(api, &config, files, format).await
        }
        Commands::Health => cmd_health(&api, format).await,
    };

    match result {
        Ok(code) => Ok(code),
        Err(err) => {
            eprintln!("{}", render::render_error(&err, format));
            Ok(ExitCode::FAILURE)
        }
    }
}

fn init_tracing(json: bool) {
    let registry = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    ));

    // stdout carries the verdict; logs go to stderr
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Exit code for a verdict: success only when it passed
fn verdict_code(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}

async fn collect(
    mode: CollectorMode,
    config: &ClientConfig,
    files: Vec<(Slot, PathBuf)>,
) -> Result<UploadCollector, KycError> {
    let mut collector = UploadCollector::new(mode, config.limits);
    for (slot, path) in files {
        collector.select(slot, MediaFile::from_path(&path).await?)?;
    }
    Ok(collector)
}

async fn cmd_login(
    api: &HttpVerificationApi,
    email: &str,
    password: &str,
    format: OutputFormat,
) -> Result<ExitCode, KycError> {
    let token = api.login(email, password).await?;
    print_token(&token, format);
    Ok(ExitCode::SUCCESS)
}

async fn cmd_refresh(
    api: &HttpVerificationApi,
    refresh_token: String,
    format: OutputFormat,
) -> Result<ExitCode, KycError> {
    let current = api.session().bearer().unwrap_or_default();
    api.session().set(AccessToken {
        refresh_token: Some(refresh_token),
        ..AccessToken::bearer(current)
    });
    let token = api.refresh().await?;
    print_token(&token, format);
    Ok(ExitCode::SUCCESS)
}

fn print_token(token: &AccessToken, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "access_token": token.access_token,
                "refresh_token": token.refresh_token,
                "token_type": token.token_type,
                "expires_in": token.expires_in,
            })
        ),
        OutputFormat::Text => {
            println!("export KYCSHIELD_TOKEN={}", token.access_token);
            if let Some(refresh_token) = &token.refresh_token {
                println!("export KYCSHIELD_REFRESH_TOKEN={}", refresh_token);
            }
        }
    }
}

async fn cmd_single(
    api: Arc<HttpVerificationApi>,
    config: &ClientConfig,
    capability: Capability,
    files: Vec<(Slot, PathBuf)>,
    format: OutputFormat,
) -> Result<ExitCode, KycError> {
    let collector = collect(CollectorMode::Single(capability), config, files).await?;
    let check = SingleCheck::new(api, capability, config.timeouts.request_timeout());

    let outcome = tokio::select! {
        outcome = check.check(&collector) => outcome?,
        _ = tokio::signal::ctrl_c() => {
            check.cancel();
            return Err(KycError::Cancelled);
        }
    };

    println!("{}", render::render_outcome(&outcome, format)?);
    Ok(verdict_code(outcome.passed))
}

async fn cmd_unified(
    api: Arc<HttpVerificationApi>,
    config: &ClientConfig,
    files: Vec<(Slot, PathBuf)>,
    format: OutputFormat,
) -> Result<ExitCode, KycError> {
    let verifier = UnifiedVerifier::new(api, config.policy, config.timeouts.request_timeout());
    let collector = collect(CollectorMode::Unified, config, files).await?;
    verifier.files_changed(&collector)?;

    let mut states = verifier.subscribe();
    let progress = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            tracing::info!(state = ?state, "Unified run progress");
        }
    });

    let outcome = tokio::select! {
        result = verifier.run(&collector) => result,
        _ = tokio::signal::ctrl_c() => {
            verifier.reset();
            Err(KycError::Cancelled)
        }
    };
    drop(verifier);
    let _ = progress.await;

    let result = outcome?;
    println!("{}", render::render_unified(&result, format)?);
    Ok(verdict_code(result.overall.is_pass()))
}

async fn cmd_health(api: &HttpVerificationApi, format: OutputFormat) -> Result<ExitCode, KycError> {
    let mut results = Vec::with_capacity(Capability::ALL.len());
    for capability in Capability::ALL {
        results.push((capability, api.health(capability).await));
    }

    let healthy = results
        .iter()
        .all(|(_, r)| r.as_ref().map(|s| s.is_healthy()).unwrap_or(false));
    println!("{}", render::render_health(&results, format)?);
    Ok(if healthy { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
