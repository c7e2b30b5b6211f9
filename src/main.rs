use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::warn;
use uplaud::{AuthContext, ConfigProbe, ErrorCode, ProviderError, SessionError, SignupProfile};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("{0} stopped before settling")]
    Closed(&'static str),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl CliError {
    fn code(&self) -> &'static str {
        match self {
            Self::Session(e) => e.error_code(),
            Self::Provider(e) => e.error_code(),
            Self::Timeout(_) => "E_TIMEOUT",
            Self::Closed(_) => "E_CLOSED",
            Self::InvalidJson(_) => "E_INVALID_JSON",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "uplaud", about = "Uplaud account session CLI")]
struct Cli {
    /// Seconds to wait for the session or profile to settle.
    #[arg(long, env = "UPLAUD_WAIT_SECS", default_value_t = 10)]
    wait_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report whether a backend is configured and the initial session status.
    Status,
    /// Create an account, print its profile, then sign out.
    Signup {
        email: String,
        #[arg(long, env = "UPLAUD_PASSWORD")]
        password: String,
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        phone_number: String,
    },
    /// Sign in, print the profile, then sign out.
    Login {
        email: String,
        #[arg(long, env = "UPLAUD_PASSWORD")]
        password: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; the probe decides what is configured.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", e.code());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let probe = ConfigProbe::from_env();
    let ctx = AuthContext::from_probe(&probe)?;
    let wait = Duration::from_secs(cli.wait_secs);

    let result = match cli.command {
        Command::Status => run_status(&ctx, wait).await,
        Command::Signup { email, password, full_name, phone_number } => {
            let profile = SignupProfile { full_name, phone_number };
            match ctx.session().signup(&email, &password, profile).await {
                Ok(identity) => show_profile_and_logout(&ctx, &identity.uid, wait).await,
                Err(e) => Err(e.into()),
            }
        }
        Command::Login { email, password } => match ctx.session().login(&email, &password).await {
            Ok(identity) => show_profile_and_logout(&ctx, &identity.uid, wait).await,
            Err(e) => Err(e.into()),
        },
    };

    ctx.shutdown();
    result
}

async fn run_status(ctx: &AuthContext, wait: Duration) -> Result<(), CliError> {
    let mut rx = ctx.session().watch();
    let status = tokio::time::timeout(wait, rx.wait_for(|s| !s.is_loading()))
        .await
        .map_err(|_| CliError::Timeout("session"))?
        .map_err(|_| CliError::Closed("session store"))?
        .status();

    let report = serde_json::json!({
        "configured": ctx.session().is_configured(),
        "status": status,
    });
    println!("{report:#}");
    Ok(())
}

async fn show_profile_and_logout(ctx: &AuthContext, uid: &str, wait: Duration) -> Result<(), CliError> {
    let view = tokio::time::timeout(wait, ctx.profile().wait_ready(uid))
        .await
        .map_err(|_| CliError::Timeout("profile"))?
        .ok_or(CliError::Closed("profile reconciler"))?;
    if view.degraded {
        warn!(%uid, "profile document unreadable; showing identity fields only");
    }
    println!("{:#}", serde_json::to_value(&view)?);

    ctx.session().logout().await?;
    Ok(())
}
