use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use qlab::client::ApiClient;
use qlab::client::session::AuthSession;
use qlab::config::ClientConfig;
use qlab::endpoints::Registration;
use qlab::logging::{LogSink, RemoteLogger, TracingSink};
use qlab::storage::FileStore;
use qlab::ui::FooterStore;
use smol_str::SmolStr;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "qlab - command-line client for the qlab backend")]
struct Cli {
    #[command(flatten)]
    config: ClientConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session
    Login {
        /// Account name
        #[arg(short, long)]
        username: SmolStr,
        /// Account password
        #[arg(short, long)]
        password: SmolStr,
    },
    /// Forget the stored session
    Logout,
    /// Print the stored session without contacting the backend
    Whoami,
    /// Fetch and print the profile
    Profile,
    /// Update names and email
    UpdateProfile {
        /// Given name
        #[arg(long)]
        first: SmolStr,
        /// Family name
        #[arg(long)]
        last: SmolStr,
        /// Contact address
        #[arg(long)]
        email: SmolStr,
    },
    /// Change the account password
    ChangePassword {
        /// Current password
        #[arg(long)]
        old: SmolStr,
        /// Replacement password
        #[arg(long)]
        new: SmolStr,
    },
    /// Create a new account
    Register {
        /// Account name
        #[arg(short, long)]
        username: SmolStr,
        /// Account password
        #[arg(short, long)]
        password: SmolStr,
        /// Given name
        #[arg(long)]
        first: SmolStr,
        /// Family name
        #[arg(long)]
        last: SmolStr,
        /// Contact address
        #[arg(long)]
        email: SmolStr,
    },
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let http = reqwest::Client::builder().build().into_diagnostic()?;
    let client = Arc::new(ApiClient::new(http, config.base_url.clone()).with_timeout(config.timeout()));
    let store = Arc::new(FileStore::new(&config.store));

    let remote = config
        .ship_logs
        .then(|| Arc::new(RemoteLogger::new(TracingSink, client.clone())));
    let mut session = AuthSession::load(store, client).await;
    if let Some(remote) = &remote {
        session = session.with_logger(remote.clone() as Arc<dyn LogSink>);
    }

    let mut footer = FooterStore::default();
    let result = run(cli.command, &session, &mut footer).await;
    tracing::debug!(footer = footer.footer_text(), "done");

    if let Some(remote) = &remote {
        remote.flush().await;
    }
    result
}

async fn run(
    command: Command,
    session: &AuthSession<FileStore, reqwest::Client>,
    footer: &mut FooterStore,
) -> miette::Result<()> {
    match command {
        Command::Login { username, password } => {
            let profile = session.login(&username, &password).await?;
            footer.set_footer_text(&format!("Logged in as {}.", profile.username));
            println!(
                "logged in as {} ({} {})",
                profile.username, profile.first_name, profile.last_name
            );
        }
        Command::Logout => {
            session.logout().await?;
            footer.set_footer_text("Logged out.");
            println!("logged out");
        }
        Command::Whoami => {
            let data = session.snapshot().await;
            if data.is_authenticated() {
                println!("{}", serde_json::to_string_pretty(&Whoami::from(data)).into_diagnostic()?);
            } else {
                println!("not logged in");
            }
        }
        Command::Profile => {
            let profile = session.profile().await?;
            println!("{}", serde_json::to_string_pretty(&profile).into_diagnostic()?);
        }
        Command::UpdateProfile { first, last, email } => {
            let updated = session.update_profile(&first, &last, &email).await?;
            footer.set_footer_text("Profile updated.");
            println!("{}", serde_json::to_string_pretty(&updated).into_diagnostic()?);
        }
        Command::ChangePassword { old, new } => {
            session.change_password(&old, &new).await?;
            footer.set_footer_text("Password changed.");
            println!("password changed");
        }
        Command::Register {
            username,
            password,
            first,
            last,
            email,
        } => {
            let registration = Registration::builder()
                .username(username)
                .password(password)
                .first_name(first)
                .last_name(last)
                .email(email)
                .build();
            let user = session.register(&registration).await?;
            println!("registered {}", user.username);
        }
    }
    Ok(())
}

/// Session fields safe to print; tokens are left out.
#[derive(serde::Serialize)]
struct Whoami {
    username: Option<SmolStr>,
    first_name: Option<SmolStr>,
    last_name: Option<SmolStr>,
    email: Option<SmolStr>,
}

impl From<qlab::client::token::SessionData> for Whoami {
    fn from(data: qlab::client::token::SessionData) -> Self {
        Self {
            username: data.username,
            first_name: data.first_name,
            last_name: data.last_name,
            email: data.email,
        }
    }
}
