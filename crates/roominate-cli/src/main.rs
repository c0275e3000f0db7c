//! Roominate CLI - sign in, sign up and browse listings from the terminal.

mod app;
mod commands;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use roominate_config::{init_logging, Config, Paths};
use tracing::debug;

/// Roominate command-line client.
#[derive(Parser)]
#[command(name = "roominate")]
#[command(about = "Roominate client for accounts, sessions and listings")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Directory for preferences and tokens. Defaults to ~/.roominate
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current session
    Status,

    /// Sign in with email and password
    Login {
        /// Account email (prompted when omitted)
        #[arg(long)]
        email: Option<String>,
    },

    /// Sign out and clear stored tokens
    Logout,

    /// Create an account (email code, then password)
    Signup {
        /// tenant, owner or admin
        #[arg(long, default_value = "tenant")]
        role: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        phone: Option<String>,
        /// Date of birth, YYYY-MM-DD
        #[arg(long)]
        dob: Option<String>,
    },

    /// Reset a forgotten password with an emailed code
    ResetPassword {
        #[arg(long)]
        email: String,
    },

    /// Store the session carried by an OAuth redirect URL
    OauthCallback {
        /// Full redirect URL or its fragment
        url: String,
    },

    /// Read rows from a table
    Get {
        /// Table name, e.g. boarding_houses
        table: String,
        /// Equality filter, column=value (repeatable)
        #[arg(long = "filter", value_name = "COLUMN=VALUE")]
        filters: Vec<String>,
    },

    /// Insert a row into a table
    Insert {
        table: String,
        /// Row as a JSON object
        #[arg(long)]
        json: String,
    },

    /// Update rows matching the filters
    Update {
        table: String,
        #[arg(long = "filter", value_name = "COLUMN=VALUE", required = true)]
        filters: Vec<String>,
        /// Changes as a JSON object
        #[arg(long)]
        json: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;
    debug!(base_dir = %paths.base_dir().display(), "Configuration loaded");

    let app = app::App::open(&paths, config).await?;
    let format = cli.format;

    match cli.command {
        Commands::Status => commands::status(&app, &format)?,
        Commands::Login { email } => commands::login(&app, email, &format).await?,
        Commands::Logout => commands::logout(&app, &format).await?,
        Commands::Signup {
            role,
            email,
            first_name,
            last_name,
            phone,
            dob,
        } => {
            let form = commands::SignupForm {
                role,
                email,
                first_name,
                last_name,
                phone,
                dob,
            };
            commands::signup(&app, form, &format).await?
        }
        Commands::ResetPassword { email } => {
            commands::reset_password(&app, &email, &format).await?
        }
        Commands::OauthCallback { url } => commands::oauth_callback(&app, &url, &format).await?,
        Commands::Get { table, filters } => {
            commands::get_rows(&app, &table, &filters, &format).await?
        }
        Commands::Insert { table, json } => {
            commands::insert_row(&app, &table, &json, &format).await?
        }
        Commands::Update {
            table,
            filters,
            json,
        } => commands::update_rows(&app, &table, &filters, &json, &format).await?,
    }

    Ok(())
}
