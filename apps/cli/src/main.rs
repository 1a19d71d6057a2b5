mod api;
mod auth;
mod config;
mod errors;
mod models;
mod prompt;
mod render;
mod sections;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::api::ApiClient;
use crate::auth::store::TokenStore;
use crate::config::Config;
use crate::errors::AppError;
use crate::models::auth::{LoginRequest, RegisterRequest, UpdateMe};

#[derive(Parser)]
#[command(name = "promptly")]
#[command(about = "Command-line client for the prompt optimization service", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account and start a session
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        full_name: String,
        #[arg(long, env = "PROMPTLY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log in and store the session tokens
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PROMPTLY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in profile
    Me,
    /// Update the logged-in profile
    UpdateMe {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        full_name: Option<String>,
    },
    /// Submit a prompt for optimization and show the result
    Improve { text: String },
    /// List all prompts
    List,
    /// Show one prompt with its parsed sections
    Show { id: Uuid },
    /// Replace a prompt's text and re-optimize it
    Edit { id: Uuid, text: String },
    /// Delete a prompt
    Delete { id: Uuid },
    /// Mark or unmark a prompt as favorite
    Favorite {
        id: Uuid,
        #[arg(long)]
        remove: bool,
    },
    /// List favorite prompts
    Favorites,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        let (code, message) = e.report();
        eprintln!("error: {message}");
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let api = ApiClient::new(config.api_base_url.clone(), TokenStore::load(&config.token_file));

    match cli.command {
        Command::Register {
            email,
            username,
            full_name,
            password,
        } => {
            auth::register(
                &api,
                &RegisterRequest {
                    email: email.clone(),
                    password,
                    username,
                    full_name,
                },
            )
            .await?;
            println!("registered and logged in as {email}");
        }
        Command::Login { email, password } => {
            auth::login(
                &api,
                &LoginRequest {
                    email: email.clone(),
                    password,
                },
            )
            .await?;
            println!("logged in as {email}");
        }
        Command::Logout => {
            if api.tokens().is_logged_in() {
                auth::logout(&api)?;
                println!("logged out");
            } else {
                println!("not logged in");
            }
        }
        Command::Me => {
            let me = auth::me(&api).await?;
            println!("{} <{}>", me.full_name, me.email);
            println!("username: {}", me.username);
            println!("id: {}", me.id);
        }
        Command::UpdateMe {
            email,
            username,
            full_name,
        } => {
            let me = auth::update_me(
                &api,
                &UpdateMe {
                    email,
                    username,
                    full_name,
                },
            )
            .await?;
            println!("profile updated: {} <{}>", me.full_name, me.email);
        }
        Command::Improve { text } => {
            let prompt = prompt::improve(&api, &text).await?;
            print!("{}", render::prompt_detail(&prompt));
        }
        Command::List => {
            for prompt in prompt::list(&api).await? {
                println!("{}", render::prompt_row(&prompt));
            }
        }
        Command::Show { id } => {
            let prompt = prompt::get(&api, id).await?;
            print!("{}", render::prompt_detail(&prompt));
        }
        Command::Edit { id, text } => {
            let prompt = prompt::update(&api, id, &text).await?;
            print!("{}", render::prompt_detail(&prompt));
        }
        Command::Delete { id } => {
            prompt::delete(&api, id).await?;
            println!("deleted {id}");
        }
        Command::Favorite { id, remove } => {
            let prompt = prompt::set_favorite(&api, id, !remove).await?;
            println!(
                "{} is {}a favorite",
                prompt.id,
                if prompt.is_favorite { "" } else { "no longer " }
            );
        }
        Command::Favorites => {
            for prompt in prompt::favorites(&api).await? {
                println!("{}", render::prompt_row(&prompt));
            }
        }
    }

    Ok(())
}
