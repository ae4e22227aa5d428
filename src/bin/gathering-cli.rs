use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rand::RngCore;
use reqwest::header::{COOKIE, SET_COOKIE};
use serde_json::{json, Value};

use dev_gathering::auth::{hash_password, Keyring};
use dev_gathering::tokens::{MemoryUsedTokenStore, OneTimeTokens, DEFAULT_TOKEN_TTL};

#[derive(Parser)]
#[command(name = "gathering-cli")]
#[command(about = "Operator CLI for the Dev Gathering API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an Argon2 hash for ADMIN_PASSWORD_HASH (reads stdin when no password is given)
    HashPassword { password: Option<String> },
    /// Print a random hex secret for SESSION_SECRET or QR_SECRET
    GenSecret {
        #[arg(long, default_value_t = 32)]
        bytes: usize,
    },
    /// Issue a one-time token offline with the given secret
    IssueToken {
        #[arg(long)]
        event_id: String,
        #[arg(long)]
        user_id: String,
        #[arg(long, env = "QR_SECRET", hide_env_values = true)]
        secret: String,
    },
    /// Log in and print the session cookie
    Login {
        #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Check whether a session cookie is still valid
    Session {
        /// Value of the admin_session cookie
        #[arg(long)]
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::HashPassword { password } => {
            let password = match password {
                Some(password) => password,
                None => read_line()?,
            };
            println!("{}", hash_password(&password)?);
        }
        Commands::GenSecret { bytes } => {
            let mut secret = vec![0u8; bytes.max(16)];
            rand::thread_rng().fill_bytes(&mut secret);
            println!("{}", hex::encode(secret));
        }
        Commands::IssueToken {
            event_id,
            user_id,
            secret,
        } => {
            let tokens = OneTimeTokens::new(
                Keyring::new([secret]),
                DEFAULT_TOKEN_TTL,
                Arc::new(MemoryUsedTokenStore::new(1)),
            );
            println!("{}", tokens.generate_token(&event_id, &user_id)?);
        }
        Commands::Login { password } => {
            let res = client()?
                .post(format!("{}/api/admin/login", cli.url))
                .json(&json!({ "password": password }))
                .send()
                .await?;
            if let Some(cookie) = res.headers().get(SET_COOKIE) {
                let value = cookie.to_str()?;
                let token = value
                    .split(';')
                    .next()
                    .and_then(|pair| pair.split_once('='))
                    .map(|(_, token)| token)
                    .unwrap_or_default();
                eprintln!("Session token: {token}");
            }
            print_response(res).await?;
        }
        Commands::Session { token } => {
            let res = client()?
                .get(format!("{}/api/admin/session", cli.url))
                .header(COOKIE, format!("admin_session={token}"))
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

fn client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
}

fn read_line() -> Result<String, std::io::Error> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body: Value = res.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        eprintln!("Error: API returned status {status}");
    }
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
