//! Paloma CLI - operator commands
//!
//! Usage:
//!   paloma migrate
//!   paloma create-user <username> <email> [--full-name NAME] [--role ROLE]
//!   paloma roles <user>
//!   paloma grant-role <user> <role> [--primary]
//!   paloma revoke-role <user> <role>
//!   paloma sessions <user>
//!   paloma revoke-sessions <user>
//!   paloma delete-user <user> --yes
//!
//! `<user>` is a user id, an email address, or a username. Configuration is
//! read the same way as the API server (`PALOMA_CONFIG` plus environment).

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use paloma_api::auth::{AuthService, PasswordConfig, RegisterRequest, TokenSigner};
use paloma_core::{AppConfig, AuthRepository, PgAuthStore, RoleType, User, UserRoles};
use serde_json::json;
use std::io::BufRead;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "paloma")]
#[command(about = "Paloma account administration")]
#[command(version)]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the database schema
    Migrate,
    /// Create a user; the password is read from stdin unless given
    CreateUser {
        username: String,
        email: String,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        password: Option<String>,
        /// Initial role (USER or TRUSTED_CONTACT)
        #[arg(long, default_value = "USER")]
        role: RoleType,
    },
    /// Show a user's roles
    Roles { user: String },
    /// Add a role to a user
    GrantRole {
        user: String,
        role: RoleType,
        /// Make it the primary role
        #[arg(long)]
        primary: bool,
    },
    /// Remove a role from a user
    RevokeRole { user: String, role: RoleType },
    /// Show a user's refresh token state
    Sessions { user: String },
    /// Revoke a user's refresh token
    RevokeSessions { user: String },
    /// Delete a user with all credentials, roles and sessions
    DeleteUser {
        user: String,
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("Failed to load configuration")?;

    let store = Arc::new(
        PgAuthStore::connect(&config.database.postgres_url, 2)
            .await
            .context("Failed to connect to PostgreSQL")?,
    );

    if let Commands::Migrate = cli.command {
        store.migrate().await.context("Failed to apply schema")?;
        println!("Schema is up to date");
        return Ok(());
    }

    config.validate().context("Invalid configuration")?;
    let signer = TokenSigner::from_config(&config.auth)?;
    let auth = AuthService::new(
        store.clone(),
        Arc::new(signer),
        PasswordConfig::from(&config.auth.password),
    )
    .context("Failed to initialize authentication")?;

    match cli.command {
        Commands::Migrate => {}
        Commands::CreateUser {
            username,
            email,
            full_name,
            password,
            role,
        } => {
            let password = match password {
                Some(password) => password,
                None => read_password()?,
            };
            let user = auth
                .register(RegisterRequest {
                    username,
                    email,
                    full_name,
                    password,
                    role_type: Some(role),
                })
                .await?;
            let roles = auth.get_roles(user.id).await?;
            print_roles(&roles, cli.json, "Created user");
        }
        Commands::Roles { user } => {
            let user = resolve_user(store.as_ref(), &user).await?;
            let roles = auth.get_roles(user.id).await?;
            print_roles(&roles, cli.json, "Roles");
        }
        Commands::GrantRole {
            user,
            role,
            primary,
        } => {
            let user = resolve_user(store.as_ref(), &user).await?;
            let roles = auth.add_role(user.id, role, primary).await?;
            print_roles(&roles, cli.json, &format!("Granted {role}"));
        }
        Commands::RevokeRole { user, role } => {
            let user = resolve_user(store.as_ref(), &user).await?;
            let roles = auth.remove_role(user.id, role).await?;
            print_roles(&roles, cli.json, &format!("Revoked {role}"));
        }
        Commands::Sessions { user } => {
            let user = resolve_user(store.as_ref(), &user).await?;
            let session = auth.active_session(user.id).await?;
            let now = Utc::now();

            if cli.json {
                let value = session.map(|s| {
                    json!({
                        "user_id": s.user_id,
                        "created_at": s.created_at,
                        "expires_at": s.expires_at,
                        "live": s.is_live_at(now),
                    })
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                match session {
                    Some(s) => println!(
                        "{}: refresh token issued {}, expires {} ({})",
                        user.username,
                        s.created_at,
                        s.expires_at,
                        if s.is_live_at(now) { "live" } else { "expired" }
                    ),
                    None => println!("{}: no active session", user.username),
                }
            }
        }
        Commands::RevokeSessions { user } => {
            let user = resolve_user(store.as_ref(), &user).await?;
            let revoked = auth.logout(user.id).await?;
            if cli.json {
                println!("{}", json!({ "user_id": user.id, "revoked": revoked }));
            } else {
                println!("{}: revoked {revoked} refresh token(s)", user.username);
            }
        }
        Commands::DeleteUser { user, yes } => {
            if !yes {
                bail!("Refusing to delete without --yes");
            }
            let user = resolve_user(store.as_ref(), &user).await?;
            auth.delete_user(user.id).await?;
            tracing::info!(user_id = %user.id, "Deleted user from CLI");
            if cli.json {
                println!("{}", json!({ "deleted": user.id }));
            } else {
                println!("Deleted {} ({})", user.username, user.id);
            }
        }
    }

    Ok(())
}

/// Look a user up by id, email address, or username
async fn resolve_user(repo: &dyn AuthRepository, user: &str) -> anyhow::Result<User> {
    let found = if let Ok(id) = Uuid::parse_str(user) {
        repo.find_user_by_id(id).await?
    } else if user.contains('@') {
        repo.find_user_by_email(&user.trim().to_lowercase()).await?
    } else {
        repo.find_user_by_username(user.trim()).await?
    };

    found.with_context(|| format!("No user matches '{user}'"))
}

fn read_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;

    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    Ok(password)
}

fn print_roles(roles: &UserRoles, as_json: bool, heading: &str) {
    if as_json {
        match serde_json::to_string_pretty(roles) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("Failed to serialize roles: {e}"),
        }
        return;
    }

    let names: Vec<&str> = roles.roles.iter().map(RoleType::as_str).collect();
    println!("{heading}: {} ({})", roles.username, roles.user_id);
    println!("  roles:   {}", names.join(", "));
    println!(
        "  primary: {}",
        roles.primary_role.map(|r| r.as_str()).unwrap_or("-")
    );
}
