use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use syndic_gateway::auth::LoginRequest;
use syndic_gateway::{create_app_state, create_router, load_gateway_config};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "syndic-gateway")]
#[command(about = "Outbound gateway client for the syndicate management backend")]
struct Cli {
    /// Path to gateway.json (defaults to $GATEWAY_CONFIG, then ./gateway.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP surface
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
    },
    /// Fetch a client-credentials token and print a summary
    ServiceToken,
    /// Log a user in and print the profile and roles
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "GATEWAY_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("syndic_gateway=info".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();
    let config = load_gateway_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => {
            info!(
                gateway = %config.base_url,
                static_headers = config.static_headers.len(),
                "Starting gateway client API"
            );

            let app = create_router(create_app_state(&config)?);
            let listener = tokio::net::TcpListener::bind(&bind).await?;

            info!("Listening on http://{}", bind);
            axum::serve(listener, app).await?;
        }
        Commands::ServiceToken => {
            let state = create_app_state(&config)?;
            let tokens = state.users.service_tokens();
            let token = tokens.fetch_service_token().await?;

            println!("Token endpoint: {}", tokens.token_endpoint());
            println!("  Token:      {}", token.preview());
            println!("  Type:       {}", token.token_type);
            println!("  Expires in: {}s", token.expires_in_seconds);
        }
        Commands::Login { username, password } => {
            let state = create_app_state(&config)?;
            let session = state
                .users
                .login(&LoginRequest { username, password })
                .await?;

            let user = &session.user;
            println!("Logged in as {}", user.username.as_deref().unwrap_or("<unknown>"));
            if let Some(id) = &user.id {
                println!("  Id:          {}", id);
            }
            if let Some(email) = &user.email {
                println!("  Email:       {} (verified: {})", email, user.email_verified);
            }
            println!("  Session:     {}", session.access_token.preview());
            println!("  Roles:       {}", session.roles.join(", "));
            println!("  Permissions: {}", session.permissions.join(", "));
        }
    }

    Ok(())
}
