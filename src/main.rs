use std::error::Error;

use actix_cors::Cors;
use actix_web::{middleware::Logger, App, HttpServer};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use taskdesk::config::Config;
use taskdesk::models::{NewUser, User};
use taskdesk::AppState;

#[derive(Parser, Debug)]
#[command(name = "taskdesk", version, about = "Personal task management backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run migrations and start the HTTP server (default).
    Serve,
    /// Create a user account together with its profile.
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        /// Grant staff (admin) status.
        #[arg(long)]
        staff: bool,
    },
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(pool, config).await?,
        Command::CreateUser {
            username,
            email,
            password,
            first_name,
            last_name,
            staff,
        } => {
            let new_user = NewUser {
                username,
                email,
                password,
                first_name,
                last_name,
                is_staff: staff,
            };
            let user = User::provision(&pool, &new_user).await?;
            println!("Created user {} (id {})", user.username, user.id);
        }
    }
    Ok(())
}

async fn serve(pool: PgPool, config: Config) -> std::io::Result<()> {
    tokio::fs::create_dir_all(&config.media.root).await?;

    let state = AppState::new(pool, &config);
    let origins = config.cors_allowed_origins.clone();

    log::info!("Starting TaskDesk server at {}", config.server_url());
    HttpServer::new(move || {
        let cors = if origins.is_empty() {
            Cors::default().allow_any_origin()
        } else {
            origins
                .iter()
                .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        };
        let cors = cors.allow_any_method().allow_any_header().max_age(3600);

        let state = state.clone();
        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .configure(move |cfg| state.configure(cfg))
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
