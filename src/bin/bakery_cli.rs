use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bakery_api::{
    auth::ADMIN_ROLE,
    config,
    db::{self, DbPool},
    services::{
        ledger::LedgerService,
        users::{CreateUserRequest, UserService, UserView},
    },
};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let pool = Arc::new(
        db::establish_connection_from_app_config(&cfg)
            .await
            .context("failed to connect to database")?,
    );

    match cli.command {
        Commands::Migrate => migrate(&pool, cli.json).await?,
        Commands::CreateAdmin(args) => create_admin(pool, args, cli.json).await?,
        Commands::RecalcLedgers => recalc_ledgers(pool, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "bakery-cli", about = "Maintenance tasks for the bakery API", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Create an administrator account
    CreateAdmin(CreateAdminArgs),
    /// Replay every customer and party ledger from its opening balance
    RecalcLedgers,
}

#[derive(Args)]
struct CreateAdminArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long, default_value = "Administrator")]
    full_name: String,
    /// Falls back to BAKERY_ADMIN_PASSWORD so the secret stays out of shell history
    #[arg(long, env = "BAKERY_ADMIN_PASSWORD", hide_env_values = true)]
    password: String,
}

async fn migrate(pool: &DbPool, json: bool) -> Result<()> {
    db::run_migrations(pool)
        .await
        .context("failed to run migrations")?;
    if json {
        print_json(&serde_json::json!({ "migrated": true }))?;
    } else {
        println!("Migrations applied");
    }
    Ok(())
}

async fn create_admin(pool: Arc<DbPool>, args: CreateAdminArgs, json: bool) -> Result<()> {
    if args.password.len() < 8 {
        bail!("password must be at least 8 characters");
    }
    let users = UserService::new(pool);
    let user = users
        .create(CreateUserRequest {
            username: args.username,
            email: args.email,
            full_name: args.full_name,
            password: args.password,
            role: ADMIN_ROLE.to_string(),
        })
        .await
        .context("failed to create admin user")?;

    let view = UserView::from(user);
    if json {
        print_json(&view)?;
    } else {
        println!("Admin {} created (id {})", view.username, view.id);
    }
    Ok(())
}

async fn recalc_ledgers(pool: Arc<DbPool>, json: bool) -> Result<()> {
    let ledger = LedgerService::new(pool, None);
    let results = ledger
        .recalculate_all()
        .await
        .context("failed to recalculate ledgers")?;

    if json {
        print_json(&results)?;
    } else {
        for r in &results {
            println!(
                "{:<8} {}  rows={:<5} balance={}",
                r.entity_type, r.entity_id, r.rows, r.balance
            );
        }
        println!("{} ledgers recalculated", results.len());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
