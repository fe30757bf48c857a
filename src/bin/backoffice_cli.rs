use std::sync::Arc;

use anyhow::{Context, Result};
use backoffice_api::{
    auth::{AuthConfig, AuthService},
    config::{self, AppConfig},
    db::{self, DbPool},
    services::access::AccessService,
};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "backoffice",
    about = "Back-office maintenance: schema, access defaults and tokens",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Create the default permissions and roles (safe to repeat)
    Seed,
    /// Give a user a role
    AssignRole {
        /// Identity-provider user id
        user: String,
        /// Role name, e.g. `admin`
        role: String,
    },
    /// Issue a bearer token carrying the user's stored roles and permissions
    IssueToken {
        /// Identity-provider user id
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.db)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied");
        }
        Commands::Seed => {
            let report = context
                .access()
                .seed_defaults()
                .await
                .context("failed to seed access defaults")?;
            if cli.json {
                print_json(&report)?;
            } else {
                println!(
                    "Seeded {} permission(s), {} role(s), {} grant(s)",
                    report.permissions_created, report.roles_created, report.links_created
                );
            }
        }
        Commands::AssignRole { user, role } => {
            let role = context
                .access()
                .assign_role(&user, &role)
                .await
                .with_context(|| format!("failed to assign role to {user}"))?;
            if cli.json {
                print_json(&role)?;
            } else {
                println!("{} now holds role {}", user, role.name);
            }
        }
        Commands::IssueToken { user } => {
            let token = context
                .auth
                .issue_for_user(&*context.db, &user)
                .await
                .with_context(|| format!("failed to issue token for {user}"))?;
            if cli.json {
                print_json(&token)?;
            } else {
                println!("{}", token.access_token);
            }
        }
    }

    Ok(())
}

struct CliContext {
    db: Arc<DbPool>,
    auth: AuthService,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config: AppConfig = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;

        Ok(Self {
            db: Arc::new(db_pool),
            auth: AuthService::new(AuthConfig::from(&config)),
        })
    }

    fn access(&self) -> AccessService {
        AccessService::new(self.db.clone())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
