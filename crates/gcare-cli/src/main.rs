use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "gcare")]
#[command(about = "GenCare order/payment operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> environment overlay)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Payment gateway tooling (offline; reads gateway secrets from env)
    Payment {
        #[command(subcommand)]
        cmd: PaymentCmd,
    },

    /// Status-table queries
    Status {
        #[command(subcommand)]
        cmd: StatusCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply embedded SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum PaymentCmd {
    /// Build and sign a payment URL.
    Url {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Order id (uuid)
        #[arg(long)]
        order: String,

        /// Whole VND
        #[arg(long)]
        amount: i64,

        #[arg(long, default_value = "127.0.0.1")]
        ip: String,

        #[arg(long)]
        bank_code: Option<String>,

        /// vn | en
        #[arg(long)]
        locale: Option<String>,
    },

    /// Verify the signature of a callback query string (or full URL).
    Verify {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        query: String,
    },
}

#[derive(Subcommand)]
enum StatusCmd {
    /// Check a proposed status change; exits non-zero when rejected.
    Validate {
        #[arg(long)]
        order_status: String,

        #[arg(long)]
        payment_status: String,

        #[arg(long)]
        to_order: Option<String>,

        #[arg(long)]
        to_payment: Option<String>,
    },

    /// Print the actions a role is offered for an order in the given pair.
    Actions {
        #[arg(long)]
        order_status: String,

        #[arg(long)]
        payment_status: String,

        #[arg(long, default_value = "staff")]
        role: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = gcare_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = gcare_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_orders_table={} has_payments_table={}",
                        s.ok, s.has_orders_table, s.has_payments_table
                    );
                }
                DbCmd::Migrate => {
                    gcare_db::migrate(&pool).await?;
                    tracing::info!("migrations applied");
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let loaded = commands::load_config(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Payment { cmd } => match cmd {
            PaymentCmd::Url {
                config_paths,
                order,
                amount,
                ip,
                bank_code,
                locale,
            } => commands::payment::build_url(&config_paths, &order, amount, &ip, bank_code, locale)?,

            PaymentCmd::Verify {
                config_paths,
                query,
            } => commands::payment::verify(&config_paths, &query)?,
        },

        Commands::Status { cmd } => match cmd {
            StatusCmd::Validate {
                order_status,
                payment_status,
                to_order,
                to_payment,
            } => commands::status::validate(
                &order_status,
                &payment_status,
                to_order.as_deref(),
                to_payment.as_deref(),
            )?,

            StatusCmd::Actions {
                order_status,
                payment_status,
                role,
            } => commands::status::actions(&order_status, &payment_status, &role)?,
        },
    }

    Ok(())
}
