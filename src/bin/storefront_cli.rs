use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use storefront::{
    config::{self, AppConfig},
    db::{self, DbPool},
    entities::order,
    reports::CustomerSpend,
    ReportService, SeedService,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate(args) => handle_migrate_command(&context, args).await?,
        Commands::Seed(args) => handle_seed_command(&context, args, cli.json).await?,
        Commands::Report(command) => handle_report_command(&context, command, cli.json).await?,
    }

    db::close_pool((*context.db).clone())
        .await
        .context("failed to close database pool")?;
    Ok(())
}

#[derive(Parser)]
#[command(name = "storefront", about = "Seed and report on the storefront database", version)]
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
    /// Create (or drop) the schema
    Migrate(MigrateArgs),
    /// Fill the store with random customers, orders and products
    Seed(SeedArgs),
    /// Run one of the read-only reports
    #[command(subcommand)]
    Report(ReportCommands),
}

#[derive(Args)]
struct MigrateArgs {
    #[arg(long, action = ArgAction::SetTrue, help = "Roll back every migration instead")]
    down: bool,
}

#[derive(Args)]
struct SeedArgs {
    #[arg(long, help = "Number of customers; defaults to the configured count")]
    customers: Option<u32>,
    #[arg(long, help = "Number of orders; defaults to the configured count")]
    orders: Option<u32>,
    #[arg(long, help = "Number of products; defaults to the configured count")]
    products: Option<u32>,
    #[arg(long, help = "Seed for reproducible data")]
    rng_seed: Option<u64>,
}

#[derive(Subcommand)]
enum ReportCommands {
    /// Orders placed by one customer
    History(HistoryArgs),
    /// Orders that have not shipped, newest first
    Pending,
    /// Number of customers
    Customers,
    /// Orders with a coupon other than FREESHIPPING
    Coupons,
    /// Revenue over a trailing window
    Revenue(RevenueArgs),
    /// Average time from placement to shipment
    Fulfillment,
    /// Customers who spent more than an amount
    BigSpenders(BigSpendersArgs),
}

#[derive(Args)]
struct HistoryArgs {
    #[arg(long, help = "Customer id")]
    customer_id: i32,
}

#[derive(Args)]
struct RevenueArgs {
    #[arg(long, help = "Window length in days; defaults to the configured window")]
    days: Option<i64>,
}

#[derive(Args)]
struct BigSpendersArgs {
    #[arg(long, help = "Spending threshold; defaults to the configured amount")]
    amount: Option<i64>,
}

async fn handle_migrate_command(context: &CliContext, args: MigrateArgs) -> Result<()> {
    if args.down {
        db::rollback_migrations(&context.db)
            .await
            .context("failed to roll back migrations")?;
        println!("Schema dropped");
    } else {
        db::run_migrations(&context.db)
            .await
            .context("failed to run migrations")?;
        println!("Schema up to date");
    }
    Ok(())
}

async fn handle_seed_command(context: &CliContext, args: SeedArgs, json: bool) -> Result<()> {
    let mut seed_config = context.config.seed.clone();
    if let Some(customers) = args.customers {
        seed_config.customers = customers;
    }
    if let Some(orders) = args.orders {
        seed_config.orders = orders;
    }
    if let Some(products) = args.products {
        seed_config.products = products;
    }
    if args.rng_seed.is_some() {
        seed_config.rng_seed = args.rng_seed;
    }

    let summary = SeedService::new(context.db.clone(), seed_config)
        .run()
        .await
        .context("failed to seed database")?;

    if json {
        print_json(&summary)?;
    } else {
        println!(
            "Inserted {} customers, {} orders, {} products and {} order/product links",
            summary.customers, summary.orders, summary.products, summary.order_products
        );
    }
    Ok(())
}

async fn handle_report_command(
    context: &CliContext,
    command: ReportCommands,
    json: bool,
) -> Result<()> {
    let reports = context.report_service();

    match command {
        ReportCommands::History(args) => {
            let history = reports
                .order_history(args.customer_id)
                .await
                .context("failed to load order history")?;
            if json {
                print_json(&history)?;
            } else {
                println!("Order history of {}", history.customer.full_name());
                history.orders.iter().for_each(render_order);
            }
        }
        ReportCommands::Pending => {
            let orders = reports
                .pending_orders()
                .await
                .context("failed to load pending orders")?;
            if json {
                print_json(&orders)?;
            } else {
                println!("Pending orders:");
                orders.iter().for_each(render_order);
            }
        }
        ReportCommands::Customers => {
            let count = reports
                .customer_count()
                .await
                .context("failed to count customers")?;
            if json {
                print_json(&serde_json::json!({ "customers": count }))?;
            } else {
                println!("The number of recorded customers is {}", count);
            }
        }
        ReportCommands::Coupons => {
            let orders = reports
                .orders_with_coupon()
                .await
                .context("failed to load orders with coupon")?;
            if json {
                print_json(&orders)?;
            } else {
                println!("Orders with coupon code:");
                orders.iter().for_each(render_order);
            }
        }
        ReportCommands::Revenue(args) => {
            let report = reports
                .revenue_in_last_days(args.days)
                .await
                .context("failed to compute revenue")?;
            if json {
                print_json(&report)?;
            } else {
                println!("Revenue for the last {} days: {}", report.days, report.revenue);
            }
        }
        ReportCommands::Fulfillment => {
            let report = reports
                .average_fulfillment_time()
                .await
                .context("failed to compute fulfillment time")?;
            if json {
                print_json(&report)?;
            } else {
                match report.formatted() {
                    Some(average) => println!(
                        "Average fulfillment time over {} shipped orders: {}",
                        report.shipped_orders, average
                    ),
                    None => println!("No order has shipped yet"),
                }
            }
        }
        ReportCommands::BigSpenders(args) => {
            let customers = reports
                .customers_spending_over(args.amount)
                .await
                .context("failed to load big spenders")?;
            if json {
                print_json(&customers)?;
            } else {
                println!("Customers over the spending threshold:");
                customers.iter().for_each(render_spender);
            }
        }
    }

    Ok(())
}

struct CliContext {
    config: AppConfig,
    db: Arc<DbPool>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::connect_and_prepare(&config)
            .await
            .context("failed to connect to database")?;

        Ok(Self {
            config,
            db: Arc::new(db_pool),
        })
    }

    fn report_service(&self) -> ReportService {
        ReportService::new(self.db.clone(), self.config.reports.clone())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_order(order: &order::Model) {
    let shipped = order
        .ship_date
        .map_or_else(|| "not shipped".to_string(), |d| format!("shipped {}", d));
    let coupon = order
        .coupon_code
        .map_or_else(String::new, |c| format!(" • coupon {}", c));
    println!(
        "- Order {} • customer {} • placed {} • {}{}",
        order.id, order.customer_id, order.order_date, shipped, coupon
    );
}

fn render_spender(customer: &CustomerSpend) {
    println!(
        "- {} {} <{}> spent {}",
        customer.first_name, customer.last_name, customer.email, customer.total_spent
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn every_subcommand_has_help_text() {
        let cli = Cli::command();
        cli.clone().debug_assert();

        for command in cli.get_subcommands() {
            assert!(command.get_about().is_some(), "{} has no help", command.get_name());
            for nested in command.get_subcommands() {
                assert!(nested.get_about().is_some(), "{} has no help", nested.get_name());
            }
        }
    }

    #[test]
    fn parses_report_arguments() {
        let cli = Cli::try_parse_from(["storefront", "--json", "report", "big-spenders", "--amount", "250"])
            .unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Report(ReportCommands::BigSpenders(BigSpendersArgs { amount: Some(250) }))
        ));
    }
}
