//! Pocketbook - a terminal front end for the personal-finance API.
//!
//! Thin presentation layer over `pocketbook-core`: every command calls one or
//! a few API operations and prints the result. When the session cannot be
//! renewed the user is sent back to `pocketbook login`.

use std::io;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use pocketbook_core::api::{SessionEvent, StatusPoll};
use pocketbook_core::models::{
    Budget, NewTransaction, SummaryPeriod, Transaction, TransactionKind, TransactionQuery,
    TransactionStatus,
};
use pocketbook_core::{ApiClient, ApiError, Config};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Transactions shown per page
const DEFAULT_PAGE_SIZE: u32 = 20;

/// Width of the description column in tables
const DESCRIPTION_WIDTH: usize = 32;

#[derive(Parser)]
#[command(name = "pocketbook", version, about = "Personal finance from the terminal")]
struct Cli {
    /// Override the API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session
    Login {
        /// Account email (defaults to the last one used)
        email: Option<String>,
    },
    /// Create an account
    Register { name: String, email: String },
    /// Log out and forget the stored session
    Logout,
    /// Request a password reset email
    ForgotPassword { email: String },
    /// Set a new password with the token from the reset email
    ResetPassword { token: String },
    /// Show the logged-in user
    Whoami,
    /// List transactions
    Transactions {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: u32,
    },
    /// Add a transaction manually
    Add {
        amount: f64,
        description: String,
        #[arg(long)]
        category_id: Option<i64>,
        /// Date as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Record as income instead of expense
        #[arg(long)]
        income: bool,
    },
    /// Describe an expense in plain words and let the AI parse it
    Parse {
        text: String,
        /// Return immediately instead of waiting for the parser
        #[arg(long)]
        no_wait: bool,
    },
    /// Delete a transaction
    Delete { id: i64 },
    /// List budgets
    Budgets,
    /// List categories
    Categories,
    /// Show the AI-generated spending summary
    Summary {
        #[arg(long, default_value = "month")]
        period: String,
    },
    /// Recent transactions, budgets and summary at once
    Dashboard,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(url) = cli.api_url.clone() {
        config.api_base_url = url;
    }
    let session = config.open_session()?;
    let client = ApiClient::from_config(&config, session)?;
    let mut events = client.subscribe();

    info!(api = %config.api_base_url, "Pocketbook starting");
    let result = run(&client, &mut config, cli.command).await;

    report_session_events(&mut events);

    match result {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<ApiError>() {
            Some(api_err) if api_err.requires_login() => {
                eprintln!("Your session has expired. Run `pocketbook login` to continue.");
                std::process::exit(1);
            }
            _ => Err(e),
        },
    }
}

async fn run(client: &ApiClient, config: &mut Config, command: Command) -> Result<()> {
    match command {
        Command::Login { email } => {
            let email = match email.or_else(|| config.last_email.clone()) {
                Some(email) => email,
                None => anyhow::bail!("Email required: pocketbook login <email>"),
            };
            let password = rpassword::prompt_password("Password: ")
                .context("Failed to read password")?;
            let user = client.login(&email, &password).await?;
            config.last_email = Some(email.clone());
            config.save()?;
            match user {
                Some(user) => println!("Logged in as {}", user.display_name()),
                None => println!("Logged in as {}", email),
            }
        }
        Command::Register { name, email } => {
            let password = rpassword::prompt_password("Choose a password: ")
                .context("Failed to read password")?;
            let resp = client.register(&name, &email, &password).await?;
            println!(
                "{}",
                resp.message.as_deref().unwrap_or("Account created. You can now log in.")
            );
        }
        Command::Logout => {
            client.logout().await?;
            println!("Logged out");
        }
        Command::ForgotPassword { email } => {
            let resp = client.forgot_password(&email).await?;
            let fallback = "If the account exists, a reset email is on its way.";
            println!("{}", resp.message.as_deref().unwrap_or(fallback));
        }
        Command::ResetPassword { token } => {
            let password = rpassword::prompt_password("New password: ")
                .context("Failed to read password")?;
            let resp = client.reset_password(&token, &password).await?;
            println!("{}", resp.message.as_deref().unwrap_or("Password updated"));
        }
        Command::Whoami => {
            let user = client.current_user().await?;
            println!("{} <{}>", user.display_name(), user.email);
        }
        Command::Transactions { page, limit } => {
            let query = TransactionQuery {
                limit: Some(limit),
                ..TransactionQuery::page(page)
            };
            let page = client.list_transactions(&query).await?;
            print_transactions(&page.items);
            if page.has_next() {
                println!("\nMore results: --page {}", page.page.unwrap_or(1) + 1);
            }
        }
        Command::Add {
            amount,
            description,
            category_id,
            date,
            income,
        } => {
            let transaction = NewTransaction {
                amount,
                description,
                category_id,
                date: date.unwrap_or_else(|| Local::now().date_naive()),
                kind: if income {
                    TransactionKind::Income
                } else {
                    TransactionKind::Expense
                },
            };
            let created = client.create_transaction(&transaction).await?;
            println!("Added #{}: {} {}", created.id, created.display_amount(), created.description);
        }
        Command::Parse { text, no_wait } => {
            let pending = client.parse_expense(&text).await?;
            if no_wait || pending.status.is_terminal() {
                println!("Submitted #{} ({})", pending.id, pending.status.as_str());
                return Ok(());
            }
            let result = client.wait_for_transaction(pending.id, StatusPoll::default()).await?;
            match (result.status, result.transaction) {
                (TransactionStatus::Completed, Some(txn)) => print_transactions(&[txn]),
                (TransactionStatus::Failed, _) => anyhow::bail!(
                    "Could not parse expense: {}",
                    result.error_details.as_deref().unwrap_or("unknown error")
                ),
                (status, _) => println!("#{} is still {}", result.id, status.as_str()),
            }
        }
        Command::Delete { id } => {
            client.delete_transaction(id).await?;
            println!("Deleted #{}", id);
        }
        Command::Budgets => {
            let budgets = client.list_budgets().await?;
            print_budgets(&budgets);
        }
        Command::Categories => {
            for category in client.list_categories().await? {
                println!("{:>6}  {}", category.id, category.name);
            }
        }
        Command::Summary { period } => {
            let period = SummaryPeriod::parse(&period).ok_or_else(|| {
                anyhow::anyhow!("Unknown period '{}': use week, month or year", period)
            })?;
            let summary = client.summary(period).await?;
            println!("{}", summary.summary);
            println!(
                "\nIncome {:.2}  Expenses {:.2}  Net {:.2}",
                summary.total_income,
                summary.total_expenses,
                summary.net()
            );
        }
        Command::Dashboard => {
            let query = TransactionQuery {
                limit: Some(5),
                ..TransactionQuery::page(1)
            };
            let (recent, budgets, summary) = futures::try_join!(
                client.list_transactions(&query),
                client.list_budgets(),
                client.summary(SummaryPeriod::Month),
            )?;
            println!("== Recent transactions");
            print_transactions(&recent.items);
            println!("\n== Budgets");
            print_budgets(&budgets);
            println!("\n== This month");
            println!("{}", summary.summary);
        }
    }
    Ok(())
}

/// Tell the user about session changes that happened behind a command
fn report_session_events(events: &mut broadcast::Receiver<SessionEvent>) {
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::LoginRequired { redirect } = event {
            info!(redirect = %redirect, "Login required");
            eprintln!("Signed out: stored credentials were cleared.");
        }
    }
}

fn print_transactions(transactions: &[Transaction]) {
    if transactions.is_empty() {
        println!("No transactions");
        return;
    }
    for txn in transactions {
        println!(
            "{:>6}  {:<12}  {:<width$}  {:>12}  {}",
            txn.id,
            txn.display_date(),
            truncate(&txn.description, DESCRIPTION_WIDTH),
            txn.display_amount(),
            txn.display_category(),
            width = DESCRIPTION_WIDTH,
        );
    }
}

fn print_budgets(budgets: &[Budget]) {
    if budgets.is_empty() {
        println!("No budgets");
        return;
    }
    for budget in budgets {
        let marker = if budget.is_over_budget() { "  OVER" } else { "" };
        println!(
            "{:<20}  {:>10.2} / {:<10.2}  {:>5.0}%{}",
            budget.category.as_deref().unwrap_or("-"),
            budget.spent,
            budget.limit,
            budget.percent_used(),
            marker
        );
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
