use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;

use expense_tracker_client::api::types::{LoginResponse, NewTransaction, TransactionList};
use expense_tracker_client::api::{auth, expenses};
use expense_tracker_client::notify::Subscription;
use expense_tracker_client::{
    AppState, ClientConfig, ClientError, OperationKind, Query, QueryOutcome, QueryRequest,
};

#[derive(Parser, Debug)]
#[command(name = "expense-cli", about = "Talk to the expense tracker backend")]
struct Args {
    /// Backend origin (overrides EXPENSE_API_URL / API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session credential
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored credential
    Logout,
    /// List recorded transactions
    List,
    /// Record a new expense
    Add {
        #[arg(long)]
        amount: f64,
        #[arg(long, default_value = "USD")]
        currency: String,
        #[arg(long, default_value = "food")]
        category: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// GET an arbitrary path and print the JSON body
    Get { path: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let mut config = ClientConfig::from_env();
    if let Some(url) = args.api_url.as_deref() {
        config = config.with_base_url(url);
    }
    log::info!("Using backend {}", config.base_url);

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let mut notifications = state.notifications.subscribe();
    state.restore_session();

    let ok = run(&state, args.command).await;
    print_notifications(&mut notifications);
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn run(state: &AppState, command: Command) -> bool {
    match command {
        Command::Login { email, password } => {
            let query: Query<LoginResponse> = state.query(OperationKind::Create);
            report(auth::login(&query, &email, &password).await, |_| {
                println!("Signed in as {}", email.trim());
            })
        }
        Command::Logout => state.logout().is_ok(),
        Command::List => {
            let query: Query<TransactionList> = state.query(OperationKind::Read);
            report(expenses::list(&query).await, |items| {
                for tx in items {
                    println!(
                        "{:>10.2} {} {:<12} {}",
                        tx.amount, tx.currency, tx.category, tx.description
                    );
                }
            })
        }
        Command::Add {
            amount,
            currency,
            category,
            description,
        } => {
            let query: Query<Value> = state.query(OperationKind::Create);
            let tx = NewTransaction::new(amount, currency, category, description);
            report(expenses::add(&query, &tx).await, |_| {
                println!("Expense added");
            })
        }
        Command::Get { path } => {
            let query: Query<Value> = state.query(OperationKind::Read);
            report(query.invoke(QueryRequest::new(path)).await, |body| {
                println!("{}", serde_json::to_string_pretty(body).unwrap_or_default());
            })
        }
    }
}

fn report<T>(outcome: QueryOutcome<T>, on_success: impl FnOnce(&T)) -> bool {
    match outcome.into_result() {
        Ok(data) => {
            on_success(&data);
            true
        }
        // Validation errors never reach the notification channel.
        Err(ClientError::Validation(e)) => {
            eprintln!("invalid input: {}", e);
            false
        }
        Err(e) => {
            log::debug!("Command failed: {}", e);
            false
        }
    }
}

fn print_notifications(notifications: &mut Subscription) {
    while let Some(event) = notifications.try_recv() {
        eprintln!("[{}] {}", event.severity.label(), event.message);
    }
}
