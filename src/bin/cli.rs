//! Lending client CLI
//!
//! Signs in against the library gateway (or an in-memory demo library with
//! `--offline`) and runs one command through the same views and actions a
//! front end would use.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use lending_sync::{
    analytics::DashboardReport,
    backend::{Backend, HttpBackend, MemoryBackend},
    classify::HistoryFilter,
    engine::Engine,
    error::{AppError, Result},
    gate::RouteDecision,
    models::{BookFilters, Config},
    session::Credentials,
    views::{
        BorrowList, CartView, CatalogView, Dashboard, HistoryView, NotificationPanel,
        ReservationList, UnreadBadge,
    },
};

/// lending-sync - library lending client
#[derive(Parser, Debug)]
#[command(
    name = "lending-sync",
    version,
    about = "Library lending client with synchronized views"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "lending-sync.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Use the built-in demo library instead of the gateway
    #[arg(long)]
    offline: bool,

    /// Account id
    #[arg(short, long, env = "LENDING_USER", default_value = "user1")]
    user: String,

    /// Account password
    #[arg(short, long, env = "LENDING_PASSWORD", default_value = "password")]
    password: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the catalog
    Books {
        /// Free-text search over title, author and ISBN
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        author: Option<String>,
    },

    /// Show current borrows (all users with --all, admin only)
    Borrows {
        #[arg(long)]
        all: bool,
    },

    /// Show lending history
    History {
        /// all, borrowed, returned or overdue
        #[arg(long, default_value = "all")]
        filter: HistoryFilter,
        #[arg(long)]
        all: bool,
    },

    /// Borrow a book
    Borrow { book_id: String },

    /// Return a borrowed book
    Return { book_id: String },

    /// Show reservations
    Reservations,

    /// Reserve an unavailable book
    Reserve { book_id: String },

    /// Cancel a reservation
    Cancel { reservation_id: i64 },

    /// Show the cart, optionally adding a book first
    Cart {
        #[arg(long)]
        add: Option<String>,
        #[arg(long)]
        clear: bool,
    },

    /// Show notifications
    Notifications {
        /// Mark everything read afterwards
        #[arg(long)]
        mark_all_read: bool,
    },

    /// Follow the unread count for a while
    Watch {
        #[arg(long, default_value_t = 60)]
        seconds: u64,
    },

    /// Show the admin dashboard
    Dashboard,

    /// Check where a path would lead for the signed-in user
    Route { path: String },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_report(report: &DashboardReport) {
    log::info!(
        "Active: {} (overdue {}), copies {}/{} available, {}% utilized",
        report.active_count,
        report.overdue_count,
        report.availability.available,
        report.availability.total,
        report.availability.utilization
    );
    for bucket in &report.monthly {
        println!(
            "{}  borrowed {:>3}  returned {:>3}",
            bucket.label, bucket.borrowed, bucket.returned
        );
    }
    println!(
        "Status: borrowed {}, overdue {}, returned {}",
        report.distribution.borrowed, report.distribution.overdue, report.distribution.returned
    );
    for (rank, borrower) in report.top_borrowers.iter().enumerate() {
        println!("#{} {} ({} active)", rank + 1, borrower.user_id, borrower.active);
    }
    for row in &report.recent {
        println!(
            "{:<10} {:<8} {} due {}",
            row.record.user_id, row.status, row.record.title, row.record.due_date
        );
    }
}

async fn run(engine: &Arc<Engine>, command: Command) -> Result<()> {
    let now = Utc::now();
    match command {
        Command::Books { search, author } => {
            let filters = BookFilters {
                search,
                author,
                ..BookFilters::default()
            };
            let catalog = CatalogView::mount(Arc::clone(engine), filters);
            for book in catalog.books().await?.iter() {
                println!(
                    "{:<6} {:<40} {:<24} {}/{}",
                    book.id, book.title, book.author, book.available_copies, book.total_copies
                );
            }
        }

        Command::Borrows { all } => {
            let list = if all {
                BorrowList::all(Arc::clone(engine))
            } else {
                BorrowList::mine(Arc::clone(engine))
            };
            for row in list.load(now).await? {
                println!(
                    "{:<6} {:<32} {:<8} due {} ({} days left)",
                    row.record.book_id,
                    row.record.title,
                    row.status.as_str(),
                    row.record.due_date,
                    row.days_left
                );
            }
        }

        Command::History { filter, all } => {
            let view = if all {
                HistoryView::all(Arc::clone(engine))
            } else {
                HistoryView::mine(Arc::clone(engine))
            };
            let page = view.load(filter, now).await?;
            log::info!(
                "{} records: {} out, {} overdue, {} returned",
                page.summary.total,
                page.summary.borrowed,
                page.summary.overdue,
                page.summary.returned
            );
            for row in page.rows {
                println!(
                    "{} {:<32} {:<8} {}",
                    row.record.borrowed_at.date_naive(),
                    row.record.title,
                    row.status.as_str(),
                    row.record.due_date
                );
            }
        }

        Command::Borrow { book_id } => {
            let receipt = engine.borrow_by_id(&book_id).await?;
            log::info!("Borrowed {book_id}, due {}", receipt.due_date);
        }

        Command::Return { book_id } => {
            engine.return_book(&book_id).await?;
            log::info!("Returned {book_id}");
        }

        Command::Reservations => {
            let list = ReservationList::mount(Arc::clone(engine));
            for row in list.load(now).await? {
                println!(
                    "{:<4} {:<6} {:<32} {:<10} {}{}",
                    row.record.id,
                    row.record.book_id,
                    row.record.title,
                    row.state.status.as_str(),
                    row.record.expires_at.date_naive(),
                    if row.state.expiring_soon { " (expiring soon)" } else { "" }
                );
            }
        }

        Command::Reserve { book_id } => {
            let receipt = engine.reserve(&book_id).await?;
            log::info!(
                "Reserved {book_id} (reservation {}), expires {}",
                receipt.id,
                receipt.expires_at.date_naive()
            );
        }

        Command::Cancel { reservation_id } => {
            engine.cancel_reservation_by_id(reservation_id).await?;
            log::info!("Cancelled reservation {reservation_id}");
        }

        Command::Cart { add, clear } => {
            if let Some(book_id) = add {
                let id = book_id.clone();
                let book = engine
                    .authed(|b, s| async move { b.get_book(&s, &id).await })
                    .await?;
                engine.add_to_cart(&book).await?;
            }
            if clear {
                engine.clear_cart().await?;
            }
            let cart = CartView::mount(Arc::clone(engine));
            for item in cart.items().await?.iter() {
                println!("{:<6} {:<40} x{} {:.2}", item.book_id, item.title, item.quantity, item.price);
            }
            log::info!("{} books, total {:.2}", cart.badge(), cart.total_price());
        }

        Command::Notifications { mark_all_read } => {
            let panel = NotificationPanel::mount(Arc::clone(engine));
            panel.open().await?;
            for row in panel.rows(now) {
                println!(
                    "{} {:<4} {:<12} {} - {}",
                    if row.notification.is_read { " " } else { "*" },
                    row.notification.id,
                    row.age,
                    row.notification.title,
                    row.notification.message
                );
            }
            if mark_all_read {
                panel.mark_all_read().await?;
                log::info!("All notifications marked read");
            }
        }

        Command::Watch { seconds } => {
            let mut badge = UnreadBadge::mount(Arc::clone(engine));
            log::info!("Unread: {}", badge.refresh().await?);
            let deadline = tokio::time::sleep(Duration::from_secs(seconds));
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    _ = &mut deadline => break,
                    changed = badge.changed() => match changed {
                        Some(count) => log::info!("Unread: {count}"),
                        None => break,
                    },
                }
                if engine.session().is_none() {
                    return Err(AppError::SessionExpired);
                }
            }
        }

        Command::Dashboard => {
            let dashboard = Dashboard::mount(Arc::clone(engine));
            let report = dashboard.load().await?;
            print_report(&report);
        }

        Command::Route { path } => match engine.route(&path) {
            RouteDecision::Allow => log::info!("{path}: allowed"),
            RouteDecision::RedirectToLogin => log::info!("{path}: redirect to login"),
            RouteDecision::Redirect(to) => log::info!("{path}: redirect to {to}"),
            RouteDecision::NotFound => log::info!("{path}: not found"),
        },

        // Handled before signing in.
        Command::Validate => {}
    }
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = Config::load(&cli.config);
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    let config = match loaded {
        Ok(config) => config,
        Err(e) if matches!(cli.command, Command::Validate) => {
            log::error!("Config load failed from {}: {}", cli.config.display(), e);
            return Err(e);
        }
        Err(e) => {
            log::warn!(
                "Config load failed from {}: {}. Using defaults.",
                cli.config.display(),
                e
            );
            Config::default()
        }
    };

    if matches!(cli.command, Command::Validate) {
        if let Err(e) = config.validate() {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
        log::info!("Config OK");
        return Ok(());
    }

    let backend: Arc<dyn Backend> = if cli.offline {
        log::info!("Using the in-memory demo library");
        Arc::new(MemoryBackend::demo())
    } else {
        Arc::new(HttpBackend::new(&config.gateway)?)
    };

    let engine = Engine::new(backend, config);
    let session = engine
        .login(&Credentials::new(cli.user.as_str(), cli.password.as_str()))
        .await?;
    log::info!("Signed in as {} ({})", session.user_id(), session.role().as_str());

    let result = run(&engine, cli.command).await;
    if let Err(e) = &result {
        if e.ends_session() {
            log::error!("{e}");
        } else {
            log::error!("{}", e.user_message());
        }
    }
    engine.logout().await?;
    result
}
