// Copyright (c) James Kassemi, SC, US. All rights reserved.
mod config;

use std::{
    env, process,
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread,
    time::Duration,
};

use chrono::{Days, Utc};
use core_types::status::{ServiceStatusHandle, ServiceStatusReporter};
use engine_api::{Engine, EngineError};
use expiry_engine::ExpiryEngine;
use log::{error, info, warn};
use raffle_ledger::{Amount, LedgerError, RaffleDraft, ReservationLedger};
use raffle_service::{AdminConsole, AuthService, LocalAuth, PurchaseFlow, ServiceError};
use thiserror::Error;

use crate::config::{ConfigError, Environment, RuntimeConfig};

const DEMO_TICKET_PRICE_UNITS: u64 = 2;
const DEMO_DRAW_IN_DAYS: u64 = 30;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        error!("rifa failed: {err}");
        eprintln!("rifa failed: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let config = {
        let env = parse_environment()?;
        RuntimeConfig::load(env)?
    };

    let ledger = Arc::new(ReservationLedger::bootstrap(config.ledger.clone())?);
    let auth = Arc::new(LocalAuth::from_settings(&config.admin));
    let admin = AdminConsole::new(Arc::clone(&ledger), auth.clone());
    let buyer = PurchaseFlow::new(Arc::clone(&ledger));

    match config.ledger.state_dir() {
        Some(dir) => info!(
            "rifa booted in {:?} mode; reservations persisted under {}",
            config.env,
            dir.display()
        ),
        None => info!(
            "rifa booted in {:?} mode; reservations kept in memory",
            config.env
        ),
    }
    info!(
        "hold window {:?}; sweep interval {:?}",
        config.ledger.hold_duration, config.sweeper.interval
    );

    if config.seed_demo_raffle {
        seed_demo_raffle(&config, auth.as_ref(), &admin)?;
    }
    match buyer.board()?.raffle {
        Some(raffle) => info!(
            "active raffle {} '{}' draws on {} at {} per number",
            raffle.id, raffle.name, raffle.draw_date, raffle.ticket_price
        ),
        None => warn!("no active raffle; sign in as admin to create one"),
    }

    let sweeper_status = ServiceStatusHandle::new("expiry");
    let sweeper = ExpiryEngine::new(
        config.sweeper.clone(),
        Arc::clone(&ledger),
        sweeper_status.clone(),
    );
    sweeper.start()?;
    log_engine(&sweeper);

    println!("rifa is running; press Ctrl+C to shut down.");
    let status_logger = BoardStatusLogger::spawn(
        Arc::clone(&ledger),
        vec![sweeper_status],
        config.status_interval,
    );
    wait_for_shutdown_signal()?;
    info!("shutdown signal received; stopping the {} sweeper", config.env_label());
    status_logger.shutdown();
    sweeper.stop()?;
    Ok(())
}

fn parse_environment() -> Result<Environment, AppError> {
    let arg = env::args().nth(1).ok_or(AppError::Usage)?;
    Environment::from_str(&arg).map_err(AppError::from)
}

/// Creates a full-board raffle through the admin console when none is active.
fn seed_demo_raffle(
    config: &RuntimeConfig,
    auth: &dyn AuthService,
    admin: &AdminConsole,
) -> Result<(), AppError> {
    let session = auth.sign_in(&config.admin.username, &config.admin.password)?;
    let result = match admin.raffle(&session.token) {
        Ok(_) => Ok(()),
        Err(ServiceError::NoActiveRaffle) => {
            let draw_date = Utc::now()
                .date_naive()
                .checked_add_days(Days::new(DEMO_DRAW_IN_DAYS))
                .unwrap_or_else(|| Utc::now().date_naive());
            let mut draft = RaffleDraft::new(
                "Demo raffle",
                draw_date,
                Amount::from_units(DEMO_TICKET_PRICE_UNITS),
            );
            draft.prize_description = "Demo prize".to_string();
            admin
                .create_raffle(&session.token, draft)
                .map(|raffle| info!("seeded demo raffle {}", raffle.id))
        }
        Err(err) => Err(err),
    };
    auth.sign_out(&session.token);
    result.map_err(AppError::from)
}

#[derive(Debug, Error)]
enum AppError {
    #[error("usage: rifa <dev|prod>")]
    Usage,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Auth(#[from] raffle_service::AuthError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error("failed while waiting for shutdown signal: {0}")]
    ShutdownWait(#[from] mpsc::RecvError),
}

fn wait_for_shutdown_signal() -> Result<(), AppError> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })?;
    rx.recv()?;
    Ok(())
}

fn log_engine(engine: &dyn Engine) {
    let description = engine.describe();
    let health = engine.health();
    info!(
        "{} status: {health}{}",
        description.name,
        description
            .notes
            .map(|notes| format!(" - {notes}"))
            .unwrap_or_default()
    );
}

/// Periodically logs the board summary and every registered service status.
struct BoardStatusLogger {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl BoardStatusLogger {
    fn spawn(
        ledger: Arc<ReservationLedger>,
        reporters: Vec<ServiceStatusHandle>,
        interval: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            while !stop_clone.load(Ordering::Relaxed) {
                match ledger.board() {
                    Ok(board) => info!("{}", board.summary()),
                    Err(err) => warn!("failed to resolve board: {err}"),
                }
                for reporter in &reporters {
                    info!("{}", reporter.status());
                }
                if stop_clone.load(Ordering::Relaxed) {
                    break;
                }
                sleep_with_stop(&stop_clone, interval);
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    fn shutdown(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for BoardStatusLogger {
    fn drop(&mut self) {
        self.halt();
    }
}

fn sleep_with_stop(stop: &AtomicBool, interval: Duration) {
    let mut remaining = interval;
    const STEP: Duration = Duration::from_millis(500);
    while remaining > Duration::ZERO {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        let sleep_for = remaining.min(STEP);
        thread::sleep(sleep_for);
        remaining = remaining.saturating_sub(sleep_for);
    }
}
