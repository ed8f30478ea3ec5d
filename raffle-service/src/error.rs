use raffle_ledger::{LedgerError, NumberStatus, TicketNumber, number::format_numbers};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("session is not valid")]
    InvalidSession,
    #[error("no recovery e-mail configured")]
    NoRecoveryEmail,
    #[error("rejected credentials: {reason}")]
    RejectedCredentials { reason: String },
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("admin session required")]
    Unauthorized,
    #[error("no active raffle")]
    NoActiveRaffle,
    #[error("number {number} is {status}")]
    NumberUnavailable {
        number: TicketNumber,
        status: NumberStatus,
    },
}

impl ServiceError {
    /// Text shown to the person who triggered the operation.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Ledger(err) => ledger_message(err),
            ServiceError::Auth(AuthError::InvalidCredentials) => {
                "Incorrect username or password.".to_string()
            }
            ServiceError::Auth(AuthError::InvalidSession) | ServiceError::Unauthorized => {
                "Please sign in as the administrator to continue.".to_string()
            }
            ServiceError::Auth(AuthError::NoRecoveryEmail) => {
                "Password recovery is not configured.".to_string()
            }
            ServiceError::Auth(AuthError::RejectedCredentials { reason }) => reason.clone(),
            ServiceError::NoActiveRaffle => "There is no raffle on sale right now.".to_string(),
            ServiceError::NumberUnavailable { number, .. } => {
                format!("Number {number} is not available.")
            }
        }
    }
}

fn ledger_message(err: &LedgerError) -> String {
    match err {
        LedgerError::InvalidRequest { reason } => capitalize(reason),
        LedgerError::Conflict { numbers } => format!(
            "Numbers {} were just taken by someone else. Refresh the board and choose again.",
            format_numbers(numbers)
        ),
        LedgerError::NotFound { .. } => {
            "This purchase was already removed. Refresh to see the current state.".to_string()
        }
        LedgerError::InvalidState { status, .. } => {
            format!("This purchase is already {status}. Refresh to see the current state.")
        }
        LedgerError::Expired { .. } => {
            "Your hold expired and the numbers were released. Select them again.".to_string()
        }
        LedgerError::Infrastructure(_) => "Something went wrong. Please try again.".to_string(),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>() + ".",
        None => String::new(),
    }
}
