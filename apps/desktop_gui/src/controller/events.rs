//! UI/backend events and error modeling for the desktop GUI.

use chrono::{DateTime, Utc};
use mint_flow::MintFlowSnapshot;
use shared::domain::{Address, TokenId, TxHash};

pub enum UiEvent {
    BackendReady,
    Snapshot(MintFlowSnapshot),
    CountUpdated {
        minted: u64,
    },
    MintSubmitted {
        tx_hash: TxHash,
    },
    MintConfirmed {
        tx_hash: TxHash,
        explorer_url: String,
    },
    MintObserved {
        minter: Address,
        token_id: TokenId,
        marketplace_url: String,
        observed_at: DateTime<Utc>,
    },
    Info(String),
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Wallet,
    Network,
    Validation,
    Transport,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    Connect,
    Mint,
    General,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        let category = if lower.contains("wallet")
            || lower.contains("account")
            || lower.contains("rejected")
        {
            UiErrorCategory::Wallet
        } else if lower.contains("chain") || lower.contains("network") {
            UiErrorCategory::Network
        } else if lower.contains("doodle") || lower.contains("missing") || lower.contains("invalid")
        {
            UiErrorCategory::Validation
        } else if lower.contains("transport")
            || lower.contains("connection")
            || lower.contains("timed out")
            || lower.contains("timeout")
            || lower.contains("unreachable")
            || lower.contains("unavailable")
        {
            UiErrorCategory::Transport
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub fn err_label(category: UiErrorCategory) -> &'static str {
    match category {
        UiErrorCategory::Wallet => "Wallet",
        UiErrorCategory::Network => "Network",
        UiErrorCategory::Validation => "Input",
        UiErrorCategory::Transport => "Transport",
        UiErrorCategory::Unknown => "Unexpected",
    }
}
