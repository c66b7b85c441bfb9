use thiserror::Error;

/// Error taxonomy for the simulation engine and its financial primitives.
///
/// `OutstandingDebt` is the only variant that is always fatal for a run —
/// every other variant is routinely caught and logged by reference agent
/// strategies (see `crate::agent`).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("amount must be positive, got {0}")]
    BadAmount(f64),

    #[error("wallet `{wallet}` has insufficient {token} balance: has {have}, needs {need}")]
    InsufficientBalance {
        wallet: String,
        token: String,
        have: f64,
        need: f64,
    },

    #[error("{venue} has insufficient {token} reserve: has {have}, needs {need}")]
    InsufficientReserve {
        venue: String,
        token: String,
        have: f64,
        need: f64,
    },

    #[error("pool `{0}` is empty")]
    EmptyPool(String),

    #[error("PSM operation `{op}` invalid at block {block} (expiry at {expiry})")]
    WrongPhase {
        op: String,
        block: u64,
        expiry: u64,
    },

    #[error("vault has insufficient liquidity to complete the routine")]
    InsufficientLiquidity,

    #[error("cannot repay {amount} {token}: only {borrowed} outstanding for `{wallet}`")]
    OverRepay {
        wallet: String,
        token: String,
        amount: f64,
        borrowed: f64,
    },

    #[error("end-of-block {block}: outstanding debt remains (eth={eth}, tokens={tokens:?})")]
    OutstandingDebt {
        block: u64,
        eth: f64,
        tokens: Vec<(String, f64)>,
    },

    #[error("unknown token symbol `{0}`")]
    UnknownToken(String),

    #[error("unknown wallet id {0:?}")]
    UnknownWallet(crate::wallet::WalletId),
}

pub type SimResult<T> = Result<T, SimError>;
