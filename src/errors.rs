use thiserror::Error;

/// Errors the matching core can raise. Every variant maps to a 400 at the
/// transport layer except `UnknownUser`/`SettlementFailure`, which are
/// bug-surface / best-effort-downstream conditions respectively and are
/// never expected to reach a client directly.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("bad input: {0}")]
    BadInput(String),

    #[error("insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: f64, available: f64 },

    #[error("unknown order: {0}")]
    UnknownOrder(u64),

    #[error("unknown user: {0}")]
    UnknownUser(u64),

    #[error("settlement failed: {0}")]
    SettlementFailure(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum MarketMakerError {
    #[error("connection error: {0}")]
    ConnectError(String),
}
