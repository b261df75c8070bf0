//! Error classification used to decide how far a failure propagates.

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    ProviderConnection,
    ToolDispatch,
    ToolExecution,
    Ranking,
    Summarization,
    Completion,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Serialization,
    Unknown,
}

/// How far an error is allowed to travel before it is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorImpact {
    /// Stops startup; nothing can proceed without fixing the cause.
    Fatal,
    /// Fails the current turn; the session stays usable for the next one.
    TurnFatal,
    /// Handled locally: fed back to the model or downgraded to a fallback.
    Recoverable,
}
