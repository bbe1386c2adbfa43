use crate::types::BackoffStrategy;

/// A classification of the HTTP response that scales the base delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseHint {
    /// HTTP 429 Too Many Requests.
    RateLimited,
    /// Any 5xx.
    ServerError,
    /// Everything else (connect/timeout errors, unknown).
    Other,
}

impl ResponseHint {
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => ResponseHint::RateLimited,
            500..=599 => ResponseHint::ServerError,
            _ => ResponseHint::Other,
        }
    }

    fn multiplier(self) -> f64 {
        match self {
            ResponseHint::RateLimited => 2.0,
            ResponseHint::ServerError => 1.5,
            ResponseHint::Other => 1.0,
        }
    }
}

/// Pure function: retry index + config -> next-attempt delay, in whole
/// seconds, clamped to `[1, max]`.
///
/// - `fixed`: `initial`
/// - `linear`: `min(initial * (1 + retry_index), max)`
/// - `exponential`: `min(initial * factor^retry_index, max)`
///
/// An unrecognized strategy can't occur through `BackoffStrategy` (the enum
/// is exhaustive), but backends that round-trip through a string column may
/// fail to parse one; callers should fall back to
/// `BackoffStrategy::Exponential` with `factor = 2.0` and log it once, per
/// the design.
pub fn delay(
    strategy: BackoffStrategy,
    initial_s: u64,
    factor: f64,
    max_s: u64,
    retry_index: u32,
    hint: ResponseHint,
) -> u64 {
    let base = match strategy {
        BackoffStrategy::Fixed => initial_s as f64,
        BackoffStrategy::Linear => {
            let scaled = initial_s as f64 * (1.0 + retry_index as f64);
            scaled.min(max_s as f64)
        }
        BackoffStrategy::Exponential => {
            let scaled = initial_s as f64 * factor.powi(retry_index as i32);
            scaled.min(max_s as f64)
        }
    };

    let scaled = base * hint.multiplier();
    let clamped = scaled.min(max_s as f64).max(1.0);
    clamped.round() as u64
}

/// Sum of `delay(...)` over `0..max_retries`, an estimate of the total
/// retry horizon for a webhook's current configuration.
pub fn estimated_retry_horizon_s(
    strategy: BackoffStrategy,
    initial_s: u64,
    factor: f64,
    max_s: u64,
    max_retries: u32,
) -> u64 {
    (0..max_retries)
        .map(|i| delay(strategy, initial_s, factor, max_s, i, ResponseHint::Other))
        .sum()
}
