//! Bounded-retry submission over the gateway's flow-controlled request API.

use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Flow-control return codes: the request queue is busy but will recover.
const FLOW_CONTROL_CODES: [i32; 2] = [-2, -3];

/// Convenience alias for adapter results.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failures surfaced by the request adapter.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway kept reporting flow control past the retry budget.
    #[error("gateway flow control persisted after {attempts} attempts")]
    FlowControl { attempts: u32 },
    /// The gateway rejected the request outright.
    #[error("gateway rejected request with code {0}")]
    Rejected(i32),
}

/// Retry tuning for flow-controlled submissions. Policy, not protocol.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Pause between attempts while the gateway reports backpressure.
    pub delay: Duration,
    /// Total attempts before giving up.
    pub attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(100),
            attempts: 5,
        }
    }
}

/// Drive `send` until the gateway accepts it or the policy is exhausted.
///
/// `send` queues one request and returns the gateway's numeric code. The
/// pause between flow-control retries is the engine's only suspension
/// point; every other operation completes without blocking.
pub fn submit<F>(policy: &RetryPolicy, mut send: F) -> GatewayResult<()>
where
    F: FnMut() -> i32,
{
    let mut attempt = 0;
    loop {
        let code = send();
        if code == 0 {
            return Ok(());
        }
        if FLOW_CONTROL_CODES.contains(&code) {
            attempt += 1;
            if attempt >= policy.attempts {
                warn!(attempts = attempt, "gateway flow control exhausted retry budget");
                return Err(GatewayError::FlowControl { attempts: attempt });
            }
            debug!(code, attempt, "gateway flow control, retrying");
            thread::sleep(policy.delay);
            continue;
        }
        return Err(GatewayError::Rejected(code));
    }
}
