// ===============================
// src/ratelimit.rs
// ===============================
//
// Fixed-window throttle for outbound API calls. Both accounts sit behind the
// same platform limit, so a single gate instance is shared by every call
// site. The gate only ever delays, it never fails.
//
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

/// Platform request budget per wall-clock second.
pub const CALLS_PER_SECOND: u32 = 4;

#[derive(Debug)]
struct Window {
    started: Instant,
    calls: u32,
}

#[derive(Debug)]
pub struct RateGate {
    budget: u32,
    window: Mutex<Window>,
}

impl RateGate {
    pub fn new(budget: u32) -> Self {
        Self {
            budget,
            window: Mutex::new(Window {
                started: Instant::now(),
                calls: 0,
            }),
        }
    }

    /// Waits until the current one-second window has budget left.
    ///
    /// The window lock is held across the sleep, so concurrent callers are
    /// serialized and the per-second budget holds even if call sites are ever
    /// parallelized.
    pub async fn acquire(&self) {
        let mut window = self.window.lock().await;
        let now = Instant::now();
        if now.duration_since(window.started) >= Duration::from_secs(1) {
            window.started = now;
            window.calls = 0;
        }
        if window.calls >= self.budget {
            let wait = Duration::from_secs(1).saturating_sub(now.duration_since(window.started));
            sleep(wait).await;
            window.started = Instant::now();
            window.calls = 0;
        }
        window.calls += 1;
    }
}
