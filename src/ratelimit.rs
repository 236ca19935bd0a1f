use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::time::Duration;

/// Lets at most one caller through per period. Stands in for the fixed
/// sleeps between scrapes so the first request of a run goes out right away.
pub struct Throttle {
    limiter: Option<DefaultDirectRateLimiter>,
}

impl Throttle {
    pub fn new(period: Duration) -> Self {
        // A zero period has no quota; treat it as unthrottled.
        let limiter = Quota::with_period(period).map(RateLimiter::direct);
        Throttle { limiter }
    }

    pub async fn wait_until_ready(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn first_call_is_immediate() {
        let throttle = Throttle::new(Duration::from_secs(60));
        let started = Instant::now();
        throttle.wait_until_ready().await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn second_call_waits_for_period() {
        let throttle = Throttle::new(Duration::from_millis(200));
        throttle.wait_until_ready().await;
        let started = Instant::now();
        throttle.wait_until_ready().await;
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn zero_period_never_waits() {
        let throttle = Throttle::new(Duration::ZERO);
        let started = Instant::now();
        for _ in 0..10 {
            throttle.wait_until_ready().await;
        }
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
