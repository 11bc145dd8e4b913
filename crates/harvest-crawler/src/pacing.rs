use harvest_core::CrawlPolicy;
use rand::Rng;
use std::time::Duration;

/// Human-like pauses: a random delay after each newly stored listing and a
/// fixed pause between categories.
#[derive(Debug, Clone)]
pub struct Pacer {
    item_min: Duration,
    item_max: Duration,
    category_pause: Duration,
}

impl Pacer {
    pub fn from_policy(policy: &CrawlPolicy) -> Self {
        let min = policy.item_delay_min_ms.min(policy.item_delay_max_ms);
        let max = policy.item_delay_min_ms.max(policy.item_delay_max_ms);
        Self {
            item_min: Duration::from_millis(min),
            item_max: Duration::from_millis(max),
            category_pause: Duration::from_millis(policy.category_pause_ms),
        }
    }

    /// No pauses at all.
    pub fn none() -> Self {
        Self {
            item_min: Duration::ZERO,
            item_max: Duration::ZERO,
            category_pause: Duration::ZERO,
        }
    }

    pub fn item_delay(&self) -> Duration {
        if self.item_max <= self.item_min {
            return self.item_min;
        }
        rand::thread_rng().gen_range(self.item_min..=self.item_max)
    }

    pub async fn after_new_listing(&self) {
        let delay = self.item_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    pub async fn between_categories(&self) {
        if !self.category_pause.is_zero() {
            tracing::debug!("Pausing {:?} before next category", self.category_pause);
            tokio::time::sleep(self.category_pause).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_delay_within_bounds() {
        let pacer = Pacer::from_policy(&CrawlPolicy::default());
        for _ in 0..100 {
            let d = pacer.item_delay();
            assert!(d >= Duration::from_millis(2000));
            assert!(d <= Duration::from_millis(5000));
        }
    }

    #[test]
    fn test_swapped_bounds_are_normalized() {
        let policy = CrawlPolicy {
            item_delay_min_ms: 900,
            item_delay_max_ms: 100,
            ..CrawlPolicy::default()
        };
        let d = Pacer::from_policy(&policy).item_delay();
        assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_category_pause_sleeps() {
        let pacer = Pacer::from_policy(&CrawlPolicy::default());
        let start = tokio::time::Instant::now();
        pacer.between_categories().await;
        assert!(start.elapsed() >= Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_listing_delay_sleeps() {
        let pacer = Pacer::from_policy(&CrawlPolicy::default());
        let start = tokio::time::Instant::now();
        for _ in 0..3 {
            pacer.after_new_listing().await;
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3 * 2000));
        assert!(elapsed <= Duration::from_millis(3 * 5000));
    }

    #[test]
    fn test_none_is_zero() {
        assert!(Pacer::none().item_delay().is_zero());
    }
}
