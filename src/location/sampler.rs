use std::time::Duration;

use log::{debug, warn};
use tokio::time::{sleep, timeout};

use crate::location::{AccuracyHint, GeoPoint, LocationError, LocationProvider};

pub const DEFAULT_SAMPLES: usize = 1;
pub const DEFAULT_FIX_TIMEOUT: Duration = Duration::from_secs(10);

/// Collects a batch of fixes, one after the other.
#[derive(Debug, Clone)]
pub struct Sampler {
    pub samples: usize,
    /// Pause between consecutive fixes
    pub delay: Duration,
    pub fix_timeout: Duration,
    pub hint: AccuracyHint,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            samples: DEFAULT_SAMPLES,
            delay: Duration::ZERO,
            fix_timeout: DEFAULT_FIX_TIMEOUT,
            hint: AccuracyHint::default(),
        }
    }
}

impl Sampler {
    /// Requests `samples` fixes. Failed or timed out fixes are logged and
    /// skipped, so the result may be shorter than asked for, or empty.
    pub async fn acquire<P: LocationProvider>(&self, provider: &mut P) -> Vec<GeoPoint> {
        let mut fixes = Vec::with_capacity(self.samples);

        for i in 0..self.samples {
            match self.fix(provider).await {
                Ok(fix) => {
                    debug!(
                        "Sample {}: ({:.6}, {:.6}) accuracy {:?}",
                        i + 1,
                        fix.latitude,
                        fix.longitude,
                        fix.accuracy
                    );
                    fixes.push(fix);
                }
                Err(e) => warn!("Sample {} failed: {}", i + 1, e),
            }

            if i + 1 < self.samples && !self.delay.is_zero() {
                sleep(self.delay).await;
            }
        }

        fixes
    }

    async fn fix<P: LocationProvider>(&self, provider: &mut P) -> Result<GeoPoint, LocationError> {
        timeout(self.fix_timeout, provider.current_fix(self.hint))
            .await
            .map_err(|_| LocationError::Timeout(self.fix_timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{Permission, ReplayProvider};

    struct StalledProvider;

    impl LocationProvider for StalledProvider {
        async fn request_permission(&mut self) -> Permission {
            Permission::Granted
        }

        async fn current_fix(&mut self, _hint: AccuracyHint) -> Result<GeoPoint, LocationError> {
            sleep(Duration::from_secs(5)).await;
            Ok(GeoPoint::new(0.0, 0.0))
        }
    }

    #[tokio::test]
    async fn test_acquires_requested_count() {
        let mut provider = ReplayProvider::new(vec![
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(2.0, 2.0),
            GeoPoint::new(3.0, 3.0),
        ]);
        let sampler = Sampler {
            samples: 2,
            delay: Duration::from_millis(1),
            ..Sampler::default()
        };
        let fixes = sampler.acquire(&mut provider).await;
        assert_eq!(fixes.len(), 2);
        assert_eq!(provider.remaining(), 1);
    }

    #[tokio::test]
    async fn test_failed_fixes_are_skipped() {
        let mut provider = ReplayProvider::new(vec![GeoPoint::new(1.0, 1.0)]);
        let sampler = Sampler {
            samples: 3,
            ..Sampler::default()
        };
        let fixes = sampler.acquire(&mut provider).await;
        assert_eq!(fixes.len(), 1);
    }

    #[tokio::test]
    async fn test_timed_out_acquisition_returns_empty() {
        let sampler = Sampler {
            samples: 2,
            fix_timeout: Duration::from_millis(20),
            ..Sampler::default()
        };
        let fixes = sampler.acquire(&mut StalledProvider).await;
        assert!(fixes.is_empty());
    }
}
