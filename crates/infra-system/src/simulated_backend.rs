// Simulated provisioning backend (demos, load tests)
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use provisio_core::domain::{PlacementCandidate, ResourceHandle, ResourceRequest};
use provisio_core::port::{ProviderError, ProvisioningBackend};

/// Pretends to call the provider
///
/// Each attempt succeeds with probability `success_rate * success_scale`
/// of the candidate region; otherwise it answers like a region with no
/// free capacity. Seeded runs are reproducible.
pub struct SimulatedBackend {
    rng: Mutex<StdRng>,
    success_scale: f64,
    latency: Duration,
}

impl SimulatedBackend {
    pub fn new(seed: Option<u64>, success_scale: f64) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
            success_scale: success_scale.max(0.0),
            latency: Duration::ZERO,
        }
    }

    /// Simulated call duration
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn draw(&self) -> (f64, u64, [u8; 2]) {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        (rng.gen::<f64>(), rng.gen::<u64>(), [rng.gen(), rng.gen()])
    }
}

#[async_trait]
impl ProvisioningBackend for SimulatedBackend {
    async fn launch(
        &self,
        candidate: &PlacementCandidate,
        request: &ResourceRequest,
    ) -> Result<ResourceHandle, ProviderError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let (roll, serial, octets) = self.draw();
        let threshold = (candidate.success_rate * self.success_scale).min(1.0);
        debug!(region = %candidate.region, roll, threshold, "Simulated capacity draw");

        if roll >= threshold {
            return Err(ProviderError::out_of_capacity());
        }

        let mut handle = ResourceHandle::new(
            format!("ocid1.instance.oc1.{}.sim{:016x}", candidate.region, serial),
            candidate.region.clone(),
            request.display_name.clone(),
        );
        handle.private_ip = Some(format!("10.0.{}.{}", octets[0], octets[1].max(2)));
        Ok(handle)
    }
}
