use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use stampede_core::PayloadConfig;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const RANDOM_SUFFIX_RANGE: u32 = 100_000;

/// JSON body of `POST /signup`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SignupPayload {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Generates signup bodies for one virtual user.
///
/// Emails combine the wall-clock time with a random draw, plus the VU ordinal and iteration
/// number, which keeps them unique within a run regardless of how many VUs share a
/// millisecond.
#[derive(Debug)]
pub struct PayloadGenerator {
    config: Arc<PayloadConfig>,
    vu: u32,
    rng: SmallRng,
}

impl PayloadGenerator {
    pub fn new(config: Arc<PayloadConfig>, vu: u32) -> Self {
        Self {
            config,
            vu,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(config: Arc<PayloadConfig>, vu: u32, seed: u64) -> Self {
        Self {
            config,
            vu,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn generate(&mut self, iteration: u64) -> SignupPayload {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let random: u32 = self.rng.gen_range(0..RANDOM_SUFFIX_RANGE);

        let email = format!(
            "{}{}-{}-{}-{}@{}",
            self.config.email_prefix,
            millis,
            self.vu,
            iteration,
            random,
            self.config.email_domain
        );

        SignupPayload {
            email,
            first_name: pick(&mut self.rng, &self.config.first_names),
            last_name: pick(&mut self.rng, &self.config.last_names),
        }
    }
}

fn pick(rng: &mut SmallRng, pool: &[String]) -> String {
    // NOTE: Pools are checked to be non-empty when the config is validated.
    pool.choose(rng).cloned().unwrap_or_default()
}
