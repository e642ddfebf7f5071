//! Application state shared across request handlers.

use crate::challenge::ChallengeService;
use chrono_tz::Tz;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub challenge: Arc<ChallengeService>,
    /// Timezone for visitors who send none.
    pub default_timezone: Tz,
}

impl AppState {
    pub fn new(challenge: Arc<ChallengeService>, default_timezone: Tz) -> Self {
        Self {
            challenge,
            default_timezone,
        }
    }
}
