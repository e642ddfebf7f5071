//! Routes a challenge read to the daily or random cache under one deadline.

use crate::catalogue::CatalogueClient;
use crate::challenge::{CatalogueLayout, ChallengeError, DailyCache, Items, RandomCache};
use crate::store::ChallengeStore;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use ts_rs::TS;

/// Which of the two challenges a visitor is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Mode {
    Daily,
    Random,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Daily => "daily",
            Mode::Random => "random",
        }
    }

    /// Visitors who completed today's challenge get random pages instead.
    ///
    /// `completed_on` is the date the visitor last finished the daily
    /// challenge; it only counts when it is exactly `today`.
    pub fn for_visitor(completed_on: Option<&str>, today: &str) -> Self {
        match completed_on {
            Some(date) if date == today => Mode::Random,
            _ => Mode::Daily,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A served challenge window.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub items: Items,
    pub mode: Mode,
    /// The visitor's calendar date.
    pub date: String,
    /// The server-timezone date keying the daily challenge.
    pub day: String,
}

pub struct ChallengeService {
    daily: DailyCache,
    random: RandomCache,
    deadline: Duration,
    day_timezone: Tz,
}

impl ChallengeService {
    /// `day_timezone` decides when the daily challenge rolls over; visitors'
    /// own timezones never pick which day's items they get.
    pub fn new(
        layout: CatalogueLayout,
        catalogue: Arc<dyn CatalogueClient>,
        store: Option<Arc<dyn ChallengeStore>>,
        deadline: Duration,
        day_timezone: Tz,
    ) -> Self {
        Self::from_caches(
            DailyCache::new(layout, Arc::clone(&catalogue), store),
            RandomCache::new(layout, catalogue),
            deadline,
            day_timezone,
        )
    }

    pub fn from_caches(
        daily: DailyCache,
        random: RandomCache,
        deadline: Duration,
        day_timezone: Tz,
    ) -> Self {
        Self {
            daily,
            random,
            deadline,
            day_timezone,
        }
    }

    pub fn daily(&self) -> &DailyCache {
        &self.daily
    }

    pub fn random(&self) -> &RandomCache {
        &self.random
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn day_timezone(&self) -> Tz {
        self.day_timezone
    }

    /// Serve `mode` for a visitor in `tz`.
    ///
    /// `today` turns a timezone into a date string. The daily challenge is
    /// keyed by today in the service's day timezone, so at most one daily
    /// window exists per server day however many timezones visitors claim.
    /// The visitor's own date is only reported back. The whole read is
    /// bounded by the service deadline; an abandoned read leaves the shared
    /// fetch running for other callers.
    pub async fn read(
        &self,
        mode: Mode,
        tz: Tz,
        today: impl Fn(Tz) -> String,
    ) -> Result<Challenge, ChallengeError> {
        let day = today(self.day_timezone);
        let date = today(tz);
        debug!(%mode, %tz, day = %day, date = %date, "reading challenge");

        let read = async {
            match mode {
                Mode::Daily => self.daily.read(&day).await,
                Mode::Random => self.random.read().await,
            }
        };

        let items = tokio::time::timeout(self.deadline, read)
            .await
            .map_err(|_| ChallengeError::Timeout(self.deadline))??;

        Ok(Challenge {
            items,
            mode,
            date,
            day,
        })
    }
}
