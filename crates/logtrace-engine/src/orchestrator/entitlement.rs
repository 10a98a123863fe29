use crate::clock::Clock;
use crate::config::CreditsConfig;
use crate::storage::{self, CREDITS_KEY, StorageAdapter};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, error, warn};

/// Authentication, subscription and credit queries. The orchestrator treats
/// the answers as opaque gates.
#[async_trait(?Send)]
pub trait EntitlementService {
    async fn is_authenticated(&self) -> bool;
    async fn is_premium(&self) -> bool;
    /// Consumes one credit. Returns `false` when none are left.
    async fn consume_credit(&self) -> bool;
}

/// What is persisted under [`CREDITS_KEY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditUsage {
    pub date: NaiveDate,
    pub used: u32,
}

/// Credits with a daily allowance that resets when the UTC date changes.
/// With storage attached the day's usage survives a restart.
pub struct DailyCreditLedger {
    allowance: u32,
    authenticated: bool,
    premium: bool,
    clock: Rc<dyn Clock>,
    storage: Option<Rc<dyn StorageAdapter>>,
    used: RefCell<CreditUsage>,
}

impl DailyCreditLedger {
    /// In-memory only.
    pub fn new(config: &CreditsConfig, clock: Rc<dyn Clock>) -> Self {
        let date = clock.now_utc().date_naive();
        Self {
            allowance: config.daily_allowance,
            authenticated: config.authenticated,
            premium: config.premium,
            clock,
            storage: None,
            used: RefCell::new(CreditUsage { date, used: 0 }),
        }
    }

    /// Restores today's usage from storage and saves every consumed credit
    /// back. Missing, unreadable or stale usage starts the day at zero.
    pub async fn load(
        config: &CreditsConfig,
        clock: Rc<dyn Clock>,
        storage: Rc<dyn StorageAdapter>,
    ) -> Self {
        let saved = match storage.get(CREDITS_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<CreditUsage>(&raw) {
                Ok(usage) => Some(usage),
                Err(e) => {
                    warn!(error = %e, "saved credit usage unreadable, starting at zero");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "credit usage load failed, starting at zero");
                None
            }
        };

        let mut ledger = Self::new(config, clock);
        if let Some(usage) = saved {
            ledger.used = RefCell::new(usage);
        }
        ledger.storage = Some(storage);
        ledger.roll_over();
        ledger
    }

    /// Credits left today.
    pub fn remaining(&self) -> u32 {
        self.roll_over();
        self.allowance.saturating_sub(self.used.borrow().used)
    }

    pub fn allowance(&self) -> u32 {
        self.allowance
    }

    fn roll_over(&self) {
        let today = self.clock.now_utc().date_naive();
        let mut usage = self.used.borrow_mut();
        if usage.date != today {
            debug!(%today, "credit allowance reset");
            *usage = CreditUsage {
                date: today,
                used: 0,
            };
        }
    }

    async fn persist(&self, usage: CreditUsage) {
        let Some(storage) = &self.storage else {
            return;
        };
        match serde_json::to_string(&usage) {
            Ok(raw) => {
                storage::save_with_retry(storage.as_ref(), self.clock.as_ref(), CREDITS_KEY, &raw)
                    .await;
            }
            Err(e) => error!(error = %e, "credit usage serialization failed"),
        }
    }
}

#[async_trait(?Send)]
impl EntitlementService for DailyCreditLedger {
    async fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    async fn is_premium(&self) -> bool {
        self.premium
    }

    async fn consume_credit(&self) -> bool {
        self.roll_over();
        let usage = {
            let mut usage = self.used.borrow_mut();
            if usage.used >= self.allowance {
                return false;
            }
            usage.used += 1;
            *usage
        };
        self.persist(usage).await;
        true
    }
}
