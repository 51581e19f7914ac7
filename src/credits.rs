use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::config::{OverdraftPolicy, BASE_COSTS, DEFAULT_BASE_COST};
use crate::error::ServiceError;
use crate::model::{TestMode, TestType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditAccount {
    pub free_tests: u32,
    pub paid_credits: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditBalance {
    pub free_tests: u32,
    pub paid_credits: i64,
    pub total: i64,
}

impl From<CreditAccount> for CreditBalance {
    fn from(account: CreditAccount) -> Self {
        Self {
            free_tests: account.free_tests,
            paid_credits: account.paid_credits,
            total: i64::from(account.free_tests) + account.paid_credits.max(0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditOutcome {
    pub used_free_test: bool,
    pub credits_charged: u32,
}

/// Base cost per test type identifier. Identifiers missing from the table
/// cost [`DEFAULT_BASE_COST`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTable {
    base_costs: BTreeMap<String, u32>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            base_costs: BASE_COSTS
                .iter()
                .map(|(name, cost)| (name.to_string(), *cost))
                .collect(),
        }
    }
}

impl PricingTable {
    /// Default table with the given entries replaced.
    pub fn with_overrides(overrides: &BTreeMap<String, u32>) -> Self {
        let mut table = Self::default();
        for (name, cost) in overrides {
            table.base_costs.insert(name.to_ascii_lowercase(), *cost);
        }
        table
    }

    pub fn base_cost(&self, test_type: &str) -> u32 {
        self.base_costs
            .get(test_type)
            .copied()
            .unwrap_or(DEFAULT_BASE_COST)
    }

    /// `ceil(base × (1 − discount/100))` in integer arithmetic.
    pub fn price(&self, test_type: TestType, mode: TestMode) -> u32 {
        discounted(self.base_cost(test_type.as_str()), mode.discount_percent())
    }

    pub fn entries(&self) -> &BTreeMap<String, u32> {
        &self.base_costs
    }
}

pub fn discounted(base_cost: u32, discount_percent: u32) -> u32 {
    let keep = u64::from(100u32.saturating_sub(discount_percent));
    // Never above base_cost, so it always fits back into u32.
    let price = (u64::from(base_cost) * keep).div_ceil(100);
    u32::try_from(price).unwrap_or(base_cost)
}

struct LedgerInner {
    account: CreditAccount,
    pricing: PricingTable,
}

/// The process-wide credit account. Check-and-decrement happens under one
/// lock, so concurrent submissions cannot share the last free test.
pub struct CreditLedger {
    inner: Mutex<LedgerInner>,
    overdraft: OverdraftPolicy,
}

impl CreditLedger {
    pub fn new(account: CreditAccount, pricing: PricingTable, overdraft: OverdraftPolicy) -> Self {
        Self {
            inner: Mutex::new(LedgerInner { account, pricing }),
            overdraft,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn overdraft(&self) -> OverdraftPolicy {
        self.overdraft
    }

    pub fn balance(&self) -> CreditBalance {
        self.lock().account.into()
    }

    pub fn quote(&self, test_type: TestType, mode: TestMode) -> u32 {
        self.lock().pricing.price(test_type, mode)
    }

    pub fn pricing(&self) -> PricingTable {
        self.lock().pricing.clone()
    }

    pub fn set_pricing(&self, pricing: PricingTable) {
        self.lock().pricing = pricing;
    }

    /// Consume one free test if any remain, otherwise charge the discounted
    /// price against the paid balance.
    pub fn authorize_and_charge(
        &self,
        test_type: TestType,
        mode: TestMode,
    ) -> Result<CreditOutcome, ServiceError> {
        let mut inner = self.lock();
        let cost = inner.pricing.price(test_type, mode);
        let account = &mut inner.account;

        if account.free_tests > 0 {
            account.free_tests -= 1;
            debug!(
                "Free test consumed for {} ({} remaining)",
                test_type, account.free_tests
            );
            return Ok(CreditOutcome {
                used_free_test: true,
                credits_charged: 0,
            });
        }

        let permitted = match self.overdraft {
            OverdraftPolicy::Reject => account.paid_credits >= i64::from(cost),
            OverdraftPolicy::AllowNegative => account.paid_credits > 0,
        };
        if !permitted {
            return Err(ServiceError::InsufficientCredits {
                free_tests: account.free_tests,
                paid_credits: account.paid_credits,
                required: cost,
            });
        }

        account.paid_credits -= i64::from(cost);
        debug!(
            "Charged {} credits for {} ({}), balance now {}",
            cost, test_type, mode, account.paid_credits
        );
        Ok(CreditOutcome {
            used_free_test: false,
            credits_charged: cost,
        })
    }

    /// Add paid credits to the account.
    pub fn grant(&self, credits: i64) -> CreditBalance {
        let mut inner = self.lock();
        inner.account.paid_credits += credits;
        info!(
            "Granted {} paid credits, balance now {}",
            credits, inner.account.paid_credits
        );
        inner.account.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ledger(free_tests: u32, paid_credits: i64, overdraft: OverdraftPolicy) -> CreditLedger {
        CreditLedger::new(
            CreditAccount {
                free_tests,
                paid_credits,
            },
            PricingTable::default(),
            overdraft,
        )
    }

    #[test]
    fn test_price_examples() {
        let pricing = PricingTable::default();
        assert_eq!(pricing.price(TestType::Web, TestMode::Economy), 6);
        assert_eq!(pricing.price(TestType::Game, TestMode::UltraEconomy), 6);
        assert_eq!(pricing.price(TestType::Api, TestMode::Standard), 5);
        // ceil(5 * 0.4) = 2
        assert_eq!(pricing.price(TestType::Api, TestMode::UltraEconomy), 2);
        // ceil(12 * 0.6) = ceil(7.2) = 8
        assert_eq!(pricing.price(TestType::Mobile, TestMode::Economy), 8);
    }

    #[test]
    fn test_price_table_for_every_pair() {
        let pricing = PricingTable::default();
        // (type, standard, economy, ultra_economy)
        let expected = [
            (TestType::Web, 10, 6, 4),
            (TestType::Document, 8, 5, 4),
            (TestType::Game, 15, 9, 6),
            (TestType::Ai, 12, 8, 5),
            (TestType::Avatar, 10, 6, 4),
            (TestType::Tool, 8, 5, 4),
            (TestType::Api, 5, 3, 2),
            (TestType::Mobile, 12, 8, 5),
        ];
        for (test_type, standard, economy, ultra) in expected {
            assert_eq!(pricing.price(test_type, TestMode::Standard), standard, "{test_type}");
            assert_eq!(pricing.price(test_type, TestMode::Economy), economy, "{test_type}");
            assert_eq!(pricing.price(test_type, TestMode::UltraEconomy), ultra, "{test_type}");
        }
    }

    #[test]
    fn test_unknown_identifier_costs_default() {
        let pricing = PricingTable::default();
        assert_eq!(pricing.base_cost("hologram"), DEFAULT_BASE_COST);
    }

    #[test]
    fn test_overrides_replace_entries() {
        let mut overrides = BTreeMap::new();
        overrides.insert("WEB".to_string(), 20);
        let pricing = PricingTable::with_overrides(&overrides);
        assert_eq!(pricing.price(TestType::Web, TestMode::Economy), 12);
        assert_eq!(pricing.base_cost("game"), 15);
    }

    #[test]
    fn test_large_base_cost_does_not_overflow() {
        assert_eq!(discounted(u32::MAX, 0), u32::MAX);
        assert_eq!(discounted(50_000_000, 40), 30_000_000);

        let mut overrides = BTreeMap::new();
        overrides.insert("web".to_string(), 50_000_000);
        let ledger = CreditLedger::new(
            CreditAccount {
                free_tests: 0,
                paid_credits: 100_000_000,
            },
            PricingTable::with_overrides(&overrides),
            OverdraftPolicy::Reject,
        );
        let outcome = ledger
            .authorize_and_charge(TestType::Web, TestMode::Standard)
            .unwrap();
        assert_eq!(outcome.credits_charged, 50_000_000);
        assert_eq!(ledger.balance().paid_credits, 50_000_000);
    }

    #[test]
    fn test_free_tests_consumed_first() {
        let ledger = ledger(3, 100, OverdraftPolicy::Reject);
        for remaining in (0..3).rev() {
            let outcome = ledger
                .authorize_and_charge(TestType::Game, TestMode::Standard)
                .unwrap();
            assert!(outcome.used_free_test);
            assert_eq!(outcome.credits_charged, 0);
            assert_eq!(ledger.balance().free_tests, remaining);
        }
        assert_eq!(ledger.balance().paid_credits, 100);

        let outcome = ledger
            .authorize_and_charge(TestType::Game, TestMode::Standard)
            .unwrap();
        assert!(!outcome.used_free_test);
        assert_eq!(outcome.credits_charged, 15);
        assert_eq!(ledger.balance().paid_credits, 85);
    }

    #[test]
    fn test_insufficient_when_nothing_left() {
        let ledger = ledger(0, 0, OverdraftPolicy::AllowNegative);
        let err = ledger
            .authorize_and_charge(TestType::Web, TestMode::Standard)
            .unwrap_err();
        match err {
            ServiceError::InsufficientCredits {
                free_tests,
                paid_credits,
                required,
            } => {
                assert_eq!(free_tests, 0);
                assert_eq!(paid_credits, 0);
                assert_eq!(required, 10);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_reject_policy_requires_full_cost() {
        let ledger = ledger(0, 5, OverdraftPolicy::Reject);
        assert!(ledger
            .authorize_and_charge(TestType::Web, TestMode::Standard)
            .is_err());
        // Rejection leaves the balance untouched
        assert_eq!(ledger.balance().paid_credits, 5);
        // ...but a cheaper mode fits
        let outcome = ledger
            .authorize_and_charge(TestType::Web, TestMode::UltraEconomy)
            .unwrap();
        assert_eq!(outcome.credits_charged, 4);
        assert_eq!(ledger.balance().paid_credits, 1);
    }

    #[test]
    fn test_allow_negative_policy_overdraws() {
        let ledger = ledger(0, 5, OverdraftPolicy::AllowNegative);
        let outcome = ledger
            .authorize_and_charge(TestType::Web, TestMode::Standard)
            .unwrap();
        assert_eq!(outcome.credits_charged, 10);
        assert_eq!(ledger.balance().paid_credits, -5);
        assert_eq!(ledger.balance().total, 0);
        assert!(ledger
            .authorize_and_charge(TestType::Api, TestMode::Standard)
            .is_err());
    }

    #[test]
    fn test_grant_adds_paid_credits() {
        let ledger = ledger(0, 0, OverdraftPolicy::Reject);
        let balance = ledger.grant(25);
        assert_eq!(balance.paid_credits, 25);
        assert_eq!(balance.total, 25);
    }

    #[test]
    fn test_concurrent_charges_never_oversubscribe_free_tests() {
        let ledger = Arc::new(ledger(3, 0, OverdraftPolicy::Reject));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    ledger.authorize_and_charge(TestType::Web, TestMode::Standard)
                })
            })
            .collect();

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let free = outcomes
            .iter()
            .filter(|o| matches!(o, Ok(c) if c.used_free_test))
            .count();
        let rejected = outcomes.iter().filter(|o| o.is_err()).count();

        assert_eq!(free, 3);
        assert_eq!(rejected, 13);
        assert_eq!(ledger.balance().free_tests, 0);
        assert_eq!(ledger.balance().paid_credits, 0);
    }
}
