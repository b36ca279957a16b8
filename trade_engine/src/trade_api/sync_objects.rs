use std::{fmt::Display, ops::AddAssign};

use serde::{Deserialize, Serialize};

/// Outcome of an auto-sell or auto-buy pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Containers or configs processed
    pub entities: usize,
    /// Containers or configs whose sync failed
    pub failed: usize,
    /// Listings or orders created or refreshed
    pub upserted: usize,
    /// Listings or orders deactivated
    pub deactivated: usize,
}

impl AddAssign for SyncSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.entities += rhs.entities;
        self.failed += rhs.failed;
        self.upserted += rhs.upserted;
        self.deactivated += rhs.deactivated;
    }
}

impl Display for SyncSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} processed, {} failed, {} upserted, {} deactivated",
            self.entities, self.failed, self.upserted, self.deactivated
        )
    }
}

/// Outcome of a matching pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillSummary {
    pub orders: usize,
    /// Orders skipped because they were already fully committed
    pub saturated: usize,
    pub failed: usize,
    pub purchases: usize,
    pub quantity: i64,
}

impl Display for FulfillSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} orders, {} already committed, {} failed, {} purchases for {} units",
            self.orders, self.saturated, self.failed, self.purchases, self.quantity
        )
    }
}

/// Outcome of a settlement pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementSummary {
    pub buyers: usize,
    /// Buyers, characters or corporations whose contracts could not be fetched
    pub failed: usize,
    /// Finished item-exchange contracts inspected
    pub contracts_scanned: usize,
    pub completed: usize,
    /// Contracts flagged for manual review
    pub flagged: usize,
}

impl AddAssign for SettlementSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.buyers += rhs.buyers;
        self.failed += rhs.failed;
        self.contracts_scanned += rhs.contracts_scanned;
        self.completed += rhs.completed;
        self.flagged += rhs.flagged;
    }
}

impl Display for SettlementSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buyers, {} fetch failures, {} contracts scanned, {} purchases completed, {} contracts flagged",
            self.buyers, self.failed, self.contracts_scanned, self.completed, self.flagged
        )
    }
}
