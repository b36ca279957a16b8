//! # Trade worker
//! Runs the reconciliation passes of the trade engine on independent timers:
//! * auto-sell: container contents to listings,
//! * auto-buy: stockpile deficits to buy orders,
//! * auto-fulfill: buy orders matched against listings,
//! * contract sync: finished in-game contracts settle purchases,
//! * outbox: re-delivery of purchase notifications.
//!
//! ## Configuration
//! The worker is configured via environment variables. See [config](config/index.html) for more information.
pub mod cli;
pub mod config;
pub mod errors;
pub mod integrations;
pub mod worker;
pub mod workers;
