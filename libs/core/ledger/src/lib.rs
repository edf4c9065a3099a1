//! Double-entry validation, chain-hash fingerprinting, and trial balance.
//!
//! This crate is pure: it holds no connections and no mutable state. The
//! `Ledger` wrapper in `apps/control-plane` owns the chain mutex and calls
//! through to the functions here for each commit.

pub mod chain;
pub mod decimal;
pub mod reverse;
pub mod trial_balance;
pub mod validate;

pub use chain::{chain_hash, fingerprint, verify_chain, ChainBreak, GENESIS};
pub use decimal::to_money;
pub use reverse::flip_lines;
pub use trial_balance::{trial_balance, KontoBalance, TrialBalance};
pub use validate::{validate_lines, BalanceError};
