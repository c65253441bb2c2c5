//! Stride Engine - Points ledger and redemption engine.
//!
//! This crate is the transactional core of Stride Rewards. It computes
//! spendable balances, validates daily step earnings exactly once, and
//! executes every balance-changing operation with all-or-nothing semantics:
//!
//! - [`balance::BalanceAccessor`] - derived available/cumulative balances
//! - [`steps::StepValidator`] - once-per-day earning from step counts
//! - [`checkout::RedemptionTransaction`] - multi-seller basket checkout
//! - [`transfer::TransferWorkflow`] - two-phase peer gifting
//! - [`donation::DonationPool`] - pooled donations toward campaign goals
//! - [`grant::AdminGrant`] - audited administrative issuance
//!
//! # Architecture
//!
//! The engine talks to persistence through the [`store::LedgerStore`] trait.
//! Each commit method on the store is one atomic unit: it re-evaluates its
//! conditional preconditions (balance sufficiency, stock sufficiency,
//! not-already-validated) against current state and either fully commits or
//! leaves no effect. Services validate shape and policy above the store and
//! never trust a balance read taken outside the committing unit.
//!
//! [`engine::Engine`] is the facade the API layer consumes; it wires the
//! services to one store, a [`clock::Clock`], and the change-notification
//! signal in [`notify`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod balance;
pub mod checkout;
pub mod clock;
pub mod donation;
pub mod engine;
pub mod error;
pub mod grant;
pub mod notify;
pub mod steps;
pub mod store;
pub mod transfer;

pub use balance::Balance;
pub use checkout::{BasketLine, CheckoutOutcome};
pub use donation::DonationOutcome;
pub use engine::Engine;
pub use error::{EngineError, Entity};
pub use notify::ChangeNotifier;
pub use store::LedgerStore;
pub use store::memory::MemoryStore;
