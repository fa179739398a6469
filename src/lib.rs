//! Pooled-betting ledger for the lotto-cli toolchain.
//!
//! The crate is built from four small, focused modules:
//!
//! * [`token`] — the credit issuer: converts base currency into fungible
//!   credits at a fixed ratio and tracks per-holder balances and allowances.
//! * [`lottery`] — the round ledger: the open → stake → close → settle state
//!   machine with its prize pool, operator pool, and per-winner payables.
//! * [`entropy`] — the injected randomness capability used for winner
//!   selection, so tests can substitute a deterministic source.
//! * [`receipt`] — operator-signed round receipts so anyone can audit a
//!   settled round offline.
//!
//! The CLI in `main.rs` and the simulation bin combine these without any
//! ambient global state: one [`lottery::Lottery`] value is constructed,
//! operated on, and serialized back to disk.

pub mod entropy;
pub mod lottery;
pub mod receipt;
pub mod token;
