//! EVM integration for the x402 payment protocol.
//!
//! - [`contract`] — Minimal ERC-3009 ABI surface (`sol!` bindings)
//! - [`eip712`] — Typed-data construction, signing, and recovery for
//!   `TransferWithAuthorization`
//! - [`provider`] — Per-network chain adapter: lazily-initialized RPC
//!   providers, balance reads, simulation, settlement submission, and
//!   transient-vs-terminal error classification
//! - [`wallet`] — Client-side holder wallet with a self-nonce log

pub mod contract;
pub mod eip712;
pub mod provider;
pub mod wallet;

pub use provider::{ChainError, ChainReader, ChainWriter, RpcEndpoints, SettlementReceipt};
pub use wallet::{HolderWallet, WalletError};
