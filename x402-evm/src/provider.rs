//! Per-network chain adapter.
//!
//! Providers are lazily initialized on first use for a network and then
//! cached as read-only handles. The reader side serves balance queries
//! for the verifier; the writer side owns the facilitator's operating
//! key and performs simulation, settlement submission, and receipt
//! polling for the settler.

use std::collections::HashMap;
use std::time::Duration;

use alloy_network::EthereumWallet;
use alloy_primitives::{Address, B256, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_signer_local::PrivateKeySigner;
use alloy_transport::TransportError;
use parking_lot::Mutex;
use url::Url;

use x402::proto::Authorization;
use x402::Network;

use crate::contract::IEIP3009;

/// Chain-side failures, classified for the retry machinery.
///
/// Transient failures (timeouts, connection errors, 5xx from the RPC)
/// are retryable. Structural failures (reverts, a consumed nonce at the
/// token contract) are terminal. A receipt timeout after broadcast is
/// terminal too: retrying would double-submit, and the chain will
/// finalize the transaction whether we wait or not.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    /// RPC transport failure (timeout, connection refused, 5xx).
    #[error("transient rpc failure: {0}")]
    Transport(String),
    /// The node rejected the call (revert, invalid opcode, nonce used).
    #[error("execution reverted: {0}")]
    Reverted(String),
    /// The transaction was mined but its status is failure.
    #[error("transaction {0} reverted on-chain")]
    TransactionFailed(B256),
    /// The transaction was broadcast but the receipt did not arrive in time.
    #[error("receipt wait for {tx_hash} failed: {message}")]
    ReceiptTimeout {
        /// Hash of the broadcast transaction.
        tx_hash: B256,
        /// Underlying error text.
        message: String,
    },
}

impl ChainError {
    /// Whether the retry machinery may re-attempt after this failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// The broadcast transaction hash, when one exists.
    #[must_use]
    pub const fn tx_hash(&self) -> Option<B256> {
        match self {
            Self::TransactionFailed(hash) | Self::ReceiptTimeout { tx_hash: hash, .. } => {
                Some(*hash)
            }
            _ => None,
        }
    }
}

impl From<alloy_contract::Error> for ChainError {
    fn from(err: alloy_contract::Error) -> Self {
        match err {
            alloy_contract::Error::TransportError(TransportError::ErrorResp(payload)) => {
                Self::Reverted(payload.message.to_string())
            }
            alloy_contract::Error::TransportError(other) => Self::Transport(other.to_string()),
            other => Self::Reverted(other.to_string()),
        }
    }
}

/// Per-network RPC endpoint resolution: explicit override, then
/// `RPC_URL_<NETWORK_ID>` from the environment, then the network default.
#[derive(Debug, Clone, Default)]
pub struct RpcEndpoints {
    overrides: HashMap<Network, Url>,
}

impl RpcEndpoints {
    /// Endpoints with no overrides (environment and defaults only).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `RPC_URL_*` overrides from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let mut overrides = HashMap::new();
        for network in Network::ALL {
            if let Ok(raw) = std::env::var(network.rpc_env_key()) {
                match raw.parse::<Url>() {
                    Ok(url) => {
                        overrides.insert(network, url);
                    }
                    Err(e) => {
                        tracing::warn!(network = %network, "ignoring invalid RPC override: {e}");
                    }
                }
            }
        }
        Self { overrides }
    }

    /// Adds an explicit override, consuming and returning `self`.
    #[must_use]
    pub fn with_override(mut self, network: Network, url: Url) -> Self {
        self.overrides.insert(network, url);
        self
    }

    /// The endpoint to use for `network`.
    ///
    /// # Panics
    ///
    /// Panics if a built-in default URL fails to parse, which is a
    /// compile-time constant mistake rather than a runtime condition.
    #[must_use]
    pub fn url_for(&self, network: Network) -> Url {
        self.overrides.get(&network).cloned().unwrap_or_else(|| {
            network
                .default_rpc_url()
                .parse()
                .expect("built-in default RPC URL is valid")
        })
    }
}

/// Read-only chain access for the verifier.
pub struct ChainReader {
    endpoints: RpcEndpoints,
    providers: Mutex<HashMap<Network, DynProvider>>,
}

impl std::fmt::Debug for ChainReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainReader")
            .field("initialized", &self.providers.lock().len())
            .finish()
    }
}

impl ChainReader {
    /// Creates a reader over the given endpoints.
    #[must_use]
    pub fn new(endpoints: RpcEndpoints) -> Self {
        Self {
            endpoints,
            providers: Mutex::new(HashMap::new()),
        }
    }

    fn provider(&self, network: Network) -> DynProvider {
        let mut providers = self.providers.lock();
        providers
            .entry(network)
            .or_insert_with(|| {
                let url = self.endpoints.url_for(network);
                tracing::debug!(network = %network, rpc = %url, "initializing read provider");
                ProviderBuilder::new().connect_http(url).erased()
            })
            .clone()
    }

    /// Reads the token balance of `holder` at `token`.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ChainError`] on RPC failure.
    pub async fn balance_of(
        &self,
        network: Network,
        token: Address,
        holder: Address,
    ) -> Result<U256, ChainError> {
        let contract = IEIP3009::new(token, self.provider(network));
        contract
            .balanceOf(holder)
            .call()
            .await
            .map_err(ChainError::from)
    }
}

/// Outcome of a confirmed settlement transaction.
#[derive(Debug, Clone, Copy)]
pub struct SettlementReceipt {
    /// The confirmed transaction hash.
    pub tx_hash: B256,
    /// Gas consumed by the transaction.
    pub gas_used: u64,
}

/// Write-side chain access for the settler. Owns the operating key.
pub struct ChainWriter {
    endpoints: RpcEndpoints,
    wallet: EthereumWallet,
    operator: Address,
    providers: Mutex<HashMap<Network, DynProvider>>,
}

impl std::fmt::Debug for ChainWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainWriter")
            .field("operator", &self.operator)
            .field("initialized", &self.providers.lock().len())
            .finish()
    }
}

impl ChainWriter {
    /// Creates a writer around the facilitator's operating key.
    #[must_use]
    pub fn new(signer: PrivateKeySigner, endpoints: RpcEndpoints) -> Self {
        let operator = signer.address();
        Self {
            endpoints,
            wallet: EthereumWallet::from(signer),
            operator,
            providers: Mutex::new(HashMap::new()),
        }
    }

    /// The operating key's address.
    #[must_use]
    pub const fn operator(&self) -> Address {
        self.operator
    }

    fn provider(&self, network: Network) -> DynProvider {
        let mut providers = self.providers.lock();
        providers
            .entry(network)
            .or_insert_with(|| {
                let url = self.endpoints.url_for(network);
                tracing::debug!(network = %network, rpc = %url, "initializing settlement provider");
                ProviderBuilder::new()
                    .wallet(self.wallet.clone())
                    .connect_http(url)
                    .erased()
            })
            .clone()
    }

    fn token_contract(
        &self,
        network: Network,
        token: Address,
    ) -> IEIP3009::IEIP3009Instance<DynProvider> {
        IEIP3009::new(token, self.provider(network))
    }

    /// Simulates the transfer without submitting, surfacing revert
    /// reasons before any gas is spent.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Reverted`] with the node's reason on revert.
    pub async fn simulate_transfer(
        &self,
        network: Network,
        token: Address,
        authorization: &Authorization,
        signature: (u8, B256, B256),
    ) -> Result<(), ChainError> {
        let contract = self.token_contract(network, token);
        let (v, r, s) = signature;
        contract
            .transferWithAuthorization(
                authorization.from,
                authorization.to,
                authorization.value.as_u256(),
                U256::from(authorization.valid_after.as_secs()),
                U256::from(authorization.valid_before.as_secs()),
                authorization.nonce,
                v,
                r,
                s,
            )
            .from(self.operator)
            .call()
            .await
            .map_err(ChainError::from)?;
        Ok(())
    }

    /// Estimates gas for the transfer.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ChainError`] on RPC failure.
    pub async fn estimate_transfer_gas(
        &self,
        network: Network,
        token: Address,
        authorization: &Authorization,
        signature: (u8, B256, B256),
    ) -> Result<u64, ChainError> {
        let contract = self.token_contract(network, token);
        let (v, r, s) = signature;
        contract
            .transferWithAuthorization(
                authorization.from,
                authorization.to,
                authorization.value.as_u256(),
                U256::from(authorization.valid_after.as_secs()),
                U256::from(authorization.valid_before.as_secs()),
                authorization.nonce,
                v,
                r,
                s,
            )
            .from(self.operator)
            .estimate_gas()
            .await
            .map_err(ChainError::from)
    }

    /// Submits the transfer and awaits exactly one confirmation.
    ///
    /// When the receipt wait fails after broadcast, the error carries the
    /// transaction hash so the caller can still report it.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ChainError`] on submission, receipt, or
    /// status failure.
    pub async fn submit_transfer(
        &self,
        network: Network,
        token: Address,
        authorization: &Authorization,
        signature: (u8, B256, B256),
        receipt_timeout: Duration,
    ) -> Result<SettlementReceipt, ChainError> {
        let contract = self.token_contract(network, token);
        let (v, r, s) = signature;
        let pending = contract
            .transferWithAuthorization(
                authorization.from,
                authorization.to,
                authorization.value.as_u256(),
                U256::from(authorization.valid_after.as_secs()),
                U256::from(authorization.valid_before.as_secs()),
                authorization.nonce,
                v,
                r,
                s,
            )
            .send()
            .await
            .map_err(ChainError::from)?;
        let tx_hash = *pending.tx_hash();

        let receipt = pending
            .with_required_confirmations(1)
            .with_timeout(Some(receipt_timeout))
            .get_receipt()
            .await
            .map_err(|e| ChainError::ReceiptTimeout {
                tx_hash,
                message: e.to_string(),
            })?;

        if receipt.status() {
            Ok(SettlementReceipt {
                tx_hash: receipt.transaction_hash,
                gas_used: receipt.gas_used,
            })
        } else {
            Err(ChainError::TransactionFailed(receipt.transaction_hash))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_resolution_prefers_overrides() {
        let url: Url = "http://127.0.0.1:8545".parse().unwrap();
        let endpoints = RpcEndpoints::new().with_override(Network::BaseSepolia, url.clone());
        assert_eq!(endpoints.url_for(Network::BaseSepolia), url);
        assert_eq!(
            endpoints.url_for(Network::BaseMainnet).as_str(),
            "https://mainnet.base.org/"
        );
    }

    #[test]
    fn error_classification() {
        assert!(ChainError::Transport("timeout".into()).is_retryable());
        assert!(!ChainError::Reverted("authorization is used".into()).is_retryable());
        assert!(!ChainError::TransactionFailed(B256::ZERO).is_retryable());
        let timeout = ChainError::ReceiptTimeout {
            tx_hash: B256::repeat_byte(1),
            message: "timed out".into(),
        };
        assert!(!timeout.is_retryable());
        assert_eq!(timeout.tx_hash(), Some(B256::repeat_byte(1)));
    }

    #[tokio::test]
    async fn unreachable_rpc_is_transient() {
        let endpoints =
            RpcEndpoints::new().with_override(Network::BaseSepolia, "http://127.0.0.1:1".parse().unwrap());
        let reader = ChainReader::new(endpoints);
        let err = reader
            .balance_of(
                Network::BaseSepolia,
                Network::BaseSepolia.usdc_address(),
                Address::ZERO,
            )
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "expected transient error, got {err}");
    }
}
