//! Client-side holder wallet.
//!
//! Owns the holder key, draws random authorization nonces, and keeps a
//! bounded log of every nonce it has signed so the same nonce is never
//! signed twice within the log window.

use std::collections::{HashSet, VecDeque};

use alloy_primitives::{Address, B256};
use parking_lot::Mutex;
use rand::Rng;

use x402::proto::{
    encode_payment, Authorization, ExactPayload, PaymentPayload, PaymentRequirements,
    X402Version1,
};
use x402::UnixTimestamp;

use crate::eip712::{payment_domain, sign_authorization};

/// Clock-skew allowance baked into `validAfter` so a freshly signed
/// authorization is immediately valid on nodes up to a minute behind.
const CLOCK_SKEW_ALLOWANCE_SECS: u64 = 60;

/// Redraw budget when a freshly drawn nonce collides with the log.
const MAX_NONCE_REDRAWS: u32 = 100;

/// Log size that triggers garbage collection.
const NONCE_LOG_HIGH_WATER: usize = 10_000;

/// Entries retained after garbage collection.
const NONCE_LOG_RETAIN: usize = 5_000;

/// Errors from the holder wallet.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// Could not draw an unused nonce within the redraw budget.
    #[error("could not draw an unused nonce after {MAX_NONCE_REDRAWS} attempts")]
    NonceExhausted,
    /// The underlying signer failed.
    #[error("signing failed: {0}")]
    Signing(String),
    /// The signed payload could not be encoded for the header.
    #[error("payload encoding failed: {0}")]
    Encoding(String),
}

#[derive(Default)]
struct NonceLog {
    seen: HashSet<B256>,
    order: VecDeque<B256>,
}

impl NonceLog {
    fn insert(&mut self, nonce: B256) {
        self.seen.insert(nonce);
        self.order.push_back(nonce);
        if self.order.len() > NONCE_LOG_HIGH_WATER {
            while self.order.len() > NONCE_LOG_RETAIN {
                if let Some(old) = self.order.pop_front() {
                    self.seen.remove(&old);
                }
            }
        }
    }
}

/// A holder key plus its self-nonce log.
///
/// The key never leaves the process; only signatures do.
pub struct HolderWallet {
    signer: alloy_signer_local::PrivateKeySigner,
    nonces: Mutex<NonceLog>,
}

impl std::fmt::Debug for HolderWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HolderWallet")
            .field("address", &self.address())
            .field("tracked_nonces", &self.tracked_nonces())
            .finish()
    }
}

impl HolderWallet {
    /// Wraps an existing signer.
    #[must_use]
    pub fn new(signer: alloy_signer_local::PrivateKeySigner) -> Self {
        Self {
            signer,
            nonces: Mutex::new(NonceLog::default()),
        }
    }

    /// Generates a throwaway wallet with a random key.
    #[must_use]
    pub fn random() -> Self {
        Self::new(alloy_signer_local::PrivateKeySigner::random())
    }

    /// The holder address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Number of nonces currently tracked in the self-nonce log.
    #[must_use]
    pub fn tracked_nonces(&self) -> usize {
        self.nonces.lock().order.len()
    }

    /// Draws a fresh random nonce, redrawing on collision with the log.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::NonceExhausted`] after 100 collisions.
    pub fn next_nonce(&self) -> Result<B256, WalletError> {
        let mut log = self.nonces.lock();
        for _ in 0..MAX_NONCE_REDRAWS {
            let nonce = B256::from(rand::rng().random::<[u8; 32]>());
            if !log.seen.contains(&nonce) {
                log.insert(nonce);
                return Ok(nonce);
            }
        }
        Err(WalletError::NonceExhausted)
    }

    /// Signs an authorization satisfying `requirements`.
    ///
    /// The window is `[now - 60, now + maxTimeoutSeconds]`; the signed
    /// value is `maxAmountRequired` (for `upto`, that value is the
    /// signed maximum).
    ///
    /// # Errors
    ///
    /// Returns [`WalletError`] on nonce exhaustion or signer failure.
    pub fn sign_payment(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<PaymentPayload, WalletError> {
        let now = UnixTimestamp::now();
        let authorization = Authorization {
            from: self.address(),
            to: requirements.pay_to,
            value: requirements.max_amount_required,
            valid_after: now.saturating_sub(CLOCK_SKEW_ALLOWANCE_SECS),
            valid_before: now + requirements.max_timeout_seconds,
            nonce: self.next_nonce()?,
        };
        let domain = payment_domain(requirements);
        let signature = sign_authorization(&self.signer, &authorization, &domain)
            .map_err(|e| WalletError::Signing(e.to_string()))?;
        Ok(PaymentPayload {
            x402_version: X402Version1,
            scheme: requirements.scheme,
            network: requirements.network,
            payload: ExactPayload {
                signature,
                authorization,
                metering: None,
            },
        })
    }

    /// Signs a payment and encodes it as an `X-PAYMENT` header value.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError`] on signing or encoding failure.
    pub fn sign_payment_header(
        &self,
        requirements: &PaymentRequirements,
    ) -> Result<String, WalletError> {
        let payload = self.sign_payment(requirements)?;
        encode_payment(&payload).map_err(|e| WalletError::Encoding(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eip712::verify_authorization_signature;
    use alloy_primitives::address;
    use x402::{Network, Scheme, TokenAmount};

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: Scheme::Exact,
            network: Network::BaseSepolia,
            max_amount_required: TokenAmount::from(10_000u64),
            resource: "https://api.example.com/data".to_owned(),
            description: String::new(),
            mime_type: "application/json".to_owned(),
            output_schema: None,
            pay_to: address!("0x1111111111111111111111111111111111111111"),
            max_timeout_seconds: 60,
            asset: Network::BaseSepolia.usdc_address(),
            extra: None,
        }
    }

    #[test]
    fn signed_payment_verifies_and_covers_the_window() {
        let wallet = HolderWallet::random();
        let payload = wallet.sign_payment(&requirements()).unwrap();
        let auth = payload.payload.authorization;

        assert_eq!(auth.from, wallet.address());
        assert_eq!(auth.value, TokenAmount::from(10_000u64));
        let now = UnixTimestamp::now();
        assert!(auth.valid_after <= now);
        assert!(now <= auth.valid_before);

        let domain = payment_domain(&requirements());
        verify_authorization_signature(&auth, &payload.payload.signature, &domain).unwrap();
    }

    #[test]
    fn nonces_are_never_repeated() {
        let wallet = HolderWallet::random();
        let mut seen = HashSet::new();
        for _ in 0..1_000 {
            assert!(seen.insert(wallet.next_nonce().unwrap()));
        }
    }

    #[test]
    fn nonce_log_garbage_collects() {
        let wallet = HolderWallet::random();
        for _ in 0..=NONCE_LOG_HIGH_WATER {
            wallet.next_nonce().unwrap();
        }
        assert!(wallet.tracked_nonces() <= NONCE_LOG_RETAIN + 1);
    }

    #[test]
    fn header_encoding_round_trips() {
        let wallet = HolderWallet::random();
        let header = wallet.sign_payment_header(&requirements()).unwrap();
        let decoded: PaymentPayload = x402::proto::decode_payment(&header).unwrap();
        assert_eq!(decoded.scheme, Scheme::Exact);
        assert_eq!(decoded.network, Network::BaseSepolia);
    }
}
