//! EIP-712 typed-data construction, signing, and recovery.
//!
//! The primary type is `TransferWithAuthorization` with fields in the
//! exact order mandated by ERC-3009. The domain is
//! `{ name, version, chainId, verifyingContract }` where
//! `verifyingContract` is the token contract (`requirements.asset`) and
//! name/version come from `requirements.extra` or the USDC defaults.

use alloy_primitives::{Address, Bytes, Signature, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{eip712_domain, sol, Eip712Domain, SolStruct};

use x402::proto::{Authorization, PaymentRequirements};

sol! {
    /// EIP-712 struct for ERC-3009 `transferWithAuthorization`.
    ///
    /// Field order MUST match the on-chain token contract definition;
    /// the facilitator reconstructs this struct from the authorization
    /// to verify the client's signature.
    #[derive(Debug)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

/// Errors from parsing or verifying a signature.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignatureError {
    /// The signature is not 65 bytes.
    #[error("invalid signature: expected 65 bytes, got {0}")]
    BadLength(usize),
    /// The recovery byte is not one of `{0, 1, 27, 28}`.
    #[error("invalid signature: bad recovery id {0}")]
    BadRecoveryId(u8),
    /// Public-key recovery failed.
    #[error("invalid signature: {0}")]
    Unrecoverable(String),
    /// The recovered signer is not the authorizer.
    #[error("signature/authorizer mismatch: recovered {recovered}, expected {expected}")]
    SignerMismatch {
        /// Address recovered from the signature.
        recovered: Address,
        /// The claimed authorizer.
        expected: Address,
    },
}

/// Builds the EIP-712 domain for a set of payment requirements.
#[must_use]
pub fn payment_domain(requirements: &PaymentRequirements) -> Eip712Domain {
    let (name, version) = requirements.domain_parameters();
    eip712_domain! {
        name: name,
        version: version,
        chain_id: requirements.network.chain_id(),
        verifying_contract: requirements.asset,
    }
}

fn as_typed_data(authorization: &Authorization) -> TransferWithAuthorization {
    TransferWithAuthorization {
        from: authorization.from,
        to: authorization.to,
        value: authorization.value.as_u256(),
        validAfter: U256::from(authorization.valid_after.as_secs()),
        validBefore: U256::from(authorization.valid_before.as_secs()),
        nonce: authorization.nonce,
    }
}

/// The EIP-712 signing hash of an authorization under a domain.
#[must_use]
pub fn signing_hash(authorization: &Authorization, domain: &Eip712Domain) -> B256 {
    as_typed_data(authorization).eip712_signing_hash(domain)
}

/// Signs an authorization, producing a 65-byte `r ‖ s ‖ v` signature.
///
/// # Errors
///
/// Returns an error if the underlying signer fails.
pub fn sign_authorization(
    signer: &PrivateKeySigner,
    authorization: &Authorization,
    domain: &Eip712Domain,
) -> Result<Bytes, alloy_signer::Error> {
    let hash = signing_hash(authorization, domain);
    let signature = signer.sign_hash_sync(&hash)?;
    Ok(signature.as_bytes().into())
}

/// Parses a 65-byte signature, tolerating `v` in `{0, 1}` or `{27, 28}`.
///
/// # Errors
///
/// Returns [`SignatureError`] on a bad length or recovery byte.
pub fn parse_signature(bytes: &[u8]) -> Result<Signature, SignatureError> {
    if bytes.len() != 65 {
        return Err(SignatureError::BadLength(bytes.len()));
    }
    let r = B256::from_slice(&bytes[..32]);
    let s = B256::from_slice(&bytes[32..64]);
    let parity = match bytes[64] {
        0 | 27 => false,
        1 | 28 => true,
        other => return Err(SignatureError::BadRecoveryId(other)),
    };
    Ok(Signature::from_scalars_and_parity(r, s, parity))
}

/// Splits a signature into on-chain `(v, r, s)` with `v` normalized to
/// `{27, 28}` as the token contract expects.
///
/// # Errors
///
/// Returns [`SignatureError`] if the bytes are not a well-formed signature.
pub fn split_signature(bytes: &[u8]) -> Result<(u8, B256, B256), SignatureError> {
    let signature = parse_signature(bytes)?;
    let v = 27 + u8::from(signature.v());
    Ok((v, B256::from(signature.r()), B256::from(signature.s())))
}

/// Recovers the signer of an authorization from its signature.
///
/// # Errors
///
/// Returns [`SignatureError`] on malformed bytes or failed recovery.
pub fn recover_payer(
    authorization: &Authorization,
    signature: &[u8],
    domain: &Eip712Domain,
) -> Result<Address, SignatureError> {
    let signature = parse_signature(signature)?;
    let hash = signing_hash(authorization, domain);
    signature
        .recover_address_from_prehash(&hash)
        .map_err(|e| SignatureError::Unrecoverable(e.to_string()))
}

/// Checks that the signature over `authorization` was produced by
/// `authorization.from`.
///
/// # Errors
///
/// Returns [`SignatureError::SignerMismatch`] when the recovered address
/// differs from the authorizer, or a parse/recovery error otherwise.
pub fn verify_authorization_signature(
    authorization: &Authorization,
    signature: &[u8],
    domain: &Eip712Domain,
) -> Result<Address, SignatureError> {
    let recovered = recover_payer(authorization, signature, domain)?;
    if recovered == authorization.from {
        Ok(recovered)
    } else {
        Err(SignatureError::SignerMismatch {
            recovered,
            expected: authorization.from,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use x402::{Network, Scheme, TokenAmount, UnixTimestamp};

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

    fn authorization(from: Address) -> Authorization {
        Authorization {
            from,
            to: address!("0x1111111111111111111111111111111111111111"),
            value: TokenAmount::from(10_000u64),
            valid_after: UnixTimestamp::from_secs(1_700_000_000),
            valid_before: UnixTimestamp::from_secs(1_700_000_060),
            nonce: B256::repeat_byte(0x42),
        }
    }

    #[test]
    fn sign_then_recover_round_trip() {
        let signer = PrivateKeySigner::random();
        let domain = payment_domain(&requirements());
        let auth = authorization(signer.address());

        let signature = sign_authorization(&signer, &auth, &domain).unwrap();
        let recovered = verify_authorization_signature(&auth, &signature, &domain).unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn tampered_authorization_fails_verification() {
        let signer = PrivateKeySigner::random();
        let domain = payment_domain(&requirements());
        let auth = authorization(signer.address());
        let signature = sign_authorization(&signer, &auth, &domain).unwrap();

        let mut tampered = auth;
        tampered.value = TokenAmount::from(999_999u64);
        assert!(matches!(
            verify_authorization_signature(&tampered, &signature, &domain),
            Err(SignatureError::SignerMismatch { .. })
        ));
    }

    #[test]
    fn wrong_signer_is_a_mismatch() {
        let holder = PrivateKeySigner::random();
        let impostor = PrivateKeySigner::random();
        let domain = payment_domain(&requirements());
        let auth = authorization(holder.address());

        let forged = sign_authorization(&impostor, &auth, &domain).unwrap();
        assert!(matches!(
            verify_authorization_signature(&auth, &forged, &domain),
            Err(SignatureError::SignerMismatch { .. })
        ));
    }

    #[test]
    fn tolerates_both_v_conventions() {
        let signer = PrivateKeySigner::random();
        let domain = payment_domain(&requirements());
        let auth = authorization(signer.address());
        let signature = sign_authorization(&signer, &auth, &domain).unwrap();

        let mut flipped = signature.to_vec();
        flipped[64] = match flipped[64] {
            27 => 0,
            28 => 1,
            0 => 27,
            _ => 28,
        };
        let recovered = verify_authorization_signature(&auth, &flipped, &domain).unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn split_normalizes_v_to_ethereum_range() {
        let signer = PrivateKeySigner::random();
        let domain = payment_domain(&requirements());
        let auth = authorization(signer.address());
        let signature = sign_authorization(&signer, &auth, &domain).unwrap();

        let (v, _, _) = split_signature(&signature).unwrap();
        assert!(v == 27 || v == 28);
    }

    #[test]
    fn rejects_malformed_signatures() {
        assert!(matches!(
            parse_signature(&[0u8; 64]),
            Err(SignatureError::BadLength(64))
        ));
        let mut bad_v = [0u8; 65];
        bad_v[64] = 9;
        assert!(matches!(
            parse_signature(&bad_v),
            Err(SignatureError::BadRecoveryId(9))
        ));
    }

    #[test]
    fn domain_uses_extra_override() {
        let mut reqs = requirements();
        reqs.extra = Some(x402::proto::RequirementsExtra {
            name: "USDC".to_owned(),
            version: "2".to_owned(),
        });
        let signer = PrivateKeySigner::random();
        let auth = authorization(signer.address());

        let default_hash = signing_hash(&auth, &payment_domain(&requirements()));
        let override_hash = signing_hash(&auth, &payment_domain(&reqs));
        assert_ne!(default_hash, override_hash);
    }
}
