//! Solidity interface definitions for on-chain interactions.
//!
//! Only the functions the verifier and settler actually call are
//! declared: a balance read and the split-signature
//! `transferWithAuthorization` overload.
//!
//! References:
//! - ERC-3009: <https://eips.ethereum.org/EIPS/eip-3009>
//! - USDC `FiatTokenV2_2`: <https://github.com/circlefin/stablecoin-evm>

use alloy_sol_types::sol;

sol! {
    /// Minimal ERC-3009 + ERC-20 interface for USDC-style tokens.
    #[allow(missing_docs)]
    #[allow(clippy::too_many_arguments)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IEIP3009 {
        function balanceOf(address account) external view returns (uint256);
        function transferWithAuthorization(
            address from,
            address to,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external;
    }
}
