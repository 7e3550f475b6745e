//! Payment option selection.
//!
//! Cheapest option wins; ties prefer L2 networks over L1.

use x402::proto::PaymentRequirements;
use x402::Network;

const fn l2_rank(network: Network) -> u8 {
    if network.is_l2() {
        0
    } else {
        1
    }
}

/// Picks the payment option the client will sign for.
#[must_use]
pub fn select_payment_option(accepts: &[PaymentRequirements]) -> Option<&PaymentRequirements> {
    accepts.iter().min_by(|a, b| {
        a.max_amount_required
            .cmp(&b.max_amount_required)
            .then_with(|| l2_rank(a.network).cmp(&l2_rank(b.network)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use x402::{Scheme, TokenAmount};

    fn option(network: Network, amount: u64) -> PaymentRequirements {
        PaymentRequirements {
            scheme: Scheme::Exact,
            network,
            max_amount_required: TokenAmount::from(amount),
            resource: "https://api.example.com/data".to_owned(),
            description: String::new(),
            mime_type: "application/json".to_owned(),
            output_schema: None,
            pay_to: address!("0x1111111111111111111111111111111111111111"),
            max_timeout_seconds: 60,
            asset: network.usdc_address(),
            extra: None,
        }
    }

    #[test]
    fn equal_prices_prefer_l2() {
        let accepts = vec![
            option(Network::EthereumMainnet, 10_000),
            option(Network::BaseMainnet, 10_000),
        ];
        let selected = select_payment_option(&accepts).unwrap();
        assert_eq!(selected.network, Network::BaseMainnet);
    }

    #[test]
    fn cheaper_l1_beats_pricier_l2() {
        let accepts = vec![
            option(Network::EthereumMainnet, 5_000),
            option(Network::BaseMainnet, 10_000),
        ];
        let selected = select_payment_option(&accepts).unwrap();
        assert_eq!(selected.network, Network::EthereumMainnet);
    }

    #[test]
    fn empty_offer_selects_nothing() {
        assert!(select_payment_option(&[]).is_none());
    }
}
