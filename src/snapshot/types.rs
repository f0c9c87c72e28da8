use crate::error::DecodeError;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Risk parameters of a single market, as published by the protocol.
/// Factors are unit fractions (e.g. 0.85), caps are raw token amounts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskParams {
    pub collateral_factor: f64,
    pub liquidation_incentive: f64,
    pub close_factor: f64,
    pub borrow_cap: U256,
    pub collateral_cap: U256,
}

/// A single asset tracked by the protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    pub underlying: Address,
    /// Price normalized to 18 decimal places.
    pub price: U256,
    pub risk: RiskParams,
}

/// Rescale a raw oracle price quoted in `decimals` to 18 decimal places.
/// Quotes above 18 decimals are divided down, losing the excess precision.
pub fn normalize_price(raw: U256, decimals: u8) -> U256 {
    if decimals == 18 {
        raw
    } else if decimals < 18 {
        raw * U256::from(10u64).pow(U256::from(18 - decimals))
    } else {
        raw / U256::from(10u64).pow(U256::from(decimals - 18))
    }
}

/// The closed set of markets known this cycle. Rebuilt from scratch on every
/// cycle, never diffed; position decoding validates asset ids against it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketBook {
    markets: Vec<Market>,
}

impl MarketBook {
    pub fn new(markets: Vec<Market>) -> Self {
        Self { markets }
    }

    pub fn contains(&self, asset: &Address) -> bool {
        self.markets.iter().any(|m| m.address == *asset)
    }

    pub fn get(&self, asset: &Address) -> Option<&Market> {
        self.markets.iter().find(|m| m.address == *asset)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Market> {
        self.markets.iter()
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

/// One user's collateral and debt across assets.
///
/// `succ` is the authoritative signal for whether the last refresh decoded
/// cleanly. A failed refresh stores an empty position with `succ=false`, so a
/// genuine zero balance is never confused with a decode default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPosition {
    pub assets: Vec<Address>,
    pub collateral: BTreeMap<Address, U256>,
    pub debt: BTreeMap<Address, U256>,
    pub succ: bool,
}

impl UserPosition {
    /// Build a decoded position, rejecting any asset id that is not part of
    /// the current market set.
    pub fn try_new(
        user: Address,
        assets: Vec<Address>,
        collateral: BTreeMap<Address, U256>,
        debt: BTreeMap<Address, U256>,
        markets: &MarketBook,
    ) -> Result<Self, DecodeError> {
        for asset in assets.iter().chain(collateral.keys()).chain(debt.keys()) {
            if !markets.contains(asset) {
                return Err(DecodeError::UnknownAsset { user, asset: *asset });
            }
        }
        Ok(Self { assets, collateral, debt, succ: true })
    }

    /// Placeholder stored when a refresh could not be decoded.
    pub fn failed() -> Self {
        Self { succ: false, ..Self::default() }
    }
}

/// Progress of the sync loop. Advances only when a cycle completes cleanly.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SyncState {
    pub last_update_block: u64,
    pub last_update_time: u64,
    pub cycle_counter: u64,
}

/// The full reconstructed protocol state, republished wholesale every cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub markets: MarketBook,
    pub users: BTreeMap<Address, UserPosition>,
    pub state: SyncState,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_book() -> MarketBook {
        MarketBook::new(vec![Market {
            address: Address::repeat_byte(0x01),
            symbol: "mUSD".to_string(),
            decimals: 6,
            underlying: Address::repeat_byte(0x02),
            price: U256::from(10u64).pow(U256::from(18)),
            risk: RiskParams::default(),
        }])
    }

    #[test]
    fn test_normalize_price() {
        assert_eq!(normalize_price(U256::from(5), 6), U256::from(5) * U256::from(10u64).pow(U256::from(12)));
        assert_eq!(normalize_price(U256::from(5), 18), U256::from(5));
        // over-precise quotes scale down, truncating the excess digits
        assert_eq!(normalize_price(U256::from(5_123u64), 21), U256::from(5));
    }

    #[test]
    fn test_position_rejects_unknown_asset() {
        let book = test_book();
        let user = Address::repeat_byte(0xaa);
        let unknown = Address::repeat_byte(0x99);

        let err = UserPosition::try_new(
            user,
            vec![unknown],
            BTreeMap::new(),
            BTreeMap::new(),
            &book,
        )
        .unwrap_err();

        assert!(matches!(err, DecodeError::UnknownAsset { asset, .. } if asset == unknown));
    }

    #[test]
    fn test_position_accepts_known_assets() {
        let book = test_book();
        let asset = Address::repeat_byte(0x01);
        let user = Address::repeat_byte(0xaa);

        let position = UserPosition::try_new(
            user,
            vec![asset],
            BTreeMap::from([(asset, U256::from(100))]),
            BTreeMap::from([(asset, U256::from(40))]),
            &book,
        )
        .unwrap();

        assert!(position.succ);
        assert_eq!(position.collateral[&asset], U256::from(100));
    }

    #[test]
    fn test_failed_position_is_explicit() {
        let position = UserPosition::failed();
        assert!(!position.succ);
        assert!(position.assets.is_empty());
    }
}
