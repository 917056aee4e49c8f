//! Conversion between execution-chain and settlement-chain native units
//!
//! The execution chain denominates the settlement asset with 18 decimals, the
//! settlement chain with 8. Conversion truncates toward zero.

use ethers::types::U256;

/// Execution-chain smallest units per settlement-chain smallest unit (10^18 / 10^8)
pub const UNITS_PER_SETTLEMENT_UNIT: u64 = 10_000_000_000;

/// Convert an execution-chain native value into settlement-chain units
pub fn to_settlement_units(native_value: U256) -> U256 {
    native_value / U256::from(UNITS_PER_SETTLEMENT_UNIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_maps_to_zero() {
        assert_eq!(to_settlement_units(U256::zero()), U256::zero());
    }

    #[test]
    fn test_truncates_sub_unit_remainder() {
        assert_eq!(to_settlement_units(U256::from(9_999_999_999u64)), U256::zero());
        assert_eq!(to_settlement_units(U256::from(10_000_000_000u64)), U256::one());
        assert_eq!(to_settlement_units(U256::from(25_000_000_001u64)), U256::from(2));
    }

    #[test]
    fn test_one_coin_is_hundred_million_units() {
        let one_coin = U256::exp10(18);
        assert_eq!(to_settlement_units(one_coin), U256::from(100_000_000u64));
    }

    #[test]
    fn test_monotonic_and_total() {
        let samples = [
            U256::zero(),
            U256::from(1),
            U256::from(10_000_000_000u64),
            U256::exp10(20),
            U256::MAX - 1,
            U256::MAX,
        ];
        for pair in samples.windows(2) {
            assert!(to_settlement_units(pair[0]) <= to_settlement_units(pair[1]));
        }
    }
}
