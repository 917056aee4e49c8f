//! Deposit sizing for mirrored settlement-native assets
//!
//! When the transferred asset is a settlement-native asset mirrored on the
//! execution chain, any shortfall between the sender's execution-chain balance
//! and the transfer amount is deposited through the anchor transaction.

use super::{AssetId, DepositAsset};
use crate::chain::ChainReader;
use crate::error::{ExternalError, StepResult, TransferError};

use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::debug;

/// Mirrored-asset portion of a transfer's deposit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepositPlan {
    /// Set when the asset mirrors a settlement-native asset
    pub mirrored: Option<AssetId>,
    pub assets: Vec<DepositAsset>,
}

impl DepositPlan {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirrored.is_some()
    }
}

/// Shortfall to cover from the settlement chain
pub fn deficit(required: U256, balance: U256) -> U256 {
    required.saturating_sub(balance)
}

/// Computes the mirrored-asset deposit of a transfer
pub struct DepositCalculator {
    reader: Arc<dyn ChainReader>,
}

impl DepositCalculator {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }

    /// Plan the deposit for moving `required` units of `collateral` owned by `sender`
    pub async fn calculate(
        &self,
        collateral: Option<Address>,
        sender: Address,
        required: U256,
    ) -> StepResult<DepositPlan> {
        let Some(asset_address) = collateral else {
            return Ok(DepositPlan::none());
        };

        let lookup_failed = |source: ExternalError| TransferError::DepositLookupFailed {
            asset: format!("{:?}", asset_address),
            source,
        };

        let (asset_id, balance) = tokio::try_join!(
            self.reader.read_asset(asset_address),
            self.reader.read_balance(asset_address, sender),
        )
        .map_err(lookup_failed)?;

        let Some(asset_id) = asset_id else {
            debug!("Asset {:?} is not mirrored, no deposit required", asset_address);
            return Ok(DepositPlan::none());
        };

        let shortfall = deficit(required, balance);
        debug!(
            "Mirrored asset {} detected: balance {}, required {}, deficit {}",
            asset_id, balance, required, shortfall
        );

        let assets = if shortfall.is_zero() {
            Vec::new()
        } else {
            crate::metrics::record_deposit_deficit(&asset_id);
            vec![DepositAsset {
                asset_id: asset_id.clone(),
                amount: shortfall,
                asset_address,
            }]
        };

        Ok(DepositPlan {
            mirrored: Some(asset_id),
            assets,
        })
    }
}
