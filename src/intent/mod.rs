//! Execution-chain intentions and their deposit instructions
//!
//! An intention wraps exactly one execution-chain call, or marks the end of a
//! batch. Intentions are only authorized once a settlement-chain anchor
//! transaction referencing the whole batch is signed and broadcast.

pub mod builder;
pub mod deposit;

pub use builder::IntentionBuilder;
pub use deposit::{DepositCalculator, DepositPlan};

use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a settlement-native asset mirrored on the execution chain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId(pub String);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One low-level execution-chain call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOperation {
    pub index: usize,
    pub to: Address,
    pub data: Bytes,
    pub value: Option<U256>,
}

/// A mirrored asset moved from the settlement chain alongside the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositAsset {
    pub asset_id: AssetId,
    pub amount: U256,
    /// Execution-chain representation of the asset
    pub asset_address: Address,
}

/// Value that must accompany the batch through the anchor transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositInstruction {
    /// Settlement-chain native amount, in settlement units
    pub settlement_amount: U256,
    pub assets: Vec<DepositAsset>,
}

impl DepositInstruction {
    pub fn is_empty(&self) -> bool {
        self.settlement_amount.is_zero() && self.assets.is_empty()
    }
}

/// A signable unit of an anchored batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Intention {
    Operation {
        operation: ExecutionOperation,
        deposit: Option<DepositInstruction>,
    },
    /// Terminal marker closing the batch on the execution chain
    Completion,
}

impl Intention {
    pub fn operation(&self) -> Option<&ExecutionOperation> {
        match self {
            Intention::Operation { operation, .. } => Some(operation),
            Intention::Completion => None,
        }
    }

    pub fn deposit(&self) -> Option<&DepositInstruction> {
        match self {
            Intention::Operation { deposit, .. } => deposit.as_ref(),
            Intention::Completion => None,
        }
    }

    pub fn is_completion(&self) -> bool {
        matches!(self, Intention::Completion)
    }
}
