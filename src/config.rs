use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{clock::UnixTimestamp, pubkey::Pubkey};

use crate::error::LotteryError;
use crate::utils::sol_to_lamports;

/// Key hash of the public randomness lane used by the hosted oracle
pub const DEFAULT_KEY_HASH: [u8; 32] = [
    0x47, 0x4e, 0x34, 0xa0, 0x77, 0xdf, 0x58, 0x80, 0x7d, 0xbe, 0x9c, 0x96, 0xd3, 0xc0, 0x09, 0xb2,
    0x3b, 0x3c, 0x6d, 0x0c, 0xce, 0x43, 0x3e, 0x59, 0xbb, 0xf5, 0xb3, 0x4f, 0x82, 0x3b, 0xc5, 0x6c,
];
pub const DEFAULT_CALLBACK_GAS_LIMIT: u32 = 500_000;
pub const DEFAULT_REQUEST_CONFIRMATIONS: u16 = 3;
pub const DEFAULT_NUM_WORDS: u32 = 1;
/// Upper bound on words per request, keeps fulfill instructions within a transaction
pub const MAX_NUM_WORDS: u32 = 32;

/// Parameters forwarded to the oracle with every randomness request
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct OracleParams {
    /// Randomness lane (price tier) the oracle should answer on
    pub key_hash: [u8; 32],
    /// Pre-funded oracle subscription paying for the request
    pub subscription_id: u64,
    /// Confirmations the oracle waits before answering
    pub request_confirmations: u16,
    /// Compute budget the oracle should attach to the fulfill transaction
    pub callback_gas_limit: u32,
    /// Number of random words delivered per request
    pub num_words: u32,
}

impl OracleParams {
    pub const LEN: usize = 32 + 8 + 2 + 4 + 4;
}

impl Default for OracleParams {
    fn default() -> Self {
        Self {
            key_hash: DEFAULT_KEY_HASH,
            subscription_id: 0,
            request_confirmations: DEFAULT_REQUEST_CONFIRMATIONS,
            callback_gas_limit: DEFAULT_CALLBACK_GAS_LIMIT,
            num_words: DEFAULT_NUM_WORDS,
        }
    }
}

/// Lottery settings, fixed when the lottery account is created
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct LotteryConfig {
    /// Minimum payment per entry in lamports
    pub entrance_fee: u64,
    /// Seconds a round stays open before a draw may start
    pub interval: UnixTimestamp,
    /// The only key allowed to deliver randomness
    pub oracle_authority: Pubkey,
    pub oracle: OracleParams,
}

impl LotteryConfig {
    pub const LEN: usize = 8 + 8 + 32 + OracleParams::LEN;

    /// Local validator settings: 0.01 SOL entries drawn every 30 seconds
    pub fn localnet(oracle_authority: Pubkey) -> Self {
        Self {
            entrance_fee: sol_to_lamports(0.01),
            interval: 30,
            oracle_authority,
            oracle: OracleParams::default(),
        }
    }

    /// Devnet settings, billed to the shared oracle subscription
    pub fn devnet(oracle_authority: Pubkey) -> Self {
        Self {
            oracle: OracleParams {
                subscription_id: 6170,
                ..OracleParams::default()
            },
            ..Self::localnet(oracle_authority)
        }
    }

    pub fn validate(&self) -> Result<(), LotteryError> {
        if self.entrance_fee == 0 || self.interval < 0 {
            return Err(LotteryError::InvalidConfig);
        }
        if self.oracle.num_words == 0 || self.oracle.num_words > MAX_NUM_WORDS {
            return Err(LotteryError::InvalidConfig);
        }
        if self.oracle_authority == Pubkey::default() {
            return Err(LotteryError::InvalidConfig);
        }
        Ok(())
    }
}
