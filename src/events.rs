use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{log::sol_log_data, msg, pubkey::Pubkey};

/// Signals produced by the lottery, logged for off-chain indexers and keepers
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum LotteryEvent {
    /// A paid entry was added to the current round
    EntryAccepted { player: Pubkey, amount: u64 },
    /// A randomness request was issued for a round; the oracle answers with `request_id`
    RequestedRandomness {
        request_id: u64,
        round_id: u64,
        key_hash: [u8; 32],
        subscription_id: u64,
        request_confirmations: u16,
        callback_gas_limit: u32,
        num_words: u32,
    },
    /// A round was settled and its pool paid out
    WinnerPicked {
        winner: Pubkey,
        prize: u64,
        round_id: u64,
    },
}

impl LotteryEvent {
    /// Writes the event to the program log, once readable and once borsh encoded
    pub fn emit(&self) {
        msg!("{}", self);
        if let Ok(data) = self.try_to_vec() {
            sol_log_data(&[&data]);
        }
    }
}

impl fmt::Display for LotteryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EntryAccepted { player, amount } => {
                write!(f, "EntryAccepted: player={} amount={}", player, amount)
            }
            Self::RequestedRandomness {
                request_id,
                round_id,
                num_words,
                ..
            } => write!(
                f,
                "RequestedRandomness: request_id={} round={} words={}",
                request_id, round_id, num_words
            ),
            Self::WinnerPicked {
                winner,
                prize,
                round_id,
            } => write!(
                f,
                "WinnerPicked: winner={} prize={} round={}",
                winner, prize, round_id
            ),
        }
    }
}
