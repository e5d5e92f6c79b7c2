// Oracle port: randomness requests go out as log events, answers come back
// through the FulfillRandomWords instruction signed by the oracle authority.
use solana_program::{account_info::AccountInfo, msg, program_error::ProgramError, pubkey::Pubkey};

use crate::config::OracleParams;
use crate::error::LotteryError;
use crate::events::LotteryEvent;

/// An issued randomness request, bound to the round it will settle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RandomnessRequest {
    pub request_id: u64,
    pub round_id: u64,
    pub params: OracleParams,
}

impl RandomnessRequest {
    /// The signal the off-chain oracle listens for
    pub fn event(&self) -> LotteryEvent {
        LotteryEvent::RequestedRandomness {
            request_id: self.request_id,
            round_id: self.round_id,
            key_hash: self.params.key_hash,
            subscription_id: self.params.subscription_id,
            request_confirmations: self.params.request_confirmations,
            callback_gas_limit: self.params.callback_gas_limit,
            num_words: self.params.num_words,
        }
    }
}

/// Issue a new randomness request for `round_id`.
///
/// Ids come from the lottery's own counter and are never handed out twice.
/// Nothing waits for the answer: the oracle calls back whenever it is ready.
pub fn request_random_words(
    next_request_id: &mut u64,
    round_id: u64,
    params: &OracleParams,
) -> RandomnessRequest {
    let request_id = *next_request_id;
    *next_request_id += 1;
    RandomnessRequest {
        request_id,
        round_id,
        params: *params,
    }
}

/// Check that a fulfillment comes from the configured oracle authority
pub fn verify_oracle_authority(
    oracle_info: &AccountInfo,
    oracle_authority: &Pubkey,
) -> Result<(), ProgramError> {
    if !oracle_info.is_signer {
        msg!("Oracle must sign the fulfillment");
        return Err(ProgramError::MissingRequiredSignature);
    }

    if oracle_info.key != oracle_authority {
        msg!("{} is not the oracle authority", oracle_info.key);
        return Err(LotteryError::UnauthorizedOracle.into());
    }

    Ok(())
}

/// Pick the winning entrant index from a random word.
///
/// Plain modulo, so counts that do not divide 2^64 carry a slight bias.
pub fn winner_index(random_word: u64, entrant_count: usize) -> Option<usize> {
    if entrant_count == 0 {
        return None;
    }
    Some((random_word % entrant_count as u64) as usize)
}
