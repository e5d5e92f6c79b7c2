use arrayref::{array_ref, array_refs};
use solana_program::{
    clock::UnixTimestamp,
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use std::mem::size_of;

use crate::config::{LotteryConfig, OracleParams, MAX_NUM_WORDS};
use crate::utils::find_lottery_address;

/// Longest opaque upkeep payload accepted from a keeper
pub const MAX_UPKEEP_DATA_LEN: usize = 256;

/// Trailing byte of the CheckUpkeep return data. The runtime drops trailing
/// zero bytes from return data, so the verdict never comes last.
pub const UPKEEP_RESULT_VERSION: u8 = 1;

/// Return data published by CheckUpkeep: `[verdict, version]`
pub fn pack_upkeep_result(upkeep_needed: bool) -> [u8; 2] {
    [upkeep_needed as u8, UPKEEP_RESULT_VERSION]
}

/// Read the CheckUpkeep verdict out of simulated return data
pub fn unpack_upkeep_result(data: &[u8]) -> Option<bool> {
    match data {
        [verdict, UPKEEP_RESULT_VERSION] if *verdict <= 1 => Some(*verdict == 1),
        _ => None,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LotteryInstruction {
    /// Create the lottery account and fix its configuration
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The admin, pays for the lottery account
    /// 1. `[writable]` The lottery account (PDA of `["lottery", admin]`)
    /// 2. `[]` The oracle authority allowed to deliver randomness
    /// 3. `[]` The system program
    InitializeLottery {
        /// Minimum entry in lamports
        entrance_fee: u64,
        /// Seconds between the start of a round and its draw
        interval: UnixTimestamp,
        oracle: OracleParams,
    },

    /// Pay into the current round
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The player
    /// 1. `[writable]` The lottery account
    /// 2. `[]` The system program
    EnterLottery {
        /// Lamports paid, at least the entrance fee
        amount: u64,
    },

    /// Report whether a draw should start; never writes. Meant for simulation.
    ///
    /// Accounts expected:
    /// 0. `[]` The lottery account
    CheckUpkeep { check_data: Vec<u8> },

    /// Close entries and request randomness (anyone may call)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The keeper triggering the draw
    /// 1. `[writable]` The lottery account
    PerformUpkeep { perform_data: Vec<u8> },

    /// Deliver randomness for a pending request and pay the winner
    ///
    /// Accounts expected:
    /// 0. `[signer]` The oracle authority
    /// 1. `[writable]` The lottery account
    /// 2. `[writable]` The drawn entrant, receives the pool
    FulfillRandomWords {
        request_id: u64,
        random_words: Vec<u64>,
    },

    /// Replace a randomness request the oracle never answered (admin only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The lottery admin
    /// 1. `[writable]` The lottery account
    ReissueRequest {},
}

impl LotteryInstruction {
    /// Unpacks a byte buffer into a LotteryInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input
            .split_first()
            .ok_or(ProgramError::InvalidInstructionData)?;

        Ok(match tag {
            0 => Self::unpack_initialize(rest)?,
            1 => {
                let (amount, _) = Self::unpack_u64(rest)?;
                Self::EnterLottery { amount }
            }
            2 => {
                let (check_data, _) = Self::unpack_bytes(rest)?;
                Self::CheckUpkeep { check_data }
            }
            3 => {
                let (perform_data, _) = Self::unpack_bytes(rest)?;
                Self::PerformUpkeep { perform_data }
            }
            4 => {
                let (request_id, rest) = Self::unpack_u64(rest)?;
                let (random_words, _) = Self::unpack_words(rest)?;
                Self::FulfillRandomWords {
                    request_id,
                    random_words,
                }
            }
            5 => Self::ReissueRequest {},
            _ => return Err(ProgramError::InvalidInstructionData),
        })
    }

    /// Packs a LotteryInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(size_of::<Self>());
        match self {
            Self::InitializeLottery {
                entrance_fee,
                interval,
                oracle,
            } => {
                buf.push(0);
                buf.extend_from_slice(&entrance_fee.to_le_bytes());
                buf.extend_from_slice(&interval.to_le_bytes());
                buf.extend_from_slice(&oracle.key_hash);
                buf.extend_from_slice(&oracle.subscription_id.to_le_bytes());
                buf.extend_from_slice(&oracle.request_confirmations.to_le_bytes());
                buf.extend_from_slice(&oracle.callback_gas_limit.to_le_bytes());
                buf.extend_from_slice(&oracle.num_words.to_le_bytes());
            }
            Self::EnterLottery { amount } => {
                buf.push(1);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::CheckUpkeep { check_data } => {
                buf.push(2);
                Self::pack_bytes(check_data, &mut buf);
            }
            Self::PerformUpkeep { perform_data } => {
                buf.push(3);
                Self::pack_bytes(perform_data, &mut buf);
            }
            Self::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                buf.push(4);
                buf.extend_from_slice(&request_id.to_le_bytes());
                buf.extend_from_slice(&(random_words.len() as u32).to_le_bytes());
                for word in random_words {
                    buf.extend_from_slice(&word.to_le_bytes());
                }
            }
            Self::ReissueRequest {} => buf.push(5),
        }
        buf
    }

    fn unpack_initialize(input: &[u8]) -> Result<Self, ProgramError> {
        const LEN: usize = 8 + 8 + OracleParams::LEN;
        if input.len() < LEN {
            return Err(ProgramError::InvalidInstructionData);
        }

        let src = array_ref![input, 0, LEN];
        let (
            entrance_fee,
            interval,
            key_hash,
            subscription_id,
            request_confirmations,
            callback_gas_limit,
            num_words,
        ) = array_refs![src, 8, 8, 32, 8, 2, 4, 4];

        Ok(Self::InitializeLottery {
            entrance_fee: u64::from_le_bytes(*entrance_fee),
            interval: UnixTimestamp::from_le_bytes(*interval),
            oracle: OracleParams {
                key_hash: *key_hash,
                subscription_id: u64::from_le_bytes(*subscription_id),
                request_confirmations: u16::from_le_bytes(*request_confirmations),
                callback_gas_limit: u32::from_le_bytes(*callback_gas_limit),
                num_words: u32::from_le_bytes(*num_words),
            },
        })
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        let value = input
            .get(..8)
            .and_then(|slice| slice.try_into().ok())
            .map(u64::from_le_bytes)
            .ok_or(ProgramError::InvalidInstructionData)?;
        Ok((value, &input[8..]))
    }

    fn unpack_len(input: &[u8]) -> Result<(usize, &[u8]), ProgramError> {
        let len = input
            .get(..4)
            .and_then(|slice| slice.try_into().ok())
            .map(u32::from_le_bytes)
            .ok_or(ProgramError::InvalidInstructionData)?;
        Ok((len as usize, &input[4..]))
    }

    fn unpack_bytes(input: &[u8]) -> Result<(Vec<u8>, &[u8]), ProgramError> {
        let (len, rest) = Self::unpack_len(input)?;
        if len > MAX_UPKEEP_DATA_LEN || rest.len() < len {
            return Err(ProgramError::InvalidInstructionData);
        }
        let (bytes, rest) = rest.split_at(len);
        Ok((bytes.to_vec(), rest))
    }

    fn unpack_words(input: &[u8]) -> Result<(Vec<u64>, &[u8]), ProgramError> {
        let (count, mut rest) = Self::unpack_len(input)?;
        if count > MAX_NUM_WORDS as usize {
            return Err(ProgramError::InvalidInstructionData);
        }
        let mut words = Vec::with_capacity(count);
        for _ in 0..count {
            let (word, next) = Self::unpack_u64(rest)?;
            words.push(word);
            rest = next;
        }
        Ok((words, rest))
    }

    fn pack_bytes(bytes: &[u8], buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(bytes);
    }
}

/// Create initialize_lottery instruction; the lottery lands at the admin's PDA
pub fn initialize_lottery(
    program_id: &Pubkey,
    admin: &Pubkey,
    config: &LotteryConfig,
) -> Instruction {
    let (lottery, _) = find_lottery_address(program_id, admin);
    let data = LotteryInstruction::InitializeLottery {
        entrance_fee: config.entrance_fee,
        interval: config.interval,
        oracle: config.oracle,
    }
    .pack();

    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*admin, true),
            AccountMeta::new(lottery, false),
            AccountMeta::new_readonly(config.oracle_authority, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data,
    }
}

/// Create enter_lottery instruction
pub fn enter_lottery(
    program_id: &Pubkey,
    player: &Pubkey,
    lottery: &Pubkey,
    amount: u64,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*player, true),
            AccountMeta::new(*lottery, false),
            AccountMeta::new_readonly(system_program::id(), false),
        ],
        data: LotteryInstruction::EnterLottery { amount }.pack(),
    }
}

/// Create check_upkeep instruction
pub fn check_upkeep(program_id: &Pubkey, lottery: &Pubkey, check_data: Vec<u8>) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(*lottery, false)],
        data: LotteryInstruction::CheckUpkeep { check_data }.pack(),
    }
}

/// Create perform_upkeep instruction
pub fn perform_upkeep(
    program_id: &Pubkey,
    keeper: &Pubkey,
    lottery: &Pubkey,
    perform_data: Vec<u8>,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*keeper, true),
            AccountMeta::new(*lottery, false),
        ],
        data: LotteryInstruction::PerformUpkeep { perform_data }.pack(),
    }
}

/// Create fulfill_random_words instruction
pub fn fulfill_random_words(
    program_id: &Pubkey,
    oracle: &Pubkey,
    lottery: &Pubkey,
    winner: &Pubkey,
    request_id: u64,
    random_words: Vec<u64>,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*oracle, true),
            AccountMeta::new(*lottery, false),
            AccountMeta::new(*winner, false),
        ],
        data: LotteryInstruction::FulfillRandomWords {
            request_id,
            random_words,
        }
        .pack(),
    }
}

/// Create reissue_request instruction
pub fn reissue_request(program_id: &Pubkey, admin: &Pubkey, lottery: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new(*lottery, false),
        ],
        data: LotteryInstruction::ReissueRequest {}.pack(),
    }
}
