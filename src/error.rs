use solana_program::{
    decode_error::DecodeError, msg, program_error::PrintProgramError, program_error::ProgramError,
};
use thiserror::Error;

/// Errors that may be returned by the lottery program.
///
/// Codes are grouped by the stage that rejects the call: admission (0x100),
/// upkeep (0x200), settlement (0x300) and configuration/authority (0x400).
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum LotteryError {
    // Admission
    /// Payment is below the configured entrance fee
    #[error("Entry amount is below the entrance fee")]
    InsufficientFee = 0x100,

    /// Entries are only accepted while the lottery is open
    #[error("Lottery is not open")]
    NotOpen = 0x101,

    /// The round already holds the maximum number of entrants
    #[error("Lottery round is full")]
    LotteryFull = 0x102,

    /// The pooled balance would overflow
    #[error("Pool balance overflow")]
    AmountOverflow = 0x103,

    // Upkeep
    /// The draw conditions are not met
    #[error("Upkeep not needed")]
    UpkeepNotNeeded = 0x200,

    /// There is no outstanding randomness request to replace
    #[error("No pending randomness request")]
    NoPendingRequest = 0x201,

    // Settlement
    /// The request id is not bound to the current round
    #[error("Unknown randomness request")]
    UnknownRequest = 0x300,

    /// The prize could not be moved to the winner
    #[error("Prize transfer failed")]
    TransferFailed = 0x301,

    /// The supplied winner account is not the drawn entrant
    #[error("Winner account does not match the drawn entrant")]
    WinnerMismatch = 0x302,

    /// The oracle delivered the wrong number of random words
    #[error("Invalid random words")]
    InvalidRandomWords = 0x303,

    /// Only the configured oracle authority may fulfill requests
    #[error("Caller is not the oracle authority")]
    UnauthorizedOracle = 0x304,

    // Configuration
    /// Rejected lottery parameters
    #[error("Invalid lottery configuration")]
    InvalidConfig = 0x400,

    /// Only the lottery admin can perform this action
    #[error("Only the lottery admin can perform this action")]
    NotLotteryAdmin = 0x401,
}

impl From<LotteryError> for ProgramError {
    fn from(e: LotteryError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for LotteryError {
    fn type_of() -> &'static str {
        "Lottery Error"
    }
}

impl PrintProgramError for LotteryError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}
