use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::AccountInfo,
    clock::UnixTimestamp,
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    program_pack::{IsInitialized, Sealed},
    pubkey::Pubkey,
};

use crate::config::LotteryConfig;
use crate::error::LotteryError;
use crate::events::LotteryEvent;
use crate::vrf::{self, RandomnessRequest};

/// Entrants a single round can hold; the lottery account is sized for this many
pub const MAX_ENTRANTS: usize = 100;

/// Lifecycle of a round
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LotteryState {
    /// Accepting entries
    Open,
    /// Entries closed, waiting for the oracle to answer
    Calculating,
}

/// The one outstanding randomness request
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    pub request_id: u64,
    /// Round this request settles
    pub round_id: u64,
}

/// Lottery account data: configuration plus the state of the current round
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct Lottery {
    /// Is the account initialized
    pub is_initialized: bool,
    /// Bump of the lottery PDA
    pub bump: u8,
    /// Creator of the lottery, allowed to re-issue a lost randomness request
    pub admin: Pubkey,
    pub config: LotteryConfig,
    pub state: LotteryState,
    /// Sequential id of the current round, starting at 1
    pub round_id: u64,
    /// Paid entries in arrival order; a player may appear more than once
    pub entrants: Vec<Pubkey>,
    /// Lamports escrowed for the current round, on top of the rent reserve
    pub pool_balance: u64,
    /// When the current round opened
    pub last_round_start: UnixTimestamp,
    pub recent_winner: Option<Pubkey>,
    pub pending_request: Option<PendingRequest>,
    /// Next randomness request id, never reused
    pub next_request_id: u64,
}

impl Sealed for Lottery {}

impl IsInitialized for Lottery {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Lottery {
    pub const LEN: usize = 1 // is_initialized
        + 1 // bump
        + 32 // admin
        + LotteryConfig::LEN
        + 1 // state
        + 8 // round_id
        + 4 + 32 * MAX_ENTRANTS // entrants
        + 8 // pool_balance
        + 8 // last_round_start
        + 1 + 32 // recent_winner
        + 1 + 16 // pending_request
        + 8; // next_request_id

    pub fn new(admin: Pubkey, bump: u8, config: LotteryConfig, now: UnixTimestamp) -> Self {
        Self {
            is_initialized: true,
            bump,
            admin,
            config,
            state: LotteryState::Open,
            round_id: 1,
            entrants: Vec::new(),
            pool_balance: 0,
            last_round_start: now,
            recent_winner: None,
            pending_request: None,
            next_request_id: 1,
        }
    }

    /// Read an initialized lottery out of an account owned by `program_id`
    pub fn load(account_info: &AccountInfo, program_id: &Pubkey) -> Result<Self, ProgramError> {
        if account_info.owner != program_id {
            msg!("Lottery account must be owned by the program");
            return Err(ProgramError::IncorrectProgramId);
        }

        let lottery = Self::from_account_data(&account_info.try_borrow_data()?)?;
        if !lottery.is_initialized {
            msg!("Lottery account is not initialized");
            return Err(ProgramError::UninitializedAccount);
        }

        Ok(lottery)
    }

    /// Decode account data; trailing capacity past the entrant list is ignored
    pub fn from_account_data(data: &[u8]) -> Result<Self, ProgramError> {
        Self::deserialize(&mut &data[..]).map_err(|_| ProgramError::InvalidAccountData)
    }

    pub fn save(&self, account_info: &AccountInfo) -> ProgramResult {
        let mut data = account_info.try_borrow_mut_data()?;
        self.serialize(&mut &mut data[..])
            .map_err(|_| ProgramError::AccountDataTooSmall)
    }

    pub fn entrance_fee(&self) -> u64 {
        self.config.entrance_fee
    }

    pub fn interval(&self) -> UnixTimestamp {
        self.config.interval
    }

    pub fn state(&self) -> LotteryState {
        self.state
    }

    pub fn recent_winner(&self) -> Option<Pubkey> {
        self.recent_winner
    }

    pub fn entrant(&self, index: usize) -> Option<&Pubkey> {
        self.entrants.get(index)
    }

    pub fn entrant_count(&self) -> usize {
        self.entrants.len()
    }

    pub fn pool_balance(&self) -> u64 {
        self.pool_balance
    }

    pub fn last_round_start(&self) -> UnixTimestamp {
        self.last_round_start
    }

    pub fn pending_request(&self) -> Option<PendingRequest> {
        self.pending_request
    }

    /// Add a paid entry to the current round
    pub fn enter(&mut self, player: Pubkey, amount: u64) -> Result<LotteryEvent, LotteryError> {
        if amount < self.config.entrance_fee {
            msg!(
                "Entry of {} lamports is below the {} lamport fee",
                amount,
                self.config.entrance_fee
            );
            return Err(LotteryError::InsufficientFee);
        }

        if self.state != LotteryState::Open {
            msg!("Lottery is calculating, entries are closed");
            return Err(LotteryError::NotOpen);
        }

        if self.entrants.len() >= MAX_ENTRANTS {
            msg!("Round already holds {} entrants", MAX_ENTRANTS);
            return Err(LotteryError::LotteryFull);
        }

        let pool_balance = self
            .pool_balance
            .checked_add(amount)
            .ok_or(LotteryError::AmountOverflow)?;

        self.entrants.push(player);
        self.pool_balance = pool_balance;

        Ok(LotteryEvent::EntryAccepted { player, amount })
    }

    /// Whether a draw should start at `now`. Never mutates.
    pub fn check_upkeep(&self, now: UnixTimestamp) -> bool {
        let is_open = self.state == LotteryState::Open;
        let time_passed = now.saturating_sub(self.last_round_start) >= self.config.interval;
        let has_players = !self.entrants.is_empty();
        let has_balance = self.pool_balance > 0;
        is_open && time_passed && has_players && has_balance
    }

    /// Close entries and request randomness for the current round.
    ///
    /// Re-runs `check_upkeep` so a stale or hostile trigger cannot force a draw.
    pub fn perform_upkeep(
        &mut self,
        now: UnixTimestamp,
    ) -> Result<RandomnessRequest, LotteryError> {
        if !self.check_upkeep(now) {
            msg!(
                "Upkeep not needed: balance={} players={} state={:?}",
                self.pool_balance,
                self.entrants.len(),
                self.state
            );
            return Err(LotteryError::UpkeepNotNeeded);
        }

        let request = vrf::request_random_words(
            &mut self.next_request_id,
            self.round_id,
            &self.config.oracle,
        );
        self.state = LotteryState::Calculating;
        self.pending_request = Some(PendingRequest {
            request_id: request.request_id,
            round_id: request.round_id,
        });

        Ok(request)
    }

    /// Replace a request the oracle never answered with a fresh one for the same round
    pub fn reissue_request(&mut self) -> Result<RandomnessRequest, LotteryError> {
        let stale = match self.pending_request {
            Some(pending) if self.state == LotteryState::Calculating => pending,
            _ => return Err(LotteryError::NoPendingRequest),
        };

        let request = vrf::request_random_words(
            &mut self.next_request_id,
            stale.round_id,
            &self.config.oracle,
        );
        self.pending_request = Some(PendingRequest {
            request_id: request.request_id,
            round_id: request.round_id,
        });

        msg!(
            "Request {} replaced by {}",
            stale.request_id,
            request.request_id
        );
        Ok(request)
    }

    /// The entrant a set of random words selects, if anyone has entered
    pub fn winner_for(&self, random_words: &[u64]) -> Option<Pubkey> {
        let word = *random_words.first()?;
        let index = vrf::winner_index(word, self.entrants.len())?;
        self.entrants.get(index).copied()
    }

    /// Settle the current round with the oracle's answer.
    ///
    /// `pay_out` moves the prize to the winner. The round is only reset once it
    /// succeeds; any error leaves the lottery exactly as it was.
    pub fn fulfill<F>(
        &mut self,
        request_id: u64,
        random_words: &[u64],
        now: UnixTimestamp,
        pay_out: F,
    ) -> Result<LotteryEvent, LotteryError>
    where
        F: FnOnce(&Pubkey, u64) -> Result<(), LotteryError>,
    {
        let round_id = self.round_id;
        self.pending_request
            .filter(|pending| pending.request_id == request_id && pending.round_id == round_id)
            .ok_or(LotteryError::UnknownRequest)?;

        if random_words.len() != self.config.oracle.num_words as usize {
            msg!(
                "Expected {} random words, got {}",
                self.config.oracle.num_words,
                random_words.len()
            );
            return Err(LotteryError::InvalidRandomWords);
        }

        let winner = self
            .winner_for(random_words)
            .ok_or(LotteryError::UnknownRequest)?;
        let prize = self.pool_balance;

        pay_out(&winner, prize)?;

        self.recent_winner = Some(winner);
        self.entrants.clear();
        self.pool_balance = 0;
        self.last_round_start = now.max(self.last_round_start);
        self.pending_request = None;
        self.state = LotteryState::Open;
        self.round_id += 1;

        Ok(LotteryEvent::WinnerPicked {
            winner,
            prize,
            round_id,
        })
    }
}
