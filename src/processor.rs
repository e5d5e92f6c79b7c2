use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::UnixTimestamp,
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::{clock::Clock, Sysvar},
};

use crate::config::{LotteryConfig, OracleParams};
use crate::error::LotteryError;
use crate::instruction::{pack_upkeep_result, LotteryInstruction};
use crate::state::Lottery;
use crate::utils::{find_lottery_address, lamports_to_sol, LOTTERY_SEED};
use crate::vrf;

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = LotteryInstruction::unpack(instruction_data)?;

        match instruction {
            LotteryInstruction::InitializeLottery {
                entrance_fee,
                interval,
                oracle,
            } => {
                msg!("Instruction: Initialize Lottery");
                Self::process_initialize_lottery(
                    accounts,
                    entrance_fee,
                    interval,
                    oracle,
                    program_id,
                )
            }
            LotteryInstruction::EnterLottery { amount } => {
                msg!("Instruction: Enter Lottery");
                Self::process_enter_lottery(accounts, amount, program_id)
            }
            LotteryInstruction::CheckUpkeep { check_data } => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(accounts, &check_data, program_id)
            }
            LotteryInstruction::PerformUpkeep { perform_data } => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(accounts, &perform_data, program_id)
            }
            LotteryInstruction::FulfillRandomWords {
                request_id,
                random_words,
            } => {
                msg!("Instruction: Fulfill Random Words");
                Self::process_fulfill_random_words(accounts, request_id, &random_words, program_id)
            }
            LotteryInstruction::ReissueRequest {} => {
                msg!("Instruction: Reissue Request");
                Self::process_reissue_request(accounts, program_id)
            }
        }
    }

    /// Creates the lottery PDA and stores its configuration.
    ///
    /// The configuration can not be changed afterwards.
    fn process_initialize_lottery(
        accounts: &[AccountInfo],
        entrance_fee: u64,
        interval: UnixTimestamp,
        oracle: OracleParams,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let oracle_authority_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !admin_info.is_signer {
            msg!("Admin must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (expected_lottery_pubkey, bump_seed) = find_lottery_address(program_id, admin_info.key);
        if *lottery_info.key != expected_lottery_pubkey {
            msg!("Invalid lottery account address");
            return Err(ProgramError::InvalidArgument);
        }

        if lottery_info.owner == program_id {
            msg!("Lottery account is already initialized");
            return Err(ProgramError::AccountAlreadyInitialized);
        }

        let config = LotteryConfig {
            entrance_fee,
            interval,
            oracle_authority: *oracle_authority_info.key,
            oracle,
        };
        config.validate()?;

        let bump = [bump_seed];
        let signer_seeds: &[&[u8]] = &[LOTTERY_SEED, admin_info.key.as_ref(), &bump];
        Self::create_lottery_account(
            admin_info,
            lottery_info,
            system_program_info,
            signer_seeds,
            program_id,
        )?;

        let now = Clock::get()?.unix_timestamp;
        let lottery = Lottery::new(*admin_info.key, bump_seed, config, now);
        lottery.save(lottery_info)?;

        msg!(
            "Lottery initialized: Admin={}, Oracle={}, EntranceFee={} SOL, Interval={}s",
            admin_info.key,
            oracle_authority_info.key,
            lamports_to_sol(entrance_fee),
            interval
        );
        Ok(())
    }

    fn process_enter_lottery(
        accounts: &[AccountInfo],
        amount: u64,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let player_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !player_info.is_signer {
            msg!("Player must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut lottery = Lottery::load(lottery_info, program_id)?;
        let event = lottery.enter(*player_info.key, amount)?;

        invoke(
            &system_instruction::transfer(player_info.key, lottery_info.key, amount),
            &[
                player_info.clone(),
                lottery_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        lottery.save(lottery_info)?;
        event.emit();
        Ok(())
    }

    /// Read-only: the verdict goes to the log and to the return data
    fn process_check_upkeep(
        accounts: &[AccountInfo],
        check_data: &[u8],
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let lottery_info = next_account_info(account_info_iter)?;

        let lottery = Lottery::load(lottery_info, program_id)?;
        let now = Clock::get()?.unix_timestamp;
        let upkeep_needed = lottery.check_upkeep(now);

        msg!(
            "Upkeep needed: {} (players={}, balance={}, check data {} bytes)",
            upkeep_needed,
            lottery.entrant_count(),
            lottery.pool_balance(),
            check_data.len()
        );
        set_return_data(&pack_upkeep_result(upkeep_needed));
        Ok(())
    }

    fn process_perform_upkeep(
        accounts: &[AccountInfo],
        perform_data: &[u8],
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let keeper_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;

        if !keeper_info.is_signer {
            msg!("Keeper must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut lottery = Lottery::load(lottery_info, program_id)?;
        let now = Clock::get()?.unix_timestamp;
        let request = lottery.perform_upkeep(now)?;
        lottery.save(lottery_info)?;

        msg!(
            "Draw triggered by {} ({} bytes of perform data)",
            keeper_info.key,
            perform_data.len()
        );
        request.event().emit();
        Ok(())
    }

    /// Oracle callback: picks the winner, pays the pool and opens the next round.
    ///
    /// Nothing is written unless the payout succeeds.
    fn process_fulfill_random_words(
        accounts: &[AccountInfo],
        request_id: u64,
        random_words: &[u64],
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let oracle_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        let mut lottery = Lottery::load(lottery_info, program_id)?;
        vrf::verify_oracle_authority(oracle_info, &lottery.config.oracle_authority)?;

        let now = Clock::get()?.unix_timestamp;
        let rent_reserve = Rent::get()?.minimum_balance(lottery_info.data_len());

        let event = lottery.fulfill(request_id, random_words, now, |winner, prize| {
            if winner != winner_info.key {
                msg!("Drawn entrant is {}, got {}", winner, winner_info.key);
                return Err(LotteryError::WinnerMismatch);
            }
            Self::pay_prize(lottery_info, winner_info, prize, rent_reserve)
        })?;

        lottery.save(lottery_info)?;
        event.emit();
        Ok(())
    }

    fn process_reissue_request(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let lottery_info = next_account_info(account_info_iter)?;

        if !admin_info.is_signer {
            msg!("Admin must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut lottery = Lottery::load(lottery_info, program_id)?;
        if lottery.admin != *admin_info.key {
            msg!("Only the lottery admin can reissue a request");
            return Err(LotteryError::NotLotteryAdmin.into());
        }

        let request = lottery.reissue_request()?;
        lottery.save(lottery_info)?;
        request.event().emit();
        Ok(())
    }

    /// Creates the lottery PDA owned by the program.
    ///
    /// The address is known in advance and may already hold lamports, in which
    /// case `create_account` would fail. Such an account is topped up to rent
    /// exemption, then allocated and assigned.
    fn create_lottery_account<'a>(
        payer_info: &AccountInfo<'a>,
        lottery_info: &AccountInfo<'a>,
        system_program_info: &AccountInfo<'a>,
        signer_seeds: &[&[u8]],
        program_id: &Pubkey,
    ) -> ProgramResult {
        let required_lamports = Rent::get()?.minimum_balance(Lottery::LEN);
        let current_lamports = lottery_info.lamports();

        if current_lamports == 0 {
            return invoke_signed(
                &system_instruction::create_account(
                    payer_info.key,
                    lottery_info.key,
                    required_lamports,
                    Lottery::LEN as u64,
                    program_id,
                ),
                &[
                    payer_info.clone(),
                    lottery_info.clone(),
                    system_program_info.clone(),
                ],
                &[signer_seeds],
            );
        }

        msg!(
            "Lottery address already holds {} lamports, allocating in place",
            current_lamports
        );
        let top_up = required_lamports.saturating_sub(current_lamports);
        if top_up > 0 {
            invoke(
                &system_instruction::transfer(payer_info.key, lottery_info.key, top_up),
                &[
                    payer_info.clone(),
                    lottery_info.clone(),
                    system_program_info.clone(),
                ],
            )?;
        }

        invoke_signed(
            &system_instruction::allocate(lottery_info.key, Lottery::LEN as u64),
            &[lottery_info.clone(), system_program_info.clone()],
            &[signer_seeds],
        )?;
        invoke_signed(
            &system_instruction::assign(lottery_info.key, program_id),
            &[lottery_info.clone(), system_program_info.clone()],
            &[signer_seeds],
        )
    }

    /// Moves `prize` lamports out of the lottery account, keeping its rent reserve
    fn pay_prize(
        lottery_info: &AccountInfo,
        winner_info: &AccountInfo,
        prize: u64,
        rent_reserve: u64,
    ) -> Result<(), LotteryError> {
        if !winner_info.is_writable {
            msg!("Winner account {} is not writable", winner_info.key);
            return Err(LotteryError::TransferFailed);
        }

        let remaining = lottery_info
            .lamports()
            .checked_sub(prize)
            .filter(|remaining| *remaining >= rent_reserve)
            .ok_or_else(|| {
                msg!(
                    "Lottery holds {} lamports, cannot pay {}",
                    lottery_info.lamports(),
                    prize
                );
                LotteryError::TransferFailed
            })?;
        let credited = winner_info
            .lamports()
            .checked_add(prize)
            .ok_or(LotteryError::TransferFailed)?;

        **lottery_info
            .try_borrow_mut_lamports()
            .map_err(|_| LotteryError::TransferFailed)? = remaining;
        **winner_info
            .try_borrow_mut_lamports()
            .map_err(|_| LotteryError::TransferFailed)? = credited;

        msg!(
            "Paid {} SOL to {}",
            lamports_to_sol(prize),
            winner_info.key
        );
        Ok(())
    }
}
