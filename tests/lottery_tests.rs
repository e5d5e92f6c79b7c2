use solana_program::{instruction::Instruction, instruction::InstructionError, pubkey::Pubkey};
use solana_program_test::*;
use solana_sdk::{
    clock::Clock,
    signature::{Keypair, Signer},
    system_instruction,
    transaction::{Transaction, TransactionError},
};

use upkeep_lottery::{
    config::LotteryConfig,
    error::LotteryError,
    instruction,
    process_instruction,
    state::{Lottery, LotteryState, PendingRequest},
    utils::{find_lottery_address, sol_to_lamports},
};

const INTERVAL: i64 = 30;

struct TestLottery {
    context: ProgramTestContext,
    program_id: Pubkey,
    oracle: Keypair,
    lottery: Pubkey,
    entrance_fee: u64,
}

// Setup program test with an initialized lottery
async fn setup() -> TestLottery {
    let program_id = Pubkey::new_unique();
    let program_test = ProgramTest::new(
        "upkeep_lottery",
        program_id,
        processor!(process_instruction),
    );
    let mut context = program_test.start_with_context().await;

    let oracle = Keypair::new();
    let config = LotteryConfig::localnet(oracle.pubkey());
    let admin = context.payer.pubkey();
    let (lottery, _) = find_lottery_address(&program_id, &admin);

    process(
        &mut context,
        &[instruction::initialize_lottery(&program_id, &admin, &config)],
        &[],
    )
    .await
    .unwrap();

    TestLottery {
        context,
        program_id,
        oracle,
        lottery,
        entrance_fee: config.entrance_fee,
    }
}

fn signed_transaction(
    context: &ProgramTestContext,
    instructions: &[Instruction],
    signers: &[&Keypair],
) -> Transaction {
    let mut transaction = Transaction::new_with_payer(instructions, Some(&context.payer.pubkey()));
    transaction.partial_sign(&[&context.payer], context.last_blockhash);
    for signer in signers {
        transaction.partial_sign(&[*signer], context.last_blockhash);
    }
    transaction
}

async fn process(
    context: &mut ProgramTestContext,
    instructions: &[Instruction],
    signers: &[&Keypair],
) -> Result<(), TransactionError> {
    let transaction = signed_transaction(context, instructions, signers);
    context
        .banks_client
        .process_transaction(transaction)
        .await
        .map_err(|e| e.unwrap())
}

// Simulate a successful transaction, returning its log and return data
async fn simulate(
    context: &mut ProgramTestContext,
    instructions: &[Instruction],
    signers: &[&Keypair],
) -> (Vec<String>, Option<Vec<u8>>) {
    let transaction = signed_transaction(context, instructions, signers);
    let simulation = context
        .banks_client
        .simulate_transaction(transaction)
        .await
        .unwrap();
    assert_eq!(simulation.result, Some(Ok(())));
    let details = simulation.simulation_details.unwrap();
    (details.logs, details.return_data.map(|data| data.data))
}

fn count_logs(logs: &[String], prefix: &str) -> usize {
    let prefix = format!("Program log: {}", prefix);
    logs.iter().filter(|line| line.starts_with(&prefix)).count()
}

fn assert_lottery_error(error: TransactionError, expected: LotteryError) {
    assert_eq!(
        error,
        TransactionError::InstructionError(0, InstructionError::Custom(expected as u32))
    );
}

impl TestLottery {
    async fn funded_player(&mut self) -> Keypair {
        let player = Keypair::new();
        let payer = self.context.payer.pubkey();
        process(
            &mut self.context,
            &[system_instruction::transfer(
                &payer,
                &player.pubkey(),
                sol_to_lamports(1.0),
            )],
            &[],
        )
        .await
        .unwrap();
        player
    }

    async fn enter(&mut self, player: &Keypair, amount: u64) -> Result<(), TransactionError> {
        let ix =
            instruction::enter_lottery(&self.program_id, &player.pubkey(), &self.lottery, amount);
        process(&mut self.context, &[ix], &[player]).await
    }

    async fn check_upkeep(&mut self) -> Option<bool> {
        let ix = instruction::check_upkeep(&self.program_id, &self.lottery, vec![]);
        let (_, return_data) = simulate(&mut self.context, &[ix], &[]).await;
        instruction::unpack_upkeep_result(&return_data.unwrap_or_default())
    }

    async fn perform_upkeep(&mut self, perform_data: &[u8]) -> Result<(), TransactionError> {
        let keeper = self.context.payer.pubkey();
        let ix = instruction::perform_upkeep(
            &self.program_id,
            &keeper,
            &self.lottery,
            perform_data.to_vec(),
        );
        process(&mut self.context, &[ix], &[]).await
    }

    async fn fulfill(
        &mut self,
        winner: &Pubkey,
        request_id: u64,
        random_words: Vec<u64>,
    ) -> Result<(), TransactionError> {
        let ix = instruction::fulfill_random_words(
            &self.program_id,
            &self.oracle.pubkey(),
            &self.lottery,
            winner,
            request_id,
            random_words,
        );
        process(&mut self.context, &[ix], &[&self.oracle]).await
    }

    async fn lottery(&mut self) -> Lottery {
        let account = self
            .context
            .banks_client
            .get_account(self.lottery)
            .await
            .unwrap()
            .unwrap();
        Lottery::from_account_data(&account.data).unwrap()
    }

    async fn balance(&mut self, pubkey: &Pubkey) -> u64 {
        self.context.banks_client.get_balance(*pubkey).await.unwrap()
    }

    async fn advance_clock(&mut self, seconds: i64) {
        let mut clock: Clock = self.context.banks_client.get_sysvar().await.unwrap();
        clock.unix_timestamp += seconds;
        self.context.set_sysvar(&clock);
    }

    async fn pending_request_id(&mut self) -> u64 {
        self.lottery()
            .await
            .pending_request()
            .expect("request should be pending")
            .request_id
    }
}

#[tokio::test]
async fn test_initialize_lottery() {
    let mut test = setup().await;
    let lottery = test.lottery().await;

    assert!(lottery.is_initialized);
    assert_eq!(lottery.admin, test.context.payer.pubkey());
    assert_eq!(lottery.state(), LotteryState::Open);
    assert_eq!(lottery.entrance_fee(), sol_to_lamports(0.01));
    assert_eq!(lottery.interval(), INTERVAL);
    assert_eq!(lottery.config.oracle_authority, test.oracle.pubkey());
    assert_eq!(lottery.entrant_count(), 0);
    assert_eq!(lottery.recent_winner(), None);

    let rent = test.context.banks_client.get_rent().await.unwrap();
    let lottery_key = test.lottery;
    assert_eq!(
        test.balance(&lottery_key).await,
        rent.minimum_balance(Lottery::LEN)
    );
}

#[tokio::test]
async fn test_initialize_rejects_invalid_config() {
    let program_id = Pubkey::new_unique();
    let program_test = ProgramTest::new(
        "upkeep_lottery",
        program_id,
        processor!(process_instruction),
    );
    let mut context = program_test.start_with_context().await;

    let mut config = LotteryConfig::localnet(Pubkey::new_unique());
    config.entrance_fee = 0;
    let admin = context.payer.pubkey();

    let error = process(
        &mut context,
        &[instruction::initialize_lottery(&program_id, &admin, &config)],
        &[],
    )
    .await
    .unwrap_err();
    assert_lottery_error(error, LotteryError::InvalidConfig);
}

#[tokio::test]
async fn test_enter_lottery() {
    let mut test = setup().await;
    let player = test.funded_player().await;
    let fee = test.entrance_fee;
    let lottery_key = test.lottery;
    let player_before = test.balance(&player.pubkey()).await;
    let lottery_before = test.balance(&lottery_key).await;

    test.enter(&player, fee).await.unwrap();

    let lottery = test.lottery().await;
    assert_eq!(lottery.entrant_count(), 1);
    assert_eq!(lottery.entrant(0), Some(&player.pubkey()));
    assert_eq!(lottery.pool_balance(), fee);
    assert_eq!(test.balance(&player.pubkey()).await, player_before - fee);
    assert_eq!(test.balance(&lottery_key).await, lottery_before + fee);
}

#[tokio::test]
async fn test_enter_below_fee_fails() {
    let mut test = setup().await;
    let player = test.funded_player().await;
    let fee = test.entrance_fee;

    let error = test.enter(&player, fee - 1).await.unwrap_err();
    assert_lottery_error(error, LotteryError::InsufficientFee);

    let lottery = test.lottery().await;
    assert_eq!(lottery.entrant_count(), 0);
    assert_eq!(lottery.pool_balance(), 0);
}

#[tokio::test]
async fn test_initialize_prefunded_lottery_address() {
    let program_id = Pubkey::new_unique();
    let program_test = ProgramTest::new(
        "upkeep_lottery",
        program_id,
        processor!(process_instruction),
    );
    let mut context = program_test.start_with_context().await;

    let admin = context.payer.pubkey();
    let (lottery_key, _) = find_lottery_address(&program_id, &admin);
    process(
        &mut context,
        &[system_instruction::transfer(&admin, &lottery_key, 1_000_000)],
        &[],
    )
    .await
    .unwrap();

    let config = LotteryConfig::localnet(Pubkey::new_unique());
    process(
        &mut context,
        &[instruction::initialize_lottery(&program_id, &admin, &config)],
        &[],
    )
    .await
    .unwrap();

    let account = context
        .banks_client
        .get_account(lottery_key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.owner, program_id);
    assert_eq!(account.data.len(), Lottery::LEN);

    let rent = context.banks_client.get_rent().await.unwrap();
    assert_eq!(account.lamports, rent.minimum_balance(Lottery::LEN));

    let lottery = Lottery::from_account_data(&account.data).unwrap();
    assert!(lottery.is_initialized);
    assert_eq!(lottery.state(), LotteryState::Open);
    assert_eq!(lottery.entrance_fee(), config.entrance_fee);
}

#[tokio::test]
async fn test_check_upkeep_is_read_only() {
    let mut test = setup().await;
    let player = test.funded_player().await;
    let fee = test.entrance_fee;
    test.enter(&player, fee).await.unwrap();
    test.advance_clock(INTERVAL + 1).await;

    let before = test.lottery().await;
    let ix = instruction::check_upkeep(&test.program_id, &test.lottery, vec![]);
    process(&mut test.context, &[ix], &[]).await.unwrap();

    assert_eq!(test.lottery().await, before);
    assert_eq!(before.state(), LotteryState::Open);
}

#[tokio::test]
async fn test_check_upkeep_reports_verdict() {
    let mut test = setup().await;
    let ix = instruction::check_upkeep(&test.program_id, &test.lottery, vec![]);
    let (_, return_data) = simulate(&mut test.context, &[ix], &[]).await;
    assert_eq!(return_data, Some(vec![0, 1]));
    assert_eq!(test.check_upkeep().await, Some(false));

    let player = test.funded_player().await;
    let fee = test.entrance_fee;
    test.enter(&player, fee).await.unwrap();
    assert_eq!(test.check_upkeep().await, Some(false));

    test.advance_clock(INTERVAL + 1).await;
    assert_eq!(test.check_upkeep().await, Some(true));

    test.perform_upkeep(b"").await.unwrap();
    assert_eq!(test.check_upkeep().await, Some(false));
}

#[tokio::test]
async fn test_round_signals() {
    let mut test = setup().await;
    let player = test.funded_player().await;
    let fee = test.entrance_fee;

    let ix = instruction::enter_lottery(&test.program_id, &player.pubkey(), &test.lottery, fee);
    let (logs, _) = simulate(&mut test.context, &[ix], &[&player]).await;
    let entry = format!(
        "Program log: EntryAccepted: player={} amount={}",
        player.pubkey(),
        fee
    );
    assert!(logs.contains(&entry));
    assert_eq!(count_logs(&logs, "EntryAccepted:"), 1);
    test.enter(&player, fee).await.unwrap();

    test.advance_clock(INTERVAL + 1).await;
    let keeper = test.context.payer.pubkey();
    let ix = instruction::perform_upkeep(&test.program_id, &keeper, &test.lottery, vec![]);
    let (logs, _) = simulate(&mut test.context, &[ix], &[]).await;
    assert_eq!(count_logs(&logs, "RequestedRandomness:"), 1);
    let requested = "Program log: RequestedRandomness: request_id=1 round=1 words=1".to_string();
    assert!(logs.contains(&requested));
    test.perform_upkeep(b"").await.unwrap();

    let ix = instruction::fulfill_random_words(
        &test.program_id,
        &test.oracle.pubkey(),
        &test.lottery,
        &player.pubkey(),
        1,
        vec![42],
    );
    let (logs, _) = simulate(&mut test.context, &[ix], &[&test.oracle]).await;
    let picked = format!(
        "Program log: WinnerPicked: winner={} prize={} round=1",
        player.pubkey(),
        fee
    );
    assert!(logs.contains(&picked));
    assert_eq!(count_logs(&logs, "WinnerPicked:"), 1);
    assert_eq!(count_logs(&logs, "RequestedRandomness:"), 0);
}

#[tokio::test]
async fn test_perform_upkeep_before_interval_fails() {
    let mut test = setup().await;
    let player = test.funded_player().await;
    let fee = test.entrance_fee;
    test.enter(&player, fee).await.unwrap();
    test.advance_clock(INTERVAL - 1).await;

    let error = test.perform_upkeep(b"early").await.unwrap_err();
    assert_lottery_error(error, LotteryError::UpkeepNotNeeded);
    assert_eq!(test.lottery().await.state(), LotteryState::Open);
}

#[tokio::test]
async fn test_perform_upkeep_without_players_fails() {
    let mut test = setup().await;
    test.advance_clock(INTERVAL + 1).await;

    let error = test.perform_upkeep(b"").await.unwrap_err();
    assert_lottery_error(error, LotteryError::UpkeepNotNeeded);
}

#[tokio::test]
async fn test_single_entrant_round() {
    let mut test = setup().await;
    let player = test.funded_player().await;
    let fee = test.entrance_fee;
    let lottery_key = test.lottery;
    test.enter(&player, fee).await.unwrap();
    let started = test.lottery().await.last_round_start();

    test.advance_clock(INTERVAL + 1).await;
    test.perform_upkeep(b"").await.unwrap();

    let lottery = test.lottery().await;
    assert_eq!(lottery.state(), LotteryState::Calculating);
    assert_eq!(
        lottery.pending_request(),
        Some(PendingRequest {
            request_id: 1,
            round_id: 1
        })
    );

    let player_before = test.balance(&player.pubkey()).await;
    test.fulfill(&player.pubkey(), 1, vec![42]).await.unwrap();

    let lottery = test.lottery().await;
    assert_eq!(lottery.recent_winner(), Some(player.pubkey()));
    assert_eq!(lottery.state(), LotteryState::Open);
    assert_eq!(lottery.entrant_count(), 0);
    assert_eq!(lottery.pool_balance(), 0);
    assert!(lottery.last_round_start() > started);
    assert_eq!(test.balance(&player.pubkey()).await, player_before + fee);

    let rent = test.context.banks_client.get_rent().await.unwrap();
    assert_eq!(
        test.balance(&lottery_key).await,
        rent.minimum_balance(Lottery::LEN)
    );
}

#[tokio::test]
async fn test_no_entries_or_second_upkeep_while_calculating() {
    let mut test = setup().await;
    let player = test.funded_player().await;
    let fee = test.entrance_fee;
    test.enter(&player, fee).await.unwrap();
    test.advance_clock(INTERVAL + 1).await;
    test.perform_upkeep(b"first").await.unwrap();

    let late = test.funded_player().await;
    let error = test.enter(&late, fee).await.unwrap_err();
    assert_lottery_error(error, LotteryError::NotOpen);

    let error = test.perform_upkeep(b"second").await.unwrap_err();
    assert_lottery_error(error, LotteryError::UpkeepNotNeeded);

    let lottery = test.lottery().await;
    assert_eq!(lottery.entrant_count(), 1);
    assert_eq!(test.pending_request_id().await, 1);
}

#[tokio::test]
async fn test_four_entrants_winner_is_word_mod_four() {
    let mut test = setup().await;
    let fee = test.entrance_fee;
    let mut players = Vec::new();
    for _ in 0..4 {
        let player = test.funded_player().await;
        test.enter(&player, fee).await.unwrap();
        players.push(player);
    }
    assert_eq!(test.lottery().await.pool_balance(), sol_to_lamports(0.04));

    test.advance_clock(INTERVAL + 1).await;
    test.perform_upkeep(b"").await.unwrap();
    let request_id = test.pending_request_id().await;

    let word = 1_000_003u64;
    let expected = players[(word % 4) as usize].pubkey();
    let wrong = players[((word + 1) % 4) as usize].pubkey();

    let error = test.fulfill(&wrong, request_id, vec![word]).await.unwrap_err();
    assert_lottery_error(error, LotteryError::WinnerMismatch);
    assert_eq!(test.lottery().await.state(), LotteryState::Calculating);

    let before = test.balance(&expected).await;
    test.fulfill(&expected, request_id, vec![word]).await.unwrap();

    assert_eq!(test.lottery().await.recent_winner(), Some(expected));
    assert_eq!(
        test.balance(&expected).await,
        before + sol_to_lamports(0.04)
    );
}

#[tokio::test]
async fn test_fulfill_unknown_or_replayed_request_fails() {
    let mut test = setup().await;
    let player = test.funded_player().await;
    let fee = test.entrance_fee;
    test.enter(&player, fee).await.unwrap();
    test.advance_clock(INTERVAL + 1).await;

    let error = test.fulfill(&player.pubkey(), 1, vec![1]).await.unwrap_err();
    assert_lottery_error(error, LotteryError::UnknownRequest);

    test.perform_upkeep(b"").await.unwrap();
    let error = test.fulfill(&player.pubkey(), 2, vec![1]).await.unwrap_err();
    assert_lottery_error(error, LotteryError::UnknownRequest);
    assert_eq!(test.lottery().await.state(), LotteryState::Calculating);

    test.fulfill(&player.pubkey(), 1, vec![2]).await.unwrap();
    let settled = test.lottery().await;

    let error = test.fulfill(&player.pubkey(), 1, vec![3]).await.unwrap_err();
    assert_lottery_error(error, LotteryError::UnknownRequest);
    assert_eq!(test.lottery().await, settled);
}

#[tokio::test]
async fn test_fulfill_requires_oracle_authority() {
    let mut test = setup().await;
    let player = test.funded_player().await;
    let fee = test.entrance_fee;
    test.enter(&player, fee).await.unwrap();
    test.advance_clock(INTERVAL + 1).await;
    test.perform_upkeep(b"").await.unwrap();

    let impostor = Keypair::new();
    let ix = instruction::fulfill_random_words(
        &test.program_id,
        &impostor.pubkey(),
        &test.lottery,
        &player.pubkey(),
        1,
        vec![0],
    );
    let error = process(&mut test.context, &[ix], &[&impostor])
        .await
        .unwrap_err();
    assert_lottery_error(error, LotteryError::UnauthorizedOracle);
    assert_eq!(test.lottery().await.state(), LotteryState::Calculating);
}

#[tokio::test]
async fn test_failed_transfer_keeps_round_calculating() {
    let mut test = setup().await;
    let player = test.funded_player().await;
    let fee = test.entrance_fee;
    test.enter(&player, fee).await.unwrap();
    test.advance_clock(INTERVAL + 1).await;
    test.perform_upkeep(b"").await.unwrap();
    let pending = test.lottery().await;

    let mut ix = instruction::fulfill_random_words(
        &test.program_id,
        &test.oracle.pubkey(),
        &test.lottery,
        &player.pubkey(),
        1,
        vec![42],
    );
    ix.accounts[2].is_writable = false;
    let error = process(&mut test.context, &[ix], &[&test.oracle])
        .await
        .unwrap_err();
    assert_lottery_error(error, LotteryError::TransferFailed);

    let lottery = test.lottery().await;
    assert_eq!(lottery, pending);
    assert_eq!(lottery.state(), LotteryState::Calculating);
    assert_eq!(lottery.pool_balance(), fee);

    test.fulfill(&player.pubkey(), 1, vec![42]).await.unwrap();
    assert_eq!(test.lottery().await.recent_winner(), Some(player.pubkey()));
}

#[tokio::test]
async fn test_reissue_request_recovers_lost_callback() {
    let mut test = setup().await;
    let player = test.funded_player().await;
    let fee = test.entrance_fee;
    test.enter(&player, fee).await.unwrap();
    test.advance_clock(INTERVAL + 1).await;
    test.perform_upkeep(b"").await.unwrap();

    let stranger = test.funded_player().await;
    let ix = instruction::reissue_request(&test.program_id, &stranger.pubkey(), &test.lottery);
    let error = process(&mut test.context, &[ix], &[&stranger])
        .await
        .unwrap_err();
    assert_lottery_error(error, LotteryError::NotLotteryAdmin);

    let admin = test.context.payer.pubkey();
    let ix = instruction::reissue_request(&test.program_id, &admin, &test.lottery);
    process(&mut test.context, &[ix], &[]).await.unwrap();
    assert_eq!(test.pending_request_id().await, 2);

    let error = test.fulfill(&player.pubkey(), 1, vec![5]).await.unwrap_err();
    assert_lottery_error(error, LotteryError::UnknownRequest);

    test.fulfill(&player.pubkey(), 2, vec![5]).await.unwrap();
    assert_eq!(test.lottery().await.state(), LotteryState::Open);
}

#[tokio::test]
async fn test_rounds_repeat() {
    let mut test = setup().await;
    let fee = test.entrance_fee;
    let first = test.funded_player().await;
    test.enter(&first, fee).await.unwrap();
    test.advance_clock(INTERVAL + 1).await;
    test.perform_upkeep(b"round one").await.unwrap();
    test.fulfill(&first.pubkey(), 1, vec![0]).await.unwrap();

    let second = test.funded_player().await;
    test.enter(&second, fee).await.unwrap();
    let error = test.perform_upkeep(b"too soon").await.unwrap_err();
    assert_lottery_error(error, LotteryError::UpkeepNotNeeded);

    test.advance_clock(INTERVAL + 1).await;
    test.perform_upkeep(b"round two").await.unwrap();
    let lottery = test.lottery().await;
    assert_eq!(
        lottery.pending_request(),
        Some(PendingRequest {
            request_id: 2,
            round_id: 2
        })
    );

    test.fulfill(&second.pubkey(), 2, vec![0]).await.unwrap();
    assert_eq!(test.lottery().await.recent_winner(), Some(second.pubkey()));
}
