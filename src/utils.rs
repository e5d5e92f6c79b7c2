use solana_program::{native_token::LAMPORTS_PER_SOL, pubkey::Pubkey};

pub const LOTTERY_SEED: &[u8] = b"lottery";

/// Find the program derived address holding an admin's lottery
pub fn find_lottery_address(program_id: &Pubkey, admin: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[LOTTERY_SEED, admin.as_ref()], program_id)
}

/// Convert lamports to SOL (for display purposes)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Convert SOL to lamports
pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL as f64).round() as u64
}
