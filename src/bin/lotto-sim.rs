//! Seeded Monte Carlo run of the round ledger: many rounds, several players,
//! random stake counts. Reports per-player win frequency against stake share
//! and checks that settled prizes add up. Deterministic for a given --seed.

use clap::Parser;
use rand::{rngs::StdRng, Rng, SeedableRng};

use lotto_cli::entropy::EntropySource;
use lotto_cli::lottery::{Lottery, LotteryConfig};
use lotto_cli::token::CREDIT_SCALE;

#[derive(Parser)]
#[command(name = "lotto-sim", version, about)]
struct Args {
    #[arg(long, default_value_t = 5)]
    players: usize,
    #[arg(long, default_value_t = 1_000)]
    rounds: u64,
    /// Max stakes one player places per round (drawn uniformly from 0..=max).
    #[arg(long, default_value_t = 3)]
    stakes_max: u64,
    #[arg(long, default_value_t = 8 * CREDIT_SCALE / 10)]
    price: u64,
    #[arg(long, default_value_t = 2 * CREDIT_SCALE / 10)]
    fee: u64,
    #[arg(long, default_value_t = 7)]
    seed: u64,
}

struct SimBeacon(StdRng);

impl EntropySource for SimBeacon {
    fn draw(&mut self) -> u64 {
        self.0.gen()
    }
}

fn main() {
    let args = Args::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut beacon = SimBeacon(StdRng::seed_from_u64(args.seed.wrapping_add(1)));

    let mut lottery = Lottery::new(LotteryConfig {
        token_name: "Sim Credit".into(),
        token_symbol: "SIM".into(),
        ratio: 1,
        stake_price: args.price,
        stake_fee: args.fee,
        operator: "operator".into(),
    });

    let cost = args.price + args.fee;
    let bankroll = args.rounds * args.stakes_max * cost;
    let players: Vec<String> = (0..args.players).map(|i| format!("player-{i}")).collect();
    for player in &players {
        lottery
            .purchase_credits(player, bankroll)
            .expect("funding");
        lottery.approve_stakes(player, bankroll);
    }

    let mut stakes_placed = vec![0u64; args.players];
    let mut wins = vec![0u64; args.players];
    let mut total_stakes = 0u64;
    let mut rounds_with_stakes = 0u64;

    for round in 0..args.rounds {
        let now = 1 + round * 100;
        let closing = now + 60;
        lottery.open_bets("operator", closing, now).expect("open");
        for (idx, player) in players.iter().enumerate() {
            let count = rng.gen_range(0..=args.stakes_max);
            if count > 0 {
                lottery.bet_many(player, count, now).expect("bet");
                stakes_placed[idx] += count;
                total_stakes += count;
            }
        }
        if lottery.stake_count() > 0 {
            rounds_with_stakes += 1;
        }
        let outcome = lottery.close_lottery(&mut beacon, closing).expect("close");
        if let Some(winner) = outcome.winner {
            let idx = players.iter().position(|p| *p == winner).expect("player");
            wins[idx] += 1;
            lottery.prize_withdraw(&winner).expect("withdraw");
        }
    }

    println!(
        "{} rounds ({} with stakes), {} stakes total",
        args.rounds, rounds_with_stakes, total_stakes
    );
    println!("player        stakes   share    wins    win rate");
    for (idx, player) in players.iter().enumerate() {
        let share = stakes_placed[idx] as f64 / total_stakes.max(1) as f64;
        let rate = wins[idx] as f64 / rounds_with_stakes.max(1) as f64;
        println!(
            "{player:<12} {:>7} {:>7.3} {:>7} {:>9.3}",
            stakes_placed[idx], share, wins[idx], rate
        );
    }

    let expected_fees = args.fee * total_stakes;
    println!("operator pool : {} (expected {expected_fees})", lottery.operator_pool());
    assert_eq!(lottery.operator_pool(), expected_fees);
    assert_eq!(lottery.prize_pool(), 0);
    println!("audit digest  : {}", hex::encode(lottery.audit_digest()));
}
