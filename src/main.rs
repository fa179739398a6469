use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use clap::{Parser, Subcommand};
use ed25519_dalek::SigningKey;
use rand::{rngs::OsRng, RngCore};

use lotto_cli::entropy::OsBeacon;
use lotto_cli::lottery::{Lottery, LotteryConfig};
use lotto_cli::receipt::{RoundReceipt, SignedRoundReceipt};

/// Pooled-betting ledger over a JSON state file.
///
/// Amounts are minimal credit units: 1 credit = 100_000_000 units.
#[derive(Parser)]
#[command(name = "lotto", version, about)]
struct Cli {
    /// Path to the ledger state file.
    #[arg(long, global = true, default_value = "lotto_state.json")]
    state: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a fresh ledger state file.
    Init {
        #[arg(long, default_value = "Lottery Token")]
        token_name: String,
        #[arg(long, default_value = "LT0")]
        token_symbol: String,
        /// Credits minted per unit of deposited base currency.
        #[arg(long, default_value_t = 1)]
        ratio: u64,
        /// Per-stake amount that feeds the prize pool.
        #[arg(long)]
        price: u64,
        /// Per-stake amount that feeds the operator pool.
        #[arg(long)]
        fee: u64,
        /// Identity allowed to open rounds and withdraw fees.
        #[arg(long)]
        operator: String,
    },
    /// Print pools, round status, and balances.
    Status,
    /// Purchase credits with base currency.
    Buy {
        #[arg(long = "as")]
        caller: String,
        #[arg(long)]
        deposit: u64,
    },
    /// Allow the lottery vault to spend the caller's credits.
    Approve {
        #[arg(long = "as")]
        caller: String,
        #[arg(long)]
        amount: u64,
    },
    /// Open a betting round (operator only).
    Open {
        #[arg(long = "as")]
        caller: String,
        /// Unix-seconds deadline after which the round may be closed.
        #[arg(long)]
        closing_time: u64,
    },
    /// Place a single stake.
    Bet {
        #[arg(long = "as")]
        caller: String,
    },
    /// Place several stakes atomically.
    BetMany {
        #[arg(long = "as")]
        caller: String,
        #[arg(long)]
        count: u64,
    },
    /// Close the round and settle the winner.
    Close {
        /// 32-byte ed25519 secret key in hex; when given, a signed round
        /// receipt is written next to the state file (or to --receipt-out).
        #[arg(long)]
        sk_hex: Option<String>,
        #[arg(long)]
        receipt_out: Option<PathBuf>,
    },
    /// Withdraw winnings.
    PrizeWithdraw {
        #[arg(long = "as")]
        caller: String,
    },
    /// Withdraw the accumulated fee pool (operator only).
    OwnerWithdraw {
        #[arg(long = "as")]
        caller: String,
    },
    /// Burn all credits and redeem base currency.
    ReturnTokens {
        #[arg(long = "as")]
        caller: String,
    },
    /// Generate an operator keypair (sk.hex / pk.hex).
    Keygen {
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Check a signed round receipt.
    VerifyReceipt {
        #[arg(long)]
        receipt: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Command::Init {
            token_name,
            token_symbol,
            ratio,
            price,
            fee,
            operator,
        } => {
            let lottery = Lottery::new(LotteryConfig {
                token_name,
                token_symbol,
                ratio,
                stake_price: price,
                stake_fee: fee,
                operator,
            });
            save_state(&cli.state, &lottery)?;
            println!("ledger initialized → {}", cli.state.display());
        }
        Command::Status => {
            let lottery = load_state(&cli.state)?;
            println!("round open    : {}", lottery.is_open());
            if lottery.is_open() {
                println!("closing time  : {}", lottery.closing_time());
            }
            println!("stakes        : {}", lottery.stake_count());
            println!("prize pool    : {}", lottery.prize_pool());
            println!("operator pool : {}", lottery.operator_pool());
            println!("rounds closed : {}", lottery.rounds_closed());
            println!("base reserve  : {}", lottery.base_reserve());
            println!("audit digest  : {}", hex::encode(lottery.audit_digest()));
            for (account, balance) in lottery.token().balances() {
                println!("  {account}: {balance}");
            }
        }
        Command::Buy { caller, deposit } => {
            let mut lottery = load_state(&cli.state)?;
            let minted = lottery.purchase_credits(&caller, deposit)?;
            save_state(&cli.state, &lottery)?;
            println!("{caller} minted {minted} credit units");
        }
        Command::Approve { caller, amount } => {
            let mut lottery = load_state(&cli.state)?;
            lottery.approve_stakes(&caller, amount);
            save_state(&cli.state, &lottery)?;
            println!("{caller} approved {amount} units for staking");
        }
        Command::Open {
            caller,
            closing_time,
        } => {
            let mut lottery = load_state(&cli.state)?;
            lottery.open_bets(&caller, closing_time, unix_now())?;
            save_state(&cli.state, &lottery)?;
            println!("round open until {closing_time}");
        }
        Command::Bet { caller } => {
            let mut lottery = load_state(&cli.state)?;
            lottery.bet(&caller, unix_now())?;
            save_state(&cli.state, &lottery)?;
            println!(
                "stake placed — {} slot(s), prize pool {}",
                lottery.stake_count(),
                lottery.prize_pool()
            );
        }
        Command::BetMany { caller, count } => {
            let mut lottery = load_state(&cli.state)?;
            lottery.bet_many(&caller, count, unix_now())?;
            save_state(&cli.state, &lottery)?;
            println!(
                "{count} stakes placed — {} slot(s), prize pool {}",
                lottery.stake_count(),
                lottery.prize_pool()
            );
        }
        Command::Close {
            sk_hex,
            receipt_out,
        } => {
            let mut lottery = load_state(&cli.state)?;
            let mut beacon = OsBeacon::new();
            let outcome = lottery.close_lottery(&mut beacon, unix_now())?;
            let receipt = RoundReceipt::from_outcome(&outcome, lottery.audit_digest());
            save_state(&cli.state, &lottery)?;
            match &outcome.winner {
                Some(winner) => println!(
                    "round {} closed — winner {winner}, prize {}",
                    outcome.round, outcome.prize
                ),
                None => println!("round {} closed — no stakes, no winner", outcome.round),
            }
            if let Some(sk_hex) = sk_hex {
                let key = signing_key_from_hex(&sk_hex)?;
                let signed = SignedRoundReceipt::sign(receipt, &key);
                let out = receipt_out.unwrap_or_else(|| receipt_path(&cli.state, outcome.round));
                fs::write(&out, serde_json::to_vec_pretty(&signed)?)?;
                println!("signed receipt written → {}", out.display());
            }
        }
        Command::PrizeWithdraw { caller } => {
            let mut lottery = load_state(&cli.state)?;
            let amount = lottery.prize_withdraw(&caller)?;
            save_state(&cli.state, &lottery)?;
            println!("{caller} withdrew {amount} credit units");
        }
        Command::OwnerWithdraw { caller } => {
            let mut lottery = load_state(&cli.state)?;
            let amount = lottery.owner_withdraw(&caller)?;
            save_state(&cli.state, &lottery)?;
            println!("operator withdrew {amount} credit units");
        }
        Command::ReturnTokens { caller } => {
            let mut lottery = load_state(&cli.state)?;
            let refunded = lottery.return_tokens(&caller)?;
            save_state(&cli.state, &lottery)?;
            println!("{caller} redeemed {refunded} base currency units");
        }
        Command::Keygen { out_dir } => {
            let mut sk_bytes = [0u8; 32];
            OsRng.fill_bytes(&mut sk_bytes);
            let sk = SigningKey::from_bytes(&sk_bytes);
            let pk = sk.verifying_key();
            fs::create_dir_all(&out_dir)?;
            fs::write(out_dir.join("sk.hex"), hex::encode(sk_bytes))?;
            fs::write(out_dir.join("pk.hex"), hex::encode(pk.as_bytes()))?;
            println!("keypair written → {}", out_dir.display());
        }
        Command::VerifyReceipt { receipt } => {
            let raw = fs::read(&receipt)?;
            let signed: SignedRoundReceipt = serde_json::from_slice(&raw)?;
            signed.verify()?;
            println!(
                "receipt ok — round {}, winner {}, operator key {}",
                signed.receipt.round,
                signed.receipt.winner.as_deref().unwrap_or("(none)"),
                hex::encode(&signed.operator_key)
            );
        }
    }
    Ok(())
}

fn load_state(path: &Path) -> Result<Lottery, Box<dyn Error>> {
    let raw =
        fs::read(path).map_err(|err| format!("cannot read state file {}: {err}", path.display()))?;
    Ok(serde_json::from_slice(&raw)?)
}

fn save_state(path: &Path, lottery: &Lottery) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_vec_pretty(lottery)?)?;
    Ok(())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

fn signing_key_from_hex(sk_hex: &str) -> Result<SigningKey, Box<dyn Error>> {
    let bytes = hex::decode(sk_hex.trim())?;
    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| "secret key must be exactly 32 bytes (64 hex characters)")?;
    Ok(SigningKey::from_bytes(&bytes))
}

fn receipt_path(state: &Path, round: u64) -> PathBuf {
    let stem = state
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("lotto_state");
    state.with_file_name(format!("{stem}_receipt_{round:04}.json"))
}
