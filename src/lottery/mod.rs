use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::entropy::EntropySource;
use crate::token::{AccountId, Amount, CreditToken, TokenError};

#[derive(Debug, thiserror::Error)]
pub enum LotteryError {
    #[error("caller {caller} is not the operator")]
    Unauthorized { caller: AccountId },
    #[error("a betting round is already open")]
    RoundAlreadyOpen,
    #[error("the betting round is closed")]
    RoundClosed,
    #[error("no betting round is open")]
    RoundAlreadyClosed,
    #[error("closing time has not been reached yet")]
    TooEarly,
    #[error("closing time must be in the future")]
    InvalidDeadline,
    #[error("stake count must be at least 1")]
    InvalidStakeCount,
    #[error("insufficient credits: {required} required, {available} available")]
    InsufficientCredit { required: Amount, available: Amount },
    #[error("nothing to withdraw for {account}")]
    NothingToWithdraw { account: AccountId },
    #[error("account {account} holds no credits")]
    NoBalance { account: AccountId },
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Construction-time configuration (mirrors the deployment parameters of the
/// on-chain ancestor: token name/symbol/ratio plus per-stake pricing).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LotteryConfig {
    pub token_name: String,
    pub token_symbol: String,
    /// Credits minted per unit of deposited base currency.
    pub ratio: u64,
    /// Per-stake amount that goes to the prize pool.
    pub stake_price: Amount,
    /// Per-stake amount that goes to the operator pool.
    pub stake_fee: Amount,
    pub operator: AccountId,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LotteryEvent {
    CreditsPurchased {
        account: AccountId,
        deposit: Amount,
        minted: Amount,
    },
    RoundOpened {
        closing_time: u64,
    },
    StakePlaced {
        account: AccountId,
        count: u64,
    },
    RoundClosed {
        round: u64,
        winner: Option<AccountId>,
        prize: Amount,
        entropy: Option<u64>,
    },
    PrizeWithdrawn {
        account: AccountId,
        amount: Amount,
    },
    OperatorWithdrawn {
        amount: Amount,
    },
    CreditsReturned {
        account: AccountId,
        burned: Amount,
        refunded: Amount,
    },
}

/// What a single `close_lottery` settled; feeds receipt construction.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundOutcome {
    pub round: u64,
    pub closed_at: u64,
    pub stakes: u64,
    pub winner: Option<AccountId>,
    pub prize: Amount,
    pub entropy: Option<u64>,
}

/// The round ledger.
///
/// One value of this type is the whole system state: the credit issuer it is
/// mint authority for, the current round (flag, deadline, slots), and the
/// three independently tracked balances — prize pool, operator pool, and
/// per-winner payables. Every operation takes an explicit `now` timestamp;
/// deadline checks are plain data comparisons, never scheduling.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lottery {
    stake_price: Amount,
    stake_fee: Amount,
    operator: AccountId,
    /// Token account holding pooled stakes until settlement.
    vault: AccountId,
    bets_open: bool,
    closing_time: u64,
    slots: Vec<AccountId>,
    prize_pool: Amount,
    operator_pool: Amount,
    payable: BTreeMap<AccountId, Amount>,
    rounds_closed: u64,
    /// Base currency received from credit purchases, paid back on redemption.
    base_reserve: Amount,
    token: CreditToken,
    events: Vec<LotteryEvent>,
}

impl Lottery {
    pub fn new(config: LotteryConfig) -> Self {
        Self {
            stake_price: config.stake_price,
            stake_fee: config.stake_fee,
            operator: config.operator,
            vault: "lottery:vault".to_string(),
            bets_open: false,
            closing_time: 0,
            slots: Vec::new(),
            prize_pool: 0,
            operator_pool: 0,
            payable: BTreeMap::new(),
            rounds_closed: 0,
            base_reserve: 0,
            token: CreditToken::new(config.token_name, config.token_symbol, config.ratio),
            events: Vec::new(),
        }
    }

    // ── credit purchase / redemption ────────────────────────────────────

    /// Converts a base-currency deposit into credits for `account`.
    pub fn purchase_credits(
        &mut self,
        account: &str,
        deposit: Amount,
    ) -> Result<Amount, LotteryError> {
        let minted = self.token.purchase(account, deposit)?;
        self.base_reserve = self.base_reserve.saturating_add(deposit);
        self.events.push(LotteryEvent::CreditsPurchased {
            account: account.to_string(),
            deposit,
            minted,
        });
        Ok(minted)
    }

    /// Grants the vault spending rights over `amount` of `account`'s credits.
    pub fn approve_stakes(&mut self, account: &str, amount: Amount) {
        let vault = self.vault.clone();
        self.token.approve(account, &vault, amount);
    }

    /// Burns the caller's full credit balance and pays out the base currency
    /// it redeems from the ledger's reserve.
    pub fn return_tokens(&mut self, account: &str) -> Result<Amount, LotteryError> {
        let balance = self.token.balance_of(account);
        if balance == 0 {
            return Err(LotteryError::NoBalance {
                account: account.to_string(),
            });
        }
        let refunded = self.token.redeem(account, balance)?;
        self.base_reserve = self.base_reserve.saturating_sub(refunded);
        self.events.push(LotteryEvent::CreditsReturned {
            account: account.to_string(),
            burned: balance,
            refunded,
        });
        Ok(refunded)
    }

    // ── round lifecycle ─────────────────────────────────────────────────

    pub fn open_bets(
        &mut self,
        caller: &str,
        closing_time: u64,
        now: u64,
    ) -> Result<(), LotteryError> {
        self.require_operator(caller)?;
        if self.bets_open {
            return Err(LotteryError::RoundAlreadyOpen);
        }
        if closing_time <= now {
            return Err(LotteryError::InvalidDeadline);
        }
        self.bets_open = true;
        self.closing_time = closing_time;
        self.events.push(LotteryEvent::RoundOpened { closing_time });
        Ok(())
    }

    pub fn bet(&mut self, caller: &str, now: u64) -> Result<(), LotteryError> {
        self.place_stakes(caller, 1, now)
    }

    /// Places `count` stakes as one atomic operation: the total cost is
    /// validated upfront and transferred in a single call, so either all
    /// `count` slots are appended or none are.
    pub fn bet_many(&mut self, caller: &str, count: u64, now: u64) -> Result<(), LotteryError> {
        if count == 0 {
            return Err(LotteryError::InvalidStakeCount);
        }
        self.place_stakes(caller, count, now)
    }

    fn place_stakes(&mut self, caller: &str, count: u64, now: u64) -> Result<(), LotteryError> {
        if !self.bets_open || now >= self.closing_time {
            return Err(LotteryError::RoundClosed);
        }
        let cost = self.stake_price.saturating_add(self.stake_fee);
        let total = cost.saturating_mul(count);
        let available = self.token.balance_of(caller);
        if available < total {
            return Err(LotteryError::InsufficientCredit {
                required: total,
                available,
            });
        }
        // Single transfer keeps this atomic; the allowance check inside
        // transfer_from rejects the whole batch before any slot mutation.
        let vault = self.vault.clone();
        self.token.transfer_from(caller, &vault, &vault, total)?;
        for _ in 0..count {
            self.slots.push(caller.to_string());
        }
        self.prize_pool = self
            .prize_pool
            .saturating_add(self.stake_price.saturating_mul(count));
        self.operator_pool = self
            .operator_pool
            .saturating_add(self.stake_fee.saturating_mul(count));
        self.events.push(LotteryEvent::StakePlaced {
            account: caller.to_string(),
            count,
        });
        Ok(())
    }

    /// Closes the round, selecting a winner if any stakes were placed.
    ///
    /// Winner index is `entropy.draw() % slots.len()` — one deterministic
    /// computation given the draw. The prize is credited to the winner's
    /// payable balance; the operator pool is untouched.
    pub fn close_lottery<E: EntropySource>(
        &mut self,
        entropy: &mut E,
        now: u64,
    ) -> Result<RoundOutcome, LotteryError> {
        if !self.bets_open {
            return Err(LotteryError::RoundAlreadyClosed);
        }
        if now < self.closing_time {
            return Err(LotteryError::TooEarly);
        }

        let stakes = self.slots.len() as u64;
        let prize = self.prize_pool;
        let mut winner = None;
        let mut drawn = None;
        if !self.slots.is_empty() {
            let value = entropy.draw();
            let index = (value % self.slots.len() as u64) as usize;
            let account = self.slots[index].clone();
            let owed = self.payable.entry(account.clone()).or_default();
            *owed = owed.saturating_add(prize);
            winner = Some(account);
            drawn = Some(value);
        }

        self.bets_open = false;
        self.slots.clear();
        self.prize_pool = 0;
        self.rounds_closed += 1;

        self.events.push(LotteryEvent::RoundClosed {
            round: self.rounds_closed,
            winner: winner.clone(),
            prize,
            entropy: drawn,
        });
        Ok(RoundOutcome {
            round: self.rounds_closed,
            closed_at: now,
            stakes,
            winner,
            prize,
            entropy: drawn,
        })
    }

    // ── withdrawals ─────────────────────────────────────────────────────

    /// Pays out the caller's winnings. The payable entry is zeroed before
    /// the vault transfer so a nested withdrawal attempt observes nothing
    /// left to claim (checks-effects-interactions).
    pub fn prize_withdraw(&mut self, caller: &str) -> Result<Amount, LotteryError> {
        let amount = self.payable.get(caller).copied().unwrap_or(0);
        if amount == 0 {
            return Err(LotteryError::NothingToWithdraw {
                account: caller.to_string(),
            });
        }
        self.payable.remove(caller);
        let vault = self.vault.clone();
        if let Err(err) = self.token.transfer(&vault, caller, amount) {
            self.payable.insert(caller.to_string(), amount);
            return Err(err.into());
        }
        self.events.push(LotteryEvent::PrizeWithdrawn {
            account: caller.to_string(),
            amount,
        });
        Ok(amount)
    }

    /// Transfers the accumulated fee pool to the operator and resets it.
    pub fn owner_withdraw(&mut self, caller: &str) -> Result<Amount, LotteryError> {
        self.require_operator(caller)?;
        let amount = self.operator_pool;
        self.operator_pool = 0;
        if amount > 0 {
            let vault = self.vault.clone();
            if let Err(err) = self.token.transfer(&vault, caller, amount) {
                self.operator_pool = amount;
                return Err(err.into());
            }
        }
        self.events.push(LotteryEvent::OperatorWithdrawn { amount });
        Ok(amount)
    }

    // ── queries ─────────────────────────────────────────────────────────

    pub fn is_open(&self) -> bool {
        self.bets_open
    }

    pub fn closing_time(&self) -> u64 {
        self.closing_time
    }

    pub fn stake_count(&self) -> u64 {
        self.slots.len() as u64
    }

    pub fn slot_at(&self, index: usize) -> Option<&AccountId> {
        self.slots.get(index)
    }

    pub fn prize_pool(&self) -> Amount {
        self.prize_pool
    }

    pub fn operator_pool(&self) -> Amount {
        self.operator_pool
    }

    pub fn payable_to(&self, account: &str) -> Amount {
        self.payable.get(account).copied().unwrap_or(0)
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn vault(&self) -> &str {
        &self.vault
    }

    pub fn rounds_closed(&self) -> u64 {
        self.rounds_closed
    }

    pub fn base_reserve(&self) -> Amount {
        self.base_reserve
    }

    pub fn stake_price(&self) -> Amount {
        self.stake_price
    }

    pub fn stake_fee(&self) -> Amount {
        self.stake_fee
    }

    pub fn token(&self) -> &CreditToken {
        &self.token
    }

    pub fn events(&self) -> &[LotteryEvent] {
        &self.events
    }

    /// Sha256 over the full accounting state, in deterministic field and
    /// map order. Two ledgers with the same digest settled identically.
    pub fn audit_digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"lotto-state");
        hasher.update(self.stake_price.to_le_bytes());
        hasher.update(self.stake_fee.to_le_bytes());
        hasher.update([self.bets_open as u8]);
        hasher.update(self.closing_time.to_le_bytes());
        hasher.update(self.rounds_closed.to_le_bytes());
        hasher.update(self.prize_pool.to_le_bytes());
        hasher.update(self.operator_pool.to_le_bytes());
        hasher.update(self.base_reserve.to_le_bytes());
        for slot in &self.slots {
            hasher.update(b"slot");
            hasher.update(slot.as_bytes());
        }
        for (account, amount) in &self.payable {
            hasher.update(b"owed");
            hasher.update(account.as_bytes());
            hasher.update(amount.to_le_bytes());
        }
        for (account, amount) in self.token.balances() {
            hasher.update(b"bal");
            hasher.update(account.as_bytes());
            hasher.update(amount.to_le_bytes());
        }
        hasher.update(self.token.total_supply().to_le_bytes());
        hasher.finalize().into()
    }

    fn require_operator(&self, caller: &str) -> Result<(), LotteryError> {
        if caller != self.operator {
            return Err(LotteryError::Unauthorized {
                caller: caller.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::FixedEntropy;
    use crate::token::CREDIT_SCALE;

    const NOW: u64 = 1_000;
    const CLOSING: u64 = 1_060;
    const PRICE: Amount = 8 * CREDIT_SCALE / 10; // 0.8 credits
    const FEE: Amount = 2 * CREDIT_SCALE / 10; // 0.2 credits

    fn lottery() -> Lottery {
        Lottery::new(LotteryConfig {
            token_name: "Lottery Token".into(),
            token_symbol: "LT0".into(),
            ratio: 1,
            stake_price: PRICE,
            stake_fee: FEE,
            operator: "operator".into(),
        })
    }

    fn fund(lottery: &mut Lottery, account: &str, credits: Amount) {
        lottery.purchase_credits(account, credits).unwrap();
        lottery.approve_stakes(account, credits);
    }

    #[test]
    fn only_operator_opens_bets() {
        let mut lottery = lottery();
        let err = lottery.open_bets("mallory", CLOSING, NOW).unwrap_err();
        assert!(matches!(err, LotteryError::Unauthorized { .. }));
        assert!(!lottery.is_open());
    }

    #[test]
    fn open_rejects_running_round() {
        let mut lottery = lottery();
        lottery.open_bets("operator", CLOSING, NOW).unwrap();
        let err = lottery.open_bets("operator", CLOSING + 10, NOW).unwrap_err();
        assert!(matches!(err, LotteryError::RoundAlreadyOpen));
    }

    #[test]
    fn closing_time_must_be_in_the_future() {
        let mut lottery = lottery();
        let past = lottery.open_bets("operator", NOW - 60, NOW).unwrap_err();
        assert!(matches!(past, LotteryError::InvalidDeadline));
        let exact = lottery.open_bets("operator", NOW, NOW).unwrap_err();
        assert!(matches!(exact, LotteryError::InvalidDeadline));
    }

    #[test]
    fn open_updates_flag_and_closing_time() {
        let mut lottery = lottery();
        lottery.open_bets("operator", CLOSING, NOW).unwrap();
        assert!(lottery.is_open());
        assert_eq!(lottery.closing_time(), CLOSING);
    }

    #[test]
    fn pools_track_stake_counts() {
        let mut lottery = lottery();
        lottery.open_bets("operator", CLOSING, NOW).unwrap();
        fund(&mut lottery, "alice", 10 * CREDIT_SCALE);
        for placed in 1..=5u64 {
            lottery.bet("alice", NOW).unwrap();
            assert_eq!(lottery.stake_count(), placed);
            assert_eq!(lottery.prize_pool(), PRICE * placed);
            assert_eq!(lottery.operator_pool(), FEE * placed);
        }
        assert_eq!(lottery.slot_at(0), Some(&"alice".to_string()));
    }

    #[test]
    fn bet_requires_open_round() {
        let mut lottery = lottery();
        fund(&mut lottery, "alice", CREDIT_SCALE);
        let err = lottery.bet("alice", NOW).unwrap_err();
        assert!(matches!(err, LotteryError::RoundClosed));
    }

    #[test]
    fn bet_rejected_at_and_after_deadline() {
        let mut lottery = lottery();
        lottery.open_bets("operator", CLOSING, NOW).unwrap();
        fund(&mut lottery, "alice", CREDIT_SCALE);
        let at = lottery.bet("alice", CLOSING).unwrap_err();
        assert!(matches!(at, LotteryError::RoundClosed));
        let after = lottery.bet("alice", CLOSING + 5).unwrap_err();
        assert!(matches!(after, LotteryError::RoundClosed));
    }

    #[test]
    fn bet_requires_credits() {
        let mut lottery = lottery();
        lottery.open_bets("operator", CLOSING, NOW).unwrap();
        let err = lottery.bet("broke", NOW).unwrap_err();
        assert!(matches!(err, LotteryError::InsufficientCredit { .. }));
        assert_eq!(lottery.stake_count(), 0);
    }

    #[test]
    fn bet_requires_allowance() {
        let mut lottery = lottery();
        lottery.open_bets("operator", CLOSING, NOW).unwrap();
        lottery.purchase_credits("alice", CREDIT_SCALE).unwrap();
        // funded but never approved the vault
        let err = lottery.bet("alice", NOW).unwrap_err();
        assert!(matches!(
            err,
            LotteryError::Token(TokenError::InsufficientAllowance { .. })
        ));
        assert_eq!(lottery.stake_count(), 0);
        assert_eq!(lottery.token().balance_of("alice"), CREDIT_SCALE);
    }

    #[test]
    fn bet_many_is_atomic() {
        let mut lottery = lottery();
        lottery.open_bets("operator", CLOSING, NOW).unwrap();
        // enough for exactly 4 stakes
        fund(&mut lottery, "alice", 4 * (PRICE + FEE));
        let err = lottery.bet_many("alice", 5, NOW).unwrap_err();
        assert!(matches!(err, LotteryError::InsufficientCredit { .. }));
        assert_eq!(lottery.stake_count(), 0);
        assert_eq!(lottery.prize_pool(), 0);

        lottery.bet_many("alice", 4, NOW).unwrap();
        assert_eq!(lottery.stake_count(), 4);
        assert_eq!(lottery.prize_pool(), PRICE * 4);
        assert_eq!(lottery.operator_pool(), FEE * 4);
    }

    #[test]
    fn bet_many_rejects_zero_count() {
        let mut lottery = lottery();
        lottery.open_bets("operator", CLOSING, NOW).unwrap();
        let err = lottery.bet_many("alice", 0, NOW).unwrap_err();
        assert!(matches!(err, LotteryError::InvalidStakeCount));
    }

    #[test]
    fn close_before_deadline_is_too_early() {
        let mut lottery = lottery();
        lottery.open_bets("operator", CLOSING, NOW).unwrap();
        let mut entropy = FixedEntropy::new(vec![0]);
        let err = lottery.close_lottery(&mut entropy, CLOSING - 1).unwrap_err();
        assert!(matches!(err, LotteryError::TooEarly));
        assert!(lottery.is_open());
    }

    #[test]
    fn close_without_open_round_fails() {
        let mut lottery = lottery();
        let mut entropy = FixedEntropy::new(vec![0]);
        let err = lottery.close_lottery(&mut entropy, CLOSING).unwrap_err();
        assert!(matches!(err, LotteryError::RoundAlreadyClosed));
    }

    #[test]
    fn close_settles_exactly_one_winner() {
        let mut lottery = lottery();
        lottery.open_bets("operator", CLOSING, NOW).unwrap();
        for account in ["alice", "bob", "carol"] {
            fund(&mut lottery, account, CREDIT_SCALE);
            lottery.bet(account, NOW).unwrap();
        }
        let pot = lottery.prize_pool();
        // 7 % 3 == 1 → slot index 1 → bob
        let mut entropy = FixedEntropy::new(vec![7]);
        let outcome = lottery.close_lottery(&mut entropy, CLOSING).unwrap();
        assert_eq!(outcome.winner.as_deref(), Some("bob"));
        assert_eq!(outcome.prize, pot);
        assert_eq!(outcome.stakes, 3);
        assert_eq!(lottery.payable_to("bob"), pot);
        assert_eq!(lottery.payable_to("alice"), 0);
        assert_eq!(lottery.payable_to("carol"), 0);
        assert_eq!(lottery.prize_pool(), 0);
        assert_eq!(lottery.stake_count(), 0);
        assert!(!lottery.is_open());
        // operator pool survives the close untouched
        assert_eq!(lottery.operator_pool(), FEE * 3);
    }

    #[test]
    fn close_with_no_stakes_selects_no_winner() {
        let mut lottery = lottery();
        lottery.open_bets("operator", CLOSING, NOW).unwrap();
        let mut entropy = FixedEntropy::new(vec![42]);
        let outcome = lottery.close_lottery(&mut entropy, CLOSING).unwrap();
        assert_eq!(outcome.winner, None);
        assert_eq!(outcome.entropy, None);
        assert_eq!(outcome.prize, 0);
        assert!(!lottery.is_open());
        assert_eq!(lottery.rounds_closed(), 1);
    }

    #[test]
    fn single_stake_scenario_pays_exact_prize() {
        // price 0.8, fee 0.2, one participant, one stake
        let mut lottery = lottery();
        lottery.open_bets("operator", CLOSING, NOW).unwrap();
        fund(&mut lottery, "alice", CREDIT_SCALE);
        lottery.bet("alice", NOW).unwrap();
        assert_eq!(lottery.prize_pool(), PRICE);
        assert_eq!(lottery.operator_pool(), FEE);

        let mut entropy = FixedEntropy::new(vec![999]);
        lottery.close_lottery(&mut entropy, CLOSING).unwrap();
        assert_eq!(lottery.payable_to("alice"), PRICE);
        assert_eq!(lottery.prize_pool(), 0);

        let paid = lottery.prize_withdraw("alice").unwrap();
        assert_eq!(paid, PRICE);
        assert_eq!(lottery.token().balance_of("alice"), PRICE);
        assert_eq!(lottery.payable_to("alice"), 0);
        let err = lottery.prize_withdraw("alice").unwrap_err();
        assert!(matches!(err, LotteryError::NothingToWithdraw { .. }));
    }

    #[test]
    fn owner_withdraw_resets_fee_pool() {
        let mut lottery = lottery();
        lottery.open_bets("operator", CLOSING, NOW).unwrap();
        fund(&mut lottery, "alice", 10 * CREDIT_SCALE);
        lottery.bet_many("alice", 3, NOW).unwrap();
        assert_eq!(lottery.operator_pool(), FEE * 3);

        let taken = lottery.owner_withdraw("operator").unwrap();
        assert_eq!(taken, FEE * 3);
        assert_eq!(lottery.operator_pool(), 0);
        assert_eq!(lottery.token().balance_of("operator"), FEE * 3);

        // accumulation restarts from zero
        lottery.bet("alice", NOW).unwrap();
        assert_eq!(lottery.operator_pool(), FEE);
    }

    #[test]
    fn owner_withdraw_is_gated() {
        let mut lottery = lottery();
        let err = lottery.owner_withdraw("alice").unwrap_err();
        assert!(matches!(err, LotteryError::Unauthorized { .. }));
    }

    #[test]
    fn return_tokens_redeems_full_balance() {
        let mut lottery = lottery();
        lottery.purchase_credits("alice", 2 * CREDIT_SCALE).unwrap();
        assert_eq!(lottery.base_reserve(), 2 * CREDIT_SCALE);

        let refunded = lottery.return_tokens("alice").unwrap();
        assert_eq!(refunded, 2 * CREDIT_SCALE);
        assert_eq!(lottery.token().balance_of("alice"), 0);
        assert_eq!(lottery.base_reserve(), 0);

        let err = lottery.return_tokens("alice").unwrap_err();
        assert!(matches!(err, LotteryError::NoBalance { .. }));
    }

    #[test]
    fn winner_can_cash_out_to_base_currency() {
        let mut lottery = lottery();
        lottery.open_bets("operator", CLOSING, NOW).unwrap();
        fund(&mut lottery, "alice", CREDIT_SCALE);
        lottery.bet("alice", NOW).unwrap();
        let mut entropy = FixedEntropy::new(vec![0]);
        lottery.close_lottery(&mut entropy, CLOSING).unwrap();
        lottery.prize_withdraw("alice").unwrap();

        let refunded = lottery.return_tokens("alice").unwrap();
        assert_eq!(refunded, PRICE);
    }

    #[test]
    fn rounds_can_be_reopened_after_close() {
        let mut lottery = lottery();
        lottery.open_bets("operator", CLOSING, NOW).unwrap();
        fund(&mut lottery, "alice", CREDIT_SCALE);
        lottery.bet("alice", NOW).unwrap();
        let mut entropy = FixedEntropy::new(vec![0]);
        lottery.close_lottery(&mut entropy, CLOSING).unwrap();

        let later = CLOSING + 100;
        lottery.open_bets("operator", later + 60, later).unwrap();
        assert!(lottery.is_open());
        assert_eq!(lottery.stake_count(), 0);
        assert_eq!(lottery.prize_pool(), 0);
        // fees from the first round are still waiting for the operator
        assert_eq!(lottery.operator_pool(), FEE);
    }

    #[test]
    fn events_record_the_full_cycle() {
        let mut lottery = lottery();
        fund(&mut lottery, "alice", CREDIT_SCALE);
        lottery.open_bets("operator", CLOSING, NOW).unwrap();
        lottery.bet("alice", NOW).unwrap();
        let mut entropy = FixedEntropy::new(vec![0]);
        lottery.close_lottery(&mut entropy, CLOSING).unwrap();
        lottery.prize_withdraw("alice").unwrap();

        let events = lottery.events();
        assert!(matches!(events[0], LotteryEvent::CreditsPurchased { .. }));
        assert!(matches!(events[1], LotteryEvent::RoundOpened { .. }));
        assert!(matches!(
            events[2],
            LotteryEvent::StakePlaced { count: 1, .. }
        ));
        assert!(matches!(
            &events[3],
            LotteryEvent::RoundClosed {
                winner: Some(w),
                prize,
                ..
            } if w == "alice" && *prize == PRICE
        ));
        assert!(matches!(
            events[4],
            LotteryEvent::PrizeWithdrawn { amount, .. } if amount == PRICE
        ));
    }

    #[test]
    fn audit_digest_tracks_state() {
        let mut lottery = lottery();
        let initial = lottery.audit_digest();
        assert_eq!(initial, lottery.audit_digest());

        lottery.open_bets("operator", CLOSING, NOW).unwrap();
        fund(&mut lottery, "alice", CREDIT_SCALE);
        lottery.bet("alice", NOW).unwrap();
        assert_ne!(initial, lottery.audit_digest());
    }
}
