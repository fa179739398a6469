use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type AccountId = String;
pub type Amount = u64;

pub const CREDIT_SCALE: u64 = 100_000_000; // 1 credit = 1e8 minimal units

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("base currency is required to purchase credits")]
    ZeroDeposit,
    #[error("insufficient credit balance in account {account}")]
    InsufficientBalance { account: AccountId },
    #[error("allowance from {owner} to {spender} is insufficient")]
    InsufficientAllowance {
        owner: AccountId,
        spender: AccountId,
    },
}

/// Fixed-ratio credit issuer.
///
/// Deposited base currency mints `deposit * ratio` credits; burning credits
/// redeems `credits / ratio` base currency. Balances and allowances live in
/// ordered maps so serialized state and digests are deterministic.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreditToken {
    pub name: String,
    pub symbol: String,
    /// Credits minted per unit of base currency.
    pub ratio: u64,
    total_supply: Amount,
    balances: BTreeMap<AccountId, Amount>,
    allowances: BTreeMap<AccountId, BTreeMap<AccountId, Amount>>,
}

impl CreditToken {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, ratio: u64) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            ratio: ratio.max(1),
            total_supply: 0,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
        }
    }

    pub fn balance_of(&self, account: &str) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn allowance(&self, owner: &str, spender: &str) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|per_spender| per_spender.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Mints credits against a base-currency deposit. Returns the amount minted.
    pub fn purchase(&mut self, account: &str, deposit: Amount) -> Result<Amount, TokenError> {
        if deposit == 0 {
            return Err(TokenError::ZeroDeposit);
        }
        let minted = deposit.saturating_mul(self.ratio);
        self.credit(account, minted);
        self.total_supply = self.total_supply.saturating_add(minted);
        Ok(minted)
    }

    /// Burns credits and returns the base-currency amount they redeem at the
    /// configured ratio.
    pub fn redeem(&mut self, account: &str, credits: Amount) -> Result<Amount, TokenError> {
        self.debit(account, credits)?;
        self.total_supply = self.total_supply.saturating_sub(credits);
        Ok(credits / self.ratio)
    }

    pub fn approve(&mut self, owner: &str, spender: &str, amount: Amount) {
        self.allowances
            .entry(owner.to_string())
            .or_default()
            .insert(spender.to_string(), amount);
    }

    pub fn transfer(&mut self, from: &str, to: &str, amount: Amount) -> Result<(), TokenError> {
        self.debit(from, amount)?;
        self.credit(to, amount);
        Ok(())
    }

    /// Spender-initiated transfer. The allowance check precedes the balance
    /// debit so a failed transfer leaves both untouched.
    pub fn transfer_from(
        &mut self,
        owner: &str,
        spender: &str,
        to: &str,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let allowed = self.allowance(owner, spender);
        if allowed < amount {
            return Err(TokenError::InsufficientAllowance {
                owner: owner.to_string(),
                spender: spender.to_string(),
            });
        }
        self.debit(owner, amount)?;
        self.credit(to, amount);
        if let Some(per_spender) = self.allowances.get_mut(owner) {
            per_spender.insert(spender.to_string(), allowed - amount);
        }
        Ok(())
    }

    /// Iterate balances in account order (for audit digests).
    pub fn balances(&self) -> impl Iterator<Item = (&AccountId, &Amount)> {
        self.balances.iter()
    }

    fn credit(&mut self, account: &str, amount: Amount) {
        let balance = self.balances.entry(account.to_string()).or_default();
        *balance = balance.saturating_add(amount);
    }

    fn debit(&mut self, account: &str, amount: Amount) -> Result<(), TokenError> {
        let balance = self.balances.entry(account.to_string()).or_default();
        if *balance < amount {
            return Err(TokenError::InsufficientBalance {
                account: account.to_string(),
            });
        }
        *balance -= amount;
        Ok(())
    }
}
