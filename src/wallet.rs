use std::collections::HashMap;

use crate::error::SimError;

/// Stable index of a `Wallet` inside `Engine::wallets`.
///
/// The engine is the sole owner of wallet storage (see DESIGN.md); every
/// other component — agents, the Vault, the EventManager's internal
/// wallet, the genesis wallet — refers to a wallet only by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct WalletId(pub usize);

/// Balances of the settlement asset, fungible tokens, and LP shares for
/// one holder. All balances are non-negative; withdrawals that would
/// cross zero fail with `SimError::InsufficientBalance`.
#[derive(Debug, Clone, Default)]
pub struct Wallet {
    pub owner: String,
    pub eth: f64,
    pub token_balances: HashMap<String, f64>,
    pub lp_balances: HashMap<String, f64>,
}

impl Wallet {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            eth: 0.0,
            token_balances: HashMap::new(),
            lp_balances: HashMap::new(),
        }
    }

    pub fn deposit_eth(&mut self, amount: f64) -> Result<(), SimError> {
        if amount < 0.0 {
            return Err(SimError::BadAmount(amount));
        }
        self.eth += amount;
        Ok(())
    }

    pub fn withdraw_eth(&mut self, amount: f64) -> Result<(), SimError> {
        if amount < 0.0 {
            return Err(SimError::BadAmount(amount));
        }
        if amount > self.eth {
            return Err(SimError::InsufficientBalance {
                wallet: self.owner.clone(),
                token: "ETH".to_string(),
                have: self.eth,
                need: amount,
            });
        }
        self.eth -= amount;
        Ok(())
    }

    pub fn deposit_token(&mut self, symbol: &str, amount: f64) -> Result<(), SimError> {
        if amount < 0.0 {
            return Err(SimError::BadAmount(amount));
        }
        *self.token_balances.entry(symbol.to_string()).or_insert(0.0) += amount;
        Ok(())
    }

    pub fn withdraw_token(&mut self, symbol: &str, amount: f64) -> Result<(), SimError> {
        if amount < 0.0 {
            return Err(SimError::BadAmount(amount));
        }
        let have = self.balance_of(symbol);
        if amount > have {
            return Err(SimError::InsufficientBalance {
                wallet: self.owner.clone(),
                token: symbol.to_string(),
                have,
                need: amount,
            });
        }
        *self.token_balances.entry(symbol.to_string()).or_insert(0.0) -= amount;
        Ok(())
    }

    pub fn balance_of(&self, symbol: &str) -> f64 {
        self.token_balances.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn deposit_lp(&mut self, pool_id: &str, shares: f64) -> Result<(), SimError> {
        if shares < 0.0 {
            return Err(SimError::BadAmount(shares));
        }
        *self.lp_balances.entry(pool_id.to_string()).or_insert(0.0) += shares;
        Ok(())
    }

    pub fn withdraw_lp(&mut self, pool_id: &str, shares: f64) -> Result<(), SimError> {
        if shares < 0.0 {
            return Err(SimError::BadAmount(shares));
        }
        let have = self.lp_balance(pool_id);
        if shares > have {
            return Err(SimError::InsufficientBalance {
                wallet: self.owner.clone(),
                token: format!("LP:{pool_id}"),
                have,
                need: shares,
            });
        }
        *self.lp_balances.entry(pool_id.to_string()).or_insert(0.0) -= shares;
        Ok(())
    }

    pub fn lp_balance(&self, pool_id: &str) -> f64 {
        self.lp_balances.get(pool_id).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_and_withdraw_eth() {
        let mut w = Wallet::new("alice");
        w.deposit_eth(10.0).unwrap();
        assert_eq!(w.eth, 10.0);
        w.withdraw_eth(4.0).unwrap();
        assert_eq!(w.eth, 6.0);
    }

    #[test]
    fn withdraw_more_than_balance_fails() {
        let mut w = Wallet::new("alice");
        w.deposit_eth(1.0).unwrap();
        let err = w.withdraw_eth(2.0).unwrap_err();
        assert!(matches!(err, SimError::InsufficientBalance { .. }));
    }

    #[test]
    fn token_balances_never_negative() {
        let mut w = Wallet::new("bob");
        w.deposit_token("CT_X", 5.0).unwrap();
        assert_eq!(w.balance_of("CT_X"), 5.0);
        assert!(w.withdraw_token("CT_X", 5.1).is_err());
        w.withdraw_token("CT_X", 5.0).unwrap();
        assert_eq!(w.balance_of("CT_X"), 0.0);
    }

    #[test]
    fn negative_deposit_rejected() {
        let mut w = Wallet::new("eve");
        assert!(matches!(
            w.deposit_eth(-1.0).unwrap_err(),
            SimError::BadAmount(_)
        ));
    }
}
