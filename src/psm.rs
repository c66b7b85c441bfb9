//! Peg stability module: mints 1 ETH -> 1 CT + 1 DS and redeems the bundle
//! back to ETH, subject to the pre-/post-expiry phase rules.

use crate::error::SimError;
use crate::wallet::Wallet;

/// One LST's peg stability module.
#[derive(Debug, Clone)]
pub struct Psm {
    pub token_symbol: String,
    pub expiry_block: u64,
    pub eth_reserve: f64,
    pub token_reserve: f64,
    pub redemption_fee: f64,
    pub repurchase_fee: f64,
    pub total_redemption_fee: f64,
    pub total_repurchase_fee: f64,
}

impl Psm {
    pub fn new(token_symbol: impl Into<String>, expiry_block: u64, redemption_fee: f64, repurchase_fee: f64) -> Self {
        Self {
            token_symbol: token_symbol.into(),
            expiry_block,
            eth_reserve: 0.0,
            token_reserve: 0.0,
            redemption_fee,
            repurchase_fee,
            total_redemption_fee: 0.0,
            total_repurchase_fee: 0.0,
        }
    }

    fn ct_symbol(&self) -> String {
        format!("CT_{}", self.token_symbol)
    }

    fn ds_symbol(&self) -> String {
        format!("DS_{}", self.token_symbol)
    }

    /// Burn `amount_eth` from `wallet`, mint 1:1:1 CT + DS. The 1:1:1
    /// primary market — no fee, no phase restriction.
    pub fn deposit_eth(&mut self, wallet: &mut Wallet, amount_eth: f64) -> Result<(), SimError> {
        if amount_eth <= 0.0 {
            return Err(SimError::BadAmount(amount_eth));
        }
        wallet.withdraw_eth(amount_eth)?;
        wallet.deposit_token(&self.ct_symbol(), amount_eth)?;
        wallet.deposit_token(&self.ds_symbol(), amount_eth)?;
        self.eth_reserve += amount_eth;
        Ok(())
    }

    fn require_pre_expiry(&self, op: &str, current_block: u64) -> Result<(), SimError> {
        if current_block > self.expiry_block {
            return Err(SimError::WrongPhase {
                op: op.to_string(),
                block: current_block,
                expiry: self.expiry_block,
            });
        }
        Ok(())
    }

    fn require_post_expiry(&self, op: &str, current_block: u64) -> Result<(), SimError> {
        if current_block < self.expiry_block {
            return Err(SimError::WrongPhase {
                op: op.to_string(),
                block: current_block,
                expiry: self.expiry_block,
            });
        }
        Ok(())
    }

    fn settle_redemption(&mut self, wallet: &mut Wallet, n: f64) -> Result<f64, SimError> {
        let fee = n * self.redemption_fee;
        let net = n - fee;
        if net > self.eth_reserve {
            return Err(SimError::InsufficientReserve {
                venue: format!("psm:{}", self.token_symbol),
                token: "ETH".to_string(),
                have: self.eth_reserve,
                need: net,
            });
        }
        wallet.deposit_eth(net)?;
        self.eth_reserve -= net;
        self.token_reserve += n;
        self.total_redemption_fee += fee;
        Ok(net)
    }

    /// Burn `n` each of CT and DS, pre-expiry only.
    pub fn redeem_with_ct_and_ds(&mut self, wallet: &mut Wallet, n: f64, current_block: u64) -> Result<f64, SimError> {
        if n <= 0.0 {
            return Err(SimError::BadAmount(n));
        }
        self.require_pre_expiry("redeem_with_ct_and_ds", current_block)?;
        wallet.withdraw_token(&self.ct_symbol(), n)?;
        wallet.withdraw_token(&self.ds_symbol(), n)?;
        self.settle_redemption(wallet, n)
    }

    /// Burn `n` each of the LST itself and DS, pre-expiry only.
    pub fn redeem_with_lst_and_ds(&mut self, wallet: &mut Wallet, n: f64, current_block: u64) -> Result<f64, SimError> {
        if n <= 0.0 {
            return Err(SimError::BadAmount(n));
        }
        self.require_pre_expiry("redeem_with_lst_and_ds", current_block)?;
        wallet.withdraw_token(&self.token_symbol, n)?;
        wallet.withdraw_token(&self.ds_symbol(), n)?;
        self.settle_redemption(wallet, n)
    }

    /// Burn only `n` CT, post-expiry only.
    pub fn redeem_with_ct_post_expiry(&mut self, wallet: &mut Wallet, n: f64, current_block: u64) -> Result<f64, SimError> {
        if n <= 0.0 {
            return Err(SimError::BadAmount(n));
        }
        self.require_post_expiry("redeem_with_ct_post_expiry", current_block)?;
        wallet.withdraw_token(&self.ct_symbol(), n)?;
        self.settle_redemption(wallet, n)
    }

    /// Given ETH in, burn it for `net = Δeth * (1 - repurchase_fee)` each
    /// of the LST and DS, provided the PSM's token reserve covers it.
    pub fn repurchase_lst_and_ds(&mut self, wallet: &mut Wallet, amount_eth: f64) -> Result<f64, SimError> {
        if amount_eth <= 0.0 {
            return Err(SimError::BadAmount(amount_eth));
        }
        let fee = amount_eth * self.repurchase_fee;
        let net = amount_eth - fee;
        if net > self.token_reserve {
            return Err(SimError::InsufficientReserve {
                venue: format!("psm:{}", self.token_symbol),
                token: self.token_symbol.clone(),
                have: self.token_reserve,
                need: net,
            });
        }
        wallet.withdraw_eth(amount_eth)?;
        self.eth_reserve += amount_eth;
        self.token_reserve -= net;
        wallet.deposit_token(&self.token_symbol, net)?;
        wallet.deposit_token(&self.ds_symbol(), net)?;
        self.total_repurchase_fee += fee;
        Ok(net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_psm() -> Psm {
        Psm::new("X", 100, 0.001, 0.05)
    }

    #[test]
    fn deposit_then_redeem_round_trips() {
        let mut psm = fresh_psm();
        let mut w = Wallet::new("user");
        w.deposit_eth(10.0).unwrap();
        psm.deposit_eth(&mut w, 10.0).unwrap();
        assert_eq!(w.balance_of("CT_X"), 10.0);
        assert_eq!(w.balance_of("DS_X"), 10.0);

        let net = psm.redeem_with_ct_and_ds(&mut w, 10.0, 5).unwrap();
        assert!((net - 10.0 * (1.0 - 0.001)).abs() < 1e-9);
        assert_eq!(psm.token_reserve, 10.0);
    }

    #[test]
    fn redeem_at_expiry_block_succeeds_after_fails() {
        let mut psm = fresh_psm();
        let mut w = Wallet::new("user");
        w.deposit_eth(10.0).unwrap();
        psm.deposit_eth(&mut w, 10.0).unwrap();

        psm.redeem_with_ct_and_ds(&mut w.clone(), 1.0, 100).unwrap_err();
        let mut w2 = w.clone();
        assert!(psm.redeem_with_ct_and_ds(&mut w2, 1.0, 100).is_ok());

        let err = psm.redeem_with_ct_and_ds(&mut w.clone(), 1.0, 101).unwrap_err();
        assert!(matches!(err, SimError::WrongPhase { .. }));
    }

    #[test]
    fn post_expiry_redeem_at_expiry_succeeds() {
        let mut psm = fresh_psm();
        let mut w = Wallet::new("user");
        w.deposit_eth(10.0).unwrap();
        psm.deposit_eth(&mut w, 10.0).unwrap();
        assert!(psm.redeem_with_ct_post_expiry(&mut w, 1.0, 100).is_ok());
    }

    #[test]
    fn post_expiry_redeem_before_expiry_fails() {
        let mut psm = fresh_psm();
        let mut w = Wallet::new("user");
        w.deposit_eth(10.0).unwrap();
        psm.deposit_eth(&mut w, 10.0).unwrap();
        assert!(matches!(
            psm.redeem_with_ct_post_expiry(&mut w, 1.0, 99).unwrap_err(),
            SimError::WrongPhase { .. }
        ));
    }

    #[test]
    fn repurchase_fails_when_reserve_too_small() {
        let mut psm = fresh_psm();
        let mut w = Wallet::new("user");
        w.deposit_eth(100.0).unwrap();
        let err = psm.repurchase_lst_and_ds(&mut w, 10.0).unwrap_err();
        assert!(matches!(err, SimError::InsufficientReserve { .. }));
    }

    #[test]
    fn repurchase_after_redemption_succeeds() {
        let mut psm = fresh_psm();
        let mut w = Wallet::new("user");
        w.deposit_eth(100.0).unwrap();
        psm.deposit_eth(&mut w, 100.0).unwrap();
        psm.redeem_with_ct_and_ds(&mut w, 50.0, 1).unwrap();
        assert_eq!(psm.token_reserve, 50.0);

        let mut buyer = Wallet::new("buyer");
        buyer.deposit_eth(10.0).unwrap();
        let net = psm.repurchase_lst_and_ds(&mut buyer, 10.0).unwrap();
        assert!((net - 10.0 * (1.0 - 0.05)).abs() < 1e-9);
        assert_eq!(buyer.balance_of("X"), net);
        assert_eq!(buyer.balance_of("DS_X"), net);
    }
}
