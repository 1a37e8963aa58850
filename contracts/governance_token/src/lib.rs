#![cfg_attr(not(feature = "std"), no_std, no_main)]

/// # Policy Market — Governance Token
///
/// **Role:** Capped, role-gated supply ledger for the protocol's governance
/// token.  The deployer owns the contract and is the first minter; the owner
/// grants minting rights to other contracts (the lottery pays prizes by
/// minting).
///
/// ```text
///   owner ──add_minter(lottery)──► minters = { owner, lottery }
///   lottery ──mint(winner, prize)──► balances[winner] += prize
///                                    total_supply    += prize   (≤ CAP)
/// ```
///
/// `CAP` = 100 000 000 tokens × 10¹⁸.  A mint that would cross it fails with
/// `CapExceeded` and leaves the supply untouched.
#[ink::contract]
mod governance_token {
    use ink::prelude::string::String;
    use ink::storage::Mapping;

    use protocol_core::ledger::Ledger;
    use protocol_core::roles::{constants::TOKEN_DECIMALS, RoleLedger};

    pub use protocol_core::Error;

    pub type Result<T> = core::result::Result<T, Error>;

    // =========================================================================
    // STORAGE
    // =========================================================================

    #[ink(storage)]
    pub struct GovernanceToken {
        // ── Token metadata ────────────────────────────────────────────────
        name: String,
        symbol: String,

        // ── Roles & supply ────────────────────────────────────────────────
        /// Owner, minter set and minted total against the cap.
        roles: RoleLedger,

        // ── Ledger ────────────────────────────────────────────────────────
        balances: Mapping<AccountId, Balance>,
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// `from: None` marks a mint.
    #[ink(event)]
    pub struct Transfer {
        #[ink(topic)]
        from: Option<AccountId>,
        #[ink(topic)]
        to: Option<AccountId>,
        value: Balance,
    }

    #[ink(event)]
    pub struct MinterAdded {
        #[ink(topic)]
        minter: AccountId,
    }

    #[ink(event)]
    pub struct MinterRemoved {
        #[ink(topic)]
        minter: AccountId,
    }

    /// `new_owner: None` marks a renounce.
    #[ink(event)]
    pub struct OwnershipTransferred {
        #[ink(topic)]
        previous_owner: AccountId,
        #[ink(topic)]
        new_owner: Option<AccountId>,
    }

    // =========================================================================
    // IMPLEMENTATION
    // =========================================================================

    impl GovernanceToken {
        /// Deploy with the caller as owner and first minter. No initial supply.
        #[ink(constructor)]
        pub fn new(name: String, symbol: String) -> Self {
            let caller = Self::env().caller();
            Self::env().emit_event(MinterAdded { minter: caller });
            Self {
                name,
                symbol,
                roles: RoleLedger::new(caller),
                balances: Mapping::default(),
            }
        }

        // =====================================================================
        // SUPPLY
        // =====================================================================

        /// Mint `amount` to `to`. Minters only.
        ///
        /// # Errors
        /// - `Unauthorized(Minter)` if the caller is not a minter.
        /// - `CapExceeded` if the mint would push the supply past `CAP`.
        #[ink(message)]
        pub fn mint(&mut self, to: AccountId, amount: Balance) -> Result<bool> {
            let caller = self.env().caller();
            self.roles.mint(&mut self.balances, &caller, to, amount)?;

            self.env().emit_event(Transfer { from: None, to: Some(to), value: amount });
            Ok(true)
        }

        #[ink(message)]
        pub fn transfer(&mut self, to: AccountId, value: Balance) -> Result<()> {
            let from = self.env().caller();
            protocol_core::ensure_not_zero(&to)?;
            self.balances.transfer(&from, &to, value)?;

            self.env().emit_event(Transfer { from: Some(from), to: Some(to), value });
            Ok(())
        }

        // =====================================================================
        // ROLES
        // =====================================================================

        /// Grant minting rights. Idempotent; emits only on change.
        #[ink(message)]
        pub fn add_minter(&mut self, minter: AccountId) -> Result<()> {
            let caller = self.env().caller();
            if self.roles.add_minter(&caller, minter)? {
                self.env().emit_event(MinterAdded { minter });
            }
            Ok(())
        }

        /// Revoke minting rights. Idempotent; emits only on change.
        #[ink(message)]
        pub fn remove_minter(&mut self, minter: AccountId) -> Result<()> {
            let caller = self.env().caller();
            if self.roles.remove_minter(&caller, &minter)? {
                self.env().emit_event(MinterRemoved { minter });
            }
            Ok(())
        }

        #[ink(message)]
        pub fn transfer_ownership(&mut self, new_owner: AccountId) -> Result<()> {
            let caller = self.env().caller();
            let previous_owner = self.roles.transfer_ownership(&caller, new_owner)?;
            self.env().emit_event(OwnershipTransferred {
                previous_owner,
                new_owner: Some(new_owner),
            });
            Ok(())
        }

        /// Give up ownership for good. The minter set freezes as it is.
        #[ink(message)]
        pub fn renounce_ownership(&mut self) -> Result<()> {
            let caller = self.env().caller();
            let previous_owner = self.roles.renounce_ownership(&caller)?;
            self.env().emit_event(OwnershipTransferred { previous_owner, new_owner: None });
            Ok(())
        }

        // =====================================================================
        // VIEW FUNCTIONS
        // =====================================================================

        #[ink(message)]
        pub fn name(&self) -> String {
            self.name.clone()
        }

        #[ink(message)]
        pub fn symbol(&self) -> String {
            self.symbol.clone()
        }

        #[ink(message)]
        pub fn decimals(&self) -> u8 {
            TOKEN_DECIMALS
        }

        #[ink(message)]
        pub fn total_supply(&self) -> Balance {
            self.roles.total_minted()
        }

        #[ink(message)]
        pub fn cap(&self) -> Balance {
            self.roles.cap()
        }

        #[ink(message)]
        pub fn balance_of(&self, owner: AccountId) -> Balance {
            self.balances.balance_of(&owner)
        }

        #[ink(message)]
        pub fn owner(&self) -> Option<AccountId> {
            self.roles.owner()
        }

        #[ink(message)]
        pub fn is_minter(&self, account: AccountId) -> bool {
            self.roles.is_minter(&account)
        }
    }

    // =========================================================================
    // UNIT TESTS
    // =========================================================================

}
