#![cfg_attr(not(feature = "std"), no_std, no_main)]

/// # Policy Market — Settable Price Feed
///
/// **Role:** Stand-in for an external aggregator on devnets and in
/// integration tests.  Exposes the single read the price oracle relies on,
/// `latest_round_data`, and lets its owner publish answers.
///
/// Answers carry the feed's own `decimals`; the oracle normalises them.
#[ink::contract]
mod mock_price_feed {
    use protocol_core::oracle::{RoundData, DEFAULT_FEED_DECIMALS};
    use protocol_core::Role;

    pub use protocol_core::Error;

    #[ink(storage)]
    pub struct MockPriceFeed {
        owner: AccountId,
        decimals: u8,
        latest: Option<RoundData>,
        /// Incremented on every published answer.
        round_id: u64,
    }

    #[ink(event)]
    pub struct AnswerUpdated {
        #[ink(topic)]
        round_id: u64,
        answer: i128,
        updated_at: Timestamp,
    }

    impl MockPriceFeed {
        #[ink(constructor)]
        pub fn new(decimals: u8) -> Self {
            Self { owner: Self::env().caller(), decimals, latest: None, round_id: 0 }
        }

        #[ink(constructor)]
        pub fn default() -> Self {
            Self::new(DEFAULT_FEED_DECIMALS)
        }

        /// Publish an answer. `updated_at` is taken as given so tests can
        /// simulate stale rounds.
        #[ink(message)]
        pub fn set_round(&mut self, answer: i128, updated_at: Timestamp) -> Result<(), Error> {
            self.only_owner()?;
            self.round_id = self.round_id.saturating_add(1);
            self.latest = Some(RoundData { answer, updated_at });
            self.env().emit_event(AnswerUpdated { round_id: self.round_id, answer, updated_at });
            Ok(())
        }

        /// Publish an answer stamped with the current block time.
        #[ink(message)]
        pub fn set_answer(&mut self, answer: i128) -> Result<(), Error> {
            let now = self.env().block_timestamp();
            self.set_round(answer, now)
        }

        /// Simulate a feed with no data.
        #[ink(message)]
        pub fn clear_round(&mut self) -> Result<(), Error> {
            self.only_owner()?;
            self.latest = None;
            Ok(())
        }

        #[ink(message)]
        pub fn latest_round_data(&self) -> Option<RoundData> {
            self.latest
        }

        #[ink(message)]
        pub fn decimals(&self) -> u8 {
            self.decimals
        }

        #[ink(message)]
        pub fn latest_round_id(&self) -> u64 {
            self.round_id
        }

        fn only_owner(&self) -> Result<(), Error> {
            if self.env().caller() != self.owner {
                return Err(Error::Unauthorized(Role::Owner));
            }
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use ink::env::{test, DefaultEnvironment};

        type Env = DefaultEnvironment;

        fn accounts() -> test::DefaultAccounts<Env> {
            test::default_accounts::<Env>()
        }

        fn deploy() -> MockPriceFeed {
            test::set_caller::<Env>(accounts().alice);
            MockPriceFeed::default()
        }

        #[ink::test]
        fn starts_empty() {
            let feed = deploy();
            assert_eq!(feed.latest_round_data(), None);
            assert_eq!(feed.decimals(), 8);
        }

        #[ink::test]
        fn owner_publishes_rounds() {
            let mut feed = deploy();
            feed.set_round(2_000_00000000, 42).unwrap();
            assert_eq!(
                feed.latest_round_data(),
                Some(RoundData { answer: 2_000_00000000, updated_at: 42 })
            );

            test::set_block_timestamp::<Env>(99);
            feed.set_answer(7).unwrap();
            assert_eq!(feed.latest_round_data(), Some(RoundData { answer: 7, updated_at: 99 }));
            assert_eq!(feed.latest_round_id(), 2);

            feed.clear_round().unwrap();
            assert_eq!(feed.latest_round_data(), None);
        }

        #[ink::test]
        fn strangers_cannot_publish() {
            let mut feed = deploy();
            test::set_caller::<Env>(accounts().bob);
            assert_eq!(feed.set_round(1, 1), Err(Error::Unauthorized(Role::Owner)));
        }
    }
}
