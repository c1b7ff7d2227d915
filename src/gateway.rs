//! Ledger gateway
//!
//! Narrow interface to the core banking system of record. The mock
//! implementation ships with seeded users and simulated latency; swap in a
//! real client against the bank's APIs in production.

use crate::models::{Account, Card, GatewayResult};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn lock_card(&self, user_id: &str, card_id: &str) -> Result<GatewayResult>;
    async fn unlock_card(&self, user_id: &str, card_id: &str) -> Result<GatewayResult>;
    async fn transfer_funds(
        &self,
        user_id: &str,
        amount: f64,
        from_account: &str,
        to_account: &str,
    ) -> Result<GatewayResult>;
    async fn get_accounts(&self, user_id: &str) -> Result<Vec<Account>>;
    async fn get_cards(&self, user_id: &str) -> Result<Vec<Card>>;
}

struct MockUser {
    accounts: Vec<Account>,
    cards: Vec<Card>,
}

/// Mock ledger with a small seeded user base
pub struct MockLedgerGateway {
    users: HashMap<String, MockUser>,
    latency: Duration,
}

impl MockLedgerGateway {
    pub fn new() -> Self {
        let mut users = HashMap::new();

        // user_001: two accounts, two cards (triggers card disambiguation)
        users.insert(
            "user_001".to_string(),
            MockUser {
                accounts: vec![
                    Account {
                        id: "acc_001".to_string(),
                        number: "1234567890".to_string(),
                        account_type: "Savings".to_string(),
                        balance: 15_420.50,
                        currency: "SGD".to_string(),
                    },
                    Account {
                        id: "acc_002".to_string(),
                        number: "0987654321".to_string(),
                        account_type: "Current".to_string(),
                        balance: 8_250.00,
                        currency: "SGD".to_string(),
                    },
                ],
                cards: vec![
                    Card {
                        id: "card_001".to_string(),
                        card_type: "VISA Credit".to_string(),
                        last_four: "1234".to_string(),
                        status: "active".to_string(),
                    },
                    Card {
                        id: "card_002".to_string(),
                        card_type: "Mastercard Debit".to_string(),
                        last_four: "5678".to_string(),
                        status: "active".to_string(),
                    },
                ],
            },
        );

        // user_002: one account, one card
        users.insert(
            "user_002".to_string(),
            MockUser {
                accounts: vec![Account {
                    id: "acc_101".to_string(),
                    number: "5556667778".to_string(),
                    account_type: "Savings".to_string(),
                    balance: 3_210.75,
                    currency: "SGD".to_string(),
                }],
                cards: vec![Card {
                    id: "card_101".to_string(),
                    card_type: "VISA Debit".to_string(),
                    last_four: "9012".to_string(),
                    status: "active".to_string(),
                }],
            },
        );

        Self {
            users,
            latency: Duration::from_millis(50),
        }
    }

    /// Build without the simulated latency, for tests
    pub fn without_latency() -> Self {
        let mut gateway = Self::new();
        gateway.latency = Duration::ZERO;
        gateway
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn reference(prefix: &str) -> String {
        let suffix = hex::encode(&Uuid::new_v4().as_bytes()[..6]).to_uppercase();
        format!("{}{}{}", prefix, Utc::now().format("%Y%m%d"), suffix)
    }
}

impl Default for MockLedgerGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerGateway for MockLedgerGateway {
    async fn lock_card(&self, user_id: &str, card_id: &str) -> Result<GatewayResult> {
        self.simulate_latency().await;

        info!(user_id, card_id, "Card locked");
        Ok(GatewayResult::success(Self::reference("REF")))
    }

    async fn unlock_card(&self, user_id: &str, card_id: &str) -> Result<GatewayResult> {
        self.simulate_latency().await;

        info!(user_id, card_id, "Card unlocked");
        Ok(GatewayResult::success(Self::reference("REF")))
    }

    async fn transfer_funds(
        &self,
        user_id: &str,
        amount: f64,
        from_account: &str,
        to_account: &str,
    ) -> Result<GatewayResult> {
        self.simulate_latency().await;

        info!(user_id, amount, from_account, to_account, "Funds transferred");
        Ok(GatewayResult::success(Self::reference("TXN")))
    }

    async fn get_accounts(&self, user_id: &str) -> Result<Vec<Account>> {
        self.simulate_latency().await;

        Ok(self
            .users
            .get(user_id)
            .map(|user| user.accounts.clone())
            .unwrap_or_default())
    }

    async fn get_cards(&self, user_id: &str) -> Result<Vec<Card>> {
        self.simulate_latency().await;

        Ok(self
            .users
            .get(user_id)
            .map(|user| user.cards.clone())
            .unwrap_or_default())
    }
}
