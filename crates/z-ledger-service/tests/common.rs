//! Common test utilities for z-ledger integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;
use tempfile::TempDir;

use z_ledger_core::{
    AccountType, Gift, GiftId, LinkedAccountId, NewLinkedAccount, Role, TransactionKind, UserId,
    UserProfile,
};
use z_ledger_service::auth::issue_jwt;
use z_ledger_service::config::PayoutProviderConfig;
use z_ledger_service::crypto::hash_pin;
use z_ledger_service::{
    create_router, AppState, PayoutChannel, PayoutError, PayoutReceipt, PayoutRequest,
    ServiceConfig,
};
use z_ledger_store::{AccountLedger, Directory, Registry, RocksStore};

pub const SERVICE_API_KEY: &str = "test-service-key";
pub const ADMIN_API_KEY: &str = "test-admin-key";
pub const CALLBACK_TOKEN: &str = "test-callback-token";
pub const PIN: &str = "123456";

/// How the scripted channel answers.
#[derive(Debug, Clone)]
pub enum PayoutScript {
    /// Accept with the given provider status.
    Accept(&'static str),
    /// Reject immediately.
    Fail,
    /// Never answer within any sane timeout.
    Hang,
}

/// Payout channel that answers from a script and records submissions.
pub struct ScriptedPayoutChannel {
    script: Mutex<PayoutScript>,
    submissions: Mutex<Vec<PayoutRequest>>,
}

impl ScriptedPayoutChannel {
    pub fn new(script: PayoutScript) -> Self {
        Self {
            script: Mutex::new(script),
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn set_script(&self, script: PayoutScript) {
        *self.script.lock().unwrap() = script;
    }

    pub fn submissions(&self) -> Vec<PayoutRequest> {
        self.submissions.lock().unwrap().clone()
    }
}

/// Provider payout id the scripted channel hands out for a reference id.
pub fn payout_id_for(reference_id: &str) -> String {
    format!("po-{reference_id}")
}

#[async_trait]
impl PayoutChannel for ScriptedPayoutChannel {
    async fn submit(&self, request: &PayoutRequest) -> Result<PayoutReceipt, PayoutError> {
        self.submissions.lock().unwrap().push(request.clone());
        let script = self.script.lock().unwrap().clone();
        match script {
            PayoutScript::Accept(status) => Ok(PayoutReceipt {
                payout_id: payout_id_for(&request.reference_id),
                status: status.to_string(),
            }),
            PayoutScript::Fail => Err(PayoutError::Rejected {
                status: 400,
                message: "destination account is closed".into(),
            }),
            PayoutScript::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(PayoutReceipt {
                    payout_id: payout_id_for(&request.reference_id),
                    status: "ACCEPTED".into(),
                })
            }
        }
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Direct store access for seeding and assertions.
    pub store: Arc<RocksStore>,
    /// The scripted payout channel.
    pub channel: Arc<ScriptedPayoutChannel>,
    /// Configuration the server runs with.
    pub config: ServiceConfig,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a harness after adjusting the default test configuration.
    pub fn with_config(adjust: impl FnOnce(&mut ServiceConfig)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));

        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            jwt_secret: "test-jwt-secret".into(),
            service_api_key: Some(SERVICE_API_KEY.into()),
            admin_api_key: Some(ADMIN_API_KEY.into()),
            pin_secret: "test-pin-secret".into(),
            payout_timeout_ms: 2_000,
            payout: Some(PayoutProviderConfig {
                base_url: "http://127.0.0.1:9".into(),
                secret_key: "test-secret".into(),
                callback_token: Some(CALLBACK_TOKEN.into()),
                currency: "IDR".into(),
            }),
            ..ServiceConfig::default()
        };
        adjust(&mut config);

        let channel = Arc::new(ScriptedPayoutChannel::new(PayoutScript::Accept("ACCEPTED")));
        let state = AppState::new(Arc::clone(&store), config.clone())
            .with_payout_channel(Arc::clone(&channel) as Arc<dyn PayoutChannel>);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            channel,
            config,
            _temp_dir: temp_dir,
        }
    }

    /// Register a user in the directory.
    pub fn create_user(&self, username: &str, role: Role) -> UserId {
        let user_id = UserId::generate();
        let profile = UserProfile::new(user_id, username, role).expect("valid profile");
        self.store.put_user(&profile).expect("Failed to create user");
        user_id
    }

    /// Register a user with spendable coins and a transfer PIN.
    pub fn create_funded_user(&self, username: &str, role: Role, balance: i64) -> UserId {
        let user_id = self.create_user(username, role);
        if balance > 0 {
            self.store
                .credit(&user_id, balance, TransactionKind::AdminAdd, "test funding")
                .expect("Failed to fund user");
        }
        let hash = hash_pin(&self.config.pin_secret, &user_id, PIN);
        self.store.set_pin_hash(&user_id, &hash).expect("Failed to set PIN");
        user_id
    }

    /// Give a user withdrawable earnings.
    pub fn seed_earnings(&self, user_id: &UserId, amount: i64) {
        self.store
            .run_in_transaction("seed_earnings", |tx| {
                let mut row = tx.lock_earnings(user_id)?;
                row.earn(amount)?;
                tx.put_earnings(&row)
            })
            .expect("Failed to seed earnings");
    }

    /// Link a BCA account for a user.
    pub fn link_bank(&self, user_id: &UserId, number: &str) -> LinkedAccountId {
        self.store
            .link_account(
                user_id,
                NewLinkedAccount {
                    account_type: AccountType::Bank,
                    provider: "BCA".into(),
                    account_name: "Bank Central Asia".into(),
                    account_number: number.into(),
                    holder_name: "Test Holder".into(),
                },
            )
            .expect("Failed to link account")
            .id
    }

    /// Add a gift to the catalog.
    pub fn create_gift(&self, name: &str, price: i64) -> GiftId {
        let gift = Gift::new(GiftId::generate(), name, price).expect("valid gift");
        self.store.put_gift(&gift).expect("Failed to create gift");
        gift.id
    }

    /// Authorization header value for a user.
    pub fn auth_header(&self, user_id: &UserId) -> String {
        let token = issue_jwt(user_id, &self.config.jwt_secret, None, 3_600)
            .expect("Failed to sign token");
        format!("Bearer {token}")
    }

    pub fn balance(&self, user_id: &UserId) -> i64 {
        self.store.get_balance(user_id).expect("Failed to read balance")
    }

    pub fn earnings(&self, user_id: &UserId) -> z_ledger_core::EarningsBalance {
        use z_ledger_store::EarningsLedger;
        self.store.get_earnings(user_id).expect("Failed to read earnings")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
