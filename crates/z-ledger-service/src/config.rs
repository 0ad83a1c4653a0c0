//! Service configuration.

use std::path::Path;

use serde::Deserialize;
use z_ledger_core::{CallTariff, Role, WithdrawalPolicy, DEFAULT_MONTHLY_TOPUP_QUOTA};

/// How withdrawals reach the payout channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayoutMode {
    /// Dispatch as soon as the request is reserved.
    #[default]
    Auto,
    /// Requests wait for an admin to approve them.
    Manual,
}

impl PayoutMode {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("manual") {
            Self::Manual
        } else {
            Self::Auto
        }
    }
}

/// A sliding-window limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    /// Requests allowed per window.
    pub max_requests: usize,
    /// Window length in seconds.
    pub window_seconds: u64,
}

impl RateLimitRule {
    /// Create a rule.
    #[must_use]
    pub const fn new(max_requests: usize, window_seconds: u64) -> Self {
        Self {
            max_requests,
            window_seconds,
        }
    }
}

/// Limits per guarded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    /// `POST /v1/credits/transfer`, per user.
    pub transfer: RateLimitRule,
    /// `POST /v1/withdrawals`, per user.
    pub withdrawal: RateLimitRule,
    /// `POST /v1/admin/credits`, per admin.
    pub admin_credit: RateLimitRule,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            transfer: RateLimitRule::new(10, 60),
            withdrawal: RateLimitRule::new(3, 3_600),
            admin_credit: RateLimitRule::new(30, 60),
        }
    }
}

/// Payout provider connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutProviderConfig {
    /// API base URL.
    pub base_url: String,
    /// Secret key (basic auth user name).
    pub secret_key: String,
    /// Token expected in `x-callback-token` on payout callbacks.
    pub callback_token: Option<String>,
    /// Payout currency.
    pub currency: String,
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/z-ledger").
    pub data_dir: String,

    /// HS256 secret for user JWTs.
    pub jwt_secret: String,

    /// Expected JWT issuer, if any.
    pub jwt_issuer: Option<String>,

    /// Service API key for service-to-service auth.
    pub service_api_key: Option<String>,

    /// Admin API key.
    pub admin_api_key: Option<String>,

    /// Secret used to hash transfer PINs.
    pub pin_secret: String,

    /// Roles allowed to send transfers.
    pub transfer_roles: Vec<Role>,

    /// Per-minute paid call prices.
    pub call_tariff: CallTariff,

    /// Monthly topup quota per merchant.
    pub monthly_topup_quota: i64,

    /// Withdrawal conversion and fee rules.
    pub withdrawal_policy: WithdrawalPolicy,

    /// Auto or manual payouts.
    pub payout_mode: PayoutMode,

    /// Upper bound for one payout submission.
    pub payout_timeout_ms: u64,

    /// Payout provider (optional).
    pub payout: Option<PayoutProviderConfig>,

    /// Row lock wait in the store.
    pub lock_timeout_ms: i64,

    /// Rate limits.
    pub rate_limits: RateLimits,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Payout secrets file structure.
#[derive(Debug, Deserialize)]
struct PayoutSecrets {
    base_url: String,
    secret_key: String,
    #[serde(default)]
    callback_token: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let policy = WithdrawalPolicy {
            coins_per_usd: env_parse("WITHDRAW_EXCHANGE_RATE", defaults.withdrawal_policy.coins_per_usd),
            min_usd_cents: env_parse("WITHDRAW_MIN_USD_CENTS", defaults.withdrawal_policy.min_usd_cents),
            fee_bps: env_parse("WITHDRAW_FEE_BPS", defaults.withdrawal_policy.fee_bps),
        };

        let rate_limits = RateLimits {
            transfer: env_rule("RATE_LIMIT_TRANSFER", defaults.rate_limits.transfer),
            withdrawal: env_rule("RATE_LIMIT_WITHDRAWAL", defaults.rate_limits.withdrawal),
            admin_credit: env_rule("RATE_LIMIT_ADMIN_CREDIT", defaults.rate_limits.admin_credit),
        };

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set - using the development secret");
            defaults.jwt_secret.clone()
        });

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            jwt_secret,
            jwt_issuer: std::env::var("JWT_ISSUER").ok(),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            pin_secret: std::env::var("PIN_SECRET").unwrap_or(defaults.pin_secret),
            transfer_roles: std::env::var("TRANSFER_ROLES")
                .ok()
                .map_or(defaults.transfer_roles, |s| {
                    s.split(',').filter_map(|r| r.trim().parse().ok()).collect()
                }),
            call_tariff: CallTariff {
                first_minute: env_parse("CALL_FIRST_MINUTE_PRICE", defaults.call_tariff.first_minute),
                later_minute: env_parse("CALL_MINUTE_PRICE", defaults.call_tariff.later_minute),
            },
            monthly_topup_quota: env_parse("MONTHLY_TOPUP_QUOTA", DEFAULT_MONTHLY_TOPUP_QUOTA),
            withdrawal_policy: policy,
            payout_mode: std::env::var("PAYOUT_MODE")
                .map_or(PayoutMode::Auto, |s| PayoutMode::parse(&s)),
            payout_timeout_ms: env_parse("PAYOUT_TIMEOUT_MS", defaults.payout_timeout_ms),
            payout: load_payout_secrets(),
            lock_timeout_ms: env_parse("LOCK_TIMEOUT_MS", defaults.lock_timeout_ms),
            rate_limits,
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES", defaults.max_body_bytes),
            request_timeout_seconds: env_parse(
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            ),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse `max/window_seconds`, e.g. `10/60`.
fn env_rule(name: &str, default: RateLimitRule) -> RateLimitRule {
    std::env::var(name)
        .ok()
        .and_then(|s| {
            let (max, window) = s.split_once('/')?;
            Some(RateLimitRule::new(
                max.trim().parse().ok()?,
                window.trim().parse().ok()?,
            ))
        })
        .unwrap_or(default)
}

/// Load payout provider secrets from file or environment.
fn load_payout_secrets() -> Option<PayoutProviderConfig> {
    let currency = std::env::var("PAYOUT_CURRENCY").unwrap_or_else(|_| "IDR".into());
    let secret_paths = [
        ".secrets/payout.json",
        "z-ledger/.secrets/payout.json",
        "../.secrets/payout.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<PayoutSecrets>(path) {
            tracing::info!(path = %path, "Loaded payout secrets from file");
            return Some(PayoutProviderConfig {
                base_url: secrets.base_url,
                secret_key: secrets.secret_key,
                callback_token: secrets.callback_token,
                currency,
            });
        }
    }

    tracing::debug!("Payout secrets file not found, using environment variables");
    let secret_key = std::env::var("PAYOUT_SECRET_KEY").ok()?;
    Some(PayoutProviderConfig {
        base_url: std::env::var("PAYOUT_BASE_URL")
            .unwrap_or_else(|_| "https://api.xendit.co".into()),
        secret_key,
        callback_token: std::env::var("PAYOUT_CALLBACK_TOKEN").ok(),
        currency,
    })
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/z-ledger".into(),
            jwt_secret: "dev-jwt-secret".into(),
            jwt_issuer: None,
            service_api_key: None,
            admin_api_key: None,
            pin_secret: "dev-pin-secret".into(),
            transfer_roles: vec![Role::Mentor, Role::Merchant, Role::Admin],
            call_tariff: CallTariff::default(),
            monthly_topup_quota: DEFAULT_MONTHLY_TOPUP_QUOTA,
            withdrawal_policy: WithdrawalPolicy::default(),
            payout_mode: PayoutMode::Auto,
            payout_timeout_ms: 15_000,
            payout: None,
            lock_timeout_ms: z_ledger_store::rocks::DEFAULT_LOCK_TIMEOUT_MS,
            rate_limits: RateLimits::default(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}
