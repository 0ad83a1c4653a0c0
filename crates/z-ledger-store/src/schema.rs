//! Database schema definitions and column families.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Spendable balances, keyed by `user_id`.
    pub const ACCOUNT_BALANCES: &str = "account_balances";

    /// Withdrawable earnings, keyed by `user_id`.
    pub const EARNINGS_BALANCES: &str = "earnings_balances";

    /// Transaction records, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: transactions by participant, keyed by `user_id || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTIONS_BY_USER: &str = "transactions_by_user";

    /// Gift catalog, keyed by `gift_id`.
    pub const GIFTS: &str = "gifts";

    /// Gift earning records, keyed by `gift_earning_id`.
    pub const GIFT_EARNINGS: &str = "gift_earnings";

    /// Index: gift earnings by recipient, keyed by `user_id || gift_earning_id`.
    pub const GIFT_EARNINGS_BY_USER: &str = "gift_earnings_by_user";

    /// Public room registry, keyed by room id.
    pub const ROOMS: &str = "rooms";

    /// Paid call sessions, keyed by call id.
    pub const CALL_SESSIONS: &str = "call_sessions";

    /// Linked payout accounts, keyed by `linked_account_id`.
    pub const LINKED_ACCOUNTS: &str = "linked_accounts";

    /// Index: linked accounts by owner, keyed by `user_id || linked_account_id`.
    pub const LINKED_ACCOUNTS_BY_USER: &str = "linked_accounts_by_user";

    /// Unique index: normalized account number to its owning claim.
    pub const LINKED_ACCOUNT_NUMBERS: &str = "linked_account_numbers";

    /// Withdrawal requests, keyed by `withdrawal_id`.
    pub const WITHDRAWALS: &str = "withdrawals";

    /// Index: withdrawals by user, keyed by `user_id || withdrawal_id`.
    pub const WITHDRAWALS_BY_USER: &str = "withdrawals_by_user";

    /// Index: withdrawals by status, keyed by `status || withdrawal_id`.
    pub const WITHDRAWALS_BY_STATUS: &str = "withdrawals_by_status";

    /// Index: withdrawals flagged for manual reconciliation, keyed by `withdrawal_id`.
    pub const WITHDRAWALS_RECONCILIATION: &str = "withdrawals_reconciliation";

    /// User directory, keyed by `user_id`.
    pub const USERS: &str = "users";

    /// Unique index: lower-cased username to `user_id`.
    pub const USERNAMES: &str = "usernames";

    /// Monthly topup progress, keyed by `merchant_id || YYYY-MM`.
    pub const TOPUP_PROGRESS: &str = "topup_progress";

    /// Audit log, keyed by `audit_id` (ULID).
    pub const AUDIT_LOG: &str = "audit_log";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNT_BALANCES,
        cf::EARNINGS_BALANCES,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_USER,
        cf::GIFTS,
        cf::GIFT_EARNINGS,
        cf::GIFT_EARNINGS_BY_USER,
        cf::ROOMS,
        cf::CALL_SESSIONS,
        cf::LINKED_ACCOUNTS,
        cf::LINKED_ACCOUNTS_BY_USER,
        cf::LINKED_ACCOUNT_NUMBERS,
        cf::WITHDRAWALS,
        cf::WITHDRAWALS_BY_USER,
        cf::WITHDRAWALS_BY_STATUS,
        cf::WITHDRAWALS_RECONCILIATION,
        cf::USERS,
        cf::USERNAMES,
        cf::TOPUP_PROGRESS,
        cf::AUDIT_LOG,
    ]
}
