//! Gift and call settlement, and the earnings ledger reads.

use z_ledger_core::{
    ensure_positive, validate_call_id, CallSession, CallTariff, EarningsBalance, Gift, GiftEarning, GiftId,
    LedgerError, RevenueSplit, Room, RoomContext, TransactionKind, TransactionRecord, UserId,
    UserProfile,
};

use crate::error::Result;
use crate::keys;
use crate::rocks::{user_not_found, LedgerTx, RocksStore};
use crate::schema::cf;
use crate::{
    AccountLedger, CallCharge, CallSettlement, Directory, EarningsLedger, GiftQuote, GiftReceipt,
    Settlement,
};

fn load_profile(tx: &LedgerTx<'_>, user_id: &UserId) -> Result<UserProfile> {
    tx.get::<UserProfile>(cf::USERS, &keys::user_key(user_id))?
        .ok_or_else(|| user_not_found(user_id))
}

/// Revalidate the claimed room against the participants and the registry.
fn check_room(tx: &LedgerTx<'_>, room: &RoomContext, sender: UserId, recipient: UserId) -> Result<()> {
    room.ensure_participants(sender, recipient)?;
    if let RoomContext::Public(room_id) = room {
        if tx.get::<Room>(cf::ROOMS, &keys::room_key(room_id))?.is_none() {
            return Err(LedgerError::RoomMembershipMismatch {
                room: room_id.clone(),
            }
            .into());
        }
    }
    Ok(())
}

impl EarningsLedger for RocksStore {
    fn get_earnings(&self, user_id: &UserId) -> Result<EarningsBalance> {
        if let Some(row) = self.read(cf::EARNINGS_BALANCES, &keys::user_key(user_id))? {
            return Ok(row);
        }
        if self.user_known(user_id)? {
            Ok(EarningsBalance::new(*user_id))
        } else {
            Err(user_not_found(user_id))
        }
    }

    fn list_gift_earnings(&self, user_id: &UserId, limit: usize) -> Result<Vec<GiftEarning>> {
        let index = self.scan_prefix_rev(
            cf::GIFT_EARNINGS_BY_USER,
            &keys::user_prefix(user_id),
            0,
            limit,
        )?;
        self.resolve_index(&index, cf::GIFT_EARNINGS)
    }
}

impl Settlement for RocksStore {
    fn quote_gift(&self, sender: &UserId, gift_id: &GiftId) -> Result<GiftQuote> {
        let gift = self
            .get_gift(gift_id)?
            .ok_or_else(|| LedgerError::GiftNotFound {
                gift_id: gift_id.to_string(),
            })?;
        let balance = self.get_balance(sender)?;
        let split = RevenueSplit::standard(gift.price)?;
        Ok(GiftQuote {
            can_afford: balance >= gift.price,
            gift,
            balance,
            split,
        })
    }

    fn purchase_gift(
        &self,
        sender: &UserId,
        recipient: &UserId,
        gift_id: &GiftId,
        room: Option<&RoomContext>,
    ) -> Result<GiftReceipt> {
        if sender == recipient {
            return Err(LedgerError::InvalidRecipient("cannot send a gift to yourself".into()).into());
        }

        let receipt = self.run_in_transaction("purchase_gift", |tx| {
            // Shared lock: a concurrent price change waits for this purchase.
            let gift = tx
                .lock_shared::<Gift>(cf::GIFTS, &keys::ulid_key(gift_id.to_bytes()))?
                .ok_or_else(|| LedgerError::GiftNotFound {
                    gift_id: gift_id.to_string(),
                })?;
            ensure_positive(gift.price)?;

            let sender_profile = load_profile(tx, sender)?;
            load_profile(tx, recipient)?;
            if let Some(room) = room {
                check_room(tx, room, *sender, *recipient)?;
            }

            let split = RevenueSplit::standard(gift.price)?;

            let mut sender_row = tx.lock_account(sender)?;
            let sender_balance = sender_row.debit(gift.price)?;
            tx.put_account(&sender_row)?;

            let mut earnings = tx.lock_earnings(recipient)?;
            let recipient_earnings = earnings.earn(split.user_share)?;
            tx.put_earnings(&earnings)?;

            let earning = GiftEarning::new(
                &gift,
                *sender,
                sender_profile.username,
                *recipient,
                split,
                room.cloned(),
            );
            let earning_id = earning.id.to_bytes();
            tx.put(cf::GIFT_EARNINGS, &keys::ulid_key(earning_id), &earning)?;
            tx.put_index(
                cf::GIFT_EARNINGS_BY_USER,
                &keys::user_index_key(recipient, earning_id),
            )?;

            let transaction = TransactionRecord::new(
                Some(*sender),
                Some(*recipient),
                gift.price,
                TransactionKind::Gift,
                format!("Gift: {}", gift.name),
            );
            tx.append_transaction(&transaction)?;

            Ok(GiftReceipt {
                transaction,
                earning,
                sender_balance,
                recipient_earnings,
            })
        })?;

        tracing::info!(
            sender = %sender,
            recipient = %recipient,
            gift_id = %gift_id,
            price = receipt.earning.gift_price,
            user_share = receipt.earning.user_share,
            system_share = receipt.earning.system_share,
            "Gift settled"
        );
        Ok(receipt)
    }

    fn charge_call_interval(
        &self,
        call_id: &str,
        payer: &UserId,
        receiver: &UserId,
        tariff: &CallTariff,
    ) -> Result<CallCharge> {
        validate_call_id(call_id)?;
        if payer == receiver {
            return Err(LedgerError::InvalidRecipient("cannot call yourself".into()).into());
        }

        let charge = self.run_in_transaction("charge_call_interval", |tx| {
            let key = keys::call_key(call_id);
            let mut session = match tx.lock::<CallSession>(cf::CALL_SESSIONS, &key)? {
                Some(session) => {
                    session.ensure_participants(*payer, *receiver)?;
                    session
                }
                None => {
                    load_profile(tx, receiver)?;
                    CallSession::open(call_id, *payer, *receiver)?
                }
            };
            let amount = session.next_interval_price(tariff);
            ensure_positive(amount)?;
            session.add_charge(amount)?;

            let mut payer_row = tx.lock_account(payer)?;
            let payer_balance = payer_row.debit(amount)?;
            tx.put_account(&payer_row)?;

            let transaction = TransactionRecord::new(
                Some(*payer),
                Some(*receiver),
                amount,
                TransactionKind::CallCharge,
                format!("Call {call_id} interval {}", session.intervals),
            );
            tx.append_transaction(&transaction)?;
            tx.put(cf::CALL_SESSIONS, &key, &session)?;

            Ok(CallCharge {
                session,
                transaction,
                payer_balance,
            })
        })?;

        tracing::debug!(
            call_id,
            payer = %payer,
            amount = charge.transaction.amount,
            interval = charge.session.intervals,
            charged_total = charge.session.charged_total,
            "Call interval charged"
        );
        Ok(charge)
    }

    fn finalize_call(
        &self,
        call_id: &str,
        caller: &UserId,
        claimed_total: i64,
        duration_seconds: u64,
    ) -> Result<CallSettlement> {
        validate_call_id(call_id)?;

        let settlement = self.run_in_transaction("finalize_call", |tx| {
            let key = keys::call_key(call_id);
            let mut session = tx
                .lock::<CallSession>(cf::CALL_SESSIONS, &key)?
                .ok_or_else(|| LedgerError::CallSessionNotFound {
                    call_id: call_id.to_string(),
                })?;
            session.ensure_participant(*caller)?;
            let (payer, receiver) = (session.payer, session.receiver);

            if let (true, Some(split)) = (session.finalized, session.settlement) {
                let earnings = tx.lock_earnings(&receiver)?;
                return Ok(CallSettlement {
                    session,
                    split,
                    receiver_earnings: earnings.balance,
                    already_finalized: true,
                });
            }

            if claimed_total != session.charged_total {
                tracing::warn!(
                    call_id,
                    claimed_total,
                    charged_total = session.charged_total,
                    "Client call total differs from accumulated charges, settling charged total"
                );
            }

            let split = session.finalize(duration_seconds)?;
            let mut earnings = tx.lock_earnings(&receiver)?;
            let receiver_earnings = earnings.earn(split.user_share)?;

            if split.user_share > 0 {
                tx.put_earnings(&earnings)?;
                tx.append_transaction(&TransactionRecord::new(
                    Some(payer),
                    Some(receiver),
                    split.user_share,
                    TransactionKind::CallEarning,
                    format!("Call {call_id} earnings ({duration_seconds}s)"),
                ))?;
            }
            tx.put(cf::CALL_SESSIONS, &key, &session)?;

            Ok(CallSettlement {
                session,
                split,
                receiver_earnings,
                already_finalized: false,
            })
        })?;

        if !settlement.already_finalized {
            tracing::info!(
                call_id,
                payer = %settlement.session.payer,
                receiver = %settlement.session.receiver,
                settled_by = %caller,
                gross = settlement.split.gross,
                user_share = settlement.split.user_share,
                "Call settled"
            );
        }
        Ok(settlement)
    }

    fn get_call_session(&self, call_id: &str) -> Result<Option<CallSession>> {
        self.read(cf::CALL_SESSIONS, &keys::call_key(call_id))
    }
}
