//! Persistent state database backed by sled (pure-Rust, no C dependencies).
//!
//! One tree per entity plus a secondary-index tree per uniqueness
//! invariant spec.md calls out (sequence number, transaction hash,
//! nullifier, session id, block hash, bank code + account number).
//! Mirrors the teacher's `chronx-state::StateDb` one-tree-per-entity
//! layout; the secondary-index trees are new here because `chronx-state`
//! has no uniqueness constraint beyond primary key.
//!
//! Named trees:
//!   users              — Idx bytes                → bincode(User)
//!   accounts           — account id utf8           → bincode(BankAccount)
//!   accounts_by_bank    — "{bank_code}:{account_number}" → account id      [index]
//!   sessions           — session_id utf8           → bincode(Session)
//!   recipients         — "{owner_idx}:{nickname}"  → bincode(Recipient)
//!   transactions       — transaction_hash utf8      → bincode(Transaction)
//!   tx_by_sequence     — sequence_number be bytes   → transaction_hash    [index]
//!   tx_by_nullifier    — nullifier utf8             → transaction_hash    [index]
//!   batches            — batch_id utf8              → bincode(TransactionBatch)
//!   voting_records     — "{batch_id}:{bank_code}"   → bincode(BankVotingRecord)
//!   blocks_public      — block_index be bytes       → bincode(BlockPublic)
//!   blocks_public_by_hash — block_hash utf8         → block_index be bytes [index]
//!   blocks_private     — block_index be bytes       → bincode(BlockPrivate)
//!   judges             — judge_id utf8              → bincode(Judge)
//!   court_orders       — order_id utf8              → bincode(CourtOrder)
//!   banks              — bank_code utf8             → bincode(Bank)
//!   treasury           — seq be bytes               → bincode(TreasuryEntry)
//!   audit_log          — seq be bytes               → bincode(AuditLogEntry)
//!   ratelimit          — key utf8                    → bincode((u32, Timestamp))
//!   meta               — utf8 key                    → raw bytes (counters)

use std::path::Path;

use bl_core::entities::{
    AuditLogEntry, Bank, BankAccount, BankVotingRecord, BlockPrivate, BlockPublic, CourtOrder,
    Judge, Recipient, Session, TransactionBatch, TreasuryEntry, User,
};
use bl_core::entities::Transaction;
use bl_core::error::BlError;
use bl_core::types::{Idx, SequenceNumber, Timestamp};

fn storage(e: sled::Error) -> BlError {
    BlError::Storage(e.to_string())
}

fn ser(e: bincode::Error) -> BlError {
    BlError::Serialization(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, BlError> {
    bincode::serialize(value).map_err(ser)
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, BlError> {
    bincode::deserialize(bytes).map_err(ser)
}

fn recipient_key(owner_idx: &Idx, nickname: &str) -> Vec<u8> {
    format!("{}:{nickname}", owner_idx.as_str()).into_bytes()
}

fn voting_key(batch_id: &str, bank_code: &str) -> Vec<u8> {
    format!("{batch_id}:{bank_code}").into_bytes()
}

fn account_index_key(bank_code: &str, account_number: &str) -> Vec<u8> {
    format!("{bank_code}:{account_number}").into_bytes()
}

pub struct LedgerStore {
    db: sled::Db,
    users: sled::Tree,
    accounts: sled::Tree,
    accounts_by_bank: sled::Tree,
    sessions: sled::Tree,
    recipients: sled::Tree,
    recipients_by_idx_pair: sled::Tree,
    transactions: sled::Tree,
    tx_by_sequence: sled::Tree,
    tx_by_nullifier: sled::Tree,
    batches: sled::Tree,
    voting_records: sled::Tree,
    blocks_public: sled::Tree,
    blocks_public_by_hash: sled::Tree,
    blocks_private: sled::Tree,
    judges: sled::Tree,
    court_orders: sled::Tree,
    banks: sled::Tree,
    treasury: sled::Tree,
    audit_log: sled::Tree,
    ratelimit: sled::Tree,
    meta: sled::Tree,
}

impl LedgerStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BlError> {
        let db = sled::open(path).map_err(storage)?;
        Ok(Self {
            users: db.open_tree("users").map_err(storage)?,
            accounts: db.open_tree("accounts").map_err(storage)?,
            accounts_by_bank: db.open_tree("accounts_by_bank").map_err(storage)?,
            sessions: db.open_tree("sessions").map_err(storage)?,
            recipients: db.open_tree("recipients").map_err(storage)?,
            recipients_by_idx_pair: db.open_tree("recipients_by_idx_pair").map_err(storage)?,
            transactions: db.open_tree("transactions").map_err(storage)?,
            tx_by_sequence: db.open_tree("tx_by_sequence").map_err(storage)?,
            tx_by_nullifier: db.open_tree("tx_by_nullifier").map_err(storage)?,
            batches: db.open_tree("batches").map_err(storage)?,
            voting_records: db.open_tree("voting_records").map_err(storage)?,
            blocks_public: db.open_tree("blocks_public").map_err(storage)?,
            blocks_public_by_hash: db.open_tree("blocks_public_by_hash").map_err(storage)?,
            blocks_private: db.open_tree("blocks_private").map_err(storage)?,
            judges: db.open_tree("judges").map_err(storage)?,
            court_orders: db.open_tree("court_orders").map_err(storage)?,
            banks: db.open_tree("banks").map_err(storage)?,
            treasury: db.open_tree("treasury").map_err(storage)?,
            audit_log: db.open_tree("audit_log").map_err(storage)?,
            ratelimit: db.open_tree("ratelimit").map_err(storage)?,
            meta: db.open_tree("meta").map_err(storage)?,
            db,
        })
    }

    pub fn flush(&self) -> Result<(), BlError> {
        self.db.flush().map_err(storage)?;
        Ok(())
    }

    // ── Users ────────────────────────────────────────────────────────────────

    pub fn get_user(&self, idx: &Idx) -> Result<Option<User>, BlError> {
        match self.users.get(idx.as_str().as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_user(&self, user: &User) -> Result<(), BlError> {
        self.users
            .insert(user.idx.as_str().as_bytes(), encode(user)?)
            .map_err(storage)?;
        Ok(())
    }

    // ── Bank accounts ────────────────────────────────────────────────────────

    pub fn get_account(&self, id: &str) -> Result<Option<BankAccount>, BlError> {
        match self.accounts.get(id.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_account_by_number(
        &self,
        bank_code: &str,
        account_number: &str,
    ) -> Result<Option<BankAccount>, BlError> {
        let key = account_index_key(bank_code, account_number);
        match self.accounts_by_bank.get(key).map_err(storage)? {
            Some(id_bytes) => {
                let id = String::from_utf8_lossy(&id_bytes).to_string();
                self.get_account(&id)
            }
            None => Ok(None),
        }
    }

    /// Insert a new account, enforcing the one-per-(bank_code, account_number)
    /// invariant via compare-and-swap on the secondary index tree.
    pub fn put_account_new(&self, account: &BankAccount) -> Result<(), BlError> {
        let index_key = account_index_key(&account.bank_code, &account.account_number);
        let cas = self
            .accounts_by_bank
            .compare_and_swap(&index_key, None as Option<&[u8]>, Some(account.id.as_bytes()))
            .map_err(storage)?;
        if cas.is_err() {
            return Err(BlError::DuplicateTransaction(format!(
                "account already exists for {}:{}",
                account.bank_code, account.account_number
            )));
        }
        self.accounts
            .insert(account.id.as_bytes(), encode(account)?)
            .map_err(storage)?;
        Ok(())
    }

    /// Overwrite an existing account row (balance/frozen-state updates).
    pub fn put_account(&self, account: &BankAccount) -> Result<(), BlError> {
        self.accounts
            .insert(account.id.as_bytes(), encode(account)?)
            .map_err(storage)?;
        Ok(())
    }

    /// All accounts owned by `idx` — used to execute the disclosure
    /// protocol's optional account freeze.
    pub fn iter_accounts_for_user(&self, idx: &Idx) -> Result<Vec<BankAccount>, BlError> {
        let mut out = Vec::new();
        for item in self.accounts.iter() {
            let (_, bytes) = item.map_err(storage)?;
            let account: BankAccount = decode(&bytes)?;
            if account.user_idx == *idx {
                out.push(account);
            }
        }
        Ok(out)
    }

    // ── Sessions ─────────────────────────────────────────────────────────────

    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>, BlError> {
        match self.sessions.get(session_id.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_session(&self, session: &Session) -> Result<(), BlError> {
        self.sessions
            .insert(session.session_id.as_str().as_bytes(), encode(session)?)
            .map_err(storage)?;
        Ok(())
    }

    /// Find the active session for (user_idx, bank_account_id), if any.
    pub fn find_active_session(
        &self,
        user_idx: &Idx,
        bank_account_id: &str,
    ) -> Result<Option<Session>, BlError> {
        for item in self.sessions.iter() {
            let (_, bytes) = item.map_err(storage)?;
            let session: Session = decode(&bytes)?;
            if session.is_active
                && session.user_idx == *user_idx
                && session.bank_account_id == bank_account_id
            {
                return Ok(Some(session));
            }
        }
        Ok(None)
    }

    pub fn iter_sessions(&self) -> Result<Vec<Session>, BlError> {
        let mut out = Vec::new();
        for item in self.sessions.iter() {
            let (_, bytes) = item.map_err(storage)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    // ── Recipients ───────────────────────────────────────────────────────────

    pub fn get_recipient(&self, owner_idx: &Idx, nickname: &str) -> Result<Option<Recipient>, BlError> {
        match self
            .recipients
            .get(recipient_key(owner_idx, nickname))
            .map_err(storage)?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_recipient(&self, recipient: &Recipient) -> Result<(), BlError> {
        let key = recipient_key(&recipient.owner_idx, &recipient.nickname);
        self.recipients.insert(&key, encode(recipient)?).map_err(storage)?;
        let pair_key = format!(
            "{}:{}",
            recipient.owner_idx.as_str(),
            recipient.recipient_idx.as_str()
        );
        self.recipients_by_idx_pair
            .insert(pair_key.as_bytes(), key)
            .map_err(storage)?;
        Ok(())
    }

    /// Look up a recipient binding by (owner_idx, recipient_idx) rather than
    /// by nickname — used by the anomaly detector's "verified recipient"
    /// adjustment.
    pub fn get_recipient_by_idx_pair(
        &self,
        owner_idx: &Idx,
        recipient_idx: &Idx,
    ) -> Result<Option<Recipient>, BlError> {
        let pair_key = format!("{}:{}", owner_idx.as_str(), recipient_idx.as_str());
        match self
            .recipients_by_idx_pair
            .get(pair_key.as_bytes())
            .map_err(storage)?
        {
            Some(recipient_key_bytes) => {
                match self.recipients.get(&recipient_key_bytes).map_err(storage)? {
                    Some(bytes) => Ok(Some(decode(&bytes)?)),
                    None => Ok(None),
                }
            }
            None => Ok(None),
        }
    }

    // ── Transactions ─────────────────────────────────────────────────────────

    pub fn get_transaction(&self, hash: &str) -> Result<Option<Transaction>, BlError> {
        match self.transactions.get(hash.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_transaction_by_sequence(
        &self,
        sequence_number: SequenceNumber,
    ) -> Result<Option<Transaction>, BlError> {
        match self
            .tx_by_sequence
            .get(sequence_number.to_be_bytes())
            .map_err(storage)?
        {
            Some(hash_bytes) => self.get_transaction(&String::from_utf8_lossy(&hash_bytes)),
            None => Ok(None),
        }
    }

    /// Insert a brand-new transaction, enforcing uniqueness of
    /// `sequence_number` and `nullifier` via compare-and-swap.
    pub fn put_transaction_new(&self, tx: &Transaction) -> Result<(), BlError> {
        let seq_cas = self
            .tx_by_sequence
            .compare_and_swap(
                tx.sequence_number.to_be_bytes(),
                None as Option<&[u8]>,
                Some(tx.transaction_hash.as_bytes()),
            )
            .map_err(storage)?;
        if seq_cas.is_err() {
            return Err(BlError::DuplicateTransaction(format!(
                "sequence number {} already used",
                tx.sequence_number
            )));
        }
        let null_cas = self
            .tx_by_nullifier
            .compare_and_swap(
                tx.nullifier.as_bytes(),
                None as Option<&[u8]>,
                Some(tx.transaction_hash.as_bytes()),
            )
            .map_err(storage)?;
        if null_cas.is_err() {
            return Err(BlError::DuplicateTransaction(format!(
                "nullifier {} already spent",
                tx.nullifier
            )));
        }
        self.transactions
            .insert(tx.transaction_hash.as_bytes(), encode(tx)?)
            .map_err(storage)?;
        Ok(())
    }

    /// Overwrite an existing transaction row (status transitions).
    pub fn put_transaction(&self, tx: &Transaction) -> Result<(), BlError> {
        self.transactions
            .insert(tx.transaction_hash.as_bytes(), encode(tx)?)
            .map_err(storage)?;
        Ok(())
    }

    pub fn next_sequence_number(&self) -> Result<SequenceNumber, BlError> {
        self.next_meta_counter("next_sequence_number")
    }

    pub fn iter_transactions_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<Transaction>, BlError> {
        let mut out = Vec::new();
        for item in self.transactions.iter() {
            let (_, bytes) = item.map_err(storage)?;
            let tx: Transaction = decode(&bytes)?;
            if tx.sender_account_id == account_id
                || tx.receiver_account_id.as_deref() == Some(account_id)
            {
                out.push(tx);
            }
        }
        Ok(out)
    }

    /// All transactions originated by `sender_idx` (used by the anomaly
    /// detector's velocity/structuring/history checks).
    pub fn iter_transactions_by_sender(&self, sender_idx: &Idx) -> Result<Vec<Transaction>, BlError> {
        let mut out = Vec::new();
        for item in self.transactions.iter() {
            let (_, bytes) = item.map_err(storage)?;
            let tx: Transaction = decode(&bytes)?;
            if tx.sender_idx == *sender_idx {
                out.push(tx);
            }
        }
        Ok(out)
    }

    /// Every transaction where `idx` appears as sender or receiver — the
    /// court-ordered disclosure path's lookup (it does not know which
    /// bank account(s) the target used).
    pub fn iter_transactions_involving(&self, idx: &Idx) -> Result<Vec<Transaction>, BlError> {
        let mut out = Vec::new();
        for item in self.transactions.iter() {
            let (_, bytes) = item.map_err(storage)?;
            let tx: Transaction = decode(&bytes)?;
            if tx.sender_idx == *idx || tx.receiver_idx == *idx {
                out.push(tx);
            }
        }
        Ok(out)
    }

    /// All transactions currently in `PENDING` status, used by the batch
    /// assembler to pick the next window of work.
    pub fn iter_pending_transactions(&self) -> Result<Vec<Transaction>, BlError> {
        use bl_core::types::TransactionStatus;
        let mut out = Vec::new();
        for item in self.transactions.iter() {
            let (_, bytes) = item.map_err(storage)?;
            let tx: Transaction = decode(&bytes)?;
            if tx.status == TransactionStatus::Pending {
                out.push(tx);
            }
        }
        Ok(out)
    }

    // ── Batches ──────────────────────────────────────────────────────────────

    pub fn get_batch(&self, batch_id: &str) -> Result<Option<TransactionBatch>, BlError> {
        match self.batches.get(batch_id.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_batch(&self, batch: &TransactionBatch) -> Result<(), BlError> {
        self.batches
            .insert(batch.batch_id.as_bytes(), encode(batch)?)
            .map_err(storage)?;
        Ok(())
    }

    pub fn iter_batches(&self) -> Result<Vec<TransactionBatch>, BlError> {
        let mut out = Vec::new();
        for item in self.batches.iter() {
            let (_, bytes) = item.map_err(storage)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    // ── Bank voting records ──────────────────────────────────────────────────

    pub fn get_vote(&self, batch_id: &str, bank_code: &str) -> Result<Option<BankVotingRecord>, BlError> {
        match self
            .voting_records
            .get(voting_key(batch_id, bank_code))
            .map_err(storage)?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Record a bank's vote, enforcing "at most one vote per (batch, bank)".
    pub fn put_vote_new(&self, record: &BankVotingRecord) -> Result<(), BlError> {
        let key = voting_key(&record.batch_id, &record.bank_code);
        let cas = self
            .voting_records
            .compare_and_swap(&key, None as Option<&[u8]>, Some(encode(record)?))
            .map_err(storage)?;
        if cas.is_err() {
            return Err(BlError::DuplicateVote {
                batch_id: record.batch_id.clone(),
            });
        }
        Ok(())
    }

    pub fn put_vote(&self, record: &BankVotingRecord) -> Result<(), BlError> {
        let key = voting_key(&record.batch_id, &record.bank_code);
        self.voting_records.insert(key, encode(record)?).map_err(storage)?;
        Ok(())
    }

    pub fn iter_votes_for_batch(&self, batch_id: &str) -> Result<Vec<BankVotingRecord>, BlError> {
        let prefix = format!("{batch_id}:");
        let mut out = Vec::new();
        for item in self.voting_records.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = item.map_err(storage)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    // ── Public blocks ────────────────────────────────────────────────────────

    pub fn get_block_public(&self, index: u64) -> Result<Option<BlockPublic>, BlError> {
        match self.blocks_public.get(index.to_be_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_block_public_by_hash(&self, hash: &str) -> Result<Option<BlockPublic>, BlError> {
        match self.blocks_public_by_hash.get(hash.as_bytes()).map_err(storage)? {
            Some(idx_bytes) => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&idx_bytes);
                self.get_block_public(u64::from_be_bytes(arr))
            }
            None => Ok(None),
        }
    }

    pub fn latest_block_public(&self) -> Result<Option<BlockPublic>, BlError> {
        match self.blocks_public.last().map_err(storage)? {
            Some((_, bytes)) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Insert a new public block, enforcing hash uniqueness.
    pub fn put_block_public_new(&self, block: &BlockPublic) -> Result<(), BlError> {
        let cas = self
            .blocks_public_by_hash
            .compare_and_swap(
                block.block_hash.as_bytes(),
                None as Option<&[u8]>,
                Some(&block.block_index.to_be_bytes()),
            )
            .map_err(storage)?;
        if cas.is_err() {
            return Err(BlError::BlockInvalid(format!(
                "duplicate block hash {}",
                block.block_hash
            )));
        }
        self.blocks_public
            .insert(block.block_index.to_be_bytes(), encode(block)?)
            .map_err(storage)?;
        Ok(())
    }

    pub fn next_public_block_index(&self) -> Result<u64, BlError> {
        Ok(self.next_meta_counter("next_public_block_index")? as u64)
    }

    // ── Private blocks ───────────────────────────────────────────────────────

    pub fn get_block_private(&self, index: u64) -> Result<Option<BlockPrivate>, BlError> {
        match self.blocks_private.get(index.to_be_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_block_private(&self, block: &BlockPrivate) -> Result<(), BlError> {
        self.blocks_private
            .insert(block.block_index.to_be_bytes(), encode(block)?)
            .map_err(storage)?;
        Ok(())
    }

    pub fn iter_blocks_private(&self) -> Result<Vec<BlockPrivate>, BlError> {
        let mut out = Vec::new();
        for item in self.blocks_private.iter() {
            let (_, bytes) = item.map_err(storage)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    pub fn next_private_block_index(&self) -> Result<u64, BlError> {
        Ok(self.next_meta_counter("next_private_block_index")? as u64)
    }

    // ── Judges ───────────────────────────────────────────────────────────────

    pub fn get_judge(&self, judge_id: &str) -> Result<Option<Judge>, BlError> {
        match self.judges.get(judge_id.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_judge(&self, judge: &Judge) -> Result<(), BlError> {
        self.judges
            .insert(judge.judge_id.as_bytes(), encode(judge)?)
            .map_err(storage)?;
        Ok(())
    }

    // ── Court orders ─────────────────────────────────────────────────────────

    pub fn get_court_order(&self, order_id: &str) -> Result<Option<CourtOrder>, BlError> {
        match self.court_orders.get(order_id.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_court_order(&self, order: &CourtOrder) -> Result<(), BlError> {
        self.court_orders
            .insert(order.order_id.as_bytes(), encode(order)?)
            .map_err(storage)?;
        Ok(())
    }

    // ── Banks ────────────────────────────────────────────────────────────────

    pub fn get_bank(&self, bank_code: &str) -> Result<Option<Bank>, BlError> {
        match self.banks.get(bank_code.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_bank(&self, bank: &Bank) -> Result<(), BlError> {
        self.banks
            .insert(bank.bank_code.as_bytes(), encode(bank)?)
            .map_err(storage)?;
        Ok(())
    }

    pub fn iter_banks(&self) -> Result<Vec<Bank>, BlError> {
        let mut out = Vec::new();
        for item in self.banks.iter() {
            let (_, bytes) = item.map_err(storage)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    pub fn iter_domestic_consortium_banks(&self) -> Result<Vec<Bank>, BlError> {
        Ok(self
            .iter_banks()?
            .into_iter()
            .filter(|b| b.is_domestic_consortium_member)
            .collect())
    }

    // ── Treasury ─────────────────────────────────────────────────────────────

    pub fn append_treasury_entry(&self, entry: &TreasuryEntry) -> Result<u64, BlError> {
        let seq = self.next_meta_counter("next_treasury_seq")?;
        self.treasury
            .insert((seq as u64).to_be_bytes(), encode(entry)?)
            .map_err(storage)?;
        Ok(seq as u64)
    }

    pub fn iter_treasury_for_fiscal_year(
        &self,
        fiscal_year: &str,
    ) -> Result<Vec<TreasuryEntry>, BlError> {
        let mut out = Vec::new();
        for item in self.treasury.iter() {
            let (_, bytes) = item.map_err(storage)?;
            let entry: TreasuryEntry = decode(&bytes)?;
            if entry.fiscal_year.0 == fiscal_year {
                out.push(entry);
            }
        }
        Ok(out)
    }

    // ── Audit log ────────────────────────────────────────────────────────────

    /// Reserve the next sequence number for a hash-chained audit entry. The
    /// caller (bl-disclosure) reads `latest_audit_entry` for the chain's
    /// current tail hash, builds the entry, then calls `put_audit_entry`.
    pub fn next_audit_seq(&self) -> Result<u64, BlError> {
        Ok(self.next_meta_counter("next_audit_seq")? as u64)
    }

    pub fn latest_audit_entry(&self) -> Result<Option<AuditLogEntry>, BlError> {
        match self.audit_log.last().map_err(storage)? {
            Some((_, bytes)) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_audit_entry(&self, entry: &AuditLogEntry) -> Result<(), BlError> {
        self.audit_log
            .insert(entry.seq.to_be_bytes(), encode(entry)?)
            .map_err(storage)?;
        Ok(())
    }

    pub fn iter_audit_log(&self) -> Result<Vec<AuditLogEntry>, BlError> {
        let mut out = Vec::new();
        for item in self.audit_log.iter() {
            let (_, bytes) = item.map_err(storage)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    // ── Rate limiting ────────────────────────────────────────────────────────

    pub fn get_ratelimit(&self, key: &str) -> Result<Option<(u32, Timestamp)>, BlError> {
        match self.ratelimit.get(key.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_ratelimit(&self, key: &str, count: u32, blocked_until: Timestamp) -> Result<(), BlError> {
        self.ratelimit
            .insert(key.as_bytes(), encode(&(count, blocked_until))?)
            .map_err(storage)?;
        Ok(())
    }

    // ── Meta counters ────────────────────────────────────────────────────────

    fn next_meta_counter(&self, key: &str) -> Result<i64, BlError> {
        let current = match self.meta.get(key.as_bytes()).map_err(storage)? {
            Some(bytes) => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&bytes);
                i64::from_be_bytes(arr)
            }
            None => 1,
        };
        self.meta
            .insert(key.as_bytes(), (current + 1).to_be_bytes().to_vec())
            .map_err(storage)?;
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bl_core::entities::Transaction;
    use bl_core::types::{SessionId, TransactionStatus, TransactionType};

    fn store() -> LedgerStore {
        let dir = tempfile::tempdir().unwrap();
        LedgerStore::open(dir.path().join("db")).unwrap()
    }

    fn sample_tx(seq: i64, hash: &str, nullifier: &str) -> Transaction {
        Transaction {
            sequence_number: seq,
            transaction_hash: hash.to_string(),
            sender_account_id: "acc-a".to_string(),
            receiver_account_id: Some("acc-b".to_string()),
            sender_idx: Idx("IDX_a".to_string()),
            receiver_idx: Idx("IDX_b".to_string()),
            sender_session_id: SessionId("SESSION_a".to_string()),
            receiver_session_id: Some(SessionId("SESSION_b".to_string())),
            amount: 1000,
            fee: 15,
            miner_fee: 5,
            bank_fee: 10,
            transaction_type: TransactionType::Domestic,
            status: TransactionStatus::Pending,
            batch_id: None,
            public_block_index: None,
            private_block_index: None,
            commitment: "commit".to_string(),
            nullifier: nullifier.to_string(),
            encrypted_data: None,
            encrypted_key: None,
            anomaly_score: None,
            anomaly_flags: vec![],
            requires_investigation: false,
            created_at: 1000,
            completed_at: None,
            flagged_at: None,
        }
    }

    #[test]
    fn duplicate_sequence_number_rejected() {
        let store = store();
        store.put_transaction_new(&sample_tx(1, "hash1", "null1")).unwrap();
        let err = store.put_transaction_new(&sample_tx(1, "hash2", "null2"));
        assert!(matches!(err, Err(BlError::DuplicateTransaction(_))));
    }

    #[test]
    fn duplicate_nullifier_rejected() {
        let store = store();
        store.put_transaction_new(&sample_tx(1, "hash1", "null-shared")).unwrap();
        let err = store.put_transaction_new(&sample_tx(2, "hash2", "null-shared"));
        assert!(matches!(err, Err(BlError::DuplicateTransaction(_))));
    }

    #[test]
    fn sequence_number_lookup_round_trips() {
        let store = store();
        store.put_transaction_new(&sample_tx(42, "hash42", "null42")).unwrap();
        let tx = store.get_transaction_by_sequence(42).unwrap().unwrap();
        assert_eq!(tx.transaction_hash, "hash42");
    }

    #[test]
    fn duplicate_vote_rejected() {
        let store = store();
        let record = BankVotingRecord {
            batch_id: "batch1".to_string(),
            bank_code: "HDFC".to_string(),
            vote: bl_core::types::Vote::Approve,
            validation_time_ms: 10,
            is_correct: None,
            rbi_verified: false,
            was_slashed: false,
            slash_amount: 0,
            challenged_by: None,
            group_signature: None,
        };
        store.put_vote_new(&record).unwrap();
        assert!(matches!(store.put_vote_new(&record), Err(BlError::DuplicateVote { .. })));
    }

    #[test]
    fn account_uniqueness_enforced() {
        let store = store();
        let acc = BankAccount {
            id: "acc-1".to_string(),
            user_idx: Idx("IDX_a".to_string()),
            bank_code: "HDFC".to_string(),
            account_number: "1234".to_string(),
            balance: 0,
            is_active: true,
            is_frozen: false,
            account_type: bl_core::entities::AccountType::Retail,
            created_at: 0,
        };
        store.put_account_new(&acc).unwrap();
        let mut dup = acc.clone();
        dup.id = "acc-2".to_string();
        assert!(store.put_account_new(&dup).is_err());
    }
}
