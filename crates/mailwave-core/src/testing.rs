//! In-memory test doubles for the repository, transport and clock seams

use crate::clock::Clock;
use crate::transport::Transport;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mailwave_common::types::{MailingId, MessageId, RecipientId};
use mailwave_common::{Error, Result};
use mailwave_storage::models::{
    AttemptStatus, CreateMailing, CreateMailingLog, CreateMessage, CreateRecipient, Mailing,
    MailingAttempt, MailingLog, MailingStatus, Message, Recipient,
};
use mailwave_storage::repository::attempts::{AttemptCounts, MailingAttemptRepository};
use mailwave_storage::repository::locks::LockProvider;
use mailwave_storage::repository::logs::{LogCounts, MailingLogRepository};
use mailwave_storage::repository::mailings::MailingRepository;
use mailwave_storage::repository::messages::MessageRepository;
use mailwave_storage::repository::recipients::RecipientRepository;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// Clock pinned to a settable instant
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

enum Behavior {
    AcceptZero,
    Fail(String),
}

/// Transport double with per-address behaviors; accepts one recipient
/// by default and records every delivery it was asked to perform.
pub struct MockTransport {
    behaviors: Mutex<HashMap<String, Behavior>>,
    deliveries: Mutex<Vec<(String, String)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            behaviors: Mutex::new(HashMap::new()),
            deliveries: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_for(&self, to: &str, error: &str) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(to.to_string(), Behavior::Fail(error.to_string()));
    }

    pub fn accept_zero_for(&self, to: &str) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(to.to_string(), Behavior::AcceptZero);
    }

    /// (to, subject) pairs in delivery order
    pub fn deliveries(&self) -> Vec<(String, String)> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn deliver(&self, subject: &str, _body: &str, _from: &str, to: &str) -> Result<u32> {
        match self.behaviors.lock().unwrap().get(to) {
            Some(Behavior::Fail(error)) => Err(Error::Transport(error.clone())),
            Some(Behavior::AcceptZero) => Ok(0),
            None => {
                self.deliveries
                    .lock()
                    .unwrap()
                    .push((to.to_string(), subject.to_string()));
                Ok(1)
            }
        }
    }
}

/// Non-reentrant lock double with an acquisition counter
pub struct MockLock {
    held: Mutex<HashSet<String>>,
    acquired: AtomicUsize,
}

impl MockLock {
    pub fn new() -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            acquired: AtomicUsize::new(0),
        }
    }

    pub fn acquired_count(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.held.lock().unwrap().contains(key)
    }

    /// Pre-hold a key, as if another scheduler instance owned it
    pub fn hold(&self, key: &str) {
        self.held.lock().unwrap().insert(key.to_string());
    }
}

#[async_trait]
impl LockProvider for MockLock {
    async fn try_acquire(&self, key: &str, _ttl: Duration) -> Result<bool> {
        let inserted = self.held.lock().unwrap().insert(key.to_string());
        if inserted {
            self.acquired.fetch_add(1, Ordering::SeqCst);
        }
        Ok(inserted)
    }

    async fn release(&self, key: &str) -> Result<()> {
        self.held.lock().unwrap().remove(key);
        Ok(())
    }
}

/// In-memory store implementing the repository traits the core uses
pub struct MemoryStore {
    mailings: Mutex<Vec<Mailing>>,
    messages: Mutex<Vec<Message>>,
    recipients: Mutex<Vec<Recipient>>,
    mailing_recipients: Mutex<HashMap<MailingId, Vec<RecipientId>>>,
    logs: Mutex<Vec<MailingLog>>,
    attempts: Mutex<Vec<MailingAttempt>>,
    log_writes_fail: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            mailings: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
            recipients: Mutex::new(Vec::new()),
            mailing_recipients: Mutex::new(HashMap::new()),
            logs: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
            log_writes_fail: AtomicBool::new(false),
        }
    }

    pub fn add_message(&self, owner: &str, subject: &str, body: &str) -> Message {
        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.messages.lock().unwrap().push(message.clone());
        message
    }

    pub fn add_recipient(&self, owner: &str, email: &str) -> Recipient {
        let now = Utc::now();
        let recipient = Recipient {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            email: email.to_string(),
            full_name: "Test Recipient".to_string(),
            comment: String::new(),
            created_at: now,
            updated_at: now,
        };
        self.recipients.lock().unwrap().push(recipient.clone());
        recipient
    }

    pub fn add_mailing(
        &self,
        owner: &str,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        message_id: MessageId,
        recipient_ids: &[RecipientId],
        status: MailingStatus,
    ) -> Mailing {
        let now = Utc::now();
        let mailing = Mailing {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            start_at,
            end_at,
            status: status.to_string(),
            message_id,
            last_sent_at: None,
            created_at: now,
            updated_at: now,
        };
        self.mailings.lock().unwrap().push(mailing.clone());
        self.mailing_recipients
            .lock()
            .unwrap()
            .insert(mailing.id, recipient_ids.to_vec());
        mailing
    }

    pub fn mailing(&self, id: MailingId) -> Mailing {
        self.mailings
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .expect("mailing not in store")
    }

    pub fn set_last_sent_at(&self, id: MailingId, at: Option<DateTime<Utc>>) {
        let mut mailings = self.mailings.lock().unwrap();
        let mailing = mailings.iter_mut().find(|m| m.id == id).unwrap();
        mailing.last_sent_at = at;
    }

    pub fn logs_for(&self, id: MailingId) -> Vec<MailingLog> {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.mailing_id == id)
            .cloned()
            .collect()
    }

    pub fn attempts_for(&self, id: MailingId) -> Vec<MailingAttempt> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.mailing_id == id)
            .cloned()
            .collect()
    }

    pub fn fail_log_writes(&self) {
        self.log_writes_fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MailingRepository for MemoryStore {
    async fn create(&self, input: CreateMailing, status: MailingStatus) -> Result<Mailing> {
        let mailing = self.add_mailing(
            &input.owner,
            input.start_at,
            input.end_at,
            input.message_id,
            &input.recipient_ids,
            status,
        );
        Ok(mailing)
    }

    async fn get(&self, id: MailingId) -> Result<Option<Mailing>> {
        Ok(self
            .mailings
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .cloned())
    }

    async fn list_by_owner(&self, owner: &str, limit: i64, offset: i64) -> Result<Vec<Mailing>> {
        Ok(self
            .mailings
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.owner == owner)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn recipients(&self, id: MailingId) -> Result<Vec<Recipient>> {
        let ids = self
            .mailing_recipients
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default();
        let recipients = self.recipients.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|rid| recipients.iter().find(|r| r.id == *rid).cloned())
            .collect())
    }

    async fn set_recipients(&self, id: MailingId, recipient_ids: &[RecipientId]) -> Result<()> {
        self.mailing_recipients
            .lock()
            .unwrap()
            .insert(id, recipient_ids.to_vec());
        Ok(())
    }

    async fn update_window(
        &self,
        id: MailingId,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        status: MailingStatus,
    ) -> Result<Option<Mailing>> {
        let mut mailings = self.mailings.lock().unwrap();
        match mailings.iter_mut().find(|m| m.id == id) {
            Some(mailing) => {
                mailing.start_at = start_at;
                mailing.end_at = end_at;
                mailing.status = status.to_string();
                mailing.updated_at = Utc::now();
                Ok(Some(mailing.clone()))
            }
            None => Ok(None),
        }
    }

    async fn update_status(&self, id: MailingId, status: MailingStatus) -> Result<()> {
        let mut mailings = self.mailings.lock().unwrap();
        if let Some(mailing) = mailings.iter_mut().find(|m| m.id == id) {
            mailing.status = status.to_string();
            mailing.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_sent(
        &self,
        id: MailingId,
        at: DateTime<Utc>,
        status: MailingStatus,
    ) -> Result<()> {
        let mut mailings = self.mailings.lock().unwrap();
        if let Some(mailing) = mailings.iter_mut().find(|m| m.id == id) {
            mailing.last_sent_at = Some(at);
            mailing.status = status.to_string();
            mailing.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_due(&self, now: DateTime<Utc>, cutoff: DateTime<Utc>) -> Result<Vec<Mailing>> {
        Ok(self
            .mailings
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                m.start_at <= now
                    && m.end_at >= now
                    && matches!(m.status.as_str(), "created" | "running")
                    && m.last_sent_at.map_or(true, |at| at <= cutoff)
            })
            .cloned()
            .collect())
    }

    async fn delete_unsent(&self, id: MailingId) -> Result<bool> {
        let mut mailings = self.mailings.lock().unwrap();
        match mailings.iter().position(|m| m.id == id) {
            None => Ok(false),
            Some(pos) if mailings[pos].has_ever_sent() => Err(Error::validation(
                "mailing",
                "mailing has send history and cannot be deleted",
            )),
            Some(pos) => {
                mailings.remove(pos);
                Ok(true)
            }
        }
    }
}

#[async_trait]
impl RecipientRepository for MemoryStore {
    async fn create(&self, input: CreateRecipient) -> Result<Recipient> {
        let input = input.normalized()?;
        let mut recipients = self.recipients.lock().unwrap();
        if recipients.iter().any(|r| r.email == input.email) {
            return Err(Error::validation(
                "email",
                "a recipient with this email already exists",
            ));
        }
        let now = Utc::now();
        let recipient = Recipient {
            id: Uuid::new_v4(),
            owner: input.owner,
            email: input.email,
            full_name: input.full_name,
            comment: input.comment,
            created_at: now,
            updated_at: now,
        };
        recipients.push(recipient.clone());
        Ok(recipient)
    }

    async fn get(&self, id: RecipientId) -> Result<Option<Recipient>> {
        Ok(self
            .recipients
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Recipient>> {
        let email = mailwave_common::types::normalize_email(email);
        Ok(self
            .recipients
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.email == email)
            .cloned())
    }

    async fn list_by_owner(&self, owner: &str, limit: i64, offset: i64) -> Result<Vec<Recipient>> {
        Ok(self
            .recipients
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.owner == owner)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: RecipientId) -> Result<bool> {
        let mut recipients = self.recipients.lock().unwrap();
        let before = recipients.len();
        recipients.retain(|r| r.id != id);
        Ok(recipients.len() < before)
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn create(&self, input: CreateMessage) -> Result<Message> {
        let input = input.normalized()?;
        Ok(self.add_message(&input.owner, &input.subject, &input.body))
    }

    async fn get(&self, id: MessageId) -> Result<Option<Message>> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .cloned())
    }

    async fn list_by_owner(&self, owner: &str, limit: i64, offset: i64) -> Result<Vec<Message>> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.owner == owner)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: MessageId) -> Result<bool> {
        let mut messages = self.messages.lock().unwrap();
        let before = messages.len();
        messages.retain(|m| m.id != id);
        Ok(messages.len() < before)
    }
}

#[async_trait]
impl MailingLogRepository for MemoryStore {
    async fn create(&self, input: CreateMailingLog) -> Result<MailingLog> {
        if self.log_writes_fail.load(Ordering::SeqCst) {
            return Err(Error::Database("log write failed".to_string()));
        }
        let log = MailingLog {
            id: Uuid::new_v4(),
            mailing_id: input.mailing_id,
            recipient: input.recipient,
            status: input.status.to_string(),
            detail: input.detail,
            triggered_by: input.triggered_by,
            created_at: Utc::now(),
        };
        self.logs.lock().unwrap().push(log.clone());
        Ok(log)
    }

    async fn list_by_mailing(
        &self,
        mailing_id: MailingId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MailingLog>> {
        Ok(self
            .logs_for(mailing_id)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn status_counts(&self, mailing_id: MailingId) -> Result<LogCounts> {
        let logs = self.logs_for(mailing_id);
        Ok(LogCounts {
            sent: logs.iter().filter(|l| l.status == "sent").count() as i64,
            failed: logs.iter().filter(|l| l.status == "error").count() as i64,
            dry_run: logs.iter().filter(|l| l.status == "dry_run").count() as i64,
        })
    }
}

#[async_trait]
impl MailingAttemptRepository for MemoryStore {
    async fn open(
        &self,
        mailing_id: MailingId,
        triggered_by: Option<&str>,
    ) -> Result<MailingAttempt> {
        let attempt = MailingAttempt {
            id: Uuid::new_v4(),
            mailing_id,
            status: AttemptStatus::Fail.to_string(),
            server_response: "attempt started".to_string(),
            triggered_by: triggered_by.map(|a| a.to_string()),
            attempted_at: Utc::now(),
        };
        self.attempts.lock().unwrap().push(attempt.clone());
        Ok(attempt)
    }

    async fn finalize(&self, id: Uuid, status: AttemptStatus, response: &str) -> Result<()> {
        let mut attempts = self.attempts.lock().unwrap();
        if let Some(attempt) = attempts.iter_mut().find(|a| a.id == id) {
            attempt.status = status.to_string();
            attempt.server_response = response.to_string();
        }
        Ok(())
    }

    async fn list_by_mailing(
        &self,
        mailing_id: MailingId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MailingAttempt>> {
        Ok(self
            .attempts_for(mailing_id)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn status_counts(&self, mailing_id: MailingId) -> Result<AttemptCounts> {
        let attempts = self.attempts_for(mailing_id);
        Ok(AttemptCounts {
            success: attempts.iter().filter(|a| a.status == "success").count() as i64,
            fail: attempts.iter().filter(|a| a.status == "fail").count() as i64,
        })
    }
}
