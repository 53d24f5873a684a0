//! Mock implementations for testing
//!
//! These mocks let the dispatcher run end to end against an in-memory
//! database without a chat platform or report scripts.

use super::traits::*;
use crate::chat::{ChatId, Keyboard, MessageId};
use crate::db::{
    Database, DbError, DbResult, EntryId, FieldChange, KindTotals, LedgerEntry, NewEntry,
};
use crate::reports::{Report, ReportError};
use crate::telegram::TransportError;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// Mock Chat Client
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat: ChatId,
    pub id: MessageId,
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditedMessage {
    pub chat: ChatId,
    pub message: MessageId,
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentDocument {
    pub chat: ChatId,
    pub file_name: String,
    pub contents: Vec<u8>,
    pub caption: String,
}

/// Chat client that records everything and serves queued downloads
#[allow(dead_code)]
pub struct MockChat {
    next_id: AtomicI64,
    downloads: Mutex<VecDeque<Result<Vec<u8>, TransportError>>>,
    fail_documents: AtomicBool,
    pub sent: Mutex<Vec<SentMessage>>,
    pub edits: Mutex<Vec<EditedMessage>>,
    pub acks: Mutex<Vec<String>>,
    pub documents: Mutex<Vec<SentDocument>>,
}

#[allow(dead_code)]
impl MockChat {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(100),
            downloads: Mutex::new(VecDeque::new()),
            fail_documents: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            acks: Mutex::new(Vec::new()),
            documents: Mutex::new(Vec::new()),
        }
    }

    /// Queue the contents of the next downloaded file
    pub fn queue_download(&self, contents: impl Into<Vec<u8>>) {
        self.downloads.lock().unwrap().push_back(Ok(contents.into()));
    }

    pub fn queue_download_error(&self, error: TransportError) {
        self.downloads.lock().unwrap().push_back(Err(error));
    }

    pub fn fail_documents(&self) {
        self.fail_documents.store(true, Ordering::SeqCst);
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|m| m.text.clone()).collect()
    }

    pub fn edit_texts(&self) -> Vec<String> {
        self.edits.lock().unwrap().iter().map(|m| m.text.clone()).collect()
    }

    pub fn last_sent(&self) -> Option<SentMessage> {
        self.sent.lock().unwrap().last().cloned()
    }

    pub fn last_edit(&self) -> Option<EditedMessage> {
        self.edits.lock().unwrap().last().cloned()
    }

    /// Id of the most recent message carrying a keyboard
    pub fn last_keyboard_message(&self) -> Option<MessageId> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.keyboard.is_some())
            .map(|m| m.id)
    }

    /// Total outbound traffic, acknowledgements included
    pub fn outbound_count(&self) -> usize {
        self.sent.lock().unwrap().len()
            + self.edits.lock().unwrap().len()
            + self.acks.lock().unwrap().len()
            + self.documents.lock().unwrap().len()
    }
}

impl Default for MockChat {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatClient for MockChat {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.sent.lock().unwrap().push(SentMessage {
            chat,
            id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(id)
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        self.edits.lock().unwrap().push(EditedMessage {
            chat,
            message,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        self.acks.lock().unwrap().push(callback_id.to_string());
        Ok(())
    }

    async fn send_document(
        &self,
        chat: ChatId,
        file_name: &str,
        contents: Vec<u8>,
        caption: &str,
    ) -> Result<(), TransportError> {
        if self.fail_documents.load(Ordering::SeqCst) {
            return Err(TransportError::Api {
                method: "sendDocument",
                description: "Bad Request: file is empty".to_string(),
            });
        }
        self.documents.lock().unwrap().push(SentDocument {
            chat,
            file_name: file_name.to_string(),
            contents,
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn download_file(&self, _file_id: &str) -> Result<Vec<u8>, TransportError> {
        self.downloads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(TransportError::MissingFilePath))
    }
}

// ============================================================================
// Mock Report Runner
// ============================================================================

/// Report runner returning queued results
#[allow(dead_code)]
pub struct MockReports {
    results: Mutex<VecDeque<Result<String, ReportError>>>,
    pub runs: Mutex<Vec<(Report, ChatId)>>,
}

#[allow(dead_code)]
impl MockReports {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_output(&self, output: impl Into<String>) {
        self.results.lock().unwrap().push_back(Ok(output.into()));
    }

    pub fn queue_error(&self, error: ReportError) {
        self.results.lock().unwrap().push_back(Err(error));
    }
}

impl Default for MockReports {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportRunner for MockReports {
    async fn run(&self, report: Report, chat: ChatId) -> Result<String, ReportError> {
        self.runs.lock().unwrap().push((report, chat));
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(String::new()))
    }
}

// ============================================================================
// Recording Store
// ============================================================================

/// Real database behind a call counter and a failure switch
#[allow(dead_code)]
pub struct RecordingStore {
    pub db: Database,
    calls: AtomicUsize,
    batches: AtomicUsize,
    fail: AtomicBool,
}

#[allow(dead_code)]
impl RecordingStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            calls: AtomicUsize::new(0),
            batches: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail
    pub fn fail_all(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    fn enter(&self) -> DbResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            Err(DbError::Sqlite(rusqlite::Error::InvalidQuery))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LedgerStore for RecordingStore {
    async fn list_categories(&self) -> DbResult<Vec<String>> {
        self.enter()?;
        self.db.list_categories()
    }

    async fn get_entry(&self, id: EntryId) -> DbResult<LedgerEntry> {
        self.enter()?;
        self.db.get_entry(id)
    }

    async fn insert_entry(&self, entry: &NewEntry) -> DbResult<EntryId> {
        self.enter()?;
        self.db.insert_entry(entry)
    }

    async fn update_entry(&self, id: EntryId, change: &FieldChange) -> DbResult<()> {
        self.enter()?;
        self.db.update_entry(id, change)
    }

    async fn delete_entry(&self, id: EntryId) -> DbResult<bool> {
        self.enter()?;
        self.db.delete_entry(id)
    }

    async fn insert_batch(&self, rows: &[NewEntry]) -> DbResult<usize> {
        self.enter()?;
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.db.insert_batch(rows)
    }

    async fn kind_totals(
        &self,
        from: &DateTime<FixedOffset>,
        to: &DateTime<FixedOffset>,
    ) -> DbResult<KindTotals> {
        self.enter()?;
        self.db.kind_totals(from, to)
    }

    async fn list_entries(&self) -> DbResult<Vec<LedgerEntry>> {
        self.enter()?;
        self.db.list_entries()
    }
}

#[cfg(test)]
mod tests {
    use super::super::executor::UNAUTHORIZED;
    use super::*;
    use crate::chat::{Document, Update, UpdateKind, UserId};
    use crate::db::{format_timestamp, now_local, EntryKind, DEFAULT_CATEGORIES};
    use crate::runtime::Dispatcher;
    use crate::state_machine::{DialogState, NOT_UNDERSTOOD, NO_IMPORT_IN_PROGRESS};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    const OWNER: UserId = UserId(42);
    const CHAT: ChatId = ChatId(42);

    type TestDispatcher = Dispatcher<Arc<RecordingStore>, Arc<MockChat>, Arc<MockReports>>;

    struct Harness {
        dispatcher: TestDispatcher,
        store: Arc<RecordingStore>,
        chat: Arc<MockChat>,
        reports: Arc<MockReports>,
        next_update: i64,
    }

    impl Harness {
        fn new() -> Self {
            let db = Database::open_in_memory().unwrap();
            db.seed_categories(DEFAULT_CATEGORIES).unwrap();
            let categories = db.list_categories().unwrap();

            let store = Arc::new(RecordingStore::new(db));
            let chat = Arc::new(MockChat::new());
            let reports = Arc::new(MockReports::new());
            let dispatcher = Dispatcher::new(
                OWNER,
                store.clone(),
                chat.clone(),
                reports.clone(),
                categories,
            );
            Self {
                dispatcher,
                store,
                chat,
                reports,
                next_update: 1,
            }
        }

        async fn deliver(&mut self, sender: UserId, kind: UpdateKind) {
            let update = Update {
                update_id: self.next_update,
                sender,
                chat: ChatId(sender.0),
                kind,
            };
            self.next_update += 1;
            self.dispatcher.handle_update(update).await;
        }

        async fn text(&mut self, text: &str) {
            self.deliver(OWNER, UpdateKind::Text(text.to_string())).await;
        }

        /// Press a button on the latest keyboard message
        async fn press(&mut self, payload: &str) {
            let message = self.chat.last_keyboard_message().unwrap_or(MessageId(1));
            let callback_id = format!("cb{}", self.next_update);
            self.deliver(
                OWNER,
                UpdateKind::Button {
                    callback_id,
                    payload: payload.to_string(),
                    message,
                },
            )
            .await;
        }

        async fn upload(&mut self, file_name: &str) {
            self.deliver(
                OWNER,
                UpdateKind::Document(Document {
                    file_id: "file-1".to_string(),
                    file_name: Some(file_name.to_string()),
                    mime_type: None,
                }),
            )
            .await;
        }

        fn state(&self) -> Option<&DialogState> {
            self.dispatcher.session(OWNER)
        }

        fn last_text(&self) -> String {
            self.chat.last_sent().map(|m| m.text).unwrap_or_default()
        }

        fn seed_entry(&self, kind: EntryKind, category: &str, amount: Decimal) -> EntryId {
            self.store
                .db
                .insert_entry(&NewEntry {
                    kind,
                    category: category.to_string(),
                    amount,
                    description: Some("seeded".to_string()),
                    created_at: now_local(),
                })
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_add_flow_records_entry() {
        let mut h = Harness::new();

        h.text("/add").await;
        assert_eq!(h.state(), Some(&DialogState::SelectType));
        let prompt = h.chat.last_sent().unwrap();
        assert_eq!(prompt.keyboard.unwrap().payloads(), vec!["income", "expense", "cancel"]);

        h.press("expense").await;
        let edit = h.chat.last_edit().unwrap();
        assert_eq!(edit.message, prompt.id);
        assert!(edit.keyboard.unwrap().payloads().contains(&"cat:Food"));

        // Category buttons resolve case-insensitively
        h.press("cat:food").await;
        assert_eq!(
            h.chat.last_edit().unwrap().text,
            "Selected category: Food. Enter the transaction amount."
        );

        h.text("12.50").await;
        h.text("lunch").await;

        assert_eq!(h.last_text(), "Transaction added successfully! (ID 1)");
        assert_eq!(h.state(), None);

        let entry = h.store.db.get_entry(1).unwrap();
        assert_eq!(entry.kind, EntryKind::Expense);
        assert_eq!(entry.category, "Food");
        assert_eq!(entry.amount, Decimal::new(1250, 2));
        assert_eq!(entry.description.as_deref(), Some("lunch"));
    }

    #[tokio::test]
    async fn test_every_button_is_acknowledged() {
        let mut h = Harness::new();
        h.text("/add").await;
        h.press("income").await;
        h.press("cancel").await;

        assert_eq!(h.chat.acks.lock().unwrap().len(), 2);
        assert_eq!(h.chat.last_edit().unwrap().text, "Transaction canceled.");
        assert_eq!(h.state(), None);
    }

    #[tokio::test]
    async fn test_unauthorized_user_is_rejected() {
        let mut h = Harness::new();
        let stranger = UserId(7);

        h.deliver(stranger, UpdateKind::Text("/delete 1".to_string()))
            .await;
        h.deliver(
            stranger,
            UpdateKind::Button {
                callback_id: "cb".to_string(),
                payload: "delete_confirm".to_string(),
                message: MessageId(1),
            },
        )
        .await;

        assert_eq!(h.store.calls(), 0);
        assert!(h.dispatcher.session(stranger).is_none());
        assert_eq!(
            h.chat.sent_texts(),
            vec![UNAUTHORIZED; 2]
        );
        assert_eq!(h.chat.sent.lock().unwrap()[0].chat, ChatId(7));
        assert_eq!(h.chat.acks.lock().unwrap().as_slice(), ["cb".to_string()]);
    }

    #[tokio::test]
    async fn test_edit_changes_one_field() {
        let mut h = Harness::new();
        let id = h.seed_entry(EntryKind::Expense, "Food", Decimal::new(500, 2));

        h.text(&format!("/edit {id}")).await;
        assert_eq!(h.state(), Some(&DialogState::SelectEditField { entry_id: id }));
        assert!(h.last_text().starts_with(&format!("Transaction ID: {id}\n")));

        h.press("edit_field:amount").await;
        h.text("-3").await;
        assert_eq!(
            h.last_text(),
            "Invalid amount. Please enter a positive number."
        );

        h.text("20").await;
        assert_eq!(
            h.chat.last_edit().unwrap().text,
            format!("Transaction {id} updated: amount set to 20.00")
        );
        assert_eq!(h.state(), None);

        let entry = h.store.db.get_entry(id).unwrap();
        assert_eq!(entry.amount, Decimal::new(20, 0));
        assert_eq!(entry.kind, EntryKind::Expense);
        assert_eq!(entry.category, "Food");
        assert_eq!(entry.description.as_deref(), Some("seeded"));
    }

    #[tokio::test]
    async fn test_edit_category_by_button() {
        let mut h = Harness::new();
        let id = h.seed_entry(EntryKind::Income, "Salary", Decimal::new(1000, 0));

        h.text("/edit").await;
        h.text(&id.to_string()).await;
        h.press("edit_field:category").await;
        h.press("cat:Needs").await;

        assert_eq!(h.store.db.get_entry(id).unwrap().category, "Needs");
        assert_eq!(
            h.chat.last_edit().unwrap().text,
            format!("Transaction {id} updated: category set to Needs")
        );
    }

    #[tokio::test]
    async fn test_delete_needs_confirmation() {
        let mut h = Harness::new();
        let id = h.seed_entry(EntryKind::Expense, "Water", Decimal::new(3, 0));

        h.text(&format!("/delete {id}")).await;
        assert_eq!(h.state(), Some(&DialogState::ConfirmDelete { entry_id: id }));

        // Typing is never a confirmation
        h.text("yes").await;
        assert_eq!(h.last_text(), NOT_UNDERSTOOD);
        assert!(h.store.db.get_entry(id).is_ok());

        h.press("delete_confirm").await;
        assert_eq!(
            h.chat.last_edit().unwrap().text,
            format!("Transaction {id} has been deleted.")
        );
        assert!(matches!(
            h.store.db.get_entry(id),
            Err(DbError::EntryNotFound(_))
        ));
        assert_eq!(h.state(), None);
    }

    #[tokio::test]
    async fn test_store_failure_clears_session() {
        let mut h = Harness::new();
        h.text("/add").await;
        h.press("income").await;
        h.press("cat:Salary").await;
        h.text("100").await;

        h.store.fail_all();
        h.text("dinner").await;

        assert_eq!(h.last_text(), "Failed to save transaction.");
        assert_eq!(h.state(), None);
    }

    #[tokio::test]
    async fn test_bulk_import_flow() {
        let mut h = Harness::new();
        h.chat
            .queue_download("kind,category,amount,description\nexpense,Food,5,snack\nincome,Bonus,100,\n");

        h.text("/bulk_transactions").await;
        assert_eq!(h.state(), Some(&DialogState::AwaitFile));

        h.text("here you go").await;
        assert_eq!(h.state(), Some(&DialogState::AwaitFile));

        h.upload("ledger.csv").await;
        let texts = h.chat.sent_texts();
        assert!(texts.contains(&"File received. Processing...".to_string()));
        assert_eq!(h.last_text(), "Import complete: 2 rows inserted.");
        assert_eq!(h.state(), None);
        assert_eq!(h.store.db.list_entries().unwrap().len(), 2);

        // New categories show up in later keyboards
        h.text("/add").await;
        h.press("expense").await;
        let keyboard = h.chat.last_edit().unwrap().keyboard.unwrap();
        assert!(keyboard.payloads().contains(&"cat:Bonus"));
    }

    #[tokio::test]
    async fn test_import_of_only_invalid_rows() {
        let mut h = Harness::new();
        h.chat.queue_download("expense,,,-5\n");

        h.text("/bulk_transactions").await;
        h.upload("bad.csv").await;

        assert!(h
            .last_text()
            .starts_with("Import finished: 0 rows inserted. There were 1 errors:\nrow 1:"));
        assert_eq!(h.store.batches(), 0);
        assert!(h.store.db.list_entries().unwrap().is_empty());
        assert_eq!(h.state(), None);
    }

    #[tokio::test]
    async fn test_import_rejects_non_csv_and_stray_documents() {
        let mut h = Harness::new();

        h.upload("ledger.csv").await;
        assert_eq!(h.last_text(), NO_IMPORT_IN_PROGRESS);

        h.text("/bulk_transactions").await;
        h.upload("photo.jpg").await;
        assert_eq!(h.state(), Some(&DialogState::AwaitFile));

        h.text("cancel").await;
        assert_eq!(h.last_text(), "Bulk import canceled.");
        assert_eq!(h.state(), None);
    }

    #[tokio::test]
    async fn test_import_download_failure() {
        let mut h = Harness::new();
        h.chat.queue_download_error(TransportError::MissingFilePath);

        h.text("/bulk_transactions").await;
        h.upload("ledger.csv").await;

        assert_eq!(h.last_text(), "Failed to download the uploaded file.");
        assert_eq!(h.state(), None);
    }

    #[tokio::test]
    async fn test_stale_button_is_ignored() {
        let mut h = Harness::new();
        h.press("income").await;

        assert_eq!(h.chat.acks.lock().unwrap().len(), 1);
        assert!(h.chat.sent.lock().unwrap().is_empty());
        assert!(h.chat.edits.lock().unwrap().is_empty());
        assert_eq!(h.state(), None);
    }

    #[tokio::test]
    async fn test_direct_lookup_miss_keeps_open_dialog() {
        let mut h = Harness::new();
        h.text("/add").await;

        h.text("/edit 99").await;
        assert_eq!(h.last_text(), "Transaction with ID 99 not found.");
        assert_eq!(h.state(), Some(&DialogState::SelectType));
    }

    #[tokio::test]
    async fn test_invalid_command_id() {
        let mut h = Harness::new();
        h.text("/edit abc").await;

        assert_eq!(h.last_text(), "Invalid ID provided. Usage: /edit <id>");
        assert_eq!(h.store.calls(), 0);
    }

    #[tokio::test]
    async fn test_text_without_dialog() {
        let mut h = Harness::new();
        h.text("hello").await;
        assert_eq!(h.last_text(), NOT_UNDERSTOOD);
    }

    #[tokio::test]
    async fn test_summary() {
        let mut h = Harness::new();
        h.seed_entry(EntryKind::Income, "Salary", Decimal::new(100, 0));
        h.seed_entry(EntryKind::Expense, "Food", Decimal::new(2550, 2));

        h.text("/summary").await;

        let text = h.last_text();
        assert!(text.starts_with("Monthly Summary Report for "));
        assert!(text.contains("Total Income: 100.00\nTotal Expense: 25.50\n\nBalance: 74.50"));
    }

    #[tokio::test]
    async fn test_summary_failure_discards_session() {
        let mut h = Harness::new();
        h.text("/add").await;
        h.store.fail_all();

        h.text("/summary").await;
        assert_eq!(h.last_text(), "Error retrieving transactions.");
        assert_eq!(h.state(), None);
    }

    #[tokio::test]
    async fn test_summary_overflow_is_reported() {
        let mut h = Harness::new();
        let now = format_timestamp(&now_local());
        h.store
            .db
            .execute_batch(&format!(
                "INSERT INTO transactions (type, category, amount, created_at)
                 VALUES ('expense', 'Food', 5e28, '{now}'), ('expense', 'Food', 5e28, '{now}');"
            ))
            .unwrap();

        h.text("/summary").await;
        assert_eq!(h.last_text(), "Error retrieving transactions.");
    }

    #[tokio::test]
    async fn test_export() {
        let mut h = Harness::new();
        h.seed_entry(EntryKind::Expense, "Food", Decimal::new(5, 0));

        h.text("/export_csv").await;

        let documents = h.chat.documents.lock().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].file_name, "transactions.csv");
        let body = String::from_utf8(documents[0].contents.clone()).unwrap();
        assert!(body.starts_with("kind,category,amount,description,created_at,id\n"));
        assert!(body.contains("expense,Food,"));
    }

    #[tokio::test]
    async fn test_export_send_failure() {
        let mut h = Harness::new();
        h.chat.fail_documents();

        h.text("/export").await;
        assert_eq!(h.last_text(), "Failed to send CSV file.");
    }

    #[tokio::test]
    async fn test_report_output_is_relayed() {
        let mut h = Harness::new();
        h.reports.queue_output("Latest: 3 transactions");

        h.text("/get_latest_report").await;

        assert_eq!(h.last_text(), "Latest: 3 transactions");
        assert_eq!(
            h.reports.runs.lock().unwrap().as_slice(),
            [(Report::Latest, CHAT)]
        );
    }

    #[tokio::test]
    async fn test_report_failure_discards_session() {
        let mut h = Harness::new();
        h.text("/add").await;
        h.reports.queue_error(ReportError::Failed {
            code: 1,
            output: "Traceback".to_string(),
        });

        h.text("/get_weekly_expense_piechart").await;

        assert_eq!(h.last_text(), "Failed to run piechart script. Check logs.");
        assert_eq!(h.state(), None);
    }

    #[tokio::test]
    async fn test_unknown_command_keeps_dialog() {
        let mut h = Harness::new();
        h.text("/add").await;
        h.text("/frobnicate").await;

        assert_eq!(h.last_text(), NOT_UNDERSTOOD);
        assert_eq!(h.state(), Some(&DialogState::SelectType));
    }

    #[tokio::test]
    async fn test_cancel_command() {
        let mut h = Harness::new();
        h.text("/cancel").await;
        assert_eq!(h.last_text(), "Nothing to cancel.");

        h.text("/delete").await;
        h.text("/cancel").await;
        assert_eq!(h.last_text(), "Canceled.");
        assert_eq!(h.state(), None);
    }

    #[tokio::test]
    async fn test_new_command_replaces_dialog() {
        let mut h = Harness::new();
        h.text("/delete").await;
        h.text("/add").await;
        assert_eq!(h.state(), Some(&DialogState::SelectType));
        assert_eq!(h.chat.outbound_count(), 2);
    }
}
