//! Update dispatcher
//!
//! Authorizes and classifies inbound updates, owns the per-user sessions,
//! drives the transition function and executes the effects it asks for.

use super::command::{Command, HELP};
use super::traits::{ChatClient, LedgerStore, ReportRunner};
use crate::chat::{ChatId, Keyboard, Update, UpdateKind, UserId};
use crate::db::{local_offset, now_local, DbError, KindTotals};
use crate::import::{self, ImportReport};
use crate::reports::Report;
use crate::state_machine::{
    transition, DialogContext, DialogState, Effect, Event, Reply, TransitionError,
    NOT_UNDERSTOOD, NO_IMPORT_IN_PROGRESS,
};
use chrono::{DateTime, Datelike, FixedOffset, Months, NaiveDate, TimeZone};
use std::collections::{HashMap, VecDeque};

pub const UNAUTHORIZED: &str = "You are not authorized to use this bot.";
pub const EXPORT_FILE_NAME: &str = "transactions.csv";
const EXPORT_CAPTION: &str = "Transactions export (CSV)";

/// Serial dispatcher for a single authorized user.
///
/// `handle_update` takes `&mut self`; the session map is only ever touched
/// from one update at a time.
pub struct Dispatcher<S, C, R>
where
    S: LedgerStore,
    C: ChatClient,
    R: ReportRunner,
{
    allowed_user: UserId,
    store: S,
    chat: C,
    reports: R,
    /// Open dialog per user
    sessions: HashMap<UserId, DialogState>,
    /// Cached category list, refreshed after imports
    categories: Vec<String>,
}

impl<S, C, R> Dispatcher<S, C, R>
where
    S: LedgerStore,
    C: ChatClient,
    R: ReportRunner,
{
    pub fn new(allowed_user: UserId, store: S, chat: C, reports: R, categories: Vec<String>) -> Self {
        Self {
            allowed_user,
            store,
            chat,
            reports,
            sessions: HashMap::new(),
            categories,
        }
    }

    #[cfg(test)]
    pub fn session(&self, user: UserId) -> Option<&DialogState> {
        self.sessions.get(&user)
    }

    /// Handle one inbound update to completion
    pub async fn handle_update(&mut self, update: Update) {
        let Update {
            update_id,
            sender,
            chat,
            kind,
        } = update;

        if sender != self.allowed_user {
            tracing::warn!(user = %sender, update_id, "Rejected update from unauthorized user");
            if let UpdateKind::Button { callback_id, .. } = &kind {
                self.acknowledge(callback_id).await;
            }
            self.send(chat, UNAUTHORIZED, None).await;
            return;
        }

        match kind {
            UpdateKind::Text(text) => match Command::parse(&text) {
                None => self.route(sender, chat, Event::Text(text)).await,
                Some(Err(e)) => self.send(chat, &e.to_string(), None).await,
                Some(Ok(command)) => self.run_command(sender, chat, command).await,
            },
            UpdateKind::Button {
                callback_id,
                payload,
                message,
            } => {
                self.acknowledge(&callback_id).await;
                self.route(sender, chat, Event::Button { payload, message })
                    .await;
            }
            UpdateKind::Document(document) => {
                self.route(sender, chat, Event::Document(document)).await;
            }
        }
    }

    async fn run_command(&mut self, sender: UserId, chat: ChatId, command: Command) {
        tracing::debug!(user = %sender, ?command, "Command received");
        match command {
            Command::Dialog(start) => self.route(sender, chat, Event::Start(start)).await,
            Command::Summary => self.summary(sender, chat).await,
            Command::Export => self.export(sender, chat).await,
            Command::Report(report) => self.report(sender, chat, report).await,
            Command::Help => self.send(chat, HELP, None).await,
            Command::Cancel => {
                let text = if self.sessions.remove(&sender).is_some() {
                    "Canceled."
                } else {
                    "Nothing to cancel."
                };
                self.send(chat, text, None).await;
            }
            Command::Unknown(_) => self.send(chat, NOT_UNDERSTOOD, None).await,
        }
    }

    // ========================================================================
    // Dialogs
    // ========================================================================

    /// Feed an event to the user's dialog, then the outcomes of any effects,
    /// until nothing is left to process.
    async fn route(&mut self, sender: UserId, chat: ChatId, event: Event) {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            let context = DialogContext::new(self.categories.clone(), now_local());
            let current = self.sessions.get(&sender);
            let from = current.map_or("none", DialogState::name);

            let result = match transition(current, &context, event) {
                Ok(result) => result,
                Err(e) => {
                    // Never leave a dialog parked waiting for an outcome
                    if self.sessions.get(&sender).is_some_and(DialogState::is_pending) {
                        self.sessions.remove(&sender);
                    }
                    self.reject(sender, chat, e).await;
                    return;
                }
            };

            tracing::debug!(
                user = %sender,
                from,
                to = result.new_state.as_ref().map_or("none", DialogState::name),
                "Dialog transition"
            );

            match result.new_state {
                Some(state) => {
                    self.sessions.insert(sender, state);
                }
                None => {
                    self.sessions.remove(&sender);
                }
            }

            for effect in result.effects {
                if let Some(outcome) = self.execute_effect(chat, effect).await {
                    queue.push_back(outcome);
                }
            }
        }
    }

    async fn reject(&self, sender: UserId, chat: ChatId, error: TransitionError) {
        match error {
            TransitionError::NoActiveDialog => self.send(chat, NOT_UNDERSTOOD, None).await,
            TransitionError::NoImportInProgress => {
                self.send(chat, NO_IMPORT_IN_PROGRESS, None).await;
            }
            TransitionError::StaleDialog => {
                tracing::debug!(user = %sender, "Ignoring button from a finished dialog");
            }
            TransitionError::InvalidTransition(reason) => {
                tracing::error!(user = %sender, %reason, "Dialog rejected event");
            }
        }
    }

    /// Execute one effect; store and download effects report back an event
    async fn execute_effect(&mut self, chat: ChatId, effect: Effect) -> Option<Event> {
        match effect {
            Effect::Reply(Reply::Send { text, keyboard }) => {
                self.send(chat, &text, keyboard.as_ref()).await;
                None
            }

            Effect::Reply(Reply::Edit {
                message,
                text,
                keyboard,
            }) => {
                if let Err(e) = self
                    .chat
                    .edit_message(chat, message, &text, keyboard.as_ref())
                    .await
                {
                    tracing::warn!(error = %e, chat = %chat, "Failed to edit message");
                }
                None
            }

            Effect::LookupEntry(entry_id) => Some(match self.store.get_entry(entry_id).await {
                Ok(entry) => Event::EntryFound(entry),
                Err(DbError::EntryNotFound(_)) => Event::EntryMissing(entry_id),
                Err(e) => {
                    tracing::error!(error = %e, entry_id, "Failed to look up transaction");
                    Event::StoreFailed
                }
            }),

            Effect::InsertEntry(entry) => Some(match self.store.insert_entry(&entry).await {
                Ok(entry_id) => {
                    tracing::info!(
                        entry_id,
                        kind = %entry.kind,
                        category = %entry.category,
                        "Transaction added"
                    );
                    Event::EntryAdded(entry_id)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to insert transaction");
                    Event::StoreFailed
                }
            }),

            Effect::UpdateEntry { entry_id, change } => {
                Some(match self.store.update_entry(entry_id, &change).await {
                    Ok(()) => {
                        tracing::info!(entry_id, field = change.field().as_str(), "Transaction updated");
                        Event::EntryUpdated
                    }
                    Err(DbError::EntryNotFound(_)) => Event::EntryMissing(entry_id),
                    Err(e) => {
                        tracing::error!(error = %e, entry_id, "Failed to update transaction");
                        Event::StoreFailed
                    }
                })
            }

            Effect::DeleteEntry(entry_id) => Some(match self.store.delete_entry(entry_id).await {
                Ok(removed) => {
                    tracing::info!(entry_id, removed, "Transaction delete");
                    Event::EntryDeleted { removed }
                }
                Err(e) => {
                    tracing::error!(error = %e, entry_id, "Failed to delete transaction");
                    Event::StoreFailed
                }
            }),

            Effect::ImportDocument(document) => {
                let bytes = match self.chat.download_file(&document.file_id).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::error!(error = %e, file_id = %document.file_id, "Failed to download document");
                        return Some(Event::DownloadFailed);
                    }
                };
                let report = self.import(&bytes).await;
                Some(Event::Imported(report))
            }
        }
    }

    async fn import(&mut self, bytes: &[u8]) -> ImportReport {
        let parsed = import::parse(bytes, now_local());
        let written = if parsed.rows.is_empty() {
            Ok(0)
        } else {
            self.store.insert_batch(&parsed.rows).await
        };
        let report = parsed.finish(written);

        for error in &report.errors {
            tracing::warn!(row = error.row, reason = %error.reason, "CSV import row rejected");
        }
        if let Some(reason) = &report.batch_failure {
            tracing::error!(%reason, "CSV import batch rolled back");
        }
        tracing::info!(
            inserted = report.inserted,
            rejected = report.errors.len(),
            "CSV import finished"
        );

        // Imports may have created categories
        match self.store.list_categories().await {
            Ok(categories) => self.categories = categories,
            Err(e) => tracing::warn!(error = %e, "Failed to refresh categories"),
        }
        report
    }

    // ========================================================================
    // Direct commands
    // ========================================================================

    async fn summary(&mut self, sender: UserId, chat: ChatId) {
        let now = now_local();
        let totals = match month_window(now) {
            Some((from, to)) => self.store.kind_totals(&from, &to).await,
            None => {
                tracing::error!(%now, "No month window around current time");
                self.send(chat, "Error retrieving transactions.", None).await;
                return;
            }
        };

        match totals {
            Ok(totals) => self.send(chat, &format_summary(now, &totals), None).await,
            Err(e) => {
                tracing::error!(error = %e, "Failed to compute monthly summary");
                self.sessions.remove(&sender);
                self.send(chat, "Error retrieving transactions.", None).await;
            }
        }
    }

    async fn export(&mut self, sender: UserId, chat: ChatId) {
        let entries = match self.store.list_entries().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "Failed to query transactions for export");
                self.sessions.remove(&sender);
                self.send(chat, "Failed to query transactions for export.", None)
                    .await;
                return;
            }
        };

        let contents = match import::export(&entries) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::error!(error = %e, "Failed to write CSV export");
                self.send(chat, "Failed to finalize CSV export.", None).await;
                return;
            }
        };

        match self
            .chat
            .send_document(chat, EXPORT_FILE_NAME, contents, EXPORT_CAPTION)
            .await
        {
            Ok(()) => tracing::info!(rows = entries.len(), "Exported transactions"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to send CSV export");
                self.sessions.remove(&sender);
                self.send(chat, "Failed to send CSV file.", None).await;
            }
        }
    }

    async fn report(&mut self, sender: UserId, chat: ChatId, report: Report) {
        match self.reports.run(report, chat).await {
            Ok(output) if output.trim().is_empty() => {
                tracing::info!(?report, "Report finished without output");
            }
            Ok(output) => self.send(chat, &output, None).await,
            Err(e) => {
                tracing::error!(error = %e, ?report, "Report failed");
                self.sessions.remove(&sender);
                self.send(chat, report.failure_message(), None).await;
            }
        }
    }

    // ========================================================================
    // Transport helpers
    // ========================================================================

    async fn send(&self, chat: ChatId, text: &str, keyboard: Option<&Keyboard>) {
        if let Err(e) = self.chat.send_message(chat, text, keyboard).await {
            tracing::error!(error = %e, chat = %chat, "Failed to send message");
        }
    }

    async fn acknowledge(&self, callback_id: &str) {
        if let Err(e) = self.chat.answer_callback(callback_id).await {
            tracing::warn!(error = %e, "Failed to answer callback query");
        }
    }
}

/// `[first day of this month, first day of next month)` at the ledger offset
fn month_window(
    now: DateTime<FixedOffset>,
) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)?;
    let next = first.checked_add_months(Months::new(1))?;
    let offset = local_offset();
    Some((
        offset.from_local_datetime(&first.and_hms_opt(0, 0, 0)?).single()?,
        offset.from_local_datetime(&next.and_hms_opt(0, 0, 0)?).single()?,
    ))
}

fn format_summary(now: DateTime<FixedOffset>, totals: &KindTotals) -> String {
    format!(
        "Monthly Summary Report for {}:\n\nTotal Income: {:.2}\nTotal Expense: {:.2}\n\nBalance: {:.2}",
        now.format("%B %Y"),
        totals.income,
        totals.expense,
        totals.balance()
    )
}
