//! Slash command parsing

use crate::db::EntryId;
use crate::reports::Report;
use crate::state_machine::DialogCommand;
use thiserror::Error;

/// A recognised `/command`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Opens or replaces the user's dialog
    Dialog(DialogCommand),
    Summary,
    Export,
    Report(Report),
    Help,
    Cancel,
    Unknown(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Invalid ID provided. Usage: /{command} <id>")]
    InvalidId { command: &'static str },
}

impl Command {
    /// Parse `/name[@bot] [args]`. Returns `None` for text that is not a
    /// command at all.
    pub fn parse(text: &str) -> Option<Result<Self, CommandError>> {
        let rest = text.trim().strip_prefix('/')?;
        let (head, args) = rest
            .split_once(char::is_whitespace)
            .unwrap_or((rest, ""));
        let name = head.split_once('@').map_or(head, |(name, _bot)| name);
        let args = args.trim();

        let command = match name {
            "add" => Command::Dialog(DialogCommand::Add),
            "edit" => match parse_optional_id(args, "edit") {
                Ok(id) => Command::Dialog(DialogCommand::Edit(id)),
                Err(e) => return Some(Err(e)),
            },
            "delete" => match parse_optional_id(args, "delete") {
                Ok(id) => Command::Dialog(DialogCommand::Delete(id)),
                Err(e) => return Some(Err(e)),
            },
            "bulk_transactions" => Command::Dialog(DialogCommand::BulkImport),
            "summary" => Command::Summary,
            "export" | "export_csv" => Command::Export,
            "get_latest_report" => Command::Report(Report::Latest),
            "get_weekly_expense" => Command::Report(Report::WeeklyExpense),
            "get_weekly_expense_piechart" => Command::Report(Report::WeeklyExpensePiechart),
            "start" | "help" => Command::Help,
            "cancel" => Command::Cancel,
            other => Command::Unknown(other.to_string()),
        };
        Some(Ok(command))
    }
}

fn parse_optional_id(args: &str, command: &'static str) -> Result<Option<EntryId>, CommandError> {
    if args.is_empty() {
        return Ok(None);
    }
    args.parse::<EntryId>()
        .ok()
        .filter(|id| *id > 0)
        .map(Some)
        .ok_or(CommandError::InvalidId { command })
}

/// Reply to `/start` and `/help`
pub const HELP: &str = "Available commands:
/add - record an income or expense
/edit [id] - change one field of a transaction
/delete [id] - delete a transaction
/bulk_transactions - import transactions from a CSV file
/export - download all transactions as CSV
/summary - totals for the current month
/get_latest_report - latest report
/get_weekly_expense - weekly expense report
/get_weekly_expense_piechart - weekly expense pie chart
/cancel - abandon the current dialog";
