//! Report delegate: runs the external report scripts
//!
//! Each report is a script run by an interpreter with a bounded timeout. The
//! scripts read the same database file and may talk to the chat API
//! themselves; their combined output is relayed to the chat.

use crate::chat::ChatId;
use crate::runtime::ReportRunner;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

#[cfg(unix)]
use nix::sys::signal::{killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Chat messages are capped at 4096 characters
const MAX_OUTPUT_CHARS: usize = 4000;

/// The reports the bot can delegate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    Latest,
    WeeklyExpense,
    WeeklyExpensePiechart,
}

impl Report {
    fn script(self) -> &'static str {
        match self {
            Report::Latest => "g_latest_r.py",
            Report::WeeklyExpense => "g_weekly_e_r.py",
            Report::WeeklyExpensePiechart => "g_w_e_piechart.py",
        }
    }

    /// Reply when the script cannot be run or fails
    pub fn failure_message(self) -> &'static str {
        match self {
            Report::Latest | Report::WeeklyExpense => "Failed to execute the report.",
            Report::WeeklyExpensePiechart => "Failed to run piechart script. Check logs.",
        }
    }

    /// The piechart script sends its image itself and takes the target chat
    /// as its only argument
    fn takes_chat_argument(self) -> bool {
        matches!(self, Report::WeeklyExpensePiechart)
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to start report script: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Report script timed out after {0:?}")]
    TimedOut(Duration),
    #[error("Report script failed with exit code {code}: {output}")]
    Failed { code: i32, output: String },
}

/// Runs report scripts from a directory with a fixed interpreter
#[derive(Debug, Clone)]
pub struct ScriptReports {
    interpreter: String,
    scripts_dir: PathBuf,
    /// Extra environment for every script (database path, API token, user)
    env: Vec<(String, String)>,
    timeout: Duration,
}

impl ScriptReports {
    pub fn new(interpreter: impl Into<String>, scripts_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            scripts_dir: scripts_dir.into(),
            env: Vec::new(),
            timeout,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn command(&self, report: Report, chat: ChatId) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(self.scripts_dir.join(report.script()))
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if report.takes_chat_argument() {
            cmd.arg(chat.to_string());
        }

        // Own process group, so a timeout can take down anything the script spawned
        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0)).ok();
                Ok(())
            });
        }

        cmd
    }

    /// Kill a process group immediately with SIGKILL.
    #[cfg(unix)]
    fn kill_process_group(pid: Option<u32>) {
        let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
            return;
        };
        tracing::debug!(pgid = pid, "Sending SIGKILL to report process group");
        let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
    }

    #[cfg(not(unix))]
    fn kill_process_group(_pid: Option<u32>) {}
}

#[async_trait]
impl ReportRunner for ScriptReports {
    async fn run(&self, report: Report, chat: ChatId) -> Result<String, ReportError> {
        tracing::info!(script = report.script(), chat = %chat, "Running report script");

        let child = self.command(report, chat).spawn()?;
        let pid = child.id();

        tokio::select! {
            () = tokio::time::sleep(self.timeout) => {
                Self::kill_process_group(pid);
                Err(ReportError::TimedOut(self.timeout))
            }

            result = child.wait_with_output() => {
                let output = result?;
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let combined = truncate_output(&format!("{stdout}{stderr}"));

                if output.status.success() {
                    Ok(combined)
                } else {
                    Err(ReportError::Failed {
                        code: output.status.code().unwrap_or(-1),
                        output: combined,
                    })
                }
            }
        }
    }
}

/// Keep the tail of long output; the end of a report is the useful part
fn truncate_output(output: &str) -> String {
    let total = output.chars().count();
    if total <= MAX_OUTPUT_CHARS {
        return output.to_string();
    }
    let tail: String = output.chars().skip(total - MAX_OUTPUT_CHARS).collect();
    format!("[output truncated]\n{tail}")
}
