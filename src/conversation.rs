use anyhow::{Result, anyhow};
use regex::Regex;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Instant, timeout_at};
use tracing::debug;

pub type ReplyFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// The conversational framework seam: emit formatted output, ask a follow-up
/// question and wait for a matching reply, and send best-effort activity
/// notifications. Command handlers only ever see this trait.
pub trait Conversation: Send + Sync {
    fn emit(&self, message: String);

    /// Sends `prompt` and resolves with the user's next message matching
    /// `pattern`. Fails on timeout or when the input is closed.
    fn ask(&self, prompt: String, pattern: Regex) -> ReplyFuture<'_>;

    /// Best-effort analytics ping. Callers log and ignore failures.
    fn emit_activity(&self, activity_id: &str) -> Result<()>;
}

/// Console-backed chat session: messages go to stdout, replies come from a
/// line channel fed by the stdin reader task.
pub struct ConsoleSession {
    incoming: Mutex<mpsc::Receiver<String>>,
    reply_timeout: Duration,
}

impl ConsoleSession {
    pub fn new(incoming: mpsc::Receiver<String>, reply_timeout: Duration) -> Self {
        Self {
            incoming: Mutex::new(incoming),
            reply_timeout,
        }
    }

    /// Next raw chat line, outside of any pending prompt. Returns `None` when
    /// the input is closed.
    pub async fn next_message(&self) -> Option<String> {
        self.incoming.lock().await.recv().await
    }
}

impl Conversation for ConsoleSession {
    fn emit(&self, message: String) {
        println!("{}", message);
    }

    fn ask(&self, prompt: String, pattern: Regex) -> ReplyFuture<'_> {
        Box::pin(async move {
            self.emit(prompt);
            let deadline = Instant::now() + self.reply_timeout;
            let mut incoming = self.incoming.lock().await;
            loop {
                let line = timeout_at(deadline, incoming.recv())
                    .await
                    .map_err(|_| anyhow!("timed out waiting for a reply"))?
                    .ok_or_else(|| anyhow!("the input channel closed"))?;
                if pattern.is_match(&line) {
                    return Ok(line);
                }
                debug!("ignoring reply without the expected selection: {}", line);
            }
        })
    }

    fn emit_activity(&self, activity_id: &str) -> Result<()> {
        debug!("bot activity: {}", activity_id);
        Ok(())
    }
}
