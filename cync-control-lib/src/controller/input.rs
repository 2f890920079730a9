use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::error::Result;

/// Something that yields lines of operator input.
///
/// `next_line` must be cancellation safe: dropping the future before it completes must
/// not lose a line. The input listener relies on this when it is stopped mid-read.
#[async_trait]
pub trait LineSource: Send {
    /// `Ok(None)` once input is closed.
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

pub struct StdinLines {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinLines {
    pub fn new() -> Self {
        StdinLines {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinLines {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LineSource for StdinLines {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.lines.next_line().await
    }
}

/// Replays prepared lines.
///
/// Once they run out it either reports end of input or, with
/// [`ScriptedLines::then_wait`], never yields again.
#[derive(Debug, Default)]
pub struct ScriptedLines {
    lines: VecDeque<String>,
    wait_when_empty: bool,
}

impl ScriptedLines {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedLines {
            lines: lines.into_iter().map(Into::into).collect(),
            wait_when_empty: false,
        }
    }

    pub fn then_wait(mut self) -> Self {
        self.wait_when_empty = true;
        self
    }
}

#[async_trait]
impl LineSource for ScriptedLines {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        match self.lines.pop_front() {
            Some(line) => Ok(Some(line)),
            None if self.wait_when_empty => std::future::pending().await,
            None => Ok(None),
        }
    }
}

/// Shared handle to the operator's input.
///
/// Prompts and the background listener read from the same source, one at a time.
#[derive(Clone)]
pub struct Console {
    source: Arc<Mutex<Box<dyn LineSource>>>,
}

impl Console {
    pub fn new(source: impl LineSource + 'static) -> Self {
        Console {
            source: Arc::new(Mutex::new(Box::new(source))),
        }
    }

    pub fn stdin() -> Self {
        Self::new(StdinLines::new())
    }

    pub fn scripted<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ScriptedLines::new(lines))
    }

    /// Reads one line with the trailing line break removed. `None` once input is closed.
    pub async fn read_line(&self) -> Result<Option<String>> {
        let mut source = self.source.lock().await;
        let line = source.next_line().await?;
        Ok(line.map(|line| line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Prints `[component] prompt: ` and reads the answer.
    pub async fn prompt(&self, component: &str, prompt: &str) -> Result<Option<String>> {
        print!("\r[{}] {}: ", component, prompt);
        io::stdout().flush()?;
        self.read_line().await
    }

    /// Starts forwarding lines to an [`InputListener`] until it is stopped.
    pub fn listen(&self) -> InputListener {
        let (line_tx, line_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(forward_lines(Arc::clone(&self.source), line_tx, stop_rx));
        InputListener {
            lines: line_rx,
            stop: Some(stop_tx),
            handle,
        }
    }
}

async fn forward_lines(
    source: Arc<Mutex<Box<dyn LineSource>>>,
    lines: mpsc::Sender<String>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        let read = {
            let mut guard = tokio::select! {
                biased;
                _ = &mut stop => break,
                guard = source.lock() => guard,
            };
            tokio::select! {
                biased;
                _ = &mut stop => break,
                read = guard.next_line() => read,
            }
        };
        match read {
            Ok(Some(line)) => {
                debug!("listener got input {:?} (len {})", line, line.len());
                tokio::select! {
                    biased;
                    _ = &mut stop => break,
                    sent = lines.send(line) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(None) => {
                debug!("input closed, listener exiting");
                break;
            }
            Err(err) => {
                warn!("failed to read input: {}", err);
                break;
            }
        }
    }
}

/// A running background reader, owned by the controller while an indefinite mode is
/// active.
pub struct InputListener {
    lines: mpsc::Receiver<String>,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl InputListener {
    /// Waits up to `window` for one line.
    pub async fn poll(&mut self, window: Duration) -> Option<String> {
        match timeout(window, self.lines.recv()).await {
            Ok(line) => line,
            Err(_) => None,
        }
    }

    /// Signals the reader to stop. It exits before its next read and delivers nothing
    /// further.
    pub fn stop(mut self) -> JoinHandle<()> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.lines.close();
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_line_strips_line_break() {
        let console = Console::scripted(["help\r\n", "on"]);
        assert_eq!(console.read_line().await.unwrap().as_deref(), Some("help"));
        assert_eq!(console.read_line().await.unwrap().as_deref(), Some("on"));
        assert_eq!(console.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_listener_delivers_then_times_out() {
        let console = Console::new(ScriptedLines::new(["stop"]).then_wait());
        let mut listener = console.listen();
        assert_eq!(
            listener.poll(Duration::from_secs(1)).await.as_deref(),
            Some("stop")
        );
        assert_eq!(listener.poll(Duration::from_millis(20)).await, None);
        listener.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stopped_listener_leaves_input_for_prompts() {
        let console = Console::new(ScriptedLines::new(Vec::<String>::new()).then_wait());
        let listener = console.listen();
        tokio::task::yield_now().await;
        listener.stop().await.unwrap();

        // a fresh source behind the same console: the stopped listener no longer holds it
        let replacement: Box<dyn LineSource> = Box::new(ScriptedLines::new(["printdevices"]));
        *console.source.lock().await = replacement;
        assert_eq!(
            console.read_line().await.unwrap().as_deref(),
            Some("printdevices")
        );
    }
}
