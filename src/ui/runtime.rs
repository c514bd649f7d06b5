//! The event loop driving [`Stage`] transitions.
//!
//! One loop owns the stage. Keyboard input arrives from a blocking reader
//! thread, and every [`Task`] runs as its own tokio task; both report back
//! over a single unbounded channel.

use std::fs::{File, OpenOptions};
use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossterm::{
    cursor::Show,
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::future::{BoxFuture, FutureExt};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};

use super::spinner::TICK_INTERVAL;
use super::{Message, Outcome, Stage, Task};
use crate::commands::Generator;

const INPUT_POLL: Duration = Duration::from_millis(50);

/// Where the interface is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalTarget {
    Stdout,
    /// The controlling terminal, keeping stdout free for the caller.
    Tty,
}

/// Terminal output handle: stdout, or `/dev/tty` when stdout is captured.
enum TermWriter {
    Stdout(Stdout),
    Tty(File),
}

impl TermWriter {
    fn open(target: TerminalTarget) -> Result<Self> {
        match target {
            TerminalTarget::Stdout => Ok(TermWriter::Stdout(io::stdout())),
            TerminalTarget::Tty => OpenOptions::new()
                .read(true)
                .write(true)
                .open("/dev/tty")
                .map(TermWriter::Tty)
                .context("failed to open /dev/tty"),
        }
    }
}

impl Write for TermWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TermWriter::Stdout(out) => out.write(buf),
            TermWriter::Tty(tty) => tty.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TermWriter::Stdout(out) => out.flush(),
            TermWriter::Tty(tty) => tty.flush(),
        }
    }
}

type Tui = Terminal<CrosstermBackend<TermWriter>>;

/// Run the interface from `stage` until it finishes.
pub async fn run(
    stage: Stage,
    tasks: Vec<Task>,
    generator: Arc<Generator>,
    target: TerminalTarget,
) -> Result<Outcome> {
    let mut writer = TermWriter::open(target)?;

    enable_raw_mode()?;
    let mut guard = TerminalGuard {
        target,
        alternate_screen: false,
    };
    execute!(writer, EnterAlternateScreen)?;
    guard.alternate_screen = true;
    let mut terminal = Terminal::new(CrosstermBackend::new(writer))?;

    let result = run_loop(&mut terminal, stage, tasks, generator).await;

    drop(terminal);
    drop(guard);
    result
}

/// Puts the terminal back when dropped, whichever way `run` exits.
struct TerminalGuard {
    target: TerminalTarget,
    alternate_screen: bool,
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            debug!(error = %e, "failed to leave raw mode");
        }
        match TermWriter::open(self.target) {
            Ok(mut writer) => {
                if let Err(e) = restore_screen(&mut writer, self.alternate_screen) {
                    debug!(error = %e, "failed to restore screen");
                }
            }
            Err(e) => debug!(error = %e, "failed to reopen terminal for restore"),
        }
    }
}

/// Leave the alternate screen if it was entered, and show the cursor.
fn restore_screen<W: Write>(out: &mut W, alternate_screen: bool) -> io::Result<()> {
    if alternate_screen {
        execute!(out, LeaveAlternateScreen)?;
    }
    execute!(out, Show)
}

async fn run_loop(
    terminal: &mut Tui,
    mut stage: Stage,
    tasks: Vec<Task>,
    generator: Arc<Generator>,
) -> Result<Outcome> {
    let (tx, mut rx): (UnboundedSender<Message>, UnboundedReceiver<Message>) =
        mpsc::unbounded_channel();

    spawn_input_reader(tx.clone());
    for task in tasks {
        spawn_task(task, &generator, &tx);
    }

    loop {
        if stage.is_finished() {
            break;
        }
        terminal.draw(|frame| stage.render(frame))?;

        let message = rx
            .recv()
            .await
            .ok_or_else(|| anyhow!("event channel closed"))?;
        trace!(?message, "message received");

        let (next, tasks) = stage.update(message);
        stage = next;
        for task in tasks {
            spawn_task(task, &generator, &tx);
        }
    }

    stage
        .outcome()
        .ok_or_else(|| anyhow!("interface stopped without an outcome"))
}

/// Forward key presses and resizes until the loop drops its receiver.
fn spawn_input_reader(tx: UnboundedSender<Message>) {
    std::thread::spawn(move || {
        while !tx.is_closed() {
            match event::poll(INPUT_POLL) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    debug!(error = %e, "terminal poll failed");
                    break;
                }
            }

            let message = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => Message::Key(key),
                Ok(Event::Resize(..)) => Message::Resize,
                Ok(_) => continue,
                Err(e) => {
                    debug!(error = %e, "terminal read failed");
                    break;
                }
            };
            if tx.send(message).is_err() {
                break;
            }
        }
    });
}

fn spawn_task(task: Task, generator: &Arc<Generator>, tx: &UnboundedSender<Message>) {
    let future = task.run(Arc::clone(generator));
    let tx = tx.clone();
    tokio::spawn(async move {
        if let Some(message) = future.await {
            // The loop may have finished; late results are discarded.
            let _ = tx.send(message);
        }
    });
}

impl Task {
    /// The work behind this task, yielding the message to deliver.
    fn run(self, generator: Arc<Generator>) -> BoxFuture<'static, Option<Message>> {
        match self {
            Task::Generate { query, progress } => async move {
                let result = generator
                    .generate_with_progress(&query, move |stage| {
                        if progress.try_send(stage).is_err() {
                            debug!(?stage, "progress notification dropped");
                        }
                    })
                    .await;
                Some(Message::Generated(result))
            }
            .boxed(),
            Task::ListenProgress(mut receiver) => async move {
                match receiver.recv().await {
                    Some(stage) => Some(Message::Progress(stage, receiver)),
                    None => Some(Message::ProgressClosed),
                }
            }
            .boxed(),
            Task::EvaluateSafety(candidates) => async move {
                Some(Message::SafetyEvaluated(
                    generator.evaluate_safety(&candidates).await,
                ))
            }
            .boxed(),
            Task::Tick(id) => async move {
                tokio::time::sleep(TICK_INTERVAL).await;
                Some(Message::Tick(id))
            }
            .boxed(),
        }
    }
}
