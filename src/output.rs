//! Disposal of the selected command.
//!
//! Three modes: copy to the clipboard (default), print the bare command for
//! a shell function to capture, or print it with a confirmation line.

use std::fmt;
use std::io::{self, Write};
use std::process::{Command, Stdio};

use tracing::{debug, info};

/// How the selected command leaves the program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    #[default]
    Clipboard,
    ShellFunction,
    Stdout,
}

impl OutputMode {
    /// Parse a mode name. Unrecognized names select the clipboard.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "shell-function" => OutputMode::ShellFunction,
            "stdout" => OutputMode::Stdout,
            "clipboard" => OutputMode::Clipboard,
            other => {
                debug!(mode = other, "unknown output mode, using clipboard");
                OutputMode::Clipboard
            }
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Clipboard => write!(f, "clipboard"),
            OutputMode::ShellFunction => write!(f, "shell-function"),
            OutputMode::Stdout => write!(f, "stdout"),
        }
    }
}

/// Something that can put text on the system clipboard.
pub trait ClipboardBackend {
    fn name(&self) -> &str;
    fn copy(&self, text: &str) -> io::Result<()>;
}

/// A clipboard tool fed through its stdin.
#[derive(Debug, Clone)]
pub struct CommandClipboard {
    program: &'static str,
    args: &'static [&'static str],
}

impl CommandClipboard {
    pub const fn new(program: &'static str, args: &'static [&'static str]) -> Self {
        Self { program, args }
    }
}

impl ClipboardBackend for CommandClipboard {
    fn name(&self) -> &str {
        self.program
    }

    fn copy(&self, text: &str) -> io::Result<()> {
        let mut child = Command::new(self.program)
            .args(self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }

        let status = child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!(
                "{} exited with {}",
                self.program, status
            )))
        }
    }
}

/// The clipboard tools tried in order: macOS, X11, Wayland.
pub fn platform_clipboards() -> Vec<Box<dyn ClipboardBackend>> {
    vec![
        Box::new(CommandClipboard::new("pbcopy", &[])),
        Box::new(CommandClipboard::new("xclip", &["-selection", "clipboard"])),
        Box::new(CommandClipboard::new("wl-copy", &[])),
    ]
}

/// Performs the final output action for a selected command.
pub struct Dispatcher {
    mode: OutputMode,
    clipboards: Vec<Box<dyn ClipboardBackend>>,
}

impl Dispatcher {
    pub fn new(mode: OutputMode) -> Self {
        Self::with_clipboards(mode, platform_clipboards())
    }

    pub fn with_clipboards(mode: OutputMode, clipboards: Vec<Box<dyn ClipboardBackend>>) -> Self {
        Self { mode, clipboards }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Dispose of `command`, writing any user-facing text to `out`.
    ///
    /// Clipboard failure is not an error: the command is printed instead.
    pub fn dispatch<W: Write>(&self, command: &str, out: &mut W) -> io::Result<()> {
        match self.mode {
            OutputMode::ShellFunction => writeln!(out, "{}", command)?,
            OutputMode::Stdout => print_selected(command, out)?,
            OutputMode::Clipboard => {
                if self.copy_to_clipboard(command) {
                    write!(out, "\n✓ Copied to clipboard: {}\n", command)?;
                } else {
                    write!(out, "\n⚠ Clipboard not available\n")?;
                    print_selected(command, out)?;
                }
            }
        }
        out.flush()
    }

    fn copy_to_clipboard(&self, command: &str) -> bool {
        for backend in &self.clipboards {
            match backend.copy(command) {
                Ok(()) => {
                    info!(backend = backend.name(), "copied to clipboard");
                    return true;
                }
                Err(e) => debug!(backend = backend.name(), error = %e, "clipboard backend failed"),
            }
        }
        false
    }
}

fn print_selected<W: Write>(command: &str, out: &mut W) -> io::Result<()> {
    write!(out, "\n✓ Selected command:\n{}\n", command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records copies into a shared log, optionally failing.
    struct FakeClipboard {
        name: &'static str,
        works: bool,
        log: Rc<RefCell<Vec<(String, String)>>>,
    }

    impl ClipboardBackend for FakeClipboard {
        fn name(&self) -> &str {
            self.name
        }

        fn copy(&self, text: &str) -> io::Result<()> {
            self.log
                .borrow_mut()
                .push((self.name.to_string(), text.to_string()));
            if self.works {
                Ok(())
            } else {
                Err(io::Error::new(io::ErrorKind::NotFound, "missing"))
            }
        }
    }

    fn fakes(
        backends: &[(&'static str, bool)],
    ) -> (Vec<Box<dyn ClipboardBackend>>, Rc<RefCell<Vec<(String, String)>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let fakes = backends
            .iter()
            .map(|&(name, works)| {
                Box::new(FakeClipboard {
                    name,
                    works,
                    log: Rc::clone(&log),
                }) as Box<dyn ClipboardBackend>
            })
            .collect();
        (fakes, log)
    }

    fn dispatch(dispatcher: &Dispatcher, command: &str) -> String {
        let mut out = Vec::new();
        dispatcher.dispatch(command, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!(OutputMode::parse("clipboard"), OutputMode::Clipboard);
        assert_eq!(OutputMode::parse("shell-function"), OutputMode::ShellFunction);
        assert_eq!(OutputMode::parse("stdout"), OutputMode::Stdout);
        assert_eq!(OutputMode::parse("Stdout"), OutputMode::Stdout);
        assert_eq!(OutputMode::parse("printer"), OutputMode::Clipboard);
        assert_eq!(OutputMode::parse(""), OutputMode::Clipboard);
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for mode in [
            OutputMode::Clipboard,
            OutputMode::ShellFunction,
            OutputMode::Stdout,
        ] {
            assert_eq!(OutputMode::parse(&mode.to_string()), mode);
        }
    }

    #[test]
    fn test_shell_function_prints_bare_command() {
        let (backends, log) = fakes(&[("pbcopy", true)]);
        let dispatcher = Dispatcher::with_clipboards(OutputMode::ShellFunction, backends);

        assert_eq!(dispatch(&dispatcher, "ls -la"), "ls -la\n");
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_stdout_prints_confirmation() {
        let (backends, _) = fakes(&[]);
        let dispatcher = Dispatcher::with_clipboards(OutputMode::Stdout, backends);

        assert_eq!(
            dispatch(&dispatcher, "git log -S foo"),
            "\n✓ Selected command:\ngit log -S foo\n"
        );
    }

    #[test]
    fn test_clipboard_first_working_backend_wins() {
        let (backends, log) = fakes(&[("pbcopy", false), ("xclip", true), ("wl-copy", true)]);
        let dispatcher = Dispatcher::with_clipboards(OutputMode::Clipboard, backends);

        assert_eq!(
            dispatch(&dispatcher, "du -sh *"),
            "\n✓ Copied to clipboard: du -sh *\n"
        );
        let attempts: Vec<String> = log.borrow().iter().map(|(name, _)| name.clone()).collect();
        assert_eq!(attempts, vec!["pbcopy", "xclip"]);
        assert!(log.borrow().iter().all(|(_, text)| text == "du -sh *"));
    }

    #[test]
    fn test_clipboard_unavailable_falls_back_to_stdout() {
        let (backends, log) = fakes(&[("pbcopy", false), ("xclip", false), ("wl-copy", false)]);
        let dispatcher = Dispatcher::with_clipboards(OutputMode::Clipboard, backends);

        let printed = dispatch(&dispatcher, "ls -la");
        assert_eq!(
            printed,
            "\n⚠ Clipboard not available\n\n✓ Selected command:\nls -la\n"
        );
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn test_platform_clipboard_order() {
        let names: Vec<String> = platform_clipboards()
            .iter()
            .map(|b| b.name().to_string())
            .collect();
        assert_eq!(names, vec!["pbcopy", "xclip", "wl-copy"]);
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let backend = CommandClipboard::new("onelm-no-such-clipboard-tool", &[]);
        assert!(backend.copy("ls").is_err());
    }
}
