use std::io::{self, BufWriter, Read, Write};
use std::os::fd::IntoRawFd;
use std::process::{Child, ChildStderr, Command, Stdio};
use std::thread::{self, JoinHandle};

use crate::error::{Error, Result};
use crate::message::Message;
use crate::{Config, DispatchMode};

/// Printed above and below a message in debug mode.
const DELIMITER_LEN: usize = 70;

/// Hands finished messages either to the mail transfer agent, or (in debug mode) to an
/// output stream.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: Config,
}

impl Dispatcher {
    pub fn new(config: Config) -> Self {
        Dispatcher { config }
    }

    /// Send `message`. In debug mode it is printed to stdout instead.
    pub fn send(&self, message: Message) -> Result<()> {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        self.send_to(message, &mut handle)
    }

    /// As for [`Dispatcher::send`], but in debug mode the message is written to
    /// `debug_output`. In live mode `debug_output` is untouched.
    ///
    /// `From:` and `To:` headers are set from the message's envelope before anything
    /// else happens.
    pub fn send_to<W: Write>(&self, mut message: Message, debug_output: &mut W) -> Result<()> {
        let recipients = message.finalize();

        match self.config.mode {
            DispatchMode::Debug => {
                log::debug!("debug mode: printing message instead of sending it");
                print_message(&message, debug_output)?;
                Ok(())
            }
            DispatchMode::Live => self.deliver(&message, &recipients),
        }
    }

    /// Pipe the message through the mail transfer agent.
    ///
    /// Steps: start the agent, write the message to its stdin, close stdin, collect its
    /// stderr, then decide. Stderr is read on a separate thread for the whole exchange,
    /// so an agent that complains a lot before reading its input can't wedge us.
    ///
    /// Anything at all on stderr counts as failure, and the exit status is then never
    /// looked at. Otherwise the exit status decides.
    fn deliver(&self, message: &Message, recipients: &[String]) -> Result<()> {
        let path = &self.config.sendmail_path;
        log::debug!(
            "starting {:?} with args {:?} {:?}",
            path,
            self.config.sendmail_args,
            recipients
        );

        let mut child = Command::new(path)
            .args(&self.config.sendmail_args)
            .args(recipients)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::ProcessStart {
                path: path.clone(),
                source,
            })?;

        let (stdin, stderr) = match (child.stdin.take(), child.stderr.take()) {
            (Some(stdin), Some(stderr)) => (stdin, stderr),
            // can't happen, both were requested as pipes
            _ => {
                abandon(&mut child);
                return Err(Error::Io(io::Error::other("agent pipes were not set up")));
            }
        };

        let stderr_reader = spawn_stderr_reader(stderr);

        let mut writer = BufWriter::new(stdin);
        if let Err(e) = write_input(message, &mut writer).and_then(|()| close_input(writer)) {
            log::warn!("couldn't hand message to mail transfer agent: {}", e);
            abandon(&mut child);
            if let Ok(Ok(diagnostics)) = stderr_reader.join() {
                if !diagnostics.is_empty() {
                    log::warn!(
                        "mail transfer agent said: {}",
                        String::from_utf8_lossy(&diagnostics).trim_end()
                    );
                }
            }
            return Err(e);
        }
        log::debug!("message written, input closed");

        let diagnostics = stderr_reader
            .join()
            .map_err(|_| Error::Io(io::Error::other("stderr reader thread panicked")))??;

        if !diagnostics.is_empty() {
            let text = String::from_utf8_lossy(&diagnostics).trim_end().to_string();
            log::warn!("mail transfer agent reported an error: {}", text);
            reap_later(child);
            return Err(Error::AgentReported(text));
        }

        let status = child.wait()?;
        log::debug!("mail transfer agent exited with {}", status);

        if status.success() {
            Ok(())
        } else {
            Err(Error::AgentExit(status))
        }
    }
}

/// Delimiter, message, delimiter. The closing delimiter always starts on a fresh line.
fn print_message<W: Write>(message: &Message, output: &mut W) -> io::Result<()> {
    let delimiter = "-".repeat(DELIMITER_LEN);

    writeln!(output, "{}", delimiter)?;
    message.write_to(output)?;
    if !body_ends_with_newline(message) {
        writeln!(output)?;
    }
    writeln!(output, "{}", delimiter)?;
    output.flush()
}

fn body_ends_with_newline(message: &Message) -> bool {
    if message.html().is_empty() {
        message.text().ends_with(b"\n")
    } else {
        // the multipart framing ends with CRLF
        true
    }
}

fn spawn_stderr_reader(mut stderr: ChildStderr) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut captured = Vec::new();
        stderr.read_to_end(&mut captured)?;
        Ok(captured)
    })
}

/// Write the whole message and flush it, so that a failure here (typically an agent that
/// has already exited) is an i/o error rather than a failure to close.
fn write_input<W: Write>(message: &Message, writer: &mut W) -> Result<()> {
    message.write_to(writer)?;
    writer.flush()?;
    Ok(())
}

/// Close the agent's input, which is what tells it the message is complete. Unlike a plain
/// drop, an error from `close(2)` is reported.
fn close_input<W: Write + IntoRawFd>(writer: BufWriter<W>) -> Result<()> {
    let inner = writer
        .into_inner()
        .map_err(|e| Error::PipeClose(e.into_error()))?;
    nix::unistd::close(inner.into_raw_fd()).map_err(|errno| Error::PipeClose(errno.into()))
}

/// Kill and reap an agent we've given up on.
fn abandon(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::debug!("couldn't kill mail transfer agent: {}", e);
    }
    if let Err(e) = child.wait() {
        log::debug!("couldn't reap mail transfer agent: {}", e);
    }
}

/// Reap an agent whose exit status we don't care about, without blocking on it.
fn reap_later(mut child: Child) {
    match child.try_wait() {
        Ok(Some(status)) => log::debug!("mail transfer agent exited with {} (ignored)", status),
        Ok(None) => {
            thread::spawn(move || {
                if let Err(e) = child.wait() {
                    log::debug!("couldn't reap mail transfer agent: {}", e);
                }
            });
        }
        Err(e) => log::debug!("couldn't check on mail transfer agent: {}", e),
    }
}
