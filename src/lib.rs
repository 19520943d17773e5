use std::ffi::OsString;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use clap::{command, Arg, ArgAction, Command};
use ini::Ini;
use nix::unistd::{Uid, User};
use simplelog::{LevelFilter, WriteLogger};

mod address;
mod dispatch;
mod encoding;
mod error;
mod header;
mod message;

pub use address::Address;
pub use dispatch::Dispatcher;
pub use encoding::{encode_mailbox, encode_text, needs_encoding};
pub use error::Error;
pub use header::Header;
pub use message::Message;

/// Environment variable which, if present at all, switches on debug mode.
pub const DEBUG_ENV_VAR: &str = "DEBUG";

/// Path to the mail transfer agent, unless configured otherwise. Set at build time.
pub const DEFAULT_SENDMAIL_PATH: &str = env!("MAILPOST_SENDMAIL_PATH");

/// Config file read when none is given on the command line. Set at build time.
pub const DEFAULT_CONFIG_PATH: &str = env!("MAILPOST_CONFIG_PATH");

/// Whether messages really get sent.
///
/// - `Live`: messages are piped to the mail transfer agent.
/// - `Debug`: messages are printed (between delimiter lines) and nothing is sent.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub enum DispatchMode {
    #[default]
    Live,
    Debug,
}

impl DispatchMode {
    /// Debug if the `DEBUG` environment variable is set (to anything), else live.
    /// Meant to be called once, at startup.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var_os(DEBUG_ENV_VAR))
    }

    fn from_env_value(value: Option<OsString>) -> Self {
        match value {
            Some(_) => DispatchMode::Debug,
            None => DispatchMode::Live,
        }
    }
}

/// How to dispatch messages.
///
/// - `mode`: live or debug
/// - `sendmail_path`: the mail transfer agent executable
/// - `sendmail_args`: extra arguments, passed to the agent before the recipients
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Config {
    pub mode: DispatchMode,
    pub sendmail_path: PathBuf,
    pub sendmail_args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mode: DispatchMode::Live,
            sendmail_path: PathBuf::from(DEFAULT_SENDMAIL_PATH),
            sendmail_args: Vec::new(),
        }
    }
}

/// Main context for the program. Represents values injected into `run()` for easy testing.
///
/// Fields:
///
/// - `args`: command-line arguments
/// - `config_path`: config file to use if none is given with `-C`. It's fine for this one
///   not to exist.
/// - `env_mode`: dispatch mode derived from the environment at startup
/// - `sent_time`: time the program was invoked; used for the `Date:` header
#[derive(Debug)]
pub struct MainContext {
    pub args: Vec<String>,
    pub config_path: String,
    pub env_mode: DispatchMode,
    pub sent_time: chrono::DateTime<Local>,
}

/// Build a CLI parser for the program.
///
/// The message body is read from stdin; everything else comes from arguments.
/// Recipients are positional, and at least one is required.
pub fn build_cli() -> Command {
    command!()
        .arg(
            Arg::new("subject")
                .short('s')
                .long("subject")
                .value_name("SUBJECT")
                .help("Subject of the message. Non-ASCII text is encoded as needed."),
        )
        .arg(
            Arg::new("from")
                .short('f')
                .long("from")
                .value_name("ADDRESS")
                .help("Sender address. Defaults to user@hostname for the current user."),
        )
        .arg(
            Arg::new("html")
                .long("html")
                .value_name("FILE")
                .help("File containing an HTML version of the body, sent as an alternative to the text"),
        )
        .arg(
            Arg::new("config")
                .short('C')
                .long("config")
                .value_name("FILE")
                .help("Config file to use instead of the default one"),
        )
        .arg(
            Arg::new("logfile")
                .short('X')
                .value_name("LOGFILE")
                .help("Log debugging messages to a file. '-' means stderr."),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("Print the message to stdout instead of sending it. (Same as setting DEBUG in the environment.)"),
        )
        .arg(
            Arg::new("recipients")
                .value_name("RECIPIENT")
                .help("Recipient address")
                .required(true)
                .num_args(1..),
        )
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => bail!("invalid value '{}' for {}: expected true or false", value, key),
    }
}

/// Read a "key = value" style config file, and return the values as a Config struct.
///
/// All keys are optional; missing ones keep their defaults.
///   - sendmailPath: path to the mail transfer agent
///   - sendmailArgs: whitespace-separated arguments to pass before the recipients
///   - debug: `true` to print messages instead of sending them
///
pub fn read_config_ini<P>(file_path: P) -> Result<Config>
where
    P: AsRef<Path>,
{
    let file_path_ref = file_path.as_ref();
    let conf = Ini::load_from_file(file_path_ref).map_err(|e| {
        anyhow!(
            "Error reading config file {}: {}",
            file_path_ref.display(),
            e
        )
    })?;

    let section = conf.section(None::<String>).ok_or_else(|| {
        anyhow!(
            "Error reading config file {}: sections seem malformed",
            file_path_ref.display()
        )
    })?;

    let mut config = Config::default();

    if let Some(path) = section.get("sendmailPath") {
        config.sendmail_path = PathBuf::from(path);
    }

    if let Some(args) = section.get("sendmailArgs") {
        config.sendmail_args = args.split_whitespace().map(str::to_string).collect();
    }

    if let Some(debug) = section.get("debug") {
        let debug = parse_bool("debug", debug)
            .with_context(|| format!("Error reading config file {}", file_path_ref.display()))?;
        if debug {
            config.mode = DispatchMode::Debug;
        }
    }

    Ok(config)
}

/// Work out the config: from `explicit_path` if given (which must then exist), else from
/// `default_path` if it exists, else built-in defaults.
fn load_config(explicit_path: Option<&str>, default_path: &str) -> Result<Config> {
    match explicit_path {
        Some(path) => read_config_ini(path),
        None if Path::new(default_path).exists() => read_config_ini(default_path),
        None => {
            log::debug!("No config file at {}, using defaults", default_path);
            Ok(Config::default())
        }
    }
}

/// `user@hostname` for the user running the program.
pub fn default_sender() -> Result<String> {
    let uid = Uid::current();
    let user = User::from_uid(uid)
        .with_context(|| format!("Couldn't get username for uid {}", uid))?
        .ok_or_else(|| anyhow!("Couldn't get username for uid {}: no such user", uid))?;

    let hostname = nix::unistd::gethostname().context("Couldn't get hostname")?;
    let hostname = hostname
        .into_string()
        .map_err(|h| anyhow!("Hostname {:?} is not valid UTF-8", h))?;

    Ok(format!("{}@{}", user.name, hostname))
}

/// set up logging to the given file. `-` means stderr.
fn init_logfile(logfile_path: &str) -> Result<()> {
    let config = simplelog::Config::default();

    let res = if logfile_path == "-" {
        WriteLogger::init(LevelFilter::Debug, config, std::io::stderr())
    } else {
        let logfile = File::create(logfile_path)
            .with_context(|| format!("Error creating log file '{}'", logfile_path))?;
        WriteLogger::init(LevelFilter::Debug, config, logfile)
    };

    // a logger may already be installed (e.g. when run from tests); keep that one
    if let Err(e) = res {
        eprintln!("Warning: couldn't set up logging: {}", e);
    }

    Ok(())
}

/// Main logic for the program. Various I/O-type values get injected here as arguments,
/// for easy testing.
///
/// Arguments:
/// - `ctx`: main context, containing arguments, config path, time we were invoked, etc.
/// - `input`: stream the text body is read from (stdin, in production)
/// - `debug_output`: where messages go in debug mode (stdout, in production)
///
/// Returns an error describing what went wrong; the caller decides how to report it.
pub fn run<R: Read, W: Write>(
    ctx: &MainContext,
    input: &mut R,
    debug_output: &mut W,
) -> Result<()> {
    let cli_matches = build_cli().get_matches_from(ctx.args.iter());

    if let Some(logfile_path) = cli_matches.get_one::<String>("logfile") {
        init_logfile(logfile_path)?;
    }

    let explicit_config = cli_matches.get_one::<String>("config").map(String::as_str);
    let mut config = load_config(explicit_config, &ctx.config_path)?;

    if ctx.env_mode == DispatchMode::Debug || cli_matches.get_flag("debug") {
        config.mode = DispatchMode::Debug;
    }

    log::debug!("Using config: {:?}", config);

    let from_address = match cli_matches.get_one::<String>("from") {
        Some(from) => from.clone(),
        None => default_sender()?,
    };

    log::debug!("Using from_address: {:#?}", from_address);

    let subject = cli_matches
        .get_one::<String>("subject")
        .map(String::as_str)
        .unwrap_or_default();

    let recipients: Vec<&str> = cli_matches
        .get_many::<String>("recipients")
        .map(|values| values.map(String::as_str).collect())
        .unwrap_or_default();

    log::debug!("Using recipients: {:?}", recipients);

    let mut message =
        Message::new(subject, &from_address, &recipients).context("Couldn't build message")?;

    if !message.header().contains("Date") {
        message
            .header_mut()
            .set("Date", ctx.sent_time.to_rfc2822());
    }

    input
        .read_to_end(message.text_mut())
        .context("Error reading message body")?;

    if let Some(html_path) = cli_matches.get_one::<String>("html") {
        let html = std::fs::read(html_path)
            .with_context(|| format!("Error reading HTML body from '{}'", html_path))?;
        message.html_mut().extend_from_slice(&html);
    }

    Dispatcher::new(config)
        .send_to(message, debug_output)
        .context("Couldn't send message")?;

    log::debug!("Message successfully dispatched");

    Ok(())
}
