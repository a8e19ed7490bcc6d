use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use clap::{Args, Parser};
use crossterm::style::Stylize;
use roleplay_ai::{DEFAULT_OLLAMA_BASE_URL, DEFAULT_OLLAMA_MODEL, OllamaClient};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::chat_log::ChatLogger;
use crate::commands::{ReplCommand, ReplCommandParser, help_text};
use crate::memory::MemoryConfig;
use crate::memory::config::{DEFAULT_MEMORY_FILE, DEFAULT_SEARCH_LIMIT};
use crate::persona::{Persona, PromptModes};
use crate::session::{ChatSession, ModeChange};
use crate::transcript::TranscriptFormat;
use crate::{DEFAULT_BOTINFO_FILE, DEFAULT_CHAT_DIR, DEFAULT_TRANSCRIPT_DIR};

const DEFAULT_ROLEPLAY_HOME_DIR_NAME: &str = ".roleplay";
const CONFIG_FILE_NAME: &str = "roleplay.toml";
const LOG_FILE_NAME: &str = "roleplay.log";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_ROTATE_SIZE_MB: u64 = 20;
const DEFAULT_LOG_STDOUT: bool = false;
const SEARCH_NOTE_PREVIEW_CHARS: usize = 80;
static CONF_DIR: OnceLock<PathBuf> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    name = "roleplay",
    version,
    about = "Persona roleplay chat with long-term memory"
)]
pub struct Cli {
    /// Config home holding roleplay.toml and logs (default: ~/.roleplay).
    #[arg(long)]
    conf_dir: Option<PathBuf>,
    #[command(flatten)]
    chat: ChatArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ChatArgs {
    /// Model name served by Ollama.
    #[arg(long)]
    model: Option<String>,
    /// Ollama base URL.
    #[arg(long)]
    base_url: Option<String>,
    /// Path to BotInfo.json.
    #[arg(long)]
    botinfo: Option<PathBuf>,
    /// Path to the memory JSONL file.
    #[arg(long)]
    memfile: Option<PathBuf>,
    /// Disable memory recall and auto-extraction.
    #[arg(long, default_value_t = false)]
    no_memory: bool,
    #[arg(long, value_parser = ["json", "txt", "markdown"])]
    export_format: Option<String>,
    #[arg(long)]
    log_level: Option<String>,
    /// Enable NSFW mode for adult-oriented roleplay.
    #[arg(long, default_value_t = false)]
    nsfw: bool,
    /// Enable romantic mode.
    #[arg(long, default_value_t = false)]
    romantic: bool,
}

pub async fn run_cli_process() -> Result<(), String> {
    let cli = Cli::parse();
    init_conf_dir(cli.conf_dir.as_deref());
    init_tracing(cli.chat.log_level.as_deref());
    run(cli.chat).await
}

fn init_tracing(level_override: Option<&str>) {
    static TRACE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

    let config = load_runtime_log_config(LOG_FILE_NAME, level_override);
    let file_writer =
        match SizeRotatingFileWriter::new(config.file_path.clone(), config.rotate_size_bytes) {
            Ok(writer) => writer,
            Err(error) => {
                eprintln!("warning: failed to initialize tracing writer: {error}");
                return;
            }
        };
    let (non_blocking, guard) = tracing_appender::non_blocking(file_writer);
    let _ = TRACE_GUARD.set(guard);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.clone()));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking);

    let init_result = if config.stdout {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(tracing_subscriber::fmt::layer().with_ansi(false))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .try_init()
    };
    if let Err(error) = init_result {
        eprintln!(
            "warning: failed to initialize tracing subscriber for {}: {error}",
            config.file_path.display()
        );
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RoleplayToml {
    #[serde(default)]
    log: RoleplayTomlLog,
    #[serde(default)]
    chat: RoleplayTomlChat,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RoleplayTomlLog {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    rotate_size_mb: Option<u64>,
    #[serde(default)]
    stdout: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RoleplayTomlChat {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    botinfo: Option<String>,
    #[serde(default)]
    memfile: Option<String>,
    #[serde(default)]
    chat_dir: Option<String>,
    #[serde(default)]
    transcript_dir: Option<String>,
    #[serde(default)]
    export_format: Option<String>,
    #[serde(default)]
    memory: Option<bool>,
    #[serde(default)]
    search_limit: Option<usize>,
}

#[derive(Debug, Clone)]
struct RuntimeLogConfig {
    file_path: PathBuf,
    level: String,
    rotate_size_bytes: u64,
    stdout: bool,
}

fn load_runtime_log_config(file_name: &str, level_override: Option<&str>) -> RuntimeLogConfig {
    let parsed = read_toml_if_exists::<RoleplayToml>(&default_config_path())
        .ok()
        .flatten()
        .unwrap_or_default();
    build_runtime_log_config(&parsed.log, file_name, level_override)
}

fn build_runtime_log_config(
    log: &RoleplayTomlLog,
    file_name: &str,
    level_override: Option<&str>,
) -> RuntimeLogConfig {
    let base_path = log
        .path
        .as_deref()
        .map(|value| expand_home_path(value.trim()))
        .unwrap_or_else(default_log_dir);
    let level = first_non_empty([level_override, log.level.as_deref()])
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
    let rotate_size_mb = log
        .rotate_size_mb
        .unwrap_or(DEFAULT_LOG_ROTATE_SIZE_MB)
        .max(1);

    RuntimeLogConfig {
        file_path: base_path.join(file_name),
        level,
        rotate_size_bytes: rotate_size_mb * 1024 * 1024,
        stdout: log.stdout.unwrap_or(DEFAULT_LOG_STDOUT),
    }
}

/// Settings for one chat run after merging CLI flags over `roleplay.toml`.
#[derive(Debug, Clone)]
struct ResolvedChatConfig {
    model: String,
    base_url: String,
    botinfo: PathBuf,
    memory: MemoryConfig,
    chat_dir: PathBuf,
    transcript_dir: PathBuf,
    export_format: TranscriptFormat,
    modes: PromptModes,
}

fn resolve_chat_config(
    args: &ChatArgs,
    chat: &RoleplayTomlChat,
) -> Result<ResolvedChatConfig, String> {
    let model = first_non_empty([args.model.as_deref(), chat.model.as_deref()])
        .unwrap_or(DEFAULT_OLLAMA_MODEL)
        .to_string();
    let base_url = first_non_empty([args.base_url.as_deref(), chat.base_url.as_deref()])
        .unwrap_or(DEFAULT_OLLAMA_BASE_URL)
        .to_string();
    let botinfo = args
        .botinfo
        .clone()
        .or_else(|| chat.botinfo.as_deref().map(expand_home_path))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BOTINFO_FILE));
    let memory_file = args
        .memfile
        .clone()
        .or_else(|| chat.memfile.as_deref().map(expand_home_path))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MEMORY_FILE));
    let export_format = first_non_empty([args.export_format.as_deref(), chat.export_format.as_deref()])
        .map(str::parse::<TranscriptFormat>)
        .transpose()
        .map_err(|error| error.to_string())?
        .unwrap_or_default();

    let memory = MemoryConfig {
        memory_file,
        enabled: !args.no_memory && chat.memory.unwrap_or(true),
        search_limit: chat.search_limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
    };
    memory.validate()?;

    Ok(ResolvedChatConfig {
        model,
        base_url,
        botinfo,
        memory,
        chat_dir: chat
            .chat_dir
            .as_deref()
            .map(expand_home_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CHAT_DIR)),
        transcript_dir: chat
            .transcript_dir
            .as_deref()
            .map(expand_home_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TRANSCRIPT_DIR)),
        export_format,
        modes: PromptModes {
            nsfw: args.nsfw,
            romantic: args.romantic,
        },
    })
}

fn first_non_empty<'a, const N: usize>(values: [Option<&'a str>; N]) -> Option<&'a str> {
    values
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
}

fn expand_home_path(path: &str) -> PathBuf {
    let trimmed = path.trim();
    if trimmed == "~" {
        return home_dir();
    }
    if let Some(suffix) = trimmed.strip_prefix("~/") {
        return home_dir().join(suffix);
    }
    PathBuf::from(trimmed)
}

#[derive(Debug)]
struct SizeRotatingFileWriter {
    file_path: PathBuf,
    rotated_path: PathBuf,
    max_size_bytes: u64,
}

impl SizeRotatingFileWriter {
    fn new(file_path: PathBuf, max_size_bytes: u64) -> Result<Self, String> {
        let parent = file_path
            .parent()
            .ok_or_else(|| format!("invalid log file path {}", file_path.display()))?;
        std::fs::create_dir_all(parent).map_err(|error| {
            format!("create log directory {} failed: {error}", parent.display())
        })?;

        let mut rotated_name = file_path
            .file_name()
            .map(|value| value.to_os_string())
            .unwrap_or_else(|| std::ffi::OsString::from(LOG_FILE_NAME));
        rotated_name.push(".1");
        let rotated_path = file_path.with_file_name(rotated_name);

        Ok(Self {
            file_path,
            rotated_path,
            max_size_bytes,
        })
    }

    fn maybe_rotate(&self, incoming_len: usize) -> io::Result<()> {
        let current_size = std::fs::metadata(&self.file_path)
            .map(|metadata| metadata.len())
            .unwrap_or(0);
        if current_size.saturating_add(incoming_len as u64) <= self.max_size_bytes {
            return Ok(());
        }
        if self.rotated_path.exists() {
            let _ = std::fs::remove_file(&self.rotated_path);
        }
        if self.file_path.exists() {
            std::fs::rename(&self.file_path, &self.rotated_path)?;
        }
        Ok(())
    }
}

impl Write for SizeRotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.maybe_rotate(buf.len())?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

async fn run(args: ChatArgs) -> Result<(), String> {
    let toml = read_toml_if_exists::<RoleplayToml>(&default_config_path())?.unwrap_or_default();
    let config = resolve_chat_config(&args, &toml.chat)?;

    let persona = Persona::load(&config.botinfo).map_err(|error| error.to_string())?;
    let chat_logger =
        ChatLogger::new(&persona.name, &config.chat_dir).map_err(|error| error.to_string())?;
    let client = Arc::new(OllamaClient::new(
        config.model.clone(),
        config.base_url.clone(),
    ));

    info!(
        bot = %persona.name,
        model = %config.model,
        memory = config.memory.enabled,
        chat_log = %chat_logger.path().display(),
        "starting roleplay bot"
    );
    if config.modes.nsfw {
        info!("NSFW mode enabled");
    }
    if config.modes.romantic {
        info!("Romantic mode enabled");
    }

    let mut session = ChatSession::new(
        persona,
        config.modes,
        config.memory.clone(),
        client,
        Box::new(chat_logger),
    )
    .with_transcripts(config.transcript_dir.clone(), config.export_format);

    print_header(&session);
    let intro = session.start().to_string();
    print_bot_message(&session, &intro);

    let result = repl_loop(&mut session).await;
    session.end();
    result
}

async fn repl_loop(session: &mut ChatSession) -> Result<(), String> {
    loop {
        print!("You> ");
        io::stdout()
            .flush()
            .map_err(|error| format!("stdout flush failed: {error}"))?;

        let mut line = String::new();
        let read = io::stdin()
            .read_line(&mut line)
            .map_err(|error| format!("stdin read failed: {error}"))?;
        if read == 0 {
            println!();
            println!("[bye]");
            return Ok(());
        }

        let Some(command) = ReplCommandParser::parse(&line) else {
            continue;
        };

        match command {
            ReplCommand::Exit => return Ok(()),
            ReplCommand::Help => println!("{}", help_text()),
            ReplCommand::Reset => {
                session.reset();
                println!("[session reset]");
                print_header(session);
            }
            ReplCommand::Remember { note } => match session.remember(&note) {
                Some(_) => println!("[remembered]"),
                None => println!("[!] Failed to store memory"),
            },
            ReplCommand::Rewind => match session.rewind() {
                Some(previous) => {
                    println!("[rewound to previous message]");
                    print_bot_message(session, &previous);
                }
                None => println!("[!] Cannot rewind: not enough messages in conversation"),
            },
            ReplCommand::Export => match session.export() {
                Ok(path) => println!("[saved] {}", path.display()),
                Err(error) => {
                    warn!("Export failed: {error}");
                    println!("[!] Export failed: {error}");
                }
            },
            ReplCommand::Persona => println!("{}", session.persona().describe()),
            ReplCommand::Nsfw { enabled } => {
                let label = if enabled { "enabled" } else { "disabled" };
                match session.set_nsfw(enabled) {
                    ModeChange::Changed => {
                        println!("[NSFW mode {label}]");
                        print_header(session);
                    }
                    ModeChange::Unchanged => println!("[NSFW mode already {label}]"),
                }
            }
            ReplCommand::Romantic { enabled } => {
                let label = if enabled { "enabled" } else { "disabled" };
                match session.set_romantic(enabled) {
                    ModeChange::Changed => {
                        println!("[Romantic mode {label}]");
                        print_header(session);
                    }
                    ModeChange::Unchanged => println!("[Romantic mode already {label}]"),
                }
            }
            ReplCommand::Search { query } => {
                let results = session.search(&query);
                if results.is_empty() {
                    println!("[No memories found matching '{query}']");
                    continue;
                }
                println!("[Found {} memories matching '{query}']:", results.len());
                for (position, record) in results.iter().enumerate() {
                    println!(
                        "{}. ({}) {}...",
                        position + 1,
                        record.timestamp,
                        record
                            .note
                            .chars()
                            .take(SEARCH_NOTE_PREVIEW_CHARS)
                            .collect::<String>()
                    );
                }
            }
            ReplCommand::Invalid { usage } => println!("[!] {usage}"),
            ReplCommand::Unknown { name } => {
                println!("[!] Unknown command {name}. Type /help for commands.")
            }
            ReplCommand::Prompt { text } => match session.send(&text).await {
                Ok(reply) => print_bot_message(session, &reply),
                Err(error) => println!("[!] Model error: {error}"),
            },
        }
    }
}

fn print_header(session: &ChatSession) {
    let modes = session.modes();
    let mut flags = Vec::new();
    if modes.nsfw {
        flags.push("NSFW");
    }
    if modes.romantic {
        flags.push("Romantic");
    }
    let suffix = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };
    println!("=== Roleplay with {}{suffix} ===", session.persona().name);
    println!("Type /help for commands.");
}

fn print_bot_message(session: &ChatSession, content: &str) {
    let persona = session.persona();
    println!();
    println!(
        "{}",
        persona.name.as_str().with(persona.terminal_color()).bold()
    );
    println!("{content}");
    println!();
}

fn init_conf_dir(conf_dir: Option<&Path>) {
    let resolved = resolve_home_dir(conf_dir);
    let _ = CONF_DIR.set(resolved);
}

fn resolve_home_dir(conf_dir: Option<&Path>) -> PathBuf {
    conf_dir
        .map(|path| expand_home_path(&path.to_string_lossy()))
        .unwrap_or_else(default_home_dir)
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_home_dir() -> PathBuf {
    home_dir().join(DEFAULT_ROLEPLAY_HOME_DIR_NAME)
}

fn current_home_dir() -> PathBuf {
    CONF_DIR
        .get()
        .cloned()
        .unwrap_or_else(|| resolve_home_dir(None))
}

fn default_log_dir() -> PathBuf {
    current_home_dir().join("logs")
}

fn default_config_path() -> PathBuf {
    current_home_dir().join(CONFIG_FILE_NAME)
}

fn read_toml_if_exists<T>(path: &Path) -> Result<Option<T>, String>
where
    T: for<'de> Deserialize<'de>,
{
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .map_err(|error| format!("read {} failed: {error}", path.display()))?;
    let parsed = toml::from_str::<T>(&content)
        .map_err(|error| format!("parse {} failed: {error}", path.display()))?;
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse_toml(content: &str) -> RoleplayToml {
        toml::from_str(content).expect("valid roleplay.toml")
    }

    #[test]
    fn cli_flags_override_toml_values() -> Result<(), Box<dyn std::error::Error>> {
        let parsed = parse_toml(
            r#"
[chat]
model = "mistral"
base_url = "http://10.0.0.2:11434"
memfile = "notes.jsonl"
export_format = "markdown"
memory = true
search_limit = 3
"#,
        );
        let cli = Cli::try_parse_from([
            "roleplay",
            "--model",
            "llama3.2",
            "--no-memory",
            "--romantic",
            "--export-format",
            "txt",
        ])?;

        let config = resolve_chat_config(&cli.chat, &parsed.chat)?;
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.base_url, "http://10.0.0.2:11434");
        assert_eq!(config.memory.memory_file, PathBuf::from("notes.jsonl"));
        assert!(!config.memory.enabled);
        assert_eq!(config.memory.search_limit, 3);
        assert_eq!(config.export_format, TranscriptFormat::Txt);
        assert_eq!(
            config.modes,
            PromptModes {
                nsfw: false,
                romantic: true
            }
        );
        Ok(())
    }

    #[test]
    fn defaults_apply_without_config() -> Result<(), Box<dyn std::error::Error>> {
        let config = resolve_chat_config(&ChatArgs::default(), &RoleplayTomlChat::default())?;
        assert_eq!(config.model, DEFAULT_OLLAMA_MODEL);
        assert_eq!(config.base_url, DEFAULT_OLLAMA_BASE_URL);
        assert_eq!(config.botinfo, PathBuf::from(DEFAULT_BOTINFO_FILE));
        assert_eq!(config.chat_dir, PathBuf::from(DEFAULT_CHAT_DIR));
        assert_eq!(config.export_format, TranscriptFormat::Json);
        assert!(config.memory.enabled);
        Ok(())
    }

    #[test]
    fn invalid_toml_values_are_rejected() {
        let bad_format = RoleplayTomlChat {
            export_format: Some("pdf".to_string()),
            ..Default::default()
        };
        assert!(resolve_chat_config(&ChatArgs::default(), &bad_format).is_err());

        let zero_limit = RoleplayTomlChat {
            search_limit: Some(0),
            ..Default::default()
        };
        assert!(resolve_chat_config(&ChatArgs::default(), &zero_limit).is_err());
    }

    #[test]
    fn log_config_prefers_cli_level() {
        let parsed = parse_toml(
            r#"
[log]
path = "/tmp/roleplay-logs"
level = "debug"
rotate_size_mb = 0
"#,
        );
        let config = build_runtime_log_config(&parsed.log, LOG_FILE_NAME, Some("WARN"));
        assert_eq!(config.file_path, PathBuf::from("/tmp/roleplay-logs/roleplay.log"));
        assert_eq!(config.level, "warn");
        assert_eq!(config.rotate_size_bytes, 1024 * 1024);
        assert!(!config.stdout);

        let config = build_runtime_log_config(&parsed.log, LOG_FILE_NAME, None);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn expand_home_path_handles_tilde() {
        assert_eq!(expand_home_path("~"), home_dir());
        assert_eq!(expand_home_path("~/logs"), home_dir().join("logs"));
        assert_eq!(expand_home_path(" /var/log "), PathBuf::from("/var/log"));
    }

    #[test]
    fn size_rotating_writer_rotates_to_numbered_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("logs").join(LOG_FILE_NAME);
        let mut writer = SizeRotatingFileWriter::new(path.clone(), 16)?;

        writer.write_all(b"0123456789\n")?;
        writer.write_all(b"abcdefghij\n")?;

        let rotated = dir.path().join("logs").join("roleplay.log.1");
        assert_eq!(std::fs::read_to_string(&rotated)?, "0123456789\n");
        assert_eq!(std::fs::read_to_string(&path)?, "abcdefghij\n");
        Ok(())
    }

    #[test]
    fn read_toml_if_exists_returns_none_for_missing_file() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        let missing = dir.path().join(CONFIG_FILE_NAME);
        assert!(read_toml_if_exists::<RoleplayToml>(&missing)?.is_none());

        std::fs::write(&missing, "[chat]\nmodel = \"phi3\"\n")?;
        let parsed = read_toml_if_exists::<RoleplayToml>(&missing)?.unwrap_or_default();
        assert_eq!(parsed.chat.model.as_deref(), Some("phi3"));
        Ok(())
    }
}
