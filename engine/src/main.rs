//! journal-engine 命令行入口
//!
//! 用法：
//!   journal-engine key
//!   journal-engine seal <text>
//!   journal-engine open <payload-json>
//!   journal-engine write --user <id>      # 从 stdin 逐行输入，结束时手动保存
//!   journal-engine list --user <id>
//!
//! 所有实际逻辑都委托给库模块，这里只负责参数与输出。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast::error::RecvError, watch};
use tracing::info;
use tracing_subscriber::EnvFilter;

use journal_engine::autosave::{DEFAULT_DEBOUNCE, DEFAULT_SAVED_DISPLAY};
use journal_engine::repository::DEFAULT_RECENT_LIMIT;
use journal_engine::{
    AutosaveConfig, AutosaveController, CipherCodec, EncryptedPayload, EntryView, JournalReader,
    JournalRepository, JsonlJournalRepository, KeyOrigin, SessionEvent, UserId,
};

#[derive(Debug, Parser)]
#[command(name = "journal-engine", version, about = "Encrypted journal autosave engine")]
struct Cli {
    /// 数据目录，密钥位于 keys/，日记位于 journals/
    #[arg(long, env = "JOURNAL_ENGINE_DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Provision the device key and report where it came from
    Key,
    /// Encrypt text and print the payload as JSON
    Seal { text: String },
    /// Decrypt a payload JSON produced by `seal`
    Open { payload: String },
    /// Stream stdin lines into an autosave session
    Write {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = DEFAULT_DEBOUNCE.as_millis() as u64)]
        debounce_ms: u64,
        #[arg(long, default_value_t = DEFAULT_SAVED_DISPLAY.as_millis() as u64)]
        saved_display_ms: u64,
    },
    /// Print the most recent journal entries
    List {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,
    },
}

struct Paths {
    keys: PathBuf,
    journals: PathBuf,
}

impl Paths {
    fn resolve(data_dir: Option<PathBuf>) -> Result<Self> {
        let root = match data_dir {
            Some(dir) => dir,
            None => dirs::data_local_dir()
                .context("Cannot determine local data directory, pass --data-dir")?
                .join("journal-engine"),
        };

        Ok(Self {
            keys: root.join("keys"),
            journals: root.join("journals"),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "journal_engine=info".into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = Paths::resolve(cli.data_dir)?;

    let codec = Arc::new(
        journal_engine::open_codec(&paths.keys).context("Failed to open device key storage")?,
    );

    match cli.command {
        Command::Key => key(&codec),
        Command::Seal { text } => seal(&codec, &text).await,
        Command::Open { payload } => open(&codec, &payload).await,
        Command::Write {
            user,
            debounce_ms,
            saved_display_ms,
        } => {
            let config = AutosaveConfig::default()
                .with_debounce(Duration::from_millis(debounce_ms))
                .with_saved_display(Duration::from_millis(saved_display_ms));
            write(codec, &paths, UserId::new(user), config).await
        }
        Command::List { user, limit } => list(codec, &paths, UserId::new(user), limit).await,
    }
}

fn key(codec: &CipherCodec) -> Result<()> {
    let provision = codec.key_store().provision()?;

    match provision.origin {
        KeyOrigin::Loaded => println!("device key loaded"),
        KeyOrigin::Created => println!("device key created"),
        KeyOrigin::Regenerated { reason } => {
            println!("device key regenerated ({reason}); earlier entries are no longer readable")
        }
    }

    Ok(())
}

async fn seal(codec: &Arc<CipherCodec>, text: &str) -> Result<()> {
    let payload = codec.seal_text(text).await?;
    warn_if_regenerated(codec);

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

async fn open(codec: &Arc<CipherCodec>, payload: &str) -> Result<()> {
    let payload: EncryptedPayload =
        serde_json::from_str(payload).context("Payload is not valid JSON")?;

    let text = codec
        .open_text(payload)
        .await
        .context("Entry could not be decrypted")?;
    println!("{text}");
    Ok(())
}

async fn write(
    codec: Arc<CipherCodec>,
    paths: &Paths,
    user: UserId,
    config: AutosaveConfig,
) -> Result<()> {
    let repository: Arc<dyn JournalRepository> =
        Arc::new(JsonlJournalRepository::new(&paths.journals));
    let (_identity, identity_rx) = watch::channel(Some(user));

    let controller = AutosaveController::spawn(config, Arc::clone(&codec), repository, identity_rx);
    let mut events = controller.subscribe_events();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut buffer = String::new();

    while let Some(line) = lines.next_line().await? {
        if !buffer.is_empty() {
            buffer.push('\n');
        }
        buffer.push_str(&line);
        controller.set_buffer(buffer.clone());
    }

    controller.save_now();

    let outcome = loop {
        match events.recv().await {
            Ok(
                event @ (SessionEvent::Saved { manual: true, .. }
                | SessionEvent::SaveFailed { manual: true, .. }
                | SessionEvent::LoginRequired
                | SessionEvent::NothingToSave),
            ) => break event,
            Ok(event) => info!("{}", event.message()),
            Err(RecvError::Lagged(skipped)) => info!(skipped, "missed autosave events"),
            Err(RecvError::Closed) => bail!("Autosave session closed unexpectedly"),
        }
    };

    controller.shutdown().await;
    warn_if_regenerated(&codec);

    let message = outcome.message();
    match outcome {
        SessionEvent::Saved { record, .. } => {
            println!("{message} ({record})");
            Ok(())
        }
        SessionEvent::SaveFailed { reason, .. } => bail!("{message}: {reason}"),
        _ => bail!("{message}"),
    }
}

async fn list(codec: Arc<CipherCodec>, paths: &Paths, user: UserId, limit: usize) -> Result<()> {
    let repository: Arc<dyn JournalRepository> =
        Arc::new(JsonlJournalRepository::new(&paths.journals));
    let reader = JournalReader::new(Arc::clone(&codec), repository);

    let entries = reader
        .recent(&user, limit)
        .await
        .context("Failed to load journal entries")?;
    warn_if_regenerated(&codec);

    if entries.is_empty() {
        println!("no journal entries for {user}");
        return Ok(());
    }

    for entry in entries {
        match entry {
            EntryView::Readable {
                id,
                created_at,
                text,
            } => println!("── {} · {id}\n{text}\n", created_at.to_rfc3339()),
            EntryView::Unreadable {
                id,
                created_at,
                reason,
            } => println!("── {} · {id}\n[unreadable: {reason}]\n", created_at.to_rfc3339()),
        }
    }

    Ok(())
}

fn warn_if_regenerated(codec: &CipherCodec) {
    if let Some(reason) = codec.key_store().take_regeneration_notice() {
        eprintln!(
            "warning: stored device key was unusable ({reason}); a new key was generated and earlier entries cannot be decrypted"
        );
    }
}
