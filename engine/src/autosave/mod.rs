//! 日记自动保存
//!
//! 把编辑器的文本变更转换为节流、串行的“加密 + 追加”操作，
//! 并把保存状态与通知事件发布给界面。
//!
//! 状态机：
//!
//! ```text
//! Idle ──变更(非空)──▶ [等待 debounce] ──到期──▶ Saving ──成功──▶ Saved ──展示窗口结束──▶ Idle
//!   ▲                         │                    │
//!   └────── 缓冲区清空 ────────┘                    └──失败──▶ Error（保持到下一次保存或重置）
//!
//! 到期或手动保存时无已认证用户 ──▶ AwaitingAuth（不调用仓库）
//! ```
//!
//! 约束：
//! - 每个会话同一时刻最多一个保存在进行
//! - debounce 期间的每次变更都重新计时，只保存最后的内容
//! - 手动保存取消待执行的自动保存，不会重复提交同一份内容
//! - 失败不自动重试，下一次变更或手动保存是唯一的重试途径
//! - 会话关闭后不会再触发任何保存

mod session;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::codec::CipherCodec;
use crate::repository::{JournalRepository, RecordId, UserId};

use session::Session;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);
pub const DEFAULT_SAVED_DISPLAY: Duration = Duration::from_millis(3000);

const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    /// 最后一次变更之后、触发保存之前的静默时间
    pub debounce: Duration,
    /// “已保存”状态的展示时长，之后回到 Idle
    pub saved_display: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            saved_display: DEFAULT_SAVED_DISPLAY,
        }
    }
}

impl AutosaveConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_saved_display(mut self, saved_display: Duration) -> Self {
        self.saved_display = saved_display;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutosaveState {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
    AwaitingAuth,
}

impl AutosaveState {
    /// 编辑器旁显示的状态文字
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "",
            Self::Saving => "Saving...",
            Self::Saved => "Saved ✔",
            Self::Error => "Error",
            Self::AwaitingAuth => "Please login",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveStatus {
    pub state: AutosaveState,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_record: Option<RecordId>,
}

/// 需要界面提示或响应的会话事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// 保存成功；`manual` 为 true 时编辑器应清空文本
    Saved { record: RecordId, manual: bool },
    SaveFailed { manual: bool, reason: String },
    LoginRequired,
    NothingToSave,
    Cleared,
}

impl SessionEvent {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Saved { manual: true, .. } => "Journal saved securely",
            Self::Saved { manual: false, .. } => "Journal autosaved",
            Self::SaveFailed { manual: true, .. } => "Could not save journal",
            Self::SaveFailed { manual: false, .. } => "Could not autosave journal",
            Self::LoginRequired => "Please login to save journals",
            Self::NothingToSave => "Write something to save",
            Self::Cleared => "Journal cleared",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::SaveFailed { .. } | Self::LoginRequired | Self::NothingToSave
        )
    }
}

#[derive(Debug)]
enum Command {
    Buffer(String),
    SaveNow,
    Reset,
}

/// 一个编辑会话的自动保存控制器
///
/// 会话在独立的 tokio 任务中运行，所有命令按到达顺序串行处理。
/// `shutdown` 或直接 drop 控制器都会关闭会话，待执行的自动保存随之取消。
pub struct AutosaveController {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SaveStatus>,
    events: broadcast::Sender<SessionEvent>,
    task: JoinHandle<()>,
}

impl AutosaveController {
    /// 启动会话，必须在 tokio 运行时内调用
    ///
    /// #### 参数
    /// - `codec`：负责加密的 CipherCodec
    /// - `repository`：日记仓库
    /// - `identity`：当前登录用户，由界面层维护并更新
    pub fn spawn(
        config: AutosaveConfig,
        codec: Arc<CipherCodec>,
        repository: Arc<dyn JournalRepository>,
        identity: watch::Receiver<Option<UserId>>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SaveStatus::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let session = Session::new(
            config,
            codec,
            repository,
            identity,
            status_tx,
            events.clone(),
        );
        let task = tokio::spawn(session.run(command_rx));

        Self {
            commands,
            status,
            events,
            task,
        }
    }

    /// 编辑器文本变化
    pub fn set_buffer(&self, text: impl Into<String>) {
        self.send(Command::Buffer(text.into()));
    }

    /// 立即保存（跳过 debounce），成功后清空缓冲区
    pub fn save_now(&self) {
        self.send(Command::SaveNow);
    }

    /// 丢弃缓冲区与待执行的保存
    pub fn reset(&self) {
        self.send(Command::Reset);
    }

    pub fn status(&self) -> SaveStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.status.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// 关闭会话并等待任务退出
    ///
    /// 正在进行的保存会完成，待执行的自动保存不会再触发。
    pub async fn shutdown(self) {
        let Self { commands, task, .. } = self;
        drop(commands);

        if let Err(e) = task.await {
            error!(error = %e, "autosave session task failed");
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("autosave session already closed");
        }
    }
}
