use std::future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{self, Instant};
use tracing::{debug, error, info};

use super::{AutosaveConfig, AutosaveState, Command, SaveStatus, SessionEvent};
use crate::codec::CipherCodec;
use crate::error::JournalError;
use crate::repository::{JournalRepository, RecordId, UserId};

pub(super) struct Session {
    config: AutosaveConfig,
    codec: Arc<CipherCodec>,
    repository: Arc<dyn JournalRepository>,
    identity: watch::Receiver<Option<UserId>>,
    status: watch::Sender<SaveStatus>,
    events: broadcast::Sender<SessionEvent>,

    buffer: String,
    /// 每次缓冲区变化加一
    revision: u64,
    /// 最近一次成功保存时的 revision
    saved_revision: Option<u64>,
    last_record: Option<RecordId>,

    /// 待执行的自动保存
    save_at: Option<Instant>,
    /// Saved 状态结束的时刻
    idle_at: Option<Instant>,
}

impl Session {
    pub(super) fn new(
        config: AutosaveConfig,
        codec: Arc<CipherCodec>,
        repository: Arc<dyn JournalRepository>,
        identity: watch::Receiver<Option<UserId>>,
        status: watch::Sender<SaveStatus>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            config,
            codec,
            repository,
            identity,
            status,
            events,
            buffer: String::new(),
            revision: 0,
            saved_revision: None,
            last_record: None,
            save_at: None,
            idle_at: None,
        }
    }

    pub(super) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        debug!("autosave session started");

        loop {
            let save_at = self.save_at;
            let idle_at = self.idle_at;

            // 命令优先：通道关闭后立即退出，不再触发到期的保存
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },

                () = wait_until(save_at) => {
                    self.save_at = None;
                    self.autosave().await;
                }

                () = wait_until(idle_at) => {
                    self.idle_at = None;
                    if self.status.borrow().state == AutosaveState::Saved {
                        self.set_state(AutosaveState::Idle);
                    }
                }
            }
        }

        debug!("autosave session closed");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Buffer(text) => self.update_buffer(text),
            Command::SaveNow => self.manual_save().await,
            Command::Reset => self.reset(),
        }
    }

    fn update_buffer(&mut self, text: String) {
        self.revision += 1;
        self.buffer = text;

        if self.buffer.is_empty() {
            self.save_at = None;
            self.idle_at = None;
            self.set_state(AutosaveState::Idle);
            return;
        }

        // 重新计时，只有最后一次变更的内容会被保存
        self.save_at = Some(Instant::now() + self.config.debounce);
    }

    async fn autosave(&mut self) {
        let Some(user) = self.current_user() else {
            debug!("autosave skipped, no authenticated user");
            self.set_state(AutosaveState::AwaitingAuth);
            return;
        };

        if self.buffer.trim().is_empty() {
            self.set_state(AutosaveState::Idle);
            return;
        }

        match self.persist(&user).await {
            Ok(record) => {
                self.saved_revision = Some(self.revision);
                self.idle_at = Some(Instant::now() + self.config.saved_display);
                self.set_state(AutosaveState::Saved);
                self.emit(SessionEvent::Saved {
                    record,
                    manual: false,
                });
            }
            Err(e) => {
                error!(user = %user, error = %e, "autosave failed");
                self.set_state(AutosaveState::Error);
                self.emit(SessionEvent::SaveFailed {
                    manual: false,
                    reason: e.to_string(),
                });
            }
        }
    }

    async fn manual_save(&mut self) {
        self.save_at = None;

        let Some(user) = self.current_user() else {
            self.set_state(AutosaveState::AwaitingAuth);
            self.emit(SessionEvent::LoginRequired);
            return;
        };

        if self.buffer.trim().is_empty() {
            self.emit(SessionEvent::NothingToSave);
            return;
        }

        // 当前内容刚被自动保存写入，不再重复提交
        if self.saved_revision == Some(self.revision) {
            if let Some(record) = self.last_record.clone() {
                debug!(record = %record, "buffer already saved");
                self.finish_manual(record);
                return;
            }
        }

        match self.persist(&user).await {
            Ok(record) => self.finish_manual(record),
            Err(e) => {
                error!(user = %user, error = %e, "manual save failed");
                self.set_state(AutosaveState::Error);
                self.emit(SessionEvent::SaveFailed {
                    manual: true,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn finish_manual(&mut self, record: RecordId) {
        self.buffer.clear();
        self.revision += 1;
        self.saved_revision = None;
        self.idle_at = None;
        self.set_state(AutosaveState::Idle);
        self.emit(SessionEvent::Saved {
            record,
            manual: true,
        });
    }

    fn reset(&mut self) {
        self.save_at = None;
        self.idle_at = None;
        self.buffer.clear();
        self.revision += 1;
        self.saved_revision = None;
        self.set_state(AutosaveState::Idle);
        self.emit(SessionEvent::Cleared);
    }

    /// 加密当前缓冲区并追加到仓库
    async fn persist(&mut self, user: &UserId) -> Result<RecordId, JournalError> {
        self.idle_at = None;
        self.set_state(AutosaveState::Saving);

        let payload = self.codec.seal_text(&self.buffer).await?;
        let record = self.repository.append(user, &payload).await?;

        info!(user = %user, record = %record, "journal entry saved");

        self.last_record = Some(record.clone());
        self.status.send_modify(|status| {
            status.last_saved_at = Some(Utc::now());
            status.last_record = Some(record.clone());
        });

        Ok(record)
    }

    fn current_user(&self) -> Option<UserId> {
        self.identity.borrow().clone()
    }

    fn set_state(&self, state: AutosaveState) {
        self.status.send_if_modified(|status| {
            if status.state == state {
                return false;
            }
            status.state = state;
            true
        });
    }

    fn emit(&self, event: SessionEvent) {
        // 没有订阅者时直接丢弃
        let _ = self.events.send(event);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}
