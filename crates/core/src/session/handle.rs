//! Per-file resolver task and the handle that talks to it.
//!
//! Every mutation of a [`ConflictSet`] goes through one task's queue, so
//! actions on the same file never interleave.

use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::config::LabelConfig;
use crate::conflict::region::ConflictSet;
use crate::conflict::resolver::{ActionOutcome, ConflictResolver, ResolveAction};
use crate::conflict::scroll::ScrollCoordinator;
use crate::errors::MergeError;
use crate::models::{Direction, PaneMode, StageSource};
use crate::session::MergeView;

const QUEUE_DEPTH: usize = 32;

enum Command {
    Apply {
        action: ResolveAction,
        current_hash: Option<String>,
        reply: oneshot::Sender<Result<ActionOutcome, MergeError>>,
    },
    ToggleMode {
        reply: oneshot::Sender<PaneMode>,
    },
    Navigate {
        direction: Direction,
        reply: oneshot::Sender<usize>,
    },
    SetCursor {
        line: usize,
        reply: oneshot::Sender<usize>,
    },
    Snapshot {
        reply: oneshot::Sender<MergeView>,
    },
    Verify {
        current_hash: Option<String>,
        reply: oneshot::Sender<Result<MergeView, MergeError>>,
    },
    Rebase {
        hash: Option<String>,
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

/// State owned by one resolver task.
pub(crate) struct FileSession {
    pub path: PathBuf,
    pub set: ConflictSet,
    pub mode: PaneMode,
    pub source: StageSource,
    pub labels: LabelConfig,
    /// Working file hash when the set was loaded.
    pub opened_hash: Option<String>,
    pub cursor: usize,
    pub stale: bool,
    scroll: ScrollCoordinator,
}

impl FileSession {
    pub fn new(
        path: PathBuf,
        set: ConflictSet,
        mode: PaneMode,
        source: StageSource,
        labels: LabelConfig,
        opened_hash: Option<String>,
    ) -> Self {
        let scroll = ScrollCoordinator::new(&set);
        Self {
            path,
            set,
            mode,
            source,
            labels,
            opened_hash,
            cursor: 0,
            stale: false,
            scroll,
        }
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    /// Fail with `StaleConflict` if the working file no longer matches.
    fn verify(&mut self, current_hash: Option<String>) -> Result<(), MergeError> {
        if self.stale {
            return Err(MergeError::StaleConflict(self.display_path()));
        }
        if current_hash != self.opened_hash {
            warn!(path = %self.path.display(), "working file changed outside the merge session");
            self.stale = true;
            return Err(MergeError::StaleConflict(self.display_path()));
        }
        Ok(())
    }

    fn apply(&mut self, action: ResolveAction, current_hash: Option<String>) -> Result<ActionOutcome, MergeError> {
        self.verify(current_hash)?;
        if action != ResolveAction::MarkResolved && self.mode == PaneMode::ReadOnly {
            return Err(MergeError::ReadOnlyView(self.display_path()));
        }
        ConflictResolver::apply(&mut self.set, &action)
    }

    fn navigate(&mut self, direction: Direction) -> usize {
        self.cursor = self.scroll.navigate(self.cursor, direction);
        self.cursor
    }

    fn view(&self) -> MergeView {
        MergeView {
            path: self.path.clone(),
            mode: self.mode,
            source: self.source,
            ours_label: self.labels.ours.clone(),
            theirs_label: self.labels.theirs.clone(),
            cursor: self.cursor,
            navigation: self.scroll.navigation_state(self.cursor),
            positions: self.scroll.map_base(self.cursor),
            stale: self.stale,
            set: self.set.clone(),
        }
    }
}

async fn run(mut session: FileSession, mut rx: mpsc::Receiver<Command>) {
    debug!(path = %session.path.display(), "resolver task started");
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Apply {
                action,
                current_hash,
                reply,
            } => {
                let _ = reply.send(session.apply(action, current_hash));
            }
            Command::ToggleMode { reply } => {
                session.mode = session.mode.toggled();
                debug!(path = %session.path.display(), mode = ?session.mode, "pane mode toggled");
                let _ = reply.send(session.mode);
            }
            Command::Navigate { direction, reply } => {
                let _ = reply.send(session.navigate(direction));
            }
            Command::SetCursor { line, reply } => {
                session.cursor = line.min(session.set.base().len());
                let _ = reply.send(session.cursor);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(session.view());
            }
            Command::Verify {
                current_hash,
                reply,
            } => {
                let result = session.verify(current_hash).map(|()| session.view());
                let _ = reply.send(result);
            }
            Command::Rebase { hash, reply } => {
                session.opened_hash = hash;
                let _ = reply.send(());
            }
            Command::Shutdown => break,
        }
    }
    debug!(path = %session.path.display(), "resolver task stopped");
}

/// Clonable handle to one file's resolver task.
#[derive(Debug, Clone)]
pub struct ConflictHandle {
    tx: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Apply { action, .. } => write!(f, "Apply({action:?})"),
            Self::ToggleMode { .. } => write!(f, "ToggleMode"),
            Self::Navigate { direction, .. } => write!(f, "Navigate({direction:?})"),
            Self::SetCursor { line, .. } => write!(f, "SetCursor({line})"),
            Self::Snapshot { .. } => write!(f, "Snapshot"),
            Self::Verify { .. } => write!(f, "Verify"),
            Self::Rebase { .. } => write!(f, "Rebase"),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

impl ConflictHandle {
    /// Start a resolver task for `session` on the current runtime.
    pub(crate) fn spawn(session: FileSession) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(run(session, rx));
        Self { tx }
    }

    /// True once the resolver task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, MergeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| MergeError::SessionClosed)?;
        rx.await.map_err(|_| MergeError::SessionClosed)
    }

    /// Queue `action`; `current_hash` is the working file's hash right now.
    pub async fn apply(
        &self,
        action: ResolveAction,
        current_hash: Option<String>,
    ) -> Result<ActionOutcome, MergeError> {
        self.request(|reply| Command::Apply {
            action,
            current_hash,
            reply,
        })
        .await?
    }

    pub async fn toggle_mode(&self) -> Result<PaneMode, MergeError> {
        self.request(|reply| Command::ToggleMode { reply }).await
    }

    pub async fn navigate(&self, direction: Direction) -> Result<usize, MergeError> {
        self.request(|reply| Command::Navigate { direction, reply })
            .await
    }

    pub async fn set_cursor(&self, line: usize) -> Result<usize, MergeError> {
        self.request(|reply| Command::SetCursor { line, reply }).await
    }

    pub async fn snapshot(&self) -> Result<MergeView, MergeError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Snapshot, provided the working file still matches `current_hash`.
    pub async fn verify(&self, current_hash: Option<String>) -> Result<MergeView, MergeError> {
        self.request(|reply| Command::Verify {
            current_hash,
            reply,
        })
        .await?
    }

    /// Accept `hash` as the new baseline after the session itself wrote the file.
    pub(crate) async fn rebase(&self, hash: Option<String>) -> Result<(), MergeError> {
        self.request(|reply| Command::Rebase { hash, reply }).await
    }

    /// Stop the task; later requests fail with `SessionClosed`.
    pub(crate) async fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::scroll::NavigationState;
    use crate::models::{Decision, RegionId, Side};
    use crate::text::Text;

    fn session(mode: PaneMode) -> FileSession {
        let set = ConflictSet::new(
            Text::from_lines(["A", "B", "C"]),
            Text::from_lines(["A", "B2", "C"]),
            Text::from_lines(["A", "B3", "C"]),
        );
        FileSession::new(
            PathBuf::from("f.txt"),
            set,
            mode,
            StageSource::Index,
            LabelConfig::default(),
            Some("h1".into()),
        )
    }

    #[tokio::test]
    async fn test_read_only_rejects_actions() {
        let handle = ConflictHandle::spawn(session(PaneMode::ReadOnly));
        let err = handle
            .apply(ResolveAction::AcceptOurs(RegionId(0)), Some("h1".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, MergeError::ReadOnlyView(_)));

        assert_eq!(handle.toggle_mode().await.unwrap(), PaneMode::Resolve);
        handle
            .apply(ResolveAction::AcceptOurs(RegionId(0)), Some("h1".into()))
            .await
            .unwrap();
        let view = handle.snapshot().await.unwrap();
        assert_eq!(
            view.set.regions()[0].decision(Side::Ours),
            Some(Decision::Accepted)
        );
    }

    #[tokio::test]
    async fn test_hash_mismatch_marks_stale() {
        let handle = ConflictHandle::spawn(session(PaneMode::Resolve));
        let err = handle
            .apply(ResolveAction::AcceptOurs(RegionId(0)), Some("other".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, MergeError::StaleConflict(_)));

        // Stays stale even once the hash matches again.
        let err = handle
            .apply(ResolveAction::AcceptOurs(RegionId(0)), Some("h1".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, MergeError::StaleConflict(_)));
        assert!(handle.snapshot().await.unwrap().stale);
    }

    #[tokio::test]
    async fn test_queued_actions_apply_in_order() {
        let handle = ConflictHandle::spawn(session(PaneMode::Resolve));
        let h1 = Some("h1".to_string());
        let (a, b, c) = tokio::join!(
            handle.apply(ResolveAction::AcceptOurs(RegionId(0)), h1.clone()),
            handle.apply(ResolveAction::IgnoreTheirs(RegionId(0)), h1.clone()),
            handle.apply(ResolveAction::MarkResolved, h1.clone()),
        );
        a.unwrap();
        b.unwrap();
        match c.unwrap() {
            ActionOutcome::Resolved(text) => assert_eq!(text.contents(), vec!["A", "B2", "C"]),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_closes_handle() {
        let handle = ConflictHandle::spawn(session(PaneMode::Resolve));
        let clone = handle.clone();
        assert!(!clone.is_closed());
        handle.shutdown().await;
        assert!(matches!(
            clone.snapshot().await,
            Err(MergeError::SessionClosed)
        ));
        assert!(clone.is_closed());
    }

    #[tokio::test]
    async fn test_navigation_moves_cursor() {
        let handle = ConflictHandle::spawn(session(PaneMode::ReadOnly));
        assert_eq!(handle.navigate(Direction::Next).await.unwrap(), 1);
        assert_eq!(handle.navigate(Direction::Next).await.unwrap(), 1);
        let view = handle.snapshot().await.unwrap();
        assert_eq!(view.navigation, NavigationState::default());
        assert_eq!(view.cursor, 1);
    }
}
