//! Merge sessions: the commands a hosting surface issues against conflicted
//! files.
//!
//! A [`MergeWorkspace`] owns the mapping from path to [`ConflictHandle`]. Stage
//! reads and alignment run on the blocking pool; a per-path generation
//! counter discards results that a close or reopen has superseded, so a view
//! only ever sees a completed region list.

mod handle;
mod index;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::AppConfig;
use crate::conflict::markers::render_with_markers;
use crate::conflict::merger::MergeApplier;
use crate::conflict::region::ConflictSet;
use crate::conflict::resolver::{ActionOutcome, ResolveAction};
use crate::conflict::scroll::{NavigationState, PanePositions};
use crate::errors::{MergeError, StageError};
use crate::models::{ConflictedFile, Direction, PaneMode, RegionId, Side, StageSource, Verdict};
use crate::stage::{StageTextProvider, StageTexts};
use crate::text::{content_hash, Text};
use crate::working_copy::WorkingCopy;

pub use handle::ConflictHandle;
pub use index::ConflictIndex;

use handle::FileSession;

/// Snapshot of one open merge view.
#[derive(Debug, Clone, Serialize)]
pub struct MergeView {
    pub path: PathBuf,
    pub mode: PaneMode,
    pub source: StageSource,
    pub ours_label: String,
    pub theirs_label: String,
    /// Cursor line in the Base pane.
    pub cursor: usize,
    pub navigation: NavigationState,
    /// The cursor mapped into all three panes.
    pub positions: PanePositions,
    /// Set once the working file changed underneath the session.
    pub stale: bool,
    pub set: ConflictSet,
}

impl MergeView {
    pub fn is_resolved(&self) -> bool {
        self.set.is_resolved()
    }

    pub fn pending_regions(&self) -> Vec<RegionId> {
        self.set.pending_regions()
    }
}

#[derive(Default)]
struct Sessions {
    handles: HashMap<PathBuf, ConflictHandle>,
    generations: HashMap<PathBuf, u64>,
}

impl Sessions {
    fn bump(&mut self, path: &Path) -> u64 {
        let generation = self.generations.entry(path.to_path_buf()).or_insert(0);
        *generation += 1;
        *generation
    }

    fn current(&self, path: &Path) -> u64 {
        self.generations.get(path).copied().unwrap_or(0)
    }
}

/// A loaded, aligned conflict ready to hand to a resolver task.
struct Loaded {
    set: ConflictSet,
    source: StageSource,
    hash: Option<String>,
}

/// Session-owned registry of open merge views for one working tree.
pub struct MergeWorkspace {
    provider: Arc<dyn StageTextProvider>,
    working_copy: Arc<dyn WorkingCopy>,
    config: AppConfig,
    sessions: Mutex<Sessions>,
    index: ConflictIndex,
}

impl MergeWorkspace {
    pub fn new(
        provider: Arc<dyn StageTextProvider>,
        working_copy: Arc<dyn WorkingCopy>,
        config: AppConfig,
    ) -> Self {
        Self {
            provider,
            working_copy,
            config,
            sessions: Mutex::new(Sessions::default()),
            index: ConflictIndex::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The "files with conflicts" listing.
    pub fn index(&self) -> &ConflictIndex {
        &self.index
    }

    /// Handle to the resolver task for an open view.
    pub async fn handle(&self, path: &Path) -> Result<ConflictHandle, MergeError> {
        self.sessions
            .lock()
            .await
            .handles
            .get(path)
            .filter(|h| !h.is_closed())
            .cloned()
            .ok_or_else(|| MergeError::SessionNotOpen(path.display().to_string()))
    }

    // -----------------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------------

    /// Rescan the provider and rebuild the conflict listing.
    ///
    /// Paths whose conflict disappeared are dropped; open views for them are
    /// closed.
    #[instrument(skip(self))]
    pub async fn scan_conflicts(&self) -> Result<Vec<ConflictedFile>, MergeError> {
        let provider = Arc::clone(&self.provider);
        let retries = self.config.session.stage_read_retries;
        let files = tokio::task::spawn_blocking(move || -> Result<Vec<ConflictedFile>, StageError> {
            let mut files = Vec::new();
            for path in provider.conflicted_paths()? {
                match fetch_with_retry(provider.as_ref(), &path, retries) {
                    Ok(stages) => {
                        let source = stages.source;
                        let set = ConflictSet::new(stages.base, stages.ours, stages.theirs);
                        files.push(ConflictedFile {
                            path,
                            source,
                            region_count: set.regions().len(),
                            detected_at: Utc::now(),
                        });
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable conflict"),
                }
            }
            Ok(files)
        })
        .await
        .map_err(|e| MergeError::Cancelled(format!("conflict scan: {e}")))??;

        let live: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
        let vanished: Vec<PathBuf> = {
            let sessions = self.sessions.lock().await;
            sessions
                .handles
                .keys()
                .filter(|p| !live.contains(*p))
                .cloned()
                .collect()
        };
        for path in vanished {
            info!(path = %path.display(), "conflict disappeared, closing view");
            self.close(&path).await;
        }

        self.index.replace_all(files);
        info!(count = self.index.len(), "conflict scan complete");
        Ok(self.index.snapshot())
    }

    // -----------------------------------------------------------------------
    // View lifecycle
    // -----------------------------------------------------------------------

    /// Open the three-pane view for `path`, reusing an existing one.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn open_merge_view(&self, path: &Path) -> Result<MergeView, MergeError> {
        if let Ok(handle) = self.handle(path).await {
            if let Ok(view) = handle.snapshot().await {
                return Ok(view);
            }
        }
        let mode = if self.config.session.start_in_resolve_mode {
            PaneMode::Resolve
        } else {
            PaneMode::ReadOnly
        };
        self.load_and_install(path, mode).await
    }

    /// Re-read stages and realign, discarding all decisions and any stale flag.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn refresh(&self, path: &Path) -> Result<MergeView, MergeError> {
        let mode = match self.handle(path).await {
            Ok(handle) => handle.snapshot().await.map(|v| v.mode).unwrap_or_default(),
            Err(_) => PaneMode::default(),
        };
        self.load_and_install(path, mode).await
    }

    /// Close the view for `path`, cancelling any alignment in flight.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn close(&self, path: &Path) {
        let handle = {
            let mut sessions = self.sessions.lock().await;
            sessions.bump(path);
            sessions.handles.remove(path)
        };
        if let Some(handle) = handle {
            handle.shutdown().await;
            debug!("merge view closed");
        }
    }

    async fn load_and_install(&self, path: &Path, mode: PaneMode) -> Result<MergeView, MergeError> {
        let generation = self.sessions.lock().await.bump(path);
        let loaded = match self.load(path).await {
            Ok(loaded) => loaded,
            Err(MergeError::NotAConflict(p)) => {
                self.forget(path).await;
                return Err(MergeError::NotAConflict(p));
            }
            Err(e) => return Err(e),
        };

        let region_count = loaded.set.regions().len();
        let source = loaded.source;
        let session = FileSession::new(
            path.to_path_buf(),
            loaded.set,
            mode,
            loaded.source,
            self.config.labels.clone(),
            loaded.hash,
        );

        let previous = {
            let mut sessions = self.sessions.lock().await;
            if sessions.current(path) != generation {
                debug!(generation, "alignment superseded, discarding result");
                return Err(MergeError::Cancelled(path.display().to_string()));
            }
            let handle = ConflictHandle::spawn(session);
            sessions.handles.insert(path.to_path_buf(), handle)
        };
        if let Some(old) = previous {
            old.shutdown().await;
        }

        self.index.upsert(ConflictedFile {
            path: path.to_path_buf(),
            source,
            region_count,
            detected_at: Utc::now(),
        });
        info!(regions = region_count, %source, "merge view opened");
        self.handle(path).await?.snapshot().await
    }

    /// Fetch stages (with retries) and align them off the async runtime.
    async fn load(&self, path: &Path) -> Result<Loaded, MergeError> {
        let provider = Arc::clone(&self.provider);
        let working_copy = Arc::clone(&self.working_copy);
        let retries = self.config.session.stage_read_retries;
        let path_buf = path.to_path_buf();

        tokio::task::spawn_blocking(move || -> Result<Loaded, MergeError> {
            let hash = working_copy.hash(&path_buf)?;
            let stages = fetch_with_retry(provider.as_ref(), &path_buf, retries)?;
            let StageTexts {
                base,
                ours,
                theirs,
                source,
            } = stages;
            let set = ConflictSet::new(base, ours, theirs);
            Ok(Loaded { set, source, hash })
        })
        .await
        .map_err(|e| {
            warn!(path = %path.display(), error = %e, "alignment task failed");
            MergeError::Cancelled(path.display().to_string())
        })?
    }

    /// Drop every trace of `path`: view, task, and listing entry.
    async fn forget(&self, path: &Path) {
        self.close(path).await;
        if self.index.remove(path) {
            info!(path = %path.display(), "removed from conflict listing");
        }
    }

    // -----------------------------------------------------------------------
    // View commands
    // -----------------------------------------------------------------------

    pub async fn view(&self, path: &Path) -> Result<MergeView, MergeError> {
        self.handle(path).await?.snapshot().await
    }

    pub async fn toggle_resolve_mode(&self, path: &Path) -> Result<PaneMode, MergeError> {
        self.handle(path).await?.toggle_mode().await
    }

    /// Jump to the next/previous region; returns the new Base cursor.
    pub async fn navigate_diff(&self, path: &Path, direction: Direction) -> Result<usize, MergeError> {
        self.handle(path).await?.navigate(direction).await
    }

    pub async fn set_cursor(&self, path: &Path, line: usize) -> Result<usize, MergeError> {
        self.handle(path).await?.set_cursor(line).await
    }

    /// Accept or ignore one side of one region.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn resolve_hunk(
        &self,
        path: &Path,
        region: RegionId,
        side: Side,
        verdict: Verdict,
    ) -> Result<ActionOutcome, MergeError> {
        self.submit(path, ResolveAction::decide(region, side, verdict))
            .await
    }

    pub async fn accept_both(&self, path: &Path, region: RegionId) -> Result<ActionOutcome, MergeError> {
        self.submit(path, ResolveAction::AcceptBoth(region)).await
    }

    /// Return one side of a region to undecided.
    pub async fn revert_hunk(
        &self,
        path: &Path,
        region: RegionId,
        side: Side,
    ) -> Result<ActionOutcome, MergeError> {
        self.submit(path, ResolveAction::Revert(region, side)).await
    }

    async fn submit(&self, path: &Path, action: ResolveAction) -> Result<ActionOutcome, MergeError> {
        let handle = self.handle(path).await?;
        let hash = self.current_hash(path).await?;
        handle.apply(action, hash).await
    }

    async fn current_hash(&self, path: &Path) -> Result<Option<String>, MergeError> {
        let working_copy = Arc::clone(&self.working_copy);
        let path_buf = path.to_path_buf();
        tokio::task::spawn_blocking(move || working_copy.hash(&path_buf))
            .await
            .map_err(|_| MergeError::Cancelled(path.display().to_string()))?
            .map_err(MergeError::from)
    }

    /// Finish `path`: write the merged text, clear the conflict, and drop the
    /// view and listing entry.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn mark_file_resolved(&self, path: &Path) -> Result<Text, MergeError> {
        let merged = match self.submit(path, ResolveAction::MarkResolved).await? {
            ActionOutcome::Resolved(text) => text,
            ActionOutcome::Updated { .. } => {
                return Err(MergeError::IncompleteResolution(
                    self.view(path).await?.pending_regions(),
                ))
            }
        };

        let contents = merged.to_string();
        let hash = content_hash(&contents);
        let working_copy = Arc::clone(&self.working_copy);
        let path_buf = path.to_path_buf();
        tokio::task::spawn_blocking(move || working_copy.write(&path_buf, &contents))
            .await
            .map_err(|_| MergeError::Cancelled(path.display().to_string()))??;

        // The merged text is on disk now; a retry must not see it as an external edit.
        self.handle(path).await?.rebase(Some(hash)).await?;

        let provider = Arc::clone(&self.provider);
        let path_buf = path.to_path_buf();
        tokio::task::spawn_blocking(move || provider.mark_resolved(&path_buf))
            .await
            .map_err(|_| MergeError::Cancelled(path.display().to_string()))??;

        self.forget(path).await;
        info!(lines = merged.len(), "file marked resolved");
        Ok(merged)
    }

    /// Write the current state back as a marked file without finishing it.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn save_progress(&self, path: &Path) -> Result<Text, MergeError> {
        let handle = self.handle(path).await?;
        let view = handle.verify(self.current_hash(path).await?).await?;
        let rendered = render_with_markers(&view.set, &self.config.labels, self.config.markers.marker_size);
        let contents = rendered.to_string();
        let hash = content_hash(&contents);

        let working_copy = Arc::clone(&self.working_copy);
        let path_buf = path.to_path_buf();
        tokio::task::spawn_blocking(move || working_copy.write(&path_buf, &contents))
            .await
            .map_err(|_| MergeError::Cancelled(path.display().to_string()))??;

        handle.rebase(Some(hash)).await?;
        debug!(lines = rendered.len(), "progress saved with conflict markers");
        Ok(rendered)
    }

    /// Unified diff from the working file to what the file would contain now:
    /// the merged text when fully decided, the marked rendering otherwise.
    pub async fn preview(&self, path: &Path) -> Result<String, MergeError> {
        let view = self.view(path).await?;
        let target = if view.is_resolved() {
            MergeApplier::apply(&view.set)?
        } else {
            render_with_markers(&view.set, &self.config.labels, self.config.markers.marker_size)
        };
        let working_copy = Arc::clone(&self.working_copy);
        let path_buf = path.to_path_buf();
        let current = tokio::task::spawn_blocking(move || working_copy.read(&path_buf))
            .await
            .map_err(|_| MergeError::Cancelled(path.display().to_string()))??;
        Ok(MergeApplier::preview_patch(&current, &target))
    }
}

/// Fetch with `retries` extra attempts on read failures.
fn fetch_with_retry(
    provider: &dyn StageTextProvider,
    path: &Path,
    retries: u32,
) -> Result<StageTexts, StageError> {
    let mut attempt = 0;
    loop {
        match provider.fetch(path) {
            Err(StageError::ReadFailure { path: p, detail }) if attempt < retries => {
                attempt += 1;
                warn!(path = %p, detail = %detail, attempt, "stage read failed, retrying");
            }
            other => return other,
        }
    }
}
