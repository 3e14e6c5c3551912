//! End-to-end tests for merge sessions over real working trees.
//!
//! These tests exercise `MergeWorkspace` with:
//! - Local git repositories left mid-merge by `git2` (index stages 1/2/3)
//! - Plain directories holding diff3-marked files (no repository)
//! - The real filesystem working copy
//!
//! No network I/O and no external binaries.

use std::path::Path;
use std::sync::Arc;

use git2::build::CheckoutBuilder;
use git2::{Commit, Oid, Repository, Signature};
use tempfile::TempDir;

use mergepane_core::errors::Fallback;
use mergepane_core::{
    AppConfig, FallbackProvider, FsWorkingCopy, MergeError, MergeWorkspace, PaneMode, RegionId,
    Side, StageSource, Verdict,
};

// ===========================================================================
// Helpers
// ===========================================================================

const FILE: &str = "file.txt";

fn commit_file(repo: &Repository, update_ref: Option<&str>, content: &str, parents: &[&Commit]) -> Oid {
    let sig = Signature::now("Test", "test@example.com").unwrap();
    let blob = repo.blob(content.as_bytes()).unwrap();
    let mut builder = repo.treebuilder(None).unwrap();
    builder.insert(FILE, blob, 0o100644).unwrap();
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();
    repo.commit(update_ref, &sig, &sig, "commit", &tree, parents)
        .unwrap()
}

/// A repository stopped mid-merge with `file.txt` in conflict.
fn conflicted_repo(base: &str, ours: &str, theirs: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let base_oid = commit_file(&repo, Some("HEAD"), base, &[]);
    let base_commit = repo.find_commit(base_oid).unwrap();
    let theirs_oid = commit_file(&repo, None, theirs, &[&base_commit]);
    commit_file(&repo, Some("HEAD"), ours, &[&base_commit]);
    repo.checkout_head(Some(CheckoutBuilder::new().force()))
        .unwrap();

    let annotated = repo.find_annotated_commit(theirs_oid).unwrap();
    let mut checkout = CheckoutBuilder::new();
    checkout.conflict_style_diff3(true);
    repo.merge(&[&annotated], None, Some(&mut checkout)).unwrap();
    dir
}

fn workspace(root: &Path) -> MergeWorkspace {
    let config = AppConfig::default();
    let provider = FallbackProvider::discover(root, config.markers.marker_size);
    MergeWorkspace::new(Arc::new(provider), Arc::new(FsWorkingCopy::new(root)), config)
}

fn path() -> &'static Path {
    Path::new(FILE)
}

// ===========================================================================
// Index-backed sessions
// ===========================================================================

#[tokio::test]
async fn test_resolve_from_git_index() {
    let dir = conflicted_repo("A\nB\nC\n", "A\nB2\nC\n", "A\nB3\nC\n");
    let ws = workspace(dir.path());

    let listed = ws.scan_conflicts().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].source, StageSource::Index);
    assert_eq!(listed[0].region_count, 1);

    let view = ws.open_merge_view(path()).await.unwrap();
    assert_eq!(view.mode, PaneMode::ReadOnly);
    assert_eq!(view.set.base().contents(), vec!["A", "B", "C"]);

    ws.toggle_resolve_mode(path()).await.unwrap();
    ws.resolve_hunk(path(), RegionId(0), Side::Ours, Verdict::Accept)
        .await
        .unwrap();
    ws.resolve_hunk(path(), RegionId(0), Side::Theirs, Verdict::Ignore)
        .await
        .unwrap();

    let patch = ws.preview(path()).await.unwrap();
    assert!(patch.contains("-=======\n"));

    let merged = ws.mark_file_resolved(path()).await.unwrap();
    assert_eq!(merged.to_string(), "A\nB2\nC\n");
    assert_eq!(
        std::fs::read_to_string(dir.path().join(FILE)).unwrap(),
        "A\nB2\nC\n"
    );
    assert!(ws.index().is_empty());

    let repo = Repository::open(dir.path()).unwrap();
    assert!(!repo.index().unwrap().has_conflicts());
    assert!(ws.scan_conflicts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_one_sided_region_resolves_with_single_decision() {
    let dir = conflicted_repo(
        "A\nB\nC\nD\nE\n",
        "A\nB2\nC\nD\nE\n",
        "A\nB3\nC\nD\nE2\n",
    );
    let ws = workspace(dir.path());
    let view = ws.open_merge_view(path()).await.unwrap();
    assert_eq!(view.set.regions().len(), 2);
    assert!(view.set.regions()[1].ours_edit().is_none());

    ws.toggle_resolve_mode(path()).await.unwrap();
    ws.accept_both(path(), RegionId(0)).await.unwrap();
    ws.resolve_hunk(path(), RegionId(1), Side::Theirs, Verdict::Ignore)
        .await
        .unwrap();

    let merged = ws.mark_file_resolved(path()).await.unwrap();
    assert_eq!(merged.contents(), vec!["A", "B2", "B3", "C", "D", "E"]);
}

#[tokio::test]
async fn test_external_edit_requires_reload() {
    let dir = conflicted_repo("A\nB\nC\n", "A\nB2\nC\n", "A\nB3\nC\n");
    let ws = workspace(dir.path());
    ws.open_merge_view(path()).await.unwrap();
    ws.toggle_resolve_mode(path()).await.unwrap();

    std::fs::write(dir.path().join(FILE), "edited by hand\n").unwrap();
    let err = ws
        .resolve_hunk(path(), RegionId(0), Side::Ours, Verdict::Accept)
        .await
        .unwrap_err();
    assert!(matches!(err, MergeError::StaleConflict(_)));
    assert_eq!(err.fallback(), Fallback::Reload);

    // Stage texts still come from the index, so a refresh recovers.
    let view = ws.refresh(path()).await.unwrap();
    assert!(!view.stale);
    ws.resolve_hunk(path(), RegionId(0), Side::Ours, Verdict::Accept)
        .await
        .unwrap();
}

// ===========================================================================
// Marker-backed sessions
// ===========================================================================

#[tokio::test]
async fn test_marker_fallback_without_repository() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(FILE),
        "A\n<<<<<<< HEAD\nB2\n||||||| base\nB\n=======\nB3\n>>>>>>> topic\nC\n",
    )
    .unwrap();
    let ws = workspace(dir.path());

    let view = ws.open_merge_view(path()).await.unwrap();
    assert_eq!(view.source, StageSource::Markers);

    ws.toggle_resolve_mode(path()).await.unwrap();
    ws.resolve_hunk(path(), RegionId(0), Side::Ours, Verdict::Ignore)
        .await
        .unwrap();

    match ws.mark_file_resolved(path()).await.unwrap_err() {
        MergeError::IncompleteResolution(ids) => assert_eq!(ids, vec![RegionId(0)]),
        other => panic!("unexpected error: {other}"),
    }

    ws.resolve_hunk(path(), RegionId(0), Side::Theirs, Verdict::Accept)
        .await
        .unwrap();
    ws.mark_file_resolved(path()).await.unwrap();
    assert_eq!(
        std::fs::read_to_string(dir.path().join(FILE)).unwrap(),
        "A\nB3\nC\n"
    );
}

#[tokio::test]
async fn test_malformed_markers_fall_back_to_raw_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(FILE),
        "A\n<<<<<<< HEAD\nB2\n=======\nB3\n>>>>>>> topic\n",
    )
    .unwrap();
    let ws = workspace(dir.path());
    let err = ws.open_merge_view(path()).await.unwrap_err();
    assert!(matches!(err, MergeError::MalformedMarkers { .. }));
    assert_eq!(err.fallback(), Fallback::ShowRawFile);
}
