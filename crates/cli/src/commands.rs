//! Merge-view subcommands: list, show, resolve, preview.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use dialoguer::{theme::ColorfulTheme, Confirm, Select};
use tracing::debug;

use mergepane_core::conflict::ConflictRegion;
use mergepane_core::errors::Fallback;
use mergepane_core::{ConflictSet, MergeView, MergeWorkspace, PaneMode, Side, Verdict};

use crate::style;

/// What to do with one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Keep the Ours version of the region.
    Ours,
    /// Keep the Theirs version of the region.
    Theirs,
    /// Ours then Theirs.
    Both,
    /// Keep the Base lines.
    Base,
}

impl Choice {
    /// Per-side verdicts for `region`; absent sides are skipped.
    fn verdicts(self, region: &ConflictRegion) -> Vec<(Side, Verdict)> {
        [Side::Ours, Side::Theirs]
            .into_iter()
            .filter(|side| region.edit(*side).is_some())
            .map(|side| {
                let keep = match self {
                    Self::Ours => side == Side::Ours,
                    Self::Theirs => side == Side::Theirs,
                    Self::Both => true,
                    Self::Base => false,
                };
                (side, if keep { Verdict::Accept } else { Verdict::Ignore })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

pub async fn run_list(ws: &MergeWorkspace) -> Result<()> {
    let files = ws
        .scan_conflicts()
        .await
        .context("failed to scan for conflicts")?;

    if files.is_empty() {
        println!();
        println!("{}", style::success("No conflicted files"));
        println!();
        return Ok(());
    }

    println!();
    println!(
        "{}",
        style::header(&format!("Conflicted Files ({})", files.len()))
    );
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["File", "Source", "Regions", "Detected"]);

    for f in &files {
        table.add_row(vec![
            Cell::new(f.path.display()),
            Cell::new(f.source),
            Cell::new(f.region_count),
            Cell::new(f.detected_at.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }

    println!("{}", table);
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

pub async fn run_show(ws: &MergeWorkspace, path: &Path, json: bool) -> Result<()> {
    let view = open(ws, path).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&view).context("failed to serialize merge view")?
        );
        return Ok(());
    }

    println!();
    println!(
        "{}",
        style::header(&format!("{} ({})", view.path.display(), region_summary(&view.set)))
    );
    println!(
        "{}",
        style::dim(&format!(
            "stages from {}, ours = {}, theirs = {}",
            view.source, view.ours_label, view.theirs_label
        ))
    );
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Region", "Base lines", "Class", "Ours", "Theirs"]);

    for region in view.set.regions() {
        table.add_row(vec![
            Cell::new(region.id()),
            Cell::new(line_range(region)),
            Cell::new(style::class(region.class())),
            Cell::new(style::decision(region.decision(Side::Ours))),
            Cell::new(style::decision(region.decision(Side::Theirs))),
        ]);
    }
    println!("{}", table);

    for region in view.set.regions() {
        println!();
        print_region(&view, region);
    }
    println!();
    Ok(())
}

fn region_summary(set: &ConflictSet) -> String {
    format!(
        "{} region(s), {} conflicting",
        set.regions().len(),
        set.conflicting_count()
    )
}

fn line_range(region: &ConflictRegion) -> String {
    let range = region.base_range();
    if range.is_empty() {
        format!("after {}", range.start)
    } else {
        format!("{}-{}", range.start + 1, range.end)
    }
}

fn print_region(view: &MergeView, region: &ConflictRegion) {
    println!(
        "{}",
        style::header(&format!("Region {} ({})", region.id(), region.class()))
    );
    let base = view.set.base().slice(region.base_range());
    println!("{}", style::dim("  base:"));
    for line in base {
        println!("    {}", line.content());
    }
    for (side, label) in [
        (Side::Ours, &view.ours_label),
        (Side::Theirs, &view.theirs_label),
    ] {
        if let Some(lines) = region.edit(side) {
            println!("{}", style::dim(&format!("  {side} ({label}):")));
            for line in lines {
                println!("    {}", line.content());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// resolve / preview
// ---------------------------------------------------------------------------

/// Decide regions (interactively unless `batch` is given) and write the
/// merged file once every region is resolved.
pub async fn run_resolve(ws: &MergeWorkspace, path: &Path, batch: Option<Choice>) -> Result<()> {
    let view = open(ws, path).await?;
    decide_regions(ws, &view, batch).await?;

    let view = ws.view(path).await?;
    if !view.is_resolved() {
        let pending = view.pending_regions();
        ws.save_progress(path)
            .await
            .context("failed to save partial resolution")?;
        println!(
            "{}",
            style::warn(&format!(
                "{} region(s) still unresolved; progress saved to {} with conflict markers",
                pending.len(),
                path.display()
            ))
        );
        return Ok(());
    }

    if batch.is_none() {
        let write = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Write merged result to {}?", path.display()))
            .default(true)
            .interact()
            .context("prompt failed")?;
        if !write {
            println!("{}", style::dim("Nothing written."));
            return Ok(());
        }
    }

    let merged = ws
        .mark_file_resolved(path)
        .await
        .with_context(|| format!("failed to mark {} resolved", path.display()))?;
    println!(
        "{}",
        style::success(&format!(
            "{} resolved ({} lines written)",
            path.display(),
            merged.len()
        ))
    );
    Ok(())
}

/// Print the patch the working file would receive, without writing it.
pub async fn run_preview(ws: &MergeWorkspace, path: &Path, batch: Option<Choice>) -> Result<()> {
    let view = open(ws, path).await?;
    if batch.is_some() {
        decide_regions(ws, &view, batch).await?;
    }
    let patch = ws.preview(path).await.context("failed to build preview")?;
    for line in patch.lines() {
        println!("{}", style::patch_line(line));
    }
    Ok(())
}

async fn decide_regions(ws: &MergeWorkspace, view: &MergeView, batch: Option<Choice>) -> Result<()> {
    if view.mode == PaneMode::ReadOnly {
        ws.toggle_resolve_mode(&view.path).await?;
    }
    for region in view.set.regions() {
        let choice = match batch {
            Some(choice) => Some(choice),
            None => {
                println!();
                print_region(view, region);
                prompt(region)?
            }
        };
        let Some(choice) = choice else {
            debug!(region = %region.id(), "region skipped");
            continue;
        };
        for (side, verdict) in choice.verdicts(region) {
            ws.resolve_hunk(&view.path, region.id(), side, verdict)
                .await
                .with_context(|| format!("failed to apply decision to region {}", region.id()))?;
        }
    }
    Ok(())
}

fn prompt(region: &ConflictRegion) -> Result<Option<Choice>> {
    let mut items: Vec<(&str, Option<Choice>)> = Vec::new();
    if region.ours_edit().is_some() && region.theirs_edit().is_some() {
        items.push(("Accept ours", Some(Choice::Ours)));
        items.push(("Accept theirs", Some(Choice::Theirs)));
        items.push(("Accept both (ours first)", Some(Choice::Both)));
    } else {
        items.push(("Accept change", Some(Choice::Both)));
    }
    items.push(("Keep base", Some(Choice::Base)));
    items.push(("Skip", None));

    let labels: Vec<&str> = items.iter().map(|(label, _)| *label).collect();
    let picked = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Region {}", region.id()))
        .items(&labels)
        .default(0)
        .interact()
        .context("prompt failed")?;
    Ok(items[picked].1)
}

/// Open the merge view, explaining how to proceed when none is available.
async fn open(ws: &MergeWorkspace, path: &Path) -> Result<MergeView> {
    match ws.open_merge_view(path).await {
        Ok(view) => Ok(view),
        Err(e) => {
            let hint = match e.fallback() {
                Fallback::NoMergeView => "no merge view available for this file",
                Fallback::ShowRawFile => "conflict markers are damaged; edit the file directly",
                Fallback::PlainEdit => "stage texts unavailable; edit the file directly",
                _ => "",
            };
            if !hint.is_empty() {
                eprintln!("{}", style::error(hint));
            }
            Err(anyhow::Error::new(e).context(format!("cannot open {}", path.display())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mergepane_core::{RegionId, Text};

    fn set() -> ConflictSet {
        ConflictSet::new(
            Text::from_lines(["a", "b", "c", "d", "e"]),
            Text::from_lines(["a", "B", "c", "d", "e"]),
            Text::from_lines(["a", "b2", "c", "d", "E"]),
        )
    }

    #[test]
    fn test_choice_on_conflicting_region() {
        let set = set();
        let region = set.region(RegionId(0)).unwrap();
        assert_eq!(
            Choice::Ours.verdicts(region),
            vec![(Side::Ours, Verdict::Accept), (Side::Theirs, Verdict::Ignore)]
        );
        assert_eq!(
            Choice::Both.verdicts(region),
            vec![(Side::Ours, Verdict::Accept), (Side::Theirs, Verdict::Accept)]
        );
    }

    #[test]
    fn test_choice_skips_absent_side() {
        let set = set();
        let region = set.region(RegionId(1)).unwrap();
        assert_eq!(Choice::Ours.verdicts(region), vec![(Side::Theirs, Verdict::Ignore)]);
        assert_eq!(Choice::Theirs.verdicts(region), vec![(Side::Theirs, Verdict::Accept)]);
    }

    #[test]
    fn test_region_summary_counts_conflicts() {
        assert_eq!(region_summary(&set()), "2 region(s), 1 conflicting");
    }

    #[test]
    fn test_line_range_labels() {
        let set = set();
        assert_eq!(line_range(set.region(RegionId(0)).unwrap()), "2-2");
        assert_eq!(line_range(set.region(RegionId(1)).unwrap()), "5-5");
    }
}
