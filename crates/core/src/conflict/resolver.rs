//! Resolution state machine.
//!
//! [`ConflictResolver::apply`] is the only code path that mutates a
//! [`ConflictSet`]. Each action overwrites the decision of the side(s) it
//! names; nothing is ever decided implicitly.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::conflict::merger::MergeApplier;
use crate::conflict::region::ConflictSet;
use crate::errors::MergeError;
use crate::models::{Decision, RegionId, Side, Verdict};
use crate::text::Text;

/// A user action against one conflict set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "region")]
pub enum ResolveAction {
    AcceptOurs(RegionId),
    IgnoreOurs(RegionId),
    AcceptTheirs(RegionId),
    IgnoreTheirs(RegionId),
    /// Accept both sides; Ours is emitted before Theirs.
    AcceptBoth(RegionId),
    /// Return one side to `Undecided`.
    Revert(RegionId, Side),
    /// Finish the file; fails while any region is pending.
    MarkResolved,
}

impl ResolveAction {
    /// The action matching a per-side verdict.
    pub fn decide(region: RegionId, side: Side, verdict: Verdict) -> Self {
        match (side, verdict) {
            (Side::Ours, Verdict::Accept) => Self::AcceptOurs(region),
            (Side::Ours, Verdict::Ignore) => Self::IgnoreOurs(region),
            (Side::Theirs, Verdict::Accept) => Self::AcceptTheirs(region),
            (Side::Theirs, Verdict::Ignore) => Self::IgnoreTheirs(region),
        }
    }

    /// The region this action targets, if any.
    pub fn region(&self) -> Option<RegionId> {
        match self {
            Self::AcceptOurs(id)
            | Self::IgnoreOurs(id)
            | Self::AcceptTheirs(id)
            | Self::IgnoreTheirs(id)
            | Self::AcceptBoth(id)
            | Self::Revert(id, _) => Some(*id),
            Self::MarkResolved => None,
        }
    }
}

/// What an applied action produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// A region's decisions after the action.
    Updated {
        region: RegionId,
        ours: Option<Decision>,
        theirs: Option<Decision>,
        file_resolved: bool,
    },
    /// The file is fully decided; carries the merged text.
    Resolved(Text),
}

/// Stateless resolution operations over a [`ConflictSet`].
pub struct ConflictResolver;

impl ConflictResolver {
    /// Apply `action` to `set`.
    ///
    /// On error the set is left exactly as it was.
    pub fn apply(set: &mut ConflictSet, action: &ResolveAction) -> Result<ActionOutcome, MergeError> {
        debug!(?action, "applying resolve action");
        match *action {
            ResolveAction::AcceptOurs(id) => Self::set(set, id, &[(Side::Ours, Decision::Accepted)]),
            ResolveAction::IgnoreOurs(id) => Self::set(set, id, &[(Side::Ours, Decision::Ignored)]),
            ResolveAction::AcceptTheirs(id) => {
                Self::set(set, id, &[(Side::Theirs, Decision::Accepted)])
            }
            ResolveAction::IgnoreTheirs(id) => {
                Self::set(set, id, &[(Side::Theirs, Decision::Ignored)])
            }
            ResolveAction::AcceptBoth(id) => Self::set(
                set,
                id,
                &[
                    (Side::Ours, Decision::Accepted),
                    (Side::Theirs, Decision::Accepted),
                ],
            ),
            ResolveAction::Revert(id, side) => Self::set(set, id, &[(side, Decision::Undecided)]),
            ResolveAction::MarkResolved => Self::mark_resolved(set).map(ActionOutcome::Resolved),
        }
    }

    /// Check that every region is decided and render the merged text.
    pub fn mark_resolved(set: &ConflictSet) -> Result<Text, MergeError> {
        let pending = set.pending_regions();
        if !pending.is_empty() {
            debug!(pending = pending.len(), "mark resolved rejected");
            return Err(MergeError::IncompleteResolution(pending));
        }
        let merged = MergeApplier::apply(set)?;
        info!(
            regions = set.regions().len(),
            lines = merged.len(),
            "conflict set resolved"
        );
        Ok(merged)
    }

    /// Set several sides atomically: every side is validated before any write.
    fn set(
        set: &mut ConflictSet,
        id: RegionId,
        changes: &[(Side, Decision)],
    ) -> Result<ActionOutcome, MergeError> {
        let region = set.region(id)?;
        for &(side, _) in changes {
            if region.side(side).is_none() {
                return Err(MergeError::NoSuchSide { region: id, side });
            }
        }

        let region = set.region_mut(id)?;
        for &(side, decision) in changes {
            region.set_decision(side, decision)?;
        }
        let ours = region.decision(Side::Ours);
        let theirs = region.decision(Side::Theirs);

        Ok(ActionOutcome::Updated {
            region: id,
            ours,
            theirs,
            file_resolved: set.is_resolved(),
        })
    }
}
