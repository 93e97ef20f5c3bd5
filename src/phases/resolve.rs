//! Phase 3: Resolution
//!
//! Pairs every declared submodule with the commit the parent tree records
//! for it and the latest commit on its tracked branch. Nothing in this
//! phase fails the run: an unreadable binding becomes
//! [`RecordedCommit::Unknown`], and an upstream that cannot be resolved
//! leaves the submodule marked as not needing an update.

use std::collections::HashMap;

use log::{debug, warn};

use super::{RecordedCommit, ResolvedSubmodule, SubmoduleRecord};
use crate::defaults;
use crate::driver::VersionControl;
use crate::remote::{RemoteCommitResolver, RemoteSlug};

/// Execute Phase 3: resolve recorded and upstream commits.
pub fn execute(
    records: &[SubmoduleRecord],
    driver: &dyn VersionControl,
    resolver: &dyn RemoteCommitResolver,
) -> Vec<ResolvedSubmodule> {
    let recorded = capture_recorded(records, driver);

    let mut default_branches = HashMap::new();
    records
        .iter()
        .zip(recorded)
        .map(|(record, recorded)| {
            let (upstream, tracked_branch) =
                resolve_upstream(record, resolver, &mut default_branches);
            let resolved = ResolvedSubmodule {
                record: record.clone(),
                recorded,
                upstream,
                tracked_branch,
            };
            debug!(
                "{}: recorded {}, upstream {}, update required: {}",
                record.path,
                resolved.recorded,
                resolved.upstream_commit(),
                resolved.update_required()
            );
            resolved
        })
        .collect()
}

/// Reads the recorded commit of every submodule.
pub fn capture_recorded(
    records: &[SubmoduleRecord],
    driver: &dyn VersionControl,
) -> Vec<RecordedCommit> {
    records
        .iter()
        .map(|record| match driver.recorded_commit(&record.path) {
            Ok(commit) => RecordedCommit::Known(commit),
            Err(e) => {
                warn!("{}", e);
                RecordedCommit::Unknown
            }
        })
        .collect()
}

/// Returns the upstream tip and the branch it was read from.
fn resolve_upstream(
    record: &SubmoduleRecord,
    resolver: &dyn RemoteCommitResolver,
    default_branches: &mut HashMap<RemoteSlug, String>,
) -> (Option<String>, Option<String>) {
    let Some(slug) = RemoteSlug::parse(&record.url) else {
        debug!(
            "{}: {} is not a recognizable owner/repo URL; skipping",
            record.path, record.url
        );
        return (None, None);
    };

    let branch = match &record.declared_branch {
        Some(branch) => branch.clone(),
        None => default_branches
            .entry(slug.clone())
            .or_insert_with(|| match resolver.default_branch(&slug) {
                Ok(branch) => branch,
                Err(e) => {
                    warn!(
                        "{}; assuming '{}'",
                        e,
                        defaults::DEFAULT_BRANCH
                    );
                    defaults::DEFAULT_BRANCH.to_string()
                }
            })
            .clone(),
    };

    match resolver.latest_commit(&slug, &branch) {
        Ok(commit) => (Some(commit), Some(branch)),
        Err(e) => {
            warn!("{}: {}", record.path, e);
            (None, Some(branch))
        }
    }
}
