//! # Membership Index
//!
//! Snapshot of a destination's current member set, built once before target
//! processing begins and treated as read-only for the rest of the run.
//! Staleness against concurrent membership changes is an accepted tradeoff;
//! the index is never refreshed mid-run and never shared across runs.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::{ClientError, MemberRecord, PlatformClient};
use crate::orchestration::types::{normalize_identifier, Destination, Target};

/// Default member-list page size
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Safety bound on pagination: a platform that keeps returning full pages
/// must not drive the build loop forever.
pub const DEFAULT_MAX_PAGES: usize = 1000;

/// Materialized member set with O(1) lookups
#[derive(Debug, Clone)]
pub struct MembershipIndex {
    members: HashSet<String>,
    pages_fetched: usize,
    truncated: bool,
}

impl MembershipIndex {
    /// Page through the destination's member list and materialize the
    /// normalized member set.
    ///
    /// A page shorter than `page_size` (including an empty page) terminates
    /// the listing. Hitting `max_pages` stops the build with a partial
    /// snapshot, which only weakens dedup, never correctness of grants.
    pub async fn build(
        client: &Arc<dyn PlatformClient>,
        destination: &Destination,
        page_size: usize,
        max_pages: usize,
    ) -> Result<Self, ClientError> {
        let mut members = HashSet::new();
        let mut offset = 0;
        let mut pages_fetched = 0;
        let mut truncated = false;

        loop {
            let page = client.list_members(destination, offset, page_size).await?;
            pages_fetched += 1;

            if page.is_empty() {
                break;
            }

            let page_len = page.len();
            for record in page {
                members.insert(normalize_member(&record));
            }
            offset += page_len;

            debug!(
                destination = %destination.normalized,
                page = pages_fetched,
                members = members.len(),
                "Fetched member page"
            );

            if page_len < page_size {
                break;
            }
            if pages_fetched >= max_pages {
                truncated = true;
                warn!(
                    destination = %destination.normalized,
                    max_pages = max_pages,
                    "⚠️ Member listing hit the pagination bound - proceeding with partial snapshot"
                );
                break;
            }
        }

        info!(
            destination = %destination.normalized,
            members = members.len(),
            pages = pages_fetched,
            "✅ Membership index built"
        );

        Ok(Self {
            members,
            pages_fetched,
            truncated,
        })
    }

    /// Is the target already a member?
    pub fn contains(&self, target: &Target) -> bool {
        self.members.contains(&target.normalized())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of pages fetched while building
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// True when the pagination bound cut the listing short
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// Normalize one member record the same way targets are normalized:
/// lower-cased handle, or the stringified numeric id when the account has
/// no handle.
fn normalize_member(record: &MemberRecord) -> String {
    match &record.handle {
        Some(handle) => normalize_identifier(handle),
        None => record.id.to_string(),
    }
}
