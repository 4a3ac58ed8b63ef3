//! Expansion of classified targets into resolution jobs.

use std::fmt;

use crate::api::Listing;
use crate::config::ListingMode;
use crate::dedup::{live_scope, SINGLE_SCOPE};
use crate::link::{ResolutionTarget, TargetKind};

/// One unit of resolution work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// A single item lookup.
    Single { item_id: String },
    /// A live room snapshot.
    Live { room_id: String },
    /// A paginated listing.
    Listing(Listing),
    /// Every collection on a profile, each paginated in turn.
    UserMixes { sec_uid: String },
}

impl Job {
    /// Ledger scope the job's items are recorded under.
    pub fn scope(&self) -> String {
        match self {
            Job::Single { .. } => SINGLE_SCOPE.to_string(),
            Job::Live { room_id } => live_scope(room_id),
            Job::Listing(listing) => listing.scope(),
            Job::UserMixes { sec_uid } => format!("mixes:{}", sec_uid),
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Job::Single { item_id } => write!(f, "item {}", item_id),
            Job::Live { room_id } => write!(f, "live {}", room_id),
            Job::Listing(listing) => write!(f, "{}", listing),
            Job::UserMixes { sec_uid } => write!(f, "collections of {}", sec_uid),
        }
    }
}

/// Jobs for a target. Profiles get one job per selected mode, in order.
pub fn plan_jobs(target: &ResolutionTarget, modes: &[ListingMode]) -> Vec<Job> {
    let id = target.upstream_id.clone();
    match target.kind {
        TargetKind::SingleItem => vec![Job::Single { item_id: id }],
        TargetKind::LiveRoom => vec![Job::Live { room_id: id }],
        TargetKind::Collection => vec![Job::Listing(Listing::Collection { mix_id: id })],
        TargetKind::MusicPage => vec![Job::Listing(Listing::Music { music_id: id })],
        TargetKind::UserProfile => {
            let mut jobs = Vec::new();
            for mode in modes {
                let job = match mode {
                    ListingMode::Post => Job::Listing(Listing::UserPosts {
                        sec_uid: id.clone(),
                    }),
                    ListingMode::Like => Job::Listing(Listing::UserLikes {
                        sec_uid: id.clone(),
                    }),
                    ListingMode::Mix => Job::UserMixes {
                        sec_uid: id.clone(),
                    },
                    ListingMode::Music => {
                        tracing::warn!("Mode 'music' does not apply to user profiles, ignoring");
                        continue;
                    }
                };
                if !jobs.contains(&job) {
                    jobs.push(job);
                }
            }
            jobs
        }
    }
}
