//! Conflict detection and resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tally_core::{EntityType, Record, RecordId, SyncableRecord};

/// A divergence between a locally dirty record and the server's version.
///
/// Conflicts are transient: one is created during a download pass and
/// consumed within the same sync attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Local dirty version.
    pub local: Record,
    /// Version downloaded from the server.
    pub remote: Record,
    /// When the divergence was found.
    pub detected_at: DateTime<Utc>,
}

impl Conflict {
    /// Creates a new conflict.
    pub fn new(local: Record, remote: Record) -> Self {
        Self {
            local,
            remote,
            detected_at: Utc::now(),
        }
    }

    /// Returns the local client ID of the conflicting record.
    #[must_use]
    pub fn record_id(&self) -> RecordId {
        self.local.id()
    }

    /// Returns the entity type.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        self.local.entity_type()
    }

    /// Returns true if both sides edited live content.
    #[must_use]
    pub fn is_update_conflict(&self) -> bool {
        !self.local.is_deleted() && !self.remote.is_deleted()
    }

    /// Returns true if exactly one side deleted the record.
    #[must_use]
    pub fn is_update_delete_conflict(&self) -> bool {
        self.local.is_deleted() != self.remote.is_deleted()
    }

    /// Returns the side with the later `updated_at`; ties go to the server.
    #[must_use]
    pub fn last_writer(&self) -> &Record {
        if self.local.meta().updated_at > self.remote.meta().updated_at {
            &self.local
        } else {
            &self.remote
        }
    }
}

/// Resolution for a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Keep the local version and push it to the server.
    KeepLocal,
    /// Accept the server version.
    AcceptRemote,
    /// Combine both versions and push the result.
    Merge,
    /// Leave unresolved.
    Skip,
}

impl ConflictResolution {
    /// Returns true if this resolution settles the conflict.
    #[must_use]
    pub fn settles(&self) -> bool {
        !matches!(self, ConflictResolution::Skip)
    }

    /// Returns true if the server must receive a new version.
    #[must_use]
    pub fn pushes_to_server(&self) -> bool {
        matches!(self, ConflictResolution::KeepLocal | ConflictResolution::Merge)
    }
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictResolution::KeepLocal => "keep_local",
            ConflictResolution::AcceptRemote => "accept_remote",
            ConflictResolution::Merge => "merge",
            ConflictResolution::Skip => "skip",
        })
    }
}

impl FromStr for ConflictResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep_local" | "local" => Ok(ConflictResolution::KeepLocal),
            "accept_remote" | "remote" => Ok(ConflictResolution::AcceptRemote),
            "merge" => Ok(ConflictResolution::Merge),
            "skip" => Ok(ConflictResolution::Skip),
            other => Err(format!("unknown conflict resolution: {other}")),
        }
    }
}

/// Policy for automatic conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Server always wins.
    #[default]
    ServerWins,
    /// Client always wins; the local version is pushed.
    ClientWins,
    /// Versions are merged and the result pushed.
    Merge,
    /// Conflicts are queued for out-of-band resolution.
    Manual,
}

impl ConflictPolicy {
    /// Returns true if this policy automatically resolves conflicts.
    #[must_use]
    pub fn auto_resolves(&self) -> bool {
        !matches!(self, ConflictPolicy::Manual)
    }

    /// Returns the resolution this policy applies to every conflict.
    #[must_use]
    pub fn resolution(&self) -> ConflictResolution {
        match self {
            ConflictPolicy::ServerWins => ConflictResolution::AcceptRemote,
            ConflictPolicy::ClientWins => ConflictResolution::KeepLocal,
            ConflictPolicy::Merge => ConflictResolution::Merge,
            ConflictPolicy::Manual => ConflictResolution::Skip,
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictPolicy::ServerWins => "server_wins",
            ConflictPolicy::ClientWins => "client_wins",
            ConflictPolicy::Merge => "merge",
            ConflictPolicy::Manual => "manual",
        })
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "server_wins" => Ok(ConflictPolicy::ServerWins),
            "client_wins" => Ok(ConflictPolicy::ClientWins),
            "merge" => Ok(ConflictPolicy::Merge),
            "manual" => Ok(ConflictPolicy::Manual),
            other => Err(format!("unknown conflict policy: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tally_core::{Category, CategoryKind, SyncId};

    fn pair() -> (Record, Record) {
        let local = Category::new("owner", "Groceries", CategoryKind::Expense);
        let mut remote = local.clone();
        remote.name = "Food".into();
        remote.meta.sync_id = Some(SyncId::from("srv-1"));
        (local.into(), remote.into())
    }

    #[test]
    fn conflict_types() {
        let (local, remote) = pair();
        let conflict = Conflict::new(local.clone(), remote.clone());
        assert!(conflict.is_update_conflict());
        assert!(!conflict.is_update_delete_conflict());

        let conflict = Conflict::new(local, remote.tombstoned());
        assert!(conflict.is_update_delete_conflict());
        assert!(!conflict.is_update_conflict());
    }

    #[test]
    fn last_writer_ties_go_to_server() {
        let (local, mut remote) = pair();
        remote.meta_mut().updated_at = local.meta().updated_at;
        let conflict = Conflict::new(local.clone(), remote.clone());
        assert_eq!(conflict.last_writer(), &remote);

        let mut newer_local = local;
        newer_local.meta_mut().updated_at = remote.meta().updated_at + Duration::seconds(1);
        let conflict = Conflict::new(newer_local.clone(), remote);
        assert_eq!(conflict.last_writer(), &newer_local);
    }

    #[test]
    fn policy_resolution() {
        assert_eq!(ConflictPolicy::default(), ConflictPolicy::ServerWins);
        assert_eq!(
            ConflictPolicy::ServerWins.resolution(),
            ConflictResolution::AcceptRemote
        );
        assert_eq!(
            ConflictPolicy::ClientWins.resolution(),
            ConflictResolution::KeepLocal
        );
        assert_eq!(ConflictPolicy::Merge.resolution(), ConflictResolution::Merge);
        assert_eq!(ConflictPolicy::Manual.resolution(), ConflictResolution::Skip);
        assert!(!ConflictPolicy::Manual.auto_resolves());
    }

    #[test]
    fn policy_parse() {
        for policy in [
            ConflictPolicy::ServerWins,
            ConflictPolicy::ClientWins,
            ConflictPolicy::Merge,
            ConflictPolicy::Manual,
        ] {
            assert_eq!(policy.to_string().parse::<ConflictPolicy>().unwrap(), policy);
        }
        assert_eq!(
            "client-wins".parse::<ConflictPolicy>().unwrap(),
            ConflictPolicy::ClientWins
        );
        assert!("newest".parse::<ConflictPolicy>().is_err());
    }

    #[test]
    fn resolution_flags() {
        assert!(ConflictResolution::KeepLocal.pushes_to_server());
        assert!(ConflictResolution::Merge.pushes_to_server());
        assert!(!ConflictResolution::AcceptRemote.pushes_to_server());
        assert!(!ConflictResolution::Skip.settles());
        assert_eq!(
            "remote".parse::<ConflictResolution>().unwrap(),
            ConflictResolution::AcceptRemote
        );
    }
}
