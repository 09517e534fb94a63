//! Roster state and snapshot persistence
//!
//! The store is the single owner of the roster. Every read and write goes
//! through its methods; the session tasks and the periodic re-send task
//! never hold a reference into the map itself, so a reader can never
//! observe a half-applied mutation. Snapshots are rewritten in place after
//! every accepted change and are the source of truth across restarts.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tokio::sync::{Mutex, RwLock};

use crate::error::Result;
use crate::roster::player::{default_roster, Player};

/// Owns the in-memory roster and its durable snapshot
pub struct RosterStore {
    players: RwLock<BTreeMap<u32, Player>>,
    path: PathBuf,
    allow_revive: bool,
    /// Serializes snapshot writes so rapid mutations never interleave
    /// partial file contents
    save_guard: Mutex<()>,
}

impl RosterStore {
    /// Load the roster from `path`, or create the default one
    ///
    /// A missing snapshot yields a fresh all-alive roster of
    /// `default_count` players. A malformed snapshot is preserved as
    /// `<path>.malformed` and likewise replaced by the default roster. In
    /// every case the resulting roster is written back immediately.
    pub async fn open(
        path: impl Into<PathBuf>,
        default_count: u32,
        allow_revive: bool,
    ) -> Result<Self> {
        let path = path.into();

        let players = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<BTreeMap<u32, Player>>(&bytes) {
                Ok(players) => {
                    tracing::info!(
                        path = %path.display(),
                        players = players.len(),
                        "Loaded existing roster snapshot"
                    );
                    players
                }
                Err(e) => {
                    let preserved = malformed_path(&path);
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        preserved = %preserved.display(),
                        "Roster snapshot is malformed, starting from default roster"
                    );
                    if let Err(e) = tokio::fs::rename(&path, &preserved).await {
                        tracing::error!(
                            path = %path.display(),
                            error = %e,
                            "Failed to preserve malformed snapshot"
                        );
                    }
                    default_roster(default_count)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    path = %path.display(),
                    players = default_count,
                    "No roster snapshot, generating default roster"
                );
                default_roster(default_count)
            }
            Err(e) => return Err(e.into()),
        };

        let store = Self {
            players: RwLock::new(players),
            path,
            allow_revive,
            save_guard: Mutex::new(()),
        };
        store.save().await?;
        Ok(store)
    }

    /// Whether revive requests are honored
    pub fn allow_revive(&self) -> bool {
        self.allow_revive
    }

    /// Persist the full roster, truncate-and-rewrite
    ///
    /// Keys serialize as strings in ascending numeric order, so consecutive
    /// saves of the same state are byte-identical.
    pub async fn save(&self) -> Result<()> {
        let _guard = self.save_guard.lock().await;
        let rendered = {
            let players = self.players.read().await;
            serde_json::to_string_pretty(&*players)?
        };
        tokio::fs::write(&self.path, rendered).await?;
        Ok(())
    }

    /// Flip one player's liveness flag
    ///
    /// Reviving while revival is disallowed is a logged no-op, as is an
    /// unknown player number; neither aborts anything.
    pub async fn set_liveness(&self, number: u32, alive: bool) {
        if alive && !self.allow_revive {
            tracing::warn!(number, "Ignoring revive request, revival is disabled");
            return;
        }

        let mut players = self.players.write().await;
        match players.get_mut(&number) {
            Some(player) => {
                player.is_alive = alive;
                tracing::info!(
                    number,
                    "Player {}",
                    if alive { "revived" } else { "eliminated" }
                );
            }
            None => tracing::error!(number, "Unknown player number"),
        }
    }

    /// Numbers of all dead players, ascending
    pub async fn dead_ids(&self) -> BTreeSet<u32> {
        let players = self.players.read().await;
        players
            .values()
            .filter(|p| !p.is_alive)
            .map(|p| p.number)
            .collect()
    }

    /// Clone of the current roster, for inspection
    pub async fn players(&self) -> BTreeMap<u32, Player> {
        self.players.read().await.clone()
    }

    /// Full-roster event for initial sync of a new viewer
    pub async fn snapshot_event(&self) -> String {
        let players = self.players.read().await;
        serde_json::json!({
            "type": "initial_data",
            "players": &*players,
        })
        .to_string()
    }

    /// Compact liveness map event, broadcast after every change
    pub async fn update_event(&self) -> String {
        let players = self.players.read().await;
        let alive: BTreeMap<u32, u8> = players
            .values()
            .map(|p| (p.number, u8::from(p.is_alive)))
            .collect();
        serde_json::json!({
            "type": "update",
            "alive": alive,
        })
        .to_string()
    }

    /// Rewrite liveness wholesale: everyone dead except the listed numbers
    ///
    /// Used when seeding a roster from a list of survivors. Listed numbers
    /// with no roster slot are logged and skipped.
    pub async fn reseed(&self, alive_ids: &BTreeSet<u32>) -> Result<()> {
        {
            let mut players = self.players.write().await;
            for player in players.values_mut() {
                player.is_alive = alive_ids.contains(&player.number);
            }
            for id in alive_ids {
                if !players.contains_key(id) {
                    tracing::warn!(number = *id, "Survivor id has no roster slot");
                }
            }
        }
        self.save().await
    }
}

fn malformed_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".malformed");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("state.json")
    }

    #[tokio::test]
    async fn test_open_without_snapshot_creates_default_roster() {
        let dir = tempfile::tempdir().unwrap();
        let path = snapshot_path(&dir);

        let store = RosterStore::open(&path, 5, false).await.unwrap();
        let players = store.players().await;
        assert_eq!(players.len(), 5);
        assert!(players.values().all(|p| p.is_alive));
        // The snapshot is written back immediately.
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = snapshot_path(&dir);

        let store = RosterStore::open(&path, 7, false).await.unwrap();
        store.set_liveness(2, false).await;
        store.set_liveness(5, false).await;
        store.save().await.unwrap();
        let before = store.players().await;
        let first_bytes = std::fs::read(&path).unwrap();
        drop(store);

        let reloaded = RosterStore::open(&path, 7, false).await.unwrap();
        assert_eq!(reloaded.players().await, before);
        // Re-saving the same state reproduces the same bytes.
        assert_eq!(std::fs::read(&path).unwrap(), first_bytes);
    }

    #[tokio::test]
    async fn test_malformed_snapshot_falls_back_and_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = snapshot_path(&dir);
        std::fs::write(&path, "{ not json").unwrap();

        let store = RosterStore::open(&path, 10, false).await.unwrap();
        let players = store.players().await;
        assert_eq!(players.len(), 10);
        assert!(players.values().all(|p| p.is_alive));

        let preserved = dir.path().join("state.json.malformed");
        assert_eq!(std::fs::read_to_string(preserved).unwrap(), "{ not json");
    }

    #[tokio::test]
    async fn test_revive_is_gated() {
        let dir = tempfile::tempdir().unwrap();
        let store = RosterStore::open(snapshot_path(&dir), 5, false)
            .await
            .unwrap();

        assert!(!store.allow_revive());
        store.set_liveness(3, false).await;
        store.set_liveness(3, true).await; // ignored
        assert!(!store.players().await[&3].is_alive);

        // Reviving an already-alive player is equally a no-op.
        store.set_liveness(1, true).await;
        assert!(store.players().await[&1].is_alive);
    }

    #[tokio::test]
    async fn test_revive_allowed_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let store = RosterStore::open(snapshot_path(&dir), 5, true)
            .await
            .unwrap();

        assert!(store.allow_revive());
        store.set_liveness(3, false).await;
        store.set_liveness(3, true).await;
        assert!(store.players().await[&3].is_alive);
    }

    #[tokio::test]
    async fn test_unknown_number_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = RosterStore::open(snapshot_path(&dir), 5, false)
            .await
            .unwrap();

        let before = store.players().await;
        store.set_liveness(99, false).await;
        assert_eq!(store.players().await, before);
    }

    #[tokio::test]
    async fn test_dead_ids_and_update_event() {
        let dir = tempfile::tempdir().unwrap();
        let store = RosterStore::open(snapshot_path(&dir), 5, false)
            .await
            .unwrap();

        store.set_liveness(2, false).await;
        store.set_liveness(4, false).await;

        let dead: Vec<u32> = store.dead_ids().await.into_iter().collect();
        assert_eq!(dead, vec![2, 4]);

        let event: serde_json::Value =
            serde_json::from_str(&store.update_event().await).unwrap();
        assert_eq!(event["type"], "update");
        assert_eq!(
            event["alive"],
            serde_json::json!({ "1": 1, "2": 0, "3": 1, "4": 0, "5": 1 })
        );
    }

    #[tokio::test]
    async fn test_snapshot_event_shape() {
        let dir = tempfile::tempdir().unwrap();
        let store = RosterStore::open(snapshot_path(&dir), 2, false)
            .await
            .unwrap();
        store.set_liveness(2, false).await;

        let event: serde_json::Value =
            serde_json::from_str(&store.snapshot_event().await).unwrap();
        assert_eq!(event["type"], "initial_data");
        assert_eq!(event["players"]["1"]["is_alive"], true);
        assert_eq!(event["players"]["2"]["is_alive"], false);
        assert_eq!(event["players"]["2"]["number"], 2);
    }

    #[tokio::test]
    async fn test_rapid_mutations_keep_snapshot_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let path = snapshot_path(&dir);
        let store = RosterStore::open(&path, 5, false).await.unwrap();

        let first = async {
            store.set_liveness(2, false).await;
            store.save().await.unwrap();
        };
        let second = async {
            store.set_liveness(2, false).await;
            store.save().await.unwrap();
        };
        tokio::join!(first, second);

        let reloaded = RosterStore::open(&path, 5, false).await.unwrap();
        assert!(!reloaded.players().await[&2].is_alive);
        assert_eq!(reloaded.players().await.len(), 5);
    }

    #[tokio::test]
    async fn test_reseed_from_survivor_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = RosterStore::open(snapshot_path(&dir), 5, false)
            .await
            .unwrap();

        let survivors: BTreeSet<u32> = [1, 4].into_iter().collect();
        store.reseed(&survivors).await.unwrap();

        let dead: Vec<u32> = store.dead_ids().await.into_iter().collect();
        assert_eq!(dead, vec![2, 3, 5]);
    }
}
