use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::ai::algorithms::TRAINING_STATE_FILE;
use crate::ai::TrainableAgent;
use crate::checkpoint::metadata::{CheckpointMetadata, CheckpointMetrics};
use crate::error::CheckpointError;

const METADATA_FILE: &str = "metadata.json";
const LATEST_LINK: &str = "latest";

/// Configuration for the checkpoint manager.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CheckpointManagerConfig {
    pub checkpoint_dir: PathBuf,
    pub keep_last_n: usize,
}

impl Default for CheckpointManagerConfig {
    fn default() -> Self {
        CheckpointManagerConfig {
            checkpoint_dir: PathBuf::from("checkpoints"),
            keep_last_n: 5,
        }
    }
}

/// A checkpoint read back from disk. Weights stay on disk; pass `path` to
/// `DqnAgent::from_checkpoint` to restore them.
#[derive(Debug)]
pub struct CheckpointData {
    pub path: PathBuf,
    pub metadata: CheckpointMetadata,
    pub training_state_json: String,
}

/// Manages saving, loading, listing, and pruning checkpoints.
pub struct CheckpointManager {
    config: CheckpointManagerConfig,
}

impl CheckpointManager {
    pub fn new(config: CheckpointManagerConfig) -> Self {
        CheckpointManager { config }
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.config.checkpoint_dir
    }

    /// Write a checkpoint for `tick`, point `latest` at it and prune.
    ///
    /// Files go to `checkpoint_{tick}.tmp` first and the directory is
    /// renamed into place once complete.
    pub fn save_agent_checkpoint(
        &self,
        agent: &dyn TrainableAgent,
        metrics: &CheckpointMetrics,
        tick: u64,
    ) -> Result<PathBuf, CheckpointError> {
        let dir_name = format!("checkpoint_{:09}", tick);
        let tmp_dir = self.config.checkpoint_dir.join(format!("{}.tmp", dir_name));
        let final_dir = self.config.checkpoint_dir.join(&dir_name);

        fs::create_dir_all(&tmp_dir)?;

        agent.save_weights_to_dir(&tmp_dir)?;
        fs::write(tmp_dir.join(TRAINING_STATE_FILE), agent.training_state_json()?)?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let metadata = agent.build_checkpoint_metadata(metrics, tick, timestamp);
        fs::write(
            tmp_dir.join(METADATA_FILE),
            serde_json::to_string_pretty(&metadata)?,
        )?;

        if final_dir.exists() {
            fs::remove_dir_all(&final_dir)?;
        }
        fs::rename(&tmp_dir, &final_dir)?;

        self.update_latest_link(&dir_name)?;
        self.prune_old_checkpoints()?;

        tracing::info!(path = %final_dir.display(), tick, "checkpoint saved");
        Ok(final_dir)
    }

    /// Read metadata and training state from a checkpoint directory.
    pub fn load(&self, dir: &Path) -> Result<CheckpointData, CheckpointError> {
        if !dir.is_dir() {
            return Err(CheckpointError::DirNotFound(dir.to_path_buf()));
        }
        let metadata = read_metadata(&dir.join(METADATA_FILE))?;

        let ts_path = dir.join(TRAINING_STATE_FILE);
        let training_state_json =
            fs::read_to_string(&ts_path).map_err(|e| CheckpointError::MetadataRead {
                path: ts_path,
                source: e,
            })?;

        Ok(CheckpointData {
            path: dir.to_path_buf(),
            metadata,
            training_state_json,
        })
    }

    /// Load the checkpoint the `latest` link points at.
    pub fn load_latest(&self) -> Result<CheckpointData, CheckpointError> {
        let target = self.latest_dir()?;
        self.load(&target)
    }

    /// Directory the `latest` link resolves to.
    pub fn latest_dir(&self) -> Result<PathBuf, CheckpointError> {
        let link = self.config.checkpoint_dir.join(LATEST_LINK);
        if link.symlink_metadata().is_err() {
            return Err(CheckpointError::NoLatestSymlink(
                self.config.checkpoint_dir.clone(),
            ));
        }
        let resolved = read_latest_link(&link)?;
        Ok(if resolved.is_relative() {
            self.config.checkpoint_dir.join(resolved)
        } else {
            resolved
        })
    }

    /// All complete checkpoints, sorted by tick (ascending).
    pub fn list_checkpoints(
        &self,
    ) -> Result<Vec<(PathBuf, CheckpointMetadata)>, CheckpointError> {
        if !self.config.checkpoint_dir.is_dir() {
            return Err(CheckpointError::DirNotFound(
                self.config.checkpoint_dir.clone(),
            ));
        }
        let mut results = Vec::new();
        for entry in fs::read_dir(&self.config.checkpoint_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() || entry.file_type()?.is_symlink() {
                continue;
            }
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if !name_str.starts_with("checkpoint_") || name_str.ends_with(".tmp") {
                continue;
            }
            let meta_path = path.join(METADATA_FILE);
            if meta_path.exists() {
                let metadata = read_metadata(&meta_path)?;
                results.push((path, metadata));
            }
        }
        results.sort_by_key(|(_, m)| m.tick);
        Ok(results)
    }

    /// Delete all but the newest `keep_last_n` checkpoints.
    fn prune_old_checkpoints(&self) -> Result<(), CheckpointError> {
        let checkpoints = self.list_checkpoints()?;
        let excess = checkpoints.len().saturating_sub(self.config.keep_last_n);
        for (path, meta) in checkpoints.iter().take(excess) {
            tracing::debug!(path = %path.display(), tick = meta.tick, "pruning checkpoint");
            fs::remove_dir_all(path)?;
        }
        Ok(())
    }

    fn update_latest_link(&self, dir_name: &str) -> Result<(), CheckpointError> {
        let link_path = self.config.checkpoint_dir.join(LATEST_LINK);
        if link_path.symlink_metadata().is_ok() {
            fs::remove_file(&link_path)?;
        }
        write_latest_link(dir_name, &link_path)?;
        Ok(())
    }
}

fn read_metadata(path: &Path) -> Result<CheckpointMetadata, CheckpointError> {
    let json = fs::read_to_string(path).map_err(|e| CheckpointError::MetadataRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&json).map_err(|e| CheckpointError::MetadataParse {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(unix)]
fn write_latest_link(dir_name: &str, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(dir_name, link)
}

#[cfg(unix)]
fn read_latest_link(link: &Path) -> std::io::Result<PathBuf> {
    fs::read_link(link)
}

// Without symlinks `latest` is a file holding the directory name.
#[cfg(not(unix))]
fn write_latest_link(dir_name: &str, link: &Path) -> std::io::Result<()> {
    fs::write(link, dir_name)
}

#[cfg(not(unix))]
fn read_latest_link(link: &Path) -> std::io::Result<PathBuf> {
    Ok(PathBuf::from(fs::read_to_string(link)?.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{DqnAgent, DqnConfig};
    use crate::ai::networks::parameter_snapshot;
    use crate::engine::testing::{MockModel, MockSim, MockStep, TEST_ACTIONS};
    use burn::backend::{Autodiff, NdArray};
    use burn::module::AutodiffModule;

    type TestAgent = DqnAgent<Autodiff<NdArray<f32>>, MockStep, MockModel>;

    fn agent() -> TestAgent {
        let config = DqnConfig {
            batch_size: 2,
            replay_capacity: 16,
            hidden_size: 8,
            action_num: TEST_ACTIONS,
            symmetry_factor: 2,
            ..Default::default()
        };
        DqnAgent::new(config, MockModel::new(), Default::default())
            .unwrap()
            .with_seed(1)
    }

    fn manager(dir: &Path, keep_last_n: usize) -> CheckpointManager {
        CheckpointManager::new(CheckpointManagerConfig {
            checkpoint_dir: dir.to_path_buf(),
            keep_last_n,
        })
    }

    fn test_metrics() -> CheckpointMetrics {
        CheckpointMetrics {
            average_loss: 0.05,
            average_reward: 2.0,
            epsilon: 0.5,
            steps_done: 100,
            optimize_steps: 90,
            replay_finalized: 99,
        }
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 5);
        let mut agent = agent();
        let mut sim = MockSim::new();
        for _ in 0..4 {
            agent.tick(&mut sim).unwrap();
        }

        let path = manager
            .save_agent_checkpoint(&agent, &test_metrics(), 1000)
            .unwrap();
        assert!(path.ends_with("checkpoint_000001000"));
        assert!(path.join(METADATA_FILE).exists());
        assert!(path.join(TRAINING_STATE_FILE).exists());
        assert!(path.join("policy_network.mpk").exists());
        assert!(!dir.path().join("checkpoint_000001000.tmp").exists());

        let data = manager.load(&path).unwrap();
        assert_eq!(data.metadata.tick, 1000);
        assert_eq!(data.metadata.algorithm, "DQN");
        assert_eq!(data.metadata.metrics, test_metrics());

        let restored = TestAgent::from_checkpoint(
            agent.config().clone(),
            MockModel::new(),
            &data.path,
            Default::default(),
        )
        .unwrap();
        assert_eq!(restored.steps_done(), agent.steps_done());
        assert_eq!(
            parameter_snapshot(&restored.networks().policy.valid()),
            parameter_snapshot(&agent.networks().policy.valid())
        );
        assert_eq!(
            parameter_snapshot(restored.networks().target()),
            parameter_snapshot(&agent.networks().policy.valid())
        );
    }

    #[test]
    fn test_latest_link_follows_newest() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 5);
        let agent = agent();

        manager.save_agent_checkpoint(&agent, &test_metrics(), 1000).unwrap();
        manager.save_agent_checkpoint(&agent, &test_metrics(), 2000).unwrap();

        let latest = manager.load_latest().unwrap();
        assert_eq!(latest.metadata.tick, 2000);
    }

    #[test]
    fn test_list_checkpoints_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 10);
        let agent = agent();

        for tick in [3000, 1000, 2000] {
            manager.save_agent_checkpoint(&agent, &test_metrics(), tick).unwrap();
        }

        let ticks: Vec<u64> = manager
            .list_checkpoints()
            .unwrap()
            .iter()
            .map(|(_, m)| m.tick)
            .collect();
        assert_eq!(ticks, vec![1000, 2000, 3000]);
    }

    #[test]
    fn test_pruning_keeps_last_n() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 2);
        let agent = agent();

        for tick in 1..=5 {
            manager.save_agent_checkpoint(&agent, &test_metrics(), tick * 100).unwrap();
        }

        let ticks: Vec<u64> = manager
            .list_checkpoints()
            .unwrap()
            .iter()
            .map(|(_, m)| m.tick)
            .collect();
        assert_eq!(ticks, vec![400, 500]);
        assert_eq!(manager.load_latest().unwrap().metadata.tick, 500);
    }

    #[test]
    fn test_load_latest_no_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 5);

        let err = manager.load_latest().unwrap_err();
        assert!(
            matches!(err, CheckpointError::NoLatestSymlink(_)),
            "expected NoLatestSymlink, got: {err}"
        );
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir.path().join("absent"), 5);
        assert!(matches!(
            manager.list_checkpoints(),
            Err(CheckpointError::DirNotFound(_))
        ));
        assert!(matches!(
            manager.load(&dir.path().join("absent/checkpoint_000000001")),
            Err(CheckpointError::DirNotFound(_))
        ));
    }

    #[test]
    fn test_corrupt_metadata_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), 5);
        let ckpt = dir.path().join("checkpoint_000000007");
        fs::create_dir_all(&ckpt).unwrap();
        fs::write(ckpt.join(METADATA_FILE), "{ not json").unwrap();

        assert!(matches!(
            manager.load(&ckpt),
            Err(CheckpointError::MetadataParse { .. })
        ));
    }
}
