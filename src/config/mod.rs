//! Configuration for world files and the clustering engine

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::generate::{self, Densities};
use crate::grid::Grid;

fn default_chunk_timeout_secs() -> u64 {
    30
}

fn default_fallback() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Tuning for parallel cluster builds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Chunk task count; available parallelism when omitted.
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default = "default_chunk_timeout_secs")]
    pub chunk_timeout_secs: u64,
    /// Retry a failed parallel build as one sequential pass.
    #[serde(default = "default_fallback")]
    pub fallback_to_sequential: bool,
}

impl ClusterConfig {
    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            workers: None,
            chunk_timeout_secs: default_chunk_timeout_secs(),
            fallback_to_sequential: default_fallback(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateConfig {
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    #[serde(default)]
    pub densities: Densities,
}

/// A world description: where the tiles come from and how to cluster them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldFile {
    pub name: String,
    pub tile_set_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub clustering: ClusterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// ASCII rows, see [`crate::layout`].
    #[serde(default)]
    pub layout: Option<Vec<String>>,
    #[serde(default)]
    pub generate: Option<GenerateConfig>,
}

impl WorldFile {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let world: WorldFile = serde_yaml::from_str(text).context("invalid world file")?;
        world.validate()?;
        Ok(world)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tile_set_id.trim().is_empty() {
            bail!("world '{}' must define a tile_set_id", self.name);
        }
        match (&self.layout, &self.generate) {
            (Some(_), Some(_)) => bail!(
                "world '{}' defines both layout and generate; pick one",
                self.name
            ),
            (None, None) => bail!("world '{}' defines neither layout nor generate", self.name),
            (None, Some(generated)) if generated.width == 0 || generated.height == 0 => {
                bail!("world '{}' has an empty generated grid", self.name)
            }
            _ => Ok(()),
        }
    }

    pub fn build_grid(&self) -> Result<Grid> {
        if let Some(rows) = &self.layout {
            return Grid::from_rows(rows.as_slice())
                .with_context(|| format!("invalid layout in world '{}'", self.name));
        }
        match &self.generate {
            Some(generated) => Ok(generate::scatter(
                generated.width,
                generated.height,
                generated.seed,
                &generated.densities,
            )),
            None => bail!("world '{}' has no grid source", self.name),
        }
    }
}

pub struct WorldLoader {
    base_dir: PathBuf,
}

impl WorldLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<WorldFile> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read world file {}", path.display()))?;
        WorldFile::from_yaml(&data).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALLEY: &str = r#"
name: valley
tile_set_id: valley-01
clustering:
  workers: 2
layout:
  - "..TT"
  - "~~.."
"#;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let world = WorldFile::from_yaml(VALLEY).unwrap();
        assert_eq!(world.clustering.workers, Some(2));
        assert_eq!(world.clustering.chunk_timeout_secs, 30);
        assert!(world.clustering.fallback_to_sequential);
        assert_eq!(world.logging.level, "info");
        assert_eq!(world.build_grid().unwrap().width(), 4);
    }

    #[test]
    fn test_yaml_round_trip() {
        let world = WorldFile::from_yaml(VALLEY).unwrap();
        let again = WorldFile::from_yaml(&world.to_yaml().unwrap()).unwrap();
        assert_eq!(world, again);
    }

    #[test]
    fn test_requires_exactly_one_grid_source() {
        let neither = "name: x\ntile_set_id: x\n";
        assert!(WorldFile::from_yaml(neither).is_err());

        let both = "name: x\ntile_set_id: x\nlayout: ['.']\ngenerate: {width: 2, height: 2, seed: 1}\n";
        assert!(WorldFile::from_yaml(both).is_err());
    }

    #[test]
    fn test_generated_world_has_requested_size() {
        let text = "name: g\ntile_set_id: g\ngenerate: {width: 24, height: 12, seed: 9}\n";
        let grid = WorldFile::from_yaml(text).unwrap().build_grid().unwrap();
        assert_eq!((grid.width(), grid.height()), (24, 12));
    }

    #[test]
    fn test_loader_reports_missing_file() {
        let loader = WorldLoader::new(std::env::temp_dir());
        let err = loader.load("definitely_missing_world.yaml").unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read world file"));
    }
}
