//! Configuration
//!
//! A small TOML file tells the tools where SCRIP grid descriptions and
//! mapping files live:
//!
//! ```toml
//! [grids]
//! root = "/inputdata/share/meshes/homme"
//!
//! [grids.files]
//! ne30pg2 = "ne30pg2_scrip_20200209.nc"
//!
//! [maps]
//! root = "/maps"
//! cache_capacity = 8
//! ```
//!
//! Every section is optional. Missing values fall back to
//! [`RemapConfig::default`], which knows the standard E3SM pg2 grids.

use crate::cache::WeightCache;
use crate::errors::{LoadError, RemapError, RemapResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default number of weight matrices kept by a [`crate::cache::WeightCache`]
pub const DEFAULT_CACHE_CAPACITY: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemapConfig {
    pub grids: GridRegistry,
    pub maps: MapSettings,
}

/// Named SCRIP grid description files under a common root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridRegistry {
    pub root: PathBuf,
    pub files: BTreeMap<String, String>,
}

impl Default for GridRegistry {
    fn default() -> Self {
        let files = [
            ("ne30pg2", "ne30pg2_scrip_20200209.nc"),
            ("ne120pg2", "ne120pg2_scrip_20221012.nc"),
            ("ne256pg2", "ne256pg2_scrip_20221011.nc"),
            ("ne1024pg2", "ne1024pg2_scrip_20221011.nc"),
        ]
        .into_iter()
        .map(|(name, file)| (name.to_string(), file.to_string()))
        .collect();
        Self {
            root: PathBuf::from("."),
            files,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    pub root: PathBuf,
    pub cache_capacity: usize,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl Default for RemapConfig {
    fn default() -> Self {
        Self {
            grids: GridRegistry::default(),
            maps: MapSettings::default(),
        }
    }
}

impl RemapConfig {
    /// Parse a configuration from TOML text.
    ///
    /// Grid entries given in the text are added to the built-in registry,
    /// replacing built-in entries of the same name.
    pub fn from_toml_str(text: &str) -> RemapResult<Self> {
        let mut config: RemapConfig =
            toml::from_str(text).map_err(|e| RemapError::Config(e.to_string()))?;
        for (name, file) in GridRegistry::default().files {
            config.grids.files.entry(name).or_insert(file);
        }
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file.
    pub fn from_path(path: &Path) -> RemapResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> RemapResult<String> {
        toml::to_string(self).map_err(|e| RemapError::Config(e.to_string()))
    }

    fn validate(&self) -> RemapResult<()> {
        if self.maps.cache_capacity == 0 {
            return Err(RemapError::Config(
                "maps.cache_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Full path of the SCRIP description of a named grid.
    pub fn scrip_grid(&self, name: &str) -> RemapResult<PathBuf> {
        self.grids
            .files
            .get(name)
            .map(|file| self.grids.root.join(file))
            .ok_or_else(|| RemapError::UnknownGrid(name.to_string()))
    }

    /// Path of the mapping file between two grids, `map_{src}_to_{dst}_{method}.nc`.
    pub fn mapping_file(&self, src: &str, dst: &str, method: &str) -> PathBuf {
        self.maps
            .root
            .join(format!("map_{}_to_{}_{}.nc", src, dst, method))
    }

    /// An empty weight cache sized by `maps.cache_capacity`.
    pub fn weight_cache(&self) -> RemapResult<WeightCache> {
        WeightCache::new(self.maps.cache_capacity)
    }

    /// Names of every registered grid
    pub fn grid_names(&self) -> Vec<&str> {
        self.grids.files.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_knows_pg2_grids() {
        let config = RemapConfig::default();
        assert_eq!(
            config.scrip_grid("ne30pg2").unwrap(),
            PathBuf::from("./ne30pg2_scrip_20200209.nc")
        );
        assert_eq!(
            config.grid_names(),
            vec!["ne1024pg2", "ne120pg2", "ne256pg2", "ne30pg2"]
        );
        assert_eq!(config.maps.cache_capacity, DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn unknown_grid() {
        let err = RemapConfig::default().scrip_grid("ne4pg2").unwrap_err();
        assert!(matches!(err, RemapError::UnknownGrid(name) if name == "ne4pg2"));
    }

    #[test]
    fn mapping_file_name() {
        let config = RemapConfig::from_toml_str("[maps]\nroot = \"/maps\"\n").unwrap();
        assert_eq!(
            config.mapping_file("ne30pg2", "fv0.9x1.25", "nco"),
            PathBuf::from("/maps/map_ne30pg2_to_fv0.9x1.25_nco.nc")
        );
    }

    #[test]
    fn toml_entries_extend_registry() {
        let text = r#"
            [grids]
            root = "/inputdata/share/meshes/homme"

            [grids.files]
            ne30pg2 = "ne30pg2_scrip_custom.nc"
            ne4pg2 = "ne4pg2_scrip_20191204.nc"

            [maps]
            cache_capacity = 2
        "#;
        let config = RemapConfig::from_toml_str(text).unwrap();
        assert_eq!(
            config.scrip_grid("ne4pg2").unwrap(),
            PathBuf::from("/inputdata/share/meshes/homme/ne4pg2_scrip_20191204.nc")
        );
        assert_eq!(
            config.scrip_grid("ne30pg2").unwrap(),
            PathBuf::from("/inputdata/share/meshes/homme/ne30pg2_scrip_custom.nc")
        );
        assert!(config.scrip_grid("ne120pg2").is_ok());
        assert_eq!(config.maps.cache_capacity, 2);
        assert_eq!(config.maps.root, PathBuf::from("."));
    }

    #[test]
    fn weight_cache_takes_configured_capacity() {
        let config = RemapConfig::from_toml_str("[maps]\ncache_capacity = 2\n").unwrap();
        assert_eq!(config.weight_cache().unwrap().capacity(), 2);
    }

    #[test]
    fn zero_cache_capacity_is_rejected() {
        let err = RemapConfig::from_toml_str("[maps]\ncache_capacity = 0\n").unwrap_err();
        assert!(matches!(err, RemapError::Config(_)));
    }

    #[test]
    fn malformed_toml() {
        let err = RemapConfig::from_toml_str("[grids\n").unwrap_err();
        assert!(matches!(err, RemapError::Config(_)));
    }

    #[test]
    fn read_from_file_and_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[maps]\nroot = \"/scratch/maps\"").unwrap();
        let config = RemapConfig::from_path(file.path()).unwrap();
        assert_eq!(config.maps.root, PathBuf::from("/scratch/maps"));

        let text = config.to_toml_string().unwrap();
        assert_eq!(RemapConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn missing_file() {
        let err = RemapConfig::from_path(Path::new("/nonexistent/rremap.toml")).unwrap_err();
        assert!(matches!(err, RemapError::Load(LoadError::Io { .. })));
    }
}
