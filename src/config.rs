//! Simulator configuration (`ortwin.toml`) and data-file discovery

use crate::catalog::{ProcedureCatalog, DEFAULT_PROCEDURE};
use crate::graph::MemoryStore;
use crate::models::{ProcedureDefinition, SensorDataSet};
use crate::session::SessionController;
use crate::validator::{ShapeSet, ValidationOrchestrator};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "ortwin.toml";

/// Subdirectories searched for data files, in order
const SEARCH_DIRS: &[&str] = &["data", "ontologies", "alignments"];

/// Data files the simulator needs; relative names are searched for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataFiles {
    /// Knowledge base in N-Triples
    pub ontology: PathBuf,
    /// Shape set in TOML
    pub shapes: PathBuf,
    /// Sensor feed in JSON
    pub sensor_data: PathBuf,
}

impl Default for DataFiles {
    fn default() -> Self {
        Self {
            ontology: PathBuf::from("twin_or_aligned.nt"),
            shapes: PathBuf::from("shapes.toml"),
            sensor_data: PathBuf::from("sensor_data.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Procedure started when none is requested
    pub initial_procedure: String,

    /// Print the engine's full report text after a failed validation
    pub show_validation_report: bool,

    pub files: DataFiles,

    pub server: ServerConfig,

    /// Replace or extend built-in procedures
    pub procedures: Vec<ProcedureDefinition>,

    /// Directory relative file names are resolved against
    #[serde(skip)]
    pub root: PathBuf,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_procedure: DEFAULT_PROCEDURE.to_string(),
            show_validation_report: false,
            files: DataFiles::default(),
            server: ServerConfig::default(),
            procedures: Vec::new(),
            root: PathBuf::from("."),
        }
    }
}

/// One or more data files could not be found
#[derive(Debug, thiserror::Error)]
#[error("Missing files: {}", .0.join(", "))]
pub struct MissingFiles(pub Vec<&'static str>);

/// Data files after discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFiles {
    pub ontology: PathBuf,
    pub shapes: PathBuf,
    pub sensor_data: PathBuf,
}

impl SimulatorConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `ortwin.toml` in `dir` is used
    /// when present, defaults otherwise.
    pub fn load(explicit: Option<&Path>, dir: &Path) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                path.to_path_buf()
            }
            None => {
                let path = dir.join(CONFIG_FILE);
                if !path.exists() {
                    tracing::debug!(dir = %dir.display(), "no config file, using defaults");
                    return Ok(Self {
                        root: dir.to_path_buf(),
                        ..Self::default()
                    });
                }
                path
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(dir)
            .to_path_buf();
        let config = Self::from_toml(&content, root)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        tracing::info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn from_toml(content: &str, root: PathBuf) -> anyhow::Result<Self> {
        let mut config: SimulatorConfig = toml::from_str(content)?;
        config.root = root;
        // Fail early on inconsistent procedure overrides
        config.catalog()?;
        Ok(config)
    }

    /// Built-in catalog with this config's overrides applied
    pub fn catalog(&self) -> anyhow::Result<ProcedureCatalog> {
        if self.procedures.is_empty() {
            return Ok(ProcedureCatalog::builtin());
        }
        Ok(ProcedureCatalog::with_overrides(
            self.procedures.clone(),
            DEFAULT_PROCEDURE,
        )?)
    }

    /// Candidate locations for a data file, first match wins
    pub fn candidates(&self, file: &Path) -> Vec<PathBuf> {
        if file.is_absolute() {
            return vec![file.to_path_buf()];
        }
        let mut candidates: Vec<PathBuf> = SEARCH_DIRS
            .iter()
            .map(|dir| self.root.join(dir).join(file))
            .collect();
        candidates.push(self.root.join(file));
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join(file));
        }
        candidates
    }

    fn find(&self, file: &Path) -> Option<PathBuf> {
        self.candidates(file).into_iter().find(|p| p.is_file())
    }

    /// Locate all data files; every missing one is reported together
    pub fn resolve_files(&self) -> Result<ResolvedFiles, MissingFiles> {
        let ontology = self.find(&self.files.ontology);
        let shapes = self.find(&self.files.shapes);
        let sensor_data = self.find(&self.files.sensor_data);

        match (ontology, shapes, sensor_data) {
            (Some(ontology), Some(shapes), Some(sensor_data)) => Ok(ResolvedFiles {
                ontology,
                shapes,
                sensor_data,
            }),
            (ontology, shapes, sensor_data) => {
                let mut missing = Vec::new();
                if ontology.is_none() {
                    missing.push("ontology");
                }
                if shapes.is_none() {
                    missing.push("shapes");
                }
                if sensor_data.is_none() {
                    missing.push("sensor data");
                }
                Err(MissingFiles(missing))
            }
        }
    }

    /// Load every data file and start a session on `procedure`
    pub fn open_session(&self, procedure: &str) -> anyhow::Result<SessionController> {
        let files = self.resolve_files()?;
        let store = MemoryStore::load(&files.ontology)?;
        let shapes = ShapeSet::load(&files.shapes)?;
        let sensor_data = SensorDataSet::load(&files.sensor_data)?;

        let controller = SessionController::new(
            store,
            self.catalog()?,
            sensor_data,
            ValidationOrchestrator::with_shapes(shapes),
            procedure,
        )?;
        Ok(controller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let config = SimulatorConfig::load(None, dir.path()).unwrap();
        assert_eq!(config.initial_procedure, "LegoAssembly");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.root, dir.path());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let result = SimulatorConfig::load(Some(dir.path().join("nope.toml").as_path()), dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_with_procedure_override() {
        let content = r#"
            initial_procedure = "Suturing"
            show_validation_report = true

            [server]
            port = 8080

            [[procedures]]
            id = "Suturing"
            initial_steps = ["Step_S1_1"]
            sequence = [["Step_S1_1"], ["Step_S1_2"], ["Step_S2_1"]]
            phases = [
                { phase = "Phase1", next = "Phase2", threshold = 2 },
                { phase = "Phase2" },
            ]
        "#;
        let config = SimulatorConfig::from_toml(content, PathBuf::from(".")).unwrap();
        assert!(config.show_validation_report);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");

        let catalog = config.catalog().unwrap();
        assert!(catalog.contains("Suturing"));
        assert!(catalog.contains("LegoAssembly"));
    }

    #[test]
    fn test_inconsistent_override_rejected() {
        let content = r#"
            [[procedures]]
            id = "Broken"
            initial_steps = ["A"]
            sequence = [["A"]]
            phases = [{ phase = "Phase1", next = "Nowhere", threshold = 1 }]
        "#;
        assert!(SimulatorConfig::from_toml(content, PathBuf::from(".")).is_err());
    }

    #[test]
    fn test_resolve_reports_all_missing() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("data")).unwrap();
        std::fs::write(dir.path().join("data/sensor_data.json"), "{}").unwrap();

        let config = SimulatorConfig {
            root: dir.path().to_path_buf(),
            files: DataFiles {
                ontology: PathBuf::from("missing-ontology.nt"),
                shapes: PathBuf::from("missing-shapes.toml"),
                sensor_data: PathBuf::from("sensor_data.json"),
            },
            ..SimulatorConfig::default()
        };
        let err = config.resolve_files().unwrap_err();
        assert_eq!(err.0, vec!["ontology", "shapes"]);
        assert_eq!(err.to_string(), "Missing files: ontology, shapes");
    }

    #[test]
    fn test_open_session_from_search_dirs() {
        let dir = TempDir::new().unwrap();
        for sub in ["data", "ontologies", "alignments"] {
            std::fs::create_dir(dir.path().join(sub)).unwrap();
        }
        std::fs::write(
            dir.path().join("alignments/twin_or_aligned.nt"),
            "<http://www.semanticweb.org/Twin_OR/Step_A1_1> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://www.semanticweb.org/Twin_OR/Step> .\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("ontologies/shapes.toml"), "").unwrap();
        std::fs::write(dir.path().join("data/sensor_data.json"), r#"{"procedures": {}}"#).unwrap();

        let config = SimulatorConfig::load(None, dir.path()).unwrap();
        let session = config.open_session("LaparoscopicProcedure").unwrap();
        assert_eq!(session.get_state().active_step_group, vec!["Step_L1_1".to_string()]);
    }
}
