//! Workflow file loader
//!
//! Load workflow definitions from YAML (`.yaml`/`.yml`) or JSON (`.json`)
//! files, one definition per file.

use std::path::Path;

use super::WorkflowDefinition;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error in {file}: {error}")]
    Yaml {
        file: String,
        error: serde_yaml::Error,
    },

    #[error("JSON parse error in {file}: {error}")]
    Json {
        file: String,
        error: serde_json::Error,
    },

    #[error("Unsupported workflow file extension: {0}")]
    UnsupportedExtension(String),
}

pub struct WorkflowLoader;

impl WorkflowLoader {
    /// Load every workflow file in `dir`, sorted by file name.
    pub fn load_directory(dir: &Path) -> Result<Vec<WorkflowDefinition>, LoadError> {
        let mut paths = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }

            let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            // runner.yaml is the runner config, not a workflow
            if filename == "runner.yaml" || filename == "runner.yml" {
                continue;
            }

            if is_workflow_file(&path) {
                paths.push(path);
            }
        }

        paths.sort();
        paths.iter().map(|p| Self::load_file(p)).collect()
    }

    pub fn load_file(path: &Path) -> Result<WorkflowDefinition, LoadError> {
        let content = std::fs::read_to_string(path)?;
        let file = path.display().to_string();

        match extension(path) {
            Some("json") => {
                serde_json::from_str(&content).map_err(|error| LoadError::Json { file, error })
            }
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|error| LoadError::Yaml { file, error })
            }
            _ => Err(LoadError::UnsupportedExtension(file)),
        }
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

fn is_workflow_file(path: &Path) -> bool {
    matches!(extension(path), Some("yaml") | Some("yml") | Some("json"))
}
