//! Compiled contract artifacts the RPC gateway deploys from.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use alloy_core::{json_abi::JsonAbi, primitives::Bytes};
use anyhow::{Context, Result};
use serde::Deserialize;

/// A Hardhat-style artifact: `{ contractName, abi, bytecode }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    pub abi: JsonAbi,
    /// Creation bytecode.
    pub bytecode: Bytes,
}

/// Artifacts indexed by contract name.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    artifacts: HashMap<String, Artifact>,
}

impl ArtifactStore {
    /// Load every artifact found under `root`, recursively.
    ///
    /// JSON files that are not artifacts (debug files, build info) are skipped.
    pub fn load(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            anyhow::bail!("Artifacts directory not found: {}", root.display());
        }

        let mut files = Vec::new();
        collect_json_files(root, &mut files)?;

        let mut store = Self::default();
        for path in files {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;

            match serde_json::from_str::<Artifact>(&content) {
                Ok(artifact) => {
                    tracing::trace!(
                        contract = %artifact.contract_name,
                        path = %path.display(),
                        "Loaded artifact"
                    );
                    store.insert(artifact);
                }
                Err(e) => {
                    tracing::trace!(error = %e, path = %path.display(), "Skipping non-artifact JSON");
                }
            }
        }

        tracing::debug!(
            root = %root.display(),
            artifacts = store.len(),
            "Artifact store loaded"
        );

        Ok(store)
    }

    pub fn insert(&mut self, artifact: Artifact) {
        self.artifacts
            .insert(artifact.contract_name.clone(), artifact);
    }

    pub fn get(&self, contract_name: &str) -> Option<&Artifact> {
        self.artifacts.get(contract_name)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;

    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to read entry in {}", dir.display()))?
            .path();

        if path.is_dir() {
            if path.file_name().is_some_and(|name| name == "build-info") {
                continue;
            }
            collect_json_files(&path, out)?;
        } else if path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(".json") && !name.ends_with(".dbg.json"))
        {
            out.push(path);
        }
    }

    Ok(())
}
