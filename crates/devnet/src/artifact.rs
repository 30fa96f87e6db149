//! Compiled contract artifacts as produced by `forge build`.

use {
    crate::contracts::ContractKind,
    alloy::{json_abi::JsonAbi, primitives::Bytes},
    serde::Deserialize,
    std::{
        collections::HashMap,
        path::{Path, PathBuf},
        sync::Arc,
    },
    strum::IntoEnumIterator,
};

/// Where the sources and the compiled artifact of a contract kind live,
/// relative to the directory holding all contract repositories.
#[derive(Clone, Copy, Debug)]
pub struct ContractSource {
    pub repo: &'static str,
    /// Contract identifier as understood by the deploy tool.
    pub contract: &'static str,
    /// Artifact path relative to the repository.
    pub artifact: &'static str,
}

impl ContractSource {
    pub fn of(kind: ContractKind) -> Self {
        match kind {
            ContractKind::Core => Self {
                repo: "spvm-1",
                contract: "src/spvm-1.sol:SPVM",
                artifact: "out/spvm-1.sol/SPVM.json",
            },
            ContractKind::Election => Self {
                repo: "poc-election-contract",
                contract: "src/ElectionContract.sol:ElectionContract",
                artifact: "out/ElectionContract.sol/ElectionContract.json",
            },
            ContractKind::Slashing => Self {
                repo: "poc-preconfirmations-slashing",
                contract: "src/Slashing.sol:Slashing",
                artifact: "out/Slashing.sol/Slashing.json",
            },
        }
    }

    pub fn repo_dir(&self, base: &Path) -> PathBuf {
        base.join(self.repo)
    }

    pub fn artifact_path(&self, base: &Path) -> PathBuf {
        self.repo_dir(base).join(self.artifact)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("reading artifact {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing artifact {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("artifact {0:?} has no deployable bytecode")]
    MissingBytecode(PathBuf),
}

/// Interface and deployable bytecode of a contract.
#[derive(Clone, Debug, PartialEq)]
pub struct ContractArtifact {
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

#[derive(Deserialize)]
struct RawArtifact {
    abi: JsonAbi,
    #[serde(default)]
    bytecode: Option<RawBytecode>,
}

/// Forge nests the bytecode in an object, other tools emit the bare hex
/// string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Object { object: Bytes },
    Hex(Bytes),
}

impl ContractArtifact {
    pub fn from_json(path: &Path, json: &str) -> Result<Self, Error> {
        let raw: RawArtifact = serde_json::from_str(json).map_err(|source| Error::Parse {
            path: path.to_owned(),
            source,
        })?;
        let bytecode = match raw.bytecode {
            Some(RawBytecode::Object { object }) | Some(RawBytecode::Hex(object)) => object,
            None => Bytes::new(),
        };
        if bytecode.is_empty() {
            return Err(Error::MissingBytecode(path.to_owned()));
        }
        Ok(Self {
            abi: raw.abi,
            bytecode,
        })
    }

    pub async fn load(path: &Path) -> Result<Self, Error> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| Error::Io {
                path: path.to_owned(),
                source,
            })?;
        Self::from_json(path, &json)
    }
}

/// One artifact per contract kind, loaded once and shared by the
/// deployments on both chains.
#[derive(Clone, Debug, Default)]
pub struct Artifacts(HashMap<ContractKind, Arc<ContractArtifact>>);

impl Artifacts {
    pub async fn load(base: &Path) -> Result<Self, Error> {
        let mut artifacts = HashMap::new();
        for kind in ContractKind::iter() {
            let path = ContractSource::of(kind).artifact_path(base);
            let artifact = ContractArtifact::load(&path).await?;
            tracing::debug!(%kind, ?path, functions = artifact.abi.functions.len(), "loaded artifact");
            artifacts.insert(kind, Arc::new(artifact));
        }
        Ok(Self(artifacts))
    }

    pub fn get(&self, kind: ContractKind) -> Option<&Arc<ContractArtifact>> {
        self.0.get(&kind)
    }

    #[cfg(test)]
    pub fn from_artifacts(artifacts: impl IntoIterator<Item = (ContractKind, ContractArtifact)>) -> Self {
        Self(
            artifacts
                .into_iter()
                .map(|(kind, artifact)| (kind, Arc::new(artifact)))
                .collect(),
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const ARTIFACT: &str = r#"{
        "abi": [{
            "type": "function",
            "name": "refreshTickets",
            "inputs": [],
            "outputs": [],
            "stateMutability": "nonpayable"
        }],
        "bytecode": { "object": "0x6080604052", "sourceMap": "" }
    }"#;

    pub fn artifact() -> ContractArtifact {
        ContractArtifact::from_json(Path::new("test.json"), ARTIFACT).unwrap()
    }

    #[test]
    fn parses_forge_artifact() {
        let artifact = artifact();
        assert_eq!(artifact.bytecode, Bytes::from_static(&[0x60, 0x80, 0x60, 0x40, 0x52]));
        assert!(artifact.abi.function("refreshTickets").is_some());
    }

    #[test]
    fn parses_bare_bytecode() {
        let artifact =
            ContractArtifact::from_json(Path::new("x.json"), r#"{"abi": [], "bytecode": "0x00"}"#)
                .unwrap();
        assert_eq!(artifact.bytecode, Bytes::from_static(&[0]));
    }

    #[test]
    fn rejects_artifact_without_bytecode() {
        let result =
            ContractArtifact::from_json(Path::new("x.json"), r#"{"abi": [], "bytecode": {"object": "0x"}}"#);
        assert!(matches!(result, Err(Error::MissingBytecode(_))));
        let result = ContractArtifact::from_json(Path::new("x.json"), r#"{"abi": []}"#);
        assert!(matches!(result, Err(Error::MissingBytecode(_))));
    }

    #[tokio::test]
    async fn loads_all_kinds_from_repository_layout() {
        let dir = tempfile::tempdir().unwrap();
        for kind in ContractKind::iter() {
            let path = ContractSource::of(kind).artifact_path(dir.path());
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, ARTIFACT).unwrap();
        }

        let artifacts = Artifacts::load(dir.path()).await.unwrap();
        for kind in ContractKind::iter() {
            assert_eq!(artifacts.get(kind).unwrap().as_ref(), &artifact());
        }
    }

    #[tokio::test]
    async fn missing_artifact_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = Artifacts::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::Io { ref path, .. } if path.ends_with("SPVM.json")));
    }
}
