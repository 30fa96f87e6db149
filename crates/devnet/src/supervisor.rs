//! Starts the chain nodes as background processes.

use {
    anyhow::{Context, Result},
    std::{
        path::{Path, PathBuf},
        process::Stdio,
    },
    tokio::{
        fs::{self, File},
        process::{Child, Command},
    },
};

/// A spawned node. The process is killed when this is dropped.
#[derive(Debug)]
pub struct NodeProcess {
    child: Child,
    pub log_file: PathBuf,
}

impl NodeProcess {
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

pub fn node_args(host: &str, port: u16) -> Vec<String> {
    vec![
        "--host".to_string(),
        host.to_string(),
        "--port".to_string(),
        port.to_string(),
    ]
}

pub fn log_file(dir: &Path, port: u16) -> PathBuf {
    dir.join(format!("anvil_logs_{port}.log"))
}

/// Spawns `command` listening on `host:port` and sends everything it prints
/// to a log file in `log_dir`.
pub async fn spawn(command: &str, host: &str, port: u16, log_dir: &Path) -> Result<NodeProcess> {
    fs::create_dir_all(log_dir)
        .await
        .with_context(|| format!("creating node log directory {log_dir:?}"))?;
    let path = log_file(log_dir, port);
    let stdout = File::create(&path)
        .await
        .with_context(|| format!("creating node log {path:?}"))?
        .into_std()
        .await;
    let stderr = stdout.try_clone().context("duplicating node log handle")?;

    let child = Command::new(command)
        .args(node_args(host, port))
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning {command} on port {port}"))?;

    Ok(NodeProcess {
        child,
        log_file: path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_node_invocation() {
        assert_eq!(
            node_args("0.0.0.0", 8545),
            vec!["--host", "0.0.0.0", "--port", "8545"]
        );
        assert_eq!(
            log_file(Path::new("/tmp/logs"), 8546),
            PathBuf::from("/tmp/logs/anvil_logs_8546.log")
        );
    }

    #[tokio::test]
    async fn redirects_output_to_log_file() {
        let dir = tempfile::tempdir().unwrap();
        // `echo` stands in for the node: it prints its arguments and exits.
        let mut node = spawn("echo", "127.0.0.1", 9999, dir.path()).await.unwrap();
        node.child.wait().await.unwrap();

        let log = std::fs::read_to_string(&node.log_file).unwrap();
        assert_eq!(log.trim(), "--host 127.0.0.1 --port 9999");
    }

    #[tokio::test]
    async fn missing_command_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = spawn("definitely-not-a-node-binary", "127.0.0.1", 1, dir.path()).await;
        assert!(result.is_err());
    }
}
