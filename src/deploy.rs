//! Remote deployment via the system `rsync`.
//!
//! The build tree is mirrored to `host:remote_path` over ssh with delete
//! semantics; there is no rollback, the remote is treated as disposable as
//! the local build tree. The host usually comes from the
//! `SITEFORGE_DEPLOY_HOST` environment variable rather than site.toml.

use crate::config::SiteConfig;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

/// Deploy error
#[derive(Debug, Error)]
pub enum DeployError {
    /// No deploy host configured
    #[error("No deploy host configured (set [deploy] host or SITEFORGE_DEPLOY_HOST)")]
    MissingHost,
    /// The build tree does not exist yet
    #[error("Build directory '{0}' does not exist; run `siteforge build` first")]
    BuildMissing(String),
    /// rsync could not be started
    #[error("Failed to run rsync: {0}")]
    Spawn(#[from] std::io::Error),
    /// rsync exited non-zero
    #[error("rsync failed ({status}):\n{stderr}")]
    Rsync { status: String, stderr: String },
}

/// Assemble the rsync argument list for a config.
pub fn rsync_args(config: &SiteConfig, host: &str, dry_run: bool) -> Vec<String> {
    let mut args = vec![
        "-az".to_string(),
        "--delete".to_string(),
        "-e".to_string(),
        "ssh".to_string(),
    ];
    if dry_run {
        args.push("--dry-run".to_string());
        args.push("--verbose".to_string());
    }
    for exclude in &config.deploy.excludes {
        args.push(format!("--exclude={}", exclude));
    }
    // Trailing slash: sync the tree's contents, not the directory itself
    args.push(format!("{}/", config.project.out.display()));
    args.push(format!("{}:{}", host, config.deploy.remote_path));
    args
}

/// Sync the build tree to the configured remote.
pub fn deploy(root: &Path, config: &SiteConfig, dry_run: bool) -> Result<(), DeployError> {
    let host = config.deploy.host.as_deref().ok_or(DeployError::MissingHost)?;

    let build = root.join(&config.project.out);
    if !build.is_dir() {
        return Err(DeployError::BuildMissing(config.project.out.display().to_string()));
    }

    let output = Command::new("rsync")
        .args(rsync_args(config, host, dry_run))
        .current_dir(root)
        .output()?;

    if !output.status.success() {
        return Err(DeployError::Rsync {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    print!("{}", String::from_utf8_lossy(&output.stdout));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;

    #[test]
    fn test_rsync_args_basic() {
        let mut config = default_config();
        config.deploy.remote_path = "/var/www/site".to_string();

        let args = rsync_args(&config, "deploy@example.com", false);
        assert_eq!(args[0], "-az");
        assert_eq!(args[1], "--delete");
        assert_eq!(args[2], "-e");
        assert_eq!(args[3], "ssh");
        assert_eq!(args[args.len() - 2], "build/");
        assert_eq!(args[args.len() - 1], "deploy@example.com:/var/www/site");
    }

    #[test]
    fn test_rsync_args_dry_run_and_excludes() {
        let mut config = default_config();
        config.deploy.excludes = vec![".DS_Store".to_string(), "*.map".to_string()];

        let args = rsync_args(&config, "h", true);
        assert!(args.contains(&"--dry-run".to_string()));
        assert!(args.contains(&"--exclude=.DS_Store".to_string()));
        assert!(args.contains(&"--exclude=*.map".to_string()));
    }

    #[test]
    fn test_deploy_without_host() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = default_config();
        assert!(matches!(
            deploy(temp.path(), &config, false),
            Err(DeployError::MissingHost)
        ));
    }

    #[test]
    fn test_deploy_without_build_tree() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut config = default_config();
        config.deploy.host = Some("h".to_string());
        assert!(matches!(
            deploy(temp.path(), &config, false),
            Err(DeployError::BuildMissing(_))
        ));
    }
}
