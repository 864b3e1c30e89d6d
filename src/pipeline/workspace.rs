//! Ephemeral scan workspace and repository checkout.
//!
//! Every scan owns one disposable temp directory. The repository is
//! shallow-cloned into a `repo/` subdirectory; the scanners and the
//! evidence extractor only ever see that path. Cleanup is explicit so a
//! failed removal is at least logged.

use anyhow::{Context, Result};
use git2::{FetchOptions, Progress, RemoteCallbacks};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Exclusively-owned scratch directory for one scan.
pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace.
    pub fn create() -> Result<Self> {
        let temp_dir = TempDir::new().context("Failed to create scan workspace")?;
        debug!("Workspace at: {}", temp_dir.path().display());
        Ok(Self { temp_dir })
    }

    /// Root of the workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Where the repository checkout lives (or would live) inside the
    /// workspace. The directory exists only after a successful clone.
    pub fn repo_path(&self) -> PathBuf {
        self.temp_dir.path().join("repo")
    }

    /// Shallow-clone a repository into the workspace.
    ///
    /// `token` is injected into the URL for the clone call only and is
    /// never logged.
    pub fn clone_repo(
        &self,
        url: &str,
        token: Option<&str>,
        show_progress: bool,
    ) -> Result<PathBuf> {
        info!("Cloning repository: {}", url);

        let target = self.repo_path();
        let clone_url = inject_token(url, token);

        let progress_bar = if show_progress {
            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(Arc::new(pb))
        } else {
            None
        };

        let pb_clone = progress_bar.clone();
        let mut callbacks = RemoteCallbacks::new();
        callbacks.transfer_progress(move |progress: Progress<'_>| {
            if let Some(ref pb) = pb_clone {
                pb.set_length(progress.total_objects() as u64);
                pb.set_position(progress.received_objects() as u64);
            }
            true
        });

        let mut fetch_opts = FetchOptions::new();
        fetch_opts.remote_callbacks(callbacks);
        fetch_opts.depth(1);

        let mut builder = git2::build::RepoBuilder::new();
        builder.fetch_options(fetch_opts);

        builder
            .clone(&clone_url, &target)
            .with_context(|| format!("Failed to clone repository: {}", url))?;

        if let Some(pb) = progress_bar {
            pb.finish_with_message("Clone complete");
        }

        info!("Cloned repository to: {}", target.display());
        Ok(target)
    }

    /// Remove the workspace. Best-effort: a failed removal is logged,
    /// never propagated.
    pub fn cleanup(self) {
        let path = self.temp_dir.path().to_path_buf();
        if let Err(e) = self.temp_dir.close() {
            warn!("Failed to remove workspace {}: {}", path.display(), e);
        } else {
            debug!("Removed workspace {}", path.display());
        }
    }
}

/// Inject a GitHub token into an HTTPS clone URL.
fn inject_token(url: &str, token: Option<&str>) -> String {
    match token {
        Some(token) if url.contains("github.com") && url.starts_with("https://") => {
            url.replacen("https://", &format!("https://{}@", token), 1)
        }
        _ => url.to_string(),
    }
}
