//! Technology stack detection on the cloned repository.
//!
//! Only one signal matters today: whether the project uses a NoSQL
//! datastore. It feeds a context line into the synthesis prompt so
//! injection findings in MongoDB projects are not reported as SQL
//! injection, and one informational finding in the raw report.

use std::path::Path;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

const MANIFEST_FILES: &[&str] = &["requirements.txt", "package.json", "Pipfile"];
const NOSQL_MARKERS: &[&str] = &["pymongo", "motor", "mongoengine", "mongodb", "mongoose"];

/// Directories that never hold the project's own manifests.
fn is_excluded(entry: &DirEntry) -> bool {
    // The walk root itself may be a dot-prefixed temp directory.
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    match entry.file_name().to_str() {
        Some(name) => name == "node_modules" || name == "venv" || name.starts_with('.'),
        None => false,
    }
}

/// Scan dependency manifests for NoSQL datastore markers.
pub fn detect_nosql(repo_path: &Path) -> bool {
    let walker = WalkDir::new(repo_path)
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry));

    for entry in walker.flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !MANIFEST_FILES.contains(&name.as_ref()) {
            continue;
        }

        debug!("Checking manifest: {}", entry.path().display());
        let content = match std::fs::read_to_string(entry.path()) {
            Ok(content) => content.to_lowercase(),
            Err(_) => continue,
        };

        if NOSQL_MARKERS.iter().any(|marker| content.contains(marker)) {
            info!("NoSQL datastore detected via {}", entry.path().display());
            return true;
        }
    }

    false
}

/// Finding text for the informational issue emitted on detection.
pub const NOSQL_FINDING_TITLE: &str = "Technology Detected: MongoDB";
pub const NOSQL_FINDING_DESCRIPTION: &str = "The codebase indicates the usage of MongoDB \
    (detected via dependencies like pymongo, mongoose, etc.), ensuring the analysis context \
    is aware of NoSQL usage.";
