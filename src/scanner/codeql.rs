//! CodeQL static analysis adapter.
//!
//! CodeQL runs once per detected language: build a database for the
//! checkout, analyze it with the language's standard query pack, and
//! collect the SARIF output. Per-language failures are logged and
//! skipped so one broken extractor does not cost the whole scan.

use crate::exec::{tool_on_path, CommandRunner};
use crate::scanner::ScannerError;
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

/// A language CodeQL can build a database for.
struct Language {
    name: &'static str,
    pack: &'static str,
    extensions: &'static [&'static str],
}

const LANGUAGES: &[Language] = &[
    Language {
        name: "javascript",
        pack: "codeql/javascript-queries",
        extensions: &["js", "jsx", "ts", "tsx"],
    },
    Language {
        name: "python",
        pack: "codeql/python-queries",
        extensions: &["py"],
    },
    Language {
        name: "java",
        pack: "codeql/java-queries",
        extensions: &["java"],
    },
    Language {
        name: "go",
        pack: "codeql/go-queries",
        extensions: &["go"],
    },
    Language {
        name: "csharp",
        pack: "codeql/csharp-queries",
        extensions: &["cs"],
    },
    Language {
        name: "ruby",
        pack: "codeql/ruby-queries",
        extensions: &["rb"],
    },
];

/// Runs CodeQL against a checked-out repository.
pub struct CodeQlScanner {
    runner: CommandRunner,
}

impl CodeQlScanner {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    /// Run CodeQL for every detected language.
    ///
    /// Returns one SARIF document per language that analyzed cleanly.
    pub async fn scan(&self, target: &Path) -> Result<Vec<Value>, ScannerError> {
        info!("Starting CodeQL scan on: {}", target.display());

        if !tool_on_path("codeql") {
            return Err(ScannerError::ToolUnavailable { tool: "codeql" });
        }

        let languages = detect_languages(target);
        if languages.is_empty() {
            warn!("No supported languages detected, skipping CodeQL");
            return Ok(vec![]);
        }
        let names: Vec<&str> = languages.iter().map(|l| l.name).collect();
        info!("Detected languages: {:?}", names);

        let mut documents = Vec::new();

        for language in languages {
            info!("Running CodeQL for language: {}", language.name);

            let db_path = target.join(format!("codeql_db_{}", language.name));
            let report_file = target.join(format!("codeql_report_{}.sarif", language.name));

            if db_path.exists() {
                let _ = std::fs::remove_dir_all(&db_path);
            }

            let db = db_path.to_string_lossy().into_owned();
            let source_root = target.to_string_lossy().into_owned();
            let language_flag = format!("--language={}", language.name);
            let create_args = [
                "database",
                "create",
                &db,
                "--source-root",
                &source_root,
                &language_flag,
                "--overwrite",
                "--ram=4000",
            ];

            let created = self.runner.run("codeql", &create_args, target).await;
            if !created.success() {
                warn!(
                    "CodeQL database creation failed for {}: {}",
                    language.name, created.stderr
                );
                continue;
            }

            let output_flag = format!("--output={}", report_file.to_string_lossy());
            let analyze_args = [
                "database",
                "analyze",
                &db,
                language.pack,
                "--format=sarif-latest",
                &output_flag,
                "--ram=4000",
            ];

            let analyzed = self.runner.run("codeql", &analyze_args, target).await;
            if !analyzed.success() {
                warn!(
                    "CodeQL analysis failed for {}: {}",
                    language.name, analyzed.stderr
                );
                continue;
            }

            match std::fs::read_to_string(&report_file) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(document) => documents.push(document),
                    Err(e) => warn!("Failed to parse {} SARIF: {}", language.name, e),
                },
                Err(e) => warn!("Failed to read {} SARIF: {}", language.name, e),
            }
        }

        Ok(documents)
    }
}

/// Detect which supported languages appear in the checkout.
fn detect_languages(target: &Path) -> Vec<&'static Language> {
    let mut detected: Vec<&'static Language> = Vec::new();

    for entry in WalkDir::new(target).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = match entry.path().extension().and_then(|e| e.to_str()) {
            Some(ext) => ext,
            None => continue,
        };
        for language in LANGUAGES {
            if language.extensions.contains(&ext)
                && !detected.iter().any(|l| l.name == language.name)
            {
                detected.push(language);
            }
        }
    }

    detected
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_detect_languages() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.py"), "print('hi')").unwrap();
        fs::write(dir.path().join("index.js"), "console.log('hi')").unwrap();
        fs::write(dir.path().join("README.md"), "# readme").unwrap();

        let detected = detect_languages(dir.path());
        let names: Vec<&str> = detected.iter().map(|l| l.name).collect();

        assert_eq!(names.len(), 2);
        assert!(names.contains(&"python"));
        assert!(names.contains(&"javascript"));
    }

    #[test]
    fn test_detect_languages_dedupes_extensions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "").unwrap();
        fs::write(dir.path().join("b.py"), "").unwrap();
        fs::write(dir.path().join("c.ts"), "").unwrap();

        let detected = detect_languages(dir.path());
        let names: Vec<&str> = detected.iter().map(|l| l.name).collect();

        assert_eq!(names.len(), 2);
        assert!(names.contains(&"python"));
        assert!(names.contains(&"javascript"));
    }

    #[test]
    fn test_detect_languages_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        assert!(detect_languages(dir.path()).is_empty());
    }

    #[test]
    fn test_every_language_has_a_query_pack() {
        for language in LANGUAGES {
            assert!(language.pack.starts_with("codeql/"));
            assert!(!language.extensions.is_empty());
        }
    }
}
