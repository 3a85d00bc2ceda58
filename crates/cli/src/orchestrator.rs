//! Service orchestration
//!
//! Coordinates the reading-assistant and syntopical-reading-assistant
//! services. The services are opaque subprocesses with executable entry
//! points under `<service>/bin/`; this layer checks they are present,
//! streams their output through, and maps exit codes to success flags.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub struct Orchestrator {
    project_root: PathBuf,
    reading_service: PathBuf,
    syntopical_service: PathBuf,
}

impl Orchestrator {
    pub fn new(project_root: PathBuf) -> Self {
        let reading_service = project_root.join("services").join("reading-assistant");
        let syntopical_service = project_root
            .join("services")
            .join("syntopical-reading-assistant");
        Self {
            project_root,
            reading_service,
            syntopical_service,
        }
    }

    /// Project root from `FOLIO_PROJECT_ROOT`, falling back to the
    /// current directory.
    pub fn from_env() -> Self {
        let root = std::env::var("FOLIO_PROJECT_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));
        Self::new(root)
    }

    fn check_service(&self, service_path: &Path, name: &str) -> bool {
        if !service_path.is_dir() {
            eprintln!("Error: {name} not found or not initialized.");
            eprintln!("Please initialize submodules: git submodule update --init --recursive");
            return false;
        }
        true
    }

    fn check_entry_point(&self, entry: &Path, name: &str) -> bool {
        if !entry.is_file() {
            eprintln!("Error: {name} not found at {}", entry.display());
            eprintln!("The service may not have this entry point yet.");
            return false;
        }
        true
    }

    fn summaries_dir(&self) -> PathBuf {
        self.project_root.join("vault").join("BookSummaries")
    }

    /// Run the reading pipeline on one EPUB. Returns the generated
    /// markdown path on success.
    pub async fn analyze(&self, book: &Path) -> Option<PathBuf> {
        if !self.check_service(&self.reading_service, "reading-assistant") {
            return None;
        }
        if !book.exists() {
            eprintln!("Error: File not found: {}", book.display());
            return None;
        }

        println!("\n📚 Running Reading Assistant on {}...", book.display());
        println!("Processing through 8 stages...");

        let entry = self.reading_service.join("bin").join("analyze");
        if !self.check_entry_point(&entry, "analyze entry point") {
            return None;
        }

        let output_dir = self.summaries_dir();
        if let Err(e) = tokio::fs::create_dir_all(&output_dir).await {
            eprintln!("Error: could not create {}: {e}", output_dir.display());
            return None;
        }

        let mut child = match Command::new(&entry)
            .arg(book)
            .arg("--output-dir")
            .arg(&output_dir)
            .current_dir(&self.reading_service)
            .stdout(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                eprintln!("Error running reading-assistant: {e}");
                return None;
            }
        };

        // Stream service output through while scanning for the artifact path.
        let mut output_file = None;
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                println!("{line}");
                if let Some(rest) = line.split_once("Output:").map(|(_, rest)| rest) {
                    output_file = Some(PathBuf::from(rest.trim()));
                }
            }
        }

        match child.wait().await {
            Ok(status) if status.success() => {}
            Ok(status) => {
                eprintln!("Error running reading-assistant: exit {status}");
                return None;
            }
            Err(e) => {
                eprintln!("Error running reading-assistant: {e}");
                return None;
            }
        }

        // Fall back to the newest markdown file in the output directory.
        let output_file = match output_file {
            Some(path) => Some(path),
            None => newest_markdown(&output_dir).await,
        };

        match output_file {
            Some(path) => {
                println!("✓ Analysis complete: {}", path.display());
                Some(path)
            }
            None => {
                eprintln!("Warning: Could not locate output file");
                None
            }
        }
    }

    /// Merge analysis outputs into a synthesis document (stages 1-3).
    pub async fn compare(&self, markdown_files: &[PathBuf]) -> Option<PathBuf> {
        if !self.check_service(&self.syntopical_service, "syntopical-reading-assistant") {
            return None;
        }

        println!(
            "\n🔍 Running Syntopical Synthesis on {} files...",
            markdown_files.len()
        );
        println!("Processing stages 1-3...");

        for file in markdown_files {
            if !file.exists() {
                eprintln!("Error: File not found: {}", file.display());
                return None;
            }
        }

        let output_dir = self.summaries_dir().join("synthesis");
        if let Err(e) = tokio::fs::create_dir_all(&output_dir).await {
            eprintln!("Error: could not create {}: {e}", output_dir.display());
            return None;
        }

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let synthesis_file = output_dir.join(format!("synthesis_{stamp}.md"));

        let mut merged = String::new();
        merged.push_str("# Syntopical Analysis\n\n");
        merged.push_str(&format!("Generated: {}\n", Utc::now().to_rfc3339()));
        merged.push_str(&format!("Analyzed Books: {}\n\n", markdown_files.len()));
        for (i, file) in markdown_files.iter().enumerate() {
            let stem = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            merged.push_str(&format!("## Book {}: {stem}\n\n", i + 1));
            match tokio::fs::read_to_string(file).await {
                Ok(content) => {
                    merged.push_str(&content);
                    merged.push_str("\n\n---\n\n");
                }
                Err(e) => {
                    eprintln!("Warning: Could not read {}: {e}", file.display());
                }
            }
        }

        if let Err(e) = tokio::fs::write(&synthesis_file, merged).await {
            eprintln!("Error writing synthesis file: {e}");
            return None;
        }

        println!("✓ Synthesis complete: {}", synthesis_file.display());
        Some(synthesis_file)
    }

    /// Connect a comparison to the library (stage 4).
    pub async fn library_connect(&self, comparison: &Path) -> bool {
        self.run_syntopical_step(comparison, "library-connect", "📖 Connecting to library")
            .await
    }

    /// Find gaps in a comparison (stage 5).
    pub async fn find_gaps(&self, comparison: &Path) -> bool {
        self.run_syntopical_step(comparison, "find-gaps", "🔎 Finding gaps in")
            .await
    }

    async fn run_syntopical_step(&self, comparison: &Path, entry_name: &str, label: &str) -> bool {
        if !self.check_service(&self.syntopical_service, "syntopical-reading-assistant") {
            return false;
        }

        println!("\n{label}: {}...", comparison.display());

        if !comparison.exists() {
            eprintln!("Error: File not found: {}", comparison.display());
            return false;
        }

        let entry = self.syntopical_service.join("bin").join(entry_name);
        if !self.check_entry_point(&entry, entry_name) {
            return false;
        }

        match Command::new(&entry)
            .arg(comparison)
            .current_dir(&self.syntopical_service)
            .output()
            .await
        {
            Ok(output) if output.status.success() => {
                println!("✓ {entry_name} complete");
                true
            }
            Ok(output) => {
                eprintln!("Error:");
                eprintln!("{}", String::from_utf8_lossy(&output.stderr));
                false
            }
            Err(e) => {
                eprintln!("Error: {e}");
                false
            }
        }
    }

    /// Analyze books in parallel with a bounded worker pool.
    pub async fn batch_analyze(
        self: &Arc<Self>,
        books: &[PathBuf],
        workers: usize,
    ) -> Vec<(PathBuf, Option<PathBuf>)> {
        println!(
            "\n🚀 Starting batch analysis of {} books with {} workers...",
            books.len(),
            workers.max(1)
        );

        let semaphore = Arc::new(Semaphore::new(workers.max(1)));
        let mut tasks = JoinSet::new();
        for book in books {
            let orchestrator = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            let book = book.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire().await;
                let output = orchestrator.analyze(&book).await;
                (book, output)
            });
        }

        let total = books.len();
        let mut results = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            let Ok((book, output)) = joined else {
                continue;
            };
            let mark = if output.is_some() { "✓" } else { "✗" };
            println!(
                "{mark} [{}/{total}] {}",
                results.len() + 1,
                book.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            );
            results.push((book, output));
        }

        let succeeded = results.iter().filter(|(_, o)| o.is_some()).count();
        println!("\n✨ Batch analysis complete: {succeeded} succeeded");
        results
    }

    /// Full batch pipeline: parallel analysis, then optional synthesis
    /// over the successful outputs.
    pub async fn batch_pipeline(
        self: &Arc<Self>,
        books: &[PathBuf],
        workers: usize,
        synthesize: bool,
    ) -> bool {
        let results = self.batch_analyze(books, workers).await;
        let markdown_files: Vec<PathBuf> = results
            .into_iter()
            .filter_map(|(_, output)| output)
            .collect();

        if markdown_files.is_empty() {
            eprintln!("Error: No books were successfully analyzed");
            return false;
        }

        if synthesize && markdown_files.len() > 1 {
            println!("\n🔍 Synthesizing {} book analyses...", markdown_files.len());
            if self.compare(&markdown_files).await.is_none() {
                return false;
            }
        }
        true
    }

    /// Full syntopical pipeline: analyze each book, compare, then run the
    /// downstream library steps (failures there only warn).
    pub async fn analyze_syntopical(&self, books: &[PathBuf]) -> bool {
        println!("\n🚀 Starting full syntopical analysis pipeline...");
        println!("Processing {} books...\n", books.len());

        let mut analyzed = Vec::new();
        for book in books {
            match self.analyze(book).await {
                Some(output) => analyzed.push(output),
                None => eprintln!(
                    "Warning: Failed to analyze {}, continuing with others...",
                    book.display()
                ),
            }
        }

        if analyzed.is_empty() {
            eprintln!("Error: No books were successfully analyzed.");
            return false;
        }

        let Some(comparison) = self.compare(&analyzed).await else {
            eprintln!("Error: Comparison failed.");
            return false;
        };

        if !self.library_connect(&comparison).await {
            eprintln!("Warning: Library connection step failed.");
            eprintln!(
                "You can retry manually with: folio library-connect {}",
                comparison.display()
            );
        }
        if !self.find_gaps(&comparison).await {
            eprintln!("Warning: Gap analysis step failed.");
            eprintln!(
                "You can retry manually with: folio find-gaps {}",
                comparison.display()
            );
        }

        println!("\n✓ Full syntopical analysis pipeline complete!");
        println!("Output: {}", comparison.display());
        true
    }
}

/// Most recently modified markdown file in a directory.
async fn newest_markdown(dir: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("md") {
            continue;
        }
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        if newest.as_ref().is_none_or(|(stamp, _)| modified > *stamp) {
            newest = Some((modified, path));
        }
    }
    newest.map(|(_, path)| path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_service(root: &Path, service: &str, entry: &str, script: &str) {
        use std::os::unix::fs::PermissionsExt;

        let bin = root.join("services").join(service).join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let path = bin.join(entry);
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
    }

    #[tokio::test]
    async fn test_analyze_reports_missing_service() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(dir.path().to_path_buf());
        assert!(orchestrator.analyze(Path::new("book.epub")).await.is_none());
    }

    #[tokio::test]
    async fn test_analyze_parses_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fake_service(
            root,
            "reading-assistant",
            "analyze",
            "echo 'Stage 1: extraction'\necho 'Output: /tmp/result.md'",
        );
        let book = root.join("book.epub");
        std::fs::write(&book, "fake epub").unwrap();

        let orchestrator = Orchestrator::new(root.to_path_buf());
        let output = orchestrator.analyze(&book).await;
        assert_eq!(output, Some(PathBuf::from("/tmp/result.md")));
    }

    #[tokio::test]
    async fn test_analyze_fails_on_service_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fake_service(root, "reading-assistant", "analyze", "exit 3");
        let book = root.join("book.epub");
        std::fs::write(&book, "fake epub").unwrap();

        let orchestrator = Orchestrator::new(root.to_path_buf());
        assert!(orchestrator.analyze(&book).await.is_none());
    }

    #[tokio::test]
    async fn test_compare_merges_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(
            root.join("services").join("syntopical-reading-assistant"),
        )
        .unwrap();

        let a = root.join("a.md");
        let b = root.join("b.md");
        std::fs::write(&a, "Alpha notes").unwrap();
        std::fs::write(&b, "Beta notes").unwrap();

        let orchestrator = Orchestrator::new(root.to_path_buf());
        let synthesis = orchestrator.compare(&[a, b]).await.unwrap();

        let content = std::fs::read_to_string(&synthesis).unwrap();
        assert!(content.starts_with("# Syntopical Analysis"));
        assert!(content.contains("Analyzed Books: 2"));
        assert!(content.contains("## Book 1: a"));
        assert!(content.contains("Alpha notes"));
        assert!(content.contains("## Book 2: b"));
        assert!(content.contains("Beta notes"));
    }

    #[tokio::test]
    async fn test_compare_rejects_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(
            root.join("services").join("syntopical-reading-assistant"),
        )
        .unwrap();

        let orchestrator = Orchestrator::new(root.to_path_buf());
        assert!(
            orchestrator
                .compare(&[root.join("missing.md")])
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_library_connect_runs_entry_point() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fake_service(
            root,
            "syntopical-reading-assistant",
            "library-connect",
            "exit 0",
        );
        let comparison = root.join("comparison.md");
        std::fs::write(&comparison, "comparison").unwrap();

        let orchestrator = Orchestrator::new(root.to_path_buf());
        assert!(orchestrator.library_connect(&comparison).await);

        // A failing entry point reports failure.
        fake_service(
            root,
            "syntopical-reading-assistant",
            "find-gaps",
            "echo 'no gap index' >&2\nexit 1",
        );
        assert!(!orchestrator.find_gaps(&comparison).await);
    }

    #[tokio::test]
    async fn test_batch_analyze_counts_successes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        // Succeeds only for books whose name contains "good".
        fake_service(
            root,
            "reading-assistant",
            "analyze",
            "case \"$1\" in *good*) echo \"Output: /tmp/$$.md\";; *) exit 1;; esac",
        );
        let good = root.join("good.epub");
        let bad = root.join("bad.epub");
        std::fs::write(&good, "x").unwrap();
        std::fs::write(&bad, "x").unwrap();

        let orchestrator = Arc::new(Orchestrator::new(root.to_path_buf()));
        let results = orchestrator
            .batch_analyze(&[good.clone(), bad.clone()], 2)
            .await;

        assert_eq!(results.len(), 2);
        let succeeded = results.iter().filter(|(_, o)| o.is_some()).count();
        assert_eq!(succeeded, 1);
        let good_result = results.iter().find(|(b, _)| *b == good).unwrap();
        assert!(good_result.1.is_some());
    }
}
