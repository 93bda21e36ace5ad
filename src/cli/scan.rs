use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::{PathFilter, ScannerConfig, ShieldConfig};
use crate::error::Result;
use crate::events::{RequestContext, SecurityEventLog};
use crate::sanitize::sanitize_filename;
use crate::scan::{should_quarantine, FileScanner, ScanResult, ThreatKind, UploadedFile};
use crate::storage::EventStore;

/// Arguments of `intake-shield scan`.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub paths: Vec<PathBuf>,
    pub json: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub client_ip: String,
}

/// Scan files and directories, print a verdict per file and record unsafe
/// files in the event log. Returns `false` if any file was unsafe or missing.
pub async fn run(config: &ShieldConfig, opts: &ScanOptions) -> Result<bool> {
    let filter = PathFilter::compile(&opts.include, &opts.exclude)?;
    let mut files = Vec::new();
    let mut missing = false;

    for path in &opts.paths {
        if path.is_dir() {
            collect_files(path, path, &filter, &mut files)?;
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            eprintln!("intake-shield: path not found: {}", path.display());
            missing = true;
        }
    }

    if files.is_empty() {
        eprintln!("intake-shield: no files to scan.");
        return Ok(!missing);
    }
    tracing::info!(files = files.len(), "scanning");

    let results = scan_files(&config.scanner, files).await?;
    let log = super::open_event_log(config)?;
    let ctx = RequestContext::new(opts.client_ip.clone()).with_request("SCAN", "cli");

    let mut unsafe_count = 0;
    for (path, result) in &results {
        if !result.safe {
            unsafe_count += 1;
            record_unsafe(&log, &ctx, path, result);
        }
    }

    if opts.json {
        let entries: Vec<Value> = results
            .iter()
            .map(|(path, result)| {
                serde_json::json!({
                    "path": path.display().to_string(),
                    "quarantine": should_quarantine(result),
                    "result": result,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for (path, result) in &results {
            println!("{}", summary_line(path, result));
        }
    }

    if unsafe_count > 0 {
        eprintln!(
            "\nintake-shield: {} of {} file(s) flagged.",
            unsafe_count,
            results.len()
        );
    } else {
        eprintln!("intake-shield: {} file(s) clean.", results.len());
    }

    Ok(unsafe_count == 0 && !missing)
}

/// Scan files concurrently on the blocking pool. Results keep input order.
pub async fn scan_files(
    config: &ScannerConfig,
    files: Vec<PathBuf>,
) -> Result<Vec<(PathBuf, ScanResult)>> {
    let scanner = Arc::new(FileScanner::new(config)?);

    let handles: Vec<_> = files
        .into_iter()
        .map(|path| {
            let scanner = Arc::clone(&scanner);
            let task_path = path.clone();
            let handle = tokio::task::spawn_blocking(move || {
                scanner.scan(&UploadedFile::from_path(&task_path))
            });
            (path, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (path, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "scan task failed");
                ScanResult::from_threats(vec![ThreatKind::ScanError], scanner.scan_method())
            }
        };
        results.push((path, result));
    }
    Ok(results)
}

/// Walk `dir`, skipping hidden entries, collecting files the filter admits.
/// Filters match against the path relative to `root`.
fn collect_files(
    root: &Path,
    dir: &Path,
    filter: &PathFilter,
    out: &mut Vec<PathBuf>,
) -> Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in entries {
        if path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('.'))
        {
            continue;
        }
        if path.is_dir() {
            collect_files(root, &path, filter, out)?;
        } else if path.is_file() {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            if filter.admits(relative) {
                out.push(path);
            }
        }
    }
    Ok(())
}

/// Record an unsafe result: `scan_error` first when the file could not be
/// inspected, then `malicious_file_detected` or `upload_rejected`.
fn record_unsafe<S: EventStore>(
    log: &SecurityEventLog<S>,
    ctx: &RequestContext,
    path: &Path,
    result: &ScanResult,
) {
    let payload = scan_payload(path, result);
    if result.threats.iter().any(|t| t.is_infrastructure_failure()) {
        log.record("file_upload", "scan_error", ctx, payload.clone());
    }
    let event_name = if should_quarantine(result) {
        "malicious_file_detected"
    } else {
        "upload_rejected"
    };
    log.record("file_upload", event_name, ctx, payload);
}

fn scan_payload(path: &Path, result: &ScanResult) -> Map<String, Value> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut payload = Map::new();
    payload.insert("filename".into(), sanitize_filename(&name).into());
    payload.insert("path".into(), path.display().to_string().into());
    payload.insert(
        "threats".into(),
        Value::Array(result.threats.iter().map(|t| t.as_str().into()).collect()),
    );
    if let Some(sha256) = &result.sha256 {
        payload.insert("sha256".into(), sha256.clone().into());
    }
    payload
}

fn summary_line(path: &Path, result: &ScanResult) -> String {
    if result.safe {
        return format!("{}: clean", path.display());
    }
    let threats: Vec<&str> = result.threats.iter().map(ThreatKind::as_str).collect();
    let verdict = if should_quarantine(result) {
        "QUARANTINE"
    } else {
        "REJECT"
    };
    format!("{}: {} [{}]", path.display(), verdict, threats.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventLogConfig;
    use crate::storage::MemoryStore;
    use tempfile::TempDir;

    #[test]
    fn walk_skips_hidden_and_applies_filter() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("uploads/.cache")).unwrap();
        std::fs::write(tmp.path().join("uploads/a.png"), b"x").unwrap();
        std::fs::write(tmp.path().join("uploads/b.txt"), b"x").unwrap();
        std::fs::write(tmp.path().join("uploads/.cache/c.png"), b"x").unwrap();
        std::fs::write(tmp.path().join(".hidden.png"), b"x").unwrap();

        let filter = PathFilter::compile(&["**/*.png".to_string()], &[]).unwrap();
        let mut files = Vec::new();
        collect_files(tmp.path(), tmp.path(), &filter, &mut files).unwrap();
        assert_eq!(files, vec![tmp.path().join("uploads/a.png")]);
    }

    #[test]
    fn scan_files_keeps_order() {
        let tmp = TempDir::new().unwrap();
        let clean = tmp.path().join("notes.txt");
        let bad = tmp.path().join("tool.txt");
        std::fs::write(&clean, b"meeting notes for tuesday").unwrap();
        std::fs::write(&bad, b"MZ\x90\x00").unwrap();

        let results = tokio_test::block_on(scan_files(
            &ScannerConfig::default(),
            vec![bad.clone(), clean.clone()],
        ))
        .unwrap();
        assert_eq!(results[0].0, bad);
        assert!(results[0].1.has_threat(ThreatKind::ExecutableSignature));
        assert_eq!(results[1].0, clean);
        assert!(results[1].1.safe);
    }

    #[test]
    fn vanished_file_records_scan_error() {
        let tmp = TempDir::new().unwrap();
        let gone = tmp.path().join("gone.png");
        let results =
            tokio_test::block_on(scan_files(&ScannerConfig::default(), vec![gone.clone()])).unwrap();
        assert!(results[0].1.has_threat(ThreatKind::FileReadError));

        let log = SecurityEventLog::new(MemoryStore::new(), EventLogConfig::default());
        let ctx = RequestContext::new("192.0.2.77");
        record_unsafe(&log, &ctx, &gone, &results[0].1);

        let names: Vec<String> = log
            .events_for_ip("192.0.2.77")
            .into_iter()
            .map(|e| e.event_name)
            .collect();
        assert_eq!(names, vec!["scan_error", "upload_rejected"]);
    }

    #[test]
    fn quarantined_verdict_records_single_event() {
        let log = SecurityEventLog::new(MemoryStore::new(), EventLogConfig::default());
        let ctx = RequestContext::new("192.0.2.78");
        let result = ScanResult::from_threats(vec![ThreatKind::ExecutableSignature], "t".into());
        record_unsafe(&log, &ctx, Path::new("tool.exe"), &result);

        let events = log.events_for_ip("192.0.2.78");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_name, "malicious_file_detected");
    }

    #[test]
    fn summary_marks_quarantine() {
        let result = ScanResult::from_threats(vec![ThreatKind::EmbeddedPhp], "t".into());
        assert_eq!(
            summary_line(Path::new("x.jpg"), &result),
            "x.jpg: QUARANTINE [embedded_php]"
        );
    }
}
