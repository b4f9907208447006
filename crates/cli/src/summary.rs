use std::path::{Path, PathBuf};
use fluidvid::{Job, RunReport};
use humansize::{format_size, DECIMAL};

/// One produced file and its size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Outputs of `queue` that exist on disk, in queue order
pub fn collect_artifacts(queue: &[Job]) -> Vec<Artifact> {
    queue
        .iter()
        .filter_map(|job| {
            let meta = std::fs::metadata(&job.output).ok()?;
            meta.is_file().then(|| Artifact {
                path: job.output.clone(),
                bytes: meta.len(),
            })
        })
        .collect()
}

/// Lines printed after the dashboard is gone
pub fn render(report: &RunReport, artifacts: &[Artifact], output_dir: &Path, log_path: &Path, width: usize) -> Vec<String> {
    let rule = "-".repeat(width);
    let mut lines = vec![String::new(), rule.clone()];

    if report.all_succeeded() {
        lines.push("✔ All conversions completed successfully!".to_string());
    } else {
        lines.push(format!(
            "✘ {} of {} jobs failed (see {})",
            report.failed.len(),
            report.total(),
            log_path.display()
        ));
        for label in &report.failed {
            lines.push(format!("   - {}", label));
        }
    }
    lines.push(format!("📁 Output directory: {}", output_dir.display()));

    for artifact in artifacts {
        let name = artifact
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        lines.push(format!("   {:<28} {:>10}", name, format_size(artifact.bytes, DECIMAL)));
    }

    lines.push(rule);
    lines.push(String::new());
    lines
}

pub fn print(report: &RunReport, queue: &[Job], output_dir: &Path, log_path: &Path) {
    let width = crossterm::terminal::size().map(|(w, _)| w as usize).unwrap_or(80);
    for line in render(report, &collect_artifacts(queue), output_dir, log_path, width) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluidvid::{build_queue, hardware::resolve_encoder_profiles, QueueSpec};

    #[test]
    fn clean_run_says_so() {
        let report = RunReport {
            succeeded: 3,
            failed: vec![],
        };
        let lines = render(&report, &[], Path::new("/out"), Path::new("/out/fluidvid.log"), 20);
        assert_eq!(lines[1], "-".repeat(20));
        assert_eq!(lines[2], "✔ All conversions completed successfully!");
        assert_eq!(lines[3], "📁 Output directory: /out");
    }

    #[test]
    fn partial_failure_is_not_reported_as_success() {
        let report = RunReport {
            succeeded: 5,
            failed: vec!["480p (VP9 (CPU))".to_string()],
        };
        let lines = render(&report, &[], Path::new("/out"), Path::new("/out/fluidvid.log"), 10);
        assert!(!lines.iter().any(|l| l.contains("successfully")));
        assert_eq!(lines[2], "✘ 1 of 6 jobs failed (see /out/fluidvid.log)");
        assert_eq!(lines[3], "   - 480p (VP9 (CPU))");
    }

    #[test]
    fn artifacts_list_existing_outputs_only() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        let queue = build_queue(
            &QueueSpec {
                input: &input,
                output_dir: dir.path(),
                sizes: &[480],
            },
            &resolve_encoder_profiles(None),
        );
        std::fs::write(dir.path().join("video-480p.mp4"), vec![0u8; 1500]).unwrap();
        std::fs::write(dir.path().join("video-480p-poster.jpg"), b"jpg").unwrap();

        let artifacts = collect_artifacts(&queue);
        assert_eq!(artifacts.len(), 2);
        assert!(artifacts[0].path.ends_with("video-480p-poster.jpg"));
        assert_eq!(artifacts[1].bytes, 1500);

        let report = RunReport {
            succeeded: 2,
            failed: vec!["480p (VP9 (CPU))".to_string()],
        };
        let lines = render(&report, &artifacts, dir.path(), &dir.path().join("fluidvid.log"), 40);
        assert!(lines.iter().any(|l| l.contains("video-480p.mp4") && l.contains("kB")));
    }
}
