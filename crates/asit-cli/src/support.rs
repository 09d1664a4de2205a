use asit_kernel::{
    AnnotationSink, Issue, IssueSink, NullSink, RULESET_FILE, RuleSet, ValidationContext,
};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Exit code for failures that make checking meaningless (unreadable root,
/// bad ruleset, missing key). Compliance failures exit 1.
pub const EXIT_ENVIRONMENT: i32 = 2;

pub fn fail(message: impl Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(EXIT_ENVIRONMENT);
}

/// `--ruleset` if given, else the nearest `asit.toml` in `start` or its
/// ancestors, else the built-in defaults.
pub fn load_rules_or_exit(start: &Path, ruleset: Option<&str>) -> RuleSet {
    let path = match ruleset {
        Some(path) => Some(PathBuf::from(path)),
        None => find_ruleset(start),
    };
    let Some(path) = path else {
        tracing::debug!("no ruleset file found; using defaults");
        return RuleSet::default();
    };
    RuleSet::load(&path).unwrap_or_else(|e| fail(e))
}

fn find_ruleset(start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    start
        .ancestors()
        .map(|dir| dir.join(RULESET_FILE))
        .find(|candidate| candidate.is_file())
}

/// Annotation lines on stdout, or nothing when the report is printed as JSON.
pub fn context_for(rules: RuleSet, json: bool) -> ValidationContext {
    let sink: Arc<dyn IssueSink> = if json {
        Arc::new(NullSink)
    } else {
        Arc::new(AnnotationSink::new(std::io::stdout()))
    };
    ValidationContext::new(rules, sink)
}

/// Publish the run's issues and exit non-zero when any were found.
pub fn finish(ctx: &ValidationContext, issues: Vec<Issue>, json: bool) {
    let report = ctx.publish(issues);
    tracing::info!(
        result = %report.result,
        issues = report.issues.len(),
        "validation finished"
    );
    if json {
        print_json(&report);
    }
    let code = report.exit_code();
    if code != 0 {
        flush_stdout();
        std::process::exit(code);
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    let rendered = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| fail(format!("failed to render json output: {e}")));
    println!("{rendered}");
}

pub fn flush_stdout() {
    if let Err(err) = std::io::stdout().flush() {
        tracing::warn!(%err, "failed to flush stdout");
    }
}

/// File contents, or stdin for `-`.
pub fn read_text_or_exit(path: &str) -> String {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .unwrap_or_else(|e| fail(format!("failed to read stdin: {e}")));
        return text;
    }
    std::fs::read_to_string(path).unwrap_or_else(|e| fail(format!("failed to read {path}: {e}")))
}

pub fn read_json_or_exit(path: &str) -> Value {
    let text = read_text_or_exit(path);
    serde_json::from_str(&text).unwrap_or_else(|e| fail(format!("invalid json in {path}: {e}")))
}

pub fn parse_json_or_exit<T: serde::de::DeserializeOwned>(path: &str) -> T {
    serde_json::from_value(read_json_or_exit(path))
        .unwrap_or_else(|e| fail(format!("unexpected shape in {path}: {e}")))
}
