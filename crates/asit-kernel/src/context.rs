//! Explicit validation context: ruleset identity, schema engine, output sink.
//!
//! Every validator takes a `&ValidationContext`; nothing is read from
//! globals, so runs are reproducible and testable in isolation.

use crate::issue::{Issue, ValidationReport, rule};
use crate::ruleset::RuleSet;
use crate::schema::{SchemaEngine, StructuralSchemaEngine};
use serde_json::Value;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Destination for issues once a run completes.
pub trait IssueSink: Send + Sync {
    fn emit(&self, issue: &Issue);
}

/// Writes one CI annotation line per issue.
pub struct AnnotationSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> AnnotationSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> IssueSink for AnnotationSink<W> {
    fn emit(&self, issue: &Issue) {
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = writeln!(out, "{}", issue.annotation()) {
            tracing::warn!(%err, "failed to write issue annotation");
        }
    }
}

/// Keeps issues in memory.
#[derive(Default)]
pub struct CollectingSink {
    issues: Mutex<Vec<Issue>>,
}

impl CollectingSink {
    pub fn issues(&self) -> Vec<Issue> {
        self.issues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl IssueSink for CollectingSink {
    fn emit(&self, issue: &Issue) {
        self.issues
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(issue.clone());
    }
}

/// Discards issues.
pub struct NullSink;

impl IssueSink for NullSink {
    fn emit(&self, _issue: &Issue) {}
}

#[derive(Clone)]
pub struct ValidationContext {
    pub rules: Arc<RuleSet>,
    pub schema: Arc<dyn SchemaEngine>,
    pub sink: Arc<dyn IssueSink>,
}

impl ValidationContext {
    pub fn new(rules: RuleSet, sink: Arc<dyn IssueSink>) -> Self {
        Self {
            rules: Arc::new(rules),
            schema: Arc::new(StructuralSchemaEngine),
            sink,
        }
    }

    /// Default ruleset, built-in schema engine, issues discarded.
    pub fn detached() -> Self {
        Self::new(RuleSet::default(), Arc::new(NullSink))
    }

    pub fn with_schema_engine(mut self, schema: Arc<dyn SchemaEngine>) -> Self {
        self.schema = schema;
        self
    }

    pub fn ruleset_version(&self) -> &str {
        &self.rules.ruleset.version
    }

    pub fn program(&self) -> &str {
        &self.rules.ruleset.program
    }

    /// Schema violations of `instance`, as issues located at `location`.
    pub fn schema_issues(&self, schema: &Value, instance: &Value, location: &str) -> Vec<Issue> {
        self.schema
            .validate(schema, instance)
            .into_iter()
            .map(|violation| Issue::schema(rule::LEAF_FIELD_PRESENT, location, violation.message))
            .collect()
    }

    /// Emit every issue through the sink and return the run's report.
    pub fn publish(&self, issues: Vec<Issue>) -> ValidationReport {
        for issue in &issues {
            self.sink.emit(issue);
        }
        ValidationReport::from_issues(self.ruleset_version(), issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_emits_annotations_in_order() {
        let sink = Arc::new(AnnotationSink::new(Vec::<u8>::new()));
        let ctx = ValidationContext::new(RuleSet::default(), sink.clone());
        let report = ctx.publish(vec![
            Issue::structural(rule::TREE_LAYER_PRESENT, "IIS/BITS", "missing layer BITS"),
            Issue::structural(rule::TREE_LEAF_PRESENT, "IIS/QUBITS/QB", "missing leaf QB"),
        ]);
        assert_eq!(report.exit_code(), 1);
        drop(ctx);
        let sink = Arc::into_inner(sink).expect("sole owner");
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            text,
            "::error file=IIS/BITS::missing layer BITS (violates TREE-1.2)\n\
             ::error file=IIS/QUBITS/QB::missing leaf QB (violates TREE-1.3)\n"
        );
    }

    #[test]
    fn collecting_sink_keeps_issues() {
        let sink = Arc::new(CollectingSink::default());
        let ctx = ValidationContext::new(RuleSet::default(), sink.clone());
        ctx.publish(vec![Issue::semantic(rule::FED_QUORUM, "f", "m")]);
        assert_eq!(sink.issues().len(), 1);
        assert_eq!(ctx.ruleset_version(), "asit.ruleset.v1");
        assert_eq!(ctx.program(), "asi-t-core-0001");
    }
}
