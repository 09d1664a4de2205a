//! Solver orchestration contracts.
//!
//! A contract names the solvers allowed to attack a problem class, the
//! acceptance bounds for their answers, and a deterministic fallback that
//! must exist for every plan.

use asit_kernel::{Issue, ValidationContext, rule};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Fallback strategies that always produce the same answer for the same input.
pub const DETERMINISTIC_FALLBACKS: [&str; 6] = [
    "greedy",
    "branch_and_bound",
    "dynamic_programming",
    "simplex",
    "milp_exact",
    "rule_based",
];

/// Strategies that are explicitly rejected as fallbacks.
pub const PROBABILISTIC_STRATEGIES: [&str; 5] = [
    "qaoa",
    "vqe",
    "quantum_annealing",
    "simulated_annealing",
    "genetic",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    Classical,
    Quantum,
    Hybrid,
}

impl FromStr for SolverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classical" => Ok(SolverKind::Classical),
            "quantum" => Ok(SolverKind::Quantum),
            "hybrid" => Ok(SolverKind::Hybrid),
            _ => Err(format!("unknown solver kind {s:?}")),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SolverKind::Classical => "classical",
            SolverKind::Quantum => "quantum",
            SolverKind::Hybrid => "hybrid",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverSpec {
    pub name: String,
    pub kind: String,
    pub time_budget_ms: f64,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acceptance {
    pub max_gap_pct: f64,
    #[serde(default)]
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationContract {
    pub problem_class: String,
    pub solvers: Vec<SolverSpec>,
    pub acceptance: Acceptance,
    pub fallback_strategy: String,
}

/// `Branch-And-Bound` and `branch_and_bound` name the same strategy.
pub fn normalize_strategy(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('-', "_")
}

pub fn is_deterministic_fallback(name: &str) -> bool {
    let normalized = normalize_strategy(name);
    DETERMINISTIC_FALLBACKS.contains(&normalized.as_str())
}

impl OrchestrationContract {
    /// Solvers tried in order, ending with the fallback.
    pub fn plan(&self) -> Vec<&str> {
        self.solvers
            .iter()
            .map(|s| s.name.as_str())
            .chain(std::iter::once(self.fallback_strategy.as_str()))
            .collect()
    }

    /// Whether an answer with the given optimality gap is acceptable.
    pub fn accepts_gap(&self, gap_pct: f64) -> bool {
        gap_pct.is_finite() && gap_pct >= 0.0 && gap_pct <= self.acceptance.max_gap_pct
    }
}

pub fn orchestration_schema() -> Value {
    json!({
        "type": "object",
        "required": ["problem_class", "solvers", "acceptance", "fallback_strategy"],
        "properties": {
            "problem_class": {"type": "string", "minLength": 1},
            "solvers": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name", "kind", "time_budget_ms"],
                    "properties": {
                        "name": {"type": "string", "minLength": 1},
                        "kind": {"type": "string"},
                        "time_budget_ms": {"type": "number"},
                        "parameters": {"type": "object"}
                    }
                }
            },
            "acceptance": {
                "type": "object",
                "required": ["max_gap_pct", "constraints"],
                "properties": {
                    "max_gap_pct": {"type": "number"},
                    "constraints": {"type": "array", "items": {"type": "string"}}
                }
            },
            "fallback_strategy": {"type": "string", "minLength": 1}
        }
    })
}

pub fn validate_orchestration(contract: &OrchestrationContract, location: &str) -> Vec<Issue> {
    let mut issues = Vec::new();
    let semantic = |rule: &str, message: String| Issue::semantic(rule, location, message);

    if contract.solvers.is_empty() {
        issues.push(semantic(
            rule::ORCH_SOLVERS,
            "solvers must list at least one solver".to_string(),
        ));
    }
    let mut names = BTreeSet::new();
    for solver in &contract.solvers {
        if !names.insert(solver.name.as_str()) {
            issues.push(semantic(
                rule::ORCH_SOLVERS,
                format!("solver {} is listed more than once", solver.name),
            ));
        }
        if solver.kind.parse::<SolverKind>().is_err() {
            issues.push(semantic(
                rule::ORCH_SOLVERS,
                format!(
                    "solver {} has kind {:?}; expected classical, quantum or hybrid",
                    solver.name, solver.kind
                ),
            ));
        }
        if !(solver.time_budget_ms.is_finite() && solver.time_budget_ms > 0.0) {
            issues.push(semantic(
                rule::ORCH_SOLVERS,
                format!(
                    "solver {} time_budget_ms must be positive (actual={})",
                    solver.name, solver.time_budget_ms
                ),
            ));
        }
    }

    let gap = contract.acceptance.max_gap_pct;
    if !(gap.is_finite() && (0.0..=100.0).contains(&gap)) {
        issues.push(semantic(
            rule::ORCH_MAX_GAP,
            format!("acceptance.max_gap_pct must lie in [0, 100] (actual={gap})"),
        ));
    }

    for (idx, constraint) in contract.acceptance.constraints.iter().enumerate() {
        if constraint.trim().is_empty() {
            issues.push(semantic(
                rule::ORCH_CONSTRAINTS,
                format!("acceptance.constraints[{idx}] must be a non-empty string"),
            ));
        }
    }

    let fallback = normalize_strategy(&contract.fallback_strategy);
    if PROBABILISTIC_STRATEGIES.contains(&fallback.as_str()) {
        issues.push(semantic(
            rule::ORCH_FALLBACK,
            format!(
                "fallback_strategy {:?} is probabilistic; a deterministic classical fallback is required",
                contract.fallback_strategy
            ),
        ));
    } else if !DETERMINISTIC_FALLBACKS.contains(&fallback.as_str()) {
        issues.push(semantic(
            rule::ORCH_FALLBACK,
            format!(
                "fallback_strategy {:?} is not a known deterministic strategy ({})",
                contract.fallback_strategy,
                DETERMINISTIC_FALLBACKS.join(", ")
            ),
        ));
    }

    issues
}

/// Schema check, then typed contract rules.
pub fn check_orchestration_document(
    document: &Value,
    location: &str,
    ctx: &ValidationContext,
) -> Vec<Issue> {
    let issues = ctx.schema_issues(&orchestration_schema(), document, location);
    if !issues.is_empty() {
        return issues;
    }
    match serde_json::from_value::<OrchestrationContract>(document.clone()) {
        Ok(contract) => validate_orchestration(&contract, location),
        Err(err) => vec![Issue::schema(
            rule::LEAF_FIELD_PRESENT,
            location,
            format!("orchestration contract is malformed: {err}"),
        )],
    }
}
