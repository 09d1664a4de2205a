//! Coalition membership: live roster, trust decay, rekey correlation.
//!
//! The event log is replayed in timestamp order; this is the one sequential
//! check in the engine and must not be split across threads.
//!
//! Membership state machine:
//!
//! ```text
//! Proposed ──join──▶ Joined ──coordination round──▶ Active
//!                      │                             │  ▲
//!                      │                  trust < threshold
//!                      │                             ▼  │
//!                      │                          Decaying
//!                      └──── leave / trust reaches zero ───▶ Left (terminal)
//! ```
//!
//! A `Left` record never rejoins; the unit needs a fresh `Propose`.

use asit_kernel::{Issue, ValidationContext, rule};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipState {
    Proposed,
    Joined,
    Active,
    Decaying,
    Left,
}

impl fmt::Display for MembershipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Propose,
    Join,
    CoordinationRound,
    Leave,
    Rekey,
    TrustUpdate,
}

impl EventKind {
    /// Membership changes that must be followed by a rekey.
    pub fn is_membership_change(self) -> bool {
        matches!(self, EventKind::Join | EventKind::Leave)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoalitionEvent {
    pub at: DateTime<Utc>,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoalitionMember {
    pub unit_id: String,
    pub trust_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustPolicy {
    pub decay_per_minute: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RekeyPolicy {
    pub interval_minutes: f64,
    pub rekey_on_event: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coalition {
    pub coalition_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation_id: Option<String>,
    #[serde(default)]
    pub members: Vec<CoalitionMember>,
    pub trust_policy: TrustPolicy,
    pub rekey_policy: RekeyPolicy,
    #[serde(default)]
    pub events: Vec<CoalitionEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: MembershipState,
    pub event: EventKind,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is not allowed from state {}", self.event, self.from)
    }
}

fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}

/// One membership record of one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Membership {
    pub unit_id: String,
    state: MembershipState,
    trust_score: f64,
    trust_as_of: DateTime<Utc>,
}

impl Membership {
    pub fn propose(unit_id: impl Into<String>, at: DateTime<Utc>, trust_score: f64) -> Self {
        Self {
            unit_id: unit_id.into(),
            state: MembershipState::Proposed,
            trust_score,
            trust_as_of: at,
        }
    }

    /// Trust at `at`, decayed linearly since the last update, floored at zero.
    pub fn trust_at(&self, at: DateTime<Utc>, policy: &TrustPolicy) -> f64 {
        let elapsed = minutes_between(self.trust_as_of, at).max(0.0);
        (self.trust_score - policy.decay_per_minute * elapsed).max(0.0)
    }

    /// State at `at`, with trust decay applied.
    pub fn state_at(&self, at: DateTime<Utc>, policy: &TrustPolicy) -> MembershipState {
        match self.state {
            MembershipState::Proposed | MembershipState::Left => self.state,
            MembershipState::Joined => {
                if self.trust_at(at, policy) <= 0.0 {
                    MembershipState::Left
                } else {
                    MembershipState::Joined
                }
            }
            MembershipState::Active | MembershipState::Decaying => {
                let trust = self.trust_at(at, policy);
                if trust <= 0.0 {
                    MembershipState::Left
                } else if trust < policy.threshold {
                    MembershipState::Decaying
                } else {
                    MembershipState::Active
                }
            }
        }
    }

    fn settle(&mut self, at: DateTime<Utc>, policy: &TrustPolicy) {
        self.state = self.state_at(at, policy);
    }

    fn refuse(&self, event: EventKind) -> TransitionError {
        TransitionError {
            from: self.state,
            event,
        }
    }

    pub fn join(&mut self, at: DateTime<Utc>, policy: &TrustPolicy) -> Result<(), TransitionError> {
        self.settle(at, policy);
        if self.state != MembershipState::Proposed {
            return Err(self.refuse(EventKind::Join));
        }
        self.state = MembershipState::Joined;
        Ok(())
    }

    pub fn coordinate(
        &mut self,
        at: DateTime<Utc>,
        policy: &TrustPolicy,
    ) -> Result<(), TransitionError> {
        self.settle(at, policy);
        match self.state {
            MembershipState::Joined => {
                self.state = MembershipState::Active;
                self.settle(at, policy);
                Ok(())
            }
            MembershipState::Active | MembershipState::Decaying => Ok(()),
            MembershipState::Proposed | MembershipState::Left => {
                Err(self.refuse(EventKind::CoordinationRound))
            }
        }
    }

    pub fn leave(&mut self, at: DateTime<Utc>, policy: &TrustPolicy) -> Result<(), TransitionError> {
        self.settle(at, policy);
        match self.state {
            MembershipState::Joined | MembershipState::Active | MembershipState::Decaying => {
                self.state = MembershipState::Left;
                Ok(())
            }
            MembershipState::Proposed | MembershipState::Left => Err(self.refuse(EventKind::Leave)),
        }
    }

    pub fn update_trust(
        &mut self,
        at: DateTime<Utc>,
        score: f64,
        policy: &TrustPolicy,
    ) -> Result<(), TransitionError> {
        self.settle(at, policy);
        if self.state == MembershipState::Left {
            return Err(self.refuse(EventKind::TrustUpdate));
        }
        self.trust_score = score;
        self.trust_as_of = at;
        self.settle(at, policy);
        Ok(())
    }
}

impl Coalition {
    fn initial_trust(&self, unit_id: &str) -> f64 {
        self.members
            .iter()
            .find(|m| m.unit_id == unit_id)
            .map(|m| m.trust_score)
            .unwrap_or(1.0)
    }

    /// Events ordered by timestamp; at equal timestamps membership events
    /// come before rekeys, otherwise log order is kept.
    pub fn ordered_events(&self) -> Vec<&CoalitionEvent> {
        let mut ordered: Vec<&CoalitionEvent> = self.events.iter().collect();
        ordered.sort_by_key(|event| (event.at, event.kind == EventKind::Rekey));
        ordered
    }

    /// Membership states at `at`, replaying every event up to it.
    pub fn live_states(&self, at: DateTime<Utc>) -> BTreeMap<String, MembershipState> {
        let mut ledger = Ledger::default();
        for event in self.ordered_events() {
            if event.at > at {
                break;
            }
            let _ = ledger.apply(self, event);
        }
        ledger
            .records
            .iter()
            .map(|(id, record)| (id.clone(), record.state_at(at, &self.trust_policy)))
            .collect()
    }

    /// Whether the rekey interval has elapsed since the last rekey at or before `at`.
    pub fn rekey_due(&self, at: DateTime<Utc>) -> bool {
        let last = self
            .events
            .iter()
            .filter(|e| e.kind == EventKind::Rekey && e.at <= at)
            .map(|e| e.at)
            .max();
        match last {
            Some(last) => minutes_between(last, at) >= self.rekey_policy.interval_minutes,
            None => true,
        }
    }
}

#[derive(Default)]
struct Ledger {
    records: BTreeMap<String, Membership>,
}

impl Ledger {
    fn apply(&mut self, coalition: &Coalition, event: &CoalitionEvent) -> Result<(), String> {
        let policy = &coalition.trust_policy;
        if event.kind == EventKind::Rekey {
            return Ok(());
        }
        if event.kind == EventKind::CoordinationRound && event.unit_id.is_none() {
            for record in self.records.values_mut() {
                let state = record.state_at(event.at, policy);
                if matches!(
                    state,
                    MembershipState::Joined | MembershipState::Active | MembershipState::Decaying
                ) {
                    let _ = record.coordinate(event.at, policy);
                }
            }
            return Ok(());
        }
        let Some(unit_id) = event.unit_id.as_deref() else {
            return Err(format!("{} event at {} has no unit_id", event.kind, event.at));
        };

        match event.kind {
            EventKind::Propose => {
                if let Some(record) = self.records.get(unit_id) {
                    let state = record.state_at(event.at, policy);
                    if state != MembershipState::Left {
                        return Err(format!(
                            "Propose for {unit_id} while its membership is {state}"
                        ));
                    }
                }
                self.records.insert(
                    unit_id.to_string(),
                    Membership::propose(unit_id, event.at, coalition.initial_trust(unit_id)),
                );
                Ok(())
            }
            EventKind::Join => {
                let record = self.records.entry(unit_id.to_string()).or_insert_with(|| {
                    Membership::propose(unit_id, event.at, coalition.initial_trust(unit_id))
                });
                record.join(event.at, policy).map_err(|err| {
                    if err.from == MembershipState::Left {
                        format!("{unit_id} left earlier and cannot rejoin without a new Propose")
                    } else {
                        format!("{unit_id}: {err}")
                    }
                })
            }
            EventKind::CoordinationRound | EventKind::Leave | EventKind::TrustUpdate => {
                let Some(record) = self.records.get_mut(unit_id) else {
                    return Err(format!("{} for unknown member {unit_id}", event.kind));
                };
                let result = match event.kind {
                    EventKind::CoordinationRound => record.coordinate(event.at, policy),
                    EventKind::Leave => record.leave(event.at, policy),
                    _ => {
                        let Some(score) = event.trust_score else {
                            return Err(format!(
                                "TrustUpdate for {unit_id} at {} has no trust_score",
                                event.at
                            ));
                        };
                        record.update_trust(event.at, score, policy)
                    }
                };
                result.map_err(|err| format!("{unit_id}: {err}"))
            }
            EventKind::Rekey => Ok(()),
        }
    }
}

pub fn coalition_schema() -> Value {
    json!({
        "type": "object",
        "required": ["coalition_id", "trust_policy", "rekey_policy", "events"],
        "properties": {
            "coalition_id": {"type": "string", "minLength": 1},
            "federation_id": {"type": "string"},
            "members": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["unit_id", "trust_score"],
                    "properties": {
                        "unit_id": {"type": "string", "minLength": 1},
                        "trust_score": {"type": "number"}
                    }
                }
            },
            "trust_policy": {
                "type": "object",
                "required": ["decay_per_minute", "threshold"],
                "properties": {
                    "decay_per_minute": {"type": "number"},
                    "threshold": {"type": "number"}
                }
            },
            "rekey_policy": {
                "type": "object",
                "required": ["interval_minutes", "rekey_on_event"],
                "properties": {
                    "interval_minutes": {"type": "number"},
                    "rekey_on_event": {"type": "boolean"}
                }
            },
            "events": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["at", "kind"],
                    "properties": {
                        "at": {"type": "string"},
                        "kind": {"type": "string"},
                        "unit_id": {"type": "string"},
                        "trust_score": {"type": "number"}
                    }
                }
            }
        }
    })
}

fn in_unit_range(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

/// Replay the coalition log and report policy violations.
pub fn validate_coalition(coalition: &Coalition, location: &str) -> Vec<Issue> {
    let mut issues = Vec::new();
    let semantic = |rule: &str, message: String| Issue::semantic(rule, location, message);

    for member in &coalition.members {
        if !in_unit_range(member.trust_score) {
            issues.push(semantic(
                rule::COAL_TRUST_SCORE,
                format!(
                    "member {} trust_score {} is outside [0, 1]",
                    member.unit_id, member.trust_score
                ),
            ));
        }
    }
    let policy = &coalition.trust_policy;
    if !(policy.decay_per_minute.is_finite() && policy.decay_per_minute >= 0.0) {
        issues.push(semantic(
            rule::COAL_TRUST_SCORE,
            format!(
                "trust_policy.decay_per_minute must be non-negative (actual={})",
                policy.decay_per_minute
            ),
        ));
    }
    if !in_unit_range(policy.threshold) {
        issues.push(semantic(
            rule::COAL_TRUST_SCORE,
            format!("trust_policy.threshold {} is outside [0, 1]", policy.threshold),
        ));
    }

    for pair in coalition.events.windows(2) {
        if pair[1].at < pair[0].at {
            issues.push(semantic(
                rule::COAL_EVENT_ORDER,
                format!(
                    "{} at {} is logged after {} at {}",
                    pair[1].kind, pair[1].at, pair[0].kind, pair[0].at
                ),
            ));
        }
    }

    let ordered = coalition.ordered_events();
    let mut ledger = Ledger::default();
    let mut pending: Vec<&CoalitionEvent> = Vec::new();
    for event in &ordered {
        if let Err(message) = ledger.apply(coalition, event) {
            issues.push(semantic(rule::COAL_MEMBERSHIP_TRANSITION, message));
        }
        if let Some(score) = event.trust_score
            && !in_unit_range(score)
        {
            issues.push(semantic(
                rule::COAL_TRUST_SCORE,
                format!("trust_score {score} at {} is outside [0, 1]", event.at),
            ));
        }
        match event.kind {
            EventKind::Rekey => pending.clear(),
            kind if kind.is_membership_change() => pending.push(event),
            _ => {}
        }
    }
    if coalition.rekey_policy.rekey_on_event {
        for event in pending {
            issues.push(semantic(
                rule::COAL_REKEY_ON_EVENT,
                format!(
                    "{} of {} at {} has no rekey at or after it",
                    event.kind,
                    event.unit_id.as_deref().unwrap_or("<unknown>"),
                    event.at
                ),
            ));
        }
    }

    issues.extend(check_rekey_interval(coalition, &ordered, location));
    tracing::debug!(
        coalition = %coalition.coalition_id,
        events = ordered.len(),
        issues = issues.len(),
        "coalition replayed"
    );
    issues
}

fn check_rekey_interval(
    coalition: &Coalition,
    ordered: &[&CoalitionEvent],
    location: &str,
) -> Vec<Issue> {
    let interval = coalition.rekey_policy.interval_minutes;
    if !(interval.is_finite() && interval > 0.0) {
        return vec![Issue::semantic(
            rule::COAL_REKEY_INTERVAL,
            location,
            format!("rekey_policy.interval_minutes must be positive (actual={interval})"),
        )];
    }
    let (Some(first), Some(last)) = (ordered.first(), ordered.last()) else {
        return Vec::new();
    };

    let mut issues = Vec::new();
    let mut previous = first.at;
    let rekeys = ordered.iter().filter(|e| e.kind == EventKind::Rekey).map(|e| e.at);
    for at in rekeys.chain(std::iter::once(last.at)) {
        let gap = minutes_between(previous, at);
        if gap > interval {
            issues.push(Issue::semantic(
                rule::COAL_REKEY_INTERVAL,
                location,
                format!(
                    "no rekey between {previous} and {at} ({gap:.1} min exceeds {interval} min interval)"
                ),
            ));
        }
        previous = at;
    }
    issues
}

/// Schema check, then log replay.
pub fn check_coalition_document(
    document: &Value,
    location: &str,
    ctx: &ValidationContext,
) -> Vec<Issue> {
    let issues = ctx.schema_issues(&coalition_schema(), document, location);
    if !issues.is_empty() {
        return issues;
    }
    match serde_json::from_value::<Coalition>(document.clone()) {
        Ok(coalition) => validate_coalition(&coalition, location),
        Err(err) => vec![Issue::schema(
            rule::LEAF_FIELD_PRESENT,
            location,
            format!("coalition record is malformed: {err}"),
        )],
    }
}
