//! # ASIT Federation
//!
//! Contracts that span more than one unit:
//!
//! - [`federation`]: membership roles, quorum sizing, coordination budget, security gates.
//! - [`coalition`]: event-log replay of membership with trust decay and rekey correlation.
//! - [`orchestration`]: solver plans with acceptance bounds and a deterministic fallback.
//!
//! Each module exposes a typed `validate_*` function and a `check_*_document`
//! entry that runs the schema gate first.

pub mod coalition;
pub mod federation;
pub mod orchestration;

pub use coalition::{
    Coalition, CoalitionEvent, CoalitionMember, EventKind, Membership, MembershipState,
    RekeyPolicy, TransitionError, TrustPolicy, check_coalition_document, validate_coalition,
};
pub use federation::{
    ConsensusMode, FederationContract, FederationMember, MemberRole, check_federation_document,
    validate_federation,
};
pub use orchestration::{
    OrchestrationContract, SolverKind, SolverSpec, check_orchestration_document,
    is_deterministic_fallback, normalize_strategy, validate_orchestration,
};
