//! a2a-core: shared types, config, and error taxonomy for the A2A
//! cognitive-hardening layer (Gateway, Org Kernel, Ontology/Memory Engine).
//!
//! Re-exports the Task/Role/SALUTE/Belief/Memory/Entity vocabulary so every
//! other workspace crate shares one definition.

pub mod belief;
pub mod config;
pub mod entity;
pub mod error;
pub mod memory_doc;
pub mod role;
pub mod salute;
pub mod task;

pub use belief::{BeliefState, DomainDef, SlotDef, SlotResolver, SlotTaxonomy, TriggerPhrase};
pub use config::{
    AgentConnectionConfig, AuthScheme, AuthenticationConfig, DeduplicationConfig, GatewayConfig, MaintenanceConfig,
    OntologyConfig, RelatedMemoriesConfig, TaskQueueConfig,
};
pub use entity::{CandidateEntity, EntityProperties, NormalizedFields, Provenance, Relationship, RelationshipHint};
pub use error::{BridgeError, InternalError, ProtocolError, ResolutionError};
pub use memory_doc::{Area, Classification, Lineage, MemoryDocument, OneOrMany, OntologyLink, Relevance, Source, Utility, Validity};
pub use role::{Capabilities, Doctrine, Organization, PacePlan, PaceTrigger, RoleProfile, RoleType};
pub use salute::{Activity, AgentState, Environment, Health, Location, PaceLevel, SaluteReport, Status, Time, Unit};
pub use task::{Artifact, ArtifactMetadata, ArtifactPart, HistoryRole, HistoryTurn, Task, TaskState};
