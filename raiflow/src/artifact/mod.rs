//! Artifact wrapping.
//!
//! This module provides:
//! - `RawArtifact` and `ArtifactDescriptor`, the introspection contract
//! - `Capability` vocabulary and `CapabilityPredicate`
//! - `wrap`, producing immutable `Artifact`s, and `ArtifactSet`
//! - `TabularData` and `ModelArtifact`, in-process raw objects

mod capability;
mod descriptor;
mod tabular;
mod wrapper;

pub use capability::{Capability, CapabilityPredicate, CapabilitySet, InvalidCapability};
pub use descriptor::{ArtifactDescriptor, Modality, RawArtifact};
pub use tabular::{
    Classifier, ModelArtifact, SensitiveColumn, TabularData, TabularFrame, IN_MEMORY_CLASSIFIER,
    IN_MEMORY_TABULAR,
};
pub use wrapper::{
    wrap, Artifact, ArtifactKind, ArtifactSet, ArtifactWarning, CapabilityHints, DatasetRole,
};
