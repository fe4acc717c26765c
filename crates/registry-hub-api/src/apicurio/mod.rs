//! Artifact-registry integration: mirroring configuration schemas into
//! Apicurio as versioned JSON artifacts.

pub mod client;

pub use client::{
    ApicurioClient, ArtifactError, ArtifactMetadata, ArtifactRef, ArtifactRegistryClient,
};
