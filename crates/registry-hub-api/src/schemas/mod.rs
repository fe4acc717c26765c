//! Configuration schema retrieval.

pub mod retrieval;

pub use retrieval::SchemaLookupService;
