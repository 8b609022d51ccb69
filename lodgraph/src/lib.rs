//! Graph data model and store access for the lodmirror pipeline.
//!
//! `lodgraph` owns the RDF term/statement model, the per-transaction
//! [`statement::GraphBuffer`], identifier scheme utilities, the mirror
//! vocabulary, and the [`store::GraphStore`] contract with its SPARQL and
//! in-memory backends.

pub mod error;
pub mod identifier;
pub mod statement;
pub mod store;
pub mod vocab;
