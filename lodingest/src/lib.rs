//! Ingestion engine for the lodmirror pipeline.
//!
//! `lodingest` turns heterogeneous catalog metadata into the mirror's
//! statement vocabulary and keeps the graph store consistent: the harvest
//! loop discovers changed records and enqueues per-dataset tasks, workers
//! run the dataset synchronizer (delete-then-insert upsert with identity
//! resolution), and the record processors do the dialect-specific
//! extraction.

pub mod catalog;
pub mod cursor;
pub mod errors;
pub mod harvest;
pub mod processors;
pub mod queue;
pub mod resolver;
pub mod sync;
pub mod sysmeta;
pub mod worker;
pub mod xml;
