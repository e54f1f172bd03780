//! Inverted-index retrieval core and vector-per-class text classifiers.
//!
//! The crate is organized as a pipeline of small, independently testable
//! components: a [`dictionary::Dictionary`] maps terms to dense ids, a
//! [`pv`] codec stores per-term posting lists, [`wi2dvf::InvertedIndex`]
//! aggregates them into document vectors, and [`barrel::Barrel`] pairs that
//! index with per-document metadata. Classification builds a class-level
//! barrel ([`classbarrel`]) and scores queries against it ([`scoring`]).
//! Everything is threaded through an explicit [`session::Session`] rather
//! than process-wide state.

pub mod contracts;
pub mod config;
pub mod dictionary;
pub mod pv;
pub mod wi2dvf;
pub mod lexer;
pub mod wordvector;
pub mod barrel;
pub mod build;
pub mod split;
pub mod classbarrel;
pub mod smoothing;
pub mod scoring;
pub mod feature_selection;
pub mod query;
pub mod em;
pub mod session;
pub mod persist;
pub mod query_server;

pub use config::SessionConfig;
pub use dictionary::{Dictionary, TermId};
pub use session::Session;
pub use wordvector::WordVector;
