// Dupescope: concept extraction and duplicate detection for document corpora
//
// This is the library root. Each module corresponds to a major subsystem;
// `analysis` ties them together.

pub mod analysis;
pub mod cache;
pub mod concepts;
pub mod config;
pub mod corpus;
pub mod output;
pub mod similarity;
