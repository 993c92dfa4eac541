pub mod complexity;
pub mod filesystem;
pub mod graph;
pub mod imports;
pub mod parser;
pub mod pipeline;
pub mod symbols;
pub mod tags;
