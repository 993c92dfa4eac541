pub mod architecture;
pub mod context;
pub mod coverage;
pub mod cycles;
pub mod dependencies;
pub mod guards;
pub mod render;
pub mod tokenizer;
