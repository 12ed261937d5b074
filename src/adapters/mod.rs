pub mod fs;
pub mod reasoner;
