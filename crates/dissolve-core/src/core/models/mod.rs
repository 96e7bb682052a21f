pub mod atom;
pub mod configuration;
pub mod molecule;
