pub mod country;
pub mod package;
