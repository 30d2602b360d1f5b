pub mod extraction;
pub mod fields;
