//! The middle tier: the raw IR shape the backend consumes, and the text
//! parser that builds it from the frontend's Koopa IR output.

pub mod parser;
pub mod raw;

pub use parser::parse;
