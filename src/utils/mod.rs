pub mod crypto;
pub mod filter;
pub mod token;
pub mod validation;
