//! Intrinsic value estimation and relative valuation multiples.

pub mod dcf;
pub mod multiples;

pub use dcf::*;
pub use multiples::*;
