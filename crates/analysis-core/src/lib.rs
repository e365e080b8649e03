pub mod comparison;
pub mod currency;
pub mod error;
pub mod traits;
pub mod types;

pub use comparison::*;
pub use currency::{convert, CurrencyConvert};
pub use error::*;
pub use traits::*;
pub use types::*;
