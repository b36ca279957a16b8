mod helpers;
mod isk;

pub mod op;
mod secret;

pub use helpers::parse_boolean_flag;
pub use isk::{Isk, ISK_CURRENCY_CODE};
pub use secret::Secret;
