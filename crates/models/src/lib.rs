mod amount;
mod token;
mod swap;
mod campaign;

pub use amount::*;
pub use token::*;
pub use swap::*;
pub use campaign::*;
