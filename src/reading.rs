mod record;
mod validate;

pub use record::*;
pub use validate::*;
