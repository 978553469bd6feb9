mod cte;
mod merge;
mod source;

pub use cte::*;
pub use merge::*;
pub use source::*;
