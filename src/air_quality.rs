mod aggregate;
mod average;
mod category;
mod machine;
mod reading;

pub use aggregate::*;
pub use average::*;
pub use category::*;
pub use machine::*;
pub use reading::*;
