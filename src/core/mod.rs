pub mod data;
pub mod errors;
pub mod results;
pub mod value;

pub use data::*; // Re-export common data types
pub use errors::*;
pub use results::*;
pub use value::*;
