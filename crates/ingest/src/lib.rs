pub mod canonical;
pub mod normalize;
pub mod rows;

pub use canonical::canonicalize;
pub use normalize::normalize_rows;
pub use rows::{extract_rows, ExtractError};
