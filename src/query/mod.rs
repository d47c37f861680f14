pub mod dsl;
pub mod filter;
pub mod translate;

pub use dsl::to_query_dsl;
pub use filter::{FilterNode, RangeOp, Scalar};
pub use translate::{translate, TranslateError};
