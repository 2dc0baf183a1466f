//! Category algebra: fundamental, mapped and product categories, and the
//! tables a build uses to resolve and combine them.
pub mod algebra;
pub mod error;
pub mod types;

pub use algebra::{build_fit_category, build_master_category, CompositeTable, Restrictions, SplitCategorySet};
pub use error::CategoryError;
pub use types::{Category, CategoryState, FundamentalCategory, LabelIndex, MappedCategory, ProductCategory, StateAssignment};
