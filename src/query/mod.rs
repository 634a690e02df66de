//! Backend-neutral query model: operators, the query specification and
//! post-fetch shaping

pub mod operator;
pub mod shaper;
pub mod spec;

pub use operator::{IntoOperator, Operator, SortOrder};
pub use shaper::{first_value, FilterFn, ResultShaper, ValidatorFn};
pub use spec::{
    JoinSpec, JoinStep, OrGroup, Predicate, QuerySpec, Selection, SortSpec, TableAlias,
};
