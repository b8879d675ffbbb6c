pub mod binder;
pub mod branch;
pub mod convert;
pub mod error;
pub mod evaluator;
pub mod host;
pub mod resolver;
pub mod scope;
pub mod value;

pub use evaluator::Evaluator;
