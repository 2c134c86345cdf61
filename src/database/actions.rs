//! Request-level operations. Each takes the caller's session explicitly and
//! works against any [`Store`](crate::store::Store).
pub mod attributes;
pub mod recipes;
pub mod users;
