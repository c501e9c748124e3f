//! Permissions - group-aware authorization engine
//!
//! Decides `(subject, resource, action)` checks from direct grants, grants held by a
//! group the subject belongs to, and the role a member holds on the group itself.
//! Policy tuples are persisted through [`authz::TupleStore`] and mirrored in memory.

pub mod authz;
pub mod entities;
pub mod errors;
pub mod settings;
pub mod storage;
