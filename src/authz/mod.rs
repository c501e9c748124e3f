pub mod admins;
pub mod engine;
pub mod errors;
pub mod store;
pub mod types;

pub use admins::AdminRegistry;
pub use engine::{AuthorizationEngine, Decision};
pub use errors::AuthzError;
pub use store::{MemoryTupleStore, StoreError, TupleStore};
pub use types::{Action, GrantTuple, MembershipTuple, Role, Tuple, TupleIndex, TuplePattern};
