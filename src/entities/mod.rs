pub mod grant_tuple;
pub mod membership_tuple;

pub use grant_tuple::Entity as GrantTuple;
pub use membership_tuple::Entity as MembershipTuple;
