pub mod actor;
pub mod ride;
pub mod rider;
