//! Address handling: parsing user targets into ranges and CIDR blocks, and
//! enumerating local subnets for interactive selection.

pub mod interface;
pub mod range;
pub mod target;
