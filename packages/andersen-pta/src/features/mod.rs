//! Feature modules

pub mod points_to;
