//! Permission resolution

mod resolver;

pub use resolver::PermissionResolver;
