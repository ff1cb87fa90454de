pub mod collection;
pub mod error;
pub mod session;
pub mod template;
