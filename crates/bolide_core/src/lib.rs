pub mod diagnostic;
pub mod hash;
pub mod ignore;
pub mod plugin;
pub mod types;

pub use self::diagnostic::*;
