pub use self::linker::*;
pub use self::minifier::*;
pub use self::package_loader::*;
pub use self::source_handler::*;

mod linker;
mod minifier;
mod package_loader;
mod source_handler;
