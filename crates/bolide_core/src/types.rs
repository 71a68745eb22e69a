// Re-export this from core so pipeline crates name one source of truth
pub use bolide_filesystem::FileSystem;
pub use bolide_filesystem::FileSystemRef;

pub use self::environment::*;
pub use self::manifest::*;
pub use self::package::*;
pub use self::resource::*;
pub use self::role::*;

mod environment;
mod manifest;
mod package;
mod resource;
mod role;
