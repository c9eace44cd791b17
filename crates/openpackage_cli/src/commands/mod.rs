mod auth;
mod init;
mod inspect;
mod install;
mod package;
mod sync;

pub use auth::{configure, login, logout};
pub use init::init;
pub use inspect::{list, show, status};
pub use install::install;
pub use package::{add, delete, duplicate, pack, prune, save, uninstall};
pub use sync::{pull, push};
