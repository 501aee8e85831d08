//! Host platform (linux for example) utility functions

use std::{env, path::PathBuf};

use uname;

/// Environment variable which points at the root of the software tree.
pub const SW_ROOT_ENV: &str = "ARM_SW_ROOT";

/// Retrieve uname information.
pub fn get_uname() -> std::io::Result<uname::Info> {
    uname::uname()
}

/// Get the root directory of the software, under which `params` and `sessions` live.
///
/// This is the value of `ARM_SW_ROOT` if set, otherwise the current working directory.
pub fn get_sw_root() -> std::io::Result<PathBuf> {
    match env::var_os(SW_ROOT_ENV) {
        Some(root) => Ok(PathBuf::from(root)),
        None => env::current_dir(),
    }
}
