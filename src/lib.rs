pub mod args;
pub mod buffer;
pub mod certificate;
pub mod environment;
pub mod exec;
pub mod logging;
pub mod user_auth;

pub use crate::buffer::ByteBuffer;
pub use crate::certificate::extract_principal;
pub use crate::environment::{Environment, UnixEnvironment};
pub use crate::exec::{Exec, ProcessReplacer};
pub use crate::user_auth::find_public_key;

use crate::args::Args;
use crate::certificate::is_supported_certificate_type;
use log::{debug, error, info, warn};
use std::io::Write;
use std::path::Path;

/// Set by sshd when `ExposeAuthInfo` is enabled.
pub const USER_AUTH_VAR: &str = "SSH_USER_AUTH";

/// Reads the user-auth blob named by `SSH_USER_AUTH`. A missing variable,
/// an unreadable file and an empty file all mean there is nothing to go on.
pub fn load_user_auth(env: &dyn Environment) -> Option<ByteBuffer> {
    let path = match env.var(USER_AUTH_VAR) {
        Some(path) if !path.is_empty() => path,
        _ => {
            debug!("{USER_AUTH_VAR} is not set");
            return None;
        }
    };
    match env.read_file(Path::new(&path)) {
        Ok(content) if content.is_empty() => {
            debug!("'{path}' is empty");
            None
        }
        Ok(content) => Some(content),
        Err(e) => {
            warn!("Failed to read '{path}': {e}");
            None
        }
    }
}

/// Finds the gitolite user name in a user-auth blob.
///
/// The first public key line is used. It has to name one of the supported
/// certificate types and carry a `gitolite:` principal, anything else
/// resolves to no user. Errors are logged and never substituted by a
/// default.
pub fn resolve_username(content: &ByteBuffer) -> Option<String> {
    let Some(line) = find_public_key(content.as_bytes()) else {
        info!("No publickey line in user-auth data");
        return None;
    };
    let (key_type, key) = match line.slices(content) {
        Ok(slices) => slices,
        Err(e) => {
            error!("Scanner produced an invalid range: {e}");
            return None;
        }
    };
    if !is_supported_certificate_type(key_type.as_bytes()) {
        warn!(
            "Key type '{}' is not a supported certificate type",
            key_type.to_string_lossy()
        );
        return None;
    }
    let Some(certificate) = key.decode_base64() else {
        warn!("Key of type '{}' is not valid base64", key_type.to_string_lossy());
        return None;
    };
    match extract_principal(&certificate) {
        Ok(Some(username)) => {
            info!("Certificate maps to gitolite user '{username}'");
            Some(username)
        }
        Ok(None) => {
            info!("Certificate has no gitolite principal");
            None
        }
        Err(e) => {
            error!("Failed to read certificate: {e}");
            None
        }
    }
}

/// Runs the wrapper and returns the process exit code.
///
/// In test mode the user name is written to `out`. Otherwise the current
/// process is replaced by the gitolite shell, which only returns here if
/// that failed.
pub fn run(
    args: &Args,
    env: &dyn Environment,
    shell: &mut impl ProcessReplacer,
    out: &mut impl Write,
) -> u8 {
    let username = load_user_auth(env).and_then(|content| resolve_username(&content));

    if args.test {
        return match username {
            Some(username) => match writeln!(out, "{username}") {
                Ok(()) => 0,
                Err(e) => {
                    error!("Failed to write user name: {e}");
                    1
                }
            },
            None => 1,
        };
    }

    let shell_args: Vec<String> = username.into_iter().collect();
    debug!("Executing {} {:?}", args.shell_path, shell_args);
    let err = shell.replace(&args.shell_path, &shell_args);
    error!("Failed to execute '{}': {err}", args.shell_path);
    1
}
