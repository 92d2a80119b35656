use std::io;
use std::os::unix::process::CommandExt;
use std::process::Command;

/// Replaces the current process with another program.
pub trait ProcessReplacer {
    /// Only returns if the replacement failed, with the reason why.
    fn replace(&mut self, program: &str, args: &[String]) -> io::Error;
}

/// execvp(3) through the standard library. The environment and open file
/// descriptors are passed on unchanged.
pub struct Exec;

impl ProcessReplacer for Exec {
    fn replace(&mut self, program: &str, args: &[String]) -> io::Error {
        Command::new(program).args(args).exec()
    }
}
