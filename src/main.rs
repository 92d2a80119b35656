use gitolite_wrapper::args::Args;
use gitolite_wrapper::logging::{init_logging, peer_from_ssh_connection};
use gitolite_wrapper::{run, Environment, Exec, UnixEnvironment};
use std::env;
use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Args::parse(env::args().skip(1));
    let env = UnixEnvironment;

    let peer = env
        .var("SSH_CONNECTION")
        .and_then(|value| peer_from_ssh_connection(&value));
    if let Err(e) = init_logging(peer.as_deref()) {
        // Only a human running --test is around to see this.
        if args.test {
            eprintln!("{e:?}");
        }
    }
    if args.debug {
        log::set_max_level(log::LevelFilter::Debug);
    }

    ExitCode::from(run(&args, &env, &mut Exec, &mut io::stdout()))
}
