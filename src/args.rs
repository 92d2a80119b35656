const DEFAULT_SHELL_PATH: &str = "gitolite-shell";

/// Argument parsing.
#[derive(Debug, Eq, PartialEq)]
pub struct Args {
    /// Print the resolved user name instead of starting the shell.
    pub test: bool,
    pub debug: bool,
    pub shell_path: String,
}

impl Default for Args {
    fn default() -> Self {
        Args {
            test: false,
            debug: false,
            shell_path: String::from(DEFAULT_SHELL_PATH),
        }
    }
}

impl Args {
    /// Parses args, not including the program name, and returns an Args
    /// instance. Unknown arguments are ignored, and so is a blank shell path.
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut result = Args::default();
        let mut expect_shell_path = false;

        for arg in args {
            let arg = arg.as_ref();
            if expect_shell_path {
                let trimmed = arg.trim();
                if !trimmed.is_empty() {
                    result.shell_path = trimmed.into();
                }
                expect_shell_path = false;
                continue;
            }
            match arg {
                "-t" | "--test" => result.test = true,
                "-d" | "--debug" => result.debug = true,
                "-s" | "--shell" => expect_shell_path = true,
                _ => {}
            }
        }
        result
    }
}

#[cfg(test)]
mod test {
    use crate::args::Args;

    macro_rules! args {
        () => {
            Args::parse(Vec::<&str>::new())
        };
        ( $( $x:expr ),+ ) => {
            Args::parse(vec![$( $x ),+])
        };
    }

    #[test]
    fn test_parse() {
        let expected = Args::default();
        assert_eq!(expected, args!());

        let expected = Args {
            test: true,
            ..Default::default()
        };
        assert_eq!(expected, args!("-t"));
        assert_eq!(expected, args!("--test"));

        let expected = Args {
            debug: true,
            shell_path: "/usr/share/gitolite3/gitolite-shell".into(),
            ..Default::default()
        };
        assert_eq!(
            expected,
            args!("--debug", "-s", "/usr/share/gitolite3/gitolite-shell")
        );
        assert_eq!(
            expected,
            args!("-s", "  /usr/share/gitolite3/gitolite-shell\t", "-d")
        );
    }

    #[test]
    fn test_parse_shell_edge_cases() {
        // a blank value keeps the default, and is not parsed as a flag
        assert_eq!(Args::default(), args!("--shell", "   "));
        // a trailing --shell is ignored
        assert_eq!(Args::default(), args!("--shell"));
        // the value following --shell is taken verbatim, even if it looks like a flag
        let expected = Args {
            shell_path: "-t".into(),
            ..Default::default()
        };
        assert_eq!(expected, args!("-s", "-t"));
        // unknown arguments are ignored
        assert_eq!(Args::default(), args!("git-upload-pack", "'repo.git'"));
    }
}
