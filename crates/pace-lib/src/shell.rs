//! Shell resolution for task and hook bodies.

use std::collections::BTreeMap;

/// Builds the OS-appropriate shell invocation for a command string.
///
/// `SHELL` and `SHELL_ARGS` in the config globals take precedence; otherwise
/// POSIX platforms get `sh -c` and Windows gets `powershell.exe -Command`.
#[derive(Debug, Clone)]
pub struct ShellLauncher {
    globals: BTreeMap<String, String>,
}

impl ShellLauncher {
    pub fn new(globals: BTreeMap<String, String>) -> Self {
        Self { globals }
    }

    /// The shell executable and the prefix arguments that precede the
    /// command string.
    pub fn shell_command(&self) -> (String, Vec<String>) {
        if let Some(shell) = self.globals.get("SHELL") {
            let args = match self.globals.get("SHELL_ARGS") {
                Some(shell_args) => shell_args.split_whitespace().map(String::from).collect(),
                None => vec!["-c".to_string()],
            };
            return (shell.clone(), args);
        }

        if cfg!(windows) {
            ("powershell.exe".to_string(), vec!["-Command".to_string()])
        } else {
            ("sh".to_string(), vec!["-c".to_string()])
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn globals(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_platform_default() {
        let launcher = ShellLauncher::new(BTreeMap::new());
        let (shell, args) = launcher.shell_command();
        if cfg!(windows) {
            assert_eq!(shell, "powershell.exe");
            assert_eq!(args, vec!["-Command"]);
        } else {
            assert_eq!(shell, "sh");
            assert_eq!(args, vec!["-c"]);
        }
    }

    #[test]
    fn test_shell_override_gets_dash_c() {
        let launcher = ShellLauncher::new(globals(&[("SHELL", "bash")]));
        assert_eq!(
            launcher.shell_command(),
            ("bash".to_string(), vec!["-c".to_string()])
        );
    }

    #[test]
    fn test_shell_args_split_on_whitespace() {
        let launcher = ShellLauncher::new(globals(&[
            ("SHELL", "bash"),
            ("SHELL_ARGS", "--noprofile  -c"),
        ]));
        assert_eq!(
            launcher.shell_command(),
            (
                "bash".to_string(),
                vec!["--noprofile".to_string(), "-c".to_string()]
            )
        );
    }
}
