//! Lifecycle hook execution.

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;

use crate::{config::Hook, run::executor::TaskExecutor, run::Error};

/// Looks up and runs the named hooks of a task lifecycle point.
///
/// Hooks run strictly in order; the first failure aborts the rest of the
/// list.
pub struct HookExecutor {
    hooks: BTreeMap<String, Hook>,
}

impl HookExecutor {
    pub fn new(hooks: BTreeMap<String, Hook>) -> Self {
        Self { hooks }
    }

    pub async fn execute(
        &self,
        names: &[String],
        executor: &TaskExecutor,
        cancel: &CancellationToken,
        silent: bool,
    ) -> Result<(), Error> {
        for name in names {
            let hook = self.hooks.get(name).ok_or_else(|| Error::HookNotFound {
                name: name.clone(),
            })?;
            if !silent {
                executor.ui().task(&format!("Running hook {name:?}..."));
            }
            executor
                .execute_hook(hook, cancel)
                .await
                .map_err(|cause| Error::HookFailed {
                    name: name.clone(),
                    cause: Box::new(cause),
                })?;
            if !silent {
                executor
                    .ui()
                    .success(&format!("Hook {name:?} completed successfully"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{config::Config, shell::ShellLauncher, ui::UI};

    fn fixture(dir: &std::path::Path) -> (HookExecutor, TaskExecutor) {
        let config = Config::from_json(
            r#"{
                "hooks": {
                    "touch": { "command": "echo ran >> hooks.log" },
                    "fail": { "command": "exit 1" },
                    "late": { "command": "echo late >> hooks.log" }
                }
            }"#,
        )
        .unwrap();
        let executor = TaskExecutor::new(
            dir.to_path_buf(),
            ShellLauncher::new(Default::default()),
            UI::new(true),
        );
        (HookExecutor::new(config.hooks), executor)
    }

    #[tokio::test]
    async fn test_hooks_run_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (hooks, executor) = fixture(dir.path());
        let cancel = CancellationToken::new();
        hooks
            .execute(
                &["touch".to_string(), "late".to_string()],
                &executor,
                &cancel,
                true,
            )
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("hooks.log")).unwrap(),
            "ran\nlate\n"
        );
    }

    #[tokio::test]
    async fn test_unknown_hook_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (hooks, executor) = fixture(dir.path());
        let cancel = CancellationToken::new();
        let err = hooks
            .execute(&["missing".to_string()], &executor, &cancel, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HookNotFound { .. }));
    }

    #[tokio::test]
    async fn test_failure_aborts_the_list() {
        let dir = tempfile::tempdir().unwrap();
        let (hooks, executor) = fixture(dir.path());
        let cancel = CancellationToken::new();
        let err = hooks
            .execute(
                &["fail".to_string(), "touch".to_string()],
                &executor,
                &cancel,
                true,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HookFailed { .. }));
        assert!(!dir.path().join("hooks.log").exists());
    }
}
