// ABOUTME: Shell quoting and in-container command helpers.
// ABOUTME: Renders argv safely and normalizes captured command output.

use crate::runtime::{ExecConfig, ExecError, ExecOps};
use crate::types::ContainerId;
use std::fmt::Write as _;

/// Quote `s` as a single bash word.
///
/// The value is wrapped in single quotes. An embedded `'` closes the quote,
/// emits `"'"` and reopens. Control characters below 0x20 are emitted as
/// `$'\NNN'` octal escapes so they survive terminals and log lines intact.
/// That escape is bash syntax; a strict POSIX `sh` keeps the `$` literally.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("'\"'\"'"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "'$'\\{:03o}''", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Join arguments into one command line, quoting each.
pub fn render<S: AsRef<str>>(argv: &[S]) -> String {
    argv.iter()
        .map(|a| quote(a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone)]
enum Program {
    Script(String),
    Argv(Vec<String>),
}

/// A command run inside a container: either a `/bin/sh -c` script or a bare
/// argument vector.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    program: Program,
    env: Vec<String>,
    working_dir: Option<String>,
    user: Option<String>,
    strip_final_newline: bool,
}

impl ShellCommand {
    pub fn new(script: impl Into<String>) -> Self {
        Self::with_program(Program::Script(script.into()))
    }

    /// Run an argument vector verbatim. No shell is involved, so every byte
    /// of every argument reaches the process unchanged.
    pub fn argv<S: AsRef<str>>(argv: &[S]) -> Self {
        Self::with_program(Program::Argv(
            argv.iter().map(|a| a.as_ref().to_string()).collect(),
        ))
    }

    fn with_program(program: Program) -> Self {
        Self {
            program,
            env: Vec::new(),
            working_dir: None,
            user: None,
            strip_final_newline: true,
        }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push(format!("{key}={value}"));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Return output exactly as produced.
    pub fn keep_final_newline(mut self) -> Self {
        self.strip_final_newline = false;
        self
    }

    /// The command as a readable line, for logs.
    pub fn display(&self) -> String {
        match &self.program {
            Program::Script(script) => script.clone(),
            Program::Argv(argv) => render(argv),
        }
    }

    pub fn to_exec_config(&self) -> ExecConfig {
        let cmd = match &self.program {
            Program::Script(script) => vec!["/bin/sh".to_string(), "-c".to_string(), script.clone()],
            Program::Argv(argv) => argv.clone(),
        };
        ExecConfig {
            cmd,
            env: self.env.clone(),
            working_dir: self.working_dir.clone(),
            user: self.user.clone(),
            ..ExecConfig::default()
        }
    }
}

/// Captured result of a shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// CRLF to LF, then optionally drop a single trailing newline.
fn normalize(raw: &[u8], strip_final_newline: bool) -> String {
    let mut text = String::from_utf8_lossy(raw).replace("\r\n", "\n");
    if strip_final_newline && text.ends_with('\n') {
        text.pop();
    }
    text
}

/// Run `cmd` in container `id`. A non-zero exit code is not an error.
pub async fn run_shell(
    runtime: &impl ExecOps,
    id: &ContainerId,
    cmd: &ShellCommand,
) -> Result<CommandOutput, ExecError> {
    tracing::debug!(container = %id.short(), command = %cmd.display(), "running command");
    let result = runtime.exec(id, &cmd.to_exec_config()).await?;
    Ok(CommandOutput {
        exit_code: result.exit_code,
        stdout: normalize(&result.stdout, cmd.strip_final_newline),
        stderr: normalize(&result.stderr, cmd.strip_final_newline),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::fake::{FakeContainer, FakeRuntime};
    use crate::runtime::{ContainerConfig, ContainerState, ExecResult};
    use crate::types::{ContainerName, ImageRef};

    #[test]
    fn plain_words_are_single_quoted() {
        assert_eq!(quote("hello"), "'hello'");
        assert_eq!(quote(""), "''");
        assert_eq!(quote("a b $HOME"), "'a b $HOME'");
    }

    #[test]
    fn single_quote_is_spliced() {
        assert_eq!(quote("it's"), "'it'\"'\"'s'");
    }

    #[test]
    fn control_chars_become_octal() {
        assert_eq!(quote("a\nb"), "'a'$'\\012''b'");
        assert_eq!(quote("\t"), "''$'\\011'''");
        assert_eq!(quote("\x1b[0m"), "''$'\\033''[0m'");
    }

    #[test]
    fn render_joins_quoted() {
        assert_eq!(render(&["dockerd", "--host", "unix:///x y"]), "'dockerd' '--host' 'unix:///x y'");
    }

    #[test]
    fn exec_config_wraps_in_sh() {
        let cmd = ShellCommand::new("echo hi").env("A", "1").user("root");
        let cfg = cmd.to_exec_config();
        assert_eq!(cfg.cmd, vec!["/bin/sh", "-c", "echo hi"]);
        assert_eq!(cfg.env, vec!["A=1"]);
        assert_eq!(cfg.user.as_deref(), Some("root"));
        assert!(cfg.attach_stdout && cfg.attach_stderr);
    }

    #[test]
    fn argv_skips_the_shell() {
        let word = "tab\there\nnewline $HOME 'q'";
        let cfg = ShellCommand::argv(&["printf", "%s", word]).to_exec_config();
        assert_eq!(cfg.cmd, vec!["printf", "%s", word]);
    }

    #[test]
    fn normalize_handles_crlf_and_one_newline() {
        assert_eq!(normalize(b"a\r\nb\r\n", true), "a\nb");
        assert_eq!(normalize(b"a\n\n", true), "a\n");
        assert_eq!(normalize(b"a\r\n", false), "a\n");
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported_not_raised() {
        let fake = FakeRuntime::new();
        let id = fake.insert(FakeContainer {
            name: "box".into(),
            image: "alpine:latest".into(),
            labels: Default::default(),
            state: ContainerState::Running,
            exit_code: None,
            oom_killed: false,
            health: None,
            config: ContainerConfig::new(
                ContainerName::new("box").unwrap(),
                ImageRef::parse("alpine").unwrap(),
            ),
        });
        fake.set_exec_result(ExecResult {
            exit_code: 3,
            stdout: b"partial\r\n".to_vec(),
            stderr: b"boom\n".to_vec(),
        });

        let out = run_shell(&fake, &id, &ShellCommand::argv(&["false"]))
            .await
            .unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stdout, "partial");
        assert_eq!(out.stderr, "boom");
        assert!(fake.calls().iter().any(|c| c == &format!("exec {id} false")), "{:?}", fake.calls());
    }
}
