use std::{
    io::{self, Read},
    process::Stdio,
};

use bytes::Bytes;
use tokio::process::Command;

use super::{CommandOutput, CommandRunner};

/// Runs commands through `<shell> -c`.
#[derive(Clone, Debug)]
pub struct ShellCommandRunner {
    shell: String,
}

impl ShellCommandRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[async_trait::async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(&self, command: &str) -> io::Result<CommandOutput> {
        // stdout and stderr share one pipe so the output keeps write order
        let (mut reader, writer) = io::pipe()?;
        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer)
            .kill_on_drop(true)
            .spawn()?;

        let read = tokio::task::spawn_blocking(move || {
            let mut combined = Vec::new();
            reader.read_to_end(&mut combined).map(|_| combined)
        });

        let status = child.wait().await?;
        let combined = read.await.map_err(io::Error::other)??;

        Ok(CommandOutput {
            combined: Bytes::from(combined),
            exit_code: status.code(),
        })
    }
}
