pub mod shell;

use std::io;

use bytes::Bytes;

/// What a finished external command left behind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOutput {
    /// stdout and stderr, interleaved in the order they were written.
    pub combined: Bytes,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[async_trait::async_trait]
pub trait CommandRunner {
    /// Spawns `command` and waits for it. `Err` only when the process could
    /// not be started or awaited; a non-zero exit is still `Ok`.
    async fn run(&self, command: &str) -> io::Result<CommandOutput>;
}
