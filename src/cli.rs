//! Interactive console loop
//!
//! Reads one request per line and prints the coordinator's answer. `quit`,
//! `exit`, `q` or end of input stop the loop.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

use crate::agents::separator;
use crate::coordinator::Coordinator;

const BANNER: &str = "\n[OK] Ready! You can ask me to help with Gmail, Google Drive, or Google Calendar.

Examples:
  - 'Send an email to john@example.com about the meeting'
  - 'Create a file called notes.txt with some content'
  - 'Show me my upcoming calendar events'
  - 'List my recent emails'

Type 'quit' to exit.

";

pub fn is_exit_command(input: &str) -> bool {
    matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q")
}

/// Run the request loop until an exit command or end of input
pub async fn run_repl<R, W>(
    coordinator: &mut Coordinator,
    mut input: R,
    mut output: W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output.write_all(BANNER.as_bytes()).await?;
    let mut line = String::new();

    loop {
        output.write_all(b"You: ").await?;
        output.flush().await?;

        line.clear();
        if input.read_line(&mut line).await? == 0 {
            info!("End of input");
            output.write_all(b"\n[BYE] Goodbye!\n").await?;
            break;
        }

        let request = line.trim();
        if is_exit_command(request) {
            output.write_all(b"\n[BYE] Goodbye!\n").await?;
            break;
        }
        if request.is_empty() {
            continue;
        }

        output.write_all(b"\n[...] Processing...\n\n").await?;
        output.flush().await?;

        let response = coordinator.handle(request).await;
        output
            .write_all(format!("Assistant: {}\n\n{}\n\n", response, separator()).as_bytes())
            .await?;
        output.flush().await?;
    }

    output.flush().await
}
