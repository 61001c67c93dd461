//! Line-based terminal chat against a desk, one session per run
//!
//! Ctrl-C cancels the turn in flight; `/quit` or end of input exits.

use agentdesk_agent::{CancellationToken, Desk, SessionKey};
use agentdesk_core::Speaker;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

const HELP: &str = "Commands: /agent  /slots  /history  /quit";

pub async fn run_chat(desk: Desk, session: Option<String>) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    chat_loop(desk, session, stdin, &mut stdout).await
}

/// The chat loop over any line source and sink.
pub async fn chat_loop<R, W>(desk: Desk, session: Option<String>, input: R, stdout: &mut W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let key = SessionKey::new(session.unwrap_or_else(|| "terminal".to_string()));
    let mut router = desk.open_router(key.clone())?;
    let mut lines = input.lines();

    stdout
        .write_all(
            format!(
                "agentdesk v{} | desk: {} | session: {}\n{}\n\n",
                env!("CARGO_PKG_VERSION"),
                desk.name(),
                key,
                HELP
            )
            .as_bytes(),
        )
        .await?;

    loop {
        stdout
            .write_all(format!("[{}] > ", router.active_agent()).as_bytes())
            .await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else { break };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/help" => {
                stdout.write_all(format!("{}\n", HELP).as_bytes()).await?;
                continue;
            }
            "/agent" => {
                let ctx = router.context();
                let previous = ctx.previous_agent().unwrap_or("-");
                stdout
                    .write_all(format!("active: {}  previous: {}\n", ctx.active_agent_name(), previous).as_bytes())
                    .await?;
                continue;
            }
            "/slots" => {
                let slots = serde_json::to_string_pretty(router.context().slots())?;
                stdout.write_all(format!("{}\n", slots).as_bytes()).await?;
                continue;
            }
            "/history" => {
                for turn in router.context().history() {
                    let who = match turn.speaker {
                        Speaker::User => "user".to_string(),
                        Speaker::Agent => turn.agent.clone().unwrap_or_else(|| "agent".into()),
                        Speaker::Tool => "tool".to_string(),
                        Speaker::System => "system".to_string(),
                    };
                    let line = match &turn.tool {
                        Some(tool) if turn.is_tool_call() => format!("-> {}({})", tool.name, tool.arguments),
                        _ => turn.content.clone(),
                    };
                    stdout.write_all(format!("  {:>8}: {}\n", who, line).as_bytes()).await?;
                }
                continue;
            }
            _ => {}
        }

        let cancel = CancellationToken::new();
        let outcome = tokio::select! {
            outcome = router.handle_turn(line, &cancel) => outcome,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                debug!("turn cancelled from terminal");
                stdout.write_all(b"\n(cancelled)\n").await?;
                continue;
            }
        };

        match outcome {
            Ok(reply) => {
                let marker = if reply.is_fallback() { " (fallback)" } else { "" };
                stdout
                    .write_all(format!("{}{}: {}\n\n", reply.agent, marker, reply.text).as_bytes())
                    .await?;
            }
            Err(e) => {
                stdout.write_all(format!("error: {}\n\n", e).as_bytes()).await?;
            }
        }
    }

    stdout.flush().await?;
    Ok(())
}
