//! `aquadash insight`: stream one chart commentary to stdout.

use std::io::Write;

use anyhow::{bail, Context, Result};

use aquadash_client::{InsightClient, InsightConsumer, Phase};

pub async fn run(server: &str, path: &str, chart: String, data: &str) -> Result<()> {
    let data: serde_json::Value =
        serde_json::from_str(data).context("--data must be valid JSON")?;
    let client = InsightClient::new(format!("{}{path}", server.trim_end_matches('/')));
    let consumer = InsightConsumer::mount(client, chart, data);
    let mut rx = consumer.subscribe();

    let mut stdout = std::io::stdout();
    let mut printed = 0;
    loop {
        let state = rx.borrow_and_update().clone();
        if let Some(fresh) = state.content.get(printed..).filter(|s| !s.is_empty()) {
            write!(stdout, "{fresh}")?;
            stdout.flush()?;
            printed = state.content.len();
        }
        match state.phase {
            Phase::Done => {
                writeln!(stdout)?;
                return Ok(());
            }
            Phase::Error => {
                if printed > 0 {
                    writeln!(stdout)?;
                }
                bail!(state.error.unwrap_or_else(|| "insight failed".to_string()));
            }
            _ => {}
        }
        if rx.changed().await.is_err() {
            bail!("insight consumer stopped");
        }
    }
}
