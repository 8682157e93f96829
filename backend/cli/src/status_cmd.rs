//! `aquadash status`: ask a running server for its health report.

use anyhow::Result;

pub async fn run(server: &str) -> Result<()> {
    let url = format!("{}/api/health", server.trim_end_matches('/'));
    match reqwest::get(&url).await {
        Ok(resp) => {
            let body: serde_json::Value = resp.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Err(_) => {
            println!("aquadash is not running at {server}");
        }
    }
    Ok(())
}
