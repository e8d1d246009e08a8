/*
 * Responsibility
 * - tokio runtime
 * - app::run() only; no logic here
 */
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    mock_oidc_idp::app::run().await
}
