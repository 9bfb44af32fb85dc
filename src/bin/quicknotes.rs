use anyhow::Result;
use quicknotes::cli::{actions, actions::Action, start};

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    let (action, globals) = start()?;

    match action {
        Action::Server(args) => actions::server::handle(args, &globals).await?,
    }

    Ok(())
}
