use anyhow::{Context, Result};
use rag_runtime::{bootstrap, config, startup};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, stdin, stdout};
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    startup::init_tracing("warn");
    startup::load_env_file(None);

    let config = config::load_config().await?;
    let mut bot = bootstrap::generator_template(&config)
        .await
        .context("Failed to build retrieval engine")?
        .build();

    println!("RAG bot ready. Type 'exit' to quit, '/reset' to forget, '/context' to inspect.");

    let mut lines = BufReader::new(stdin()).lines();
    let mut out = stdout();
    let mut last_context: Option<String> = None;

    loop {
        out.write_all(b"\nYou: ").await?;
        out.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();

        match question {
            "" => continue,
            q if q.eq_ignore_ascii_case("exit") => break,
            "/reset" => {
                bot.reset();
                println!("History cleared.");
            }
            "/context" => match &last_context {
                Some(context) => println!("{context}"),
                None => println!("Nothing asked yet."),
            },
            q => match bot.respond(q).await {
                Ok(answer) => {
                    println!("Bot: {}", answer.answer);
                    last_context = Some(answer.context);
                }
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "generation failed");
                    println!("Bot: sorry, I could not generate an answer ({err})");
                }
            },
        }
    }

    Ok(())
}
