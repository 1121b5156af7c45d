//! Interactive terminal client
//!
//! Strict request/response: show whatever the server sent (reply and
//! prompt), read one command from stdin, forward it. Typing `exit`
//! sends a final `logout` so the identity is released server-side.

use anyhow::Context;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:6201".to_string());

    let mut stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("connecting to {}", addr))?;
    println!("Connected to Meridian server at {}", addr);

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut buf = vec![0u8; 1024];

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            println!("Server closed the connection");
            return Ok(());
        }
        print!("{}", String::from_utf8_lossy(&buf[..n]));
        std::io::stdout().flush()?;

        let Some(line) = stdin.next_line().await? else {
            stream.write_all(b"logout").await?;
            return Ok(());
        };
        let line = line.trim().to_string();

        if line.eq_ignore_ascii_case("exit") {
            stream.write_all(b"logout").await?;
            return Ok(());
        }

        if line.is_empty() {
            // Keep the request/response rhythm; the server just re-prompts
            stream.write_all(b" ").await?;
            continue;
        }

        stream.write_all(line.as_bytes()).await?;
    }
}
