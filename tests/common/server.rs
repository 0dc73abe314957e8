//! Fake IRC server for integration testing.

use pancakesbot::events::HostEvent;
use pancakesbot::network::Client;
use pancakesbot::outbound::Outbox;
use pancakesbot::plugins::builtin;
use pancakesbot::{Bot, Config, Database, HandlerError, Host};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Listens on an ephemeral port and talks to the bot over one connection.
pub struct FakeServer {
    listener: TcpListener,
    reader: Option<BufReader<OwnedReadHalf>>,
    writer: Option<BufWriter<OwnedWriteHalf>>,
}

impl FakeServer {
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self {
            listener,
            reader: None,
            writer: None,
        })
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().map(|a| a.port()).unwrap_or_default()
    }

    /// Wait for the bot to connect.
    pub async fn accept(&mut self) -> anyhow::Result<()> {
        let (stream, _) = timeout(RECV_TIMEOUT, self.listener.accept()).await??;
        self.attach(stream);
        Ok(())
    }

    fn attach(&mut self, stream: TcpStream) {
        let (read_half, write_half) = stream.into_split();
        self.reader = Some(BufReader::new(read_half));
        self.writer = Some(BufWriter::new(write_half));
    }

    /// Send a raw line to the bot.
    pub async fn send(&mut self, line: &str) -> anyhow::Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| anyhow::anyhow!("not connected"))?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\r\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Receive one line from the bot, without the line ending.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        self.recv_timeout(RECV_TIMEOUT).await
    }

    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<String> {
        let reader = self.reader.as_mut().ok_or_else(|| anyhow::anyhow!("not connected"))?;
        let mut line = String::new();
        let read = timeout(dur, reader.read_line(&mut line)).await??;
        if read == 0 {
            anyhow::bail!("connection closed");
        }
        Ok(line.trim_end().to_string())
    }

    /// Receive lines until one matches, returning everything read.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<String>>
    where
        F: FnMut(&str) -> bool,
    {
        let mut lines = Vec::new();
        loop {
            let line = self.recv().await?;
            let done = predicate(&line);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }
}

/// Handles to a bot running against a [`FakeServer`].
pub struct RunningBot {
    pub bot: Arc<Bot>,
    pub events: mpsc::Sender<HostEvent>,
    pub host: JoinHandle<Result<(), HandlerError>>,
    pub client: JoinHandle<()>,
}

/// Start the bot with the bundled plugins and the plugins named in `config`.
pub async fn start_bot(config: Config) -> anyhow::Result<RunningBot> {
    let db = Database::new(&config.database_path().to_string_lossy()).await?;
    let (outbox, outbound_rx) = Outbox::channel(64);
    let (events_tx, events_rx) = mpsc::channel(64);
    let plugins = config.plugins.clone();

    let bot = Bot::new(config, db, builtin::catalog(), outbox);
    for name in &plugins {
        bot.load_plugin(name)?;
    }

    let client = tokio::spawn(Client::new(events_tx.clone(), outbound_rx).run());
    let host = tokio::spawn(Host::new(bot.clone(), events_rx).run());

    Ok(RunningBot {
        bot,
        events: events_tx,
        host,
        client,
    })
}
