// TCP connection and the main session loop.
//
// Architecture: one reader thread plus the main thread, joined by an `mpsc`
// channel.
//
// - **Reader thread**: blocking `read()` on a clone of the socket. Every
//   chunk of bytes goes to the main thread as `Inbound::Data`. EOF sends
//   `Inbound::Closed`, a read error sends `Inbound::Failed`, and the thread
//   exits.
// - **Main thread**: owns the `Session` (and with it the `Bot`, world and
//   decoder). Waits on the channel with `recv_timeout` until the next tick
//   is due, so inbound bytes are handled as soon as they arrive and the
//   scheduler still ticks on a fixed period without a timer thread.
//
// An optional console thread forwards stdin lines as `Inbound::Console`;
// they go through the same command router as chat.
//
// The main thread is the only writer: `TcpSink` wraps a buffered clone of
// the socket and flushes after each frame. Reader threads never write.
//
// Any fatal condition (kick, decode failure, unexpected message, transport
// error) ends `run()` with an error. A clean EOF from the server ends it
// with `Ok(())`.

use std::io::{self, BufRead, BufWriter, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use blockbot_agent::{Bot, PacketSink};
use blockbot_protocol::{Decoder, FrameError};
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::commands::CommandRouter;
use crate::config::ClientConfig;
use crate::dispatch::Session;
use crate::error::ClientError;
use crate::services::SessionService;

const READ_BUFFER: usize = 16 * 1024;

/// Frames go straight to the socket; each one is flushed.
struct TcpSink {
    writer: BufWriter<TcpStream>,
}

impl PacketSink for TcpSink {
    fn send(&mut self, frame: Bytes) -> io::Result<()> {
        self.writer.write_all(&frame)?;
        self.writer.flush()
    }
}

/// Events sent from the reader and console threads to the main thread.
enum Inbound {
    Data(Vec<u8>),
    Closed,
    Failed(io::Error),
    Console(String),
}

fn reader_loop(mut stream: TcpStream, tx: Sender<Inbound>) {
    let mut buf = vec![0u8; READ_BUFFER];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => {
                let _ = tx.send(Inbound::Closed);
                return;
            }
            Ok(n) => {
                if tx.send(Inbound::Data(buf[..n].to_vec())).is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                let _ = tx.send(Inbound::Failed(e));
                return;
            }
        }
    }
}

fn console_loop(tx: Sender<Inbound>) {
    for line in io::stdin().lock().lines() {
        let Ok(line) = line else {
            return;
        };
        if tx.send(Inbound::Console(line)).is_err() {
            return;
        }
    }
}

pub struct Client {
    session: Session,
    decoder: Decoder,
    inbound: Receiver<Inbound>,
    tx: Sender<Inbound>,
    stream: TcpStream,
    tick: Duration,
}

impl Client {
    /// Connect to the configured server and start the reader thread.
    pub fn connect(
        config: &ClientConfig,
        services: Box<dyn SessionService>,
        router: Box<dyn CommandRouter>,
    ) -> Result<Self, ClientError> {
        let address = config.address();
        let stream = TcpStream::connect(&address)?;
        stream.set_nodelay(true)?;
        info!(%address, username = %config.username, "connected");

        let sink = TcpSink {
            writer: BufWriter::new(stream.try_clone()?),
        };
        let (tx, rx) = mpsc::channel();
        let reader = stream.try_clone()?;
        let reader_tx = tx.clone();
        thread::spawn(move || reader_loop(reader, reader_tx));

        let bot = Bot::new(&config.username, config.agent.clone(), sink);
        Ok(Self {
            session: Session::new(config, bot, services, router),
            decoder: Decoder::new(),
            inbound: rx,
            tx,
            stream,
            tick: Duration::from_millis(config.agent.tick_ms.max(1)),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Read commands from stdin as well as from chat.
    pub fn attach_console(&mut self) {
        let tx = self.tx.clone();
        thread::spawn(move || console_loop(tx));
    }

    /// Run the session until the server closes the connection or something
    /// fatal happens.
    pub fn run(mut self) -> Result<(), ClientError> {
        self.session.start()?;
        let result = self.event_loop();
        if let Err(e) = &result {
            warn!(error = %e, "session ended");
        }
        // Unblocks the reader thread.
        let _ = self.stream.shutdown(Shutdown::Both);
        result
    }

    fn event_loop(&mut self) -> Result<(), ClientError> {
        let mut next_tick = Instant::now() + self.tick;
        loop {
            let now = Instant::now();
            if now >= next_tick {
                self.session.tick()?;
                next_tick += self.tick;
                if next_tick <= now {
                    debug!("tick overran its period");
                    next_tick = now + self.tick;
                }
                continue;
            }
            match self.inbound.recv_timeout(next_tick - now) {
                Ok(Inbound::Data(bytes)) => match self.decoder.feed(&bytes) {
                    Ok(packets) => {
                        for packet in packets {
                            self.session.handle(packet)?;
                        }
                    }
                    Err(FrameError { decoded, error }) => {
                        for packet in decoded {
                            self.session.handle(packet)?;
                        }
                        return Err(error.into());
                    }
                },
                Ok(Inbound::Console(line)) => self.session.console(&line),
                Ok(Inbound::Closed) | Err(RecvTimeoutError::Disconnected) => {
                    info!(
                        buffered = self.decoder.buffered(),
                        "server closed the connection"
                    );
                    return Ok(());
                }
                Ok(Inbound::Failed(e)) => return Err(e.into()),
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }
}
