//! Simulated relay client over turmoil TCP.

use std::{
    collections::VecDeque,
    io::{self, ErrorKind},
};

use parley_proto::{LineEvent, Payload, read_frame, write_frame};
use tokio::io::{ReadHalf, WriteHalf};
use turmoil::net::TcpStream;

/// Relay client speaking the frame protocol.
///
/// Line events that arrive while [`SimClient::claim`] waits for its reply are
/// kept and returned by later `recv` calls in arrival order.
pub struct SimClient {
    reader: ReadHalf<TcpStream>,
    writer: WriteHalf<TcpStream>,
    pending: VecDeque<Payload>,
}

impl SimClient {
    /// Connect to a relay at `address` (e.g. `"server:3001"`).
    pub async fn connect(address: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(address).await?;
        let (reader, writer) = tokio::io::split(stream);

        Ok(Self { reader, writer, pending: VecDeque::new() })
    }

    /// Send one payload.
    pub async fn send(&mut self, payload: Payload) -> io::Result<()> {
        let frame = payload.into_frame().map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
        write_frame(&mut self.writer, &frame).await.map_err(io::Error::other)
    }

    /// Claim `name` and wait for the verdict. `true` if accepted.
    pub async fn claim(&mut self, name: &str) -> io::Result<bool> {
        self.send(Payload::ClaimName(name.to_string())).await?;

        loop {
            match self.read().await? {
                Some(Payload::ClaimAccepted) => return Ok(true),
                Some(Payload::NameUnavailable) => return Ok(false),
                Some(other) => self.pending.push_back(other),
                None => {
                    return Err(io::Error::new(ErrorKind::UnexpectedEof, "closed during claim"));
                },
            }
        }
    }

    /// Send a chat message.
    pub async fn say(&mut self, text: &str) -> io::Result<()> {
        self.send(Payload::SendMessage(text.to_string())).await
    }

    /// Announce a clean disconnect.
    pub async fn goodbye(&mut self) -> io::Result<()> {
        self.send(Payload::Goodbye).await
    }

    /// Next payload from the relay, `None` once the relay closed the stream.
    pub async fn recv(&mut self) -> io::Result<Option<Payload>> {
        if let Some(payload) = self.pending.pop_front() {
            return Ok(Some(payload));
        }
        self.read().await
    }

    /// Next payload, which must be a line event.
    pub async fn recv_line(&mut self) -> io::Result<LineEvent> {
        match self.recv().await? {
            Some(Payload::Line(line)) => Ok(line),
            Some(other) => Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("expected line event, got {:?}", other.opcode()),
            )),
            None => Err(io::Error::new(ErrorKind::UnexpectedEof, "relay closed the stream")),
        }
    }

    async fn read(&mut self) -> io::Result<Option<Payload>> {
        let Some(frame) = read_frame(&mut self.reader).await.map_err(io::Error::other)? else {
            return Ok(None);
        };

        Payload::from_frame(&frame)
            .map(Some)
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))
    }
}
