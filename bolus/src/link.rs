use bytes::{BufMut, BytesMut};
use futures::{SinkExt, StreamExt};
use log::{debug, error, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    sync::mpsc::{self, error::TrySendError},
};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::codec::{Decoder, Encoder, Framed};
use url::Url;

use anyhow::{Context, Result, bail};
use bolus_core::{HostLink, RigError};

/// Longest frame accepted before the line is considered garbage.
const MAX_FRAME_LENGTH: usize = 64;

/// Frames held for the controller. Anything arriving while the queue is full
/// (the rig sat in manual mode, say) is dropped.
const FRAME_QUEUE_DEPTH: usize = 8;

pub enum Port {
    Serial(SerialStream),
    TcpRaw(TcpStream),
}

impl Port {
    pub async fn open(url: &Url, baud_rate: u32) -> Result<Self> {
        match url.scheme() {
            "serial" => {
                let path = url.path();

                let port = tokio_serial::new(path, baud_rate)
                    .open_native_async()
                    .with_context(|| format!("failed to open serial port {path}"))?;

                Ok(Self::Serial(port))
            }
            "tcp+raw" => {
                let host = url.host_str().with_context(|| {
                    format!("tcp+raw requires a host to be specified in the url: {url}")
                })?;

                let port = url.port().with_context(|| {
                    format!("tcp+raw requires a port number to be specified in the url: {url}")
                })?;

                let stream = TcpStream::connect((host, port))
                    .await
                    .with_context(|| format!("failed to open tcp+raw connection to: {url}"))?;

                stream.set_nodelay(true)?;

                Ok(Self::TcpRaw(stream))
            }
            other => {
                bail!("url scheme {other} not supported");
            }
        }
    }

    /// Spawn the reader/writer tasks for this port and hand back the
    /// controller's end of it.
    pub fn attach(self) -> ChannelLink {
        match self {
            Port::Serial(port) => attach(port),
            Port::TcpRaw(stream) => attach(stream),
        }
    }
}

/// Newline-delimited host frames.
///
/// Incoming frames keep any surrounding whitespace (including a trailing
/// `\r`); the controller trims them. Outgoing lines are terminated with `\r\n`.
#[derive(Debug, Default)]
pub struct FrameCodec {
    discarding: bool,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;

    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(end_idx) = src.iter().position(|b| *b == b'\n') else {
                if src.len() > MAX_FRAME_LENGTH {
                    // no terminator in sight -- drop what we have and resync on the next newline
                    debug!("discarding {} bytes of unterminated input", src.len());
                    src.clear();
                    self.discarding = true;
                }
                return Ok(None);
            };

            let mut frame = src.split_to(end_idx + 1);
            frame.truncate(end_idx);

            if std::mem::take(&mut self.discarding) || frame.len() > MAX_FRAME_LENGTH {
                warn!("discarding over-long frame");
                continue;
            }

            return Ok(Some(frame));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None if std::mem::take(&mut self.discarding) => {
                src.clear();
                Ok(None)
            }
            None => Ok(Some(src.split())),
        }
    }
}

impl Encoder<String> for FrameCodec {
    type Error = std::io::Error;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(line.len() + 2);
        dst.put(line.as_bytes());
        dst.put(&b"\r\n"[..]);
        Ok(())
    }
}

/// The controller's side of the host link.
///
/// Frames are queued by the reader task and handed out one per poll.
pub struct ChannelLink {
    rx_frames: mpsc::Receiver<BytesMut>,
    tx_lines: mpsc::UnboundedSender<String>,
}

impl HostLink for ChannelLink {
    fn poll_frame(&mut self) -> Option<Vec<u8>> {
        self.rx_frames.try_recv().ok().map(|frame| frame.to_vec())
    }

    fn send_line(&mut self, line: &str) -> std::result::Result<(), RigError> {
        self.tx_lines
            .send(line.to_string())
            .map_err(|_| RigError::LinkClosed)
    }
}

fn attach<T>(stream: T) -> ChannelLink
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sink, mut frames) = Framed::new(stream, FrameCodec::new()).split();

    let (rx_frames_send, rx_frames) = mpsc::channel(FRAME_QUEUE_DEPTH);
    let (tx_lines, mut tx_lines_recv) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(frame) => {
                    debug!("rx: {:?}", String::from_utf8_lossy(&frame));
                    match rx_frames_send.try_send(frame) {
                        Ok(()) => {}
                        Err(TrySendError::Full(frame)) => {
                            warn!(
                                "frame queue full, dropping {:?}",
                                String::from_utf8_lossy(&frame)
                            );
                        }
                        Err(TrySendError::Closed(_)) => break,
                    }
                }
                Err(err) => {
                    error!("error reading from host link: {err}");
                    break;
                }
            }
        }
        warn!("host link closed");
    });

    tokio::spawn(async move {
        while let Some(line) = tx_lines_recv.recv().await {
            debug!("tx: {line:?}");
            if let Err(err) = sink.send(line).await {
                error!("error writing to host link: {err}");
                break;
            }
        }
    });

    ChannelLink {
        rx_frames,
        tx_lines,
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::codec::FramedRead;

    use super::*;

    async fn frames(input: &[u8]) -> Vec<Vec<u8>> {
        FramedRead::new(input, FrameCodec::new())
            .map(|frame| frame.expect("decode").to_vec())
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_codec_decode() {
        assert_eq!(
            frames(b"#30\r\n  #?\n").await,
            vec![b"#30\r".to_vec(), b"  #?".to_vec()]
        );

        // a final frame without a terminator is still delivered at end of stream
        assert_eq!(frames(b"#0\n#25").await, vec![b"#0".to_vec(), b"#25".to_vec()]);
    }

    #[tokio::test]
    async fn test_codec_discards_overlong_lines() {
        let mut input = vec![b'x'; MAX_FRAME_LENGTH + 10];
        input.extend_from_slice(b"yyy\n#40\n");

        assert_eq!(frames(&input).await, vec![b"#40".to_vec()]);
    }

    #[test]
    fn test_codec_encode() {
        let mut codec = FrameCodec::new();

        let mut buf = BytesMut::new();
        codec.encode("#23.0".to_string(), &mut buf).expect("encode");
        assert_eq!(&buf[..], b"#23.0\r\n");
    }

    #[tokio::test]
    async fn test_frame_queue_is_bounded() {
        let (controller_side, mut host_side) = tokio::io::duplex(1024);
        let mut link = attach(controller_side);

        for value in 10..30 {
            tokio::io::AsyncWriteExt::write_all(&mut host_side, format!("#{value}\n").as_bytes())
                .await
                .unwrap();
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let queued: Vec<_> = std::iter::from_fn(|| link.poll_frame()).collect();
        assert_eq!(queued.len(), FRAME_QUEUE_DEPTH);
        assert_eq!(queued[0], b"#10");
        assert_eq!(queued[FRAME_QUEUE_DEPTH - 1], b"#17");
    }

    #[tokio::test]
    async fn test_channel_link_round_trip() {
        let (controller_side, mut host_side) = tokio::io::duplex(256);
        let mut link = attach(controller_side);

        tokio::io::AsyncWriteExt::write_all(&mut host_side, b"#30\n")
            .await
            .unwrap();

        let frame = loop {
            if let Some(frame) = link.poll_frame() {
                break frame;
            }
            tokio::task::yield_now().await;
        };
        assert_eq!(frame, b"#30");

        link.send_line("30").unwrap();
        let mut reply = [0u8; 4];
        tokio::io::AsyncReadExt::read_exact(&mut host_side, &mut reply)
            .await
            .unwrap();
        assert_eq!(&reply, b"30\r\n");
    }
}
