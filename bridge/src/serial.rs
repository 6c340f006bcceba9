use anyhow::{Context, bail};
use common::session::{Bridge, IndicatorSink};
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::info;

const USB_SERIAL_PREFIXES: [&str; 2] = ["/dev/tty.usbserial", "/dev/cu.usbserial"];

fn pick_port<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    names
        .into_iter()
        .find(|name| USB_SERIAL_PREFIXES.iter().any(|prefix| name.starts_with(prefix)))
}

/// Opens `port`, or the first USB serial adapter when none is given.
pub fn open(port: Option<&str>, baud_rate: u32) -> anyhow::Result<SerialStream> {
    let path = match port {
        Some(port) => port.to_owned(),
        None => {
            let ports = tokio_serial::available_ports().context("failed to list serial ports")?;
            pick_port(ports.iter().map(|port| port.port_name.as_str()))
                .context("no serial port found")?
                .to_owned()
        }
    };
    info!(%path, baud_rate, "opening serial port");
    let stream = tokio_serial::new(&path, baud_rate)
        .open_native_async()
        .with_context(|| format!("failed to open serial port {path}"))?;
    info!("serial port opened");
    Ok(stream)
}

/// Pumps bytes from the board into the bridge until the port goes away.
pub async fn read_frames(mut reader: impl AsyncRead + Unpin, bridge: Bridge) -> anyhow::Result<()> {
    let mut buf = [0; 256];
    loop {
        let read = reader
            .read(&mut buf)
            .await
            .context("error while reading serial port")?;
        if read == 0 {
            bail!("lost connection to serial port");
        }
        bridge.on_frame_bytes(&buf[..read]);
    }
}

pub struct SerialSink<W>(W);

impl<W> SerialSink<W> {
    pub fn new(writer: W) -> Self {
        Self(writer)
    }
}

impl<W: AsyncWrite + Unpin + Send + 'static> IndicatorSink for SerialSink<W> {
    fn write_command<'a>(&'a mut self, command: &'a [u8]) -> BoxFuture<'a, std::io::Result<()>> {
        Box::pin(async move {
            self.0.write_all(command).await?;
            self.0.flush().await
        })
    }
}
