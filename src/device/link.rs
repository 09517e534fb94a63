//! Serial link to the effector boards
//!
//! One process owns one serial device. Frame writes from the operator
//! command path and the periodic re-send path go through a single guarded
//! writer handle so two frames can never interleave on the wire. The
//! passive monitor runs on its own OS thread with a cloned port handle and
//! only ever reads.

use std::io::Write;
use std::thread;
use std::time::Duration;

use serialport::SerialPort;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::protocol::constants::REPLY_TERMINATOR;
use crate::protocol::DeviceCommand;

/// Pause between logged reply lines in the monitor loop
const MONITOR_PACE: Duration = Duration::from_millis(100);

/// Read timeout on the port; timeouts are treated as "no data yet"
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Owns the serial transport to the effector boards
pub struct DeviceLink {
    path: String,
    writer: Mutex<Box<dyn SerialPort>>,
}

impl DeviceLink {
    /// Open and configure the serial device
    ///
    /// DTR and RTS are deasserted as the first action after open: the
    /// attached microcontroller treats a DTR pulse as a reset trigger, so
    /// both lines must sit low before any traffic flows. (The serialport
    /// crate only exposes line control on an opened port.)
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let mut port = serialport::new(path, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| Error::DeviceOpen {
                path: path.to_string(),
                source: e,
            })?;

        port.write_data_terminal_ready(false)?;
        port.write_request_to_send(false)?;

        tracing::info!(path = %path, baud = baud_rate, "Serial device opened");

        Ok(Self {
            path: path.to_string(),
            writer: Mutex::new(port),
        })
    }

    /// Send one command to the boards
    ///
    /// `Reset` has no frame and dispatches to [`DeviceLink::reset`].
    pub async fn send(&self, command: &DeviceCommand) -> Result<()> {
        match command.frame() {
            Some(frame) => self.send_frame(&frame).await,
            None => self.reset().await,
        }
    }

    /// Write one ASCII frame verbatim
    ///
    /// At most one frame is in flight at a time; concurrent senders queue
    /// on the writer lock.
    pub async fn send_frame(&self, frame: &str) -> Result<()> {
        let mut port = self.writer.lock().await;
        tracing::info!(">>> {}", frame);
        port.write_all(frame.as_bytes())?;
        port.flush()?;
        Ok(())
    }

    /// Pulse the DTR line low-then-high to hardware-reset the boards
    pub async fn reset(&self) -> Result<()> {
        let mut port = self.writer.lock().await;
        port.write_data_terminal_ready(false)?;
        port.write_data_terminal_ready(true)?;
        tracing::info!(path = %self.path, "Reset pulse sent");
        Ok(())
    }

    /// Spawn the passive reply monitor
    ///
    /// Clones the port handle and starts an OS thread that blocks on line
    /// reads for the process lifetime, logging each reply as an inbound
    /// trace. Replies have no structured meaning to this system; invalid
    /// UTF-8 is rendered with replacement characters rather than failing.
    /// The thread exits only if the port itself dies.
    pub async fn spawn_monitor(&self) -> Result<thread::JoinHandle<()>> {
        let mut reader = {
            let port = self.writer.lock().await;
            port.try_clone()?
        };
        let path = self.path.clone();

        let handle = thread::Builder::new()
            .name("device-monitor".to_string())
            .spawn(move || monitor_loop(&mut reader, &path))?;

        Ok(handle)
    }
}

/// Monitor loop body: log reply lines until the port dies
///
/// A zero-byte read means end of stream (a detached port on some
/// platforms), which is as terminal as a read error; only timeouts are
/// retried.
fn monitor_loop<R: std::io::Read>(reader: &mut R, path: &str) {
    let mut line: Vec<u8> = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => {
                tracing::error!(path = %path, "Device monitor hit end of stream");
                break;
            }
            Ok(_) => {
                line.push(byte[0]);
                if byte[0] == REPLY_TERMINATOR {
                    let text = String::from_utf8_lossy(&line);
                    tracing::info!("<<< {}", text.trim_end());
                    line.clear();
                    thread::sleep(MONITOR_PACE);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Device monitor read failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Read};

    /// Replays a fixed sequence of single-byte reads, then reports EOF
    struct ScriptedPort {
        script: std::vec::IntoIter<io::Result<u8>>,
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.script.next() {
                Some(Ok(byte)) => {
                    buf[0] = byte;
                    Ok(1)
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }
    }

    #[test]
    fn test_monitor_stops_on_end_of_stream() {
        let mut port = ScriptedPort {
            script: vec![Ok(b'O'), Ok(b'K'), Ok(b'\n')].into_iter(),
        };
        // Returns instead of spinning once the port reports EOF.
        monitor_loop(&mut port, "scripted");
    }

    #[test]
    fn test_monitor_rides_out_timeouts_and_stops_on_error() {
        let timeout = || io::Error::new(io::ErrorKind::TimedOut, "timed out");
        let mut port = ScriptedPort {
            script: vec![
                Err(timeout()),
                Ok(b'>'),
                Err(timeout()),
                Ok(b'\n'),
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "port gone")),
            ]
            .into_iter(),
        };
        monitor_loop(&mut port, "scripted");
    }
}
