//! Receives gyro rate frames from the sensor process over local TCP.
//!
//! The sensor side (a BLE central collecting IMU notifications) writes one
//! UTF-8 line per tick, `"x,y,z"`, to a loopback connection. This crate
//! listens for that stream, parses each line, drops malformed ones, and
//! publishes the most recent frame for the game's tick loop to take.

use std::io::{BufRead, BufReader, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use motion::MotionError;
use tracing::{debug, error, info, warn};

/// One gyro rate frame in degrees per second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GyroFrame {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Parses one `"x,y,z"` text line into a frame.
///
/// A line parses only if it holds exactly three comma-separated finite
/// decimal numbers. Anything else rejects the tick with no partial update.
pub fn parse_frame(line: &str) -> Result<GyroFrame, MotionError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(MotionError::ParseError("empty line".to_string()));
    }

    let mut values = [0.0f32; 3];
    let mut count = 0;
    for part in trimmed.split(',') {
        if count == values.len() {
            return Err(MotionError::ParseError(format!(
                "too many fields in {:?}",
                trimmed
            )));
        }
        let value: f32 = part
            .trim()
            .parse()
            .map_err(|_| MotionError::ParseError(format!("invalid number {:?}", part)))?;
        if !value.is_finite() {
            return Err(MotionError::ParseError(format!(
                "non-finite value {:?}",
                part
            )));
        }
        values[count] = value;
        count += 1;
    }
    if count != values.len() {
        return Err(MotionError::ParseError(format!(
            "expected three fields in {:?}",
            trimmed
        )));
    }

    Ok(GyroFrame {
        x: values[0],
        y: values[1],
        z: values[2],
    })
}

/// BridgeReader runs a background thread that accepts sensor connections
/// and publishes the most recent parsed frame.
///
/// Malformed lines are counted and dropped; they never overwrite the
/// published frame. Taking the latest frame consumes it, so a consumer
/// polling faster than the sensor sends sees "no new frame" instead of
/// processing the same tick twice.
pub struct BridgeReader {
    frame: Arc<RwLock<Option<GyroFrame>>>,
    rejected: Arc<RwLock<u64>>,
    running: Arc<RwLock<bool>>,
    local_addr: SocketAddr,
}

impl BridgeReader {
    /// Binds the listener and starts the accept loop.
    ///
    /// Bind to port 0 to let the OS pick a free port; [`local_addr`]
    /// reports the actual address.
    ///
    /// [`local_addr`]: BridgeReader::local_addr
    pub fn bind(addr: &str) -> Result<Self, MotionError> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| MotionError::DeviceError(format!("failed to bind {}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| MotionError::DeviceError(format!("failed to read local addr: {}", e)))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| MotionError::DeviceError(format!("failed to configure listener: {}", e)))?;

        let frame = Arc::new(RwLock::new(None));
        let rejected = Arc::new(RwLock::new(0u64));
        let running = Arc::new(RwLock::new(true));

        let reader = BridgeReader {
            frame: Arc::clone(&frame),
            rejected: Arc::clone(&rejected),
            running: Arc::clone(&running),
            local_addr,
        };

        thread::spawn(move || {
            debug!("bridge accept loop started on {}", local_addr);
            while is_running(&running) {
                match listener.accept() {
                    Ok((stream, peer)) => {
                        info!("sensor connected from {}", peer);
                        serve_connection(stream, &frame, &rejected, &running);
                        info!("sensor disconnected");
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(50));
                    }
                    Err(e) => {
                        error!("accept failed: {}", e);
                        thread::sleep(Duration::from_millis(200));
                    }
                }
            }
            debug!("bridge accept loop exiting");
        });

        Ok(reader)
    }

    /// The address the bridge is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Takes the most recent unread frame.
    pub fn latest(&self) -> Result<GyroFrame, MotionError> {
        let mut slot = self.frame.write()?;
        slot.take()
            .ok_or_else(|| MotionError::ReadError("no new frame available".to_string()))
    }

    /// Number of malformed lines dropped since startup.
    pub fn rejected_lines(&self) -> u64 {
        self.rejected.read().map(|count| *count).unwrap_or(0)
    }

    /// Stops the background thread.
    pub fn stop(&self) {
        if let Ok(mut guard) = self.running.write() {
            *guard = false;
        }
    }
}

impl Drop for BridgeReader {
    fn drop(&mut self) {
        self.stop();
    }
}

fn is_running(running: &Arc<RwLock<bool>>) -> bool {
    running.read().map(|guard| *guard).unwrap_or(false)
}

fn serve_connection(
    stream: TcpStream,
    frame: &Arc<RwLock<Option<GyroFrame>>>,
    rejected: &Arc<RwLock<u64>>,
    running: &Arc<RwLock<bool>>,
) {
    // Accepted sockets do not reliably inherit the listener's blocking
    // mode; force blocking reads bounded by a timeout.
    if let Err(e) = stream.set_nonblocking(false) {
        error!("failed to configure stream: {}", e);
        return;
    }
    if let Err(e) = stream.set_read_timeout(Some(Duration::from_millis(200))) {
        error!("failed to set read timeout: {}", e);
        return;
    }

    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    while is_running(running) {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break, // peer closed the connection
            Ok(_) => match parse_frame(&line) {
                Ok(parsed) => {
                    debug!("frame: {:?}", parsed);
                    if let Ok(mut slot) = frame.write() {
                        *slot = Some(parsed);
                    }
                }
                Err(e) => {
                    warn!("dropping line: {}", e);
                    if let Ok(mut count) = rejected.write() {
                        *count += 1;
                    }
                }
            },
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                continue;
            }
            Err(e) => {
                error!("read failed: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Instant;

    #[test]
    fn test_parse_valid_frame() {
        let frame = parse_frame("12.3,-4.5,0.6").unwrap();
        assert_eq!(
            frame,
            GyroFrame {
                x: 12.3,
                y: -4.5,
                z: 0.6
            }
        );

        // Whitespace and integer fields are fine.
        let frame = parse_frame(" 1 , 2 , 3 \n").unwrap();
        assert_eq!(frame, GyroFrame { x: 1.0, y: 2.0, z: 3.0 });
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        let bad = [
            "",
            "\n",
            "1,2",
            "1,2,3,4",
            "a,b,c",
            "1.0,oops,3.0",
            "NaN,0,0",
            "inf,0,0",
            "1;2;3",
        ];
        for line in bad {
            assert!(
                matches!(parse_frame(line), Err(MotionError::ParseError(_))),
                "line {:?} should be rejected",
                line
            );
        }
    }

    fn wait_for_frame(bridge: &BridgeReader, deadline: Duration) -> Option<GyroFrame> {
        let started = Instant::now();
        while started.elapsed() < deadline {
            if let Ok(frame) = bridge.latest() {
                return Some(frame);
            }
            thread::sleep(Duration::from_millis(10));
        }
        None
    }

    #[test]
    fn test_bridge_publishes_latest_frame() {
        let bridge = BridgeReader::bind("127.0.0.1:0").unwrap();
        let mut sender = TcpStream::connect(bridge.local_addr()).unwrap();

        sender.write_all(b"1.0,2.0,3.0\n").unwrap();
        let frame = wait_for_frame(&bridge, Duration::from_secs(2)).expect("frame should arrive");
        assert_eq!(frame, GyroFrame { x: 1.0, y: 2.0, z: 3.0 });

        // The frame was consumed; nothing new has arrived yet.
        assert!(bridge.latest().is_err());
    }

    #[test]
    fn test_bridge_drops_malformed_lines() {
        let bridge = BridgeReader::bind("127.0.0.1:0").unwrap();
        let mut sender = TcpStream::connect(bridge.local_addr()).unwrap();

        sender.write_all(b"not,a\n").unwrap();
        sender.write_all(b"4.0,5.0,6.0\n").unwrap();

        let frame = wait_for_frame(&bridge, Duration::from_secs(2)).expect("good frame arrives");
        assert_eq!(frame, GyroFrame { x: 4.0, y: 5.0, z: 6.0 });
        assert_eq!(bridge.rejected_lines(), 1, "the malformed line is counted");
    }
}
