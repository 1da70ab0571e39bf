use crate::error::LinkError;
use crate::line_framer::LineFramer;
use crate::scrollback::{LineSink, SharedSink};
use crate::settings::BaudRate;
use crate::telemetry::TelemetryParser;
use log::*;
use std::io::{BufRead, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

/// Reads block at most this long so cancellation is noticed.
const READ_TIMEOUT: Duration = Duration::from_millis(100);
const READ_BUFFER_SIZE: usize = 1024;

/// Asks the user which device to open.
pub trait PortPicker {
    fn request_port(&mut self) -> Result<String, LinkError>;
}

/// Uses the port given on the command line, otherwise asks on the console.
pub struct ConsolePortPicker {
    requested: Option<String>,
}

impl ConsolePortPicker {
    pub fn new(requested: Option<String>) -> Self {
        Self { requested }
    }
}

impl PortPicker for ConsolePortPicker {
    fn request_port(&mut self) -> Result<String, LinkError> {
        if let Some(ref port) = self.requested {
            return Ok(port.clone());
        }
        let ports = serialport::available_ports().map_err(|source| LinkError::PortUnavailable {
            port: String::from("<any>"),
            source,
        })?;
        if ports.is_empty() {
            return Err(LinkError::PortUnavailable {
                port: String::from("<any>"),
                source: serialport::Error::new(serialport::ErrorKind::NoDevice, "No serial ports found"),
            });
        }
        println!("Available serial ports:");
        for (index, port) in ports.iter().enumerate() {
            println!("  [{}] {}", index + 1, port.port_name);
        }
        print!("Select port (empty to cancel): ");
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().lock().read_line(&mut answer)?;
        select_port(answer.trim(), &ports)
    }
}

fn select_port(answer: &str, ports: &[serialport::SerialPortInfo]) -> Result<String, LinkError> {
    if answer.is_empty() {
        return Err(LinkError::PermissionDenied(String::from("no port selected")));
    }
    if let Ok(index) = answer.parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|index| ports.get(index))
            .map(|port| port.port_name.clone())
            .ok_or_else(|| LinkError::PermissionDenied(format!("no port number {}", answer)));
    }
    ports
        .iter()
        .find(|port| port.port_name == answer)
        .map(|port| port.port_name.clone())
        .ok_or_else(|| LinkError::PermissionDenied(format!("{} was not offered", answer)))
}

/// The two independent receivers of every framed line.
pub struct LineConsumers {
    display: SharedSink,
    parser: TelemetryParser,
}

impl LineConsumers {
    pub fn new(display: SharedSink, parser: TelemetryParser) -> Self {
        Self { display, parser }
    }

    pub fn dispatch(&mut self, line: &str) {
        self.display.append_line(line);
        if let Err(error) = self.parser.handle_line(line) {
            debug!("{}", error);
        }
    }
}

/// A serial port that is open but has no reader yet.
pub struct OpenedPort {
    port_name: String,
    baud_rate: BaudRate,
    port: Box<dyn serialport::SerialPort>,
    writer: Option<Box<dyn Write + Send>>,
}

impl OpenedPort {
    pub fn start(self, consumers: LineConsumers) -> SerialLink {
        SerialLink::spawn(
            self.port_name,
            self.baud_rate,
            self.port,
            self.writer,
            consumers,
        )
    }
}

/// Open connection to the device.
///
/// A dedicated thread reads the port, frames lines and hands them to the
/// consumers until the stream ends or the link is disconnected.
pub struct SerialLink {
    port_name: String,
    baud_rate: BaudRate,
    cancel: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    writer: Option<Box<dyn Write + Send>>,
    join_handle: Option<JoinHandle<()>>,
}

impl SerialLink {
    /// Ask for a port and open it without starting to read.
    pub fn open(picker: &mut dyn PortPicker, baud_rate: BaudRate) -> Result<OpenedPort, LinkError> {
        let port_name = picker.request_port()?;
        info!("Opening {} at {}", port_name, baud_rate);
        let port = serialport::new(&port_name, baud_rate.value())
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|source| LinkError::PortUnavailable {
                port: port_name.clone(),
                source,
            })?;
        let writer: Option<Box<dyn Write + Send>> = match port.try_clone() {
            Ok(writer) => Some(Box::new(writer)),
            Err(error) => {
                warn!("Serial port {} has no write side: {}", port_name, error);
                None
            }
        };
        Ok(OpenedPort {
            port_name,
            baud_rate,
            port,
            writer,
        })
    }

    /// Start the read loop over any byte source.
    pub fn spawn<R: Read + Send + 'static>(
        port_name: String,
        baud_rate: BaudRate,
        mut reader: R,
        writer: Option<Box<dyn Write + Send>>,
        mut consumers: LineConsumers,
    ) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let handle = {
            let cancel = cancel.clone();
            let running = running.clone();
            let port_name = port_name.clone();
            thread::spawn(move || {
                match read_loop(&mut reader, &cancel, &mut consumers) {
                    Ok(()) => debug!("Read loop for {} cancelled", port_name),
                    Err(error) => warn!("{} on {}, disconnecting", error, port_name),
                }
                running.store(false, Ordering::SeqCst);
            })
        };
        info!("Connected to {}", port_name);
        Self {
            port_name,
            baud_rate,
            cancel,
            running,
            writer,
            join_handle: Some(handle),
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn baud_rate(&self) -> BaudRate {
        self.baud_rate
    }

    /// False once the read loop has stopped for any reason.
    pub fn is_connected(&self) -> bool {
        self.join_handle.is_some() && self.running.load(Ordering::SeqCst)
    }

    pub fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }
        let writer = self.writer.as_mut().ok_or(LinkError::NotConnected)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Stop reading, wait for the reader to let go, then close the port.
    /// Safe to call more than once.
    pub fn disconnect(&mut self) {
        let join_handle = match self.join_handle.take() {
            Some(handle) => handle,
            None => return,
        };
        self.cancel.store(true, Ordering::SeqCst);
        if join_handle.join().is_err() {
            error!("Serial reader for {} panicked", self.port_name);
        }
        if let Some(mut writer) = self.writer.take() {
            if let Err(error) = writer.flush() {
                warn!("Failed flushing {} on close: {}", self.port_name, error);
            }
        }
        self.running.store(false, Ordering::SeqCst);
        info!("Disconnected from {}", self.port_name);
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Pump bytes from `reader` through a framer into `consumers`.
///
/// Returns `Ok` when cancelled and `StreamTerminated` when the source ends or
/// fails. The unterminated remainder is only delivered at end of stream.
pub fn read_loop<R: Read>(
    reader: &mut R,
    cancel: &AtomicBool,
    consumers: &mut LineConsumers,
) -> Result<(), LinkError> {
    let mut framer = LineFramer::new();
    let mut buffer = [0_u8; READ_BUFFER_SIZE];
    loop {
        if cancel.load(Ordering::SeqCst) {
            return Ok(());
        }
        match reader.read(&mut buffer) {
            Ok(0) => {
                let rest = framer.finish();
                if !rest.is_empty() {
                    consumers.dispatch(&rest);
                }
                return Err(LinkError::StreamTerminated(String::from("end of stream")));
            }
            Ok(count) => {
                for line in framer.push(&buffer[..count]) {
                    consumers.dispatch(&line);
                }
            }
            Err(error)
                if matches!(
                    error.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(error) => return Err(LinkError::StreamTerminated(error.to_string())),
        }
    }
}
