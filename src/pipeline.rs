use crate::calibration::CalibrationStore;
use crate::error::{CalibrationError, LinkError};
use crate::orientation::{compute_rotation, EulerAngles};
use crate::scrollback::{LineSink, SharedSink};
use crate::serial_link::{LineConsumers, PortPicker, SerialLink};
use crate::settings::BaudRate;
use crate::telemetry::{sample_cell, OrientationSample, SampleReader, TelemetryParser};
use log::*;
use std::io::Read;

/// Owns the connection, the newest sample and the calibration reference.
///
/// The read thread only ever sees the parser half of the sample cell and the
/// display sink; everything else is touched from the frame loop.
pub struct Pipeline {
    parser: TelemetryParser,
    samples: SampleReader,
    calibration: CalibrationStore,
    display: SharedSink,
    link: Option<SerialLink>,
}

impl Pipeline {
    pub fn new(display: SharedSink) -> Self {
        let (parser, samples) = sample_cell();
        Self {
            parser,
            samples,
            calibration: CalibrationStore::new(),
            display,
            link: None,
        }
    }

    fn consumers(&self) -> LineConsumers {
        LineConsumers::new(self.display.clone(), self.parser.clone())
    }

    pub fn connect(
        &mut self,
        picker: &mut dyn PortPicker,
        baud_rate: BaudRate,
    ) -> Result<(), LinkError> {
        self.disconnect();
        let port = SerialLink::open(picker, baud_rate)?;
        self.display.clear();
        self.link = Some(port.start(self.consumers()));
        Ok(())
    }

    /// Attach an already open byte source instead of a serial port.
    pub fn attach<R: Read + Send + 'static>(&mut self, name: &str, reader: R) {
        self.disconnect();
        self.display.clear();
        let consumers = self.consumers();
        self.link = Some(SerialLink::spawn(
            name.to_owned(),
            BaudRate::default(),
            reader,
            None,
            consumers,
        ));
    }

    pub fn disconnect(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.disconnect();
        }
    }

    /// Tear down a link whose read loop has died. Returns whether a link is up.
    pub fn poll_link(&mut self) -> bool {
        match self.link.as_ref().map(SerialLink::is_connected) {
            Some(true) => true,
            Some(false) => {
                warn!("Serial stream ended, resetting to disconnected");
                self.disconnect();
                false
            }
            None => false,
        }
    }

    pub fn link(&self) -> Option<&SerialLink> {
        self.link.as_ref()
    }

    pub fn latest_sample(&self) -> Option<OrientationSample> {
        self.samples.latest()
    }

    /// Capture the current sample as the zero orientation.
    pub fn calibrate(&mut self) -> Result<(), CalibrationError> {
        let sample = self.latest_sample().ok_or(CalibrationError::NoSample)?;
        self.calibration.calibrate(&sample)
    }

    pub fn reset_calibration(&mut self) {
        self.calibration.reset();
    }

    pub fn calibration(&self) -> &CalibrationStore {
        &self.calibration
    }

    pub fn next_rotation(&self) -> EulerAngles {
        compute_rotation(self.latest_sample().as_ref(), &self.calibration)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.disconnect();
    }
}
