use crate::error::SampleError;
use log::*;
use nalgebra as na;
use std::sync::Arc;
use tokio::sync::watch;

/// Latest decoded reading from the device.
///
/// Three fields on the wire are Euler angles in degrees, four fields are a
/// quaternion sent in `w x y z` order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrientationSample {
    Euler(na::Vector3<f64>),
    Quaternion(na::Quaternion<f64>),
}

impl OrientationSample {
    pub fn components(&self) -> Vec<f64> {
        match self {
            OrientationSample::Euler(vector) => vector.iter().copied().collect(),
            OrientationSample::Quaternion(q) => vec![q.w, q.i, q.j, q.k],
        }
    }
}

/// Decode one telemetry line.
///
/// Lines that are not exactly three or four finite numbers are rejected.
pub fn parse_sample(line: &str) -> Result<OrientationSample, SampleError> {
    let mut values = Vec::with_capacity(4);
    for token in line.split_whitespace() {
        let value = token
            .parse::<f64>()
            .map_err(|_| SampleError::malformed(line, format!("{:?} is not a number", token)))?;
        if !value.is_finite() {
            return Err(SampleError::malformed(
                line,
                format!("{:?} is not finite", token),
            ));
        }
        values.push(value);
    }
    match values.as_slice() {
        [x, y, z] => Ok(OrientationSample::Euler(na::Vector3::new(*x, *y, *z))),
        [w, x, y, z] => Ok(OrientationSample::Quaternion(na::Quaternion::new(
            *w, *x, *y, *z,
        ))),
        _ => Err(SampleError::malformed(
            line,
            format!("expected 3 or 4 fields, got {}", values.len()),
        )),
    }
}

/// Create the shared last-value-wins cell holding the newest sample.
pub fn sample_cell() -> (TelemetryParser, SampleReader) {
    let (sender, receiver) = watch::channel(None);
    (
        TelemetryParser {
            sender: Arc::new(sender),
        },
        SampleReader { receiver },
    )
}

/// Write side of the sample cell.
#[derive(Clone)]
pub struct TelemetryParser {
    sender: Arc<watch::Sender<Option<OrientationSample>>>,
}

impl TelemetryParser {
    /// Parse a line and publish it. On failure the last good sample stays.
    pub fn handle_line(&self, line: &str) -> Result<OrientationSample, SampleError> {
        let sample = parse_sample(line)?;
        self.sender.send_replace(Some(sample));
        trace!("New sample {:?}", sample);
        Ok(sample)
    }
}

/// Read side of the sample cell, polled once per frame.
#[derive(Clone)]
pub struct SampleReader {
    receiver: watch::Receiver<Option<OrientationSample>>,
}

impl SampleReader {
    pub fn latest(&self) -> Option<OrientationSample> {
        *self.receiver.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_fields_are_euler() {
        let sample = parse_sample("0.1 0.2 0.3").unwrap();
        assert_eq!(
            sample,
            OrientationSample::Euler(na::Vector3::new(0.1, 0.2, 0.3))
        );
    }

    #[test]
    fn test_four_fields_are_wxyz_quaternion() {
        let sample = parse_sample("0.5 0.1 0.2 0.3\r").unwrap();
        match sample {
            OrientationSample::Quaternion(q) => {
                assert_eq!(q.w, 0.5);
                assert_eq!(q.i, 0.1);
                assert_eq!(q.j, 0.2);
                assert_eq!(q.k, 0.3);
            }
            other => panic!("unexpected sample {:?}", other),
        }
        assert_eq!(sample.components(), vec![0.5, 0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_irregular_whitespace() {
        let sample = parse_sample("  1\t-2   3 ").unwrap();
        assert_eq!(sample.components(), vec![1.0, -2.0, 3.0]);
    }

    #[test]
    fn test_malformed_lines_are_rejected() {
        for line in ["", "1 2", "1 2 3 4 5", "1 two 3", "nan 0 0 0", "1 inf 0"] {
            assert!(
                matches!(parse_sample(line), Err(SampleError::MalformedSample { .. })),
                "{:?} should be rejected",
                line
            );
        }
    }

    #[test]
    fn test_parser_keeps_last_good_sample() {
        let (parser, reader) = sample_cell();
        assert_eq!(reader.latest(), None);
        parser.handle_line("1 0 0 0").unwrap();
        assert!(parser.handle_line("1 0 garbage 0").is_err());
        assert_eq!(
            reader.latest(),
            Some(OrientationSample::Quaternion(na::Quaternion::new(
                1.0, 0.0, 0.0, 0.0
            )))
        );
    }

    #[test]
    fn test_framed_lines_update_sample_in_order() {
        let (parser, reader) = sample_cell();
        let mut framer = crate::line_framer::LineFramer::new();
        let mut seen = Vec::new();
        for chunk in [&b"0.1 0.2 "[..], &b"0.3\n0.4 0.5 0.6\n"[..]] {
            for line in framer.push(chunk) {
                parser.handle_line(&line).unwrap();
                seen.push(reader.latest().unwrap().components());
            }
        }
        assert_eq!(seen, vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]);
    }
}
