pub mod calibration;
pub mod cube_view;
pub mod error;
pub mod line_framer;
pub mod orientation;
pub mod pipeline;
pub mod scrollback;
pub mod serial_link;
pub mod settings;
pub mod telemetry;
