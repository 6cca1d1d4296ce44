pub mod calibration;
pub mod egt;
pub mod gtc;
pub mod manifest;
pub mod progress;
pub mod qc;
pub mod sim;

#[doc(hidden)]
pub mod _internal_test_data;
