//! Layout detection: ONNX session management and decode logic.

mod model;

pub use model::{detect_layout, get_or_init_session, CONF_THRESHOLD, REQUIRED_SIZE};
