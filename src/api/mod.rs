pub mod handlers;
pub mod routes;
pub mod websocket;

use crate::capture::presenter::SharedPresenter;
use crate::capture::service::CaptureHandle;

/// State shared by every request handler
#[derive(Clone)]
pub struct AppState {
    /// Feeds commands to the capture service
    pub capture: CaptureHandle,

    /// Latest view pushed by the capture store
    pub presenter: SharedPresenter,
}
