use std::sync::Arc;

use application::ChatApplication;
use infrastructure::ChatHub;

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub application: ChatApplication,
    pub hub: Arc<ChatHub>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    pub fn new(application: ChatApplication, hub: Arc<ChatHub>, jwt_service: Arc<JwtService>) -> Self {
        Self {
            application,
            hub,
            jwt_service,
        }
    }
}
