use std::sync::Arc;

use crate::config::Environment;
use crate::service::AuthService;

/// Shared handler state; every dependency is passed in explicitly
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub environment: Environment,
}

impl AppState {
    pub fn new(auth: AuthService, environment: Environment) -> Self {
        Self {
            auth: Arc::new(auth),
            environment,
        }
    }
}
