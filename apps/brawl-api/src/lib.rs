pub mod brawl;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod models;
pub mod routes;

use std::sync::Arc;

use brawl::registry::RoomRegistry;
use config::RoomSettings;
use directory::UserDirectory;
use gardenia_common::NameGenerator;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn UserDirectory>,
    pub rooms: Arc<RoomRegistry>,
    pub names: Arc<NameGenerator>,
}

impl AppState {
    pub fn new(directory: Arc<dyn UserDirectory>, settings: RoomSettings) -> Self {
        let rooms = Arc::new(RoomRegistry::new(settings, directory.clone()));
        Self {
            directory,
            rooms,
            names: Arc::new(NameGenerator::new()),
        }
    }
}
