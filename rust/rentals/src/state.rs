use crate::repository::RentalStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub rentals: Arc<dyn RentalStore>,
}

impl AppState {
    pub fn new(rentals: Arc<dyn RentalStore>) -> Self {
        Self { rentals }
    }
}
