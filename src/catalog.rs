use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Result, TicketError};
use crate::models::{Show, ShowId};

/// Реестр показов. Явный сервисный объект вместо глобального синглтона:
/// создаётся один раз на старте и передаётся коллабораторам через Arc.
/// Показы после регистрации неизменяемы, поэтому читатели доминируют.
pub struct ShowCatalog {
    shows: RwLock<HashMap<ShowId, Arc<Show>>>,
}

impl ShowCatalog {
    pub fn new() -> Self {
        Self {
            shows: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, show: Show) -> Result<()> {
        let mut shows = self.shows.write().unwrap();
        if shows.contains_key(&show.id) {
            return Err(TicketError::InvalidInput(format!(
                "показ {} уже зарегистрирован",
                show.id
            )));
        }
        shows.insert(show.id, Arc::new(show));
        Ok(())
    }

    pub fn get(&self, show_id: ShowId) -> Option<Arc<Show>> {
        self.shows.read().unwrap().get(&show_id).cloned()
    }
}

impl Default for ShowCatalog {
    fn default() -> Self {
        Self::new()
    }
}
