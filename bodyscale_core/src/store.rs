//! Persistence seam for confirmed readings.

use bodyscale_traits::BoxError;

use crate::error::{Report, Result};
use crate::link_error::map_store_error;
use crate::reading::Reading;

/// Readings returned by a history read unless configured otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

pub trait ReadingStore {
    fn save(&mut self, reading: &Reading) -> std::result::Result<(), BoxError>;
    /// Most recent readings for `profile_id`, newest first, at most `limit`.
    fn recent(&self, profile_id: &str, limit: usize) -> std::result::Result<Vec<Reading>, BoxError>;
}

impl<S: ReadingStore + ?Sized> ReadingStore for Box<S> {
    fn save(&mut self, reading: &Reading) -> std::result::Result<(), BoxError> {
        (**self).save(reading)
    }
    fn recent(&self, profile_id: &str, limit: usize) -> std::result::Result<Vec<Reading>, BoxError> {
        (**self).recent(profile_id, limit)
    }
}

/// History read with the store's error mapped into the typed taxonomy.
pub fn history<S: ReadingStore + ?Sized>(store: &S, profile_id: &str, limit: usize) -> Result<Vec<Reading>> {
    store
        .recent(profile_id, limit)
        .map_err(|e| Report::new(map_store_error(e.as_ref())))
}
