use std::path::Path;
use std::sync::Arc;

use crate::{error::AppResult, models::RatingEvent};

/// Read-only access to the contextual rating log
pub trait RatingLog: Send + Sync {
    /// Consistent view of every rating row
    fn snapshot(&self) -> Arc<[RatingEvent]>;
}

/// Rating log loaded once and never mutated afterwards
pub struct InMemoryRatingLog {
    events: Arc<[RatingEvent]>,
}

impl InMemoryRatingLog {
    pub fn new(events: Vec<RatingEvent>) -> Self {
        Self {
            events: events.into(),
        }
    }

    /// Loads ratings from a CSV file with a header row. Columns other than
    /// `user_id,movie_id,rating,time,location,companion` are ignored.
    pub fn load_csv(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let reader = csv::Reader::from_path(path)?;
        let log = Self::from_reader(reader)?;

        tracing::info!(path = %path.display(), ratings = log.len(), "Loaded rating log");

        Ok(log)
    }

    fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> AppResult<Self> {
        let events = reader
            .deserialize::<RatingEvent>()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(events))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl RatingLog for InMemoryRatingLog {
    fn snapshot(&self) -> Arc<[RatingEvent]> {
        Arc::clone(&self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn test_malformed_row_is_csv_error() {
        let data = "\
user_id,movie_id,rating,time,location,companion
1001,tt0120338,4,Weekend,Home,Partner
";
        let result = InMemoryRatingLog::from_reader(csv::Reader::from_reader(data.as_bytes()));
        assert!(matches!(result, Err(AppError::Csv(_))));
    }

    #[test]
    fn test_reads_rows_and_ignores_extra_columns() {
        let data = "\
user_id,movie_id,rating,time,daytype,location,companion
1001,5,4,Weekend,Holiday,Home,Partner
1002,6,2.5,Weekday,Working,Cinema,Alone
";
        let log = InMemoryRatingLog::from_reader(csv::Reader::from_reader(data.as_bytes())).unwrap();
        assert_eq!(log.len(), 2);

        let snapshot = log.snapshot();
        assert_eq!(snapshot[0].user_id, "1001");
        assert_eq!(snapshot[0].movie_id, 5);
        assert_eq!(snapshot[1].rating, 2.5);
        assert_eq!(snapshot[1].companion, "Alone");
    }

    #[test]
    fn test_snapshots_share_storage() {
        let log = InMemoryRatingLog::new(Vec::new());
        assert!(log.is_empty());
        assert!(Arc::ptr_eq(&log.snapshot(), &log.snapshot()));
    }
}
