/// Backend primary keys are integers.
pub type DbId = i64;

/// All client-side timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
