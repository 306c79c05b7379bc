use crate::domain::Record;
use crate::error::InsightError;

pub type Result<T> = std::result::Result<T, InsightError>;

/// Port for the system of record holding analyzed videos.
/// Implementations keep insertion order; there is no update or delete.
pub trait RecordRepository: Send + Sync {
    fn fetch_all_records(&self) -> Result<Vec<Record>>;

    fn append_record(&self, record: &Record) -> Result<()>;
}

/// Port for the generative model that turns a prompt into an answer
pub trait AnswerGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;
}
