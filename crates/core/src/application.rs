use tracing::info;

use crate::compose::AnswerComposer;
use crate::domain::Record;
use crate::ingest::parse_analysis;
use crate::ports::{AnswerGenerator, RecordRepository, Result};
use crate::retrieval::{search, DEFAULT_TOP_K};

/// Outcome of a question against the store
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// No stored record is relevant; a normal negative answer
    NotFound,
    Generated { text: String, sources: Vec<Record> },
}

/// Application service for storing analyses and answering questions about them
pub struct InsightService {
    record_repository: Box<dyn RecordRepository>,
    composer: AnswerComposer,
    top_k: usize,
}

impl InsightService {
    /// Creates a new InsightService with the given dependencies
    pub fn new(
        record_repository: Box<dyn RecordRepository>,
        answer_generator: Box<dyn AnswerGenerator>,
    ) -> Self {
        Self {
            record_repository,
            composer: AnswerComposer::new(answer_generator),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Parses a pasted analysis and appends it to the store.
    /// Malformed input fails before anything is written.
    pub fn submit_analysis(&self, json_input: &str) -> Result<Record> {
        let record = parse_analysis(json_input)?;
        self.record_repository.append_record(&record)?;
        info!(video_id = %record.video_id, "stored analysis '{}'", record.title);
        Ok(record)
    }

    pub fn record_count(&self) -> Result<usize> {
        Ok(self.record_repository.fetch_all_records()?.len())
    }

    /// Retrieves the most relevant records and asks the model about them
    pub fn ask(&self, query: &str) -> Result<Answer> {
        let records = self.record_repository.fetch_all_records()?;
        let relevant = search(query, &records, self.top_k);
        if relevant.is_empty() {
            info!("no relevant records among {}", records.len());
            return Ok(Answer::NotFound);
        }

        let text = self.composer.compose(query, &relevant)?;
        info!(sources = relevant.len(), "generated answer");
        Ok(Answer::Generated {
            text,
            sources: relevant.into_iter().cloned().collect(),
        })
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::sync::{Arc, Mutex};

    use crate::domain::Record;
    use crate::error::InsightError;
    use crate::ports::{AnswerGenerator, RecordRepository, Result};

    #[derive(Clone, Default)]
    pub struct MemoryRepository {
        pub records: Arc<Mutex<Vec<Record>>>,
        pub unreachable: bool,
    }

    impl RecordRepository for MemoryRepository {
        fn fetch_all_records(&self) -> Result<Vec<Record>> {
            if self.unreachable {
                return Err(InsightError::Connectivity("store offline".to_string()));
            }
            Ok(self.records.lock().unwrap().clone())
        }

        fn append_record(&self, record: &Record) -> Result<()> {
            if self.unreachable {
                return Err(InsightError::Connectivity("store offline".to_string()));
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    pub struct CannedGenerator {
        pub prompts: Arc<Mutex<Vec<String>>>,
        pub failure: Option<String>,
    }

    impl AnswerGenerator for CannedGenerator {
        fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.failure {
                Some(message) => Err(InsightError::ExternalService(message.clone())),
                None => Ok("canned answer".to_string()),
            }
        }
    }
}
