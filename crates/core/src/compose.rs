use tracing::debug;

use crate::domain::Record;
use crate::ports::{AnswerGenerator, Result};

const INSTRUCTIONS: &str = "You are a professional investment advisory AI. \
Answer the question using the in-depth analyses of the reference videos below.
Rather than simply summarizing, build a logical answer around the key arguments, implications and evidence.";

/// Formats one record as a labeled reference block; `position` is 1-based
pub fn format_reference(position: usize, record: &Record) -> String {
    format!(
        "[Reference video {position}]\n\
         - Title: {} (Channel: {})\n\
         - Key arguments: {}\n\
         - Implications: {}\n\
         - Validity check: {}\n\
         - Summary: {}\n",
        record.title,
        record.channel_name,
        record.key_arguments,
        record.implications,
        record.validity_check,
        record.full_summary,
    )
}

pub fn build_context(records: &[&Record]) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| format_reference(i + 1, record))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Embeds the context blocks and the question in the instruction template
pub fn build_prompt(query: &str, context: &[&Record]) -> String {
    format!(
        "{INSTRUCTIONS}\n\n[Reference video data]\n{}\n[Question]\n{}\n",
        build_context(context),
        query
    )
}

/// Builds prompts from retrieved records and hands them to the model
pub struct AnswerComposer {
    generator: Box<dyn AnswerGenerator>,
}

impl AnswerComposer {
    pub fn new(generator: Box<dyn AnswerGenerator>) -> Self {
        Self { generator }
    }

    /// Returns the model's raw text. Generator errors pass through untouched.
    pub fn compose(&self, query: &str, context: &[&Record]) -> Result<String> {
        let prompt = build_prompt(query, context);
        debug!(
            references = context.len(),
            prompt_chars = prompt.chars().count(),
            "submitting prompt"
        );
        self.generator.generate(&prompt)
    }
}
