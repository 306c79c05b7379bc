/// Column names in storage order. Position is the schema.
pub const COLUMNS: [&str; 14] = [
    "collected_at",
    "published_at",
    "video_id",
    "title",
    "channel_name",
    "main_topic",
    "key_arguments",
    "evidence",
    "implications",
    "validity_check",
    "sentiment",
    "full_summary",
    "tags",
    "url",
];

/// One analyzed video as stored in the table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub collected_at: String,
    pub published_at: String,
    pub video_id: String,
    pub title: String,
    pub channel_name: String,
    pub main_topic: String,
    pub key_arguments: String,
    pub evidence: String,
    pub implications: String,
    pub validity_check: String,
    pub sentiment: String,
    pub full_summary: String,
    pub tags: String,
    pub url: String,
}

impl Record {
    /// Cell values in column order
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.collected_at.clone(),
            self.published_at.clone(),
            self.video_id.clone(),
            self.title.clone(),
            self.channel_name.clone(),
            self.main_topic.clone(),
            self.key_arguments.clone(),
            self.evidence.clone(),
            self.implications.clone(),
            self.validity_check.clone(),
            self.sentiment.clone(),
            self.full_summary.clone(),
            self.tags.clone(),
            self.url.clone(),
        ]
    }

    /// Builds a record from cells in column order.
    /// Missing trailing cells become empty strings, extra cells are ignored.
    pub fn from_row<S: AsRef<str>>(cells: &[S]) -> Self {
        let cell = |i: usize| {
            cells
                .get(i)
                .map(|c| c.as_ref().to_string())
                .unwrap_or_default()
        };

        Record {
            collected_at: cell(0),
            published_at: cell(1),
            video_id: cell(2),
            title: cell(3),
            channel_name: cell(4),
            main_topic: cell(5),
            key_arguments: cell(6),
            evidence: cell(7),
            implications: cell(8),
            validity_check: cell(9),
            sentiment: cell(10),
            full_summary: cell(11),
            tags: cell(12),
            url: cell(13),
        }
    }

    /// Text the retriever indexes for this record
    pub fn search_text(&self) -> String {
        [
            self.title.as_str(),
            self.main_topic.as_str(),
            self.key_arguments.as_str(),
            self.implications.as_str(),
            self.full_summary.as_str(),
        ]
        .join(" ")
    }
}
