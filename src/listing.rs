//! Filtering, sorting and tag browsing over a fetched question listing.
//!
//! Nothing here touches the database: it works on the summaries returned by
//! `GET /api/questions`, so clients and the question browser share it.

use std::cmp::Reverse;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::model::api::question::QuestionSummary;

/// How many tags count as "popular".
pub const POPULAR_TAG_COUNT: usize = 8;

/// Bodies longer than this many characters are shortened in listings.
pub const EXCERPT_LENGTH: usize = 200;

/// Which questions to show. An empty field matches every question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionFilter {
    search: String,
    tag: String,
}

impl QuestionFilter {
    pub fn new(search: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            search: search.into().to_lowercase(),
            tag: tag.into(),
        }
    }

    /// Case-insensitive substring search over title, body and tags.
    pub fn search(search: impl Into<String>) -> Self {
        Self::new(search, "")
    }

    /// Exact tag match.
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::new("", tag)
    }

    pub fn matches(&self, question: &QuestionSummary) -> bool {
        self.matches_search(question) && self.matches_tag(question)
    }

    fn matches_search(&self, question: &QuestionSummary) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let found_in = |text: &str| text.to_lowercase().contains(&self.search);
        found_in(&question.title)
            || found_in(&question.body)
            || question.tags.iter().any(|tag| found_in(tag))
    }

    fn matches_tag(&self, question: &QuestionSummary) -> bool {
        self.tag.is_empty() || question.tags.iter().any(|tag| *tag == self.tag)
    }
}

/// The order to list questions in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Votes,
    Answers,
    Views,
}

impl SortOrder {
    /// Sort in place. Questions that compare equal keep their relative order.
    pub fn sort(self, questions: &mut [QuestionSummary]) {
        match self {
            Self::Newest => questions.sort_by_key(|q| Reverse(q.created_at)),
            Self::Oldest => questions.sort_by_key(|q| q.created_at),
            Self::Votes => questions.sort_by_key(|q| Reverse(q.votes)),
            Self::Answers => questions.sort_by_key(|q| Reverse(q.answer_count)),
            Self::Views => questions.sort_by_key(|q| Reverse(q.views)),
        }
    }
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Votes => "votes",
            Self::Answers => "answers",
            Self::Views => "views",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSortOrder(pub String);

impl Display for UnknownSortOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown sort order '{}' (expected newest, oldest, votes, answers or views)",
            self.0
        )
    }
}

impl std::error::Error for UnknownSortOrder {}

impl FromStr for SortOrder {
    type Err = UnknownSortOrder;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "votes" => Ok(Self::Votes),
            "answers" => Ok(Self::Answers),
            "views" => Ok(Self::Views),
            _ => Err(UnknownSortOrder(s.to_string())),
        }
    }
}

/// Filter then sort a listing, as shown to the user.
pub fn view(
    questions: Vec<QuestionSummary>,
    filter: &QuestionFilter,
    order: SortOrder,
) -> Vec<QuestionSummary> {
    let mut shown = questions
        .into_iter()
        .filter(|question| filter.matches(question))
        .collect::<Vec<_>>();
    order.sort(&mut shown);
    shown
}

/// Every distinct tag, in the order first seen.
pub fn all_tags<'a>(questions: impl IntoIterator<Item = &'a QuestionSummary>) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for question in questions {
        for tag in &question.tags {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
    }
    tags
}

pub fn popular_tags<'a>(questions: impl IntoIterator<Item = &'a QuestionSummary>) -> Vec<String> {
    let mut tags = all_tags(questions);
    tags.truncate(POPULAR_TAG_COUNT);
    tags
}

/// The start of a question body, for listings.
pub fn excerpt(body: &str) -> String {
    match body.char_indices().nth(EXCERPT_LENGTH) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
