use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core answer data, as stored in the database.
///
/// The answer's ID must also appear in `question`'s answer list and in
/// `author`'s list of given answers for as long as this document exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerCore {
    pub content: String,
    pub author: Id,
    pub question: Id,
    /// Comments in the order they were posted.
    pub comments: Vec<Comment>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl AnswerCore {
    /// Create a fresh answer with no comments.
    pub fn new(content: String, author: Id, question: Id) -> Self {
        let now = Utc::now();
        Self {
            content,
            author,
            question,
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// May the given user edit this answer?
    pub fn editable_by(&self, user: Id) -> bool {
        self.author == user
    }
}

/// An answer without an ID.
pub type NewAnswer = AnswerCore;

/// An answer from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub answer: AnswerCore,
}

impl Deref for Answer {
    type Target = AnswerCore;

    fn deref(&self) -> &Self::Target {
        &self.answer
    }
}

impl DerefMut for Answer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.answer
    }
}

/// A comment on an answer. Stored inline in the answer document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub content: String,
    pub author: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(content: String, author: Id) -> Self {
        Self {
            content,
            author,
            created_at: Utc::now(),
        }
    }
}
