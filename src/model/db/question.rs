use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core question data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionCore {
    pub title: String,
    pub body: String,
    /// Normalised tags: lowercase, unique, in the order given.
    pub tags: Vec<String>,
    pub author: Id,
    /// Answers to this question, oldest first.
    pub answers: Vec<Id>,
    pub votes: i64,
    pub views: i64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl QuestionCore {
    /// Create a fresh question with no answers, votes or views.
    pub fn new(title: String, body: String, tags: Vec<String>, author: Id) -> Self {
        Self {
            title,
            body,
            tags,
            author,
            answers: Vec::new(),
            votes: 0,
            views: 0,
            created_at: Utc::now(),
        }
    }
}

/// A question without an ID.
pub type NewQuestion = QuestionCore;

/// A question from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub question: QuestionCore,
}

impl Deref for Question {
    type Target = QuestionCore;

    fn deref(&self) -> &Self::Target {
        &self.question
    }
}

impl DerefMut for Question {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.question
    }
}
