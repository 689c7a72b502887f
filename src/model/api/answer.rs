use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{
        user::{AuthorSummary, CommentAuthor},
        ApiId,
    },
    db::{
        answer::{Answer, Comment},
        user::User,
    },
    mongodb::Id,
};

/// A new answer to a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSpec {
    pub content: String,
    pub question_id: ApiId,
}

/// A change to an existing answer. Missing or blank content leaves the answer as it was.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerUpdate {
    #[serde(default)]
    pub content: Option<String>,
}

impl AnswerUpdate {
    /// The replacement content, if there is any.
    pub fn new_content(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|content| !content.is_empty())
    }
}

/// A new comment on an answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentSpec {
    pub content: String,
}

/// An answer with its author and comment authors populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerDescription {
    pub id: ApiId,
    pub content: String,
    /// `None` if the author's account no longer exists.
    pub author: Option<AuthorSummary>,
    pub question: ApiId,
    pub comments: Vec<CommentDescription>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnswerDescription {
    /// Build the description, looking up every referenced user in `users`.
    pub fn populate(answer: Answer, users: &HashMap<Id, User>) -> Self {
        Self {
            id: answer.id.into(),
            author: users.get(&answer.author).map(AuthorSummary::from),
            question: answer.question.into(),
            created_at: answer.created_at,
            updated_at: answer.updated_at,
            comments: answer
                .answer
                .comments
                .into_iter()
                .map(|comment| CommentDescription::populate(comment, users))
                .collect(),
            content: answer.answer.content,
        }
    }
}

/// Every user an answer refers to: its author and its commenters.
pub fn referenced_users<'a>(answers: impl IntoIterator<Item = &'a Answer>) -> HashSet<Id> {
    let mut ids = HashSet::new();
    for answer in answers {
        ids.insert(answer.author);
        ids.extend(answer.comments.iter().map(|comment| comment.author));
    }
    ids
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDescription {
    pub content: String,
    pub author: Option<CommentAuthor>,
    pub created_at: DateTime<Utc>,
}

impl CommentDescription {
    fn populate(comment: Comment, users: &HashMap<Id, User>) -> Self {
        Self {
            author: users.get(&comment.author).map(CommentAuthor::from),
            content: comment.content,
            created_at: comment.created_at,
        }
    }
}
