use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    api::{user::AuthorSummary, ApiId},
    db::{
        question::{NewQuestion, Question},
        user::User,
    },
    mongodb::Id,
};

/// A question as submitted by its author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSpec {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl QuestionSpec {
    /// Validate this spec and turn it into a new question by the given author.
    pub fn into_question(self, author: Id) -> Result<NewQuestion, Error> {
        let title = self.title.trim().to_string();
        let body = self.body.trim().to_string();
        if title.is_empty() {
            return Err(Error::BadRequest("title must not be empty".to_string()));
        }
        if body.is_empty() {
            return Err(Error::BadRequest("body must not be empty".to_string()));
        }
        Ok(NewQuestion::new(title, body, normalise_tags(self.tags), author))
    }
}

/// Trim and lowercase tags, dropping empty ones and repeats but keeping the
/// order of first appearance.
pub fn normalise_tags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut normalised: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !normalised.contains(&tag) {
            normalised.push(tag);
        }
    }
    normalised
}

/// A full question, including its answer references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDescription {
    pub id: ApiId,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    /// `None` if the author's account no longer exists.
    pub author: Option<AuthorSummary>,
    pub answers: Vec<ApiId>,
    pub votes: i64,
    pub views: i64,
    pub created_at: DateTime<Utc>,
}

impl QuestionDescription {
    pub fn populate(question: Question, author: Option<&User>) -> Self {
        Self {
            id: question.id.into(),
            author: author.map(AuthorSummary::from),
            answers: question.answers.iter().map(|&id| id.into()).collect(),
            title: question.question.title,
            body: question.question.body,
            tags: question.question.tags,
            votes: question.question.votes,
            views: question.question.views,
            created_at: question.question.created_at,
        }
    }
}

/// A question as shown in listings: the answer list is reduced to its length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSummary {
    pub id: ApiId,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub author: Option<AuthorSummary>,
    pub votes: i64,
    pub answer_count: usize,
    pub views: i64,
    pub created_at: DateTime<Utc>,
}

impl QuestionSummary {
    pub fn populate(question: Question, authors: &HashMap<Id, User>) -> Self {
        Self {
            id: question.id.into(),
            author: authors.get(&question.author).map(AuthorSummary::from),
            answer_count: question.answers.len(),
            title: question.question.title,
            body: question.question.body,
            tags: question.question.tags,
            votes: question.question.votes,
            views: question.question.views,
            created_at: question.question.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    /// The change this vote makes to the vote count.
    pub fn delta(self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VoteRequest {
    pub direction: VoteDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCount {
    pub votes: i64,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_normalised() {
        let tags = normalise_tags(vec![
            " SQL".to_string(),
            "database".to_string(),
            "".to_string(),
            "sql".to_string(),
            "  ".to_string(),
        ]);
        assert_eq!(tags, vec!["sql", "database"]);
    }

    #[test]
    fn question_validation() {
        let author = Id::new();
        let question = QuestionSpec::example().into_question(author).unwrap();
        assert_eq!(question.tags, vec!["react", "performance"]);
        assert_eq!(question.author, author);
        assert_eq!(question.votes, 0);
        assert!(question.answers.is_empty());

        let mut untitled = QuestionSpec::example();
        untitled.title = " ".into();
        assert!(matches!(
            untitled.into_question(author),
            Err(Error::BadRequest(_))
        ));

        let mut empty = QuestionSpec::example();
        empty.body = String::new();
        assert!(matches!(
            empty.into_question(author),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn vote_deltas() {
        assert_eq!(VoteDirection::Up.delta(), 1);
        assert_eq!(VoteDirection::Down.delta(), -1);
    }
}
