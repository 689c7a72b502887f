use mongodb::{
    bson::{doc, Document},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        question::{QuestionDescription, QuestionSpec, QuestionSummary, VoteCount, VoteRequest},
    },
    db::{
        question::Question,
        user::{find_users, User},
    },
    mongodb::{Coll, Id},
};

pub fn routes() -> Vec<Route> {
    routes![create_question, list_questions, get_question, vote_question]
}

#[post("/api/questions", data = "<spec>", format = "json")]
async fn create_question(
    token: AuthToken,
    spec: Json<QuestionSpec>,
    questions: Coll<Question>,
    users: Coll<User>,
) -> Result<(Status, Json<QuestionDescription>)> {
    let question = Question {
        id: Id::new(),
        question: spec.into_inner().into_question(token.id)?,
    };
    questions.insert_one(&question, None).await?;

    let author = users.find_one(token.id.as_doc(), None).await?;
    Ok((
        Status::Created,
        Json(QuestionDescription::populate(question, author.as_ref())),
    ))
}

#[get("/api/questions")]
async fn list_questions(
    questions: Coll<Question>,
    users: Coll<User>,
) -> Result<Json<Vec<QuestionSummary>>> {
    let newest_first = FindOptions::builder()
        .sort(doc! { "created_at": -1, "_id": -1 })
        .build();
    let all: Vec<Question> = questions
        .find(None, newest_first)
        .await?
        .try_collect()
        .await?;

    let authors = find_users(&users, all.iter().map(|question| &question.author)).await?;
    let summaries = all
        .into_iter()
        .map(|question| QuestionSummary::populate(question, &authors))
        .collect();
    Ok(Json(summaries))
}

/// Fetch a question, counting the view.
#[get("/api/questions/<question_id>")]
async fn get_question(
    question_id: Id,
    questions: Coll<Question>,
    users: Coll<User>,
) -> Result<Json<QuestionDescription>> {
    let question = increment(&questions, question_id, "views", 1)
        .await?
        .ok_or_else(|| Error::not_found("Question"))?;
    let author = users.find_one(question.author.as_doc(), None).await?;
    Ok(Json(QuestionDescription::populate(question, author.as_ref())))
}

#[post("/api/questions/<question_id>/vote", data = "<vote>", format = "json")]
async fn vote_question(
    _token: AuthToken,
    question_id: Id,
    vote: Json<VoteRequest>,
    questions: Coll<Question>,
) -> Result<Json<VoteCount>> {
    let question = increment(&questions, question_id, "votes", vote.direction.delta())
        .await?
        .ok_or_else(|| Error::not_found("Question"))?;
    Ok(Json(VoteCount {
        votes: question.votes,
    }))
}

/// Atomically add `by` to a counter field of the question, returning the updated question.
async fn increment(
    questions: &Coll<Question>,
    question_id: Id,
    field: &str,
    by: i64,
) -> Result<Option<Question>> {
    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let mut counter = Document::new();
    counter.insert(field, by);
    let question = questions
        .find_one_and_update(question_id.as_doc(), doc! { "$inc": counter }, options)
        .await?;
    Ok(question)
}
