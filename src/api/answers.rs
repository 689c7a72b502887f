//! The answer lifecycle.
//!
//! An answer's ID lives in three places: the answer document itself, its
//! question's `answers` list and its author's `answers_given` list. Every
//! endpoint that creates or removes an answer updates all three inside one
//! transaction, so a failure part-way through leaves no dangling references.
//! Transactions that lose a write conflict to a concurrent request are retried.

use chrono::Utc;
use log::info;
use mongodb::{
    bson::{doc, to_bson, DateTime as BsonDateTime},
    options::FindOptions,
    Client, ClientSession,
};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        answer::{referenced_users, AnswerDescription, AnswerSpec, AnswerUpdate, CommentSpec},
        auth::AuthToken,
        Message,
    },
    db::{
        answer::{Answer, AnswerCore, Comment},
        question::Question,
        user::{find_users, User},
    },
    mongodb::{finish_attempt, Coll, Id},
};

pub fn routes() -> Vec<Route> {
    routes![
        create_answer,
        list_answers,
        update_answer,
        delete_answer,
        add_comment
    ]
}

/// Populate a single answer's author and commenters.
async fn describe(answer: Answer, users: &Coll<User>) -> Result<AnswerDescription> {
    let referenced = find_users(users, &referenced_users([&answer])).await?;
    Ok(AnswerDescription::populate(answer, &referenced))
}

async fn find_answer(answers: &Coll<Answer>, answer_id: Id) -> Result<Answer> {
    answers
        .find_one(answer_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found("Answer"))
}

/// Insert the answer and link it from its question and its author, within the
/// session's transaction. The question must exist.
async fn insert_linked(
    answer: &Answer,
    answers: &Coll<Answer>,
    questions: &Coll<Question>,
    users: &Coll<User>,
    session: &mut ClientSession,
) -> Result<()> {
    questions
        .find_one_with_session(answer.question.as_doc(), None, session)
        .await?
        .ok_or_else(|| Error::not_found("Question"))?;

    answers.insert_one_with_session(answer, None, session).await?;
    questions
        .update_one_with_session(
            answer.question.as_doc(),
            doc! { "$push": { "answers": answer.id } },
            None,
            session,
        )
        .await?;
    users
        .update_one_with_session(
            answer.author.as_doc(),
            doc! { "$push": { "answers_given": answer.id } },
            None,
            session,
        )
        .await?;
    Ok(())
}

/// Unlink the answer from its question and its author, then delete it, within the
/// session's transaction. Only the author or an admin may do this.
async fn delete_linked(
    token: &AuthToken,
    answer_id: Id,
    answers: &Coll<Answer>,
    questions: &Coll<Question>,
    users: &Coll<User>,
    session: &mut ClientSession,
) -> Result<()> {
    let answer = answers
        .find_one_with_session(answer_id.as_doc(), None, session)
        .await?
        .ok_or_else(|| Error::not_found("Answer"))?;

    if !(answer.editable_by(token.id) || token.is_admin()) {
        return Err(Error::Forbidden(format!(
            "only the author or an admin may delete answer {}",
            answer_id
        )));
    }

    questions
        .update_one_with_session(
            answer.question.as_doc(),
            doc! { "$pull": { "answers": answer.id } },
            None,
            session,
        )
        .await?;
    users
        .update_one_with_session(
            answer.author.as_doc(),
            doc! { "$pull": { "answers_given": answer.id } },
            None,
            session,
        )
        .await?;
    answers
        .delete_one_with_session(answer.id.as_doc(), None, session)
        .await?;
    Ok(())
}

#[post("/api/answers", data = "<spec>", format = "json")]
pub async fn create_answer(
    token: AuthToken,
    spec: Json<AnswerSpec>,
    answers: Coll<Answer>,
    questions: Coll<Question>,
    users: Coll<User>,
    db_client: &State<Client>,
) -> Result<(Status, Json<AnswerDescription>)> {
    let AnswerSpec {
        content,
        question_id,
    } = spec.into_inner();
    let content = content.trim().to_string();
    if content.is_empty() {
        return Err(Error::BadRequest("answer content must not be empty".to_string()));
    }

    let answer = Answer {
        id: Id::new(),
        answer: AnswerCore::new(content, token.id, question_id.into()),
    };

    let mut session = db_client.start_session(None).await?;
    let mut attempt = 1;
    loop {
        session.start_transaction(None).await?;
        let linked = insert_linked(&answer, &answers, &questions, &users, &mut session).await;
        if finish_attempt(&mut session, linked, attempt).await?.is_some() {
            break;
        }
        attempt += 1;
    }
    info!("User {} answered question {}", token.id, question_id);

    Ok((Status::Created, Json(describe(answer, &users).await?)))
}

/// All answers to a question, newest first. An unknown question simply has no answers.
#[get("/api/answers/question/<question_id>")]
pub async fn list_answers(
    question_id: Id,
    answers: Coll<Answer>,
    users: Coll<User>,
) -> Result<Json<Vec<AnswerDescription>>> {
    // `_id` breaks ties between answers created in the same millisecond.
    let newest_first = FindOptions::builder()
        .sort(doc! { "created_at": -1, "_id": -1 })
        .build();
    let found: Vec<Answer> = answers
        .find(doc! { "question": question_id }, newest_first)
        .await?
        .try_collect()
        .await?;

    let referenced = find_users(&users, &referenced_users(&found)).await?;
    let descriptions = found
        .into_iter()
        .map(|answer| AnswerDescription::populate(answer, &referenced))
        .collect();
    Ok(Json(descriptions))
}

#[put("/api/answers/<answer_id>", data = "<update>", format = "json")]
pub async fn update_answer(
    token: AuthToken,
    answer_id: Id,
    update: Json<AnswerUpdate>,
    answers: Coll<Answer>,
    users: Coll<User>,
) -> Result<Json<AnswerDescription>> {
    let mut answer = find_answer(&answers, answer_id).await?;

    if !answer.editable_by(token.id) {
        return Err(Error::Forbidden(format!(
            "only the author may edit answer {}",
            answer_id
        )));
    }

    if let Some(content) = update.new_content() {
        let now = Utc::now();
        answers
            .update_one(
                answer_id.as_doc(),
                doc! { "$set": {
                    "content": content,
                    "updated_at": BsonDateTime::from_chrono(now),
                } },
                None,
            )
            .await?;
        answer.content = content.to_string();
        answer.updated_at = now;
    }

    Ok(Json(describe(answer, &users).await?))
}

#[delete("/api/answers/<answer_id>")]
pub async fn delete_answer(
    token: AuthToken,
    answer_id: Id,
    answers: Coll<Answer>,
    questions: Coll<Question>,
    users: Coll<User>,
    db_client: &State<Client>,
) -> Result<Json<Message>> {
    let mut session = db_client.start_session(None).await?;
    let mut attempt = 1;
    loop {
        session.start_transaction(None).await?;
        let deleted = delete_linked(
            &token,
            answer_id,
            &answers,
            &questions,
            &users,
            &mut session,
        )
        .await;
        if finish_attempt(&mut session, deleted, attempt).await?.is_some() {
            break;
        }
        attempt += 1;
    }
    info!("User {} deleted answer {}", token.id, answer_id);

    Ok(Json(Message::new("Answer removed")))
}

#[post("/api/answers/<answer_id>/comments", data = "<spec>", format = "json")]
pub async fn add_comment(
    token: AuthToken,
    answer_id: Id,
    spec: Json<CommentSpec>,
    answers: Coll<Answer>,
    users: Coll<User>,
) -> Result<(Status, Json<AnswerDescription>)> {
    let content = spec.into_inner().content.trim().to_string();
    if content.is_empty() {
        return Err(Error::BadRequest("comment must not be empty".to_string()));
    }

    let mut answer = find_answer(&answers, answer_id).await?;
    let comment = Comment::new(content, token.id);
    answers
        .update_one(
            answer_id.as_doc(),
            doc! { "$push": { "comments": to_bson(&comment)? } },
            None,
        )
        .await?;
    answer.comments.push(comment);

    Ok((Status::Created, Json(describe(answer, &users).await?)))
}

#[cfg(test)]
mod tests {
    use rocket::{
        futures::future::{join, join_all},
        http::ContentType,
        local::asynchronous::{Client, LocalResponse},
        serde::json::serde_json::json,
    };

    use crate::model::{
        api::user::{Credentials, UserProfile},
        db::{
            answer::NewAnswer,
            question::NewQuestion,
            user::NewUser,
        },
    };

    use super::*;

    /// Insert a question by someone else, returning its ID.
    async fn insert_question(questions: &Coll<Question>) -> Id {
        let question = Question {
            id: Id::new(),
            question: NewQuestion::example(Id::new()),
        };
        questions.insert_one(&question, None).await.unwrap();
        question.id
    }

    /// Insert a user who never logs in, returning their ID.
    async fn insert_bystander(users: &Coll<User>) -> Id {
        let user = User {
            id: Id::new(),
            user: NewUser::bystander_example(),
        };
        users.insert_one(&user, None).await.unwrap();
        user.id
    }

    async fn current_user(client: &Client) -> UserProfile {
        client.get(uri!(crate::api::auth::me)).dispatch().await.into_json().await.unwrap()
    }

    async fn post_answer<'c>(client: &'c Client, question_id: Id, content: &str) -> LocalResponse<'c> {
        client
            .post(uri!(create_answer))
            .header(ContentType::JSON)
            .body(json!({ "content": content, "questionId": question_id.to_string() }).to_string())
            .dispatch()
            .await
    }

    #[backend_test(user)]
    async fn create_links_question_and_author(
        client: Client,
        questions: Coll<Question>,
        users: Coll<User>,
        answers: Coll<Answer>,
    ) {
        let question_id = insert_question(&questions).await;
        let before = questions
            .find_one(question_id.as_doc(), None)
            .await
            .unwrap()
            .unwrap()
            .answers
            .len();

        let response = post_answer(&client, question_id, "Use CONCAT(first, ' ', last).").await;
        assert_eq!(Status::Created, response.status());
        let created: AnswerDescription = response.into_json().await.unwrap();

        // Author fields are populated.
        let author = created.author.clone().unwrap();
        assert_eq!(author.username, Credentials::example().username);
        assert_eq!(*created.question, question_id);

        // The question gained exactly this answer.
        let question = questions
            .find_one(question_id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(question.answers.len(), before + 1);
        assert!(question.answers.contains(&*created.id));

        // So did the author.
        let user = users
            .find_one(author.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.answers_given, vec![*created.id]);

        let stored = answers
            .find_one(created.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.content, "Use CONCAT(first, ' ', last).");
    }

    #[backend_test(user)]
    async fn concurrent_answers_and_views_all_succeed(
        client: Client,
        questions: Coll<Question>,
        users: Coll<User>,
    ) {
        const ANSWERS: usize = 6;
        let question_id = insert_question(&questions).await;
        let question_uri = format!("/api/questions/{question_id}");

        // Answers and view-count updates all race on the same question document.
        let contents = (0..ANSWERS)
            .map(|i| format!("Concurrent answer {i}"))
            .collect::<Vec<_>>();
        let posts = join_all(
            contents
                .iter()
                .map(|content| post_answer(&client, question_id, content)),
        );
        let views = join_all(
            (0..ANSWERS).map(|_| client.get(question_uri.as_str()).dispatch()),
        );
        let (posted, viewed) = join(posts, views).await;

        for response in &posted {
            assert_eq!(Status::Created, response.status());
        }
        for response in &viewed {
            assert_eq!(Status::Ok, response.status());
        }

        let question = questions
            .find_one(question_id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(question.answers.len(), ANSWERS);
        assert_eq!(question.views, ANSWERS as i64);

        let profile = current_user(&client).await;
        let user = users
            .find_one(profile.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.answers_given.len(), ANSWERS);
    }

    #[backend_test(user)]
    async fn concurrent_deletes_all_succeed(
        client: Client,
        questions: Coll<Question>,
        answers: Coll<Answer>,
    ) {
        const ANSWERS: usize = 4;
        let question_id = insert_question(&questions).await;
        let mut created = Vec::new();
        for i in 0..ANSWERS {
            let answer: AnswerDescription = post_answer(&client, question_id, &format!("Answer {i}"))
                .await
                .into_json()
                .await
                .unwrap();
            created.push(*answer.id);
        }

        let deletes = join_all(
            created
                .iter()
                .map(|&id| client.delete(uri!(delete_answer(id))).dispatch()),
        );
        for response in deletes.await {
            assert_eq!(Status::Ok, response.status());
        }

        let question = questions
            .find_one(question_id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert!(question.answers.is_empty());
        assert_eq!(answers.count_documents(None, None).await.unwrap(), 0);
        assert!(current_user(&client).await.answers_given.is_empty());
    }

    #[backend_test(user)]
    async fn create_for_missing_question(client: Client, answers: Coll<Answer>, users: Coll<User>) {
        let response = post_answer(&client, Id::new(), "Into the void").await;
        assert_eq!(Status::NotFound, response.status());

        // Nothing was written anywhere.
        assert_eq!(answers.count_documents(None, None).await.unwrap(), 0);
        let profile = current_user(&client).await;
        let user = users
            .find_one(profile.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert!(user.answers_given.is_empty());
    }

    #[backend_test(user)]
    async fn create_rejects_empty_content(client: Client, questions: Coll<Question>) {
        let question_id = insert_question(&questions).await;
        let response = post_answer(&client, question_id, "   ").await;
        assert_eq!(Status::BadRequest, response.status());
    }

    #[backend_test]
    async fn create_requires_authentication(client: Client, questions: Coll<Question>) {
        let question_id = insert_question(&questions).await;
        let response = post_answer(&client, question_id, "Anonymous wisdom").await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test(user)]
    async fn list_is_newest_first_and_populated(
        client: Client,
        questions: Coll<Question>,
        users: Coll<User>,
        new_answers: Coll<NewAnswer>,
    ) {
        let question_id = insert_question(&questions).await;
        let bystander = insert_bystander(&users).await;

        for content in ["first", "second", "third"] {
            let response = post_answer(&client, question_id, content).await;
            assert_eq!(Status::Created, response.status());
        }

        // An old answer by the bystander, with a comment from them too.
        let mut old = NewAnswer::new("ancient".into(), bystander, question_id);
        old.created_at = old.created_at - chrono::Duration::days(1);
        old.comments.push(Comment::new("self-reply".into(), bystander));
        new_answers.insert_one(&old, None).await.unwrap();

        // Answers to other questions are not listed.
        new_answers
            .insert_one(NewAnswer::new("elsewhere".into(), bystander, Id::new()), None)
            .await
            .unwrap();

        let response = client.get(uri!(list_answers(question_id))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let listed: Vec<AnswerDescription> = response.into_json().await.unwrap();

        let contents = listed.iter().map(|a| a.content.as_str()).collect::<Vec<_>>();
        assert_eq!(contents, vec!["third", "second", "first", "ancient"]);
        assert!(listed
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at));

        let ancient = &listed[3];
        assert_eq!(ancient.author.as_ref().unwrap().username, "bystander");
        assert_eq!(
            ancient.comments[0].author.as_ref().unwrap().username,
            "bystander"
        );
    }

    #[backend_test]
    async fn list_for_unknown_question_is_empty(client: Client) {
        let response = client.get(uri!(list_answers(Id::new()))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let listed: Vec<AnswerDescription> = response.into_json().await.unwrap();
        assert!(listed.is_empty());
    }

    #[backend_test(user)]
    async fn author_can_update(client: Client, questions: Coll<Question>, answers: Coll<Answer>) {
        let question_id = insert_question(&questions).await;
        let created: AnswerDescription = post_answer(&client, question_id, "Use +")
            .await
            .into_json()
            .await
            .unwrap();

        let response = client
            .put(uri!(update_answer(*created.id)))
            .header(ContentType::JSON)
            .body(json!({ "content": "Use CONCAT instead" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let updated: AnswerDescription = response.into_json().await.unwrap();
        assert_eq!(updated.content, "Use CONCAT instead");
        assert!(updated.updated_at >= created.updated_at);

        // Blank content keeps what was there.
        let response = client
            .put(uri!(update_answer(*created.id)))
            .header(ContentType::JSON)
            .body(json!({ "content": "" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let stored = answers
            .find_one(created.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.content, "Use CONCAT instead");
    }

    #[backend_test(user)]
    async fn non_author_cannot_update(
        client: Client,
        questions: Coll<Question>,
        users: Coll<User>,
        answers: Coll<Answer>,
    ) {
        let question_id = insert_question(&questions).await;
        let bystander = insert_bystander(&users).await;
        let answer = Answer {
            id: Id::new(),
            answer: AnswerCore::new("Mine".into(), bystander, question_id),
        };
        answers.insert_one(&answer, None).await.unwrap();

        let response = client
            .put(uri!(update_answer(answer.id)))
            .header(ContentType::JSON)
            .body(json!({ "content": "Hijacked" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());

        let stored = answers
            .find_one(answer.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.content, "Mine");
    }

    #[backend_test(user)]
    async fn update_missing_answer(client: Client) {
        let response = client
            .put(uri!(update_answer(Id::new())))
            .header(ContentType::JSON)
            .body(json!({ "content": "Anything" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(user)]
    async fn author_delete_cleans_up_references(
        client: Client,
        questions: Coll<Question>,
        users: Coll<User>,
        answers: Coll<Answer>,
    ) {
        let question_id = insert_question(&questions).await;
        let created: AnswerDescription = post_answer(&client, question_id, "Short-lived")
            .await
            .into_json()
            .await
            .unwrap();

        let response = client
            .delete(uri!(delete_answer(*created.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let question = questions
            .find_one(question_id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert!(!question.answers.contains(&*created.id));

        let profile = current_user(&client).await;
        assert!(profile.answers_given.is_empty());
        let user = users
            .find_one(profile.id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert!(user.answers_given.is_empty());

        assert!(answers
            .find_one(created.id.as_doc(), None)
            .await
            .unwrap()
            .is_none());

        // A second delete finds nothing.
        let response = client
            .delete(uri!(delete_answer(*created.id)))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(user)]
    async fn non_author_cannot_delete(
        client: Client,
        questions: Coll<Question>,
        users: Coll<User>,
        answers: Coll<Answer>,
    ) {
        let question_id = insert_question(&questions).await;
        let bystander = insert_bystander(&users).await;
        let answer = Answer {
            id: Id::new(),
            answer: AnswerCore::new("Mine".into(), bystander, question_id),
        };
        answers.insert_one(&answer, None).await.unwrap();

        let response = client
            .delete(uri!(delete_answer(answer.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
        assert!(answers
            .find_one(answer.id.as_doc(), None)
            .await
            .unwrap()
            .is_some());
    }

    #[backend_test(admin)]
    async fn admin_can_delete_any_answer(
        client: Client,
        questions: Coll<Question>,
        users: Coll<User>,
        answers: Coll<Answer>,
    ) {
        let question_id = insert_question(&questions).await;
        let bystander = insert_bystander(&users).await;

        // Link the answer properly so the cleanup can be checked.
        let answer = Answer {
            id: Id::new(),
            answer: AnswerCore::new("Spam".into(), bystander, question_id),
        };
        answers.insert_one(&answer, None).await.unwrap();
        questions
            .update_one(
                question_id.as_doc(),
                doc! { "$push": { "answers": answer.id } },
                None,
            )
            .await
            .unwrap();
        users
            .update_one(
                bystander.as_doc(),
                doc! { "$push": { "answers_given": answer.id } },
                None,
            )
            .await
            .unwrap();

        let response = client
            .delete(uri!(delete_answer(answer.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let question = questions
            .find_one(question_id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert!(question.answers.is_empty());
        let user = users
            .find_one(bystander.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert!(user.answers_given.is_empty());
        assert_eq!(answers.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test(user)]
    async fn comments_are_appended_and_populated(client: Client, questions: Coll<Question>) {
        let question_id = insert_question(&questions).await;
        let created: AnswerDescription = post_answer(&client, question_id, "Use CONCAT")
            .await
            .into_json()
            .await
            .unwrap();

        for content in ["Thanks!", "Works in Postgres too"] {
            let response = client
                .post(uri!(add_comment(*created.id)))
                .header(ContentType::JSON)
                .body(json!({ "content": content }).to_string())
                .dispatch()
                .await;
            assert_eq!(Status::Created, response.status());
        }

        let listed: Vec<AnswerDescription> = client
            .get(uri!(list_answers(question_id)))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        let comments = &listed[0].comments;
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].content, "Thanks!");
        assert_eq!(
            comments[1].author.as_ref().unwrap().username,
            Credentials::example().username
        );

        let response = client
            .post(uri!(add_comment(Id::new())))
            .header(ContentType::JSON)
            .body(json!({ "content": "Hello?" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn other_user_session_is_forbidden_after_login(
        client: Client,
        questions: Coll<Question>,
        new_users: Coll<NewUser>,
    ) {
        // Two real accounts: the second may not touch the first's answer.
        for credentials in [Credentials::example(), Credentials::example2()] {
            new_users
                .insert_one(NewUser::try_from(credentials).unwrap(), None)
                .await
                .unwrap();
        }
        let question_id = insert_question(&questions).await;

        client
            .post(uri!(crate::api::auth::login))
            .header(ContentType::JSON)
            .body(json!(Credentials::example().login()).to_string())
            .dispatch()
            .await;
        let created: AnswerDescription = post_answer(&client, question_id, "First!")
            .await
            .into_json()
            .await
            .unwrap();

        client
            .post(uri!(crate::api::auth::login))
            .header(ContentType::JSON)
            .body(json!(Credentials::example2().login()).to_string())
            .dispatch()
            .await;
        let response = client
            .delete(uri!(delete_answer(*created.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
    }
}
