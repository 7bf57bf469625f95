mod common;

use crate::common::{create_test_conversation, create_test_user, test_db};
use agora_db::turn;
use agora_entity::turn::{Role, Status};
use sea_orm::DbErr;
use test_log::test;

#[test(tokio::test)]
async fn test_append_assigns_sequential_order() {
    let db = &test_db().await;
    let user = create_test_user(db).await;
    let conversation = create_test_conversation(db, user.id).await;

    let first = turn::Mutation::append_turn(
        db,
        conversation.conversation_id,
        Role::User,
        "Hello".to_owned(),
        Status::Complete,
    )
    .await
    .unwrap();
    let second = turn::Mutation::append_turn(
        db,
        conversation.conversation_id,
        Role::Agent,
        "Hi there!".to_owned(),
        Status::Complete,
    )
    .await
    .unwrap();

    assert_eq!(first.turn_order, 0);
    assert_eq!(second.turn_order, 1);

    let turns = turn::Query::list_turns(db, conversation.conversation_id).await.unwrap();
    let contents: Vec<_> = turns.iter().map(|turn| turn.content.as_str()).collect();
    assert_eq!(contents, ["Hello", "Hi there!"]);
    assert_eq!(turns[1].role, Role::Agent);
}

#[test(tokio::test)]
async fn test_recent_turns_skips_failed_and_limits() {
    let db = &test_db().await;
    let user = create_test_user(db).await;
    let conversation = create_test_conversation(db, user.id).await;
    let id = conversation.conversation_id;

    for (role, content, status) in [
        (Role::User, "one", Status::Complete),
        (Role::Agent, "", Status::Failed),
        (Role::User, "two", Status::Complete),
        (Role::Agent, "half", Status::Partial),
        (Role::User, "three", Status::Complete),
    ] {
        turn::Mutation::append_turn(db, id, role, content.to_owned(), status)
            .await
            .unwrap();
    }

    let turns = turn::Query::recent_turns(db, id, 3).await.unwrap();
    let contents: Vec<_> = turns.iter().map(|turn| turn.content.as_str()).collect();
    assert_eq!(contents, ["two", "half", "three"]);
}

#[test(tokio::test)]
async fn test_complete_partial_only_once() {
    let db = &test_db().await;
    let user = create_test_user(db).await;
    let conversation = create_test_conversation(db, user.id).await;
    let id = conversation.conversation_id;

    let partial = turn::Mutation::append_turn(db, id, Role::Agent, "Sure,".to_owned(), Status::Partial)
        .await
        .unwrap();

    let completed = turn::Mutation::complete_partial(db, id, partial.turn_order, "Sure, here it is.".to_owned())
        .await
        .unwrap();
    assert_eq!(completed.status, Status::Complete);
    assert_eq!(completed.content, "Sure, here it is.");

    let again = turn::Mutation::complete_partial(db, id, partial.turn_order, "changed".to_owned()).await;
    assert!(matches!(again, Err(DbErr::RecordNotUpdated)));

    let turns = turn::Query::list_turns(db, id).await.unwrap();
    assert_eq!(turns[0].content, "Sure, here it is.");
}

#[test(tokio::test)]
async fn test_complete_partial_rejects_failed_turn() {
    let db = &test_db().await;
    let user = create_test_user(db).await;
    let conversation = create_test_conversation(db, user.id).await;
    let id = conversation.conversation_id;

    let failed = turn::Mutation::append_turn(db, id, Role::Agent, String::new(), Status::Failed)
        .await
        .unwrap();

    let result = turn::Mutation::complete_partial(db, id, failed.turn_order, "text".to_owned()).await;
    assert!(matches!(result, Err(DbErr::RecordNotUpdated)));
}
