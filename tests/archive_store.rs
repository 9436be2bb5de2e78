use std::sync::Arc;

use chatlog_server::calendar::{CalendarConfig, CalendarIndex, CalendarZone, TimeRange};
use chatlog_server::models::{ChatMessage, ChatSummary, ChatUser, DataResponse};
use chatlog_server::routes::chats::{list_chats, list_day_messages, list_messages};
use chatlog_server::routes::users::{get_user, list_users};
use chatlog_server::store::{MessageStore, PgTimestampSource, StoreError, TimestampSource};
use chatlog_server::test_support::{TestDatabase, TestDatabaseError, TestFixtures, TestRocketBuilder};
use chrono::{TimeZone, Utc};
use rocket::http::Status;
use rocket::routes;

const CHAT: i64 = -100_123;

fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap().timestamp()
}

fn utc_config() -> CalendarConfig {
    CalendarConfig {
        zone: CalendarZone::utc(),
        population_workers: 1,
        queue_capacity: 4,
        batch_size: 16,
    }
}

async fn seeded_database(test_name: &str) -> Option<TestDatabase> {
    let test_db = match TestDatabase::new_from_env().await {
        Ok(db) => db,
        Err(TestDatabaseError::MissingUrl) => {
            eprintln!("skipping {test_name}: TEST_DATABASE_URL not set");
            return None;
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    };

    let fixtures = TestFixtures::new(test_db.pool());
    fixtures
        .insert_chat(CHAT, "supergroup", Some("Rustaceans"), Some("rustaceans"))
        .await
        .expect("insert chat");
    fixtures
        .insert_chat(1, "private", None, None)
        .await
        .expect("insert chat");

    let messages = [
        (1, Some("ann"), ts(2021, 12, 31, 23, 59), Some("last of the year")),
        (2, Some("bob"), ts(2022, 1, 1, 0, 0), Some("happy new year")),
        (3, None, ts(2022, 1, 1, 8, 30), None),
        (4, Some("ann"), ts(2022, 3, 9, 12, 0), Some("spring")),
    ];
    for (message_id, from_name, date, text) in messages {
        fixtures
            .insert_message(CHAT, message_id, from_name, date, text)
            .await
            .expect("insert message");
    }

    let users = [
        (1, Some("ann_lee"), "Ann", Some("Lee")),
        (2, None, "Bob", Some("Stone")),
        (3, Some("bob_k"), "Bob", Some("Kane")),
        (4, None, "Cleo", None),
    ];
    for (id, username, first_name, last_name) in users {
        fixtures
            .insert_user(id, username, first_name, last_name)
            .await
            .expect("insert user");
    }

    Some(test_db)
}

#[tokio::test]
async fn timestamps_respect_half_open_ranges() {
    let Some(test_db) = seeded_database("timestamp range test").await else {
        return;
    };
    let source = PgTimestampSource::new(test_db.pool_clone());

    let all = source
        .timestamps(CHAT, TimeRange::All)
        .await
        .expect("query succeeds");
    assert_eq!(all.len(), 4);
    assert!(all.windows(2).all(|pair| pair[0] <= pair[1]));

    let year_2021 = CalendarZone::utc().year_range(2021).expect("valid year");
    let in_2021 = source.timestamps(CHAT, year_2021).await.expect("query succeeds");
    assert_eq!(in_2021, vec![ts(2021, 12, 31, 23, 59)]);

    let empty = source
        .timestamps(1, TimeRange::All)
        .await
        .expect("query succeeds");
    assert!(empty.is_empty());

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn calendar_index_reads_from_postgres() {
    let Some(test_db) = seeded_database("calendar index test").await else {
        return;
    };
    let source = Arc::new(PgTimestampSource::new(test_db.pool_clone()));
    let calendar = CalendarIndex::new(source, &utc_config());

    assert_eq!(calendar.years(CHAT).await.expect("years"), vec![2021, 2022]);
    assert_eq!(calendar.months(CHAT, 2022).await.expect("months"), vec![1, 3]);
    assert_eq!(calendar.days(CHAT, 2021, 12).await.expect("days"), vec![31]);

    calendar.population().wait_idle().await;
    assert_eq!(calendar.cache().days(CHAT, 2022, 1), vec![1]);

    calendar.shutdown().await;
    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn chat_routes_list_chats_and_day_messages() {
    let Some(test_db) = seeded_database("chat routes test").await else {
        return;
    };
    let pool = test_db.pool_clone();
    let calendar = CalendarIndex::new(
        Arc::new(PgTimestampSource::new(pool.clone())),
        &utc_config(),
    );

    let client = TestRocketBuilder::new()
        .mount_api_routes(routes![list_chats, list_day_messages])
        .manage(MessageStore::new(pool))
        .manage(calendar)
        .async_client()
        .await;

    let response = client.get("/api/v1/chats").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let chats: DataResponse<Vec<ChatSummary>> = response.into_json().await.expect("valid JSON");
    let ids: Vec<i64> = chats.data.iter().map(|chat| chat.id).collect();
    assert_eq!(ids, vec![CHAT, 1]);
    assert_eq!(chats.data[0].title.as_deref(), Some("Rustaceans"));

    let response = client
        .get(format!("/api/v1/chats/{CHAT}/messages/2022/1/1"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let messages: DataResponse<Vec<ChatMessage>> =
        response.into_json().await.expect("valid JSON");
    let ids: Vec<i64> = messages.data.iter().map(|m| m.message_id).collect();
    assert_eq!(ids, vec![2, 3]);
    assert_eq!(messages.data[0].text.as_deref(), Some("happy new year"));
    assert_eq!(messages.data[1].from_name, None);

    let response = client
        .get(format!("/api/v1/chats/{CHAT}/messages/2022/2/30"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);

    drop(response);
    drop(client);
    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn user_lookup_by_username_and_names() {
    let Some(test_db) = seeded_database("user lookup test").await else {
        return;
    };
    let store = MessageStore::new(test_db.pool_clone());

    let ids: Vec<i64> = store
        .users()
        .await
        .expect("users")
        .iter()
        .map(|user| user.id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    assert_eq!(store.user_by_name("@ANN_LEE").await.expect("by username").id, 1);
    assert_eq!(store.user_by_name("Ann").await.expect("by first name").id, 1);
    assert_eq!(store.user_by_name("Bob Stone").await.expect("by full name").id, 2);
    assert_eq!(store.user_by_name("Cleo").await.expect("no last name").id, 4);

    match store.user_by_name("Bob").await {
        Err(StoreError::Ambiguous { candidates, .. }) => {
            assert_eq!(candidates, vec!["Bob Stone".to_string(), "@bob_k".to_string()]);
        }
        other => panic!("expected ambiguous lookup, got {other:?}"),
    }

    for missing in ["Zed", "@nobody", "Ann Mary Lee", "Ann Park"] {
        assert!(
            matches!(store.user_by_name(missing).await, Err(StoreError::NotFound(_))),
            "{missing} should not resolve"
        );
    }

    // Quote characters are bound as data, not SQL.
    assert!(matches!(
        store.user_by_name("@x' OR '1'='1").await,
        Err(StoreError::NotFound(_))
    ));

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn user_and_history_routes() {
    let Some(test_db) = seeded_database("user routes test").await else {
        return;
    };

    let client = TestRocketBuilder::new()
        .mount_api_routes(routes![list_users, get_user, list_messages])
        .manage(MessageStore::new(test_db.pool_clone()))
        .async_client()
        .await;

    let response = client.get("/api/v1/users").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let users: DataResponse<Vec<ChatUser>> = response.into_json().await.expect("valid JSON");
    assert_eq!(users.data.len(), 4);

    let response = client.get("/api/v1/users/Ann%20Lee").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let user: DataResponse<ChatUser> = response.into_json().await.expect("valid JSON");
    assert_eq!(user.data.username.as_deref(), Some("ann_lee"));

    let response = client.get("/api/v1/users/@bob_k").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    drop(response);

    let response = client.get("/api/v1/users/Bob").dispatch().await;
    assert_eq!(response.status(), Status::Conflict);
    let body: serde_json::Value = response.into_json().await.expect("valid JSON");
    assert_eq!(body["error"], "Conflict");

    let response = client.get("/api/v1/users/Zed").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);
    let body: serde_json::Value = response.into_json().await.expect("valid JSON");
    assert_eq!(body["error"], "NotFound");

    let response = client
        .get(format!("/api/v1/chats/{CHAT}/messages"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let history: DataResponse<Vec<ChatMessage>> = response.into_json().await.expect("valid JSON");
    let ids: Vec<i64> = history.data.iter().map(|m| m.message_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    let response = client.get("/api/v1/chats/1/messages").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    let history: DataResponse<Vec<ChatMessage>> = response.into_json().await.expect("valid JSON");
    assert!(history.data.is_empty());

    drop(client);
    test_db.close().await.expect("failed to drop test database");
}
