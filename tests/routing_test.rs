//! Coordinator Integration Tests
//!
//! Routing, history recording and failure handling through `respond`.

mod common;

use common::Harness;
use officebot::{Domain, ErrorKind, GatewayError, Route};

#[tokio::test]
async fn test_substring_label_routes_to_mail() {
    for label in ["EMAIL", "email-agent", "EMAILS", "Email."] {
        let h = Harness::new();
        h.model.reply(label).reply("ACTION: LIST");
        let mut coordinator = h.coordinator();

        let reply = coordinator.respond("show my inbox").await;

        assert_eq!(reply.route, Some(Route::Agent(Domain::Mail)), "{}", label);
        assert_eq!(reply.text, "[EMPTY] No emails found.");
        assert_eq!(h.mail.calls(), vec!["list:10"]);
    }
}

#[tokio::test]
async fn test_unknown_label_falls_back_to_chat() {
    let h = Harness::new();
    h.model.reply("FOO").reply("Hi there! I can help with mail, files and events.");
    let mut coordinator = h.coordinator();

    let reply = coordinator.respond("hello").await;

    assert_eq!(reply.route, Some(Route::Chat));
    assert_eq!(reply.text, "Hi there! I can help with mail, files and events.");
    assert!(reply.error.is_none());

    let prompts = h.model.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("The user said: \"hello\""));
    assert!(h.mail.calls().is_empty());
    assert_eq!(coordinator.history().len(), 1);
}

#[tokio::test]
async fn test_drive_and_calendar_routes() {
    let h = Harness::new();
    h.model
        .reply("DRIVE")
        .reply("ACTION: DELETE\nfile_id: f1")
        .reply("calendar")
        .reply("ACTION: DELETE\nevent_id: evt1");
    let mut coordinator = h.coordinator();

    assert_eq!(
        coordinator.handle("delete file f1").await,
        "[OK] File f1 deleted successfully"
    );
    assert_eq!(
        coordinator.handle("cancel event evt1").await,
        "[OK] Event evt1 deleted successfully"
    );
    assert_eq!(h.drive.calls(), vec!["delete:f1"]);
    assert_eq!(*h.calendar.deleted.lock().unwrap(), vec!["evt1".to_string()]);
}

#[tokio::test]
async fn test_prompt_context_is_last_three_turns() {
    let h = Harness::new();
    for i in 1..=5 {
        h.model.reply("CHAT").reply(&format!("answer {}", i));
    }
    h.model.reply("CHAT").reply("answer 6");
    let mut coordinator = h.coordinator();

    for i in 1..=5 {
        coordinator.handle(&format!("question {}", i)).await;
    }
    coordinator.handle("question 6").await;

    let prompts = h.model.prompts();
    let classification = &prompts[prompts.len() - 2];

    assert!(!classification.contains("question 1\n"));
    assert!(!classification.contains("question 2\n"));
    let expected = "User: question 3\nAssistant: answer 3\n\
                    User: question 4\nAssistant: answer 4\n\
                    User: question 5\nAssistant: answer 5\n";
    assert!(classification.contains(expected));
    assert!(classification.contains("Analyze this request: \"question 6\""));
}

#[tokio::test]
async fn test_agent_error_recorded_in_history() {
    let h = Harness::new();
    h.model.reply("EMAIL").reply("ACTION: READ\nmessage_id: NEED_ID");
    let mut coordinator = h.coordinator();

    let reply = coordinator.respond("read that").await;

    assert_eq!(reply.error, Some(ErrorKind::AmbiguousReference));
    assert_eq!(
        reply.text,
        "Please provide the message ID or use 'list emails' first."
    );
    assert_eq!(coordinator.history().len(), 1);
    assert!(h.mail.calls().is_empty());
}

#[tokio::test]
async fn test_sub_classifier_gateway_error_rendered_inline() {
    let h = Harness::new();
    h.model
        .reply("CALENDAR")
        .fail(GatewayError::RateLimitExceeded("quota".to_string()));
    let mut coordinator = h.coordinator();

    let reply = coordinator.respond("what's on today").await;

    assert_eq!(reply.route, Some(Route::Agent(Domain::Calendar)));
    assert_eq!(reply.error, Some(ErrorKind::RateLimitExceeded));
    assert_eq!(
        reply.text,
        "[ERROR] Error processing calendar request: Rate limit exceeded: quota"
    );
    assert_eq!(coordinator.history().len(), 1);
}

#[tokio::test]
async fn test_classifier_failure_not_recorded() {
    let h = Harness::new();
    h.model.fail(GatewayError::Api {
        status: 403,
        body: "API key invalid".to_string(),
    });
    let mut coordinator = h.coordinator();

    let reply = coordinator.respond("hello").await;

    assert_eq!(reply.route, None);
    assert_eq!(reply.error, Some(ErrorKind::Api));
    assert_eq!(
        reply.text,
        "[ERROR] Error processing request: API Error 403: API key invalid"
    );
    assert!(coordinator.history().is_empty());
}

#[tokio::test]
async fn test_chat_failure_not_recorded() {
    let h = Harness::new();
    h.model
        .reply("CHAT")
        .fail(GatewayError::Network("connection reset".to_string()));
    let mut coordinator = h.coordinator();

    let reply = coordinator.respond("tell me a joke").await;

    assert_eq!(reply.route, Some(Route::Chat));
    assert_eq!(reply.error, Some(ErrorKind::Network));
    assert!(reply.text.starts_with("[ERROR] Error processing request: Network error"));
    assert!(coordinator.history().is_empty());
}

#[tokio::test]
async fn test_history_limit_bounds_retention() {
    let h = Harness::new();
    for i in 0..4 {
        h.model.reply("CHAT").reply(&format!("answer {}", i));
    }
    let mut coordinator = h.coordinator().with_history_limit(2);

    for i in 0..4 {
        coordinator.handle(&format!("question {}", i)).await;
    }

    let users: Vec<&str> = coordinator.history().iter().map(|t| t.user.as_str()).collect();
    assert_eq!(users, vec!["question 2", "question 3"]);
}
