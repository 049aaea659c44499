//! Console Loop Integration Tests

mod common;

use common::Harness;
use officebot::cli::run_repl;
use tokio::io::BufReader;

async fn run(h: &Harness, input: tokio_test::io::Mock) -> String {
    let mut coordinator = h.coordinator();
    let mut output = Vec::new();
    run_repl(&mut coordinator, BufReader::new(input), &mut output)
        .await
        .unwrap();
    String::from_utf8(output).unwrap()
}

#[tokio::test]
async fn test_quit_stops_before_processing() {
    let h = Harness::new();
    let input = tokio_test::io::Builder::new()
        .read(b"QUIT\n")
        .build();

    let output = run(&h, input).await;

    assert!(output.contains("Type 'quit' to exit."));
    assert!(output.ends_with("[BYE] Goodbye!\n"));
    assert!(h.model.prompts().is_empty());
}

#[tokio::test]
async fn test_blank_lines_skipped_and_eof_ends() {
    let h = Harness::new();
    h.model.reply("CHAT").reply("Hello!");
    let input = tokio_test::io::Builder::new()
        .read(b"\n   \n")
        .read(b"hi\n")
        .build();

    let output = run(&h, input).await;

    assert!(output.contains("[...] Processing..."));
    assert!(output.contains(&format!("Assistant: Hello!\n\n{}\n", "-".repeat(50))));
    assert_eq!(output.matches("Assistant:").count(), 1);
    assert_eq!(h.model.prompts().len(), 2);
}
