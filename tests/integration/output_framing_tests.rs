//! End-to-end framing against a real `sh`: each command's output arrives
//! as one message per stream, followed by the prompt.

use autoshell::{Message, MessageKind, ShellConfig};

use super::test_helpers::{prompt, prompt_count, without_prompts, Harness};

fn text(payload: &str) -> Message {
    Message::new(MessageKind::Text, payload)
}

/// Initial prompt, the command output, then the prompt again.
#[tokio::test]
async fn echo_produces_output_then_prompt() {
    let mut harness = Harness::start(ShellConfig::default());

    harness.send("echo hi\n").await;
    let seen = harness.collect_until(|seen| prompt_count(seen) == 2).await;
    assert_eq!(seen, vec![prompt(), text("hi\n"), prompt()]);

    harness.send("exit\n").await;
    let (_, result, _) = harness.finish().await;
    result.expect("session succeeds");
}

/// Output on stderr is delivered as an error message; the empty stderr
/// flush of commands that write nothing there is not delivered.
#[tokio::test]
async fn stderr_output_is_an_error_message() {
    let mut harness = Harness::start(ShellConfig::default());

    harness.send("echo err 1>&2\n").await;
    let seen = harness
        .collect_until(|seen| {
            prompt_count(seen) == 2 && seen.iter().any(|m| m.kind == MessageKind::Error)
        })
        .await;
    assert_eq!(
        without_prompts(&seen),
        vec![Message::new(MessageKind::Error, "err\n")]
    );

    harness.send("exit\n").await;
    let (_, result, rest) = harness.finish().await;
    result.expect("session succeeds");
    assert!(rest.is_empty(), "unexpected trailing messages: {rest:?}");
}

/// A command writing to both streams yields one message per stream.
#[tokio::test]
async fn both_streams_are_framed_independently() {
    let mut harness = Harness::start(ShellConfig::default());

    harness.send("echo out; echo err 1>&2\n").await;
    let seen = harness
        .collect_until(|seen| {
            prompt_count(seen) == 2 && seen.iter().any(|m| m.kind == MessageKind::Error)
        })
        .await;

    let mut payloads = without_prompts(&seen);
    payloads.sort_by_key(|m| m.kind.to_string());
    assert_eq!(
        payloads,
        vec![Message::new(MessageKind::Error, "err\n"), text("out\n")]
    );

    harness.send("exit\n").await;
    harness.finish().await.1.expect("session succeeds");
}

/// Output without a trailing newline is closed with exactly one.
#[tokio::test]
async fn missing_trailing_newline_is_synthesized() {
    let mut harness = Harness::start(ShellConfig::default());

    harness.send("printf abc\n").await;
    let seen = harness.collect_until(|seen| prompt_count(seen) == 2).await;
    assert_eq!(without_prompts(&seen), vec![text("abc\n")]);

    harness.send("exit\n").await;
    harness.finish().await.1.expect("session succeeds");
}

/// Commands written back to back are still framed separately, in order.
#[tokio::test]
async fn pipelined_commands_do_not_bleed() {
    let mut harness = Harness::start(ShellConfig::default());

    harness.send("echo one\necho two\n").await;
    let seen = harness.collect_until(|seen| prompt_count(seen) == 3).await;
    assert_eq!(without_prompts(&seen), vec![text("one\n"), text("two\n")]);

    harness.send("exit\n").await;
    harness.finish().await.1.expect("session succeeds");
}

/// Multi-line output of one command is a single message.
#[tokio::test]
async fn multi_line_output_is_one_message() {
    let mut harness = Harness::start(ShellConfig::default());

    harness.send("printf 'a\\nb\\nc\\n'\n").await;
    let seen = harness.collect_until(|seen| prompt_count(seen) == 2).await;
    assert_eq!(without_prompts(&seen), vec![text("a\nb\nc\n")]);

    harness.send("exit\n").await;
    harness.finish().await.1.expect("session succeeds");
}
