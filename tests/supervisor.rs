//! End-to-end runs against throwaway shell scripts standing in for the crawler.

#![cfg(unix)]

use pcraw_relay::console::ConsoleReceiver;
use pcraw_relay::{
    Classifier, CommandLine, ConsoleWrite, RunState, StreamError, StreamKind, Supervisor,
    Terminator,
};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

struct Script {
    _dir: TempDir,
    path: String,
}

fn script(body: &str) -> Script {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crawler.sh");
    std::fs::write(&path, body).unwrap();
    Script {
        path: path.to_string_lossy().into_owned(),
        _dir: dir,
    }
}

fn supervisor(script: &Script, args: &[&str]) -> Supervisor {
    let cmd = CommandLine::new("sh", script.path.clone(), args.iter().copied());
    Supervisor::new(cmd, Classifier::default())
}

async fn drain(mut rx: ConsoleReceiver) -> Vec<ConsoleWrite> {
    let mut out = Vec::new();
    while let Some(w) = rx.recv().await {
        out.push(w);
    }
    out
}

fn texts(writes: &[ConsoleWrite], stream: StreamKind) -> Vec<&str> {
    writes
        .iter()
        .filter(|w| w.stream == stream)
        .map(|w| w.text.as_str())
        .collect()
}

#[tokio::test]
async fn progress_bar_then_done() {
    let s = script("echo '|####......'\necho '|##########'\necho 'Done.'\n");
    let (tx, rx) = mpsc::unbounded_channel();

    let report = supervisor(&s, &[]).run(tx).await.unwrap();
    let writes = drain(rx).await;

    assert_eq!(
        writes,
        vec![
            ConsoleWrite::overwrite(StreamKind::Stdout, "|####......"),
            ConsoleWrite::overwrite(StreamKind::Stdout, "|##########"),
            ConsoleWrite::commit(StreamKind::Stdout, "Done."),
        ]
    );
    assert_eq!(*report.stdout.as_ref().unwrap(), 3);
    assert_eq!(*report.stderr.as_ref().unwrap(), 0);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn blank_progress_row_is_cleared_in_place() {
    let blank = " ".repeat(79);
    let s = script(&format!("printf '%s\\n' '{blank}'\n"));
    let (tx, rx) = mpsc::unbounded_channel();

    supervisor(&s, &[]).run(tx).await.unwrap();
    let writes = drain(rx).await;

    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].text, blank);
    assert_eq!(writes[0].terminator, Terminator::Overwrite);
}

#[tokio::test]
async fn carriage_return_redraws_are_split() {
    let s = script("printf '|##....\\r|####..\\r|######\\rfinished\\n'\n");
    let (tx, rx) = mpsc::unbounded_channel();

    supervisor(&s, &[]).run(tx).await.unwrap();
    let writes = drain(rx).await;

    let rendered: Vec<String> = writes.iter().map(ConsoleWrite::rendered).collect();
    assert_eq!(
        rendered,
        vec!["|##....\r", "|####..\r", "|######\r", "finished\n"]
    );
}

#[tokio::test]
async fn missing_interpreter_is_a_spawn_error() {
    let cmd = CommandLine::new(
        "/nonexistent/pcraw-relay/perl",
        "pcraw.pl",
        ["-v"],
    );
    let sup = Supervisor::new(cmd, Classifier::default());
    let state = sup.subscribe();
    let (tx, rx) = mpsc::unbounded_channel();

    let err = sup.run(tx).await.unwrap_err();

    assert_eq!(err.command.program(), "/nonexistent/pcraw-relay/perl");
    assert_eq!(
        err.to_string(),
        "error executing /nonexistent/pcraw-relay/perl pcraw.pl -v"
    );
    let os_error = err.source.to_string();
    let diagnostic = format!("{:#}", anyhow::Error::from(err));
    assert_eq!(
        diagnostic,
        format!("error executing /nonexistent/pcraw-relay/perl pcraw.pl -v: {os_error}")
    );
    assert_eq!(diagnostic.matches(os_error.as_str()).count(), 1);
    assert!(drain(rx).await.is_empty());
    assert_eq!(*state.borrow(), RunState::Failed);
}

#[tokio::test]
async fn both_streams_drain_under_load() {
    // ~100 KiB per stream, more than a pipe buffer holds.
    let s = script(
        r#"pad=................................................................................................
i=0
while [ $i -lt 1000 ]; do
  echo "out $i $pad"
  echo "err $i $pad" >&2
  i=$((i+1))
done
"#,
    );
    let (tx, rx) = mpsc::unbounded_channel();
    let sup = supervisor(&s, &[]);
    let state = sup.subscribe();

    let collector = tokio::spawn(drain(rx));
    let report = tokio::time::timeout(Duration::from_secs(60), sup.run(tx))
        .await
        .expect("relay deadlocked")
        .unwrap();
    let writes = collector.await.unwrap();

    assert_eq!(*report.stdout.as_ref().unwrap(), 1000);
    assert_eq!(*report.stderr.as_ref().unwrap(), 1000);
    assert_eq!(*state.borrow(), RunState::Finished);

    let out = texts(&writes, StreamKind::Stdout);
    let err = texts(&writes, StreamKind::Stderr);
    assert_eq!(out.len(), 1000);
    assert_eq!(err.len(), 1000);
    for (i, line) in out.iter().enumerate() {
        assert!(line.starts_with(&format!("out {i} ")), "stdout out of order at {i}");
    }
    for (i, line) in err.iter().enumerate() {
        assert!(line.starts_with(&format!("err {i} ")), "stderr out of order at {i}");
    }
}

#[tokio::test]
async fn arguments_pass_through_in_order() {
    let s = script("for a in \"$@\"; do echo \"arg:$a\"; done\n");
    let (tx, rx) = mpsc::unbounded_channel();

    supervisor(&s, &["-v", "--depth", "two words", ""])
        .run(tx)
        .await
        .unwrap();
    let writes = drain(rx).await;

    assert_eq!(
        texts(&writes, StreamKind::Stdout),
        vec!["arg:-v", "arg:--depth", "arg:two words", "arg:"]
    );
}

#[tokio::test]
async fn child_exit_code_is_mirrored() {
    let s = script("echo 'wait for 1 second' >&2\necho 'giving up'\nexit 3\n");
    let (tx, rx) = mpsc::unbounded_channel();

    let report = supervisor(&s, &[]).run(tx).await.unwrap();
    let writes = drain(rx).await;

    assert_eq!(report.exit_code(), 3);
    assert!(!report.interrupted);
    assert!(writes.contains(&ConsoleWrite::overwrite(
        StreamKind::Stderr,
        "wait for 1 second"
    )));
    assert!(writes.contains(&ConsoleWrite::commit(StreamKind::Stdout, "giving up")));
}

#[tokio::test]
async fn shutdown_kills_child_and_keeps_earlier_output() {
    let s = script("echo started\nexec sleep 30\n");
    let (tx, rx) = mpsc::unbounded_channel();
    let collector = tokio::spawn(drain(rx));

    let report = tokio::time::timeout(
        Duration::from_secs(20),
        supervisor(&s, &[]).run_until(tx, tokio::time::sleep(Duration::from_millis(500))),
    )
    .await
    .expect("kill did not end the run")
    .unwrap();
    let writes = collector.await.unwrap();

    assert!(report.interrupted);
    // SIGKILL
    assert_eq!(report.exit_code(), 128 + 9);
    assert!(report.stream_errors().next().is_none());
    assert_eq!(texts(&writes, StreamKind::Stdout), vec!["started"]);
}

#[tokio::test]
async fn closed_console_surfaces_as_stream_errors() {
    let s = script("echo one\necho two >&2\n");
    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);

    let report = supervisor(&s, &[]).run(tx).await.unwrap();

    assert!(matches!(
        report.stdout,
        Err(StreamError::ConsoleClosed {
            stream: StreamKind::Stdout
        })
    ));
    assert!(matches!(
        report.stderr,
        Err(StreamError::ConsoleClosed {
            stream: StreamKind::Stderr
        })
    ));
    assert_eq!(report.exit_code(), 1);
}
