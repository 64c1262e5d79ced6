mod common;

use std::sync::Mutex;

use async_trait::async_trait;
use common::{git, settings, target, workspace, RecordingPublisher, Remote};
use confsync_core::{Settings, Target, TargetKind};
use confsync_renderer::Renderer;
use confsync_sync::{Pipeline, Publication, PublishMode, RunOptions, RunReport, TargetOutcome};
use confsync_transform::{ContentTransformer, TransformError, TransformRequest};

const SCHEMA: &str = "src/github/types/plugin-configuration.ts";
const CONFIG: &str = ".github/.ubiquity-os.config.yml";
const DEV_CONFIG: &str = ".github/.ubiquity-os.config.dev.yml";

/// Appends a comment carrying the instruction; fails for files named in `fail_on`.
#[derive(Default)]
struct AppendingTransformer {
    fail_on: Vec<&'static str>,
    seen_schema: Mutex<Vec<String>>,
}

#[async_trait]
impl ContentTransformer for AppendingTransformer {
    async fn transform(&self, req: &TransformRequest<'_>) -> Result<String, TransformError> {
        self.seen_schema
            .lock()
            .unwrap()
            .push(req.schema_path.to_string());
        if self.fail_on.iter().any(|f| req.original_content.contains(f)) {
            return Err(TransformError::Empty);
        }
        Ok(format!("{}# {}\n", req.original_content, req.instruction))
    }
}

struct Fleet {
    _tmp: tempfile::TempDir,
    parser: Remote,
    config: Remote,
    targets: Vec<Target>,
    settings: Settings,
}

fn fleet(extra: &[(&str, &str)]) -> Fleet {
    let (tmp, storage) = workspace();
    let parser = Remote::create(
        tmp.path(),
        "parser",
        "development",
        &[(SCHEMA, "export const schema = {};\n")],
    );
    let config = Remote::create(
        tmp.path(),
        "cfg",
        "main",
        &[(CONFIG, "plugins: []\n"), (DEV_CONFIG, "plugins: [] # dev\n")],
    );
    let targets = vec![
        target(TargetKind::Parser, &parser, "acme", "parser", SCHEMA),
        target(TargetKind::Config, &config, "acme", "cfg", CONFIG),
        target(TargetKind::Config, &config, "acme", "cfg", DEV_CONFIG),
    ];
    Fleet {
        _tmp: tmp,
        parser,
        config,
        targets,
        settings: settings(&storage, extra),
    }
}

fn options(mode: PublishMode) -> RunOptions {
    RunOptions {
        instruction: "enable the pricing plugin".to_string(),
        mode,
        sync_mirrors: true,
        force_branch: None,
        dry_run: false,
    }
}

async fn run(
    fleet: &Fleet,
    transformer: &AppendingTransformer,
    publisher: &RecordingPublisher,
    opts: &RunOptions,
) -> RunReport {
    let renderer = Renderer::new().unwrap();
    Pipeline::new(&fleet.settings, &renderer, transformer, publisher)
        .run(&fleet.targets, opts)
        .await
        .unwrap()
}

#[tokio::test]
async fn every_config_target_gets_its_own_pull_request() {
    let f = fleet(&[]);
    let transformer = AppendingTransformer::default();
    let publisher = RecordingPublisher::default();

    let report = run(&f, &transformer, &publisher, &options(PublishMode::PullRequest)).await;

    assert_eq!(report.targets.len(), 3);
    assert!(matches!(report.targets[0].outcome, TargetOutcome::SchemaRead { bytes } if bytes > 0));
    for t in &report.targets[1..] {
        match &t.outcome {
            TargetOutcome::Published(Publication::TopicBranch { base, .. }) => {
                assert_eq!(base, "main")
            }
            other => panic!("expected a topic branch, got {other:?}"),
        }
    }
    assert!(!report.has_failures());
    assert_eq!(publisher.calls().len(), 2);
    assert_eq!(f.config.branches().len(), 3);
    assert_eq!(
        transformer.seen_schema.lock().unwrap().as_slice(),
        &[SCHEMA.to_string(), SCHEMA.to_string()]
    );
    // Parser repository is read, never written.
    assert_eq!(f.parser.branches(), vec!["development".to_string()]);
}

#[tokio::test]
async fn dry_run_reports_a_diff_and_leaves_the_remote_alone() {
    let f = fleet(&[]);
    let before = f.config.rev("main");
    let transformer = AppendingTransformer::default();
    let publisher = RecordingPublisher::default();
    let mut opts = options(PublishMode::PullRequest);
    opts.dry_run = true;

    let report = run(&f, &transformer, &publisher, &opts).await;

    match &report.targets[1].outcome {
        TargetOutcome::DryRun { diff } => {
            assert!(diff.contains("+# enable the pricing plugin"), "{diff}");
            assert!(diff.contains(CONFIG));
        }
        other => panic!("expected a dry run diff, got {other:?}"),
    }
    assert_eq!(f.config.rev("main"), before);
    assert_eq!(f.config.branches(), vec!["main".to_string()]);
    assert!(publisher.calls().is_empty());
}

#[tokio::test]
async fn generation_failure_does_not_stop_later_targets() {
    let f = fleet(&[]);
    let transformer = AppendingTransformer {
        fail_on: vec!["# dev"],
        ..Default::default()
    };
    let publisher = RecordingPublisher::default();

    let report = run(&f, &transformer, &publisher, &options(PublishMode::PullRequest)).await;

    assert!(matches!(report.targets[1].outcome, TargetOutcome::Published(_)));
    match &report.targets[2].outcome {
        TargetOutcome::Failed { error } => assert!(error.contains("generation"), "{error}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(report.failures(), 1);
}

#[tokio::test]
async fn missing_schema_source_skips_config_targets() {
    let mut f = fleet(&[]);
    f.targets[0] = target(
        TargetKind::Parser,
        &f.parser,
        "acme",
        "parser",
        "src/does/not/exist.ts",
    );
    let transformer = AppendingTransformer::default();
    let publisher = RecordingPublisher::default();

    let report = run(&f, &transformer, &publisher, &options(PublishMode::PullRequest)).await;

    assert!(report.targets[0].outcome.is_failure());
    for t in &report.targets[1..] {
        assert!(matches!(t.outcome, TargetOutcome::Skipped { .. }), "{:?}", t.outcome);
    }
    assert!(transformer.seen_schema.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_config_file_is_skipped() {
    let mut f = fleet(&[]);
    f.targets.push(target(
        TargetKind::Config,
        &f.config,
        "acme",
        "cfg",
        ".github/absent.yml",
    ));
    let transformer = AppendingTransformer::default();
    let publisher = RecordingPublisher::default();

    let report = run(&f, &transformer, &publisher, &options(PublishMode::PullRequest)).await;

    assert!(matches!(report.targets[3].outcome, TargetOutcome::Skipped { .. }));
    assert!(!report.has_failures());
}

#[tokio::test]
async fn push_mode_without_a_mirror_fails_at_checkout() {
    let f = fleet(&[("INTERACTIVE", "true")]);
    let transformer = AppendingTransformer::default();
    let publisher = RecordingPublisher::default();
    let mut opts = options(PublishMode::Direct);
    opts.sync_mirrors = false;

    let report = run(&f, &transformer, &publisher, &opts).await;

    match &report.targets[0].outcome {
        TargetOutcome::Failed { error } => assert!(error.contains("checkout"), "{error}"),
        other => panic!("expected failure, got {other:?}"),
    }
    for t in &report.targets[1..] {
        assert!(matches!(t.outcome, TargetOutcome::Skipped { .. }), "{:?}", t.outcome);
    }
    assert_eq!(report.failures(), 1);
}

#[tokio::test]
async fn push_mode_reuses_existing_mirrors() {
    let f = fleet(&[("INTERACTIVE", "true")]);
    let transformer = AppendingTransformer::default();
    let publisher = RecordingPublisher::default();

    let mut opts = options(PublishMode::Direct);
    opts.dry_run = true;
    run(&f, &transformer, &publisher, &opts).await;

    opts.dry_run = false;
    opts.sync_mirrors = false;
    let report = run(&f, &transformer, &publisher, &opts).await;

    assert!(!report.has_failures(), "{:?}", report.targets);
    assert!(matches!(
        &report.targets[1].outcome,
        TargetOutcome::Published(Publication::DirectPush { branch }) if branch == "main"
    ));
    assert!(f.config.show("main", CONFIG).contains("# enable the pricing plugin"));
    assert_eq!(f.config.branches(), vec!["main".to_string()]);
    assert!(publisher.calls().is_empty());
}

#[tokio::test]
async fn forced_branch_leaves_the_parser_on_its_default_branch() {
    let f = fleet(&[]);
    let transformer = AppendingTransformer::default();
    let publisher = RecordingPublisher::default();
    let mut opts = options(PublishMode::PullRequest);
    opts.force_branch = Some("main".to_string());

    // Second run reuses the mirrors created by the first.
    for round in 0..2 {
        let report = run(&f, &transformer, &publisher, &opts).await;
        assert!(!report.has_failures(), "round {round}: {:?}", report.targets);
        assert!(matches!(report.targets[0].outcome, TargetOutcome::SchemaRead { .. }));
        for t in &report.targets[1..] {
            assert!(
                matches!(&t.outcome, TargetOutcome::Published(Publication::TopicBranch { base, .. }) if base == "main"),
                "round {round}: {:?}",
                t.outcome
            );
        }
    }
    assert_eq!(publisher.calls().len(), 4);
    assert_eq!(f.parser.branches(), vec!["development".to_string()]);
}

#[cfg(unix)]
#[tokio::test]
async fn failed_push_does_not_leak_into_the_next_pull_request() {
    let f = fleet(&[]);
    f.config.reject_next_push();
    let transformer = AppendingTransformer::default();
    let publisher = RecordingPublisher::default();

    let report = run(&f, &transformer, &publisher, &options(PublishMode::PullRequest)).await;

    match &report.targets[1].outcome {
        TargetOutcome::Failed { error } => assert!(error.contains("push"), "{error}"),
        other => panic!("expected a push failure, got {other:?}"),
    }
    let branch = match &report.targets[2].outcome {
        TargetOutcome::Published(Publication::TopicBranch { branch, .. }) => branch.clone(),
        other => panic!("expected a topic branch, got {other:?}"),
    };
    let changed = git(&f.config.bare, &["diff", "--name-only", "main", &branch]);
    assert_eq!(changed, DEV_CONFIG);
    let parent = git(&f.config.bare, &["rev-parse", &format!("{branch}^")]);
    assert_eq!(parent, f.config.rev("main"));
    assert_eq!(publisher.calls().len(), 1);
    assert_eq!(report.failures(), 1);
}
