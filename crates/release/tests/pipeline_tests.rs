//! End-to-end release and rollback runs against mock collaborators.

use async_trait::async_trait;
use bonvoy_release::config::RetryConfig;
use bonvoy_release::ops::{
    GitOperations, HostingOperations, PullRequestInfo, PullRequestParams, RegistryOperations,
    ReleaseInfo, ReleaseParams,
};
use bonvoy_release::plugins::{
    ChangelogPlugin, ConventionalPlugin, GitHubPlugin, GitPlugin, NpmPlugin,
};
use bonvoy_release::{
    ActionJournal, BonvoyConfig, Bonvoy, BumpSeverity, CommitRecord, Context, DryRun, Error,
    ReleaseStatus, Result, ShipItOptions, StepOutcome, VersionRequest, workspace,
};
use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Default)]
struct MockGit {
    calls: Mutex<Vec<String>>,
    fail_delete_tag: AtomicBool,
}

impl MockGit {
    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn compensations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| {
                ["reset_hard", "delete_tag", "delete_remote_tags", "force_push"]
                    .iter()
                    .any(|p| c.starts_with(p))
            })
            .collect()
    }
}

#[async_trait]
impl GitOperations for MockGit {
    async fn add(&self, files: &[String]) -> Result<()> {
        self.log(format!("add {}", files.len()));
        Ok(())
    }

    async fn commit(&self, message: &str) -> Result<()> {
        self.log(format!("commit {message}"));
        Ok(())
    }

    async fn tag(&self, name: &str, _message: &str) -> Result<()> {
        self.log(format!("tag {name}"));
        Ok(())
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<()> {
        self.log(format!("push {remote} {branch}"));
        Ok(())
    }

    async fn push_tags(&self, remote: &str, tags: &[String]) -> Result<()> {
        self.log(format!("push_tags {remote} {}", tags.join(",")));
        Ok(())
    }

    async fn checkout(&self, branch: &str, _create: bool) -> Result<()> {
        self.log(format!("checkout {branch}"));
        Ok(())
    }

    async fn get_current_branch(&self) -> Result<String> {
        Ok("main".to_string())
    }

    async fn tag_exists(&self, _tag: &str) -> Result<bool> {
        Ok(false)
    }

    async fn get_commits_since_tag(&self, _tag: Option<&str>) -> Result<Vec<CommitRecord>> {
        Ok(Vec::new())
    }

    async fn get_last_tag(&self) -> Result<Option<String>> {
        Ok(None)
    }

    async fn get_head_sha(&self) -> Result<String> {
        Ok("sha0".to_string())
    }

    async fn reset_hard(&self, sha: &str) -> Result<()> {
        self.log(format!("reset_hard {sha}"));
        Ok(())
    }

    async fn delete_tag(&self, tag: &str) -> Result<()> {
        self.log(format!("delete_tag {tag}"));
        if self.fail_delete_tag.load(Ordering::SeqCst) {
            return Err(Error::git(format!("tag '{tag}' not found")));
        }
        Ok(())
    }

    async fn delete_remote_tags(&self, remote: &str, tags: &[String]) -> Result<()> {
        self.log(format!("delete_remote_tags {remote} {}", tags.join(",")));
        Ok(())
    }

    async fn force_push(&self, remote: &str, branch: &str) -> Result<()> {
        self.log(format!("force_push {remote} {branch}"));
        Ok(())
    }
}

#[derive(Default)]
struct MockRegistry {
    calls: Mutex<Vec<String>>,
    fail_publish: AtomicBool,
}

impl MockRegistry {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistryOperations for MockRegistry {
    async fn publish(&self, _args: &[String], cwd: &Path) -> Result<()> {
        let dir = cwd.file_name().map(|n| n.to_string_lossy().into_owned());
        self.calls
            .lock()
            .unwrap()
            .push(format!("publish {}", dir.unwrap_or_default()));
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(Error::publish("E403 forbidden", None));
        }
        Ok(())
    }

    async fn view(&self, _package: &str, _version: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn unpublish(&self, package: &str, version: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("unpublish {package}@{version}"));
        Ok(())
    }
}

#[derive(Default)]
struct MockHosting {
    calls: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl MockHosting {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostingOperations for MockHosting {
    async fn create_release(&self, params: &ReleaseParams) -> Result<ReleaseInfo> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls
            .lock()
            .unwrap()
            .push(format!("create_release {}", params.tag_name));
        Ok(ReleaseInfo {
            id,
            url: format!("https://example.com/releases/{id}"),
            tag: params.tag_name.clone(),
        })
    }

    async fn create_pr(&self, params: &PullRequestParams) -> Result<PullRequestInfo> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("create_pr {} {}->{}", params.title, params.head, params.base));
        Ok(PullRequestInfo {
            number: 7,
            url: "https://example.com/pull/7".to_string(),
        })
    }

    async fn release_exists(&self, _tag: &str) -> Result<bool> {
        Ok(false)
    }

    async fn delete_release(&self, id: u64) -> Result<()> {
        self.calls.lock().unwrap().push(format!("delete_release {id}"));
        Ok(())
    }
}

struct Harness {
    dir: TempDir,
    git: Arc<MockGit>,
    registry: Arc<MockRegistry>,
    hosting: Arc<MockHosting>,
    bonvoy: Bonvoy,
}

impl Harness {
    fn new() -> Self {
        let git = Arc::new(MockGit::default());
        let registry = Arc::new(MockRegistry::default());
        let hosting = Arc::new(MockHosting::default());
        let bonvoy = Bonvoy::new()
            .with_plugin(Arc::new(ConventionalPlugin::default()))
            .with_plugin(Arc::new(ChangelogPlugin::default()))
            .with_plugin(Arc::new(NpmPlugin::new(registry.clone())))
            .with_plugin(Arc::new(GitPlugin::new(git.clone())))
            .with_plugin(Arc::new(GitHubPlugin::new(hosting.clone())));

        Self {
            dir: TempDir::new().unwrap(),
            git,
            registry,
            hosting,
            bonvoy,
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn single_package(&self, name: &str, version: &str) {
        write_manifest(self.root(), name, version, None);
    }

    fn monorepo(&self, packages: &[(&str, &str)]) {
        write_manifest(self.root(), "root", "0.0.0", Some(r#"["packages/*"]"#));
        for (name, version) in packages {
            let dir = self.root().join("packages").join(name);
            std::fs::create_dir_all(&dir).unwrap();
            write_manifest(&dir, name, version, None);
        }
    }

    fn options(&self, commits: Vec<CommitRecord>) -> ShipItOptions {
        let packages = workspace::load_packages(self.root()).unwrap();
        ShipItOptions::new(self.root(), packages, commits).with_config(config())
    }

    fn base(&self, dry_run: DryRun) -> Context {
        let packages = workspace::load_packages(self.root()).unwrap();
        Context::new(config(), self.root(), packages, Vec::new(), dry_run)
    }

    fn manifest_version(&self, rel: &str) -> String {
        let path = self.root().join(rel).join("package.json");
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        json["version"].as_str().unwrap().to_string()
    }

    fn status(&self) -> Option<ReleaseStatus> {
        ActionJournal::load(self.root())
            .unwrap()
            .map(|log| log.status)
    }
}

fn write_manifest(dir: &Path, name: &str, version: &str, workspaces: Option<&str>) {
    let workspaces = workspaces
        .map(|w| format!(",\n  \"workspaces\": {w}"))
        .unwrap_or_default();
    std::fs::write(
        dir.join("package.json"),
        format!("{{\n  \"name\": \"{name}\",\n  \"version\": \"{version}\"{workspaces}\n}}\n"),
    )
    .unwrap();
}

fn config() -> BonvoyConfig {
    BonvoyConfig {
        retry: RetryConfig {
            max_retries: 1,
            base_delay_ms: 0,
        },
        ..BonvoyConfig::default()
    }
}

fn commit(hash: &str, message: &str, files: &[&str]) -> CommitRecord {
    CommitRecord::new(
        hash,
        message,
        "Test Author",
        Utc::now(),
        files.iter().map(|f| (*f).to_string()).collect(),
    )
}

#[tokio::test]
async fn test_breaking_change_releases_next_major() {
    let h = Harness::new();
    h.single_package("solo", "1.5.3");

    let report = h
        .bonvoy
        .ship_it(h.options(vec![commit("a1", "feat!: drop legacy API", &["index.js"])]))
        .await
        .unwrap();

    assert_eq!(report.changed.len(), 1);
    assert_eq!(report.changed[0].from, "1.5.3");
    assert_eq!(report.changed[0].to, "2.0.0");
    assert_eq!(h.manifest_version(""), "2.0.0");
    assert_eq!(h.status(), Some(ReleaseStatus::Completed));

    let changelog = std::fs::read_to_string(h.root().join("CHANGELOG.md")).unwrap();
    assert!(changelog.contains("2.0.0"));
    assert!(changelog.contains("drop legacy API"));

    assert!(h.git.calls().contains(&"tag solo@2.0.0".to_string()));
    assert_eq!(h.registry.calls(), vec![format!("publish {}", dir_name(h.root()))]);
    assert_eq!(h.hosting.calls(), vec!["create_release solo@2.0.0"]);
    assert_eq!(report.published, vec!["solo"]);
}

fn dir_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

#[tokio::test]
async fn test_pre_one_breaking_change_reaches_one() {
    let h = Harness::new();
    h.single_package("solo", "0.5.0");

    let report = h
        .bonvoy
        .ship_it(h.options(vec![commit(
            "a1",
            "feat: new config\n\nBREAKING CHANGE: config file renamed",
            &["index.js"],
        )]))
        .await
        .unwrap();

    assert_eq!(report.changed[0].to, "1.0.0");
}

#[tokio::test]
async fn test_squash_merge_messages_are_classified() {
    let h = Harness::new();
    h.monorepo(&[("core", "1.0.0"), ("utils", "2.3.4")]);

    let report = h
        .bonvoy
        .ship_it(h.options(vec![
            commit(
                "a1",
                "fix: squash merge (#12)\n* fix one\n* fix two",
                &["packages/core/src/a.ts"],
            ),
            commit(
                "a2",
                "feat: new option\n\nSome body text\nBREAKING CHANGE: removed old option",
                &["packages/utils/src/b.ts"],
            ),
        ]))
        .await
        .unwrap();

    assert_eq!(report.changed.len(), 2);
    let core = report.changed.iter().find(|c| c.name == "core").unwrap();
    assert_eq!(core.to, "1.0.1");
    let utils = report.changed.iter().find(|c| c.name == "utils").unwrap();
    assert_eq!(utils.to, "3.0.0");

    let changelog =
        std::fs::read_to_string(h.root().join("packages/core/CHANGELOG.md")).unwrap();
    assert!(changelog.contains("squash merge (#12)"));
}

#[tokio::test]
async fn test_only_touched_packages_are_released() {
    let h = Harness::new();
    h.monorepo(&[("core", "1.0.0"), ("utils", "2.3.4")]);

    let report = h
        .bonvoy
        .ship_it(h.options(vec![
            commit("a1", "feat(utils): add retry helper", &["packages/core/src/retry.ts"]),
            commit("a2", "docs: update readme", &["README.md"]),
        ]))
        .await
        .unwrap();

    assert_eq!(report.changed.len(), 1);
    assert_eq!(report.changed[0].name, "core");
    assert_eq!(report.changed[0].to, "1.1.0");
    assert_eq!(report.changed[0].bump, VersionRequest::Bump(BumpSeverity::Minor));
    assert_eq!(h.manifest_version("packages/core"), "1.1.0");
    assert_eq!(h.manifest_version("packages/utils"), "2.3.4");
    assert!(!h.root().join("packages/utils/CHANGELOG.md").exists());
    assert!(
        h.git
            .calls()
            .contains(&"commit chore(release): :bookmark: core [skip ci]".to_string())
    );
}

#[tokio::test]
async fn test_nothing_to_release() {
    let h = Harness::new();
    h.monorepo(&[("core", "1.0.0")]);

    let report = h
        .bonvoy
        .ship_it(h.options(vec![commit("a1", "chore: tidy", &["packages/core/a.ts"])]))
        .await
        .unwrap();

    assert!(report.is_empty());
    assert!(h.git.calls().is_empty());
    assert_eq!(h.status(), None);
}

#[tokio::test]
async fn test_dry_run_has_no_side_effects() {
    let h = Harness::new();
    h.monorepo(&[("core", "1.0.0")]);

    let options = h
        .options(vec![commit("a1", "fix: handle empty input", &["packages/core/a.ts"])])
        .with_dry_run(DryRun::Yes);
    let report = h.bonvoy.ship_it(options).await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.changed[0].to, "1.0.1");
    assert!(report.changelogs["core"].contains("handle empty input"));
    assert_eq!(h.manifest_version("packages/core"), "1.0.0");
    assert!(!h.root().join("packages/core/CHANGELOG.md").exists());
    assert!(h.git.calls().is_empty());
    assert!(h.registry.calls().is_empty());
    assert!(h.hosting.calls().is_empty());
    assert_eq!(h.status(), None);
}

#[tokio::test]
async fn test_forced_version_overrides_commits() {
    let h = Harness::new();
    h.monorepo(&[("core", "1.0.0"), ("utils", "1.2.0")]);

    let options = h
        .options(Vec::new())
        .with_force(VersionRequest::Explicit("3.0.0".to_string()));
    let report = h.bonvoy.ship_it(options).await.unwrap();

    let released: Vec<_> = report.changed.iter().map(|c| (c.name.as_str(), c.to.as_str())).collect();
    assert_eq!(released, vec![("core", "3.0.0"), ("utils", "3.0.0")]);
    assert_eq!(h.manifest_version("packages/utils"), "3.0.0");
}

#[tokio::test]
async fn test_pull_request_stage() {
    let h = Harness::new();
    h.monorepo(&[("core", "1.0.0")]);
    let mut cfg = config();
    cfg.pull_request.enabled = true;

    let options = h
        .options(vec![commit("a1", "feat: x", &["packages/core/a.ts"])])
        .with_config(cfg);
    let report = h.bonvoy.ship_it(options).await.unwrap();

    assert_eq!(report.pr.map(|pr| pr.number), Some(7));
    assert!(
        h.hosting
            .calls()
            .contains(&"create_pr chore(release): core release/bonvoy->main".to_string())
    );

    // Pull requests stay open on rollback.
    let rollback = h.bonvoy.rollback(h.base(DryRun::No)).await.unwrap();
    assert!(
        rollback
            .steps
            .iter()
            .any(|s| s.action == "pr" && matches!(s.outcome, StepOutcome::Skipped(_)))
    );
}

#[tokio::test]
async fn test_stage_failure_rolls_back_in_reverse() {
    let h = Harness::new();
    h.monorepo(&[("core", "1.0.0")]);
    h.registry.fail_publish.store(true, Ordering::SeqCst);

    let result = h
        .bonvoy
        .ship_it(h.options(vec![commit("a1", "feat: x", &["packages/core/a.ts"])]))
        .await;

    match result {
        Err(Error::Stage { hook, plugin, .. }) => {
            assert_eq!(hook, "publish");
            assert_eq!(plugin, "npm");
        }
        other => panic!("expected stage error, got {other:?}"),
    }

    assert_eq!(
        h.git.compensations(),
        vec![
            "delete_remote_tags origin core@1.1.0",
            "reset_hard sha0",
            "force_push origin main",
            "delete_tag core@1.1.0",
            "reset_hard sha0",
        ]
    );
    assert_eq!(h.manifest_version("packages/core"), "1.0.0");
    assert!(!h.root().join("packages/core/CHANGELOG.md").exists());
    assert!(h.hosting.calls().is_empty());
    assert_eq!(h.status(), Some(ReleaseStatus::RolledBack));
}

#[tokio::test]
async fn test_failed_compensation_is_a_warning() {
    let h = Harness::new();
    h.monorepo(&[("core", "1.0.0")]);
    h.bonvoy
        .ship_it(h.options(vec![commit("a1", "fix: x", &["packages/core/a.ts"])]))
        .await
        .unwrap();
    h.git.fail_delete_tag.store(true, Ordering::SeqCst);

    let report = h.bonvoy.rollback(h.base(DryRun::No)).await.unwrap();

    assert_eq!(report.status, Some(ReleaseStatus::RollbackFailed));
    assert_eq!(report.warnings().count(), 1);
    // The commit before the tag is still reset.
    let compensations = h.git.compensations();
    let delete = compensations.iter().position(|c| c == "delete_tag core@1.0.1");
    let reset = compensations.iter().rposition(|c| c == "reset_hard sha0");
    assert!(delete < reset);
    assert_eq!(h.status(), Some(ReleaseStatus::RollbackFailed));
    assert!(h.hosting.calls().contains(&"delete_release 1".to_string()));
    assert!(h.registry.calls().contains(&"unpublish core@1.0.1".to_string()));

    // A new release is refused until the log is recovered.
    let writes = |calls: Vec<String>| {
        calls
            .into_iter()
            .filter(|c| c.starts_with("commit") || c.starts_with("tag "))
            .count()
    };
    let before = writes(h.git.calls());
    let err = h
        .bonvoy
        .ship_it(h.options(vec![commit("a2", "fix: y", &["packages/core/b.ts"])]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnresolvedRelease { .. }));
    assert_eq!(writes(h.git.calls()), before);
    assert_eq!(h.manifest_version("packages/core"), "1.0.0");
    assert_eq!(h.status(), Some(ReleaseStatus::RollbackFailed));

    // Fix the cause and run again.
    h.git.fail_delete_tag.store(false, Ordering::SeqCst);
    let retry = h.bonvoy.rollback(h.base(DryRun::No)).await.unwrap();
    assert_eq!(retry.status, Some(ReleaseStatus::RolledBack));
    assert!(!retry.has_warnings());
}

#[tokio::test]
async fn test_rollback_is_idempotent() {
    let h = Harness::new();
    h.monorepo(&[("core", "1.0.0")]);
    h.bonvoy
        .ship_it(h.options(vec![commit("a1", "fix: x", &["packages/core/a.ts"])]))
        .await
        .unwrap();

    let first = h.bonvoy.rollback(h.base(DryRun::No)).await.unwrap();
    assert_eq!(first.status, Some(ReleaseStatus::RolledBack));
    let calls = h.git.calls().len();

    let second = h.bonvoy.rollback(h.base(DryRun::No)).await.unwrap();
    assert!(second.steps.is_empty());
    assert_eq!(second.status, Some(ReleaseStatus::RolledBack));
    assert_eq!(h.git.calls().len(), calls);
}

#[tokio::test]
async fn test_rollback_dry_run_lists_planned_steps() {
    let h = Harness::new();
    h.monorepo(&[("core", "1.0.0")]);
    h.bonvoy
        .ship_it(h.options(vec![commit("a1", "fix: x", &["packages/core/a.ts"])]))
        .await
        .unwrap();
    let recorded = ActionJournal::load(h.root()).unwrap().unwrap().actions;

    let report = h.bonvoy.rollback(h.base(DryRun::Yes)).await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.steps.len(), recorded.len());
    assert_eq!(report.steps[0].action, "release");
    assert_eq!(report.steps.last().map(|s| s.action.as_str()), Some("manifest"));
    assert!(report.steps.iter().all(|s| s.outcome == StepOutcome::Planned));
    assert_eq!(h.status(), Some(ReleaseStatus::Completed));
    assert_eq!(h.manifest_version("packages/core"), "1.0.1");
}

#[tokio::test]
async fn test_journal_records_actions_in_order() {
    let h = Harness::new();
    h.monorepo(&[("core", "1.0.0")]);
    h.bonvoy
        .ship_it(h.options(vec![commit("a1", "fix: x", &["packages/core/a.ts"])]))
        .await
        .unwrap();

    let log = ActionJournal::load(h.root()).unwrap().unwrap();
    let actions: Vec<_> = log
        .actions
        .iter()
        .map(|a| format!("{}:{}", a.plugin, a.action))
        .collect();
    assert_eq!(
        actions,
        vec![
            "npm:manifest",
            "changelog:changelog",
            "git:commit",
            "git:tag",
            "git:push",
            "git:pushTags",
            "npm:publish",
            "github:release",
        ]
    );
    assert_eq!(log.packages[0].name, "core");
    assert_eq!(log.packages[0].to, "1.0.1");
    assert_eq!(log.actions[0].data_str("previousVersion"), Some("1.0.0"));
}

#[tokio::test]
async fn test_rollback_without_log() {
    let h = Harness::new();
    h.monorepo(&[("core", "1.0.0")]);

    let err = h.bonvoy.rollback(h.base(DryRun::No)).await.unwrap_err();
    assert!(matches!(err, Error::NoReleaseLog { .. }));
}
