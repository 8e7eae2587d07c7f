//! Integration tests for the merge pipeline.
//!
//! These tests drive `execute_merge` end to end against a scripted p4 server
//! and real workspace directories on disk.

use std::fs;
use std::path::{Path, PathBuf};

use cl_relay::changelist::{ChangeSetId, FileActionKind};
use cl_relay::config::{self, RelayConfig};
use cl_relay::defaults::DEFAULT_DESCRIPTION;
use cl_relay::p4::{P4Call, ScriptedP4};
use cl_relay::path::DepotPath;
use cl_relay::phases::orchestrator::{execute_merge, MergeInput, MergeRequest};
use cl_relay::phases::replicate::NO_CHANGE_LIST;
use tempfile::TempDir;

/// Source, client target and Lua target workspaces under one temp dir.
struct Workspaces {
    _temp: TempDir,
    source: PathBuf,
    target: PathBuf,
    target_lua: PathBuf,
}

impl Workspaces {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        let target = temp.path().join("target");
        let target_lua = temp.path().join("target_lua");
        for dir in [&source, &target, &target_lua] {
            fs::create_dir_all(dir).unwrap();
        }
        Self {
            _temp: temp,
            source,
            target,
            target_lua,
        }
    }

    fn config(&self) -> RelayConfig {
        let yaml = format!(
            r#"
source: {{ root: "{source}" }}
targets:
  - category: CLIENT
    default: true
    source: {{ root: "{source}" }}
    target: {{ root: "{target}" }}
  - category: COMBAT_LUA
    patterns: ["//depot/**/combat_lua/**"]
    description: Lua sync
    source: {{ root: "{source}" }}
    target: {{ root: "{target_lua}" }}
"#,
            source = yaml_path(&self.source),
            target = yaml_path(&self.target),
            target_lua = yaml_path(&self.target_lua),
        );
        config::parse(&yaml).unwrap()
    }
}

fn yaml_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn submitted(id: u64, description: &str, files: &[(&str, &str)]) -> String {
    let rows: String = files
        .iter()
        .map(|(path, action)| format!("... {}#1 {}\n", path, action))
        .collect();
    format!(
        "Change {} by alice@alice_ws on 2024/05/02 10:00:00\n\n\t{}\n\nAffected files ...\n\n{}",
        id, description, rows
    )
}

fn pending(id: u64, description: &str) -> String {
    format!(
        "Change {} by bob@bob_ws on 2024/05/01 09:00:00 *pending*\n\n\t{}\n\nShelved files ...\n\n",
        id, description
    )
}

/// The server state behind most tests: two submitted changelists, a review
/// whose submitted counterpart is named in its description, and one id that
/// does not exist.
fn server() -> ScriptedP4 {
    ScriptedP4::new()
        .with_view("//depot/main/", "")
        .with_describe(
            12345,
            submitted(
                12345,
                "Enemy stats",
                &[
                    ("//depot/main/Config/Enemy.csv", "edit"),
                    ("//depot/main/combat_lua/boss.lua", "add"),
                ],
            ),
        )
        .with_describe(
            54321,
            submitted(54321, "Drop old table", &[("//depot/main/Config/Old.csv", "delete")]),
        )
        .with_describe(98765, pending(98765, "Skill balance\n\tRelated to: 98766"))
        .with_describe(
            98766,
            submitted(
                98766,
                "Skill balance",
                &[
                    ("//depot/main/Config/Skill.csv", "add"),
                    ("//depot/main/combat_lua/boss.lua", "edit"),
                ],
            ),
        )
}

fn ids(values: &[u64]) -> Vec<ChangeSetId> {
    values.iter().copied().map(ChangeSetId::new).collect()
}

fn request(input: MergeInput) -> MergeRequest {
    MergeRequest {
        input,
        dry_run: false,
        sync: false,
        jobs: Some(1),
    }
}

fn seed(ws: &Workspaces) {
    write(&ws.source.join("Config/Enemy.csv"), "id,hp\n1,250\n");
    write(&ws.source.join("Config/Skill.csv"), "id,cooldown\n7,3\n");
    write(&ws.source.join("combat_lua/boss.lua"), "return { phase = 2 }\n");
    write(&ws.target.join("Config/Enemy.csv"), "id,hp\n1,200\n");
    write(&ws.target.join("Config/Old.csv"), "obsolete\n");
}

#[test]
fn test_full_merge_replicates_net_actions() {
    let ws = Workspaces::new();
    seed(&ws);
    let p4 = server();

    let outcome = execute_merge(
        &p4,
        &ws.config(),
        &request(MergeInput::ChangeLists(ids(&[12345, 98765, 54321, 99999]))),
    )
    .unwrap();

    let resolution = outcome.resolution.unwrap();
    assert_eq!(resolution.resolved, ids(&[12345, 54321, 98766]));
    assert_eq!(
        resolution.notes,
        vec![
            "Changelist 98765 is a review CL. Using actual CL 98766 instead.".to_string(),
            "Changelist 99999 does not exist in the system".to_string(),
        ]
    );

    let kind = |path: &str| outcome.actions.get(&DepotPath::parse(path).unwrap());
    assert_eq!(kind("//depot/main/Config/Enemy.csv"), Some(FileActionKind::Edit));
    assert_eq!(kind("//depot/main/Config/Old.csv"), Some(FileActionKind::Delete));
    assert_eq!(kind("//depot/main/Config/Skill.csv"), Some(FileActionKind::Add));
    assert_eq!(kind("//depot/main/combat_lua/boss.lua"), Some(FileActionKind::Add));

    let report = &outcome.report;
    assert_eq!(report.succeeded.len(), 4, "{:?}", report);
    assert!(report.skipped.is_empty());
    assert!(!report.has_failures());
    assert_eq!(report.change_lists.get("CLIENT"), Some(&ChangeSetId::new(1000)));
    assert_eq!(report.change_lists.get("COMBAT_LUA"), Some(&ChangeSetId::new(1001)));
    assert_eq!(
        p4.created_change_lists(),
        vec![DEFAULT_DESCRIPTION.to_string(), "Lua sync".to_string()]
    );

    assert_eq!(
        fs::read_to_string(ws.target.join("Config/Enemy.csv")).unwrap(),
        "id,hp\n1,250\n"
    );
    assert!(ws.target.join("Config/Skill.csv").is_file());
    assert!(!ws.target.join("Config/Old.csv").exists());
    assert!(ws.target_lua.join("combat_lua/boss.lua").is_file());
    assert!(!ws.target.join("combat_lua/boss.lua").exists());

    assert!(p4.calls().contains(&P4Call::MarkDeleted {
        change_list: ChangeSetId::new(1000),
        path: ws.target.join("Config/Old.csv"),
    }));
    assert!(p4.calls().contains(&P4Call::OpenForEdit {
        change_list: ChangeSetId::new(1000),
        path: ws.target.join("Config/Enemy.csv"),
    }));
}

#[test]
fn test_second_run_allocates_nothing() {
    let ws = Workspaces::new();
    seed(&ws);
    let p4 = server();
    let config = ws.config();
    let input = MergeInput::ChangeLists(ids(&[12345, 98765, 54321]));

    let first = execute_merge(&p4, &config, &request(input.clone())).unwrap();
    assert_eq!(first.report.change_lists.len(), 2);

    let second = execute_merge(&p4, &config, &request(input)).unwrap();
    assert!(second.report.change_lists.is_empty());
    assert!(second.report.succeeded.is_empty());
    assert_eq!(second.report.skipped.len(), 4);
    assert_eq!(p4.created_change_lists().len(), 2);
}

#[test]
fn test_delete_dominates_later_add() {
    let ws = Workspaces::new();
    write(&ws.source.join("Config/a.csv"), "a\n");
    let p4 = ScriptedP4::new()
        .with_view("//depot/main/", "")
        .with_describe(1, submitted(1, "add a", &[("//depot/main/Config/a.csv", "add")]))
        .with_describe(2, submitted(2, "drop a", &[("//depot/main/Config/a.csv", "delete")]))
        .with_describe(3, submitted(3, "add b", &[("//depot/main/Config/b.csv", "add")]));

    let outcome = execute_merge(
        &p4,
        &ws.config(),
        &request(MergeInput::ChangeLists(ids(&[1, 2, 3]))),
    )
    .unwrap();

    let a = DepotPath::parse("//depot/main/Config/a.csv").unwrap();
    let b = DepotPath::parse("//depot/main/Config/b.csv").unwrap();
    assert_eq!(outcome.actions.get(&a), Some(FileActionKind::Delete));
    assert_eq!(outcome.actions.get(&b), Some(FileActionKind::Add));
    assert_eq!(outcome.actions.len(), 2);

    // `a` is absent from the target, so its delete is a skip; `b` has no
    // source file, so its copy fails.
    assert_eq!(outcome.report.skipped.len(), 1);
    assert_eq!(outcome.report.skipped[0].path, "//depot/main/Config/a.csv");
    assert_eq!(outcome.report.failed.len(), 1);
    assert!(outcome.report.failed[0].message.starts_with("source file missing"));
}

#[test]
fn test_allocation_failure_is_scoped_to_its_category() {
    let ws = Workspaces::new();
    seed(&ws);
    let p4 = server().failing_allocation_in(ws.target_lua.clone());

    let outcome = execute_merge(
        &p4,
        &ws.config(),
        &request(MergeInput::ChangeLists(ids(&[12345, 98765, 54321]))),
    )
    .unwrap();

    let report = &outcome.report;
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].category, "COMBAT_LUA");
    assert_eq!(report.failed[0].message, NO_CHANGE_LIST);
    assert_eq!(report.succeeded.len(), 3);
    assert!(report.change_lists.contains_key("CLIENT"));
    assert!(!report.change_lists.contains_key("COMBAT_LUA"));
    assert!(!ws.target_lua.join("combat_lua/boss.lua").exists());
}

#[test]
fn test_unmapped_paths_are_skipped() {
    let ws = Workspaces::new();
    seed(&ws);
    let p4 = server().with_exclusion("//depot/main/combat_lua/");

    let outcome = execute_merge(
        &p4,
        &ws.config(),
        &request(MergeInput::ChangeLists(ids(&[12345]))),
    )
    .unwrap();

    let report = &outcome.report;
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].path, "//depot/main/combat_lua/boss.lua");
    assert!(report.skipped[0].message.contains("not mapped"));
    assert!(!report.change_lists.contains_key("COMBAT_LUA"));
}

#[test]
fn test_dry_run_touches_nothing() {
    let ws = Workspaces::new();
    seed(&ws);
    let p4 = server();

    let outcome = execute_merge(
        &p4,
        &ws.config(),
        &MergeRequest {
            dry_run: true,
            sync: true,
            ..request(MergeInput::ChangeLists(ids(&[12345, 98765, 54321])))
        },
    )
    .unwrap();

    assert!(outcome.report.dry_run);
    assert_eq!(outcome.report.succeeded.len(), 4);
    assert!(outcome.report.change_lists.is_empty());
    assert!(!p4.mutated());
    assert!(ws.target.join("Config/Old.csv").exists());
    assert_eq!(
        fs::read_to_string(ws.target.join("Config/Enemy.csv")).unwrap(),
        "id,hp\n1,200\n"
    );
}

#[test]
fn test_path_list_merge_copies_as_edits() {
    let ws = Workspaces::new();
    seed(&ws);
    let p4 = server();
    let paths = cl_relay::changelist::parse_depot_path_list(
        "# hotfix\n//depot/main/Config/Skill.csv\n\n//depot/main/combat_lua/boss.lua\n",
    );

    let outcome = execute_merge(&p4, &ws.config(), &request(MergeInput::Paths(paths))).unwrap();

    assert!(outcome.resolution.is_none());
    assert!(outcome
        .actions
        .iter()
        .all(|(_, kind)| kind == FileActionKind::Edit));
    assert_eq!(outcome.report.succeeded.len(), 2);
    assert!(ws.target.join("Config/Skill.csv").is_file());
    assert!(ws.target_lua.join("combat_lua/boss.lua").is_file());
    assert!(!p4
        .calls()
        .iter()
        .any(|call| matches!(call, P4Call::Describe(_))));
}

#[test]
fn test_parallel_workers_share_one_change_list_per_category() {
    let ws = Workspaces::new();
    let mut p4 = ScriptedP4::new().with_view("//depot/main/", "");
    let mut files = Vec::new();
    for i in 0..40 {
        let name = format!("Config/table_{:02}.csv", i);
        write(&ws.source.join(&name), &format!("row {}\n", i));
        files.push(format!("//depot/main/{}", name));
    }
    let rows: Vec<(&str, &str)> = files.iter().map(|f| (f.as_str(), "add")).collect();
    p4 = p4.with_describe(7, submitted(7, "bulk", &rows));

    let outcome = execute_merge(
        &p4,
        &ws.config(),
        &MergeRequest {
            jobs: Some(8),
            ..request(MergeInput::ChangeLists(ids(&[7])))
        },
    )
    .unwrap();

    assert_eq!(outcome.report.succeeded.len(), 40);
    assert_eq!(p4.created_change_lists().len(), 1);
    let sorted: Vec<&str> = outcome
        .report
        .succeeded
        .iter()
        .map(|e| e.path.as_str())
        .collect();
    let mut expected = sorted.clone();
    expected.sort_unstable();
    assert_eq!(sorted, expected);
}
