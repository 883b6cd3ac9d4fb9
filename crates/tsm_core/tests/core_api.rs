use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tsm_core::catalog::{CatalogSource, CategoryFilters, ItemRecord, JsonCatalog};
use tsm_core::core_api::{CoreErrorCode, Engine, ProfileIssue};
use tsm_core::group_path::GroupPath;
use tsm_core::item_string::{Dialect, ItemIdentity};
use tsm_core::merge::{Assignment, DeleteOptions, DeleteScope, MergeOptions, OrphanPolicy};
use tsm_core::persist;
use tsm_core::profile::ProfileSelector;

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn fixture_path(name: &str) -> PathBuf {
    workspace_root().join("tests/fixtures").join(name)
}

fn temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before unix epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}_{}_{}", std::process::id(), nanos));
    fs::create_dir_all(&dir).expect("temp dir should be created");
    dir
}

fn path(raw: &str) -> GroupPath {
    GroupPath::parse(raw).expect("valid group path")
}

fn record(id: u32) -> ItemRecord {
    ItemRecord {
        id,
        name: format!("item {id}"),
        modifiers: Vec::new(),
    }
}

#[test]
fn summary_reports_counts_and_busiest_groups() {
    let session = Engine::new()
        .open_path(&fixture_path("populated_profile.lua"), &ProfileSelector::default())
        .expect("populated profile opens");
    let summary = session.summary();

    assert_eq!(summary.profile, "Default");
    assert_eq!(summary.groups, 6);
    assert_eq!(summary.items, 5);
    assert_eq!(summary.tree_status_entries, 6);
    assert_eq!(summary.collapsed_entries, 1);
    assert_eq!(summary.other_keys, 2);
    assert_eq!(summary.dialect, Some(Dialect::Legacy));
    assert!(summary.issues.is_empty());

    let top: Vec<(String, usize)> = summary
        .top_groups
        .iter()
        .map(|count| (count.path.encode(), count.items))
        .collect();
    assert_eq!(
        top,
        [
            ("Tradeskills`Herbs".to_string(), 2),
            ("Tradeskills`Cloth".to_string(), 1),
            ("Consumables".to_string(), 1),
            ("Misc`Odd\\`Name".to_string(), 1),
        ]
    );
}

#[test]
fn issues_flag_missing_status_and_orphans() {
    let text = "DB = {\n\t[\"profiles\"] = {\n\t\t[\"Default\"] = {\n\t\t\t[\"items\"] = {\n\t\t\t\t[\"i:1\"] = \"Gone\",\n\t\t\t\t[\"bogus\"] = \"A\",\n\t\t\t},\n\t\t\t[\"groups\"] = {\n\t\t\t\t[\"A\"] = {},\n\t\t\t},\n\t\t},\n\t},\n}\n";
    let session = Engine::new()
        .open_text(text, &ProfileSelector::default())
        .expect("profile opens");
    assert_eq!(
        session.issues(),
        [
            ProfileIssue::MissingVisibility,
            ProfileIssue::OrphanedReferences,
            ProfileIssue::UnreadEntries,
        ]
    );
}

#[test]
fn groups_list_depth_children_and_expansion() {
    let session = Engine::new()
        .open_path(&fixture_path("populated_profile.lua"), &ProfileSelector::default())
        .expect("populated profile opens");
    let groups = session.groups();
    assert_eq!(groups.len(), 6);

    let root = &groups[0];
    assert_eq!(root.path, path("Tradeskills"));
    assert_eq!(root.depth, 1);
    assert_eq!(root.children, 2);
    assert_eq!(root.items, 0);
    assert_eq!(root.expanded, Some(true));

    let odd = groups
        .iter()
        .find(|group| group.path == path("Misc`Odd\\`Name"))
        .expect("nested group listed");
    assert_eq!(odd.name, "Odd`Name");
    assert_eq!(odd.depth, 2);
    assert_eq!(odd.items, 1);
}

#[test]
fn items_filter_by_group() {
    let session = Engine::new()
        .open_path(&fixture_path("populated_profile.lua"), &ProfileSelector::default())
        .expect("populated profile opens");

    assert_eq!(session.items(None).expect("all items").len(), 5);
    let herbs = session
        .items(Some(&path("Tradeskills`Herbs")))
        .expect("herbs items");
    let keys: Vec<&str> = herbs.iter().map(|entry| entry.key.as_str()).collect();
    assert_eq!(keys, ["item:2447:0:0:0:0:0:0", "item:765:0:0:0:0:0:0"]);
    assert_eq!(herbs[1].id, 765);

    // parents do not include subgroup items
    assert!(session.items(Some(&path("Tradeskills"))).expect("parent").is_empty());

    let err = session.items(Some(&path("Nope"))).expect_err("unknown group");
    assert_eq!(err.code, CoreErrorCode::GroupNotFound);
}

#[test]
fn unchanged_session_returns_loaded_text() {
    let text = fs::read_to_string(fixture_path("crlf_compact_profile.lua")).expect("fixture reads");
    let mut session = Engine::new()
        .open_text(text.clone(), &ProfileSelector::default())
        .expect("profile opens");

    let item = ItemIdentity::new(2447).expect("valid id");
    let report = session
        .apply(
            &[Assignment {
                item,
                group: path("Herbs"),
            }],
            &MergeOptions::default(),
        )
        .expect("no-op batch applies");
    assert_eq!(report.items_unchanged, 1);
    assert!(!session.is_modified());
    assert_eq!(session.to_text(), text);
}

#[test]
fn rejected_batch_leaves_session_untouched() {
    let text = fs::read_to_string(fixture_path("populated_profile.lua")).expect("fixture reads");
    let mut session = Engine::new()
        .open_text(text.clone(), &ProfileSelector::default())
        .expect("profile opens");
    let before = session.model().clone();

    let options = DeleteOptions {
        scope: DeleteScope::GroupOnly,
        orphans: OrphanPolicy::Ungroup,
    };
    let err = session
        .delete_group(&path("Tradeskills"), &options)
        .expect_err("subgroups would be orphaned");
    assert_eq!(err.code, CoreErrorCode::OrphanReferenceDetected);
    assert!(err.message.contains("Tradeskills`Herbs"), "{}", err.message);

    assert!(!session.is_modified());
    assert_eq!(session.model(), &before);
    assert_eq!(session.to_text(), text);
}

#[test]
fn import_records_dedups_and_skips_invalid_ids() {
    let mut session = Engine::new()
        .open_path(&fixture_path("populated_profile.lua"), &ProfileSelector::default())
        .expect("populated profile opens");
    let records = [record(4000), record(4000), record(0), record(118)];
    let report = session
        .import_records(&records, &path("Consumables`Potions"), &MergeOptions::default())
        .expect("import succeeds");

    assert_eq!(report.items_added, 1);
    assert_eq!(report.items_moved, 1);
    assert_eq!(report.groups_created, 1);
    assert!(session.is_modified());
    assert_eq!(
        session
            .items(Some(&path("Consumables`Potions")))
            .expect("new group")
            .len(),
        2
    );
}

#[test]
fn saved_session_reopens_with_changes() {
    let dir = temp_dir("tsm_core_save");
    let target = dir.join("TradeSkillMaster.lua");
    fs::copy(fixture_path("populated_profile.lua"), &target).expect("fixture copies");

    let engine = Engine::new();
    let mut session = engine
        .open_path(&target, &ProfileSelector::default())
        .expect("copy opens");
    session
        .rename_group(&path("Misc"), &path("Leftovers"), &[])
        .expect("rename succeeds");
    session.save(&target).expect("save succeeds");

    let reopened = engine
        .open_path(&target, &ProfileSelector::default())
        .expect("saved file opens");
    assert!(reopened.model().has_group(&path("Leftovers`Odd\\`Name")));
    assert!(!reopened.model().has_group(&path("Misc")));
    assert!(!dir.join("TradeSkillMaster.lua.tmp").exists());

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn open_path_reports_missing_file_as_io() {
    let err = Engine::new()
        .open_path(&fixture_path("does_not_exist.lua"), &ProfileSelector::default())
        .expect_err("missing file");
    assert_eq!(err.code, CoreErrorCode::Io);
}

#[test]
fn backups_get_distinct_names() {
    let dir = temp_dir("tsm_core_backup");
    let target = dir.join("TradeSkillMaster.lua");
    fs::write(&target, "DB = {}\n").expect("seed file");
    let backups = dir.join("backups");

    let first = persist::create_backup(&target, Some(&backups)).expect("first backup");
    let second = persist::create_backup(&target, Some(&backups)).expect("second backup");
    assert_ne!(first, second);
    for backup in [&first, &second] {
        let name = backup
            .file_name()
            .and_then(|name| name.to_str())
            .expect("utf-8 name");
        assert!(name.starts_with("TradeSkillMaster_"), "{name}");
        assert!(name.ends_with(".lua"), "{name}");
        assert_eq!(fs::read_to_string(backup).expect("backup reads"), "DB = {}\n");
    }

    let beside = persist::create_backup(&target, None).expect("backup next to file");
    assert_eq!(beside.parent(), Some(dir.as_path()));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn atomic_write_replaces_contents() {
    let dir = temp_dir("tsm_core_atomic");
    let target = dir.join("profile.lua");
    fs::write(&target, "old").expect("seed file");
    fs::write(dir.join("profile.lua.tmp"), "stale temp").expect("seed stale temp");

    persist::write_atomic(&target, "new").expect("write succeeds");
    assert_eq!(fs::read_to_string(&target).expect("target reads"), "new");
    // an unrelated temp file is left alone
    assert_eq!(
        fs::read_to_string(dir.join("profile.lua.tmp")).expect("temp reads"),
        "stale temp"
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn failed_atomic_write_leaves_no_files() {
    let dir = temp_dir("tsm_core_atomic_fail");
    let target = dir.join("missing").join("profile.lua");

    let err = persist::write_atomic(&target, "new").expect_err("parent does not exist");
    assert_eq!(err.code, CoreErrorCode::Io);
    assert!(!target.exists());
    assert_eq!(fs::read_dir(&dir).expect("dir lists").count(), 0);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn json_catalog_serves_categories() {
    let catalog = JsonCatalog::from_json(
        r#"{
            "herbs": [{"id": 765, "name": "Silverleaf"}, {"id": 2447, "name": "Peacebloom"}],
            "gems": [{"id": 23077, "modifiers": [0, 3]}]
        }"#,
    )
    .expect("catalog parses");
    assert_eq!(catalog.categories().collect::<Vec<_>>(), ["herbs", "gems"]);

    let limited = catalog
        .fetch_category(
            "herbs",
            &CategoryFilters {
                slot: None,
                limit: Some(1),
            },
        )
        .expect("known category");
    assert_eq!(limited, [record_named(765, "Silverleaf")]);

    let err = catalog
        .fetch_category("cloth", &CategoryFilters::default())
        .expect_err("unknown category");
    assert_eq!(err.code, CoreErrorCode::InvalidInput);

    let gem = catalog
        .resolve_item(23077)
        .expect("lookup succeeds")
        .expect("gem is known");
    assert_eq!(gem.identity().expect("valid").modifiers(), [0, 3]);
    assert_eq!(catalog.resolve_item(1).expect("lookup succeeds"), None);
}

#[test]
fn flat_catalog_answers_any_category() {
    let catalog = JsonCatalog::from_json(r#"[{"id": 1}, {"id": 2}]"#).expect("catalog parses");
    let records = catalog
        .fetch_category("anything", &CategoryFilters::default())
        .expect("flat files serve every category");
    assert_eq!(records.len(), 2);

    let err = JsonCatalog::from_json(r#"{"id": 1}"#).expect_err("not a record file");
    assert_eq!(err.code, CoreErrorCode::InvalidInput);
}

fn record_named(id: u32, name: &str) -> ItemRecord {
    ItemRecord {
        id,
        name: name.to_string(),
        modifiers: Vec::new(),
    }
}
