use codefence_core::{
    ConfirmationGate, FenceError, MemoryStore, Operations, RenameStrategy, Report,
};
use codefence_test_support::{config_with, test_config, Fault, FaultyStore, ScriptedGate};
use pretty_assertions::assert_eq;

fn programming_config() -> codefence_core::Config {
    config_with("Code", &[("programming", "js, py")])
}

#[test]
fn convert_tree_wraps_only_cataloged_extensions() {
    let store = MemoryStore::with_files([
        ("Code/a.js", "console.log(1);"),
        ("Code/b.py", "print(1)"),
        ("Code/c.txt", "notes"),
    ]);
    let gate = ScriptedGate::accepting();

    let report = Operations::new(&store, &gate)
        .convert_tree(&programming_config())
        .unwrap();

    assert_eq!(report, Report::Converted { count: 2 });
    assert_eq!(
        store.paths(),
        vec!["Code/a.js.md", "Code/b.py.md", "Code/c.txt"]
    );
    assert_eq!(
        store.contents("Code/a.js.md").as_deref(),
        Some("```javascript\nconsole.log(1);\n```\n")
    );
    assert_eq!(
        store.contents("Code/b.py.md").as_deref(),
        Some("```python\nprint(1)\n```\n")
    );
    assert_eq!(store.contents("Code/c.txt").as_deref(), Some("notes"));
    assert_eq!(
        gate.prompts(),
        vec![(
            "Confirmation".to_string(),
            "Convert all specified file types to markdown?".to_string()
        )]
    );
}

#[test]
fn declined_conversion_leaves_the_store_untouched() {
    let store = FaultyStore::new(MemoryStore::with_files([("Code/a.js", "x")]));
    let gate = ScriptedGate::declining();

    let report = Operations::new(&store, &gate)
        .convert_tree(&programming_config())
        .unwrap();

    assert_eq!(report, Report::Declined);
    assert_eq!(store.mutations(), 0);
    assert_eq!(store.inner().paths(), vec!["Code/a.js"]);
}

#[test]
fn conversion_asks_before_checking_the_root() {
    let store = MemoryStore::new();
    let gate = ScriptedGate::accepting();

    let err = Operations::new(&store, &gate)
        .convert_tree(&programming_config())
        .unwrap_err();

    assert!(matches!(err, FenceError::DirectoryNotFound { ref path } if path == "Code"));
    assert_eq!(err.to_string(), "Directory not found: Code");
    assert_eq!(gate.prompts().len(), 1);
}

#[test]
fn empty_root_converts_nothing() {
    let store = MemoryStore::new();
    store.create_dir("Code");
    let gate = ScriptedGate::accepting();

    let report = Operations::new(&store, &gate)
        .convert_tree(&programming_config())
        .unwrap();

    assert_eq!(report, Report::Converted { count: 0 });
    assert_eq!(report.notice(), "Nothing's been converted");
}

#[test]
fn nested_files_are_counted_exactly_once() {
    let store = MemoryStore::new();
    let mut dir = String::from("Code");
    for depth in 0..6 {
        for index in 0..5 {
            store.insert(format!("{dir}/m{index}.js"), "match");
        }
        for index in 0..3 {
            store.insert(format!("{dir}/n{index}.log"), "skip");
        }
        dir.push_str(&format!("/level{depth}"));
    }
    let gate = ScriptedGate::accepting();

    let report = Operations::new(&store, &gate)
        .convert_tree(&programming_config())
        .unwrap();

    assert_eq!(report.count(), 30);
    let paths = store.paths();
    assert_eq!(paths.iter().filter(|p| p.ends_with(".js.md")).count(), 30);
    assert_eq!(paths.iter().filter(|p| p.ends_with(".log")).count(), 18);
    assert!(!paths.iter().any(|p| p.ends_with(".md.md")));
}

#[test]
fn builtin_catalog_covers_default_categories() {
    let store = MemoryStore::with_files([
        ("Code/web/index.html", "<p></p>"),
        ("Code/web/site.scss", "a {}"),
        ("Code/db/q.sql", "SELECT 1"),
        ("Code/readme", "no extension"),
        ("Code/.env", "hidden"),
    ]);
    let gate = ScriptedGate::accepting();

    let report = Operations::new(&store, &gate)
        .convert_tree(&test_config())
        .unwrap();

    assert_eq!(report.count(), 3);
    assert_eq!(
        store.contents("Code/web/index.html.md").as_deref(),
        Some("```html\n<p></p>\n```\n")
    );
    assert_eq!(store.contents("Code/readme").as_deref(), Some("no extension"));
    assert_eq!(store.contents("Code/.env").as_deref(), Some("hidden"));
}

#[test]
fn undo_single_file_restores_content_and_path() {
    let store = MemoryStore::with_files([("Code/main.py.md", "```python\nprint(1)\n```\n")]);
    let gate = ScriptedGate::accepting();

    let report = Operations::new(&store, &gate)
        .undo_single_file(&test_config(), "Code/main.py.md")
        .unwrap();

    assert_eq!(
        report,
        Report::FileRestored {
            path: "Code/main.py".to_string()
        }
    );
    assert_eq!(store.paths(), vec!["Code/main.py"]);
    assert_eq!(store.contents("Code/main.py").as_deref(), Some("print(1)"));
    assert_eq!(gate.prompts()[0].1, "Undo changes for main.py?");
}

#[test]
fn undo_single_file_reports_missing_files() {
    let store = MemoryStore::with_files([("Code/a.js.md", "")]);
    let gate = ScriptedGate::accepting();
    let ops = Operations::new(&store, &gate);

    for path in ["Code/missing.js.md", "Code"] {
        let err = ops.undo_single_file(&test_config(), path).unwrap_err();
        assert!(matches!(err, FenceError::FileNotFound { .. }), "{path}: {err}");
    }
    assert!(gate.prompts().is_empty());
}

#[test]
fn declined_undo_changes_nothing() {
    let store = FaultyStore::new(MemoryStore::with_files([("Code/a.js.md", "```js\nx\n```\n")]));
    let gate = ScriptedGate::declining();
    let ops = Operations::new(&store, &gate);

    assert!(ops
        .undo_single_file(&test_config(), "Code/a.js.md")
        .unwrap()
        .is_declined());
    assert!(ops.undo_tree(&test_config()).unwrap().is_declined());
    assert_eq!(store.mutations(), 0);
    assert_eq!(gate.prompts().len(), 2);
}

#[test]
fn undo_tree_checks_the_root_before_asking() {
    let store = MemoryStore::new();
    let gate = ScriptedGate::accepting();

    let err = Operations::new(&store, &gate)
        .undo_tree(&test_config())
        .unwrap_err();

    assert!(matches!(err, FenceError::DirectoryNotFound { .. }));
    assert!(gate.prompts().is_empty());
}

#[test]
fn undo_tree_reverses_a_conversion() {
    let originals = [
        ("Code/a.js", "let a = 1;\n"),
        ("Code/lib/b.py", "def f():\n    return 1\n"),
        ("Code/lib/deeper/c.rs", "fn main() {}"),
        ("Code/keep.txt", "plain"),
    ];
    let store = MemoryStore::with_files(originals);
    let gate = ScriptedGate::accepting();
    let ops = Operations::new(&store, &gate);

    assert_eq!(ops.convert_tree(&test_config()).unwrap().count(), 3);
    let report = ops.undo_tree(&test_config()).unwrap();

    assert_eq!(report, Report::TreeRestored { count: 3 });
    assert_eq!(report.notice(), "Changes undone for 3 file(s)");
    for (path, contents) in originals {
        assert_eq!(store.contents(path).as_deref(), Some(contents), "{path}");
    }
    assert_eq!(store.paths().len(), originals.len());
}

#[test]
fn rename_strategy_decides_which_md_is_removed() {
    let wrapped = "my.md.backup/file.js.md";

    let store = MemoryStore::with_files([(wrapped, "```javascript\nx\n```\n")]);
    let gate = ScriptedGate::accepting();
    let report = Operations::new(&store, &gate)
        .undo_single_file(&test_config(), wrapped)
        .unwrap();
    assert_eq!(
        report,
        Report::FileRestored {
            path: "my.backup/file.js.md".to_string()
        }
    );

    let store = MemoryStore::with_files([(wrapped, "```javascript\nx\n```\n")]);
    let mut config = test_config();
    config.undo.rename = RenameStrategy::Suffix;
    let report = Operations::new(&store, &gate)
        .undo_single_file(&config, wrapped)
        .unwrap();
    assert_eq!(
        report,
        Report::FileRestored {
            path: "my.md.backup/file.js".to_string()
        }
    );
    assert_eq!(store.contents("my.md.backup/file.js").as_deref(), Some("x"));
}

#[test]
fn the_first_failure_is_returned_instead_of_a_count() {
    let store = FaultyStore::new(MemoryStore::with_files([
        ("Code/a.js", "a"),
        ("Code/sub/b.py", "b"),
        ("Code/sub/c.py", "c"),
    ]))
    .failing(Fault::Write, "Code/sub/b.py");
    let gate = ScriptedGate::accepting();

    let err = Operations::new(&store, &gate)
        .convert_tree(&programming_config())
        .unwrap_err();

    assert!(matches!(err, FenceError::Write { ref path, .. } if path == "Code/sub/b.py"));
    assert_eq!(err.exit_code() as u8, 4);
    assert_eq!(store.inner().contents("Code/sub/b.py").as_deref(), Some("b"));
}

#[test]
fn rename_failures_surface_both_paths() {
    let store = FaultyStore::new(MemoryStore::with_files([("Code/a.js", "a")]))
        .failing(Fault::Rename, "Code/a.js");
    let gate = ScriptedGate::accepting();

    let err = Operations::new(&store, &gate)
        .convert_tree(&programming_config())
        .unwrap_err();

    match err {
        FenceError::Rename { from, to, .. } => {
            assert_eq!(from, "Code/a.js");
            assert_eq!(to, "Code/a.js.md");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn closures_can_stand_in_for_the_gate() {
    let store = MemoryStore::with_files([("Code/a.js", "a")]);
    let gate = |_: &str, message: &str| message.starts_with("Convert");
    assert!(gate.confirm("Confirmation", "Convert all specified file types to markdown?"));

    let report = Operations::new(&store, &gate)
        .convert_tree(&programming_config())
        .unwrap();
    assert_eq!(report.count(), 1);
}
