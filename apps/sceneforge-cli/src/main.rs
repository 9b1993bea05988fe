use clap::{Parser, Subcommand};
use sceneforge_author::{Edit, EditApplier, Editor, ObjectPatch, order};
use sceneforge_common::{ComponentConfig, ObjectConfig, ObjectId, SessionId, Value};
use sceneforge_graph::{ComponentRegistry, SceneGraph};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sceneforge-cli", about = "CLI driver for the sceneforge edit engine")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and crate info
    Info,
    /// Run a scripted editing session with coalesced drags and undo/redo
    Demo,
    /// Export a scene, parse it back, rebuild, and compare
    Roundtrip {
        /// Number of objects to create
        #[arg(short, long, default_value = "5")]
        objects: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("sceneforge-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", sceneforge_common::crate_info());
            println!("graph: {}", sceneforge_graph::crate_info());
            println!("author: {}", sceneforge_author::crate_info());
            println!("persist: {}", sceneforge_persist::crate_info());
        }
        Commands::Demo => demo()?,
        Commands::Roundtrip { objects } => roundtrip(objects)?,
    }

    Ok(())
}

fn demo() -> anyhow::Result<()> {
    let mut graph = SceneGraph::new(ComponentRegistry::standard());
    let mut editor = Editor::new();
    let page = graph.add_page("Main");

    // Two siblings on the page.
    let a = ObjectId::new();
    let b = ObjectId::new();
    editor.apply_edit(
        &mut graph,
        &Edit::new()
            .add_object(
                a,
                ObjectConfig::at(Some(page), 0.0)
                    .with_field("name", "A")
                    .with_component("transform", ComponentConfig::new()),
            )
            .add_object(
                b,
                ObjectConfig::at(Some(page), 1.0)
                    .with_field("name", "B")
                    .with_component("transform", ComponentConfig::new()),
            ),
        SessionId(1),
    )?;
    println!("created 2 objects, undo depth {}", editor.undo_count());

    // A drag: B moves above A in several steps sharing one session id.
    let drag = SessionId(2);
    for _ in 0..3 {
        let orders = graph.child_orders(page);
        let target = order::order_between(&orders, 0);
        editor.apply_edit(
            &mut graph,
            &Edit::new().patch(b, ObjectPatch::new().reorder(target)),
            drag,
        )?;
    }
    println!(
        "after drag: children={:?}, undo depth {}",
        names(&graph, page),
        editor.undo_count()
    );

    editor.undo(&mut graph)?;
    println!(
        "after undo: children={:?}, can_redo={}",
        names(&graph, page),
        editor.can_redo()
    );

    editor.redo(&mut graph)?;
    println!("after redo: children={:?}", names(&graph, page));

    // Remove A's subtree and bring it back.
    let removal = Edit::remove_subtree(&graph, a);
    editor.apply_edit(&mut graph, &removal, SessionId(3))?;
    println!("after remove: {} objects", graph.object_count() - 1);
    editor.undo(&mut graph)?;
    println!("after undo: {} objects", graph.object_count() - 1);

    println!(
        "events pending: {}, dirty signals: {}",
        graph.events().len(),
        graph.take_dirty().len()
    );
    Ok(())
}

fn names(graph: &SceneGraph, parent: ObjectId) -> Vec<String> {
    graph
        .children(parent)
        .into_iter()
        .map(|id| match graph.field(id, "name") {
            Value::Str(name) => name,
            _ => id.to_string(),
        })
        .collect()
}

fn roundtrip(objects: usize) -> anyhow::Result<()> {
    println!("Round-trip demo: exporting {objects} objects");

    let mut graph = SceneGraph::new(ComponentRegistry::standard());
    let page = graph.add_page("Main");
    let mut edit = Edit::new();
    for i in 0..objects {
        edit = edit.add_object(
            ObjectId::new(),
            ObjectConfig::at(Some(page), i as f64)
                .with_field("name", format!("object-{i}"))
                .with_component(
                    "shape",
                    ComponentConfig::from([("size".to_owned(), Value::from(i as f64 + 1.0))]),
                ),
        );
    }
    EditApplier::apply(&mut graph, &edit)?;

    let blob = sceneforge_persist::export(&graph)?;
    println!("exported {} bytes of JSON", blob.len());

    let document = sceneforge_persist::parse(&blob)?;
    let mut rebuilt = SceneGraph::new(ComponentRegistry::standard());
    document.create_pages(&mut rebuilt);
    EditApplier::apply(&mut rebuilt, &document.into_edit())?;

    let matches = rebuilt.object_count() == graph.object_count()
        && graph
            .object_ids()
            .all(|id| rebuilt.contains(id) && rebuilt.full_config(id) == graph.full_config(id));
    println!(
        "original: {} objects, rebuilt: {} objects",
        graph.object_count(),
        rebuilt.object_count()
    );
    println!("Match: {}", if matches { "OK" } else { "MISMATCH" });
    Ok(())
}
