//! Command-line access to a graph kept in a memory-store snapshot file.
#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use kvgraph::{
    logging, Direction, Edge, ElementKind, Graph, GraphConfig, MemoryStore, PropertyValue, Vertex,
};

#[derive(Parser, Debug)]
#[command(
    name = "kvgraph",
    version,
    about = "Inspect and edit a property graph stored in a snapshot file",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        default_value = "graph.json",
        help = "Snapshot file holding the store; created on first write"
    )]
    store: PathBuf,

    #[arg(long, global = true, value_name = "FILE", help = "TOML graph configuration")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Override the configured graph name")]
    graph: Option<String>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        default_value = "warn",
        help = "Log filter used when RUST_LOG is unset"
    )]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum KindArg {
    Vertex,
    Edge,
}

impl From<KindArg> for ElementKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Vertex => ElementKind::Vertex,
            KindArg::Edge => ElementKind::Edge,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ValueType {
    String,
    Int,
    Float,
    Bool,
}

#[derive(Args, Debug)]
struct ValueArg {
    #[arg(value_name = "VALUE")]
    value: String,

    #[arg(long = "type", value_enum, default_value_t = ValueType::String, help = "How VALUE is parsed")]
    value_type: ValueType,
}

impl ValueArg {
    fn parse(&self) -> Result<PropertyValue, Box<dyn Error>> {
        Ok(match self.value_type {
            ValueType::String => PropertyValue::String(self.value.clone()),
            ValueType::Int => PropertyValue::Int(self.value.parse()?),
            ValueType::Float => PropertyValue::Float(self.value.parse()?),
            ValueType::Bool => PropertyValue::Bool(self.value.parse()?),
        })
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a vertex; a random id is used when none is given.
    AddVertex {
        #[arg(value_name = "ID")]
        id: Option<String>,
    },
    /// Create an edge between two vertices.
    AddEdge {
        #[arg(long, help = "Edge id; random when omitted")]
        id: Option<String>,
        #[arg(value_name = "OUT")]
        out_vertex: String,
        #[arg(value_name = "IN")]
        in_vertex: String,
        #[arg(value_name = "LABEL")]
        label: String,
    },
    /// Set a property on a vertex or edge.
    SetProp {
        #[arg(long, value_enum, default_value_t = KindArg::Vertex)]
        kind: KindArg,
        #[arg(value_name = "ID")]
        id: String,
        #[arg(value_name = "KEY")]
        key: String,
        #[command(flatten)]
        value: ValueArg,
    },
    /// Remove a vertex and its incident edges.
    RemoveVertex {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Remove an edge.
    RemoveEdge {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Print a vertex with its properties and adjacency.
    ShowVertex {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Print an edge with its properties.
    ShowEdge {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// List elements whose KEY property equals VALUE.
    Find {
        #[arg(long, value_enum, default_value_t = KindArg::Vertex)]
        kind: KindArg,
        #[arg(value_name = "KEY")]
        key: String,
        #[command(flatten)]
        value: ValueArg,
    },
    /// Manage automatic key indexes.
    #[command(subcommand)]
    KeyIndex(KeyIndexCmd),
    /// Manage named indexes.
    #[command(subcommand)]
    Index(IndexCmd),
    /// Print every vertex and edge.
    Dump,
}

#[derive(Subcommand, Debug)]
enum KeyIndexCmd {
    /// Index KEY and rebuild its entries.
    Create {
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(long, value_enum, default_value_t = KindArg::Vertex)]
        kind: KindArg,
    },
    /// Stop indexing KEY.
    Drop {
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(long, value_enum, default_value_t = KindArg::Vertex)]
        kind: KindArg,
    },
    /// List indexed keys.
    List {
        #[arg(long, value_enum, default_value_t = KindArg::Vertex)]
        kind: KindArg,
    },
}

#[derive(Subcommand, Debug)]
enum IndexCmd {
    /// Register a named index.
    Create {
        #[arg(value_name = "NAME")]
        name: String,
        #[arg(long, value_enum, default_value_t = KindArg::Vertex)]
        kind: KindArg,
    },
    /// Drop a named index.
    Drop {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// List named indexes.
    List,
}

#[derive(Serialize)]
struct VertexReport {
    id: String,
    properties: BTreeMap<String, PropertyValue>,
    out_edges: Vec<String>,
    in_edges: Vec<String>,
}

#[derive(Serialize)]
struct EdgeReport {
    id: String,
    label: String,
    out_vertex: String,
    in_vertex: String,
    properties: BTreeMap<String, PropertyValue>,
}

#[derive(Serialize)]
struct DumpReport {
    vertices: Vec<VertexReport>,
    edges: Vec<EdgeReport>,
}

#[derive(Serialize)]
struct IndexReport {
    name: String,
    kind: ElementKind,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level)?;
    let config = load_config(cli.config.as_deref(), cli.graph.as_deref())?;
    let store = Arc::new(open_store(&cli.store)?);
    let graph = Graph::open(config, store.clone())?;
    let outcome = execute(&cli, &graph);
    graph.shutdown()?;
    // Partial writes of a failed command are kept, as in the store itself.
    store.save_snapshot(&cli.store)?;
    outcome
}

fn load_config(path: Option<&Path>, graph: Option<&str>) -> Result<GraphConfig, Box<dyn Error>> {
    let mut config = match path {
        Some(path) => GraphConfig::load(path)?,
        None => GraphConfig::default(),
    };
    if let Some(name) = graph {
        config.graph_name = name.to_owned();
    }
    Ok(config)
}

fn open_store(path: &Path) -> Result<MemoryStore, Box<dyn Error>> {
    if path.exists() {
        Ok(MemoryStore::load_snapshot(path)?)
    } else {
        Ok(MemoryStore::new())
    }
}

fn execute(cli: &Cli, graph: &Graph) -> Result<(), Box<dyn Error>> {
    let format = cli.format;
    match &cli.command {
        Command::AddVertex { id } => {
            let vertex = graph.add_vertex(id.as_deref())?;
            emit(format, &vertex.id(), |id| println!("added vertex {id}"))?;
        }
        Command::AddEdge {
            id,
            out_vertex,
            in_vertex,
            label,
        } => {
            let edge = graph.add_edge(id.as_deref(), out_vertex, in_vertex, label)?;
            emit(format, &edge.id(), |id| println!("added edge {id}"))?;
        }
        Command::SetProp {
            kind,
            id,
            key,
            value,
        } => {
            let value = value.parse()?;
            match ElementKind::from(*kind) {
                ElementKind::Vertex => require_vertex(graph, id)?.set_property(key, value)?,
                ElementKind::Edge => require_edge(graph, id)?.set_property(key, value)?,
            }
            emit(format, &true, |_| println!("{key} set on {id}"))?;
        }
        Command::RemoveVertex { id } => {
            graph.remove_vertex(id)?;
            emit(format, &true, |_| println!("removed vertex {id}"))?;
        }
        Command::RemoveEdge { id } => {
            graph.remove_edge(id)?;
            emit(format, &true, |_| println!("removed edge {id}"))?;
        }
        Command::ShowVertex { id } => {
            let report = vertex_report(&require_vertex(graph, id)?)?;
            emit(format, &report, print_vertex_text)?;
        }
        Command::ShowEdge { id } => {
            let report = edge_report(&require_edge(graph, id)?)?;
            emit(format, &report, print_edge_text)?;
        }
        Command::Find { kind, key, value } => {
            let value = value.parse()?;
            let ids: Vec<String> = match ElementKind::from(*kind) {
                ElementKind::Vertex => graph
                    .vertices_with(key, value)?
                    .iter()
                    .map(|v| v.id().to_owned())
                    .collect(),
                ElementKind::Edge => graph
                    .edges_with(key, value)?
                    .iter()
                    .map(|e| e.id().to_owned())
                    .collect(),
            };
            emit(format, &ids, |ids| {
                for id in ids {
                    println!("{id}");
                }
            })?;
        }
        Command::KeyIndex(cmd) => run_key_index(format, graph, cmd)?,
        Command::Index(cmd) => run_index(format, graph, cmd)?,
        Command::Dump => {
            let report = DumpReport {
                vertices: graph
                    .vertices()?
                    .iter()
                    .map(vertex_report)
                    .collect::<Result<_, _>>()?,
                edges: graph
                    .edges()?
                    .iter()
                    .map(edge_report)
                    .collect::<Result<_, _>>()?,
            };
            emit(format, &report, |report| {
                for vertex in &report.vertices {
                    print_vertex_text(vertex);
                }
                for edge in &report.edges {
                    print_edge_text(edge);
                }
            })?;
        }
    }
    Ok(())
}

fn run_key_index(format: OutputFormat, graph: &Graph, cmd: &KeyIndexCmd) -> Result<(), Box<dyn Error>> {
    match cmd {
        KeyIndexCmd::Create { key, kind } => {
            graph.create_key_index(key, (*kind).into())?;
            emit(format, &true, |_| println!("key index on {key} created"))?;
        }
        KeyIndexCmd::Drop { key, kind } => {
            graph.drop_key_index(key, (*kind).into())?;
            emit(format, &true, |_| println!("key index on {key} dropped"))?;
        }
        KeyIndexCmd::List { kind } => {
            let keys = graph.indexed_keys((*kind).into())?;
            emit(format, &keys, |keys| {
                for key in keys {
                    println!("{key}");
                }
            })?;
        }
    }
    Ok(())
}

fn run_index(format: OutputFormat, graph: &Graph, cmd: &IndexCmd) -> Result<(), Box<dyn Error>> {
    match cmd {
        IndexCmd::Create { name, kind } => {
            graph.create_index(name, (*kind).into())?;
            emit(format, &true, |_| println!("index {name} created"))?;
        }
        IndexCmd::Drop { name } => {
            graph.drop_index(name)?;
            emit(format, &true, |_| println!("index {name} dropped"))?;
        }
        IndexCmd::List => {
            let indices: Vec<IndexReport> = graph
                .indices()?
                .iter()
                .map(|index| IndexReport {
                    name: index.name().to_owned(),
                    kind: index.kind(),
                })
                .collect();
            emit(format, &indices, |indices| {
                for index in indices {
                    println!("{} ({})", index.name, index.kind);
                }
            })?;
        }
    }
    Ok(())
}

fn require_vertex(graph: &Graph, id: &str) -> Result<Vertex, Box<dyn Error>> {
    graph
        .vertex(id)?
        .ok_or_else(|| format!("vertex {id} does not exist").into())
}

fn require_edge(graph: &Graph, id: &str) -> Result<Edge, Box<dyn Error>> {
    graph
        .edge(id)?
        .ok_or_else(|| format!("edge {id} does not exist").into())
}

fn properties_of<F>(
    keys: impl IntoIterator<Item = String>,
    read: F,
) -> kvgraph::Result<BTreeMap<String, PropertyValue>>
where
    F: Fn(&str) -> kvgraph::Result<Option<PropertyValue>>,
{
    let mut props = BTreeMap::new();
    for key in keys {
        if let Some(value) = read(&key)? {
            props.insert(key, value);
        }
    }
    Ok(props)
}

fn vertex_report(vertex: &Vertex) -> kvgraph::Result<VertexReport> {
    let edge_ids = |direction| -> kvgraph::Result<Vec<String>> {
        Ok(vertex
            .edges(direction, &[])?
            .iter()
            .map(|e| e.id().to_owned())
            .collect())
    };
    Ok(VertexReport {
        id: vertex.id().to_owned(),
        properties: properties_of(vertex.property_keys()?, |key| vertex.property(key))?,
        out_edges: edge_ids(Direction::Out)?,
        in_edges: edge_ids(Direction::In)?,
    })
}

fn edge_report(edge: &Edge) -> kvgraph::Result<EdgeReport> {
    Ok(EdgeReport {
        id: edge.id().to_owned(),
        label: edge.label()?,
        out_vertex: edge.out_vertex()?.id().to_owned(),
        in_vertex: edge.in_vertex()?.id().to_owned(),
        properties: properties_of(edge.property_keys()?, |key| edge.property(key))?,
    })
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize + ?Sized,
    F: Fn(&T),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(value),
    }
    Ok(())
}

fn print_vertex_text(report: &VertexReport) {
    println!("vertex {}", report.id);
    for (key, value) in &report.properties {
        println!("  {key} = {value}");
    }
    for edge in &report.out_edges {
        println!("  -> {edge}");
    }
    for edge in &report.in_edges {
        println!("  <- {edge}");
    }
}

fn print_edge_text(report: &EdgeReport) {
    println!(
        "edge {} {} -[{}]-> {}",
        report.id, report.out_vertex, report.label, report.in_vertex
    );
    for (key, value) in &report.properties {
        println!("  {key} = {value}");
    }
}
