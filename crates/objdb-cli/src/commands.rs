use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;
use tracing::debug;

use objdb_btree::TreeRoot;
use objdb_io::{FileChannel, MemoryChannel, StorageChannel};
use objdb_meta::{TypeDescriptor, TypeKind};
use objdb_oid::{IdentityManager, IdentityTable, OidState, PersistentIdentityTable};
use objdb_store::{load_registry, ObjectStore, RecordStore, StoreConfig};
use objdb_types::{ClassOid, ObjectOid, Oid};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = StoreConfig::default();
    match cli.command {
        Command::TreeInfo(args) => {
            let report = tree_report(&args.path)?;
            emit(cli.format, &report, print_tree)
        }
        Command::Ids(args) => {
            let report = ids_report(&args.dir, &config, args.kind)?;
            emit(cli.format, report.as_slice(), print_ids)
        }
        Command::Types(args) => {
            let report = types_report(&args.dir, &config, args.all)?;
            emit(cli.format, report.as_slice(), print_types)
        }
        Command::Objects(args) => {
            let report = objects_report(&args.dir, &config, args.limit)?;
            emit(cli.format, report.as_slice(), print_objects)
        }
    }
}

fn emit<T: Serialize + ?Sized>(
    format: OutputFormat,
    report: &T,
    text: fn(&T),
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => text(report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

fn require_file(path: &Path) -> anyhow::Result<()> {
    if !path.is_file() {
        bail!("{} does not exist", path.display());
    }
    Ok(())
}

/// Refuse any directory that is not already a store.
fn require_store(dir: &Path, config: &StoreConfig) -> anyhow::Result<()> {
    require_file(&config.records_path(dir))
        .with_context(|| format!("{} is not an objdb store", dir.display()))
}

/// Copy `path` into memory. Tables and stores opened over the copy may
/// initialize headers without touching the file. A missing file reads as
/// empty.
fn snapshot(path: &Path) -> anyhow::Result<MemoryChannel> {
    match fs::read(path) {
        Ok(bytes) => Ok(MemoryChannel::from_bytes(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(MemoryChannel::new()),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

type StoreSnapshot = RecordStore<
    PersistentIdentityTable<ObjectOid, MemoryChannel>,
    PersistentIdentityTable<ClassOid, MemoryChannel>,
    MemoryChannel,
>;

fn open_snapshot(dir: &Path, config: &StoreConfig) -> anyhow::Result<StoreSnapshot> {
    let ids = IdentityManager::open(
        snapshot(&config.object_ids_path(dir))?,
        snapshot(&config.class_ids_path(dir))?,
    )?;
    Ok(RecordStore::new(ids, snapshot(&config.records_path(dir))?)?)
}

// ---------------------------------------------------------------------------
// tree-info
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct TreeReport {
    pub file_bytes: u64,
    pub root: Option<TreeRoot>,
}

pub fn tree_report(path: &Path) -> anyhow::Result<TreeReport> {
    require_file(path)?;
    let mut channel = FileChannel::open(path, &Default::default())?;
    let file_bytes = channel.len()?;
    let root = objdb_btree::read_root(&mut channel)
        .with_context(|| format!("reading tree root of {}", path.display()))?;
    debug!(path = %path.display(), file_bytes, "read tree root");
    Ok(TreeReport { file_bytes, root })
}

fn print_tree(report: &TreeReport) {
    let Some(root) = &report.root else {
        println!("{} no committed root ({} bytes)", "!".yellow().bold(), report.file_bytes);
        return;
    };
    let variant = if root.multi { "multi-value" } else { "single-value" };
    println!("Tree {} ({})", root.name.bold(), variant.cyan());
    println!("  Key type: {}", root.key_type.yellow());
    println!("  Order:    {}", root.order);
    println!("  Size:     {}", root.size.to_string().bold());
    println!("  Height:   {}", root.height);
    match root.root {
        Some(handle) => println!("  Root:     {}", handle.to_string().dimmed()),
        None => println!("  Root:     {}", "empty".dimmed()),
    }
    println!("  File:     {} bytes", report.file_bytes);
}

// ---------------------------------------------------------------------------
// ids
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct IdEntry {
    pub oid: String,
    /// Record position, absent for an allocated but unbound identifier.
    pub position: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct IdTableReport {
    pub kind: String,
    pub next_value: u64,
    pub live: Vec<IdEntry>,
}

fn id_table<O: Oid>(path: &Path) -> anyhow::Result<IdTableReport> {
    require_file(path)?;
    let table = PersistentIdentityTable::<O, _>::open(snapshot(path)?)?;
    let live = table
        .live_ids()?
        .into_iter()
        .map(|oid| -> anyhow::Result<IdEntry> {
            let position = match table.state(oid)? {
                OidState::Bound(position) => Some(position.offset()),
                _ => None,
            };
            Ok(IdEntry {
                oid: oid.to_string(),
                position,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(IdTableReport {
        kind: O::KIND.to_string(),
        next_value: table.next_value(),
        live,
    })
}

pub fn ids_report(
    dir: &Path,
    config: &StoreConfig,
    kind: IdKind,
) -> anyhow::Result<Vec<IdTableReport>> {
    require_store(dir, config)?;
    let mut tables = Vec::new();
    if matches!(kind, IdKind::Object | IdKind::All) {
        tables.push(id_table::<ObjectOid>(&config.object_ids_path(dir))?);
    }
    if matches!(kind, IdKind::Class | IdKind::All) {
        tables.push(id_table::<ClassOid>(&config.class_ids_path(dir))?);
    }
    Ok(tables)
}

fn print_ids(tables: &[IdTableReport]) {
    for table in tables {
        println!(
            "{} identifiers: {} live, next {}",
            table.kind.bold(),
            table.live.len().to_string().green(),
            table.next_value
        );
        for entry in &table.live {
            match entry.position {
                Some(position) => println!("  {}  @{}", entry.oid.yellow(), position),
                None => println!("  {}  {}", entry.oid.yellow(), "unbound".dimmed()),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct TypeEntry {
    pub id: u32,
    pub name: String,
    pub kind: String,
    pub element: Option<u32>,
    pub dynamic: bool,
    pub orderable: bool,
}

impl From<&TypeDescriptor> for TypeEntry {
    fn from(descriptor: &TypeDescriptor) -> Self {
        Self {
            id: descriptor.id().get(),
            name: descriptor.name().to_string(),
            kind: descriptor.kind().to_string(),
            element: descriptor.element().map(|e| e.id().get()),
            dynamic: descriptor.id().is_dynamic(),
            orderable: descriptor.is_orderable(),
        }
    }
}

pub fn types_report(
    dir: &Path,
    config: &StoreConfig,
    include_builtins: bool,
) -> anyhow::Result<Vec<TypeEntry>> {
    require_store(dir, config)?;
    let registry = load_registry(dir, config)?;
    let mut entries = Vec::new();
    if include_builtins {
        entries.extend(
            TypeKind::ALL
                .iter()
                .map(|kind| TypeEntry::from(registry.builtin(*kind).as_ref())),
        );
    }
    entries.extend(
        registry
            .dynamic_descriptors()
            .iter()
            .map(|d| TypeEntry::from(d.as_ref())),
    );
    Ok(entries)
}

fn print_types(entries: &[TypeEntry]) {
    if entries.is_empty() {
        println!("No types recorded.");
        return;
    }
    for entry in entries {
        let id = format!("{:>5}", entry.id);
        let id = if entry.dynamic { id.cyan() } else { id.dimmed() };
        let mut line = format!("{id}  {}  {}", entry.name.bold(), entry.kind.dimmed());
        if let Some(element) = entry.element {
            line.push_str(&format!("  of #{element}"));
        }
        if entry.orderable {
            line.push_str(&format!("  {}", "orderable".green()));
        }
        println!("{line}");
    }
}

// ---------------------------------------------------------------------------
// objects
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ObjectEntry {
    pub oid: String,
    pub class: String,
    pub type_id: u32,
    pub bytes: usize,
}

pub fn objects_report(
    dir: &Path,
    config: &StoreConfig,
    limit: Option<usize>,
) -> anyhow::Result<Vec<ObjectEntry>> {
    require_store(dir, config)?;
    let store = open_snapshot(dir, config)?;
    let ids = store.all_object_ids()?;
    let take = limit.unwrap_or(ids.len());
    ids.into_iter()
        .take(take)
        .map(|oid| -> anyhow::Result<ObjectEntry> {
            let record = store.read(oid)?;
            let class = store.read_class(record.class)?;
            Ok(ObjectEntry {
                oid: oid.to_string(),
                class: class.name,
                type_id: record.type_id.get(),
                bytes: record.data.len(),
            })
        })
        .collect()
}

fn print_objects(entries: &[ObjectEntry]) {
    if entries.is_empty() {
        println!("No objects stored.");
        return;
    }
    for entry in entries {
        println!(
            "{}  {}  #{}  {} bytes",
            entry.oid.yellow(),
            entry.class.bold(),
            entry.type_id,
            entry.bytes
        );
    }
    println!("{} objects", entries.len().to_string().green());
}

#[cfg(test)]
mod tests {
    use super::*;
    use objdb_btree::{BTree, BTreeConfig, ChannelPersister, SingleValueBTree};
    use objdb_meta::{TypeInfo, TypeRegistry};
    use objdb_store::{save_registry, FileObjectStore};

    fn seeded_store(dir: &Path) -> (ObjectOid, ObjectOid) {
        let config = StoreConfig::default();
        let registry = TypeRegistry::new();
        let descriptor = registry.resolve(&TypeInfo::named("app::Invoice"));
        let store = FileObjectStore::open(dir, &config).unwrap();
        let class = store.register_class(&descriptor).unwrap();
        let a = store.store(class, descriptor.id(), b"one").unwrap();
        let b = store.store(class, descriptor.id(), b"three").unwrap();
        store.flush().unwrap();
        save_registry(dir, &config, &registry).unwrap();
        (a, b)
    }

    #[test]
    fn tree_report_leaves_empty_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.tree");
        std::fs::write(&path, b"").unwrap();

        let report = tree_report(&path).unwrap();
        assert!(report.root.is_none());
        assert_eq!(report.file_bytes, 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn tree_report_reads_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("by-name.tree");
        {
            let channel = FileChannel::create(&path, &Default::default()).unwrap();
            let persister = ChannelPersister::open(channel).unwrap();
            let mut tree: SingleValueBTree<String, u64, _> = BTree::create(
                "by-name",
                &TypeRegistry::new(),
                BTreeConfig::with_order(4),
                persister,
            )
            .unwrap();
            for (i, name) in ["ada", "grace", "linus"].iter().enumerate() {
                tree.insert(name.to_string(), i as u64).unwrap();
            }
            tree.into_persister().into_channel().flush().unwrap();
        }

        let report = tree_report(&path).unwrap();
        let root = report.root.unwrap();
        assert_eq!(root.name, "by-name");
        assert_eq!(root.size, 3);
        assert_eq!(root.key_type, "String");
        assert!(report.file_bytes > 16);
    }

    #[test]
    fn missing_tree_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.tree");
        assert!(tree_report(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn ids_report_lists_live_ids() {
        let dir = tempfile::tempdir().unwrap();
        let (a, b) = seeded_store(dir.path());

        let tables = ids_report(dir.path(), &StoreConfig::default(), IdKind::All).unwrap();
        assert_eq!(tables.len(), 2);
        let objects: Vec<_> = tables[0].live.iter().map(|e| e.oid.clone()).collect();
        assert_eq!(objects, vec![a.to_string(), b.to_string()]);
        assert!(tables[0].live.iter().all(|e| e.position.is_some()));
        assert_eq!(tables[1].live.len(), 1);
    }

    #[test]
    fn types_report_includes_dynamic_types() {
        let dir = tempfile::tempdir().unwrap();
        seeded_store(dir.path());

        let config = StoreConfig::default();
        let dynamic = types_report(dir.path(), &config, false).unwrap();
        assert_eq!(dynamic.len(), 1);
        assert_eq!(dynamic[0].name, "app::Invoice");
        assert!(dynamic[0].dynamic);

        let all = types_report(dir.path(), &config, true).unwrap();
        assert_eq!(all.len(), TypeKind::ALL.len() + 1);
    }

    #[test]
    fn objects_report_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        seeded_store(dir.path());

        let config = StoreConfig::default();
        let objects = objects_report(dir.path(), &config, None).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[1].class, "app::Invoice");
        assert_eq!(objects[1].bytes, 5);
        assert_eq!(objects_report(dir.path(), &config, Some(1)).unwrap().len(), 1);
    }

    #[test]
    fn inspection_creates_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::default();
        std::fs::write(config.records_path(dir.path()), b"").unwrap();

        assert!(objects_report(dir.path(), &config, None).unwrap().is_empty());
        assert!(!config.object_ids_path(dir.path()).exists());
        assert!(!config.class_ids_path(dir.path()).exists());
    }

    #[test]
    fn ids_report_leaves_empty_table_alone() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::default();
        std::fs::write(config.records_path(dir.path()), b"").unwrap();
        std::fs::write(config.object_ids_path(dir.path()), b"").unwrap();

        let tables = ids_report(dir.path(), &config, IdKind::Object).unwrap();
        assert!(tables[0].live.is_empty());
        assert_eq!(std::fs::metadata(config.object_ids_path(dir.path())).unwrap().len(), 0);
    }

    #[test]
    fn non_store_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ids_report(dir.path(), &StoreConfig::default(), IdKind::All).is_err());
        assert!(!StoreConfig::default().object_ids_path(dir.path()).exists());
    }
}
