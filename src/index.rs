//! In-memory index of archive folders.
//!
//! The primary index maps a process-local id to each folder. Three secondary
//! indexes map a normalized descriptor value (contract number, phone,
//! address) to the folders that carried it when they were indexed.
//! Secondary buckets are append-only: removing a folder leaves its old
//! references in place.

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use rayon::prelude::*;
use serde::Serialize;

use crate::{
    descriptor::Descriptor,
    error::{Error, Result},
    event::{ChangeEvent, EventKind},
    slug::slugify,
    walker::{self, AttachmentKind},
};

/// A folder in the primary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderRecord {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

/// Search hit: the id and exact on-disk name of a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderRef {
    pub id: u64,
    pub name: String,
}

impl From<&FolderRecord> for FolderRef {
    fn from(record: &FolderRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
        }
    }
}

/// Which descriptor field a secondary index is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Contract,
    Phone,
    Address,
}

impl KeyKind {
    pub const ALL: [KeyKind; 3] =
        [KeyKind::Contract, KeyKind::Phone, KeyKind::Address];

    pub fn as_str(self) -> &'static str {
        match self {
            KeyKind::Contract => "contract",
            KeyKind::Phone => "phone",
            KeyKind::Address => "address",
        }
    }

    /// Accepts `contract`/`phone`/`address`, optionally with a `by_` prefix.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        let name = name.strip_prefix("by_").unwrap_or(name);
        match name.to_ascii_lowercase().as_str() {
            "contract" => Some(KeyKind::Contract),
            "phone" => Some(KeyKind::Phone),
            "address" => Some(KeyKind::Address),
            _ => None,
        }
    }

    fn value_in(self, descriptor: &Descriptor) -> Option<&str> {
        match self {
            KeyKind::Contract => descriptor.contract(),
            KeyKind::Phone => descriptor.phone(),
            KeyKind::Address => descriptor.address(),
        }
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized key value -> folders, in the order they were indexed.
#[derive(Debug, Default)]
pub struct SecondaryIndex {
    buckets: HashMap<String, Vec<FolderRef>>,
}

impl SecondaryIndex {
    /// Append `folder` under the slug of `raw_value`. Values that normalize
    /// to nothing are not indexed.
    fn insert(&mut self, raw_value: &str, folder: FolderRef) {
        let key = slugify(raw_value);
        if key.is_empty() {
            return;
        }
        self.buckets.entry(key).or_default().push(folder);
    }

    pub fn lookup(&self, query: &str) -> Vec<FolderRef> {
        self.buckets
            .get(&slugify(query))
            .cloned()
            .unwrap_or_default()
    }

    pub fn key_count(&self) -> usize {
        self.buckets.len()
    }
}

#[derive(Debug)]
pub struct FolderIndex {
    root: PathBuf,
    folders: BTreeMap<u64, FolderRecord>,
    ids_by_name: HashMap<String, u64>,
    by_contract: SecondaryIndex,
    by_phone: SecondaryIndex,
    by_address: SecondaryIndex,
    next_id: u64,
}

impl FolderIndex {
    /// An index over `root` with no folders in it.
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            folders: BTreeMap::new(),
            ids_by_name: HashMap::new(),
            by_contract: SecondaryIndex::default(),
            by_phone: SecondaryIndex::default(),
            by_address: SecondaryIndex::default(),
            next_id: 0,
        }
    }

    /// Scan `root` once and index every child folder.
    ///
    /// Folders get ids `0..n` in name order. Descriptors are read in
    /// parallel, but secondary buckets are filled in id order.
    pub fn build(
        root: impl Into<PathBuf>,
        include_hidden: bool,
    ) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            return Err(Error::RootNotFound(root));
        }

        let names: Vec<String> =
            walker::list_child_folders(&root, include_hidden)
                .into_iter()
                .collect();
        let descriptors: Vec<Option<Descriptor>> = names
            .par_iter()
            .map(|name| Descriptor::read_from_dir(&root.join(name)))
            .collect();

        let mut index = Self::empty(root);
        for (name, descriptor) in names.into_iter().zip(descriptors) {
            index.insert(name, descriptor.as_ref());
        }

        tracing::info!(
            root = %index.root.display(),
            folders = index.len(),
            contracts = index.by_contract.key_count(),
            phones = index.by_phone.key_count(),
            addresses = index.by_address.key_count(),
            "built folder index"
        );
        Ok(index)
    }

    fn insert(&mut self, name: String, descriptor: Option<&Descriptor>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let record = FolderRecord {
            id,
            slug: slugify(&name),
            name,
        };

        if let Some(descriptor) = descriptor {
            for kind in KeyKind::ALL {
                if let Some(value) = kind.value_in(descriptor) {
                    let folder = FolderRef::from(&record);
                    self.secondary_mut(kind).insert(value, folder);
                }
            }
        }

        self.ids_by_name.insert(record.name.clone(), id);
        self.folders.insert(id, record);
        id
    }

    /// Index a newly discovered folder.
    ///
    /// Returns the assigned id, or `None` if a folder with this exact name is
    /// already indexed. Ids are never reused, even for names that were
    /// removed earlier.
    pub fn add(&mut self, name: &str) -> Option<u64> {
        if self.contains(name) {
            return None;
        }
        let descriptor = Descriptor::read_from_dir(&self.root.join(name));
        self.add_with_descriptor(name, descriptor)
    }

    /// Like [`FolderIndex::add`], with the descriptor already read by the
    /// caller. Does no filesystem access.
    pub fn add_with_descriptor(
        &mut self,
        name: &str,
        descriptor: Option<Descriptor>,
    ) -> Option<u64> {
        if self.contains(name) {
            return None;
        }
        let id = self.insert(name.to_string(), descriptor.as_ref());
        tracing::debug!(id, folder = name, "indexed folder");
        Some(id)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ids_by_name.contains_key(name)
    }

    /// Drop a folder from the primary index. Secondary buckets keep their
    /// references to it.
    pub fn remove(&mut self, name: &str) -> Option<FolderRecord> {
        let id = self.ids_by_name.remove(name)?;
        let record = self.folders.remove(&id);
        tracing::debug!(id, folder = name, "removed folder");
        record
    }

    /// Apply a change event. Returns whether the primary index changed.
    pub fn apply(&mut self, event: &ChangeEvent) -> bool {
        match event.event {
            EventKind::New => self.add(&event.folder_name).is_some(),
            EventKind::Del => self.remove(&event.folder_name).is_some(),
        }
    }

    /// Folders whose slug contains the slug of `query`, in id order.
    pub fn search_partial(&self, query: &str) -> Vec<FolderRef> {
        let needle = slugify(query);
        self.folders
            .values()
            .filter(|record| record.slug.contains(&needle))
            .map(FolderRef::from)
            .collect()
    }

    /// Exact lookup of a normalized key in one secondary index.
    pub fn search_by_key(&self, query: &str, kind: KeyKind) -> Vec<FolderRef> {
        self.secondary(kind).lookup(query)
    }

    /// Like [`FolderIndex::search_by_key`], with the kind given by name.
    /// Unknown kinds yield an empty result.
    pub fn search_by_key_name(
        &self,
        query: &str,
        kind: &str,
    ) -> Vec<FolderRef> {
        match KeyKind::from_name(kind) {
            Some(kind) => self.search_by_key(query, kind),
            None => {
                tracing::debug!(kind, "unknown key kind");
                Vec::new()
            }
        }
    }

    pub fn get(&self, id: u64) -> Option<&FolderRecord> {
        self.folders.get(&id)
    }

    pub fn folder_path(&self, id: u64) -> Option<PathBuf> {
        self.get(id).map(|record| self.root.join(&record.name))
    }

    /// Files directly inside the folder, or `None` if the id is unknown,
    /// the folder is gone, or it holds no files.
    pub fn get_files(&self, id: u64) -> Option<Vec<PathBuf>> {
        let path = self.folder_path(id)?;
        walker::list_files(&path).ok().filter(|files| !files.is_empty())
    }

    /// Image attachments of the folder, or `None` when there are none.
    pub fn get_images(&self, id: u64) -> Option<Vec<PathBuf>> {
        let images: Vec<PathBuf> = self
            .get_files(id)?
            .into_iter()
            .filter(|path| AttachmentKind::of(path).is_image())
            .collect();
        (!images.is_empty()).then_some(images)
    }

    /// The folder's parsed descriptor, or `None` for an unknown id, a
    /// missing or empty folder, or an absent or unparseable descriptor.
    pub fn read_descriptor(&self, id: u64) -> Option<Descriptor> {
        Descriptor::read_from_dir(&self.folder_path(id)?)
    }

    pub fn secondary(&self, kind: KeyKind) -> &SecondaryIndex {
        match kind {
            KeyKind::Contract => &self.by_contract,
            KeyKind::Phone => &self.by_phone,
            KeyKind::Address => &self.by_address,
        }
    }

    fn secondary_mut(&mut self, kind: KeyKind) -> &mut SecondaryIndex {
        match kind {
            KeyKind::Contract => &mut self.by_contract,
            KeyKind::Phone => &mut self.by_phone,
            KeyKind::Address => &mut self.by_address,
        }
    }

    pub fn folders(&self) -> impl Iterator<Item = &FolderRecord> {
        self.folders.values()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The id the next added folder will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DESCRIPTOR_FILE;

    const HEADER: &str = "Номер договора;Адрес;Телефон;ФИО клиента;Маржа";

    fn make_folder(root: &Path, name: &str, descriptor: Option<&str>) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        if let Some(values) = descriptor {
            std::fs::write(
                dir.join(DESCRIPTOR_FILE),
                format!("{HEADER}\n{values}\n"),
            )
            .unwrap();
        }
    }

    fn names(refs: &[FolderRef]) -> Vec<&str> {
        refs.iter().map(|r| r.name.as_str()).collect()
    }

    fn abc() -> (tempfile::TempDir, FolderIndex) {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["A", "B", "C"] {
            make_folder(tmp.path(), name, None);
        }
        let index = FolderIndex::build(tmp.path(), false).unwrap();
        (tmp, index)
    }

    #[test]
    fn build_assigns_ids_in_name_order() {
        let (_tmp, index) = abc();
        let records: Vec<_> =
            index.folders().map(|r| (r.id, r.name.as_str())).collect();
        assert_eq!(records, vec![(0, "A"), (1, "B"), (2, "C")]);
        assert_eq!(index.next_id(), 3);
    }

    #[test]
    fn build_fails_without_root() {
        let tmp = tempfile::tempdir().unwrap();
        let err =
            FolderIndex::build(tmp.path().join("missing"), false).unwrap_err();
        assert!(matches!(err, Error::RootNotFound(_)));
    }

    #[test]
    fn add_then_remove() {
        let (tmp, mut index) = abc();
        make_folder(tmp.path(), "D", None);

        assert_eq!(index.add("D"), Some(3));
        assert!(index.remove("B").is_some());

        let left: Vec<_> = index.folders().map(|r| r.name.as_str()).collect();
        assert_eq!(left, vec!["A", "C", "D"]);
        assert_eq!(index.get(3).unwrap().name, "D");
    }

    #[test]
    fn add_is_idempotent() {
        let (_tmp, mut index) = abc();
        assert_eq!(index.add("D"), Some(3));
        assert_eq!(index.add("D"), None);
        assert_eq!(index.folders().filter(|r| r.name == "D").count(), 1);
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn add_with_descriptor_skips_disk() {
        let (_tmp, mut index) = abc();
        let descriptor =
            Descriptor::parse("Телефон;Адрес\n0671234567;Main 1\n");

        // No such folder on disk; the given descriptor is used as-is.
        let id = index.add_with_descriptor("ghost", Some(descriptor.clone()));
        assert_eq!(id, Some(3));
        assert!(index.contains("ghost"));
        assert_eq!(
            names(&index.search_by_key("0671234567", KeyKind::Phone)),
            vec!["ghost"]
        );
        assert_eq!(index.add_with_descriptor("ghost", Some(descriptor)), None);
    }

    #[test]
    fn remove_absent_is_noop() {
        let (_tmp, mut index) = abc();
        assert!(index.remove("nope").is_none());
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn ids_are_never_reused() {
        let (_tmp, mut index) = abc();
        index.remove("C");
        assert_eq!(index.add("C"), Some(3));
        index.remove("C");
        assert_eq!(index.add("E"), Some(4));
        assert!(index.get(2).is_none());
    }

    #[test]
    fn apply_events() {
        let (_tmp, mut index) = abc();
        assert!(index.apply(&ChangeEvent::new_folder("D")));
        assert!(!index.apply(&ChangeEvent::new_folder("D")));
        assert!(index.apply(&ChangeEvent::deleted_folder("A")));
        assert!(!index.apply(&ChangeEvent::deleted_folder("A")));
        let left: Vec<_> = index.folders().map(|r| r.name.as_str()).collect();
        assert_eq!(left, vec!["B", "C", "D"]);
    }

    #[test]
    fn partial_search_uses_slugs() {
        let tmp = tempfile::tempdir().unwrap();
        make_folder(tmp.path(), "Ivanov_Dom5", None);
        make_folder(tmp.path(), "Petrov Kvartira", None);
        make_folder(tmp.path(), "ivanova-dacha", None);
        let index = FolderIndex::build(tmp.path(), false).unwrap();

        assert_eq!(
            names(&index.search_partial("IVANOV")),
            vec!["Ivanov_Dom5", "ivanova-dacha"]
        );
        assert_eq!(
            names(&index.search_partial("nov dom-5")),
            vec!["Ivanov_Dom5"]
        );
        assert_eq!(names(&index.search_partial("ov_Do")), vec!["Ivanov_Dom5"]);
        assert!(index.search_partial("sidorov").is_empty());
    }

    #[test]
    fn partial_results_follow_id_order() {
        let (tmp, mut index) = abc();
        make_folder(tmp.path(), "AA", None);
        index.add("AA");
        let hits = index.search_partial("a");
        assert_eq!(names(&hits), vec!["A", "AA"]);
        assert_eq!(hits[1].id, 3);
    }

    #[test]
    fn key_search_preserves_discovery_order() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        make_folder(root, "a-first", Some("1;Street 1;099-123-45-67;X;0"));
        make_folder(root, "b-other", Some("2;Street 2;0501112233;Y;0"));
        make_folder(root, "c-second", Some("3;Street 3;(099) 1234567;Z;0"));
        make_folder(tmp.path(), "d-none", None);
        let index = FolderIndex::build(tmp.path(), false).unwrap();

        let hits = index.search_by_key("0991234567", KeyKind::Phone);
        assert_eq!(names(&hits), vec!["a-first", "c-second"]);
        assert_eq!(hits[0].id, 0);
        assert_eq!(hits[1].id, 2);

        assert!(index.search_by_key("0000000000", KeyKind::Phone).is_empty());
        assert_eq!(
            names(&index.search_by_key("street 2", KeyKind::Address)),
            vec!["b-other"]
        );
        assert_eq!(
            names(&index.search_by_key("3", KeyKind::Contract)),
            vec!["c-second"]
        );
    }

    #[test]
    fn key_search_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        make_folder(tmp.path(), "f", Some("Д-7;Addr;0991234567;N;1"));
        let index = FolderIndex::build(tmp.path(), false).unwrap();

        assert_eq!(index.search_by_key_name("0991234567", "phone").len(), 1);
        assert_eq!(index.search_by_key_name("д7", "by_contract").len(), 1);
        assert!(index.search_by_key_name("0991234567", "by_email").is_empty());
        assert!(index.search_by_key_name("0991234567", "").is_empty());
    }

    #[test]
    fn added_folder_is_key_indexed() {
        let (tmp, mut index) = abc();
        make_folder(tmp.path(), "New", Some("K-1;Main;0671234567;Client;5"));
        let id = index.add("New").unwrap();

        let hits = index.search_by_key("067 123 45 67", KeyKind::Phone);
        assert_eq!(hits, vec![FolderRef { id, name: "New".into() }]);
    }

    #[test]
    fn removal_leaves_secondary_buckets_stale() {
        let tmp = tempfile::tempdir().unwrap();
        make_folder(tmp.path(), "gone", Some("K-9;Main;0991234567;C;1"));
        let mut index = FolderIndex::build(tmp.path(), false).unwrap();

        index.remove("gone");
        assert!(index.get(0).is_none());
        let hits = index.search_by_key("0991234567", KeyKind::Phone);
        assert_eq!(names(&hits), vec!["gone"]);
        assert!(index.get_files(0).is_none());
    }

    #[test]
    fn unterminated_quote_is_still_indexed() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("open-quote");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join(DESCRIPTOR_FILE), "Телефон\n\"0991234567")
            .unwrap();
        let index = FolderIndex::build(tmp.path(), false).unwrap();

        let hits = index.search_by_key("0991234567", KeyKind::Phone);
        assert_eq!(names(&hits), vec!["open-quote"]);
        assert!(index.read_descriptor(0).is_some());
    }

    #[test]
    fn non_utf8_descriptor_is_not_indexed() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("binary");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join(DESCRIPTOR_FILE), [0xff, 0xfe, b';', b'\n'])
            .unwrap();
        let index = FolderIndex::build(tmp.path(), false).unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.secondary(KeyKind::Phone).key_count(), 0);
        assert!(index.read_descriptor(0).is_none());
    }

    #[test]
    fn cyrillic_names_match_latin_queries() {
        let tmp = tempfile::tempdir().unwrap();
        let values = "Д-15;Main;0991234567;I;1";
        make_folder(tmp.path(), "Иванов_Дом5", Some(values));
        make_folder(tmp.path(), "Petrov", None);
        let index = FolderIndex::build(tmp.path(), false).unwrap();

        assert_eq!(names(&index.search_partial("ivanov")), vec!["Иванов_Дом5"]);
        assert_eq!(names(&index.search_partial("Иванов")), vec!["Иванов_Дом5"]);
        assert_eq!(names(&index.search_partial("петров")), vec!["Petrov"]);
        assert_eq!(
            names(&index.search_by_key("d-15", KeyKind::Contract)),
            vec!["Иванов_Дом5"]
        );
    }

    #[test]
    fn get_files_variants() {
        let tmp = tempfile::tempdir().unwrap();
        make_folder(tmp.path(), "empty", None);
        make_folder(tmp.path(), "full", Some("1;a;b;c;d"));
        std::fs::write(tmp.path().join("full/photo.HEIC"), "x").unwrap();
        std::fs::write(tmp.path().join("full/scan.pdf"), "x").unwrap();
        let index = FolderIndex::build(tmp.path(), false).unwrap();

        assert!(index.get_files(0).is_none());
        assert!(index.get_files(99).is_none());

        let files = index.get_files(1).unwrap();
        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|f| f.starts_with(tmp.path().join("full"))));

        let images = index.get_images(1).unwrap();
        assert_eq!(images, vec![tmp.path().join("full/photo.HEIC")]);
        assert!(index.get_images(0).is_none());
    }

    #[test]
    fn get_files_on_deleted_folder() {
        let (tmp, index) = abc();
        std::fs::write(tmp.path().join("A/x.jpg"), "x").unwrap();
        assert!(index.get_files(0).is_some());

        std::fs::remove_dir_all(tmp.path().join("A")).unwrap();
        assert!(index.get_files(0).is_none());
        assert!(index.read_descriptor(0).is_none());
    }

    #[test]
    fn read_descriptor_by_id() {
        let tmp = tempfile::tempdir().unwrap();
        make_folder(tmp.path(), "f", Some("K-1;Main;0991234567;Client;5"));
        let index = FolderIndex::build(tmp.path(), false).unwrap();

        let d = index.read_descriptor(0).unwrap();
        assert_eq!(d.client_name(), Some("Client"));
        assert!(index.read_descriptor(1).is_none());
    }

    #[test]
    fn key_kind_names() {
        for kind in KeyKind::ALL {
            assert_eq!(KeyKind::from_name(kind.as_str()), Some(kind));
            assert_eq!(KeyKind::from_name(&format!("by_{kind}")), Some(kind));
        }
        assert_eq!(KeyKind::from_name("PHONE"), Some(KeyKind::Phone));
        assert_eq!(KeyKind::from_name("email"), None);
    }
}
