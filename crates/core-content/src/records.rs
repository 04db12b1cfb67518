use crate::ContentError;
use ahash::AHashMap;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::info;

pub type RecordId = u32;

/// Id of the top of the hierarchy.
pub const ROOT_ID: RecordId = 0;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub children: Vec<RecordId>,
    /// Filled in when the dataset is indexed; the lowest-id parent wins.
    #[serde(skip)]
    pub parent: Option<RecordId>,
}

impl Record {
    pub fn new(id: RecordId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body: String::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = RecordId>) -> Self {
        self.children = children.into_iter().collect();
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Lookup contract used by screens.
pub trait ContentProvider {
    fn lookup(&self, id: RecordId) -> Result<Rc<Record>, ContentError>;

    /// Records for `ids` in the same order. Fails on the first unknown id.
    fn lookup_batch(&self, ids: &[RecordId]) -> Result<Vec<Rc<Record>>, ContentError> {
        ids.iter().map(|id| self.lookup(*id)).collect()
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryContent {
    records: AHashMap<RecordId, Rc<Record>>,
}

impl MemoryContent {
    /// Index `records`, checking ids are unique, children exist and the root is present.
    pub fn new(records: impl IntoIterator<Item = Record>) -> Result<Self, ContentError> {
        let mut by_id: AHashMap<RecordId, Record> = AHashMap::new();
        for record in records {
            let id = record.id;
            if by_id.insert(id, record).is_some() {
                return Err(ContentError::DuplicateId(id));
            }
        }
        if !by_id.contains_key(&ROOT_ID) {
            return Err(ContentError::MissingRoot);
        }
        let mut parents: Vec<(RecordId, RecordId)> = Vec::new();
        for record in by_id.values() {
            for child in &record.children {
                if !by_id.contains_key(child) {
                    return Err(ContentError::DanglingChild {
                        parent: record.id,
                        child: *child,
                    });
                }
                parents.push((*child, record.id));
            }
        }
        // Lowest parent id first, independent of map order.
        parents.sort_unstable();
        for (child, parent) in parents {
            if let Some(rec) = by_id.get_mut(&child)
                && rec.parent.is_none()
                && child != ROOT_ID
            {
                rec.parent = Some(parent);
            }
        }
        Ok(Self {
            records: by_id.into_iter().map(|(id, r)| (id, Rc::new(r))).collect(),
        })
    }

    /// Small built-in hierarchy for running without a dataset file.
    pub fn sample() -> Self {
        let records = vec![
            Record::new(ROOT_ID, "Pocketview").with_children([1, 2, 3]),
            Record::new(1, "Trails").with_children([10, 11, 12]),
            Record::new(2, "Landmarks").with_children([20, 21]),
            Record::new(3, "About").with_body(
                "Browse with up and down, open with confirm, go back with cancel. Left and right move between siblings on a detail page.",
            ),
            Record::new(10, "Ridge Loop").with_body("7.4 km loop along the north ridge. Steep first kilometre, then mostly level with open views."),
            Record::new(11, "Lake Path").with_body("3.1 km each way on a gravel shoreline path. Suitable for all seasons."),
            Record::new(12, "Pine Climb").with_body("5.0 km climb through old pine forest to the fire tower. Allow two hours."),
            Record::new(20, "Fire Tower").with_body("Built 1931. Open to visitors in summer; the top deck overlooks three valleys."),
            Record::new(21, "Old Mill").with_body("Stone mill on the east creek, restored as a small museum."),
        ];
        match Self::new(records) {
            Ok(content) => content,
            Err(_) => Self::default(),
        }
    }

    pub fn parent_of(&self, id: RecordId) -> Option<RecordId> {
        self.records.get(&id).and_then(|r| r.parent)
    }
}

impl ContentProvider for MemoryContent {
    fn lookup(&self, id: RecordId) -> Result<Rc<Record>, ContentError> {
        self.records
            .get(&id)
            .cloned()
            .ok_or(ContentError::NotFound(id))
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[derive(Debug, Deserialize)]
struct DatasetFile {
    #[serde(default, rename = "record")]
    records: Vec<Record>,
}

/// Dataset read from a TOML file of `[[record]]` tables.
#[derive(Debug, Clone)]
pub struct TomlContent {
    path: PathBuf,
    inner: MemoryContent,
}

impl TomlContent {
    pub fn load(path: &Path) -> Result<Self, ContentError> {
        let text = fs::read_to_string(path).map_err(|source| ContentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: DatasetFile = toml::from_str(&text).map_err(|source| ContentError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let inner = MemoryContent::new(file.records)?;
        info!(target: "content", path = %path.display(), records = inner.len(), "dataset_loaded");
        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_memory(self) -> MemoryContent {
        self.inner
    }
}

impl ContentProvider for TomlContent {
    fn lookup(&self, id: RecordId) -> Result<Rc<Record>, ContentError> {
        self.inner.lookup(id)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}
