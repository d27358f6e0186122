//! Workspace scanner: the owner of the path → [`IndexedBlock`] map.
//!
//! The scanner walks the workspace, embeds every indexable file, and mirrors
//! each block into the configured [`VectorIndex`]. After the initial
//! [`scan`](WorkspaceScanner::scan) it is mutated only through
//! [`refresh_path`](WorkspaceScanner::refresh_path) and
//! [`remove_path`](WorkspaceScanner::remove_path), which the watcher calls
//! from a single task.
//!
//! # Consistency
//!
//! Reads and embedding happen outside the lock; each mutation takes the write
//! lock once to replace or remove entries. Searches clone `Arc` blocks under
//! a read lock, so every returned block is a complete snapshot of one file,
//! while different files in one result may come from different moments.

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::IndexConfig;
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::EngineError;
use crate::filter::PathFilter;
use crate::ignore_spec::IgnoreSpec;
use crate::models::IndexedBlock;
use crate::store::{RecordPayload, VectorIndex};

/// Counters reported by scans and incremental refreshes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    /// Files embedded and stored (new or changed content).
    pub indexed: usize,
    /// Files whose content matched the stored block.
    pub unchanged: usize,
    /// Paths filtered out or unreadable.
    pub skipped: usize,
    /// Entries dropped from the index.
    pub removed: usize,
}

impl ScanStats {
    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Indexed => self.indexed += 1,
            FileOutcome::Unchanged => self.unchanged += 1,
            FileOutcome::Skipped => self.skipped += 1,
        }
    }

    fn single_skip() -> Self {
        Self {
            skipped: 1,
            ..Self::default()
        }
    }

    fn removals(count: usize) -> Self {
        Self {
            removed: count,
            ..Self::default()
        }
    }

    /// Total number of index mutations.
    pub fn changes(&self) -> usize {
        self.indexed + self.removed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Indexed,
    Unchanged,
    Skipped,
}

/// A block paired with its similarity to a query.
#[derive(Debug, Clone)]
pub struct ScoredBlock {
    pub block: Arc<IndexedBlock>,
    pub score: f32,
}

struct Entry {
    /// Position of first insertion; kept across content replacements.
    seq: u64,
    block: Arc<IndexedBlock>,
}

#[derive(Default)]
struct WorkspaceIndex {
    entries: HashMap<PathBuf, Entry>,
    next_seq: u64,
}

impl WorkspaceIndex {
    fn upsert(&mut self, block: Arc<IndexedBlock>) {
        match self.entries.get_mut(&block.path) {
            Some(entry) => entry.block = block,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.insert(block.path.clone(), Entry { seq, block });
            }
        }
    }

    /// Remove `path` and every entry beneath it.
    fn remove_under(&mut self, path: &Path) -> Vec<PathBuf> {
        if self.entries.remove(path).is_some() {
            return vec![path.to_path_buf()];
        }
        let doomed: Vec<PathBuf> = self
            .entries
            .keys()
            .filter(|key| key.starts_with(path))
            .cloned()
            .collect();
        for key in &doomed {
            self.entries.remove(key);
        }
        doomed
    }
}

pub struct WorkspaceScanner {
    root: PathBuf,
    filter: Arc<PathFilter>,
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorIndex>,
    index: RwLock<WorkspaceIndex>,
}

impl WorkspaceScanner {
    /// Create a scanner over `root`, loading `<root>/.gitignore` once.
    ///
    /// `root` should already be canonical so that watcher event paths and
    /// index keys agree.
    pub fn new(
        root: &Path,
        config: &IndexConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        let ignore = IgnoreSpec::load(root);
        let filter = PathFilter::new(root, config, ignore)?;
        Ok(Self {
            root: root.to_path_buf(),
            filter: Arc::new(filter),
            embedder,
            vectors,
            index: RwLock::new(WorkspaceIndex::default()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vector_index_name(&self) -> &str {
        self.vectors.name()
    }

    /// Walk the whole root and bring the index in line with it.
    ///
    /// Entries whose files were not found by the walk are dropped, so
    /// repeated scans of an unchanged tree yield the same keys and content.
    pub async fn scan(&self) -> ScanStats {
        let files = self.walk(self.root.clone()).await;

        let mut stats = ScanStats::default();
        for path in &files {
            stats.record(self.index_file(path).await);
        }

        let found: HashSet<&PathBuf> = files.iter().collect();
        let stale: Vec<PathBuf> = {
            let index = self.index.read().await;
            index
                .entries
                .keys()
                .filter(|key| !found.contains(key))
                .cloned()
                .collect()
        };
        for path in stale {
            stats.removed += self.remove_path(&path).await;
        }

        info!(
            root = %self.root.display(),
            indexed = stats.indexed,
            unchanged = stats.unchanged,
            skipped = stats.skipped,
            removed = stats.removed,
            "Workspace scan complete"
        );
        stats
    }

    async fn walk(&self, dir: PathBuf) -> Vec<PathBuf> {
        let filter = self.filter.clone();
        match tokio::task::spawn_blocking(move || filter.walk(&dir)).await {
            Ok(files) => files,
            Err(err) => {
                warn!(error = %err, "Workspace walk aborted");
                Vec::new()
            }
        }
    }

    /// Bring one path in line with the filesystem.
    ///
    /// Files are (re)indexed when their content changed, directories have
    /// their subtree indexed, vanished paths are removed, and symlinks or
    /// anything reached through one are never indexed.
    pub async fn refresh_path(&self, path: &Path) -> ScanStats {
        if !path.starts_with(&self.root) || path == self.root {
            return ScanStats::single_skip();
        }

        if self.filter.crosses_symlink(path) {
            debug!(path = %path.display(), "Ignoring symlinked path");
            let removed = self.remove_path(path).await;
            return ScanStats {
                skipped: 1,
                removed,
                ..ScanStats::default()
            };
        }

        let metadata = match tokio::fs::symlink_metadata(path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return ScanStats::removals(self.remove_path(path).await);
            }
            Err(err) => {
                debug!(path = %path.display(), error = %err, "Cannot stat path");
                return ScanStats::single_skip();
            }
        };

        if metadata.is_dir() {
            if !self.filter.accepts_dir_path(path) {
                return ScanStats::single_skip();
            }
            let mut stats = ScanStats::default();
            for file in self.walk(path.to_path_buf()).await {
                stats.record(self.index_file(&file).await);
            }
            return stats;
        }

        if !metadata.is_file() || !self.filter.accepts_file_path(path) {
            return ScanStats::single_skip();
        }

        let mut stats = ScanStats::default();
        stats.record(self.index_file(path).await);
        stats
    }

    /// Drop `path` (and, for a directory, everything under it) from the
    /// index and the vector index. Returns the number of entries removed.
    pub async fn remove_path(&self, path: &Path) -> usize {
        let removed = self.index.write().await.remove_under(path);
        for key in &removed {
            if let Err(err) = self.vectors.delete(&record_id(key)).await {
                warn!(path = %key.display(), error = %err, "Remote delete failed, continuing");
            }
            debug!(path = %key.display(), "Removed from index");
        }
        removed.len()
    }

    async fn index_file(&self, path: &Path) -> FileOutcome {
        let content = match read_text(path).await {
            Ok(content) => content,
            Err(err) => {
                debug!(error = %err, "Skipping unreadable file");
                return FileOutcome::Skipped;
            }
        };

        if let Some(existing) = self.get(path).await {
            if existing.content == content {
                return FileOutcome::Unchanged;
            }
        }

        let embedding = self.embedder.embed(&content);
        let block = Arc::new(IndexedBlock {
            path: path.to_path_buf(),
            content,
            embedding,
        });
        self.index.write().await.upsert(block.clone());

        let id = record_id(path);
        let payload = RecordPayload { path: id.clone() };
        if let Err(err) = self.vectors.upsert(&id, &block.embedding, &payload).await {
            warn!(path = %path.display(), error = %err, "Remote upsert failed, continuing");
        }
        debug!(path = %path.display(), "Indexed");
        FileOutcome::Indexed
    }

    pub async fn get(&self, path: &Path) -> Option<Arc<IndexedBlock>> {
        self.index
            .read()
            .await
            .entries
            .get(path)
            .map(|entry| entry.block.clone())
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Indexed paths, sorted.
    pub async fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.index.read().await.entries.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// The `top_k` blocks most similar to `query`, best first.
    ///
    /// A vector index that answers searches itself is asked for `top_k`
    /// ids, which are resolved against the local map (hits for files no
    /// longer indexed are dropped). Otherwise every block is ranked by
    /// cosine similarity, ties broken by insertion order. `path_prefix`
    /// restricts results to files under that prefix.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        path_prefix: Option<&Path>,
    ) -> Result<Vec<ScoredBlock>, EngineError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed(query);
        let under_prefix = |path: &Path| path_prefix.map_or(true, |prefix| path.starts_with(prefix));

        if let Some(hits) = self.vectors.search(&query_vec, top_k).await? {
            let index = self.index.read().await;
            return Ok(hits
                .into_iter()
                .filter_map(|hit| {
                    index.entries.get(Path::new(&hit.id)).map(|entry| ScoredBlock {
                        block: entry.block.clone(),
                        score: hit.score,
                    })
                })
                .filter(|scored| under_prefix(scored.block.path.as_path()))
                .collect());
        }

        let mut ranked: Vec<(u64, ScoredBlock)> = {
            let index = self.index.read().await;
            index
                .entries
                .values()
                .filter(|entry| under_prefix(entry.block.path.as_path()))
                .map(|entry| {
                    let score = cosine_similarity(&query_vec, &entry.block.embedding);
                    (
                        entry.seq,
                        ScoredBlock {
                            block: entry.block.clone(),
                            score,
                        },
                    )
                })
                .collect()
        };

        ranked.sort_by(|(seq_a, a), (seq_b, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(seq_a.cmp(seq_b))
        });
        ranked.truncate(top_k);
        Ok(ranked.into_iter().map(|(_, scored)| scored).collect())
    }
}

/// Identifier used for a file in the vector index: its path as a string.
pub fn record_id(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Read a file as text, replacing undecodable bytes.
async fn read_text(path: &Path) -> Result<String, EngineError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| EngineError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

impl std::fmt::Debug for WorkspaceScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceScanner")
            .field("root", &self.root)
            .field("vectors", &self.vectors.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::store::{LocalIndex, VectorHit};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn workspace() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        (tmp, root)
    }

    fn local_scanner(root: &Path) -> WorkspaceScanner {
        WorkspaceScanner::new(
            root,
            &IndexConfig::default(),
            Arc::new(HashEmbedder::default()),
            Arc::new(LocalIndex::new()),
        )
        .unwrap()
    }

    /// Records every call and answers searches from what was upserted.
    #[derive(Default)]
    struct RecordingIndex {
        records: Mutex<HashMap<String, Vec<f32>>>,
        deletes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VectorIndex for RecordingIndex {
        fn name(&self) -> &str {
            "recording"
        }

        async fn upsert(
            &self,
            id: &str,
            vector: &[f32],
            payload: &RecordPayload,
        ) -> Result<(), EngineError> {
            assert_eq!(id, payload.path);
            self.records
                .lock()
                .unwrap()
                .insert(id.to_string(), vector.to_vec());
            Ok(())
        }

        async fn delete(&self, id: &str) -> Result<(), EngineError> {
            self.records.lock().unwrap().remove(id);
            self.deletes.lock().unwrap().push(id.to_string());
            Ok(())
        }

        async fn search(
            &self,
            vector: &[f32],
            limit: usize,
        ) -> Result<Option<Vec<VectorHit>>, EngineError> {
            let records = self.records.lock().unwrap();
            let mut hits: Vec<VectorHit> = records
                .iter()
                .map(|(id, v)| VectorHit {
                    id: id.clone(),
                    score: cosine_similarity(vector, v),
                })
                .collect();
            hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
            hits.truncate(limit);
            Ok(Some(hits))
        }
    }

    /// Fails every operation, like an unreachable remote service.
    struct FailingIndex;

    #[async_trait]
    impl VectorIndex for FailingIndex {
        fn name(&self) -> &str {
            "failing"
        }
        async fn upsert(&self, _: &str, _: &[f32], _: &RecordPayload) -> Result<(), EngineError> {
            Err(EngineError::RemoteStoreOperation("down".to_string()))
        }
        async fn delete(&self, _: &str) -> Result<(), EngineError> {
            Err(EngineError::RemoteStoreOperation("down".to_string()))
        }
        async fn search(&self, _: &[f32], _: usize) -> Result<Option<Vec<VectorHit>>, EngineError> {
            Err(EngineError::RemoteStoreOperation("down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_scan_respects_gitignore() {
        let (_tmp, root) = workspace();
        std::fs::write(root.join(".gitignore"), "ignored.py\n").unwrap();
        std::fs::write(root.join("good.py"), "print(\"ok\")").unwrap();
        std::fs::write(root.join("ignored.py"), "print(\"no\")").unwrap();

        let scanner = local_scanner(&root);
        scanner.scan().await;

        assert_eq!(scanner.paths().await, vec![root.join("good.py")]);
    }

    #[tokio::test]
    async fn test_scan_filters_extensions() {
        let (_tmp, root) = workspace();
        std::fs::write(root.join("main.rs"), "fn main() {}").unwrap();
        std::fs::write(root.join("notes.txt"), "not code").unwrap();

        let scanner = local_scanner(&root);
        let stats = scanner.scan().await;

        assert_eq!(stats.indexed, 1);
        assert_eq!(scanner.paths().await, vec![root.join("main.rs")]);
    }

    #[tokio::test]
    async fn test_scan_is_idempotent() {
        let (_tmp, root) = workspace();
        std::fs::create_dir_all(root.join("pkg")).unwrap();
        std::fs::write(root.join("a.py"), "a = 1").unwrap();
        std::fs::write(root.join("pkg/b.py"), "b = 2").unwrap();

        let scanner = local_scanner(&root);
        let first = scanner.scan().await;
        let before = scanner.paths().await;
        let a_before = scanner.get(&root.join("a.py")).await.unwrap();

        let second = scanner.scan().await;
        assert_eq!(first.indexed, 2);
        assert_eq!(second.indexed, 0);
        assert_eq!(second.unchanged, 2);
        assert_eq!(scanner.paths().await, before);
        assert_eq!(*scanner.get(&root.join("a.py")).await.unwrap(), *a_before);
    }

    #[tokio::test]
    async fn test_rescan_drops_deleted_files() {
        let (_tmp, root) = workspace();
        std::fs::write(root.join("a.py"), "a").unwrap();
        std::fs::write(root.join("b.py"), "b").unwrap();
        let scanner = local_scanner(&root);
        scanner.scan().await;

        std::fs::remove_file(root.join("b.py")).unwrap();
        let stats = scanner.scan().await;

        assert_eq!(stats.removed, 1);
        assert_eq!(scanner.paths().await, vec![root.join("a.py")]);
    }

    #[tokio::test]
    async fn test_undecodable_bytes_are_tolerated() {
        let (_tmp, root) = workspace();
        std::fs::write(root.join("bin.py"), [0xff, 0xfe, b'x', b'=', b'1']).unwrap();

        let scanner = local_scanner(&root);
        scanner.scan().await;

        let block = scanner.get(&root.join("bin.py")).await.unwrap();
        assert!(block.content.ends_with("x=1"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scan_skips_symlinks() {
        let (_tmp, root) = workspace();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("far.py"), "far").unwrap();
        std::fs::write(root.join("real.py"), "real").unwrap();
        std::os::unix::fs::symlink(root.join("real.py"), root.join("link.py")).unwrap();
        std::os::unix::fs::symlink(outside.path(), root.join("linked_dir")).unwrap();

        let scanner = local_scanner(&root);
        scanner.scan().await;
        assert_eq!(scanner.paths().await, vec![root.join("real.py")]);

        let stats = scanner.refresh_path(&root.join("linked_dir/far.py")).await;
        assert_eq!(stats.indexed, 0);
        assert!(scanner.get(&root.join("linked_dir/far.py")).await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_updates_content_and_embedding() {
        let (_tmp, root) = workspace();
        let file = root.join("file.py");
        std::fs::write(&file, "a=1").unwrap();
        let scanner = local_scanner(&root);
        scanner.scan().await;

        std::fs::write(&file, "a=2").unwrap();
        let stats = scanner.refresh_path(&file).await;

        assert_eq!(stats.indexed, 1);
        let block = scanner.get(&file).await.unwrap();
        assert_eq!(block.content, "a=2");
        assert_eq!(block.embedding, HashEmbedder::default().embed("a=2"));
    }

    #[tokio::test]
    async fn test_refresh_with_same_content_is_noop() {
        let (_tmp, root) = workspace();
        let file = root.join("file.py");
        std::fs::write(&file, "a=1").unwrap();
        let scanner = local_scanner(&root);
        scanner.scan().await;

        std::fs::write(&file, "a=1").unwrap();
        let stats = scanner.refresh_path(&file).await;
        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.indexed, 0);
    }

    #[tokio::test]
    async fn test_refresh_vanished_file_removes_it() {
        let (_tmp, root) = workspace();
        let file = root.join("gone.py");
        std::fs::write(&file, "x").unwrap();
        let scanner = local_scanner(&root);
        scanner.scan().await;

        std::fs::remove_file(&file).unwrap();
        let stats = scanner.refresh_path(&file).await;
        assert_eq!(stats.removed, 1);
        assert!(scanner.is_empty().await);
    }

    #[tokio::test]
    async fn test_refresh_new_directory_indexes_subtree() {
        let (_tmp, root) = workspace();
        let scanner = local_scanner(&root);
        scanner.scan().await;

        std::fs::create_dir_all(root.join("pkg/inner")).unwrap();
        std::fs::write(root.join("pkg/a.py"), "a").unwrap();
        std::fs::write(root.join("pkg/inner/b.py"), "b").unwrap();
        let stats = scanner.refresh_path(&root.join("pkg")).await;

        assert_eq!(stats.indexed, 2);
        assert_eq!(scanner.len().await, 2);
    }

    #[tokio::test]
    async fn test_refresh_excluded_directory_is_skipped() {
        let (_tmp, root) = workspace();
        let scanner = local_scanner(&root);
        scanner.scan().await;

        std::fs::create_dir_all(root.join("target/debug/deps")).unwrap();
        std::fs::write(root.join("target/debug/deps/gen.rs"), "fn gen() {}").unwrap();
        let stats = scanner.refresh_path(&root.join("target/debug/deps")).await;

        assert_eq!(stats, ScanStats::single_skip());
        assert!(scanner.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_directory_removes_children() {
        let (_tmp, root) = workspace();
        std::fs::create_dir_all(root.join("pkg")).unwrap();
        std::fs::write(root.join("pkg/a.py"), "a").unwrap();
        std::fs::write(root.join("pkg/b.py"), "b").unwrap();
        std::fs::write(root.join("pkgfile.py"), "c").unwrap();
        let scanner = local_scanner(&root);
        scanner.scan().await;

        assert_eq!(scanner.remove_path(&root.join("pkg")).await, 2);
        assert_eq!(scanner.paths().await, vec![root.join("pkgfile.py")]);
        assert_eq!(scanner.remove_path(&root.join("pkg")).await, 0);
    }

    #[tokio::test]
    async fn test_search_ranks_identical_text_first() {
        let (_tmp, root) = workspace();
        std::fs::write(root.join("match.py"), "def foo(): pass").unwrap();
        std::fs::write(root.join("other.py"), "class Bar:\n    x = 1\n").unwrap();
        std::fs::write(root.join("third.py"), "import os").unwrap();
        let scanner = local_scanner(&root);
        scanner.scan().await;

        let results = scanner.search("def foo(): pass", 5, None).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].block.path, root.join("match.py"));
        assert!((results[0].score - 1.0).abs() < 1e-3);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_search_respects_top_k() {
        let (_tmp, root) = workspace();
        for i in 0..6 {
            std::fs::write(root.join(format!("f{i}.py")), format!("x = {i}")).unwrap();
        }
        let scanner = local_scanner(&root);
        scanner.scan().await;

        assert_eq!(scanner.search("x", 3, None).await.unwrap().len(), 3);
        assert!(scanner.search("x", 0, None).await.unwrap().is_empty());
        assert_eq!(scanner.search("x", 50, None).await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_search_ties_follow_insertion_order() {
        let (_tmp, root) = workspace();
        for name in ["a.py", "b.py", "c.py"] {
            std::fs::write(root.join(name), "same").unwrap();
        }
        let scanner = local_scanner(&root);
        scanner.scan().await;

        let results = scanner.search("query", 3, None).await.unwrap();
        let names: Vec<_> = results
            .iter()
            .map(|r| r.block.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.py", "b.py", "c.py"]);
    }

    #[tokio::test]
    async fn test_search_path_prefix() {
        let (_tmp, root) = workspace();
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::write(root.join("sub/one.py"), "def bar(): pass").unwrap();
        std::fs::write(root.join("two.py"), "def bar(): pass").unwrap();
        let scanner = local_scanner(&root);
        scanner.scan().await;

        let results = scanner
            .search("bar", 5, Some(&root.join("sub")))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].block.path, root.join("sub/one.py"));
    }

    #[tokio::test]
    async fn test_delegating_index_mirrors_and_answers() {
        let (_tmp, root) = workspace();
        std::fs::write(root.join("keep.py"), "keep = True").unwrap();
        std::fs::write(root.join("drop.py"), "drop = True").unwrap();
        let vectors = Arc::new(RecordingIndex::default());
        let scanner = WorkspaceScanner::new(
            &root,
            &IndexConfig::default(),
            Arc::new(HashEmbedder::default()),
            vectors.clone(),
        )
        .unwrap();
        scanner.scan().await;
        assert_eq!(vectors.records.lock().unwrap().len(), 2);

        scanner.remove_path(&root.join("drop.py")).await;
        assert_eq!(
            *vectors.deletes.lock().unwrap(),
            vec![record_id(&root.join("drop.py"))]
        );

        let results = scanner.search("drop = True", 5, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].block.path, root.join("keep.py"));
    }

    #[tokio::test]
    async fn test_remote_write_failures_are_not_fatal() {
        let (_tmp, root) = workspace();
        std::fs::write(root.join("a.py"), "a").unwrap();
        let scanner = WorkspaceScanner::new(
            &root,
            &IndexConfig::default(),
            Arc::new(HashEmbedder::default()),
            Arc::new(FailingIndex),
        )
        .unwrap();

        let stats = scanner.scan().await;
        assert_eq!(stats.indexed, 1);
        assert_eq!(scanner.remove_path(&root.join("a.py")).await, 1);
        assert!(scanner.search("a", 5, None).await.is_err());
    }
}
