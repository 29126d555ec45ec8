//! The shared media tree.
//!
//! One [`DirectoryNode`] per directory, each guarded by its own
//! `std::sync::RwLock` so pipeline workers only contend when they touch the
//! same directory. Locks are taken one node at a time (parent before child)
//! and never held across await points; all async coordination lives in the
//! pipeline, not here.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rand::Rng;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::{ErrorKind, Result};
use crate::item::{parent_dir, ItemKind, ScanId, ScanItem};
use crate::model::{
    DirSummary, FileEntry, ImageEntry, Listing, PickedImage, Size, TagInfo, VideoEntry,
};

/// One directory of the media tree.
///
/// Name and path are fixed at creation; everything else sits behind the
/// per-node lock. Children are kept in a [`BTreeMap`] so every traversal
/// (flatten, listings, sweeps) sees them in a stable name order.
pub struct DirectoryNode {
    name: String,
    path: String,
    state: RwLock<NodeState>,
}

#[derive(Default)]
struct NodeState {
    marker: ScanId,
    images: Vec<ImageEntry>,
    videos: Vec<VideoEntry>,
    others: Vec<FileEntry>,
    children: BTreeMap<String, Arc<DirectoryNode>>,
    cover_index: usize,
}

/// First touch of a generation claims the directory: clear the previous
/// scan's lists and advance the marker, all inside the caller's write guard.
/// The strict `<` leaves pinned nodes alone.
fn claim(state: &mut NodeState, scan: ScanId) {
    if state.marker < scan {
        state.marker = scan;
        state.images.clear();
        state.videos.clear();
        state.others.clear();
        state.cover_index = 0;
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_owned()
    } else {
        format!("{base}/{name}")
    }
}

impl DirectoryNode {
    pub fn new_root() -> Arc<Self> {
        Arc::new(Self::named("", ""))
    }

    fn named(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            state: RwLock::new(NodeState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn marker(&self) -> ScanId {
        self.read_state().marker
    }

    // Poisoning only means some worker panicked mid-mutation; the lists are
    // still structurally sound, so later scans continue instead of wedging.
    fn read_state(&self) -> RwLockReadGuard<'_, NodeState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, NodeState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Find or create the node at `path`, creating missing segments.
    ///
    /// Paths are slash-separated and relative to this node; `""` and `"/"`
    /// address the node itself. Holds one node's lock at a time.
    pub fn locate(self: &Arc<Self>, path: &str) -> Arc<DirectoryNode> {
        let mut current = Arc::clone(self);
        for part in path.split('/').filter(|p| !p.is_empty()) {
            let next = {
                let mut state = current.write_state();
                match state.children.get(part) {
                    Some(child) => Arc::clone(child),
                    None => {
                        let child = Arc::new(DirectoryNode::named(
                            part,
                            join_path(&current.path, part),
                        ));
                        state.children.insert(part.to_owned(), Arc::clone(&child));
                        child
                    }
                }
            };
            current = next;
        }
        current
    }

    /// Like [`locate`](Self::locate) but read-only: `None` when any segment
    /// is missing.
    pub fn find(self: &Arc<Self>, path: &str) -> Option<Arc<DirectoryNode>> {
        let mut current = Arc::clone(self);
        for part in path.split('/').filter(|p| !p.is_empty()) {
            let next = current.read_state().children.get(part).cloned()?;
            current = next;
        }
        Some(current)
    }

    /// Fold one pipeline item into the tree.
    ///
    /// The first item of a scan generation to reach a directory claims it
    /// (see [`claim`]); every later item of the same generation appends
    /// without clearing. Arrival order across pipeline workers therefore
    /// does not matter.
    pub fn apply(self: &Arc<Self>, item: &ScanItem, scan: ScanId) {
        match item.kind {
            ItemKind::Directory => {
                let path = if item.path == "." { "" } else { item.path.as_str() };
                let node = self.locate(path);
                let mut state = node.write_state();
                claim(&mut state, scan);
            }
            ItemKind::File => {
                let node = self.locate(parent_dir(&item.path));
                let mut state = node.write_state();
                claim(&mut state, scan);
                state.others.push(FileEntry {
                    name: item.name.clone(),
                    path: item.path.clone(),
                });
            }
            ItemKind::Image => {
                let entry = ImageEntry {
                    name: item.name.clone(),
                    path: item.path.clone(),
                    marker: scan,
                    size: Size::new(item.width, item.height),
                    tags: item.tags.clone(),
                    caption: item.caption.clone(),
                };
                // An image named cover.* becomes the directory cover.
                let is_cover = item.name.to_ascii_lowercase().starts_with("cover");
                let node = self.locate(parent_dir(&item.path));
                let mut state = node.write_state();
                claim(&mut state, scan);
                state.images.push(entry);
                if is_cover {
                    state.cover_index = state.images.len() - 1;
                }
            }
            ItemKind::Video => {
                let entry = VideoEntry {
                    name: item.name.clone(),
                    path: item.path.clone(),
                    marker: scan,
                    size: Size::new(item.width, item.height),
                    duration_sec: item.duration_sec,
                    tags: item.tags.clone(),
                    caption: item.caption.clone(),
                };
                let node = self.locate(parent_dir(&item.path));
                let mut state = node.write_state();
                claim(&mut state, scan);
                state.videos.push(entry);
            }
        }
    }

    /// Remove everything the given generation did not touch; returns how
    /// many entries and directories went away.
    ///
    /// Depth-first, so the count covers entire vanished subtrees. Images
    /// additionally need a probed size to survive. Plain files are not
    /// inspected here: the claim reset already dropped stale ones when their
    /// directory was re-listed, and a directory that was never re-listed is
    /// removed whole. Pinned (virtual) directories are neither descended
    /// into nor removed; the next merge rebuilds them from live sources.
    pub fn sweep(&self, scan: ScanId) -> usize {
        let children: Vec<Arc<DirectoryNode>> = {
            let state = self.read_state();
            state
                .children
                .values()
                .filter(|child| child.marker() != ScanId::PINNED)
                .cloned()
                .collect()
        };
        let mut removed = 0;
        for child in &children {
            removed += child.sweep(scan);
        }

        let mut state = self.write_state();
        state.children.retain(|_, child| {
            let marker = child.marker();
            let keep = marker == scan || marker == ScanId::PINNED;
            if !keep {
                removed += 1;
            }
            keep
        });

        let before = state.images.len();
        state
            .images
            .retain(|image| image.marker == scan && !image.size.is_empty());
        removed += before - state.images.len();

        let before = state.videos.len();
        state.videos.retain(|video| video.marker == scan);
        removed += before - state.videos.len();

        removed
    }

    /// Build a pinned virtual directory aggregating several source nodes.
    ///
    /// Child directories are shared (the virtual node holds the same `Arc`s
    /// as the real tree, later sources shadowing same-named earlier ones);
    /// image, video and file lists are copied. The result carries
    /// [`ScanId::PINNED`] so sweeps leave it alone.
    pub fn merge(name: &str, sources: &[Arc<DirectoryNode>]) -> Arc<DirectoryNode> {
        let node = DirectoryNode::named(name, name);
        {
            let mut state = node.state.write().unwrap_or_else(PoisonError::into_inner);
            state.marker = ScanId::PINNED;
            for source in sources {
                let src = source.read_state();
                for (child_name, child) in &src.children {
                    state.children.insert(child_name.clone(), Arc::clone(child));
                }
                state.images.extend(src.images.iter().cloned());
                state.videos.extend(src.videos.iter().cloned());
                state.others.extend(src.others.iter().cloned());
            }
        }
        Arc::new(node)
    }

    /// Attach `child` under this node, replacing any same-named entry.
    pub fn adopt(&self, child: Arc<DirectoryNode>) {
        let mut state = self.write_state();
        state.children.insert(child.name.clone(), child);
    }

    /// Serialize the subtree into the flat snapshot form.
    ///
    /// Replaying the result through [`apply`](Self::apply) with a fresh
    /// generation reproduces the tree, which is exactly what a cache-backed
    /// warm start does. The root itself emits no directory item.
    pub fn flatten(&self) -> Vec<ScanItem> {
        let mut items = Vec::new();
        self.flatten_into(&mut items);
        items
    }

    fn flatten_into(&self, items: &mut Vec<ScanItem>) {
        if !self.path.is_empty() {
            items.push(ScanItem::directory(&self.path, &self.name));
        }
        let children: Vec<Arc<DirectoryNode>> = {
            let state = self.read_state();
            for other in &state.others {
                items.push(ScanItem::file(&other.path, &other.name));
            }
            for image in &state.images {
                items.push(ScanItem {
                    width: image.size.width,
                    height: image.size.height,
                    tags: image.tags.clone(),
                    caption: image.caption.clone(),
                    ..ScanItem::image(&image.path, &image.name)
                });
            }
            for video in &state.videos {
                items.push(ScanItem {
                    width: video.size.width,
                    height: video.size.height,
                    duration_sec: video.duration_sec,
                    tags: video.tags.clone(),
                    caption: video.caption.clone(),
                    ..ScanItem::video(&video.path, &video.name)
                });
            }
            state.children.values().cloned().collect()
        };
        for child in children {
            child.flatten_into(items);
        }
    }

    /// All image sizes in the subtree, keyed by path. Unprobed sizes are
    /// skipped.
    pub fn dump_sizes(&self) -> HashMap<String, Size> {
        let mut sizes = HashMap::new();
        self.dump_sizes_into(&mut sizes);
        sizes
    }

    fn dump_sizes_into(&self, sizes: &mut HashMap<String, Size>) {
        let children: Vec<Arc<DirectoryNode>> = {
            let state = self.read_state();
            for image in &state.images {
                if !image.size.is_empty() {
                    sizes.insert(image.path.clone(), image.size);
                }
            }
            for video in &state.videos {
                if !video.size.is_empty() {
                    sizes.insert(video.path.clone(), video.size);
                }
            }
            state.children.values().cloned().collect()
        };
        for child in children {
            child.dump_sizes_into(sizes);
        }
    }

    /// All tags and captions in the subtree, keyed by path. Empty payloads
    /// are skipped.
    pub fn dump_meta(&self) -> (HashMap<String, Vec<TagInfo>>, HashMap<String, String>) {
        let mut tags = HashMap::new();
        let mut captions = HashMap::new();
        self.dump_meta_into(&mut tags, &mut captions);
        (tags, captions)
    }

    fn dump_meta_into(
        &self,
        tags: &mut HashMap<String, Vec<TagInfo>>,
        captions: &mut HashMap<String, String>,
    ) {
        let children: Vec<Arc<DirectoryNode>> = {
            let state = self.read_state();
            for image in &state.images {
                if !image.tags.is_empty() {
                    tags.insert(image.path.clone(), image.tags.clone());
                }
                if !image.caption.is_empty() {
                    captions.insert(image.path.clone(), image.caption.clone());
                }
            }
            for video in &state.videos {
                if !video.tags.is_empty() {
                    tags.insert(video.path.clone(), video.tags.clone());
                }
                if !video.caption.is_empty() {
                    captions.insert(video.path.clone(), video.caption.clone());
                }
            }
            state.children.values().cloned().collect()
        };
        for child in children {
            child.dump_meta_into(tags, captions);
        }
    }

    /// All images in the subtree, depth-first.
    pub fn images(&self) -> Vec<ImageEntry> {
        let mut images = Vec::new();
        self.collect_images(&mut images);
        images
    }

    fn collect_images(&self, images: &mut Vec<ImageEntry>) {
        let children: Vec<Arc<DirectoryNode>> = {
            let state = self.read_state();
            images.extend(state.images.iter().cloned());
            state.children.values().cloned().collect()
        };
        for child in children {
            child.collect_images(images);
        }
    }

    /// All videos in the subtree, depth-first.
    pub fn videos(&self) -> Vec<VideoEntry> {
        let mut videos = Vec::new();
        self.collect_videos(&mut videos);
        videos
    }

    fn collect_videos(&self, videos: &mut Vec<VideoEntry>) {
        let children: Vec<Arc<DirectoryNode>> = {
            let state = self.read_state();
            videos.extend(state.videos.iter().cloned());
            state.children.values().cloned().collect()
        };
        for child in children {
            child.collect_videos(videos);
        }
    }

    /// Immediate contents of this directory: child summaries (with covers)
    /// plus its own media and file lists.
    pub fn explore(&self) -> Listing {
        let (children, images, videos, others) = {
            let state = self.read_state();
            (
                state.children.values().cloned().collect::<Vec<_>>(),
                state.images.clone(),
                state.videos.clone(),
                state.others.clone(),
            )
        };
        let directories = children
            .into_iter()
            .map(|child| DirSummary {
                name: child.name.clone(),
                path: child.path.clone(),
                cover: child.cover(),
            })
            .collect();
        Listing { directories, images, videos, others }
    }

    /// All album directories in the subtree, pre-order: a directory counts
    /// as an album when it directly holds at least one image or video.
    pub fn albums(&self) -> Vec<DirSummary> {
        let mut albums = Vec::new();
        self.collect_albums(&mut albums);
        albums
    }

    fn collect_albums(&self, albums: &mut Vec<DirSummary>) {
        let children: Vec<Arc<DirectoryNode>> =
            self.read_state().children.values().cloned().collect();
        for child in children {
            let has_media = {
                let state = child.read_state();
                !state.images.is_empty() || !state.videos.is_empty()
            };
            if has_media {
                albums.push(DirSummary {
                    name: child.name.clone(),
                    path: child.path.clone(),
                    cover: child.cover(),
                });
            }
            child.collect_albums(albums);
        }
    }

    /// Nested name→subtree map for navigation, skipping children whose
    /// cover resolves empty.
    pub fn display_tree(&self) -> JsonValue {
        let children: Vec<Arc<DirectoryNode>> =
            self.read_state().children.values().cloned().collect();
        let mut map = JsonMap::new();
        for child in children {
            if child.cover().is_some() {
                map.insert(child.name.clone(), child.display_tree());
            }
        }
        JsonValue::Object(map)
    }

    /// The cover image for this directory.
    ///
    /// First choice is the image at the cover index (falling back to the
    /// first image if the index points past the list). A directory with only
    /// videos uses the first video with known dimensions, wrapped as an
    /// image-shaped descriptor. Otherwise the children are asked in order.
    pub fn cover(&self) -> Option<ImageEntry> {
        let children: Vec<Arc<DirectoryNode>> = {
            let state = self.read_state();
            if !state.images.is_empty() {
                let image = state
                    .images
                    .get(state.cover_index)
                    .or_else(|| state.images.first())
                    .cloned();
                return image;
            }
            if let Some(video) = state.videos.first() {
                if !video.size.is_empty() {
                    return Some(ImageEntry {
                        name: video.name.clone(),
                        path: video.path.clone(),
                        size: video.size,
                        ..ImageEntry::default()
                    });
                }
            }
            state.children.values().cloned().collect()
        };
        children.iter().find_map(|child| child.cover())
    }

    /// Pick a random image.
    ///
    /// Without `descend` the choice is uniform over this directory's own
    /// images. With `descend` each direct image and each child directory is
    /// one equally-weighted choice; picking a child recurses into it, and an
    /// empty subtree surfaces as [`ErrorKind::NoImage`].
    pub fn random(self: &Arc<Self>, descend: bool) -> Result<PickedImage> {
        let (image, child) = {
            let state = self.read_state();
            if descend {
                let total = state.images.len() + state.children.len();
                if total == 0 {
                    exn::bail!(ErrorKind::NoImage(self.path.clone()));
                }
                let index = rand::rng().random_range(0..total);
                if index < state.images.len() {
                    (Some(state.images[index].clone()), None)
                } else {
                    let rest = index - state.images.len();
                    (None, state.children.values().nth(rest).cloned())
                }
            } else {
                if state.images.is_empty() {
                    exn::bail!(ErrorKind::NoImage(self.path.clone()));
                }
                let index = rand::rng().random_range(0..state.images.len());
                (Some(state.images[index].clone()), None)
            }
        };
        if let Some(image) = image {
            return Ok(PickedImage { image, parent: self.path.clone() });
        }
        match child {
            Some(child) => child.random(descend),
            None => exn::bail!(ErrorKind::NoImage(self.path.clone())),
        }
    }
}

impl std::fmt::Debug for DirectoryNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read_state();
        f.debug_struct("DirectoryNode")
            .field("path", &self.path)
            .field("images", &state.images.len())
            .field("videos", &state.videos.len())
            .field("others", &state.others.len())
            .field("children", &state.children.keys().collect::<Vec<_>>())
            .finish()
    }
}
