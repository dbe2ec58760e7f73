use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use glam::Vec3;
use verdure_common::{ContentBound, ContentHandle, FadeWindow};

/// Identity of a node within one [`SceneGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the scene knows about an attached node.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNodeInfo {
    pub id: NodeId,
    pub label: String,
    pub instances: usize,
    pub translation: Vec3,
    pub fade: FadeWindow,
}

#[derive(Debug, Default)]
struct SceneState {
    next_id: u64,
    attached: BTreeMap<NodeId, SceneNodeInfo>,
}

/// Registry of everything currently attached to the active scene.
///
/// Clones share the same registry. Nodes may be built on worker threads and
/// attached later from the driver thread.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    state: Arc<Mutex<SceneState>>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SceneState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Build a detached node owned by this scene.
    pub fn node(&self, label: impl Into<String>, instances: usize) -> SceneNode {
        let id = {
            let mut state = self.lock();
            state.next_id += 1;
            NodeId(state.next_id)
        };
        SceneNode {
            id,
            label: label.into(),
            instances,
            bound: None,
            translation: Vec3::ZERO,
            fade: FadeWindow::disabled(),
            attached: false,
            scene: self.clone(),
        }
    }

    pub fn attach(&self, info: SceneNodeInfo) {
        let id = info.id;
        if self.lock().attached.insert(id, info).is_some() {
            tracing::warn!(node = %id, "node attached twice");
        }
    }

    pub fn detach(&self, id: NodeId) -> Option<SceneNodeInfo> {
        self.lock().attached.remove(&id)
    }

    pub fn set_fade(&self, id: NodeId, fade: FadeWindow) {
        if let Some(info) = self.lock().attached.get_mut(&id) {
            info.fade = fade;
        }
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.lock().attached.contains_key(&id)
    }

    pub fn attached_count(&self) -> usize {
        self.lock().attached.len()
    }

    /// Total instances over all attached nodes.
    pub fn instance_count(&self) -> usize {
        self.lock().attached.values().map(|n| n.instances).sum()
    }

    /// Snapshot of the attached nodes, ordered by id.
    pub fn nodes(&self) -> Vec<SceneNodeInfo> {
        self.lock().attached.values().cloned().collect()
    }
}

/// Renderable content for one block and detail level.
///
/// Registers itself with its scene while attached and unregisters when
/// detached or dropped.
pub struct SceneNode {
    id: NodeId,
    label: String,
    instances: usize,
    bound: Option<ContentBound>,
    translation: Vec3,
    fade: FadeWindow,
    attached: bool,
    scene: SceneGraph,
}

impl SceneNode {
    pub fn with_bound(mut self, bound: ContentBound) -> Self {
        self.bound = Some(bound);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn instances(&self) -> usize {
        self.instances
    }

    pub fn translation(&self) -> Vec3 {
        self.translation
    }

    pub fn fade(&self) -> FadeWindow {
        self.fade
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    fn info(&self) -> SceneNodeInfo {
        SceneNodeInfo {
            id: self.id,
            label: self.label.clone(),
            instances: self.instances,
            translation: self.translation,
            fade: self.fade,
        }
    }
}

impl ContentHandle for SceneNode {
    fn is_empty(&self) -> bool {
        self.instances == 0
    }

    fn bound(&self) -> Option<ContentBound> {
        self.bound
    }

    fn place(&mut self, center: Vec3) {
        self.translation = center;
    }

    fn attach(&mut self) {
        if !self.attached {
            self.scene.attach(self.info());
            self.attached = true;
        }
    }

    fn detach(&mut self) {
        if self.attached {
            self.scene.detach(self.id);
            self.attached = false;
        }
    }

    fn set_fade_window(&mut self, window: FadeWindow) {
        self.fade = window;
        if self.attached {
            self.scene.set_fade(self.id, window);
        }
    }
}

impl Drop for SceneNode {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for SceneNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneNode")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("instances", &self.instances)
            .field("attached", &self.attached)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_registers_and_detach_unregisters() {
        let scene = SceneGraph::new();
        let mut node = scene.node("grass", 12);
        node.place(Vec3::new(4.0, 0.0, -4.0));
        assert_eq!(scene.attached_count(), 0);

        node.attach();
        node.attach();
        assert_eq!(scene.attached_count(), 1);
        assert!(scene.is_attached(node.id()));
        assert_eq!(scene.instance_count(), 12);
        assert_eq!(scene.nodes()[0].translation, Vec3::new(4.0, 0.0, -4.0));

        node.detach();
        assert_eq!(scene.attached_count(), 0);
    }

    #[test]
    fn fade_follows_attached_node() {
        let scene = SceneGraph::new();
        let mut node = scene.node("trees", 3);
        node.attach();
        node.set_fade_window(FadeWindow::new(100.0, 120.0));
        assert_eq!(scene.nodes()[0].fade, FadeWindow::new(100.0, 120.0));
    }

    #[test]
    fn dropping_attached_node_unregisters() {
        let scene = SceneGraph::new();
        {
            let mut node = scene.node("grass", 1);
            node.attach();
            assert_eq!(scene.attached_count(), 1);
        }
        assert_eq!(scene.attached_count(), 0);
    }

    #[test]
    fn node_ids_are_unique_across_threads() {
        let scene = SceneGraph::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let scene = scene.clone();
                std::thread::spawn(move || (0..25).map(|_| scene.node("n", 1).id()).collect::<Vec<_>>())
            })
            .collect();
        let mut ids: Vec<NodeId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn empty_node_reports_empty() {
        let scene = SceneGraph::new();
        assert!(scene.node("nothing", 0).is_empty());
        let bound = ContentBound::Sphere {
            center: Vec3::ZERO,
            radius: 2.0,
        };
        assert_eq!(scene.node("x", 1).with_bound(bound).bound(), Some(bound));
    }
}
