use std::fmt::Write as _;

use glam::Vec3;

use crate::scene::SceneGraph;

/// Camera/view configuration for rendering.
#[derive(Debug, Clone, Copy)]
pub struct RenderView {
    /// Observer position in world space.
    pub eye: Vec3,
    /// Point the observer is looking at.
    pub target: Vec3,
    /// Field of view in degrees.
    pub fov_degrees: f32,
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 10.0, 10.0),
            target: Vec3::ZERO,
            fov_degrees: 60.0,
        }
    }
}

impl RenderView {
    /// A view from `eye` looking one unit ahead along +z.
    pub fn at(eye: Vec3) -> Self {
        Self {
            eye,
            target: eye + Vec3::Z,
            ..Self::default()
        }
    }
}

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// The renderer reads the attached scene and a view, then produces output.
/// It never attaches or detaches anything; that is the paging core's job.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame from the given scene and view.
    fn render(&self, scene: &SceneGraph, view: &RenderView) -> Self::Output;
}

/// Debug text renderer in place of a GPU backend.
///
/// Produces a human-readable listing of the attached scene. Useful for CLI
/// output, logging, and testing the render interface.
#[derive(Debug, Default)]
pub struct DebugTextRenderer {
    /// Stop listing nodes after this many; `None` lists all.
    pub max_nodes: Option<usize>,
}

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_nodes(max_nodes: usize) -> Self {
        Self {
            max_nodes: Some(max_nodes),
        }
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, scene: &SceneGraph, view: &RenderView) -> String {
        let nodes = scene.nodes();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "=== Scene ({} nodes, {} instances) ===",
            nodes.len(),
            nodes.iter().map(|n| n.instances).sum::<usize>()
        );
        let _ = writeln!(
            out,
            "Observer: eye=({:.1}, {:.1}, {:.1}) target=({:.1}, {:.1}, {:.1}) fov={:.0}",
            view.eye.x, view.eye.y, view.eye.z, view.target.x, view.target.y, view.target.z, view.fov_degrees
        );

        let limit = self.max_nodes.unwrap_or(usize::MAX);
        for node in nodes.iter().take(limit) {
            let p = node.translation;
            let dist = (p - view.eye).length();
            let _ = write!(
                out,
                "  [{}] {} x{} pos=({:.1}, {:.1}, {:.1}) dist={:.1}",
                node.id, node.label, node.instances, p.x, p.y, p.z, dist
            );
            if node.fade.enabled {
                let _ = write!(
                    out,
                    " fade=[{:.0}..{:.0}] alpha={:.2}",
                    node.fade.start,
                    node.fade.end,
                    node.fade.alpha(dist)
                );
            }
            out.push('\n');
        }
        if nodes.len() > limit {
            let _ = writeln!(out, "  ... {} more", nodes.len() - limit);
        }

        out
    }
}
