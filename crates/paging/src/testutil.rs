//! In-crate fixtures: a counting content handle and a configurable loader.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use glam::Vec3;
use verdure_common::{Cell2D, ContentBound, ContentHandle, FadeWindow};

use crate::block::{Block, BlockCore};
use crate::error::LoadError;
use crate::loader::{LoadTask, PageLoader};
use crate::manager::PagingManager;
use crate::page::{Page, PageCore, PageLayout};

/// Shared counters for every handle built from it.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    attached: Arc<AtomicUsize>,
    attach_calls: Arc<AtomicUsize>,
    detach_calls: Arc<AtomicUsize>,
}

impl Recorder {
    pub fn handle(&self) -> RecordedHandle {
        RecordedHandle {
            recorder: self.clone(),
            bound: None,
            placed_at: None,
            attached: false,
            fade: FadeWindow::disabled(),
            empty: false,
        }
    }

    pub fn handle_with_bound(&self, bound: ContentBound) -> RecordedHandle {
        RecordedHandle {
            bound: Some(bound),
            ..self.handle()
        }
    }

    pub fn attached(&self) -> usize {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn attach_calls(&self) -> usize {
        self.attach_calls.load(Ordering::SeqCst)
    }

    pub fn detach_calls(&self) -> usize {
        self.detach_calls.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct RecordedHandle {
    recorder: Recorder,
    bound: Option<ContentBound>,
    pub placed_at: Option<Vec3>,
    pub attached: bool,
    pub fade: FadeWindow,
    pub empty: bool,
}

impl ContentHandle for RecordedHandle {
    fn is_empty(&self) -> bool {
        self.empty
    }

    fn bound(&self) -> Option<ContentBound> {
        self.bound
    }

    fn place(&mut self, center: Vec3) {
        self.placed_at = Some(center);
    }

    fn attach(&mut self) {
        self.attached = true;
        self.recorder.attached.fetch_add(1, Ordering::SeqCst);
        self.recorder.attach_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn detach(&mut self) {
        self.attached = false;
        self.recorder.attached.fetch_sub(1, Ordering::SeqCst);
        self.recorder.detach_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn set_fade_window(&mut self, window: FadeWindow) {
        self.fade = window;
    }
}

#[derive(Debug)]
pub struct TestBlock {
    core: BlockCore<RecordedHandle>,
}

impl Block for TestBlock {
    type Handle = RecordedHandle;

    fn core(&self) -> &BlockCore<RecordedHandle> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut BlockCore<RecordedHandle> {
        &mut self.core
    }
}

/// Per-block, per-level handles.
pub type TestContent = Vec<Vec<RecordedHandle>>;

#[derive(Debug)]
pub struct TestPage {
    core: PageCore<TestBlock, TestContent>,
    pub recorder: Recorder,
    pub serial: usize,
}

impl TestPage {
    pub fn new(cell: Cell2D, layout: PageLayout, recorder: Recorder) -> Self {
        Self {
            core: PageCore::new(cell, layout),
            recorder,
            serial: 0,
        }
    }
}

impl Page for TestPage {
    type Block = TestBlock;
    type Content = TestContent;

    fn core(&self) -> &PageCore<TestBlock, TestContent> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PageCore<TestBlock, TestContent> {
        &mut self.core
    }

    fn create_block(&self, x: i32, z: i32, center: Vec3) -> TestBlock {
        TestBlock {
            core: BlockCore::new(x, z, center, self.core.layout().block_size()),
        }
    }

    fn attach_content(&mut self, content: TestContent) -> bool {
        self.create_blocks();
        if content.len() != self.core.blocks().len() {
            return false;
        }
        for (block, nodes) in self.core.blocks_mut().iter_mut().zip(content) {
            let levels = nodes.len();
            block.core_mut().set_nodes(nodes);
            for level in 0..levels {
                block.core_mut().calculate_real_max(level);
            }
        }
        true
    }
}

/// What the loader does for a given cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Content,
    Empty,
    Fail,
    Panic,
    NoTask,
    /// Content, but with the wrong number of detail levels.
    Mismatched,
}

pub struct TestLoader {
    pub recorder: Recorder,
    pub levels: usize,
    pub outcomes: HashMap<Cell2D, Outcome>,
    pub default_outcome: Outcome,
    pub gate: Option<Arc<AtomicBool>>,
    pub created: Cell<usize>,
    pub dispatched: Cell<usize>,
    pub ran: Arc<AtomicUsize>,
}

impl TestLoader {
    pub fn new(levels: usize) -> Self {
        Self {
            recorder: Recorder::default(),
            levels,
            outcomes: HashMap::new(),
            default_outcome: Outcome::Content,
            gate: None,
            created: Cell::new(0),
            dispatched: Cell::new(0),
            ran: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Hold every task until the returned flag is set.
    pub fn gated(mut self) -> (Self, Arc<AtomicBool>) {
        let gate = Arc::new(AtomicBool::new(false));
        self.gate = Some(gate.clone());
        (self, gate)
    }
}

impl PageLoader for TestLoader {
    type Page = TestPage;

    fn create_page(&self, cell: Cell2D, layout: PageLayout) -> TestPage {
        self.created.set(self.created.get() + 1);
        let mut page = TestPage::new(cell, layout, self.recorder.clone());
        page.serial = self.created.get();
        page
    }

    fn load_page(&self, page: &TestPage) -> Option<LoadTask<TestContent>> {
        let outcome = self
            .outcomes
            .get(&page.core().cell())
            .copied()
            .unwrap_or(self.default_outcome);
        if outcome == Outcome::NoTask {
            return None;
        }
        self.dispatched.set(self.dispatched.get() + 1);

        let blocks = page.core().layout().blocks_per_page();
        let levels = match outcome {
            Outcome::Mismatched => self.levels + 1,
            _ => self.levels,
        };
        let recorder = self.recorder.clone();
        let gate = self.gate.clone();
        let ran = self.ran.clone();
        let task: LoadTask<TestContent> = Box::new(move || {
            if let Some(gate) = gate {
                let deadline = Instant::now() + Duration::from_secs(5);
                while !gate.load(Ordering::SeqCst) && Instant::now() < deadline {
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
            ran.fetch_add(1, Ordering::SeqCst);
            match outcome {
                Outcome::Empty => Ok(None),
                Outcome::Fail => Err(LoadError::Failed("no data".into())),
                Outcome::Panic => panic!("generator blew up"),
                _ => Ok(Some(
                    (0..blocks)
                        .map(|_| (0..levels).map(|_| recorder.handle()).collect())
                        .collect(),
                )),
            }
        });
        Some(task)
    }

    fn name(&self) -> &str {
        "test"
    }
}

/// Tick with `dt = 0` until `done` holds or five seconds pass.
pub fn drive_until(
    manager: &mut PagingManager<TestLoader>,
    observer: Vec3,
    mut done: impl FnMut(&PagingManager<TestLoader>) -> bool,
) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        manager.update(0.0, observer).expect("tick failed");
        if done(manager) {
            return true;
        }
        if Instant::now() > deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Tick until no live page is unloaded or pending.
pub fn settle(manager: &mut PagingManager<TestLoader>, observer: Vec3) -> bool {
    drive_until(manager, observer, |m| {
        m.grid()
            .iter()
            .all(|p| !p.core().is_pending() && p.core().state() != crate::PageState::Unloaded)
    })
}
