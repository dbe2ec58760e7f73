use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;
use verdure_paging::{Cell2D, MIN_PAGE_SIZE, PageLayout, PagingConfig, PagingStats};
use verdure_render::{DebugTextRenderer, RenderView, Renderer};
use verdure_vegetation::{
    Channel, DensityMap, GrassLayer, GrassSection, HeightFn, MapGrid, MeshType, TreeData, TreeDataGrid, TreeLayer,
    TreeSection, VegetationConfig, VegetationContext,
};

#[derive(Parser)]
#[command(name = "verdure-cli", about = "CLI tool for verdure vegetation paging")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate info
    Info,
    /// Read and validate a vegetation config (.yaml, .yml or .json)
    Validate {
        path: PathBuf,
    },
    /// Walk an observer through a generated world and report paging activity
    Walk {
        /// Vegetation config; a built-in meadow and forest when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "120")]
        ticks: u32,
        /// Observer speed in units per second, along +x
        #[arg(long, default_value = "40.0")]
        speed: f32,
        /// Seconds per tick
        #[arg(long, default_value = "0.1")]
        dt: f32,
        /// RNG seed for the generated world
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Scene nodes to list in the final dump
        #[arg(long, default_value = "12")]
        nodes: usize,
        /// Height of rolling hills under the vegetation; flat ground when 0
        #[arg(long, default_value = "0.0")]
        hills: f32,
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
            println!("verdure-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("paging: {}", verdure_paging::crate_info());
            println!("render: {}", verdure_render::crate_info());
            println!("vegetation: {}", verdure_vegetation::crate_info());
        }
        Commands::Validate { path } => {
            let config = VegetationConfig::load(&path)?;
            println!("{}: OK", path.display());
            if let Some(grass) = &config.grass {
                let paging = grass.paging_config();
                println!(
                    "  grass: page_size={} resolution={} far={} layers={}",
                    paging.page_size,
                    paging.resolution,
                    far_distance(&paging),
                    grass.layers.len()
                );
            }
            if let Some(trees) = &config.trees {
                let paging = trees.paging_config();
                println!(
                    "  trees: page_size={} resolution={} far={} layers={}",
                    paging.page_size,
                    paging.resolution,
                    far_distance(&paging),
                    trees.layers.len()
                );
            }
        }
        Commands::Walk {
            config,
            ticks,
            speed,
            dt,
            seed,
            nodes,
            hills,
        } => {
            let config = match config {
                Some(path) => VegetationConfig::load(path)?,
                None => default_config(),
            };
            let path_end = speed * dt * ticks as f32;
            println!("Walk: ticks={ticks}, dt={dt}, speed={speed}, seed={seed}");

            let mut context = VegetationContext::default();
            if hills > 0.0 {
                println!("Terrain: hills up to {hills}");
                context.set_terrain(Arc::new(HeightFn(move |x: f32, z: f32| {
                    hills * 0.25 * ((x * 0.01).sin() + (z * 0.013).cos() + 2.0)
                })));
            }
            if let Some(grass) = &config.grass {
                let maps = meadow_maps(&grass.paging_config(), path_end, seed);
                println!("Grass: {} pages of density maps", maps.len());
                context.add_grass_section(grass, Arc::new(maps), seed)?;
            }
            if let Some(trees) = &config.trees {
                let forest = forest_data(trees, path_end, seed);
                println!(
                    "Trees: {} instances over {} pages",
                    forest.instance_count(),
                    forest.page_count()
                );
                context.add_tree_section(trees, Arc::new(forest))?;
            }

            let names: Vec<String> = context.names().map(str::to_owned).collect();
            let mut totals = vec![PagingStats::default(); names.len()];
            let mut observer = Vec3::ZERO;
            for tick in 0..ticks {
                observer.x = speed * dt * tick as f32;
                context.update(dt, observer)?;
                for (total, (_, stats)) in totals.iter_mut().zip(context.stats()) {
                    accumulate(total, stats);
                }
                if tick % 20 == 0 {
                    for (name, stats) in context.stats() {
                        println!(
                            "tick {tick:>4} x={:>7.1} {name}: live={} cached={} visible={}",
                            observer.x, stats.live_pages, stats.cached_pages, stats.visible_blocks
                        );
                    }
                }
                // Give the paging workers a moment, as a frame would.
                std::thread::sleep(Duration::from_millis(2));
            }

            println!();
            for (name, total) in names.iter().zip(&totals) {
                println!(
                    "{name}: created={} recycled={} cached={} expired={} unloaded={} dispatched={} loaded={} idle={} failed={}",
                    total.pages_created,
                    total.pages_recycled,
                    total.pages_cached,
                    total.pages_expired,
                    total.pages_unloaded,
                    total.loads_dispatched,
                    total.loads_completed,
                    total.loads_idle,
                    total.loads_failed
                );
            }

            let view = RenderView::at(observer + Vec3::Y * 2.0);
            print!(
                "{}",
                DebugTextRenderer::with_max_nodes(nodes).render(context.scene(), &view)
            );
        }
    }

    Ok(())
}

fn far_distance(paging: &PagingConfig) -> f32 {
    paging.detail_levels.last().map_or(0.0, |level| level.far_dist)
}

fn accumulate(total: &mut PagingStats, tick: &PagingStats) {
    total.pages_created += tick.pages_created;
    total.pages_recycled += tick.pages_recycled;
    total.pages_cached += tick.pages_cached;
    total.pages_expired += tick.pages_expired;
    total.pages_unloaded += tick.pages_unloaded;
    total.loads_dispatched += tick.loads_dispatched;
    total.loads_completed += tick.loads_completed;
    total.loads_idle += tick.loads_idle;
    total.loads_failed += tick.loads_failed;
    total.tick_time += tick.tick_time;
}

fn default_config() -> VegetationConfig {
    let mut meadow = GrassLayer::new("meadow", MeshType::CrossQuads);
    meadow.set_density_multiplier(0.25);
    let mut flowers = GrassLayer::new("flowers", MeshType::Billboards);
    flowers.set_density_multiplier(0.05);
    flowers.set_density_map(0, Channel::Green);
    flowers.planting_mut().set_threshold(0.4);

    VegetationConfig {
        grass: Some(GrassSection {
            layers: vec![meadow, flowers],
            ..GrassSection::default()
        }),
        trees: Some(TreeSection {
            layers: vec![TreeLayer::new("oak", true), TreeLayer::new("pine", false)],
            ..TreeSection::default()
        }),
    }
}

/// Pages the walk can reach, with a margin of the paging radius.
fn reachable_pages(paging: &PagingConfig, path_end: f32) -> (PageLayout, Vec<Cell2D>) {
    let page_size = paging.page_size.max(MIN_PAGE_SIZE) as f32;
    let layout = PageLayout::new(page_size, paging.resolution);
    let reach = paging
        .detail_levels
        .iter()
        .map(|l| l.far_dist + l.fade_range)
        .fold(paging.radius, f32::max);
    let margin = (reach / page_size).ceil() as i32 + 1;
    let last = (path_end / page_size).ceil() as i32;

    let cells = (-margin..=last + margin)
        .flat_map(|x| (-margin..=margin).map(move |z| Cell2D::new(x, z)))
        .collect();
    (layout, cells)
}

fn meadow_maps(paging: &PagingConfig, path_end: f32, seed: u64) -> MapGrid {
    let (layout, cells) = reachable_pages(paging, path_end);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut maps = MapGrid::new();
    for cell in cells {
        let phase = rng.random::<f32>() * std::f32::consts::TAU;
        let grass = DensityMap::from_fn(16, layout.page_size(), |x, z| {
            let wave = ((x as f32 * 0.4 + phase).sin() * (z as f32 * 0.3).cos() + 1.0) * 0.5;
            let red = (wave * 255.0) as u8;
            [red, 255 - red, 0, 255]
        });
        maps.add_density_map(cell, 0, grass);
    }
    maps
}

fn forest_data(section: &TreeSection, path_end: f32, seed: u64) -> TreeDataGrid {
    let paging = section.paging_config();
    let (layout, cells) = reachable_pages(&paging, path_end);
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ 0x7e3e);
    let mut grid = TreeDataGrid::new(layout);
    let layers = section.layers.len().max(1);
    let half = layout.page_size() * 0.5;
    for cell in cells {
        let center = layout.page_center(cell);
        for _ in 0..rng.random_range(0..24) {
            let tree = TreeData::new(
                center.x + rng.random_range(-half..half),
                0.0,
                center.z + rng.random_range(-half..half),
                rng.random_range(-std::f32::consts::PI..std::f32::consts::PI),
                rng.random_range(0.8..1.2),
            );
            grid.add_tree(rng.random_range(0..layers), tree);
        }
    }
    grid
}
