pub mod biome;
pub mod bridges;
pub mod chunk;
pub mod config;
pub mod decor;
pub mod error;
pub mod generator;
pub mod grid;
pub mod pathfinding;
pub mod render;
pub mod rivers;
pub mod roads;
pub mod seed;
pub mod settlement;
pub mod terrain;
pub mod world;

pub use biome::{BiomeConfig, Tile, TileClass};
pub use chunk::{ChunkCoord, ChunkSaveData, ChunkStore, PropRecord, ViewChange};
pub use config::WorldGenerationParams;
pub use error::GenError;
pub use generator::{GenerationReport, SharedWorld, World, generate_world};
pub use grid::{Cell, Connectivity, Grid};
pub use pathfinding::{PathResult, PriorityQueue, find_path};
pub use render::{render_preview, save_preview_png};
pub use world::{Layer, PlacementKind, PlacementRecord, RectangleBridge, WorldGrids};
