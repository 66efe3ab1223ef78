use tilegen::seed::chunk_seed;
use tilegen::{Cell, ChunkCoord, ChunkStore, GenError, Layer, TileClass, WorldGenerationParams};

fn store(seed: u64) -> ChunkStore {
    let mut params = WorldGenerationParams::new(seed, 80, 48);
    params.chunks.chunk_width = 20;
    params.chunks.chunk_height = 12;
    params.chunks.view_radius = 1;
    params.biome.props[0].density = 0.3;
    ChunkStore::new(&params).expect("valid params")
}

#[test]
fn chunk_sub_seed_is_stable() {
    assert_eq!(chunk_seed(12345, 3, -2), chunk_seed(12345, 3, -2));
    assert_ne!(chunk_seed(12345, 3, -2), chunk_seed(12345, -2, 3));
}

#[test]
fn view_loads_square_and_unloads_the_rest() {
    let mut s = store(1);
    let change = s.update_view(Cell::new(5, 5));
    assert_eq!(change.loaded.len(), 9);
    assert!(change.unloaded.is_empty());
    assert!(s.is_loaded(ChunkCoord::new(-1, -1)));

    let change = s.update_view(Cell::new(45, 5));
    assert_eq!(change.loaded.len(), 6);
    assert_eq!(change.unloaded.len(), 6);
    assert!(!s.is_loaded(ChunkCoord::new(-1, 0)));
    assert!(s.is_loaded(ChunkCoord::new(3, 1)));
    assert_eq!(s.loaded_chunks().len(), 9);
}

#[test]
fn overrides_survive_unload() {
    let mut s = store(2);
    let cell = Cell::new(-7, 30);
    let (coord, local) = s.world_to_chunk(cell);

    s.mutate_tile(cell, Layer::Foreground, Some(TileClass::Water)).expect("water fits foreground");
    assert!(!s.is_loaded(coord));
    assert!(s.save(coord).expect("delta created on touch").foreground_overrides.contains_key(&local));

    s.load_chunk(coord);
    assert_eq!(s.tile_at(cell), Some(TileClass::Water));
    s.unload_chunk(coord);
    assert_eq!(s.tile_at(cell), None);
    s.load_chunk(coord);
    assert_eq!(s.tile_at(cell), Some(TileClass::Water));

    s.mutate_tile(cell, Layer::Foreground, None).expect("clearing is allowed");
    s.mutate_tile(cell, Layer::Ground, Some(TileClass::Dirt)).expect("dirt fits ground");
    assert_eq!(s.tile_at(cell), Some(TileClass::Dirt));
}

#[test]
fn wrong_layer_is_rejected() {
    let mut s = store(3);
    assert!(matches!(
        s.mutate_tile(Cell::new(0, 0), Layer::Ground, Some(TileClass::Cliff)),
        Err(GenError::InvalidTile { .. })
    ));
    assert!(s.save(ChunkCoord::new(0, 0)).is_none());
}

#[test]
fn collected_props_stay_collected() {
    let mut s = store(4);
    let coord = ChunkCoord::new(0, 0);
    s.load_chunk(coord);
    let generated = s.save(coord).expect("loaded").props.clone();
    let Some(first) = generated.first().copied() else {
        return;
    };
    let origin = s.chunk_origin(coord);
    let world_cell = origin.offset(first.cell.x, first.cell.y);

    assert!(s.collect_prop(world_cell));
    assert!(!s.collect_prop(world_cell));
    let live = s.chunk(coord).expect("loaded").props.len();
    assert_eq!(live, generated.len() - 1);

    s.unload_chunk(coord);
    s.load_chunk(coord);
    let save = s.save(coord).expect("kept");
    assert_eq!(save.props.len(), generated.len());
    assert!(save.props[0].collected);
    assert_eq!(s.chunk(coord).expect("loaded").props.len(), generated.len() - 1);
    assert!(s.placements(coord).iter().all(|p| p.cell != world_cell));
}

#[test]
fn terrain_classes_do_not_depend_on_chunk_size() {
    let mut small = store(6);
    let mut params = WorldGenerationParams::new(6, 80, 48);
    params.chunks.chunk_width = 40;
    params.chunks.chunk_height = 24;
    let mut large = ChunkStore::new(&params).expect("valid params");

    large.load_chunk(ChunkCoord::new(-1, 0));
    for cx in -2..=-1 {
        for cy in 0..=1 {
            small.load_chunk(ChunkCoord::new(cx, cy));
        }
    }
    for y in 0..24 {
        for x in -40..0 {
            let cell = Cell::new(x, y);
            assert_eq!(small.tile_at(cell), large.tile_at(cell), "class differs at {cell:?}");
        }
    }
}
