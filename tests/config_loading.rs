use std::io::Write;
use tempfile::NamedTempFile;
use tilegen::{GenError, WorldGenerationParams};

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn partial_file_fills_in_defaults() {
    let file = write_config(
        r#"
seed = 12345
width = 80
height = 48

[biome]
water_threshold = 0.3

[roads]
first_level_branches = 2
"#,
    );
    let params = WorldGenerationParams::from_toml_file(file.path()).expect("valid config");
    assert_eq!(params.seed, 12345);
    assert_eq!(params.biome.water_threshold, 0.3);
    assert_eq!(params.biome.dirt_threshold, 0.45);
    assert_eq!(params.roads.first_level_branches, 2);
    assert_eq!(params.roads.branch_width, 3);
    assert_eq!(params.settlement.anchor_id, "Camp");
}

#[test]
fn config_round_trips_through_toml() {
    let mut params = WorldGenerationParams::new(7, 64, 40);
    params.river.inline_bridges = true;
    params.settlement.footprint = (10, 8);
    let text = toml::to_string(&params).expect("serializable");
    let file = write_config(&text);
    let loaded = WorldGenerationParams::from_toml_file(file.path()).expect("valid config");
    assert_eq!(loaded, params);
}

#[test]
fn invalid_values_are_rejected() {
    let file = write_config("width = 4\nheight = 4\n");
    assert!(matches!(
        WorldGenerationParams::from_toml_file(file.path()),
        Err(GenError::InvalidConfig { .. })
    ));

    let file = write_config("[roads]\nbranch_width = 4\n");
    assert!(matches!(
        WorldGenerationParams::from_toml_file(file.path()),
        Err(GenError::InvalidConfig { .. })
    ));

    let file = write_config("[biome]\ngrass_tiles = []\n");
    assert!(matches!(
        WorldGenerationParams::from_toml_file(file.path()),
        Err(GenError::InvalidConfig { .. })
    ));
}

#[test]
fn broken_toml_and_missing_file_are_distinct_errors() {
    let file = write_config("seed = [");
    assert!(matches!(
        WorldGenerationParams::from_toml_file(file.path()),
        Err(GenError::Toml(_))
    ));
    assert!(matches!(
        WorldGenerationParams::from_toml_file("/nonexistent/tilegen.toml"),
        Err(GenError::Io(_))
    ));
}

fn assert_rejected(contents: &str) {
    let file = write_config(contents);
    let result = WorldGenerationParams::from_toml_file(file.path());
    assert!(
        matches!(result, Err(GenError::InvalidConfig { .. })),
        "accepted: {contents}"
    );
}

#[test]
fn non_finite_and_out_of_range_probabilities_are_rejected() {
    assert_rejected("[river]\nswamp_chance = nan\n");
    assert_rejected("[river]\nswamp_chance = 1.5\n");
    assert_rejected("[biome]\ndecor_chance = -0.1\n");
    assert_rejected("[biome]\ndecor_chance = inf\n");
    assert_rejected("[[biome.props]]\nid = \"tree\"\ndensity = nan\n");
    assert_rejected("[[biome.water_props]]\nid = \"lily_pad\"\ndensity = 2.0\n");
}

#[test]
fn river_width_variation_is_bounded_by_mean_width() {
    assert_rejected("[river]\nwidth_variation = 3000000000\n");
    assert_rejected("[river]\nmean_width = 4\nwidth_variation = 5\n");

    let file = write_config("[river]\nmean_width = 4\nwidth_variation = 4\n");
    assert!(WorldGenerationParams::from_toml_file(file.path()).is_ok());
}

#[test]
fn prop_spacing_must_fit_the_map() {
    assert_rejected("[decor]\nprop_spacing = 1e12\n");
    assert_rejected("[decor]\nprop_spacing = nan\n");
    assert_rejected("[chunks]\nprop_spacing = 1e12\n");
    assert_rejected("width = 80\nheight = 48\n[decor]\nprop_spacing = 81.0\n");
}

#[test]
fn oversized_counts_are_rejected() {
    assert_rejected("width = 100000\n");
    assert_rejected("[roads]\nmax_branch_depth = 30\n");
    assert_rejected("[decor]\nwater_prop_min_depth = 4294967295\n");
}

#[test]
fn validated_edge_values_generate_without_panicking() {
    let mut params = WorldGenerationParams::new(3, 40, 24);
    params.river.swamp_chance = 1.0;
    params.river.width_variation = params.river.mean_width;
    params.biome.decor_chance = 1.0;
    params.decor.prop_spacing = 40.0;
    params.validate().expect("edge values are valid");
    let world = tilegen::generate_world(&params).expect("valid params");
    assert_eq!(world.report.road_components, 1);
}
